//! Path validation and security for the filesystem MCP server.
//!
//! All filesystem operations must pass through [`AllowedRoots::validate`] to
//! ensure the requested path is within the server's allowed directories.

use crate::error::{Error, Result};
use std::io;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

/// Upper bound on dangling symlinks followed while resolving one path.
const MAX_SYMLINK_HOPS: u8 = 40;

/// The immutable set of canonical directories the server may touch.
///
/// Built once at startup and shared read-only by every request.
#[derive(Debug, Clone)]
pub struct AllowedRoots {
    dirs: Arc<[PathBuf]>,
}

impl AllowedRoots {
    /// Canonicalize the configured directories, skipping any that don't exist
    /// or aren't directories. Fails if nothing usable remains.
    pub fn new<I, P>(dirs: I) -> Result<Self>
    where
        I: IntoIterator<Item = P>,
        P: AsRef<Path>,
    {
        let mut canonical: Vec<PathBuf> = Vec::new();
        for dir in dirs {
            let dir = dir.as_ref();
            match dir.canonicalize() {
                Ok(path) if path.is_dir() => {
                    if !canonical.contains(&path) {
                        canonical.push(path);
                    }
                }
                Ok(path) => {
                    tracing::warn!(path = %path.display(), "allowed path is not a directory, skipping")
                }
                Err(e) => {
                    tracing::warn!(path = %dir.display(), error = %e, "cannot resolve allowed directory, skipping")
                }
            }
        }
        if canonical.is_empty() {
            return Err(Error::InvalidArgument(
                "no usable allowed directories".into(),
            ));
        }
        Ok(Self {
            dirs: canonical.into(),
        })
    }

    /// The canonical allowed directories, in configuration order.
    pub fn dirs(&self) -> &[PathBuf] {
        &self.dirs
    }

    /// Whether `path` equals or lies beneath one of the allowed directories.
    ///
    /// `path` must already be canonical. The comparison is component-wise, so
    /// `/allowed/foo` does not contain `/allowed/foobar`.
    pub fn contains(&self, path: &Path) -> bool {
        self.dirs.iter().any(|dir| path.starts_with(dir))
    }

    /// Whether `path` is exactly one of the allowed directories.
    pub fn is_root(&self, path: &Path) -> bool {
        self.dirs.iter().any(|dir| dir == path)
    }

    /// Validate that a path is within the allowed directories.
    ///
    /// Steps:
    /// 1. Reject empty paths and paths containing null bytes
    /// 2. Anchor relative paths at the first allowed directory and lexically
    ///    clean `.` and `..` segments
    /// 3. Resolve symlinks along the whole chain
    ///    - If the path does not exist, resolve the parent directory instead
    ///      and re-append the final component
    ///    - A dangling symlink is resolved through its target
    /// 4. Verify the resolved path starts with one of the allowed directories
    pub fn validate(&self, raw: &str) -> Result<PathBuf> {
        let cleaned = self.absolute(raw)?;
        self.check(&cleaned)
    }

    /// Like [`validate`](Self::validate), but any number of trailing
    /// components may be missing: the nearest existing ancestor must resolve
    /// inside an allowed directory and the missing names are re-appended.
    pub fn validate_creatable(&self, raw: &str) -> Result<PathBuf> {
        let cleaned = self.absolute(raw)?;
        let mut missing = Vec::new();
        let mut current = cleaned.as_path();
        loop {
            match self.check(current) {
                Ok(base) => {
                    return Ok(missing
                        .iter()
                        .rev()
                        .fold(base, |path: PathBuf, name| path.join(name)));
                }
                Err(Error::NotFound(_)) => {
                    let (Some(parent), Some(name)) = (current.parent(), current.file_name())
                    else {
                        return Err(Error::NotFound(cleaned.clone()));
                    };
                    missing.push(name);
                    current = parent;
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Anchor `raw` and clean its `.` and `..` segments without touching the
    /// filesystem.
    fn absolute(&self, raw: &str) -> Result<PathBuf> {
        if raw.is_empty() {
            return Err(Error::InvalidArgument("path must not be empty".into()));
        }
        if raw.contains('\0') {
            return Err(Error::InvalidArgument("path contains null byte".into()));
        }

        let raw = Path::new(raw);
        let absolute = if raw.is_absolute() {
            raw.to_path_buf()
        } else {
            self.dirs[0].join(raw)
        };
        Ok(normalize(&absolute))
    }

    fn check(&self, cleaned: &Path) -> Result<PathBuf> {
        let resolved = match resolve(cleaned, MAX_SYMLINK_HOPS) {
            Ok(resolved) => resolved,
            Err(Error::NotFound(missing)) => return Err(self.classify_missing(missing)),
            Err(e) => return Err(e),
        };
        if !self.contains(&resolved) {
            tracing::warn!(path = %resolved.display(), "rejected path outside allowed directories");
            return Err(Error::PathEscape(resolved));
        }
        tracing::debug!(path = %resolved.display(), "resolved path");
        Ok(resolved)
    }

    /// A missing path is only `NotFound` when its nearest existing ancestor
    /// resolves inside an allowed directory.
    fn classify_missing(&self, missing: PathBuf) -> Error {
        let anchor = missing.ancestors().find_map(|dir| dir.canonicalize().ok());
        match anchor {
            Some(anchor) if self.contains(&anchor) => Error::NotFound(missing),
            _ => {
                tracing::warn!(path = %missing.display(), "rejected path outside allowed directories");
                Error::PathEscape(missing)
            }
        }
    }
}

/// Lexically remove `.` and `..` components from an absolute path.
///
/// A `..` at the filesystem root is dropped.
pub fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::Prefix(_) | Component::RootDir => out.push(component.as_os_str()),
            Component::CurDir => {}
            Component::ParentDir => {
                out.pop();
            }
            Component::Normal(part) => out.push(part),
        }
    }
    out
}

/// Resolve `path` to a symlink-free absolute path.
fn resolve(path: &Path, hops: u8) -> Result<PathBuf> {
    match std::fs::symlink_metadata(path) {
        Ok(meta) => match path.canonicalize() {
            Ok(canonical) => Ok(canonical),
            Err(e) if meta.is_symlink() && e.kind() == io::ErrorKind::NotFound => {
                if hops == 0 {
                    return Err(Error::InvalidArgument(format!(
                        "too many levels of symbolic links: {}",
                        path.display()
                    )));
                }
                let target = std::fs::read_link(path).map_err(Error::with("readlink", path))?;
                let target = match path.parent() {
                    Some(parent) if target.is_relative() => parent.join(target),
                    _ => target,
                };
                resolve(&normalize(&target), hops - 1)
            }
            Err(e) => Err(Error::io("resolve", path, e)),
        },
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            let (Some(parent), Some(file_name)) = (path.parent(), path.file_name()) else {
                return Err(Error::NotFound(path.to_path_buf()));
            };
            let canon_parent = parent
                .canonicalize()
                .map_err(Error::with("resolve", parent))?;
            if !canon_parent.is_dir() {
                return Err(Error::NotADirectory(canon_parent));
            }
            Ok(canon_parent.join(file_name))
        }
        Err(e) => Err(Error::io("stat", path, e)),
    }
}

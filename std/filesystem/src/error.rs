//! Error taxonomy shared by every filesystem operation.

use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Errors returned by path validation and filesystem operations.
#[derive(Error, Debug)]
pub enum Error {
    /// The resolved path is outside every allowed directory.
    #[error("access denied: {0} is outside the allowed directories")]
    PathEscape(PathBuf),
    #[error("no such file or directory: {0}")]
    NotFound(PathBuf),
    #[error("permission denied: {0}")]
    PermissionDenied(PathBuf),
    #[error("destination already exists: {0}")]
    AlreadyExists(PathBuf),
    /// Non-recursive delete of a populated directory.
    #[error("directory not empty: {0} (set recursive to delete it)")]
    NotEmpty(PathBuf),
    #[error("not a directory: {0}")]
    NotADirectory(PathBuf),
    /// File content is not valid UTF-8 text.
    #[error("not a text file: {0}")]
    NotText(PathBuf),
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    /// The request was cancelled before the operation finished.
    #[error("operation cancelled")]
    Cancelled,
    #[error("{op} {}: {source}", path.display())]
    Io {
        op: &'static str,
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Result alias for filesystem operations.
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Classify an I/O error raised by `op` on `path`.
    pub fn io(op: &'static str, path: impl AsRef<Path>, source: io::Error) -> Self {
        let path = path.as_ref().to_path_buf();
        match source.kind() {
            io::ErrorKind::NotFound => Error::NotFound(path),
            io::ErrorKind::PermissionDenied => Error::PermissionDenied(path),
            io::ErrorKind::AlreadyExists => Error::AlreadyExists(path),
            io::ErrorKind::DirectoryNotEmpty => Error::NotEmpty(path),
            io::ErrorKind::NotADirectory => Error::NotADirectory(path),
            _ => Error::Io { op, path, source },
        }
    }

    /// Build a closure for `map_err` that classifies errors on `path`.
    pub(crate) fn with<'a>(
        op: &'static str,
        path: &'a Path,
    ) -> impl FnOnce(io::Error) -> Self + 'a {
        move |e| Error::io(op, path, e)
    }
}

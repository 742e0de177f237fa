//! Find-and-replace editing of text files.

use crate::error::{Error, Result};
use crate::ops;
use regex::Regex;
use serde::Serialize;
use std::io::Write;
use std::path::{Path, PathBuf};

/// How `find` is interpreted and how many matches are replaced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ModifyMode {
    pub regex: bool,
    pub all_occurrences: bool,
}

impl Default for ModifyMode {
    fn default() -> Self {
        Self {
            regex: false,
            all_occurrences: true,
        }
    }
}

/// Result of [`modify_file`].
#[derive(Debug, Serialize)]
pub struct ModifyOutcome {
    pub path: String,
    pub replacements: usize,
    pub mode: ModifyMode,
}

/// Replace `find` with `replace` in the file at `path`.
///
/// In regex mode `replace` may reference capture groups (`$1`, `${name}`).
/// Zero matches leave the file untouched. Otherwise the new content is
/// written to a temporary file next to the target and renamed over it, so
/// readers see either the old or the new content in full.
pub async fn modify_file(
    path: &Path,
    find: &str,
    replace: &str,
    mode: ModifyMode,
) -> Result<ModifyOutcome> {
    if find.is_empty() {
        return Err(Error::InvalidArgument("find must not be empty".into()));
    }
    let original = ops::read_file(path).await?;
    let (updated, replacements) = if mode.regex {
        let re = Regex::new(find)
            .map_err(|e| Error::InvalidArgument(format!("invalid regex {find:?}: {e}")))?;
        replace_regex(&re, &original, replace, mode.all_occurrences)
    } else {
        replace_literal(&original, find, replace, mode.all_occurrences)
    };

    if replacements > 0 {
        write_atomic(path.to_path_buf(), updated).await?;
    }
    tracing::debug!(path = %path.display(), replacements, "modified file");
    Ok(ModifyOutcome {
        path: path.display().to_string(),
        replacements,
        mode,
    })
}

fn replace_literal(content: &str, find: &str, replace: &str, all: bool) -> (String, usize) {
    let count = content.matches(find).count();
    if count == 0 {
        (content.to_string(), 0)
    } else if all {
        (content.replace(find, replace), count)
    } else {
        (content.replacen(find, replace, 1), 1)
    }
}

fn replace_regex(re: &Regex, content: &str, replace: &str, all: bool) -> (String, usize) {
    let count = re.find_iter(content).count();
    if count == 0 {
        (content.to_string(), 0)
    } else if all {
        (re.replace_all(content, replace).into_owned(), count)
    } else {
        (re.replacen(content, 1, replace).into_owned(), 1)
    }
}

/// Write `content` to a sibling temp file, keep the target's permissions,
/// flush to disk and rename over `path`.
async fn write_atomic(path: PathBuf, content: String) -> Result<()> {
    let target = path.clone();
    tokio::task::spawn_blocking(move || -> Result<()> {
        let parent = path
            .parent()
            .ok_or_else(|| Error::InvalidArgument(format!("{} has no parent", path.display())))?;
        let permissions = std::fs::metadata(&path).ok().map(|m| m.permissions());

        let mut temp = tempfile::NamedTempFile::new_in(parent)
            .map_err(Error::with("create temp file in", parent))?;
        temp.write_all(content.as_bytes())
            .map_err(Error::with("write", temp.path()))?;
        if let Some(permissions) = permissions {
            temp.as_file()
                .set_permissions(permissions)
                .map_err(Error::with("set permissions", temp.path()))?;
        }
        temp.as_file()
            .sync_all()
            .map_err(Error::with("sync", temp.path()))?;
        temp.persist(&path)
            .map_err(|e| Error::io("replace", &path, e.error))?;
        Ok(())
    })
    .await
    .map_err(|e| Error::io("write", &target, std::io::Error::other(e)))?
}

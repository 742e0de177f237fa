//! Primitive single-entry filesystem operations.
//!
//! Every function here takes paths that were already resolved by
//! [`AllowedRoots::validate`](crate::validate::AllowedRoots::validate).

use crate::error::{Error, Result};
use serde::Serialize;
use std::future::Future;
use std::io;
use std::path::Path;
use std::pin::Pin;
use std::time::SystemTime;

/// File metadata returned by `get_file_info` and `list_directory`.
#[derive(Debug, Clone, Serialize)]
pub struct FileInfo {
    pub name: String,
    pub path: String,
    pub size: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub modified: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created: Option<String>,
    pub is_dir: bool,
    pub is_file: bool,
    pub is_symlink: bool,
    /// Permission bits in octal, e.g. `100644`.
    #[cfg(unix)]
    pub mode: String,
}

impl FileInfo {
    pub fn from_metadata(path: &Path, meta: &std::fs::Metadata) -> Self {
        Self {
            name: display_name(path),
            path: path.display().to_string(),
            size: meta.len(),
            modified: meta.modified().ok().and_then(rfc3339),
            created: meta.created().ok().and_then(rfc3339),
            is_dir: meta.is_dir(),
            is_file: meta.is_file(),
            is_symlink: meta.is_symlink(),
            #[cfg(unix)]
            mode: {
                use std::os::unix::fs::PermissionsExt;
                format!("{:o}", meta.permissions().mode())
            },
        }
    }
}

/// Final component of `path`, or the whole path for `/`.
pub(crate) fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.to_string_lossy().into_owned())
}

pub(crate) fn rfc3339(time: SystemTime) -> Option<String> {
    let d = time.duration_since(std::time::UNIX_EPOCH).ok()?;
    chrono::DateTime::from_timestamp(d.as_secs() as i64, d.subsec_nanos()).map(|dt| dt.to_rfc3339())
}

/// Read a UTF-8 text file.
pub async fn read_file(path: &Path) -> Result<String> {
    let bytes = tokio::fs::read(path).await.map_err(Error::with("read", path))?;
    String::from_utf8(bytes).map_err(|_| Error::NotText(path.to_path_buf()))
}

/// Create or overwrite a file. Parent directories are not created.
pub async fn write_file(path: &Path, content: &str) -> Result<()> {
    tokio::fs::write(path, content)
        .await
        .map_err(Error::with("write", path))
}

/// Create a directory and any missing parents. Succeeds if it already exists.
pub async fn create_directory(path: &Path) -> Result<()> {
    tokio::fs::create_dir_all(path)
        .await
        .map_err(Error::with("create directory", path))
}

/// List the immediate entries of a directory, sorted by name.
pub async fn list_directory(path: &Path) -> Result<Vec<FileInfo>> {
    let meta = tokio::fs::metadata(path)
        .await
        .map_err(Error::with("stat", path))?;
    if !meta.is_dir() {
        return Err(Error::NotADirectory(path.to_path_buf()));
    }

    let mut entries = Vec::new();
    let mut read_dir = tokio::fs::read_dir(path)
        .await
        .map_err(Error::with("list", path))?;
    while let Some(entry) = read_dir
        .next_entry()
        .await
        .map_err(Error::with("list", path))?
    {
        let child = entry.path();
        match tokio::fs::symlink_metadata(&child).await {
            Ok(meta) => entries.push(FileInfo::from_metadata(&child, &meta)),
            Err(e) => tracing::warn!(path = %child.display(), error = %e, "skipping unreadable entry"),
        }
    }
    entries.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(entries)
}

/// Metadata of the entry itself (symlinks are not followed).
pub async fn file_info(path: &Path) -> Result<FileInfo> {
    let meta = tokio::fs::symlink_metadata(path)
        .await
        .map_err(Error::with("stat", path))?;
    Ok(FileInfo::from_metadata(path, &meta))
}

/// Delete a file, symlink, or directory.
///
/// A populated directory is only removed when `recursive` is set; otherwise
/// the call fails with [`Error::NotEmpty`] and nothing is touched.
pub async fn delete(path: &Path, recursive: bool) -> Result<()> {
    let meta = tokio::fs::symlink_metadata(path)
        .await
        .map_err(Error::with("stat", path))?;
    if !meta.is_dir() {
        return tokio::fs::remove_file(path)
            .await
            .map_err(Error::with("delete", path));
    }
    if recursive {
        tokio::fs::remove_dir_all(path)
            .await
            .map_err(Error::with("delete", path))
    } else {
        tokio::fs::remove_dir(path)
            .await
            .map_err(Error::with("delete", path))
    }
}

/// Copy a file or a whole directory tree to a destination that must not exist.
///
/// A copy that fails partway leaves no destination behind.
pub async fn copy(src: &Path, dst: &Path) -> Result<()> {
    let meta = tokio::fs::symlink_metadata(src)
        .await
        .map_err(Error::with("stat", src))?;
    ensure_absent(dst).await?;
    if meta.is_dir() && dst.starts_with(src) {
        return Err(Error::InvalidArgument(format!(
            "cannot copy {} into itself",
            src.display()
        )));
    }
    copy_or_clean(src, dst).await
}

/// Move or rename a file or directory to a destination that must not exist.
///
/// Falls back to [`move_by_copy`] when source and destination live on
/// different filesystems.
pub async fn move_path(src: &Path, dst: &Path) -> Result<()> {
    let meta = tokio::fs::symlink_metadata(src)
        .await
        .map_err(Error::with("stat", src))?;
    ensure_absent(dst).await?;
    if meta.is_dir() && dst.starts_with(src) {
        return Err(Error::InvalidArgument(format!(
            "cannot move {} into itself",
            src.display()
        )));
    }

    match tokio::fs::rename(src, dst).await {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::CrossesDevices => {
            tracing::debug!(src = %src.display(), dst = %dst.display(), "rename crosses devices, copying");
            move_by_copy(src, dst).await
        }
        Err(e) => Err(Error::io("move", src, e)),
    }
}

/// Copy `src` to `dst`, then delete `src`. If the source cannot be deleted
/// the copy is removed again, so a failed move leaves only the source.
async fn move_by_copy(src: &Path, dst: &Path) -> Result<()> {
    copy_or_clean(src, dst).await?;
    if let Err(e) = delete(src, true).await {
        remove_partial(dst).await;
        return Err(e);
    }
    Ok(())
}

/// Copy `src` to `dst`, removing whatever was written if the copy fails.
async fn copy_or_clean(src: &Path, dst: &Path) -> Result<()> {
    if let Err(e) = copy_tree(src, dst).await {
        remove_partial(dst).await;
        return Err(e);
    }
    Ok(())
}

async fn remove_partial(dst: &Path) {
    match delete(dst, true).await {
        Ok(()) | Err(Error::NotFound(_)) => {}
        Err(e) => tracing::warn!(path = %dst.display(), error = %e, "failed to remove partial copy"),
    }
}

async fn ensure_absent(path: &Path) -> Result<()> {
    match tokio::fs::symlink_metadata(path).await {
        Ok(_) => Err(Error::AlreadyExists(path.to_path_buf())),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(Error::io("stat", path, e)),
    }
}

/// Recursively copy `src` to `dst`. Symlinks are recreated, never followed.
fn copy_tree<'a>(
    src: &'a Path,
    dst: &'a Path,
) -> Pin<Box<dyn Future<Output = Result<()>> + Send + 'a>> {
    Box::pin(async move {
        let meta = tokio::fs::symlink_metadata(src)
            .await
            .map_err(Error::with("stat", src))?;

        if meta.is_symlink() {
            return copy_symlink(src, dst).await;
        }
        if !meta.is_dir() {
            tokio::fs::copy(src, dst)
                .await
                .map_err(Error::with("copy", src))?;
            return Ok(());
        }

        tokio::fs::create_dir(dst)
            .await
            .map_err(Error::with("create directory", dst))?;
        let mut read_dir = tokio::fs::read_dir(src)
            .await
            .map_err(Error::with("list", src))?;
        while let Some(entry) = read_dir
            .next_entry()
            .await
            .map_err(Error::with("list", src))?
        {
            let from = entry.path();
            let to = dst.join(entry.file_name());
            copy_tree(&from, &to).await?;
        }
        Ok(())
    })
}

#[cfg(unix)]
async fn copy_symlink(src: &Path, dst: &Path) -> Result<()> {
    let target = tokio::fs::read_link(src)
        .await
        .map_err(Error::with("readlink", src))?;
    tokio::fs::symlink(&target, dst)
        .await
        .map_err(Error::with("symlink", dst))
}

#[cfg(not(unix))]
async fn copy_symlink(src: &Path, _dst: &Path) -> Result<()> {
    tracing::warn!(path = %src.display(), "skipping symlink during copy");
    Ok(())
}

#[cfg(test)]
mod tests {
    use crate::error::Error;
    use crate::ops;
    use std::fs;
    use tempfile::TempDir;

    #[tokio::test]
    async fn write_then_read() {
        let tmp = TempDir::new().unwrap();
        let file = tmp.path().join("a.txt");
        ops::write_file(&file, "hi").await.unwrap();
        assert_eq!(ops::read_file(&file).await.unwrap(), "hi");
        ops::write_file(&file, "bye").await.unwrap();
        assert_eq!(ops::read_file(&file).await.unwrap(), "bye");
    }

    #[tokio::test]
    async fn write_does_not_create_parents() {
        let tmp = TempDir::new().unwrap();
        let file = tmp.path().join("missing/a.txt");
        let err = ops::write_file(&file, "hi").await.unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
    }

    #[tokio::test]
    async fn read_rejects_binary() {
        let tmp = TempDir::new().unwrap();
        let file = tmp.path().join("blob.bin");
        fs::write(&file, [0xff, 0xfe, 0x00, 0x01]).unwrap();
        assert!(matches!(
            ops::read_file(&file).await,
            Err(Error::NotText(_))
        ));
    }

    #[tokio::test]
    async fn create_directory_is_idempotent() {
        let tmp = TempDir::new().unwrap();
        let dir = tmp.path().join("a/b/c");
        ops::create_directory(&dir).await.unwrap();
        ops::create_directory(&dir).await.unwrap();
        assert!(dir.is_dir());
    }

    #[tokio::test]
    async fn list_directory_sorted_one_level() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join("b.txt"), "b").unwrap();
        fs::write(tmp.path().join("a.txt"), "aa").unwrap();
        fs::create_dir_all(tmp.path().join("sub/deep")).unwrap();

        let entries = ops::list_directory(tmp.path()).await.unwrap();
        let names: Vec<_> = entries.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, ["a.txt", "b.txt", "sub"]);
        assert_eq!(entries[0].size, 2);
        assert!(entries[2].is_dir);
    }

    #[tokio::test]
    async fn list_directory_rejects_file() {
        let tmp = TempDir::new().unwrap();
        let file = tmp.path().join("a.txt");
        fs::write(&file, "a").unwrap();
        assert!(matches!(
            ops::list_directory(&file).await,
            Err(Error::NotADirectory(_))
        ));
    }

    #[tokio::test]
    async fn file_info_reports_metadata() {
        let tmp = TempDir::new().unwrap();
        let file = tmp.path().join("a.txt");
        fs::write(&file, "hello").unwrap();
        let info = ops::file_info(&file).await.unwrap();
        assert_eq!(info.name, "a.txt");
        assert_eq!(info.size, 5);
        assert!(info.is_file && !info.is_dir);
        assert!(info.modified.is_some());
    }

    #[tokio::test]
    async fn delete_non_recursive_keeps_populated_dir() {
        let tmp = TempDir::new().unwrap();
        let dir = tmp.path().join("full");
        fs::create_dir(&dir).unwrap();
        fs::write(dir.join("x.txt"), "x").unwrap();

        let err = ops::delete(&dir, false).await.unwrap_err();
        assert!(matches!(err, Error::NotEmpty(_)));
        assert!(dir.join("x.txt").exists());

        ops::delete(&dir, true).await.unwrap();
        assert!(!dir.exists());
    }

    #[tokio::test]
    async fn delete_file_and_empty_dir() {
        let tmp = TempDir::new().unwrap();
        let file = tmp.path().join("a.txt");
        let dir = tmp.path().join("empty");
        fs::write(&file, "a").unwrap();
        fs::create_dir(&dir).unwrap();
        ops::delete(&file, false).await.unwrap();
        ops::delete(&dir, false).await.unwrap();
        assert!(!file.exists() && !dir.exists());
        assert!(matches!(
            ops::delete(&file, false).await,
            Err(Error::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn copy_tree_preserves_structure() {
        let tmp = TempDir::new().unwrap();
        let src = tmp.path().join("src");
        fs::create_dir_all(src.join("nested")).unwrap();
        fs::write(src.join("top.txt"), "top").unwrap();
        fs::write(src.join("nested/inner.txt"), "inner").unwrap();

        let dst = tmp.path().join("dst");
        ops::copy(&src, &dst).await.unwrap();
        assert_eq!(fs::read_to_string(dst.join("top.txt")).unwrap(), "top");
        assert_eq!(
            fs::read_to_string(dst.join("nested/inner.txt")).unwrap(),
            "inner"
        );
        assert!(src.join("top.txt").exists());
    }

    #[tokio::test]
    async fn copy_rejects_existing_destination() {
        let tmp = TempDir::new().unwrap();
        let src = tmp.path().join("a.txt");
        let dst = tmp.path().join("b.txt");
        fs::write(&src, "new").unwrap();
        fs::write(&dst, "old").unwrap();
        assert!(matches!(
            ops::copy(&src, &dst).await,
            Err(Error::AlreadyExists(_))
        ));
        assert_eq!(fs::read_to_string(&dst).unwrap(), "old");
    }

    #[tokio::test]
    async fn copy_rejects_into_own_subtree() {
        let tmp = TempDir::new().unwrap();
        let src = tmp.path().join("src");
        fs::create_dir(&src).unwrap();
        assert!(matches!(
            ops::copy(&src, &src.join("inner")).await,
            Err(Error::InvalidArgument(_))
        ));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn copy_recreates_symlinks() {
        let tmp = TempDir::new().unwrap();
        let src = tmp.path().join("src");
        fs::create_dir(&src).unwrap();
        std::os::unix::fs::symlink("/etc/passwd", src.join("link")).unwrap();

        let dst = tmp.path().join("dst");
        ops::copy(&src, &dst).await.unwrap();
        let copied = dst.join("link");
        assert!(fs::symlink_metadata(&copied).unwrap().is_symlink());
        assert_eq!(
            fs::read_link(&copied).unwrap(),
            std::path::Path::new("/etc/passwd")
        );
    }

    #[tokio::test]
    async fn move_renames_and_rejects_collisions() {
        let tmp = TempDir::new().unwrap();
        let src = tmp.path().join("a.txt");
        let dst = tmp.path().join("b.txt");
        fs::write(&src, "a").unwrap();
        ops::move_path(&src, &dst).await.unwrap();
        assert!(!src.exists());
        assert_eq!(fs::read_to_string(&dst).unwrap(), "a");

        fs::write(&src, "again").unwrap();
        assert!(matches!(
            ops::move_path(&src, &dst).await,
            Err(Error::AlreadyExists(_))
        ));
        assert_eq!(fs::read_to_string(&dst).unwrap(), "a");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn failed_copy_leaves_no_destination() {
        let tmp = TempDir::new().unwrap();
        let src = tmp.path().join("src");
        fs::create_dir(&src).unwrap();
        fs::write(src.join("a.txt"), "a").unwrap();
        // opening a socket for reading fails with ENXIO
        let _listener = std::os::unix::net::UnixListener::bind(src.join("sock")).unwrap();

        let dst = tmp.path().join("dst");
        assert!(ops::copy(&src, &dst).await.is_err());
        assert!(!dst.exists());
        assert!(src.join("a.txt").exists());
    }

    #[tokio::test]
    async fn move_by_copy_transfers_tree() {
        let tmp = TempDir::new().unwrap();
        let src = tmp.path().join("src");
        fs::create_dir_all(src.join("nested")).unwrap();
        fs::write(src.join("nested/a.txt"), "a").unwrap();

        let dst = tmp.path().join("dst");
        ops::move_by_copy(&src, &dst).await.unwrap();
        assert!(!src.exists());
        assert_eq!(fs::read_to_string(dst.join("nested/a.txt")).unwrap(), "a");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn move_by_copy_rolls_back_when_source_is_kept() {
        use std::os::unix::fs::PermissionsExt;

        let tmp = TempDir::new().unwrap();
        let locked = tmp.path().join("locked");
        fs::create_dir(&locked).unwrap();
        let src = locked.join("a.txt");
        fs::write(&src, "a").unwrap();
        fs::set_permissions(&locked, fs::Permissions::from_mode(0o555)).unwrap();
        if fs::write(locked.join("write_check"), "").is_ok() {
            // permissions are not enforced for this user (root)
            fs::set_permissions(&locked, fs::Permissions::from_mode(0o755)).unwrap();
            return;
        }

        let dst = tmp.path().join("b.txt");
        let err = ops::move_by_copy(&src, &dst).await.unwrap_err();
        fs::set_permissions(&locked, fs::Permissions::from_mode(0o755)).unwrap();
        assert!(matches!(err, Error::PermissionDenied(_)));
        assert!(!dst.exists());
        assert_eq!(fs::read_to_string(&src).unwrap(), "a");
    }
}

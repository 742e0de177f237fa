//! Recursive traversals: directory trees, filename search and content search.
//!
//! Each traversal checks the request's [`CancellationToken`] once per entry
//! so a client-side timeout aborts long scans with [`Error::Cancelled`].

use crate::error::{Error, Result};
use crate::ops::{display_name, rfc3339};
use crate::validate::AllowedRoots;
use serde::Serialize;
use std::collections::HashSet;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio_util::sync::CancellationToken;

/// Default depth for [`tree`].
pub const DEFAULT_TREE_DEPTH: usize = 3;

/// Default cap for [`search_within_files`].
pub const DEFAULT_MAX_RESULTS: usize = 1000;

/// Size of the leading sample inspected by the binary heuristic.
const BINARY_SAMPLE: usize = 8 * 1024;

/// Longest snippet returned for a content match, in characters.
const MAX_SNIPPET_CHARS: usize = 256;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeKind {
    File,
    Directory,
    Symlink,
}

/// A node in the directory tree.
#[derive(Debug, Serialize)]
pub struct TreeNode {
    pub name: String,
    pub path: String,
    #[serde(rename = "type")]
    pub kind: NodeKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub modified: Option<String>,
    /// Present only for directories that were expanded.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub children: Option<Vec<TreeNode>>,
}

/// One matching line found by [`search_within_files`].
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct ContentMatch {
    pub path: String,
    /// 1-based line number.
    pub line: usize,
    pub text: String,
}

/// Result of [`search_within_files`].
#[derive(Debug, Serialize)]
pub struct ContentSearch {
    pub matches: Vec<ContentMatch>,
    /// More than `max_results` matches exist; only the first `max_results`
    /// are reported.
    pub limit_reached: bool,
}

/// Build a tree rooted at `path`, expanding at most `depth` levels below it.
///
/// Depth 0 returns the root alone. With `follow_symlinks`, links to
/// directories inside the allowed roots are expanded; a link whose target was
/// already expanded during this call is reported as a leaf.
pub async fn tree(
    roots: &AllowedRoots,
    path: &Path,
    depth: usize,
    follow_symlinks: bool,
    ct: &CancellationToken,
) -> Result<TreeNode> {
    let mut walk = TreeWalk {
        roots,
        max_depth: depth,
        follow_symlinks,
        visited: HashSet::new(),
        ct,
    };
    walk.node(path, 0).await
}

struct TreeWalk<'a> {
    roots: &'a AllowedRoots,
    max_depth: usize,
    follow_symlinks: bool,
    /// Real paths of directories expanded so far in this call.
    visited: HashSet<PathBuf>,
    ct: &'a CancellationToken,
}

impl<'a> TreeWalk<'a> {
    fn node<'s>(
        &'s mut self,
        path: &'s Path,
        level: usize,
    ) -> Pin<Box<dyn Future<Output = Result<TreeNode>> + Send + 's>> {
        Box::pin(async move {
            if self.ct.is_cancelled() {
                return Err(Error::Cancelled);
            }

            let meta = tokio::fs::symlink_metadata(path)
                .await
                .map_err(Error::with("stat", path))?;
            let mut node = TreeNode {
                name: display_name(path),
                path: path.display().to_string(),
                kind: NodeKind::File,
                size: None,
                modified: meta.modified().ok().and_then(rfc3339),
                children: None,
            };

            let dir = if meta.is_symlink() {
                node.kind = NodeKind::Symlink;
                if !self.follow_symlinks {
                    return Ok(node);
                }
                let Ok(real) = tokio::fs::canonicalize(path).await else {
                    return Ok(node);
                };
                if !self.roots.contains(&real) {
                    tracing::warn!(link = %path.display(), target = %real.display(), "not following symlink outside allowed directories");
                    return Ok(node);
                }
                let target = tokio::fs::metadata(&real)
                    .await
                    .map_err(Error::with("stat", &real))?;
                if !target.is_dir() {
                    node.size = Some(target.len());
                    return Ok(node);
                }
                real
            } else if meta.is_dir() {
                node.kind = NodeKind::Directory;
                path.to_path_buf()
            } else {
                node.size = Some(meta.len());
                return Ok(node);
            };

            if level >= self.max_depth {
                return Ok(node);
            }
            // only a link can close a cycle; real directories always expand
            if !self.visited.insert(dir.clone()) && meta.is_symlink() {
                return Ok(node);
            }

            let mut children = Vec::new();
            for child in sorted_entries(&dir).await? {
                match self.node(&child, level + 1).await {
                    Ok(c) => children.push(c),
                    Err(Error::Cancelled) => return Err(Error::Cancelled),
                    // skip inaccessible entries
                    Err(e) => tracing::debug!(path = %child.display(), error = %e, "skipping entry"),
                }
            }
            node.children = Some(children);
            Ok(node)
        })
    }
}

/// Recursively find entries under `root` whose name matches a glob pattern.
///
/// `*` and `?` wildcards apply to the entry name, not its path. Both files
/// and directories are returned, depth-first in lexical order. Symlinks are
/// matched by name but never descended into.
pub async fn search_files(
    root: &Path,
    pattern: &str,
    ct: &CancellationToken,
) -> Result<Vec<PathBuf>> {
    let pattern = glob::Pattern::new(pattern)
        .map_err(|e| Error::InvalidArgument(format!("invalid pattern {pattern:?}: {e}")))?;
    ensure_dir(root).await?;

    let mut matches = Vec::new();
    let mut stack = sorted_entries(root).await?;
    stack.reverse();
    while let Some(path) = stack.pop() {
        if ct.is_cancelled() {
            return Err(Error::Cancelled);
        }
        if pattern.matches(&display_name(&path)) {
            matches.push(path.clone());
        }
        let Ok(meta) = tokio::fs::symlink_metadata(&path).await else {
            continue;
        };
        if meta.is_dir() {
            push_children(&mut stack, &path).await;
        }
    }
    Ok(matches)
}

/// Search text files under `root` for lines containing `substring`.
///
/// `depth` bounds how many directory levels below `root` are entered
/// (`None` is unlimited, `Some(0)` scans only `root`'s own files). Binary
/// files are skipped. Scanning stops at the first match beyond
/// `max_results`, which sets `limit_reached`.
pub async fn search_within_files(
    root: &Path,
    substring: &str,
    depth: Option<usize>,
    max_results: usize,
    ct: &CancellationToken,
) -> Result<ContentSearch> {
    if substring.is_empty() {
        return Err(Error::InvalidArgument("substring must not be empty".into()));
    }
    let max_results = if max_results == 0 {
        DEFAULT_MAX_RESULTS
    } else {
        max_results
    };
    ensure_dir(root).await?;

    let mut found = ContentSearch {
        matches: Vec::new(),
        limit_reached: false,
    };
    let mut stack: Vec<(PathBuf, usize)> = sorted_entries(root)
        .await?
        .into_iter()
        .rev()
        .map(|p| (p, 0))
        .collect();

    while let Some((path, level)) = stack.pop() {
        if ct.is_cancelled() {
            return Err(Error::Cancelled);
        }
        let Ok(meta) = tokio::fs::symlink_metadata(&path).await else {
            continue;
        };
        if meta.is_dir() {
            if depth.is_none_or(|d| level < d) {
                let mut children = Vec::new();
                push_children(&mut children, &path).await;
                stack.extend(children.into_iter().map(|c| (c, level + 1)));
            }
            continue;
        }
        if !meta.is_file() {
            continue;
        }

        // one match past the cap proves the result was truncated
        let remaining = max_results - found.matches.len();
        match scan_file(&path, substring, remaining + 1).await {
            Ok(mut matches) if matches.len() > remaining => {
                matches.truncate(remaining);
                found.matches.extend(matches);
                found.limit_reached = true;
                break;
            }
            Ok(matches) => found.matches.extend(matches),
            Err(e) => tracing::debug!(path = %path.display(), error = %e, "skipping file"),
        }
    }
    Ok(found)
}

/// Scan one file line by line, returning at most `limit` matches.
async fn scan_file(path: &Path, substring: &str, limit: usize) -> Result<Vec<ContentMatch>> {
    let file = tokio::fs::File::open(path)
        .await
        .map_err(Error::with("open", path))?;
    let mut reader = BufReader::with_capacity(BINARY_SAMPLE, file);
    let sample = reader.fill_buf().await.map_err(Error::with("read", path))?;
    if is_binary(sample) {
        return Ok(Vec::new());
    }

    let mut matches = Vec::new();
    let mut lines = reader.lines();
    let mut number = 0;
    while matches.len() < limit {
        let line = match lines.next_line().await {
            Ok(Some(line)) => line,
            Ok(None) => break,
            // invalid UTF-8 past the sample
            Err(_) => break,
        };
        number += 1;
        if line.contains(substring) {
            matches.push(ContentMatch {
                path: path.display().to_string(),
                line: number,
                text: snippet(&line),
            });
        }
    }
    Ok(matches)
}

/// NUL byte or invalid UTF-8 within the sample marks a file as binary.
///
/// A multi-byte sequence cut off by the end of the sample is not invalid.
pub fn is_binary(sample: &[u8]) -> bool {
    if sample.contains(&0) {
        return true;
    }
    match std::str::from_utf8(sample) {
        Ok(_) => false,
        Err(e) => e.error_len().is_some(),
    }
}

fn snippet(line: &str) -> String {
    let trimmed = line.trim();
    match trimmed.char_indices().nth(MAX_SNIPPET_CHARS) {
        Some((idx, _)) => trimmed[..idx].to_string(),
        None => trimmed.to_string(),
    }
}

async fn ensure_dir(path: &Path) -> Result<()> {
    let meta = tokio::fs::metadata(path)
        .await
        .map_err(Error::with("stat", path))?;
    if meta.is_dir() {
        Ok(())
    } else {
        Err(Error::NotADirectory(path.to_path_buf()))
    }
}

/// Entries of `dir` sorted by file name.
async fn sorted_entries(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut read_dir = tokio::fs::read_dir(dir)
        .await
        .map_err(Error::with("list", dir))?;
    let mut entries = Vec::new();
    while let Some(entry) = read_dir
        .next_entry()
        .await
        .map_err(Error::with("list", dir))?
    {
        entries.push(entry.path());
    }
    entries.sort();
    Ok(entries)
}

/// Push the children of `dir` so they pop in lexical order.
async fn push_children(stack: &mut Vec<PathBuf>, dir: &Path) {
    match sorted_entries(dir).await {
        Ok(children) => stack.extend(children.into_iter().rev()),
        Err(e) => tracing::debug!(path = %dir.display(), error = %e, "skipping directory"),
    }
}

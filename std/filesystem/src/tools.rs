//! Tool implementations for the filesystem MCP server.

use crate::FilesystemServer;
use crate::config::ToolFilter;
use crate::error::Error;
use crate::modify::{self, ModifyMode};
use crate::ops;
use crate::traverse::{self, DEFAULT_MAX_RESULTS, DEFAULT_TREE_DEPTH};
use crate::validate::AllowedRoots;
use rmcp::{
    RoleServer,
    handler::server::wrapper::Parameters,
    schemars::{self, JsonSchema},
    service::RequestContext,
    tool, tool_router,
};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tokio_util::sync::CancellationToken;

/// Parameters for reading a single file.
#[derive(Debug, Deserialize, JsonSchema)]
pub struct ReadFileParams {
    /// Path to the file to read.
    pub path: String,
}

/// Parameters for reading multiple files.
#[derive(Debug, Deserialize, JsonSchema)]
pub struct ReadMultipleFilesParams {
    /// Paths to the files to read.
    pub paths: Vec<String>,
}

/// Parameters for writing a file.
#[derive(Debug, Deserialize, JsonSchema)]
pub struct WriteFileParams {
    /// Path where to write the file.
    pub path: String,
    /// Content to write to the file.
    pub content: String,
}

/// Parameters for listing a directory.
#[derive(Debug, Deserialize, JsonSchema)]
pub struct ListDirectoryParams {
    /// Path of the directory to list.
    pub path: String,
}

/// Parameters for creating a directory.
#[derive(Debug, Deserialize, JsonSchema)]
pub struct CreateDirectoryParams {
    /// Path of the directory to create.
    pub path: String,
}

/// Parameters for copying or moving a file or directory.
#[derive(Debug, Deserialize, JsonSchema)]
pub struct TransferParams {
    /// Source path of the file or directory.
    pub source: String,
    /// Destination path. Must not exist yet.
    pub destination: String,
}

/// Parameters for searching file names.
#[derive(Debug, Deserialize, JsonSchema)]
pub struct SearchFilesParams {
    /// Starting directory for the search.
    pub path: String,
    /// Wildcard pattern matched against entry names (e.g. "*.rs", "data_??.csv").
    pub pattern: String,
}

/// Parameters for getting file info.
#[derive(Debug, Deserialize, JsonSchema)]
pub struct GetFileInfoParams {
    /// Path to the file or directory.
    pub path: String,
}

/// Parameters for rendering a directory tree.
#[derive(Debug, Deserialize, JsonSchema)]
pub struct TreeParams {
    /// Path of the directory to traverse.
    pub path: String,
    /// Maximum depth to traverse (default: 3).
    pub depth: Option<usize>,
    /// Whether to follow symbolic links (default: false).
    pub follow_symlinks: Option<bool>,
}

/// Parameters for deleting a file or directory.
#[derive(Debug, Deserialize, JsonSchema)]
pub struct DeleteFileParams {
    /// Path to the file or directory to delete.
    pub path: String,
    /// Whether to recursively delete directories (default: false).
    pub recursive: Option<bool>,
}

/// Parameters for find-and-replace editing.
#[derive(Debug, Deserialize, JsonSchema)]
pub struct ModifyFileParams {
    /// Path to the file to modify.
    pub path: String,
    /// Text to search for (exact match or regex pattern).
    pub find: String,
    /// Text to replace with. In regex mode `$1` refers to capture groups.
    pub replace: String,
    /// Replace all occurrences of the matching text (default: true).
    pub all_occurrences: Option<bool>,
    /// Treat the find pattern as a regular expression (default: false).
    pub regex: Option<bool>,
}

/// Parameters for searching file contents.
#[derive(Debug, Deserialize, JsonSchema)]
pub struct SearchWithinFilesParams {
    /// Starting directory for the search.
    pub path: String,
    /// Text to search for within file contents (case-sensitive).
    pub substring: String,
    /// Maximum directory depth to search (default: unlimited).
    pub depth: Option<usize>,
    /// Maximum number of results to return (default: 1000).
    pub max_results: Option<usize>,
}

/// Result entry for reading multiple files.
#[derive(Debug, Serialize)]
struct FileReadResult {
    path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

impl From<Error> for String {
    fn from(e: Error) -> Self {
        e.to_string()
    }
}

fn to_json<T: Serialize>(value: &T) -> Result<String, String> {
    serde_json::to_string_pretty(value).map_err(|e| e.to_string())
}

#[tool_router]
impl FilesystemServer {
    /// Create a new filesystem server exposing the tools enabled by `filter`.
    pub fn new(roots: AllowedRoots, filter: &ToolFilter) -> Self {
        let mut tool_router = Self::tool_router();
        let disabled: Vec<String> = tool_router
            .list_all()
            .into_iter()
            .map(|tool| tool.name.to_string())
            .filter(|name| !filter.is_enabled(name))
            .collect();
        for name in &disabled {
            tracing::debug!(tool = %name, "tool disabled");
            tool_router.remove_route(name);
        }
        Self { roots, tool_router }
    }

    /// Resolve a client path, refusing the allowed directories themselves.
    fn resolve_non_root(&self, raw: &str) -> Result<PathBuf, Error> {
        let path = self.roots.validate(raw)?;
        if self.roots.is_root(&path) {
            return Err(Error::InvalidArgument(format!(
                "refusing to operate on allowed directory {}",
                path.display()
            )));
        }
        Ok(path)
    }

    /// Read the complete contents of a text file.
    #[tool(description = "Read the complete contents of a file from the file system.")]
    async fn read_file(
        &self,
        Parameters(params): Parameters<ReadFileParams>,
    ) -> Result<String, String> {
        let path = self.roots.validate(&params.path)?;
        Ok(ops::read_file(&path).await?)
    }

    /// Create or overwrite a file.
    #[tool(description = "Create a new file or overwrite an existing file with new content.")]
    async fn write_file(
        &self,
        Parameters(params): Parameters<WriteFileParams>,
    ) -> Result<String, String> {
        let path = self.roots.validate(&params.path)?;
        tracing::debug!(path = %path.display(), bytes = params.content.len(), "write_file");
        ops::write_file(&path, &params.content).await?;
        Ok(format!(
            "Successfully wrote {} bytes to {}",
            params.content.len(),
            path.display()
        ))
    }

    /// List files and directories in a path.
    #[tool(
        description = "Get a detailed listing of all files and directories in a specified path."
    )]
    async fn list_directory(
        &self,
        Parameters(params): Parameters<ListDirectoryParams>,
    ) -> Result<String, String> {
        let path = self.roots.validate(&params.path)?;
        to_json(&ops::list_directory(&path).await?)
    }

    /// Create a directory and all parent directories.
    #[tool(
        description = "Create a new directory or ensure a directory exists, creating parent directories as needed."
    )]
    async fn create_directory(
        &self,
        Parameters(params): Parameters<CreateDirectoryParams>,
    ) -> Result<String, String> {
        let path = self.roots.validate_creatable(&params.path)?;
        tracing::debug!(path = %path.display(), "create_directory");
        ops::create_directory(&path).await?;
        Ok(format!("Successfully created directory {}", path.display()))
    }

    /// Copy a file or directory tree.
    #[tool(
        description = "Copy files and directories. Fails if the destination already exists."
    )]
    async fn copy_file(
        &self,
        Parameters(params): Parameters<TransferParams>,
    ) -> Result<String, String> {
        let source = self.roots.validate(&params.source)?;
        let dest = self.roots.validate(&params.destination)?;
        tracing::debug!(src = %source.display(), dst = %dest.display(), "copy_file");
        ops::copy(&source, &dest).await?;
        Ok(format!("Copied {} to {}", source.display(), dest.display()))
    }

    /// Move or rename a file or directory.
    #[tool(
        description = "Move or rename files and directories. Fails if the destination already exists."
    )]
    async fn move_file(
        &self,
        Parameters(params): Parameters<TransferParams>,
    ) -> Result<String, String> {
        let source = self.resolve_non_root(&params.source)?;
        let dest = self.roots.validate(&params.destination)?;
        tracing::debug!(src = %source.display(), dst = %dest.display(), "move_file");
        ops::move_path(&source, &dest).await?;
        Ok(format!("Moved {} to {}", source.display(), dest.display()))
    }

    /// Search for entries whose name matches a wildcard pattern.
    #[tool(
        description = "Recursively search for files and directories whose name matches a wildcard pattern (* and ?)."
    )]
    async fn search_files(
        &self,
        Parameters(params): Parameters<SearchFilesParams>,
        context: RequestContext<RoleServer>,
    ) -> Result<String, String> {
        self.search_files_with(params, &context.ct).await
    }

    /// Get detailed metadata about a file or directory.
    #[tool(description = "Retrieve detailed metadata about a file or directory.")]
    async fn get_file_info(
        &self,
        Parameters(params): Parameters<GetFileInfoParams>,
    ) -> Result<String, String> {
        let path = self.roots.validate(&params.path)?;
        to_json(&ops::file_info(&path).await?)
    }

    /// List the allowed directories this server can access.
    #[tool(description = "Returns the list of directories that this server is allowed to access.")]
    async fn list_allowed_directories(&self) -> String {
        self.roots
            .dirs()
            .iter()
            .map(|d| d.display().to_string())
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Read multiple files, reporting each file's outcome separately.
    #[tool(
        description = "Read the contents of multiple files in a single operation. A failure on one file does not stop the others."
    )]
    async fn read_multiple_files(
        &self,
        Parameters(params): Parameters<ReadMultipleFilesParams>,
    ) -> Result<String, String> {
        let mut results = Vec::with_capacity(params.paths.len());
        for p in &params.paths {
            let outcome = match self.roots.validate(p) {
                Ok(path) => ops::read_file(&path).await,
                Err(e) => Err(e),
            };
            results.push(match outcome {
                Ok(content) => FileReadResult {
                    path: p.clone(),
                    content: Some(content),
                    error: None,
                },
                Err(e) => FileReadResult {
                    path: p.clone(),
                    content: None,
                    error: Some(e.to_string()),
                },
            });
        }
        to_json(&results)
    }

    /// Get a recursive tree view of files and directories.
    #[tool(description = "Returns a hierarchical JSON representation of a directory structure.")]
    async fn tree(
        &self,
        Parameters(params): Parameters<TreeParams>,
        context: RequestContext<RoleServer>,
    ) -> Result<String, String> {
        self.tree_with(params, &context.ct).await
    }

    /// Delete a file or directory.
    #[tool(description = "Delete a file or directory from the file system.")]
    async fn delete_file(
        &self,
        Parameters(params): Parameters<DeleteFileParams>,
    ) -> Result<String, String> {
        let path = self.resolve_non_root(&params.path)?;
        let recursive = params.recursive.unwrap_or(false);
        tracing::debug!(path = %path.display(), recursive, "delete_file");
        ops::delete(&path, recursive).await?;
        Ok(format!("Successfully deleted {}", path.display()))
    }

    /// Find and replace text in a file.
    #[tool(
        description = "Update file by finding and replacing text. Provides a simple pattern matching interface without needing exact character positions."
    )]
    async fn modify_file(
        &self,
        Parameters(params): Parameters<ModifyFileParams>,
    ) -> Result<String, String> {
        let path = self.roots.validate(&params.path)?;
        let mode = ModifyMode {
            regex: params.regex.unwrap_or(false),
            all_occurrences: params.all_occurrences.unwrap_or(true),
        };
        let outcome = modify::modify_file(&path, &params.find, &params.replace, mode).await?;
        to_json(&outcome)
    }

    /// Search text file contents for a substring.
    #[tool(
        description = "Search for text within file contents. Unlike search_files which only searches file names, this tool scans the actual contents of text files for matching substrings. Binary files are automatically excluded from the search. Reports file paths and line numbers where matches are found."
    )]
    async fn search_within_files(
        &self,
        Parameters(params): Parameters<SearchWithinFilesParams>,
        context: RequestContext<RoleServer>,
    ) -> Result<String, String> {
        self.search_within_files_with(params, &context.ct).await
    }
}

impl FilesystemServer {
    async fn search_files_with(
        &self,
        params: SearchFilesParams,
        ct: &CancellationToken,
    ) -> Result<String, String> {
        let base = self.roots.validate(&params.path)?;
        let matches = traverse::search_files(&base, &params.pattern, ct).await?;
        if matches.is_empty() {
            return Ok("No matches found".into());
        }
        Ok(matches
            .iter()
            .map(|p| p.display().to_string())
            .collect::<Vec<_>>()
            .join("\n"))
    }

    async fn tree_with(&self, params: TreeParams, ct: &CancellationToken) -> Result<String, String> {
        let path = self.roots.validate(&params.path)?;
        let tree = traverse::tree(
            &self.roots,
            &path,
            params.depth.unwrap_or(DEFAULT_TREE_DEPTH),
            params.follow_symlinks.unwrap_or(false),
            ct,
        )
        .await?;
        to_json(&tree)
    }

    async fn search_within_files_with(
        &self,
        params: SearchWithinFilesParams,
        ct: &CancellationToken,
    ) -> Result<String, String> {
        let path = self.roots.validate(&params.path)?;
        let found = traverse::search_within_files(
            &path,
            &params.substring,
            params.depth,
            params.max_results.unwrap_or(DEFAULT_MAX_RESULTS),
            ct,
        )
        .await?;
        to_json(&found)
    }
}

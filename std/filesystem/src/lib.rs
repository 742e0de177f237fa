//! MCP server providing sandboxed filesystem tools.
//!
//! All operations are restricted to a set of allowed directories configured
//! at server startup. Every client-supplied path passes through
//! [`validate::AllowedRoots`] before any filesystem call is made.
//!
//! The server is transport-agnostic: the binary serves it over stdio or
//! streamable HTTP (see [`http`]).

use crate::error::Error;
use rmcp::{
    ErrorData as McpError, RoleServer, ServerHandler,
    handler::server::router::tool::ToolRouter,
    model::{
        AnnotateAble, Implementation, ListResourcesResult, PaginatedRequestParams, RawResource,
        ReadResourceRequestParams, ReadResourceResult, Resource, ResourceContents,
        ServerCapabilities, ServerInfo,
    },
    service::RequestContext,
    tool_handler,
};
use std::path::Path;
use validate::AllowedRoots;

pub mod config;
pub mod error;
pub mod http;
pub mod modify;
pub mod ops;
pub mod tools;
pub mod traverse;
pub mod validate;

const FILE_SCHEME: &str = "file://";

/// MCP filesystem server with directory-level access control.
#[derive(Debug, Clone)]
pub struct FilesystemServer {
    pub(crate) roots: AllowedRoots,
    pub(crate) tool_router: ToolRouter<Self>,
}

impl FilesystemServer {
    pub fn roots(&self) -> &AllowedRoots {
        &self.roots
    }

    /// One `file://` resource per allowed directory.
    pub fn root_resources(&self) -> Vec<Resource> {
        self.roots
            .dirs()
            .iter()
            .map(|dir| {
                let mut raw = RawResource::new(
                    format!("{FILE_SCHEME}{}", dir.display()),
                    ops::display_name(dir),
                );
                raw.description = Some(format!("Allowed directory {}", dir.display()));
                raw.mime_type = Some("application/json".into());
                raw.no_annotation()
            })
            .collect()
    }

    /// Read a `file://` URI: file text, or a JSON listing for a directory.
    pub async fn read_uri(&self, uri: &str) -> Result<String, Error> {
        let raw = uri.strip_prefix(FILE_SCHEME).ok_or_else(|| {
            Error::InvalidArgument(format!("unsupported resource uri {uri:?}"))
        })?;
        let path = self.roots.validate(raw)?;
        if is_dir(&path).await {
            let entries = ops::list_directory(&path).await?;
            serde_json::to_string_pretty(&entries)
                .map_err(|e| Error::InvalidArgument(format!("cannot encode listing: {e}")))
        } else {
            ops::read_file(&path).await
        }
    }
}

async fn is_dir(path: &Path) -> bool {
    tokio::fs::metadata(path)
        .await
        .map(|meta| meta.is_dir())
        .unwrap_or(false)
}

fn resource_error(uri: &str, err: Error) -> McpError {
    let message = err.to_string();
    match err {
        Error::PathEscape(_) | Error::InvalidArgument(_) => McpError::invalid_params(message, None),
        Error::NotFound(_) => McpError::resource_not_found(
            message,
            Some(serde_json::json!({ "uri": uri })),
        ),
        _ => McpError::internal_error(message, None),
    }
}

#[tool_handler]
impl ServerHandler for FilesystemServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            protocol_version: Default::default(),
            capabilities: ServerCapabilities::builder()
                .enable_tools()
                .enable_resources()
                .build(),
            server_info: Implementation {
                name: "mcp-filesystem-server".into(),
                title: Some("MCP Filesystem Server".into()),
                version: env!("CARGO_PKG_VERSION").into(),
                ..Default::default()
            },
            instructions: Some(
                "Filesystem server providing sandboxed file and directory operations. \
                 Call list_allowed_directories to see which paths are accessible."
                    .into(),
            ),
        }
    }

    fn list_resources(
        &self,
        _request: Option<PaginatedRequestParams>,
        _context: RequestContext<RoleServer>,
    ) -> impl Future<Output = Result<ListResourcesResult, McpError>> + Send + '_ {
        async move { Ok(ListResourcesResult::with_all_items(self.root_resources())) }
    }

    fn read_resource(
        &self,
        request: ReadResourceRequestParams,
        _context: RequestContext<RoleServer>,
    ) -> impl Future<Output = Result<ReadResourceResult, McpError>> + Send + '_ {
        async move {
            let uri = request.uri;
            let text = self
                .read_uri(&uri)
                .await
                .map_err(|e| resource_error(&uri, e))?;
            Ok(ReadResourceResult {
                contents: vec![ResourceContents::text(text, uri)],
            })
        }
    }
}

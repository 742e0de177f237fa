//! Streamable HTTP transport.

use crate::FilesystemServer;
use rmcp::transport::streamable_http_server::{
    StreamableHttpServerConfig, StreamableHttpService, session::local::LocalSessionManager,
};
use rmcp_axum::{
    cors::CorsLayer,
    info::{ServerMetadata, info_router},
};
use tower::Layer;

/// Build the HTTP application: the MCP endpoint at `/mcp` plus the
/// `/health` and `/` metadata routes.
pub fn router(server: FilesystemServer) -> axum::Router {
    let service = StreamableHttpService::new(
        move || Ok(server.clone()),
        LocalSessionManager::default().into(),
        StreamableHttpServerConfig::default(),
    );
    let metadata = ServerMetadata::streamable_http("mcp-filesystem-server", env!("CARGO_PKG_VERSION"))
        .with_description("Sandboxed filesystem operations over MCP");

    axum::Router::new()
        .nest_service("/mcp", CorsLayer.layer(service))
        .merge(info_router(metadata))
}

/// Serve `server` on `host:port` until ctrl-c.
pub async fn serve(server: FilesystemServer, host: &str, port: u16) -> anyhow::Result<()> {
    let listener = tokio::net::TcpListener::bind((host, port)).await?;
    tracing::info!(addr = %listener.local_addr()?, "listening for MCP over streamable HTTP at /mcp");

    axum::serve(listener, router(server))
        .with_graceful_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!(error = %e, "failed to listen for ctrl-c");
            }
            tracing::info!("shutting down");
        })
        .await?;
    Ok(())
}

//! # rmcp-axum
//!
//! Extensions for building MCP servers with [rmcp](https://docs.rs/rmcp) and
//! [axum](https://docs.rs/axum).
//!
//! ## CORS
//!
//! [`cors::CorsLayer`] opens the MCP endpoint to browser-based clients on any
//! origin and answers preflight requests without touching the MCP service.
//!
//! ## Metadata routes
//!
//! [`info::info_router`] serves `/health` and a `/` document describing the
//! server and its endpoints.
//!
//! ```rust,ignore
//! use rmcp::transport::streamable_http_server::{
//!     StreamableHttpService, StreamableHttpServerConfig,
//!     session::local::LocalSessionManager,
//! };
//! use rmcp_axum::{cors::CorsLayer, info::{ServerMetadata, info_router}};
//!
//! let service = StreamableHttpService::new(
//!     || Ok(MyMcpService::new()),
//!     LocalSessionManager::default().into(),
//!     StreamableHttpServerConfig::default(),
//! );
//!
//! let app = axum::Router::new()
//!     .nest_service("/mcp", tower::ServiceBuilder::new().layer(CorsLayer).service(service))
//!     .merge(info_router(ServerMetadata::streamable_http("my-server", "0.1.0")));
//!
//! let listener = tokio::net::TcpListener::bind("0.0.0.0:8080").await?;
//! axum::serve(listener, app).await?;
//! ```

pub use axum;

pub mod cors;
pub mod info;

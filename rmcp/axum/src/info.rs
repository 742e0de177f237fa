//! Health and metadata routes served next to the MCP endpoint.
//!
//! ```rust,ignore
//! use rmcp_axum::info::{ServerMetadata, info_router};
//!
//! let app = axum::Router::new()
//!     .nest_service("/mcp", mcp_service)
//!     .merge(info_router(ServerMetadata::streamable_http("my-server", "0.1.0")));
//! ```

use axum::{Json, response::IntoResponse};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;

/// Transport name reported for the rmcp streamable-HTTP service.
pub const STREAMABLE_HTTP: &str = "streamable-http";

/// Body of the `/health` endpoint.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct Health {
    pub status: String,
    pub transport: String,
}

/// Body of the `/` endpoint.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ServerMetadata {
    pub name: String,
    pub version: String,
    pub transport: String,
    /// Endpoint name to path, e.g. `"mcp" -> "/mcp"`.
    pub endpoints: BTreeMap<String, String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl ServerMetadata {
    /// Metadata for a server exposing `/mcp` and `/health` over streamable HTTP.
    pub fn streamable_http(name: impl Into<String>, version: impl Into<String>) -> Self {
        let endpoints = [("mcp", "/mcp"), ("health", "/health")]
            .into_iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Self {
            name: name.into(),
            version: version.into(),
            transport: STREAMABLE_HTTP.into(),
            endpoints,
            description: None,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

/// Create an axum [`Router`](axum::Router) serving `/health` and `/`.
///
/// Both answer `200 OK` with `application/json`.
pub fn info_router(metadata: ServerMetadata) -> axum::Router {
    let health = Arc::new(Health {
        status: "ok".into(),
        transport: metadata.transport.clone(),
    });
    let metadata = Arc::new(metadata);
    axum::Router::new()
        .route(
            "/health",
            axum::routing::get(move || {
                let health = health.clone();
                async move { Json(health.as_ref().clone()).into_response() }
            }),
        )
        .route(
            "/",
            axum::routing::get(move || {
                let metadata = metadata.clone();
                async move { Json(metadata.as_ref().clone()).into_response() }
            }),
        )
}

#[cfg(test)]
mod tests {
    use crate::info::{Health, ServerMetadata, info_router};
    use axum::body::{Body, to_bytes};
    use http::{Request, StatusCode};
    use tower::ServiceExt;

    #[tokio::test]
    async fn health_reports_ok() {
        let app = info_router(ServerMetadata::streamable_http("fs", "1.0.0"));
        let req = Request::builder()
            .uri("/health")
            .body(Body::empty())
            .unwrap();
        let response = app.oneshot(req).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let health: Health = serde_json::from_slice(&body).unwrap();
        assert_eq!(health.status, "ok");
        assert_eq!(health.transport, "streamable-http");
    }

    #[tokio::test]
    async fn root_lists_endpoints() {
        let app = info_router(
            ServerMetadata::streamable_http("fs", "1.0.0").with_description("test server"),
        );
        let req = Request::builder().uri("/").body(Body::empty()).unwrap();
        let response = app.oneshot(req).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let meta: ServerMetadata = serde_json::from_slice(&body).unwrap();
        assert_eq!(meta.name, "fs");
        assert_eq!(meta.endpoints["mcp"], "/mcp");
        assert_eq!(meta.endpoints["health"], "/health");
        assert_eq!(meta.description.as_deref(), Some("test server"));
    }
}

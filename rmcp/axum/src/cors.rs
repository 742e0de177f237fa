//! Permissive CORS middleware for MCP endpoints.
//!
//! Every response gets `Access-Control-Allow-*` headers for any origin and
//! the `Mcp-Session-Id` header is exposed so browser clients can resume
//! streamable-HTTP sessions. `OPTIONS` preflight requests are answered
//! directly with `200 OK`.

use futures::future::BoxFuture;
use http::{HeaderMap, HeaderValue, Method, Request, Response, StatusCode, header};
use std::task::{Context, Poll};

/// Methods advertised in `Access-Control-Allow-Methods`.
pub const ALLOW_METHODS: &str = "GET, POST, PUT, DELETE, OPTIONS";

/// Headers advertised in `Access-Control-Allow-Headers`.
pub const ALLOW_HEADERS: &str = "Content-Type, Authorization, Mcp-Session-Id";

/// Headers advertised in `Access-Control-Expose-Headers`.
pub const EXPOSE_HEADERS: &str = "Mcp-Session-Id";

/// Tower [`Layer`](tower::Layer) that applies [`CorsService`].
#[derive(Clone, Copy, Debug, Default)]
pub struct CorsLayer;

impl<S> tower::Layer<S> for CorsLayer {
    type Service = CorsService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        CorsService { inner }
    }
}

/// Tower service that decorates responses with CORS headers.
#[derive(Clone, Debug)]
pub struct CorsService<S> {
    inner: S,
}

impl<S, B, ResBody> tower::Service<Request<B>> for CorsService<S>
where
    S: tower::Service<Request<B>, Response = Response<ResBody>> + Clone + Send + 'static,
    S::Future: Send,
    S::Error: Send,
    B: Send + 'static,
    ResBody: Default + Send + 'static,
{
    type Response = S::Response;
    type Error = S::Error;
    type Future = BoxFuture<'static, Result<Self::Response, Self::Error>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, req: Request<B>) -> Self::Future {
        let mut inner = self.inner.clone();
        // swap to ensure poll_ready state is preserved
        std::mem::swap(&mut self.inner, &mut inner);

        Box::pin(async move {
            if req.method() == Method::OPTIONS {
                let mut response = Response::new(ResBody::default());
                *response.status_mut() = StatusCode::OK;
                apply_headers(response.headers_mut());
                return Ok(response);
            }

            let mut response = inner.call(req).await?;
            apply_headers(response.headers_mut());
            Ok(response)
        })
    }
}

/// Insert the CORS headers into `headers`, replacing any existing values.
pub fn apply_headers(headers: &mut HeaderMap) {
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_ORIGIN,
        HeaderValue::from_static("*"),
    );
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_METHODS,
        HeaderValue::from_static(ALLOW_METHODS),
    );
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_HEADERS,
        HeaderValue::from_static(ALLOW_HEADERS),
    );
    headers.insert(
        header::ACCESS_CONTROL_EXPOSE_HEADERS,
        HeaderValue::from_static(EXPOSE_HEADERS),
    );
}

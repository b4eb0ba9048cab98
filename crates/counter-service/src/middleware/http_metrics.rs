//! HTTP metrics middleware for capturing all request/response metrics
//!
//! Captures every response, including ones produced before a handler runs
//! (404 for unknown paths, CORS preflight answers, request timeouts).

use axum::{extract::Request, middleware::Next, response::Response};
use std::time::Instant;

use crate::observability::metrics::record_http_request;

/// Middleware that records method, normalized path, status and duration
/// of every request. Applied as the outermost layer.
pub async fn http_metrics_middleware(request: Request, next: Next) -> Response {
    let start = Instant::now();
    let method = request.method().to_string();
    let path = request.uri().path().to_string();

    let response = next.run(request).await;

    record_http_request(&method, &path, response.status().as_u16(), start.elapsed());

    response
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use axum::{
        body::Body,
        http::{Request as HttpRequest, StatusCode},
        middleware,
        routing::get,
        Router,
    };
    use tower::ServiceExt;

    async fn handler_200() -> &'static str {
        "OK"
    }

    async fn handler_500() -> (StatusCode, &'static str) {
        (StatusCode::INTERNAL_SERVER_ERROR, "Error")
    }

    fn test_app() -> Router {
        Router::new()
            .route("/success", get(handler_200))
            .route("/error", get(handler_500))
            .layer(middleware::from_fn(http_metrics_middleware))
    }

    #[tokio::test]
    async fn test_middleware_passes_success_through() {
        let request = HttpRequest::builder()
            .method("GET")
            .uri("/success")
            .body(Body::empty())
            .expect("request builder should succeed");

        let response = test_app()
            .oneshot(request)
            .await
            .expect("request should succeed");
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_middleware_passes_error_through() {
        let request = HttpRequest::builder()
            .method("GET")
            .uri("/error")
            .body(Body::empty())
            .expect("request builder should succeed");

        let response = test_app()
            .oneshot(request)
            .await
            .expect("request should succeed");
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[tokio::test]
    async fn test_middleware_sees_not_found() {
        let request = HttpRequest::builder()
            .method("GET")
            .uri("/nonexistent")
            .body(Body::empty())
            .expect("request builder should succeed");

        let response = test_app()
            .oneshot(request)
            .await
            .expect("request should succeed");
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}

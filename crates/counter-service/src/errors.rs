//! Visitor counter error types.
//!
//! All errors map to HTTP status codes via the `IntoResponse` impl. Bodies
//! are always `{"error": "<message>"}` with a generic, client-safe message;
//! diagnostic detail is logged where the failure happens, never returned.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

/// Client-facing error for a counter request.
///
/// Maps to HTTP status codes:
/// - Conflict: 409 Conflict
/// - Internal: 500 Internal Server Error
/// - MethodNotAllowed: 405 Method Not Allowed
#[derive(Debug, Error)]
pub enum CounterError {
    /// Optimistic write kept losing the race; the client may retry.
    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("Method not allowed")]
    MethodNotAllowed,
}

impl CounterError {
    /// Returns the HTTP status code for this error.
    pub fn status_code(&self) -> StatusCode {
        match self {
            CounterError::Conflict(_) => StatusCode::CONFLICT,
            CounterError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            CounterError::MethodNotAllowed => StatusCode::METHOD_NOT_ALLOWED,
        }
    }

    fn client_message(&self) -> String {
        match self {
            CounterError::Conflict(message) | CounterError::Internal(message) => message.clone(),
            CounterError::MethodNotAllowed => "Method not allowed".to_string(),
        }
    }
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
}

impl IntoResponse for CounterError {
    fn into_response(self) -> Response {
        let body = ErrorResponse {
            error: self.client_message(),
        };
        (self.status_code(), Json(body)).into_response()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use axum::body::Body;
    use http_body_util::BodyExt;

    async fn read_body_json(body: Body) -> serde_json::Value {
        let bytes = body.collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[test]
    fn test_display_conflict() {
        let error = CounterError::Conflict("Error incrementing count".to_string());
        assert_eq!(format!("{}", error), "Conflict: Error incrementing count");
    }

    #[test]
    fn test_display_method_not_allowed() {
        assert_eq!(
            format!("{}", CounterError::MethodNotAllowed),
            "Method not allowed"
        );
    }

    #[test]
    fn test_status_codes() {
        assert_eq!(
            CounterError::Conflict(String::new()).status_code(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            CounterError::Internal(String::new()).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            CounterError::MethodNotAllowed.status_code(),
            StatusCode::METHOD_NOT_ALLOWED
        );
    }

    #[tokio::test]
    async fn test_into_response_conflict() {
        let response = CounterError::Conflict("Error incrementing count".to_string()).into_response();

        assert_eq!(response.status(), StatusCode::CONFLICT);
        assert_eq!(
            response.headers().get("content-type").unwrap(),
            "application/json"
        );

        let body_json = read_body_json(response.into_body()).await;
        assert_eq!(body_json, serde_json::json!({"error": "Error incrementing count"}));
    }

    #[tokio::test]
    async fn test_into_response_internal() {
        let response = CounterError::Internal("Error retrieving count".to_string()).into_response();

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let body_json = read_body_json(response.into_body()).await;
        assert_eq!(body_json["error"], "Error retrieving count");
    }

    #[tokio::test]
    async fn test_into_response_method_not_allowed() {
        let response = CounterError::MethodNotAllowed.into_response();

        assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);

        let body_json = read_body_json(response.into_body()).await;
        assert_eq!(body_json, serde_json::json!({"error": "Method not allowed"}));
    }
}

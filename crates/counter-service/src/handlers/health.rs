//! Health check handlers.
//!
//! - `/health`: Liveness probe - returns OK if the process is running
//! - `/ready`: Readiness probe - checks the counter store answers a point read

use crate::models::ReadinessResponse;
use crate::routes::AppState;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use std::sync::Arc;

/// Liveness probe handler.
///
/// Does not check any dependencies; failure means the process is hung.
pub async fn health_check() -> &'static str {
    "OK"
}

/// Readiness probe handler.
///
/// Returns 200 if the store answers a read of the counter document (an
/// absent document still counts as reachable), 503 otherwise. The error
/// body is generic; the store error is logged.
#[tracing::instrument(skip_all, name = "counter.health.readiness")]
pub async fn readiness_check(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    match state.service.store_ready().await {
        Ok(()) => (
            StatusCode::OK,
            Json(ReadinessResponse {
                status: "ready",
                store: "healthy",
                error: None,
            }),
        ),
        Err(e) => {
            tracing::warn!(target: "counter.handlers", error = %e, "Readiness check failed");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(ReadinessResponse {
                    status: "not_ready",
                    store: "unhealthy",
                    error: Some("Service dependencies unavailable".to_string()),
                }),
            )
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_health_check() {
        assert_eq!(health_check().await, "OK");
    }

    #[test]
    fn test_readiness_response_serialization() {
        let ready = ReadinessResponse {
            status: "ready",
            store: "healthy",
            error: None,
        };
        let json = serde_json::to_string(&ready).unwrap();
        assert!(json.contains("\"status\":\"ready\""));
        assert!(json.contains("\"store\":\"healthy\""));
        assert!(!json.contains("error"));

        let not_ready = ReadinessResponse {
            status: "not_ready",
            store: "unhealthy",
            error: Some("Service dependencies unavailable".to_string()),
        };
        let json = serde_json::to_string(&not_ready).unwrap();
        assert!(json.contains("\"status\":\"not_ready\""));
        assert!(json.contains("Service dependencies unavailable"));
    }
}

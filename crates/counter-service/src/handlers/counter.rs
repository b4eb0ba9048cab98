//! Counter handlers.
//!
//! - `GET /api/counter` - Current visit count
//! - `POST /api/counter` - Record a visit
//! - `OPTIONS /api/counter` - Empty 200 for non-preflight OPTIONS
//! - anything else - 405
//!
//! Handlers only translate [`CounterOutcome`]s into HTTP; the service never
//! hands them a store error.

use crate::errors::CounterError;
use crate::middleware::CorrelationId;
use crate::models::CountResponse;
use crate::routes::AppState;
use crate::services::CounterOutcome;
use axum::{extract::State, http::StatusCode, Extension, Json};
use std::sync::Arc;
use tracing::{debug, instrument};

const FETCH_ERROR: &str = "Error retrieving count";
const INCREMENT_ERROR: &str = "Error incrementing count";

/// Handler for GET /api/counter
#[instrument(skip_all, name = "counter.handlers.get")]
pub async fn get_count(
    State(state): State<Arc<AppState>>,
    Extension(correlation_id): Extension<CorrelationId>,
) -> Result<(StatusCode, Json<CountResponse>), CounterError> {
    let outcome = state.service.fetch(&correlation_id).await;
    debug!(target: "counter.handlers", outcome = outcome.label(), "Fetch finished");
    respond(outcome, FETCH_ERROR)
}

/// Handler for POST /api/counter
///
/// 201 when this visit created the counter, 200 otherwise. A 409 means the
/// write lost every optimistic concurrency attempt; the client may retry.
#[instrument(skip_all, name = "counter.handlers.post")]
pub async fn increment_count(
    State(state): State<Arc<AppState>>,
    Extension(correlation_id): Extension<CorrelationId>,
) -> Result<(StatusCode, Json<CountResponse>), CounterError> {
    let outcome = state.service.increment(&correlation_id).await;
    debug!(target: "counter.handlers", outcome = outcome.label(), "Increment finished");
    respond(outcome, INCREMENT_ERROR)
}

/// Handler for OPTIONS /api/counter
///
/// Preflights carrying `Access-Control-Request-Method` are answered by the
/// CORS layer and never get here.
pub async fn options() -> StatusCode {
    StatusCode::OK
}

/// Fallback for every other method on /api/counter.
pub async fn method_not_allowed() -> CounterError {
    CounterError::MethodNotAllowed
}

fn respond(
    outcome: CounterOutcome,
    error_message: &str,
) -> Result<(StatusCode, Json<CountResponse>), CounterError> {
    match outcome {
        CounterOutcome::Created(count) => Ok((StatusCode::CREATED, Json(CountResponse { count }))),
        CounterOutcome::Ok(count) => Ok((StatusCode::OK, Json(CountResponse { count }))),
        CounterOutcome::Conflict => Err(CounterError::Conflict(error_message.to_string())),
        CounterOutcome::ServerError => Err(CounterError::Internal(error_message.to_string())),
    }
}

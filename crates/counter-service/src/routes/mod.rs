//! HTTP routes for the visitor counter.
//!
//! Defines the Axum router and application state.

use crate::config::{Config, CorsOrigins};
use crate::handlers;
use crate::middleware::{correlation_id_middleware, http_metrics_middleware, CORRELATION_ID_HEADER};
use crate::services::CounterService;
use axum::{
    http::{header, HeaderValue, Method},
    middleware,
    routing::get,
    Router,
};
use metrics_exporter_prometheus::PrometheusHandle;
use std::sync::Arc;
use std::time::Duration;
use tower_http::{
    cors::{AllowOrigin, Any, CorsLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

/// How long browsers may cache a preflight answer.
const CORS_MAX_AGE: Duration = Duration::from_secs(86_400);

/// Overall per-request timeout.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    /// The counter service, constructed once per process.
    pub service: Arc<CounterService>,

    /// Service configuration.
    pub config: Config,
}

/// Build the application routes.
///
/// Creates an Axum router with:
/// - `/api/counter` - GET reads, POST increments, OPTIONS answers 200, other methods (HEAD included) 405
/// - `/health` - Liveness probe (simple "OK")
/// - `/ready` - Readiness probe (store read)
/// - `/metrics` - Prometheus metrics endpoint
/// - correlation id resolution for every request
/// - CORS from `CORS_ALLOWED_ORIGINS`
/// - TraceLayer for request logging
/// - HTTP metrics middleware
/// - 30 second request timeout
pub fn build_routes(state: Arc<AppState>, metrics_handle: PrometheusHandle) -> Router {
    let cors = cors_layer(&state.config.cors_allowed_origins);

    let api_routes = Router::new()
        .route(
            "/api/counter",
            get(handlers::get_count)
                .post(handlers::increment_count)
                .options(handlers::options)
                // `get` would otherwise answer HEAD by running the fetch.
                .head(handlers::method_not_allowed)
                .fallback(handlers::method_not_allowed),
        )
        .route("/health", get(handlers::health_check))
        .route("/ready", get(handlers::readiness_check))
        .with_state(state);

    let metrics_routes = Router::new()
        .route("/metrics", get(handlers::metrics_handler))
        .with_state(metrics_handle);

    // Layer order (bottom-to-top execution):
    // 1. correlation_id_middleware - Resolve id, span, response header (innermost)
    // 2. CorsLayer - Answer preflights, decorate responses
    // 3. TraceLayer - Log request details
    // 4. TimeoutLayer - Timeout the request
    // 5. http_metrics_middleware - Record ALL responses (outermost)
    api_routes
        .merge(metrics_routes)
        .layer(middleware::from_fn(correlation_id_middleware))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .layer(TimeoutLayer::new(REQUEST_TIMEOUT))
        .layer(middleware::from_fn(http_metrics_middleware))
}

fn cors_layer(origins: &CorsOrigins) -> CorsLayer {
    let allow_origin = match origins {
        CorsOrigins::Any => AllowOrigin::from(Any),
        CorsOrigins::List(list) => AllowOrigin::list(
            list.iter()
                .filter_map(|origin| HeaderValue::from_str(origin).ok()),
        ),
    };

    CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, CORRELATION_ID_HEADER])
        .expose_headers([CORRELATION_ID_HEADER])
        .max_age(CORS_MAX_AGE)
}

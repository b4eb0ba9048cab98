//! Middleware for the visitor counter.
//!
//! # Components
//!
//! - `correlation_id` - Resolves or mints the per-request correlation id
//! - `http_metrics` - Records HTTP request metrics

pub mod correlation_id;
pub mod http_metrics;

pub use correlation_id::{correlation_id_middleware, CorrelationId, CORRELATION_ID_HEADER};
pub use http_metrics::http_metrics_middleware;

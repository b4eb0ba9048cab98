//! HTTP request handlers for the visitor counter.

pub mod counter;
pub mod health;
pub mod metrics;

pub use counter::{get_count, increment_count, method_not_allowed, options};
pub use health::{health_check, readiness_check};
pub use metrics::metrics_handler;

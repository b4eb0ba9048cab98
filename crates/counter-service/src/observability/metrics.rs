//! Metrics definitions for the visitor counter.
//!
//! All metrics follow Prometheus naming conventions:
//! - `counter_` prefix
//! - `_total` suffix for counters
//! - `_seconds` suffix for duration histograms
//!
//! # Cardinality
//!
//! Labels are bounded:
//! - `method`: HTTP methods
//! - `endpoint`: the handful of static routes, everything else is `/other`
//! - `operation`: `fetch`, `increment`, `read`, `create`, `upsert`
//! - `outcome` / `status`: closed sets defined by the service and store

use metrics::{counter, histogram};
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder, PrometheusHandle};
use std::time::Duration;

/// Initialize the Prometheus recorder and return the handle used to serve
/// `/metrics`.
///
/// Must be called before any metrics are recorded.
///
/// # Errors
///
/// Returns error if the recorder fails to install (e.g., already installed).
pub fn init_metrics_recorder() -> Result<PrometheusHandle, String> {
    PrometheusBuilder::new()
        .set_buckets_for_metric(
            Matcher::Prefix("counter_http_request".to_string()),
            &[
                0.005, 0.010, 0.025, 0.050, 0.100, 0.200, 0.500, 1.000, 2.000, 5.000,
            ],
        )
        .map_err(|e| format!("Failed to set HTTP request buckets: {e}"))?
        .set_buckets_for_metric(
            Matcher::Prefix("counter_operation".to_string()),
            &[0.005, 0.010, 0.025, 0.050, 0.100, 0.250, 0.500, 1.000, 2.500],
        )
        .map_err(|e| format!("Failed to set operation buckets: {e}"))?
        .set_buckets_for_metric(
            Matcher::Prefix("counter_store_request".to_string()),
            &[0.002, 0.005, 0.010, 0.020, 0.050, 0.100, 0.250, 0.500, 1.000],
        )
        .map_err(|e| format!("Failed to set store request buckets: {e}"))?
        .set_buckets_for_metric(
            Matcher::Full("counter_increment_attempts".to_string()),
            &[1.0, 2.0, 3.0],
        )
        .map_err(|e| format!("Failed to set increment attempt buckets: {e}"))?
        .install_recorder()
        .map_err(|e| format!("Failed to install Prometheus recorder: {e}"))
}

// ============================================================================
// HTTP Request Metrics
// ============================================================================

/// Record HTTP request completion
///
/// Metric: `counter_http_requests_total`, `counter_http_request_duration_seconds`
/// Labels: `method`, `endpoint`, `status` / `status_code`
pub fn record_http_request(method: &str, endpoint: &str, status_code: u16, duration: Duration) {
    let normalized_endpoint = normalize_endpoint(endpoint);
    let status = categorize_status_code(status_code);

    histogram!("counter_http_request_duration_seconds",
        "method" => method.to_string(),
        "endpoint" => normalized_endpoint,
        "status" => status
    )
    .record(duration.as_secs_f64());

    counter!("counter_http_requests_total",
        "method" => method.to_string(),
        "endpoint" => normalized_endpoint,
        "status_code" => status_code.to_string()
    )
    .increment(1);
}

/// Categorize HTTP status code into success/error/timeout
fn categorize_status_code(status_code: u16) -> &'static str {
    match status_code {
        200..=299 => "success",
        408 | 504 => "timeout",
        _ => "error",
    }
}

/// Map a request path onto a bounded set of endpoint labels.
fn normalize_endpoint(path: &str) -> &'static str {
    match path {
        "/api/counter" => "/api/counter",
        "/health" => "/health",
        "/ready" => "/ready",
        "/metrics" => "/metrics",
        _ => "/other",
    }
}

// ============================================================================
// Counter Operation Metrics
// ============================================================================

/// Record a completed counter operation.
///
/// Metric: `counter_operations_total`, `counter_operation_duration_seconds`
/// Labels: `operation` (`fetch` | `increment`), `outcome`
pub fn record_counter_operation(operation: &'static str, outcome: &'static str, duration: Duration) {
    histogram!("counter_operation_duration_seconds",
        "operation" => operation
    )
    .record(duration.as_secs_f64());

    counter!("counter_operations_total",
        "operation" => operation,
        "outcome" => outcome
    )
    .increment(1);
}

/// Record how many attempts an increment used before finishing.
///
/// Metric: `counter_increment_attempts`
pub fn record_increment_attempts(attempts: u32) {
    histogram!("counter_increment_attempts").record(f64::from(attempts));
}

/// Record a rejected optimistic write (or lost creation race).
///
/// Metric: `counter_concurrency_conflicts_total`
pub fn record_concurrency_conflict() {
    counter!("counter_concurrency_conflicts_total").increment(1);
}

// ============================================================================
// Store Metrics
// ============================================================================

/// Record a store round trip.
///
/// Metric: `counter_store_requests_total`, `counter_store_request_duration_seconds`
/// Labels: `operation` (`read` | `create` | `upsert`), `status`
pub fn record_store_request(operation: &'static str, status: &'static str, duration: Duration) {
    histogram!("counter_store_request_duration_seconds",
        "operation" => operation
    )
    .record(duration.as_secs_f64());

    counter!("counter_store_requests_total",
        "operation" => operation,
        "status" => status
    )
    .increment(1);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_categorize_status_code() {
        assert_eq!(categorize_status_code(200), "success");
        assert_eq!(categorize_status_code(201), "success");
        assert_eq!(categorize_status_code(409), "error");
        assert_eq!(categorize_status_code(500), "error");
        assert_eq!(categorize_status_code(408), "timeout");
        assert_eq!(categorize_status_code(504), "timeout");
    }

    #[test]
    fn test_normalize_endpoint() {
        assert_eq!(normalize_endpoint("/api/counter"), "/api/counter");
        assert_eq!(normalize_endpoint("/health"), "/health");
        assert_eq!(normalize_endpoint("/metrics"), "/metrics");
        assert_eq!(normalize_endpoint("/api/counter/extra"), "/other");
        assert_eq!(normalize_endpoint("/wp-admin"), "/other");
    }

    #[test]
    fn test_recording_without_recorder_is_noop() {
        // With no recorder installed these must not panic.
        record_http_request("GET", "/api/counter", 200, Duration::from_millis(3));
        record_counter_operation("increment", "created", Duration::from_millis(3));
        record_increment_attempts(2);
        record_concurrency_conflict();
        record_store_request("read", "success", Duration::from_millis(1));
    }
}

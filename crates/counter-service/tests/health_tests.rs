//! Health endpoint integration tests.
//!
//! Tests the `/health` (liveness), `/ready` (readiness) and `/metrics`
//! endpoints using the `TestCounterServer` harness.

use counter_test_utils::{InMemoryStore, TestCounterServer};

/// Test that /health liveness endpoint returns 200 and plain text "OK".
#[tokio::test]
async fn test_health_endpoint_returns_200() -> Result<(), anyhow::Error> {
    let server = TestCounterServer::spawn(InMemoryStore::new()).await?;
    let client = reqwest::Client::new();

    let response = client
        .get(format!("{}/health", server.url()))
        .send()
        .await?;

    assert_eq!(response.status(), 200);
    assert_eq!(response.text().await?, "OK");

    Ok(())
}

/// Liveness does not touch the store.
#[tokio::test]
async fn test_health_ignores_store_failures() -> Result<(), anyhow::Error> {
    let server = TestCounterServer::spawn(InMemoryStore::new().with_failing_reads()).await?;

    let response = reqwest::get(format!("{}/health", server.url())).await?;

    assert_eq!(response.status(), 200);
    assert_eq!(server.store().read_count(), 0);

    Ok(())
}

/// Test that /ready returns JSON and 200 when the store answers.
#[tokio::test]
async fn test_ready_endpoint_returns_json() -> Result<(), anyhow::Error> {
    let server = TestCounterServer::spawn(InMemoryStore::new()).await?;

    let response = reqwest::get(format!("{}/ready", server.url())).await?;
    assert_eq!(response.status(), 200);

    let content_type = response
        .headers()
        .get("content-type")
        .and_then(|v| v.to_str().ok());
    assert!(
        content_type.is_some_and(|ct| ct.contains("application/json")),
        "Expected application/json content type, got {:?}",
        content_type
    );

    let body: serde_json::Value = response.json().await?;
    assert_eq!(body["status"], "ready");
    assert_eq!(body["store"], "healthy");
    assert!(body.get("error").is_none());

    Ok(())
}

/// Test that /ready returns 503 with a generic error when the store fails.
#[tokio::test]
async fn test_ready_endpoint_reports_store_outage() -> Result<(), anyhow::Error> {
    let server = TestCounterServer::spawn(InMemoryStore::new().with_failing_reads()).await?;

    let response = reqwest::get(format!("{}/ready", server.url())).await?;
    assert_eq!(response.status(), 503);

    let body: serde_json::Value = response.json().await?;
    assert_eq!(body["status"], "not_ready");
    assert_eq!(body["error"], "Service dependencies unavailable");

    // The injected failure detail must not leak to clients.
    assert!(!body.to_string().contains("injected"));

    Ok(())
}

#[tokio::test]
async fn test_metrics_endpoint_returns_200() -> Result<(), anyhow::Error> {
    let server = TestCounterServer::spawn(InMemoryStore::new()).await?;

    let response = reqwest::get(format!("{}/metrics", server.url())).await?;
    assert_eq!(response.status(), 200);

    Ok(())
}

#[tokio::test]
async fn test_unknown_path_is_404() -> Result<(), anyhow::Error> {
    let server = TestCounterServer::spawn(InMemoryStore::new()).await?;

    let response = reqwest::get(format!("{}/api/other", server.url())).await?;
    assert_eq!(response.status(), 404);

    Ok(())
}

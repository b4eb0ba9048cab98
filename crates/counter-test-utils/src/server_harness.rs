//! Test server harness for E2E testing
//!
//! Provides `TestCounterServer` for spawning real counter server instances
//! backed by an [`InMemoryStore`].

use counter_service::config::Config;
use counter_service::routes::{self, AppState};
use counter_service::services::CounterService;
use counter_service::store::InMemoryStore;
use metrics_exporter_prometheus::PrometheusBuilder;
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::task::JoinHandle;

/// Test harness for spawning the visitor counter server in E2E tests.
///
/// The store handle is shared with the server, so tests can seed documents
/// and inject faults before the first request and inspect call counts after.
///
/// # Example
/// ```rust,ignore
/// #[tokio::test]
/// async fn test_health_flow_e2e() -> Result<(), anyhow::Error> {
///     let server = TestCounterServer::spawn(InMemoryStore::new()).await?;
///
///     let response = reqwest::get(format!("{}/health", server.url())).await?;
///
///     assert_eq!(response.status(), 200);
///     Ok(())
/// }
/// ```
pub struct TestCounterServer {
    addr: SocketAddr,
    store: InMemoryStore,
    config: Config,
    _handle: JoinHandle<()>,
}

impl TestCounterServer {
    /// Spawn a new test server instance on `127.0.0.1:0` using `store`.
    pub async fn spawn(store: InMemoryStore) -> Result<Self, anyhow::Error> {
        Self::spawn_with_vars(store, HashMap::new()).await
    }

    /// Spawn with extra environment-style configuration (e.g.
    /// `CORS_ALLOWED_ORIGINS`) layered over the test defaults.
    pub async fn spawn_with_vars(
        store: InMemoryStore,
        overrides: HashMap<String, String>,
    ) -> Result<Self, anyhow::Error> {
        let mut vars = HashMap::from([
            (
                "COSMOS_ENDPOINT".to_string(),
                "http://127.0.0.1:8081/".to_string(),
            ),
            ("COSMOS_KEY".to_string(), "dGVzdC1rZXk=".to_string()),
            ("BIND_ADDRESS".to_string(), "127.0.0.1:0".to_string()),
        ]);
        vars.extend(overrides);

        let config = Config::from_vars(&vars)
            .map_err(|e| anyhow::anyhow!("Failed to create config: {}", e))?;

        let service = CounterService::new(
            Arc::new(store.clone()),
            config.counter_id.clone(),
            config.partition_key.clone(),
        );
        let state = Arc::new(AppState {
            service: Arc::new(service),
            config: config.clone(),
        });

        // A detached recorder: installing a global one would fail on the
        // second server spawned in the same test binary.
        let metrics_handle = PrometheusBuilder::new().build_recorder().handle();

        let app = routes::build_routes(state, metrics_handle);

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .map_err(|e| anyhow::anyhow!("Failed to bind test server: {}", e))?;

        let addr = listener
            .local_addr()
            .map_err(|e| anyhow::anyhow!("Failed to get local address: {}", e))?;

        let handle = tokio::spawn(async move {
            if let Err(e) = axum::serve(listener, app).await {
                eprintln!("Test server error: {}", e);
            }
        });

        Ok(Self {
            addr,
            store,
            config,
            _handle: handle,
        })
    }

    /// Get the base URL of the test server.
    pub fn url(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// Get the counter endpoint URL.
    pub fn counter_url(&self) -> String {
        format!("http://{}/api/counter", self.addr)
    }

    /// Get the socket address.
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Get the store shared with the server.
    pub fn store(&self) -> &InMemoryStore {
        &self.store
    }

    /// Get reference to the server configuration.
    pub fn config(&self) -> &Config {
        &self.config
    }
}

impl Drop for TestCounterServer {
    fn drop(&mut self) {
        // Abort the HTTP server task so it does not outlive the test.
        self._handle.abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_server_spawns_successfully() -> Result<(), anyhow::Error> {
        let server = TestCounterServer::spawn(InMemoryStore::new()).await?;

        assert!(server.url().starts_with("http://127.0.0.1:"));

        let response = reqwest::get(format!("{}/health", server.url())).await?;
        assert_eq!(response.status(), 200);
        assert_eq!(response.text().await?, "OK");

        Ok(())
    }

    #[tokio::test]
    async fn test_server_provides_addr() -> Result<(), anyhow::Error> {
        let server = TestCounterServer::spawn(InMemoryStore::new()).await?;

        let addr = server.addr();
        assert!(addr.ip().is_loopback());
        assert!(addr.port() > 0);
        assert_eq!(server.url(), format!("http://{}", addr));

        Ok(())
    }

    #[tokio::test]
    async fn test_server_shares_store() -> Result<(), anyhow::Error> {
        let server = TestCounterServer::spawn(InMemoryStore::new()).await?;

        let response = reqwest::Client::new()
            .post(server.counter_url())
            .send()
            .await?;
        assert_eq!(response.status(), 201);

        assert_eq!(server.store().create_count(), 1);
        Ok(())
    }

    #[tokio::test]
    async fn test_overrides_apply() -> Result<(), anyhow::Error> {
        let server = TestCounterServer::spawn_with_vars(
            InMemoryStore::new(),
            HashMap::from([("COSMOS_COUNTER_ID".to_string(), "homepage".to_string())]),
        )
        .await?;

        assert_eq!(server.config().counter_id, "homepage");
        Ok(())
    }
}

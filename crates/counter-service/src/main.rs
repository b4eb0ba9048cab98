//! Visitor Counter
//!
//! Entry point for the visitor counter HTTP service.

use counter_service::config::Config;
use counter_service::observability::metrics::init_metrics_recorder;
use counter_service::routes::{self, AppState};
use counter_service::services::CounterService;
use counter_service::store::CosmosStore;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Default for `COUNTER_DRAIN_SECONDS`.
const DEFAULT_DRAIN_SECONDS: u64 = 3;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "counter_service=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Visitor Counter");

    // Load configuration
    let config = Config::from_env().map_err(|e| {
        error!("Failed to load configuration: {}", e);
        e
    })?;

    info!(
        cosmos_endpoint = %config.cosmos_endpoint,
        database = %config.database_name,
        container = %config.container_name,
        counter_id = %config.counter_id,
        bind_address = %config.bind_address,
        "Configuration loaded successfully"
    );

    let metrics_handle = init_metrics_recorder().map_err(|e| {
        error!("Failed to initialize metrics: {}", e);
        e
    })?;

    let store = CosmosStore::new(&config).map_err(|e| {
        error!("Failed to create Cosmos DB client: {}", e);
        e
    })?;

    let service = CounterService::new(
        Arc::new(store),
        config.counter_id.clone(),
        config.partition_key.clone(),
    );

    // Parse bind address before moving config
    let addr: SocketAddr = config.bind_address.parse().map_err(|e| {
        error!("Invalid bind address: {}", e);
        e
    })?;

    let state = Arc::new(AppState {
        service: Arc::new(service),
        config,
    });

    let app = routes::build_routes(state, metrics_handle);

    info!("Visitor Counter listening on {}", addr);

    // Start server with graceful shutdown support
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Visitor Counter shutdown complete");

    Ok(())
}

/// Listens for shutdown signals (SIGTERM, SIGINT).
/// Returns once a signal arrives and the drain period has elapsed.
async fn shutdown_signal() {
    let ctrl_c = async {
        match signal::ctrl_c().await {
            Ok(()) => info!("Received SIGINT, starting graceful shutdown..."),
            Err(e) => error!("Failed to listen for SIGINT: {}", e),
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
                info!("Received SIGTERM, starting graceful shutdown...");
            }
            Err(e) => {
                error!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }

    let drain = drain_period(std::env::var("COUNTER_DRAIN_SECONDS").ok().as_deref());
    if drain.is_zero() {
        info!("Skipping drain period");
    } else {
        warn!(drain_secs = drain.as_secs(), "Draining in-flight requests");
        tokio::time::sleep(drain).await;
        info!("Drain period complete");
    }
}

/// Time to keep serving in-flight requests after a shutdown signal.
///
/// Counter requests are a single store round trip, so a few seconds is
/// plenty; unset or unparsable values fall back to the default.
fn drain_period(value: Option<&str>) -> Duration {
    let secs = value
        .and_then(|v| v.trim().parse::<u64>().ok())
        .unwrap_or(DEFAULT_DRAIN_SECONDS);
    Duration::from_secs(secs)
}

//! dualcache gateway - serves one two-level cache client over HTTP

use std::net::SocketAddr;

use anyhow::Context;
use tokio::signal;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use dualcache::connection::validate_db_index;
use dualcache::remote::RedisConnector;
use dualcache::{
    create_router, spawn_cleanup_task, AppState, CacheClient, ClientConfig, ClientRegistry,
    GatewayConfig, LocalStore,
};

const DEFAULT_CONNECTION: &str = "default";

/// Main entry point for the dualcache gateway.
///
/// # Startup Sequence
/// 1. Initialize tracing subscriber for logging
/// 2. Load client and gateway configuration from environment variables
/// 3. Create the shared local store and register the default client
/// 4. Start background TTL cleanup task
/// 5. Start HTTP server on configured port
/// 6. Handle graceful shutdown on SIGINT/SIGTERM, then close remote sessions
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "dualcache=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting dualcache gateway");

    let client_config = ClientConfig::from_env();
    let gateway = GatewayConfig::from_env();
    validate_db_index(gateway.db).context("invalid CACHE_DB")?;
    info!(
        "Configuration loaded: redis={}:{}, db={}, local_prefix={:?}, local_ttl={}s, port={}",
        client_config.host,
        client_config.port,
        gateway.db,
        client_config.local_prefix,
        client_config.local_ttl,
        gateway.server_port
    );

    let store = LocalStore::shared(client_config.local_capacity.max(1));
    let mut registry = ClientRegistry::new();
    let client = registry
        .get_or_register(DEFAULT_CONNECTION, || {
            let connector = RedisConnector::new(&client_config)?;
            CacheClient::with_store(client_config.clone(), connector, store.clone())
        })
        .context("failed to create cache client")?;
    info!("Cache client initialized");

    let cleanup_handle = spawn_cleanup_task(store, gateway.cleanup_interval);
    info!("Background cleanup task started");

    let app = create_router(AppState::new(client, gateway.db));

    let addr = SocketAddr::from(([0, 0, 0, 0], gateway.server_port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {}", addr))?;
    info!("Server listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(cleanup_handle))
        .await
        .context("server error")?;

    registry.remove(DEFAULT_CONNECTION);
    info!("Server shutdown complete");
    Ok(())
}

/// Waits for shutdown signal (Ctrl+C or SIGTERM), then aborts the cleanup task.
async fn shutdown_signal(cleanup_handle: tokio::task::JoinHandle<()>) {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, initiating shutdown...");
        }
        _ = terminate => {
            info!("Received SIGTERM, initiating shutdown...");
        }
    }

    cleanup_handle.abort();
    warn!("Cleanup task aborted");
}

//! MCP mesh registry server.
//!
//! Serves the registry HTTP API over the in-memory store, or over Postgres
//! when `DATABASE_URL` is set, and runs the periodic health sweep.

use anyhow::{Context, Result};
use clap::Parser;
use mesh_registry::{
    api::{AppState, router},
    config::RegistryConfig,
    registry::{
        adapters::{memory::InMemoryRegistryStore, postgres::PostgresRegistryStore},
        ports::RegistryStore,
        services::HealthMonitor,
    },
    telemetry::init_logging,
};
use mockable::DefaultClock;
use std::sync::Arc;
use tokio::{net::TcpListener, signal, task::JoinHandle};
use tracing::{info, warn};

#[tokio::main]
async fn main() -> Result<()> {
    if let Err(err) = dotenvy::dotenv()
        && !err.not_found()
    {
        return Err(err).context("failed to load .env file");
    }
    let config = RegistryConfig::parse();
    init_logging(&config.log_level)?;

    let Some(url) = config.database_url.as_deref() else {
        info!("using in-memory registry store");
        return serve(Arc::new(InMemoryRegistryStore::new()), &config).await;
    };
    let store = PostgresRegistryStore::connect(url, config.db_max_connections)
        .await
        .context("failed to connect to Postgres")?;
    store
        .apply_schema()
        .await
        .context("failed to apply registry schema")?;
    info!("using Postgres registry store");
    serve(Arc::new(store), &config).await
}

async fn serve<S>(store: Arc<S>, config: &RegistryConfig) -> Result<()>
where
    S: RegistryStore + 'static,
{
    let state = AppState::new(
        store,
        Arc::new(DefaultClock),
        config.selection_policy,
        config.health_settings(),
    );
    let monitor = state.health().clone();

    match monitor.cleanup_stale_on_startup().await {
        Ok(marked) => info!(marked, "startup cleanup finished"),
        Err(err) => warn!(error = %err, "startup cleanup failed"),
    }
    let sweeper = spawn_sweeper(monitor, config);

    let address = config.bind_address();
    let listener = TcpListener::bind(&address)
        .await
        .with_context(|| format!("failed to bind {address}"))?;
    info!(
        address = %address,
        policy = %config.selection_policy,
        cors = config.enable_cors,
        "registry listening"
    );

    let served = axum::serve(listener, router(state, config.enable_cors))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("HTTP server failed");
    sweeper.abort();
    info!("registry shutting down");
    served
}

fn spawn_sweeper<S>(monitor: HealthMonitor<S, DefaultClock>, config: &RegistryConfig) -> JoinHandle<()>
where
    S: RegistryStore + 'static,
{
    let period = config.sweep_interval();
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(period);
        ticker.tick().await;
        loop {
            ticker.tick().await;
            monitor.run_sweep().await;
        }
    })
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = signal::ctrl_c().await {
            warn!(error = %err, "failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(err) => {
                warn!(error = %err, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }
}

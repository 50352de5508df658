use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use sha2::{Digest, Sha256};
use tokio::signal;
use tracing::{error, info, warn};

use genjobs_core::{
    create_authenticator, load_config, validate_config, Authenticator, WorkerSupervisor,
};
use genjobs_server::api::create_router;
use genjobs_server::services::{config_path, Services};
use genjobs_server::state::AppState;
use genjobs_server::telemetry::init_tracing;

/// Application version
const VERSION: &str = env!("CARGO_PKG_VERSION");

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        error!("Fatal error: {:#}", e);
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    init_tracing("info,tower_http=debug");

    let config_path = config_path();

    info!("Loading configuration from {:?}", config_path);
    let config = load_config(&config_path)
        .with_context(|| format!("Failed to load config from {:?}", config_path))?;

    validate_config(&config).context("Configuration validation failed")?;

    let config_json = serde_json::to_string(&config).unwrap_or_default();
    let config_hash = format!("{:x}", Sha256::digest(config_json.as_bytes()));
    info!(
        version = VERSION,
        config_hash = &config_hash[..16],
        "Configuration loaded successfully"
    );
    info!("Auth method: {:?}", config.auth.method);
    info!("Database path: {:?}", config.database.path);

    let authenticator: Arc<dyn Authenticator> = Arc::from(
        create_authenticator(&config.auth).context("Failed to create authenticator")?,
    );
    info!("Using authenticator: {}", authenticator.method_name());

    let services = Services::open(&config)?;
    services.seed_bindings(&config)?;

    // The worker inherits the config path so both processes share one database.
    let mut supervisor_config = config.supervisor.clone();
    supervisor_config
        .env
        .entry("GENJOBS_CONFIG".to_string())
        .or_insert_with(|| config_path.display().to_string());
    let supervisor = Arc::new(WorkerSupervisor::new(supervisor_config));

    // Pick up jobs left queued by a previous run.
    match supervisor.ensure_running().await {
        Ok(started) => info!(pid = started.pid, "Worker ready"),
        Err(e) => warn!("Worker not started at boot: {}", e),
    }

    let state = Arc::new(AppState::new(
        config.clone(),
        authenticator,
        services,
        Arc::clone(&supervisor),
    ));

    let app = create_router(state);

    let addr = SocketAddr::new(config.server.host, config.server.port);
    info!("Starting server on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Server shutting down...");
    if supervisor.stop().await {
        info!("Worker stopped");
    }

    Ok(())
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM)
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

//! Job worker process.
//!
//! Claims jobs from the shared database and runs them until SIGTERM or
//! Ctrl+C. Normally started by the API server's supervisor, but any number
//! of workers may run against the same database.

use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::signal;
use tracing::{error, info};

use genjobs_core::{load_config, validate_config, JobOrchestrator};
use genjobs_server::services::{config_path, Services};
use genjobs_server::telemetry::init_tracing;

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        error!("Fatal error: {:#}", e);
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    init_tracing("info");

    let config_path = config_path();
    let config = load_config(&config_path)
        .with_context(|| format!("Failed to load config from {:?}", config_path))?;
    validate_config(&config).context("Configuration validation failed")?;

    let services = Services::open(&config)?;

    let worker_id = format!(
        "worker-{}-{}",
        std::process::id(),
        &uuid::Uuid::new_v4().simple().to_string()[..8]
    );
    let orchestrator = Arc::new(
        JobOrchestrator::new(
            config.orchestrator.clone(),
            worker_id.clone(),
            services.job_store,
            services.registry,
        )
        .context("Failed to create job orchestrator")?,
    );

    let runner = {
        let orchestrator = Arc::clone(&orchestrator);
        tokio::spawn(async move { orchestrator.run().await })
    };
    info!(worker_id = %worker_id, "Worker started");

    shutdown_signal().await;
    info!("Worker shutting down, finishing current job...");
    orchestrator.shutdown();
    runner.await.context("Orchestrator task panicked")?;
    info!("Worker stopped");

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

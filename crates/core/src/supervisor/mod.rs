//! Worker supervisor: keeps at most one local worker process alive.

mod config;

use std::process::ExitStatus;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use thiserror::Error;
use tokio::process::{Child, Command};
use tokio::sync::{oneshot, Mutex};
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use crate::metrics::{WORKER_RUNNING, WORKER_SPAWNS};

pub use config::SupervisorConfig;

/// Errors from starting the worker.
#[derive(Debug, Error)]
pub enum SupervisorError {
    #[error("failed to spawn worker {program}: {message}")]
    Spawn { program: String, message: String },

    #[error("worker exited before reporting a pid")]
    NoPid,
}

/// Result of [`WorkerSupervisor::ensure_running`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct EnsureRunning {
    pub pid: u32,
    pub already_running: bool,
}

/// Snapshot of the supervised worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SupervisorStatus {
    pub running: bool,
    pub pid: Option<u32>,
}

struct WorkerHandle {
    pid: u32,
    stop_tx: oneshot::Sender<()>,
    monitor: JoinHandle<()>,
}

/// Owns the worker child process.
///
/// A monitor task waits on the child, logs how it exited and clears the
/// handle. Nothing restarts it; the next `ensure_running` call does.
pub struct WorkerSupervisor {
    config: SupervisorConfig,
    worker: Arc<Mutex<Option<WorkerHandle>>>,
}

impl WorkerSupervisor {
    pub fn new(config: SupervisorConfig) -> Self {
        Self {
            config,
            worker: Arc::new(Mutex::new(None)),
        }
    }

    /// Start the worker unless one is already alive.
    pub async fn ensure_running(&self) -> Result<EnsureRunning, SupervisorError> {
        let mut worker = self.worker.lock().await;
        if let Some(handle) = worker.as_ref() {
            return Ok(EnsureRunning {
                pid: handle.pid,
                already_running: true,
            });
        }

        let program = self.config.program.display().to_string();
        let mut command = Command::new(&self.config.program);
        command
            .args(&self.config.args)
            .envs(&self.config.env)
            .stdin(std::process::Stdio::null())
            .kill_on_drop(true);

        let child = command.spawn().map_err(|e| SupervisorError::Spawn {
            program: program.clone(),
            message: e.to_string(),
        })?;
        let pid = child.id().ok_or(SupervisorError::NoPid)?;

        let (stop_tx, stop_rx) = oneshot::channel();
        let monitor = self.spawn_monitor(child, pid, stop_rx);
        *worker = Some(WorkerHandle {
            pid,
            stop_tx,
            monitor,
        });

        WORKER_SPAWNS.inc();
        WORKER_RUNNING.set(1);
        info!(pid, program = %program, "Worker process started");

        Ok(EnsureRunning {
            pid,
            already_running: false,
        })
    }

    pub async fn status(&self) -> SupervisorStatus {
        let worker = self.worker.lock().await;
        SupervisorStatus {
            running: worker.is_some(),
            pid: worker.as_ref().map(|h| h.pid),
        }
    }

    /// Stop the worker if one is running and wait for it to exit. Returns
    /// whether one was running.
    ///
    /// The worker gets SIGTERM so it can finish its current job. It is
    /// killed if it is still alive after `stop_grace_ms`.
    pub async fn stop(&self) -> bool {
        let handle = self.worker.lock().await.take();
        match handle {
            Some(handle) => {
                info!(pid = handle.pid, "Stopping worker process");
                let _ = handle.stop_tx.send(());
                if let Err(e) = handle.monitor.await {
                    error!(pid = handle.pid, "Worker monitor task failed: {}", e);
                }
                true
            }
            None => false,
        }
    }

    fn spawn_monitor(
        &self,
        mut child: Child,
        pid: u32,
        stop_rx: oneshot::Receiver<()>,
    ) -> JoinHandle<()> {
        let worker = Arc::clone(&self.worker);
        let grace = self.config.stop_grace();

        tokio::spawn(async move {
            let status = tokio::select! {
                status = child.wait() => status,
                _ = stop_rx => terminate(&mut child, pid, grace).await,
            };

            match status {
                Ok(status) if status.success() => info!(pid, "Worker process exited"),
                Ok(status) => match status.code() {
                    Some(code) => warn!(pid, code, "Worker process exited with non-zero status"),
                    None => warn!(pid, "Worker process terminated by signal"),
                },
                Err(e) => error!(pid, "Failed to wait for worker process: {}", e),
            }

            let mut worker = worker.lock().await;
            if worker.as_ref().is_some_and(|h| h.pid == pid) {
                *worker = None;
            }
            if worker.is_none() {
                WORKER_RUNNING.set(0);
            }
        })
    }
}

/// SIGTERM the child, then kill it if it outlives `grace`.
async fn terminate(child: &mut Child, pid: u32, grace: Duration) -> std::io::Result<ExitStatus> {
    if send_sigterm(pid).await {
        match tokio::time::timeout(grace, child.wait()).await {
            Ok(status) => return status,
            Err(_) => warn!(
                pid,
                grace_ms = grace.as_millis() as u64,
                "Worker still running after SIGTERM, killing it"
            ),
        }
    }

    if let Err(e) = child.kill().await {
        warn!(pid, "Failed to kill worker: {}", e);
    }
    child.wait().await
}

#[cfg(unix)]
async fn send_sigterm(pid: u32) -> bool {
    match Command::new("kill")
        .arg("-TERM")
        .arg(pid.to_string())
        .status()
        .await
    {
        Ok(status) if status.success() => true,
        Ok(status) => {
            warn!(pid, %status, "kill -TERM failed");
            false
        }
        Err(e) => {
            warn!(pid, "Failed to run kill: {}", e);
            false
        }
    }
}

#[cfg(not(unix))]
async fn send_sigterm(_pid: u32) -> bool {
    false
}

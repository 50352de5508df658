use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// How to launch the worker process.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SupervisorConfig {
    /// Worker executable. Resolved through `PATH` when not absolute.
    #[serde(default = "default_program")]
    pub program: PathBuf,

    #[serde(default)]
    pub args: Vec<String>,

    /// Extra environment for the worker, on top of the server's own.
    #[serde(default)]
    pub env: BTreeMap<String, String>,

    /// How long `stop` waits after SIGTERM before killing the worker.
    #[serde(default = "default_stop_grace_ms")]
    pub stop_grace_ms: u64,
}

fn default_stop_grace_ms() -> u64 {
    30_000
}

fn default_program() -> PathBuf {
    PathBuf::from("genjobs-worker")
}

impl Default for SupervisorConfig {
    fn default() -> Self {
        Self {
            program: default_program(),
            args: Vec::new(),
            env: BTreeMap::new(),
            stop_grace_ms: default_stop_grace_ms(),
        }
    }
}

impl SupervisorConfig {
    pub fn stop_grace(&self) -> Duration {
        Duration::from_millis(self.stop_grace_ms)
    }
}

//! HTTP surface and process wiring for the generation job pipeline.
//!
//! Two binaries share this library: `genjobs` serves the job API and owns
//! the worker supervisor, `genjobs-worker` runs the job orchestrator.

pub mod api;
pub mod metrics;
pub mod services;
pub mod state;
pub mod telemetry;

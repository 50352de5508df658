pub mod auth;
pub mod config;
pub mod connectivity;
mod db;
pub mod job;
pub mod metrics;
pub mod orchestrator;
pub mod provider;
pub mod registry;
pub mod supervisor;
pub mod testing;

pub use auth::{
    create_authenticator, ApiKeyAuthenticator, AuthError, AuthRequest, Authenticator, Identity,
    NoneAuthenticator,
};
pub use config::{
    load_config, load_config_from_str, validate_config, AuthMethod, Config, ConfigError,
    SanitizedConfig,
};
pub use connectivity::{
    ConnectionState, ConnectionStore, ConnectionTestResult, ConnectivityError,
    ConnectivityManager, SqliteConnectionStore, TestStatus,
};
pub use job::{
    validate_payload, CancelOutcome, EnqueueRequest, Enqueued, Job, JobFailure, JobFilter,
    JobKind, JobStatus, JobStore, JobStoreError, PayloadError, SqliteJobStore,
};
pub use orchestrator::{JobOrchestrator, JobOutcome, OrchestratorConfig, OrchestratorError};
pub use provider::{
    BackendHandle, BackendKind, Capability, ErrorClass, ProviderCatalog, ProviderError,
    RegisteredBackend,
};
pub use registry::{
    seed_bindings, BindingStore, ProviderBinding, ProviderRegistry, RegistryError,
    ResolvedBackend, SqliteBindingStore,
};
pub use supervisor::{
    EnsureRunning, SupervisorConfig, SupervisorError, SupervisorStatus, WorkerSupervisor,
};

//! Common test utilities for API testing with mock backends.
//!
//! This module provides a test fixture that creates an in-process router
//! over a temporary database, with mock providers in the catalog and a
//! worker supervisor that runs a harmless placeholder process.

#![allow(dead_code)]

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use serde_json::Value;
use tempfile::TempDir;
use tower::ServiceExt;

use genjobs_core::{
    config::{ApiKeyConfig, AuthConfig, AuthMethod},
    create_authenticator, load_config_from_str,
    testing::{fixtures, MockImageEnhancer, MockTextGenerator},
    Authenticator, BindingStore, Config, ConnectionStore, JobOrchestrator, JobStore,
    OrchestratorConfig, ProviderCatalog, SqliteBindingStore, SqliteConnectionStore,
    SqliteJobStore, WorkerSupervisor,
};
use genjobs_server::services::Services;
use genjobs_server::state::AppState;

/// Project with text and image bindings.
pub const PROJECT: &str = "shop-1";

/// API key accepted when the fixture uses key auth. Scoped to [`PROJECT`].
pub const API_KEY: &str = "test-key";

/// Test fixture for API tests with mock backends.
pub struct TestFixture {
    /// The Axum router for testing
    pub router: Router,
    /// User-managed text backend bound to [`PROJECT`]
    pub openai: MockTextGenerator,
    /// Platform-managed image backend bound to [`PROJECT`]
    pub upscaler: MockImageEnhancer,
    pub job_store: Arc<dyn JobStore>,
    pub services: Services,
    /// Temporary directory for the test database
    pub temp_dir: TempDir,
}

/// Response from a test request
#[derive(Debug)]
pub struct TestResponse {
    pub status: StatusCode,
    pub body: Value,
}

impl TestFixture {
    /// Create a fixture without authentication.
    pub async fn new() -> Self {
        Self::with_auth(AuthConfig {
            method: AuthMethod::None,
            keys: vec![],
        })
        .await
    }

    /// Create a fixture whose API key only reaches [`PROJECT`].
    pub async fn with_api_key() -> Self {
        Self::with_auth(AuthConfig {
            method: AuthMethod::ApiKey,
            keys: vec![ApiKeyConfig {
                key: API_KEY.to_string(),
                name: "shop-one".to_string(),
                projects: vec![PROJECT.to_string()],
            }],
        })
        .await
    }

    pub async fn with_auth(auth: AuthConfig) -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let db_path = temp_dir.path().join("test.db");

        let toml = format!(
            r#"
[auth]
method = "none"

[database]
path = {:?}

[supervisor]
program = "sleep"
args = ["30"]

[[bindings]]
project_id = "{project}"
capability = "text_generation"
backend = "openai"
priority = 10

[[bindings]]
project_id = "{project}"
capability = "image_enhancement"
backend = "upscaler"
priority = 10
"#,
            db_path,
            project = PROJECT
        );
        let mut config: Config = load_config_from_str(&toml).expect("Failed to parse config");
        config.auth = auth;
        config.orchestrator = fast_orchestrator_config();

        let openai = MockTextGenerator::new("openai");
        let upscaler = MockImageEnhancer::new("upscaler");
        let catalog = Arc::new(
            ProviderCatalog::new()
                .with_backend(fixtures::text_backend(&openai, false, 50))
                .with_backend(fixtures::image_backend(&upscaler, true, 10)),
        );

        let job_store: Arc<dyn JobStore> =
            Arc::new(SqliteJobStore::new(&db_path).expect("Failed to create job store"));
        let bindings: Arc<dyn BindingStore> =
            Arc::new(SqliteBindingStore::new(&db_path).expect("Failed to create binding store"));
        let connections: Arc<dyn ConnectionStore> = Arc::new(
            SqliteConnectionStore::new(&db_path).expect("Failed to create connection store"),
        );

        let services = Services::from_parts(
            Arc::clone(&job_store),
            bindings,
            connections,
            catalog,
            &config,
        );
        services
            .seed_bindings(&config)
            .expect("Failed to seed bindings");

        let authenticator: Arc<dyn Authenticator> = Arc::from(
            create_authenticator(&config.auth).expect("Failed to create authenticator"),
        );
        let supervisor = Arc::new(WorkerSupervisor::new(config.supervisor.clone()));

        let state_services = Services {
            job_store: Arc::clone(&services.job_store),
            bindings: Arc::clone(&services.bindings),
            registry: Arc::clone(&services.registry),
            connectivity: Arc::clone(&services.connectivity),
        };
        let state = Arc::new(AppState::new(
            config,
            authenticator,
            state_services,
            supervisor,
        ));

        let router = genjobs_server::api::create_router(state);

        Self {
            router,
            openai,
            upscaler,
            job_store,
            services,
            temp_dir,
        }
    }

    /// An in-process worker over the fixture's database and catalog.
    pub fn orchestrator(&self) -> JobOrchestrator {
        JobOrchestrator::new(
            fast_orchestrator_config(),
            "test-worker",
            Arc::clone(&self.job_store),
            Arc::clone(&self.services.registry),
        )
        .expect("Failed to create orchestrator")
    }

    /// Run queued jobs until none is claimable.
    pub async fn drain(&self) {
        let orchestrator = self.orchestrator();
        while orchestrator
            .run_once()
            .await
            .expect("Orchestrator error")
            .is_some()
        {}
    }

    /// Send a GET request to the test server.
    pub async fn get(&self, path: &str) -> TestResponse {
        self.request("GET", path, None, None).await
    }

    /// Send a POST request with JSON body.
    pub async fn post(&self, path: &str, body: Value) -> TestResponse {
        self.request("POST", path, Some(body), None).await
    }

    /// Send a POST request without a body.
    pub async fn post_empty(&self, path: &str) -> TestResponse {
        self.request("POST", path, None, None).await
    }

    /// Send a GET request with an API key.
    pub async fn get_with_key(&self, path: &str, key: &str) -> TestResponse {
        self.request("GET", path, None, Some(key)).await
    }

    /// Send a POST request with JSON body and an API key.
    pub async fn post_with_key(&self, path: &str, body: Value, key: &str) -> TestResponse {
        self.request("POST", path, Some(body), Some(key)).await
    }

    /// Send a request to the test server.
    async fn request(
        &self,
        method: &str,
        path: &str,
        body: Option<Value>,
        api_key: Option<&str>,
    ) -> TestResponse {
        let mut request_builder = Request::builder().method(method).uri(path);

        if let Some(key) = api_key {
            request_builder = request_builder.header("Authorization", format!("Bearer {}", key));
        }

        let body = if let Some(json_body) = body {
            request_builder = request_builder.header("Content-Type", "application/json");
            Body::from(serde_json::to_vec(&json_body).unwrap())
        } else {
            Body::empty()
        };

        let request = request_builder.body(body).unwrap();

        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("Failed to send request");

        let status = response.status();
        let body_bytes = response
            .into_body()
            .collect()
            .await
            .expect("Failed to collect body")
            .to_bytes();

        let body: Value = if body_bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&body_bytes)
                .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&body_bytes).into()))
        };

        TestResponse { status, body }
    }
}

/// Orchestrator timings short enough for tests.
pub fn fast_orchestrator_config() -> OrchestratorConfig {
    OrchestratorConfig {
        lease_duration_ms: 5_000,
        heartbeat_interval_ms: 1_000,
        call_timeout_ms: 2_000,
        backoff_base_ms: 1,
        backoff_max_ms: 5,
        max_attempts: 5,
        poll_interval_ms: 10,
    }
}

/// Helper to assert a response has expected status.
#[macro_export]
macro_rules! assert_status {
    ($response:expr, $status:expr) => {
        assert_eq!(
            $response.status, $status,
            "Expected status {:?}, got {:?}. Body: {}",
            $status,
            $response.status,
            serde_json::to_string_pretty(&$response.body).unwrap_or_default()
        );
    };
}

/// Helper to assert a JSON path equals expected value.
#[macro_export]
macro_rules! assert_json_path {
    ($json:expr, $path:expr, $expected:expr) => {
        let actual = &$json[$path];
        assert_eq!(
            actual, &$expected,
            "Path '{}' expected {:?}, got {:?}",
            $path, $expected, actual
        );
    };
}

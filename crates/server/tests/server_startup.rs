//! Process-level tests: the real `genjobs` binary with its supervised worker.

use std::io::Write;
use std::net::TcpListener;
use std::path::Path;
use std::time::Duration;

use axum::{routing::post, Json, Router};
use reqwest::Client;
use serde_json::{json, Value};
use tempfile::{NamedTempFile, TempDir};
use tokio::time::{sleep, timeout};

/// Find an available port
fn get_available_port() -> u16 {
    TcpListener::bind("127.0.0.1:0")
        .unwrap()
        .local_addr()
        .unwrap()
        .port()
}

/// Create a minimal valid config
fn minimal_config(port: u16, db_path: &Path) -> String {
    format!(
        r#"
[auth]
method = "none"

[server]
host = "127.0.0.1"
port = {}

[database]
path = {:?}

[supervisor]
program = "sleep"
args = ["30"]
"#,
        port, db_path
    )
}

fn write_config(content: &str) -> NamedTempFile {
    let mut temp_file = NamedTempFile::new().unwrap();
    temp_file.write_all(content.as_bytes()).unwrap();
    temp_file.flush().unwrap();
    temp_file
}

/// Spawn the server and return a handle
async fn spawn_server(config_path: &Path) -> tokio::process::Child {
    tokio::process::Command::new(env!("CARGO_BIN_EXE_genjobs"))
        .env("GENJOBS_CONFIG", config_path)
        .env("RUST_LOG", "error") // Quiet logs during tests
        .kill_on_drop(true)
        .spawn()
        .expect("Failed to spawn server")
}

/// Wait for server to be ready
async fn wait_for_server(port: u16, max_attempts: u32) -> bool {
    let client = Client::new();
    for _ in 0..max_attempts {
        if client
            .get(format!("http://127.0.0.1:{}/api/v1/health", port))
            .send()
            .await
            .is_ok()
        {
            return true;
        }
        sleep(Duration::from_millis(50)).await;
    }
    false
}

/// Ask the server to shut down gracefully so it stops its worker.
#[cfg(unix)]
async fn terminate(server: &mut tokio::process::Child) {
    if let Some(pid) = server.id() {
        let _ = tokio::process::Command::new("kill")
            .arg("-TERM")
            .arg(pid.to_string())
            .status()
            .await;
    }
    let _ = timeout(Duration::from_secs(10), server.wait()).await;
    server.kill().await.ok();
}

#[tokio::test]
async fn test_health_endpoint() {
    let port = get_available_port();
    let temp_dir = TempDir::new().unwrap();
    let config = write_config(&minimal_config(port, &temp_dir.path().join("genjobs.db")));

    let mut server = spawn_server(config.path()).await;

    assert!(
        wait_for_server(port, 40).await,
        "Server did not start in time"
    );

    let client = Client::new();
    let response = client
        .get(format!("http://127.0.0.1:{}/api/v1/health", port))
        .send()
        .await
        .expect("Failed to send request");

    assert!(response.status().is_success());

    let json: Value = response.json().await.expect("Failed to parse JSON");
    assert_eq!(json["status"], "ok");

    server.kill().await.ok();
}

#[tokio::test]
async fn test_config_endpoint_returns_sanitized() {
    let port = get_available_port();
    let temp_dir = TempDir::new().unwrap();
    let content = format!(
        "{}\n[[providers]]\nname = \"openai\"\nkind = \"openai\"\napi_key = \"sk-very-secret\"\n",
        minimal_config(port, &temp_dir.path().join("genjobs.db"))
    );
    let config = write_config(&content);

    let mut server = spawn_server(config.path()).await;

    assert!(
        wait_for_server(port, 40).await,
        "Server did not start in time"
    );

    let client = Client::new();
    let response = client
        .get(format!("http://127.0.0.1:{}/api/v1/config", port))
        .send()
        .await
        .expect("Failed to send request");

    assert!(response.status().is_success());

    let text = response.text().await.unwrap();
    assert!(!text.contains("sk-very-secret"));
    let json: Value = serde_json::from_str(&text).unwrap();
    assert_eq!(json["auth"]["method"], "none");
    assert_eq!(json["server"]["port"], port);
    assert_eq!(json["providers"][0]["api_key_configured"], true);

    server.kill().await.ok();
}

#[tokio::test]
async fn test_missing_config_file_exits_with_error() {
    let result = timeout(
        Duration::from_secs(5),
        tokio::process::Command::new(env!("CARGO_BIN_EXE_genjobs"))
            .env("GENJOBS_CONFIG", "/nonexistent/config.toml")
            .env("RUST_LOG", "error")
            .output(),
    )
    .await
    .expect("Command timed out")
    .expect("Failed to execute command");

    assert!(!result.status.success());
}

#[tokio::test]
async fn test_missing_auth_section_exits_with_error() {
    let config = write_config(
        r#"
[server]
port = 8080
"#,
    );

    let result = timeout(
        Duration::from_secs(5),
        tokio::process::Command::new(env!("CARGO_BIN_EXE_genjobs"))
            .env("GENJOBS_CONFIG", config.path())
            .env("RUST_LOG", "error")
            .output(),
    )
    .await
    .expect("Command timed out")
    .expect("Failed to execute command");

    assert!(!result.status.success());
}

#[tokio::test]
async fn test_worker_missing_config_exits_with_error() {
    let result = timeout(
        Duration::from_secs(5),
        tokio::process::Command::new(env!("CARGO_BIN_EXE_genjobs-worker"))
            .env("GENJOBS_CONFIG", "/nonexistent/config.toml")
            .env("RUST_LOG", "error")
            .output(),
    )
    .await
    .expect("Command timed out")
    .expect("Failed to execute command");

    assert!(!result.status.success());
}

/// Image enhancer speaking the HTTP media protocol. Echoes the requested scale.
async fn spawn_mock_upscaler() -> u16 {
    async fn enhance(Json(body): Json<Value>) -> Json<Value> {
        Json(json!({
            "image": format!("enhanced:{}", body["image"].as_str().unwrap_or_default()),
            "scale_factor": body["scale_factor"],
        }))
    }

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    let app = Router::new().route("/v1/enhance", post(enhance));
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    port
}

#[cfg(unix)]
#[tokio::test]
async fn test_enqueued_job_runs_in_supervised_worker() {
    let upscaler_port = spawn_mock_upscaler().await;
    let port = get_available_port();
    let temp_dir = TempDir::new().unwrap();

    let content = format!(
        r#"
[auth]
method = "none"

[server]
host = "127.0.0.1"
port = {port}

[database]
path = {db:?}

[orchestrator]
poll_interval_ms = 50

[supervisor]
program = {worker:?}

[[providers]]
name = "upscaler"
kind = "http_image_enhancer"
api_base = "http://127.0.0.1:{upscaler_port}"
managed = true

[[bindings]]
project_id = "shop-1"
capability = "image_enhancement"
backend = "upscaler"
"#,
        port = port,
        db = temp_dir.path().join("genjobs.db"),
        worker = env!("CARGO_BIN_EXE_genjobs-worker"),
        upscaler_port = upscaler_port,
    );
    let config = write_config(&content);

    let mut server = spawn_server(config.path()).await;
    assert!(
        wait_for_server(port, 40).await,
        "Server did not start in time"
    );

    let client = Client::new();
    let base = format!("http://127.0.0.1:{}/api/v1", port);

    let created: Value = client
        .post(format!("{}/jobs", base))
        .json(&json!({
            "kind": "image_enhancement",
            "project_id": "shop-1",
            "payload": {"image": "aGk=", "scale_factor": 2}
        }))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let job_id = created["job_id"].as_str().expect("job id").to_string();

    let mut job = Value::Null;
    for _ in 0..100 {
        job = client
            .get(format!("{}/jobs/{}", base, job_id))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        if job["status"] == "succeeded" || job["status"] == "failed" || job["status"] == "dead" {
            break;
        }
        sleep(Duration::from_millis(100)).await;
    }

    assert_eq!(job["status"], "succeeded", "job: {}", job);
    assert_eq!(job["result"]["image"], "enhanced:aGk=");
    assert_eq!(job["result"]["scale_factor"], 2);

    let status: Value = client
        .get(format!("{}/supervisor/status", base))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(status["running"], true);

    terminate(&mut server).await;
}

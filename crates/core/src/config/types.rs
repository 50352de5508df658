use serde::{Deserialize, Serialize};
use std::net::IpAddr;
use std::path::PathBuf;

use crate::orchestrator::OrchestratorConfig;
use crate::provider::{BackendKind, Capability};
use crate::supervisor::SupervisorConfig;

/// Root configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    pub auth: AuthConfig,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub orchestrator: OrchestratorConfig,
    #[serde(default)]
    pub supervisor: SupervisorConfig,
    /// Provider backends available to the pipeline.
    #[serde(default)]
    pub providers: Vec<ProviderConfig>,
    /// Per-project capability bindings loaded at startup.
    #[serde(default)]
    pub bindings: Vec<BindingConfig>,
}

/// Server configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: IpAddr,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

fn default_host() -> IpAddr {
    IpAddr::V4(std::net::Ipv4Addr::UNSPECIFIED)
}

fn default_port() -> u16 {
    8080
}

/// Authentication configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AuthConfig {
    pub method: AuthMethod,
    /// API keys and the projects each one may act on (required for `api_key`).
    #[serde(default)]
    pub keys: Vec<ApiKeyConfig>,
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AuthMethod {
    None,
    ApiKey,
}

/// A single API key scoped to a set of projects.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ApiKeyConfig {
    pub key: String,
    /// Caller name recorded on the identity.
    pub name: String,
    /// Project ids this key may enqueue for and read. Empty means all.
    #[serde(default)]
    pub projects: Vec<String>,
}

/// Database configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_db_path")]
    pub path: PathBuf,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
        }
    }
}

fn default_db_path() -> PathBuf {
    PathBuf::from("genjobs.db")
}

/// A provider backend definition.
///
/// `name` doubles as the integration `provider_type` used by connectivity tests.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ProviderConfig {
    pub name: String,
    pub kind: BackendKind,
    /// API key, when the backend needs one.
    #[serde(default)]
    pub api_key: Option<String>,
    /// Override for the backend's base URL.
    #[serde(default)]
    pub api_base: Option<String>,
    /// Model name for text backends.
    #[serde(default)]
    pub model: Option<String>,
    /// Platform-managed backends cannot be configured or tested by users.
    #[serde(default)]
    pub managed: bool,
    /// Priority given to bindings created by a successful connectivity test.
    #[serde(default = "default_priority")]
    pub default_priority: i64,
}

fn default_priority() -> i64 {
    100
}

/// Static binding of a capability to a backend for one project.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct BindingConfig {
    pub project_id: String,
    pub capability: Capability,
    pub backend: String,
    #[serde(default = "default_priority")]
    pub priority: i64,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

fn default_enabled() -> bool {
    true
}

/// Sanitized config for API responses (secrets redacted)
#[derive(Debug, Clone, Serialize)]
pub struct SanitizedConfig {
    pub auth: SanitizedAuthConfig,
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub orchestrator: OrchestratorConfig,
    pub supervisor: SupervisorConfig,
    pub providers: Vec<SanitizedProviderConfig>,
    pub bindings: Vec<BindingConfig>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SanitizedAuthConfig {
    pub method: String,
    pub key_count: usize,
}

/// Provider config with the API key hidden.
#[derive(Debug, Clone, Serialize)]
pub struct SanitizedProviderConfig {
    pub name: String,
    pub kind: BackendKind,
    pub api_key_configured: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_base: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    pub managed: bool,
}

impl From<&Config> for SanitizedConfig {
    fn from(config: &Config) -> Self {
        Self {
            auth: SanitizedAuthConfig {
                method: match config.auth.method {
                    AuthMethod::None => "none".to_string(),
                    AuthMethod::ApiKey => "api_key".to_string(),
                },
                key_count: config.auth.keys.len(),
            },
            server: config.server.clone(),
            database: config.database.clone(),
            orchestrator: config.orchestrator.clone(),
            supervisor: config.supervisor.clone(),
            providers: config
                .providers
                .iter()
                .map(|p| SanitizedProviderConfig {
                    name: p.name.clone(),
                    kind: p.kind,
                    api_key_configured: p.api_key.as_deref().is_some_and(|k| !k.is_empty()),
                    api_base: p.api_base.clone(),
                    model: p.model.clone(),
                    managed: p.managed,
                })
                .collect(),
            bindings: config.bindings.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deserialize_valid_config_with_none_auth() {
        let toml = r#"
[auth]
method = "none"

[server]
host = "127.0.0.1"
port = 9000
"#;
        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(config.auth.method, AuthMethod::None);
        assert_eq!(config.server.port, 9000);
        assert_eq!(config.server.host.to_string(), "127.0.0.1");
        assert!(config.providers.is_empty());
    }

    #[test]
    fn test_deserialize_with_defaults() {
        let toml = r#"
[auth]
method = "none"
"#;
        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.server.host.to_string(), "0.0.0.0");
        assert_eq!(config.database.path.to_str().unwrap(), "genjobs.db");
        assert_eq!(config.orchestrator.max_attempts, 5);
    }

    #[test]
    fn test_deserialize_missing_auth_fails() {
        let toml = r#"
[server]
port = 8080
"#;
        let result: Result<Config, _> = toml::from_str(toml);
        assert!(result.is_err());
    }

    #[test]
    fn test_deserialize_providers_and_bindings() {
        let toml = r#"
[auth]
method = "api_key"

[[auth.keys]]
key = "k1"
name = "shop-one"
projects = ["p1"]

[[providers]]
name = "openai"
kind = "openai"
api_key = "sk-test"
model = "gpt-4o-mini"

[[providers]]
name = "upscaler"
kind = "http_image_enhancer"
api_base = "http://upscaler.internal"
managed = true

[[bindings]]
project_id = "p1"
capability = "text_generation"
backend = "openai"
priority = 10
"#;
        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(config.auth.keys[0].projects, vec!["p1".to_string()]);
        assert_eq!(config.providers.len(), 2);
        assert_eq!(config.providers[0].kind, BackendKind::OpenAi);
        assert!(config.providers[1].managed);
        assert_eq!(config.providers[1].default_priority, 100);

        let binding = &config.bindings[0];
        assert_eq!(binding.capability, Capability::TextGeneration);
        assert_eq!(binding.priority, 10);
        assert!(binding.enabled);
    }

    #[test]
    fn test_sanitized_config_hides_keys() {
        let toml = r#"
[auth]
method = "api_key"

[[auth.keys]]
key = "secret"
name = "ops"

[[providers]]
name = "openai"
kind = "openai"
api_key = "sk-secret"
"#;
        let config: Config = toml::from_str(toml).unwrap();
        let sanitized = SanitizedConfig::from(&config);
        assert_eq!(sanitized.auth.method, "api_key");
        assert_eq!(sanitized.auth.key_count, 1);
        assert!(sanitized.providers[0].api_key_configured);

        let json = serde_json::to_string(&sanitized).unwrap();
        assert!(!json.contains("sk-secret"));
        assert!(!json.contains("\"secret\""));
    }
}

use std::collections::HashSet;

use super::{types::Config, AuthMethod, ConfigError};

/// Validate configuration
/// Currently validates:
/// - Server port is not 0
/// - `api_key` auth has at least one key
/// - Orchestrator timings are coherent
/// - Provider names are unique and bindings reference known providers
pub fn validate_config(config: &Config) -> Result<(), ConfigError> {
    if config.server.port == 0 {
        return Err(ConfigError::ValidationError(
            "server.port cannot be 0".to_string(),
        ));
    }

    if config.auth.method == AuthMethod::ApiKey && config.auth.keys.is_empty() {
        return Err(ConfigError::ValidationError(
            "auth.keys must not be empty when using api_key auth".to_string(),
        ));
    }

    config
        .orchestrator
        .validate()
        .map_err(ConfigError::ValidationError)?;

    let mut names = HashSet::new();
    for provider in &config.providers {
        if !names.insert(provider.name.as_str()) {
            return Err(ConfigError::ValidationError(format!(
                "duplicate provider name: {}",
                provider.name
            )));
        }
    }

    for binding in &config.bindings {
        let Some(provider) = config.providers.iter().find(|p| p.name == binding.backend) else {
            return Err(ConfigError::ValidationError(format!(
                "binding for project {} references unknown provider {}",
                binding.project_id, binding.backend
            )));
        };
        if !provider.kind.capabilities().contains(&binding.capability) {
            return Err(ConfigError::ValidationError(format!(
                "provider {} does not serve capability {}",
                provider.name, binding.capability
            )));
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::load_config_from_str;

    const BASE: &str = r#"
[auth]
method = "none"

[[providers]]
name = "openai"
kind = "openai"
api_key = "sk"
"#;

    #[test]
    fn test_validate_valid_config() {
        let config = load_config_from_str(BASE).unwrap();
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn test_validate_port_zero_fails() {
        let mut config = load_config_from_str(BASE).unwrap();
        config.server.port = 0;
        let result = validate_config(&config);
        assert!(matches!(result, Err(ConfigError::ValidationError(_))));
    }

    #[test]
    fn test_validate_api_key_without_keys_fails() {
        let mut config = load_config_from_str(BASE).unwrap();
        config.auth.method = AuthMethod::ApiKey;
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_validate_binding_unknown_provider() {
        let toml = format!(
            "{}\n{}",
            BASE,
            r#"
[[bindings]]
project_id = "p1"
capability = "text_generation"
backend = "missing"
"#
        );
        let config = load_config_from_str(&toml).unwrap();
        let err = validate_config(&config).unwrap_err();
        assert!(err.to_string().contains("unknown provider missing"));
    }

    #[test]
    fn test_validate_binding_wrong_capability() {
        let toml = format!(
            "{}\n{}",
            BASE,
            r#"
[[bindings]]
project_id = "p1"
capability = "image_enhancement"
backend = "openai"
"#
        );
        let config = load_config_from_str(&toml).unwrap();
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_validate_duplicate_provider() {
        let toml = format!(
            "{}\n{}",
            BASE,
            r#"
[[providers]]
name = "openai"
kind = "openai"
"#
        );
        let config = load_config_from_str(&toml).unwrap();
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_validate_heartbeat_must_be_shorter_than_lease() {
        let mut config = load_config_from_str(BASE).unwrap();
        config.orchestrator.heartbeat_interval_ms = config.orchestrator.lease_duration_ms;
        assert!(validate_config(&config).is_err());
    }
}

//! Caller authentication for the job API.
//!
//! The panel's session layer is out of scope; this module only maps request
//! credentials to an [`Identity`] that says which projects the caller owns.

mod api_key;
mod none;
mod types;

pub use api_key::*;
pub use none::*;
pub use types::*;

use async_trait::async_trait;
use thiserror::Error;

use crate::config::AuthConfig;

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Authentication required")]
    NotAuthenticated,

    #[error("Invalid credentials: {0}")]
    InvalidCredentials(String),

    #[error("Configuration error: {0}")]
    ConfigurationError(String),
}

#[async_trait]
pub trait Authenticator: Send + Sync {
    /// Authenticate a request and return the identity
    async fn authenticate(&self, request: &AuthRequest) -> Result<Identity, AuthError>;

    /// Name of this authentication method
    fn method_name(&self) -> &'static str;
}

/// Factory function to create authenticator from config
pub fn create_authenticator(config: &AuthConfig) -> Result<Box<dyn Authenticator>, AuthError> {
    use crate::config::AuthMethod;

    match config.method {
        AuthMethod::None => Ok(Box::new(NoneAuthenticator::new())),
        AuthMethod::ApiKey => {
            if config.keys.is_empty() {
                return Err(AuthError::ConfigurationError(
                    "auth.keys must be set when using ApiKey auth method".to_string(),
                ));
            }
            Ok(Box::new(ApiKeyAuthenticator::new(config.keys.clone())))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ApiKeyConfig, AuthMethod};

    #[test]
    fn test_create_authenticator_none() {
        let config = AuthConfig {
            method: AuthMethod::None,
            keys: vec![],
        };
        let auth = create_authenticator(&config).unwrap();
        assert_eq!(auth.method_name(), "none");
    }

    #[test]
    fn test_create_authenticator_api_key() {
        let config = AuthConfig {
            method: AuthMethod::ApiKey,
            keys: vec![ApiKeyConfig {
                key: "secret-key".to_string(),
                name: "ops".to_string(),
                projects: vec![],
            }],
        };
        let auth = create_authenticator(&config).unwrap();
        assert_eq!(auth.method_name(), "api_key");
    }

    #[test]
    fn test_create_authenticator_api_key_missing_keys() {
        let config = AuthConfig {
            method: AuthMethod::ApiKey,
            keys: vec![],
        };
        let result = create_authenticator(&config);
        assert!(matches!(result, Err(AuthError::ConfigurationError(_))));
    }
}

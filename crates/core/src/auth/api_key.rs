//! API Key authentication.

use async_trait::async_trait;

use super::{AuthError, AuthRequest, Authenticator, Identity};
use crate::config::ApiKeyConfig;

/// Authenticator that validates requests against the configured API keys.
///
/// Accepts the key in either:
/// - `Authorization: Bearer <key>` header
/// - `X-API-Key: <key>` header
///
/// Each key carries the list of projects its caller owns.
pub struct ApiKeyAuthenticator {
    keys: Vec<ApiKeyConfig>,
}

impl ApiKeyAuthenticator {
    pub fn new(keys: Vec<ApiKeyConfig>) -> Self {
        Self { keys }
    }

    /// Extract API key from request headers.
    fn extract_key(&self, request: &AuthRequest) -> Option<String> {
        if let Some(auth_header) = request.headers.get("authorization") {
            if let Some(key) = auth_header
                .strip_prefix("Bearer ")
                .or_else(|| auth_header.strip_prefix("bearer "))
            {
                return Some(key.to_string());
            }
        }

        request.headers.get("x-api-key").cloned()
    }
}

#[async_trait]
impl Authenticator for ApiKeyAuthenticator {
    async fn authenticate(&self, request: &AuthRequest) -> Result<Identity, AuthError> {
        let provided_key = self
            .extract_key(request)
            .ok_or(AuthError::NotAuthenticated)?;

        // Check every key so timing does not reveal which one matched.
        let mut matched = None;
        for entry in &self.keys {
            if constant_time_eq(provided_key.as_bytes(), entry.key.as_bytes()) {
                matched = Some(entry);
            }
        }

        let entry =
            matched.ok_or_else(|| AuthError::InvalidCredentials("Invalid API key".to_string()))?;

        Ok(Identity {
            user_id: entry.name.clone(),
            method: "api_key".to_string(),
            projects: if entry.projects.is_empty() {
                None
            } else {
                Some(entry.projects.clone())
            },
        })
    }

    fn method_name(&self) -> &'static str {
        "api_key"
    }
}

/// Constant-time byte comparison to prevent timing attacks.
fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }

    let mut result = 0u8;
    for (x, y) in a.iter().zip(b.iter()) {
        result |= x ^ y;
    }
    result == 0
}

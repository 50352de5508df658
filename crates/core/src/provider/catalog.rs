//! Name -> backend lookup built from configuration.
//!
//! This is the only place backends are looked up by string; past this point
//! the pipeline works with [`BackendHandle`] values.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tracing::{info, warn};

use super::anthropic::AnthropicClient;
use super::media::{HttpImageEnhancer, HttpLipSyncer};
use super::openai::OpenAiClient;
use super::scraper::HttpScraper;
use super::traits::BackendHandle;
use super::types::BackendKind;
use crate::config::ProviderConfig;

/// A backend plus the metadata the registry and connectivity manager need.
#[derive(Debug, Clone)]
pub struct RegisteredBackend {
    pub name: String,
    pub handle: BackendHandle,
    /// Platform-managed: not user-configurable, never tested.
    pub managed: bool,
    pub default_priority: i64,
}

/// All backends known to this process, keyed by name.
#[derive(Debug, Clone, Default)]
pub struct ProviderCatalog {
    backends: HashMap<String, RegisteredBackend>,
}

impl ProviderCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build backends from config. Entries that cannot be built (missing
    /// API key or base URL) are logged and skipped.
    pub fn from_config(providers: &[ProviderConfig], timeout: Duration) -> Self {
        let mut catalog = Self::new();
        for provider in providers {
            match build_backend(provider, timeout) {
                Ok(handle) => {
                    info!(
                        backend = %provider.name,
                        kind = ?provider.kind,
                        managed = provider.managed,
                        "Registered provider backend"
                    );
                    catalog.insert(RegisteredBackend {
                        name: provider.name.clone(),
                        handle,
                        managed: provider.managed,
                        default_priority: provider.default_priority,
                    });
                }
                Err(reason) => {
                    warn!(backend = %provider.name, "Skipping provider backend: {}", reason);
                }
            }
        }
        catalog
    }

    pub fn insert(&mut self, backend: RegisteredBackend) {
        self.backends.insert(backend.name.clone(), backend);
    }

    /// Builder-style insert, handy for tests.
    pub fn with_backend(mut self, backend: RegisteredBackend) -> Self {
        self.insert(backend);
        self
    }

    pub fn get(&self, name: &str) -> Option<&RegisteredBackend> {
        self.backends.get(name)
    }

    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.backends.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    pub fn len(&self) -> usize {
        self.backends.len()
    }

    pub fn is_empty(&self) -> bool {
        self.backends.is_empty()
    }
}

fn build_backend(config: &ProviderConfig, timeout: Duration) -> Result<BackendHandle, String> {
    let api_key = config.api_key.as_deref().filter(|k| !k.is_empty());

    let handle = match config.kind {
        BackendKind::OpenAi => {
            let key = api_key.ok_or("openai backend requires api_key")?;
            let mut client = match &config.api_base {
                Some(base) => OpenAiClient::with_api_base(&config.name, key, base, timeout),
                None => OpenAiClient::new(&config.name, key, timeout),
            };
            if let Some(model) = &config.model {
                client = client.with_model(model);
            }
            BackendHandle::Text(Arc::new(client))
        }
        BackendKind::Anthropic => {
            let key = api_key.ok_or("anthropic backend requires api_key")?;
            let mut client = match &config.api_base {
                Some(base) => AnthropicClient::with_api_base(&config.name, key, base, timeout),
                None => AnthropicClient::new(&config.name, key, timeout),
            };
            if let Some(model) = &config.model {
                client = client.with_model(model);
            }
            BackendHandle::Text(Arc::new(client))
        }
        BackendKind::HttpImageEnhancer => {
            let base = config
                .api_base
                .as_deref()
                .ok_or("http_image_enhancer backend requires api_base")?;
            BackendHandle::Image(Arc::new(HttpImageEnhancer::new(
                &config.name,
                base,
                api_key,
                timeout,
            )))
        }
        BackendKind::HttpLipSync => {
            let base = config
                .api_base
                .as_deref()
                .ok_or("http_lip_sync backend requires api_base")?;
            BackendHandle::LipSync(Arc::new(HttpLipSyncer::new(
                &config.name,
                base,
                api_key,
                timeout,
            )))
        }
        BackendKind::HttpScraper => {
            BackendHandle::Scrape(Arc::new(HttpScraper::new(&config.name, timeout)))
        }
    };

    Ok(handle)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::Capability;

    fn provider(name: &str, kind: BackendKind) -> ProviderConfig {
        ProviderConfig {
            name: name.to_string(),
            kind,
            api_key: None,
            api_base: None,
            model: None,
            managed: false,
            default_priority: 100,
        }
    }

    #[test]
    fn test_from_config_builds_and_skips() {
        let mut openai = provider("openai", BackendKind::OpenAi);
        openai.api_key = Some("sk-test".to_string());
        let missing_key = provider("anthropic", BackendKind::Anthropic);
        let mut upscaler = provider("upscaler", BackendKind::HttpImageEnhancer);
        upscaler.api_base = Some("http://localhost:9000".to_string());
        upscaler.managed = true;

        let catalog = ProviderCatalog::from_config(
            &[openai, missing_key, upscaler],
            Duration::from_secs(5),
        );

        assert_eq!(catalog.names(), vec!["openai", "upscaler"]);
        let openai = catalog.get("openai").unwrap();
        assert_eq!(openai.handle.capability(), Capability::TextGeneration);
        assert_eq!(openai.handle.name(), "openai");
        assert!(catalog.get("upscaler").unwrap().managed);
        assert!(catalog.get("anthropic").is_none());
    }

    #[test]
    fn test_media_backends_require_api_base() {
        let lip = provider("lips", BackendKind::HttpLipSync);
        assert!(build_backend(&lip, Duration::from_secs(1)).is_err());

        let scraper = provider("scraper", BackendKind::HttpScraper);
        let handle = build_backend(&scraper, Duration::from_secs(1)).unwrap();
        assert_eq!(handle.capability(), Capability::ContentScrape);
    }
}

//! Capability contracts implemented by provider backends.

use std::sync::Arc;

use async_trait::async_trait;

use super::error::ProviderError;
use super::types::{
    Capability, EnhancedImage, ImageEnhanceRequest, LipSyncOutput, LipSyncRequest,
    ScrapeRequest, ScrapedContent, TextOutput, TextRequest,
};

/// Behaviour shared by every backend.
#[async_trait]
pub trait Provider: Send + Sync {
    /// Backend name, e.g. "openai". Matches the integration provider type.
    fn name(&self) -> &str;

    /// Lightweight authenticated call used by connectivity tests.
    async fn probe(&self) -> Result<(), ProviderError>;
}

/// Text generation (ad copy, review replies).
#[async_trait]
pub trait TextGenerator: Provider {
    async fn generate(&self, request: TextRequest) -> Result<TextOutput, ProviderError>;
}

/// Image upscaling / enhancement.
#[async_trait]
pub trait ImageEnhancer: Provider {
    async fn enhance(&self, request: ImageEnhanceRequest) -> Result<EnhancedImage, ProviderError>;
}

/// Lip-sync video generation.
#[async_trait]
pub trait LipSyncer: Provider {
    async fn lip_sync(&self, request: LipSyncRequest) -> Result<LipSyncOutput, ProviderError>;
}

/// Web content retrieval.
#[async_trait]
pub trait ContentScraper: Provider {
    async fn scrape(&self, request: ScrapeRequest) -> Result<ScrapedContent, ProviderError>;
}

/// A ready-to-call backend, tagged by the capability it implements.
#[derive(Clone)]
pub enum BackendHandle {
    Text(Arc<dyn TextGenerator>),
    Image(Arc<dyn ImageEnhancer>),
    LipSync(Arc<dyn LipSyncer>),
    Scrape(Arc<dyn ContentScraper>),
}

impl BackendHandle {
    pub fn capability(&self) -> Capability {
        match self {
            BackendHandle::Text(_) => Capability::TextGeneration,
            BackendHandle::Image(_) => Capability::ImageEnhancement,
            BackendHandle::LipSync(_) => Capability::LipSync,
            BackendHandle::Scrape(_) => Capability::ContentScrape,
        }
    }

    pub fn name(&self) -> &str {
        self.provider().name()
    }

    pub async fn probe(&self) -> Result<(), ProviderError> {
        self.provider().probe().await
    }

    fn provider(&self) -> &dyn Provider {
        match self {
            BackendHandle::Text(b) => b.as_ref(),
            BackendHandle::Image(b) => b.as_ref(),
            BackendHandle::LipSync(b) => b.as_ref(),
            BackendHandle::Scrape(b) => b.as_ref(),
        }
    }
}

impl std::fmt::Debug for BackendHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BackendHandle")
            .field("capability", &self.capability())
            .field("name", &self.name())
            .finish()
    }
}

//! Provider abstraction layer.
//!
//! One trait per capability ([`TextGenerator`], [`ImageEnhancer`],
//! [`LipSyncer`], [`ContentScraper`]); concrete backends implement them and
//! are wrapped in a [`BackendHandle`] tagged by capability.

mod anthropic;
mod catalog;
mod error;
mod http;
mod media;
mod openai;
mod scraper;
mod traits;
mod types;

pub use anthropic::AnthropicClient;
pub use catalog::{ProviderCatalog, RegisteredBackend};
pub use error::{ErrorClass, ProviderError};
pub use http::DEFAULT_HTTP_TIMEOUT;
pub use media::{HttpImageEnhancer, HttpLipSyncer};
pub use openai::OpenAiClient;
pub use scraper::HttpScraper;
pub use traits::{
    BackendHandle, ContentScraper, ImageEnhancer, LipSyncer, Provider, TextGenerator,
};
pub use types::{
    BackendKind, Capability, EnhancedImage, ImageEnhanceRequest, LipSyncOutput, LipSyncRequest,
    ScrapeRequest, ScrapedContent, TextOutput, TextRequest, TokenUsage,
};

//! Capability and request/response types shared by all backends.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// An abstract kind of generation work, independent of the backend doing it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Capability {
    TextGeneration,
    ImageEnhancement,
    LipSync,
    ContentScrape,
}

impl Capability {
    pub const ALL: [Capability; 4] = [
        Capability::TextGeneration,
        Capability::ImageEnhancement,
        Capability::LipSync,
        Capability::ContentScrape,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Capability::TextGeneration => "text_generation",
            Capability::ImageEnhancement => "image_enhancement",
            Capability::LipSync => "lip_sync",
            Capability::ContentScrape => "content_scrape",
        }
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Capability {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Capability::ALL
            .into_iter()
            .find(|c| c.as_str() == s)
            .ok_or_else(|| format!("unknown capability: {}", s))
    }
}

/// Concrete backend implementations that can be configured.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackendKind {
    #[serde(rename = "openai")]
    OpenAi,
    Anthropic,
    HttpImageEnhancer,
    HttpLipSync,
    HttpScraper,
}

impl BackendKind {
    /// Capabilities a backend of this kind serves.
    pub fn capabilities(&self) -> &'static [Capability] {
        match self {
            BackendKind::OpenAi | BackendKind::Anthropic => &[Capability::TextGeneration],
            BackendKind::HttpImageEnhancer => &[Capability::ImageEnhancement],
            BackendKind::HttpLipSync => &[Capability::LipSync],
            BackendKind::HttpScraper => &[Capability::ContentScrape],
        }
    }
}

/// Token usage reported by text backends.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    pub input_tokens: u32,
    pub output_tokens: u32,
}

/// Request for a text completion.
#[derive(Debug, Clone, PartialEq)]
pub struct TextRequest {
    /// System prompt (instructions for the model)
    pub system: Option<String>,
    pub prompt: String,
    pub max_tokens: u32,
    pub temperature: f32,
}

impl TextRequest {
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            system: None,
            prompt: prompt.into(),
            max_tokens: 1024,
            temperature: 0.7,
        }
    }

    pub fn with_system(mut self, system: impl Into<String>) -> Self {
        self.system = Some(system.into());
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextOutput {
    pub text: String,
    pub model: String,
    #[serde(default)]
    pub usage: TokenUsage,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageEnhanceRequest {
    /// Base64-encoded source image.
    pub image: String,
    pub scale_factor: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnhancedImage {
    /// Base64-encoded result image.
    pub image: String,
    pub scale_factor: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LipSyncRequest {
    pub video_url: String,
    pub audio_url: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LipSyncOutput {
    pub video_url: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScrapeRequest {
    pub url: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScrapedContent {
    pub url: String,
    pub status: u16,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    pub content: String,
}

//! Typed job payloads and their validation.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use super::JobKind;
use crate::provider::{ImageEnhanceRequest, LipSyncRequest, ScrapeRequest, TextRequest};

/// Largest upscale factor accepted for image enhancement.
pub const MAX_SCALE_FACTOR: u32 = 8;

/// A payload that does not fit its job kind.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid {kind} payload: {message}")]
pub struct PayloadError {
    pub kind: JobKind,
    pub message: String,
}

impl PayloadError {
    fn new(kind: JobKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

fn decode<T: DeserializeOwned>(kind: JobKind, payload: &serde_json::Value) -> Result<T, PayloadError> {
    serde_json::from_value(payload.clone()).map_err(|e| PayloadError::new(kind, e.to_string()))
}

fn require_non_empty(kind: JobKind, field: &str, value: &str) -> Result<(), PayloadError> {
    if value.trim().is_empty() {
        return Err(PayloadError::new(kind, format!("{} must not be empty", field)));
    }
    Ok(())
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextGenerationPayload {
    pub prompt: String,
    #[serde(default)]
    pub system: Option<String>,
    #[serde(default)]
    pub max_tokens: Option<u32>,
}

impl TextGenerationPayload {
    pub fn parse(payload: &serde_json::Value) -> Result<Self, PayloadError> {
        let parsed: Self = decode(JobKind::TextGeneration, payload)?;
        require_non_empty(JobKind::TextGeneration, "prompt", &parsed.prompt)?;
        if parsed.max_tokens == Some(0) {
            return Err(PayloadError::new(
                JobKind::TextGeneration,
                "max_tokens must be positive",
            ));
        }
        Ok(parsed)
    }

    pub fn to_request(&self) -> TextRequest {
        let mut request = TextRequest::new(&self.prompt);
        if let Some(system) = &self.system {
            request = request.with_system(system);
        }
        if let Some(max_tokens) = self.max_tokens {
            request = request.with_max_tokens(max_tokens);
        }
        request
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReviewReplyPayload {
    pub review_text: String,
    #[serde(default)]
    pub rating: Option<u8>,
    #[serde(default)]
    pub product_name: Option<String>,
    #[serde(default)]
    pub tone: Option<String>,
}

const REVIEW_REPLY_SYSTEM: &str = "You write short, courteous replies to customer reviews on \
behalf of an online shop. Thank the customer, address concrete points they raise, and never \
invent facts about orders or policies. Reply with the text of the reply only.";

impl ReviewReplyPayload {
    pub fn parse(payload: &serde_json::Value) -> Result<Self, PayloadError> {
        let parsed: Self = decode(JobKind::ReviewReply, payload)?;
        require_non_empty(JobKind::ReviewReply, "review_text", &parsed.review_text)?;
        if let Some(rating) = parsed.rating {
            if !(1..=5).contains(&rating) {
                return Err(PayloadError::new(
                    JobKind::ReviewReply,
                    format!("rating must be between 1 and 5, got {}", rating),
                ));
            }
        }
        Ok(parsed)
    }

    pub fn to_request(&self) -> TextRequest {
        let mut prompt = String::new();
        if let Some(product) = &self.product_name {
            prompt.push_str(&format!("Product: {}\n", product));
        }
        if let Some(rating) = self.rating {
            prompt.push_str(&format!("Rating: {}/5\n", rating));
        }
        prompt.push_str(&format!(
            "Tone: {}\n",
            self.tone.as_deref().unwrap_or("friendly")
        ));
        prompt.push_str(&format!("Review:\n{}\n", self.review_text));

        TextRequest::new(prompt)
            .with_system(REVIEW_REPLY_SYSTEM)
            .with_max_tokens(400)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageEnhancementPayload {
    /// Base64-encoded source image.
    pub image: String,
    pub scale_factor: u32,
}

impl ImageEnhancementPayload {
    pub fn parse(payload: &serde_json::Value) -> Result<Self, PayloadError> {
        let parsed: Self = decode(JobKind::ImageEnhancement, payload)?;
        require_non_empty(JobKind::ImageEnhancement, "image", &parsed.image)?;
        if !(1..=MAX_SCALE_FACTOR).contains(&parsed.scale_factor) {
            return Err(PayloadError::new(
                JobKind::ImageEnhancement,
                format!(
                    "scale_factor must be between 1 and {}, got {}",
                    MAX_SCALE_FACTOR, parsed.scale_factor
                ),
            ));
        }
        Ok(parsed)
    }

    pub fn to_request(&self) -> ImageEnhanceRequest {
        ImageEnhanceRequest {
            image: self.image.clone(),
            scale_factor: self.scale_factor,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LipSyncPayload {
    pub video_url: String,
    pub audio_url: String,
}

impl LipSyncPayload {
    pub fn parse(payload: &serde_json::Value) -> Result<Self, PayloadError> {
        let parsed: Self = decode(JobKind::LipSync, payload)?;
        require_non_empty(JobKind::LipSync, "video_url", &parsed.video_url)?;
        require_non_empty(JobKind::LipSync, "audio_url", &parsed.audio_url)?;
        Ok(parsed)
    }

    pub fn to_request(&self) -> LipSyncRequest {
        LipSyncRequest {
            video_url: self.video_url.clone(),
            audio_url: self.audio_url.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContentScrapePayload {
    pub url: String,
}

impl ContentScrapePayload {
    pub fn parse(payload: &serde_json::Value) -> Result<Self, PayloadError> {
        let parsed: Self = decode(JobKind::ContentScrape, payload)?;
        if !(parsed.url.starts_with("http://") || parsed.url.starts_with("https://")) {
            return Err(PayloadError::new(
                JobKind::ContentScrape,
                "url must be http or https",
            ));
        }
        Ok(parsed)
    }

    pub fn to_request(&self) -> ScrapeRequest {
        ScrapeRequest {
            url: self.url.clone(),
        }
    }
}

/// Check a payload against its kind without running it.
pub fn validate_payload(kind: JobKind, payload: &serde_json::Value) -> Result<(), PayloadError> {
    match kind {
        JobKind::TextGeneration => TextGenerationPayload::parse(payload).map(|_| ()),
        JobKind::ReviewReply => ReviewReplyPayload::parse(payload).map(|_| ()),
        JobKind::ImageEnhancement => ImageEnhancementPayload::parse(payload).map(|_| ()),
        JobKind::LipSync => LipSyncPayload::parse(payload).map(|_| ()),
        JobKind::ContentScrape => ContentScrapePayload::parse(payload).map(|_| ()),
    }
}

//! Generic HTTP media backends (self-hosted upscaler, lip-sync service).
//!
//! Both speak a small JSON protocol:
//! - `POST /v1/enhance` `{image, scale_factor}` -> `{image, scale_factor?}`
//! - `POST /v1/lipsync` `{video_url, audio_url}` -> `{video_url}`
//! - `GET /health` for probes

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;

use super::error::ProviderError;
use super::http::HttpBackend;
use super::traits::{ImageEnhancer, LipSyncer, Provider};
use super::types::{EnhancedImage, ImageEnhanceRequest, LipSyncOutput, LipSyncRequest};

fn build_http(api_base: &str, api_key: Option<&str>, timeout: Duration) -> HttpBackend {
    let http = HttpBackend::new(api_base, timeout);
    match api_key {
        Some(key) => http.with_header("authorization", &format!("Bearer {}", key)),
        None => http,
    }
}

pub struct HttpImageEnhancer {
    name: String,
    http: HttpBackend,
}

impl HttpImageEnhancer {
    pub fn new(
        name: impl Into<String>,
        api_base: &str,
        api_key: Option<&str>,
        timeout: Duration,
    ) -> Self {
        Self {
            name: name.into(),
            http: build_http(api_base, api_key, timeout),
        }
    }
}

#[derive(Debug, Deserialize)]
struct EnhanceResponse {
    image: String,
    #[serde(default)]
    scale_factor: Option<u32>,
}

#[async_trait]
impl Provider for HttpImageEnhancer {
    fn name(&self) -> &str {
        &self.name
    }

    async fn probe(&self) -> Result<(), ProviderError> {
        self.http.get_ok("/health").await
    }
}

#[async_trait]
impl ImageEnhancer for HttpImageEnhancer {
    async fn enhance(&self, request: ImageEnhanceRequest) -> Result<EnhancedImage, ProviderError> {
        let response: EnhanceResponse = self.http.post_json("/v1/enhance", &request).await?;
        Ok(EnhancedImage {
            image: response.image,
            scale_factor: response.scale_factor.unwrap_or(request.scale_factor),
        })
    }
}

pub struct HttpLipSyncer {
    name: String,
    http: HttpBackend,
}

impl HttpLipSyncer {
    pub fn new(
        name: impl Into<String>,
        api_base: &str,
        api_key: Option<&str>,
        timeout: Duration,
    ) -> Self {
        Self {
            name: name.into(),
            http: build_http(api_base, api_key, timeout),
        }
    }
}

#[async_trait]
impl Provider for HttpLipSyncer {
    fn name(&self) -> &str {
        &self.name
    }

    async fn probe(&self) -> Result<(), ProviderError> {
        self.http.get_ok("/health").await
    }
}

#[async_trait]
impl LipSyncer for HttpLipSyncer {
    async fn lip_sync(&self, request: LipSyncRequest) -> Result<LipSyncOutput, ProviderError> {
        self.http.post_json("/v1/lipsync", &request).await
    }
}

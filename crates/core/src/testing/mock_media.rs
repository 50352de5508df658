//! Mock image, lip-sync and scraping backends for testing.

use async_trait::async_trait;
use std::time::Duration;

use super::script::Script;
use crate::provider::{
    ContentScraper, EnhancedImage, ImageEnhanceRequest, ImageEnhancer, LipSyncOutput,
    LipSyncRequest, LipSyncer, Provider, ProviderError, ScrapeRequest, ScrapedContent,
};

macro_rules! scripted_controls {
    ($ty:ident) => {
        impl $ty {
            pub fn new(name: impl Into<String>) -> Self {
                Self {
                    name: name.into(),
                    script: Script::default(),
                }
            }

            /// Fail the next call with `error`.
            pub async fn fail_next(&self, error: ProviderError) {
                self.script.push_failure(error).await;
            }

            /// Fail the next `times` calls with `error`.
            pub async fn fail_times(&self, error: ProviderError, times: usize) {
                self.script.push_failures(error, times).await;
            }

            pub async fn set_probe_error(&self, error: Option<ProviderError>) {
                self.script.set_probe_error(error).await;
            }

            pub async fn set_delay(&self, delay: Duration) {
                self.script.set_delay(delay).await;
            }

            pub async fn call_count(&self) -> usize {
                self.script.calls().await
            }

            pub async fn probe_count(&self) -> usize {
                self.script.probes().await
            }
        }

        #[async_trait]
        impl Provider for $ty {
            fn name(&self) -> &str {
                &self.name
            }

            async fn probe(&self) -> Result<(), ProviderError> {
                self.script.next_probe().await
            }
        }
    };
}

/// Mock [`ImageEnhancer`]. Returns the input image tagged with the scale factor.
#[derive(Debug, Clone)]
pub struct MockImageEnhancer {
    name: String,
    script: Script,
}

scripted_controls!(MockImageEnhancer);

#[async_trait]
impl ImageEnhancer for MockImageEnhancer {
    async fn enhance(&self, request: ImageEnhanceRequest) -> Result<EnhancedImage, ProviderError> {
        self.script.next_call().await?;
        Ok(EnhancedImage {
            image: format!("x{}:{}", request.scale_factor, request.image),
            scale_factor: request.scale_factor,
        })
    }
}

/// Mock [`LipSyncer`]. Returns a URL derived from the source video.
#[derive(Debug, Clone)]
pub struct MockLipSyncer {
    name: String,
    script: Script,
}

scripted_controls!(MockLipSyncer);

#[async_trait]
impl LipSyncer for MockLipSyncer {
    async fn lip_sync(&self, request: LipSyncRequest) -> Result<LipSyncOutput, ProviderError> {
        self.script.next_call().await?;
        Ok(LipSyncOutput {
            video_url: format!("{}?synced=1", request.video_url),
        })
    }
}

/// Mock [`ContentScraper`]. Serves a fixed page for every URL.
#[derive(Debug, Clone)]
pub struct MockScraper {
    name: String,
    script: Script,
}

scripted_controls!(MockScraper);

#[async_trait]
impl ContentScraper for MockScraper {
    async fn scrape(&self, request: ScrapeRequest) -> Result<ScrapedContent, ProviderError> {
        self.script.next_call().await?;
        Ok(ScrapedContent {
            url: request.url,
            status: 200,
            title: Some("Mock page".to_string()),
            content: "<html><title>Mock page</title></html>".to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_image_enhancer_echoes_scale() {
        let backend = MockImageEnhancer::new("upscaler");
        let out = backend
            .enhance(ImageEnhanceRequest {
                image: "aGk=".into(),
                scale_factor: 2,
            })
            .await
            .unwrap();
        assert_eq!(out.scale_factor, 2);
        assert_eq!(out.image, "x2:aGk=");
    }

    #[tokio::test]
    async fn test_lip_syncer_scripted_failure() {
        let backend = MockLipSyncer::new("syncer");
        backend
            .fail_next(ProviderError::Timeout(Duration::from_secs(1)))
            .await;
        let request = LipSyncRequest {
            video_url: "https://v/1.mp4".into(),
            audio_url: "https://a/1.mp3".into(),
        };
        assert!(backend.lip_sync(request.clone()).await.is_err());
        assert!(backend.lip_sync(request).await.is_ok());
        assert_eq!(backend.call_count().await, 2);
    }
}

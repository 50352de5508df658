//! Turning a job payload into a backend call and the call's output into a result.

use serde_json::json;

use crate::job::{
    ContentScrapePayload, ImageEnhancementPayload, JobKind, LipSyncPayload, PayloadError,
    ReviewReplyPayload, TextGenerationPayload,
};
use crate::metrics::TEXT_TOKENS;
use crate::provider::{
    BackendHandle, ImageEnhanceRequest, LipSyncRequest, ProviderError, ScrapeRequest, TextRequest,
};

/// A validated request ready to send to any backend of the right capability.
#[derive(Debug, Clone)]
pub(crate) enum PreparedCall {
    Text {
        request: TextRequest,
        /// Result field holding the generated text.
        output_field: &'static str,
    },
    Image(ImageEnhanceRequest),
    LipSync(LipSyncRequest),
    Scrape(ScrapeRequest),
}

impl PreparedCall {
    pub fn prepare(kind: JobKind, payload: &serde_json::Value) -> Result<Self, PayloadError> {
        Ok(match kind {
            JobKind::TextGeneration => PreparedCall::Text {
                request: TextGenerationPayload::parse(payload)?.to_request(),
                output_field: "text",
            },
            JobKind::ReviewReply => PreparedCall::Text {
                request: ReviewReplyPayload::parse(payload)?.to_request(),
                output_field: "reply",
            },
            JobKind::ImageEnhancement => {
                PreparedCall::Image(ImageEnhancementPayload::parse(payload)?.to_request())
            }
            JobKind::LipSync => PreparedCall::LipSync(LipSyncPayload::parse(payload)?.to_request()),
            JobKind::ContentScrape => {
                PreparedCall::Scrape(ContentScrapePayload::parse(payload)?.to_request())
            }
        })
    }

    /// Call the backend and shape its output as the job result.
    pub async fn invoke(
        &self,
        backend_name: &str,
        handle: &BackendHandle,
    ) -> Result<serde_json::Value, ProviderError> {
        match (self, handle) {
            (
                PreparedCall::Text {
                    request,
                    output_field,
                },
                BackendHandle::Text(backend),
            ) => {
                let output = backend.generate(request.clone()).await?;
                TEXT_TOKENS
                    .with_label_values(&[backend_name, "input"])
                    .inc_by(output.usage.input_tokens as u64);
                TEXT_TOKENS
                    .with_label_values(&[backend_name, "output"])
                    .inc_by(output.usage.output_tokens as u64);

                let mut result = json!({
                    "model": output.model,
                    "provider": backend_name,
                });
                result[*output_field] = json!(output.text);
                Ok(result)
            }
            (PreparedCall::Image(request), BackendHandle::Image(backend)) => {
                let output = backend.enhance(request.clone()).await?;
                Ok(json!({
                    "image": output.image,
                    "scale_factor": output.scale_factor,
                    "provider": backend_name,
                }))
            }
            (PreparedCall::LipSync(request), BackendHandle::LipSync(backend)) => {
                let output = backend.lip_sync(request.clone()).await?;
                Ok(json!({
                    "video_url": output.video_url,
                    "provider": backend_name,
                }))
            }
            (PreparedCall::Scrape(request), BackendHandle::Scrape(backend)) => {
                let output = backend.scrape(request.clone()).await?;
                let mut result = json!({
                    "url": output.url,
                    "status": output.status,
                    "content": output.content,
                    "provider": backend_name,
                });
                if let Some(title) = output.title {
                    result["title"] = json!(title);
                }
                Ok(result)
            }
            (_, handle) => Err(ProviderError::Unsupported(format!(
                "backend {} serves {}, not this job",
                backend_name,
                handle.capability()
            ))),
        }
    }
}

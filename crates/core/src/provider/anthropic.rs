//! Anthropic Messages API text backend.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::error::ProviderError;
use super::http::HttpBackend;
use super::traits::{Provider, TextGenerator};
use super::types::{TextOutput, TextRequest, TokenUsage};

const DEFAULT_API_BASE: &str = "https://api.anthropic.com";
const DEFAULT_MODEL: &str = "claude-3-5-haiku-latest";

pub struct AnthropicClient {
    name: String,
    http: HttpBackend,
    model: String,
}

impl AnthropicClient {
    pub fn new(name: impl Into<String>, api_key: &str, timeout: Duration) -> Self {
        Self::with_api_base(name, api_key, DEFAULT_API_BASE, timeout)
    }

    pub fn with_api_base(
        name: impl Into<String>,
        api_key: &str,
        api_base: &str,
        timeout: Duration,
    ) -> Self {
        Self {
            name: name.into(),
            http: HttpBackend::new(api_base, timeout)
                .with_header("x-api-key", api_key)
                .with_header("anthropic-version", "2023-06-01"),
            model: DEFAULT_MODEL.to_string(),
        }
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }
}

#[derive(Debug, Serialize)]
struct MessagesRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<&'a str>,
    messages: Vec<Message<'a>>,
    temperature: f32,
}

#[derive(Debug, Serialize)]
struct Message<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    content: Vec<ContentBlock>,
    model: String,
    usage: Usage,
}

#[derive(Debug, Deserialize)]
struct ContentBlock {
    #[serde(rename = "type")]
    block_type: String,
    #[serde(default)]
    text: String,
}

#[derive(Debug, Deserialize)]
struct Usage {
    input_tokens: u32,
    output_tokens: u32,
}

#[async_trait]
impl Provider for AnthropicClient {
    fn name(&self) -> &str {
        &self.name
    }

    async fn probe(&self) -> Result<(), ProviderError> {
        self.http.get_ok("/v1/models").await
    }
}

#[async_trait]
impl TextGenerator for AnthropicClient {
    async fn generate(&self, request: TextRequest) -> Result<TextOutput, ProviderError> {
        let body = MessagesRequest {
            model: &self.model,
            max_tokens: request.max_tokens,
            system: request.system.as_deref(),
            messages: vec![Message {
                role: "user",
                content: &request.prompt,
            }],
            temperature: request.temperature,
        };

        let response: MessagesResponse = self.http.post_json("/v1/messages", &body).await?;

        let text = response
            .content
            .into_iter()
            .filter(|c| c.block_type == "text")
            .map(|c| c.text)
            .collect::<Vec<_>>()
            .join("");

        Ok(TextOutput {
            text,
            model: response.model,
            usage: TokenUsage {
                input_tokens: response.usage.input_tokens,
                output_tokens: response.usage.output_tokens,
            },
        })
    }
}

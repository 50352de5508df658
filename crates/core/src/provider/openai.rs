//! OpenAI chat completions text backend.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::error::ProviderError;
use super::http::HttpBackend;
use super::traits::{Provider, TextGenerator};
use super::types::{TextOutput, TextRequest, TokenUsage};

const DEFAULT_API_BASE: &str = "https://api.openai.com";
const DEFAULT_MODEL: &str = "gpt-4o-mini";

pub struct OpenAiClient {
    name: String,
    http: HttpBackend,
    model: String,
}

impl OpenAiClient {
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
                .with_header("authorization", &format!("Bearer {}", api_key)),
            model: DEFAULT_MODEL.to_string(),
        }
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    max_tokens: u32,
    temperature: f32,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
    model: String,
    #[serde(default)]
    usage: Option<Usage>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Usage {
    prompt_tokens: u32,
    completion_tokens: u32,
}

#[async_trait]
impl Provider for OpenAiClient {
    fn name(&self) -> &str {
        &self.name
    }

    async fn probe(&self) -> Result<(), ProviderError> {
        self.http.get_ok("/v1/models").await
    }
}

#[async_trait]
impl TextGenerator for OpenAiClient {
    async fn generate(&self, request: TextRequest) -> Result<TextOutput, ProviderError> {
        let mut messages = Vec::with_capacity(2);
        if let Some(system) = request.system.as_deref() {
            messages.push(ChatMessage {
                role: "system",
                content: system,
            });
        }
        messages.push(ChatMessage {
            role: "user",
            content: &request.prompt,
        });

        let body = ChatRequest {
            model: &self.model,
            messages,
            max_tokens: request.max_tokens,
            temperature: request.temperature,
        };

        let response: ChatResponse = self.http.post_json("/v1/chat/completions", &body).await?;

        let text = response
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| ProviderError::Decode("response contained no choices".to_string()))?;

        Ok(TextOutput {
            text,
            model: response.model,
            usage: response
                .usage
                .map(|u| TokenUsage {
                    input_tokens: u.prompt_tokens,
                    output_tokens: u.completion_tokens,
                })
                .unwrap_or_default(),
        })
    }
}

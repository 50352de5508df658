//! Shared JSON-over-HTTP plumbing for provider backends.

use std::time::Duration;

use reqwest::header::HeaderMap;
use serde::{de::DeserializeOwned, Serialize};

use super::error::ProviderError;

/// Default per-request timeout for backend HTTP calls.
pub const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(60);

/// A reqwest client bound to one backend base URL.
#[derive(Debug, Clone)]
pub(crate) struct HttpBackend {
    client: reqwest::Client,
    api_base: String,
    timeout: Duration,
    headers: HeaderMap,
}

impl HttpBackend {
    pub(crate) fn new(api_base: impl Into<String>, timeout: Duration) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_base: api_base.into().trim_end_matches('/').to_string(),
            timeout,
            headers: HeaderMap::new(),
        }
    }

    /// Attach a header sent with every request. Invalid values are skipped.
    pub(crate) fn with_header(mut self, name: &'static str, value: &str) -> Self {
        if let Ok(value) = value.parse() {
            self.headers.insert(name, value);
        }
        self
    }

    pub(crate) fn url(&self, path: &str) -> String {
        format!("{}{}", self.api_base, path)
    }

    pub(crate) async fn post_json<Req, Resp>(
        &self,
        path: &str,
        body: &Req,
    ) -> Result<Resp, ProviderError>
    where
        Req: Serialize + ?Sized,
        Resp: DeserializeOwned,
    {
        let response = self
            .client
            .post(self.url(path))
            .headers(self.headers.clone())
            .timeout(self.timeout)
            .json(body)
            .send()
            .await
            .map_err(|e| ProviderError::from_reqwest(e, self.timeout))?;

        Self::decode(response, self.timeout).await
    }

    /// GET and discard the body; used for probes.
    pub(crate) async fn get_ok(&self, path: &str) -> Result<(), ProviderError> {
        let response = self
            .client
            .get(self.url(path))
            .headers(self.headers.clone())
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| ProviderError::from_reqwest(e, self.timeout))?;

        let status = response.status().as_u16();
        if !response.status().is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(ProviderError::from_status(status, error_message(&text)));
        }
        Ok(())
    }

    async fn decode<Resp: DeserializeOwned>(
        response: reqwest::Response,
        timeout: Duration,
    ) -> Result<Resp, ProviderError> {
        let status = response.status().as_u16();
        if !response.status().is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(ProviderError::from_status(status, error_message(&text)));
        }

        let text = response
            .text()
            .await
            .map_err(|e| ProviderError::from_reqwest(e, timeout))?;
        serde_json::from_str(&text).map_err(|e| ProviderError::Decode(format!("{}: {}", e, text)))
    }
}

/// Pull a human-readable message out of an error body.
///
/// Understands `{"error": {"message": ..}}`, `{"error": ".."}` and
/// `{"message": ..}`; falls back to the raw body.
pub(crate) fn error_message(body: &str) -> String {
    let Ok(value) = serde_json::from_str::<serde_json::Value>(body) else {
        return body.to_string();
    };

    value
        .pointer("/error/message")
        .or_else(|| value.get("error"))
        .or_else(|| value.get("message"))
        .and_then(|v| v.as_str())
        .map(str::to_string)
        .unwrap_or_else(|| body.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_message_shapes() {
        assert_eq!(
            error_message(r#"{"error":{"message":"quota exceeded","type":"x"}}"#),
            "quota exceeded"
        );
        assert_eq!(error_message(r#"{"error":"bad image"}"#), "bad image");
        assert_eq!(error_message(r#"{"message":"nope"}"#), "nope");
        assert_eq!(error_message("plain failure"), "plain failure");
    }

    #[test]
    fn test_url_trims_trailing_slash() {
        let backend = HttpBackend::new("http://localhost:9000/", DEFAULT_HTTP_TIMEOUT);
        assert_eq!(backend.url("/enhance"), "http://localhost:9000/enhance");
    }
}

//! Plain HTTP content retrieval.

use std::time::Duration;

use async_trait::async_trait;

use super::error::ProviderError;
use super::traits::{ContentScraper, Provider};
use super::types::{ScrapeRequest, ScrapedContent};

/// Upper bound on retained page content.
const MAX_CONTENT_BYTES: usize = 512 * 1024;

pub struct HttpScraper {
    name: String,
    client: reqwest::Client,
    timeout: Duration,
}

impl HttpScraper {
    pub fn new(name: impl Into<String>, timeout: Duration) -> Self {
        Self {
            name: name.into(),
            client: reqwest::Client::new(),
            timeout,
        }
    }
}

#[async_trait]
impl Provider for HttpScraper {
    fn name(&self) -> &str {
        &self.name
    }

    /// Nothing to authenticate against; the scraper is always reachable.
    async fn probe(&self) -> Result<(), ProviderError> {
        Ok(())
    }
}

#[async_trait]
impl ContentScraper for HttpScraper {
    async fn scrape(&self, request: ScrapeRequest) -> Result<ScrapedContent, ProviderError> {
        if !(request.url.starts_with("http://") || request.url.starts_with("https://")) {
            return Err(ProviderError::InvalidRequest(format!(
                "unsupported url: {}",
                request.url
            )));
        }

        let response = self
            .client
            .get(&request.url)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| ProviderError::from_reqwest(e, self.timeout))?;

        let status = response.status().as_u16();
        if !response.status().is_success() {
            return Err(ProviderError::from_status(
                status,
                format!("fetching {} returned {}", request.url, status),
            ));
        }

        let body = response
            .text()
            .await
            .map_err(|e| ProviderError::from_reqwest(e, self.timeout))?;

        Ok(ScrapedContent {
            url: request.url,
            status,
            title: extract_title(&body),
            content: truncate_utf8(body, MAX_CONTENT_BYTES),
        })
    }
}

fn extract_title(html: &str) -> Option<String> {
    let lower = html.to_ascii_lowercase();
    let open = lower.find("<title")?;
    let start = open + lower[open..].find('>')? + 1;
    let end = start + lower[start..].find("</title>")?;
    let title = html[start..end].trim();
    (!title.is_empty()).then(|| title.to_string())
}

fn truncate_utf8(mut text: String, max: usize) -> String {
    if text.len() > max {
        let mut cut = max;
        while !text.is_char_boundary(cut) {
            cut -= 1;
        }
        text.truncate(cut);
    }
    text
}

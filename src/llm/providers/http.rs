//! HTTP run-endpoint provider.
//!
//! POSTs `{"query": "<text>"}` to a model server's run URL and returns the
//! raw response body.  Cheap to clone: `reqwest::Client` is an `Arc`
//! internally.

use std::time::Duration;

use reqwest::Client;
use serde::Serialize;
use tracing::debug;

use crate::llm::ProviderError;

#[derive(Serialize)]
struct RunRequest<'a> {
    query: &'a str,
}

#[derive(Debug, Clone)]
pub struct HttpProvider {
    client: Client,
    url: String,
    timeout: Duration,
}

impl HttpProvider {
    pub fn new(url: String, timeout: Duration) -> Result<Self, ProviderError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ProviderError::Request(format!("failed to build HTTP client: {e}")))?;
        Ok(Self { client, url, timeout })
    }

    pub async fn complete(&self, content: &str) -> Result<String, ProviderError> {
        debug!(url = %self.url, content_len = content.len(), "sending run request");

        let resp = self
            .client
            .post(&self.url)
            .json(&RunRequest { query: content })
            .send()
            .await
            .map_err(|e| self.classify(e))?
            .error_for_status()
            .map_err(|e| self.classify(e))?;

        resp.text().await.map_err(|e| self.classify(e))
    }

    fn classify(&self, e: reqwest::Error) -> ProviderError {
        if e.is_timeout() {
            ProviderError::Timeout(self.timeout.as_secs())
        } else {
            ProviderError::Request(e.to_string())
        }
    }
}

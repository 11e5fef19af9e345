//! HTTP client for a Browserless `/content` endpoint (headless-browser rendering).

use std::time::Duration;

use reqwest::Client;
use tracing::debug;
use url::Url;

use starbrief_shared::{Result, StarbriefError};

/// Upper bound for a single render request.
const RENDER_TIMEOUT: Duration = Duration::from_secs(30);

/// Fetches fully-rendered HTML through a Browserless instance.
#[derive(Debug, Clone)]
pub struct BrowserlessClient {
    client: Client,
    base_url: String,
    token: Option<String>,
}

impl BrowserlessClient {
    pub fn new(base_url: &str, token: Option<&str>) -> Result<Self> {
        let client = Client::builder()
            .timeout(RENDER_TIMEOUT)
            .build()
            .map_err(|e| StarbriefError::Network(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            token: token.map(String::from),
        })
    }

    /// Whether a service token is configured.
    pub fn has_token(&self) -> bool {
        self.token.is_some()
    }

    /// Render `url` and return its HTML, giving up after `budget`.
    pub async fn content(&self, url: &Url, budget: Duration) -> Result<String> {
        let mut endpoint = format!("{}/content", self.base_url);
        if let Some(ref token) = self.token {
            endpoint.push_str(&format!("?token={token}"));
        }

        debug!(%url, "rendering page via browser service");

        let response = self
            .client
            .post(&endpoint)
            .timeout(budget.min(RENDER_TIMEOUT))
            .json(&serde_json::json!({ "url": url.as_str() }))
            .send()
            .await
            .map_err(|e| StarbriefError::Network(format!("browser service: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            let snippet: String = message.chars().take(200).collect();
            return Err(StarbriefError::Network(format!(
                "browser service HTTP {status}: {snippet}"
            )));
        }

        response
            .text()
            .await
            .map_err(|e| StarbriefError::Network(format!("browser service body: {e}")))
    }
}

//! Web fetcher: plain HTTP with an optional headless-browser strategy.
//!
//! In browser mode a page is rendered through [`BrowserlessClient`] first;
//! any browser failure silently falls back to a plain HTTP GET.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use tracing::{debug, instrument, warn};
use url::Url;

use starbrief_shared::{FetchMode, FetchTask, Result, StarbriefError};

use crate::browser::BrowserlessClient;
use crate::catalog::SourceCatalog;
use crate::extract::extract_text;
use crate::{FetchRequest, FetchedText, Fetcher};

/// Browser-like User-Agent; several horoscope sites reject unknown agents.
const USER_AGENT: &str = "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 \
                          (KHTML, like Gecko) Chrome/118.0.0.0 Safari/537.36";

/// Upper bound for a single plain HTTP request.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(15);

/// Fetches source pages and extracts their main text.
pub struct WebFetcher {
    client: Client,
    catalog: SourceCatalog,
    browser: Option<BrowserlessClient>,
    use_browser: bool,
}

impl WebFetcher {
    /// Create a fetcher for `catalog` using the given strategy.
    ///
    /// `browser` is the headless-browser client, if one is configured.
    pub fn new(
        catalog: SourceCatalog,
        mode: FetchMode,
        browser: Option<BrowserlessClient>,
    ) -> Result<Self> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .redirect(reqwest::redirect::Policy::limited(5))
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| StarbriefError::Network(format!("failed to build HTTP client: {e}")))?;

        let use_browser = match mode {
            FetchMode::Requests => false,
            FetchMode::Browser => {
                if browser.is_none() {
                    warn!("browser mode requested but no browser service is configured, using plain HTTP");
                }
                browser.is_some()
            }
            FetchMode::Auto => browser.as_ref().is_some_and(BrowserlessClient::has_token),
        };

        debug!(%mode, use_browser, sources = catalog.iter().count(), "web fetcher ready");

        Ok(Self {
            client,
            catalog,
            browser,
            use_browser,
        })
    }

    /// Whether pages are rendered through the browser service first.
    pub fn uses_browser(&self) -> bool {
        self.use_browser
    }

    async fn fetch_rendered(&self, browser: &BrowserlessClient, request: &FetchRequest) -> Result<String> {
        let html = browser.content(&request.url, request.remaining()).await?;
        extract_text(&html)
    }

    async fn fetch_plain(&self, request: &FetchRequest) -> Result<String> {
        let url = &request.url;
        let response = self
            .client
            .get(url.as_str())
            .timeout(request.remaining().min(REQUEST_TIMEOUT))
            .send()
            .await
            .map_err(|e| StarbriefError::Network(format!("{url}: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(StarbriefError::Network(format!("{url}: HTTP {status}")));
        }

        let body = response
            .text()
            .await
            .map_err(|e| StarbriefError::Network(format!("{url}: body read failed: {e}")))?;

        extract_text(&body)
    }
}

#[async_trait]
impl Fetcher for WebFetcher {
    fn endpoint(&self, task: &FetchTask) -> Option<Url> {
        self.catalog.resolve(&task.entity, &task.source)
    }

    #[instrument(skip_all, fields(task = %request.task, url = %request.url))]
    async fn fetch(&self, request: &FetchRequest) -> Result<FetchedText> {
        if self.use_browser {
            if let Some(browser) = &self.browser {
                match self.fetch_rendered(browser, request).await {
                    Ok(raw_text) => {
                        return Ok(FetchedText {
                            raw_text,
                            source_url: request.url.to_string(),
                        });
                    }
                    Err(e) => {
                        debug!(error = %e, "browser fetch failed, falling back to plain HTTP");
                    }
                }
            }
        }

        let raw_text = self.fetch_plain(request).await?;
        debug!(chars = raw_text.chars().count(), "page fetched");

        Ok(FetchedText {
            raw_text,
            source_url: request.url.to_string(),
        })
    }
}

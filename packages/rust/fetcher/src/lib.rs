//! Source fetching: endpoint catalog, page retrieval, and text extraction.
//!
//! This crate provides:
//! - [`Fetcher`]: the collaborator interface the scheduler drives
//! - [`SourceCatalog`]: maps source ids to per-entity URLs
//! - [`WebFetcher`]: plain HTTP fetcher with an optional headless-browser strategy
//! - [`BrowserlessClient`]: client for a Browserless `/content` endpoint
//! - [`extract_text`]: main-content text extraction from HTML

pub mod browser;
pub mod catalog;
pub mod extract;
pub mod web;

use std::time::Duration;

use async_trait::async_trait;
use tokio::time::Instant;
use url::Url;

use starbrief_shared::{FetchTask, Result};

pub use browser::BrowserlessClient;
pub use catalog::SourceCatalog;
pub use extract::{MAX_TEXT_CHARS, extract_text};
pub use web::WebFetcher;

/// A resolved fetch: the task, the endpoint it maps to, and its deadline.
#[derive(Debug, Clone)]
pub struct FetchRequest {
    pub task: FetchTask,
    pub url: Url,
    /// Instant after which the scheduler abandons the fetch.
    pub deadline: Instant,
}

impl FetchRequest {
    /// Time left before the deadline (zero once it has passed).
    pub fn remaining(&self) -> Duration {
        self.deadline.saturating_duration_since(Instant::now())
    }
}

/// Text retrieved for one task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchedText {
    pub raw_text: String,
    pub source_url: String,
}

/// Retrieves raw text for a (entity, source, date) task.
///
/// Implementations must be cancel-safe: the scheduler drops the `fetch`
/// future when the task deadline expires.
#[async_trait]
pub trait Fetcher: Send + Sync {
    /// Endpoint for the task, or `None` when the source is unsupported for it.
    fn endpoint(&self, task: &FetchTask) -> Option<Url>;

    /// Fetch the text behind `request.url`.
    async fn fetch(&self, request: &FetchRequest) -> Result<FetchedText>;
}

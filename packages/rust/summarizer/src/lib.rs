//! Text summarization into structured [`SummaryRecord`]s.
//!
//! This crate provides:
//! - [`Summarizer`]: the collaborator interface used by the consolidator
//! - [`OpenAiSummarizer`]: OpenAI-compatible chat-completions implementation
//! - [`parse_summary`]: lenient parsing of model replies

pub mod openai;
pub mod parse;

use async_trait::async_trait;

use starbrief_shared::{Result, SummaryRecord};

pub use openai::{OpenAiSettings, OpenAiSummarizer};
pub use parse::parse_summary;

/// Produces a structured summary of one text.
///
/// Callers never pass empty input; implementations may still reject it.
#[async_trait]
pub trait Summarizer: Send + Sync {
    async fn summarize(&self, text: &str) -> Result<SummaryRecord>;
}

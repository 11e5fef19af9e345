//! OpenAI-compatible chat-completions summarizer.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use starbrief_shared::{Result, StarbriefError, SummarizerConfig, SummaryRecord};

use crate::Summarizer;
use crate::parse::parse_summary;

const SYSTEM_PROMPT: &str = "You are a concise summarizer for daily horoscopes. \
    Return ONLY a JSON object with fields: tone (string), facets (object with love, career, health strings), \
    key_points (array of short strings), and final_summary (string).";

/// Connection and sampling settings for [`OpenAiSummarizer`].
#[derive(Debug, Clone)]
pub struct OpenAiSettings {
    pub api_key: String,
    pub model: String,
    pub base_url: String,
    pub temperature: f32,
    pub max_tokens: u32,
}

impl OpenAiSettings {
    /// Settings from the `[summarizer]` config section and an already-resolved key.
    pub fn from_config(config: &SummarizerConfig, api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            model: config.model.clone(),
            base_url: config.base_url.clone(),
            temperature: config.temperature,
            max_tokens: config.max_tokens,
        }
    }
}

// ---------------------------------------------------------------------------
// Wire types
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
    max_tokens: u32,
    response_format: ResponseFormat,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    kind: &'static str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
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

// ---------------------------------------------------------------------------
// Summarizer
// ---------------------------------------------------------------------------

/// Summarizes text with a JSON-mode chat completion.
pub struct OpenAiSummarizer {
    http: Client,
    settings: OpenAiSettings,
}

impl OpenAiSummarizer {
    pub fn new(settings: OpenAiSettings) -> Result<Self> {
        if settings.api_key.trim().is_empty() {
            return Err(StarbriefError::config("summarizer API key is empty"));
        }

        let http = Client::builder()
            .build()
            .map_err(|e| StarbriefError::Network(format!("failed to build HTTP client: {e}")))?;

        Ok(Self { http, settings })
    }

    pub fn model(&self) -> &str {
        &self.settings.model
    }

    async fn complete(&self, text: &str) -> Result<String> {
        let url = format!("{}/chat/completions", self.settings.base_url.trim_end_matches('/'));
        let user = format!(
            "Summarize the following horoscope. Return JSON only, with no extra commentary.\n\nTEXT:\n{text}"
        );

        let request = ChatRequest {
            model: &self.settings.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: SYSTEM_PROMPT,
                },
                ChatMessage {
                    role: "user",
                    content: &user,
                },
            ],
            temperature: self.settings.temperature,
            max_tokens: self.settings.max_tokens,
            response_format: ResponseFormat {
                kind: "json_object",
            },
        };

        let response = self
            .http
            .post(&url)
            .bearer_auth(&self.settings.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| StarbriefError::Network(format!("chat completion: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            let snippet: String = error_text.chars().take(200).collect();
            return Err(StarbriefError::Summarize(format!(
                "API error ({status}): {snippet}"
            )));
        }

        let body: ChatResponse = response
            .json()
            .await
            .map_err(|e| StarbriefError::Summarize(format!("invalid response body: {e}")))?;

        body.choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .filter(|c| !c.trim().is_empty())
            .ok_or_else(|| StarbriefError::Summarize("no content in response".into()))
    }
}

#[async_trait]
impl Summarizer for OpenAiSummarizer {
    #[instrument(skip_all, fields(model = %self.settings.model, chars = text.chars().count()))]
    async fn summarize(&self, text: &str) -> Result<SummaryRecord> {
        if text.trim().is_empty() {
            return Err(StarbriefError::Summarize("refusing to summarize empty text".into()));
        }

        let content = self.complete(text).await?;
        debug!(reply_chars = content.len(), "summary received");
        Ok(parse_summary(&content))
    }
}

//! In-process collaborators for core tests.

use std::collections::HashSet;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use url::Url;

use starbrief_fetcher::{FetchRequest, FetchedText, Fetcher};
use starbrief_shared::{Facets, FetchTask, Result, RunDate, StarbriefError, SummaryRecord};
use starbrief_summarizer::Summarizer;

pub fn date() -> RunDate {
    RunDate::from_ymd_opt(2025, 3, 21).unwrap()
}

/// Fetcher returning `"<entity> text from <source>"` after an optional delay.
///
/// Source `unsupported` has no endpoint. Other sources can be configured to
/// hang, fail, panic or return empty text.
#[derive(Default)]
pub struct StubFetcher {
    delay: Duration,
    hang: HashSet<String>,
    fail: HashSet<String>,
    panic: HashSet<String>,
    empty: HashSet<String>,
    fail_pairs: HashSet<(String, String)>,
    texts: Vec<(String, String, String)>,
    calls: AtomicUsize,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    started: Mutex<Vec<String>>,
}

struct InFlight<'a>(&'a AtomicUsize);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

impl StubFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn hang_on(mut self, source: &str) -> Self {
        self.hang.insert(source.into());
        self
    }

    pub fn fail_on(mut self, source: &str) -> Self {
        self.fail.insert(source.into());
        self
    }

    pub fn fail_for(mut self, entity: &str, source: &str) -> Self {
        self.fail_pairs.insert((entity.into(), source.into()));
        self
    }

    pub fn panic_on(mut self, source: &str) -> Self {
        self.panic.insert(source.into());
        self
    }

    pub fn empty_on(mut self, source: &str) -> Self {
        self.empty.insert(source.into());
        self
    }

    /// Fixed text for one `(entity, source)` pair.
    pub fn text_for(mut self, entity: &str, source: &str, text: &str) -> Self {
        self.texts.push((entity.into(), source.into(), text.into()));
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::SeqCst)
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    pub fn started(&self) -> Vec<String> {
        self.started.lock().unwrap().clone()
    }
}

#[async_trait]
impl Fetcher for StubFetcher {
    fn endpoint(&self, task: &FetchTask) -> Option<Url> {
        if task.source.as_str() == "unsupported" {
            return None;
        }
        Url::parse(&format!(
            "https://{}.test/{}",
            task.source.as_str().replace('.', "-"),
            task.entity.slug()
        ))
        .ok()
    }

    async fn fetch(&self, request: &FetchRequest) -> Result<FetchedText> {
        let task = &request.task;
        let source = task.source.as_str();

        self.calls.fetch_add(1, Ordering::SeqCst);
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        let _guard = InFlight(&self.in_flight);
        self.started.lock().unwrap().push(task.to_string());

        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        if self.hang.contains(source) {
            std::future::pending::<()>().await;
        }
        if self.panic.contains(source) {
            panic!("stub fetcher panic for {task}");
        }
        if self.fail.contains(source)
            || self
                .fail_pairs
                .contains(&(task.entity.as_str().to_string(), source.to_string()))
        {
            return Err(StarbriefError::Network(format!("HTTP 503 for {}", request.url)));
        }

        let raw_text = if self.empty.contains(source) {
            String::new()
        } else {
            self.texts
                .iter()
                .find(|(e, s, _)| e == task.entity.as_str() && s == source)
                .map(|(_, _, t)| t.clone())
                .unwrap_or_else(|| format!("{} text from {}", task.entity, source))
        };

        Ok(FetchedText {
            raw_text,
            source_url: request.url.to_string(),
        })
    }
}

/// Summarizer that records its inputs and echoes them back as the narrative.
///
/// Inputs containing `FAIL` produce an error.
#[derive(Default)]
pub struct StubSummarizer {
    inputs: Mutex<Vec<String>>,
}

impl StubSummarizer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn inputs(&self) -> Vec<String> {
        self.inputs.lock().unwrap().clone()
    }
}

#[async_trait]
impl Summarizer for StubSummarizer {
    async fn summarize(&self, text: &str) -> Result<SummaryRecord> {
        self.inputs.lock().unwrap().push(text.to_string());
        if text.contains("FAIL") {
            return Err(StarbriefError::Summarize("stub refused".into()));
        }
        Ok(SummaryRecord {
            tone: "steady".into(),
            facets: Facets {
                love: "ok".into(),
                ..Default::default()
            },
            key_points: vec![format!("{} chars", text.chars().count())],
            final_summary: text.to_string(),
        })
    }
}

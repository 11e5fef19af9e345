//! Core domain types for Starbrief runs.

use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Calendar date a run is executed for (`YYYY-MM-DD`).
pub type RunDate = chrono::NaiveDate;

/// The twelve zodiac signs processed when the caller does not narrow the set.
pub const DEFAULT_SIGNS: [&str; 12] = [
    "Aries",
    "Taurus",
    "Gemini",
    "Cancer",
    "Leo",
    "Virgo",
    "Libra",
    "Scorpio",
    "Sagittarius",
    "Capricorn",
    "Aquarius",
    "Pisces",
];

// ---------------------------------------------------------------------------
// RunId
// ---------------------------------------------------------------------------

/// A UUID v7 wrapper identifying one run (time-sortable).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RunId(pub Uuid);

impl RunId {
    /// Generate a new time-sortable run identifier.
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }
}

impl Default for RunId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RunId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// Entity / Source
// ---------------------------------------------------------------------------

/// Opaque identifier of the thing content is fetched for (e.g. a zodiac sign).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Entity(String);

impl Entity {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Lower-cased form used in source URL templates and file names.
    pub fn slug(&self) -> String {
        self.0.to_lowercase()
    }
}

impl fmt::Display for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Entity {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

/// Opaque identifier of one external content provider.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Source(String);

impl Source {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Source {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

// ---------------------------------------------------------------------------
// FetchTask / FetchOutcome
// ---------------------------------------------------------------------------

/// One unit of scheduled work: fetch `entity` from `source` for `date`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FetchTask {
    pub entity: Entity,
    pub source: Source,
    pub date: RunDate,
}

impl fmt::Display for FetchTask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} @ {}", self.entity, self.source)
    }
}

/// Why a fetch task did not produce text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureReason {
    /// No known endpoint for the source; the fetcher was never called.
    Unsupported(String),
    /// The per-task deadline expired and the fetch was cancelled.
    Timeout,
    /// The fetcher reported an error.
    FetchError(String),
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unsupported(msg) => write!(f, "unsupported: {msg}"),
            Self::Timeout => f.write_str("timeout"),
            Self::FetchError(msg) => write!(f, "fetch error: {msg}"),
        }
    }
}

/// Terminal state of a [`FetchTask`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchOutcome {
    Success { raw_text: String, source_url: String },
    Failure { reason: FailureReason },
}

impl FetchOutcome {
    pub fn failure(reason: FailureReason) -> Self {
        Self::Failure { reason }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }

    /// Length of the fetched text in characters (0 for failures).
    pub fn text_len(&self) -> usize {
        match self {
            Self::Success { raw_text, .. } => raw_text.chars().count(),
            Self::Failure { .. } => 0,
        }
    }
}

/// A task paired with its outcome, keeping the (entity, source) association.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskOutcome {
    pub task: FetchTask,
    pub outcome: FetchOutcome,
}

// ---------------------------------------------------------------------------
// Summaries
// ---------------------------------------------------------------------------

/// Per-facet notes for the fixed facet set.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Facets {
    #[serde(default)]
    pub love: String,
    #[serde(default)]
    pub career: String,
    #[serde(default)]
    pub health: String,
}

/// Structured summary of one text.
///
/// `SummaryRecord::default()` is the canonical empty record: every string
/// empty and no key points.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SummaryRecord {
    #[serde(default)]
    pub tone: String,
    #[serde(default)]
    pub facets: Facets,
    #[serde(default)]
    pub key_points: Vec<String>,
    /// The final narrative.
    #[serde(default)]
    pub final_summary: String,
}

impl SummaryRecord {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

/// A summary tied back to the source it was produced from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceSummary {
    #[serde(flatten)]
    pub summary: SummaryRecord,
    pub interpreter: Source,
    pub source_url: String,
}

/// A contributing source of a consolidated artifact.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceRef {
    pub interpreter: Source,
    pub source_url: String,
}

/// Per-entity aggregate persisted at the end of a run.
///
/// `sources.len()` always equals the number of successful fetches for the
/// entity; `merged` is the canonical empty record when there were none.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsolidatedArtifact {
    #[serde(rename = "sign")]
    pub entity: Entity,
    pub date: RunDate,
    pub sources: Vec<SourceRef>,
    pub summaries: Vec<SourceSummary>,
    #[serde(rename = "final")]
    pub merged: SummaryRecord,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date() -> RunDate {
        RunDate::from_ymd_opt(2025, 3, 21).unwrap()
    }

    #[test]
    fn default_summary_is_canonical_empty() {
        let record = SummaryRecord::default();
        assert!(record.is_empty());
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "tone": "",
                "facets": {"love": "", "career": "", "health": ""},
                "key_points": [],
                "final_summary": ""
            })
        );
    }

    #[test]
    fn summary_tolerates_missing_fields() {
        let record: SummaryRecord =
            serde_json::from_str(r#"{"tone":"upbeat","facets":{"love":"warm"}}"#).unwrap();
        assert_eq!(record.tone, "upbeat");
        assert_eq!(record.facets.love, "warm");
        assert_eq!(record.facets.career, "");
        assert!(record.key_points.is_empty());
    }

    #[test]
    fn artifact_uses_persisted_field_names() {
        let artifact = ConsolidatedArtifact {
            entity: Entity::new("Leo"),
            date: date(),
            sources: vec![SourceRef {
                interpreter: Source::new("astrology.com"),
                source_url: "https://www.astrology.com/horoscope/daily/leo.html".into(),
            }],
            summaries: vec![SourceSummary {
                summary: SummaryRecord {
                    final_summary: "Bold day.".into(),
                    ..Default::default()
                },
                interpreter: Source::new("astrology.com"),
                source_url: "https://www.astrology.com/horoscope/daily/leo.html".into(),
            }],
            merged: SummaryRecord::default(),
        };

        let json = serde_json::to_value(&artifact).unwrap();
        assert_eq!(json["sign"], "Leo");
        assert_eq!(json["date"], "2025-03-21");
        assert_eq!(json["sources"][0]["interpreter"], "astrology.com");
        assert_eq!(json["summaries"][0]["final_summary"], "Bold day.");
        assert_eq!(json["summaries"][0]["interpreter"], "astrology.com");
        assert_eq!(json["final"]["final_summary"], "");

        let parsed: ConsolidatedArtifact = serde_json::from_value(json).unwrap();
        assert_eq!(parsed, artifact);
    }

    #[test]
    fn entity_slug_is_lowercase() {
        assert_eq!(Entity::new("Sagittarius").slug(), "sagittarius");
    }

    #[test]
    fn outcome_helpers() {
        let ok = FetchOutcome::Success {
            raw_text: "héllo".into(),
            source_url: "https://x".into(),
        };
        assert!(ok.is_success());
        assert_eq!(ok.text_len(), 5);

        let timeout = FetchOutcome::failure(FailureReason::Timeout);
        assert!(!timeout.is_success());
        assert_eq!(timeout.text_len(), 0);
        assert_eq!(FailureReason::Timeout.to_string(), "timeout");
    }

    #[test]
    fn task_display() {
        let task = FetchTask {
            entity: "Aries".into(),
            source: "horoscope.com".into(),
            date: date(),
        };
        assert_eq!(task.to_string(), "Aries @ horoscope.com");
    }
}

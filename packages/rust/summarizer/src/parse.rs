//! Lenient parsing of model replies into [`SummaryRecord`].
//!
//! Replies are expected to be a JSON object with `tone`, `facets`
//! (`love`/`career`/`health`), `key_points` and `final_summary`. Missing fields
//! default to empty. Replies that are not JSON at all are kept as the final
//! narrative so the text is not lost.

use std::sync::LazyLock;

use regex::Regex;
use serde_json::Value;

use starbrief_shared::{Facets, SummaryRecord};

/// Matches a reply wrapped in a Markdown code fence.
static FENCED: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"(?s)^\s*```(?:json)?\s*(.*?)\s*```\s*$").ok());

/// Parse a model reply into a summary record.
pub fn parse_summary(content: &str) -> SummaryRecord {
    let body = strip_fence(content);

    match serde_json::from_str::<Value>(body) {
        Ok(Value::Object(map)) => SummaryRecord {
            tone: string_field(map.get("tone")),
            facets: facets_field(map.get("facets")),
            key_points: list_field(map.get("key_points")),
            final_summary: string_field(map.get("final_summary")),
        },
        _ => SummaryRecord {
            final_summary: body.trim().to_string(),
            ..Default::default()
        },
    }
}

fn strip_fence(content: &str) -> &str {
    FENCED
        .as_ref()
        .and_then(|re| re.captures(content))
        .and_then(|caps| caps.get(1))
        .map_or(content, |m| m.as_str())
}

fn string_field(value: Option<&Value>) -> String {
    match value {
        Some(Value::String(s)) => s.trim().to_string(),
        Some(Value::Null) | None => String::new(),
        Some(other) => other.to_string(),
    }
}

fn facets_field(value: Option<&Value>) -> Facets {
    let Some(Value::Object(map)) = value else {
        return Facets::default();
    };
    Facets {
        love: string_field(map.get("love")),
        career: string_field(map.get("career")),
        health: string_field(map.get("health")),
    }
}

fn list_field(value: Option<&Value>) -> Vec<String> {
    match value {
        Some(Value::Array(items)) => items
            .iter()
            .map(|v| string_field(Some(v)))
            .filter(|s| !s.is_empty())
            .collect(),
        Some(Value::String(s)) if !s.trim().is_empty() => vec![s.trim().to_string()],
        _ => Vec::new(),
    }
}

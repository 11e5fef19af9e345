//! Per-entity consolidation of fetched texts into one artifact.

use std::sync::Arc;

use tracing::{debug, instrument, warn};

use starbrief_shared::{
    ConsolidatedArtifact, Entity, FetchOutcome, RunDate, SourceRef, SourceSummary, SummaryRecord,
    TaskOutcome,
};
use starbrief_summarizer::Summarizer;

use crate::run_log::{RunEvent, RunLogger};

/// Source label used for the merge pass.
pub const CONSOLIDATED_SOURCE: &str = "consolidated";

/// Separator placed between per-source narratives before the merge pass.
pub const NARRATIVE_SEPARATOR: &str = "\n\n";

/// Summarizes each successful fetch for an entity, then merges the narratives.
#[derive(Clone)]
pub struct Consolidator {
    summarizer: Arc<dyn Summarizer>,
    logger: Arc<dyn RunLogger>,
}

impl Consolidator {
    pub fn new(summarizer: Arc<dyn Summarizer>, logger: Arc<dyn RunLogger>) -> Self {
        Self { summarizer, logger }
    }

    /// Build the artifact for `entity` from its fetch outcomes.
    ///
    /// Failed outcomes are skipped. A summarizer error for one source yields
    /// the empty record for that source; it never aborts the entity.
    #[instrument(skip_all, fields(entity = %entity, outcomes = outcomes.len()))]
    pub async fn consolidate(
        &self,
        entity: &Entity,
        date: RunDate,
        outcomes: &[TaskOutcome],
    ) -> ConsolidatedArtifact {
        let mut sources = Vec::new();
        let mut summaries = Vec::new();

        for task_outcome in outcomes {
            let FetchOutcome::Success {
                raw_text,
                source_url,
            } = &task_outcome.outcome
            else {
                continue;
            };
            let source = &task_outcome.task.source;

            let summary = self.summarize_logged(entity, source.as_str(), raw_text).await;
            sources.push(SourceRef {
                interpreter: source.clone(),
                source_url: source_url.clone(),
            });
            summaries.push(SourceSummary {
                summary,
                interpreter: source.clone(),
                source_url: source_url.clone(),
            });
        }

        let merged = match combine_narratives(&summaries) {
            Some(text) => self.summarize_logged(entity, CONSOLIDATED_SOURCE, &text).await,
            None => {
                debug!("no narratives to merge");
                SummaryRecord::default()
            }
        };

        ConsolidatedArtifact {
            entity: entity.clone(),
            date,
            sources,
            summaries,
            merged,
        }
    }

    async fn summarize_logged(&self, entity: &Entity, source: &str, text: &str) -> SummaryRecord {
        self.logger.log(
            RunEvent::new()
                .thought(format!("Summarize {entity} text from {source}"))
                .action("summarize")
                .meta("sign", entity.as_str())
                .meta("source", source),
        );

        match self.summarizer.summarize(text).await {
            Ok(record) => {
                self.logger.log(
                    RunEvent::new()
                        .observation(format!(
                            "summary ready ({} chars)",
                            record.final_summary.chars().count()
                        ))
                        .meta("sign", entity.as_str())
                        .meta("source", source),
                );
                record
            }
            Err(e) => {
                warn!(%entity, source, error = %e, "summarization failed");
                self.logger.log(
                    RunEvent::new()
                        .observation(format!("summarize failed: {e}"))
                        .meta("sign", entity.as_str())
                        .meta("source", source)
                        .meta("status", "error"),
                );
                SummaryRecord::default()
            }
        }
    }
}

/// Join the non-blank narratives in source order, or `None` if there are none.
pub fn combine_narratives(summaries: &[SourceSummary]) -> Option<String> {
    let parts: Vec<&str> = summaries
        .iter()
        .map(|s| s.summary.final_summary.as_str())
        .filter(|s| !s.trim().is_empty())
        .collect();

    if parts.is_empty() {
        None
    } else {
        Some(parts.join(NARRATIVE_SEPARATOR))
    }
}

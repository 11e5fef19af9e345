//! End-to-end run: schedule fetches → consolidate per entity → persist.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{error, info, instrument, warn};

use starbrief_artifacts::ArtifactStore;
use starbrief_fetcher::Fetcher;
use starbrief_shared::{
    ConsolidatedArtifact, Entity, FetchOutcome, Result, RunDate, RunId, Source, SourceRef,
    SummaryRecord, TaskOutcome,
};
use starbrief_summarizer::Summarizer;

use crate::consolidator::Consolidator;
use crate::run_log::{RunEvent, RunLogger};
use crate::scheduler::{FetchProgress, SchedulerLimits, TaskScheduler};

/// What to run.
#[derive(Debug, Clone)]
pub struct RunRequest {
    pub date: RunDate,
    pub entities: Vec<Entity>,
    pub sources: Vec<Source>,
    pub limits: SchedulerLimits,
}

/// Lifecycle of a run, reported through [`ProgressReporter::phase`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunPhase {
    Idle,
    Scheduling,
    Consolidating(Entity),
    Persisted(Entity),
    Done,
}

/// An entity whose artifact could not be produced or written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntityFailure {
    pub entity: Entity,
    pub error: String,
}

/// Result of [`Orchestrator::run`].
#[derive(Debug)]
pub struct RunReport {
    pub run_id: RunId,
    pub date: RunDate,
    /// Merged summary per requested entity. Entities whose write failed are
    /// still present.
    pub merged: BTreeMap<Entity, SummaryRecord>,
    /// Artifact files written, in entity order.
    pub artifacts: Vec<PathBuf>,
    pub persist_failures: Vec<EntityFailure>,
    /// Entities whose consolidation crashed and fell back to an empty merge.
    pub consolidation_failures: Vec<EntityFailure>,
    pub tasks_total: usize,
    pub tasks_succeeded: usize,
    pub fetch_errors: usize,
    pub timeouts: usize,
    pub unsupported: usize,
    pub elapsed: Duration,
}

/// Progress callback for reporting run status.
pub trait ProgressReporter: Send + Sync {
    /// Called when the run moves to a new phase.
    fn phase(&self, phase: &RunPhase);
    /// Called as each fetch task finishes.
    fn task_finished(&self, outcome: &TaskOutcome, completed: usize, total: usize);
    /// Called when the run completes.
    fn done(&self, report: &RunReport);
}

/// No-op progress reporter for headless/test usage.
pub struct SilentProgress;

impl ProgressReporter for SilentProgress {
    fn phase(&self, _phase: &RunPhase) {}
    fn task_finished(&self, _outcome: &TaskOutcome, _completed: usize, _total: usize) {}
    fn done(&self, _report: &RunReport) {}
}

/// Wires the fetcher, summarizer, run log and artifact store into one run.
pub struct Orchestrator {
    fetcher: Arc<dyn Fetcher>,
    summarizer: Arc<dyn Summarizer>,
    logger: Arc<dyn RunLogger>,
    store: ArtifactStore,
}

impl Orchestrator {
    pub fn new(
        fetcher: Arc<dyn Fetcher>,
        summarizer: Arc<dyn Summarizer>,
        logger: Arc<dyn RunLogger>,
        store: ArtifactStore,
    ) -> Self {
        Self {
            fetcher,
            summarizer,
            logger,
            store,
        }
    }

    pub fn store(&self) -> &ArtifactStore {
        &self.store
    }

    /// Run the full pipeline.
    ///
    /// 1. Validate entity ids and prepare the output directory (fatal on error)
    /// 2. Fetch every `(entity, source)` pair under the scheduler limits
    /// 3. Consolidate each entity and persist its artifact immediately
    ///
    /// Per-task and per-entity failures are recorded in the report; only
    /// configuration and output-directory errors abort the run.
    #[instrument(skip_all, fields(date = %request.date, entities = request.entities.len(), sources = request.sources.len()))]
    pub async fn run(
        &self,
        request: &RunRequest,
        progress: &dyn ProgressReporter,
    ) -> Result<RunReport> {
        let start = Instant::now();
        let run_id = RunId::new();
        progress.phase(&RunPhase::Idle);

        info!(%run_id, date = %request.date, "starting run");

        // --- Phase 1: Output location ---
        for entity in &request.entities {
            self.store.artifact_path(request.date, entity)?;
        }
        let out_dir = self.store.prepare(request.date)?;

        // --- Phase 2: Fetch ---
        progress.phase(&RunPhase::Scheduling);
        let scheduler = TaskScheduler::new(
            Arc::clone(&self.fetcher),
            Arc::clone(&self.logger),
            request.limits,
        );
        let fetch_progress = PipelineFetchProgress { inner: progress };
        let schedule = scheduler
            .execute(
                &request.entities,
                &request.sources,
                request.date,
                &fetch_progress,
            )
            .await;

        // --- Phase 3: Consolidate + persist ---
        let consolidator = Consolidator::new(Arc::clone(&self.summarizer), Arc::clone(&self.logger));
        let mut report = RunReport {
            run_id,
            date: request.date,
            merged: BTreeMap::new(),
            artifacts: Vec::new(),
            persist_failures: Vec::new(),
            consolidation_failures: Vec::new(),
            tasks_total: schedule.total,
            tasks_succeeded: schedule.succeeded,
            fetch_errors: schedule.fetch_errors,
            timeouts: schedule.timed_out,
            unsupported: schedule.unsupported,
            elapsed: Duration::ZERO,
        };

        for group in schedule.entities {
            let entity = group.entity;
            progress.phase(&RunPhase::Consolidating(entity.clone()));

            let artifact = {
                let consolidator = consolidator.clone();
                let entity = entity.clone();
                let outcomes = group.outcomes.clone();
                let date = request.date;
                tokio::spawn(async move { consolidator.consolidate(&entity, date, &outcomes).await })
                    .await
            };

            let artifact = match artifact {
                Ok(artifact) => artifact,
                Err(e) => {
                    error!(%entity, error = %e, "consolidation crashed; writing fallback artifact");
                    report.consolidation_failures.push(EntityFailure {
                        entity: entity.clone(),
                        error: e.to_string(),
                    });
                    fallback_artifact(&entity, request.date, &group.outcomes)
                }
            };

            match self.store.write(&artifact) {
                Ok(path) => {
                    info!(%entity, path = %path.display(), sources = artifact.sources.len(), "artifact persisted");
                    report.artifacts.push(path);
                    progress.phase(&RunPhase::Persisted(entity.clone()));
                }
                Err(e) => {
                    warn!(%entity, error = %e, "failed to persist artifact");
                    self.logger.log(
                        RunEvent::new()
                            .observation(format!("persist failed: {e}"))
                            .meta("sign", entity.as_str())
                            .meta("status", "error"),
                    );
                    report.persist_failures.push(EntityFailure {
                        entity: entity.clone(),
                        error: e.to_string(),
                    });
                }
            }

            report.merged.insert(entity, artifact.merged);
        }

        report.elapsed = start.elapsed();

        self.logger.log(
            RunEvent::new()
                .final_answer(format!(
                    "Completed {} entities for {}",
                    report.merged.len(),
                    request.date
                ))
                .meta("run_id", run_id.to_string())
                .meta("out_dir", out_dir.display().to_string())
                .meta("tasks", report.tasks_total)
                .meta("succeeded", report.tasks_succeeded)
                .meta("persist_failures", report.persist_failures.len()),
        );

        info!(
            %run_id,
            entities = report.merged.len(),
            artifacts = report.artifacts.len(),
            elapsed_ms = report.elapsed.as_millis() as u64,
            "run complete"
        );

        progress.phase(&RunPhase::Done);
        progress.done(&report);
        Ok(report)
    }
}

/// Artifact used when consolidation itself crashed: sources are kept, no
/// summaries, empty merge.
fn fallback_artifact(entity: &Entity, date: RunDate, outcomes: &[TaskOutcome]) -> ConsolidatedArtifact {
    let sources = outcomes
        .iter()
        .filter_map(|o| match &o.outcome {
            FetchOutcome::Success { source_url, .. } => Some(SourceRef {
                interpreter: o.task.source.clone(),
                source_url: source_url.clone(),
            }),
            FetchOutcome::Failure { .. } => None,
        })
        .collect();

    ConsolidatedArtifact {
        entity: entity.clone(),
        date,
        sources,
        summaries: Vec::new(),
        merged: SummaryRecord::default(),
    }
}

/// Adapts a [`ProgressReporter`] to the scheduler's progress interface.
struct PipelineFetchProgress<'a> {
    inner: &'a dyn ProgressReporter,
}

impl FetchProgress for PipelineFetchProgress<'_> {
    fn task_finished(&self, outcome: &TaskOutcome, completed: usize, total: usize) {
        self.inner.task_finished(outcome, completed, total);
    }
}

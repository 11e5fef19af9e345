//! Bounded-concurrency fetch scheduling.
//!
//! Every `(entity, source)` pair becomes one [`FetchTask`]. Tasks are admitted
//! in submission order (entity-major, then source order) through a FIFO
//! semaphore; at most `concurrency` fetches are in flight at once. Each admitted
//! fetch runs under its own deadline and is cancelled when the deadline fires.
//! Unsupported sources short-circuit without taking a slot.

use std::collections::HashSet;
use std::hash::Hash;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{Semaphore, mpsc};
use tokio::time::Instant;
use tracing::{debug, info, instrument, warn};

use starbrief_fetcher::{FetchRequest, Fetcher};
use starbrief_shared::{
    Entity, FailureReason, FetchOutcome, FetchTask, RunDate, Source, TaskOutcome,
};

use crate::run_log::{RunEvent, RunLogger};

/// Admission limits for one scheduling pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SchedulerLimits {
    /// Maximum number of in-flight fetches (always at least 1).
    pub concurrency: usize,
    /// Per-task deadline, measured from admission.
    pub task_timeout: Duration,
}

impl SchedulerLimits {
    /// Build limits; a concurrency of zero is clamped to one.
    pub fn new(concurrency: usize, task_timeout: Duration) -> Self {
        Self {
            concurrency: concurrency.max(1),
            task_timeout,
        }
    }
}

/// Outcomes for one entity, in source order.
#[derive(Debug, Clone)]
pub struct EntityOutcomes {
    pub entity: Entity,
    pub outcomes: Vec<TaskOutcome>,
}

/// Result of a scheduling pass.
#[derive(Debug, Clone)]
pub struct ScheduleReport {
    /// One entry per requested entity, in request order.
    pub entities: Vec<EntityOutcomes>,
    pub total: usize,
    pub succeeded: usize,
    pub fetch_errors: usize,
    pub timed_out: usize,
    pub unsupported: usize,
    pub elapsed: Duration,
}

impl ScheduleReport {
    /// Outcomes recorded for `entity` (empty if the entity was not requested).
    pub fn outcomes_for(&self, entity: &Entity) -> &[TaskOutcome] {
        self.entities
            .iter()
            .find(|e| &e.entity == entity)
            .map_or(&[], |e| e.outcomes.as_slice())
    }

    pub fn failed(&self) -> usize {
        self.total - self.succeeded
    }
}

/// Per-task progress callback.
pub trait FetchProgress: Send + Sync {
    /// Called as each task reaches a terminal state (completion order).
    fn task_finished(&self, outcome: &TaskOutcome, completed: usize, total: usize);
}

/// No-op fetch progress.
pub struct SilentFetchProgress;

impl FetchProgress for SilentFetchProgress {
    fn task_finished(&self, _outcome: &TaskOutcome, _completed: usize, _total: usize) {}
}

/// Drives fetch tasks through a [`Fetcher`] under [`SchedulerLimits`].
pub struct TaskScheduler {
    fetcher: Arc<dyn Fetcher>,
    logger: Arc<dyn RunLogger>,
    limits: SchedulerLimits,
}

impl TaskScheduler {
    pub fn new(fetcher: Arc<dyn Fetcher>, logger: Arc<dyn RunLogger>, limits: SchedulerLimits) -> Self {
        Self {
            fetcher,
            logger,
            limits: SchedulerLimits::new(limits.concurrency, limits.task_timeout),
        }
    }

    pub fn limits(&self) -> SchedulerLimits {
        self.limits
    }

    /// Fetch every `(entity, source)` pair for `date`.
    ///
    /// Duplicate entities or sources are collapsed (first occurrence wins).
    /// Returns once every task has reached a terminal state; each pair yields
    /// exactly one outcome.
    #[instrument(skip_all, fields(entities = entities.len(), sources = sources.len(), concurrency = self.limits.concurrency))]
    pub async fn execute(
        &self,
        entities: &[Entity],
        sources: &[Source],
        date: RunDate,
        progress: &dyn FetchProgress,
    ) -> ScheduleReport {
        let started = Instant::now();
        let entities = dedup(entities);
        let sources = dedup(sources);

        let tasks: Vec<FetchTask> = entities
            .iter()
            .flat_map(|entity| {
                sources.iter().map(move |source| FetchTask {
                    entity: entity.clone(),
                    source: source.clone(),
                    date,
                })
            })
            .collect();
        let total = tasks.len();

        info!(
            tasks = total,
            concurrency = self.limits.concurrency,
            timeout_secs = self.limits.task_timeout.as_secs_f64(),
            "scheduling fetch tasks"
        );

        let semaphore = Arc::new(Semaphore::new(self.limits.concurrency));
        let (tx, mut rx) = mpsc::unbounded_channel::<(usize, FetchOutcome)>();

        // Admission runs alongside collection so progress is reported as
        // tasks finish rather than after the last admission.
        let submit = {
            let tasks = &tasks;
            let fetcher = &self.fetcher;
            let logger = &self.logger;
            let timeout = self.limits.task_timeout;
            let semaphore = Arc::clone(&semaphore);

            async move {
                let mut handles = Vec::with_capacity(total);

                for (index, task) in tasks.iter().enumerate() {
                    let Some(url) = fetcher.endpoint(task) else {
                        let _ = tx.send((
                            index,
                            FetchOutcome::failure(FailureReason::Unsupported(format!(
                                "no endpoint for source '{}'",
                                task.source
                            ))),
                        ));
                        continue;
                    };

                    // FIFO admission: later tasks wait behind earlier ones.
                    let permit = match Arc::clone(&semaphore).acquire_owned().await {
                        Ok(permit) => permit,
                        Err(e) => {
                            let _ = tx.send((
                                index,
                                FetchOutcome::failure(FailureReason::FetchError(e.to_string())),
                            ));
                            continue;
                        }
                    };

                    let fetcher = Arc::clone(fetcher);
                    let logger = Arc::clone(logger);
                    let tx = tx.clone();
                    let request = FetchRequest {
                        task: task.clone(),
                        url,
                        deadline: Instant::now() + timeout,
                    };

                    handles.push((
                        index,
                        tokio::spawn(async move {
                            let _permit = permit;
                            let outcome = run_fetch(fetcher.as_ref(), logger.as_ref(), &request).await;
                            let _ = tx.send((index, outcome));
                        }),
                    ));
                }

                for (index, handle) in handles {
                    if let Err(e) = handle.await {
                        warn!(task = %tasks[index], error = %e, "fetch task aborted");
                        let _ = tx.send((
                            index,
                            FetchOutcome::failure(FailureReason::FetchError(format!(
                                "fetch task aborted: {e}"
                            ))),
                        ));
                    }
                }
            }
        };

        let collect = async {
            let mut slots: Vec<Option<FetchOutcome>> = vec![None; total];
            let mut completed = 0;

            while completed < total {
                let Some((index, outcome)) = rx.recv().await else {
                    break;
                };
                if slots[index].is_some() {
                    continue;
                }

                let task_outcome = TaskOutcome {
                    task: tasks[index].clone(),
                    outcome,
                };
                self.logger.log(observation_event(&task_outcome));
                completed += 1;
                progress.task_finished(&task_outcome, completed, total);
                slots[index] = Some(task_outcome.outcome);
            }

            slots
        };

        let ((), slots) = tokio::join!(submit, collect);

        let mut report = ScheduleReport {
            entities: entities
                .iter()
                .map(|entity| EntityOutcomes {
                    entity: entity.clone(),
                    outcomes: Vec::with_capacity(sources.len()),
                })
                .collect(),
            total,
            succeeded: 0,
            fetch_errors: 0,
            timed_out: 0,
            unsupported: 0,
            elapsed: Duration::ZERO,
        };

        for (index, (task, slot)) in tasks.into_iter().zip(slots).enumerate() {
            let outcome = slot.unwrap_or_else(|| {
                FetchOutcome::failure(FailureReason::FetchError("no outcome recorded".into()))
            });
            match &outcome {
                FetchOutcome::Success { .. } => report.succeeded += 1,
                FetchOutcome::Failure { reason } => match reason {
                    FailureReason::Unsupported(_) => report.unsupported += 1,
                    FailureReason::Timeout => report.timed_out += 1,
                    FailureReason::FetchError(_) => report.fetch_errors += 1,
                },
            }
            // Tasks are entity-major, so the entity slot is index / sources.
            report.entities[index / sources.len()]
                .outcomes
                .push(TaskOutcome { task, outcome });
        }

        report.elapsed = started.elapsed();
        info!(
            total = report.total,
            succeeded = report.succeeded,
            fetch_errors = report.fetch_errors,
            timed_out = report.timed_out,
            unsupported = report.unsupported,
            elapsed_ms = report.elapsed.as_millis() as u64,
            "fetch phase complete"
        );
        report
    }
}

/// Run one admitted fetch under its deadline.
async fn run_fetch(fetcher: &dyn Fetcher, logger: &dyn RunLogger, request: &FetchRequest) -> FetchOutcome {
    let task = &request.task;
    logger.log(
        RunEvent::new()
            .thought(format!("Need {} text from {}", task.entity, task.source))
            .action("fetch")
            .meta("sign", task.entity.as_str())
            .meta("interpreter", task.source.as_str())
            .meta("date", task.date.to_string())
            .meta("url", request.url.as_str()),
    );
    debug!(task = %task, url = %request.url, "fetch started");

    match tokio::time::timeout_at(request.deadline, fetcher.fetch(request)).await {
        Ok(Ok(fetched)) if fetched.raw_text.trim().is_empty() => {
            FetchOutcome::failure(FailureReason::FetchError("fetched text is empty".into()))
        }
        Ok(Ok(fetched)) => FetchOutcome::Success {
            raw_text: fetched.raw_text,
            source_url: fetched.source_url,
        },
        Ok(Err(e)) => {
            warn!(task = %task, error = %e, "fetch failed");
            FetchOutcome::failure(FailureReason::FetchError(e.to_string()))
        }
        Err(_) => {
            warn!(task = %task, "fetch timed out");
            FetchOutcome::failure(FailureReason::Timeout)
        }
    }
}

fn observation_event(task_outcome: &TaskOutcome) -> RunEvent {
    let task = &task_outcome.task;
    let event = RunEvent::new()
        .meta("sign", task.entity.as_str())
        .meta("interpreter", task.source.as_str());

    match &task_outcome.outcome {
        FetchOutcome::Success { source_url, .. } => event
            .observation(format!("fetched {} chars", task_outcome.outcome.text_len()))
            .meta("status", "success")
            .meta("source_url", source_url.as_str()),
        FetchOutcome::Failure { reason } => {
            let status = match reason {
                FailureReason::Unsupported(_) => "unsupported",
                FailureReason::Timeout => "timeout",
                FailureReason::FetchError(_) => "error",
            };
            let observation = match reason {
                FailureReason::Timeout => "fetch timeout".to_string(),
                other => other.to_string(),
            };
            event.observation(observation).meta("status", status)
        }
    }
}

fn dedup<T: Clone + Eq + Hash>(items: &[T]) -> Vec<T> {
    let mut seen = HashSet::new();
    items
        .iter()
        .filter(|item| seen.insert(*item))
        .cloned()
        .collect()
}

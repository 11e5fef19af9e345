//! Starbrief core: run orchestration.
//!
//! This crate provides:
//! - [`scheduler`]: bounded-concurrency fetch scheduling with per-task deadlines
//! - [`consolidator`]: per-entity summarization and narrative merge
//! - [`pipeline`]: the end-to-end run (schedule → consolidate → persist)
//! - [`run_log`]: append-only structured run log

pub mod consolidator;
pub mod pipeline;
pub mod run_log;
pub mod scheduler;

#[cfg(test)]
mod testing;

pub use consolidator::{CONSOLIDATED_SOURCE, Consolidator, combine_narratives};
pub use pipeline::{
    EntityFailure, Orchestrator, ProgressReporter, RunPhase, RunReport, RunRequest, SilentProgress,
};
pub use run_log::{JsonlRunLogger, MemoryRunLogger, RunEvent, RunLogger};
pub use scheduler::{
    EntityOutcomes, FetchProgress, ScheduleReport, SchedulerLimits, SilentFetchProgress,
    TaskScheduler,
};

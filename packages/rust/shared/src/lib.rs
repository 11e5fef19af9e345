//! Shared types, error model, and configuration for Starbrief.
//!
//! This crate is the foundation depended on by all other Starbrief crates.
//! It provides:
//! - [`StarbriefError`]: the unified error type
//! - Domain types ([`Entity`], [`Source`], [`FetchTask`], [`FetchOutcome`],
//!   [`SummaryRecord`], [`ConsolidatedArtifact`])
//! - Configuration ([`AppConfig`], [`RunDefaults`], config loading)

pub mod config;
pub mod error;
pub mod types;

// Re-export public API at crate root for ergonomic imports.
pub use config::{
    AppConfig, BrowserConfig, FetchMode, RunDefaults, SummarizerConfig, config_dir,
    config_file_path, init_config, load_config, load_config_from, resolve_api_key,
    resolve_browser_token,
};
pub use error::{Result, StarbriefError};
pub use types::{
    ConsolidatedArtifact, DEFAULT_SIGNS, Entity, Facets, FailureReason, FetchOutcome, FetchTask,
    RunDate, RunId, Source, SourceRef, SourceSummary, SummaryRecord, TaskOutcome,
};

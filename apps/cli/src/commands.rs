//! CLI command definitions, routing, and tracing setup.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use chrono::{Local, NaiveDate};
use clap::{Args, Parser, Subcommand};
use color_eyre::eyre::{Result, eyre};
use indicatif::{ProgressBar, ProgressStyle};
use tracing::{info, warn};

use starbrief_artifacts::ArtifactStore;
use starbrief_core::pipeline::{
    Orchestrator, ProgressReporter, RunPhase, RunReport, RunRequest,
};
use starbrief_core::run_log::JsonlRunLogger;
use starbrief_core::scheduler::SchedulerLimits;
use starbrief_fetcher::{BrowserlessClient, SourceCatalog, WebFetcher};
use starbrief_shared::{
    AppConfig, Entity, FetchMode, FetchOutcome, Source, TaskOutcome, init_config, load_config,
    resolve_api_key, resolve_browser_token,
};
use starbrief_summarizer::{OpenAiSettings, OpenAiSummarizer};

// ---------------------------------------------------------------------------
// CLI structure
// ---------------------------------------------------------------------------

/// Starbrief: daily horoscope digests from several sources.
#[derive(Parser)]
#[command(
    name = "starbrief",
    version,
    about = "Fetch, summarize and consolidate daily horoscopes from multiple sources.",
    long_about = None,
)]
pub(crate) struct Cli {
    /// Log format: text (default) or json.
    #[arg(long, default_value = "text", global = true)]
    pub log_format: LogFormat,

    /// Verbosity level (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

/// Log output format.
#[derive(Clone, Debug, clap::ValueEnum)]
pub(crate) enum LogFormat {
    Text,
    Json,
}

/// Top-level CLI subcommands.
#[derive(Subcommand)]
pub(crate) enum Command {
    /// Fetch, summarize and consolidate one day's horoscopes.
    Run(RunArgs),

    /// List the configured sources and their URL templates.
    Sources,

    /// Configuration management.
    Config {
        /// Config subcommand.
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Flags for `starbrief run`. Unset flags fall back to the config file.
#[derive(Args, Debug)]
pub(crate) struct RunArgs {
    /// Run date (YYYY-MM-DD). Defaults to today.
    #[arg(long)]
    pub date: Option<NaiveDate>,

    /// Sources to query (comma-separated).
    #[arg(long, value_delimiter = ',')]
    pub sources: Vec<String>,

    /// Signs to process (comma-separated).
    #[arg(long, value_delimiter = ',')]
    pub entities: Vec<String>,

    /// Fetch strategy: auto, browser or requests.
    #[arg(long)]
    pub fetch_mode: Option<FetchMode>,

    /// Maximum number of concurrent fetches.
    #[arg(long)]
    pub max_concurrency: Option<usize>,

    /// Per-fetch timeout in seconds.
    #[arg(long)]
    pub timeout_secs: Option<u64>,

    /// Output directory for artifacts.
    #[arg(long)]
    pub out: Option<PathBuf>,

    /// Directory for run logs.
    #[arg(long)]
    pub log_dir: Option<PathBuf>,
}

/// Config subcommands.
#[derive(Subcommand)]
pub(crate) enum ConfigAction {
    /// Initialize config file with defaults.
    Init,
    /// Show resolved configuration.
    Show,
}

// ---------------------------------------------------------------------------
// Tracing setup
// ---------------------------------------------------------------------------

/// Initialize tracing based on CLI flags.
pub(crate) fn init_tracing(cli: &Cli) {
    use tracing_subscriber::{EnvFilter, fmt};

    let filter = match cli.verbose {
        0 => "starbrief=info",
        1 => "starbrief=debug",
        _ => "starbrief=trace",
    };

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(filter));

    match cli.log_format {
        LogFormat::Text => {
            fmt()
                .with_env_filter(env_filter)
                .with_target(false)
                .init();
        }
        LogFormat::Json => {
            fmt()
                .json()
                .with_env_filter(env_filter)
                .init();
        }
    }
}

// ---------------------------------------------------------------------------
// Command dispatch
// ---------------------------------------------------------------------------

/// Run the CLI command.
pub(crate) async fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Command::Run(args) => cmd_run(args).await,
        Command::Sources => cmd_sources(),
        Command::Config { action } => match action {
            ConfigAction::Init => cmd_config_init(),
            ConfigAction::Show => cmd_config_show(),
        },
    }
}

// ---------------------------------------------------------------------------
// run
// ---------------------------------------------------------------------------

/// Settings for one run after merging flags over the config file.
#[derive(Debug)]
struct ResolvedRun {
    date: NaiveDate,
    entities: Vec<Entity>,
    sources: Vec<Source>,
    fetch_mode: FetchMode,
    limits: SchedulerLimits,
    out_dir: PathBuf,
    log_dir: PathBuf,
}

impl ResolvedRun {
    fn new(args: RunArgs, config: &AppConfig) -> Self {
        let defaults = &config.defaults;
        let or_default = |values: Vec<String>, fallback: &[String]| {
            if values.is_empty() {
                fallback.to_vec()
            } else {
                values
            }
        };

        Self {
            date: args.date.unwrap_or_else(|| Local::now().date_naive()),
            entities: or_default(args.entities, &defaults.entities)
                .into_iter()
                .map(Entity::new)
                .collect(),
            sources: or_default(args.sources, &defaults.sources)
                .into_iter()
                .map(Source::new)
                .collect(),
            fetch_mode: args.fetch_mode.unwrap_or(defaults.fetch_mode),
            limits: SchedulerLimits::new(
                args.max_concurrency.unwrap_or(defaults.max_concurrency),
                Duration::from_secs(args.timeout_secs.unwrap_or(defaults.task_timeout_secs)),
            ),
            out_dir: args.out.unwrap_or_else(|| PathBuf::from(&defaults.output_dir)),
            log_dir: args.log_dir.unwrap_or_else(|| PathBuf::from(&defaults.log_dir)),
        }
    }
}

async fn cmd_run(args: RunArgs) -> Result<()> {
    // Credentials are checked before any work is scheduled.
    let config = load_config()?;
    let api_key = resolve_api_key(&config)?;
    let resolved = ResolvedRun::new(args, &config);

    if resolved.entities.is_empty() {
        return Err(eyre!("no signs to process; pass --entities or set defaults.entities"));
    }

    let catalog = SourceCatalog::from_config(&config);
    for source in &resolved.sources {
        if !catalog.contains(source) {
            warn!(%source, "no URL template configured; its tasks will be marked unsupported");
        }
    }

    let browser = match config.browser.base_url.as_deref() {
        Some(base_url) => Some(BrowserlessClient::new(
            base_url,
            resolve_browser_token(&config).as_deref(),
        )?),
        None => None,
    };
    let fetcher = WebFetcher::new(catalog, resolved.fetch_mode, browser)?;
    let summarizer =
        OpenAiSummarizer::new(OpenAiSettings::from_config(&config.summarizer, api_key))?;
    let logger = JsonlRunLogger::for_run(&resolved.log_dir)?;
    let log_path = logger.path().to_path_buf();

    info!(
        date = %resolved.date,
        entities = resolved.entities.len(),
        sources = resolved.sources.len(),
        fetch_mode = %resolved.fetch_mode,
        browser = fetcher.uses_browser(),
        model = summarizer.model(),
        "starting run"
    );

    let store = ArtifactStore::new(&resolved.out_dir);
    let out_dir = store.date_dir(resolved.date);
    let orchestrator = Orchestrator::new(
        Arc::new(fetcher),
        Arc::new(summarizer),
        Arc::new(logger),
        store,
    );

    let request = RunRequest {
        date: resolved.date,
        entities: resolved.entities,
        sources: resolved.sources,
        limits: resolved.limits,
    };

    let reporter = CliProgress::new();
    let report = orchestrator.run(&request, &reporter).await?;

    println!();
    println!("  Run complete for {}", report.date);
    println!("  Run ID:    {}", report.run_id);
    println!(
        "  Fetches:   {} ok / {} total ({} errors, {} timeouts, {} unsupported)",
        report.tasks_succeeded,
        report.tasks_total,
        report.fetch_errors,
        report.timeouts,
        report.unsupported
    );
    println!("  Artifacts: {} in {}", report.artifacts.len(), out_dir.display());
    println!("  Run log:   {}", log_path.display());
    println!("  Time:      {:.1}s", report.elapsed.as_secs_f64());
    for failure in report
        .persist_failures
        .iter()
        .chain(&report.consolidation_failures)
    {
        println!("  ! {}: {}", failure.entity, failure.error);
    }
    println!();

    Ok(())
}

// ---------------------------------------------------------------------------
// CLI progress reporter
// ---------------------------------------------------------------------------

/// CLI progress reporter using an indicatif bar.
struct CliProgress {
    bar: ProgressBar,
}

impl CliProgress {
    fn new() -> Self {
        let bar = ProgressBar::new_spinner();
        bar.set_style(
            ProgressStyle::with_template("{spinner:.cyan} [{pos}/{len}] {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner())
                .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]),
        );
        bar.enable_steady_tick(Duration::from_millis(80));
        Self { bar }
    }
}

impl ProgressReporter for CliProgress {
    fn phase(&self, phase: &RunPhase) {
        match phase {
            RunPhase::Idle => self.bar.set_message("Preparing"),
            RunPhase::Scheduling => self.bar.set_message("Fetching"),
            RunPhase::Consolidating(entity) => self.bar.set_message(format!("Summarizing {entity}")),
            RunPhase::Persisted(entity) => self.bar.set_message(format!("Saved {entity}")),
            RunPhase::Done => self.bar.set_message("Done"),
        }
    }

    fn task_finished(&self, outcome: &TaskOutcome, completed: usize, total: usize) {
        let status = match &outcome.outcome {
            FetchOutcome::Success { .. } => "ok".to_string(),
            FetchOutcome::Failure { reason } => reason.to_string(),
        };
        self.bar.set_length(total as u64);
        self.bar.set_position(completed as u64);
        self.bar.set_message(format!("Fetched {} ({status})", outcome.task));
    }

    fn done(&self, _report: &RunReport) {
        self.bar.finish_and_clear();
    }
}

// ---------------------------------------------------------------------------
// sources / config
// ---------------------------------------------------------------------------

fn cmd_sources() -> Result<()> {
    let config = load_config()?;
    let catalog = SourceCatalog::from_config(&config);
    let enabled = &config.defaults.sources;

    for (source, template) in catalog.iter() {
        let marker = if enabled.iter().any(|s| s == source.as_str()) {
            "*"
        } else {
            " "
        };
        println!("{marker} {:<20} {template}", source.as_str());
    }
    Ok(())
}

fn cmd_config_init() -> Result<()> {
    let path = init_config()?;
    println!("Config initialized at: {}", path.display());
    Ok(())
}

fn cmd_config_show() -> Result<()> {
    let config: AppConfig = load_config()?;
    let toml_str = toml::to_string_pretty(&config)?;
    println!("{toml_str}");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(args).unwrap()
    }

    #[test]
    fn run_flags_override_config_defaults() {
        let cli = parse(&[
            "starbrief",
            "run",
            "--date",
            "2025-03-21",
            "--entities",
            "Aries,Leo",
            "--sources",
            "astrology.com",
            "--fetch-mode",
            "auto",
            "--max-concurrency",
            "4",
            "--timeout-secs",
            "10",
            "--out",
            "/tmp/out",
        ]);
        let Command::Run(args) = cli.command else {
            panic!("expected run command");
        };

        let resolved = ResolvedRun::new(args, &AppConfig::default());
        assert_eq!(resolved.date, NaiveDate::from_ymd_opt(2025, 3, 21).unwrap());
        assert_eq!(resolved.entities, vec![Entity::new("Aries"), Entity::new("Leo")]);
        assert_eq!(resolved.sources, vec![Source::new("astrology.com")]);
        assert_eq!(resolved.fetch_mode, FetchMode::Auto);
        assert_eq!(resolved.limits, SchedulerLimits::new(4, Duration::from_secs(10)));
        assert_eq!(resolved.out_dir, PathBuf::from("/tmp/out"));
        assert_eq!(resolved.log_dir, PathBuf::from("data/logs"));
    }

    #[test]
    fn run_without_flags_uses_config() {
        let cli = parse(&["starbrief", "run"]);
        let Command::Run(args) = cli.command else {
            panic!("expected run command");
        };

        let config = AppConfig::default();
        let resolved = ResolvedRun::new(args, &config);
        assert_eq!(resolved.entities.len(), 12);
        assert_eq!(resolved.sources.len(), 2);
        assert_eq!(resolved.fetch_mode, FetchMode::Requests);
        assert_eq!(resolved.limits, SchedulerLimits::new(2, Duration::from_secs(45)));
        assert_eq!(resolved.out_dir, PathBuf::from("data/summaries"));
    }

    #[test]
    fn invalid_values_are_rejected() {
        assert!(Cli::try_parse_from(["starbrief", "run", "--date", "21/03/2025"]).is_err());
        assert!(Cli::try_parse_from(["starbrief", "run", "--fetch-mode", "curl"]).is_err());
    }
}

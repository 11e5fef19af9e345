//! Application configuration for Starbrief.
//!
//! User config lives at `~/.starbrief/starbrief.toml`.
//! CLI flags override config file values, which override defaults.

use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{Result, StarbriefError};
use crate::types::DEFAULT_SIGNS;

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "starbrief.toml";

/// Default config directory name under the user's home.
const CONFIG_DIR_NAME: &str = ".starbrief";

// ---------------------------------------------------------------------------
// Config structs (matching starbrief.toml schema)
// ---------------------------------------------------------------------------

/// Top-level application config, deserialized from TOML.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Run defaults.
    #[serde(default)]
    pub defaults: RunDefaults,

    /// Text-completion service settings.
    #[serde(default)]
    pub summarizer: SummarizerConfig,

    /// Headless browser service settings.
    #[serde(default)]
    pub browser: BrowserConfig,

    /// Source id → URL template (`{entity}` is replaced by the lower-cased entity).
    #[serde(default = "default_sources")]
    pub sources: BTreeMap<String, String>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            defaults: RunDefaults::default(),
            summarizer: SummarizerConfig::default(),
            browser: BrowserConfig::default(),
            sources: default_sources(),
        }
    }
}

fn default_sources() -> BTreeMap<String, String> {
    BTreeMap::from([
        (
            "horoscope.com".to_string(),
            "https://www.horoscope.com/us/horoscopes/general/horoscope-general-daily-{entity}.aspx"
                .to_string(),
        ),
        (
            "astrology.com".to_string(),
            "https://www.astrology.com/horoscope/daily/{entity}.html".to_string(),
        ),
    ])
}

/// How the fetcher retrieves pages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FetchMode {
    /// Headless browser when a browser token is configured, plain HTTP otherwise.
    Auto,
    /// Headless browser first, falling back to plain HTTP.
    Browser,
    /// Plain HTTP only.
    #[default]
    Requests,
}

impl fmt::Display for FetchMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Auto => "auto",
            Self::Browser => "browser",
            Self::Requests => "requests",
        })
    }
}

impl FromStr for FetchMode {
    type Err = StarbriefError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "auto" => Ok(Self::Auto),
            "browser" => Ok(Self::Browser),
            "requests" => Ok(Self::Requests),
            other => Err(StarbriefError::config(format!(
                "unknown fetch mode '{other}': expected auto, browser, or requests"
            ))),
        }
    }
}

/// `[defaults]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunDefaults {
    /// Root directory for per-date artifact folders.
    #[serde(default = "default_output_dir")]
    pub output_dir: String,

    /// Directory for JSON-lines run logs.
    #[serde(default = "default_log_dir")]
    pub log_dir: String,

    /// Maximum fetches in flight.
    #[serde(default = "default_max_concurrency")]
    pub max_concurrency: usize,

    /// Per-fetch deadline in seconds.
    #[serde(default = "default_task_timeout_secs")]
    pub task_timeout_secs: u64,

    /// Fetch strategy.
    #[serde(default)]
    pub fetch_mode: FetchMode,

    /// Sources queried when none are given on the command line.
    #[serde(default = "default_source_ids")]
    pub sources: Vec<String>,

    /// Entities processed when none are given on the command line.
    #[serde(default = "default_entities")]
    pub entities: Vec<String>,
}

impl Default for RunDefaults {
    fn default() -> Self {
        Self {
            output_dir: default_output_dir(),
            log_dir: default_log_dir(),
            max_concurrency: default_max_concurrency(),
            task_timeout_secs: default_task_timeout_secs(),
            fetch_mode: FetchMode::default(),
            sources: default_source_ids(),
            entities: default_entities(),
        }
    }
}

fn default_output_dir() -> String {
    "data/summaries".into()
}
fn default_log_dir() -> String {
    "data/logs".into()
}
fn default_max_concurrency() -> usize {
    2
}
fn default_task_timeout_secs() -> u64 {
    45
}
fn default_source_ids() -> Vec<String> {
    vec!["horoscope.com".into(), "astrology.com".into()]
}
fn default_entities() -> Vec<String> {
    DEFAULT_SIGNS.iter().map(|s| s.to_string()).collect()
}

/// `[summarizer]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SummarizerConfig {
    /// Name of the env var holding the API key (never store the key itself).
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,

    /// Chat model used for every summarization call.
    #[serde(default = "default_model")]
    pub model: String,

    /// OpenAI-compatible API root.
    #[serde(default = "default_base_url")]
    pub base_url: String,

    #[serde(default = "default_temperature")]
    pub temperature: f32,

    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
}

impl Default for SummarizerConfig {
    fn default() -> Self {
        Self {
            api_key_env: default_api_key_env(),
            model: default_model(),
            base_url: default_base_url(),
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
        }
    }
}

fn default_api_key_env() -> String {
    "OPENAI_API_KEY".into()
}
fn default_model() -> String {
    "gpt-4o-mini".into()
}
fn default_base_url() -> String {
    "https://api.openai.com/v1".into()
}
fn default_temperature() -> f32 {
    0.2
}
fn default_max_tokens() -> u32 {
    800
}

/// `[browser]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BrowserConfig {
    /// Browserless endpoint root. Browser mode is unavailable when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,

    /// Name of the env var holding the browser service token.
    #[serde(default = "default_token_env")]
    pub token_env: String,
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            base_url: None,
            token_env: default_token_env(),
        }
    }
}

fn default_token_env() -> String {
    "BROWSERLESS_TOKEN".into()
}

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

/// Get the path to the config directory (`~/.starbrief/`).
pub fn config_dir() -> Result<PathBuf> {
    let home = dirs::home_dir()
        .ok_or_else(|| StarbriefError::config("could not determine home directory"))?;
    Ok(home.join(CONFIG_DIR_NAME))
}

/// Get the path to the config file (`~/.starbrief/starbrief.toml`).
pub fn config_file_path() -> Result<PathBuf> {
    Ok(config_dir()?.join(CONFIG_FILE_NAME))
}

/// Load the application config from disk. Returns defaults if the file does not exist.
pub fn load_config() -> Result<AppConfig> {
    let path = config_file_path()?;

    if !path.exists() {
        tracing::debug!(?path, "config file not found, using defaults");
        return Ok(AppConfig::default());
    }

    load_config_from(&path)
}

/// Load the application config from a specific file path.
pub fn load_config_from(path: &Path) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path).map_err(|e| StarbriefError::io(path, e))?;

    toml::from_str(&content).map_err(|e| {
        StarbriefError::config(format!("failed to parse {}: {e}", path.display()))
    })
}

/// Create the config directory and write a default config file.
/// Returns the path to the created file.
pub fn init_config() -> Result<PathBuf> {
    let dir = config_dir()?;
    std::fs::create_dir_all(&dir).map_err(|e| StarbriefError::io(&dir, e))?;

    let path = dir.join(CONFIG_FILE_NAME);
    let config = AppConfig::default();
    let content =
        toml::to_string_pretty(&config).map_err(|e| StarbriefError::config(e.to_string()))?;

    std::fs::write(&path, content).map_err(|e| StarbriefError::io(&path, e))?;
    tracing::info!(?path, "created default config file");

    Ok(path)
}

/// Read the summarizer API key from the configured env var.
pub fn resolve_api_key(config: &AppConfig) -> Result<String> {
    let var_name = &config.summarizer.api_key_env;
    match std::env::var(var_name) {
        Ok(val) if !val.trim().is_empty() => Ok(val),
        _ => Err(StarbriefError::config(format!(
            "summarizer API key not found. Set the {var_name} environment variable."
        ))),
    }
}

/// Read the optional browser service token from the configured env var.
pub fn resolve_browser_token(config: &AppConfig) -> Option<String> {
    std::env::var(&config.browser.token_env)
        .ok()
        .filter(|v| !v.trim().is_empty())
}

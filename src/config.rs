//! Configuration loading with env-var overrides.
//!
//! Reads `config/default.toml` (or the `-f` path) relative to the current
//! working directory, then applies `STIRIXIS_WORK_DIR` and
//! `STIRIXIS_LOG_LEVEL` env overrides.

use std::{
    env, fs,
    path::{Path, PathBuf},
};

use serde::Deserialize;

use crate::error::AppError;
use crate::logger;

const DEFAULT_CONFIG_PATH: &str = "config/default.toml";

/// Credential/reminder store configuration.
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// SQLite file, resolved against `work_dir` when relative.
    pub db_path: PathBuf,
}

/// Model-runner subprocess configuration (`[llm.subprocess]`).
#[derive(Debug, Clone)]
pub struct SubprocessConfig {
    /// Executable name or path, e.g. `"ollama"`.
    pub command: String,
    /// Arguments passed before the query is piped to stdin.
    pub args: Vec<String>,
    /// Exported to the child as `OLLAMA_HOST` when set.
    pub host: Option<String>,
    /// Prepended to the child's `PATH`.
    pub path_dirs: Vec<PathBuf>,
}

/// HTTP run-endpoint configuration (`[llm.http]`).
#[derive(Debug, Clone)]
pub struct HttpConfig {
    pub url: String,
}

/// LLM configuration.
#[derive(Debug, Clone)]
pub struct LlmConfig {
    /// Which provider is active (`"subprocess"`, `"http"`, `"dummy"`).
    /// Maps to `default` in `[llm]` TOML.
    pub provider: String,
    /// Upper bound on a single query round-trip.
    pub timeout_seconds: u64,
    pub subprocess: SubprocessConfig,
    pub http: HttpConfig,
}

/// Relay worker pool configuration.
#[derive(Debug, Clone)]
pub struct RelayConfig {
    /// Maximum number of queries in flight at once.
    pub workers: usize,
}

/// Reminder poller configuration.
#[derive(Debug, Clone)]
pub struct ReminderConfig {
    pub enabled: bool,
    pub poll_interval_secs: u64,
}

/// Fully-resolved application configuration.
#[derive(Debug, Clone)]
pub struct Config {
    pub app_name: String,
    /// Working directory for all persistent data (already expanded, no `~`).
    pub work_dir: PathBuf,
    pub log_level: String,
    /// Optional log file; logs go to stderr when unset.
    pub log_file: Option<PathBuf>,
    pub store: StoreConfig,
    pub llm: LlmConfig,
    pub relay: RelayConfig,
    pub reminders: ReminderConfig,
}

/// Raw TOML shape: `serde` target before resolution.
#[derive(Deserialize)]
struct RawConfig {
    app: RawApp,
    #[serde(default)]
    store: RawStore,
    #[serde(default)]
    llm: RawLlm,
    #[serde(default)]
    relay: RawRelay,
    #[serde(default)]
    reminders: RawReminders,
}

#[derive(Deserialize)]
struct RawApp {
    #[serde(default = "default_app_name")]
    name: String,
    work_dir: String,
    #[serde(default = "default_log_level")]
    log_level: String,
    #[serde(default)]
    log_file: Option<String>,
}

#[derive(Deserialize)]
struct RawStore {
    #[serde(default = "default_db_file")]
    db_file: String,
}

impl Default for RawStore {
    fn default() -> Self {
        Self { db_file: default_db_file() }
    }
}

#[derive(Deserialize)]
struct RawLlm {
    #[serde(rename = "default", default = "default_llm_provider")]
    provider: String,
    #[serde(default = "default_timeout_seconds")]
    timeout_seconds: u64,
    #[serde(default)]
    subprocess: RawSubprocess,
    #[serde(default)]
    http: RawHttp,
}

impl Default for RawLlm {
    fn default() -> Self {
        Self {
            provider: default_llm_provider(),
            timeout_seconds: default_timeout_seconds(),
            subprocess: RawSubprocess::default(),
            http: RawHttp::default(),
        }
    }
}

#[derive(Deserialize)]
struct RawSubprocess {
    #[serde(default = "default_command")]
    command: String,
    #[serde(default = "default_args")]
    args: Vec<String>,
    #[serde(default)]
    host: Option<String>,
    #[serde(default)]
    path_dirs: Vec<String>,
}

impl Default for RawSubprocess {
    fn default() -> Self {
        Self {
            command: default_command(),
            args: default_args(),
            host: None,
            path_dirs: Vec::new(),
        }
    }
}

#[derive(Deserialize)]
struct RawHttp {
    #[serde(default = "default_http_url")]
    url: String,
}

impl Default for RawHttp {
    fn default() -> Self {
        Self { url: default_http_url() }
    }
}

#[derive(Deserialize)]
struct RawRelay {
    #[serde(default = "default_workers")]
    workers: usize,
}

impl Default for RawRelay {
    fn default() -> Self {
        Self { workers: default_workers() }
    }
}

#[derive(Deserialize)]
struct RawReminders {
    #[serde(default = "default_true")]
    enabled: bool,
    #[serde(default = "default_poll_interval_secs")]
    poll_interval_secs: u64,
}

impl Default for RawReminders {
    fn default() -> Self {
        Self {
            enabled: true,
            poll_interval_secs: default_poll_interval_secs(),
        }
    }
}

fn default_app_name() -> String { "myStirixis Assistant".to_string() }
fn default_log_level() -> String { "info".to_string() }
fn default_db_file() -> String { "users.db".to_string() }
fn default_llm_provider() -> String { "subprocess".to_string() }
fn default_timeout_seconds() -> u64 { 30 }
fn default_command() -> String { "ollama".to_string() }
fn default_args() -> Vec<String> { vec!["run".to_string(), "deepseek-r1".to_string()] }
fn default_http_url() -> String { "http://127.0.0.1:11434/api/v1/run/deepseek-r1".to_string() }
fn default_workers() -> usize { 2 }
fn default_poll_interval_secs() -> u64 { 60 }

fn default_true() -> bool {
    true
}

/// Load config from `path` (default `config/default.toml`), then apply
/// env-var overrides.
pub fn load(path: Option<&str>) -> Result<Config, AppError> {
    let work_dir_override = env::var("STIRIXIS_WORK_DIR").ok();
    let log_level_override = env::var("STIRIXIS_LOG_LEVEL").ok();
    load_from(
        Path::new(path.unwrap_or(DEFAULT_CONFIG_PATH)),
        work_dir_override.as_deref(),
        log_level_override.as_deref(),
    )
}

/// Internal loader: accepts an explicit path and optional overrides.
/// Tests pass overrides directly instead of mutating env vars.
pub fn load_from(
    path: &Path,
    work_dir_override: Option<&str>,
    log_level_override: Option<&str>,
) -> Result<Config, AppError> {
    let raw = fs::read_to_string(path)
        .map_err(|e| AppError::Config(format!("cannot read {}: {e}", path.display())))?;

    let parsed: RawConfig = toml::from_str(&raw)
        .map_err(|e| AppError::Config(format!("parse error in {}: {e}", path.display())))?;

    let app = parsed.app;
    let work_dir = expand_home(work_dir_override.unwrap_or(&app.work_dir));
    let log_level = log_level_override.unwrap_or(&app.log_level).to_string();
    logger::parse_level(&log_level)
        .map_err(|_| AppError::Config(format!("app.log_level: unrecognised level '{log_level}'")))?;

    if parsed.llm.timeout_seconds == 0 {
        return Err(AppError::Config("llm.timeout_seconds must be > 0".into()));
    }
    if parsed.relay.workers == 0 {
        return Err(AppError::Config("relay.workers must be > 0".into()));
    }
    if parsed.reminders.poll_interval_secs == 0 {
        return Err(AppError::Config("reminders.poll_interval_secs must be > 0".into()));
    }

    Ok(Config {
        app_name: app.name,
        log_level,
        log_file: app.log_file.map(|f| resolve_in(&work_dir, &f)),
        store: StoreConfig {
            db_path: resolve_in(&work_dir, &parsed.store.db_file),
        },
        llm: LlmConfig {
            provider: parsed.llm.provider,
            timeout_seconds: parsed.llm.timeout_seconds,
            subprocess: SubprocessConfig {
                command: parsed.llm.subprocess.command,
                args: parsed.llm.subprocess.args,
                host: parsed.llm.subprocess.host,
                path_dirs: parsed
                    .llm
                    .subprocess
                    .path_dirs
                    .iter()
                    .map(|d| expand_home(d))
                    .collect(),
            },
            http: HttpConfig { url: parsed.llm.http.url },
        },
        relay: RelayConfig { workers: parsed.relay.workers },
        reminders: ReminderConfig {
            enabled: parsed.reminders.enabled,
            poll_interval_secs: parsed.reminders.poll_interval_secs,
        },
        work_dir,
    })
}

/// Absolute paths (after `~` expansion) are kept; relative ones land in `base`.
fn resolve_in(base: &Path, path: &str) -> PathBuf {
    let p = expand_home(path);
    if p.is_absolute() { p } else { base.join(p) }
}

/// Expand a leading `~` to the user's home directory.
/// Absolute or relative paths without `~` are returned unchanged.
pub fn expand_home(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(rest);
        }
    }
    if path == "~" {
        if let Some(home) = dirs::home_dir() {
            return home;
        }
    }
    PathBuf::from(path)
}

// ── test helpers ──────────────────────────────────────────────────────────────

/// Safe `Config` for tests: dummy LLM, database under `work_dir`.
#[cfg(test)]
impl Config {
    pub fn test_default(work_dir: &Path) -> Self {
        Self {
            app_name: "test".into(),
            work_dir: work_dir.to_path_buf(),
            log_level: "info".into(),
            log_file: None,
            store: StoreConfig { db_path: work_dir.join("users.db") },
            llm: LlmConfig {
                provider: "dummy".into(),
                timeout_seconds: 1,
                subprocess: SubprocessConfig {
                    command: "cat".into(),
                    args: Vec::new(),
                    host: None,
                    path_dirs: Vec::new(),
                },
                http: HttpConfig { url: "http://localhost:0/run".into() },
            },
            relay: RelayConfig { workers: 1 },
            reminders: ReminderConfig { enabled: true, poll_interval_secs: 60 },
        }
    }
}

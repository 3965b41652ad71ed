//! Application configuration structures.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{AppError, Result};

/// Root application configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// Where the raw grid comes from
    #[serde(default)]
    pub source: SourceConfig,

    /// Webhook delivery settings
    #[serde(default)]
    pub notifier: NotifierConfig,

    /// Polling loop behavior
    #[serde(default)]
    pub monitor: MonitorConfig,

    /// Local recovery file
    #[serde(default)]
    pub checkpoint: CheckpointConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Ok(toml::from_str(&content)?)
    }

    /// Load configuration or return default if loading fails.
    pub fn load_or_default(path: impl AsRef<Path>) -> Self {
        Self::load(&path).unwrap_or_else(|e| {
            log::warn!(
                "Config load failed from {:?}: {}. Using defaults.",
                path.as_ref(),
                e
            );
            Self::default()
        })
    }

    /// Apply overrides from the process environment.
    pub fn apply_env(&mut self) -> Result<()> {
        self.apply_overrides(|key| std::env::var(key).ok())
    }

    /// Apply overrides from any key lookup (environment variable names).
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<()> {
        if let Some(path) = lookup("GOOGLE_CREDENTIALS_PATH") {
            self.source.credentials_path = PathBuf::from(path);
        }
        if let Some(id) = lookup("SHEETS_DOCUMENT_ID") {
            self.source.document_id = id;
        }
        if let Some(name) = lookup("WORKSHEET_NAME") {
            self.source.worksheet = name;
        }
        if let Some(path) = lookup("GRID_FILE") {
            self.source.kind = SourceKind::File;
            self.source.grid_path = Some(PathBuf::from(path));
        }
        if let Some(url) = lookup("API_BASE_URL") {
            self.notifier.api_base_url = url;
        }
        if let Some(minutes) = lookup("CHECK_INTERVAL_MINUTES") {
            self.monitor.check_interval_minutes = parse_number("CHECK_INTERVAL_MINUTES", &minutes)?;
        }
        if let Some(retries) = lookup("MAX_RETRIES") {
            self.monitor.max_consecutive_failures = parse_number("MAX_RETRIES", &retries)?;
        }
        if let Some(delay) = lookup("RETRY_DELAY_SECONDS") {
            self.monitor.retry_delay_secs = parse_number("RETRY_DELAY_SECONDS", &delay)?;
        }
        if let Some(path) = lookup("CACHE_FILE") {
            self.checkpoint.path = PathBuf::from(path);
        }
        if let Some(level) = lookup("LOG_LEVEL") {
            self.logging.level = level;
        }
        Ok(())
    }

    /// Validate configuration values for basic sanity.
    pub fn validate(&self) -> Result<()> {
        match self.source.kind {
            SourceKind::Sheets => {
                if self.source.document_id.trim().is_empty() {
                    return Err(AppError::config("SHEETS_DOCUMENT_ID is required"));
                }
                if !self.source.credentials_path.exists() {
                    return Err(AppError::config(format!(
                        "Credentials file not found: {}",
                        self.source.credentials_path.display()
                    )));
                }
            }
            SourceKind::File => match &self.source.grid_path {
                None => return Err(AppError::config("source.grid_path is required")),
                Some(path) if !path.exists() => {
                    return Err(AppError::config(format!(
                        "Grid file not found: {}",
                        path.display()
                    )));
                }
                Some(_) => {}
            },
        }
        if self.source.worksheet.trim().is_empty() {
            return Err(AppError::validation("source.worksheet is empty"));
        }
        if self.source.timeout_secs == 0 {
            return Err(AppError::validation("source.timeout_secs must be > 0"));
        }
        if self.notifier.timeout_secs == 0 {
            return Err(AppError::validation("notifier.timeout_secs must be > 0"));
        }
        self.notifier.endpoint()?;
        if self.monitor.check_interval_minutes == 0 {
            return Err(AppError::validation(
                "monitor.check_interval_minutes must be > 0",
            ));
        }
        if self.monitor.max_consecutive_failures == 0 {
            return Err(AppError::validation(
                "monitor.max_consecutive_failures must be > 0",
            ));
        }
        if self.checkpoint.max_age_hours == 0 {
            return Err(AppError::validation("checkpoint.max_age_hours must be > 0"));
        }
        Ok(())
    }

    /// Render the default configuration as a TOML template.
    pub fn template() -> Result<String> {
        Ok(toml::to_string_pretty(&Self::default())?)
    }
}

fn parse_number<T: std::str::FromStr>(key: &str, value: &str) -> Result<T> {
    value
        .trim()
        .parse()
        .map_err(|_| AppError::config(format!("{key} must be a non-negative integer, got {value:?}")))
}

/// Which backend supplies the raw grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    /// Remote spreadsheet through the Sheets REST API
    #[default]
    Sheets,
    /// Local JSON file holding a two-dimensional string array
    File,
}

/// Grid source settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceConfig {
    #[serde(default)]
    pub kind: SourceKind,

    /// JSON credentials file for the Sheets API
    #[serde(default = "defaults::credentials_path")]
    pub credentials_path: PathBuf,

    /// Spreadsheet document identifier (from its URL)
    #[serde(default)]
    pub document_id: String,

    /// Worksheet (tab) name inside the document
    #[serde(default = "defaults::worksheet")]
    pub worksheet: String,

    /// Grid file used by the `file` source
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub grid_path: Option<PathBuf>,

    /// Request timeout in seconds
    #[serde(default = "defaults::timeout")]
    pub timeout_secs: u64,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            kind: SourceKind::default(),
            credentials_path: defaults::credentials_path(),
            document_id: String::new(),
            worksheet: defaults::worksheet(),
            grid_path: None,
            timeout_secs: defaults::timeout(),
        }
    }
}

/// Webhook delivery settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotifierConfig {
    #[serde(default = "defaults::api_base_url")]
    pub api_base_url: String,

    #[serde(default = "defaults::endpoint_path")]
    pub endpoint_path: String,

    /// Request timeout in seconds
    #[serde(default = "defaults::timeout")]
    pub timeout_secs: u64,
}

impl NotifierConfig {
    /// Full webhook URL: base URL with the endpoint path appended.
    pub fn endpoint(&self) -> Result<Url> {
        let joined = format!(
            "{}/{}",
            self.api_base_url.trim_end_matches('/'),
            self.endpoint_path.trim_start_matches('/')
        );
        Ok(Url::parse(&joined)?)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Default for NotifierConfig {
    fn default() -> Self {
        Self {
            api_base_url: defaults::api_base_url(),
            endpoint_path: defaults::endpoint_path(),
            timeout_secs: defaults::timeout(),
        }
    }
}

/// Polling loop settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonitorConfig {
    #[serde(default = "defaults::check_interval_minutes")]
    pub check_interval_minutes: u64,

    /// Consecutive failed cycles before the critical signal fires
    #[serde(default = "defaults::max_consecutive_failures")]
    pub max_consecutive_failures: u32,

    /// Pause after an unexpected loop error
    #[serde(default = "defaults::retry_delay_secs")]
    pub retry_delay_secs: u64,
}

impl MonitorConfig {
    pub fn check_interval(&self) -> Duration {
        Duration::from_secs(self.check_interval_minutes * 60)
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_secs(self.retry_delay_secs)
    }
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            check_interval_minutes: defaults::check_interval_minutes(),
            max_consecutive_failures: defaults::max_consecutive_failures(),
            retry_delay_secs: defaults::retry_delay_secs(),
        }
    }
}

/// Recovery checkpoint settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckpointConfig {
    #[serde(default = "defaults::checkpoint_path")]
    pub path: PathBuf,

    /// Checkpoints older than this are ignored
    #[serde(default = "defaults::max_age_hours")]
    pub max_age_hours: u32,
}

impl CheckpointConfig {
    pub fn max_age(&self) -> chrono::Duration {
        chrono::Duration::hours(i64::from(self.max_age_hours))
    }
}

impl Default for CheckpointConfig {
    fn default() -> Self {
        Self {
            path: defaults::checkpoint_path(),
            max_age_hours: defaults::max_age_hours(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Default filter when RUST_LOG is unset
    #[serde(default = "defaults::log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: defaults::log_level(),
        }
    }
}

mod defaults {
    use std::path::PathBuf;

    // Source defaults
    pub fn credentials_path() -> PathBuf {
        PathBuf::from("/opt/sheets-observer/credentials.json")
    }
    pub fn worksheet() -> String {
        "Hoja 1".into()
    }
    pub fn timeout() -> u64 {
        30
    }

    // Notifier defaults
    pub fn api_base_url() -> String {
        "http://localhost:8000".into()
    }
    pub fn endpoint_path() -> String {
        "/api/sheets/update".into()
    }

    // Monitor defaults
    pub fn check_interval_minutes() -> u64 {
        3
    }
    pub fn max_consecutive_failures() -> u32 {
        5
    }
    pub fn retry_delay_secs() -> u64 {
        30
    }

    // Checkpoint defaults
    pub fn checkpoint_path() -> PathBuf {
        PathBuf::from("/tmp/sheets_cache.json")
    }
    pub fn max_age_hours() -> u32 {
        24
    }

    pub fn log_level() -> String {
        "info".into()
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use tempfile::TempDir;

    use super::*;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    fn valid_config(tmp: &TempDir) -> Config {
        let credentials = tmp.path().join("credentials.json");
        std::fs::write(&credentials, r#"{"api_key": "k"}"#).unwrap();
        let mut config = Config::default();
        config.source.document_id = "doc123".to_string();
        config.source.credentials_path = credentials;
        config
    }

    #[test]
    fn defaults_match_deployment_values() {
        let config = Config::default();
        assert_eq!(config.source.worksheet, "Hoja 1");
        assert_eq!(config.monitor.check_interval(), Duration::from_secs(180));
        assert_eq!(config.monitor.max_consecutive_failures, 5);
        assert_eq!(config.monitor.retry_delay(), Duration::from_secs(30));
        assert_eq!(config.checkpoint.path, PathBuf::from("/tmp/sheets_cache.json"));
        assert_eq!(config.checkpoint.max_age(), chrono::Duration::hours(24));
        assert_eq!(
            config.notifier.endpoint().unwrap().as_str(),
            "http://localhost:8000/api/sheets/update"
        );
    }

    #[test]
    fn validate_valid_config_ok() {
        let tmp = TempDir::new().unwrap();
        assert!(valid_config(&tmp).validate().is_ok());
    }

    #[test]
    fn validate_rejects_missing_document_id() {
        let tmp = TempDir::new().unwrap();
        let mut config = valid_config(&tmp);
        config.source.document_id = " ".to_string();
        assert!(matches!(config.validate(), Err(AppError::Config(_))));
    }

    #[test]
    fn validate_rejects_missing_credentials() {
        let tmp = TempDir::new().unwrap();
        let mut config = valid_config(&tmp);
        config.source.credentials_path = tmp.path().join("nope.json");
        assert!(matches!(config.validate(), Err(AppError::Config(_))));
    }

    #[test]
    fn validate_rejects_zero_interval() {
        let tmp = TempDir::new().unwrap();
        let mut config = valid_config(&tmp);
        config.monitor.check_interval_minutes = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_file_source_requires_grid() {
        let tmp = TempDir::new().unwrap();
        let mut config = Config::default();
        config.source.kind = SourceKind::File;
        assert!(config.validate().is_err());

        let grid = tmp.path().join("grid.json");
        std::fs::write(&grid, "[]").unwrap();
        config.source.grid_path = Some(grid);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn env_overrides_apply() {
        let mut config = Config::default();
        config
            .apply_overrides(lookup(&[
                ("SHEETS_DOCUMENT_ID", "abc"),
                ("WORKSHEET_NAME", "Aulas"),
                ("API_BASE_URL", "http://api.local:9000/"),
                ("CHECK_INTERVAL_MINUTES", "10"),
                ("MAX_RETRIES", "2"),
                ("RETRY_DELAY_SECONDS", "5"),
                ("CACHE_FILE", "/var/cache/obs.json"),
            ]))
            .unwrap();

        assert_eq!(config.source.document_id, "abc");
        assert_eq!(config.source.worksheet, "Aulas");
        assert_eq!(config.monitor.check_interval_minutes, 10);
        assert_eq!(config.monitor.max_consecutive_failures, 2);
        assert_eq!(config.monitor.retry_delay_secs, 5);
        assert_eq!(config.checkpoint.path, PathBuf::from("/var/cache/obs.json"));
        assert_eq!(
            config.notifier.endpoint().unwrap().as_str(),
            "http://api.local:9000/api/sheets/update"
        );
    }

    #[test]
    fn env_override_rejects_non_numeric_interval() {
        let mut config = Config::default();
        let result = config.apply_overrides(lookup(&[("CHECK_INTERVAL_MINUTES", "soon")]));
        assert!(matches!(result, Err(AppError::Config(_))));
    }

    #[test]
    fn grid_file_override_switches_source() {
        let mut config = Config::default();
        config
            .apply_overrides(lookup(&[("GRID_FILE", "grid.json")]))
            .unwrap();
        assert_eq!(config.source.kind, SourceKind::File);
        assert_eq!(config.source.grid_path, Some(PathBuf::from("grid.json")));
    }

    #[test]
    fn template_round_trips() {
        let rendered = Config::template().unwrap();
        let parsed: Config = toml::from_str(&rendered).unwrap();
        assert_eq!(parsed.source.worksheet, "Hoja 1");
        assert_eq!(parsed.monitor.check_interval_minutes, 3);
    }

    #[test]
    fn partial_toml_uses_defaults() {
        let parsed: Config = toml::from_str("[monitor]\ncheck_interval_minutes = 1\n").unwrap();
        assert_eq!(parsed.monitor.check_interval_minutes, 1);
        assert_eq!(parsed.monitor.max_consecutive_failures, 5);
        assert_eq!(parsed.notifier.endpoint_path, "/api/sheets/update");
    }

    #[test]
    fn load_or_default_falls_back() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("config.toml");

        let config = Config::load_or_default(&path);
        assert_eq!(config.checkpoint.max_age_hours, 24);

        std::fs::write(&path, "[checkpoint]\nmax_age_hours = 6\n").unwrap();
        assert_eq!(Config::load_or_default(&path).checkpoint.max_age_hours, 6);

        std::fs::write(&path, "not = [valid").unwrap();
        assert!(Config::load(&path).is_err());
        assert_eq!(Config::load_or_default(&path).checkpoint.max_age_hours, 24);
    }
}

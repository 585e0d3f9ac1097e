//! Configuration loading and typed config structures for staffwatch.
//!
//! The configuration lives in `staffwatch.yaml`. This module defines
//! strongly-typed structs that mirror the YAML structure and a loader that
//! reads, overrides from the environment, and validates the file. Every
//! field has a default, so an empty file (or no file at all) is a valid
//! configuration as long as the environment supplies the connection
//! details.
//!
//! The configuration is passed explicitly to every collaborator; nothing in
//! the workspace reads settings from ambient globals.

use std::path::Path;
use std::time::Duration;

use serde::Deserialize;

use crate::reconcile::{DEFAULT_MAX_CONCURRENT_FETCHES, ReconcileOptions};

/// Errors that can occur when loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read the configuration file from disk.
    #[error("failed to read config file: {source}")]
    Io {
        /// The underlying I/O error.
        #[from]
        source: std::io::Error,
    },

    /// Failed to parse YAML content.
    #[error("failed to parse config YAML: {source}")]
    Yaml {
        /// The underlying YAML parse error.
        source: serde_yml::Error,
    },

    /// A value is present but unusable.
    #[error("invalid config: {message}")]
    Invalid {
        /// Which value is wrong and why.
        message: String,
    },
}

impl From<serde_yml::Error> for ConfigError {
    fn from(source: serde_yml::Error) -> Self {
        Self::Yaml { source }
    }
}

/// Top-level configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct StaffwatchConfig {
    /// Catalog (Insight) API connection.
    #[serde(default)]
    pub insight: InsightConfig,

    /// Notification channel.
    #[serde(default)]
    pub notify: NotifyConfig,

    /// Snapshot persistence.
    #[serde(default)]
    pub store: StoreConfig,

    /// Pass scheduling.
    #[serde(default)]
    pub schedule: ScheduleConfig,

    /// Reconciliation tuning.
    #[serde(default)]
    pub reconcile: ReconcileConfig,

    /// Logging output.
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl StaffwatchConfig {
    /// Load configuration from a YAML file at the given path.
    ///
    /// Environment variables override YAML values (see
    /// [`apply_env_overrides`](Self::apply_env_overrides)), then the result
    /// is validated.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Io`] if the file cannot be read,
    /// [`ConfigError::Yaml`] if the content is not valid YAML, or
    /// [`ConfigError::Invalid`] if validation fails.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::parse(&contents)
    }

    /// Parse configuration from a YAML string, with environment overrides.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Yaml`] if the string is not valid YAML, or
    /// [`ConfigError::Invalid`] if validation fails.
    pub fn parse(yaml: &str) -> Result<Self, ConfigError> {
        Self::parse_with_env(yaml, |name| std::env::var(name).ok())
    }

    /// Parse configuration from a YAML string using `lookup` as the
    /// environment.
    ///
    /// # Errors
    ///
    /// Same as [`parse`](Self::parse).
    pub fn parse_with_env<F>(yaml: &str, lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config: Self = if yaml.trim().is_empty() {
            Self::default()
        } else {
            serde_yml::from_str(yaml)?
        };
        config.apply_env_overrides(lookup);
        config.validate()?;
        Ok(config)
    }

    /// Override connection details with environment variables when set.
    ///
    /// - `JIRA_URL` overrides `insight.base_url`
    /// - `JIRA_TOKEN` overrides `insight.token`
    /// - `SCHEMA_ID` overrides `insight.schema_id`
    /// - `OBJECT_TYPE_ID` overrides `insight.object_type_id`
    /// - `SLACK_WEBHOOK` overrides `notify.slack_webhook`
    /// - `SNAPSHOT_PATH` overrides `store.snapshot_path`
    ///
    /// Numeric variables that fail to parse are ignored with the YAML value
    /// kept; [`validate`](Self::validate) is responsible for rejecting bad
    /// values.
    pub fn apply_env_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(val) = lookup("JIRA_URL") {
            self.insight.base_url = val;
        }
        if let Some(val) = lookup("JIRA_TOKEN") {
            self.insight.token = val;
        }
        if let Some(val) = lookup("SCHEMA_ID").and_then(|v| v.trim().parse().ok()) {
            self.insight.schema_id = val;
        }
        if let Some(val) = lookup("OBJECT_TYPE_ID").and_then(|v| v.trim().parse().ok()) {
            self.insight.object_type_id = val;
        }
        if let Some(val) = lookup("SLACK_WEBHOOK") {
            self.notify.slack_webhook = Some(val).filter(|v| !v.trim().is_empty());
        }
        if let Some(val) = lookup("SNAPSHOT_PATH") {
            self.store.snapshot_path = val;
        }
    }

    /// Reject values no collaborator can work with.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] naming the first offending value.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |message: &str| {
            Err(ConfigError::Invalid {
                message: message.to_owned(),
            })
        };

        if self.insight.base_url.trim().is_empty() {
            return invalid("insight.base_url must not be empty");
        }
        if self.insight.page_size == 0 {
            return invalid("insight.page_size must be at least 1");
        }
        if self.insight.catalog_timeout_ms == 0 {
            return invalid("insight.catalog_timeout_ms must be at least 1");
        }
        if self.insight.history_timeout_ms == 0 {
            return invalid("insight.history_timeout_ms must be at least 1");
        }
        if self.notify.timeout_ms == 0 {
            return invalid("notify.timeout_ms must be at least 1");
        }
        if self.store.snapshot_path.trim().is_empty() {
            return invalid("store.snapshot_path must not be empty");
        }
        Ok(())
    }

    /// Options for the reconciliation engine derived from this config.
    pub fn reconcile_options(&self) -> ReconcileOptions {
        ReconcileOptions {
            max_concurrent_fetches: self.reconcile.max_concurrent_fetches,
            history_timeout: self.insight.history_timeout(),
        }
    }
}

/// Catalog (Jira Insight) API configuration.
#[derive(Clone, PartialEq, Eq, Deserialize)]
pub struct InsightConfig {
    /// Base URL of the Jira instance, without a trailing slash.
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Bearer token (empty = no `Authorization` header).
    #[serde(default)]
    pub token: String,

    /// Object schema holding the tracked records.
    #[serde(default = "default_schema_id")]
    pub schema_id: u32,

    /// Object type of the tracked records.
    #[serde(default = "default_object_type_id")]
    pub object_type_id: u32,

    /// Records requested per catalog page.
    #[serde(default = "default_page_size")]
    pub page_size: u32,

    /// Deadline for each catalog page request in milliseconds.
    #[serde(default = "default_catalog_timeout_ms")]
    pub catalog_timeout_ms: u64,

    /// Deadline for each history request in milliseconds.
    #[serde(default = "default_history_timeout_ms")]
    pub history_timeout_ms: u64,

    /// Prefix of the human-facing object key (e.g. `HR` for `HR-17`).
    #[serde(default = "default_key_prefix")]
    pub key_prefix: String,
}

impl InsightConfig {
    /// Catalog page deadline.
    pub const fn catalog_timeout(&self) -> Duration {
        Duration::from_millis(self.catalog_timeout_ms)
    }

    /// History request deadline.
    pub const fn history_timeout(&self) -> Duration {
        Duration::from_millis(self.history_timeout_ms)
    }

    /// Base URL with any trailing slash removed.
    pub fn base_url(&self) -> &str {
        self.base_url.trim_end_matches('/')
    }
}

impl core::fmt::Debug for InsightConfig {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("InsightConfig")
            .field("base_url", &self.base_url)
            .field("token", &if self.token.is_empty() { "" } else { "<redacted>" })
            .field("schema_id", &self.schema_id)
            .field("object_type_id", &self.object_type_id)
            .field("page_size", &self.page_size)
            .field("catalog_timeout_ms", &self.catalog_timeout_ms)
            .field("history_timeout_ms", &self.history_timeout_ms)
            .field("key_prefix", &self.key_prefix)
            .finish()
    }
}

impl Default for InsightConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            token: String::new(),
            schema_id: default_schema_id(),
            object_type_id: default_object_type_id(),
            page_size: default_page_size(),
            catalog_timeout_ms: default_catalog_timeout_ms(),
            history_timeout_ms: default_history_timeout_ms(),
            key_prefix: default_key_prefix(),
        }
    }
}

/// Notification channel configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct NotifyConfig {
    /// Slack incoming-webhook URL. When unset, changes are only logged.
    #[serde(default)]
    pub slack_webhook: Option<String>,

    /// Deadline for each webhook post in milliseconds.
    #[serde(default = "default_notify_timeout_ms")]
    pub timeout_ms: u64,
}

impl NotifyConfig {
    /// Webhook post deadline.
    pub const fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

impl Default for NotifyConfig {
    fn default() -> Self {
        Self {
            slack_webhook: None,
            timeout_ms: default_notify_timeout_ms(),
        }
    }
}

/// Snapshot persistence configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct StoreConfig {
    /// Path of the JSON snapshot file.
    #[serde(default = "default_snapshot_path")]
    pub snapshot_path: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            snapshot_path: default_snapshot_path(),
        }
    }
}

/// Pass scheduling configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ScheduleConfig {
    /// Seconds between pass starts (0 = run a single pass and exit).
    #[serde(default)]
    pub interval_secs: u64,
}

impl ScheduleConfig {
    /// The pass interval, or `None` for single-pass mode.
    pub const fn interval(&self) -> Option<Duration> {
        if self.interval_secs == 0 {
            None
        } else {
            Some(Duration::from_secs(self.interval_secs))
        }
    }
}

/// Reconciliation tuning.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ReconcileConfig {
    /// Maximum history fetches in flight at once.
    #[serde(default = "default_max_concurrent_fetches")]
    pub max_concurrent_fetches: usize,
}

impl Default for ReconcileConfig {
    fn default() -> Self {
        Self {
            max_concurrent_fetches: default_max_concurrent_fetches(),
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human-readable lines.
    #[default]
    Text,
    /// One JSON object per line.
    Json,
}

/// Logging configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct LoggingConfig {
    /// Log level filter (trace, debug, info, warn, error). `RUST_LOG` wins.
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Output format.
    #[serde(default)]
    pub format: LogFormat,

    /// Append-only log file written alongside stdout. Unset means stdout only.
    #[serde(default)]
    pub file: Option<String>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: LogFormat::Text,
            file: None,
        }
    }
}

// ---------------------------------------------------------------------------
// Default value functions (serde default requires named functions)
// ---------------------------------------------------------------------------

fn default_base_url() -> String {
    "http://localhost:8080".to_owned()
}

const fn default_schema_id() -> u32 {
    3
}

const fn default_object_type_id() -> u32 {
    405
}

const fn default_page_size() -> u32 {
    1000
}

const fn default_catalog_timeout_ms() -> u64 {
    30_000
}

const fn default_history_timeout_ms() -> u64 {
    15_000
}

fn default_key_prefix() -> String {
    "HR".to_owned()
}

const fn default_notify_timeout_ms() -> u64 {
    10_000
}

fn default_snapshot_path() -> String {
    "employees.json".to_owned()
}

const fn default_max_concurrent_fetches() -> usize {
    DEFAULT_MAX_CONCURRENT_FETCHES
}

fn default_log_level() -> String {
    "info".to_owned()
}

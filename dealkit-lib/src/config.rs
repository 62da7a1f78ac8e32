//! Runtime configuration.
//!
//! Values come from, in increasing priority: built-in defaults, a TOML file,
//! `DEALKIT_*` environment variables. Front ends apply their own flags last.

use crate::storage::StoreConfig;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const ENV_DATA_DIR: &str = "DEALKIT_DATA_DIR";
pub const ENV_BACKUP_DIR: &str = "DEALKIT_BACKUP_DIR";
pub const ENV_LOG_LEVEL: &str = "DEALKIT_LOG_LEVEL";
pub const ENV_BOT_USERNAME: &str = "DEALKIT_BOT_USERNAME";
pub const ENV_AUTO_PAYMENT_CHECK: &str = "DEALKIT_AUTO_PAYMENT_CHECK";
pub const ENV_AUTO_CHECK_INTERVAL: &str = "DEALKIT_AUTO_CHECK_INTERVAL";
pub const ENV_LOCK_TIMEOUT_MS: &str = "DEALKIT_LOCK_TIMEOUT_MS";

#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error("cannot read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid config file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid value {value:?} for {key}")]
    InvalidValue { key: &'static str, value: String },
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DealkitConfig {
    /// Root of the file store.
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    /// Where backups are written.
    #[serde(default = "default_backup_dir")]
    pub backup_dir: PathBuf,

    /// `tracing` filter directive, e.g. "info" or "dealkit_lib=debug".
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Bot account used in share links.
    #[serde(default)]
    pub bot_username: Option<String>,

    /// Run the payment monitor.
    #[serde(default)]
    pub auto_payment_check: bool,

    /// Seconds between payment monitor passes.
    #[serde(default = "default_auto_check_interval")]
    pub auto_check_interval_secs: u64,

    /// Give up on a record lock after this many milliseconds.
    #[serde(default = "default_lock_timeout_ms")]
    pub lock_timeout_ms: u64,

    /// Pause between lock attempts in milliseconds.
    #[serde(default = "default_lock_retry_ms")]
    pub lock_retry_ms: u64,
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("dealkit-data")
}

fn default_backup_dir() -> PathBuf {
    PathBuf::from("backups")
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_auto_check_interval() -> u64 {
    30
}

fn default_lock_timeout_ms() -> u64 {
    5_000
}

fn default_lock_retry_ms() -> u64 {
    10
}

impl Default for DealkitConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            backup_dir: default_backup_dir(),
            log_level: default_log_level(),
            bot_username: None,
            auto_payment_check: false,
            auto_check_interval_secs: default_auto_check_interval(),
            lock_timeout_ms: default_lock_timeout_ms(),
            lock_retry_ms: default_lock_retry_ms(),
        }
    }
}

impl DealkitConfig {
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(text)?)
    }

    pub fn from_toml_file(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }

    /// Defaults, then `path` if given, then the process environment.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match path {
            Some(path) => Self::from_toml_file(path)?,
            None => Self::default(),
        };
        config.apply_env()?;
        Ok(config)
    }

    pub fn apply_env(&mut self) -> Result<(), ConfigError> {
        self.apply_overrides(|key| std::env::var(key).ok())
    }

    /// Override fields from `lookup`, which maps variable names to values.
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let lookup = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(dir) = lookup(ENV_DATA_DIR) {
            self.data_dir = PathBuf::from(dir);
        }
        if let Some(dir) = lookup(ENV_BACKUP_DIR) {
            self.backup_dir = PathBuf::from(dir);
        }
        if let Some(level) = lookup(ENV_LOG_LEVEL) {
            self.log_level = level;
        }
        if let Some(bot) = lookup(ENV_BOT_USERNAME) {
            self.bot_username = Some(bot);
        }
        if let Some(flag) = lookup(ENV_AUTO_PAYMENT_CHECK) {
            self.auto_payment_check = parse_flag(ENV_AUTO_PAYMENT_CHECK, &flag)?;
        }
        if let Some(secs) = lookup(ENV_AUTO_CHECK_INTERVAL) {
            self.auto_check_interval_secs = parse_number(ENV_AUTO_CHECK_INTERVAL, &secs)?;
        }
        if let Some(ms) = lookup(ENV_LOCK_TIMEOUT_MS) {
            self.lock_timeout_ms = parse_number(ENV_LOCK_TIMEOUT_MS, &ms)?;
        }
        Ok(())
    }

    pub fn store_config(&self) -> StoreConfig {
        StoreConfig {
            lock_timeout: Duration::from_millis(self.lock_timeout_ms),
            retry_interval: Duration::from_millis(self.lock_retry_ms.max(1)),
        }
    }

    pub fn auto_check_interval(&self) -> Duration {
        Duration::from_secs(self.auto_check_interval_secs.max(1))
    }
}

fn parse_flag(key: &'static str, value: &str) -> Result<bool, ConfigError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::InvalidValue {
            key,
            value: value.to_string(),
        }),
    }
}

fn parse_number(key: &'static str, value: &str) -> Result<u64, ConfigError> {
    value.trim().parse().map_err(|_| ConfigError::InvalidValue {
        key,
        value: value.to_string(),
    })
}

//! Typed configuration.
//!
//! Run options come from built-in defaults, then an optional TOML file
//! (`[run]` table), then `BATCHRUN_*` environment variables. The CLI applies
//! its own flags on top. Telemetry settings come from the environment only.

use std::fmt::Display;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::model::{
    DEFAULT_BATCH_DELAY, DEFAULT_BATCH_SIZE, DEFAULT_MAX_RETRIES, DEFAULT_RETRY_DELAY, Options,
};

#[derive(Debug)]
pub struct Config {
    pub otel_endpoint: Option<String>,
    pub log_level: String,
    pub run: RunConfig,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// In local dev, call `dotenvy::dotenv().ok()` before this.
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            otel_endpoint: std::env::var("OTEL_ENDPOINT").ok(),
            log_level: std::env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
            run: RunConfig::default().with_env_overrides()?,
        })
    }
}

/// Engine tuning knobs, in a form that serializes to and from TOML.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    pub batch_size: usize,
    pub max_retries: u32,
    pub retry_delay_ms: u64,
    pub batch_delay_ms: u64,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
            max_retries: DEFAULT_MAX_RETRIES,
            retry_delay_ms: DEFAULT_RETRY_DELAY.as_millis() as u64,
            batch_delay_ms: DEFAULT_BATCH_DELAY.as_millis() as u64,
        }
    }
}

/// Top-level TOML wrapper.
#[derive(Debug, Default, Deserialize)]
struct ConfigFile {
    #[serde(default)]
    run: RunConfig,
}

impl RunConfig {
    /// Defaults, then `path` if given, then environment overrides.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let base = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        base.with_env_overrides()
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::Config(format!("cannot read config file {}: {e}", path.display()))
        })?;
        Self::from_toml(&content)
            .map_err(|e| Error::Config(format!("bad config file {}: {e}", path.display())))
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        let file: ConfigFile =
            toml::from_str(content).map_err(|e| Error::Config(e.to_string()))?;
        Ok(file.run)
    }

    /// Apply `BATCHRUN_BATCH_SIZE`, `BATCHRUN_MAX_RETRIES`,
    /// `BATCHRUN_RETRY_DELAY_MS` and `BATCHRUN_BATCH_DELAY_MS` when set.
    pub fn with_env_overrides(mut self) -> Result<Self> {
        if let Some(v) = optional_var("BATCHRUN_BATCH_SIZE")? {
            self.batch_size = v;
        }
        if let Some(v) = optional_var("BATCHRUN_MAX_RETRIES")? {
            self.max_retries = v;
        }
        if let Some(v) = optional_var("BATCHRUN_RETRY_DELAY_MS")? {
            self.retry_delay_ms = v;
        }
        if let Some(v) = optional_var("BATCHRUN_BATCH_DELAY_MS")? {
            self.batch_delay_ms = v;
        }
        Ok(self)
    }

    /// Engine options with no callbacks and no cancellation token attached.
    pub fn to_options<T>(&self) -> Options<T> {
        Options::new()
            .batch_size(self.batch_size)
            .max_retries(self.max_retries)
            .retry_delay(Duration::from_millis(self.retry_delay_ms))
            .batch_delay(Duration::from_millis(self.batch_delay_ms))
    }
}

fn optional_var<V>(name: &str) -> Result<Option<V>>
where
    V: FromStr,
    V::Err: Display,
{
    match std::env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|e| Error::Config(format!("{name}={raw:?} is invalid: {e}"))),
        Err(std::env::VarError::NotPresent) => Ok(None),
        Err(e) => Err(Error::Config(format!("{name}: {e}"))),
    }
}

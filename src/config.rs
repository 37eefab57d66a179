use serde::Deserialize;
use std::{fs::File, io::BufReader, path::Path, time::Duration};
use thiserror::Error;

use crate::poller::Refresh;

pub const DEFAULT_STEP: i64 = 60;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub client: ClientConfig,
    pub poll: PollConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    // Base of the dashboard API, metrics endpoints live under `metrics/`.
    pub base_url: String,
    // Per-request timeout, in milliseconds.
    pub timeout_ms: u64,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: String::from("http://localhost:2780/api/v1"),
            timeout_ms: 5000,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PollConfig {
    // Delay between the end of one poll and the start of the next, in
    // milliseconds. Zero polls once.
    pub refresh_ms: u64,
    // How far back range queries reach, in seconds.
    pub range_secs: i64,
    // Step used by queries that don't set their own, in seconds.
    pub default_step: i64,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            refresh_ms: 10_000,
            range_secs: 3600,
            default_step: DEFAULT_STEP,
        }
    }
}

impl PollConfig {
    /// Polls once unless `watch` is set. Watching never polls just once,
    /// a zero refresh falls back to the default interval.
    pub fn set_watch(&mut self, watch: bool) {
        if !watch {
            self.refresh_ms = 0;
        } else if self.refresh_ms == 0 {
            self.refresh_ms = PollConfig::default().refresh_ms;
        }
    }

    pub fn refresh(&self) -> Refresh {
        match self.refresh_ms {
            0 => Refresh::Never,
            ms => Refresh::Every(Duration::from_millis(ms)),
        }
    }
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("base_url must not be empty")]
    EmptyBaseUrl,
    #[error("base_url must be an http or https URL")]
    InvalidBaseUrl,
    #[error("default_step must be greater than zero")]
    InvalidStep,
    #[error("range_secs must be greater than zero")]
    InvalidRange,
    #[error("error reading config file")]
    Read(#[from] std::io::Error),
    #[error("error parsing config file")]
    Parse(#[from] serde_json::Error),
}

impl Config {
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let file = File::open(path)?;
        let config: Config = serde_json::from_reader(BufReader::new(file))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let base_url = self.client.base_url.trim();
        if base_url.is_empty() {
            return Err(ConfigError::EmptyBaseUrl);
        }
        if !(base_url.starts_with("http://") || base_url.starts_with("https://")) {
            return Err(ConfigError::InvalidBaseUrl);
        }
        if self.poll.default_step <= 0 {
            return Err(ConfigError::InvalidStep);
        }
        if self.poll.range_secs <= 0 {
            return Err(ConfigError::InvalidRange);
        }
        Ok(())
    }
}

use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub mod parser;

pub const DEFAULT_SLEEP_INTERVAL: u64 = 2;
pub const DEFAULT_REFRESH_TIMEOUT: u64 = 300;

/// Persisted configuration, written wholesale by `setup` and `reset`.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct ConfigRecord {
    #[serde(default)]
    pub setup_done: bool,
    #[serde(default)]
    pub git_repo_url: String,
    #[serde(default)]
    pub execute_command: String,
    /// minutes between two polls
    #[serde(default = "default_sleep_interval")]
    pub sleep_interval: u64,
    #[serde(default = "default_true")]
    pub track_commits: bool,
    #[serde(default)]
    pub track_tags: bool,
    #[serde(default)]
    pub require_privileged: bool,
    /// seconds allowed for one clone or fetch
    #[serde(default = "default_refresh_timeout")]
    pub refresh_timeout: u64,
}

fn default_sleep_interval() -> u64 {
    DEFAULT_SLEEP_INTERVAL
}

fn default_refresh_timeout() -> u64 {
    DEFAULT_REFRESH_TIMEOUT
}

fn default_true() -> bool {
    true
}

impl Default for ConfigRecord {
    fn default() -> Self {
        Self {
            setup_done: false,
            git_repo_url: String::new(),
            execute_command: String::new(),
            sleep_interval: DEFAULT_SLEEP_INTERVAL,
            track_commits: true,
            track_tags: false,
            require_privileged: false,
            refresh_timeout: DEFAULT_REFRESH_TIMEOUT,
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Setup did not run successfully.")]
    SetupIncomplete,

    #[error("Git Repository URL can not be empty string")]
    EmptyUrl,

    #[error("Command can not be empty string")]
    EmptyCommand,

    #[error("At least one of `track-commits` or `track-tags` should be set for watch")]
    NothingTracked,

    #[error("Invalid repo url!")]
    InvalidRepository,
}

impl ConfigError {
    /// Command the operator should run to fix the problem.
    pub fn hint(&self) -> Option<&'static str> {
        match self {
            ConfigError::SetupIncomplete => Some("deployer setup"),
            _ => None,
        }
    }
}

/// Immutable settings for one `start` invocation.
#[derive(Debug, Clone, PartialEq)]
pub struct WatchConfig {
    pub repository_url: String,
    pub command: String,
    pub poll_interval: Duration,
    pub track_commits: bool,
    pub track_tags: bool,
    pub require_privileged: bool,
    pub refresh_timeout: Duration,
    pub capture_output: bool,
}

impl ConfigRecord {
    /// Checks the fields every watch needs, independently of `setup_done`.
    pub fn check(&self) -> Result<(), ConfigError> {
        if self.git_repo_url.trim().is_empty() {
            return Err(ConfigError::EmptyUrl);
        }
        if self.execute_command.trim().is_empty() {
            return Err(ConfigError::EmptyCommand);
        }
        if !self.track_commits && !self.track_tags {
            return Err(ConfigError::NothingTracked);
        }
        Ok(())
    }

    pub fn watch_config(&self, capture_output: bool) -> Result<WatchConfig, ConfigError> {
        if !self.setup_done {
            return Err(ConfigError::SetupIncomplete);
        }
        self.check()?;

        Ok(WatchConfig {
            repository_url: self.git_repo_url.trim().to_string(),
            command: self.execute_command.clone(),
            poll_interval: Duration::from_secs(self.sleep_interval.saturating_mul(60)),
            track_commits: self.track_commits,
            track_tags: self.track_tags,
            require_privileged: self.require_privileged,
            refresh_timeout: Duration::from_secs(self.refresh_timeout),
            capture_output,
        })
    }
}

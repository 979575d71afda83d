use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use crate::config::ConfigRecord;

const HOME_ENV: &str = "DEPLOYER_HOME";
const CONFIG_FILE: &str = "configs.json";

/// Location of everything deployer keeps on disk: the config record, the
/// checkout and the logs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigStore {
    home: PathBuf,
}

impl ConfigStore {
    pub fn new(home: impl Into<PathBuf>) -> Self {
        Self { home: home.into() }
    }

    /// `$DEPLOYER_HOME`, or `<data_local_dir>/deployer`.
    pub fn default_location() -> Result<Self> {
        if let Some(home) = std::env::var_os(HOME_ENV).filter(|h| !h.is_empty()) {
            return Ok(Self::new(home));
        }
        let base = dirs::data_local_dir()
            .or_else(dirs::home_dir)
            .ok_or_else(|| anyhow::anyhow!("Failed to find a data directory for deployer"))?;
        Ok(Self::new(base.join("deployer")))
    }

    pub fn home(&self) -> &Path {
        &self.home
    }

    pub fn config_path(&self) -> PathBuf {
        self.home.join(CONFIG_FILE)
    }

    /// Directory holding the tracked checkout.
    pub fn checkout_dir(&self) -> PathBuf {
        self.home.join("src")
    }

    pub fn log_path(&self) -> PathBuf {
        self.home.join("logs").join("deployer.log")
    }

    /// Reads the record; a missing file means setup never ran.
    pub fn load(&self) -> Result<ConfigRecord> {
        let path = self.config_path();
        if !path.exists() {
            return Ok(ConfigRecord::default());
        }
        let content = std::fs::read_to_string(&path)
            .with_context(|| format!("Error reading config file {path:?}"))?;
        let record = serde_json::from_str(&content)
            .with_context(|| format!("Error parsing JSON configuration file {path:?}"))?;
        Ok(record)
    }

    pub fn save(&self, record: &ConfigRecord) -> Result<()> {
        std::fs::create_dir_all(&self.home)
            .with_context(|| format!("Failed to create {:?}", self.home))?;
        let json = serde_json::to_string_pretty(record)?;
        std::fs::write(self.config_path(), json)
            .with_context(|| format!("Failed to write {:?}", self.config_path()))?;
        Ok(())
    }

    /// Writes `{"setup_done": false}`, dropping every other field.
    pub fn reset(&self) -> Result<()> {
        std::fs::create_dir_all(&self.home)?;
        let json = serde_json::to_string_pretty(&serde_json::json!({ "setup_done": false }))?;
        std::fs::write(self.config_path(), json)?;
        Ok(())
    }
}

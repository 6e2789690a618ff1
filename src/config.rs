use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;

use crate::storage::JsonStorage;

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct Config {
    /// Starting a timer stops every other running timer.
    pub exclusive_tracking: bool,
    /// Minutes of reconciled time after which an `auto` journal entry is
    /// written. Zero disables auto-logging.
    pub auto_log_threshold_mins: u32,
    pub reconcile_interval: String,
    pub display_interval: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            exclusive_tracking: true,
            auto_log_threshold_mins: 15,
            reconcile_interval: "60s".to_string(),
            display_interval: "1s".to_string(),
        }
    }
}

impl Config {
    pub fn tracker(&self) -> TrackerConfig {
        TrackerConfig {
            exclusive_tracking: self.exclusive_tracking,
            auto_log_threshold_mins: self.auto_log_threshold_mins,
        }
    }

    pub fn reconcile_every(&self) -> Result<Duration> {
        parse_interval(&self.reconcile_interval)
    }

    pub fn display_every(&self) -> Result<Duration> {
        parse_interval(&self.display_interval)
    }
}

fn parse_interval(raw: &str) -> Result<Duration> {
    let interval = humantime::parse_duration(raw)
        .with_context(|| format!("Invalid interval '{}'", raw))?;
    if interval.is_zero() {
        anyhow::bail!("Interval '{}' must be greater than zero", raw);
    }
    Ok(interval)
}

/// The part of [`Config`] the tracker itself consumes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TrackerConfig {
    pub exclusive_tracking: bool,
    pub auto_log_threshold_mins: u32,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Config::default().tracker()
    }
}

pub fn load_config() -> Result<Config> {
    let path = JsonStorage::get_base_dir()?.join("config.json");
    load_config_from(&path)
}

pub fn load_config_from(path: &Path) -> Result<Config> {
    if !path.exists() {
        let config = Config::default();
        let data = serde_json::to_string_pretty(&config)?;
        fs::write(path, data)?;
        return Ok(config);
    }

    let data = fs::read_to_string(path)?;
    let config = serde_json::from_str(&data)
        .with_context(|| format!("Could not parse {}", path.display()))?;
    Ok(config)
}

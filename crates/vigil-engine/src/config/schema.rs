use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use vigil_common::session::DEFAULT_INTERVAL_SECS;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct VigilConfig {
    #[serde(default)]
    pub monitor: MonitorConfig,
    #[serde(default)]
    pub recovery: RecoveryConfig,
    #[serde(default)]
    pub store: StoreConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonitorConfig {
    #[serde(default = "default_interval_secs")]
    pub default_interval_secs: u64,
    #[serde(default = "default_banner_duration_ms")]
    pub banner_duration_ms: u64,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            default_interval_secs: default_interval_secs(),
            banner_duration_ms: default_banner_duration_ms(),
        }
    }
}

impl MonitorConfig {
    pub fn banner_duration(&self) -> Duration {
        Duration::from_millis(self.banner_duration_ms)
    }
}

fn default_interval_secs() -> u64 {
    DEFAULT_INTERVAL_SECS
}

fn default_banner_duration_ms() -> u64 {
    10_000
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecoveryConfig {
    #[serde(default = "default_reopen_delay_ms")]
    pub reopen_delay_ms: u64,
    #[serde(default = "default_fallback_delay_ms")]
    pub fallback_delay_ms: u64,
    #[serde(default = "default_signals")]
    pub signals: Vec<String>,
}

impl Default for RecoveryConfig {
    fn default() -> Self {
        Self {
            reopen_delay_ms: default_reopen_delay_ms(),
            fallback_delay_ms: default_fallback_delay_ms(),
            signals: default_signals(),
        }
    }
}

impl RecoveryConfig {
    pub fn reopen_delay(&self) -> Duration {
        Duration::from_millis(self.reopen_delay_ms)
    }

    pub fn fallback_delay(&self) -> Duration {
        Duration::from_millis(self.fallback_delay_ms)
    }
}

fn default_reopen_delay_ms() -> u64 {
    10_000
}

fn default_fallback_delay_ms() -> u64 {
    3_000
}

fn default_signals() -> Vec<String> {
    crate::recovery::DEFAULT_SIGNALS
        .iter()
        .map(|s| s.to_string())
        .collect()
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Session record location. Defaults to `~/.vigil/session.json`.
    #[serde(default)]
    pub path: Option<PathBuf>,
}

impl StoreConfig {
    pub fn resolved_path(&self) -> PathBuf {
        self.path
            .clone()
            .unwrap_or_else(crate::store::FileStore::default_path)
    }
}

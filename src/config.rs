use crate::analysis::ObservationThresholds;
use crate::app_dirs::AppDirs;
use crate::history::DEFAULT_CAPACITY;
use crate::level::Level;
use crate::markers::MarkerVocabulary;
use crate::recommend::RecommenderThresholds;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Keys under which the trainer persists its state
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct StorageKeys {
    pub scripts: String,
    pub settings: String,
    pub session_log: String,
}

impl Default for StorageKeys {
    fn default() -> Self {
        Self {
            scripts: "turnwise_scripts_v4".to_string(),
            settings: "turnwise_settings_v4".to_string(),
            session_log: "turnwise_session_log_v2".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    /// Typing pause between an accepted response and the next message
    pub advance_delay_ms: u64,
    pub history_capacity: usize,
    pub starting_level: Level,
    pub observations: ObservationThresholds,
    pub recommender: RecommenderThresholds,
    pub markers: MarkerVocabulary,
    pub storage_keys: StorageKeys,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            advance_delay_ms: 450,
            history_capacity: DEFAULT_CAPACITY,
            starting_level: Level::ONE,
            observations: ObservationThresholds::default(),
            recommender: RecommenderThresholds::default(),
            markers: MarkerVocabulary::default(),
            storage_keys: StorageKeys::default(),
        }
    }
}

/// Learner settings kept alongside the scenarios in the store
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct Settings {
    /// Scenario and level cannot be changed while locked
    pub locked: bool,
}

pub trait ConfigStore {
    fn load(&self) -> Config;
    fn save(&self, cfg: &Config) -> std::io::Result<()>;
}

#[derive(Debug, Clone)]
pub struct FileConfigStore {
    path: PathBuf,
}

impl FileConfigStore {
    pub fn new() -> Self {
        Self {
            path: AppDirs::config_path().unwrap_or_else(|| PathBuf::from("turnwise_config.json")),
        }
    }

    pub fn with_path<P: AsRef<Path>>(p: P) -> Self {
        Self {
            path: p.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Default for FileConfigStore {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigStore for FileConfigStore {
    fn load(&self) -> Config {
        let Ok(bytes) = fs::read(&self.path) else {
            return Config::default();
        };
        match serde_json::from_slice::<Config>(&bytes) {
            Ok(cfg) => cfg,
            Err(err) => {
                tracing::warn!(path = %self.path.display(), %err, "invalid config file, using defaults");
                Config::default()
            }
        }
    }

    fn save(&self, cfg: &Config) -> std::io::Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let data = serde_json::to_vec_pretty(cfg)?;
        fs::write(&self.path, data)
    }
}

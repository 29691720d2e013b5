use directories::ProjectDirs;
use std::path::PathBuf;

/// Centralized application directory resolution
pub struct AppDirs;

impl AppDirs {
    fn state_dir() -> Option<PathBuf> {
        if let Ok(home) = std::env::var("HOME") {
            Some(
                PathBuf::from(home)
                    .join(".local")
                    .join("state")
                    .join("turnwise"),
            )
        } else {
            ProjectDirs::from("", "", "turnwise").map(|pd| pd.data_local_dir().to_path_buf())
        }
    }

    /// Scenarios, settings and session history
    pub fn db_path() -> Option<PathBuf> {
        Self::state_dir().map(|dir| dir.join("turnwise.db"))
    }

    pub fn log_path() -> Option<PathBuf> {
        Self::state_dir().map(|dir| dir.join("turnwise.log"))
    }

    pub fn config_path() -> Option<PathBuf> {
        ProjectDirs::from("", "", "turnwise").map(|pd| pd.config_dir().join("config.json"))
    }
}

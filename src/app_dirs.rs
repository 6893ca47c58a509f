use directories::ProjectDirs;
use std::path::PathBuf;

/// Centralized application path resolution
pub struct AppDirs;

impl AppDirs {
    /// Mutable game state lives under `$HOME/.local/state/skeet`, falling
    /// back to the platform-specific data directory.
    fn state_dir() -> Option<PathBuf> {
        if let Ok(home) = std::env::var("HOME") {
            Some(
                PathBuf::from(home)
                    .join(".local")
                    .join("state")
                    .join("skeet"),
            )
        } else {
            ProjectDirs::from("", "", "skeet").map(|pd| pd.data_local_dir().to_path_buf())
        }
    }

    pub fn history_db_path() -> Option<PathBuf> {
        Self::state_dir().map(|dir| dir.join("history.db"))
    }

    pub fn high_score_path() -> Option<PathBuf> {
        Self::state_dir().map(|dir| dir.join("high_score.json"))
    }

    pub fn config_path() -> Option<PathBuf> {
        ProjectDirs::from("", "", "skeet").map(|pd| pd.config_dir().join("config.json"))
    }
}

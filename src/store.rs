//! Persistence for the two player-facing scalars: the preferred difficulty
//! and the all-time high score. Both are small JSON documents.

use crate::app_dirs::AppDirs;
use crate::pacing::Difficulty;
use serde::{Deserialize, Serialize};
use std::cell::Cell;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct Config {
    pub difficulty: Difficulty,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            difficulty: Difficulty::Medium,
        }
    }
}

pub trait ConfigStore {
    fn load(&self) -> Config;
    fn save(&self, cfg: &Config) -> io::Result<()>;
}

#[derive(Debug, Clone)]
pub struct FileConfigStore {
    path: PathBuf,
}

impl FileConfigStore {
    pub fn new() -> Self {
        let path = AppDirs::config_path().unwrap_or_else(|| PathBuf::from("skeet_config.json"));
        Self { path }
    }

    pub fn with_path<P: AsRef<Path>>(p: P) -> Self {
        Self {
            path: p.as_ref().to_path_buf(),
        }
    }
}

impl Default for FileConfigStore {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigStore for FileConfigStore {
    fn load(&self) -> Config {
        if let Ok(bytes) = fs::read(&self.path) {
            if let Ok(cfg) = serde_json::from_slice::<Config>(&bytes) {
                return cfg;
            }
        }
        Config::default()
    }

    fn save(&self, cfg: &Config) -> io::Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let data = serde_json::to_vec_pretty(cfg).unwrap_or_default();
        fs::write(&self.path, data)
    }
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
struct HighScoreDoc {
    high_score: u32,
}

/// The single scalar the game persists on its own: read once at startup,
/// written whenever a session beats it.
pub trait HighScoreStore: std::fmt::Debug {
    /// Stored score, or 0 when nothing has been recorded yet.
    fn load(&self) -> u32;
    fn save(&self, score: u32) -> io::Result<()>;
}

#[derive(Debug, Clone)]
pub struct FileHighScoreStore {
    path: PathBuf,
}

impl FileHighScoreStore {
    pub fn new() -> Self {
        let path =
            AppDirs::high_score_path().unwrap_or_else(|| PathBuf::from("skeet_high_score.json"));
        Self { path }
    }

    pub fn with_path<P: AsRef<Path>>(p: P) -> Self {
        Self {
            path: p.as_ref().to_path_buf(),
        }
    }
}

impl Default for FileHighScoreStore {
    fn default() -> Self {
        Self::new()
    }
}

impl HighScoreStore for FileHighScoreStore {
    fn load(&self) -> u32 {
        if let Ok(bytes) = fs::read(&self.path) {
            if let Ok(doc) = serde_json::from_slice::<HighScoreDoc>(&bytes) {
                return doc.high_score;
            }
        }
        0
    }

    fn save(&self, score: u32) -> io::Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let data = serde_json::to_vec_pretty(&HighScoreDoc { high_score: score }).unwrap_or_default();
        fs::write(&self.path, data)
    }
}

/// Keeps the score in memory; for tests and runs that must not touch disk.
#[derive(Debug, Default)]
pub struct MemoryHighScoreStore {
    score: Cell<u32>,
}

impl MemoryHighScoreStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_score(score: u32) -> Self {
        Self {
            score: Cell::new(score),
        }
    }
}

impl HighScoreStore for MemoryHighScoreStore {
    fn load(&self) -> u32 {
        self.score.get()
    }

    fn save(&self, score: u32) -> io::Result<()> {
        self.score.set(score);
        Ok(())
    }
}

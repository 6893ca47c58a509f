use crate::timer::Millis;
use serde::{Deserialize, Serialize};

/// Fixed session length in seconds.
pub const SESSION_SECS: u32 = 60;
/// The session levels up each time this many seconds have drained.
pub const LEVEL_UP_STEP_SECS: u32 = 15;

#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    strum_macros::Display,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Difficulty {
    Easy,
    Medium,
    Hard,
}

impl Default for Difficulty {
    fn default() -> Self {
        Difficulty::Medium
    }
}

impl Difficulty {
    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "easy" => Some(Difficulty::Easy),
            "medium" => Some(Difficulty::Medium),
            "hard" => Some(Difficulty::Hard),
            _ => None,
        }
    }

    fn base_spawn_interval_ms(self) -> f64 {
        match self {
            Difficulty::Easy => 1500.0,
            Difficulty::Medium => 1000.0,
            Difficulty::Hard => 600.0,
        }
    }

    fn base_target_duration_ms(self) -> f64 {
        match self {
            Difficulty::Easy => 2500.0,
            Difficulty::Medium => 1800.0,
            Difficulty::Hard => 1200.0,
        }
    }
}

/// Interval between spawns. Shrinks 5% per level, floored at 30% of the base
/// rate.
pub fn spawn_interval(difficulty: Difficulty, level: u32) -> Millis {
    let factor = (1.0 - level as f64 * 0.05).max(0.3);
    (difficulty.base_spawn_interval_ms() * factor).round() as Millis
}

/// How long a target stays alive. Shrinks 3% per level, floored at 40% of the
/// base duration.
pub fn target_duration(difficulty: Difficulty, level: u32) -> Millis {
    let factor = (1.0 - level as f64 * 0.03).max(0.4);
    (difficulty.base_target_duration_ms() * factor).round() as Millis
}

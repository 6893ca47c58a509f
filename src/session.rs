use crate::pacing::{Difficulty, SESSION_SECS};

/// Session lifecycle. Restart goes back through the same reset as the first
/// start, so `Ended -> Running` is an idle-equivalent transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    Running,
    Paused,
    Ended,
}

#[derive(Debug, Clone)]
pub struct SessionState {
    pub score: u32,
    /// Seconds left on the session clock, in `[0, SESSION_SECS]`.
    pub time_remaining: u32,
    pub level: u32,
    pub difficulty: Difficulty,
    pub phase: Phase,
    pub high_score: u32,
}

impl SessionState {
    pub fn new(difficulty: Difficulty, high_score: u32) -> Self {
        Self {
            score: 0,
            time_remaining: SESSION_SECS,
            level: 1,
            difficulty,
            phase: Phase::Idle,
            high_score,
        }
    }

    /// Resets the per-session counters; difficulty and high score carry over.
    pub(crate) fn reset_for_start(&mut self) {
        self.score = 0;
        self.time_remaining = SESSION_SECS;
        self.level = 1;
    }
}

/// Terminal report handed to the presentation layer when a session ends.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionSummary {
    pub score: u32,
    pub accuracy: u32,
    pub is_new_high_score: bool,
}

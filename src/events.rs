use crate::powerups::PowerUpKind;
use crate::session::SessionSummary;
use crate::targets::{Resolution, TargetId};
use crate::timer::Millis;

/// Everything the presentation layer needs to mirror the game: drained from
/// `Game::drain_events` after each batch of triggers and timer dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GameEvent {
    StateUpdated {
        score: u32,
        time_remaining: u32,
        level: u32,
    },
    TargetSpawned {
        id: TargetId,
        position: (u16, u16),
        lifetime_ms: Millis,
    },
    TargetResolved {
        id: TargetId,
        resolution: Resolution,
    },
    LevelUp {
        level: u32,
    },
    PowerUpChanged {
        kind: PowerUpKind,
        active: bool,
        charges_remaining: u32,
    },
    SessionEnded {
        summary: SessionSummary,
    },
}

use std::collections::BTreeMap;

use rand::Rng;

use crate::timer::{Millis, TimerId};

/// Logical arena the presentation layer maps onto its own surface.
pub const ARENA_WIDTH: u16 = 800;
pub const ARENA_HEIGHT: u16 = 600;
/// Spawns keep clear of the arena edges by this much.
pub const EDGE_MARGIN: u16 = 20;
/// Targets occupy a square box; a hit lands anywhere inside it.
pub const TARGET_SIZE: u16 = 80;

/// Opaque identity of a spawned target. Ids are never reused within a
/// registry's lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TargetId(u64);

/// How a target left the arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    Hit,
    Expired,
}

#[derive(Debug, Clone)]
pub struct Target {
    pub id: TargetId,
    pub position: (u16, u16),
    pub spawned_at: Millis,
    pub deadline: Millis,
    pub(crate) expiry_timer: Option<TimerId>,
    pub(crate) remaining_at_pause: Option<Millis>,
}

impl Target {
    pub fn contains(&self, x: u16, y: u16) -> bool {
        let (px, py) = self.position;
        x >= px && x < px + TARGET_SIZE && y >= py && y < py + TARGET_SIZE
    }
}

/// Live targets, keyed by id in spawn order. Resolution removes the entry,
/// which is what makes it exactly-once.
#[derive(Debug, Default)]
pub struct TargetRegistry {
    live: BTreeMap<TargetId, Target>,
    next_id: u64,
}

impl TargetRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a target at a random position inside the edge margins. The
    /// expiry timer is attached separately once the owner has scheduled it.
    pub fn spawn(&mut self, now: Millis, lifetime: Millis) -> TargetId {
        let id = TargetId(self.next_id);
        self.next_id += 1;

        let mut rng = rand::thread_rng();
        let x = rng.gen_range(EDGE_MARGIN..=ARENA_WIDTH - TARGET_SIZE - EDGE_MARGIN);
        let y = rng.gen_range(EDGE_MARGIN..=ARENA_HEIGHT - TARGET_SIZE - EDGE_MARGIN);

        self.live.insert(
            id,
            Target {
                id,
                position: (x, y),
                spawned_at: now,
                deadline: now + lifetime,
                expiry_timer: None,
                remaining_at_pause: None,
            },
        );
        id
    }

    pub(crate) fn attach_expiry(&mut self, id: TargetId, timer: TimerId) {
        if let Some(target) = self.live.get_mut(&id) {
            target.expiry_timer = Some(timer);
        }
    }

    /// Removes and returns the target on first resolution; `None` for an
    /// absent or already-resolved id.
    pub fn resolve(&mut self, id: TargetId) -> Option<Target> {
        self.live.remove(&id)
    }

    /// Empties the live set, handing the drained targets back so the owner
    /// can cancel their expiry timers.
    pub fn clear_all(&mut self) -> Vec<Target> {
        std::mem::take(&mut self.live).into_values().collect()
    }

    pub fn get(&self, id: TargetId) -> Option<&Target> {
        self.live.get(&id)
    }

    pub fn live(&self) -> impl Iterator<Item = &Target> {
        self.live.values()
    }

    pub(crate) fn live_mut(&mut self) -> impl Iterator<Item = &mut Target> {
        self.live.values_mut()
    }

    pub fn len(&self) -> usize {
        self.live.len()
    }

    pub fn is_empty(&self) -> bool {
        self.live.is_empty()
    }

    /// Topmost (most recently spawned) live target covering the point.
    pub fn hit_test(&self, x: u16, y: u16) -> Option<TargetId> {
        self.live.values().rev().find(|t| t.contains(x, y)).map(|t| t.id)
    }
}

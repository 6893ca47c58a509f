use crate::timer::Millis;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum_macros::Display)]
#[strum(serialize_all = "title_case")]
pub enum PowerUpKind {
    RapidFire,
    TimeFreeze,
}

impl PowerUpKind {
    pub fn duration_ms(self) -> Millis {
        match self {
            PowerUpKind::RapidFire => 5000,
            PowerUpKind::TimeFreeze => 7000,
        }
    }

    pub fn initial_charges(self) -> u32 {
        match self {
            PowerUpKind::RapidFire => 3,
            PowerUpKind::TimeFreeze => 2,
        }
    }
}

#[derive(Debug, Clone)]
pub struct PowerUp {
    pub kind: PowerUpKind,
    pub charges_remaining: u32,
    pub active: bool,
    pub activated_at: Option<Millis>,
    pub expires_at: Option<Millis>,
}

impl PowerUp {
    fn new(kind: PowerUpKind) -> Self {
        Self {
            kind,
            charges_remaining: kind.initial_charges(),
            active: false,
            activated_at: None,
            expires_at: None,
        }
    }
}

/// One slot per power-up kind. Charges deplete for the lifetime of the
/// manager; session restarts do not refill them.
#[derive(Debug)]
pub struct PowerUpManager {
    rapid_fire: PowerUp,
    time_freeze: PowerUp,
}

impl PowerUpManager {
    pub fn new() -> Self {
        Self {
            rapid_fire: PowerUp::new(PowerUpKind::RapidFire),
            time_freeze: PowerUp::new(PowerUpKind::TimeFreeze),
        }
    }

    pub fn get(&self, kind: PowerUpKind) -> &PowerUp {
        match kind {
            PowerUpKind::RapidFire => &self.rapid_fire,
            PowerUpKind::TimeFreeze => &self.time_freeze,
        }
    }

    fn get_mut(&mut self, kind: PowerUpKind) -> &mut PowerUp {
        match kind {
            PowerUpKind::RapidFire => &mut self.rapid_fire,
            PowerUpKind::TimeFreeze => &mut self.time_freeze,
        }
    }

    /// Burns a charge and opens the active window, returning when it closes.
    /// `None` (and no state change) when depleted or already active.
    pub fn activate(&mut self, kind: PowerUpKind, now: Millis) -> Option<Millis> {
        let slot = self.get_mut(kind);
        if slot.charges_remaining == 0 || slot.active {
            return None;
        }
        let expires_at = now + kind.duration_ms();
        slot.charges_remaining -= 1;
        slot.active = true;
        slot.activated_at = Some(now);
        slot.expires_at = Some(expires_at);
        Some(expires_at)
    }

    pub fn deactivate(&mut self, kind: PowerUpKind) {
        let slot = self.get_mut(kind);
        slot.active = false;
        slot.activated_at = None;
        slot.expires_at = None;
    }

    pub fn is_active(&self, kind: PowerUpKind) -> bool {
        self.get(kind).active
    }

    pub fn charges_remaining(&self, kind: PowerUpKind) -> u32 {
        self.get(kind).charges_remaining
    }
}

impl Default for PowerUpManager {
    fn default() -> Self {
        Self::new()
    }
}

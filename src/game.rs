use std::collections::VecDeque;

use chrono::Local;

use crate::events::GameEvent;
use crate::history::{HistoryDb, SessionRecord};
use crate::pacing::{self, Difficulty, LEVEL_UP_STEP_SECS, SESSION_SECS};
use crate::powerups::{PowerUp, PowerUpKind, PowerUpManager};
use crate::scoring::{AccuracyTracker, POINTS_PER_HIT, RAPID_FIRE_POINTS_PER_HIT};
use crate::session::{Phase, SessionState, SessionSummary};
use crate::store::HighScoreStore;
use crate::targets::{Resolution, Target, TargetId, TargetRegistry};
use crate::timer::{Millis, TimerId, TimerQueue};

/// What a scheduled timer means when it comes due.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TimerKind {
    SpawnTick,
    CountdownTick,
    TargetExpiry(TargetId),
    PowerUpExpiry(PowerUpKind),
}

const COUNTDOWN_TICK_MS: Millis = 1000;

/// The session state machine. Owns every piece of game state and is the only
/// thing that mutates it: external triggers come in through the public
/// methods, scheduled work runs inside `advance`, and the presentation layer
/// mirrors the results by draining `GameEvent`s.
///
/// Time is caller-supplied milliseconds. The machine never reads a clock,
/// so a test can play a full session by walking `advance` through 60
/// simulated seconds.
#[derive(Debug)]
pub struct Game {
    state: SessionState,
    registry: TargetRegistry,
    powerups: PowerUpManager,
    accuracy: AccuracyTracker,
    timers: TimerQueue<TimerKind>,
    events: VecDeque<GameEvent>,
    high_scores: Box<dyn HighScoreStore>,
    history: Option<HistoryDb>,
    spawn_timer: Option<TimerId>,
    countdown_timer: Option<TimerId>,
    /// Latch for the 15-second level-up boundaries, so a threshold can never
    /// fire twice even if tick timing drifts.
    leveled_at: Option<u32>,
}

impl Game {
    pub fn new(
        difficulty: Difficulty,
        high_scores: Box<dyn HighScoreStore>,
        history: Option<HistoryDb>,
    ) -> Self {
        let high_score = high_scores.load();
        Self {
            state: SessionState::new(difficulty, high_score),
            registry: TargetRegistry::new(),
            powerups: PowerUpManager::new(),
            accuracy: AccuracyTracker::new(),
            timers: TimerQueue::new(),
            events: VecDeque::new(),
            high_scores,
            history,
            spawn_timer: None,
            countdown_timer: None,
            leveled_at: None,
        }
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn phase(&self) -> Phase {
        self.state.phase
    }

    pub fn targets(&self) -> impl Iterator<Item = &Target> {
        self.registry.live()
    }

    pub fn accuracy_stats(&self) -> &AccuracyTracker {
        &self.accuracy
    }

    pub fn power_up(&self, kind: PowerUpKind) -> &PowerUp {
        self.powerups.get(kind)
    }

    pub fn history(&self) -> Option<&HistoryDb> {
        self.history.as_ref()
    }

    /// Topmost live target covering a logical arena point.
    pub fn target_at(&self, x: u16, y: u16) -> Option<TargetId> {
        self.registry.hit_test(x, y)
    }

    /// Hands out everything emitted since the last drain, oldest first.
    pub fn drain_events(&mut self) -> Vec<GameEvent> {
        self.events.drain(..).collect()
    }

    /// Starts (or restarts) a session. Per-session counters reset; power-up
    /// charges deliberately carry over, as does a still-open active window.
    pub fn start(&mut self, now: Millis) {
        self.cancel_session_timers();
        self.clear_targets();
        self.state.reset_for_start();
        self.accuracy.reset();
        self.leveled_at = None;
        self.state.phase = Phase::Running;

        let interval = pacing::spawn_interval(self.state.difficulty, self.state.level);
        self.spawn_timer = Some(self.timers.schedule(now + interval, TimerKind::SpawnTick));
        self.countdown_timer = Some(
            self.timers
                .schedule(now + COUNTDOWN_TICK_MS, TimerKind::CountdownTick),
        );
        self.emit_state_update();
    }

    /// Suspends the clock and every live target's time-to-live.
    pub fn pause(&mut self, now: Millis) {
        if self.state.phase != Phase::Running {
            return;
        }
        self.state.phase = Phase::Paused;
        self.cancel_session_timers();
        for target in self.registry.live_mut() {
            if let Some(timer) = target.expiry_timer.take() {
                self.timers.cancel(timer);
            }
            target.remaining_at_pause = Some(target.deadline.saturating_sub(now));
        }
    }

    /// Reschedules each suspended target with the remainder it had at pause
    /// time, then restarts the spawn cadence and countdown.
    pub fn resume(&mut self, now: Millis) {
        if self.state.phase != Phase::Paused {
            return;
        }
        self.state.phase = Phase::Running;
        for target in self.registry.live_mut() {
            let remaining = target
                .remaining_at_pause
                .take()
                .unwrap_or_else(|| target.deadline.saturating_sub(now));
            target.deadline = now + remaining;
            target.expiry_timer = Some(
                self.timers
                    .schedule(target.deadline, TimerKind::TargetExpiry(target.id)),
            );
        }
        let interval = pacing::spawn_interval(self.state.difficulty, self.state.level);
        self.spawn_timer = Some(self.timers.schedule(now + interval, TimerKind::SpawnTick));
        self.countdown_timer = Some(
            self.timers
                .schedule(now + COUNTDOWN_TICK_MS, TimerKind::CountdownTick),
        );
    }

    /// Effective only between sessions; ignored mid-session.
    pub fn set_difficulty(&mut self, difficulty: Difficulty) -> bool {
        match self.state.phase {
            Phase::Idle | Phase::Ended => {
                self.state.difficulty = difficulty;
                true
            }
            Phase::Running | Phase::Paused => false,
        }
    }

    /// First resolution of a live target scores it; anything else is a no-op.
    /// Returns whether this trigger was the resolving one.
    pub fn trigger_hit(&mut self, id: TargetId) -> bool {
        if self.state.phase != Phase::Running && self.state.phase != Phase::Paused {
            return false;
        }
        let Some(target) = self.registry.resolve(id) else {
            return false;
        };
        if let Some(timer) = target.expiry_timer {
            self.timers.cancel(timer);
        }
        self.accuracy.record_shot();
        self.accuracy.record_hit();
        self.state.score += self.points_per_hit();
        self.events.push_back(GameEvent::TargetResolved {
            id,
            resolution: Resolution::Hit,
        });
        self.emit_state_update();
        true
    }

    /// Burns a charge and opens the active window; depleted or already-active
    /// slots are left untouched. Returns whether activation happened.
    pub fn activate_power_up(&mut self, kind: PowerUpKind, now: Millis) -> bool {
        let Some(expires_at) = self.powerups.activate(kind, now) else {
            return false;
        };
        self.timers
            .schedule(expires_at, TimerKind::PowerUpExpiry(kind));
        self.events.push_back(GameEvent::PowerUpChanged {
            kind,
            active: true,
            charges_remaining: self.powerups.charges_remaining(kind),
        });
        true
    }

    /// Runs every timer due at or before `now`, in deadline order. Cadences
    /// reschedule from their fired deadline, so one big jump of `now` plays
    /// out exactly like many small ones.
    pub fn advance(&mut self, now: Millis) {
        while let Some(due) = self.timers.pop_due(now) {
            match due.kind {
                TimerKind::SpawnTick => self.on_spawn_tick(due.deadline),
                TimerKind::CountdownTick => self.on_countdown_tick(due.deadline),
                TimerKind::TargetExpiry(id) => self.on_target_expiry(id),
                TimerKind::PowerUpExpiry(kind) => self.on_power_up_expiry(kind),
            }
        }
    }

    fn on_spawn_tick(&mut self, deadline: Millis) {
        if self.state.phase != Phase::Running {
            self.spawn_timer = None;
            return;
        }
        let lifetime = pacing::target_duration(self.state.difficulty, self.state.level);
        let id = self.registry.spawn(deadline, lifetime);
        let expiry = self
            .timers
            .schedule(deadline + lifetime, TimerKind::TargetExpiry(id));
        self.registry.attach_expiry(id, expiry);
        if let Some(target) = self.registry.get(id) {
            self.events.push_back(GameEvent::TargetSpawned {
                id,
                position: target.position,
                lifetime_ms: lifetime,
            });
        }

        let interval = pacing::spawn_interval(self.state.difficulty, self.state.level);
        self.spawn_timer = Some(self.timers.schedule(deadline + interval, TimerKind::SpawnTick));
    }

    fn on_countdown_tick(&mut self, deadline: Millis) {
        if self.state.phase != Phase::Running {
            self.countdown_timer = None;
            return;
        }
        if self.powerups.is_active(PowerUpKind::TimeFreeze) {
            // Frozen clock: keep ticking without draining time.
            self.countdown_timer = Some(
                self.timers
                    .schedule(deadline + COUNTDOWN_TICK_MS, TimerKind::CountdownTick),
            );
            return;
        }

        self.state.time_remaining = self.state.time_remaining.saturating_sub(1);
        if self.state.time_remaining == 0 {
            self.emit_state_update();
            self.end_session();
            return;
        }
        if self.should_level_up() {
            self.level_up(deadline);
        }
        self.emit_state_update();
        self.countdown_timer = Some(
            self.timers
                .schedule(deadline + COUNTDOWN_TICK_MS, TimerKind::CountdownTick),
        );
    }

    fn on_target_expiry(&mut self, id: TargetId) {
        if let Some(target) = self.registry.resolve(id) {
            self.events.push_back(GameEvent::TargetResolved {
                id: target.id,
                resolution: Resolution::Expired,
            });
        }
    }

    fn on_power_up_expiry(&mut self, kind: PowerUpKind) {
        self.powerups.deactivate(kind);
        self.events.push_back(GameEvent::PowerUpChanged {
            kind,
            active: false,
            charges_remaining: self.powerups.charges_remaining(kind),
        });
    }

    fn should_level_up(&self) -> bool {
        let t = self.state.time_remaining;
        t > 0
            && t < SESSION_SECS
            && t % LEVEL_UP_STEP_SECS == 0
            && self.leveled_at != Some(t)
    }

    fn level_up(&mut self, now: Millis) {
        self.leveled_at = Some(self.state.time_remaining);
        self.state.level += 1;

        // Existing targets keep their lifetimes; only the cadence tightens.
        if let Some(timer) = self.spawn_timer.take() {
            self.timers.cancel(timer);
        }
        let interval = pacing::spawn_interval(self.state.difficulty, self.state.level);
        self.spawn_timer = Some(self.timers.schedule(now + interval, TimerKind::SpawnTick));

        self.events.push_back(GameEvent::LevelUp {
            level: self.state.level,
        });
    }

    fn end_session(&mut self) {
        self.cancel_session_timers();
        self.clear_targets();
        self.state.phase = Phase::Ended;

        let summary = SessionSummary {
            score: self.state.score,
            accuracy: self.accuracy.accuracy(),
            is_new_high_score: self.state.score > self.state.high_score,
        };
        if summary.is_new_high_score {
            self.state.high_score = self.state.score;
            // A failed write must not take down the terminal report.
            let _ = self.high_scores.save(self.state.high_score);
        }
        if let Some(db) = &self.history {
            let _ = db.record_session(&SessionRecord {
                finished_at: Local::now(),
                difficulty: self.state.difficulty,
                score: self.state.score,
                accuracy: summary.accuracy,
                level_reached: self.state.level,
                shots: self.accuracy.shots,
                hits: self.accuracy.hits,
            });
        }
        self.events.push_back(GameEvent::SessionEnded { summary });
    }

    fn points_per_hit(&self) -> u32 {
        if self.powerups.is_active(PowerUpKind::RapidFire) {
            RAPID_FIRE_POINTS_PER_HIT
        } else {
            POINTS_PER_HIT
        }
    }

    fn cancel_session_timers(&mut self) {
        if let Some(timer) = self.spawn_timer.take() {
            self.timers.cancel(timer);
        }
        if let Some(timer) = self.countdown_timer.take() {
            self.timers.cancel(timer);
        }
    }

    fn clear_targets(&mut self) {
        for target in self.registry.clear_all() {
            if let Some(timer) = target.expiry_timer {
                self.timers.cancel(timer);
            }
        }
    }

    fn emit_state_update(&mut self) {
        self.events.push_back(GameEvent::StateUpdated {
            score: self.state.score,
            time_remaining: self.state.time_remaining,
            level: self.state.level,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{FileHighScoreStore, MemoryHighScoreStore};
    use assert_matches::assert_matches;

    fn new_game(difficulty: Difficulty) -> Game {
        Game::new(difficulty, Box::new(MemoryHighScoreStore::new()), None)
    }

    /// Walks the clock forward in 100ms steps, exclusive of `from`.
    fn run_to(game: &mut Game, from: Millis, to: Millis) {
        let mut t = from;
        while t < to {
            t += 100;
            game.advance(t);
        }
    }

    fn first_live_target(game: &Game) -> TargetId {
        game.targets().next().expect("a target should be live").id
    }

    /// Advances until at least one target is live.
    fn run_until_target(game: &mut Game, t: &mut Millis) -> TargetId {
        for _ in 0..100 {
            if let Some(target) = game.targets().next() {
                return target.id;
            }
            *t += 100;
            game.advance(*t);
        }
        panic!("no target spawned within 10 simulated seconds");
    }

    #[test]
    fn start_transitions_to_running_and_emits_state() {
        let mut game = new_game(Difficulty::Medium);
        assert_eq!(game.phase(), Phase::Idle);

        game.start(0);
        assert_eq!(game.phase(), Phase::Running);
        let events = game.drain_events();
        assert_matches!(
            events[..],
            [GameEvent::StateUpdated {
                score: 0,
                time_remaining: 60,
                level: 1,
            }]
        );
    }

    #[test]
    fn spawn_cadence_produces_targets() {
        let mut game = new_game(Difficulty::Medium);
        game.start(0);
        // Level 1 medium: spawns every 950ms, lifetimes of 1746ms.
        run_to(&mut game, 0, 3000);

        let events = game.drain_events();
        let spawned = events
            .iter()
            .filter(|e| matches!(e, GameEvent::TargetSpawned { .. }))
            .count();
        let expired = events
            .iter()
            .filter(|e| {
                matches!(
                    e,
                    GameEvent::TargetResolved {
                        resolution: Resolution::Expired,
                        ..
                    }
                )
            })
            .count();
        assert_eq!(spawned, 3); // 950, 1900, 2850
        assert_eq!(expired, 1); // 950 + 1746 = 2696
        assert_eq!(game.targets().count(), 2);
    }

    #[test]
    fn countdown_decrements_once_per_second() {
        let mut game = new_game(Difficulty::Easy);
        game.start(0);
        run_to(&mut game, 0, 5000);
        assert_eq!(game.state().time_remaining, 55);
    }

    #[test]
    fn levels_up_at_each_quarter_but_never_at_the_ends() {
        let mut game = new_game(Difficulty::Medium);
        game.start(0);

        run_to(&mut game, 0, 14_900);
        assert_eq!(game.state().level, 1);

        run_to(&mut game, 14_900, 15_000);
        assert_eq!(game.state().level, 2);
        assert_eq!(game.state().time_remaining, 45);

        run_to(&mut game, 15_000, 30_000);
        assert_eq!(game.state().level, 3);

        run_to(&mut game, 30_000, 45_000);
        assert_eq!(game.state().level, 4);

        run_to(&mut game, 45_000, 61_000);
        assert_eq!(game.phase(), Phase::Ended);
        // No boundary at time_remaining == 0.
        assert_eq!(game.state().level, 4);

        let level_ups = game
            .drain_events()
            .into_iter()
            .filter(|e| matches!(e, GameEvent::LevelUp { .. }))
            .count();
        assert_eq!(level_ups, 3);
    }

    #[test]
    fn level_up_restarts_spawn_cadence_at_new_rate() {
        let mut game = new_game(Difficulty::Medium);
        game.start(0);
        run_to(&mut game, 0, 15_000);
        assert_eq!(game.state().level, 2);
        game.drain_events();

        // The cadence restarted at the level-up instant; the next spawn
        // arrives one level-2 interval (900ms) later and not before.
        game.advance(15_899);
        let spawned_early = game
            .drain_events()
            .into_iter()
            .filter(|e| matches!(e, GameEvent::TargetSpawned { .. }))
            .count();
        assert_eq!(spawned_early, 0);

        game.advance(15_900);
        let spawned = game
            .drain_events()
            .into_iter()
            .filter(|e| matches!(e, GameEvent::TargetSpawned { .. }))
            .count();
        assert_eq!(spawned, 1);
    }

    #[test]
    fn hit_scores_and_is_exactly_once() {
        let mut game = new_game(Difficulty::Medium);
        game.start(0);
        let mut t = 0;
        let id = run_until_target(&mut game, &mut t);

        assert!(game.trigger_hit(id));
        assert_eq!(game.state().score, 10);
        assert_eq!(game.accuracy_stats().shots, 1);
        assert_eq!(game.accuracy_stats().hits, 1);
        assert_eq!(game.accuracy_stats().accuracy(), 100);

        // Second trigger on the same id must change nothing.
        assert!(!game.trigger_hit(id));
        assert_eq!(game.state().score, 10);
        assert_eq!(game.accuracy_stats().shots, 1);
    }

    #[test]
    fn hit_target_never_also_expires() {
        let mut game = new_game(Difficulty::Medium);
        game.start(0);
        let mut t = 0;
        let id = run_until_target(&mut game, &mut t);
        assert!(game.trigger_hit(id));
        game.drain_events();

        // Run well past the target's original deadline.
        run_to(&mut game, t, t + 5000);
        let stale_expiry = game.drain_events().into_iter().any(|e| {
            matches!(
                e,
                GameEvent::TargetResolved {
                    id: expired_id,
                    resolution: Resolution::Expired,
                } if expired_id == id
            )
        });
        assert!(!stale_expiry);
    }

    #[test]
    fn hit_after_expiry_is_ignored() {
        let mut game = new_game(Difficulty::Hard);
        game.start(0);
        let mut t = 0;
        let id = run_until_target(&mut game, &mut t);

        // Hard level 1 lifetime is 1164ms; jump far past it.
        run_to(&mut game, t, t + 3000);
        assert!(!game.trigger_hit(id));
        assert_eq!(game.state().score, 0);
        assert_eq!(game.accuracy_stats().shots, 0);
    }

    #[test]
    fn rapid_fire_hits_score_fifteen_until_the_window_closes() {
        let mut game = new_game(Difficulty::Medium);
        game.start(0);
        let mut t = 0;

        let id = run_until_target(&mut game, &mut t);
        assert!(game.trigger_hit(id));
        assert_eq!(game.state().score, 10);

        assert!(game.activate_power_up(PowerUpKind::RapidFire, t));
        let id = run_until_target(&mut game, &mut t);
        assert!(game.trigger_hit(id));
        assert_eq!(game.state().score, 25);

        // 5000ms after activation the modifier expires on its own.
        run_to(&mut game, t, t + 5000);
        assert!(!game.power_up(PowerUpKind::RapidFire).active);
        let id = run_until_target(&mut game, &mut t);
        assert!(game.trigger_hit(id));
        assert_eq!(game.state().score, 35);
    }

    #[test]
    fn time_freeze_stops_the_clock_but_not_the_cadence() {
        let mut game = new_game(Difficulty::Medium);
        game.start(0);
        assert!(game.activate_power_up(PowerUpKind::TimeFreeze, 500));
        game.drain_events();

        // Freeze runs 500..7500; every countdown tick inside is suppressed.
        run_to(&mut game, 0, 7000);
        assert_eq!(game.state().time_remaining, 60);
        let spawned = game
            .drain_events()
            .into_iter()
            .filter(|e| matches!(e, GameEvent::TargetSpawned { .. }))
            .count();
        assert!(spawned >= 6);

        // First tick after expiry drains a second again.
        run_to(&mut game, 7000, 8000);
        assert!(!game.power_up(PowerUpKind::TimeFreeze).active);
        assert_eq!(game.state().time_remaining, 59);
    }

    #[test]
    fn pause_preserves_each_targets_remaining_lifetime() {
        let mut game = new_game(Difficulty::Medium);
        game.start(0);
        // First spawn at 950 with a 1746ms lifetime (deadline 2696).
        run_to(&mut game, 0, 1000);
        let id = first_live_target(&game);

        game.pause(1500);
        assert_eq!(game.phase(), Phase::Paused);

        // Parked well past the original deadline: neither expiry nor clock
        // may move.
        run_to(&mut game, 1500, 10_000);
        assert!(game.targets().any(|t| t.id == id));
        assert_eq!(game.state().time_remaining, 59);

        // 1196ms of lifetime remained at pause; after resuming at 10s the
        // target lives to 11196 and not a tick longer.
        game.resume(10_000);
        game.advance(11_195);
        assert!(game.targets().any(|t| t.id == id));

        game.advance(11_196);
        assert!(!game.targets().any(|t| t.id == id));
    }

    #[test]
    fn pause_and_resume_are_noops_in_other_phases() {
        let mut game = new_game(Difficulty::Easy);
        game.pause(0);
        assert_eq!(game.phase(), Phase::Idle);
        game.resume(0);
        assert_eq!(game.phase(), Phase::Idle);

        game.start(0);
        game.resume(100);
        assert_eq!(game.phase(), Phase::Running);

        game.pause(200);
        game.pause(300);
        assert_eq!(game.phase(), Phase::Paused);
    }

    #[test]
    fn hits_are_still_accepted_while_paused() {
        let mut game = new_game(Difficulty::Medium);
        game.start(0);
        let mut t = 0;
        let id = run_until_target(&mut game, &mut t);

        game.pause(t);
        assert!(game.trigger_hit(id));
        assert_eq!(game.state().score, 10);
    }

    #[test]
    fn session_ends_at_zero_and_clears_the_arena() {
        let mut game = new_game(Difficulty::Medium);
        game.start(0);
        // One big jump replays the whole session deterministically.
        game.advance(61_000);

        assert_eq!(game.phase(), Phase::Ended);
        assert_eq!(game.state().time_remaining, 0);
        assert_eq!(game.targets().count(), 0);
        assert!(game.timers.is_empty());

        let summary = game
            .drain_events()
            .into_iter()
            .find_map(|e| match e {
                GameEvent::SessionEnded { summary } => Some(summary),
                _ => None,
            })
            .expect("session end must be reported");
        assert_eq!(summary.score, 0);
        assert_eq!(summary.accuracy, 0);
        assert!(!summary.is_new_high_score);
    }

    #[test]
    fn new_high_score_is_persisted_through_the_store() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileHighScoreStore::with_path(dir.path().join("high_score.json"));
        let mut game = Game::new(Difficulty::Medium, Box::new(store.clone()), None);

        game.start(0);
        let mut t = 0;
        let id = run_until_target(&mut game, &mut t);
        assert!(game.trigger_hit(id));
        game.advance(61_000);

        assert_eq!(game.state().high_score, 10);
        assert_eq!(store.load(), 10);
        let summary = game
            .drain_events()
            .into_iter()
            .find_map(|e| match e {
                GameEvent::SessionEnded { summary } => Some(summary),
                _ => None,
            })
            .unwrap();
        assert!(summary.is_new_high_score);
    }

    #[test]
    fn lower_score_leaves_the_high_score_alone() {
        let mut game = Game::new(
            Difficulty::Medium,
            Box::new(MemoryHighScoreStore::with_score(500)),
            None,
        );
        game.start(0);
        let mut t = 0;
        let id = run_until_target(&mut game, &mut t);
        game.trigger_hit(id);
        game.advance(61_000);

        assert_eq!(game.state().high_score, 500);
        let summary = game
            .drain_events()
            .into_iter()
            .find_map(|e| match e {
                GameEvent::SessionEnded { summary } => Some(summary),
                _ => None,
            })
            .unwrap();
        assert!(!summary.is_new_high_score);
    }

    #[test]
    fn difficulty_changes_only_between_sessions() {
        let mut game = new_game(Difficulty::Medium);
        assert!(game.set_difficulty(Difficulty::Hard));

        game.start(0);
        assert!(!game.set_difficulty(Difficulty::Easy));
        game.pause(100);
        assert!(!game.set_difficulty(Difficulty::Easy));
        game.resume(200);

        game.advance(61_000);
        assert_eq!(game.phase(), Phase::Ended);
        assert!(game.set_difficulty(Difficulty::Easy));
        assert_eq!(game.state().difficulty, Difficulty::Easy);
    }

    #[test]
    fn restart_resets_the_session_but_not_power_up_charges() {
        let mut game = new_game(Difficulty::Medium);
        game.start(0);
        assert!(game.activate_power_up(PowerUpKind::RapidFire, 100));
        game.advance(61_000);
        assert_eq!(game.phase(), Phase::Ended);

        game.start(62_000);
        assert_eq!(game.phase(), Phase::Running);
        assert_eq!(game.state().score, 0);
        assert_eq!(game.state().level, 1);
        assert_eq!(game.state().time_remaining, 60);
        assert_eq!(game.accuracy_stats().shots, 0);
        // Charges deplete across restarts, exactly as in the arcade build.
        assert_eq!(game.power_up(PowerUpKind::RapidFire).charges_remaining, 2);

        // The level-up latch reset with the session.
        run_to(&mut game, 62_000, 77_000);
        assert_eq!(game.state().level, 2);
    }

    #[test]
    fn depleted_power_up_activation_is_rejected() {
        let mut game = new_game(Difficulty::Medium);
        game.start(0);
        let mut t = 0;
        for _ in 0..2 {
            assert!(game.activate_power_up(PowerUpKind::TimeFreeze, t));
            t += 8000;
            game.advance(t);
        }
        assert!(!game.activate_power_up(PowerUpKind::TimeFreeze, t));
        assert_eq!(game.power_up(PowerUpKind::TimeFreeze).charges_remaining, 0);
    }

    #[test]
    fn active_power_up_cannot_be_stacked() {
        let mut game = new_game(Difficulty::Medium);
        game.start(0);
        assert!(game.activate_power_up(PowerUpKind::RapidFire, 0));
        assert!(!game.activate_power_up(PowerUpKind::RapidFire, 1000));
        assert_eq!(game.power_up(PowerUpKind::RapidFire).charges_remaining, 2);
    }

    #[test]
    fn power_up_events_carry_charge_counts() {
        let mut game = new_game(Difficulty::Medium);
        game.start(0);
        game.drain_events();

        game.activate_power_up(PowerUpKind::TimeFreeze, 0);
        let events = game.drain_events();
        assert_matches!(
            events[..],
            [GameEvent::PowerUpChanged {
                kind: PowerUpKind::TimeFreeze,
                active: true,
                charges_remaining: 1,
            }]
        );

        game.advance(7000);
        let deactivated = game.drain_events().into_iter().any(|e| {
            matches!(
                e,
                GameEvent::PowerUpChanged {
                    kind: PowerUpKind::TimeFreeze,
                    active: false,
                    charges_remaining: 1,
                }
            )
        });
        assert!(deactivated);
    }

    #[test]
    fn session_end_is_recorded_in_history() {
        let dir = tempfile::tempdir().unwrap();
        let db = HistoryDb::open(dir.path().join("history.db")).unwrap();
        let mut game = Game::new(
            Difficulty::Hard,
            Box::new(MemoryHighScoreStore::new()),
            Some(db),
        );

        game.start(0);
        let mut t = 0;
        let id = run_until_target(&mut game, &mut t);
        game.trigger_hit(id);
        game.advance(61_000);

        let db = game.history().unwrap();
        assert_eq!(db.session_count().unwrap(), 1);
        let recent = db.recent_sessions(1).unwrap();
        assert_eq!(recent[0].difficulty, Difficulty::Hard);
        assert_eq!(recent[0].score, 10);
        assert_eq!(recent[0].accuracy, 100);
        assert_eq!(recent[0].level_reached, 4);
    }

    #[test]
    fn target_lookup_by_position_matches_hit_testing() {
        let mut game = new_game(Difficulty::Easy);
        game.start(0);
        let mut t = 0;
        let id = run_until_target(&mut game, &mut t);
        let (x, y) = game.targets().next().unwrap().position;

        assert_eq!(game.target_at(x, y), Some(id));
        assert_eq!(game.target_at(0, 0), None);
    }
}

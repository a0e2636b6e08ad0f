//! Anti-automation guard.
//!
//! The verifier is driven by a fixed-period tick that runs regardless of
//! packet arrival. On every tick two cosmetic counters rotate (they are
//! pushed to the client as health and experience readouts), then the pass
//! condition is evaluated:
//!
//! * at least `min_packets` packets observed since entering Play,
//! * last reported height at or below `max_height`,
//! * at least `min_slot_changes` hotbar slot changes.
//!
//! The pass triggers once; later ticks keep the cosmetic counters moving.
//! The verification deadline is a separate timer owned by the session.

use crate::config::GuardSettings;

const HEALTH_WINDOW: u64 = 20;
const EXPERIENCE_WINDOW: u64 = 100;

/// Values pushed to the client on every tick.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CosmeticFrame {
    pub health: f32,
    pub food: i32,
    pub experience_bar: f32,
    pub level: i32,
}

/// Outcome of one guard tick.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GuardTick {
    pub cosmetic: CosmeticFrame,
    /// True only on the tick where the pass condition first held
    pub passed_now: bool,
}

/// Per-connection verification state.
#[derive(Debug, Clone)]
pub struct GuardVerifier {
    settings: GuardSettings,
    packets_observed: u64,
    slot_changes: u64,
    last_height: f64,
    ticks: u64,
    passed: bool,
}

impl GuardVerifier {
    /// Creates a verifier for a player spawned at `spawn_height`.
    pub fn new(settings: GuardSettings, spawn_height: f64) -> Self {
        Self {
            settings,
            packets_observed: 0,
            slot_changes: 0,
            last_height: spawn_height,
            ticks: 0,
            passed: false,
        }
    }

    pub fn record_packet(&mut self) {
        self.packets_observed += 1;
    }

    pub fn record_height(&mut self, y: f64) {
        self.last_height = y;
    }

    pub fn record_slot_change(&mut self) {
        self.slot_changes += 1;
    }

    /// Advances one tick.
    pub fn tick(&mut self) -> GuardTick {
        self.ticks += 1;
        let cosmetic = self.cosmetic();

        let passed_now = !self.passed && self.conditions_met();
        if passed_now {
            self.passed = true;
        }

        GuardTick {
            cosmetic,
            passed_now,
        }
    }

    fn cosmetic(&self) -> CosmeticFrame {
        let health_step = self.ticks % HEALTH_WINDOW;
        let experience_step = self.ticks % EXPERIENCE_WINDOW;
        CosmeticFrame {
            health: (health_step + 1) as f32,
            food: 20,
            experience_bar: experience_step as f32 / EXPERIENCE_WINDOW as f32,
            level: (self.ticks / EXPERIENCE_WINDOW) as i32,
        }
    }

    pub fn conditions_met(&self) -> bool {
        self.packets_observed >= self.settings.min_packets
            && self.last_height <= self.settings.max_height
            && self.slot_changes >= self.settings.min_slot_changes
    }

    pub fn is_passed(&self) -> bool {
        self.passed
    }

    pub fn packets_observed(&self) -> u64 {
        self.packets_observed
    }

    pub fn slot_changes(&self) -> u64 {
        self.slot_changes
    }

    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    /// Time spent ticking, in milliseconds.
    pub fn elapsed_ms(&self) -> u64 {
        self.ticks * self.settings.tick_interval_ms
    }
}

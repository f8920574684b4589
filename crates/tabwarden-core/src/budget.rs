//! Daily budget, close probability and cooldown
//!
//! [`BudgetEngine`] is the only place these process-wide values change. Every
//! change is written through to the store; a failed write is logged and the
//! in-memory value stays authoritative until the next successful one.

use chrono::{DateTime, Local};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::sync::Arc;
use std::time::Duration;
use tabwarden_config::Policy;
use tabwarden_store::{PersistedSettings, Store, StoreResult};
use tabwarden_util::{Debouncer, MonotonicInstant};
use tracing::{debug, info, warn};

/// `floor(remaining * reduction_factor) + 1`
///
/// The result is at least one second even with an empty budget.
pub fn compute_interval(remaining_secs: u64, reduction_factor: f64) -> u64 {
    allowance(remaining_secs, reduction_factor) + 1
}

fn allowance(remaining_secs: u64, reduction_factor: f64) -> u64 {
    (remaining_secs as f64 * reduction_factor.clamp(0.0, 1.0)).floor() as u64
}

/// Fraction of the cooldown window elapsed since the last closure, in [0, 1]
///
/// `None` (never closed) yields 1. A closure timestamp in the future yields 0.
pub fn reduction_factor(
    last_close: Option<DateTime<Local>>,
    now: DateTime<Local>,
    window: Duration,
) -> f64 {
    let Some(last_close) = last_close else {
        return 1.0;
    };
    if window.is_zero() {
        return 1.0;
    }

    let elapsed_ms = (now - last_close).num_milliseconds() as f64;
    (elapsed_ms / window.as_millis() as f64).clamp(0.0, 1.0)
}

/// Probability after decaying at `rate_per_hour` since `last_update`
pub fn decayed_probability(
    probability: f64,
    last_update: Option<DateTime<Local>>,
    now: DateTime<Local>,
    rate_per_hour: f64,
) -> f64 {
    let hours = last_update
        .map(|t| (now - t).num_milliseconds().max(0) as f64 / 3_600_000.0)
        .unwrap_or(0.0);
    (probability - rate_per_hour * hours).clamp(0.0, 1.0)
}

fn persist(what: &'static str, result: StoreResult<()>) {
    if let Err(e) = result {
        warn!(setting = what, error = %e, "Failed to persist setting");
    }
}

/// Shared budget and close-probability state
pub struct BudgetEngine {
    store: Arc<dyn Store>,

    ceiling: u64,
    remaining: u64,

    probability: f64,
    last_probability_update: Option<DateTime<Local>>,
    step: f64,
    decay_per_hour: f64,
    bump: Debouncer<(), ()>,

    last_distracting_close: Option<DateTime<Local>>,
    cooldown_window: Duration,
    reduction_factor: f64,

    randomize_interval: bool,
    rng: StdRng,
}

impl BudgetEngine {
    /// Build from persisted settings. The budget starts full; the caller
    /// decides whether the persisted budget still applies today.
    pub fn new(
        policy: &Policy,
        store: Arc<dyn Store>,
        settings: &PersistedSettings,
        now: DateTime<Local>,
    ) -> Self {
        let rng = match policy.service.rng_seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };

        let mut engine = Self {
            store,
            ceiling: policy.budget.daily_seconds,
            remaining: policy.budget.daily_seconds,
            probability: settings.close_probability.unwrap_or(0.0).clamp(0.0, 1.0),
            last_probability_update: settings.last_probability_update,
            step: policy.probability.step,
            decay_per_hour: policy.probability.decay_per_hour,
            bump: Debouncer::new(policy.probability.debounce),
            last_distracting_close: settings.last_distracting_close,
            cooldown_window: policy.cooldown.window,
            reduction_factor: 1.0,
            randomize_interval: policy.behavior.randomize_interval,
            rng,
        };

        engine.apply_probability_cooldown(now);
        engine.reduction_factor = reduction_factor(
            engine.last_distracting_close,
            now,
            engine.cooldown_window,
        );

        info!(
            close_probability = engine.probability,
            reduction_factor = engine.reduction_factor,
            "Budget engine restored"
        );

        engine
    }

    // Budget

    pub fn remaining(&self) -> u64 {
        self.remaining
    }

    pub fn ceiling(&self) -> u64 {
        self.ceiling
    }

    pub fn is_exhausted(&self) -> bool {
        self.remaining == 0
    }

    /// Restore a budget persisted earlier today, capped at the ceiling
    pub fn restore_remaining(&mut self, remaining: u64) {
        self.remaining = remaining.min(self.ceiling);
    }

    /// Take `seconds` from the budget, flooring at zero.
    ///
    /// Returns `true` if this call emptied the budget.
    pub fn consume(&mut self, seconds: u64) -> bool {
        if seconds == 0 || self.remaining == 0 {
            return false;
        }
        self.remaining = self.remaining.saturating_sub(seconds);
        if self.remaining == 0 {
            info!("Daily budget exhausted");
            self.persist_budget();
            true
        } else {
            false
        }
    }

    /// Refill the budget to the ceiling
    pub fn reset(&mut self) {
        self.remaining = self.ceiling;
        self.persist_budget();
        info!(ceiling_secs = self.ceiling, "Daily budget reset");
    }

    pub fn persist_budget(&self) {
        persist("budget_remaining", self.store.set_budget_remaining(self.remaining));
    }

    // Cooldown

    /// Current reduction factor; the result is cached and persisted for display
    pub fn reduction_factor(&mut self, now: DateTime<Local>) -> f64 {
        let factor = reduction_factor(self.last_distracting_close, now, self.cooldown_window);
        self.reduction_factor = factor;
        persist("reduction_factor", self.store.set_reduction_factor(factor));
        factor
    }

    /// Last computed reduction factor, without recomputing
    pub fn cached_reduction_factor(&self) -> f64 {
        self.reduction_factor
    }

    /// Record that a tracked distracting tab was closed
    pub fn record_distracting_close(&mut self, now: DateTime<Local>) {
        self.last_distracting_close = Some(now);
        persist(
            "last_distracting_close",
            self.store.set_last_distracting_close(now),
        );
        self.reduction_factor(now);
        debug!("Distracting close recorded");
    }

    pub fn last_distracting_close(&self) -> Option<DateTime<Local>> {
        self.last_distracting_close
    }

    /// Countdown length for a new Active timer
    pub fn compute_interval(&mut self, now: DateTime<Local>) -> u64 {
        let factor = self.reduction_factor(now);
        if self.randomize_interval {
            let upper = allowance(self.remaining, factor) + 1;
            self.rng.gen_range(1..=upper)
        } else {
            compute_interval(self.remaining, factor)
        }
    }

    // Close probability

    pub fn close_probability(&self) -> f64 {
        self.probability
    }

    /// Queue a probability increase; bursts within the debounce window count once
    pub fn schedule_probability_increase(&mut self, now_mono: MonotonicInstant) {
        if self.bump.schedule((), (), now_mono) {
            debug!("Probability increase already pending, deferred");
        }
    }

    /// Apply a queued increase if its window has passed
    pub fn flush_probability_increase(
        &mut self,
        now_mono: MonotonicInstant,
        now: DateTime<Local>,
    ) -> bool {
        if self.bump.take_due(now_mono).is_empty() {
            return false;
        }
        self.increase_close_probability(now);
        true
    }

    pub fn next_probability_increase(&self) -> Option<MonotonicInstant> {
        self.bump.next_due()
    }

    /// Decay first, then add one step, capped at 1
    pub fn increase_close_probability(&mut self, now: DateTime<Local>) {
        self.probability = decayed_probability(
            self.probability,
            self.last_probability_update,
            now,
            self.decay_per_hour,
        );
        self.probability = (self.probability + self.step).min(1.0);
        self.last_probability_update = Some(now);
        self.persist_probability(now);

        info!(close_probability = self.probability, "Close probability increased");
    }

    /// Decay by the hourly rate since the last update, floored at 0.
    /// The timestamp moves to `now` even when nothing changed.
    pub fn apply_probability_cooldown(&mut self, now: DateTime<Local>) {
        let before = self.probability;
        self.probability = decayed_probability(
            self.probability,
            self.last_probability_update,
            now,
            self.decay_per_hour,
        );
        self.last_probability_update = Some(now);
        self.persist_probability(now);

        if self.probability != before {
            debug!(
                before,
                after = self.probability,
                "Close probability decayed"
            );
        }
    }

    fn persist_probability(&self, now: DateTime<Local>) {
        persist(
            "close_probability",
            self.store.set_close_probability(self.probability),
        );
        persist(
            "last_probability_update",
            self.store.set_last_probability_update(now),
        );
    }

    /// Roll against the close probability
    pub fn roll_close_all(&mut self) -> bool {
        let roll: f64 = self.rng.r#gen();
        let hit = roll < self.probability;
        debug!(roll, close_probability = self.probability, hit, "Close-all roll");
        hit
    }
}

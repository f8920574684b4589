//! Per-tab timer state

use chrono::{DateTime, Local};
use std::time::Duration;
use tabwarden_api::{TabTimerInfo, TimerEndReason, TimerMode};
use tabwarden_util::{MonotonicInstant, TabId, TimerId};

/// One tracked tab
///
/// Created on the first distracting navigation of a tab and dropped when the
/// tab closes, navigates away, or its closure has been carried out.
#[derive(Debug, Clone)]
pub struct TabTimerEntry {
    pub tab_id: TabId,
    pub timer_id: TimerId,
    pub mode: TimerMode,
    /// URL that started the timer
    pub url: String,

    /// Wall-clock start time (for display/logging)
    pub started_at: DateTime<Local>,

    /// Monotonic start time (for enforcement)
    pub started_at_mono: MonotonicInstant,

    /// Countdown interval in Active mode, grace duration in GracePeriod
    pub time_limit: Duration,

    /// Budget ticks already charged for this timer
    ticks_charged: u64,

    /// Set when the entry moves to Stopped
    end_reason: Option<TimerEndReason>,
}

impl TabTimerEntry {
    pub fn active(
        tab_id: TabId,
        url: impl Into<String>,
        interval_secs: u64,
        now: DateTime<Local>,
        now_mono: MonotonicInstant,
    ) -> Self {
        Self::with_mode(
            tab_id,
            url.into(),
            TimerMode::Active,
            Duration::from_secs(interval_secs),
            now,
            now_mono,
        )
    }

    pub fn grace(
        tab_id: TabId,
        url: impl Into<String>,
        duration: Duration,
        now: DateTime<Local>,
        now_mono: MonotonicInstant,
    ) -> Self {
        Self::with_mode(
            tab_id,
            url.into(),
            TimerMode::GracePeriod,
            duration,
            now,
            now_mono,
        )
    }

    fn with_mode(
        tab_id: TabId,
        url: String,
        mode: TimerMode,
        time_limit: Duration,
        now: DateTime<Local>,
        now_mono: MonotonicInstant,
    ) -> Self {
        Self {
            tab_id,
            timer_id: TimerId::new(),
            mode,
            url,
            started_at: now,
            started_at_mono: now_mono,
            time_limit,
            ticks_charged: 0,
            end_reason: None,
        }
    }

    pub fn is_active(&self) -> bool {
        self.mode == TimerMode::Active
    }

    pub fn is_grace(&self) -> bool {
        self.mode == TimerMode::GracePeriod
    }

    pub fn is_stopped(&self) -> bool {
        self.mode == TimerMode::Stopped
    }

    pub fn elapsed(&self, now_mono: MonotonicInstant) -> Duration {
        now_mono.duration_since(self.started_at_mono)
    }

    /// Whether the interval (or grace duration) has run out
    pub fn limit_reached(&self, now_mono: MonotonicInstant) -> bool {
        self.elapsed(now_mono) >= self.time_limit
    }

    /// Charge every whole tick elapsed since the last call; returns how many.
    /// A late caller gets all missed ticks at once.
    pub fn take_due_ticks(&mut self, now_mono: MonotonicInstant, tick: Duration) -> u64 {
        if !self.is_active() {
            return 0;
        }
        let tick_ms = tick.as_millis().max(1);
        let total = (self.elapsed(now_mono).as_millis() / tick_ms) as u64;
        let due = total.saturating_sub(self.ticks_charged);
        self.ticks_charged = total;
        due
    }

    /// Move to Stopped. Only the first reason is kept.
    pub fn stop(&mut self, reason: TimerEndReason) {
        if self.end_reason.is_none() {
            self.end_reason = Some(reason);
        }
        self.mode = TimerMode::Stopped;
    }

    pub fn end_reason(&self) -> Option<TimerEndReason> {
        self.end_reason
    }

    pub fn to_info(&self, now_mono: MonotonicInstant) -> TabTimerInfo {
        TabTimerInfo {
            tab_id: self.tab_id,
            timer_id: self.timer_id,
            mode: self.mode,
            url: self.url.clone(),
            time_limit_secs: self.time_limit.as_secs(),
            elapsed_secs: self.elapsed(now_mono).as_secs(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_active(interval: u64) -> (TabTimerEntry, MonotonicInstant) {
        let t0 = MonotonicInstant::now();
        let entry = TabTimerEntry::active(
            TabId::new(1),
            "https://reddit.com/r/x",
            interval,
            tabwarden_util::now(),
            t0,
        );
        (entry, t0)
    }

    #[test]
    fn ticks_accumulate_and_catch_up() {
        let (mut entry, t0) = make_active(60);
        let tick = Duration::from_secs(1);

        assert_eq!(entry.take_due_ticks(t0 + Duration::from_millis(900), tick), 0);
        assert_eq!(entry.take_due_ticks(t0 + Duration::from_millis(1000), tick), 1);
        assert_eq!(entry.take_due_ticks(t0 + Duration::from_millis(1500), tick), 0);
        // Driver stalled for three seconds
        assert_eq!(entry.take_due_ticks(t0 + Duration::from_millis(4200), tick), 3);
    }

    #[test]
    fn grace_entries_never_tick() {
        let t0 = MonotonicInstant::now();
        let mut entry = TabTimerEntry::grace(
            TabId::new(1),
            "https://reddit.com/r/x",
            Duration::from_secs(90),
            tabwarden_util::now(),
            t0,
        );

        assert_eq!(entry.take_due_ticks(t0 + Duration::from_secs(30), Duration::from_secs(1)), 0);
        assert!(!entry.limit_reached(t0 + Duration::from_secs(89)));
        assert!(entry.limit_reached(t0 + Duration::from_secs(90)));
    }

    #[test]
    fn stop_keeps_first_reason() {
        let (mut entry, t0) = make_active(10);
        entry.stop(TimerEndReason::Expired);
        entry.stop(TimerEndReason::BudgetExhausted);

        assert!(entry.is_stopped());
        assert_eq!(entry.end_reason(), Some(TimerEndReason::Expired));
        assert_eq!(entry.take_due_ticks(t0 + Duration::from_secs(5), Duration::from_secs(1)), 0);
    }

    #[test]
    fn info_reports_elapsed() {
        let (entry, t0) = make_active(1801);
        let info = entry.to_info(t0 + Duration::from_secs(12));

        assert_eq!(info.mode, TimerMode::Active);
        assert_eq!(info.time_limit_secs, 1801);
        assert_eq!(info.elapsed_secs, 12);
    }
}

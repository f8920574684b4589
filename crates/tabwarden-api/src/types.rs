//! Shared types for the tabwarden API

use serde::{Deserialize, Serialize};
use tabwarden_util::{TabId, TimerId};

/// Mode of a tracked tab's timer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimerMode {
    /// Deferred judgment after arriving from a search context; no budget use
    GracePeriod,
    /// Counting down, depleting the daily budget
    Active,
    /// Countdown finished; the tab is being closed and the entry awaits reaping
    Stopped,
}

/// Why a timer stopped tracking a tab
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimerEndReason {
    /// Countdown reached its interval; the tab was closed by the timer
    Expired,
    /// Daily budget ran out; the tab was closed by the timer
    BudgetExhausted,
    /// Tab navigated to a non-distracting URL
    NavigatedAway,
    /// Tab was closed by someone other than the timer
    TabClosed,
    /// Grace period ran out without a second distracting navigation
    GraceElapsed,
    /// Closing the tab through the browser failed; entry dropped
    CloseFailed,
    /// Closed together with another tab's timer closure (close-all or
    /// close-other-distracting-tabs)
    ClosedWithOthers,
}

impl TimerEndReason {
    /// Whether the tab was force-closed by tabwarden
    pub fn closed_by_timer(&self) -> bool {
        matches!(
            self,
            TimerEndReason::Expired
                | TimerEndReason::BudgetExhausted
                | TimerEndReason::ClosedWithOthers
        )
    }
}

/// A browser tab as reported by the host
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TabInfo {
    pub tab_id: TabId,
    /// Missing for privileged pages the extension cannot read
    #[serde(default)]
    pub url: Option<String>,
}

impl TabInfo {
    pub fn new(tab_id: TabId, url: impl Into<String>) -> Self {
        Self {
            tab_id,
            url: Some(url.into()),
        }
    }
}

/// View of one tracked tab timer
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TabTimerInfo {
    pub tab_id: TabId,
    pub timer_id: TimerId,
    pub mode: TimerMode,
    pub url: String,
    /// Interval fixed at creation (grace duration in GracePeriod)
    pub time_limit_secs: u64,
    pub elapsed_secs: u64,
}

/// Full service state, returned by `getState`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceStateSnapshot {
    pub api_version: u32,
    pub blacklist: Vec<String>,
    pub budget_remaining_secs: u64,
    pub budget_ceiling_secs: u64,
    /// e.g. "12 minutes and 5 seconds"
    pub budget_remaining_display: String,
    pub close_probability: f64,
    pub reduction_factor: f64,
    pub timers: Vec<TabTimerInfo>,
}

/// Health status
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthStatus {
    pub live: bool,
    pub store_ok: bool,
    pub host_ok: bool,
}

//! Core events emitted by the engine

use tabwarden_api::{TimerEndReason, TimerMode};
use tabwarden_util::{TabId, TimerId};

/// Side effects the service carries out after an engine call
#[derive(Debug, Clone, PartialEq)]
pub enum CoreEvent {
    /// A tab started being tracked
    TimerStarted {
        tab_id: TabId,
        timer_id: TimerId,
        mode: TimerMode,
        time_limit_secs: u64,
        budget_remaining_secs: u64,
    },

    /// Refresh the countdown banner in a tab
    DisplayUpdate { tab_id: TabId, time_left: u64 },

    /// Remove the countdown banner from a tab that stays open
    HideDisplay { tab_id: TabId },

    /// A timer ran out: close the tab, then report back with
    /// `notify_closed_by_timer` or `abort_timer_close`
    ExpireDue {
        tab_id: TabId,
        timer_id: TimerId,
        reason: TimerEndReason,
    },

    /// A tab stopped being tracked
    TimerStopped {
        tab_id: TabId,
        timer_id: TimerId,
        reason: TimerEndReason,
    },

    /// The close-all roll hit: close every open tab
    CloseAllDue,

    /// Close every other distracting tab, keeping `keep`
    CloseOtherDistracting { keep: TabId },

    /// Daily budget refilled
    BudgetReset { ceiling_secs: u64 },

    /// Daily budget reached zero
    BudgetExhausted,

    /// New toolbar badge text
    BadgeUpdate { text: String },
}

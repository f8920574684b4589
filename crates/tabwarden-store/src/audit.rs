//! Audit event types

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use tabwarden_api::{TimerEndReason, TimerMode};
use tabwarden_util::{TabId, TimerId};

/// Types of audit events
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AuditEventType {
    /// Service started
    ServiceStarted,

    /// Service stopped
    ServiceStopped,

    /// User added a site through the popup
    BlacklistSiteAdded { site: String },

    /// A tab started being tracked
    TimerStarted {
        tab_id: TabId,
        timer_id: TimerId,
        mode: TimerMode,
        time_limit_secs: u64,
    },

    /// A tab stopped being tracked
    TimerEnded {
        tab_id: TabId,
        timer_id: TimerId,
        reason: TimerEndReason,
        elapsed_secs: u64,
    },

    /// The close-all roll succeeded after a timer closure
    CloseAllTabs { probability: f64 },

    /// Daily budget restored to its ceiling
    BudgetReset { ceiling_secs: u64 },

    /// Daily budget reached zero
    BudgetExhausted,
}

/// Full audit event with metadata
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEvent {
    /// Unique event ID
    pub id: i64,

    /// Event timestamp
    pub timestamp: DateTime<Local>,

    /// Event type and details
    pub event: AuditEventType,
}

impl AuditEvent {
    pub fn new(event: AuditEventType) -> Self {
        Self {
            id: 0, // Will be set by store
            timestamp: tabwarden_util::now(),
            event,
        }
    }
}

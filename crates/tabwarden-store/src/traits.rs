//! Store trait definitions

use chrono::{DateTime, Local};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tabwarden_util::{from_epoch_ms, to_epoch_ms};

use crate::{AuditEvent, StoreResult};

/// Keys of the persisted settings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SettingKey {
    /// List of blacklisted substrings, in insertion order
    Blacklist,
    /// Seconds left in today's budget
    BudgetRemaining,
    /// Epoch ms of the last daily reset
    LastReset,
    /// Close-all probability in [0, 1]
    CloseProbability,
    /// Epoch ms of the last probability change or decay
    LastProbabilityUpdate,
    /// Epoch ms of the last closure of a tracked Active tab
    LastDistractingClose,
    /// Last computed reduction factor (display cache)
    ReductionFactor,
}

impl SettingKey {
    pub const ALL: [SettingKey; 7] = [
        SettingKey::Blacklist,
        SettingKey::BudgetRemaining,
        SettingKey::LastReset,
        SettingKey::CloseProbability,
        SettingKey::LastProbabilityUpdate,
        SettingKey::LastDistractingClose,
        SettingKey::ReductionFactor,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            SettingKey::Blacklist => "blacklist",
            SettingKey::BudgetRemaining => "budget_remaining",
            SettingKey::LastReset => "last_reset_ms",
            SettingKey::CloseProbability => "close_probability",
            SettingKey::LastProbabilityUpdate => "last_probability_update_ms",
            SettingKey::LastDistractingClose => "last_distracting_close_ms",
            SettingKey::ReductionFactor => "reduction_factor",
        }
    }
}

impl std::fmt::Display for SettingKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Main store trait
pub trait Store: Send + Sync {
    // Audit log

    /// Append an audit event
    fn append_audit(&self, event: AuditEvent) -> StoreResult<()>;

    /// Get recent audit events
    fn get_recent_audits(&self, limit: usize) -> StoreResult<Vec<AuditEvent>>;

    // Settings

    /// Read a raw setting value
    fn get_setting(&self, key: SettingKey) -> StoreResult<Option<Value>>;

    /// Write a raw setting value
    fn set_setting(&self, key: SettingKey, value: Value) -> StoreResult<()>;

    // Health

    /// Check if store is healthy
    fn is_healthy(&self) -> bool;

    // Typed settings

    fn get_blacklist(&self) -> StoreResult<Option<Vec<String>>> {
        decode(self.get_setting(SettingKey::Blacklist)?)
    }

    fn set_blacklist(&self, sites: &[String]) -> StoreResult<()> {
        self.set_setting(SettingKey::Blacklist, encode(sites)?)
    }

    fn get_budget_remaining(&self) -> StoreResult<Option<u64>> {
        decode(self.get_setting(SettingKey::BudgetRemaining)?)
    }

    fn set_budget_remaining(&self, seconds: u64) -> StoreResult<()> {
        self.set_setting(SettingKey::BudgetRemaining, Value::from(seconds))
    }

    fn get_last_reset(&self) -> StoreResult<Option<DateTime<Local>>> {
        decode_time(self.get_setting(SettingKey::LastReset)?)
    }

    fn set_last_reset(&self, at: DateTime<Local>) -> StoreResult<()> {
        self.set_setting(SettingKey::LastReset, Value::from(to_epoch_ms(&at)))
    }

    fn get_close_probability(&self) -> StoreResult<Option<f64>> {
        decode(self.get_setting(SettingKey::CloseProbability)?)
    }

    fn set_close_probability(&self, probability: f64) -> StoreResult<()> {
        self.set_setting(SettingKey::CloseProbability, encode(&probability)?)
    }

    fn get_last_probability_update(&self) -> StoreResult<Option<DateTime<Local>>> {
        decode_time(self.get_setting(SettingKey::LastProbabilityUpdate)?)
    }

    fn set_last_probability_update(&self, at: DateTime<Local>) -> StoreResult<()> {
        self.set_setting(SettingKey::LastProbabilityUpdate, Value::from(to_epoch_ms(&at)))
    }

    fn get_last_distracting_close(&self) -> StoreResult<Option<DateTime<Local>>> {
        decode_time(self.get_setting(SettingKey::LastDistractingClose)?)
    }

    fn set_last_distracting_close(&self, at: DateTime<Local>) -> StoreResult<()> {
        self.set_setting(SettingKey::LastDistractingClose, Value::from(to_epoch_ms(&at)))
    }

    fn get_reduction_factor(&self) -> StoreResult<Option<f64>> {
        decode(self.get_setting(SettingKey::ReductionFactor)?)
    }

    fn set_reduction_factor(&self, factor: f64) -> StoreResult<()> {
        self.set_setting(SettingKey::ReductionFactor, encode(&factor)?)
    }
}

fn encode<T: Serialize + ?Sized>(value: &T) -> StoreResult<Value> {
    Ok(serde_json::to_value(value)?)
}

fn decode<T: DeserializeOwned>(value: Option<Value>) -> StoreResult<Option<T>> {
    match value {
        Some(v) => Ok(Some(serde_json::from_value(v)?)),
        None => Ok(None),
    }
}

fn decode_time(value: Option<Value>) -> StoreResult<Option<DateTime<Local>>> {
    Ok(decode::<i64>(value)?.and_then(from_epoch_ms))
}

/// Everything the engine restores at startup
#[derive(Debug, Clone, Default)]
pub struct PersistedSettings {
    pub blacklist: Option<Vec<String>>,
    pub budget_remaining: Option<u64>,
    pub last_reset: Option<DateTime<Local>>,
    pub close_probability: Option<f64>,
    pub last_probability_update: Option<DateTime<Local>>,
    pub last_distracting_close: Option<DateTime<Local>>,
}

impl PersistedSettings {
    /// Read all settings. A key that fails to load is logged and treated as unset.
    pub fn load(store: &dyn Store) -> Self {
        fn or_unset<T>(key: SettingKey, result: StoreResult<Option<T>>) -> Option<T> {
            result.unwrap_or_else(|e| {
                tracing::warn!(key = %key, error = %e, "Failed to load setting");
                None
            })
        }

        Self {
            blacklist: or_unset(SettingKey::Blacklist, store.get_blacklist()),
            budget_remaining: or_unset(SettingKey::BudgetRemaining, store.get_budget_remaining()),
            last_reset: or_unset(SettingKey::LastReset, store.get_last_reset()),
            close_probability: or_unset(
                SettingKey::CloseProbability,
                store.get_close_probability(),
            ),
            last_probability_update: or_unset(
                SettingKey::LastProbabilityUpdate,
                store.get_last_probability_update(),
            ),
            last_distracting_close: or_unset(
                SettingKey::LastDistractingClose,
                store.get_last_distracting_close(),
            ),
        }
    }
}

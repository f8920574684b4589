//! Strongly-typed identifiers for tabwarden

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Browser-assigned tab identifier
///
/// Opaque to the core; only compared and hashed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TabId(i64);

impl TabId {
    pub const fn new(id: i64) -> Self {
        Self(id)
    }

    pub const fn as_i64(&self) -> i64 {
        self.0
    }
}

impl fmt::Display for TabId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i64> for TabId {
    fn from(id: i64) -> Self {
        Self(id)
    }
}

/// Identity of one timer lifetime on a tab
///
/// A tab can be tracked, released and tracked again; reports about a closure
/// carry the timer id so a stale report cannot act on a newer timer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TimerId(Uuid);

impl TimerId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for TimerId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for TimerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tab_id_equality() {
        assert_eq!(TabId::new(7), TabId::from(7));
        assert_ne!(TabId::new(7), TabId::new(8));
    }

    #[test]
    fn timer_id_uniqueness() {
        let t1 = TimerId::new();
        let t2 = TimerId::new();
        assert_ne!(t1, t2);
    }

    #[test]
    fn tab_id_is_a_bare_number_on_the_wire() {
        let json = serde_json::to_string(&TabId::new(42)).unwrap();
        assert_eq!(json, "42");

        let parsed: TabId = serde_json::from_str("42").unwrap();
        assert_eq!(parsed, TabId::new(42));
    }

    #[test]
    fn timer_id_serialize_deserialize() {
        let timer_id = TimerId::new();
        let json = serde_json::to_string(&timer_id).unwrap();
        let parsed: TimerId = serde_json::from_str(&json).unwrap();
        assert_eq!(timer_id, parsed);
    }
}

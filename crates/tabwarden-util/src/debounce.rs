//! Per-key debouncing driven by an explicit clock
//!
//! Each key holds at most one pending value. Scheduling a key again replaces
//! the pending value and pushes its deadline out by the full window, so only
//! the last value of a burst is delivered. Nothing fires on its own: the owner
//! polls [`Debouncer::take_due`] from its tick.

use std::collections::HashMap;
use std::hash::Hash;
use std::time::Duration;

use crate::MonotonicInstant;

/// Trailing-edge debouncer keyed by `K`, carrying the latest `V` per key
#[derive(Debug)]
pub struct Debouncer<K, V> {
    window: Duration,
    pending: HashMap<K, Pending<V>>,
}

#[derive(Debug)]
struct Pending<V> {
    value: V,
    due: MonotonicInstant,
}

impl<K, V> Debouncer<K, V>
where
    K: Eq + Hash + Clone,
{
    /// Create a debouncer that delivers a key `window` after its last event
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            pending: HashMap::new(),
        }
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    /// Schedule `value` for `key`, superseding anything pending for that key.
    ///
    /// Returns `true` if a pending value was replaced.
    pub fn schedule(&mut self, key: K, value: V, now: MonotonicInstant) -> bool {
        let due = now + self.window;
        self.pending.insert(key, Pending { value, due }).is_some()
    }

    /// Drop the pending value for `key`. Calling this for an idle key is a no-op.
    pub fn cancel(&mut self, key: &K) -> Option<V> {
        self.pending.remove(key).map(|p| p.value)
    }

    pub fn is_pending(&self, key: &K) -> bool {
        self.pending.contains_key(key)
    }

    /// Remove and return every entry whose deadline has passed, oldest first
    pub fn take_due(&mut self, now: MonotonicInstant) -> Vec<(K, V)> {
        let due_keys: Vec<K> = self
            .pending
            .iter()
            .filter(|(_, p)| p.due <= now)
            .map(|(k, _)| k.clone())
            .collect();

        let mut due: Vec<(MonotonicInstant, K, V)> = due_keys
            .into_iter()
            .filter_map(|k| self.pending.remove(&k).map(|p| (p.due, k, p.value)))
            .collect();
        due.sort_by_key(|(at, _, _)| *at);

        due.into_iter().map(|(_, k, v)| (k, v)).collect()
    }

    /// Earliest pending deadline, if any
    pub fn next_due(&self) -> Option<MonotonicInstant> {
        self.pending.values().map(|p| p.due).min()
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}

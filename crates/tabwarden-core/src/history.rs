//! Per-tab navigation history

use std::collections::{HashMap, VecDeque};
use tabwarden_util::TabId;

/// Last few main-frame URLs of each tab
#[derive(Debug)]
pub struct NavigationHistory {
    capacity: usize,
    tabs: HashMap<TabId, VecDeque<String>>,
}

impl NavigationHistory {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            tabs: HashMap::new(),
        }
    }

    /// Append a URL; repeating the latest URL is ignored
    pub fn record(&mut self, tab_id: TabId, url: &str) {
        let urls = self.tabs.entry(tab_id).or_default();
        if urls.back().is_some_and(|last| last == url) {
            return;
        }
        urls.push_back(url.to_string());
        while urls.len() > self.capacity {
            urls.pop_front();
        }
    }

    /// Most recent URL other than `current`
    ///
    /// Commit events and URL updates arrive in either order, so the newest
    /// recorded URL may already be `current`.
    pub fn previous(&self, tab_id: TabId, current: &str) -> Option<&str> {
        self.tabs
            .get(&tab_id)?
            .iter()
            .rev()
            .find(|url| url.as_str() != current)
            .map(String::as_str)
    }

    pub fn forget(&mut self, tab_id: TabId) {
        self.tabs.remove(&tab_id);
    }

    pub fn tracked_tabs(&self) -> usize {
        self.tabs.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TAB: TabId = TabId::new(1);

    #[test]
    fn previous_skips_current_url() {
        let mut history = NavigationHistory::new(2);
        history.record(TAB, "https://www.google.com/search?q=rust");
        history.record(TAB, "https://reddit.com/r/rust");

        assert_eq!(
            history.previous(TAB, "https://reddit.com/r/rust"),
            Some("https://www.google.com/search?q=rust")
        );
        // Commit for the new URL not seen yet
        assert_eq!(
            history.previous(TAB, "https://x.com/"),
            Some("https://reddit.com/r/rust")
        );
    }

    #[test]
    fn bounded_to_capacity() {
        let mut history = NavigationHistory::new(2);
        history.record(TAB, "a");
        history.record(TAB, "b");
        history.record(TAB, "c");

        assert_eq!(history.previous(TAB, "c"), Some("b"));
        assert_eq!(history.previous(TAB, "b"), Some("c"));
        assert_eq!(history.previous(TAB, "zzz"), Some("c"));
    }

    #[test]
    fn consecutive_duplicates_collapse() {
        let mut history = NavigationHistory::new(2);
        history.record(TAB, "a");
        history.record(TAB, "b");
        history.record(TAB, "b");

        assert_eq!(history.previous(TAB, "b"), Some("a"));
    }

    #[test]
    fn forget_and_unknown_tab() {
        let mut history = NavigationHistory::new(2);
        history.record(TAB, "a");
        history.forget(TAB);

        assert_eq!(history.previous(TAB, "b"), None);
        assert_eq!(history.previous(TabId::new(99), "b"), None);
        assert_eq!(history.tracked_tabs(), 0);
    }
}

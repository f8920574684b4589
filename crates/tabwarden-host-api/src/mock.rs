//! Mock browser for testing

use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};
use tabwarden_api::{DisplayMessage, TabInfo};
use tabwarden_util::TabId;
use tokio::sync::mpsc;

use crate::{BrowserHost, HostError, HostEvent, HostResult};

/// In-memory browser for unit/integration testing
///
/// Tabs are kept in id order. Closing a tab through [`BrowserHost::remove_tabs`]
/// emits `TabRemoved` the way a real browser fires `tabs.onRemoved`.
pub struct MockBrowser {
    tabs: Arc<Mutex<BTreeMap<TabId, Option<String>>>>,
    removed: Arc<Mutex<Vec<TabId>>>,
    injected: Arc<Mutex<Vec<TabId>>>,
    displays: Arc<Mutex<Vec<(TabId, DisplayMessage)>>>,
    badges: Arc<Mutex<Vec<String>>>,
    event_tx: mpsc::UnboundedSender<HostEvent>,
    event_rx: Arc<Mutex<Option<mpsc::UnboundedReceiver<HostEvent>>>>,

    /// Configure remove to fail
    pub fail_remove: Arc<Mutex<bool>>,

    /// Configure banner injection to fail
    pub fail_inject: Arc<Mutex<bool>>,
}

impl MockBrowser {
    pub fn new() -> Self {
        let (tx, rx) = mpsc::unbounded_channel();

        Self {
            tabs: Arc::new(Mutex::new(BTreeMap::new())),
            removed: Arc::new(Mutex::new(Vec::new())),
            injected: Arc::new(Mutex::new(Vec::new())),
            displays: Arc::new(Mutex::new(Vec::new())),
            badges: Arc::new(Mutex::new(Vec::new())),
            event_tx: tx,
            event_rx: Arc::new(Mutex::new(Some(rx))),
            fail_remove: Arc::new(Mutex::new(false)),
            fail_inject: Arc::new(Mutex::new(false)),
        }
    }

    /// Open a tab without emitting any event
    pub fn insert_tab(&self, tab_id: TabId, url: impl Into<String>) {
        self.tabs.lock().unwrap().insert(tab_id, Some(url.into()));
    }

    /// Simulate the user navigating a tab: updates it and emits the
    /// main-frame commit followed by the URL update
    pub fn simulate_navigation(&self, tab_id: TabId, url: impl Into<String>) {
        let url = url.into();
        self.tabs.lock().unwrap().insert(tab_id, Some(url.clone()));
        let _ = self.event_tx.send(HostEvent::NavigationCommitted {
            tab_id,
            url: url.clone(),
            frame_id: 0,
        });
        let _ = self.event_tx.send(HostEvent::TabUpdated { tab_id, url });
    }

    /// Simulate the user closing a tab
    pub fn simulate_close(&self, tab_id: TabId) {
        if self.tabs.lock().unwrap().remove(&tab_id).is_some() {
            let _ = self.event_tx.send(HostEvent::TabRemoved { tab_id });
        }
    }

    /// Ids of tabs still open
    pub fn open_tabs(&self) -> Vec<TabId> {
        self.tabs.lock().unwrap().keys().copied().collect()
    }

    /// Tabs closed through `remove_tabs`, in order
    pub fn removed_tabs(&self) -> Vec<TabId> {
        self.removed.lock().unwrap().clone()
    }

    /// Tabs the banner was injected into
    pub fn injected_tabs(&self) -> Vec<TabId> {
        self.injected.lock().unwrap().clone()
    }

    /// Banner messages sent, in order
    pub fn display_messages(&self) -> Vec<(TabId, DisplayMessage)> {
        self.displays.lock().unwrap().clone()
    }

    /// Most recent badge text
    pub fn last_badge(&self) -> Option<String> {
        self.badges.lock().unwrap().last().cloned()
    }
}

impl Default for MockBrowser {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl BrowserHost for MockBrowser {
    async fn list_tabs(&self) -> HostResult<Vec<TabInfo>> {
        Ok(self
            .tabs
            .lock()
            .unwrap()
            .iter()
            .map(|(id, url)| TabInfo {
                tab_id: *id,
                url: url.clone(),
            })
            .collect())
    }

    async fn get_tab(&self, tab_id: TabId) -> HostResult<Option<TabInfo>> {
        Ok(self.tabs.lock().unwrap().get(&tab_id).map(|url| TabInfo {
            tab_id,
            url: url.clone(),
        }))
    }

    async fn remove_tabs(&self, tab_ids: &[TabId]) -> HostResult<()> {
        if *self.fail_remove.lock().unwrap() {
            return Err(HostError::OperationFailed("Mock remove failure".into()));
        }

        let mut tabs = self.tabs.lock().unwrap();
        if let Some(missing) = tab_ids.iter().find(|id| !tabs.contains_key(*id)) {
            return Err(HostError::TabNotFound(*missing));
        }

        for tab_id in tab_ids {
            tabs.remove(tab_id);
            self.removed.lock().unwrap().push(*tab_id);
            let _ = self.event_tx.send(HostEvent::TabRemoved { tab_id: *tab_id });
        }
        Ok(())
    }

    async fn inject_display(&self, tab_id: TabId) -> HostResult<()> {
        if *self.fail_inject.lock().unwrap() {
            return Err(HostError::OperationFailed("Mock inject failure".into()));
        }
        if !self.tabs.lock().unwrap().contains_key(&tab_id) {
            return Err(HostError::TabNotFound(tab_id));
        }
        self.injected.lock().unwrap().push(tab_id);
        Ok(())
    }

    async fn send_display(&self, tab_id: TabId, message: DisplayMessage) -> HostResult<()> {
        if !self.tabs.lock().unwrap().contains_key(&tab_id) {
            return Err(HostError::TabNotFound(tab_id));
        }
        self.displays.lock().unwrap().push((tab_id, message));
        Ok(())
    }

    async fn set_badge(&self, text: &str) -> HostResult<()> {
        self.badges.lock().unwrap().push(text.to_string());
        Ok(())
    }

    fn subscribe(&self) -> mpsc::UnboundedReceiver<HostEvent> {
        self.event_rx
            .lock()
            .unwrap()
            .take()
            .expect("subscribe() can only be called once")
    }
}

//! Browser host traits

use async_trait::async_trait;
use tabwarden_api::{DisplayMessage, TabInfo};
use tabwarden_util::TabId;
use thiserror::Error;
use tokio::sync::mpsc;

/// Errors from browser operations
#[derive(Debug, Error)]
pub enum HostError {
    #[error("Tab not found: {0}")]
    TabNotFound(TabId),

    #[error("Browser operation failed: {0}")]
    OperationFailed(String),

    #[error("Browser did not reply within {0:?}")]
    Timeout(std::time::Duration),

    #[error("Browser disconnected")]
    Disconnected,

    #[error("Internal error: {0}")]
    Internal(String),
}

pub type HostResult<T> = Result<T, HostError>;

/// Events from the browser
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HostEvent {
    /// A tab's URL changed
    TabUpdated { tab_id: TabId, url: String },

    /// A tab was closed, by anyone
    TabRemoved { tab_id: TabId },

    /// A navigation committed in some frame of a tab; `frame_id == 0` is the main frame
    NavigationCommitted {
        tab_id: TabId,
        url: String,
        frame_id: i64,
    },
}

/// Tab actuator - implemented by the native-messaging host and by [`crate::MockBrowser`]
///
/// Every call may race with the user closing tabs; callers treat
/// [`HostError::TabNotFound`] as a no-op.
#[async_trait]
pub trait BrowserHost: Send + Sync {
    /// Enumerate all open tabs
    async fn list_tabs(&self) -> HostResult<Vec<TabInfo>>;

    /// Look up a single tab; `None` if it no longer exists
    async fn get_tab(&self, tab_id: TabId) -> HostResult<Option<TabInfo>>;

    /// Close tabs by id
    async fn remove_tabs(&self, tab_ids: &[TabId]) -> HostResult<()>;

    /// Inject the countdown banner into a tab
    async fn inject_display(&self, tab_id: TabId) -> HostResult<()>;

    /// Send a message to the banner in a tab
    async fn send_display(&self, tab_id: TabId, message: DisplayMessage) -> HostResult<()>;

    /// Set the toolbar badge text
    async fn set_badge(&self, text: &str) -> HostResult<()>;

    /// Subscribe to browser events
    fn subscribe(&self) -> mpsc::UnboundedReceiver<HostEvent>;

    /// Optional: check if the browser connection is healthy
    fn is_healthy(&self) -> bool {
        true
    }
}

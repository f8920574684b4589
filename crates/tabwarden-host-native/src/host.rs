//! Native-messaging host adapter implementation

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tabwarden_api::{DisplayMessage, InboundFrame, OutboundFrame, TabInfo};
use tabwarden_host_api::{BrowserHost, HostError, HostEvent, HostResult};
use tabwarden_ipc::OutboundSender;
use tabwarden_util::TabId;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, warn};

/// How long a query waits for the extension before failing
pub const DEFAULT_REPLY_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug)]
enum Reply {
    Tabs(Vec<TabInfo>),
    Tab(Option<TabInfo>),
    Ack,
    Failed(String),
}

type PendingMap = Arc<Mutex<HashMap<u64, oneshot::Sender<Reply>>>>;

fn lock(pending: &PendingMap) -> MutexGuard<'_, HashMap<u64, oneshot::Sender<Reply>>> {
    pending.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Browser host backed by the extension
pub struct NativeBrowserHost {
    outbound: OutboundSender,
    pending: PendingMap,
    next_query_id: AtomicU64,
    connected: Arc<AtomicBool>,
    event_rx: Mutex<Option<mpsc::UnboundedReceiver<HostEvent>>>,
    reply_timeout: Duration,
}

impl NativeBrowserHost {
    /// Create the host and start dispatching inbound frames.
    ///
    /// Must be called from within a tokio runtime.
    pub fn new(outbound: OutboundSender, frames: mpsc::UnboundedReceiver<InboundFrame>) -> Self {
        let pending: PendingMap = Arc::new(Mutex::new(HashMap::new()));
        let connected = Arc::new(AtomicBool::new(true));
        let (event_tx, event_rx) = mpsc::unbounded_channel();

        tokio::spawn(dispatch(frames, pending.clone(), event_tx, connected.clone()));

        Self {
            outbound,
            pending,
            next_query_id: AtomicU64::new(1),
            connected,
            event_rx: Mutex::new(Some(event_rx)),
            reply_timeout: DEFAULT_REPLY_TIMEOUT,
        }
    }

    pub fn with_reply_timeout(mut self, timeout: Duration) -> Self {
        self.reply_timeout = timeout;
        self
    }

    /// Number of queries still waiting for a reply
    pub fn pending_queries(&self) -> usize {
        lock(&self.pending).len()
    }

    async fn query(&self, build: impl FnOnce(u64) -> OutboundFrame) -> HostResult<Reply> {
        let query_id = self.next_query_id.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = oneshot::channel();
        lock(&self.pending).insert(query_id, tx);

        // The dispatcher marks the host disconnected before draining `pending`
        if !self.connected.load(Ordering::SeqCst) || self.outbound.send(build(query_id)).is_err() {
            lock(&self.pending).remove(&query_id);
            return Err(HostError::Disconnected);
        }

        match tokio::time::timeout(self.reply_timeout, rx).await {
            Ok(Ok(reply)) => Ok(reply),
            // Dispatcher dropped the sender: the extension went away
            Ok(Err(_)) => Err(HostError::Disconnected),
            Err(_) => {
                lock(&self.pending).remove(&query_id);
                warn!(query_id, timeout = ?self.reply_timeout, "Extension did not reply");
                Err(HostError::Timeout(self.reply_timeout))
            }
        }
    }

    async fn expect_ack(&self, build: impl FnOnce(u64) -> OutboundFrame) -> HostResult<()> {
        match self.query(build).await? {
            Reply::Ack => Ok(()),
            Reply::Failed(message) => Err(HostError::OperationFailed(message)),
            other => Err(unexpected(other)),
        }
    }

    fn post(&self, frame: OutboundFrame) -> HostResult<()> {
        self.outbound
            .send(frame)
            .map_err(|_| HostError::Disconnected)
    }
}

fn unexpected(reply: Reply) -> HostError {
    HostError::Internal(format!("unexpected reply: {:?}", reply))
}

async fn dispatch(
    mut frames: mpsc::UnboundedReceiver<InboundFrame>,
    pending: PendingMap,
    event_tx: mpsc::UnboundedSender<HostEvent>,
    connected: Arc<AtomicBool>,
) {
    while let Some(frame) = frames.recv().await {
        let (query_id, reply) = match frame {
            InboundFrame::TabUpdated { tab_id, url } => {
                let _ = event_tx.send(HostEvent::TabUpdated { tab_id, url });
                continue;
            }
            InboundFrame::TabRemoved { tab_id } => {
                let _ = event_tx.send(HostEvent::TabRemoved { tab_id });
                continue;
            }
            InboundFrame::NavigationCommitted {
                tab_id,
                url,
                frame_id,
            } => {
                let _ = event_tx.send(HostEvent::NavigationCommitted {
                    tab_id,
                    url,
                    frame_id,
                });
                continue;
            }
            InboundFrame::Tabs { query_id, tabs } => (query_id, Reply::Tabs(tabs)),
            InboundFrame::Tab { query_id, tab } => (query_id, Reply::Tab(tab)),
            InboundFrame::Ack { query_id } => (query_id, Reply::Ack),
            InboundFrame::OperationFailed { query_id, message } => {
                (query_id, Reply::Failed(message))
            }
            InboundFrame::Request { request } => {
                debug!(request_id = request.request_id, "Ignoring request routed to host");
                continue;
            }
        };

        match lock(&pending).remove(&query_id) {
            Some(tx) => {
                let _ = tx.send(reply);
            }
            None => debug!(query_id, "Reply for unknown or timed-out query"),
        }
    }

    info!("Extension connection closed");
    connected.store(false, Ordering::SeqCst);
    lock(&pending).clear();
}

#[async_trait]
impl BrowserHost for NativeBrowserHost {
    async fn list_tabs(&self) -> HostResult<Vec<TabInfo>> {
        match self.query(|query_id| OutboundFrame::QueryTabs { query_id }).await? {
            Reply::Tabs(tabs) => Ok(tabs),
            Reply::Failed(message) => Err(HostError::OperationFailed(message)),
            other => Err(unexpected(other)),
        }
    }

    async fn get_tab(&self, tab_id: TabId) -> HostResult<Option<TabInfo>> {
        match self
            .query(|query_id| OutboundFrame::GetTab { query_id, tab_id })
            .await?
        {
            Reply::Tab(tab) => Ok(tab),
            Reply::Failed(message) => Err(HostError::OperationFailed(message)),
            other => Err(unexpected(other)),
        }
    }

    async fn remove_tabs(&self, tab_ids: &[TabId]) -> HostResult<()> {
        if tab_ids.is_empty() {
            return Ok(());
        }
        let tab_ids = tab_ids.to_vec();
        self.expect_ack(|query_id| OutboundFrame::RemoveTabs { query_id, tab_ids })
            .await
    }

    async fn inject_display(&self, tab_id: TabId) -> HostResult<()> {
        self.expect_ack(|query_id| OutboundFrame::InjectDisplay { query_id, tab_id })
            .await
    }

    async fn send_display(&self, tab_id: TabId, message: DisplayMessage) -> HostResult<()> {
        self.post(OutboundFrame::Display { tab_id, message })
    }

    async fn set_badge(&self, text: &str) -> HostResult<()> {
        self.post(OutboundFrame::Badge {
            text: text.to_string(),
        })
    }

    fn subscribe(&self) -> mpsc::UnboundedReceiver<HostEvent> {
        let taken = self
            .event_rx
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .take();

        taken.unwrap_or_else(|| {
            warn!("Host events already subscribed; returning a closed receiver");
            mpsc::unbounded_channel().1
        })
    }

    fn is_healthy(&self) -> bool {
        self.connected.load(Ordering::SeqCst) && !self.outbound.is_closed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Harness {
        host: NativeBrowserHost,
        outbound_rx: mpsc::UnboundedReceiver<OutboundFrame>,
        inbound_tx: mpsc::UnboundedSender<InboundFrame>,
    }

    fn harness() -> Harness {
        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
        let (inbound_tx, inbound_rx) = mpsc::unbounded_channel();
        Harness {
            host: NativeBrowserHost::new(outbound_tx, inbound_rx),
            outbound_rx,
            inbound_tx,
        }
    }

    /// Answer every query like an extension with a fixed set of tabs
    fn spawn_extension(
        mut outbound_rx: mpsc::UnboundedReceiver<OutboundFrame>,
        inbound_tx: mpsc::UnboundedSender<InboundFrame>,
        tabs: Vec<TabInfo>,
    ) {
        tokio::spawn(async move {
            while let Some(frame) = outbound_rx.recv().await {
                let reply = match frame {
                    OutboundFrame::QueryTabs { query_id } => InboundFrame::Tabs {
                        query_id,
                        tabs: tabs.clone(),
                    },
                    OutboundFrame::GetTab { query_id, tab_id } => InboundFrame::Tab {
                        query_id,
                        tab: tabs.iter().find(|t| t.tab_id == tab_id).cloned(),
                    },
                    OutboundFrame::RemoveTabs { query_id, tab_ids } => {
                        if tab_ids.iter().all(|id| tabs.iter().any(|t| t.tab_id == *id)) {
                            InboundFrame::Ack { query_id }
                        } else {
                            InboundFrame::OperationFailed {
                                query_id,
                                message: "No tab with id".into(),
                            }
                        }
                    }
                    OutboundFrame::InjectDisplay { query_id, .. } => InboundFrame::Ack { query_id },
                    _ => continue,
                };
                let _ = inbound_tx.send(reply);
            }
        });
    }

    #[tokio::test]
    async fn test_queries_are_correlated() {
        let Harness {
            host,
            outbound_rx,
            inbound_tx,
        } = harness();
        let tabs = vec![
            TabInfo::new(TabId::new(1), "https://reddit.com/"),
            TabInfo::new(TabId::new(2), "https://example.org/"),
        ];
        spawn_extension(outbound_rx, inbound_tx, tabs.clone());

        assert_eq!(host.list_tabs().await.unwrap().len(), 2);
        assert_eq!(host.get_tab(TabId::new(2)).await.unwrap(), Some(tabs[1].clone()));
        assert_eq!(host.get_tab(TabId::new(9)).await.unwrap(), None);
        host.inject_display(TabId::new(1)).await.unwrap();
        assert_eq!(host.pending_queries(), 0);
    }

    #[tokio::test]
    async fn test_remove_failure_is_reported() {
        let Harness {
            host,
            outbound_rx,
            inbound_tx,
        } = harness();
        spawn_extension(
            outbound_rx,
            inbound_tx,
            vec![TabInfo::new(TabId::new(1), "https://reddit.com/")],
        );

        host.remove_tabs(&[TabId::new(1)]).await.unwrap();
        let result = host.remove_tabs(&[TabId::new(1), TabId::new(5)]).await;
        assert!(matches!(result, Err(HostError::OperationFailed(_))));
    }

    #[tokio::test]
    async fn test_unanswered_query_times_out() {
        let Harness {
            host,
            mut outbound_rx,
            inbound_tx: _inbound_tx,
        } = harness();
        let host = host.with_reply_timeout(Duration::from_millis(50));

        let result = host.list_tabs().await;
        assert!(matches!(result, Err(HostError::Timeout(_))));
        assert_eq!(host.pending_queries(), 0);
        assert!(matches!(
            outbound_rx.recv().await,
            Some(OutboundFrame::QueryTabs { .. })
        ));
    }

    #[tokio::test]
    async fn test_tab_events_are_forwarded() {
        let Harness {
            host,
            outbound_rx: _outbound_rx,
            inbound_tx,
        } = harness();
        let mut events = host.subscribe();

        inbound_tx
            .send(InboundFrame::NavigationCommitted {
                tab_id: TabId::new(4),
                url: "https://reddit.com/".into(),
                frame_id: 0,
            })
            .unwrap();
        inbound_tx
            .send(InboundFrame::TabRemoved {
                tab_id: TabId::new(4),
            })
            .unwrap();

        assert_eq!(
            events.recv().await.unwrap(),
            HostEvent::NavigationCommitted {
                tab_id: TabId::new(4),
                url: "https://reddit.com/".into(),
                frame_id: 0,
            }
        );
        assert_eq!(
            events.recv().await.unwrap(),
            HostEvent::TabRemoved {
                tab_id: TabId::new(4)
            }
        );
    }

    #[tokio::test]
    async fn test_fire_and_forget_frames() {
        let Harness {
            host,
            mut outbound_rx,
            inbound_tx: _inbound_tx,
        } = harness();

        host.set_badge("5m").await.unwrap();
        host.send_display(TabId::new(1), DisplayMessage::HideTimer)
            .await
            .unwrap();
        host.remove_tabs(&[]).await.unwrap();

        assert!(matches!(
            outbound_rx.recv().await,
            Some(OutboundFrame::Badge { ref text }) if text == "5m"
        ));
        assert!(matches!(
            outbound_rx.recv().await,
            Some(OutboundFrame::Display { message: DisplayMessage::HideTimer, .. })
        ));
        assert!(outbound_rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_disconnect_fails_pending_queries() {
        let Harness {
            host,
            outbound_rx: _outbound_rx,
            inbound_tx,
        } = harness();
        assert!(host.is_healthy());

        drop(inbound_tx);
        let result = host.list_tabs().await;

        assert!(matches!(result, Err(HostError::Disconnected)));
        assert!(!host.is_healthy());
    }
}

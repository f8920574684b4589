//! Service glue between the core engine and the browser
//!
//! The engine decides; this module carries out its [`CoreEvent`]s against the
//! [`BrowserHost`] and reports tab closures back to it.

use chrono::{DateTime, Local};
use std::collections::VecDeque;
use std::sync::Arc;
use tabwarden_api::{
    API_VERSION, Command, DisplayMessage, ErrorCode, ErrorInfo, HealthStatus, Request, Response,
    ResponsePayload, TimerMode,
};
use tabwarden_core::{CoreEngine, CoreEvent};
use tabwarden_host_api::{BrowserHost, HostEvent};
use tabwarden_store::Store;
use tabwarden_util::{MonotonicInstant, TabId};
use tracing::{debug, info, warn};

/// How closing an expired timer's tab went
enum CloseOutcome {
    Closed,
    /// Someone else closed it first
    Vanished,
    Failed(String),
}

/// Main service state
pub struct Service {
    engine: CoreEngine,
    host: Arc<dyn BrowserHost>,
    store: Arc<dyn Store>,
}

impl Service {
    pub fn new(engine: CoreEngine, host: Arc<dyn BrowserHost>, store: Arc<dyn Store>) -> Self {
        Self {
            engine,
            host,
            store,
        }
    }

    pub fn engine(&self) -> &CoreEngine {
        &self.engine
    }

    pub async fn tick(&mut self, now_mono: MonotonicInstant, now: DateTime<Local>) {
        let events = self.engine.tick(now_mono, now);
        self.apply(events, now).await;
    }

    pub async fn maintenance(&mut self, now: DateTime<Local>) {
        let events = self.engine.maintenance(now);
        self.apply(events, now).await;
    }

    pub async fn handle_host_event(
        &mut self,
        event: HostEvent,
        now_mono: MonotonicInstant,
        now: DateTime<Local>,
    ) {
        match event {
            HostEvent::TabUpdated { tab_id, url } => {
                self.engine.on_url_changed(tab_id, url, now_mono);
            }
            HostEvent::NavigationCommitted {
                tab_id,
                url,
                frame_id,
            } => {
                self.engine.on_navigation_committed(tab_id, &url, frame_id);
            }
            HostEvent::TabRemoved { tab_id } => {
                let events = self.engine.on_tab_removed(tab_id, now);
                self.apply(events, now).await;
            }
        }
    }

    pub fn handle_request(
        &mut self,
        request: Request,
        now_mono: MonotonicInstant,
        now: DateTime<Local>,
    ) -> Response {
        let request_id = request.request_id;

        if request.api_version != API_VERSION {
            return Response::error(
                request_id,
                ErrorInfo::new(
                    ErrorCode::UnsupportedVersion,
                    format!(
                        "API version {} not supported, expected {}",
                        request.api_version, API_VERSION
                    ),
                ),
            );
        }

        match request.command {
            Command::AddBlacklistSite { site } => {
                let payload = match self.engine.add_blacklist_site(&site) {
                    Ok(_) => ResponsePayload::SiteAdded {
                        success: true,
                        error: None,
                    },
                    Err(e) => {
                        debug!(site = %site, error = %e, "Blacklist site rejected");
                        ResponsePayload::SiteAdded {
                            success: false,
                            error: Some(e.to_string()),
                        }
                    }
                };
                Response::success(request_id, payload)
            }

            Command::CalculateReductionFactor => Response::success(
                request_id,
                ResponsePayload::ReductionFactor {
                    reduction_factor: self.engine.calculate_reduction_factor(now),
                },
            ),

            Command::GetState => Response::success(
                request_id,
                ResponsePayload::State(self.engine.get_state(now_mono)),
            ),

            Command::GetHealth => Response::success(
                request_id,
                ResponsePayload::Health(HealthStatus {
                    live: true,
                    store_ok: self.store.is_healthy(),
                    host_ok: self.host.is_healthy(),
                }),
            ),

            Command::Ping => Response::success(request_id, ResponsePayload::Pong),
        }
    }

    pub fn shutdown(&mut self) {
        self.engine.shutdown();
    }

    async fn apply(&mut self, events: Vec<CoreEvent>, now: DateTime<Local>) {
        let mut queue: VecDeque<CoreEvent> = events.into();

        while let Some(event) = queue.pop_front() {
            match event {
                CoreEvent::TimerStarted {
                    tab_id,
                    mode,
                    budget_remaining_secs,
                    ..
                } => {
                    if mode == TimerMode::Active {
                        self.show_banner(tab_id, budget_remaining_secs).await;
                    }
                }

                CoreEvent::DisplayUpdate { tab_id, time_left } => {
                    self.send_display(tab_id, DisplayMessage::UpdateTimer { time_left })
                        .await;
                }

                CoreEvent::HideDisplay { tab_id } => {
                    self.send_display(tab_id, DisplayMessage::HideTimer).await;
                }

                CoreEvent::ExpireDue {
                    tab_id,
                    timer_id,
                    reason,
                } => {
                    let followups = match self.close_tab(tab_id).await {
                        CloseOutcome::Closed => {
                            info!(tab_id = %tab_id, reason = ?reason, "Closed distracting tab");
                            self.engine.notify_closed_by_timer(tab_id, timer_id, now)
                        }
                        CloseOutcome::Vanished => {
                            self.engine.notify_tab_vanished(tab_id, timer_id, now)
                        }
                        CloseOutcome::Failed(message) => {
                            self.engine
                                .abort_timer_close(tab_id, timer_id, &message, now)
                        }
                    };
                    queue.extend(followups);
                }

                CoreEvent::TimerStopped {
                    tab_id,
                    timer_id,
                    reason,
                } => {
                    debug!(tab_id = %tab_id, timer_id = %timer_id, reason = ?reason, "Timer stopped");
                }

                CoreEvent::CloseAllDue => {
                    let events = self.close_all_tabs(now).await;
                    queue.extend(events);
                }

                CoreEvent::CloseOtherDistracting { keep } => {
                    let events = self.close_other_distracting(keep, now).await;
                    queue.extend(events);
                }

                CoreEvent::BudgetReset { ceiling_secs } => {
                    info!(ceiling_secs, "Budget reset for the new day");
                    self.set_badge(&self.engine.badge_text()).await;
                }

                CoreEvent::BudgetExhausted => {
                    warn!("Daily budget exhausted, closing distracting tabs");
                }

                CoreEvent::BadgeUpdate { text } => {
                    self.set_badge(&text).await;
                }
            }
        }
    }

    async fn close_tab(&self, tab_id: TabId) -> CloseOutcome {
        match self.host.get_tab(tab_id).await {
            Ok(Some(_)) => {}
            Ok(None) => return CloseOutcome::Vanished,
            Err(e) => debug!(tab_id = %tab_id, error = %e, "Tab lookup failed, removing anyway"),
        }
        match self.host.remove_tabs(&[tab_id]).await {
            Ok(()) => CloseOutcome::Closed,
            Err(e) => CloseOutcome::Failed(e.to_string()),
        }
    }

    async fn show_banner(&self, tab_id: TabId, time_left: u64) {
        if let Err(e) = self.host.inject_display(tab_id).await {
            // Privileged pages reject injection; the timer still runs
            warn!(tab_id = %tab_id, error = %e, "Failed to inject countdown banner");
            return;
        }
        self.send_display(tab_id, DisplayMessage::UpdateTimer { time_left })
            .await;
    }

    async fn send_display(&self, tab_id: TabId, message: DisplayMessage) {
        if let Err(e) = self.host.send_display(tab_id, message).await {
            debug!(tab_id = %tab_id, error = %e, "Failed to update banner");
        }
    }

    async fn set_badge(&self, text: &str) {
        if let Err(e) = self.host.set_badge(text).await {
            debug!(error = %e, "Failed to set badge");
        }
    }

    async fn close_all_tabs(&mut self, now: DateTime<Local>) -> Vec<CoreEvent> {
        let tabs = match self.host.list_tabs().await {
            Ok(tabs) => tabs,
            Err(e) => {
                warn!(error = %e, "Failed to list tabs for close-all");
                return Vec::new();
            }
        };

        let tab_ids: Vec<TabId> = tabs.iter().map(|t| t.tab_id).collect();
        let events = self.engine.release_for_close(&tab_ids, now);

        info!(count = tab_ids.len(), "Closing all tabs");
        if let Err(e) = self.host.remove_tabs(&tab_ids).await {
            warn!(error = %e, "Failed to close all tabs");
        }
        events
    }

    async fn close_other_distracting(&mut self, keep: TabId, now: DateTime<Local>) -> Vec<CoreEvent> {
        let tabs = match self.host.list_tabs().await {
            Ok(tabs) => tabs,
            Err(e) => {
                warn!(error = %e, "Failed to list tabs");
                return Vec::new();
            }
        };

        let others = self.engine.other_distracting_tabs(keep, &tabs);
        if others.is_empty() {
            return Vec::new();
        }

        let events = self.engine.release_for_close(&others, now);
        info!(keep = %keep, count = others.len(), "Closing other distracting tabs");
        if let Err(e) = self.host.remove_tabs(&others).await {
            warn!(error = %e, "Failed to close other distracting tabs");
        }
        events
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use std::time::Duration;
    use tabwarden_config::Policy;
    use tabwarden_host_api::MockBrowser;
    use tabwarden_store::SqliteStore;
    use tokio::sync::mpsc;

    struct Harness {
        service: Service,
        mock: Arc<MockBrowser>,
        store: Arc<SqliteStore>,
        host_events: mpsc::UnboundedReceiver<HostEvent>,
        mono: MonotonicInstant,
        wall: DateTime<Local>,
    }

    impl Harness {
        fn new(policy: Policy, store: SqliteStore) -> Self {
            let wall = Local.with_ymd_and_hms(2025, 6, 2, 10, 0, 0).unwrap();
            let store = Arc::new(store);
            let mock = Arc::new(MockBrowser::new());
            let host_events = mock.subscribe();
            let engine = CoreEngine::new(policy, store.clone(), wall);

            Self {
                service: Service::new(engine, mock.clone(), store.clone()),
                mock,
                store,
                host_events,
                mono: MonotonicInstant::now(),
                wall,
            }
        }

        fn advance(&mut self, d: Duration) {
            self.mono = self.mono + d;
            self.wall = self.wall + chrono::Duration::from_std(d).unwrap();
        }

        /// Feed queued browser events to the service
        async fn pump(&mut self) {
            while let Ok(event) = self.host_events.try_recv() {
                self.service
                    .handle_host_event(event, self.mono, self.wall)
                    .await;
            }
        }

        async fn navigate(&mut self, tab: i64, url: &str) {
            self.mock.simulate_navigation(TabId::new(tab), url);
            self.pump().await;
            self.advance(Duration::from_millis(100));
            self.service.tick(self.mono, self.wall).await;
            self.pump().await;
        }

        async fn run_for(&mut self, secs: u64) {
            for _ in 0..secs {
                self.advance(Duration::from_secs(1));
                self.service.tick(self.mono, self.wall).await;
                self.pump().await;
            }
        }

        fn request(&mut self, command: Command) -> Response {
            self.service
                .handle_request(Request::new(1, command), self.mono, self.wall)
        }
    }

    fn policy() -> Policy {
        let mut policy = Policy::default();
        policy.service.rng_seed = Some(7);
        policy.default_sites = vec!["reddit.com".into()];
        policy
    }

    /// Store where the last distracting close just happened, so new
    /// timers get a one-second interval
    fn cooled_down_store(at: DateTime<Local>) -> SqliteStore {
        let store = SqliteStore::in_memory().unwrap();
        store.set_last_distracting_close(at).unwrap();
        store
    }

    fn harness_wall() -> DateTime<Local> {
        Local.with_ymd_and_hms(2025, 6, 2, 10, 0, 0).unwrap()
    }

    #[tokio::test]
    async fn test_active_timer_shows_banner() {
        let mut h = Harness::new(policy(), SqliteStore::in_memory().unwrap());

        h.navigate(1, "https://reddit.com/r/rust").await;
        h.run_for(2).await;

        assert_eq!(h.mock.injected_tabs(), vec![TabId::new(1)]);
        let displays = h.mock.display_messages();
        assert_eq!(
            displays.first(),
            Some(&(TabId::new(1), DisplayMessage::UpdateTimer { time_left: 1800 }))
        );
        assert_eq!(
            displays.last(),
            Some(&(TabId::new(1), DisplayMessage::UpdateTimer { time_left: 1798 }))
        );
    }

    #[tokio::test]
    async fn test_navigating_away_hides_banner() {
        let mut h = Harness::new(policy(), SqliteStore::in_memory().unwrap());

        h.navigate(1, "https://reddit.com/r/rust").await;
        h.navigate(1, "https://docs.rs/").await;

        assert_eq!(
            h.mock.display_messages().last(),
            Some(&(TabId::new(1), DisplayMessage::HideTimer))
        );
        assert_eq!(h.service.engine().tracked_tabs(), 0);
    }

    #[tokio::test]
    async fn test_expired_timer_closes_tab() {
        let mut h = Harness::new(policy(), cooled_down_store(harness_wall()));
        h.mock.insert_tab(TabId::new(2), "https://example.org/");

        h.navigate(1, "https://reddit.com/r/rust").await;
        h.run_for(1).await;

        assert_eq!(h.mock.removed_tabs(), vec![TabId::new(1)]);
        assert_eq!(h.mock.open_tabs(), vec![TabId::new(2)]);
        assert_eq!(h.service.engine().tracked_tabs(), 0);
        assert_eq!(h.store.get_last_distracting_close().unwrap(), Some(h.wall));
    }

    #[tokio::test]
    async fn test_failed_close_reaps_timer() {
        let mut h = Harness::new(policy(), cooled_down_store(harness_wall()));
        *h.mock.fail_remove.lock().unwrap() = true;

        h.navigate(1, "https://reddit.com/r/rust").await;
        h.run_for(1).await;

        assert!(h.mock.removed_tabs().is_empty());
        assert_eq!(h.mock.open_tabs(), vec![TabId::new(1)]);
        assert_eq!(h.service.engine().tracked_tabs(), 0);
    }

    #[tokio::test]
    async fn test_tab_closed_before_expiry_still_counts() {
        let mut h = Harness::new(policy(), cooled_down_store(harness_wall()));

        h.navigate(1, "https://reddit.com/r/rust").await;
        // The user closes it; the removal has not reached the service yet
        h.mock.simulate_close(TabId::new(1));
        h.advance(Duration::from_secs(1));
        h.service.tick(h.mono, h.wall).await;

        assert!(h.mock.removed_tabs().is_empty());
        assert_eq!(h.service.engine().tracked_tabs(), 0);
        assert_eq!(h.service.engine().last_distracting_close(), Some(h.wall));
        assert_eq!(h.store.get_last_distracting_close().unwrap(), Some(h.wall));

        h.pump().await;
        assert_eq!(h.service.engine().last_distracting_close(), Some(h.wall));
    }

    #[tokio::test]
    async fn test_close_all_after_timer_closure() {
        let store = cooled_down_store(harness_wall());
        store.set_close_probability(1.0).unwrap();
        store.set_last_probability_update(harness_wall()).unwrap();
        let mut h = Harness::new(policy(), store);
        h.mock.insert_tab(TabId::new(2), "https://example.org/");
        h.mock.insert_tab(TabId::new(3), "https://docs.rs/");

        h.navigate(1, "https://reddit.com/r/rust").await;
        h.run_for(1).await;

        assert!(h.mock.open_tabs().is_empty());
        assert_eq!(
            h.mock.removed_tabs(),
            vec![TabId::new(1), TabId::new(2), TabId::new(3)]
        );
    }

    #[tokio::test]
    async fn test_close_other_distracting_tabs() {
        let mut policy = policy();
        policy.behavior.close_other_distracting_tabs = true;
        let mut h = Harness::new(policy, SqliteStore::in_memory().unwrap());
        h.mock.insert_tab(TabId::new(5), "https://example.org/");

        h.navigate(1, "https://reddit.com/r/a").await;
        h.navigate(2, "https://reddit.com/r/b").await;

        assert_eq!(h.mock.removed_tabs(), vec![TabId::new(1)]);
        assert_eq!(h.mock.open_tabs(), vec![TabId::new(2), TabId::new(5)]);
        assert!(h.service.engine().timer(TabId::new(2)).is_some());
        assert!(h.service.engine().last_distracting_close().is_none());
    }

    #[tokio::test]
    async fn test_user_closing_tab_records_cooldown() {
        let mut h = Harness::new(policy(), SqliteStore::in_memory().unwrap());

        h.navigate(1, "https://reddit.com/r/rust").await;
        h.mock.simulate_close(TabId::new(1));
        h.pump().await;

        assert_eq!(h.service.engine().tracked_tabs(), 0);
        assert_eq!(h.service.engine().last_distracting_close(), Some(h.wall));
    }

    #[tokio::test]
    async fn test_maintenance_sets_badge() {
        let mut h = Harness::new(policy(), SqliteStore::in_memory().unwrap());

        h.service.maintenance(h.wall).await;
        assert_eq!(h.mock.last_badge(), Some("30m".to_string()));
    }

    #[tokio::test]
    async fn test_add_blacklist_site_request() {
        let mut h = Harness::new(policy(), SqliteStore::in_memory().unwrap());

        let response = h.request(Command::AddBlacklistSite {
            site: "youtube.com".into(),
        });
        assert!(matches!(
            response.result,
            tabwarden_api::ResponseResult::Ok(ResponsePayload::SiteAdded {
                success: true,
                error: None
            })
        ));

        let response = h.request(Command::AddBlacklistSite {
            site: "   ".into(),
        });
        assert!(matches!(
            response.result,
            tabwarden_api::ResponseResult::Ok(ResponsePayload::SiteAdded {
                success: false,
                error: Some(_)
            })
        ));
    }

    #[tokio::test]
    async fn test_health_and_state_requests() {
        let mut h = Harness::new(policy(), SqliteStore::in_memory().unwrap());

        match h.request(Command::GetHealth).result {
            tabwarden_api::ResponseResult::Ok(ResponsePayload::Health(health)) => {
                assert!(health.live);
                assert!(health.store_ok);
                assert!(health.host_ok);
            }
            other => panic!("unexpected result: {other:?}"),
        }

        match h.request(Command::GetState).result {
            tabwarden_api::ResponseResult::Ok(ResponsePayload::State(state)) => {
                assert_eq!(state.budget_remaining_secs, 1800);
                assert_eq!(state.blacklist, vec!["reddit.com".to_string()]);
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_rejects_unsupported_api_version() {
        let mut h = Harness::new(policy(), SqliteStore::in_memory().unwrap());
        let mut request = Request::new(9, Command::Ping);
        request.api_version = API_VERSION + 1;

        let response = h.service.handle_request(request, h.mono, h.wall);
        match response.result {
            tabwarden_api::ResponseResult::Err(e) => {
                assert_eq!(e.code, ErrorCode::UnsupportedVersion)
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }
}

//! Core engine

use chrono::{DateTime, Local};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tabwarden_api::{ServiceStateSnapshot, TabInfo, TimerEndReason, TimerMode, API_VERSION};
use tabwarden_config::Policy;
use tabwarden_store::{AuditEvent, AuditEventType, PersistedSettings, Store};
use tabwarden_util::{format_badge, format_duration, format_remaining, Debouncer, MonotonicInstant, TabId, TimerId};
use tracing::{debug, info, warn};

use crate::{AddSiteError, Blacklist, BudgetEngine, CoreEvent, DailyReset, NavigationHistory, TabTimerEntry};

/// The core engine
///
/// Owns every piece of mutable state: tracked tabs, navigation history,
/// pending debounces, the blacklist and the budget. All methods are
/// synchronous and take the current time explicitly; side effects on the
/// browser are returned as [`CoreEvent`]s.
pub struct CoreEngine {
    policy: Policy,
    store: Arc<dyn Store>,
    blacklist: Blacklist,
    timers: HashMap<TabId, TabTimerEntry>,
    history: NavigationHistory,
    /// Latest URL per tab, classified once the burst settles
    navigation: Debouncer<TabId, String>,
    /// Second distracting URL seen during a grace period
    grace_decisions: Debouncer<TabId, String>,
    budget: BudgetEngine,
    daily_reset: DailyReset,
}

impl CoreEngine {
    /// Create a new core engine, restoring persisted state
    pub fn new(policy: Policy, store: Arc<dyn Store>, now: DateTime<Local>) -> Self {
        let settings = PersistedSettings::load(store.as_ref());

        let blacklist = match &settings.blacklist {
            Some(sites) => Blacklist::new(sites.iter().cloned()),
            None => {
                let list = Blacklist::new(policy.default_sites.iter().cloned());
                if let Err(e) = store.set_blacklist(list.sites()) {
                    warn!(error = %e, "Failed to persist default blacklist");
                }
                list
            }
        };

        let budget = BudgetEngine::new(&policy, store.clone(), &settings, now);

        let mut engine = Self {
            history: NavigationHistory::new(policy.navigation.history_len),
            navigation: Debouncer::new(policy.navigation.debounce),
            grace_decisions: Debouncer::new(policy.grace.debounce),
            policy,
            store,
            blacklist,
            timers: HashMap::new(),
            budget,
            daily_reset: DailyReset::new(settings.last_reset),
        };

        if engine.daily_reset.is_due(now) {
            engine.run_daily_reset(now);
        } else if let Some(remaining) = settings.budget_remaining {
            engine.budget.restore_remaining(remaining);
        }

        engine.audit(AuditEventType::ServiceStarted);

        info!(
            blacklist_len = engine.blacklist.len(),
            budget_remaining_secs = engine.budget.remaining(),
            close_probability = engine.budget.close_probability(),
            "Core engine initialized"
        );

        engine
    }

    /// Get current policy
    pub fn policy(&self) -> &Policy {
        &self.policy
    }

    pub fn blacklist(&self) -> &Blacklist {
        &self.blacklist
    }

    pub fn budget_remaining(&self) -> u64 {
        self.budget.remaining()
    }

    pub fn close_probability(&self) -> f64 {
        self.budget.close_probability()
    }

    pub fn last_distracting_close(&self) -> Option<DateTime<Local>> {
        self.budget.last_distracting_close()
    }

    /// Timer tracking a tab, if any
    pub fn timer(&self, tab_id: TabId) -> Option<&TabTimerEntry> {
        self.timers.get(&tab_id)
    }

    pub fn tracked_tabs(&self) -> usize {
        self.timers.len()
    }

    fn audit(&self, event: AuditEventType) {
        let _ = self.store.append_audit(AuditEvent::new(event));
    }

    // Browser events

    /// A tab's URL changed. Classification happens on a later `tick`, once
    /// no further change arrived for the navigation debounce window.
    pub fn on_url_changed(&mut self, tab_id: TabId, url: impl Into<String>, now_mono: MonotonicInstant) {
        if self.navigation.schedule(tab_id, url.into(), now_mono) {
            debug!(tab_id = %tab_id, "Superseded pending navigation");
        }
    }

    /// A navigation committed; only main-frame commits feed the history
    pub fn on_navigation_committed(&mut self, tab_id: TabId, url: &str, frame_id: i64) {
        if frame_id != 0 {
            return;
        }
        self.history.record(tab_id, url);
    }

    /// A tab was closed, by anyone
    pub fn on_tab_removed(&mut self, tab_id: TabId, now: DateTime<Local>) -> Vec<CoreEvent> {
        self.navigation.cancel(&tab_id);
        self.grace_decisions.cancel(&tab_id);
        self.history.forget(tab_id);

        let Some(entry) = self.timers.remove(&tab_id) else {
            debug!(tab_id = %tab_id, "Untracked tab removed");
            return Vec::new();
        };

        let reason = match entry.mode {
            TimerMode::GracePeriod => TimerEndReason::TabClosed,
            TimerMode::Active => {
                self.budget.record_distracting_close(now);
                TimerEndReason::TabClosed
            }
            // The timer's own close landed before its report
            TimerMode::Stopped => {
                self.budget.record_distracting_close(now);
                entry.end_reason().unwrap_or(TimerEndReason::Expired)
            }
        };

        info!(
            tab_id = %tab_id,
            timer_id = %entry.timer_id,
            mode = ?entry.mode,
            reason = ?reason,
            "Tracked tab removed"
        );

        vec![self.end_timer(&entry, reason, now)]
    }

    /// Advance time: fire due debounces, expire grace periods and charge
    /// Active timers against the budget
    pub fn tick(&mut self, now_mono: MonotonicInstant, now: DateTime<Local>) -> Vec<CoreEvent> {
        let mut events = Vec::new();

        for (tab_id, url) in self.navigation.take_due(now_mono) {
            events.extend(self.classify(tab_id, url, now, now_mono));
        }

        for (tab_id, url) in self.grace_decisions.take_due(now_mono) {
            events.extend(self.decide_grace(tab_id, url, now, now_mono));
        }

        self.budget.flush_probability_increase(now_mono, now);

        events.extend(self.expire_grace_periods(now_mono, now));
        events.extend(self.tick_active(now_mono));

        events
    }

    /// Periodic maintenance: daily reset, probability decay, reduction factor
    /// refresh, budget snapshot and badge
    pub fn maintenance(&mut self, now: DateTime<Local>) -> Vec<CoreEvent> {
        let mut events = Vec::new();

        if self.daily_reset.is_due(now) {
            events.push(self.run_daily_reset(now));
        }

        self.budget.apply_probability_cooldown(now);
        self.budget.reduction_factor(now);

        if self.budget.is_exhausted() {
            events.extend(self.force_stop_active(TimerEndReason::BudgetExhausted));
        }

        self.budget.persist_budget();
        events.push(CoreEvent::BadgeUpdate {
            text: self.badge_text(),
        });

        events
    }

    // Closure reports

    /// The tab of an expired timer was closed. Records the closure and rolls
    /// the close-all probability.
    pub fn notify_closed_by_timer(
        &mut self,
        tab_id: TabId,
        timer_id: TimerId,
        now: DateTime<Local>,
    ) -> Vec<CoreEvent> {
        let Some(entry) = self.take_stopped(tab_id, timer_id) else {
            debug!(tab_id = %tab_id, timer_id = %timer_id, "Stale closure report ignored");
            return Vec::new();
        };

        self.history.forget(tab_id);
        self.budget.record_distracting_close(now);

        let reason = entry.end_reason().unwrap_or(TimerEndReason::Expired);
        let mut events = vec![self.end_timer(&entry, reason, now)];

        if self.budget.roll_close_all() {
            let probability = self.budget.close_probability();
            self.audit(AuditEventType::CloseAllTabs { probability });
            info!(close_probability = probability, "Closing all tabs");
            events.push(CoreEvent::CloseAllDue);
        }

        events
    }

    /// Closing the tab of an expired timer failed; drop the entry
    pub fn abort_timer_close(
        &mut self,
        tab_id: TabId,
        timer_id: TimerId,
        error: &str,
        now: DateTime<Local>,
    ) -> Vec<CoreEvent> {
        let Some(entry) = self.take_stopped(tab_id, timer_id) else {
            return Vec::new();
        };

        warn!(tab_id = %tab_id, timer_id = %timer_id, error, "Timer close failed");
        vec![self.end_timer(&entry, TimerEndReason::CloseFailed, now)]
    }

    /// The tab of an expired timer was already gone when the close ran.
    /// It still counts as a distracting close, but nothing is rolled.
    pub fn notify_tab_vanished(
        &mut self,
        tab_id: TabId,
        timer_id: TimerId,
        now: DateTime<Local>,
    ) -> Vec<CoreEvent> {
        let Some(entry) = self.take_stopped(tab_id, timer_id) else {
            return Vec::new();
        };

        self.history.forget(tab_id);
        self.budget.record_distracting_close(now);
        debug!(tab_id = %tab_id, timer_id = %timer_id, "Tab closed before its timer could close it");
        vec![self.end_timer(&entry, TimerEndReason::TabClosed, now)]
    }

    fn take_stopped(&mut self, tab_id: TabId, timer_id: TimerId) -> Option<TabTimerEntry> {
        match self.timers.get(&tab_id) {
            Some(entry) if entry.timer_id == timer_id && entry.is_stopped() => {
                self.timers.remove(&tab_id)
            }
            _ => None,
        }
    }

    // Timer control

    /// Stop tracking a tab that left its distracting site. No-op for
    /// untracked tabs and for timers whose close is already underway.
    pub fn stop_timer(&mut self, tab_id: TabId, now: DateTime<Local>) -> Vec<CoreEvent> {
        self.grace_decisions.cancel(&tab_id);

        match self.timers.get(&tab_id) {
            Some(entry) if !entry.is_stopped() => {}
            _ => return Vec::new(),
        }
        let Some(entry) = self.timers.remove(&tab_id) else {
            return Vec::new();
        };

        let mut events = Vec::new();
        if entry.is_active() {
            self.budget.record_distracting_close(now);
            events.push(CoreEvent::HideDisplay { tab_id });
        }

        info!(tab_id = %tab_id, mode = ?entry.mode, "Navigated away from distracting site");
        events.push(self.end_timer(&entry, TimerEndReason::NavigatedAway, now));
        events
    }

    /// Open tabs other than `keep` whose URL is distracting
    pub fn other_distracting_tabs(&self, keep: TabId, tabs: &[TabInfo]) -> Vec<TabId> {
        tabs.iter()
            .filter(|tab| tab.tab_id != keep)
            .filter(|tab| tab.url.as_deref().is_some_and(|url| self.blacklist.is_distracting(url)))
            .map(|tab| tab.tab_id)
            .collect()
    }

    /// Drop the timers of tabs about to be closed alongside a timer closure.
    /// Their removal does not count as a new distracting close.
    pub fn release_for_close(&mut self, tab_ids: &[TabId], now: DateTime<Local>) -> Vec<CoreEvent> {
        let mut events = Vec::new();
        for tab_id in tab_ids {
            let releasable = self.timers.get(tab_id).is_some_and(|e| !e.is_stopped());
            if !releasable {
                continue;
            }
            if let Some(entry) = self.timers.remove(tab_id) {
                self.grace_decisions.cancel(tab_id);
                events.push(self.end_timer(&entry, TimerEndReason::ClosedWithOthers, now));
            }
        }
        events
    }

    // Popup commands

    /// Append a site to the blacklist and persist it
    pub fn add_blacklist_site(&mut self, site: &str) -> Result<String, AddSiteError> {
        let site = self.blacklist.add(site)?.to_string();

        if let Err(e) = self.store.set_blacklist(self.blacklist.sites()) {
            warn!(error = %e, "Failed to persist blacklist");
        }
        self.audit(AuditEventType::BlacklistSiteAdded { site: site.clone() });
        info!(site = %site, blacklist_len = self.blacklist.len(), "Blacklist site added");

        Ok(site)
    }

    pub fn calculate_reduction_factor(&mut self, now: DateTime<Local>) -> f64 {
        self.budget.reduction_factor(now)
    }

    /// Get current service state snapshot
    pub fn get_state(&self, now_mono: MonotonicInstant) -> ServiceStateSnapshot {
        let mut timers: Vec<_> = self.timers.values().map(|t| t.to_info(now_mono)).collect();
        timers.sort_by_key(|t| t.tab_id);

        ServiceStateSnapshot {
            api_version: API_VERSION,
            blacklist: self.blacklist.sites().to_vec(),
            budget_remaining_secs: self.budget.remaining(),
            budget_ceiling_secs: self.budget.ceiling(),
            budget_remaining_display: format_remaining(self.budget.remaining()),
            close_probability: self.budget.close_probability(),
            reduction_factor: self.budget.cached_reduction_factor(),
            timers,
        }
    }

    pub fn badge_text(&self) -> String {
        format_badge(self.budget.remaining())
    }

    /// Final snapshot before the process exits
    pub fn shutdown(&mut self) {
        self.budget.persist_budget();
        self.audit(AuditEventType::ServiceStopped);
        info!(
            budget_remaining_secs = self.budget.remaining(),
            tracked_tabs = self.timers.len(),
            "Core engine shut down"
        );
    }

    // State machine

    fn classify(
        &mut self,
        tab_id: TabId,
        url: String,
        now: DateTime<Local>,
        now_mono: MonotonicInstant,
    ) -> Vec<CoreEvent> {
        let distracting = self.blacklist.is_distracting(&url);
        let current = self.timers.get(&tab_id).map(|t| (t.mode, t.url == url));

        debug!(tab_id = %tab_id, url = %url, distracting, mode = ?current.map(|c| c.0), "Classifying navigation");

        match (distracting, current) {
            (true, None) => {
                if self.arrived_from_search(tab_id, &url) {
                    self.start_grace(tab_id, url, now, now_mono)
                } else {
                    self.start_active(tab_id, url, now, now_mono)
                }
            }
            (true, Some((TimerMode::GracePeriod, false))) => {
                self.grace_decisions.schedule(tab_id, url, now_mono);
                Vec::new()
            }
            // Same grace page, a running countdown, or a close underway
            (true, Some(_)) => Vec::new(),
            (false, Some((TimerMode::GracePeriod | TimerMode::Active, _))) => {
                self.stop_timer(tab_id, now)
            }
            (false, _) => Vec::new(),
        }
    }

    /// Whether the previous page was a search results page and the new URL
    /// is long enough to look like a specific result
    fn arrived_from_search(&self, tab_id: TabId, url: &str) -> bool {
        url.chars().count() > self.policy.grace.min_url_length
            && self
                .history
                .previous(tab_id, url)
                .is_some_and(|prev| self.policy.grace.is_search_context(prev))
    }

    fn start_active(
        &mut self,
        tab_id: TabId,
        url: String,
        now: DateTime<Local>,
        now_mono: MonotonicInstant,
    ) -> Vec<CoreEvent> {
        let interval = self.budget.compute_interval(now);
        let entry = TabTimerEntry::active(tab_id, url, interval, now, now_mono);
        self.grace_decisions.cancel(&tab_id);
        self.budget.schedule_probability_increase(now_mono);

        let mut events = vec![self.begin_timer(entry)];
        if self.policy.behavior.close_other_distracting_tabs {
            events.push(CoreEvent::CloseOtherDistracting { keep: tab_id });
        }
        events
    }

    fn start_grace(
        &mut self,
        tab_id: TabId,
        url: String,
        now: DateTime<Local>,
        now_mono: MonotonicInstant,
    ) -> Vec<CoreEvent> {
        let entry = TabTimerEntry::grace(tab_id, url, self.policy.grace.duration, now, now_mono);
        vec![self.begin_timer(entry)]
    }

    fn begin_timer(&mut self, entry: TabTimerEntry) -> CoreEvent {
        let time_limit_secs = entry.time_limit.as_secs();

        self.audit(AuditEventType::TimerStarted {
            tab_id: entry.tab_id,
            timer_id: entry.timer_id,
            mode: entry.mode,
            time_limit_secs,
        });

        info!(
            tab_id = %entry.tab_id,
            timer_id = %entry.timer_id,
            mode = ?entry.mode,
            time_limit_secs,
            url = %entry.url,
            "Timer started"
        );

        let event = CoreEvent::TimerStarted {
            tab_id: entry.tab_id,
            timer_id: entry.timer_id,
            mode: entry.mode,
            time_limit_secs,
            budget_remaining_secs: self.budget.remaining(),
        };
        self.timers.insert(entry.tab_id, entry);
        event
    }

    fn end_timer(&self, entry: &TabTimerEntry, reason: TimerEndReason, now: DateTime<Local>) -> CoreEvent {
        let elapsed_secs = (now - entry.started_at).num_seconds().max(0) as u64;
        debug!(
            tab_id = %entry.tab_id,
            reason = ?reason,
            ran_for = %format_duration(Duration::from_secs(elapsed_secs)),
            "Timer ended"
        );

        self.audit(AuditEventType::TimerEnded {
            tab_id: entry.tab_id,
            timer_id: entry.timer_id,
            reason,
            elapsed_secs,
        });

        CoreEvent::TimerStopped {
            tab_id: entry.tab_id,
            timer_id: entry.timer_id,
            reason,
        }
    }

    /// A second distracting URL settled during a grace period: start counting
    fn decide_grace(
        &mut self,
        tab_id: TabId,
        url: String,
        now: DateTime<Local>,
        now_mono: MonotonicInstant,
    ) -> Vec<CoreEvent> {
        if !self.timers.get(&tab_id).is_some_and(|t| t.is_grace()) {
            debug!(tab_id = %tab_id, "Grace decision no longer applies");
            return Vec::new();
        }

        self.timers.remove(&tab_id);
        info!(tab_id = %tab_id, "Grace period ended by further distracting navigation");
        self.start_active(tab_id, url, now, now_mono)
    }

    fn expire_grace_periods(&mut self, now_mono: MonotonicInstant, now: DateTime<Local>) -> Vec<CoreEvent> {
        let mut elapsed: Vec<TabId> = self
            .timers
            .values()
            .filter(|t| t.is_grace() && t.limit_reached(now_mono))
            .map(|t| t.tab_id)
            .collect();
        elapsed.sort();

        let mut events = Vec::new();
        for tab_id in elapsed {
            // A distracting navigation still settling counts as made in time
            if let Some(url) = self.grace_decisions.cancel(&tab_id) {
                events.extend(self.decide_grace(tab_id, url, now, now_mono));
                continue;
            }
            if let Some(entry) = self.timers.remove(&tab_id) {
                info!(tab_id = %tab_id, "Grace period elapsed");
                events.push(self.end_timer(&entry, TimerEndReason::GraceElapsed, now));
            }
        }
        events
    }

    fn tick_active(&mut self, now_mono: MonotonicInstant) -> Vec<CoreEvent> {
        let tick = self.policy.scheduler.tick;
        let mut active: Vec<TabId> = self
            .timers
            .values()
            .filter(|t| t.is_active())
            .map(|t| t.tab_id)
            .collect();
        active.sort();

        let mut events = Vec::new();
        let mut exhausted_now = false;

        for tab_id in active {
            let Some(entry) = self.timers.get_mut(&tab_id) else {
                continue;
            };
            let due = entry.take_due_ticks(now_mono, tick);
            if due == 0 {
                continue;
            }
            let limit_reached = entry.limit_reached(now_mono);

            exhausted_now |= self.budget.consume(due);
            events.push(CoreEvent::DisplayUpdate {
                tab_id,
                time_left: self.budget.remaining(),
            });

            if limit_reached && !self.budget.is_exhausted() {
                events.extend(self.expire(tab_id, TimerEndReason::Expired));
            }
        }

        if exhausted_now {
            self.audit(AuditEventType::BudgetExhausted);
            events.push(CoreEvent::BudgetExhausted);
            events.push(CoreEvent::BadgeUpdate {
                text: self.badge_text(),
            });
        }

        if self.budget.is_exhausted() {
            events.extend(self.force_stop_active(TimerEndReason::BudgetExhausted));
        }

        events
    }

    /// Move every Active timer to Stopped regardless of its own countdown
    fn force_stop_active(&mut self, reason: TimerEndReason) -> Vec<CoreEvent> {
        let mut active: Vec<TabId> = self
            .timers
            .values()
            .filter(|t| t.is_active())
            .map(|t| t.tab_id)
            .collect();
        active.sort();

        active
            .into_iter()
            .filter_map(|tab_id| self.expire(tab_id, reason))
            .collect()
    }

    fn expire(&mut self, tab_id: TabId, reason: TimerEndReason) -> Option<CoreEvent> {
        let entry = self.timers.get_mut(&tab_id)?;
        entry.stop(reason);

        info!(
            tab_id = %tab_id,
            timer_id = %entry.timer_id,
            reason = ?reason,
            "Timer expired, closing tab"
        );

        Some(CoreEvent::ExpireDue {
            tab_id,
            timer_id: entry.timer_id,
            reason,
        })
    }

    fn run_daily_reset(&mut self, now: DateTime<Local>) -> CoreEvent {
        self.budget.reset();
        self.daily_reset.mark(now);
        if let Err(e) = self.store.set_last_reset(now) {
            warn!(error = %e, "Failed to persist reset time");
        }

        let ceiling_secs = self.budget.ceiling();
        self.audit(AuditEventType::BudgetReset { ceiling_secs });
        CoreEvent::BudgetReset { ceiling_secs }
    }
}

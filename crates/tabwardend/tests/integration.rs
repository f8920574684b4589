//! Integration tests for tabwardend
//!
//! These tests drive the core engine with a real SQLite store through whole
//! browsing sessions, using synthetic clocks.

use chrono::{DateTime, Local, TimeZone};
use std::sync::Arc;
use std::time::Duration;
use tabwarden_api::{TimerEndReason, TimerMode};
use tabwarden_config::{Policy, parse_config};
use tabwarden_core::{CoreEngine, CoreEvent};
use tabwarden_store::{AuditEventType, SqliteStore, Store};
use tabwarden_util::{MonotonicInstant, TabId};

struct Session {
    engine: CoreEngine,
    mono: MonotonicInstant,
    wall: DateTime<Local>,
}

impl Session {
    fn start(policy: Policy, store: Arc<dyn Store>, wall: DateTime<Local>) -> Self {
        Self {
            engine: CoreEngine::new(policy, store, wall),
            mono: MonotonicInstant::now(),
            wall,
        }
    }

    fn advance(&mut self, d: Duration) {
        self.mono = self.mono + d;
        self.wall = self.wall + chrono::Duration::from_std(d).unwrap();
    }

    fn visit(&mut self, tab: i64, url: &str) -> Vec<CoreEvent> {
        self.engine.on_navigation_committed(TabId::new(tab), url, 0);
        self.engine.on_url_changed(TabId::new(tab), url, self.mono);
        self.advance(Duration::from_millis(100));
        self.engine.tick(self.mono, self.wall)
    }

    /// Advance second by second, carrying out every closure as the browser would
    fn browse_for(&mut self, secs: u64) -> Vec<CoreEvent> {
        let mut all = Vec::new();
        for _ in 0..secs {
            self.advance(Duration::from_secs(1));
            let events = self.engine.tick(self.mono, self.wall);
            for event in &events {
                if let CoreEvent::ExpireDue {
                    tab_id, timer_id, ..
                } = event
                {
                    all.extend(
                        self.engine
                            .notify_closed_by_timer(*tab_id, *timer_id, self.wall),
                    );
                    all.extend(self.engine.on_tab_removed(*tab_id, self.wall));
                }
            }
            all.extend(events);
        }
        all
    }
}

fn monday_morning() -> DateTime<Local> {
    Local.with_ymd_and_hms(2025, 6, 2, 9, 0, 0).unwrap()
}

fn make_test_policy() -> Policy {
    parse_config(
        r#"
        config_version = 1

        [blacklist]
        default_sites = ["reddit.com", "youtube.com"]

        [service]
        rng_seed = 3

        [budget]
        daily_seconds = 120
        "#,
    )
    .unwrap()
}

fn closures(events: &[CoreEvent]) -> Vec<(TabId, TimerEndReason)> {
    events
        .iter()
        .filter_map(|e| match e {
            CoreEvent::ExpireDue { tab_id, reason, .. } => Some((*tab_id, *reason)),
            _ => None,
        })
        .collect()
}

#[test]
fn test_policy_loading() {
    let policy = make_test_policy();
    assert_eq!(policy.default_sites, vec!["reddit.com", "youtube.com"]);
    assert_eq!(policy.budget.daily_seconds, 120);
    assert_eq!(policy.service.rng_seed, Some(3));
}

#[test]
fn test_first_visit_runs_for_whole_budget() {
    let store = Arc::new(SqliteStore::in_memory().unwrap());
    let mut session = Session::start(make_test_policy(), store.clone(), monday_morning());

    let events = session.visit(1, "https://www.youtube.com/watch?v=abc");
    assert!(events.iter().any(|e| matches!(
        e,
        CoreEvent::TimerStarted {
            mode: TimerMode::Active,
            time_limit_secs: 121,
            ..
        }
    )));

    let events = session.browse_for(120);
    assert_eq!(closures(&events), vec![(TabId::new(1), TimerEndReason::BudgetExhausted)]);
    assert!(events.contains(&CoreEvent::BudgetExhausted));
    assert_eq!(session.engine.budget_remaining(), 0);
    assert_eq!(store.get_last_distracting_close().unwrap(), Some(session.wall));
}

#[test]
fn test_revisit_right_after_close_gets_one_second() {
    let store = Arc::new(SqliteStore::in_memory().unwrap());
    let mut session = Session::start(make_test_policy(), store, monday_morning());

    session.visit(1, "https://reddit.com/r/rust");
    session.browse_for(10);
    session.visit(1, "https://docs.rs/");
    assert_eq!(session.engine.budget_remaining(), 110);

    let events = session.visit(1, "https://reddit.com/r/rust");
    assert!(events.iter().any(|e| matches!(
        e,
        CoreEvent::TimerStarted {
            time_limit_secs: 1,
            ..
        }
    )));

    let events = session.browse_for(1);
    assert_eq!(closures(&events), vec![(TabId::new(1), TimerEndReason::Expired)]);
    assert_eq!(session.engine.budget_remaining(), 109);
}

#[test]
fn test_cooldown_recovers_over_the_window() {
    let store = Arc::new(SqliteStore::in_memory().unwrap());
    let mut session = Session::start(make_test_policy(), store, monday_morning());

    session.visit(1, "https://reddit.com/r/rust");
    session.engine.on_tab_removed(TabId::new(1), session.wall);

    // Halfway through the 90 minute window: half the remaining budget
    session.advance(Duration::from_secs(45 * 60));
    let factor = session.engine.calculate_reduction_factor(session.wall);
    assert!((factor - 0.5).abs() < 1e-3);

    let events = session.visit(2, "https://reddit.com/r/programming");
    assert!(events.iter().any(|e| matches!(
        e,
        CoreEvent::TimerStarted {
            time_limit_secs: 61,
            ..
        }
    )));
}

#[test]
fn test_grace_period_from_search() {
    let store = Arc::new(SqliteStore::in_memory().unwrap());
    let mut session = Session::start(make_test_policy(), store.clone(), monday_morning());

    session.visit(1, "https://duckduckgo.com/?q=how+to+fix+rust+lifetimes");
    let events = session.visit(
        1,
        "https://www.reddit.com/r/rust/comments/xyz789/how_to_fix_lifetimes/",
    );
    assert!(events.iter().any(|e| matches!(
        e,
        CoreEvent::TimerStarted {
            mode: TimerMode::GracePeriod,
            time_limit_secs: 90,
            ..
        }
    )));

    let events = session.browse_for(90);
    assert!(events.iter().any(|e| matches!(
        e,
        CoreEvent::TimerStopped {
            reason: TimerEndReason::GraceElapsed,
            ..
        }
    )));
    assert!(closures(&events).is_empty());
    assert_eq!(session.engine.budget_remaining(), 120);
    assert_eq!(store.get_last_distracting_close().unwrap(), None);
}

#[test]
fn test_audit_trail() {
    let store = Arc::new(SqliteStore::in_memory().unwrap());
    let mut session = Session::start(make_test_policy(), store.clone(), monday_morning());

    session.visit(1, "https://reddit.com/");
    session.browse_for(120);
    session.engine.shutdown();

    let audits = store.get_recent_audits(20).unwrap();
    let has = |pred: fn(&AuditEventType) -> bool| audits.iter().any(|a| pred(&a.event));

    assert!(has(|e| matches!(e, AuditEventType::ServiceStarted)));
    assert!(has(|e| matches!(e, AuditEventType::TimerStarted { .. })));
    assert!(has(|e| matches!(
        e,
        AuditEventType::TimerEnded {
            reason: TimerEndReason::BudgetExhausted,
            ..
        }
    )));
    assert!(has(|e| matches!(e, AuditEventType::BudgetExhausted)));
    assert!(has(|e| matches!(e, AuditEventType::ServiceStopped)));
}

#[test]
fn test_state_survives_restart() {
    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("tabwarden.db");

    {
        let store: Arc<dyn Store> = Arc::new(SqliteStore::open(&db_path).unwrap());
        let mut session = Session::start(make_test_policy(), store, monday_morning());

        session.engine.add_blacklist_site("news.ycombinator.com").unwrap();
        session.visit(1, "https://news.ycombinator.com/");
        session.browse_for(30);
        session.engine.shutdown();
    }

    let later = monday_morning() + chrono::Duration::hours(1);
    let store: Arc<dyn Store> = Arc::new(SqliteStore::open(&db_path).unwrap());
    let session = Session::start(make_test_policy(), store, later);

    assert_eq!(session.engine.budget_remaining(), 90);
    assert!(session.engine.blacklist().contains("news.ycombinator.com"));
    // One 0.05 increase, then about an hour of decay at 0.025/hour
    assert!((session.engine.close_probability() - 0.025).abs() < 1e-3);
}

#[test]
fn test_budget_resets_on_next_day_restart() {
    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("tabwarden.db");

    {
        let store: Arc<dyn Store> = Arc::new(SqliteStore::open(&db_path).unwrap());
        let mut session = Session::start(make_test_policy(), store, monday_morning());
        session.visit(1, "https://reddit.com/");
        session.browse_for(120);
        session.engine.shutdown();
    }

    let tuesday = Local.with_ymd_and_hms(2025, 6, 3, 8, 0, 0).unwrap();
    let store: Arc<dyn Store> = Arc::new(SqliteStore::open(&db_path).unwrap());
    let session = Session::start(make_test_policy(), store, tuesday);

    assert_eq!(session.engine.budget_remaining(), 120);
}

//! Validated policy structures

use crate::schema::RawConfig;
use std::path::PathBuf;
use std::time::Duration;
use tabwarden_util::data_dir_without_env;

/// Seed blacklist written on first run
pub const DEFAULT_SITES: &[&str] = &[
    "facebook.com",
    "reddit.com",
    "redd.it",
    "imgur.com",
    "x.com",
    "pinterest.com",
    "twitter.com",
    "instagram.com",
];

/// Search-result pages that qualify a navigation for a grace period
pub const DEFAULT_SEARCH_CONTEXTS: &[&str] = &[
    "google.com/search",
    "bing.com/search",
    "duckduckgo.com/?",
    "search.brave.com/search",
];

pub const DEFAULT_DAILY_SECONDS: u64 = 1800;
pub const DEFAULT_PROBABILITY_STEP: f64 = 0.05;
pub const DEFAULT_DECAY_PER_HOUR: f64 = 0.025;
pub const DEFAULT_PROBABILITY_DEBOUNCE_MS: u64 = 3000;
pub const DEFAULT_COOLDOWN_MINUTES: u64 = 90;
pub const DEFAULT_GRACE_SECONDS: u64 = 90;
pub const DEFAULT_GRACE_MIN_URL_LENGTH: usize = 50;
pub const DEFAULT_GRACE_DEBOUNCE_MS: u64 = 2000;
pub const DEFAULT_NAVIGATION_DEBOUNCE_MS: u64 = 100;
pub const DEFAULT_HISTORY_LEN: usize = 2;
pub const DEFAULT_TICK_MS: u64 = 1000;
pub const DEFAULT_MAINTENANCE_SECONDS: u64 = 15;

/// Validated policy ready for use by the core engine
#[derive(Debug, Clone)]
pub struct Policy {
    pub service: ServiceConfig,
    /// Blacklist used when the store has none yet
    pub default_sites: Vec<String>,
    pub budget: BudgetPolicy,
    pub probability: ProbabilityPolicy,
    pub cooldown: CooldownPolicy,
    pub grace: GracePolicy,
    pub navigation: NavigationPolicy,
    pub scheduler: SchedulerPolicy,
    pub behavior: BehaviorPolicy,
}

impl Policy {
    /// Convert from raw config (after validation)
    pub fn from_raw(raw: RawConfig) -> Self {
        let default_sites = raw
            .blacklist
            .default_sites
            .unwrap_or_else(|| DEFAULT_SITES.iter().map(|s| s.to_string()).collect());

        let search_contexts = raw
            .grace
            .search_contexts
            .unwrap_or_else(|| DEFAULT_SEARCH_CONTEXTS.iter().map(|s| s.to_string()).collect());

        Self {
            service: ServiceConfig {
                data_dir: raw.service.data_dir.unwrap_or_else(data_dir_without_env),
                rng_seed: raw.service.rng_seed,
            },
            default_sites,
            budget: BudgetPolicy {
                daily_seconds: raw.budget.daily_seconds.unwrap_or(DEFAULT_DAILY_SECONDS),
            },
            probability: ProbabilityPolicy {
                step: raw.probability.step.unwrap_or(DEFAULT_PROBABILITY_STEP),
                decay_per_hour: raw
                    .probability
                    .decay_per_hour
                    .unwrap_or(DEFAULT_DECAY_PER_HOUR),
                debounce: Duration::from_millis(
                    raw.probability
                        .debounce_ms
                        .unwrap_or(DEFAULT_PROBABILITY_DEBOUNCE_MS),
                ),
            },
            cooldown: CooldownPolicy {
                window: Duration::from_secs(
                    raw.cooldown.window_minutes.unwrap_or(DEFAULT_COOLDOWN_MINUTES) * 60,
                ),
            },
            grace: GracePolicy {
                duration: Duration::from_secs(raw.grace.seconds.unwrap_or(DEFAULT_GRACE_SECONDS)),
                min_url_length: raw
                    .grace
                    .min_url_length
                    .unwrap_or(DEFAULT_GRACE_MIN_URL_LENGTH),
                debounce: Duration::from_millis(
                    raw.grace.debounce_ms.unwrap_or(DEFAULT_GRACE_DEBOUNCE_MS),
                ),
                search_contexts,
            },
            navigation: NavigationPolicy {
                debounce: Duration::from_millis(
                    raw.navigation
                        .debounce_ms
                        .unwrap_or(DEFAULT_NAVIGATION_DEBOUNCE_MS),
                ),
                history_len: raw.navigation.history_len.unwrap_or(DEFAULT_HISTORY_LEN),
            },
            scheduler: SchedulerPolicy {
                tick: Duration::from_millis(raw.scheduler.tick_ms.unwrap_or(DEFAULT_TICK_MS)),
                maintenance: Duration::from_secs(
                    raw.scheduler
                        .maintenance_seconds
                        .unwrap_or(DEFAULT_MAINTENANCE_SECONDS),
                ),
            },
            behavior: BehaviorPolicy {
                randomize_interval: raw.behavior.randomize_interval,
                close_other_distracting_tabs: raw.behavior.close_other_distracting_tabs,
            },
        }
    }
}

impl Default for Policy {
    fn default() -> Self {
        Self::from_raw(RawConfig {
            config_version: crate::CURRENT_CONFIG_VERSION,
            ..Default::default()
        })
    }
}

/// Service configuration
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    pub data_dir: PathBuf,
    pub rng_seed: Option<u64>,
}

/// Shared daily allowance
#[derive(Debug, Clone)]
pub struct BudgetPolicy {
    /// Ceiling the budget resets to at the start of each day
    pub daily_seconds: u64,
}

/// Close-all probability growth and decay
#[derive(Debug, Clone)]
pub struct ProbabilityPolicy {
    pub step: f64,
    pub decay_per_hour: f64,
    pub debounce: Duration,
}

/// Post-closure shortening of new timers
#[derive(Debug, Clone)]
pub struct CooldownPolicy {
    pub window: Duration,
}

/// Grace period for navigations coming from a search page
#[derive(Debug, Clone)]
pub struct GracePolicy {
    pub duration: Duration,
    pub min_url_length: usize,
    pub debounce: Duration,
    pub search_contexts: Vec<String>,
}

impl GracePolicy {
    /// Whether `url` is a search results page
    pub fn is_search_context(&self, url: &str) -> bool {
        self.search_contexts.iter().any(|ctx| url.contains(ctx.as_str()))
    }
}

#[derive(Debug, Clone)]
pub struct NavigationPolicy {
    pub debounce: Duration,
    pub history_len: usize,
}

#[derive(Debug, Clone)]
pub struct SchedulerPolicy {
    pub tick: Duration,
    pub maintenance: Duration,
}

#[derive(Debug, Clone, Default)]
pub struct BehaviorPolicy {
    pub randomize_interval: bool,
    pub close_other_distracting_tabs: bool,
}

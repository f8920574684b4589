//! Raw configuration schema (as parsed from TOML)
//!
//! Every section and field is optional; omitted values fall back to the
//! defaults in [`crate::policy`].

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Raw configuration as parsed from TOML
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct RawConfig {
    /// Config schema version
    pub config_version: u32,

    /// Service-level settings
    #[serde(default)]
    pub service: RawServiceConfig,

    #[serde(default)]
    pub blacklist: RawBlacklist,

    #[serde(default)]
    pub budget: RawBudget,

    #[serde(default)]
    pub probability: RawProbability,

    #[serde(default)]
    pub cooldown: RawCooldown,

    #[serde(default)]
    pub grace: RawGrace,

    #[serde(default)]
    pub navigation: RawNavigation,

    #[serde(default)]
    pub scheduler: RawScheduler,

    #[serde(default)]
    pub behavior: RawBehavior,
}

/// Service-level settings
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct RawServiceConfig {
    /// Data directory for the settings database
    pub data_dir: Option<PathBuf>,

    /// Seed for the close-all roll (random if unset)
    pub rng_seed: Option<u64>,
}

/// Seed list used on first run, before the user edits the blacklist
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct RawBlacklist {
    pub default_sites: Option<Vec<String>>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct RawBudget {
    /// Daily allowance on distracting sites, in seconds
    pub daily_seconds: Option<u64>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct RawProbability {
    /// Increment applied when a distracting timer starts
    pub step: Option<f64>,

    /// Continuous decay, per hour since the last update
    pub decay_per_hour: Option<f64>,

    /// Increments within this window collapse into one
    pub debounce_ms: Option<u64>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct RawCooldown {
    /// Time after a forced closure until timers are back to full length
    pub window_minutes: Option<u64>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct RawGrace {
    /// Length of the grace period, in seconds
    pub seconds: Option<u64>,

    /// Landing URL must be longer than this to qualify
    pub min_url_length: Option<usize>,

    /// Debounce for the grace-to-active decision
    pub debounce_ms: Option<u64>,

    /// URL substrings identifying a search results page
    pub search_contexts: Option<Vec<String>>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct RawNavigation {
    /// Per-tab coalescing window for URL change events
    pub debounce_ms: Option<u64>,

    /// URLs remembered per tab
    pub history_len: Option<usize>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct RawScheduler {
    /// Period of one Active-mode tick
    pub tick_ms: Option<u64>,

    /// Period of the maintenance pass
    pub maintenance_seconds: Option<u64>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct RawBehavior {
    /// Draw the Active interval uniformly instead of using the full allowance
    #[serde(default)]
    pub randomize_interval: bool,

    /// Close other distracting tabs when a new Active timer starts
    #[serde(default)]
    pub close_other_distracting_tabs: bool,
}

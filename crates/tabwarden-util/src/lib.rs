//! Shared utilities for tabwarden
//!
//! This crate provides:
//! - ID types (TabId, TimerId)
//! - Time utilities (mockable wall clock, monotonic time, formatting)
//! - Per-key debouncing
//! - Default paths for config and data directories

mod debounce;
mod ids;
mod paths;
mod time;

pub use debounce::*;
pub use ids::*;
pub use paths::*;
pub use time::*;

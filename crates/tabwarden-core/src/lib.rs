//! Core engine for tabwardend
//!
//! This crate is the heart of tabwardend, containing:
//! - Blacklist classification of tab URLs
//! - Per-tab timer state machine (GracePeriod -> Active -> Stopped)
//! - Daily budget, cooldown reduction factor and close-all probability
//! - Navigation and grace-period debouncing
//! - Calendar-day budget reset
//!
//! Nothing here performs I/O on the browser. Engine calls return
//! [`CoreEvent`]s that the service turns into browser operations.

mod budget;
mod classifier;
mod engine;
mod events;
mod history;
mod schedule;
mod timer;

pub use budget::*;
pub use classifier::*;
pub use engine::*;
pub use events::*;
pub use history::*;
pub use schedule::*;
pub use timer::*;

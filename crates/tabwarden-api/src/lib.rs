//! Protocol types for tabwarden
//!
//! This crate defines the stable API between the service and the add-on:
//! - Popup commands and responses
//! - Countdown banner messages
//! - Native-messaging frames
//! - Versioning

mod commands;
mod events;
mod types;
mod wire;

pub use commands::*;
pub use events::*;
pub use types::*;
pub use wire::*;

/// Current API version
pub const API_VERSION: u32 = 1;

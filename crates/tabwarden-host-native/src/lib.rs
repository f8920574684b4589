//! Native-messaging browser host for tabwardend
//!
//! Implements [`tabwarden_host_api::BrowserHost`] by sending tab operations to
//! the extension and waiting for its correlated replies.

mod host;

pub use host::*;

//! Browser host interfaces for tabwardend
//!
//! This crate defines the interface between the core and whatever actually
//! drives the browser's tabs. It contains no transport code itself.

mod mock;
mod traits;

pub use mock::*;
pub use traits::*;

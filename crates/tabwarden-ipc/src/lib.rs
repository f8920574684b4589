//! Native-messaging transport for tabwardend
//!
//! Provides:
//! - Frame codec (32-bit native-endian length prefix + UTF-8 JSON)
//! - Reader/writer tasks over any async byte stream (stdio in production)
//! - Routing of popup requests apart from browser tab traffic

mod codec;
mod server;

pub use codec::*;
pub use server::*;

use thiserror::Error;

/// IPC errors
#[derive(Debug, Error)]
pub enum IpcError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Connection closed")]
    ConnectionClosed,

    #[error("Frame of {size} bytes exceeds the {limit} byte limit")]
    FrameTooLarge { size: usize, limit: usize },
}

pub type IpcResult<T> = Result<T, IpcError>;

//! Command types for the popup message channel

use serde::{Deserialize, Serialize};

use crate::{HealthStatus, ServiceStateSnapshot, API_VERSION};

/// Request wrapper with metadata
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Request {
    /// Request ID for correlation
    pub request_id: u64,
    /// API version
    #[serde(default = "default_api_version")]
    pub api_version: u32,
    /// The command
    pub command: Command,
}

fn default_api_version() -> u32 {
    API_VERSION
}

impl Request {
    pub fn new(request_id: u64, command: Command) -> Self {
        Self {
            request_id,
            api_version: API_VERSION,
            command,
        }
    }
}

/// Response wrapper
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Response {
    /// Corresponding request ID
    pub request_id: u64,
    /// API version
    pub api_version: u32,
    /// Response payload or error
    pub result: ResponseResult,
}

impl Response {
    pub fn success(request_id: u64, payload: ResponsePayload) -> Self {
        Self {
            request_id,
            api_version: API_VERSION,
            result: ResponseResult::Ok(payload),
        }
    }

    pub fn error(request_id: u64, error: ErrorInfo) -> Self {
        Self {
            request_id,
            api_version: API_VERSION,
            result: ResponseResult::Err(error),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponseResult {
    Ok(ResponsePayload),
    Err(ErrorInfo),
}

/// Error information
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorInfo {
    pub code: ErrorCode,
    pub message: String,
}

impl ErrorInfo {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

/// Error codes for the protocol
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    InvalidRequest,
    UnsupportedVersion,
    StoreError,
    HostError,
    InternalError,
}

/// Commands the popup can send
///
/// Tagged by `action` with camelCase names, matching the add-on's
/// `runtime.sendMessage({action: ...})` calls.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "camelCase")]
pub enum Command {
    /// Append a site to the blacklist
    AddBlacklistSite { site: String },

    /// Compute the current cooldown reduction factor
    CalculateReductionFactor,

    /// Full state for the popup
    GetState,

    /// Get health status
    GetHealth,

    /// Ping for keepalive
    Ping,
}

/// Response payloads
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum ResponsePayload {
    SiteAdded {
        success: bool,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        error: Option<String>,
    },
    ReductionFactor {
        reduction_factor: f64,
    },
    State(ServiceStateSnapshot),
    Health(HealthStatus),
    Pong,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_uses_extension_action_names() {
        let json = r#"{"request_id": 7, "command": {"action": "addBlacklistSite", "site": "news.ycombinator.com"}}"#;
        let parsed: Request = serde_json::from_str(json).unwrap();

        assert_eq!(parsed.request_id, 7);
        assert_eq!(parsed.api_version, API_VERSION);
        assert!(matches!(
            parsed.command,
            Command::AddBlacklistSite { ref site } if site == "news.ycombinator.com"
        ));

        let json = r#"{"request_id": 8, "command": {"action": "calculateReductionFactor"}}"#;
        let parsed: Request = serde_json::from_str(json).unwrap();
        assert!(matches!(parsed.command, Command::CalculateReductionFactor));
    }

    #[test]
    fn site_added_omits_missing_error() {
        let resp = Response::success(
            1,
            ResponsePayload::SiteAdded {
                success: true,
                error: None,
            },
        );
        let json = serde_json::to_value(&resp).unwrap();
        assert_eq!(
            json["result"]["ok"],
            serde_json::json!({"type": "siteAdded", "success": true})
        );
    }

    #[test]
    fn reduction_factor_field_is_camel_case() {
        let payload = ResponsePayload::ReductionFactor {
            reduction_factor: 0.5,
        };
        let json = serde_json::to_value(&payload).unwrap();
        assert_eq!(json["reductionFactor"], serde_json::json!(0.5));
    }
}

//! Messages for the countdown banner injected into a tab

use serde::{Deserialize, Serialize};

/// On-page display update
///
/// Serialized with an `action` tag and camelCase fields, the shape the
/// injected content script listens for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum DisplayMessage {
    /// Show or refresh the banner with the seconds left
    UpdateTimer { time_left: u64 },

    /// Remove the banner
    HideTimer,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn update_timer_wire_shape() {
        let json = serde_json::to_value(DisplayMessage::UpdateTimer { time_left: 42 }).unwrap();
        assert_eq!(json, serde_json::json!({"action": "updateTimer", "timeLeft": 42}));
    }

    #[test]
    fn hide_timer_wire_shape() {
        let json = serde_json::to_value(DisplayMessage::HideTimer).unwrap();
        assert_eq!(json, serde_json::json!({"action": "hideTimer"}));
    }
}

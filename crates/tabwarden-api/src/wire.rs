//! Native-messaging frames exchanged with the browser extension
//!
//! The extension forwards tab events and popup requests to the service and
//! executes the tab operations the service asks for.

use serde::{Deserialize, Serialize};
use tabwarden_util::TabId;

use crate::{DisplayMessage, Request, Response, TabInfo};

/// Frames from the extension to the service
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum InboundFrame {
    /// `tabs.onUpdated` with a URL change
    TabUpdated { tab_id: TabId, url: String },

    /// `tabs.onRemoved`
    TabRemoved { tab_id: TabId },

    /// `webNavigation.onCommitted`
    NavigationCommitted {
        tab_id: TabId,
        url: String,
        frame_id: i64,
    },

    /// Reply to [`OutboundFrame::QueryTabs`]
    Tabs { query_id: u64, tabs: Vec<TabInfo> },

    /// Reply to [`OutboundFrame::GetTab`]; `tab` is absent if it no longer exists
    Tab {
        query_id: u64,
        #[serde(default)]
        tab: Option<TabInfo>,
    },

    /// Acknowledges `RemoveTabs` / `InjectDisplay`
    Ack { query_id: u64 },

    /// Reply to a tab operation that failed in the browser
    OperationFailed { query_id: u64, message: String },

    /// Popup message
    Request { request: Request },
}

/// Frames from the service to the extension
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OutboundFrame {
    /// `tabs.query({})`
    QueryTabs { query_id: u64 },

    /// `tabs.get(tab_id)`
    GetTab { query_id: u64, tab_id: TabId },

    /// `tabs.remove(tab_ids)`, acknowledged with `Ack`
    RemoveTabs { query_id: u64, tab_ids: Vec<TabId> },

    /// Inject the countdown banner script, acknowledged with `Ack`
    InjectDisplay { query_id: u64, tab_id: TabId },

    /// Message for the injected banner (fire-and-forget)
    Display {
        tab_id: TabId,
        message: DisplayMessage,
    },

    /// Toolbar badge text (fire-and-forget)
    Badge { text: String },

    /// Popup reply
    Response { response: Response },
}

impl OutboundFrame {
    /// Query id this frame expects a reply for
    pub fn query_id(&self) -> Option<u64> {
        match self {
            OutboundFrame::QueryTabs { query_id }
            | OutboundFrame::GetTab { query_id, .. }
            | OutboundFrame::RemoveTabs { query_id, .. }
            | OutboundFrame::InjectDisplay { query_id, .. } => Some(*query_id),
            OutboundFrame::Display { .. }
            | OutboundFrame::Badge { .. }
            | OutboundFrame::Response { .. } => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_tab_updated() {
        let frame: InboundFrame = serde_json::from_str(
            r#"{"type": "tab_updated", "tab_id": 12, "url": "https://reddit.com/r/rust"}"#,
        )
        .unwrap();

        assert!(matches!(
            frame,
            InboundFrame::TabUpdated { tab_id, ref url }
                if tab_id == TabId::new(12) && url == "https://reddit.com/r/rust"
        ));
    }

    #[test]
    fn parse_tab_reply_for_closed_tab() {
        let frame: InboundFrame =
            serde_json::from_str(r#"{"type": "tab", "query_id": 4}"#).unwrap();
        assert!(matches!(frame, InboundFrame::Tab { query_id: 4, tab: None }));
    }

    #[test]
    fn display_frame_nests_banner_message() {
        let frame = OutboundFrame::Display {
            tab_id: TabId::new(5),
            message: DisplayMessage::UpdateTimer { time_left: 30 },
        };
        let json = serde_json::to_value(&frame).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "type": "display",
                "tab_id": 5,
                "message": {"action": "updateTimer", "timeLeft": 30}
            })
        );
        assert_eq!(frame.query_id(), None);
    }

    #[test]
    fn remove_tabs_expects_reply() {
        let frame = OutboundFrame::RemoveTabs {
            query_id: 9,
            tab_ids: vec![TabId::new(1), TabId::new(2)],
        };
        assert_eq!(frame.query_id(), Some(9));
    }
}

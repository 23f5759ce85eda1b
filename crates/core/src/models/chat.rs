//! Chat stream model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::null_as_default;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ChatKind {
    Chat,
    Join,
    Leave,
    Status,
}

/// One entry of the room's chat stream
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatEvent {
    #[serde(rename = "type")]
    pub kind: ChatKind,
    #[serde(default, deserialize_with = "null_as_default")]
    pub sender: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub content: String,
    /// Stamped by the authority; absent on outbound messages
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<DateTime<Utc>>,
}

impl ChatEvent {
    pub fn chat(sender: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            kind: ChatKind::Chat,
            sender: sender.into(),
            content: content.into(),
            timestamp: None,
        }
    }

    pub fn format_timestamp(&self) -> String {
        self.timestamp
            .map(|t| t.format("%H:%M:%S").to_string())
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_authority_timestamp() {
        let json = r#"{"type":"JOIN","content":"hi","sender":"Guest-1","roomId":"abc","timestamp":"2024-05-01T12:30:05.123456Z"}"#;
        let event: ChatEvent = serde_json::from_str(json).unwrap();
        assert_eq!(event.kind, ChatKind::Join);
        assert_eq!(event.format_timestamp(), "12:30:05");
    }

    #[test]
    fn null_sender_is_accepted() {
        let json = r#"{"type":"STATUS","content":"Voting has started!","sender":null,"timestamp":null}"#;
        let event: ChatEvent = serde_json::from_str(json).unwrap();
        assert_eq!(event.kind, ChatKind::Status);
        assert_eq!(event.sender, "");
        assert_eq!(event.timestamp, None);
    }

    #[test]
    fn outbound_chat_omits_timestamp() {
        let value = serde_json::to_value(ChatEvent::chat("me", "hello")).unwrap();
        assert_eq!(value["type"], "CHAT");
        assert!(value.get("timestamp").is_none());
    }
}

//! Wire protocol: topics, destinations and JSON payloads
//!
//! Inbound topics live under `/topic/room/{roomId}/...`, outbound
//! destinations under `/app/{roomId}/...`. All payloads are JSON.

use agora_core::{Phase, Stance, StatusUpdate, VoteTally};
use serde::{Deserialize, Serialize};

/// Inbound event streams scoped to one room
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Topic {
    Participants,
    Chat,
    Status,
    VoteTally,
    ArgumentNew,
}

impl Topic {
    /// Every topic a room attachment subscribes to
    pub const ALL: [Topic; 5] = [
        Topic::Participants,
        Topic::Chat,
        Topic::Status,
        Topic::VoteTally,
        Topic::ArgumentNew,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Topic::Participants => "participants",
            Topic::Chat => "chat",
            Topic::Status => "status",
            Topic::VoteTally => "vote-tally",
            Topic::ArgumentNew => "argument-new",
        }
    }

    fn wire_suffix(&self) -> &'static str {
        match self {
            Topic::Participants => "participants",
            Topic::Chat => "chat",
            Topic::Status => "status",
            Topic::VoteTally => "vote-results",
            Topic::ArgumentNew => "argument.new",
        }
    }

    pub fn path(&self, room_id: &str) -> String {
        format!("/topic/room/{}/{}", room_id, self.wire_suffix())
    }
}

impl std::fmt::Display for Topic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Outbound message destinations scoped to one room
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Destination {
    Join,
    Leave,
    StatusUpdate,
    ArgumentSubmit,
    ChatSend,
    Vote,
}

impl Destination {
    fn wire_suffix(&self) -> &'static str {
        match self {
            Destination::Join => "join",
            Destination::Leave => "leave",
            Destination::StatusUpdate => "status.update",
            Destination::ArgumentSubmit => "argument.submit",
            Destination::ChatSend => "chat.sendMessage",
            Destination::Vote => "vote",
        }
    }

    pub fn path(&self, room_id: &str) -> String {
        format!("/app/{}/{}", room_id, self.wire_suffix())
    }
}

/// Session status as the authority sends it, before phase validation
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusPayload {
    #[serde(default)]
    pub room_id: Option<String>,
    #[serde(rename = "type")]
    pub phase: String,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub current_topic: Option<String>,
    #[serde(default)]
    pub start_time: Option<i64>,
    #[serde(default)]
    pub duration_seconds: Option<u64>,
}

impl StatusPayload {
    /// Validate the phase token; unknown tokens reject the whole update
    pub fn into_update(self) -> agora_core::Result<StatusUpdate> {
        Ok(StatusUpdate {
            phase: Phase::from_wire(&self.phase)?,
            room_id: self.room_id,
            message: self.message,
            topic: self.current_topic,
            start_time: self.start_time,
            duration_seconds: self.duration_seconds,
        })
    }
}

/// Outbound phase change request
#[derive(Debug, Clone, Serialize)]
pub struct StatusRequest {
    #[serde(rename = "type")]
    pub phase: &'static str,
    pub message: String,
}

impl StatusRequest {
    pub fn new(phase: Phase, message: impl Into<String>) -> Self {
        Self {
            phase: phase.wire_label(),
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ArgumentSubmit {
    pub participant_id: String,
    pub side: Stance,
    pub text: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VoteCast {
    pub voter_id: String,
    pub side: Stance,
}

/// `GET vote-results` body
#[derive(Debug, Clone, Deserialize)]
pub struct VoteResults {
    #[serde(default)]
    pub results: VoteTally,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn topic_paths_are_room_scoped() {
        assert_eq!(Topic::Status.path("ab12"), "/topic/room/ab12/status");
        assert_eq!(Topic::VoteTally.path("ab12"), "/topic/room/ab12/vote-results");
        assert_eq!(Topic::ArgumentNew.path("ab12"), "/topic/room/ab12/argument.new");
        assert_eq!(Destination::ChatSend.path("ab12"), "/app/ab12/chat.sendMessage");
        assert_eq!(Destination::StatusUpdate.path("ab12"), "/app/ab12/status.update");
    }

    #[test]
    fn status_payload_validates_phase() {
        let json = r#"{"roomId":"r","type":"STARTED","message":"go","currentTopic":"t","startTime":5,"durationSeconds":300}"#;
        let payload: StatusPayload = serde_json::from_str(json).unwrap();
        let update = payload.into_update().unwrap();
        assert_eq!(update.phase, Phase::Active);
        assert_eq!(update.duration_seconds, Some(300));

        let bad: StatusPayload = serde_json::from_str(r#"{"type":"LOBBY"}"#).unwrap();
        assert!(bad.into_update().is_err());
    }

    #[test]
    fn status_request_uses_wire_labels() {
        let value = serde_json::to_value(StatusRequest::new(Phase::Voting, "vote now")).unwrap();
        assert_eq!(value["type"], "VOTING");
        assert_eq!(value["message"], "vote now");
    }

    #[test]
    fn outbound_payloads_are_camel_case() {
        let value = serde_json::to_value(VoteCast {
            voter_id: "p1".into(),
            side: Stance::Against,
        })
        .unwrap();
        assert_eq!(value["voterId"], "p1");
        assert_eq!(value["side"], "against");
    }
}

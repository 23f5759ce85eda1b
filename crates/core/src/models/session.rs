//! Session model and phase labels

use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::Error;

/// Lifecycle stage of a discussion session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    #[default]
    Waiting,
    Active,
    Paused,
    Voting,
    Ended,
}

impl Phase {
    /// Uppercase token used on the wire
    pub fn wire_label(&self) -> &'static str {
        match self {
            Phase::Waiting => "WAITING",
            Phase::Active => "STARTED",
            Phase::Paused => "PAUSED",
            Phase::Voting => "VOTING",
            Phase::Ended => "ENDED",
        }
    }

    /// Translate a wire token. Unknown tokens are an error, never a default.
    pub fn from_wire(token: &str) -> Result<Self, Error> {
        match token {
            "WAITING" => Ok(Phase::Waiting),
            "STARTED" => Ok(Phase::Active),
            "PAUSED" => Ok(Phase::Paused),
            "VOTING" => Ok(Phase::Voting),
            "ENDED" => Ok(Phase::Ended),
            other => Err(Error::UnknownPhase(other.to_string())),
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Phase::Ended)
    }

    /// Edges of the session lifecycle graph
    pub fn can_transition_to(&self, next: Phase) -> bool {
        use Phase::*;
        matches!(
            (*self, next),
            (Waiting, Active)
                | (Active, Paused)
                | (Paused, Active)
                | (Active, Voting)
                | (Paused, Voting)
                | (Waiting, Ended)
                | (Active, Ended)
                | (Paused, Ended)
                | (Voting, Ended)
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Phase::Waiting => "waiting",
            Phase::Active => "active",
            Phase::Paused => "paused",
            Phase::Voting => "voting",
            Phase::Ended => "ended",
        }
    }
}

impl FromStr for Phase {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Phase::from_wire(s)
    }
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Local projection of the authority's session record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct Session {
    pub room_id: String,
    pub topic: String,
    pub phase: Phase,
    /// Epoch milliseconds, 0 if never started
    pub start_time: i64,
    pub duration_seconds: u64,
    pub last_message: String,
}

impl Session {
    pub fn new(room_id: impl Into<String>) -> Self {
        Self {
            room_id: room_id.into(),
            ..Default::default()
        }
    }
}

/// A partial or full status update with an already validated phase
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusUpdate {
    pub phase: Phase,
    pub room_id: Option<String>,
    pub message: Option<String>,
    pub topic: Option<String>,
    pub start_time: Option<i64>,
    pub duration_seconds: Option<u64>,
}

impl StatusUpdate {
    pub fn phase_only(phase: Phase) -> Self {
        Self {
            phase,
            room_id: None,
            message: None,
            topic: None,
            start_time: None,
            duration_seconds: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wire_labels_translate_both_ways() {
        for phase in [
            Phase::Waiting,
            Phase::Active,
            Phase::Paused,
            Phase::Voting,
            Phase::Ended,
        ] {
            assert_eq!(Phase::from_wire(phase.wire_label()).unwrap(), phase);
        }
        assert_eq!(Phase::Active.wire_label(), "STARTED");
    }

    #[test]
    fn unknown_token_is_rejected() {
        assert!(matches!(
            Phase::from_wire("DEBATING"),
            Err(Error::UnknownPhase(t)) if t == "DEBATING"
        ));
        assert!(Phase::from_wire("waiting").is_err());
        assert!(Phase::from_wire("").is_err());
    }

    #[test]
    fn ended_has_no_exits() {
        for next in [Phase::Waiting, Phase::Active, Phase::Paused, Phase::Voting] {
            assert!(!Phase::Ended.can_transition_to(next));
        }
        assert!(Phase::Voting.can_transition_to(Phase::Ended));
        assert!(!Phase::Voting.can_transition_to(Phase::Active));
        assert!(Phase::Paused.can_transition_to(Phase::Active));
    }
}

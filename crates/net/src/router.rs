//! Inbound message routing
//!
//! Maps each topic's payload onto the session projection. Purely
//! synchronous; every message is parsed and applied on its own so one bad
//! payload never affects the next.

use agora_core::{
    duplicate_id, Argument, ChatEvent, Error, Participant, PhaseChange, Result, SessionState,
    VoteTally,
};
use serde::de::DeserializeOwned;

use crate::protocol::{StatusPayload, Topic};

/// What a routed message changed
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Applied {
    Roster { count: usize },
    Chat,
    Phase(PhaseChange),
    Tally(VoteTally),
    Argument,
}

fn parse<T: DeserializeOwned>(topic: Topic, body: &str) -> Result<T> {
    serde_json::from_str(body).map_err(|e| Error::malformed(topic.name(), e))
}

/// Apply one inbound message. On error the state is left untouched.
pub fn route(state: &mut SessionState, topic: Topic, body: &str, now_ms: i64) -> Result<Applied> {
    match topic {
        Topic::Participants => {
            let roster: Vec<Participant> = parse(topic, body)?;
            if let Some(id) = duplicate_id(&roster) {
                return Err(Error::malformed(
                    topic.name(),
                    format!("duplicate participant id {}", id),
                ));
            }
            let count = roster.len();
            state.replace_roster(roster);
            Ok(Applied::Roster { count })
        }
        Topic::Chat => {
            let event: ChatEvent = parse(topic, body)?;
            state.push_chat(event);
            Ok(Applied::Chat)
        }
        Topic::Status => {
            let payload: StatusPayload = parse(topic, body)?;
            let update = payload.into_update()?;
            Ok(Applied::Phase(state.apply_status(update, now_ms)))
        }
        Topic::VoteTally => {
            let tally: VoteTally = parse(topic, body)?;
            state.replace_tally(tally);
            Ok(Applied::Tally(tally))
        }
        Topic::ArgumentNew => {
            let argument: Argument = parse(topic, body)?;
            state.push_argument(argument);
            Ok(Applied::Argument)
        }
    }
}

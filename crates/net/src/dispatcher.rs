//! Outbound action dispatch
//!
//! Turns a local intent into one outbound channel message. Nothing is queued
//! or retried: an action that cannot be sent right now is skipped, and the
//! skip is reported back to the caller.

use agora_core::{ChatEvent, Phase, SessionState, Stance};
use tracing::{debug, warn};

use crate::connector::SessionConnector;
use crate::error::Error;
use crate::protocol::{ArgumentSubmit, Destination, StatusRequest, VoteCast};

/// A local user intent
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    Start,
    Pause,
    StartVoting,
    End,
    /// The local countdown ran out
    Expire,
    SubmitArgument(String),
    SendChat(String),
    Vote(Stance),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    NotConnected,
    /// We have not joined the room yet
    MissingIdentity,
    /// Arguments need a for/against side
    NoSide,
    EmptyContent,
    InvalidTransition { from: Phase, to: Phase },
}

/// Outcome of a dispatch
#[must_use]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dispatch {
    Sent,
    Skipped(SkipReason),
}

impl Dispatch {
    pub fn is_sent(&self) -> bool {
        matches!(self, Dispatch::Sent)
    }
}

/// A validated outbound message, detached from the session state
#[derive(Debug, Clone)]
pub enum Outbound {
    Status(StatusRequest),
    Argument(ArgumentSubmit),
    Chat(ChatEvent),
    Vote(VoteCast),
}

/// Validate `action` against local state and build its message.
///
/// Synchronous, so callers can release any lock on the state before the
/// message goes out.
pub fn prepare(state: &SessionState, action: Action) -> Result<Outbound, SkipReason> {
    match action {
        Action::Start => request_phase(state, Phase::Active, "The debate has started!"),
        Action::Pause => request_phase(state, Phase::Paused, "The debate is paused."),
        Action::StartVoting => request_phase(state, Phase::Voting, "Voting has started!"),
        Action::End => request_phase(state, Phase::Ended, "The debate has ended."),
        Action::Expire => request_phase(state, Phase::Ended, "Time is up!"),
        Action::SubmitArgument(text) => {
            let me = state.me().ok_or(SkipReason::MissingIdentity)?;
            let Some(side) = me.side.stance() else {
                debug!(participant = %me.id, "Participant without a side cannot argue");
                return Err(SkipReason::NoSide);
            };
            if text.trim().is_empty() {
                return Err(SkipReason::EmptyContent);
            }
            Ok(Outbound::Argument(ArgumentSubmit {
                participant_id: me.id.clone(),
                side,
                text,
            }))
        }
        Action::SendChat(content) => {
            let me = state.me().ok_or(SkipReason::MissingIdentity)?;
            if content.trim().is_empty() {
                return Err(SkipReason::EmptyContent);
            }
            Ok(Outbound::Chat(ChatEvent::chat(me.name.clone(), content)))
        }
        Action::Vote(side) => {
            let me = state.me().ok_or(SkipReason::MissingIdentity)?;
            Ok(Outbound::Vote(VoteCast {
                voter_id: me.id.clone(),
                side,
            }))
        }
    }
}

/// Ask the authority for a phase change. The local phase is left alone.
fn request_phase(state: &SessionState, target: Phase, message: &str) -> Result<Outbound, SkipReason> {
    if let Err(e) = state.phase_machine().validate_request(target) {
        debug!(error = %e, "Skipping status request");
        return Err(SkipReason::InvalidTransition {
            from: state.phase(),
            to: target,
        });
    }
    Ok(Outbound::Status(StatusRequest::new(target, message)))
}

/// Send a prepared message
pub async fn send(connector: &mut SessionConnector, outbound: Outbound) -> Dispatch {
    let result = match &outbound {
        Outbound::Status(request) => connector.send(Destination::StatusUpdate, request).await,
        Outbound::Argument(argument) => connector.send(Destination::ArgumentSubmit, argument).await,
        Outbound::Chat(event) => connector.send(Destination::ChatSend, event).await,
        Outbound::Vote(vote) => connector.send(Destination::Vote, vote).await,
    };
    outcome(result)
}

/// Validate `action` against local state and send it
pub async fn dispatch(
    connector: &mut SessionConnector,
    state: &SessionState,
    action: Action,
) -> Dispatch {
    if !connector.is_connected() {
        debug!(action = ?action, "Skipping action while disconnected");
        return Dispatch::Skipped(SkipReason::NotConnected);
    }
    match prepare(state, action) {
        Ok(outbound) => send(connector, outbound).await,
        Err(reason) => Dispatch::Skipped(reason),
    }
}

fn outcome(result: Result<(), Error>) -> Dispatch {
    match result {
        Ok(()) => Dispatch::Sent,
        Err(Error::NotConnected) => Dispatch::Skipped(SkipReason::NotConnected),
        Err(e) => {
            warn!(error = %e, "Dispatch failed");
            Dispatch::Skipped(SkipReason::NotConnected)
        }
    }
}

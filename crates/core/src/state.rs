//! Owned session projection
//!
//! One writer (the room loop, through the message router), many readers.
//! Created empty at room entry and discarded at exit.

use tracing::{debug, warn};

use crate::countdown::{Countdown, Expired};
use crate::invariants::{assert_roster_invariants, assert_session_invariants};
use crate::models::{
    Argument, ChatEvent, LocalIdentity, Participant, Phase, Session, StatusUpdate, VoteTally,
};
use crate::phase::{PhaseChange, PhaseMachine};

#[derive(Debug, Clone)]
pub struct SessionState {
    identity: LocalIdentity,
    session: Session,
    roster: Vec<Participant>,
    chat: Vec<ChatEvent>,
    arguments: Vec<Argument>,
    tally: VoteTally,
    /// Our own roster entry as sent in the join handshake
    me: Option<Participant>,
    phase: PhaseMachine,
    countdown: Countdown,
}

impl SessionState {
    pub fn new(room_id: impl Into<String>, identity: LocalIdentity) -> Self {
        Self {
            identity,
            session: Session::new(room_id),
            roster: Vec::new(),
            chat: Vec::new(),
            arguments: Vec::new(),
            tally: VoteTally::default(),
            me: None,
            phase: PhaseMachine::new(),
            countdown: Countdown::new(),
        }
    }

    pub fn identity(&self) -> &LocalIdentity {
        &self.identity
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn room_id(&self) -> &str {
        &self.session.room_id
    }

    pub fn phase(&self) -> Phase {
        self.phase.phase()
    }

    pub fn phase_machine(&self) -> &PhaseMachine {
        &self.phase
    }

    pub fn countdown(&self) -> &Countdown {
        &self.countdown
    }

    pub fn roster(&self) -> &[Participant] {
        &self.roster
    }

    pub fn chat(&self) -> &[ChatEvent] {
        &self.chat
    }

    pub fn arguments(&self) -> &[Argument] {
        &self.arguments
    }

    pub fn tally(&self) -> VoteTally {
        self.tally
    }

    pub fn me(&self) -> Option<&Participant> {
        self.me.as_ref()
    }

    /// Apply a status event from the authority and rebase the countdown
    pub fn apply_status(&mut self, update: StatusUpdate, now_ms: i64) -> PhaseChange {
        let change = self.phase.apply_authoritative(update.phase);
        if let PhaseChange::IgnoredTerminal { .. } = change {
            return change;
        }

        if let Some(room_id) = update.room_id.as_deref() {
            if room_id != self.session.room_id {
                warn!(expected = %self.session.room_id, got = %room_id, "Status for another room");
            }
        }
        if let Some(topic) = update.topic {
            self.session.topic = topic;
        }
        if let Some(message) = update.message {
            self.session.last_message = message;
        }
        if let Some(start_time) = update.start_time {
            self.session.start_time = start_time;
        }
        if let Some(duration) = update.duration_seconds {
            self.session.duration_seconds = duration;
        }
        self.session.phase = self.phase.phase();

        self.countdown.rebase(
            self.session.phase,
            self.session.start_time,
            self.session.duration_seconds,
            now_ms,
        );
        assert_session_invariants(&self.session);
        debug!(
            phase = %self.session.phase,
            remaining = self.countdown.remaining(),
            "Applied status"
        );
        change
    }

    /// Replace the roster wholesale, keeping the authority's order
    pub fn replace_roster(&mut self, roster: Vec<Participant>) {
        assert_roster_invariants(&roster);
        if let Some(me) = self.me.as_mut() {
            if let Some(entry) = roster.iter().find(|p| p.id == me.id) {
                *me = entry.clone();
            }
        }
        self.roster = roster;
    }

    pub fn push_chat(&mut self, event: ChatEvent) {
        self.chat.push(event);
    }

    pub fn push_argument(&mut self, argument: Argument) {
        self.arguments.push(argument);
    }

    pub fn replace_arguments(&mut self, arguments: Vec<Argument>) {
        self.arguments = arguments;
    }

    pub fn replace_tally(&mut self, tally: VoteTally) {
        self.tally = tally;
    }

    pub fn set_me(&mut self, participant: Participant) {
        self.me = Some(participant);
    }

    /// Forget our join; used when the channel goes away
    pub fn clear_me(&mut self) {
        self.me = None;
    }

    /// One local second elapsed
    pub fn tick(&mut self) -> Option<Expired> {
        self.countdown.tick()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ChatKind, Side, Stance};

    const T: i64 = 1_700_000_000_000;

    fn state() -> SessionState {
        SessionState::new("room-1", LocalIdentity::new("me", "Guest-1"))
    }

    fn participant(id: &str, side: Side) -> Participant {
        Participant {
            id: id.to_string(),
            name: format!("name-{}", id),
            side,
            color_tag: "bg-red-500".to_string(),
        }
    }

    fn started(start_time: i64, duration: u64) -> StatusUpdate {
        StatusUpdate {
            phase: Phase::Active,
            room_id: Some("room-1".to_string()),
            message: Some("started".to_string()),
            topic: Some("Is remote work productive?".to_string()),
            start_time: Some(start_time),
            duration_seconds: Some(duration),
        }
    }

    #[test]
    fn roster_replace_is_idempotent() {
        let mut s = state();
        let roster = vec![participant("a", Side::For), participant("b", Side::Against)];
        s.replace_roster(roster.clone());
        s.replace_roster(roster.clone());
        assert_eq!(s.roster(), roster.as_slice());
    }

    #[test]
    fn roster_refreshes_own_entry() {
        let mut s = state();
        s.set_me(participant("me", Side::For));
        s.replace_roster(vec![participant("me", Side::Against)]);
        assert_eq!(s.me().unwrap().side, Side::Against);
    }

    #[test]
    fn chat_keeps_arrival_order() {
        let mut s = state();
        let mut later = ChatEvent::chat("b", "second sent");
        later.timestamp = Some(chrono::DateTime::from_timestamp(200, 0).unwrap());
        let mut earlier = ChatEvent::chat("a", "first sent");
        earlier.timestamp = Some(chrono::DateTime::from_timestamp(100, 0).unwrap());

        s.push_chat(later.clone());
        s.push_chat(earlier.clone());
        assert_eq!(s.chat(), &[later, earlier]);
        assert_eq!(s.chat()[0].kind, ChatKind::Chat);
    }

    #[test]
    fn tally_is_replaced_not_accumulated() {
        let mut s = state();
        s.replace_tally(VoteTally::new(3, 5));
        s.replace_tally(VoteTally::new(4, 5));
        assert_eq!(s.tally(), VoteTally::new(4, 5));
        assert_eq!(s.tally().leader(), Some(Stance::Against));
    }

    #[test]
    fn late_join_to_expired_run_stays_active_until_ended() {
        let mut s = state();
        s.apply_status(started(T, 600), T + 605_000);
        assert_eq!(s.phase(), Phase::Active);
        assert_eq!(s.countdown().remaining(), 0);

        // Local expiry does not move the phase
        assert!(s.tick().is_some());
        assert_eq!(s.phase(), Phase::Active);

        s.apply_status(StatusUpdate::phase_only(Phase::Ended), T + 606_000);
        assert_eq!(s.phase(), Phase::Ended);
        assert_eq!(s.session().phase, Phase::Ended);
        assert!(!s.countdown().is_running());
    }

    #[test]
    fn status_after_end_is_ignored() {
        let mut s = state();
        s.apply_status(StatusUpdate::phase_only(Phase::Ended), T);
        let change = s.apply_status(started(T, 600), T);
        assert!(matches!(change, PhaseChange::IgnoredTerminal { .. }));
        assert_eq!(s.session().topic, "");
    }
}

//! Phase state machine for a session
//!
//! The authority is the single source of truth: inbound phase events always
//! win (except that nothing leaves `ended`). Local intents are only validated
//! here and never move the local phase; the authority's echo does that.

use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::models::Phase;

/// Outcome of applying an authoritative phase
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PhaseChange {
    Unchanged(Phase),
    Changed { from: Phase, to: Phase },
    /// The session already ended; the event was dropped
    IgnoredTerminal { attempted: Phase },
}

#[derive(Debug, Clone, Default)]
pub struct PhaseMachine {
    phase: Phase,
}

impl PhaseMachine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Whether the countdown should be ticking
    pub fn is_running(&self) -> bool {
        self.phase == Phase::Active
    }

    /// Apply a phase declared by the authority
    pub fn apply_authoritative(&mut self, next: Phase) -> PhaseChange {
        let current = self.phase;
        if current == next {
            return PhaseChange::Unchanged(current);
        }
        if current.is_terminal() {
            warn!(attempted = %next, "Ignoring phase change after session ended");
            return PhaseChange::IgnoredTerminal { attempted: next };
        }
        if !current.can_transition_to(next) {
            // Authority wins even off the usual graph
            debug!(from = %current, to = %next, "Authority moved phase off-graph");
        }
        self.phase = next;
        PhaseChange::Changed {
            from: current,
            to: next,
        }
    }

    /// Apply a raw wire token, keeping the current phase when it is unknown
    pub fn apply_wire(&mut self, token: &str) -> Result<PhaseChange> {
        match Phase::from_wire(token) {
            Ok(next) => Ok(self.apply_authoritative(next)),
            Err(e) => {
                warn!(token = %token, phase = %self.phase, "Rejected unknown phase token");
                Err(e)
            }
        }
    }

    /// Check that a local request to move to `target` makes sense right now
    pub fn validate_request(&self, target: Phase) -> Result<()> {
        if self.phase.can_transition_to(target) {
            Ok(())
        } else {
            Err(Error::InvalidTransition {
                from: self.phase,
                to: target,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn follows_authority() {
        let mut machine = PhaseMachine::new();
        assert_eq!(machine.phase(), Phase::Waiting);
        assert!(!machine.is_running());

        let change = machine.apply_authoritative(Phase::Active);
        assert_eq!(
            change,
            PhaseChange::Changed {
                from: Phase::Waiting,
                to: Phase::Active
            }
        );
        assert!(machine.is_running());

        machine.apply_authoritative(Phase::Paused);
        assert!(!machine.is_running());
        machine.apply_authoritative(Phase::Active);
        assert!(machine.is_running());
    }

    #[test]
    fn ended_is_terminal() {
        let mut machine = PhaseMachine::new();
        machine.apply_authoritative(Phase::Ended);
        let change = machine.apply_authoritative(Phase::Active);
        assert_eq!(
            change,
            PhaseChange::IgnoredTerminal {
                attempted: Phase::Active
            }
        );
        assert_eq!(machine.phase(), Phase::Ended);
    }

    #[test]
    fn unknown_wire_token_keeps_previous_phase() {
        let mut machine = PhaseMachine::new();
        machine.apply_wire("STARTED").unwrap();
        assert!(machine.apply_wire("FINISHED").is_err());
        assert_eq!(machine.phase(), Phase::Active);
    }

    #[test]
    fn duplicate_phase_is_unchanged() {
        let mut machine = PhaseMachine::new();
        machine.apply_authoritative(Phase::Active);
        assert_eq!(
            machine.apply_authoritative(Phase::Active),
            PhaseChange::Unchanged(Phase::Active)
        );
    }

    #[test]
    fn local_requests_are_validated_not_applied() {
        let machine = PhaseMachine::new();
        assert!(machine.validate_request(Phase::Active).is_ok());
        assert!(matches!(
            machine.validate_request(Phase::Voting),
            Err(Error::InvalidTransition { .. })
        ));
        assert_eq!(machine.phase(), Phase::Waiting);
    }
}

//! Developer guardrails and invariants
//!
//! Debug assertions for detecting impossible states during development.
//! These checks are compiled out in release builds.

use std::collections::HashSet;

use crate::models::{Participant, Session};

/// Roster entries must be unique by id
pub fn assert_roster_invariants(roster: &[Participant]) {
    let mut seen = HashSet::new();
    for p in roster {
        debug_assert!(
            seen.insert(p.id.as_str()),
            "Roster contains participant {} more than once",
            p.id
        );
    }
}

/// Validate that a session projection is internally consistent
pub fn assert_session_invariants(session: &Session) {
    debug_assert!(
        session.start_time >= 0,
        "Session {} has negative start time {}",
        session.room_id,
        session.start_time
    );
}

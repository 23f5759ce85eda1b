//! Agora Core Library
//!
//! Domain models, the phase state machine, the countdown engine and the owned
//! session projection for the Agora debate client.

pub mod countdown;
pub mod error;
pub mod invariants;
pub mod models;
pub mod phase;
pub mod state;

pub use countdown::{remaining, Clock, Countdown, Expired, FixedClock, SystemClock};
pub use error::{Error, Result};
pub use models::*;
pub use phase::{PhaseChange, PhaseMachine};
pub use state::SessionState;

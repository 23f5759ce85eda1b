//! Error types for Agora Core

use thiserror::Error;

use crate::models::Phase;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Malformed {topic} message: {reason}")]
    MalformedMessage { topic: String, reason: String },

    #[error("Unknown phase token: {0:?}")]
    UnknownPhase(String),

    #[error("Invalid phase transition: {from} -> {to}")]
    InvalidTransition { from: Phase, to: Phase },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl Error {
    pub fn malformed(topic: impl Into<String>, reason: impl std::fmt::Display) -> Self {
        Error::MalformedMessage {
            topic: topic.into(),
            reason: reason.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;

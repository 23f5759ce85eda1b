//! Network error types

use std::io;

/// Network result type
pub type Result<T> = std::result::Result<T, Error>;

/// Failure to fetch the initial room snapshot. Fatal to room entry.
#[derive(Debug, thiserror::Error)]
pub enum SnapshotError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("{endpoint} returned status {status}")]
    Status { endpoint: String, status: u16 },

    #[error("Room not found: {0}")]
    RoomNotFound(String),

    #[error("Roster lists participant {0} more than once")]
    DuplicateParticipant(String),

    #[error("Invalid status: {0}")]
    InvalidStatus(#[from] agora_core::Error),
}

/// Network errors
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    #[error("Channel connect failed: {0}")]
    ChannelConnect(String),

    #[error("Connection closed")]
    ConnectionClosed,

    #[error("Protocol error: {0}")]
    Protocol(String),

    #[error("Not connected")]
    NotConnected,

    #[error("Snapshot failed: {0}")]
    Snapshot(#[from] SnapshotError),

    #[error(transparent)]
    Core(#[from] agora_core::Error),
}

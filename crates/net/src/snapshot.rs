//! One-shot snapshot fetches over HTTP
//!
//! Status, roster and tally are fetched concurrently; any failure is fatal to
//! room entry. Argument history is best-effort since not every authority
//! serves it.

use agora_core::{duplicate_id, Argument, Participant, StatusUpdate, VoteTally};
use async_trait::async_trait;
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use tracing::{debug, info, warn};

use crate::error::SnapshotError;
use crate::protocol::{StatusPayload, VoteResults};

/// Initial room state fetched before the channel is used
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Snapshot {
    pub status: StatusUpdate,
    pub roster: Vec<Participant>,
    pub tally: VoteTally,
    pub arguments: Vec<Argument>,
}

/// Where room snapshots come from
#[async_trait]
pub trait SnapshotSource: Send + Sync {
    async fn load(&self, room_id: &str) -> Result<Snapshot, SnapshotError>;
}

pub struct HttpSnapshotLoader {
    client: reqwest::Client,
    /// e.g. `http://localhost:8080/api/rooms`
    rooms_url: String,
    fetch_argument_history: bool,
}

impl HttpSnapshotLoader {
    pub fn new(http_base: &str) -> Self {
        Self {
            client: reqwest::Client::new(),
            rooms_url: format!("{}/api/rooms", http_base.trim_end_matches('/')),
            fetch_argument_history: true,
        }
    }

    pub fn with_argument_history(mut self, enabled: bool) -> Self {
        self.fetch_argument_history = enabled;
        self
    }

    fn url(&self, room_id: &str, endpoint: &str) -> String {
        format!("{}/{}/{}", self.rooms_url, room_id, endpoint)
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        room_id: &str,
        endpoint: &str,
    ) -> Result<T, SnapshotError> {
        let url = self.url(room_id, endpoint);
        debug!(url = %url, "Fetching");
        let response = self.client.get(&url).send().await?;
        let status = response.status();
        if status == StatusCode::NOT_FOUND && endpoint == "status" {
            return Err(SnapshotError::RoomNotFound(room_id.to_string()));
        }
        if !status.is_success() {
            return Err(SnapshotError::Status {
                endpoint: endpoint.to_string(),
                status: status.as_u16(),
            });
        }
        Ok(response.json::<T>().await?)
    }

    async fn fetch_status(&self, room_id: &str) -> Result<StatusUpdate, SnapshotError> {
        let payload: StatusPayload = self.get_json(room_id, "status").await?;
        Ok(payload.into_update()?)
    }

    async fn fetch_arguments(&self, room_id: &str) -> Vec<Argument> {
        if !self.fetch_argument_history {
            return Vec::new();
        }
        match self.get_json(room_id, "arguments").await {
            Ok(arguments) => arguments,
            Err(e) => {
                warn!(room_id = %room_id, error = %e, "Argument history unavailable");
                Vec::new()
            }
        }
    }

    /// Ask the authority for a brand new session
    pub async fn create_session(&self) -> Result<StatusUpdate, SnapshotError> {
        let url = format!("{}/create", self.rooms_url);
        let response = self.client.post(&url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(SnapshotError::Status {
                endpoint: "create".to_string(),
                status: status.as_u16(),
            });
        }
        let payload: StatusPayload = response.json().await?;
        let update = payload.into_update()?;
        info!(room_id = ?update.room_id, "Created session");
        Ok(update)
    }
}

#[async_trait]
impl SnapshotSource for HttpSnapshotLoader {
    async fn load(&self, room_id: &str) -> Result<Snapshot, SnapshotError> {
        let (status, roster, votes) = tokio::try_join!(
            self.fetch_status(room_id),
            self.get_json::<Vec<Participant>>(room_id, "participants"),
            self.get_json::<VoteResults>(room_id, "vote-results"),
        )?;
        if let Some(id) = duplicate_id(&roster) {
            return Err(SnapshotError::DuplicateParticipant(id.to_string()));
        }
        let arguments = self.fetch_arguments(room_id).await;
        info!(
            room_id = %room_id,
            phase = %status.phase,
            participants = roster.len(),
            arguments = arguments.len(),
            "Snapshot loaded"
        );
        Ok(Snapshot {
            status,
            roster,
            tally: votes.results,
            arguments,
        })
    }
}

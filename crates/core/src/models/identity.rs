//! Local identity for one room attachment

use rand::Rng;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Who this client is for the lifetime of one attachment. Never persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocalIdentity {
    pub id: String,
    pub name: String,
}

impl LocalIdentity {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
        }
    }

    /// Fresh identity with a random guest name
    pub fn guest() -> Self {
        let suffix = rand::thread_rng().gen_range(0..1000);
        Self::named(format!("Guest-{}", suffix))
    }

    /// Fresh identity with a caller-chosen display name
    pub fn named(name: impl Into<String>) -> Self {
        Self::new(Uuid::new_v4().to_string(), name)
    }
}

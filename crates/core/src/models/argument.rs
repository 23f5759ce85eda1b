//! Argument transcript model

use serde::{Deserialize, Serialize};

use super::Stance;

/// A submitted argument. The side is fixed at submission time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Argument {
    #[serde(default)]
    pub id: String,
    pub participant_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub participant_name: Option<String>,
    pub side: Stance,
    pub text: String,
    /// Epoch milliseconds
    #[serde(default)]
    pub timestamp: i64,
}

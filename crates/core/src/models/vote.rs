//! Vote tally model

use serde::{Deserialize, Serialize};

use super::Stance;

/// Aggregate vote counts, always replaced wholesale
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct VoteTally {
    #[serde(rename = "for", default)]
    pub for_count: u32,
    #[serde(rename = "against", default)]
    pub against_count: u32,
}

impl VoteTally {
    pub fn new(for_count: u32, against_count: u32) -> Self {
        Self {
            for_count,
            against_count,
        }
    }

    pub fn total(&self) -> u32 {
        self.for_count + self.against_count
    }

    /// The leading stance, `None` on a tie
    pub fn leader(&self) -> Option<Stance> {
        match self.for_count.cmp(&self.against_count) {
            std::cmp::Ordering::Greater => Some(Stance::For),
            std::cmp::Ordering::Less => Some(Stance::Against),
            std::cmp::Ordering::Equal => None,
        }
    }
}

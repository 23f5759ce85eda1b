//! Data models for Agora

mod argument;
mod chat;
mod identity;
mod participant;
mod session;
mod vote;

pub use argument::*;
pub use chat::*;
pub use identity::*;
pub use participant::*;
pub use session::*;
pub use vote::*;

use serde::{Deserialize, Deserializer};

/// Treat an explicit JSON `null` like a missing field
pub(crate) fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

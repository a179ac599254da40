//! Domain model for people, timeline entries and the persisted snapshot.
//!
//! # Responsibility
//! - Define the canonical records shared by the store, merge and transfer
//!   layers.
//! - Own the JSON wire shape used by local persistence, cloud objects and
//!   backup files.
//!
//! # Invariants
//! - Record ids are unique inside their collection.
//! - Timestamps are ISO-8601 UTC strings, so string order equals time order.
//! - Unknown JSON fields survive a read/write cycle through `attributes`.

pub mod entry;
pub mod id;
pub mod person;
pub mod snapshot;

use serde::{Deserialize, Deserializer};

/// Treats an explicit JSON `null` like a missing field.
pub(crate) fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

//! Person record.

use super::null_as_default;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// JSON keys owned by `Person` itself; never stored in `attributes`.
pub const PERSON_RESERVED_FIELDS: &[&str] = &["id", "name", "tags", "createdAt", "updatedAt"];

/// One tracked person.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Person {
    /// Stable id, unique within `Snapshot::people`.
    pub id: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub name: String,
    /// Tag names referenced from the global tag set.
    #[serde(default, deserialize_with = "null_as_default")]
    pub tags: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<String>,
    /// Free-form fields (avatar, notes, birthday, ...) kept verbatim.
    #[serde(flatten)]
    pub attributes: Map<String, Value>,
}

impl Person {
    /// Returns whether this person carries `tag`.
    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.iter().any(|value| value == tag)
    }
}

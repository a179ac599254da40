//! Timeline entry record shared by events and chats.
//!
//! # Invariants
//! - `person_ids` keeps the caller's order.
//! - Legacy single-person references (`person_id` / `personId`) are folded
//!   into `person_ids` on read and never written back. When both legacy
//!   keys are present, a usable `person_id` wins over `personId`.

use super::null_as_default;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// JSON keys owned by `Entry` itself; never stored in `attributes`.
pub const ENTRY_RESERVED_FIELDS: &[&str] = &[
    "id",
    "personIds",
    "person_id",
    "personId",
    "time",
    "tags",
    "createdAt",
    "updatedAt",
];

/// Which timeline collection an entry belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryKind {
    /// Something that happened with one or more people.
    Event,
    /// A conversation log entry.
    Chat,
}

impl EntryKind {
    /// Id prefix used for freshly created entries.
    pub fn id_prefix(self) -> &'static str {
        match self {
            Self::Event => "e",
            Self::Chat => "c",
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Event => "event",
            Self::Chat => "chat",
        }
    }
}

/// Event or chat entry. The owning collection decides which one it is.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", from = "EntryWire")]
pub struct Entry {
    /// Stable id, unique within its collection.
    pub id: String,
    /// Referenced person ids, in display order.
    pub person_ids: Vec<String>,
    /// When the entry happened (ISO-8601).
    pub time: String,
    pub tags: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<String>,
    /// Free-form fields (title, content, location, ...) kept verbatim.
    #[serde(flatten)]
    pub attributes: Map<String, Value>,
}

impl Entry {
    pub fn references(&self, person_id: &str) -> bool {
        self.person_ids.iter().any(|id| id == person_id)
    }

    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.iter().any(|value| value == tag)
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct EntryWire {
    id: String,
    #[serde(default, deserialize_with = "null_as_default")]
    person_ids: Vec<String>,
    #[serde(default, rename = "person_id")]
    legacy_snake_person_id: Option<Value>,
    #[serde(default, rename = "personId")]
    legacy_camel_person_id: Option<Value>,
    #[serde(default, deserialize_with = "null_as_default")]
    time: String,
    #[serde(default, deserialize_with = "null_as_default")]
    tags: Vec<String>,
    #[serde(default)]
    created_at: Option<String>,
    #[serde(default)]
    updated_at: Option<String>,
    #[serde(flatten)]
    attributes: Map<String, Value>,
}

impl From<EntryWire> for Entry {
    fn from(wire: EntryWire) -> Self {
        let mut person_ids = wire.person_ids;
        if person_ids.is_empty() {
            let legacy = wire
                .legacy_snake_person_id
                .as_ref()
                .and_then(legacy_id_text)
                .or_else(|| wire.legacy_camel_person_id.as_ref().and_then(legacy_id_text));
            if let Some(legacy) = legacy {
                person_ids.push(legacy);
            }
        }

        Self {
            id: wire.id,
            person_ids,
            time: wire.time,
            tags: wire.tags,
            created_at: wire.created_at,
            updated_at: wire.updated_at,
            attributes: wire.attributes,
        }
    }
}

fn legacy_id_text(value: &Value) -> Option<String> {
    match value {
        Value::String(text) if !text.trim().is_empty() => Some(text.clone()),
        Value::Number(number) => Some(number.to_string()),
        _ => None,
    }
}

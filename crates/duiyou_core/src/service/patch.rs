//! Typed creation inputs and update patches.
//!
//! # Invariants
//! - Patches only name fields callers may change; `id` and `createdAt` are
//!   never patchable.
//! - JSON patches reject unknown top-level fields.
//! - Attribute patches may not shadow reserved record fields.

use crate::model::entry::ENTRY_RESERVED_FIELDS;
use crate::model::person::PERSON_RESERVED_FIELDS;
use serde::Deserialize;
use serde_json::{Map, Value};
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Input for creating a person.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct NewPerson {
    pub name: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub attributes: Map<String, Value>,
}

impl NewPerson {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }
}

/// Input for creating an event or chat.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct NewEntry {
    pub person_ids: Vec<String>,
    /// Defaults to the creation time when absent.
    #[serde(default)]
    pub time: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub attributes: Map<String, Value>,
}

/// Partial update for a person. `None` leaves a field unchanged.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct PersonPatch {
    pub name: Option<String>,
    pub tags: Option<Vec<String>>,
    /// Shallow-merged into existing attributes; `null` removes a key.
    pub attributes: Option<Map<String, Value>>,
}

impl PersonPatch {
    /// Parses a JSON patch object from an untyped caller.
    pub fn from_json(payload: &str) -> Result<Self, PatchError> {
        serde_json::from_str(payload).map_err(PatchError::Parse)
    }
}

/// Partial update for an event or chat. `None` leaves a field unchanged.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct EntryPatch {
    pub person_ids: Option<Vec<String>>,
    pub time: Option<String>,
    pub tags: Option<Vec<String>>,
    /// Shallow-merged into existing attributes; `null` removes a key.
    pub attributes: Option<Map<String, Value>>,
}

impl EntryPatch {
    /// Parses a JSON patch object from an untyped caller.
    pub fn from_json(payload: &str) -> Result<Self, PatchError> {
        serde_json::from_str(payload).map_err(PatchError::Parse)
    }
}

/// Invalid creation input or patch.
#[derive(Debug)]
pub enum PatchError {
    /// Patch JSON is malformed or names an unknown field.
    Parse(serde_json::Error),
    /// An attribute key collides with a record field.
    ReservedAttribute(String),
    /// Person name is blank.
    EmptyName,
    /// Event/chat must reference at least one person.
    NoPersonReference,
    /// Tag name is blank.
    EmptyTag,
}

impl Display for PatchError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Parse(err) => write!(f, "invalid patch: {err}"),
            Self::ReservedAttribute(key) => {
                write!(f, "attribute `{key}` is reserved for a record field")
            }
            Self::EmptyName => write!(f, "person name cannot be empty"),
            Self::NoPersonReference => write!(f, "entry must reference at least one person"),
            Self::EmptyTag => write!(f, "tag name cannot be empty"),
        }
    }
}

impl Error for PatchError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Parse(err) => Some(err),
            _ => None,
        }
    }
}

pub(crate) fn check_person_attributes(attributes: &Map<String, Value>) -> Result<(), PatchError> {
    check_reserved(attributes, PERSON_RESERVED_FIELDS)
}

pub(crate) fn check_entry_attributes(attributes: &Map<String, Value>) -> Result<(), PatchError> {
    check_reserved(attributes, ENTRY_RESERVED_FIELDS)
}

fn check_reserved(attributes: &Map<String, Value>, reserved: &[&str]) -> Result<(), PatchError> {
    match attributes.keys().find(|key| reserved.contains(&key.as_str())) {
        Some(key) => Err(PatchError::ReservedAttribute(key.clone())),
        None => Ok(()),
    }
}

/// Applies a shallow attribute patch; `null` values delete keys.
pub(crate) fn merge_attributes(target: &mut Map<String, Value>, patch: Map<String, Value>) {
    for (key, value) in patch {
        if value.is_null() {
            target.remove(&key);
        } else {
            target.insert(key, value);
        }
    }
}

/// Drops empty values and exact duplicates, keeping first occurrence order.
pub(crate) fn dedup_preserving_order(values: Vec<String>) -> Vec<String> {
    let mut unique: Vec<String> = Vec::with_capacity(values.len());
    for value in values {
        if !value.is_empty() && !unique.contains(&value) {
            unique.push(value);
        }
    }
    unique
}

//! Snapshot: the unit of persistence, export and sync.
//!
//! # Responsibility
//! - Define the full dataset shape and its default value.
//! - Parse possibly partial JSON documents (older exports, remote objects).
//! - Encode the local persistence form and the backup document form.
//!
//! # Invariants
//! - Top-level backup keys are `people`, `events`, `chats`, `tags`,
//!   `exportTime`, `syncTime`; they must stay stable for old files.
//! - Array order is preserved through encode/parse.

use super::entry::Entry;
use super::person::Person;
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Tag set a fresh installation starts with.
pub const DEFAULT_TAGS: [&str; 3] = ["朋友", "家人", "同事"];

/// Complete serializable state of the tracker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub people: Vec<Person>,
    pub events: Vec<Entry>,
    pub chats: Vec<Entry>,
    pub tags: Vec<String>,
}

impl Default for Snapshot {
    fn default() -> Self {
        Self {
            people: Vec::new(),
            events: Vec::new(),
            chats: Vec::new(),
            tags: DEFAULT_TAGS.iter().map(|tag| (*tag).to_string()).collect(),
        }
    }
}

impl Snapshot {
    /// Snapshot with no records and no tags.
    pub fn empty() -> Self {
        Self {
            people: Vec::new(),
            events: Vec::new(),
            chats: Vec::new(),
            tags: Vec::new(),
        }
    }

    /// Compact JSON used for the local durable store.
    pub fn to_json(&self) -> Result<String, SnapshotError> {
        serde_json::to_string(self).map_err(SnapshotError::Encode)
    }

    /// Pretty-printed backup document with export and sync stamps.
    pub fn to_backup_json(
        &self,
        export_time: &str,
        sync_time: Option<&str>,
    ) -> Result<String, SnapshotError> {
        let document = BackupDocumentRef {
            people: &self.people,
            events: &self.events,
            chats: &self.chats,
            tags: &self.tags,
            export_time,
            sync_time,
        };
        serde_json::to_string_pretty(&document).map_err(SnapshotError::Encode)
    }
}

/// Parsed JSON document whose collections may each be absent.
///
/// Backup files, remote objects and the local store all decode into this
/// shape; each caller decides how to fill the gaps.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SnapshotDocument {
    #[serde(default)]
    pub people: Option<Vec<Person>>,
    #[serde(default)]
    pub events: Option<Vec<Entry>>,
    #[serde(default)]
    pub chats: Option<Vec<Entry>>,
    #[serde(default)]
    pub tags: Option<Vec<String>>,
    #[serde(default)]
    pub export_time: Option<String>,
    #[serde(default)]
    pub sync_time: Option<String>,
}

impl SnapshotDocument {
    /// Parses a JSON payload; the top level must be an object.
    pub fn parse(payload: &str) -> Result<Self, SnapshotError> {
        serde_json::from_str(payload).map_err(SnapshotError::Parse)
    }

    /// Fills absent collections with empty ones (tags included).
    pub fn into_snapshot(self) -> Snapshot {
        Snapshot {
            people: self.people.unwrap_or_default(),
            events: self.events.unwrap_or_default(),
            chats: self.chats.unwrap_or_default(),
            tags: self.tags.unwrap_or_default(),
        }
    }

    /// Fills absent collections from `Snapshot::default()`.
    pub fn into_snapshot_or_default(self) -> Snapshot {
        let defaults = Snapshot::default();
        Snapshot {
            people: self.people.unwrap_or(defaults.people),
            events: self.events.unwrap_or(defaults.events),
            chats: self.chats.unwrap_or(defaults.chats),
            tags: self.tags.unwrap_or(defaults.tags),
        }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct BackupDocumentRef<'a> {
    people: &'a [Person],
    events: &'a [Entry],
    chats: &'a [Entry],
    tags: &'a [String],
    export_time: &'a str,
    sync_time: Option<&'a str>,
}

/// JSON codec failure for snapshot payloads.
#[derive(Debug)]
pub enum SnapshotError {
    /// Payload is not valid JSON or does not match the snapshot shape.
    Parse(serde_json::Error),
    /// Snapshot could not be encoded.
    Encode(serde_json::Error),
}

impl Display for SnapshotError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Parse(err) => write!(f, "invalid snapshot payload: {err}"),
            Self::Encode(err) => write!(f, "failed to encode snapshot: {err}"),
        }
    }
}

impl Error for SnapshotError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Parse(err) | Self::Encode(err) => Some(err),
        }
    }
}

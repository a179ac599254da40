//! Snapshot merge: reconciles a local and a remote snapshot into one.
//!
//! # Invariants
//! - Pure: inputs are borrowed, nothing outside the return value changes.
//! - Every id present in either input appears exactly once in the output.
//! - Per id, the record with the greater version stamp wins, where the
//!   stamp is `updatedAt`, else `createdAt`, else the empty string. An
//!   empty `updatedAt` counts as absent.
//!   Stamps compare as strings (fixed-width ISO-8601).
//! - Equal stamps keep the local record, which includes the case where
//!   neither side carries any timestamp.
//! - Output order: local records in local order (winners replace in place),
//!   then remote-only records in remote order. Tags follow the same rule.

use crate::model::entry::Entry;
use crate::model::person::Person;
use crate::model::snapshot::{Snapshot, SnapshotDocument, SnapshotError};
use std::collections::{HashMap, HashSet};

/// Record with an id and a last-writer version stamp.
pub trait Versioned: Clone {
    fn record_id(&self) -> &str;

    /// `updatedAt`, falling back to `createdAt`, falling back to `""`.
    fn version_stamp(&self) -> &str;
}

impl Versioned for Person {
    fn record_id(&self) -> &str {
        &self.id
    }

    fn version_stamp(&self) -> &str {
        stamp(self.updated_at.as_deref(), self.created_at.as_deref())
    }
}

impl Versioned for Entry {
    fn record_id(&self) -> &str {
        &self.id
    }

    fn version_stamp(&self) -> &str {
        stamp(self.updated_at.as_deref(), self.created_at.as_deref())
    }
}

fn stamp<'a>(updated_at: Option<&'a str>, created_at: Option<&'a str>) -> &'a str {
    let present = |value: &&str| !value.is_empty();
    updated_at
        .filter(present)
        .or(created_at.filter(present))
        .unwrap_or("")
}

/// Per-collection counts describing what a merge did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MergeStats {
    /// Records that exist only on the remote side.
    pub added: usize,
    /// Records present on both sides where the remote copy won.
    pub replaced: usize,
}

/// What a merge changed relative to the local snapshot.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MergeReport {
    pub people: MergeStats,
    pub events: MergeStats,
    pub chats: MergeStats,
    pub tags_added: usize,
}

/// Merge result plus its report.
#[derive(Debug, Clone, PartialEq)]
pub struct MergeOutcome {
    pub snapshot: Snapshot,
    pub report: MergeReport,
}

/// Merges two snapshots.
pub fn merge_snapshots(local: &Snapshot, remote: &Snapshot) -> Snapshot {
    merge_with_stats(local, remote).snapshot
}

/// Merges two snapshots and reports what changed relative to `local`.
pub fn merge_with_stats(local: &Snapshot, remote: &Snapshot) -> MergeOutcome {
    let (people, people_stats) = merge_records(&local.people, &remote.people);
    let (events, events_stats) = merge_records(&local.events, &remote.events);
    let (chats, chats_stats) = merge_records(&local.chats, &remote.chats);
    let (tags, tags_added) = union_tags(&local.tags, &remote.tags);

    MergeOutcome {
        snapshot: Snapshot {
            people,
            events,
            chats,
            tags,
        },
        report: MergeReport {
            people: people_stats,
            events: events_stats,
            chats: chats_stats,
            tags_added,
        },
    }
}

/// Parses a remote payload and merges it over `local`.
///
/// Collections absent from the payload count as empty.
///
/// # Errors
/// - `SnapshotError::Parse` when the payload is not a snapshot document.
pub fn merge_remote_payload(
    local: &Snapshot,
    remote_payload: &str,
) -> Result<MergeOutcome, SnapshotError> {
    let remote = SnapshotDocument::parse(remote_payload)?.into_snapshot();
    Ok(merge_with_stats(local, &remote))
}

/// Collapses duplicate ids inside one snapshot, keeping the newest copy.
pub fn collapse_duplicates(snapshot: &Snapshot) -> Snapshot {
    merge_snapshots(snapshot, &Snapshot::empty())
}

fn merge_records<T: Versioned>(local: &[T], remote: &[T]) -> (Vec<T>, MergeStats) {
    let mut merged: Vec<T> = Vec::with_capacity(local.len() + remote.len());
    let mut positions: HashMap<String, usize> = HashMap::with_capacity(merged.capacity());

    for record in local {
        absorb(&mut merged, &mut positions, record);
    }

    let local_count = merged.len();
    let mut stats = MergeStats::default();
    for record in remote {
        match absorb(&mut merged, &mut positions, record) {
            Absorbed::Inserted => stats.added += 1,
            Absorbed::Replaced(position) if position < local_count => stats.replaced += 1,
            Absorbed::Replaced(_) | Absorbed::Kept => {}
        }
    }

    (merged, stats)
}

enum Absorbed {
    Inserted,
    Replaced(usize),
    Kept,
}

fn absorb<T: Versioned>(
    merged: &mut Vec<T>,
    positions: &mut HashMap<String, usize>,
    record: &T,
) -> Absorbed {
    match positions.get(record.record_id()) {
        Some(&position) => {
            if record.version_stamp() > merged[position].version_stamp() {
                merged[position] = record.clone();
                Absorbed::Replaced(position)
            } else {
                Absorbed::Kept
            }
        }
        None => {
            positions.insert(record.record_id().to_string(), merged.len());
            merged.push(record.clone());
            Absorbed::Inserted
        }
    }
}

fn union_tags(local: &[String], remote: &[String]) -> (Vec<String>, usize) {
    let mut seen: HashSet<&str> = HashSet::with_capacity(local.len() + remote.len());
    let mut tags = Vec::with_capacity(local.len() + remote.len());
    for tag in local {
        if seen.insert(tag.as_str()) {
            tags.push(tag.clone());
        }
    }
    let local_count = tags.len();
    for tag in remote {
        if seen.insert(tag.as_str()) {
            tags.push(tag.clone());
        }
    }
    let added = tags.len() - local_count;
    (tags, added)
}

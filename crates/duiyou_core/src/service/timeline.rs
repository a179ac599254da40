//! Timeline projection over events and chats.
//!
//! # Invariants
//! - Items are ordered by `time` descending (most recent first).
//! - Equal times keep insertion order: events before chats, each in
//!   collection order.
//! - Unparseable times sort after every parseable one.
//! - References to missing people are dropped from `people` silently.

use crate::model::entry::{Entry, EntryKind};
use crate::model::person::Person;
use crate::model::snapshot::Snapshot;
use chrono::{DateTime, NaiveDateTime, Utc};
use std::collections::HashMap;

const NAIVE_TIME_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M",
];

/// One event or chat with its resolved people.
#[derive(Debug, Clone, PartialEq)]
pub struct TimelineItem<'a> {
    pub kind: EntryKind,
    pub entry: &'a Entry,
    /// Resolved people in `entry.person_ids` order.
    pub people: Vec<&'a Person>,
    /// Parsed `entry.time`, `None` when unparseable.
    pub display_time: Option<DateTime<Utc>>,
}

impl TimelineItem<'_> {
    /// Whether the entry or any of its people carries `tag`.
    pub fn matches_tag(&self, tag: &str) -> bool {
        self.entry.has_tag(tag) || self.people.iter().any(|person| person.has_tag(tag))
    }
}

/// Builds the full timeline for a snapshot.
pub fn build_timeline(snapshot: &Snapshot) -> Vec<TimelineItem<'_>> {
    let people_by_id: HashMap<&str, &Person> = snapshot
        .people
        .iter()
        .map(|person| (person.id.as_str(), person))
        .collect();

    let mut items: Vec<TimelineItem<'_>> = snapshot
        .events
        .iter()
        .map(|entry| (EntryKind::Event, entry))
        .chain(snapshot.chats.iter().map(|entry| (EntryKind::Chat, entry)))
        .map(|(kind, entry)| TimelineItem {
            kind,
            entry,
            people: entry
                .person_ids
                .iter()
                .filter_map(|id| people_by_id.get(id.as_str()).copied())
                .collect(),
            display_time: parse_entry_time(&entry.time),
        })
        .collect();

    // `sort_by` is stable, which keeps insertion order for equal times.
    items.sort_by(|left, right| right.display_time.cmp(&left.display_time));
    items
}

/// Parses an entry time as RFC 3339, or as a naive UTC date-time.
pub fn parse_entry_time(value: &str) -> Option<DateTime<Utc>> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return None;
    }
    if let Ok(parsed) = DateTime::parse_from_rfc3339(trimmed) {
        return Some(parsed.with_timezone(&Utc));
    }
    NAIVE_TIME_FORMATS.iter().find_map(|format| {
        NaiveDateTime::parse_from_str(trimmed, format)
            .ok()
            .map(|naive| naive.and_utc())
    })
}

#[cfg(test)]
mod tests {
    use super::parse_entry_time;

    #[test]
    fn parses_rfc3339_and_naive_inputs() {
        let utc = parse_entry_time("2024-01-02T03:04:05.678Z").expect("rfc3339 should parse");
        let offset = parse_entry_time("2024-01-02T11:04:05.678+08:00").expect("offset should parse");
        assert_eq!(utc, offset);
        assert!(parse_entry_time("2024-01-02 03:04").is_some());
        assert!(parse_entry_time("yesterday").is_none());
        assert!(parse_entry_time("").is_none());
    }
}

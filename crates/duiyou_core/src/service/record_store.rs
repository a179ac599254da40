//! Record store: the single owner of in-memory tracker state.
//!
//! # Responsibility
//! - Provide CRUD over people, events, chats and tags.
//! - Keep referential integrity on person deletion and tag rewrites.
//! - Write the full snapshot through to the local store after every
//!   mutation.
//!
//! # Invariants
//! - Ids are unique inside each collection.
//! - `createdAt` never changes after creation; every mutation refreshes
//!   `updatedAt` on each record it touches.
//! - Inputs are validated before any state changes.
//! - A mutation that changes nothing does not persist.

use super::patch::{
    check_entry_attributes, check_person_attributes, dedup_preserving_order, merge_attributes,
    EntryPatch, NewEntry, NewPerson, PatchError, PersonPatch,
};
use super::timeline::{build_timeline, TimelineItem};
use crate::model::entry::{Entry, EntryKind};
use crate::model::id::{generate_id, now_timestamp};
use crate::model::person::Person;
use crate::model::snapshot::{Snapshot, SnapshotDocument, SnapshotError};
use crate::repo::kv_repo::{KeyValueStore, RepoError};
use crate::repo::snapshot_repo::{
    last_sync_time, load_snapshot, record_sync_time, save_snapshot, PersistError,
};
use crate::sync::merge::{collapse_duplicates, merge_with_stats, MergeReport, Versioned};
use log::{debug, info, warn};
use std::error::Error;
use std::fmt::{Display, Formatter};

pub type StoreResult<T> = Result<T, StoreError>;

/// Failure of a record store operation.
#[derive(Debug)]
pub enum StoreError {
    /// Input rejected before any state changed.
    Invalid(PatchError),
    /// State changed in memory but could not be written through.
    Persist(PersistError),
    /// Import/merge payload could not be parsed; state is untouched.
    Parse(SnapshotError),
    /// Auxiliary key/value access failed.
    Repo(RepoError),
}

impl Display for StoreError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Invalid(err) => write!(f, "{err}"),
            Self::Persist(err) => write!(f, "{err}"),
            Self::Parse(err) => write!(f, "{err}"),
            Self::Repo(err) => write!(f, "{err}"),
        }
    }
}

impl Error for StoreError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Invalid(err) => Some(err),
            Self::Persist(err) => Some(err),
            Self::Parse(err) => Some(err),
            Self::Repo(err) => Some(err),
        }
    }
}

impl From<PatchError> for StoreError {
    fn from(value: PatchError) -> Self {
        Self::Invalid(value)
    }
}

impl From<PersistError> for StoreError {
    fn from(value: PersistError) -> Self {
        Self::Persist(value)
    }
}

impl From<RepoError> for StoreError {
    fn from(value: RepoError) -> Self {
        Self::Repo(value)
    }
}

/// Record collection selector for kind-generic operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RecordKind {
    Person,
    Event,
    Chat,
}

impl From<EntryKind> for RecordKind {
    fn from(value: EntryKind) -> Self {
        match value {
            EntryKind::Event => Self::Event,
            EntryKind::Chat => Self::Chat,
        }
    }
}

/// Collection sizes after an import.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ImportSummary {
    pub people: usize,
    pub events: usize,
    pub chats: usize,
    pub tags: usize,
}

/// In-memory tracker state with write-through persistence.
pub struct RecordStore<K: KeyValueStore> {
    kv: K,
    state: Snapshot,
}

impl<K: KeyValueStore> RecordStore<K> {
    /// Loads the saved snapshot (or defaults) from `kv`.
    pub fn open(kv: K) -> Self {
        let state = load_snapshot(&kv);
        Self { kv, state }
    }

    /// Wraps an explicit starting state without reading `kv`.
    pub fn with_snapshot(kv: K, state: Snapshot) -> Self {
        Self { kv, state }
    }

    pub fn snapshot(&self) -> &Snapshot {
        &self.state
    }

    pub fn people(&self) -> &[Person] {
        &self.state.people
    }

    pub fn events(&self) -> &[Entry] {
        &self.state.events
    }

    pub fn chats(&self) -> &[Entry] {
        &self.state.chats
    }

    pub fn tags(&self) -> &[String] {
        &self.state.tags
    }

    /// The backing key/value store.
    pub fn kv(&self) -> &K {
        &self.kv
    }

    pub fn entries(&self, kind: EntryKind) -> &[Entry] {
        match kind {
            EntryKind::Event => &self.state.events,
            EntryKind::Chat => &self.state.chats,
        }
    }

    pub fn get_person(&self, id: &str) -> Option<&Person> {
        self.state.people.iter().find(|person| person.id == id)
    }

    pub fn get_entry(&self, kind: EntryKind, id: &str) -> Option<&Entry> {
        self.entries(kind).iter().find(|entry| entry.id == id)
    }

    /// Creates a person with a fresh id and `createdAt`.
    pub fn create_person(&mut self, input: NewPerson) -> StoreResult<Person> {
        let name = input.name.trim().to_string();
        if name.is_empty() {
            return Err(PatchError::EmptyName.into());
        }
        check_person_attributes(&input.attributes)?;

        let person = Person {
            id: self.fresh_id("p", |state, id| state.people.iter().any(|p| p.id == id)),
            name,
            tags: normalize_tags(input.tags),
            created_at: Some(now_timestamp()),
            updated_at: None,
            attributes: input.attributes,
        };
        self.state.people.push(person.clone());
        debug!("event=record_create module=store kind=person");
        self.persist()?;
        Ok(person)
    }

    /// Creates an event or chat with a fresh id and `createdAt`.
    ///
    /// `time` defaults to the creation time.
    pub fn create_entry(&mut self, kind: EntryKind, input: NewEntry) -> StoreResult<Entry> {
        let person_ids = dedup_preserving_order(input.person_ids);
        if person_ids.is_empty() {
            return Err(PatchError::NoPersonReference.into());
        }
        check_entry_attributes(&input.attributes)?;

        let created_at = now_timestamp();
        let entry = Entry {
            id: self.fresh_id(kind.id_prefix(), |state, id| {
                entries_of(state, kind).iter().any(|e| e.id == id)
            }),
            person_ids,
            time: input
                .time
                .filter(|time| !time.trim().is_empty())
                .unwrap_or_else(|| created_at.clone()),
            tags: normalize_tags(input.tags),
            created_at: Some(created_at),
            updated_at: None,
            attributes: input.attributes,
        };
        entries_of_mut(&mut self.state, kind).push(entry.clone());
        debug!("event=record_create module=store kind={}", kind.as_str());
        self.persist()?;
        Ok(entry)
    }

    /// Applies `patch` to person `id`; absent ids are a no-op.
    pub fn update_person(&mut self, id: &str, patch: PersonPatch) -> StoreResult<()> {
        let name = match patch.name {
            Some(name) => {
                let trimmed = name.trim().to_string();
                if trimmed.is_empty() {
                    return Err(PatchError::EmptyName.into());
                }
                Some(trimmed)
            }
            None => None,
        };
        if let Some(attributes) = patch.attributes.as_ref() {
            check_person_attributes(attributes)?;
        }

        let Some(person) = self.state.people.iter_mut().find(|p| p.id == id) else {
            return Ok(());
        };
        if let Some(name) = name {
            person.name = name;
        }
        if let Some(tags) = patch.tags {
            person.tags = normalize_tags(tags);
        }
        if let Some(attributes) = patch.attributes {
            merge_attributes(&mut person.attributes, attributes);
        }
        person.updated_at = Some(now_timestamp());
        self.persist()
    }

    /// Applies `patch` to entry `id` of `kind`; absent ids are a no-op.
    pub fn update_entry(&mut self, kind: EntryKind, id: &str, patch: EntryPatch) -> StoreResult<()> {
        let person_ids = match patch.person_ids {
            Some(ids) => {
                let ids = dedup_preserving_order(ids);
                if ids.is_empty() {
                    return Err(PatchError::NoPersonReference.into());
                }
                Some(ids)
            }
            None => None,
        };
        if let Some(attributes) = patch.attributes.as_ref() {
            check_entry_attributes(attributes)?;
        }

        let Some(entry) = entries_of_mut(&mut self.state, kind)
            .iter_mut()
            .find(|e| e.id == id)
        else {
            return Ok(());
        };
        if let Some(ids) = person_ids {
            entry.person_ids = ids;
        }
        if let Some(time) = patch.time {
            entry.time = time;
        }
        if let Some(tags) = patch.tags {
            entry.tags = normalize_tags(tags);
        }
        if let Some(attributes) = patch.attributes {
            merge_attributes(&mut entry.attributes, attributes);
        }
        entry.updated_at = Some(now_timestamp());
        self.persist()
    }

    /// Deletes one record.
    ///
    /// Deleting a person also removes every event/chat whose only
    /// reference was that person and strips the id from shared entries.
    pub fn delete(&mut self, kind: RecordKind, id: &str) -> StoreResult<()> {
        let removed = match kind {
            RecordKind::Person => self.delete_person(id),
            RecordKind::Event => remove_by_id(&mut self.state.events, id),
            RecordKind::Chat => remove_by_id(&mut self.state.chats, id),
        };
        if !removed {
            return Ok(());
        }
        self.persist()
    }

    fn delete_person(&mut self, id: &str) -> bool {
        if !remove_by_id(&mut self.state.people, id) {
            return false;
        }

        let now = now_timestamp();
        let mut removed_entries = 0usize;
        let mut stripped_entries = 0usize;
        for entries in [&mut self.state.events, &mut self.state.chats] {
            entries.retain_mut(|entry| {
                if !entry.references(id) {
                    return true;
                }
                entry.person_ids.retain(|person_id| person_id != id);
                if entry.person_ids.is_empty() {
                    removed_entries += 1;
                    return false;
                }
                entry.updated_at = Some(now.clone());
                stripped_entries += 1;
                true
            });
        }
        info!(
            "event=person_delete module=store status=ok removed_entries={} stripped_entries={}",
            removed_entries, stripped_entries
        );
        true
    }

    /// Adds a tag to the global set; existing names are a no-op.
    pub fn add_tag(&mut self, name: &str) -> StoreResult<()> {
        let name = name.trim();
        if name.is_empty() {
            return Err(PatchError::EmptyTag.into());
        }
        if self.state.tags.iter().any(|tag| tag == name) {
            return Ok(());
        }
        self.state.tags.push(name.to_string());
        self.persist()
    }

    /// Removes a tag from the global set and from every record.
    pub fn delete_tag(&mut self, name: &str) -> StoreResult<()> {
        let before = self.state.tags.len();
        self.state.tags.retain(|tag| tag != name);
        let mut changed = self.state.tags.len() != before;

        let touched = self.rewrite_tag_references(|tags| {
            let count = tags.len();
            tags.retain(|tag| tag != name);
            tags.len() != count
        });
        changed |= touched > 0;

        if !changed {
            return Ok(());
        }
        debug!("event=tag_delete module=store status=ok touched_records={touched}");
        self.persist()
    }

    /// Renames a tag everywhere; absent `old` is a no-op.
    ///
    /// Renaming onto an existing name merges the two tags.
    pub fn rename_tag(&mut self, old: &str, new: &str) -> StoreResult<()> {
        let new = new.trim();
        if new.is_empty() {
            return Err(PatchError::EmptyTag.into());
        }
        let Some(position) = self.state.tags.iter().position(|tag| tag == old) else {
            return Ok(());
        };
        if old == new {
            return Ok(());
        }

        if self.state.tags.iter().any(|tag| tag == new) {
            self.state.tags.remove(position);
        } else {
            self.state.tags[position] = new.to_string();
        }

        let touched = self.rewrite_tag_references(|tags| {
            if !tags.iter().any(|tag| tag == old) {
                return false;
            }
            let renamed: Vec<String> = tags
                .drain(..)
                .map(|tag| if tag == old { new.to_string() } else { tag })
                .collect();
            *tags = dedup_preserving_order(renamed);
            true
        });
        debug!("event=tag_rename module=store status=ok touched_records={touched}");
        self.persist()
    }

    /// Applies `rewrite` to every tag list and touches changed records.
    fn rewrite_tag_references(&mut self, rewrite: impl Fn(&mut Vec<String>) -> bool) -> usize {
        let now = now_timestamp();
        let mut touched = 0usize;
        for person in &mut self.state.people {
            if rewrite(&mut person.tags) {
                person.updated_at = Some(now.clone());
                touched += 1;
            }
        }
        for entry in self.state.events.iter_mut().chain(self.state.chats.iter_mut()) {
            if rewrite(&mut entry.tags) {
                entry.updated_at = Some(now.clone());
                touched += 1;
            }
        }
        touched
    }

    /// All events and chats, most recent first.
    pub fn timeline(&self) -> Vec<TimelineItem<'_>> {
        build_timeline(&self.state)
    }

    /// Timeline items that reference `person_id`.
    pub fn timeline_by_person(&self, person_id: &str) -> Vec<TimelineItem<'_>> {
        build_timeline(&self.state)
            .into_iter()
            .filter(|item| item.entry.references(person_id))
            .collect()
    }

    /// Timeline items tagged `tag` directly or through one of their people.
    pub fn timeline_by_tag(&self, tag: &str) -> Vec<TimelineItem<'_>> {
        build_timeline(&self.state)
            .into_iter()
            .filter(|item| item.matches_tag(tag))
            .collect()
    }

    /// Replaces the whole state, e.g. with a merge result.
    pub fn replace_snapshot(&mut self, snapshot: Snapshot) -> StoreResult<()> {
        self.state = snapshot;
        self.persist()
    }

    /// Replaces each collection present in `payload`.
    ///
    /// Absent collections are left untouched. On parse failure nothing
    /// changes.
    pub fn import_payload(&mut self, payload: &str) -> StoreResult<ImportSummary> {
        let document = SnapshotDocument::parse(payload).map_err(|err| {
            warn!("event=import module=store status=error error_code=parse_failed");
            StoreError::Parse(err)
        })?;

        let mut next = self.state.clone();
        if let Some(people) = document.people {
            next.people = people;
        }
        if let Some(events) = document.events {
            next.events = events;
        }
        if let Some(chats) = document.chats {
            next.chats = chats;
        }
        if let Some(tags) = document.tags {
            next.tags = tags;
        }
        let next = collapse_duplicates(&next);

        let summary = ImportSummary {
            people: next.people.len(),
            events: next.events.len(),
            chats: next.chats.len(),
            tags: next.tags.len(),
        };
        self.replace_snapshot(next)?;
        info!(
            "event=import module=store status=ok people={} events={} chats={} tags={}",
            summary.people, summary.events, summary.chats, summary.tags
        );
        Ok(summary)
    }

    /// Merges a remote payload into the current state and persists.
    ///
    /// On parse failure nothing changes.
    pub fn merge_payload(&mut self, payload: &str) -> StoreResult<MergeReport> {
        let remote = SnapshotDocument::parse(payload)
            .map_err(|err| {
                warn!("event=merge module=store status=error error_code=parse_failed");
                StoreError::Parse(err)
            })?
            .into_snapshot();
        let outcome = merge_with_stats(&self.state, &remote);
        self.replace_snapshot(outcome.snapshot)?;
        let report = outcome.report;
        info!(
            "event=merge module=store status=ok people_added={} people_replaced={} events_added={} events_replaced={} chats_added={} chats_replaced={} tags_added={}",
            report.people.added,
            report.people.replaced,
            report.events.added,
            report.events.replaced,
            report.chats.added,
            report.chats.replaced,
            report.tags_added
        );
        Ok(report)
    }

    /// Pretty backup document stamped with now and the last sync time.
    pub fn export_payload(&self) -> StoreResult<String> {
        let synced_at = self.last_sync_time()?;
        self.state
            .to_backup_json(&now_timestamp(), synced_at.as_deref())
            .map_err(|err| StoreError::Persist(PersistError::Encode(err)))
    }

    pub fn last_sync_time(&self) -> StoreResult<Option<String>> {
        Ok(last_sync_time(&self.kv)?)
    }

    pub fn record_sync(&self, synced_at: &str) -> StoreResult<()> {
        Ok(record_sync_time(&self.kv, synced_at)?)
    }

    /// Writes the full current snapshot to the local store.
    pub fn persist(&self) -> StoreResult<()> {
        save_snapshot(&self.kv, &self.state)?;
        Ok(())
    }

    fn fresh_id(&self, prefix: &str, taken: impl Fn(&Snapshot, &str) -> bool) -> String {
        loop {
            let id = generate_id(prefix);
            if !taken(&self.state, &id) {
                return id;
            }
        }
    }
}

fn entries_of(state: &Snapshot, kind: EntryKind) -> &[Entry] {
    match kind {
        EntryKind::Event => &state.events,
        EntryKind::Chat => &state.chats,
    }
}

fn entries_of_mut(state: &mut Snapshot, kind: EntryKind) -> &mut Vec<Entry> {
    match kind {
        EntryKind::Event => &mut state.events,
        EntryKind::Chat => &mut state.chats,
    }
}

fn remove_by_id<T: Versioned>(records: &mut Vec<T>, id: &str) -> bool {
    let before = records.len();
    records.retain(|record| record.record_id() != id);
    records.len() != before
}

fn normalize_tags(tags: Vec<String>) -> Vec<String> {
    dedup_preserving_order(tags.into_iter().map(|tag| tag.trim().to_string()).collect())
}

use duiyou_core::db::open_db_in_memory;
use duiyou_core::repo::snapshot_repo::{CORRUPT_SNAPSHOT_KEY, SNAPSHOT_KEY};
use duiyou_core::{
    EntryKind, EntryPatch, KeyValueStore, MemoryKvStore, NewEntry, NewPerson, PatchError,
    PersonPatch, RecordKind, RecordStore, Snapshot, SqliteKvStore, StoreError, DEFAULT_TAGS,
};
use serde_json::json;

fn entry_for(person_ids: &[&str], time: &str) -> NewEntry {
    NewEntry {
        person_ids: person_ids.iter().map(|id| id.to_string()).collect(),
        time: Some(time.to_string()),
        ..NewEntry::default()
    }
}

#[test]
fn fresh_store_starts_with_default_tags() {
    let store = RecordStore::open(MemoryKvStore::new());

    assert!(store.people().is_empty());
    assert!(store.events().is_empty());
    assert!(store.chats().is_empty());
    assert_eq!(store.tags(), DEFAULT_TAGS.map(String::from).as_slice());
}

#[test]
fn created_records_survive_reopen_from_sqlite() {
    let conn = open_db_in_memory().unwrap();
    let person_id = {
        let mut store = RecordStore::open(SqliteKvStore::new(&conn));
        let person = store.create_person(NewPerson::named("Alice")).unwrap();
        store
            .create_entry(EntryKind::Chat, entry_for(&[&person.id], "2024-03-01T10:00:00Z"))
            .unwrap();
        person.id
    };

    let reopened = RecordStore::open(SqliteKvStore::new(&conn));
    assert_eq!(reopened.people().len(), 1);
    assert_eq!(reopened.people()[0].id, person_id);
    assert_eq!(reopened.chats().len(), 1);
    assert_eq!(reopened.chats()[0].person_ids, vec![person_id]);
}

#[test]
fn create_assigns_prefixed_ids_and_created_at() {
    let mut store = RecordStore::open(MemoryKvStore::new());

    let person = store.create_person(NewPerson::named("  Bob  ")).unwrap();
    assert!(person.id.starts_with("p_"));
    assert_eq!(person.name, "Bob");
    assert!(person.created_at.is_some());
    assert!(person.updated_at.is_none());

    let event = store
        .create_entry(EntryKind::Event, entry_for(&[&person.id], "2024-01-01"))
        .unwrap();
    let chat = store
        .create_entry(
            EntryKind::Chat,
            NewEntry {
                person_ids: vec![person.id.clone()],
                ..NewEntry::default()
            },
        )
        .unwrap();
    assert!(event.id.starts_with("e_"));
    assert!(chat.id.starts_with("c_"));
    assert_eq!(Some(chat.time.clone()), chat.created_at);
}

#[test]
fn invalid_inputs_are_rejected_without_changes() {
    let mut store = RecordStore::open(MemoryKvStore::new());

    let err = store.create_person(NewPerson::named("   ")).unwrap_err();
    assert!(matches!(err, StoreError::Invalid(PatchError::EmptyName)));

    let err = store
        .create_entry(EntryKind::Event, NewEntry::default())
        .unwrap_err();
    assert!(matches!(err, StoreError::Invalid(PatchError::NoPersonReference)));

    let mut reserved = NewPerson::named("Carol");
    reserved
        .attributes
        .insert("createdAt".to_string(), json!("2020-01-01"));
    let err = store.create_person(reserved).unwrap_err();
    assert!(matches!(err, StoreError::Invalid(PatchError::ReservedAttribute(key)) if key == "createdAt"));

    assert!(store.people().is_empty());
    assert!(store.events().is_empty());
    assert_eq!(store.kv().get(SNAPSHOT_KEY).unwrap(), None);
}

#[test]
fn update_refreshes_updated_at_and_keeps_created_at() {
    let mut store = RecordStore::open(MemoryKvStore::new());
    let mut input = NewPerson::named("Dana");
    input.attributes.insert("phone".to_string(), json!("123"));
    input.attributes.insert("city".to_string(), json!("Paris"));
    let person = store.create_person(input).unwrap();

    let patch = PersonPatch::from_json(
        r#"{"name":"Dana K","tags":["朋友","朋友"],"attributes":{"phone":null,"note":"met at work"}}"#,
    )
    .unwrap();
    store.update_person(&person.id, patch).unwrap();

    let updated = store.get_person(&person.id).unwrap();
    assert_eq!(updated.name, "Dana K");
    assert_eq!(updated.tags, vec!["朋友".to_string()]);
    assert_eq!(updated.created_at, person.created_at);
    assert!(updated.updated_at.is_some());
    assert!(!updated.attributes.contains_key("phone"));
    assert_eq!(updated.attributes.get("city"), Some(&json!("Paris")));
    assert_eq!(updated.attributes.get("note"), Some(&json!("met at work")));
}

#[test]
fn update_of_missing_id_is_a_no_op() {
    let mut store = RecordStore::open(MemoryKvStore::new());
    store
        .update_person("p_missing", PersonPatch::default())
        .unwrap();
    store
        .update_entry(EntryKind::Event, "e_missing", EntryPatch::default())
        .unwrap();
    store.delete(RecordKind::Chat, "c_missing").unwrap();

    assert_eq!(store.kv().get(SNAPSHOT_KEY).unwrap(), None);
}

#[test]
fn patch_json_rejects_unknown_fields() {
    let err = EntryPatch::from_json(r#"{"id":"e_1"}"#).unwrap_err();
    assert!(matches!(err, PatchError::Parse(_)));
    let err = PersonPatch::from_json(r#"{"createdAt":"2020"}"#).unwrap_err();
    assert!(matches!(err, PatchError::Parse(_)));
}

#[test]
fn deleting_person_cascades_to_sole_owned_entries() {
    let mut store = RecordStore::open(MemoryKvStore::new());
    let alice = store.create_person(NewPerson::named("Alice")).unwrap();
    let bob = store.create_person(NewPerson::named("Bob")).unwrap();

    let solo_event = store
        .create_entry(EntryKind::Event, entry_for(&[&alice.id], "2024-01-01T00:00:00Z"))
        .unwrap();
    let shared_chat = store
        .create_entry(
            EntryKind::Chat,
            entry_for(&[&alice.id, &bob.id], "2024-01-02T00:00:00Z"),
        )
        .unwrap();
    let bob_event = store
        .create_entry(EntryKind::Event, entry_for(&[&bob.id], "2024-01-03T00:00:00Z"))
        .unwrap();

    store.delete(RecordKind::Person, &alice.id).unwrap();

    assert!(store.get_person(&alice.id).is_none());
    assert!(store.get_entry(EntryKind::Event, &solo_event.id).is_none());
    assert!(store.get_entry(EntryKind::Event, &bob_event.id).is_some());

    let shared = store.get_entry(EntryKind::Chat, &shared_chat.id).unwrap();
    assert_eq!(shared.person_ids, vec![bob.id.clone()]);
    assert!(shared.updated_at.is_some());

    let no_dangling = store
        .events()
        .iter()
        .chain(store.chats())
        .all(|entry| !entry.references(&alice.id));
    assert!(no_dangling);
}

#[test]
fn rename_tag_rewrites_every_reference() {
    let mut store = RecordStore::open(MemoryKvStore::new());
    store.add_tag("hiking").unwrap();
    let mut input = NewPerson::named("Eve");
    input.tags = vec!["hiking".to_string(), "家人".to_string()];
    let person = store.create_person(input).unwrap();
    let mut entry = entry_for(&[&person.id], "2024-05-05T08:00:00Z");
    entry.tags = vec!["hiking".to_string()];
    let event = store.create_entry(EntryKind::Event, entry).unwrap();

    store.rename_tag("hiking", "trekking").unwrap();

    assert!(store.tags().contains(&"trekking".to_string()));
    assert!(!store.tags().contains(&"hiking".to_string()));
    let person = store.get_person(&person.id).unwrap();
    assert_eq!(person.tags, vec!["trekking".to_string(), "家人".to_string()]);
    assert!(person.updated_at.is_some());
    let event = store.get_entry(EntryKind::Event, &event.id).unwrap();
    assert_eq!(event.tags, vec!["trekking".to_string()]);
}

#[test]
fn rename_onto_existing_tag_merges_them() {
    let mut store = RecordStore::open(MemoryKvStore::new());
    let mut input = NewPerson::named("Finn");
    input.tags = vec!["朋友".to_string(), "同事".to_string()];
    let person = store.create_person(input).unwrap();

    store.rename_tag("同事", "朋友").unwrap();

    assert_eq!(store.tags(), ["朋友".to_string(), "家人".to_string()]);
    assert_eq!(
        store.get_person(&person.id).unwrap().tags,
        vec!["朋友".to_string()]
    );
}

#[test]
fn delete_tag_strips_it_from_records() {
    let mut store = RecordStore::open(MemoryKvStore::new());
    let mut input = NewPerson::named("Gus");
    input.tags = vec!["家人".to_string()];
    let person = store.create_person(input).unwrap();

    store.delete_tag("家人").unwrap();

    assert!(!store.tags().contains(&"家人".to_string()));
    assert!(store.get_person(&person.id).unwrap().tags.is_empty());
    assert!(matches!(
        store.add_tag("  ").unwrap_err(),
        StoreError::Invalid(PatchError::EmptyTag)
    ));
}

#[test]
fn timeline_is_newest_first_with_stable_ties() {
    let mut store = RecordStore::open(MemoryKvStore::new());
    let person = store.create_person(NewPerson::named("Hana")).unwrap();
    let older = store
        .create_entry(EntryKind::Event, entry_for(&[&person.id], "2024-01-01T00:00:00Z"))
        .unwrap();
    let tie_chat = store
        .create_entry(EntryKind::Chat, entry_for(&[&person.id], "2024-06-01T00:00:00Z"))
        .unwrap();
    let tie_event = store
        .create_entry(EntryKind::Event, entry_for(&[&person.id], "2024-06-01T08:00:00+08:00"))
        .unwrap();
    let undated = store
        .create_entry(EntryKind::Chat, entry_for(&[&person.id], "someday"))
        .unwrap();

    let ids: Vec<&str> = store
        .timeline()
        .iter()
        .map(|item| item.entry.id.as_str())
        .collect();
    assert_eq!(
        ids,
        vec![
            tie_event.id.as_str(),
            tie_chat.id.as_str(),
            older.id.as_str(),
            undated.id.as_str()
        ]
    );
}

#[test]
fn timeline_filters_by_person_and_tag() {
    let mut store = RecordStore::open(MemoryKvStore::new());
    let mut tagged = NewPerson::named("Ivy");
    tagged.tags = vec!["同事".to_string()];
    let ivy = store.create_person(tagged).unwrap();
    let jon = store.create_person(NewPerson::named("Jon")).unwrap();

    let ivy_chat = store
        .create_entry(EntryKind::Chat, entry_for(&[&ivy.id], "2024-02-01T00:00:00Z"))
        .unwrap();
    let mut jon_event = entry_for(&[&jon.id], "2024-02-02T00:00:00Z");
    jon_event.tags = vec!["同事".to_string()];
    let jon_event = store.create_entry(EntryKind::Event, jon_event).unwrap();
    store
        .create_entry(EntryKind::Event, entry_for(&[&jon.id], "2024-02-03T00:00:00Z"))
        .unwrap();

    let by_person: Vec<&str> = store
        .timeline_by_person(&ivy.id)
        .iter()
        .map(|item| item.entry.id.as_str())
        .collect();
    assert_eq!(by_person, vec![ivy_chat.id.as_str()]);

    let by_tag: Vec<&str> = store
        .timeline_by_tag("同事")
        .iter()
        .map(|item| item.entry.id.as_str())
        .collect();
    assert_eq!(by_tag, vec![jon_event.id.as_str(), ivy_chat.id.as_str()]);
}

#[test]
fn corrupt_saved_snapshot_loads_defaults_and_is_quarantined() {
    let kv = MemoryKvStore::new();
    kv.put(SNAPSHOT_KEY, "{not json").unwrap();

    let store = RecordStore::open(kv);

    assert_eq!(store.snapshot(), &Snapshot::default());
    assert_eq!(
        store.kv().get(CORRUPT_SNAPSHOT_KEY).unwrap().as_deref(),
        Some("{not json")
    );
}

#[test]
fn import_replaces_present_collections_only() {
    let mut store = RecordStore::open(MemoryKvStore::new());
    let keeper = store.create_person(NewPerson::named("Kim")).unwrap();
    store
        .create_entry(EntryKind::Event, entry_for(&[&keeper.id], "2024-01-01"))
        .unwrap();

    let payload = r#"{
        "people": [
            {"id": "p_1", "name": "Lee", "tags": [], "createdAt": "2024-01-01T00:00:00.000Z"},
            {"id": "p_1", "name": "Lee duplicate", "tags": []}
        ],
        "tags": ["朋友"],
        "exportTime": "2024-02-01T00:00:00.000Z"
    }"#;
    let summary = store.import_payload(payload).unwrap();

    assert_eq!(summary.people, 1);
    assert_eq!(summary.events, 1);
    assert_eq!(summary.tags, 1);
    assert_eq!(store.people()[0].name, "Lee");
    assert_eq!(store.events().len(), 1);
}

#[test]
fn malformed_import_leaves_state_untouched() {
    let mut store = RecordStore::open(MemoryKvStore::new());
    store.create_person(NewPerson::named("Mo")).unwrap();
    let before = store.snapshot().clone();

    let err = store.import_payload(r#"{"people": "nope"}"#).unwrap_err();
    assert!(matches!(err, StoreError::Parse(_)));
    assert_eq!(store.snapshot(), &before);
}

#[test]
fn export_payload_round_trips_through_import() {
    let mut store = RecordStore::open(MemoryKvStore::new());
    let person = store.create_person(NewPerson::named("Nia")).unwrap();
    store
        .create_entry(EntryKind::Chat, entry_for(&[&person.id], "2024-07-07T07:07:07Z"))
        .unwrap();
    store.record_sync("2024-07-08T00:00:00.000Z").unwrap();

    let exported = store.export_payload().unwrap();
    let document: serde_json::Value = serde_json::from_str(&exported).unwrap();
    assert!(document.get("exportTime").is_some());
    assert_eq!(document["syncTime"], json!("2024-07-08T00:00:00.000Z"));

    let mut other = RecordStore::with_snapshot(MemoryKvStore::new(), Snapshot::empty());
    other.import_payload(&exported).unwrap();
    assert_eq!(other.snapshot(), store.snapshot());
}

//! FFI use-case API for Flutter-facing calls.
//!
//! # Responsibility
//! - Expose record CRUD, tags, timeline, backup transfer and cloud sync to
//!   Dart via FRB.
//! - Translate core errors into flat response envelopes.
//!
//! # Invariants
//! - Exported functions must not panic across FFI boundary.
//! - Every call opens the local store, applies one use case and drops the
//!   connection; no state is cached besides the database path.
//! - Store access is serialized by one process-wide lock. The lock is never
//!   held across network I/O: pulls download first and merge into a freshly
//!   opened store, pushes serialize under the lock and upload after it.
//! - Network-bound calls are not `frb(sync)`; they run on the FRB worker pool.
//! - Structured records cross the boundary as camelCase JSON strings.

use duiyou_core::db::open_db;
use duiyou_core::sync::config::{load_config, reset_config, save_config};
use duiyou_core::transfer::discovery::discover_backups;
use duiyou_core::transfer::export::{
    export_to_file, finish_share, stage_export, ExportOutcome, ExportTarget, PickerOutcome,
    SharePicker,
};
use duiyou_core::transfer::{default_export_file_name, read_backup_file};
use duiyou_core::{
    core_version as core_version_inner, init_logging as init_logging_inner, BackupDirs,
    EntryKind, EntryPatch, HttpRemoteBackup, NewEntry, NewPerson, PersonPatch, PullOutcome,
    PushReport, RecordKind, RecordStore, RemoteBackup, SqliteKvStore, SyncConfig, SyncService,
    TimelineItem,
};
use chrono::Utc;
use log::warn;
use serde_json::json;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, OnceLock, PoisonError};
use std::time::UNIX_EPOCH;

const STORE_DB_FILE_NAME: &str = "duiyou_store.sqlite3";
const ENV_DB_PATH: &str = "DUIYOU_DB_PATH";
static STORE_DB_PATH: OnceLock<PathBuf> = OnceLock::new();
static STORE_LOCK: Mutex<()> = Mutex::new(());

type Store<'conn> = RecordStore<SqliteKvStore<'conn>>;

/// Expose core crate version through FFI.
///
/// # FFI contract
/// - Sync call, non-blocking.
/// - Never throws; always returns a UTF-8 string.
#[flutter_rust_bridge::frb(sync)]
pub fn core_version() -> String {
    core_version_inner().to_owned()
}

/// Initializes Rust core logging once per process.
///
/// Input semantics:
/// - `level`: one of `trace|debug|info|warn|error` (case-insensitive).
/// - `log_dir`: absolute directory path where rolling logs are written.
///
/// # FFI contract
/// - Safe to call repeatedly with the same `level + log_dir` (idempotent).
/// - Never panics; returns empty string on success and error message on failure.
#[flutter_rust_bridge::frb(sync)]
pub fn init_logging(level: String, log_dir: String) -> String {
    match init_logging_inner(level.as_str(), log_dir.as_str()) {
        Ok(()) => String::new(),
        Err(err) => err,
    }
}

/// Generic action response envelope.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActionResponse {
    /// Whether operation succeeded.
    pub ok: bool,
    /// Id of the created record, when the action created one.
    pub id: Option<String>,
    /// Human-readable response message for diagnostics/UI.
    pub message: String,
}

impl ActionResponse {
    fn success(message: impl Into<String>) -> Self {
        Self {
            ok: true,
            id: None,
            message: message.into(),
        }
    }

    fn created(message: impl Into<String>, id: String) -> Self {
        Self {
            ok: true,
            id: Some(id),
            message: message.into(),
        }
    }

    fn failure(message: impl Into<String>) -> Self {
        Self {
            ok: false,
            id: None,
            message: message.into(),
        }
    }
}

/// JSON payload response envelope.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JsonResponse {
    pub ok: bool,
    /// JSON text on success, empty on failure.
    pub json: String,
    pub message: String,
}

impl JsonResponse {
    fn from_result(operation: &str, result: Result<String, String>) -> Self {
        match result {
            Ok(json) => Self {
                ok: true,
                json,
                message: String::new(),
            },
            Err(err) => Self {
                ok: false,
                json: String::new(),
                message: format!("{operation} failed: {err}"),
            },
        }
    }
}

/// Full dataset as compact JSON (`people|events|chats|tags`).
#[flutter_rust_bridge::frb(sync)]
pub fn store_snapshot() -> JsonResponse {
    JsonResponse::from_result(
        "store_snapshot",
        with_store(|store| store.snapshot().to_json().map_err(|err| err.to_string())),
    )
}

/// Timeline items, newest first, optionally filtered.
///
/// `person_id` wins over `tag` when both are given.
///
/// Output is a JSON array of `{kind, entry, people, displayTime}` where
/// `people` holds resolved person names in reference order.
#[flutter_rust_bridge::frb(sync)]
pub fn store_timeline(person_id: Option<String>, tag: Option<String>) -> JsonResponse {
    JsonResponse::from_result(
        "store_timeline",
        with_store(|store| {
            let items = match (non_blank(person_id), non_blank(tag)) {
                (Some(person_id), _) => store.timeline_by_person(&person_id),
                (None, Some(tag)) => store.timeline_by_tag(&tag),
                (None, None) => store.timeline(),
            };
            let rows: Vec<serde_json::Value> = items.iter().map(timeline_row).collect();
            serde_json::to_string(&rows).map_err(|err| err.to_string())
        }),
    )
}

/// Creates a person from a `NewPerson` JSON object.
#[flutter_rust_bridge::frb(sync)]
pub fn person_create(input_json: String) -> ActionResponse {
    let result = with_store(|store| {
        let input: NewPerson = serde_json::from_str(&input_json).map_err(|err| err.to_string())?;
        store
            .create_person(input)
            .map(|person| person.id)
            .map_err(|err| err.to_string())
    });
    match result {
        Ok(id) => ActionResponse::created("Person created.", id),
        Err(err) => ActionResponse::failure(format!("person_create failed: {err}")),
    }
}

/// Applies a `PersonPatch` JSON object to person `id`.
#[flutter_rust_bridge::frb(sync)]
pub fn person_update(id: String, patch_json: String) -> ActionResponse {
    let result = with_store(|store| {
        let patch = PersonPatch::from_json(&patch_json).map_err(|err| err.to_string())?;
        store.update_person(&id, patch).map_err(|err| err.to_string())
    });
    action_result("person_update", "Person updated.", result)
}

/// Creates an event or chat (`kind` = `event|chat`) from a `NewEntry` JSON object.
#[flutter_rust_bridge::frb(sync)]
pub fn entry_create(kind: String, input_json: String) -> ActionResponse {
    let result = with_store(|store| {
        let kind = parse_entry_kind(&kind)?;
        let input: NewEntry = serde_json::from_str(&input_json).map_err(|err| err.to_string())?;
        store
            .create_entry(kind, input)
            .map(|entry| entry.id)
            .map_err(|err| err.to_string())
    });
    match result {
        Ok(id) => ActionResponse::created("Entry created.", id),
        Err(err) => ActionResponse::failure(format!("entry_create failed: {err}")),
    }
}

/// Applies an `EntryPatch` JSON object to entry `id` of `kind`.
#[flutter_rust_bridge::frb(sync)]
pub fn entry_update(kind: String, id: String, patch_json: String) -> ActionResponse {
    let result = with_store(|store| {
        let kind = parse_entry_kind(&kind)?;
        let patch = EntryPatch::from_json(&patch_json).map_err(|err| err.to_string())?;
        store.update_entry(kind, &id, patch).map_err(|err| err.to_string())
    });
    action_result("entry_update", "Entry updated.", result)
}

/// Deletes a record (`kind` = `person|event|chat`).
///
/// Deleting a person cascades to entries that referenced only that person.
#[flutter_rust_bridge::frb(sync)]
pub fn record_delete(kind: String, id: String) -> ActionResponse {
    let result = with_store(|store| {
        let kind = parse_record_kind(&kind)?;
        store.delete(kind, &id).map_err(|err| err.to_string())
    });
    action_result("record_delete", "Record deleted.", result)
}

#[flutter_rust_bridge::frb(sync)]
pub fn tag_add(name: String) -> ActionResponse {
    let result = with_store(|store| store.add_tag(&name).map_err(|err| err.to_string()));
    action_result("tag_add", "Tag added.", result)
}

#[flutter_rust_bridge::frb(sync)]
pub fn tag_rename(old_name: String, new_name: String) -> ActionResponse {
    let result = with_store(|store| {
        store
            .rename_tag(&old_name, &new_name)
            .map_err(|err| err.to_string())
    });
    action_result("tag_rename", "Tag renamed.", result)
}

#[flutter_rust_bridge::frb(sync)]
pub fn tag_delete(name: String) -> ActionResponse {
    let result = with_store(|store| store.delete_tag(&name).map_err(|err| err.to_string()));
    action_result("tag_delete", "Tag deleted.", result)
}

/// Pretty backup document for the whole dataset.
#[flutter_rust_bridge::frb(sync)]
pub fn backup_export_json() -> JsonResponse {
    JsonResponse::from_result(
        "backup_export_json",
        with_store(|store| store.export_payload().map_err(|err| err.to_string())),
    )
}

/// Replaces local collections with those present in `payload`.
#[flutter_rust_bridge::frb(sync)]
pub fn backup_import_json(payload: String) -> ActionResponse {
    let result = with_store(|store| store.import_payload(&payload).map_err(|err| err.to_string()));
    match result {
        Ok(summary) => ActionResponse::success(format!(
            "Imported {} people, {} events, {} chats.",
            summary.people, summary.events, summary.chats
        )),
        Err(err) => ActionResponse::failure(format!("backup_import_json failed: {err}")),
    }
}

/// Merges `payload` into local data with the sync merge rule.
#[flutter_rust_bridge::frb(sync)]
pub fn backup_merge_json(payload: String) -> ActionResponse {
    let result = with_store(|store| store.merge_payload(&payload).map_err(|err| err.to_string()));
    match result {
        Ok(report) => ActionResponse::success(format!(
            "Merged: {} people, {} events, {} chats added.",
            report.people.added, report.events.added, report.chats.added
        )),
        Err(err) => ActionResponse::failure(format!("backup_merge_json failed: {err}")),
    }
}

/// Writes a timestamped backup file.
///
/// `target_dir` overrides the platform backup directories. The response
/// `id` carries the written path.
#[flutter_rust_bridge::frb(sync)]
pub fn backup_export_file(target_dir: Option<String>) -> ActionResponse {
    let result = with_store(|store| {
        let dirs = match non_blank(target_dir) {
            Some(dir) => BackupDirs::new(&dir, &dir),
            None => BackupDirs::platform_default().map_err(|err| err.to_string())?,
        };
        let payload = store.export_payload().map_err(|err| err.to_string())?;
        let file_name = default_export_file_name(Utc::now());
        match export_to_file(&payload, &file_name, &ExportTarget::Direct(dirs))
            .map_err(|err| err.to_string())?
        {
            ExportOutcome::Written(path) | ExportOutcome::Shared(path) => {
                Ok(path.display().to_string())
            }
            ExportOutcome::Cancelled => Err("export cancelled".to_string()),
        }
    });
    match result {
        Ok(path) => ActionResponse::created("Backup written.", path),
        Err(err) => ActionResponse::failure(format!("backup_export_file failed: {err}")),
    }
}

/// Stages a timestamped backup file in `staging_dir` for the platform
/// share sheet.
///
/// The response `id` carries the staged path. Report the share result with
/// [`backup_finish_share`].
#[flutter_rust_bridge::frb(sync)]
pub fn backup_stage_export(staging_dir: String) -> ActionResponse {
    let result = with_store(|store| {
        let staging_dir = non_blank(Some(staging_dir))
            .ok_or_else(|| "staging directory must not be empty".to_string())?;
        let payload = store.export_payload().map_err(|err| err.to_string())?;
        let file_name = default_export_file_name(Utc::now());
        stage_export(&payload, &file_name, Path::new(&staging_dir))
            .map(|path| path.display().to_string())
            .map_err(|err| err.to_string())
    });
    match result {
        Ok(path) => ActionResponse::created("Backup staged.", path),
        Err(err) => ActionResponse::failure(format!("backup_stage_export failed: {err}")),
    }
}

/// Maps the Dart share sheet result for a staged backup.
///
/// `share_status`: `success|completed` or `dismissed|cancelled`; anything
/// else is treated as a share failure described by `share_status`.
/// A dismissed sheet is a successful no-op with no `id`.
#[flutter_rust_bridge::frb(sync)]
pub fn backup_finish_share(staged_path: String, share_status: String) -> ActionResponse {
    let picker = ReportedShare::from_status(&share_status);
    match finish_share(Path::new(staged_path.trim()), &picker) {
        Ok(ExportOutcome::Shared(path)) | Ok(ExportOutcome::Written(path)) => {
            ActionResponse::created("Backup shared.", path.display().to_string())
        }
        Ok(ExportOutcome::Cancelled) => ActionResponse::success("Export cancelled."),
        Err(err) => ActionResponse::failure(format!("backup_finish_share failed: {err}")),
    }
}

/// Share result already collected on the Dart side.
struct ReportedShare {
    outcome: Result<PickerOutcome, String>,
}

impl ReportedShare {
    fn from_status(raw: &str) -> Self {
        let outcome = match raw.trim().to_ascii_lowercase().as_str() {
            "success" | "completed" => Ok(PickerOutcome::Completed),
            "dismissed" | "cancelled" => Ok(PickerOutcome::Cancelled),
            "" => Err("share result missing".to_string()),
            other => Err(format!("share result `{other}`")),
        };
        Self { outcome }
    }
}

impl SharePicker for ReportedShare {
    fn present(&self, _staged_file: &Path, _title: &str) -> Result<PickerOutcome, String> {
        self.outcome.clone()
    }
}

/// Backup file found in the platform backup directories.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackupFileItem {
    pub path: String,
    /// Modification time as epoch milliseconds.
    pub modified_epoch_ms: i64,
    pub size: u64,
}

/// Lists backup files, newest first.
#[flutter_rust_bridge::frb(sync)]
pub fn backup_list_files() -> Vec<BackupFileItem> {
    let Ok(dirs) = BackupDirs::platform_default() else {
        return Vec::new();
    };
    discover_backups(&dirs)
        .into_iter()
        .map(|file| BackupFileItem {
            path: file.path.display().to_string(),
            modified_epoch_ms: file
                .modified
                .duration_since(UNIX_EPOCH)
                .map(|elapsed| i64::try_from(elapsed.as_millis()).unwrap_or(i64::MAX))
                .unwrap_or(0),
            size: file.size,
        })
        .collect()
}

/// Imports a backup file picked by the user.
#[flutter_rust_bridge::frb(sync)]
pub fn backup_import_file(path: String) -> ActionResponse {
    match read_backup_file(Path::new(path.trim())) {
        Ok(payload) => backup_import_json(payload),
        Err(err) => ActionResponse::failure(format!("backup_import_file failed: {err}")),
    }
}

/// Effective remote sync configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncConfigResponse {
    pub ok: bool,
    pub remote_base_url: String,
    pub remote_file_name: String,
    pub configured: bool,
    pub message: String,
}

#[flutter_rust_bridge::frb(sync)]
pub fn sync_config_get() -> SyncConfigResponse {
    match with_store(|store| Ok(load_config(store.kv()))) {
        Ok(config) => SyncConfigResponse {
            ok: true,
            configured: config.is_remote_configured(),
            remote_base_url: config.remote_base_url,
            remote_file_name: config.remote_file_name,
            message: String::new(),
        },
        Err(err) => SyncConfigResponse {
            ok: false,
            remote_base_url: String::new(),
            remote_file_name: String::new(),
            configured: false,
            message: format!("sync_config_get failed: {err}"),
        },
    }
}

/// Saves a user sync configuration after validating it.
#[flutter_rust_bridge::frb(sync)]
pub fn sync_config_set(remote_base_url: String, remote_file_name: String) -> ActionResponse {
    let config = SyncConfig {
        remote_base_url: remote_base_url.trim().to_string(),
        remote_file_name: remote_file_name.trim().to_string(),
    };
    let result = with_store(|store| {
        config.object_url().map_err(|err| err.to_string())?;
        save_config(store.kv(), &config).map_err(|err| err.to_string())
    });
    action_result("sync_config_set", "Sync configuration saved.", result)
}

/// Drops the saved configuration so environment defaults apply.
#[flutter_rust_bridge::frb(sync)]
pub fn sync_config_reset() -> ActionResponse {
    let result = with_store(|store| reset_config(store.kv()).map_err(|err| err.to_string()));
    action_result("sync_config_reset", "Sync configuration reset.", result)
}

/// Uploads local data, replacing the remote backup.
pub fn sync_push() -> ActionResponse {
    let result = sync_service().and_then(|service| push_unlocked(&service));
    message_result("sync_push", result.map(|report| push_message(&report)))
}

/// Downloads the remote backup and merges it into local data.
pub fn sync_pull() -> ActionResponse {
    let result = sync_service().and_then(|service| pull_unlocked(&service));
    message_result("sync_pull", result.map(|outcome| pull_message(&outcome)))
}

/// Pull-merge then push.
pub fn sync_now() -> ActionResponse {
    let result = sync_service().and_then(|service| {
        let pull = pull_unlocked(&service)?;
        let push = push_unlocked(&service)?;
        Ok(format!("{} {}", pull_message(&pull), push_message(&push)))
    });
    message_result("sync_now", result)
}

/// Remote probe plus local last-sync stamp.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncStatusResponse {
    pub configured: bool,
    pub remote_exists: bool,
    pub remote_last_modified: Option<String>,
    pub remote_size: Option<u64>,
    pub last_sync_time: Option<String>,
    pub message: String,
}

pub fn sync_status() -> SyncStatusResponse {
    let unconfigured = |message: String, last_sync_time: Option<String>| SyncStatusResponse {
        configured: false,
        remote_exists: false,
        remote_last_modified: None,
        remote_size: None,
        last_sync_time,
        message,
    };

    let local = with_store(|store| {
        let last_sync_time = store.last_sync_time().unwrap_or_else(|err| {
            warn!("event=ffi_call module=ffi status=error operation=sync_status error={err}");
            None
        });
        Ok((load_config(store.kv()), last_sync_time))
    });
    let (config, last_sync_time) = match local {
        Ok(local) => local,
        Err(err) => return unconfigured(format!("sync_status failed: {err}"), None),
    };
    let remote = match HttpRemoteBackup::from_config(&config) {
        Ok(remote) => remote,
        Err(err) => return unconfigured(err.to_string(), last_sync_time),
    };

    let probe = remote.check_backup_metadata();
    SyncStatusResponse {
        configured: true,
        remote_exists: probe.exists,
        remote_last_modified: probe.last_modified,
        remote_size: probe.size,
        last_sync_time,
        message: String::new(),
    }
}

fn timeline_row(item: &TimelineItem<'_>) -> serde_json::Value {
    json!({
        "kind": item.kind.as_str(),
        "entry": item.entry,
        "people": item.people.iter().map(|person| person.name.as_str()).collect::<Vec<_>>(),
        "displayTime": item.display_time.map(|time| time.to_rfc3339()),
    })
}

fn pull_message(outcome: &PullOutcome) -> String {
    match outcome {
        PullOutcome::Merged {
            report,
            stamp_saved,
            ..
        } => format!(
            "Merged {} people, {} events, {} chats from cloud.{}",
            report.people.added + report.people.replaced,
            report.events.added + report.events.replaced,
            report.chats.added + report.chats.replaced,
            stamp_note(*stamp_saved)
        ),
        PullOutcome::NoBackup => "No cloud backup yet.".to_string(),
    }
}

fn push_message(report: &PushReport) -> String {
    format!(
        "Uploaded {} bytes.{}",
        report.bytes,
        stamp_note(report.stamp_saved)
    )
}

fn stamp_note(stamp_saved: bool) -> &'static str {
    if stamp_saved {
        ""
    } else {
        " Last sync time was not saved."
    }
}

fn parse_entry_kind(raw: &str) -> Result<EntryKind, String> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "event" => Ok(EntryKind::Event),
        "chat" => Ok(EntryKind::Chat),
        other => Err(format!("unknown entry kind `{other}`; expected event|chat")),
    }
}

fn parse_record_kind(raw: &str) -> Result<RecordKind, String> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "person" => Ok(RecordKind::Person),
        other => parse_entry_kind(other).map(RecordKind::from),
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|raw| raw.trim().to_string())
        .filter(|trimmed| !trimmed.is_empty())
}

fn action_result(operation: &str, message: &str, result: Result<(), String>) -> ActionResponse {
    match result {
        Ok(()) => ActionResponse::success(message),
        Err(err) => ActionResponse::failure(format!("{operation} failed: {err}")),
    }
}

fn message_result(operation: &str, result: Result<String, String>) -> ActionResponse {
    match result {
        Ok(message) => ActionResponse::success(message),
        Err(err) => {
            warn!("event=ffi_call module=ffi status=error operation={operation}");
            ActionResponse::failure(format!("{operation} failed: {err}"))
        }
    }
}

fn resolve_store_db_path() -> PathBuf {
    STORE_DB_PATH
        .get_or_init(|| {
            if let Ok(raw) = std::env::var(ENV_DB_PATH) {
                let trimmed = raw.trim();
                if !trimmed.is_empty() {
                    return PathBuf::from(trimmed);
                }
            }
            std::env::temp_dir().join(STORE_DB_FILE_NAME)
        })
        .clone()
}

fn lock_store() -> MutexGuard<'static, ()> {
    // Guarded state lives in SQLite, so a poisoned lock is still usable.
    STORE_LOCK.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Runs `f` against a freshly loaded store while holding the store lock.
///
/// Never call `with_store` from inside `f`.
fn with_store<T>(f: impl FnOnce(&mut Store<'_>) -> Result<T, String>) -> Result<T, String> {
    let _guard = lock_store();
    let db_path = resolve_store_db_path();
    let conn = open_db(&db_path).map_err(|err| format!("store DB open failed: {err}"))?;
    let mut store = RecordStore::open(SqliteKvStore::new(&conn));
    f(&mut store)
}

fn sync_service() -> Result<SyncService<HttpRemoteBackup>, String> {
    let config = with_store(|store| Ok(load_config(store.kv())))?;
    let remote = HttpRemoteBackup::from_config(&config).map_err(|err| err.to_string())?;
    Ok(SyncService::new(remote))
}

fn push_unlocked(service: &SyncService<HttpRemoteBackup>) -> Result<PushReport, String> {
    let prepared = with_store(|store| {
        service
            .prepare_push(store)
            .map_err(|err| err.to_string())
    })?;
    service.send(&prepared).map_err(|err| err.to_string())?;
    with_store(|store| Ok(service.confirm_push(store, prepared)))
}

fn pull_unlocked(service: &SyncService<HttpRemoteBackup>) -> Result<PullOutcome, String> {
    let download = service.fetch().map_err(|err| err.to_string())?;
    with_store(|store| {
        service
            .apply_pull(store, download)
            .map_err(|err| err.to_string())
    })
}

#[cfg(test)]
mod tests {
    use super::{
        backup_export_file, backup_export_json, backup_finish_share, backup_import_json,
        backup_stage_export, core_version, entry_create, entry_update, init_logging,
        parse_record_kind, person_create, record_delete, store_snapshot, store_timeline,
        sync_config_set, tag_add, ReportedShare,
    };
    use duiyou_core::transfer::export::{PickerOutcome, SharePicker};
    use duiyou_core::RecordKind;
    use std::path::Path;
    use std::thread;
    use std::time::{SystemTime, UNIX_EPOCH};

    #[test]
    fn version_is_not_empty() {
        assert!(!core_version().is_empty());
    }

    #[test]
    fn init_logging_rejects_empty_log_dir() {
        let error = init_logging("info".to_string(), String::new());
        assert!(!error.is_empty());
    }

    #[test]
    fn init_logging_rejects_unsupported_level() {
        let error = init_logging("verbose".to_string(), "tmp/logs".to_string());
        assert!(!error.is_empty());
    }

    #[test]
    fn record_kinds_parse_case_insensitively() {
        assert_eq!(parse_record_kind("Person"), Ok(RecordKind::Person));
        assert_eq!(parse_record_kind(" chat "), Ok(RecordKind::Chat));
        assert!(parse_record_kind("note").is_err());
    }

    #[test]
    fn created_person_and_chat_appear_in_snapshot_and_timeline() {
        let name = unique_token("ffi-person");
        let person = person_create(format!(r#"{{"name":"{name}","tags":["朋友"]}}"#));
        assert!(person.ok, "{}", person.message);
        let person_id = person.id.expect("person create should return id");

        let chat = entry_create(
            "chat".to_string(),
            format!(r#"{{"personIds":["{person_id}"],"time":"2024-01-01T00:00:00Z"}}"#),
        );
        assert!(chat.ok, "{}", chat.message);
        let chat_id = chat.id.expect("chat create should return id");

        let snapshot = store_snapshot();
        assert!(snapshot.ok, "{}", snapshot.message);
        assert!(snapshot.json.contains(&name));

        let timeline = store_timeline(Some(person_id.clone()), None);
        assert!(timeline.ok, "{}", timeline.message);
        let rows: serde_json::Value = serde_json::from_str(&timeline.json).expect("timeline json");
        assert_eq!(rows[0]["entry"]["id"], chat_id.as_str());
        assert_eq!(rows[0]["people"][0], name.as_str());

        let deleted = record_delete("person".to_string(), person_id.clone());
        assert!(deleted.ok, "{}", deleted.message);
        let timeline = store_timeline(Some(person_id), None);
        assert_eq!(timeline.json, "[]");
    }

    #[test]
    fn invalid_inputs_return_failure_envelopes() {
        let missing_name = person_create(r#"{"tags":[]}"#.to_string());
        assert!(!missing_name.ok);
        assert!(missing_name.message.starts_with("person_create failed"));

        let bad_kind = entry_create("memo".to_string(), r#"{"personIds":["p_1"]}"#.to_string());
        assert!(!bad_kind.ok);

        let unknown_field = entry_update(
            "event".to_string(),
            "e_missing".to_string(),
            r#"{"createdAt":"2020"}"#.to_string(),
        );
        assert!(!unknown_field.ok);

        let blank_tag = tag_add("   ".to_string());
        assert!(!blank_tag.ok);
    }

    #[test]
    fn malformed_backup_import_is_rejected() {
        let response = backup_import_json("{not json".to_string());
        assert!(!response.ok);
        assert!(response.message.contains("backup_import_json failed"));
    }

    #[test]
    fn exported_backup_json_carries_export_time() {
        let response = backup_export_json();
        assert!(response.ok, "{}", response.message);
        let document: serde_json::Value = serde_json::from_str(&response.json).expect("backup json");
        assert!(document.get("exportTime").is_some());
        assert!(document["people"].is_array());
    }

    #[test]
    fn backup_file_is_written_into_target_dir() {
        let dir = tempfile::tempdir().expect("tempdir");
        let response = backup_export_file(Some(dir.path().display().to_string()));
        assert!(response.ok, "{}", response.message);
        let path = response.id.expect("written path");
        assert!(path.ends_with(".json"));
        assert!(std::path::Path::new(&path).starts_with(dir.path()));
    }

    #[test]
    fn concurrent_creates_are_all_kept() {
        let prefix = unique_token("ffi-concurrent");
        let workers: Vec<_> = (0..6)
            .map(|worker| {
                let prefix = prefix.clone();
                thread::spawn(move || {
                    for index in 0..4 {
                        let response =
                            person_create(format!(r#"{{"name":"{prefix}-{worker}-{index}"}}"#));
                        assert!(response.ok, "{}", response.message);
                    }
                })
            })
            .collect();
        for worker in workers {
            worker.join().expect("worker should finish");
        }

        let snapshot = store_snapshot();
        assert!(snapshot.ok, "{}", snapshot.message);
        let document: serde_json::Value =
            serde_json::from_str(&snapshot.json).expect("snapshot json");
        let created = document["people"]
            .as_array()
            .expect("people array")
            .iter()
            .filter(|person| {
                person["name"]
                    .as_str()
                    .is_some_and(|name| name.starts_with(&prefix))
            })
            .count();
        assert_eq!(created, 24);
    }

    #[test]
    fn staged_backup_is_shared_or_cancelled() {
        let dir = tempfile::tempdir().expect("tempdir");
        let staged = backup_stage_export(dir.path().display().to_string());
        assert!(staged.ok, "{}", staged.message);
        let path = staged.id.expect("staged path");
        assert!(Path::new(&path).starts_with(dir.path()));
        assert!(Path::new(&path).is_file());

        let shared = backup_finish_share(path.clone(), "success".to_string());
        assert!(shared.ok, "{}", shared.message);
        assert_eq!(shared.id.as_deref(), Some(path.as_str()));

        let cancelled = backup_finish_share(path.clone(), "dismissed".to_string());
        assert!(cancelled.ok, "{}", cancelled.message);
        assert_eq!(cancelled.id, None);

        let failed = backup_finish_share(path, "unavailable".to_string());
        assert!(!failed.ok);
        assert!(failed.message.contains("unavailable"));
    }

    #[test]
    fn staging_requires_a_directory() {
        let response = backup_stage_export("  ".to_string());
        assert!(!response.ok);
    }

    #[test]
    fn share_status_maps_to_picker_outcome() {
        let staged = Path::new("b.json");
        let outcome = |raw: &str| ReportedShare::from_status(raw).present(staged, "t");
        assert_eq!(outcome(" Completed "), Ok(PickerOutcome::Completed));
        assert_eq!(outcome("cancelled"), Ok(PickerOutcome::Cancelled));
        assert!(outcome("").is_err());
    }

    #[test]
    fn sync_config_rejects_non_http_urls() {
        let response = sync_config_set("ftp://example.com".to_string(), String::new());
        assert!(!response.ok);
    }

    fn unique_token(prefix: &str) -> String {
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("time went backwards")
            .as_nanos();
        format!("{prefix}-{nanos}")
    }
}

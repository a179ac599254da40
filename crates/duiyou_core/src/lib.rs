//! Core domain logic for Duiyou, a personal relationship tracker.
//! This crate is the single source of truth for record invariants,
//! merge rules, persistence, and backup transfer.

pub mod db;
pub mod logging;
pub mod model;
pub mod repo;
pub mod service;
pub mod sync;
pub mod transfer;

pub use db::{open_db, open_db_in_memory, DbError, DbResult};
pub use logging::{init_logging, logging_status, LogLevel};
pub use model::entry::{Entry, EntryKind};
pub use model::person::Person;
pub use model::snapshot::{Snapshot, SnapshotDocument, SnapshotError, DEFAULT_TAGS};
pub use repo::kv_repo::{KeyValueStore, MemoryKvStore, RepoError, RepoResult, SqliteKvStore};
pub use repo::snapshot_repo::PersistError;
pub use service::patch::{EntryPatch, NewEntry, NewPerson, PatchError, PersonPatch};
pub use service::record_store::{ImportSummary, RecordKind, RecordStore, StoreError, StoreResult};
pub use service::timeline::{build_timeline, TimelineItem};
pub use sync::config::{ConfigError, SyncConfig};
pub use sync::merge::{merge_snapshots, MergeReport};
pub use sync::remote::{BackupMetadata, DownloadOutcome, HttpRemoteBackup, RemoteBackup};
pub use sync::sync_service::{
    PreparedPush, PullOutcome, PushReport, SyncReport, SyncService, SyncStatus,
};
pub use sync::{SyncError, SyncResult};
pub use transfer::{BackupDirs, TransferError, TransferResult};

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::core_version;

    #[test]
    fn version_is_not_empty() {
        assert!(!core_version().is_empty());
    }
}

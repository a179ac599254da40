//! User-triggered sync flows over a record store and a remote backup.
//!
//! # Invariants
//! - `pull` applies a merge only after the remote payload parsed.
//! - The last-sync stamp is recorded only after the remote call succeeded.
//! - A failed stamp write never fails the sync; it is reported through
//!   `stamp_saved`.
//! - The split steps (`prepare_push`/`send`/`confirm_push` and
//!   `fetch`/`apply_pull`) let callers hold a store lock only around the
//!   local steps, never across network I/O.

use super::merge::MergeReport;
use super::remote::{BackupMetadata, DownloadOutcome, RemoteBackup};
use super::SyncResult;
use crate::model::id::now_timestamp;
use crate::repo::kv_repo::KeyValueStore;
use crate::repo::snapshot_repo::PersistError;
use crate::service::record_store::{RecordStore, StoreError};
use log::{info, warn};

/// Result of a successful push.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PushReport {
    pub bytes: usize,
    pub synced_at: String,
    /// Whether the last-sync stamp was written locally.
    pub stamp_saved: bool,
}

/// Serialized snapshot waiting to be uploaded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreparedPush {
    pub payload: String,
    pub synced_at: String,
}

/// Result of a pull that reached the server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PullOutcome {
    Merged {
        report: MergeReport,
        remote_last_modified: Option<String>,
        synced_at: String,
        stamp_saved: bool,
    },
    NoBackup,
}

/// Result of a two-way sync.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncReport {
    pub pull: PullOutcome,
    pub push: PushReport,
}

/// Remote and local sync state for display.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncStatus {
    pub remote: BackupMetadata,
    pub last_sync_time: Option<String>,
}

/// Sync orchestration over one remote backup.
pub struct SyncService<R: RemoteBackup> {
    remote: R,
}

impl<R: RemoteBackup> SyncService<R> {
    pub fn new(remote: R) -> Self {
        Self { remote }
    }

    pub fn remote(&self) -> &R {
        &self.remote
    }

    /// Uploads the current snapshot, replacing the remote object.
    pub fn push<K: KeyValueStore>(&self, store: &RecordStore<K>) -> SyncResult<PushReport> {
        let prepared = self.prepare_push(store)?;
        self.send(&prepared)?;
        Ok(self.confirm_push(store, prepared))
    }

    /// Serializes the store for upload.
    pub fn prepare_push<K: KeyValueStore>(
        &self,
        store: &RecordStore<K>,
    ) -> SyncResult<PreparedPush> {
        let synced_at = now_timestamp();
        let payload = store
            .snapshot()
            .to_backup_json(&synced_at, Some(&synced_at))
            .map_err(|err| StoreError::Persist(PersistError::Encode(err)))?;
        Ok(PreparedPush { payload, synced_at })
    }

    /// Uploads a prepared payload. Touches no local state.
    pub fn send(&self, prepared: &PreparedPush) -> SyncResult<()> {
        self.remote.upload(&prepared.payload)
    }

    /// Records the sync stamp of an uploaded payload.
    pub fn confirm_push<K: KeyValueStore>(
        &self,
        store: &RecordStore<K>,
        prepared: PreparedPush,
    ) -> PushReport {
        let stamp_saved = remember_sync(store, &prepared.synced_at);
        PushReport {
            bytes: prepared.payload.len(),
            synced_at: prepared.synced_at,
            stamp_saved,
        }
    }

    /// Downloads the remote object and merges it into the store.
    pub fn pull<K: KeyValueStore>(&self, store: &mut RecordStore<K>) -> SyncResult<PullOutcome> {
        let download = self.fetch()?;
        self.apply_pull(store, download)
    }

    /// Downloads the remote object. Touches no local state.
    pub fn fetch(&self) -> SyncResult<DownloadOutcome> {
        self.remote.download()
    }

    /// Merges a downloaded object into the store and records the sync stamp.
    pub fn apply_pull<K: KeyValueStore>(
        &self,
        store: &mut RecordStore<K>,
        download: DownloadOutcome,
    ) -> SyncResult<PullOutcome> {
        let (payload, remote_last_modified) = match download {
            DownloadOutcome::Found {
                payload,
                last_modified,
            } => (payload, last_modified),
            DownloadOutcome::NoBackup => return Ok(PullOutcome::NoBackup),
        };

        let report = store.merge_payload(&payload)?;
        let synced_at = now_timestamp();
        let stamp_saved = remember_sync(store, &synced_at);
        Ok(PullOutcome::Merged {
            report,
            remote_last_modified,
            synced_at,
            stamp_saved,
        })
    }

    /// Pulls and merges, then pushes the merged state.
    ///
    /// A missing remote object still results in a push.
    pub fn sync<K: KeyValueStore>(&self, store: &mut RecordStore<K>) -> SyncResult<SyncReport> {
        let pull = self.pull(store)?;
        let push = self.push(store)?;
        info!(
            "event=sync module=sync status=ok remote_found={} bytes={}",
            matches!(pull, PullOutcome::Merged { .. }),
            push.bytes
        );
        Ok(SyncReport { pull, push })
    }

    /// Probes the remote object and reads the local sync stamp.
    pub fn status<K: KeyValueStore>(&self, store: &RecordStore<K>) -> SyncStatus {
        let last_sync_time = store.last_sync_time().unwrap_or_else(|err| {
            warn!("event=sync_status module=sync status=error error={err}");
            None
        });
        SyncStatus {
            remote: self.remote.check_backup_metadata(),
            last_sync_time,
        }
    }
}

fn remember_sync<K: KeyValueStore>(store: &RecordStore<K>, synced_at: &str) -> bool {
    match store.record_sync(synced_at) {
        Ok(()) => true,
        Err(err) => {
            warn!("event=sync_stamp module=sync status=error error={err}");
            false
        }
    }
}

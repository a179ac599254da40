//! Snapshot persistence on top of a key/value store.
//!
//! # Invariants
//! - `save_snapshot` writes the full snapshot under `SNAPSHOT_KEY`.
//! - `load_snapshot` never returns an error: a missing, unreadable or
//!   corrupt value yields `Snapshot::default()`.
//! - A corrupt value is copied to `CORRUPT_SNAPSHOT_KEY` before the
//!   defaults can overwrite it.

use super::kv_repo::{KeyValueStore, RepoError, RepoResult};
use crate::model::snapshot::{Snapshot, SnapshotDocument, SnapshotError};
use log::{error, info, warn};
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Key holding the serialized snapshot.
pub const SNAPSHOT_KEY: &str = "duiyou-data";
/// Key holding the last unparseable snapshot payload.
pub const CORRUPT_SNAPSHOT_KEY: &str = "duiyou-data.corrupt";
/// Key holding the timestamp of the last successful cloud sync.
pub const SYNC_STATE_KEY: &str = "duiyou-sync-state";

/// Failure to write a snapshot to the local store.
#[derive(Debug)]
pub enum PersistError {
    Encode(SnapshotError),
    Repo(RepoError),
}

impl Display for PersistError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Encode(err) => write!(f, "{err}"),
            Self::Repo(err) => write!(f, "failed to write local store: {err}"),
        }
    }
}

impl Error for PersistError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Encode(err) => Some(err),
            Self::Repo(err) => Some(err),
        }
    }
}

impl From<SnapshotError> for PersistError {
    fn from(value: SnapshotError) -> Self {
        Self::Encode(value)
    }
}

impl From<RepoError> for PersistError {
    fn from(value: RepoError) -> Self {
        Self::Repo(value)
    }
}

/// Writes the full snapshot, overwriting any prior value.
pub fn save_snapshot<K: KeyValueStore + ?Sized>(
    kv: &K,
    snapshot: &Snapshot,
) -> Result<(), PersistError> {
    let payload = snapshot.to_json()?;
    kv.put(SNAPSHOT_KEY, &payload)?;
    Ok(())
}

/// Loads the saved snapshot or the default one.
pub fn load_snapshot<K: KeyValueStore + ?Sized>(kv: &K) -> Snapshot {
    let payload = match kv.get(SNAPSHOT_KEY) {
        Ok(Some(payload)) => payload,
        Ok(None) => {
            info!("event=snapshot_load module=repo status=empty");
            return Snapshot::default();
        }
        Err(err) => {
            error!(
                "event=snapshot_load module=repo status=error error_code=read_failed error={}",
                err
            );
            return Snapshot::default();
        }
    };

    match SnapshotDocument::parse(&payload) {
        Ok(document) => {
            let snapshot = document.into_snapshot_or_default();
            info!(
                "event=snapshot_load module=repo status=ok people={} events={} chats={} tags={}",
                snapshot.people.len(),
                snapshot.events.len(),
                snapshot.chats.len(),
                snapshot.tags.len()
            );
            snapshot
        }
        Err(err) => {
            warn!(
                "event=snapshot_load module=repo status=recovered error_code=parse_failed bytes={} error={}",
                payload.len(),
                err
            );
            if let Err(backup_err) = kv.put(CORRUPT_SNAPSHOT_KEY, &payload) {
                error!(
                    "event=snapshot_quarantine module=repo status=error error={}",
                    backup_err
                );
            }
            Snapshot::default()
        }
    }
}

/// Returns the last recorded cloud sync timestamp.
pub fn last_sync_time<K: KeyValueStore + ?Sized>(kv: &K) -> RepoResult<Option<String>> {
    kv.get(SYNC_STATE_KEY)
}

/// Records the timestamp of a successful cloud sync.
pub fn record_sync_time<K: KeyValueStore + ?Sized>(kv: &K, synced_at: &str) -> RepoResult<()> {
    kv.put(SYNC_STATE_KEY, synced_at)
}

//! Local durable store: key/value persistence and snapshot load/save.
//!
//! # Responsibility
//! - Define the key/value contract the rest of core persists through.
//! - Isolate SQLite details from store and sync orchestration.
//!
//! # Invariants
//! - Every write replaces the whole value under its key.
//! - Snapshot loading never fails; corrupt content falls back to defaults.

pub mod kv_repo;
pub mod snapshot_repo;

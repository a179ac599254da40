//! Cloud backup sync: merge engine, remote gateway and orchestration.
//!
//! # Responsibility
//! - Reconcile local and remote snapshots (`merge`).
//! - Talk to the remote object endpoint (`remote`).
//! - Drive user-triggered push/pull flows against the record store
//!   (`sync_service`).
//!
//! # Invariants
//! - Every failure is returned as a typed `SyncError`; "no backup yet" is
//!   an outcome, not an error.
//! - Nothing in this module retries on its own.

pub mod config;
pub mod merge;
pub mod remote;
pub mod sync_service;

use crate::model::snapshot::SnapshotError;
use crate::service::record_store::StoreError;
use config::ConfigError;
use std::error::Error;
use std::fmt::{Display, Formatter};

pub type SyncResult<T> = Result<T, SyncError>;

/// Sync failure taxonomy.
#[derive(Debug)]
pub enum SyncError {
    /// Endpoint configuration is missing or invalid; no I/O was attempted.
    Config(ConfigError),
    /// Remote payload is not a snapshot document; local state is untouched.
    Parse(SnapshotError),
    /// Network failure or non-success HTTP status.
    Transport {
        operation: &'static str,
        status: Option<u16>,
        /// Response body or transport error text.
        detail: String,
    },
    /// Local store failure while applying a sync result.
    Store(StoreError),
}

impl Display for SyncError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Config(err) => write!(f, "{err}"),
            Self::Parse(err) => write!(f, "{err}"),
            Self::Transport {
                operation,
                status: Some(status),
                detail,
            } => write!(f, "{operation} failed ({status}): {detail}"),
            Self::Transport {
                operation,
                status: None,
                detail,
            } => write!(f, "{operation} failed: {detail}"),
            Self::Store(err) => write!(f, "{err}"),
        }
    }
}

impl Error for SyncError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Config(err) => Some(err),
            Self::Parse(err) => Some(err),
            Self::Transport { .. } => None,
            Self::Store(err) => Some(err),
        }
    }
}

impl From<ConfigError> for SyncError {
    fn from(value: ConfigError) -> Self {
        Self::Config(value)
    }
}

impl From<StoreError> for SyncError {
    fn from(value: StoreError) -> Self {
        match value {
            StoreError::Parse(err) => Self::Parse(err),
            other => Self::Store(other),
        }
    }
}

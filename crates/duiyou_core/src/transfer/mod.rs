//! Backup file transfer: export to and import from portable JSON files.
//!
//! # Responsibility
//! - Write backup payloads where the runtime environment allows.
//! - Discover previously exported backups in conventional directories.
//! - Read a chosen file back as raw text for import or merge.
//!
//! # Invariants
//! - A user-cancelled share flow is a successful no-op.
//! - Backup files are recognized by the `.json` suffix only.

pub mod discovery;
pub mod export;

use chrono::{DateTime, Utc};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::{Path, PathBuf};

pub type TransferResult<T> = Result<T, TransferError>;

/// Backup file extension, without the dot.
pub const BACKUP_EXTENSION: &str = "json";
/// Directory name created under the user's documents folder.
pub const BACKUP_DIR_NAME: &str = "duiyou";

/// File transfer failure.
#[derive(Debug)]
pub enum TransferError {
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    /// No candidate directory could be resolved on this platform.
    NoTargetDirectory,
    /// The platform share/save picker failed for a reason other than cancel.
    Picker(String),
}

impl TransferError {
    pub(crate) fn io(path: &Path, source: std::io::Error) -> Self {
        Self::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

impl Display for TransferError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io { path, source } => write!(f, "file error at `{}`: {source}", path.display()),
            Self::NoTargetDirectory => write!(f, "no writable backup directory is available"),
            Self::Picker(message) => write!(f, "share picker failed: {message}"),
        }
    }
}

impl Error for TransferError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Io { source, .. } => Some(source),
            _ => None,
        }
    }
}

/// Conventional backup directories, most specific first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackupDirs {
    pub primary: PathBuf,
    pub secondary: PathBuf,
}

impl BackupDirs {
    pub fn new(primary: impl Into<PathBuf>, secondary: impl Into<PathBuf>) -> Self {
        Self {
            primary: primary.into(),
            secondary: secondary.into(),
        }
    }

    /// `Documents/duiyou` then `Downloads`, as resolved by the platform.
    ///
    /// Missing platform folders fall back to the home directory.
    ///
    /// # Errors
    /// - `NoTargetDirectory` when not even a home directory is known.
    pub fn platform_default() -> TransferResult<Self> {
        let home = dirs::home_dir();
        let documents = dirs::document_dir()
            .or_else(|| home.clone())
            .ok_or(TransferError::NoTargetDirectory)?;
        let downloads = dirs::download_dir()
            .or(home)
            .ok_or(TransferError::NoTargetDirectory)?;
        Ok(Self::new(documents.join(BACKUP_DIR_NAME), downloads))
    }

    /// Both directories, without duplicates.
    pub fn candidates(&self) -> Vec<&Path> {
        let mut dirs = vec![self.primary.as_path()];
        if self.secondary != self.primary {
            dirs.push(self.secondary.as_path());
        }
        dirs
    }
}

/// `duiyou-backup-YYYYMMDD-HHMMSS.json` for the given instant.
pub fn default_export_file_name(at: DateTime<Utc>) -> String {
    format!(
        "duiyou-backup-{}.{BACKUP_EXTENSION}",
        at.format("%Y%m%d-%H%M%S")
    )
}

/// Reads a backup file as UTF-8 text.
pub fn read_backup_file(path: &Path) -> TransferResult<String> {
    std::fs::read_to_string(path).map_err(|err| TransferError::io(path, err))
}

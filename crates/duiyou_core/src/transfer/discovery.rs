//! Discovery of previously exported backup files.
//!
//! # Invariants
//! - Only regular files with a `.json` extension (any case) are returned.
//! - Results are sorted by modification time, newest first.
//! - Missing or unreadable directories are skipped, not errors.

use super::{BackupDirs, BACKUP_EXTENSION};
use log::debug;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

/// One backup file found on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackupFile {
    pub path: PathBuf,
    pub modified: SystemTime,
    pub size: u64,
}

/// What the caller should do with discovered backups.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackupSelection {
    None,
    /// Exactly one candidate; safe to auto-select.
    Single(BackupFile),
    /// Several candidates, newest first; the user must choose.
    Multiple(Vec<BackupFile>),
}

/// Lists backup files across both conventional directories.
pub fn discover_backups(dirs: &BackupDirs) -> Vec<BackupFile> {
    let mut found: Vec<BackupFile> = dirs
        .candidates()
        .into_iter()
        .flat_map(scan_dir)
        .collect();
    found.sort_by(|left, right| right.modified.cmp(&left.modified));
    debug!("event=backup_discover module=transfer status=ok count={}", found.len());
    found
}

/// Classifies discovery results for auto-selection.
pub fn select_backup(mut files: Vec<BackupFile>) -> BackupSelection {
    match files.len() {
        0 => BackupSelection::None,
        1 => BackupSelection::Single(files.remove(0)),
        _ => BackupSelection::Multiple(files),
    }
}

fn scan_dir(dir: &Path) -> Vec<BackupFile> {
    let entries = match std::fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(err) => {
            debug!(
                "event=backup_discover module=transfer status=skipped error_kind={:?}",
                err.kind()
            );
            return Vec::new();
        }
    };

    entries
        .filter_map(Result::ok)
        .filter(|entry| has_backup_extension(&entry.path()))
        .filter_map(|entry| {
            let metadata = entry.metadata().ok()?;
            if !metadata.is_file() {
                return None;
            }
            Some(BackupFile {
                path: entry.path(),
                modified: metadata.modified().unwrap_or(SystemTime::UNIX_EPOCH),
                size: metadata.len(),
            })
        })
        .collect()
}

fn has_backup_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case(BACKUP_EXTENSION))
}

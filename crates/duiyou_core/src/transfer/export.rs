//! Writing backup payloads to files.
//!
//! # Invariants
//! - Sandboxed targets only write into the staging directory; the user
//!   picks the final destination through the platform picker.
//! - Direct targets fall back to the secondary directory only when the
//!   primary one is permission-denied.

use super::{BackupDirs, TransferError, TransferResult};
use log::{debug, info, warn};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

/// How the user finished a share/save picker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PickerOutcome {
    Completed,
    Cancelled,
}

/// Platform share/save flow for sandboxed environments.
pub trait SharePicker {
    /// Presents `staged_file` to the user for saving or sharing.
    ///
    /// Returns an error message only for genuine failures; dismissal is
    /// `PickerOutcome::Cancelled`.
    fn present(&self, staged_file: &Path, title: &str) -> Result<PickerOutcome, String>;
}

/// Where an export goes.
pub enum ExportTarget<'a> {
    /// Restricted filesystem: stage, then hand off to the picker.
    Sandboxed {
        staging_dir: PathBuf,
        picker: &'a dyn SharePicker,
    },
    /// Direct filesystem access into conventional directories.
    Direct(BackupDirs),
}

/// Successful export result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExportOutcome {
    /// Written directly to this path.
    Written(PathBuf),
    /// Staged at this path and handed to the picker.
    Shared(PathBuf),
    /// The user dismissed the picker.
    Cancelled,
}

const SHARE_TITLE: &str = "Duiyou data backup";

/// Writes `payload` as `file_name` to `target`.
pub fn export_to_file(
    payload: &str,
    file_name: &str,
    target: &ExportTarget<'_>,
) -> TransferResult<ExportOutcome> {
    match target {
        ExportTarget::Sandboxed {
            staging_dir,
            picker,
        } => export_via_picker(payload, file_name, staging_dir, *picker),
        ExportTarget::Direct(dirs) => {
            write_with_fallback(dirs, file_name, payload, write_file).map(ExportOutcome::Written)
        }
    }
}

fn export_via_picker(
    payload: &str,
    file_name: &str,
    staging_dir: &Path,
    picker: &dyn SharePicker,
) -> TransferResult<ExportOutcome> {
    let staged = stage_export(payload, file_name, staging_dir)?;
    finish_share(&staged, picker)
}

/// Writes `payload` into the staging directory and returns the staged path.
///
/// First half of the sandboxed flow, for hosts whose picker runs outside
/// this process.
pub fn stage_export(
    payload: &str,
    file_name: &str,
    staging_dir: &Path,
) -> TransferResult<PathBuf> {
    let staged = staging_dir.join(file_name);
    write_file(&staged, payload)?;
    debug!("event=export_stage module=transfer status=ok bytes={}", payload.len());
    Ok(staged)
}

/// Hands a staged file to `picker` and maps its result.
pub fn finish_share(staged: &Path, picker: &dyn SharePicker) -> TransferResult<ExportOutcome> {
    std::fs::metadata(staged).map_err(|err| TransferError::io(staged, err))?;

    match picker.present(staged, SHARE_TITLE) {
        Ok(PickerOutcome::Completed) => {
            info!("event=export module=transfer status=ok mode=share");
            Ok(ExportOutcome::Shared(staged.to_path_buf()))
        }
        Ok(PickerOutcome::Cancelled) => {
            info!("event=export module=transfer status=cancelled mode=share");
            Ok(ExportOutcome::Cancelled)
        }
        Err(message) => {
            warn!("event=export module=transfer status=error mode=share error_code=picker_failed");
            Err(TransferError::Picker(message))
        }
    }
}

pub(crate) fn write_with_fallback(
    dirs: &BackupDirs,
    file_name: &str,
    payload: &str,
    write: impl Fn(&Path, &str) -> TransferResult<()>,
) -> TransferResult<PathBuf> {
    let primary = dirs.primary.join(file_name);
    match write(&primary, payload) {
        Ok(()) => {
            info!("event=export module=transfer status=ok mode=direct target=primary bytes={}", payload.len());
            Ok(primary)
        }
        Err(TransferError::Io { source, .. }) if source.kind() == ErrorKind::PermissionDenied => {
            warn!("event=export module=transfer status=fallback mode=direct target=secondary");
            let secondary = dirs.secondary.join(file_name);
            write(&secondary, payload)?;
            info!("event=export module=transfer status=ok mode=direct target=secondary bytes={}", payload.len());
            Ok(secondary)
        }
        Err(err) => Err(err),
    }
}

fn write_file(path: &Path, payload: &str) -> TransferResult<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|err| TransferError::io(parent, err))?;
    }
    std::fs::write(path, payload).map_err(|err| TransferError::io(path, err))
}

//! Filesystem utilities for atomic writes and backup rotation.
//!
//! A vault is only ever replaced by renaming a fully written and synced
//! temp file over it, so a crash leaves either the old file or the new one
//! at the canonical path. Across processes the last writer wins.

use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use chrono::{Duration, Utc};

use crate::error::{Result, VaultError};

/// Infix between the vault filename and a backup timestamp.
pub const BACKUP_INFIX: &str = ".backup.";

/// `YYYYmmdd_HHMMSS_mmm`
const BACKUP_TIMESTAMP_FORMAT: &str = "%Y%m%d_%H%M%S_%3f";
const BACKUP_TIMESTAMP_LEN: usize = 19;

/// Rename `temp_path` over `destination`, removing the temp file on failure.
///
/// POSIX `rename` replaces an existing destination atomically. Windows may
/// refuse an existing target, so there the destination is removed first and
/// the rename retried; a crash between the two steps loses the old file.
///
/// # Errors
///
/// Returns the rename error, or the retry error on Windows.
pub fn rename_with_fallback(temp_path: &Path, destination: &Path) -> io::Result<()> {
    match fs::rename(temp_path, destination) {
        Ok(()) => Ok(()),
        Err(err) => replace_after_failed_rename(temp_path, destination, err),
    }
}

#[cfg(windows)]
fn replace_after_failed_rename(
    temp_path: &Path,
    destination: &Path,
    initial_err: io::Error,
) -> io::Result<()> {
    let _ = fs::remove_file(destination);
    fs::rename(temp_path, destination).map_err(|retry_err| {
        let _ = fs::remove_file(temp_path);
        io::Error::new(
            retry_err.kind(),
            format!(
                "Atomic rename failed (initial: {}, retry: {})",
                initial_err, retry_err
            ),
        )
    })
}

#[cfg(not(windows))]
fn replace_after_failed_rename(
    temp_path: &Path,
    _destination: &Path,
    err: io::Error,
) -> io::Result<()> {
    let _ = fs::remove_file(temp_path);
    Err(err)
}

fn split_path(path: &Path) -> Result<(&Path, &str)> {
    let filename = path
        .file_name()
        .and_then(|name| name.to_str())
        .ok_or_else(|| VaultError::FileWriteFailed(format!("Invalid vault path: {}", path.display())))?;
    let parent = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    Ok((parent, filename))
}

/// Path of the temp file a write to `path` would stage through.
///
/// Unique per call; lives next to the destination so the rename stays on
/// one filesystem.
pub fn temp_path_for(path: &Path) -> Result<PathBuf> {
    let (parent, filename) = split_path(path)?;
    let nanos = Utc::now().timestamp_nanos_opt().unwrap_or_default();
    Ok(parent.join(format!("{}.{}.tmp", filename, nanos)))
}

/// Write `data` to `path` atomically.
///
/// Creates a new temp file, writes and fsyncs it, restricts it to the
/// owner (0600 on Unix), renames it over `path` and fsyncs the directory.
///
/// # Errors
///
/// Returns a file error if any step fails; the temp file is removed.
pub fn write_atomic(path: &Path, data: &[u8]) -> Result<()> {
    write_atomic_checked(path, data, |_| Ok(()))
}

/// [`write_atomic`], running `check` on the staged temp file before the rename.
///
/// If `check` fails the temp file is removed and `path` is left untouched.
///
/// # Errors
///
/// Returns the first staging, check or rename error.
pub fn write_atomic_checked<F>(path: &Path, data: &[u8], check: F) -> Result<()>
where
    F: FnOnce(&Path) -> Result<()>,
{
    let temp_path = temp_path_for(path)?;
    if let Err(err) = stage_temp_file(&temp_path, data).and_then(|()| check(&temp_path)) {
        let _ = fs::remove_file(&temp_path);
        return Err(err);
    }

    rename_with_fallback(&temp_path, path)
        .map_err(|e| VaultError::FileWriteFailed(format!("{}: {}", path.display(), e)))?;
    sync_parent_dir(path)
}

fn stage_temp_file(temp_path: &Path, data: &[u8]) -> Result<()> {
    let mut file = OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(temp_path)
        .map_err(|e| VaultError::FileWriteFailed(format!("Temp file create failed: {}", e)))?;
    set_owner_only(temp_path)?;
    file.write_all(data)
        .map_err(|e| VaultError::FileWriteFailed(format!("Temp file write failed: {}", e)))?;
    file.sync_all()
        .map_err(|e| VaultError::FileWriteFailed(format!("Temp file sync failed: {}", e)))?;
    Ok(())
}

#[cfg(unix)]
fn set_owner_only(path: &Path) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;
    let mut perms = fs::metadata(path)?.permissions();
    perms.set_mode(0o600);
    fs::set_permissions(path, perms)?;
    Ok(())
}

#[cfg(not(unix))]
fn set_owner_only(_path: &Path) -> Result<()> {
    Ok(())
}

/// Flush the directory entry of `path` so a completed rename survives a crash.
#[cfg(unix)]
pub fn sync_parent_dir(path: &Path) -> Result<()> {
    let (parent, _) = split_path(path)?;
    File::open(parent)
        .and_then(|dir| dir.sync_all())
        .map_err(|e| VaultError::FileWriteFailed(format!("Directory sync failed: {}", e)))
}

#[cfg(not(unix))]
pub fn sync_parent_dir(_path: &Path) -> Result<()> {
    Ok(())
}

/// Read a whole vault file, mapping OS errors onto file variants.
pub fn read_file(path: &Path) -> Result<Vec<u8>> {
    fs::read(path).map_err(|e| match e.kind() {
        io::ErrorKind::NotFound => VaultError::FileNotFound(path.display().to_string()),
        io::ErrorKind::PermissionDenied => {
            VaultError::FilePermissionDenied(path.display().to_string())
        }
        _ => VaultError::FileReadFailed(format!("{}: {}", path.display(), e)),
    })
}

/// Copy `source` to `destination` through [`write_atomic`].
pub fn copy_atomic(source: &Path, destination: &Path) -> Result<u64> {
    let data = read_file(source)?;
    write_atomic(destination, &data)?;
    Ok(data.len() as u64)
}

/// Snapshot `path` as `<file>.backup.YYYYmmdd_HHMMSS_mmm`.
///
/// A name already taken within the same millisecond moves forward by one
/// millisecond, so every call yields a distinct backup.
pub fn create_backup(path: &Path) -> Result<PathBuf> {
    let (parent, filename) = split_path(path)?;
    let mut stamp = Utc::now();
    let backup_path = loop {
        let candidate = parent.join(format!(
            "{}{}{}",
            filename,
            BACKUP_INFIX,
            stamp.format(BACKUP_TIMESTAMP_FORMAT)
        ));
        if !candidate.exists() {
            break candidate;
        }
        stamp += Duration::milliseconds(1);
    };

    copy_atomic(path, &backup_path)?;
    Ok(backup_path)
}

fn is_backup_suffix(suffix: &str) -> bool {
    suffix.len() == BACKUP_TIMESTAMP_LEN
        && suffix.bytes().enumerate().all(|(i, b)| match i {
            8 | 15 => b == b'_',
            _ => b.is_ascii_digit(),
        })
}

/// Timestamped backups of `path`, newest first.
pub fn list_backups(path: &Path) -> Result<Vec<PathBuf>> {
    let (parent, filename) = split_path(path)?;
    let prefix = format!("{}{}", filename, BACKUP_INFIX);

    let entries = match fs::read_dir(parent) {
        Ok(entries) => entries,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(e.into()),
    };

    let mut names: Vec<String> = Vec::new();
    for entry in entries {
        let entry = entry?;
        if let Some(name) = entry.file_name().to_str() {
            if let Some(suffix) = name.strip_prefix(&prefix) {
                if is_backup_suffix(suffix) {
                    names.push(name.to_string());
                }
            }
        }
    }

    // Timestamps sort lexicographically
    names.sort_unstable_by(|a, b| b.cmp(a));
    Ok(names.into_iter().map(|name| parent.join(name)).collect())
}

/// Delete all but the `keep` newest backups, returning how many were removed.
pub fn cleanup_backups(path: &Path, keep: usize) -> Result<usize> {
    let mut removed = 0;
    for stale in list_backups(path)?.into_iter().skip(keep) {
        fs::remove_file(&stale)?;
        removed += 1;
    }
    Ok(removed)
}

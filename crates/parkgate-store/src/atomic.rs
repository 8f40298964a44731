//! # Atomic File Replacement
//!
//! Write-then-rename helpers shared by the queue and the counter.
//!
//! ```text
//!   1. write   offline_data.json.tmp
//!   2. fsync   offline_data.json.tmp
//!   3. rename  offline_data.json.tmp → offline_data.json
//!   4. fsync   parent directory (unix)
//! ```
//!
//! Rename within one directory is atomic on the filesystems we target, so a
//! reader sees either the old file or the new one.

use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

/// Suffix of the staging file written before the rename.
pub const TEMP_SUFFIX: &str = "tmp";

/// Returns the staging path for `path`.
pub fn temp_path(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".");
    name.push(TEMP_SUFFIX);
    path.with_file_name(name)
}

/// Replaces the contents of `path` with `data` atomically.
pub fn write_atomic(path: &Path, data: &[u8]) -> io::Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }

    let staging = temp_path(path);
    let mut file = File::create(&staging)?;
    file.write_all(data)?;
    file.sync_all()?;
    drop(file);

    fs::rename(&staging, path)?;
    sync_parent(path)
}

/// Removes `path` if it exists and makes the removal durable.
///
/// Returns whether a file was removed.
pub fn remove_durable(path: &Path) -> io::Result<bool> {
    match fs::remove_file(path) {
        Ok(()) => {
            sync_parent(path)?;
            Ok(true)
        }
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(e),
    }
}

/// Reads `path`, mapping a missing file to `None`.
pub fn read_optional(path: &Path) -> io::Result<Option<Vec<u8>>> {
    match fs::read(path) {
        Ok(data) => Ok(Some(data)),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e),
    }
}

#[cfg(unix)]
fn sync_parent(path: &Path) -> io::Result<()> {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => File::open(parent)?.sync_all(),
        _ => Ok(()),
    }
}

// NTFS journals metadata; directory handles cannot be fsynced there.
#[cfg(not(unix))]
fn sync_parent(_path: &Path) -> io::Result<()> {
    Ok(())
}

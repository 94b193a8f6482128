use std::collections::BTreeSet;
use std::fs;
use std::io;
use std::path::Path;

use desk_logging::{desk_info, desk_warn};
use tempfile::NamedTempFile;
use thiserror::Error;

/// Marker carried by an in-progress, not-yet-finalized download.
pub const PART_SUFFIX: &str = ".part";

#[derive(Debug, Error)]
pub enum PersistError {
    #[error("download directory missing or not writable: {0}")]
    DownloadDir(String),
    #[error("io error: {0}")]
    Io(#[from] io::Error),
}

/// Ensure the download directory exists and is writable; create if missing.
pub fn ensure_download_dir(dir: &Path) -> Result<(), PersistError> {
    if dir.exists() {
        let meta = fs::metadata(dir).map_err(|e| PersistError::DownloadDir(e.to_string()))?;
        if !meta.is_dir() {
            return Err(PersistError::DownloadDir("path is not a directory".into()));
        }
    } else {
        fs::create_dir_all(dir).map_err(|e| PersistError::DownloadDir(e.to_string()))?;
    }
    // Basic writability probe: try creating a temp file.
    NamedTempFile::new_in(dir).map_err(|e| PersistError::DownloadDir(e.to_string()))?;
    Ok(())
}

/// Snapshot of the file names currently present in the directory.
pub fn list_file_names(dir: &Path) -> Result<BTreeSet<String>, PersistError> {
    let mut names = BTreeSet::new();
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        if let Some(name) = entry.file_name().to_str() {
            names.insert(name.to_string());
        }
    }
    Ok(names)
}

/// True iff no file that is new relative to `snapshot` still carries the
/// partial-download suffix. Partials that predate the snapshot are ignored.
pub fn batch_complete(snapshot: &BTreeSet<String>, current: &BTreeSet<String>) -> bool {
    current
        .difference(snapshot)
        .all(|name| !name.ends_with(PART_SUFFIX))
}

/// Delete every partial-download artifact in the directory. Returns the
/// number removed; per-file failures are logged and skipped.
pub fn remove_partial_files(dir: &Path) -> usize {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(err) => {
            desk_warn!("cannot list {dir:?} for cleanup: {err}");
            return 0;
        }
    };
    let mut removed = 0;
    for entry in entries.flatten() {
        let name = entry.file_name();
        let Some(name) = name.to_str() else { continue };
        if !name.ends_with(PART_SUFFIX) {
            continue;
        }
        match fs::remove_file(entry.path()) {
            Ok(()) => {
                desk_info!("removed stale partial download {name}");
                removed += 1;
            }
            Err(err) => desk_warn!("failed to remove {name}: {err}"),
        }
    }
    removed
}

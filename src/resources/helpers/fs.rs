//! File-system helpers for the dotfile adapter.
use std::path::{Path, PathBuf};

use crate::resources::ResourceError;

/// Suffix appended to a file moved aside before it is replaced.
pub const BACKUP_SUFFIX: &str = ".backup";

fn io_error(action: &'static str, path: &Path, source: std::io::Error) -> ResourceError {
    ResourceError::Io {
        action,
        path: path.display().to_string(),
        source,
    }
}

/// Ensure the parent directory of `path` exists, creating it (and any
/// ancestors) if necessary.
///
/// # Errors
///
/// Returns an error if the directory cannot be created.
pub fn ensure_parent_dir(path: &Path) -> Result<(), ResourceError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| io_error("create parent", parent, e))?;
    }
    Ok(())
}

/// Remove an existing file or symlink at `path`, including broken symlinks.
///
/// Does nothing if `path` does not exist.
///
/// # Errors
///
/// Returns an error if the path exists but cannot be removed.
pub fn remove_existing(path: &Path) -> Result<(), ResourceError> {
    if path.symlink_metadata().is_ok() {
        std::fs::remove_file(path).map_err(|e| io_error("remove existing", path, e))?;
    }
    Ok(())
}

/// Move a regular file at `path` aside to `<path>.backup`, replacing an
/// older backup. Symlinks are not backed up: they carry no user data.
///
/// Returns the backup path if a file was moved.
///
/// # Errors
///
/// Returns an error if the file cannot be renamed.
pub fn backup_existing(path: &Path) -> Result<Option<PathBuf>, ResourceError> {
    let Ok(meta) = path.symlink_metadata() else {
        return Ok(None);
    };
    if !meta.is_file() {
        return Ok(None);
    }
    let mut name = path.as_os_str().to_os_string();
    name.push(BACKUP_SUFFIX);
    let backup = PathBuf::from(name);
    std::fs::rename(path, &backup).map_err(|e| io_error("back up", path, e))?;
    Ok(Some(backup))
}

/// Whether two regular files have identical contents. Unreadable files
/// compare unequal.
#[must_use]
pub fn same_contents(a: &Path, b: &Path) -> bool {
    match (std::fs::read(a), std::fs::read(b)) {
        (Ok(x), Ok(y)) => x == y,
        _ => false,
    }
}

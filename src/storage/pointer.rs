//! The pointer file: one line holding the absolute path of the remote
//! config directory. Its presence means "use remote storage".
use std::io;
use std::path::{Path, PathBuf};

use crate::error::LocationError;
use crate::operations::FileSystemOps;

/// Read the pointer at `pointer`, `None` if there is no pointer file.
///
/// # Errors
///
/// - [`LocationError::PointerRead`] if the file exists but cannot be read.
/// - [`LocationError::InvalidPointer`] if it is empty, not UTF-8, or not an
///   absolute path.
pub fn read(fs: &dyn FileSystemOps, pointer: &Path) -> Result<Option<PathBuf>, LocationError> {
    if !fs.is_file(pointer) {
        return Ok(None);
    }
    let bytes = fs.read(pointer).map_err(|source| LocationError::PointerRead {
        pointer: pointer.to_path_buf(),
        source,
    })?;
    let invalid = |reason: &str| LocationError::InvalidPointer {
        pointer: pointer.to_path_buf(),
        reason: reason.to_string(),
    };
    let text = String::from_utf8(bytes).map_err(|_| invalid("not valid UTF-8"))?;
    let line = text.trim();
    if line.is_empty() {
        return Err(invalid("file is empty"));
    }
    let target = PathBuf::from(line);
    if !target.is_absolute() {
        return Err(invalid("path is not absolute"));
    }
    Ok(Some(target))
}

/// Point at `target`, creating the pointer's directory if needed.
///
/// # Errors
///
/// Returns an error if the directory or file cannot be written.
pub fn write(fs: &dyn FileSystemOps, pointer: &Path, target: &Path) -> io::Result<()> {
    if let Some(parent) = pointer.parent() {
        fs.create_dir_all(parent)?;
    }
    let mut line = target.as_os_str().to_string_lossy().into_owned();
    line.push('\n');
    fs.write_atomic(pointer, line.as_bytes())
}

/// Remove the pointer. Succeeds if there is none.
///
/// # Errors
///
/// Returns an error if the file exists but cannot be removed.
pub fn delete(fs: &dyn FileSystemOps, pointer: &Path) -> io::Result<()> {
    match fs.remove_file(pointer) {
        Err(e) if e.kind() != io::ErrorKind::NotFound => Err(e),
        _ => Ok(()),
    }
}

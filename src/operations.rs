//! Filesystem operation abstractions for dependency injection.
//!
//! Provides the [`FileSystemOps`] trait so that storage migration can be
//! unit-tested with injected failures. Production code uses
//! [`SystemFileSystemOps`]; tests use `FaultyFileSystemOps`.

use std::io;
use std::path::{Path, PathBuf};

use crate::storage::cloud::metadata_is_evicted;

/// Abstraction over the filesystem calls the migrator makes.
pub trait FileSystemOps: Send + Sync + std::fmt::Debug {
    /// Returns `true` if `path` exists on the filesystem.
    fn exists(&self, path: &Path) -> bool;

    /// Returns `true` if `path` is a regular file.
    fn is_file(&self, path: &Path) -> bool;

    /// Returns `true` if `path` is a directory.
    fn is_dir(&self, path: &Path) -> bool;

    /// Returns `true` if the file at `path` exists but its contents live
    /// only in the cloud.
    fn is_evicted(&self, path: &Path) -> bool;

    /// Returns the immediate child paths inside `path`, sorted.
    ///
    /// # Errors
    ///
    /// Returns an error if `path` cannot be opened or read as a directory.
    fn read_dir(&self, path: &Path) -> io::Result<Vec<PathBuf>>;

    /// Read the whole file at `path`.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read.
    fn read(&self, path: &Path) -> io::Result<Vec<u8>>;

    /// Write `contents` to `path` via a temporary sibling and a rename.
    ///
    /// # Errors
    ///
    /// Returns an error if either step fails.
    fn write_atomic(&self, path: &Path, contents: &[u8]) -> io::Result<()>;

    /// Copy the file at `from` to `to`, overwriting.
    ///
    /// # Errors
    ///
    /// Returns an error if the copy fails.
    fn copy_file(&self, from: &Path, to: &Path) -> io::Result<()>;

    /// Create `path` and any missing parents.
    ///
    /// # Errors
    ///
    /// Returns an error if a directory cannot be created.
    fn create_dir_all(&self, path: &Path) -> io::Result<()>;

    /// Remove the file at `path`.
    ///
    /// # Errors
    ///
    /// Returns an error if removal fails.
    fn remove_file(&self, path: &Path) -> io::Result<()>;

    /// Remove the directory at `path` and everything below it.
    ///
    /// # Errors
    ///
    /// Returns an error if removal fails.
    fn remove_dir_all(&self, path: &Path) -> io::Result<()>;
}

/// Production [`FileSystemOps`] implementation that delegates to [`std::fs`].
#[derive(Debug, Default)]
pub struct SystemFileSystemOps;

impl FileSystemOps for SystemFileSystemOps {
    fn exists(&self, path: &Path) -> bool {
        path.exists()
    }

    fn is_file(&self, path: &Path) -> bool {
        path.is_file()
    }

    fn is_dir(&self, path: &Path) -> bool {
        path.is_dir()
    }

    fn is_evicted(&self, path: &Path) -> bool {
        std::fs::metadata(path).is_ok_and(|meta| metadata_is_evicted(&meta))
    }

    fn read_dir(&self, path: &Path) -> io::Result<Vec<PathBuf>> {
        let mut entries = std::fs::read_dir(path)?
            .map(|e| e.map(|entry| entry.path()))
            .collect::<io::Result<Vec<_>>>()?;
        entries.sort();
        Ok(entries)
    }

    fn read(&self, path: &Path) -> io::Result<Vec<u8>> {
        std::fs::read(path)
    }

    fn write_atomic(&self, path: &Path, contents: &[u8]) -> io::Result<()> {
        let mut tmp = path.as_os_str().to_owned();
        tmp.push(".tmp");
        let tmp = PathBuf::from(tmp);
        std::fs::write(&tmp, contents)?;
        std::fs::rename(&tmp, path)
    }

    fn copy_file(&self, from: &Path, to: &Path) -> io::Result<()> {
        std::fs::copy(from, to).map(|_| ())
    }

    fn create_dir_all(&self, path: &Path) -> io::Result<()> {
        std::fs::create_dir_all(path)
    }

    fn remove_file(&self, path: &Path) -> io::Result<()> {
        std::fs::remove_file(path)
    }

    fn remove_dir_all(&self, path: &Path) -> io::Result<()> {
        std::fs::remove_dir_all(path)
    }
}

/// An I/O failure tied to the path it happened on.
#[derive(Debug, thiserror::Error)]
#[error("{}: {source}", .path.display())]
pub struct PathError {
    /// Path the operation failed on.
    pub path: PathBuf,
    /// Underlying I/O error.
    #[source]
    pub source: io::Error,
}

impl PathError {
    fn at(path: &Path) -> impl FnOnce(io::Error) -> Self + '_ {
        move |source| Self {
            path: path.to_path_buf(),
            source,
        }
    }
}

/// Recursively copy the directory `from` into `to`.
///
/// Returns the copied files relative to `from`, in traversal order.
/// Symlinks are followed.
///
/// # Errors
///
/// Returns the first [`PathError`] hit; files copied before it stay in
/// place.
pub fn copy_tree(fs: &dyn FileSystemOps, from: &Path, to: &Path) -> Result<Vec<PathBuf>, PathError> {
    let mut copied = Vec::new();
    copy_tree_inner(fs, from, to, Path::new(""), &mut copied)?;
    Ok(copied)
}

fn copy_tree_inner(
    fs: &dyn FileSystemOps,
    from: &Path,
    to: &Path,
    relative: &Path,
    copied: &mut Vec<PathBuf>,
) -> Result<(), PathError> {
    let dest_dir = to.join(relative);
    fs.create_dir_all(&dest_dir).map_err(PathError::at(&dest_dir))?;
    let source_dir = from.join(relative);
    for entry in fs.read_dir(&source_dir).map_err(PathError::at(&source_dir))? {
        let Some(name) = entry.file_name() else {
            continue;
        };
        let rel = relative.join(name);
        if fs.is_dir(&entry) {
            copy_tree_inner(fs, from, to, &rel, copied)?;
        } else {
            let dest = to.join(&rel);
            fs.copy_file(&entry, &dest).map_err(PathError::at(&dest))?;
            copied.push(rel);
        }
    }
    Ok(())
}

/// [`FileSystemOps`] over the real filesystem that fails chosen calls.
///
/// Configure failures with the builder-style methods, then pass
/// `Arc::new(fs)` wherever a [`FileSystemOps`] is accepted.
#[cfg(test)]
#[derive(Debug, Default)]
pub struct FaultyFileSystemOps {
    fail_remove_under: Option<PathBuf>,
    fail_write_to: Option<PathBuf>,
    fail_copy_under: Option<PathBuf>,
    fail_read_dir: Option<PathBuf>,
    evicted: Option<PathBuf>,
}

#[cfg(test)]
impl FaultyFileSystemOps {
    /// Fails nothing until configured.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail every removal at or below `path`.
    #[must_use]
    pub fn with_failing_remove(mut self, path: impl Into<PathBuf>) -> Self {
        self.fail_remove_under = Some(path.into());
        self
    }

    /// Fail atomic writes to exactly `path`.
    #[must_use]
    pub fn with_failing_write(mut self, path: impl Into<PathBuf>) -> Self {
        self.fail_write_to = Some(path.into());
        self
    }

    /// Fail copies whose destination is at or below `path`.
    #[must_use]
    pub fn with_failing_copy(mut self, path: impl Into<PathBuf>) -> Self {
        self.fail_copy_under = Some(path.into());
        self
    }

    /// Fail listing exactly `path`.
    #[must_use]
    pub fn with_failing_read_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.fail_read_dir = Some(path.into());
        self
    }

    /// Report the file at `path` as cloud-only.
    #[must_use]
    pub fn with_evicted(mut self, path: impl Into<PathBuf>) -> Self {
        self.evicted = Some(path.into());
        self
    }

    fn denied() -> io::Error {
        io::Error::from(io::ErrorKind::PermissionDenied)
    }
}

#[cfg(test)]
impl FileSystemOps for FaultyFileSystemOps {
    fn exists(&self, path: &Path) -> bool {
        SystemFileSystemOps.exists(path)
    }

    fn is_file(&self, path: &Path) -> bool {
        SystemFileSystemOps.is_file(path)
    }

    fn is_dir(&self, path: &Path) -> bool {
        SystemFileSystemOps.is_dir(path)
    }

    fn is_evicted(&self, path: &Path) -> bool {
        self.evicted.as_deref() == Some(path) || SystemFileSystemOps.is_evicted(path)
    }

    fn read_dir(&self, path: &Path) -> io::Result<Vec<PathBuf>> {
        if self.fail_read_dir.as_deref() == Some(path) {
            return Err(Self::denied());
        }
        SystemFileSystemOps.read_dir(path)
    }

    fn read(&self, path: &Path) -> io::Result<Vec<u8>> {
        SystemFileSystemOps.read(path)
    }

    fn write_atomic(&self, path: &Path, contents: &[u8]) -> io::Result<()> {
        if self.fail_write_to.as_deref() == Some(path) {
            return Err(Self::denied());
        }
        SystemFileSystemOps.write_atomic(path, contents)
    }

    fn copy_file(&self, from: &Path, to: &Path) -> io::Result<()> {
        if self.fail_copy_under.as_deref().is_some_and(|p| to.starts_with(p)) {
            return Err(Self::denied());
        }
        SystemFileSystemOps.copy_file(from, to)
    }

    fn create_dir_all(&self, path: &Path) -> io::Result<()> {
        SystemFileSystemOps.create_dir_all(path)
    }

    fn remove_file(&self, path: &Path) -> io::Result<()> {
        if self.fail_remove_under.as_deref().is_some_and(|p| path.starts_with(p)) {
            return Err(Self::denied());
        }
        SystemFileSystemOps.remove_file(path)
    }

    fn remove_dir_all(&self, path: &Path) -> io::Result<()> {
        if self.fail_remove_under.as_deref().is_some_and(|p| path.starts_with(p)) {
            return Err(Self::denied());
        }
        SystemFileSystemOps.remove_dir_all(path)
    }
}

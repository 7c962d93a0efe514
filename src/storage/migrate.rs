//! `init --remote`, `init --local` and `init --status`.
//!
//! Migration to the remote folder copies, verifies, and only then deletes
//! the local originals. The pointer is written last, after the data is
//! known to be in place, so a failure at any step leaves at least one full
//! copy that the current pointer state can find.
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::Serialize;

use super::cloud::{self, ICloudDrive};
use super::{StorageKind, StorageLayout, pointer};
use crate::config::{document_path, dotfiles_path};
use crate::error::{LocationError, MigrationError};
use crate::logging::Log;
use crate::operations::{FileSystemOps, PathError, copy_tree};

/// Outcome of `init --remote`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MigrationReport {
    /// Storage in use afterwards.
    pub storage: StorageKind,
    /// Config directory in use afterwards.
    pub config_dir: PathBuf,
    /// Whether local data was moved.
    pub migrated: bool,
    /// Files copied and removed locally.
    pub files_moved: usize,
    /// A remote document was already present and is now in use.
    pub existing_remote: bool,
}

/// Outcome of `init --local`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RevertReport {
    /// Storage in use afterwards.
    pub storage: StorageKind,
    /// Config directory in use afterwards.
    pub config_dir: PathBuf,
    /// Files copied down.
    pub files_copied: usize,
    /// The remote directory, which is left in place.
    pub remote_dir: PathBuf,
}

/// Outcome of `init --status`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StorageStatus {
    /// Storage in use.
    pub storage: StorageKind,
    /// Config directory in use.
    pub config_dir: PathBuf,
    /// The pointer file, when remote storage is in use.
    pub pointer_file: Option<PathBuf>,
    /// Whether iCloud Drive is enabled on this machine.
    pub remote_available: bool,
    /// Sync hazards or an unreachable target.
    pub warnings: Vec<String>,
}

/// Moves the document and dotfile payloads between local and remote
/// storage.
#[derive(Debug)]
pub struct Migrator {
    layout: StorageLayout,
    remote: ICloudDrive,
    fs: Arc<dyn FileSystemOps>,
}

impl Migrator {
    /// Migrator between `layout`'s default directory and `remote`.
    #[must_use]
    pub fn new(layout: StorageLayout, remote: ICloudDrive, fs: Arc<dyn FileSystemOps>) -> Self {
        Self { layout, remote, fs }
    }

    /// Local data exists: the document, or a non-empty dotfiles folder.
    fn has_local(&self) -> bool {
        let local = &self.layout.default_dir;
        self.fs.is_file(&document_path(local)) || self.has_payload(local)
    }

    fn has_payload(&self, dir: &Path) -> bool {
        let payload = dotfiles_path(dir);
        self.fs.is_dir(&payload)
            && self
                .fs
                .read_dir(&payload)
                .is_ok_and(|entries| !entries.is_empty())
    }

    /// Switch to remote storage, migrating local data if there is any.
    ///
    /// # Errors
    ///
    /// - [`MigrationError::RemoteUnavailable`] if iCloud Drive is missing.
    /// - [`MigrationError::Conflict`] if both locations hold data and
    ///   `force` is not set. Neither side is modified.
    /// - [`MigrationError::WriteFailure`] if copying or verifying fails.
    ///   Local data is untouched and no pointer is written.
    /// - [`MigrationError::CleanupFailure`] if the data was copied but a
    ///   local original could not be removed. The pointer is still written.
    /// - [`MigrationError::PointerWriteFailure`] if the pointer cannot be
    ///   written.
    pub fn init_remote(&self, force: bool, log: &dyn Log) -> Result<MigrationReport, MigrationError> {
        if !self.remote.is_available(&*self.fs) {
            return Err(MigrationError::RemoteUnavailable {
                path: self.remote.root().to_path_buf(),
            });
        }

        let local_dir = &self.layout.default_dir;
        let remote_dir = self.remote.config_dir();
        let has_local = self.has_local();
        let has_remote = self.fs.is_file(&document_path(&remote_dir));
        log.debug(&format!(
            "local data: {has_local}, remote document: {has_remote}"
        ));

        if has_local && has_remote && !force {
            return Err(MigrationError::Conflict {
                local: document_path(local_dir),
                remote: document_path(&remote_dir),
            });
        }

        self.fs
            .create_dir_all(&remote_dir)
            .map_err(|source| MigrationError::WriteFailure {
                path: remote_dir.clone(),
                source,
            })?;

        if !has_local {
            self.write_pointer(&remote_dir)?;
            if has_remote {
                log.info(&format!(
                    "existing iCloud configuration found in {}",
                    remote_dir.display()
                ));
            }
            return Ok(MigrationReport {
                storage: StorageKind::Remote,
                config_dir: remote_dir,
                migrated: false,
                files_moved: 0,
                existing_remote: has_remote,
            });
        }

        if has_remote {
            log.warn("overwriting the iCloud configuration with the local one");
        }
        let files_moved = self.copy_verified(local_dir, &remote_dir, log)?;
        log.info(&format!(
            "copied {files_moved} files to {}",
            remote_dir.display()
        ));

        let cleanup = self.remove_originals(local_dir, &remote_dir);
        self.write_pointer(&remote_dir)?;
        cleanup?;

        Ok(MigrationReport {
            storage: StorageKind::Remote,
            config_dir: remote_dir,
            migrated: true,
            files_moved,
            existing_remote: false,
        })
    }

    /// Switch back to local storage, copying the remote data down.
    ///
    /// Only the pointer is deleted; the remote copy stays.
    ///
    /// # Errors
    ///
    /// - [`MigrationError::NotUsingRemote`] if there is no pointer.
    /// - [`MigrationError::RemoteNotAccessible`] if the pointer target is
    ///   gone. The pointer is left in place.
    /// - [`MigrationError::WriteFailure`] if copying fails.
    /// - [`MigrationError::PointerWriteFailure`] if the pointer cannot be
    ///   removed.
    pub fn init_local(&self, log: &dyn Log) -> Result<RevertReport, MigrationError> {
        let pointer_path = &self.layout.pointer_path;
        let Some(remote_dir) = pointer::read(&*self.fs, pointer_path)? else {
            return Err(MigrationError::NotUsingRemote {
                pointer: pointer_path.clone(),
            });
        };
        if !self.fs.is_dir(&remote_dir) {
            return Err(MigrationError::RemoteNotAccessible {
                pointer: pointer_path.clone(),
                target: remote_dir,
            });
        }
        for warning in cloud::document_warnings(&*self.fs, &remote_dir) {
            log.warn(&warning);
        }

        let local_dir = &self.layout.default_dir;
        self.fs
            .create_dir_all(local_dir)
            .map_err(|source| MigrationError::WriteFailure {
                path: local_dir.clone(),
                source,
            })?;
        let files_copied = self.copy_verified(&remote_dir, local_dir, log)?;

        pointer::delete(&*self.fs, pointer_path).map_err(|source| {
            MigrationError::PointerWriteFailure {
                pointer: pointer_path.clone(),
                source,
            }
        })?;
        log.info(&format!(
            "copied {files_copied} files to {}; the iCloud copy in {} was kept",
            local_dir.display(),
            remote_dir.display()
        ));

        Ok(RevertReport {
            storage: StorageKind::Local,
            config_dir: local_dir.clone(),
            files_copied,
            remote_dir,
        })
    }

    /// Report the current storage configuration.
    ///
    /// # Errors
    ///
    /// Returns a [`LocationError`] if the pointer file is unreadable or
    /// invalid.
    pub fn status(&self) -> Result<StorageStatus, LocationError> {
        let remote_available = self.remote.is_available(&*self.fs);
        let Some(target) = pointer::read(&*self.fs, &self.layout.pointer_path)? else {
            return Ok(StorageStatus {
                storage: StorageKind::Local,
                config_dir: self.layout.default_dir.clone(),
                pointer_file: None,
                remote_available,
                warnings: Vec::new(),
            });
        };

        let mut warnings = Vec::new();
        if self.fs.is_dir(&target) {
            warnings.extend(cloud::document_warnings(&*self.fs, &target));
        } else {
            warnings.push(format!(
                "{} is not accessible; run 'macsetup init --local' to switch back",
                target.display()
            ));
        }
        Ok(StorageStatus {
            storage: StorageKind::Remote,
            config_dir: target,
            pointer_file: Some(self.layout.pointer_path.clone()),
            remote_available,
            warnings,
        })
    }

    /// Copy the document and dotfiles from `from` to `to`, then verify every
    /// copied file byte for byte. Returns the number of files copied.
    fn copy_verified(&self, from: &Path, to: &Path, log: &dyn Log) -> Result<usize, MigrationError> {
        let write_failure = |e: PathError| MigrationError::WriteFailure {
            path: e.path,
            source: e.source,
        };
        let mut copied: Vec<(PathBuf, PathBuf)> = Vec::new();

        let document = document_path(from);
        if self.fs.is_file(&document) {
            let dest = document_path(to);
            self.fs
                .copy_file(&document, &dest)
                .map_err(|source| MigrationError::WriteFailure {
                    path: dest.clone(),
                    source,
                })?;
            copied.push((document, dest));
        }

        let payload = dotfiles_path(from);
        if self.fs.is_dir(&payload) {
            let dest_payload = dotfiles_path(to);
            if self.fs.exists(&dest_payload) {
                self.fs.remove_dir_all(&dest_payload).map_err(|source| {
                    MigrationError::WriteFailure {
                        path: dest_payload.clone(),
                        source,
                    }
                })?;
            }
            let files = copy_tree(&*self.fs, &payload, &dest_payload).map_err(write_failure)?;
            copied.extend(
                files
                    .into_iter()
                    .map(|rel| (payload.join(&rel), dest_payload.join(rel))),
            );
        }

        for (source, dest) in &copied {
            log.debug(&format!("verifying {}", dest.display()));
            let matches = match (self.fs.read(source), self.fs.read(dest)) {
                (Ok(a), Ok(b)) => a == b,
                _ => false,
            };
            if !matches {
                return Err(MigrationError::WriteFailure {
                    path: dest.clone(),
                    source: io::Error::other("copied file does not match the original"),
                });
            }
        }
        Ok(copied.len())
    }

    /// Delete the local document and dotfiles after a verified copy.
    fn remove_originals(&self, local_dir: &Path, copied_to: &Path) -> Result<(), MigrationError> {
        let cleanup_failure = |path: PathBuf, source: io::Error| MigrationError::CleanupFailure {
            path,
            copied_to: copied_to.to_path_buf(),
            source,
        };
        let mut first_error = None;

        let document = document_path(local_dir);
        if self.fs.is_file(&document)
            && let Err(source) = self.fs.remove_file(&document)
        {
            first_error = Some(cleanup_failure(document, source));
        }
        let payload = dotfiles_path(local_dir);
        if self.fs.is_dir(&payload)
            && let Err(source) = self.fs.remove_dir_all(&payload)
            && first_error.is_none()
        {
            first_error = Some(cleanup_failure(payload, source));
        }

        first_error.map_or(Ok(()), Err)
    }

    fn write_pointer(&self, target: &Path) -> Result<(), MigrationError> {
        pointer::write(&*self.fs, &self.layout.pointer_path, target).map_err(|source| {
            MigrationError::PointerWriteFailure {
                pointer: self.layout.pointer_path.clone(),
                source,
            }
        })
    }
}

//! Where the configuration document lives.
//!
//! The document directory is, in order of precedence: the `--config-dir`
//! argument, the `MACSETUP_CONFIG_DIR` environment variable, the target of
//! the pointer file `~/.config/macsetup/config-dir`, or `~/.config/macsetup`
//! itself. A pointer whose target cannot be reached is an error; resolution
//! never falls back to the local directory behind the user's back.
pub mod cloud;
pub mod migrate;
pub mod pointer;

use std::ffi::OsStr;
use std::fmt;
use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::error::LocationError;
use crate::operations::FileSystemOps;

/// File name of the pointer inside the default directory.
pub const POINTER_FILE: &str = "config-dir";

/// Environment variable overriding the config directory.
pub const CONFIG_DIR_ENV: &str = "MACSETUP_CONFIG_DIR";

/// Which kind of storage holds the document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StorageKind {
    /// The default directory on this machine.
    Local,
    /// A synced iCloud Drive folder named by the pointer file.
    #[serde(rename = "icloud")]
    Remote,
}

impl fmt::Display for StorageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Local => "local",
            Self::Remote => "icloud",
        })
    }
}

/// Fixed locations derived from the home directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageLayout {
    /// `~/.config/macsetup`
    pub default_dir: PathBuf,
    /// `~/.config/macsetup/config-dir`
    pub pointer_path: PathBuf,
}

impl StorageLayout {
    /// Layout under `home`.
    #[must_use]
    pub fn from_home(home: &Path) -> Self {
        let default_dir = home.join(".config").join("macsetup");
        Self {
            pointer_path: default_dir.join(POINTER_FILE),
            default_dir,
        }
    }

    /// Determine the config directory.
    ///
    /// `env_value` is the value of [`CONFIG_DIR_ENV`], passed in so callers
    /// control the environment. Empty values are ignored.
    ///
    /// # Errors
    ///
    /// - [`LocationError::ConfigDirUnreachable`] if the pointer names a
    ///   directory that does not exist.
    /// - [`LocationError::InvalidPointer`] / [`LocationError::PointerRead`]
    ///   if the pointer file is unusable.
    pub fn resolve(
        &self,
        fs: &dyn FileSystemOps,
        argument: Option<&Path>,
        env_value: Option<&OsStr>,
    ) -> Result<ResolvedConfigDir, LocationError> {
        if let Some(path) = argument {
            return Ok(ResolvedConfigDir {
                path: path.to_path_buf(),
                source: DirSource::Argument,
            });
        }
        if let Some(value) = env_value.filter(|v| !v.is_empty()) {
            return Ok(ResolvedConfigDir {
                path: PathBuf::from(value),
                source: DirSource::Environment,
            });
        }
        if let Some(target) = pointer::read(fs, &self.pointer_path)? {
            if !fs.is_dir(&target) {
                return Err(LocationError::ConfigDirUnreachable {
                    pointer: self.pointer_path.clone(),
                    target,
                });
            }
            return Ok(ResolvedConfigDir {
                path: target,
                source: DirSource::Pointer {
                    pointer: self.pointer_path.clone(),
                },
            });
        }
        Ok(ResolvedConfigDir {
            path: self.default_dir.clone(),
            source: DirSource::Default,
        })
    }
}

/// Why a directory was chosen.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DirSource {
    /// `--config-dir`.
    Argument,
    /// [`CONFIG_DIR_ENV`].
    Environment,
    /// The pointer file.
    Pointer {
        /// Pointer file that named the directory.
        pointer: PathBuf,
    },
    /// The default directory.
    Default,
}

/// The directory holding the document, and why.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedConfigDir {
    /// The directory.
    pub path: PathBuf,
    /// Why it was chosen.
    pub source: DirSource,
}

impl ResolvedConfigDir {
    /// Remote when the pointer chose the directory, local otherwise.
    #[must_use]
    pub const fn storage(&self) -> StorageKind {
        match self.source {
            DirSource::Pointer { .. } => StorageKind::Remote,
            DirSource::Argument | DirSource::Environment | DirSource::Default => {
                StorageKind::Local
            }
        }
    }
}

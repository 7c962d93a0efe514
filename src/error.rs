//! Domain-specific error types for the setup engine.
//!
//! Internal modules return typed errors (e.g., [`ConfigError`],
//! [`MigrationError`]) while command handlers at the CLI boundary convert
//! them to [`anyhow::Error`] via the standard `?` operator. `main` downcasts
//! the well-known kinds back out to pick an exit code.
//!
//! # Error hierarchy
//!
//! ```text
//! ConfigError        document I/O, parsing, profile resolution   (fatal)
//! LocationError      pointer file / config directory resolution  (fatal)
//! MigrationError     init --remote / --local                     (fatal)
//! StateError         run-state persistence                       (fatal on load)
//! ItemInstallError   a single work item failed                   (recovered)
//! RunFatalError      unexpected failure inside a run             (downgraded)
//! ```

use std::path::PathBuf;

use thiserror::Error;

use crate::resources::ResourceError;
use crate::setup::ItemKind;

/// Errors that arise from loading the configuration document and resolving
/// profiles inside it.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// No document exists at the resolved location.
    #[error("configuration not found at {}", .path.display())]
    DocumentNotFound {
        /// Expected path of the document.
        path: PathBuf,
    },

    /// The document exists but could not be read.
    #[error("failed to read {}: {source}", .path.display())]
    Read {
        /// Path of the document.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// The document is not valid YAML or does not match the expected shape.
    #[error("invalid configuration in {}: {source}", .path.display())]
    Parse {
        /// Path of the document.
        path: PathBuf,
        /// Underlying YAML error.
        source: serde_yaml_ng::Error,
    },

    /// The document could not be written.
    #[error("failed to write {}: {source}", .path.display())]
    Write {
        /// Path of the document.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// The document could not be serialized.
    #[error("failed to serialize configuration: {0}")]
    Serialize(#[source] serde_yaml_ng::Error),

    /// A profile, or the parent named by a profile's `extends`, is absent.
    #[error("{}", profile_not_found_message(.name, .referenced_by.as_deref(), .available))]
    ProfileNotFound {
        /// Name that could not be found.
        name: String,
        /// Child profile whose `extends` named the missing profile.
        referenced_by: Option<String>,
        /// Profiles the document does define.
        available: Vec<String>,
    },

    /// The parent of a profile declares `extends` itself.
    #[error(
        "profile '{profile}' extends '{parent}', which extends '{grandparent}': only one level of inheritance is supported"
    )]
    InheritanceTooDeep {
        /// Profile being resolved.
        profile: String,
        /// Its direct parent.
        parent: String,
        /// The parent's own parent.
        grandparent: String,
    },

    /// A profile names itself in `extends`.
    #[error("profile '{0}' extends itself")]
    InheritanceCycle(String),
}

impl ConfigError {
    /// Whether this error means "the thing you asked for does not exist",
    /// which the CLI reports with a dedicated exit code.
    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(
            self,
            Self::DocumentNotFound { .. } | Self::ProfileNotFound { .. }
        )
    }
}

fn profile_not_found_message(
    name: &str,
    referenced_by: Option<&str>,
    available: &[String],
) -> String {
    let mut message = match referenced_by {
        Some(child) => format!("profile '{name}' (extended by '{child}') not found"),
        None => format!("profile '{name}' not found"),
    };
    if !available.is_empty() {
        message.push_str(&format!(" (available: {})", available.join(", ")));
    }
    message
}

/// Errors that arise while determining which directory holds the document.
#[derive(Error, Debug)]
pub enum LocationError {
    /// The home directory could not be determined.
    #[error("could not determine the home directory")]
    NoHomeDirectory,

    /// A pointer file exists but its target directory is not reachable.
    #[error(
        "config directory {} (from {}) is not accessible; check that the synced folder is available, or run 'macsetup init --local'",
        .target.display(),
        .pointer.display()
    )]
    ConfigDirUnreachable {
        /// Pointer file that named the target.
        pointer: PathBuf,
        /// Directory the pointer names.
        target: PathBuf,
    },

    /// The pointer file exists but does not hold a usable path.
    #[error("pointer file {} is invalid: {reason}", .pointer.display())]
    InvalidPointer {
        /// Pointer file path.
        pointer: PathBuf,
        /// Why the content was rejected.
        reason: String,
    },

    /// The pointer file could not be read.
    #[error("failed to read pointer file {}: {source}", .pointer.display())]
    PointerRead {
        /// Pointer file path.
        pointer: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },
}

/// Errors that arise when moving the document between local and remote
/// storage.
#[derive(Error, Debug)]
pub enum MigrationError {
    /// The remote synced folder does not exist on this machine.
    #[error("iCloud Drive is not available at {}; sign in to iCloud and enable iCloud Drive", .path.display())]
    RemoteUnavailable {
        /// Expected root of the synced folder.
        path: PathBuf,
    },

    /// Both a local and a remote document exist.
    #[error(
        "configuration exists both locally ({}) and in iCloud ({}); use --force to overwrite iCloud with the local copy",
        .local.display(),
        .remote.display()
    )]
    Conflict {
        /// Local document.
        local: PathBuf,
        /// Remote document.
        remote: PathBuf,
    },

    /// Copying data to the destination failed; the source is untouched.
    #[error("failed to write {}: {source}", .path.display())]
    WriteFailure {
        /// Path that could not be written.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// Data was copied and verified, but the originals could not be removed.
    #[error(
        "configuration was copied to {} and is safely duplicated, but {} could not be removed ({source}); delete it manually",
        .copied_to.display(),
        .path.display()
    )]
    CleanupFailure {
        /// Original that is still present.
        path: PathBuf,
        /// Directory that now holds the data.
        copied_to: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// The pointer file could not be written or removed.
    #[error("failed to update pointer file {}: {source}", .pointer.display())]
    PointerWriteFailure {
        /// Pointer file path.
        pointer: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// `init --local` was requested but no pointer file exists.
    #[error("not using iCloud storage (no pointer file at {})", .pointer.display())]
    NotUsingRemote {
        /// Expected pointer file path.
        pointer: PathBuf,
    },

    /// The pointer names a directory that cannot be read.
    #[error(
        "iCloud config directory {} is not accessible; the pointer file {} was left in place",
        .target.display(),
        .pointer.display()
    )]
    RemoteNotAccessible {
        /// Pointer file path.
        pointer: PathBuf,
        /// Directory the pointer names.
        target: PathBuf,
    },

    /// Location resolution failed before migration could begin.
    #[error(transparent)]
    Location(#[from] LocationError),
}

impl MigrationError {
    /// Stable machine-readable code used in JSON output.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::RemoteUnavailable { .. } => "remote_unavailable",
            Self::Conflict { .. } => "conflict",
            Self::WriteFailure { .. } => "write_failure",
            Self::CleanupFailure { .. } => "cleanup_failure",
            Self::PointerWriteFailure { .. } => "pointer_write_failure",
            Self::NotUsingRemote { .. } => "not_using_remote",
            Self::RemoteNotAccessible { .. } => "remote_not_accessible",
            Self::Location(_) => "location_error",
        }
    }
}

/// Errors that arise from persisting the resumable run state.
#[derive(Error, Debug)]
pub enum StateError {
    /// The state file exists but could not be read.
    #[error("failed to read run state {}: {source}", .path.display())]
    Read {
        /// State file path.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// The state file is not valid run-state JSON.
    #[error("run state {} is corrupt: {source}; remove it to start over", .path.display())]
    Corrupt {
        /// State file path.
        path: PathBuf,
        /// Underlying JSON error.
        source: serde_json::Error,
    },

    /// The state file could not be written or removed.
    #[error("failed to write run state {}: {source}", .path.display())]
    Write {
        /// State file path.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// The state could not be serialized.
    #[error("failed to serialize run state: {0}")]
    Serialize(#[source] serde_json::Error),
}

/// A single work item could not be applied. Never fatal to a run.
#[derive(Error, Debug)]
#[error("{kind} '{identifier}' failed: {source}")]
pub struct ItemInstallError {
    /// Kind of the item.
    pub kind: ItemKind,
    /// Item key (e.g. the formula name).
    pub identifier: String,
    /// Adapter failure.
    #[source]
    pub source: ResourceError,
}

/// An unexpected failure inside a run. Caught once at the top of the
/// executor and recorded as a single synthetic failed item.
#[derive(Error, Debug)]
pub enum RunFatalError {
    /// An adapter panicked.
    #[error("unexpected failure: {0}")]
    Panicked(String),

    /// Progress could not be persisted.
    #[error("could not record progress: {0}")]
    StatePersist(#[from] StateError),
}

#[cfg(test)]
#[allow(clippy::expect_used)]
mod tests {
    use super::*;
    use std::io;

    // -----------------------------------------------------------------------
    // ConfigError
    // -----------------------------------------------------------------------

    #[test]
    fn profile_not_found_lists_available_profiles() {
        let e = ConfigError::ProfileNotFound {
            name: "work".to_string(),
            referenced_by: None,
            available: vec!["base".to_string(), "home".to_string()],
        };
        assert_eq!(
            e.to_string(),
            "profile 'work' not found (available: base, home)"
        );
    }

    #[test]
    fn missing_parent_names_child() {
        let e = ConfigError::ProfileNotFound {
            name: "base".to_string(),
            referenced_by: Some("work".to_string()),
            available: vec![],
        };
        assert_eq!(
            e.to_string(),
            "profile 'base' (extended by 'work') not found"
        );
    }

    #[test]
    fn not_found_classification() {
        assert!(
            ConfigError::DocumentNotFound {
                path: PathBuf::from("/x/config.yaml")
            }
            .is_not_found()
        );
        assert!(!ConfigError::InheritanceCycle("a".to_string()).is_not_found());
    }

    #[test]
    fn inheritance_too_deep_names_chain() {
        let e = ConfigError::InheritanceTooDeep {
            profile: "a".to_string(),
            parent: "b".to_string(),
            grandparent: "c".to_string(),
        };
        let msg = e.to_string();
        assert!(msg.contains("'a' extends 'b'"));
        assert!(msg.contains("'c'"));
    }

    // -----------------------------------------------------------------------
    // MigrationError
    // -----------------------------------------------------------------------

    #[test]
    fn conflict_names_both_paths() {
        let e = MigrationError::Conflict {
            local: PathBuf::from("/home/u/.config/macsetup"),
            remote: PathBuf::from("/icloud/macsetup"),
        };
        let msg = e.to_string();
        assert!(msg.contains("/home/u/.config/macsetup"));
        assert!(msg.contains("/icloud/macsetup"));
        assert_eq!(e.code(), "conflict");
    }

    #[test]
    fn cleanup_failure_says_data_is_duplicated() {
        let e = MigrationError::CleanupFailure {
            path: PathBuf::from("/local/config.yaml"),
            copied_to: PathBuf::from("/icloud/macsetup"),
            source: io::Error::new(io::ErrorKind::PermissionDenied, "denied"),
        };
        assert!(e.to_string().contains("safely duplicated"));
        assert_eq!(e.code(), "cleanup_failure");
    }

    #[test]
    fn remote_storage_codes() {
        let pointer = PathBuf::from("/home/u/.config/macsetup/.icloud-pointer");
        let target = PathBuf::from("/icloud/macsetup");
        assert_eq!(
            MigrationError::NotUsingRemote {
                pointer: pointer.clone()
            }
            .code(),
            "not_using_remote"
        );
        assert_eq!(
            MigrationError::RemoteNotAccessible { pointer, target }.code(),
            "remote_not_accessible"
        );
        assert_eq!(
            MigrationError::RemoteUnavailable {
                path: PathBuf::from("/icloud")
            }
            .code(),
            "remote_unavailable"
        );
    }

    // -----------------------------------------------------------------------
    // Send + Sync
    // -----------------------------------------------------------------------

    #[test]
    fn errors_are_send_and_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<ConfigError>();
        assert_send_sync::<LocationError>();
        assert_send_sync::<MigrationError>();
        assert_send_sync::<StateError>();
        assert_send_sync::<ItemInstallError>();
        assert_send_sync::<RunFatalError>();
    }

    #[test]
    fn errors_convert_to_anyhow() {
        let e: anyhow::Error = StateError::Serialize(
            serde_json::from_str::<u8>("x").expect_err("invalid json"),
        )
        .into();
        assert!(e.to_string().contains("serialize"));
    }
}

//! Resumable run state.
//!
//! The state file lives next to the document as `.state.json`. It is written
//! after every item outcome and removed when a run finishes with no
//! failures, so its presence always means "there is something to resume".
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

use super::ItemKind;
use crate::error::StateError;

/// File name of the run state inside the config directory.
pub const STATE_FILE: &str = ".state.json";

/// Where a run stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    /// Started, or interrupted before the end.
    InProgress,
    /// Every item applied.
    Completed,
    /// Reached the end with failures.
    CompletedWithErrors,
}

/// What failed: a work item kind, or the run itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// See [`ItemKind::Tap`].
    Tap,
    /// See [`ItemKind::Formula`].
    Formula,
    /// See [`ItemKind::Cask`].
    Cask,
    /// See [`ItemKind::AppStoreApp`].
    #[serde(rename = "app_store")]
    AppStoreApp,
    /// See [`ItemKind::Dotfile`].
    Dotfile,
    /// See [`ItemKind::Preference`].
    Preference,
    /// An unexpected failure outside any single item.
    Setup,
}

impl From<ItemKind> for FailureKind {
    fn from(kind: ItemKind) -> Self {
        match kind {
            ItemKind::Tap => Self::Tap,
            ItemKind::Formula => Self::Formula,
            ItemKind::Cask => Self::Cask,
            ItemKind::AppStoreApp => Self::AppStoreApp,
            ItemKind::Dotfile => Self::Dotfile,
            ItemKind::Preference => Self::Preference,
        }
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Tap => ItemKind::Tap.as_str(),
            Self::Formula => ItemKind::Formula.as_str(),
            Self::Cask => ItemKind::Cask.as_str(),
            Self::AppStoreApp => ItemKind::AppStoreApp.as_str(),
            Self::Dotfile => ItemKind::Dotfile.as_str(),
            Self::Preference => ItemKind::Preference.as_str(),
            Self::Setup => "setup",
        };
        f.write_str(name)
    }
}

/// A recorded failure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailedItem {
    /// What failed.
    #[serde(rename = "type")]
    pub kind: FailureKind,
    /// Item key, e.g. `git` for `formula:git`.
    pub identifier: String,
    /// Error message.
    pub error: String,
    /// Suggested fix, if one is known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remediation: Option<String>,
    /// When it failed.
    pub timestamp: DateTime<Utc>,
}

impl FailedItem {
    /// The synthetic record for a failure that escaped item handling.
    #[must_use]
    pub fn general(error: impl Into<String>) -> Self {
        Self {
            kind: FailureKind::Setup,
            identifier: "general".to_string(),
            error: error.into(),
            remediation: None,
            timestamp: Utc::now(),
        }
    }

    fn same_target(&self, other: &Self) -> bool {
        self.kind == other.kind && self.identifier == other.identifier
    }
}

/// The persisted record of a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunState {
    /// When the first pass of this run started.
    pub started_at: DateTime<Utc>,
    /// Profile being applied.
    pub profile: String,
    /// Identifiers applied so far, in completion order.
    #[serde(default)]
    pub completed_items: Vec<String>,
    /// Failures of the latest pass.
    #[serde(default)]
    pub failed_items: Vec<FailedItem>,
    /// Where the run stands.
    pub status: RunStatus,
}

impl RunState {
    /// A fresh state for `profile`.
    #[must_use]
    pub fn new(profile: impl Into<String>) -> Self {
        Self {
            started_at: Utc::now(),
            profile: profile.into(),
            completed_items: Vec::new(),
            failed_items: Vec::new(),
            status: RunStatus::InProgress,
        }
    }

    /// Prepare a loaded state for another pass. Previous failures are
    /// dropped because those items are retried.
    pub fn begin_resume(&mut self) {
        self.failed_items.clear();
        self.status = RunStatus::InProgress;
    }

    /// Whether `id` was applied by this run.
    #[must_use]
    pub fn is_completed(&self, id: &str) -> bool {
        self.completed_items.iter().any(|done| done == id)
    }

    /// Record `id` as applied. Recording it twice is a no-op.
    pub fn mark_completed(&mut self, id: &str) {
        if !self.is_completed(id) {
            self.completed_items.push(id.to_string());
        }
    }

    /// Record a failure, replacing an earlier failure of the same item.
    pub fn mark_failed(&mut self, failure: FailedItem) {
        self.failed_items.retain(|f| !f.same_target(&failure));
        self.failed_items.push(failure);
    }

    /// Set the terminal status from the recorded failures.
    pub fn finish(&mut self) {
        self.status = if self.failed_items.is_empty() {
            RunStatus::Completed
        } else {
            RunStatus::CompletedWithErrors
        };
    }
}

/// Persistence for [`RunState`].
#[cfg_attr(test, mockall::automock)]
pub trait StateStore: Send + Sync {
    /// Load the saved state, `None` if there is none.
    ///
    /// # Errors
    ///
    /// Returns [`StateError`] if the state exists but cannot be read or parsed.
    fn load(&self) -> Result<Option<RunState>, StateError>;

    /// Persist `state`, replacing any previous state.
    ///
    /// # Errors
    ///
    /// Returns [`StateError`] if the state cannot be written.
    fn save(&self, state: &RunState) -> Result<(), StateError>;

    /// Remove the saved state. Succeeds if there is none.
    ///
    /// # Errors
    ///
    /// Returns [`StateError`] if the state exists but cannot be removed.
    fn clear(&self) -> Result<(), StateError>;
}

/// [`StateStore`] backed by a JSON file.
#[derive(Debug, Clone)]
pub struct FileStateStore {
    path: PathBuf,
}

impl FileStateStore {
    /// Store for the state file inside `config_dir`.
    #[must_use]
    pub fn in_dir(config_dir: &Path) -> Self {
        Self {
            path: config_dir.join(STATE_FILE),
        }
    }

    /// The state file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl StateStore for FileStateStore {
    fn load(&self) -> Result<Option<RunState>, StateError> {
        if !self.path.exists() {
            return Ok(None);
        }
        let content = std::fs::read_to_string(&self.path).map_err(|source| StateError::Read {
            path: self.path.clone(),
            source,
        })?;
        serde_json::from_str(&content)
            .map(Some)
            .map_err(|source| StateError::Corrupt {
                path: self.path.clone(),
                source,
            })
    }

    fn save(&self, state: &RunState) -> Result<(), StateError> {
        let write_err = |source: std::io::Error| StateError::Write {
            path: self.path.clone(),
            source,
        };
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).map_err(write_err)?;
        }
        let json = serde_json::to_string_pretty(state).map_err(StateError::Serialize)?;

        // Atomic write: temp file + rename
        let tmp_path = self.path.with_extension("json.tmp");
        std::fs::write(&tmp_path, json).map_err(write_err)?;
        std::fs::rename(&tmp_path, &self.path).map_err(write_err)
    }

    fn clear(&self) -> Result<(), StateError> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(source) => Err(StateError::Write {
                path: self.path.clone(),
                source,
            }),
        }
    }
}

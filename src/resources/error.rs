//! Typed error variants for adapter operations.
//!
//! Every failure carries an optional remediation hint. Hints for command
//! failures are chosen by matching known phrases in the tool's output.

use thiserror::Error;

/// Errors that arise from applying a single work item.
#[derive(Error, Debug)]
pub enum ResourceError {
    /// A command invoked by an adapter failed with a non-zero exit code.
    #[error("command '{program}' failed (exit {exit_code}): {output}")]
    ExecutionFailed {
        /// Name of the program that was invoked.
        program: String,
        /// Exit code returned by the process (`-1` if killed by a signal).
        exit_code: i32,
        /// Captured diagnostic output.
        output: String,
        /// Suggested fix.
        remediation: Option<String>,
    },

    /// The command could not be started at all.
    #[error("failed to run '{program}': {message}")]
    Spawn {
        /// Name of the program.
        program: String,
        /// Spawn failure.
        message: String,
    },

    /// The tool an adapter drives is not installed.
    #[error("{tool} is not installed")]
    ToolUnavailable {
        /// Human-readable tool name.
        tool: &'static str,
        /// How to install it.
        remediation: &'static str,
    },

    /// A dotfile payload is missing from the config directory.
    #[error("source not found: {path}")]
    SourceMissing {
        /// Expected payload path.
        path: String,
    },

    /// A filesystem operation failed.
    #[error("{action} {path}: {source}")]
    Io {
        /// What was being attempted (e.g. `"create symlink"`).
        action: &'static str,
        /// Path involved.
        path: String,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// A target exists but is in a state the adapter refuses to overwrite.
    #[error("invalid state for '{resource}': {reason}")]
    InvalidState {
        /// Name or description of the resource in the invalid state.
        resource: String,
        /// Human-readable explanation of why the state is invalid.
        reason: String,
    },

    /// An adapter was handed an item kind it does not manage.
    #[error("adapter '{adapter}' cannot apply '{item}'")]
    UnsupportedItem {
        /// Adapter name.
        adapter: &'static str,
        /// Item identifier.
        item: String,
    },
}

impl ResourceError {
    /// Suggested fix, if one is known.
    #[must_use]
    pub fn remediation(&self) -> Option<String> {
        match self {
            Self::ExecutionFailed { remediation, .. } => remediation.clone(),
            Self::ToolUnavailable { remediation, .. } => Some((*remediation).to_string()),
            Self::SourceMissing { path } => Some(format!(
                "Add the file to the config directory at {path}, or remove the entry"
            )),
            Self::Io { source, path, .. }
                if source.kind() == std::io::ErrorKind::PermissionDenied =>
            {
                Some(format!("Check file and directory permissions for {path}"))
            }
            Self::Spawn { .. }
            | Self::Io { .. }
            | Self::InvalidState { .. }
            | Self::UnsupportedItem { .. } => None,
        }
    }
}

/// A known failure phrase and the hint to show for it.
#[derive(Debug, Clone, Copy)]
pub struct Hint {
    /// Lower-case phrases; any match selects this hint.
    pub patterns: &'static [&'static str],
    /// Hint text; `{}` is replaced with the item key.
    pub text: &'static str,
}

/// Pick the first hint whose pattern appears in `output`, falling back to
/// `fallback`. `{}` in the chosen text is replaced with `key`.
#[must_use]
pub fn remediation_for(output: &str, key: &str, hints: &[Hint], fallback: &str) -> String {
    let lower = output.to_lowercase();
    let text = hints
        .iter()
        .find(|hint| hint.patterns.iter().any(|p| lower.contains(p)))
        .map_or(fallback, |hint| hint.text);
    text.replace("{}", key)
}

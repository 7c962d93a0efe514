//! Core logging types: item entries, status, and the [`Log`] trait.

/// Per-item outcome for summary reporting.
#[derive(Debug, Clone)]
pub struct ItemEntry {
    /// Item identifier, e.g. `formula:git`.
    pub name: String,
    /// How it ended.
    pub status: ItemStatus,
    /// Optional detail (error text, skip reason).
    pub message: Option<String>,
}

/// Outcome of a single work item.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemStatus {
    /// The adapter applied the item.
    Applied,
    /// The item was already in its desired state.
    AlreadyInstalled,
    /// Completed by an earlier run and skipped on resume.
    Skipped,
    /// Dry run; nothing was changed.
    DryRun,
    /// The adapter reported an error.
    Failed,
}

/// Abstraction over logging backends.
///
/// Setup and command code log through this trait so tests can substitute
/// a logger without a global subscriber.
pub trait Log: Send + Sync {
    /// Log a stage header (major section).
    fn stage(&self, msg: &str);
    /// Log an informational message.
    fn info(&self, msg: &str);
    /// Log a debug message (may be suppressed on console).
    fn debug(&self, msg: &str);
    /// Log a warning message.
    fn warn(&self, msg: &str);
    /// Log an error message.
    fn error(&self, msg: &str);
    /// Log a dry-run action message.
    fn dry_run(&self, msg: &str);
    /// Record an item outcome for the summary.
    fn record_item(&self, name: &str, status: ItemStatus, message: Option<&str>);
}

//! Structured logger with dry-run awareness and summary collection.
use std::path::PathBuf;
use std::sync::Mutex;

use super::subscriber::{DRY_RUN_TARGET, STAGE_TARGET};
use super::types::{ItemEntry, ItemStatus, Log};
use super::utils::log_file_path;

/// Implement the display methods of [`Log`] by delegating to inherent methods
/// of the same name on the implementing type.
macro_rules! forward_log_methods {
    ($($method:ident),+ $(,)?) => {
        $(
            fn $method(&self, msg: &str) {
                self.$method(msg);
            }
        )+
    };
}

/// Structured logger with dry-run awareness and summary collection.
///
/// Messages go through [`tracing`]; the subscriber installed by
/// [`init_subscriber`](super::subscriber::init_subscriber) writes them to the
/// console and to `$XDG_CACHE_HOME/macsetup/<command>.log`.
#[derive(Debug)]
pub struct Logger {
    items: Mutex<Vec<ItemEntry>>,
    log_file: Option<PathBuf>,
}

impl Logger {
    /// Create a logger for `command`.
    ///
    /// Only stores the log file path for the summary; the file itself is
    /// created by the subscriber.
    #[must_use]
    pub fn new(command: &str) -> Self {
        Self::with_log_file(log_file_path(command))
    }

    /// Create a logger reporting `log_file` in its summary.
    #[must_use]
    pub const fn with_log_file(log_file: Option<PathBuf>) -> Self {
        Self {
            items: Mutex::new(Vec::new()),
            log_file,
        }
    }

    /// File this run is mirrored to, if any.
    #[must_use]
    pub const fn log_path(&self) -> Option<&PathBuf> {
        self.log_file.as_ref()
    }

    /// Return a clone of all recorded item entries.
    #[must_use]
    pub fn entries(&self) -> Vec<ItemEntry> {
        self.items.lock().map_or_else(|_| vec![], |g| g.clone())
    }

    /// Log an error message.
    pub fn error(&self, msg: &str) {
        tracing::error!("{msg}");
    }

    /// Log a warning message.
    pub fn warn(&self, msg: &str) {
        tracing::warn!("{msg}");
    }

    /// Log a stage header (major section).
    pub fn stage(&self, msg: &str) {
        tracing::info!(target: STAGE_TARGET, "{msg}");
    }

    /// Log an informational message.
    pub fn info(&self, msg: &str) {
        tracing::info!("{msg}");
    }

    /// Log a debug message (suppressed on console unless verbose; always
    /// written to the log file).
    pub fn debug(&self, msg: &str) {
        tracing::debug!("{msg}");
    }

    /// Log a dry-run action message.
    pub fn dry_run(&self, msg: &str) {
        tracing::info!(target: DRY_RUN_TARGET, "{msg}");
    }

    /// Record an item outcome for the summary.
    pub fn record_item(&self, name: &str, status: ItemStatus, message: Option<&str>) {
        if let Ok(mut guard) = self.items.lock() {
            guard.push(ItemEntry {
                name: name.to_string(),
                status,
                message: message.map(String::from),
            });
        }
    }

    /// Print the run summary.
    ///
    /// Applied and failed items are listed individually; items that needed
    /// no work only count towards the totals.
    pub fn print_summary(&self) {
        let items = self.entries();
        if items.is_empty() {
            return;
        }

        self.stage("Summary");

        let mut applied = 0u32;
        let mut already = 0u32;
        let mut skipped = 0u32;
        let mut dry_run = 0u32;
        let mut failed = 0u32;

        for item in &items {
            let marker = match item.status {
                ItemStatus::Applied => {
                    applied += 1;
                    Some(("✓", "\x1b[32m"))
                }
                ItemStatus::AlreadyInstalled => {
                    already += 1;
                    None
                }
                ItemStatus::Skipped => {
                    skipped += 1;
                    None
                }
                ItemStatus::DryRun => {
                    dry_run += 1;
                    Some(("~", "\x1b[37m"))
                }
                ItemStatus::Failed => {
                    failed += 1;
                    Some(("✗", "\x1b[31m"))
                }
            };

            if let Some((icon, color)) = marker {
                let suffix = item
                    .message
                    .as_ref()
                    .map_or_else(String::new, |msg| format!(" ({msg})"));
                self.info(&format!("{color}{icon} {}{suffix}\x1b[0m", item.name));
            }
        }

        let total = applied + already + skipped + dry_run + failed;
        self.info(&format!(
            "{total} items: \x1b[32m{applied} applied\x1b[0m, \x1b[2m{already} already installed\x1b[0m, \x1b[33m{skipped} skipped\x1b[0m, \x1b[37m{dry_run} dry-run\x1b[0m, \x1b[31m{failed} failed\x1b[0m"
        ));

        if let Some(path) = &self.log_file {
            self.info(&format!("\x1b[2mlog: {}\x1b[0m", path.display()));
        }
    }
}

impl Log for Logger {
    forward_log_methods!(stage, info, debug, warn, error, dry_run);

    fn record_item(&self, name: &str, status: ItemStatus, message: Option<&str>) {
        self.record_item(name, status, message);
    }
}

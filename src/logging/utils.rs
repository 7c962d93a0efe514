//! Log file location, ANSI stripping and timestamps.
use std::fs;
use std::path::PathBuf;
use std::sync::LazyLock;

use regex::Regex;

/// A CSI sequence (`ESC [ ... final`) or a two-byte escape (`ESC 7`).
static ANSI_ESCAPE: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"\x1b(?:\[[0-?]*[ -/]*[@-~]|.)?").ok());

/// Remove terminal escape sequences so log files stay plain text.
pub(super) fn strip_ansi(s: &str) -> String {
    match ANSI_ESCAPE.as_ref() {
        Some(re) => re.replace_all(s, "").into_owned(),
        None => s.to_string(),
    }
}

/// `$XDG_CACHE_HOME/macsetup`, else `~/.cache/macsetup`. Created on demand.
pub(super) fn cache_dir() -> Option<PathBuf> {
    let base = std::env::var_os("XDG_CACHE_HOME")
        .filter(|v| !v.is_empty())
        .map(PathBuf::from)
        .or_else(|| dirs::home_dir().map(|home| home.join(".cache")))?;
    let dir = base.join("macsetup");
    fs::create_dir_all(&dir).ok()?;
    Some(dir)
}

/// One log file per subcommand, e.g. `setup.log`.
pub(super) fn log_file_path(command: &str) -> Option<PathBuf> {
    cache_dir().map(|dir| dir.join(format!("{command}.log")))
}

/// Header timestamp for a run, `YYYY-MM-DD HH:MM:SS` UTC.
pub(super) fn format_utc_datetime() -> String {
    chrono::Utc::now().format("%Y-%m-%d %H:%M:%S").to_string()
}

/// Per-line timestamp, `HH:MM:SS` UTC.
pub(super) fn format_utc_time() -> String {
    chrono::Utc::now().format("%H:%M:%S").to_string()
}

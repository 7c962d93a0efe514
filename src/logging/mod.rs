//! Logging infrastructure for structured console and file output.

mod logger;
mod subscriber;
mod types;
mod utils;

pub use logger::Logger;
pub use subscriber::init_subscriber;
pub use types::{ItemEntry, ItemStatus, Log};

/// Version string shown in log headers and `macsetup version`.
#[must_use]
pub fn version() -> &'static str {
    option_env!("MACSETUP_VERSION").unwrap_or(concat!("dev-", env!("CARGO_PKG_VERSION")))
}

/// Create a Logger writing to a log file in a fresh temporary directory,
/// backed by an isolated per-thread tracing subscriber with a
/// [`FileLayer`](subscriber::FileLayer), so that tracing events emitted by
/// logger methods reach the file during tests.
///
/// The returned [`tracing::dispatcher::DefaultGuard`] must be kept alive
/// for the duration of the test.
#[cfg(test)]
#[allow(clippy::expect_used)]
pub(crate) fn isolated_logger() -> (Logger, tempfile::TempDir, tracing::dispatcher::DefaultGuard) {
    use tracing_subscriber::{Layer as _, filter::LevelFilter, layer::SubscriberExt as _};
    let tmp = tempfile::tempdir().expect("failed to create temp dir");
    let path = tmp.path().join("test.log");
    let file_layer = subscriber::FileLayer::new(&path).expect("failed to create file layer");
    let log = Logger::with_log_file(Some(path));
    let subscriber =
        tracing_subscriber::registry().with(file_layer.with_filter(LevelFilter::DEBUG));
    let guard = tracing::dispatcher::set_default(&tracing::Dispatch::new(subscriber));
    (log, tmp, guard)
}

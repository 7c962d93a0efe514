//! Subcommand implementations and the context they share.
pub mod init;
pub mod preview;
pub mod profile;
pub mod setup;
pub mod validate;
pub mod version;

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context as _, Result};
use serde::Serialize;

use crate::cli::{Cli, Command, GlobalOpts};
use crate::config::{Configuration, Profile, document_path, profiles};
use crate::error::{ConfigError, LocationError, MigrationError};
use crate::exec::{Executor, SystemExecutor};
use crate::logging::Logger;
use crate::operations::{FileSystemOps, SystemFileSystemOps};
use crate::resources::Adapters;
use crate::setup::CancellationToken;
use crate::storage::cloud::{self, ICloudDrive};
use crate::storage::migrate::Migrator;
use crate::storage::{CONFIG_DIR_ENV, DirSource, ResolvedConfigDir, StorageLayout};

/// Everything went as asked.
pub const EXIT_SUCCESS: u8 = 0;
/// Generic failure, including validation failures.
pub const EXIT_FAILURE: u8 = 1;
/// The document or the requested profile does not exist.
pub const EXIT_NOT_FOUND: u8 = 2;
/// Setup finished but some items failed.
pub const EXIT_ITEMS_FAILED: u8 = 3;
/// Setup was interrupted by a signal.
pub const EXIT_INTERRUPTED: u8 = 130;

/// Machine-local facts and collaborators shared by every command.
///
/// Built once from the real environment by [`detect`](Self::detect); tests
/// build one over a temporary home with [`new`](Self::new).
#[derive(Debug, Clone)]
pub struct CommandContext {
    /// Options shared by every subcommand.
    pub global: GlobalOpts,
    /// The user's home directory.
    pub home: PathBuf,
    /// Default config directory and pointer file location.
    pub layout: StorageLayout,
    /// iCloud Drive on this machine.
    pub icloud: ICloudDrive,
    /// Value of `MACSETUP_CONFIG_DIR`, if set.
    pub env_config_dir: Option<OsString>,
    /// Runs external tools.
    pub executor: Arc<dyn Executor>,
    /// Filesystem used for storage resolution and migration.
    pub fs: Arc<dyn FileSystemOps>,
}

/// A loaded document and where it came from.
#[derive(Debug)]
pub struct LoadedDocument {
    /// Where the document was found.
    pub config_dir: ResolvedConfigDir,
    /// The parsed document.
    pub document: Configuration,
    /// Sync hazards in an iCloud config directory, already logged.
    pub warnings: Vec<String>,
}

impl LoadedDocument {
    /// Resolve `name` against the document.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] if the profile or its parent is missing or
    /// the inheritance is invalid.
    pub fn profile(&self, name: &str) -> Result<Profile, ConfigError> {
        profiles::resolve(&self.document, name)
    }
}

impl CommandContext {
    /// Context over an explicit home directory and environment.
    #[must_use]
    pub fn new(
        global: GlobalOpts,
        home: &Path,
        env_config_dir: Option<OsString>,
        executor: Arc<dyn Executor>,
    ) -> Self {
        Self {
            global,
            home: home.to_path_buf(),
            layout: StorageLayout::from_home(home),
            icloud: ICloudDrive::under_home(home),
            env_config_dir,
            executor,
            fs: Arc::new(SystemFileSystemOps),
        }
    }

    /// Context for the current user and process environment.
    ///
    /// # Errors
    ///
    /// Returns [`LocationError::NoHomeDirectory`] if the home directory
    /// cannot be determined.
    pub fn detect(global: GlobalOpts) -> Result<Self> {
        let home = dirs::home_dir().ok_or(LocationError::NoHomeDirectory)?;
        Ok(Self::new(
            global,
            &home,
            std::env::var_os(CONFIG_DIR_ENV),
            Arc::new(SystemExecutor),
        ))
    }

    /// Determine the config directory from the options, environment and
    /// pointer file.
    ///
    /// # Errors
    ///
    /// Returns a [`LocationError`](crate::error::LocationError) if the
    /// pointer is unusable or names an unreachable directory.
    pub fn config_dir(&self) -> Result<ResolvedConfigDir> {
        Ok(self.layout.resolve(
            &*self.fs,
            self.global.config_dir.as_deref(),
            self.env_config_dir.as_deref(),
        )?)
    }

    /// Resolve the config directory and load the document in it.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be resolved or the document
    /// is missing or invalid.
    pub fn load(&self, log: &Logger) -> Result<LoadedDocument> {
        let config_dir = self.config_dir()?;
        log.debug(&format!(
            "config directory: {} ({:?})",
            config_dir.path.display(),
            config_dir.source
        ));
        let warnings = match config_dir.source {
            DirSource::Pointer { .. } => cloud::document_warnings(&*self.fs, &config_dir.path),
            DirSource::Argument | DirSource::Environment | DirSource::Default => Vec::new(),
        };
        for warning in &warnings {
            log.warn(warning);
        }
        let document = Configuration::load(&document_path(&config_dir.path))?;
        log.debug(&format!("{} profiles", document.profiles.len()));
        Ok(LoadedDocument {
            config_dir,
            document,
            warnings,
        })
    }

    /// The real adapters, reading dotfile payloads from `config_dir`.
    #[must_use]
    pub fn adapters(&self, config_dir: &Path) -> Adapters {
        Adapters::system(Arc::clone(&self.executor), config_dir, &self.home)
    }

    /// Migrator over this context's storage layout and filesystem.
    #[must_use]
    pub fn migrator(&self) -> Migrator {
        Migrator::new(
            self.layout.clone(),
            self.icloud.clone(),
            Arc::clone(&self.fs),
        )
    }
}

/// Run the command selected on the command line.
///
/// # Errors
///
/// Returns an error if the command could not run to a result.
pub fn dispatch(cli: &Cli, log: &Logger) -> Result<u8> {
    let context = || CommandContext::detect(cli.global.clone());
    match &cli.command {
        Command::Setup(opts) => {
            let token = CancellationToken::new();
            if !opts.dry_run
                && let Err(e) = token.install_signal_handler()
            {
                log.warn(&format!("{e:#}; interrupting will not save progress"));
            }
            setup::run(&context()?, opts, &token, log)
        }
        Command::Preview(opts) => preview::run(&context()?, opts, log),
        Command::Init(opts) => init::run(&context()?, opts, log),
        Command::Validate(opts) => validate::run(&context()?, opts, log),
        Command::Profile(command) => profile::run(&context()?, command, log),
        Command::Version => version::run(cli.global.json),
    }
}

/// Exit code for a command that failed with `err`.
#[must_use]
pub fn exit_code_for(err: &anyhow::Error) -> u8 {
    if err
        .downcast_ref::<ConfigError>()
        .is_some_and(ConfigError::is_not_found)
    {
        EXIT_NOT_FOUND
    } else {
        EXIT_FAILURE
    }
}

/// JSON body printed for a failed command.
#[derive(Debug, Serialize)]
pub struct ErrorReport {
    /// Always `false`.
    pub success: bool,
    /// Stable error code.
    pub error: &'static str,
    /// The error and its causes.
    pub message: String,
}

impl ErrorReport {
    /// Report for `err`, using the migration code when there is one.
    #[must_use]
    pub fn from_error(err: &anyhow::Error) -> Self {
        let error = if let Some(migration) = err.downcast_ref::<MigrationError>() {
            migration.code()
        } else if exit_code_for(err) == EXIT_NOT_FOUND {
            "not_found"
        } else {
            "error"
        };
        Self {
            success: false,
            error,
            message: format!("{err:#}"),
        }
    }
}

/// Report `err` on the console (or as JSON) and return the exit code.
pub fn report_error(err: &anyhow::Error, json: bool, log: &Logger) -> u8 {
    if json {
        if let Err(e) = print_json(&ErrorReport::from_error(err)) {
            log.error(&format!("{e:#}"));
        }
    } else {
        log.error(&format!("{err:#}"));
    }
    exit_code_for(err)
}

/// Write `value` to stdout as pretty JSON.
///
/// # Errors
///
/// Returns an error if serialization fails.
#[allow(clippy::print_stdout)]
pub fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    let text = serde_json::to_string_pretty(value).context("failed to serialize output")?;
    println!("{text}");
    Ok(())
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;
    use std::io;

    #[test]
    fn not_found_errors_exit_with_two() {
        let err: anyhow::Error = ConfigError::ProfileNotFound {
            name: "work".to_string(),
            referenced_by: None,
            available: vec![],
        }
        .into();
        assert_eq!(exit_code_for(&err), EXIT_NOT_FOUND);

        let err = anyhow::Error::from(ConfigError::DocumentNotFound {
            path: PathBuf::from("/x/config.yaml"),
        })
        .context("loading");
        assert_eq!(exit_code_for(&err), EXIT_NOT_FOUND);
    }

    #[test]
    fn other_errors_exit_with_one() {
        let err: anyhow::Error = ConfigError::InheritanceCycle("a".to_string()).into();
        assert_eq!(exit_code_for(&err), EXIT_FAILURE);
        let err: anyhow::Error = LocationError::NoHomeDirectory.into();
        assert_eq!(exit_code_for(&err), EXIT_FAILURE);
    }

    #[test]
    fn error_report_uses_migration_codes() {
        let err: anyhow::Error = MigrationError::WriteFailure {
            path: PathBuf::from("/icloud/macsetup/config.yaml"),
            source: io::Error::from(io::ErrorKind::PermissionDenied),
        }
        .into();
        let report = ErrorReport::from_error(&err);
        assert!(!report.success);
        assert_eq!(report.error, "write_failure");

        let err: anyhow::Error = ConfigError::DocumentNotFound {
            path: PathBuf::from("/x/config.yaml"),
        }
        .into();
        assert_eq!(ErrorReport::from_error(&err).error, "not_found");
    }

    #[test]
    fn context_resolves_default_dir_under_home() {
        let tmp = tempfile::TempDir::new().unwrap();
        let global = GlobalOpts {
            config_dir: None,
            profile: "default".to_string(),
            json: false,
        };
        let ctx = CommandContext::new(global, tmp.path(), None, Arc::new(SystemExecutor));
        let dir = ctx.config_dir().unwrap();
        assert_eq!(dir.path, tmp.path().join(".config/macsetup"));
    }

    #[test]
    fn context_prefers_environment() {
        let tmp = tempfile::TempDir::new().unwrap();
        let global = GlobalOpts {
            config_dir: None,
            profile: "default".to_string(),
            json: false,
        };
        let ctx = CommandContext::new(
            global,
            tmp.path(),
            Some(OsString::from("/from/env")),
            Arc::new(SystemExecutor),
        );
        assert_eq!(ctx.config_dir().unwrap().path, PathBuf::from("/from/env"));
    }
}

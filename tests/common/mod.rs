// Shared helpers for integration tests.
//
// Provides a temporary home directory with a config directory, an optional
// iCloud Drive folder, and a fluent builder so each integration test can set
// up an isolated machine without repeating filesystem boilerplate.
//
// Used by all integration test binaries that declare `mod common;`.
#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::Arc;

use macsetup_cli::cli::{GlobalOpts, SetupOpts};
use macsetup_cli::commands::{self, CommandContext};
use macsetup_cli::exec::{ExecResult, Executor};
use macsetup_cli::logging::Logger;
use macsetup_cli::setup::CancellationToken;
use macsetup_cli::storage::cloud::ICLOUD_DRIVE;

/// [`Executor`] for a machine with none of the external tools installed.
///
/// Every lookup fails and every command exits non-zero, so only the
/// filesystem-backed adapters can make progress.
#[derive(Debug, Default)]
pub struct NoToolsExecutor;

impl Executor for NoToolsExecutor {
    fn run_unchecked_with_env(
        &self,
        program: &str,
        _: &[&str],
        _: &[(&str, &str)],
    ) -> anyhow::Result<ExecResult> {
        Ok(ExecResult {
            stdout: String::new(),
            stderr: format!("{program}: command not found"),
            success: false,
            code: Some(127),
        })
    }

    fn which(&self, _: &str) -> bool {
        false
    }
}

/// An isolated machine backed by a [`tempfile::TempDir`].
pub struct TestMachine {
    /// Temporary directory used as the home directory.
    pub home: tempfile::TempDir,
}

impl TestMachine {
    /// `~/.config/macsetup`
    pub fn config_dir(&self) -> PathBuf {
        self.home.path().join(".config/macsetup")
    }

    /// iCloud Drive root under the temporary home.
    pub fn icloud_root(&self) -> PathBuf {
        self.home.path().join(ICLOUD_DRIVE)
    }

    /// `<iCloud Drive>/macsetup`
    pub fn remote_dir(&self) -> PathBuf {
        self.icloud_root().join("macsetup")
    }

    pub fn home_path(&self) -> &Path {
        self.home.path()
    }

    /// Command context for `profile`, with no environment override.
    pub fn context(&self, profile: &str) -> CommandContext {
        self.context_with(GlobalOpts {
            config_dir: None,
            profile: profile.to_string(),
            json: false,
        })
    }

    pub fn context_with(&self, global: GlobalOpts) -> CommandContext {
        CommandContext::new(global, self.home.path(), None, Arc::new(NoToolsExecutor))
    }

    /// Run `setup` for `profile` and return the exit code.
    pub fn setup(&self, profile: &str, opts: &SetupOpts) -> u8 {
        self.setup_with_token(profile, opts, &CancellationToken::new())
    }

    pub fn setup_with_token(
        &self,
        profile: &str,
        opts: &SetupOpts,
        token: &CancellationToken,
    ) -> u8 {
        let log = Logger::with_log_file(None);
        commands::setup::run(&self.context(profile), opts, token, &log).expect("setup runs")
    }

    /// The saved run state as JSON, if any.
    pub fn state(&self, dir: &Path) -> Option<serde_json::Value> {
        let text = std::fs::read_to_string(dir.join(".state.json")).ok()?;
        Some(serde_json::from_str(&text).expect("state is valid JSON"))
    }
}

/// Fluent builder for [`TestMachine`].
pub struct TestMachineBuilder {
    machine: TestMachine,
}

impl TestMachineBuilder {
    /// Begin with an empty home directory.
    pub fn new() -> Self {
        let home = tempfile::tempdir().expect("create temp dir");
        Self {
            machine: TestMachine { home },
        }
    }

    /// Write `yaml` as the local `config.yaml`.
    pub fn with_document(self, yaml: &str) -> Self {
        let dir = self.machine.config_dir();
        std::fs::create_dir_all(&dir).expect("create config dir");
        std::fs::write(dir.join("config.yaml"), yaml).expect("write config.yaml");
        self
    }

    /// Write a dotfile payload under the local `dotfiles/` folder.
    pub fn with_payload(self, relative: &str, contents: &str) -> Self {
        let path = self.machine.config_dir().join("dotfiles").join(relative);
        std::fs::create_dir_all(path.parent().expect("payload has a parent"))
            .expect("create payload dir");
        std::fs::write(&path, contents).expect("write payload");
        self
    }

    /// Create the iCloud Drive folder, enabling remote storage.
    pub fn with_icloud(self) -> Self {
        std::fs::create_dir_all(self.machine.icloud_root()).expect("create iCloud Drive");
        self
    }

    /// Finish building and return the machine.
    pub fn build(self) -> TestMachine {
        self.machine
    }
}

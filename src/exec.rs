//! Running external tools (`brew`, `mas`, `defaults`, `sw_vers`).
use anyhow::{Context, Result, bail};
use std::process::{Command, Output};

/// Result of a command execution.
#[derive(Debug, Clone, Default)]
pub struct ExecResult {
    /// Captured standard output.
    pub stdout: String,
    /// Captured standard error.
    pub stderr: String,
    /// Whether the process exited with status zero.
    pub success: bool,
    /// Exit code, if the process was not killed by a signal.
    pub code: Option<i32>,
}

impl From<Output> for ExecResult {
    fn from(output: Output) -> Self {
        Self {
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
            success: output.status.success(),
            code: output.status.code(),
        }
    }
}

impl ExecResult {
    /// Standard error if non-empty, otherwise standard output, trimmed.
    ///
    /// Package managers are inconsistent about where they report failures.
    #[must_use]
    pub fn diagnostic(&self) -> &str {
        let stderr = self.stderr.trim();
        if stderr.is_empty() {
            self.stdout.trim()
        } else {
            stderr
        }
    }
}

/// Abstraction over process execution so adapters can be tested without
/// touching the system.
pub trait Executor: Send + Sync + std::fmt::Debug {
    /// Run a command, allowing failure, with extra environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error only if the process could not be spawned.
    fn run_unchecked_with_env(
        &self,
        program: &str,
        args: &[&str],
        env: &[(&str, &str)],
    ) -> Result<ExecResult>;

    /// Check if a program is available on `PATH`.
    fn which(&self, program: &str) -> bool;

    /// Run a command, allowing failure.
    ///
    /// # Errors
    ///
    /// Returns an error only if the process could not be spawned.
    fn run_unchecked(&self, program: &str, args: &[&str]) -> Result<ExecResult> {
        self.run_unchecked_with_env(program, args, &[])
    }

    /// Run a command and return its output. Fails if the command exits non-zero.
    ///
    /// # Errors
    ///
    /// Returns an error if the process could not be spawned or exited non-zero.
    fn run(&self, program: &str, args: &[&str]) -> Result<ExecResult> {
        let result = self.run_unchecked(program, args)?;
        if !result.success {
            bail!(
                "{program} failed (exit {}): {}",
                result.code.unwrap_or(-1),
                result.diagnostic()
            );
        }
        Ok(result)
    }
}

/// [`Executor`] backed by [`std::process::Command`].
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemExecutor;

impl Executor for SystemExecutor {
    fn run_unchecked_with_env(
        &self,
        program: &str,
        args: &[&str],
        env: &[(&str, &str)],
    ) -> Result<ExecResult> {
        let mut cmd = Command::new(program);
        cmd.args(args);
        for (k, v) in env {
            cmd.env(k, v);
        }
        let output = cmd
            .output()
            .with_context(|| format!("failed to execute: {program}"))?;
        Ok(ExecResult::from(output))
    }

    fn which(&self, program: &str) -> bool {
        which::which(program).is_ok()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn run_echo() {
        let result = SystemExecutor.run("echo", &["hello"]).unwrap();
        assert!(result.success, "echo command should succeed");
        assert_eq!(result.stdout.trim(), "hello");
    }

    #[test]
    fn run_failure() {
        let result = SystemExecutor.run("false", &[]);
        assert!(result.is_err(), "non-zero exit should produce an error");
    }

    #[test]
    fn run_unchecked_failure() {
        let result = SystemExecutor.run_unchecked("false", &[]).unwrap();
        assert!(!result.success, "non-zero exit should set success=false");
    }

    #[test]
    fn env_is_passed_through() {
        let result = SystemExecutor
            .run_unchecked_with_env("sh", &["-c", "echo $MACSETUP_TEST_VAR"], &[(
                "MACSETUP_TEST_VAR",
                "present",
            )])
            .unwrap();
        assert_eq!(result.stdout.trim(), "present");
    }

    #[test]
    fn which_finds_known_program() {
        assert!(SystemExecutor.which("sh"), "sh should be found on Unix");
    }

    #[test]
    fn which_missing_program() {
        assert!(
            !SystemExecutor.which("this-program-does-not-exist-12345"),
            "non-existent program should not be found"
        );
    }

    #[test]
    fn diagnostic_prefers_stderr() {
        let result = ExecResult {
            stdout: "out".to_string(),
            stderr: "  err \n".to_string(),
            success: false,
            code: Some(1),
        };
        assert_eq!(result.diagnostic(), "err");
        let quiet = ExecResult {
            stdout: "only stdout\n".to_string(),
            ..ExecResult::default()
        };
        assert_eq!(quiet.diagnostic(), "only stdout");
    }
}

//! Command: check the configuration document.
use anyhow::Result;
use serde::Serialize;

use super::{CommandContext, EXIT_FAILURE, EXIT_SUCCESS, print_json};
use crate::cli::ValidateOpts;
use crate::config::validation::{Severity, ValidationIssue, validate_all};
use crate::config::{Configuration, document_path};
use crate::error::ConfigError;
use crate::logging::Logger;

/// Result of validating a document.
#[derive(Debug, Clone, Serialize)]
pub struct ValidationReport {
    /// No errors were found. Warnings do not count.
    pub valid: bool,
    /// Findings that block setup.
    pub errors: Vec<ValidationIssue>,
    /// Findings setup can proceed past.
    pub warnings: Vec<ValidationIssue>,
}

impl ValidationReport {
    /// Split `issues` by severity. With `strict`, warnings make the document
    /// invalid too.
    #[must_use]
    pub fn new(issues: Vec<ValidationIssue>, strict: bool) -> Self {
        let (errors, warnings): (Vec<_>, Vec<_>) = issues
            .into_iter()
            .partition(|issue| issue.severity == Severity::Error);
        let valid = errors.is_empty() && (!strict || warnings.is_empty());
        Self {
            valid,
            errors,
            warnings,
        }
    }
}

/// Run the validate command.
///
/// A document that does not parse is reported as a validation error rather
/// than a command failure.
///
/// # Errors
///
/// Returns an error if the config directory cannot be resolved or the
/// document is missing or unreadable.
pub fn run(ctx: &CommandContext, opts: &ValidateOpts, log: &Logger) -> Result<u8> {
    let config_dir = ctx.config_dir()?;
    let path = document_path(&config_dir.path);
    log.debug(&format!("validating {}", path.display()));

    let issues = match Configuration::load(&path) {
        Ok(document) => validate_all(&document, &config_dir.path),
        Err(err @ ConfigError::Parse { .. }) => {
            vec![ValidationIssue::error("document", format!("{err}"))]
        }
        Err(err) => return Err(err.into()),
    };
    let report = ValidationReport::new(issues, opts.strict);

    if ctx.global.json {
        print_json(&report)?;
    } else {
        for issue in &report.errors {
            log.error(&format!("{}: {}", issue.location, issue.message));
        }
        for issue in &report.warnings {
            log.warn(&format!("{}: {}", issue.location, issue.message));
        }
        let verdict = if report.valid { "valid" } else { "invalid" };
        log.info(&format!(
            "{}: {verdict} ({} errors, {} warnings)",
            path.display(),
            report.errors.len(),
            report.warnings.len()
        ));
    }

    Ok(if report.valid {
        EXIT_SUCCESS
    } else {
        EXIT_FAILURE
    })
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn warnings_only_fail_when_strict() {
        let issues = vec![ValidationIssue::warning("profiles.a.taps", "odd tap")];
        assert!(ValidationReport::new(issues.clone(), false).valid);
        let strict = ValidationReport::new(issues, true);
        assert!(!strict.valid);
        assert_eq!(strict.warnings.len(), 1);
    }

    #[test]
    fn errors_always_fail() {
        let issues = vec![
            ValidationIssue::error("version", "empty"),
            ValidationIssue::warning("profiles.a.taps", "odd tap"),
        ];
        let report = ValidationReport::new(issues, false);
        assert!(!report.valid);
        assert_eq!(report.errors.len(), 1);
        assert_eq!(report.warnings.len(), 1);
    }
}

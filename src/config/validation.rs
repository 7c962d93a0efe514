//! Document checks beyond what parsing enforces.
use serde::Serialize;
use std::collections::HashSet;
use std::path::Path;

use super::{Configuration, PreferenceType, PreferenceValue, Profile, dotfiles_path};

/// How serious a validation finding is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Setup will behave unexpectedly but can proceed.
    Warning,
    /// Setup cannot apply this entry.
    Error,
}

/// A validation finding detected in a configuration document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidationIssue {
    /// Whether setup can proceed.
    pub severity: Severity,
    /// Location in the document (e.g. `profiles.work.dotfiles[2]`).
    pub location: String,
    /// Human-readable message.
    pub message: String,
}

impl ValidationIssue {
    /// A finding that blocks setup.
    #[must_use]
    pub fn error(location: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Error,
            location: location.into(),
            message: message.into(),
        }
    }

    /// A finding setup can proceed past.
    #[must_use]
    pub fn warning(location: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Warning,
            location: location.into(),
            message: message.into(),
        }
    }
}

/// Trait for document validators.
///
/// Each validator inspects one concern across every profile.
pub trait ConfigValidator {
    /// Validate the document and return any findings.
    ///
    /// `config_dir` is the directory holding the document, used to check
    /// that referenced payloads exist.
    fn validate(&self, document: &Configuration, config_dir: &Path) -> Vec<ValidationIssue>;

    /// Return a human-readable name for this validator.
    fn name(&self) -> &'static str;
}

/// Run every validator against `document`, errors first.
#[must_use]
pub fn validate_all(document: &Configuration, config_dir: &Path) -> Vec<ValidationIssue> {
    let validators: [&dyn ConfigValidator; 5] = [
        &DocumentValidator,
        &InheritanceValidator,
        &ApplicationsValidator,
        &DotfileValidator,
        &PreferenceValidator,
    ];
    let mut issues: Vec<ValidationIssue> = validators
        .iter()
        .flat_map(|v| {
            tracing::debug!("running {} validator", v.name());
            v.validate(document, config_dir)
        })
        .collect();
    issues.sort_by(|a, b| b.severity.cmp(&a.severity));
    issues
}

fn at(profile: &Profile, field: &str) -> String {
    format!("profiles.{}.{field}", profile.name)
}

/// Top-level shape: version and at least one profile.
#[derive(Debug)]
pub struct DocumentValidator;

impl ConfigValidator for DocumentValidator {
    fn validate(&self, document: &Configuration, _config_dir: &Path) -> Vec<ValidationIssue> {
        let mut issues = Vec::new();
        if document.version.trim().is_empty() {
            issues.push(ValidationIssue::error("version", "version must not be empty"));
        }
        if document.profiles.is_empty() {
            issues.push(ValidationIssue::error("profiles", "no profiles defined"));
        }
        issues
    }

    fn name(&self) -> &'static str {
        "document"
    }
}

/// `extends` references.
#[derive(Debug)]
pub struct InheritanceValidator;

impl ConfigValidator for InheritanceValidator {
    fn validate(&self, document: &Configuration, _config_dir: &Path) -> Vec<ValidationIssue> {
        let mut issues = Vec::new();
        for profile in document.profiles.values() {
            let Some(parent_name) = profile.extends.as_deref() else {
                continue;
            };
            let location = at(profile, "extends");
            if parent_name == profile.name {
                issues.push(ValidationIssue::error(location, "profile extends itself"));
                continue;
            }
            match document.profiles.get(parent_name) {
                None => issues.push(ValidationIssue::error(
                    location,
                    format!("extends unknown profile '{parent_name}'"),
                )),
                Some(parent) if parent.extends.is_some() => {
                    issues.push(ValidationIssue::error(
                        location,
                        format!(
                            "'{parent_name}' extends another profile; only one level of inheritance is supported"
                        ),
                    ));
                }
                Some(_) => {}
            }
        }
        issues
    }

    fn name(&self) -> &'static str {
        "inheritance"
    }
}

/// Homebrew, App Store and manual application entries.
#[derive(Debug)]
pub struct ApplicationsValidator;

impl ConfigValidator for ApplicationsValidator {
    fn validate(&self, document: &Configuration, _config_dir: &Path) -> Vec<ValidationIssue> {
        let mut issues = Vec::new();
        for profile in document.profiles.values() {
            let Some(apps) = &profile.applications else {
                continue;
            };
            if let Some(brew) = &apps.package_manager {
                for (field, list) in [
                    ("taps", &brew.taps),
                    ("formulas", &brew.formulas),
                    ("casks", &brew.casks),
                ] {
                    let location = at(profile, &format!("applications.homebrew.{field}"));
                    check_names(&location, list, &mut issues);
                }
                for tap in &brew.taps {
                    if tap.split('/').filter(|part| !part.is_empty()).count() != 2 {
                        issues.push(ValidationIssue::warning(
                            at(profile, "applications.homebrew.taps"),
                            format!("tap '{tap}' is not of the form user/repo"),
                        ));
                    }
                }
            }

            let mut seen = HashSet::new();
            for (i, app) in apps.app_store.iter().enumerate() {
                let location = at(profile, &format!("applications.mas[{i}]"));
                if app.id == 0 {
                    issues.push(ValidationIssue::error(
                        location.clone(),
                        format!("'{}' has invalid App Store id 0", app.name),
                    ));
                }
                if !seen.insert(app.id) {
                    issues.push(ValidationIssue::warning(
                        location,
                        format!("App Store id {} is listed more than once", app.id),
                    ));
                }
            }

            for (i, app) in apps.manual.iter().enumerate() {
                if app.name.trim().is_empty() {
                    issues.push(ValidationIssue::error(
                        at(profile, &format!("applications.manual[{i}]")),
                        "manual app has no name",
                    ));
                }
            }
        }
        issues
    }

    fn name(&self) -> &'static str {
        "applications"
    }
}

fn check_names(location: &str, names: &[String], issues: &mut Vec<ValidationIssue>) {
    let mut seen = HashSet::new();
    for name in names {
        if name.trim().is_empty() {
            issues.push(ValidationIssue::error(location, "empty entry"));
        } else if !seen.insert(name.as_str()) {
            issues.push(ValidationIssue::warning(
                location,
                format!("'{name}' is listed more than once"),
            ));
        }
    }
}

/// Dotfile paths and payloads.
#[derive(Debug)]
pub struct DotfileValidator;

impl ConfigValidator for DotfileValidator {
    fn validate(&self, document: &Configuration, config_dir: &Path) -> Vec<ValidationIssue> {
        let mut issues = Vec::new();
        let payload_root = dotfiles_path(config_dir);
        for profile in document.profiles.values() {
            let mut seen = HashSet::new();
            for (i, dotfile) in profile.dotfiles.iter().enumerate() {
                let location = at(profile, &format!("dotfiles[{i}]"));
                if let Some(problem) = dotfile.path_problem() {
                    issues.push(ValidationIssue::error(location, problem));
                    continue;
                }
                let path = Path::new(&dotfile.path);
                if !seen.insert(dotfile.path.as_str()) {
                    issues.push(ValidationIssue::warning(
                        location.clone(),
                        format!("'{}' is listed more than once", dotfile.path),
                    ));
                }
                if !payload_root.join(path).exists() {
                    issues.push(ValidationIssue::warning(
                        location,
                        format!(
                            "payload {} does not exist",
                            payload_root.join(path).display()
                        ),
                    ));
                }
            }
        }
        issues
    }

    fn name(&self) -> &'static str {
        "dotfiles"
    }
}

/// `defaults` entries.
#[derive(Debug)]
pub struct PreferenceValidator;

impl ConfigValidator for PreferenceValidator {
    fn validate(&self, document: &Configuration, _config_dir: &Path) -> Vec<ValidationIssue> {
        let mut issues = Vec::new();
        for profile in document.profiles.values() {
            for (i, pref) in profile.preferences.iter().enumerate() {
                let location = at(profile, &format!("preferences[{i}]"));
                if let Some(problem) = pref.domain_problem() {
                    issues.push(ValidationIssue::error(location.clone(), problem));
                }
                match (&pref.key, &pref.value) {
                    (None, Some(_)) => issues.push(ValidationIssue::error(
                        location.clone(),
                        "value given without a key",
                    )),
                    (Some(key), None) => issues.push(ValidationIssue::warning(
                        location.clone(),
                        format!("'{key}' has no value and will be skipped"),
                    )),
                    _ => {}
                }
                if let (Some(declared), Some(value)) = (pref.value_type, &pref.value)
                    && !type_accepts(declared, value)
                {
                    issues.push(ValidationIssue::error(
                        location,
                        format!(
                            "type '{}' does not match value {value:?}",
                            declared.flag().trim_start_matches('-')
                        ),
                    ));
                }
            }
        }
        issues
    }

    fn name(&self) -> &'static str {
        "preferences"
    }
}

/// Whether a value can be written with the declared type.
fn type_accepts(declared: PreferenceType, value: &PreferenceValue) -> bool {
    match (declared, value) {
        (PreferenceType::String, _) => matches!(
            value,
            PreferenceValue::String(_)
                | PreferenceValue::Int(_)
                | PreferenceValue::Float(_)
                | PreferenceValue::Bool(_)
        ),
        (PreferenceType::Float, PreferenceValue::Int(_)) => true,
        (declared, value) => declared == value.inferred_type(),
    }
}

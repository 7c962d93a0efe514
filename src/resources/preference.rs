//! `defaults` preference writes.
use std::sync::Arc;

use super::error::{Hint, remediation_for};
use super::{Adapter, ResourceChange, ResourceError};
use crate::config::{PreferenceType, PreferenceValue};
use crate::exec::Executor;
use crate::setup::{PreferenceWrite, WorkItem};

const DEFAULTS: &str = "defaults";

const HINTS: &[Hint] = &[
    Hint {
        patterns: &["does not exist"],
        text: "'{}' may not be a valid preference domain. Check with 'defaults domains'.",
    },
    Hint {
        patterns: &["type"],
        text: "Value type mismatch for '{}'. Try specifying the type explicitly.",
    },
];

/// Adapter for the macOS `defaults` tool.
#[derive(Debug)]
pub struct PreferenceAdapter {
    executor: Arc<dyn Executor>,
}

impl PreferenceAdapter {
    /// Adapter driving `defaults` through `executor`.
    #[must_use]
    pub fn new(executor: Arc<dyn Executor>) -> Self {
        Self { executor }
    }

    /// Current value as printed by `defaults read`, `None` if unset.
    #[must_use]
    pub fn read(&self, domain: &str, key: &str) -> Option<String> {
        match self.executor.run_unchecked(DEFAULTS, &["read", domain, key]) {
            Ok(result) if result.success => Some(result.stdout.trim().to_string()),
            Ok(_) | Err(_) => None,
        }
    }
}

/// How a scalar is passed on the `defaults write` command line.
fn write_arg(value: &PreferenceValue) -> Option<String> {
    match value {
        PreferenceValue::Bool(b) => Some(b.to_string()),
        other => other.to_scalar_string(),
    }
}

fn type_error(pref: &PreferenceWrite, reason: &str) -> ResourceError {
    ResourceError::InvalidState {
        resource: format!("{} {}", pref.domain, pref.key),
        reason: reason.to_string(),
    }
}

/// Build the `defaults write` argument list for `pref`.
///
/// # Errors
///
/// Returns [`ResourceError::InvalidState`] if the value's shape does not
/// fit the effective type, or a collection holds nested collections.
pub fn write_args(pref: &PreferenceWrite) -> Result<Vec<String>, ResourceError> {
    let value_type = pref.effective_type();
    let mut args = vec![
        "write".to_string(),
        pref.domain.clone(),
        pref.key.clone(),
        value_type.flag().to_string(),
    ];

    match (value_type, &pref.value) {
        (PreferenceType::Array, PreferenceValue::Array(items)) => {
            for item in items {
                args.push(
                    write_arg(item)
                        .ok_or_else(|| type_error(pref, "nested collections are not supported"))?,
                );
            }
        }
        (PreferenceType::Dict, PreferenceValue::Dict(entries)) => {
            for (k, v) in entries {
                args.push(k.clone());
                args.push(
                    write_arg(v)
                        .ok_or_else(|| type_error(pref, "nested collections are not supported"))?,
                );
            }
        }
        (PreferenceType::Array | PreferenceType::Dict, _) => {
            return Err(type_error(pref, "array and dict types need a list or mapping value"));
        }
        (_, value) => {
            args.push(
                write_arg(value)
                    .ok_or_else(|| type_error(pref, "a list or mapping needs the array or dict type"))?,
            );
        }
    }
    Ok(args)
}

impl Adapter for PreferenceAdapter {
    fn name(&self) -> &'static str {
        "defaults"
    }

    fn is_available(&self) -> bool {
        self.executor.which(DEFAULTS)
    }

    fn install_hint(&self) -> &'static str {
        "The 'defaults' tool ships with macOS; preferences can only be applied on a Mac"
    }

    /// Scalars are compared against `defaults read`; collections are always
    /// rewritten.
    fn is_installed(&self, item: &WorkItem) -> bool {
        let WorkItem::Preference(pref) = item else {
            return false;
        };
        let Some(expected) = pref.value.to_scalar_string() else {
            return false;
        };
        self.read(&pref.domain, &pref.key)
            .is_some_and(|current| current == expected)
    }

    fn apply(&self, item: &WorkItem) -> Result<ResourceChange, ResourceError> {
        let WorkItem::Preference(pref) = item else {
            return Err(ResourceError::UnsupportedItem {
                adapter: "defaults",
                item: item.id(),
            });
        };
        let args = write_args(pref)?;
        let arg_refs: Vec<&str> = args.iter().map(String::as_str).collect();
        let result = self
            .executor
            .run_unchecked(DEFAULTS, &arg_refs)
            .map_err(|e| ResourceError::Spawn {
                program: DEFAULTS.to_string(),
                message: e.to_string(),
            })?;
        if result.success {
            return Ok(ResourceChange::Applied);
        }
        let output = result.diagnostic();
        let subject = if output.to_lowercase().contains("does not exist") {
            pref.domain.clone()
        } else {
            pref.key.clone()
        };
        Err(ResourceError::ExecutionFailed {
            program: DEFAULTS.to_string(),
            exit_code: result.code.unwrap_or(-1),
            output: output.to_string(),
            remediation: Some(remediation_for(
                output,
                &subject,
                HINTS,
                &format!(
                    "Run 'defaults write {} {}' manually to see detailed error.",
                    pref.domain, pref.key
                ),
            )),
        })
    }
}

//! Homebrew taps, formulas and casks.
use std::collections::HashSet;
use std::sync::Arc;

use super::error::{Hint, remediation_for};
use super::{Adapter, ResourceChange, ResourceError};
use crate::exec::{ExecResult, Executor};
use crate::setup::{ItemKind, WorkItem};

const BREW: &str = "brew";

/// Auto-update on every command makes a long setup much slower.
const BREW_ENV: &[(&str, &str)] = &[("HOMEBREW_NO_AUTO_UPDATE", "1")];

const TAP_HINTS: &[Hint] = &[Hint {
    patterns: &["invalid tap", "not found", "does not exist"],
    text: "Verify the tap name is correct. Format should be 'user/repo'.",
}];

const FORMULA_HINTS: &[Hint] = &[
    Hint {
        patterns: &["no available formula", "not found"],
        text: "Verify the formula name is correct. Search with 'brew search {}'.",
    },
    Hint {
        patterns: &["permission denied"],
        text: "Check Homebrew directory permissions. Run 'brew doctor' for diagnostics.",
    },
];

const CASK_HINTS: &[Hint] = &[
    Hint {
        patterns: &["no available cask", "not found"],
        text: "Verify the cask name is correct. Search with 'brew search --cask {}'.",
    },
    Hint {
        patterns: &["permission denied"],
        text: "Cask installation may require admin privileges. Check system permissions.",
    },
    Hint {
        patterns: &["sha256 mismatch"],
        text: "Download may be corrupted. Run 'brew cleanup' and try again.",
    },
];

/// Adapter for Homebrew.
#[derive(Debug)]
pub struct HomebrewAdapter {
    executor: Arc<dyn Executor>,
}

impl HomebrewAdapter {
    /// Adapter driving `brew` through `executor`.
    #[must_use]
    pub fn new(executor: Arc<dyn Executor>) -> Self {
        Self { executor }
    }

    /// Query the full set of installed names for one kind.
    ///
    /// Runs a **single** command regardless of how many items need checking.
    /// Tap names are lower-cased because `brew tap` prints them that way.
    /// An unavailable or failing `brew` yields an empty set.
    #[must_use]
    pub fn installed(&self, kind: ItemKind) -> HashSet<String> {
        let args: &[&str] = match kind {
            ItemKind::Tap => &["tap"],
            ItemKind::Formula => &["list", "--formula", "-1"],
            ItemKind::Cask => &["list", "--cask", "-1"],
            ItemKind::AppStoreApp | ItemKind::Dotfile | ItemKind::Preference => {
                return HashSet::new();
            }
        };
        match self.executor.run_unchecked_with_env(BREW, args, BREW_ENV) {
            Ok(result) if result.success => result
                .stdout
                .lines()
                .map(str::trim)
                .filter(|line| !line.is_empty())
                .map(|line| {
                    if kind == ItemKind::Tap {
                        line.to_lowercase()
                    } else {
                        line.to_string()
                    }
                })
                .collect(),
            Ok(_) | Err(_) => HashSet::new(),
        }
    }

    fn install(
        &self,
        args: &[&str],
        key: &str,
        hints: &[Hint],
        fallback: &str,
    ) -> Result<ResourceChange, ResourceError> {
        let result = self
            .executor
            .run_unchecked_with_env(BREW, args, BREW_ENV)
            .map_err(|e| ResourceError::Spawn {
                program: BREW.to_string(),
                message: e.to_string(),
            })?;
        interpret(&result, key, hints, fallback)
    }
}

/// Name as `brew list` prints it: `user/tap/name` is listed as `name`.
fn short_name(name: &str) -> &str {
    name.rsplit('/').next().unwrap_or(name)
}

fn interpret(
    result: &ExecResult,
    key: &str,
    hints: &[Hint],
    fallback: &str,
) -> Result<ResourceChange, ResourceError> {
    if result.success {
        return Ok(ResourceChange::Applied);
    }
    let output = result.diagnostic();
    let lower = output.to_lowercase();
    if lower.contains("already tapped") || lower.contains("already installed") {
        return Ok(ResourceChange::AlreadyCorrect);
    }
    Err(ResourceError::ExecutionFailed {
        program: BREW.to_string(),
        exit_code: result.code.unwrap_or(-1),
        output: output.to_string(),
        remediation: Some(remediation_for(output, key, hints, fallback)),
    })
}

impl Adapter for HomebrewAdapter {
    fn name(&self) -> &'static str {
        "homebrew"
    }

    fn is_available(&self) -> bool {
        self.executor.which(BREW)
    }

    fn install_hint(&self) -> &'static str {
        "Install Homebrew from https://brew.sh, then run 'macsetup setup --resume'"
    }

    fn is_installed(&self, item: &WorkItem) -> bool {
        match item {
            WorkItem::Tap(tap) => self.installed(ItemKind::Tap).contains(&tap.to_lowercase()),
            WorkItem::Formula(name) => self
                .installed(ItemKind::Formula)
                .contains(short_name(name)),
            WorkItem::Cask(name) => self.installed(ItemKind::Cask).contains(short_name(name)),
            WorkItem::AppStoreApp(_) | WorkItem::Dotfile(_) | WorkItem::Preference(_) => false,
        }
    }

    fn apply(&self, item: &WorkItem) -> Result<ResourceChange, ResourceError> {
        match item {
            WorkItem::Tap(tap) => self.install(
                &["tap", tap],
                tap,
                TAP_HINTS,
                "Run 'brew tap {}' manually to see detailed error.",
            ),
            WorkItem::Formula(name) => self.install(
                &["install", name],
                name,
                FORMULA_HINTS,
                "Run 'brew install {}' manually to see detailed error.",
            ),
            WorkItem::Cask(name) => self.install(
                &["install", "--cask", name],
                name,
                CASK_HINTS,
                "Run 'brew install --cask {}' manually to see detailed error.",
            ),
            WorkItem::AppStoreApp(_) | WorkItem::Dotfile(_) | WorkItem::Preference(_) => {
                Err(ResourceError::UnsupportedItem {
                    adapter: "homebrew",
                    item: item.id(),
                })
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::resources::test_helpers::MockExecutor;

    fn adapter(executor: MockExecutor) -> (HomebrewAdapter, Arc<MockExecutor>) {
        let executor = Arc::new(executor);
        (
            HomebrewAdapter::new(Arc::clone(&executor) as Arc<dyn Executor>),
            executor,
        )
    }

    // -----------------------------------------------------------------------
    // is_installed
    // -----------------------------------------------------------------------

    #[test]
    fn formula_found_in_list() {
        let (brew, exec) = adapter(MockExecutor::ok("git\nripgrep\n"));
        assert!(brew.is_installed(&WorkItem::Formula("ripgrep".into())));
        assert_eq!(exec.calls(), vec!["brew list --formula -1"]);
    }

    #[test]
    fn qualified_formula_matches_short_name() {
        let (brew, _) = adapter(MockExecutor::ok("terraform\n"));
        assert!(brew.is_installed(&WorkItem::Formula("hashicorp/tap/terraform".into())));
    }

    #[test]
    fn tap_comparison_ignores_case() {
        let (brew, exec) = adapter(MockExecutor::ok("homebrew/cask-fonts\n"));
        assert!(brew.is_installed(&WorkItem::Tap("Homebrew/cask-fonts".into())));
        assert_eq!(exec.calls(), vec!["brew tap"]);
    }

    #[test]
    fn failed_query_means_not_installed() {
        let (brew, _) = adapter(MockExecutor::fail("boom"));
        assert!(!brew.is_installed(&WorkItem::Cask("slack".into())));
    }

    // -----------------------------------------------------------------------
    // apply
    // -----------------------------------------------------------------------

    #[test]
    fn cask_install_command() {
        let (brew, exec) = adapter(MockExecutor::ok(""));
        let change = brew.apply(&WorkItem::Cask("slack".into())).unwrap();
        assert_eq!(change, ResourceChange::Applied);
        assert_eq!(exec.calls(), vec!["brew install --cask slack"]);
    }

    #[test]
    fn already_installed_is_not_a_failure() {
        let (brew, _) = adapter(MockExecutor::fail(
            "Warning: git 2.43.0 is already installed and up-to-date.",
        ));
        let change = brew.apply(&WorkItem::Formula("git".into())).unwrap();
        assert_eq!(change, ResourceChange::AlreadyCorrect);
    }

    #[test]
    fn unknown_formula_gets_search_hint() {
        let (brew, _) = adapter(MockExecutor::fail(
            "Error: No available formula with the name \"gti\".",
        ));
        let err = brew.apply(&WorkItem::Formula("gti".into())).unwrap_err();
        assert_eq!(
            err.remediation().as_deref(),
            Some("Verify the formula name is correct. Search with 'brew search gti'.")
        );
    }

    #[test]
    fn sha_mismatch_gets_cleanup_hint() {
        let (brew, _) = adapter(MockExecutor::fail("Error: SHA256 mismatch"));
        let err = brew.apply(&WorkItem::Cask("zoom".into())).unwrap_err();
        assert!(err.remediation().unwrap().contains("brew cleanup"));
    }

    #[test]
    fn unrecognised_failure_gets_manual_hint() {
        let (brew, _) = adapter(MockExecutor::fail("Error: something odd"));
        let err = brew.apply(&WorkItem::Tap("a/b".into())).unwrap_err();
        assert_eq!(
            err.remediation().as_deref(),
            Some("Run 'brew tap a/b' manually to see detailed error.")
        );
    }

    #[test]
    fn foreign_item_is_rejected() {
        let (brew, exec) = adapter(MockExecutor::ok(""));
        let item = WorkItem::Dotfile(crate::config::Dotfile {
            path: ".zshrc".into(),
            mode: crate::config::DotfileMode::Symlink,
            template: false,
        });
        assert!(matches!(
            brew.apply(&item),
            Err(ResourceError::UnsupportedItem { .. })
        ));
        assert!(exec.calls().is_empty());
    }

    #[test]
    fn availability_uses_which() {
        let (brew, _) = adapter(MockExecutor::ok("").with_which(true));
        assert!(brew.is_available());
        let (missing, _) = adapter(MockExecutor::ok(""));
        assert!(!missing.is_available());
    }
}

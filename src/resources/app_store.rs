//! Mac App Store apps via `mas`.
use std::collections::HashSet;
use std::sync::Arc;

use super::error::{Hint, remediation_for};
use super::{Adapter, ResourceChange, ResourceError};
use crate::exec::Executor;
use crate::setup::WorkItem;

const MAS: &str = "mas";

const HINTS: &[Hint] = &[
    Hint {
        patterns: &["not signed in", "sign in"],
        text: "Sign into the Mac App Store first: open /System/Applications/App\\ Store.app",
    },
    Hint {
        patterns: &["not found", "no results"],
        text: "Verify app ID {} is correct. Search for apps with 'mas search <name>'.",
    },
    Hint {
        patterns: &["purchased"],
        text: "App {} must be purchased or downloaded from the App Store first.",
    },
];

/// Adapter for the `mas` command-line client.
#[derive(Debug)]
pub struct AppStoreAdapter {
    executor: Arc<dyn Executor>,
}

impl AppStoreAdapter {
    /// Adapter driving `mas` through `executor`.
    #[must_use]
    pub fn new(executor: Arc<dyn Executor>) -> Self {
        Self { executor }
    }

    /// Ids of installed apps, from one `mas list` call.
    ///
    /// Lines look like `497799835  Xcode (15.0)`.
    #[must_use]
    pub fn installed(&self) -> HashSet<u64> {
        match self.executor.run_unchecked(MAS, &["list"]) {
            Ok(result) if result.success => result
                .stdout
                .lines()
                .filter_map(|line| line.split_whitespace().next())
                .filter_map(|id| id.parse().ok())
                .collect(),
            Ok(_) | Err(_) => HashSet::new(),
        }
    }
}

impl Adapter for AppStoreAdapter {
    fn name(&self) -> &'static str {
        "mas"
    }

    fn is_available(&self) -> bool {
        self.executor.which(MAS)
    }

    fn install_hint(&self) -> &'static str {
        "Install mas with 'brew install mas', then run 'macsetup setup --resume'"
    }

    fn is_installed(&self, item: &WorkItem) -> bool {
        match item {
            WorkItem::AppStoreApp(app) => self.installed().contains(&app.id),
            _ => false,
        }
    }

    fn apply(&self, item: &WorkItem) -> Result<ResourceChange, ResourceError> {
        let WorkItem::AppStoreApp(app) = item else {
            return Err(ResourceError::UnsupportedItem {
                adapter: "mas",
                item: item.id(),
            });
        };
        let id = app.id.to_string();
        let result = self
            .executor
            .run_unchecked(MAS, &["install", &id])
            .map_err(|e| ResourceError::Spawn {
                program: MAS.to_string(),
                message: e.to_string(),
            })?;
        if result.success {
            return Ok(ResourceChange::Applied);
        }
        let output = result.diagnostic();
        if output.to_lowercase().contains("already installed") {
            return Ok(ResourceChange::AlreadyCorrect);
        }
        Err(ResourceError::ExecutionFailed {
            program: MAS.to_string(),
            exit_code: result.code.unwrap_or(-1),
            output: output.to_string(),
            remediation: Some(remediation_for(
                output,
                &id,
                HINTS,
                "Run 'mas install {}' manually to see detailed error.",
            )),
        })
    }
}

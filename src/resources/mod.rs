//! Item adapters: single idempotence checks and applies for one kind of
//! work item each.
pub mod app_store;
pub mod dotfile;
pub mod error;
pub mod helpers;
pub mod homebrew;
pub mod preference;

pub use error::ResourceError;

use std::path::Path;
use std::sync::Arc;

use crate::exec::Executor;
use crate::setup::{ItemKind, WorkItem};

/// State of a resource (file, preference value, etc.).
///
/// # Examples
///
/// ```
/// use macsetup_cli::resources::ResourceState;
///
/// let missing = ResourceState::Missing;
/// let wrong = ResourceState::Incorrect { current: "/other/path".into() };
///
/// assert_ne!(missing, ResourceState::Correct);
/// assert_ne!(wrong, ResourceState::Correct);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResourceState {
    /// Resource does not exist or is not present.
    Missing,
    /// Resource exists and matches the desired state.
    Correct,
    /// Resource exists but does not match the desired state.
    Incorrect {
        /// The current value of the resource.
        current: String,
    },
    /// Resource cannot be applied (e.g., target is a directory that shouldn't be removed).
    Invalid {
        /// Reason why the resource cannot be applied.
        reason: String,
    },
}

/// Result of applying a work item.
///
/// # Examples
///
/// ```
/// use macsetup_cli::resources::ResourceChange;
///
/// let applied = ResourceChange::Applied;
/// let noop = ResourceChange::AlreadyCorrect;
///
/// assert_eq!(applied, ResourceChange::Applied);
/// assert_ne!(applied, noop);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResourceChange {
    /// Item was installed or written.
    Applied,
    /// The tool reported the item was already in place.
    AlreadyCorrect,
}

/// Contract every adapter implements.
///
/// `apply` is expected to be idempotent at the tool level: installing an
/// already-installed package reports [`ResourceChange::AlreadyCorrect`]
/// rather than failing.
#[cfg_attr(test, mockall::automock)]
pub trait Adapter: Send + Sync {
    /// Short name used in logs (e.g. `"homebrew"`).
    fn name(&self) -> &'static str;

    /// Whether the underlying tool is present on this machine.
    fn is_available(&self) -> bool;

    /// Install hint shown when [`is_available`](Self::is_available) is false.
    fn install_hint(&self) -> &'static str;

    /// Whether `item` is already in its desired state.
    fn is_installed(&self, item: &WorkItem) -> bool;

    /// Bring `item` into its desired state.
    ///
    /// # Errors
    ///
    /// Returns a [`ResourceError`] describing why the item could not be
    /// applied, with a remediation hint where one is known.
    fn apply(&self, item: &WorkItem) -> Result<ResourceChange, ResourceError>;
}

/// The per-kind handler table the executor dispatches through.
#[derive(Clone)]
pub struct Adapters {
    /// Taps, formulas and casks.
    pub package_manager: Arc<dyn Adapter>,
    /// App Store apps.
    pub app_store: Arc<dyn Adapter>,
    /// Dotfiles.
    pub dotfiles: Arc<dyn Adapter>,
    /// Preferences.
    pub preferences: Arc<dyn Adapter>,
}

impl std::fmt::Debug for Adapters {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Adapters")
            .field("package_manager", &self.package_manager.name())
            .field("app_store", &self.app_store.name())
            .field("dotfiles", &self.dotfiles.name())
            .field("preferences", &self.preferences.name())
            .finish()
    }
}

impl Adapters {
    /// The real adapters, driving system tools through `executor`.
    ///
    /// Dotfile payloads are read from `config_dir/dotfiles` and installed
    /// under `home`.
    #[must_use]
    pub fn system(executor: Arc<dyn Executor>, config_dir: &Path, home: &Path) -> Self {
        Self {
            package_manager: Arc::new(homebrew::HomebrewAdapter::new(Arc::clone(&executor))),
            app_store: Arc::new(app_store::AppStoreAdapter::new(Arc::clone(&executor))),
            dotfiles: Arc::new(dotfile::DotfileAdapter::new(
                crate::config::dotfiles_path(config_dir),
                home.to_path_buf(),
            )),
            preferences: Arc::new(preference::PreferenceAdapter::new(executor)),
        }
    }

    /// The adapter responsible for `kind`.
    #[must_use]
    pub fn for_kind(&self, kind: ItemKind) -> &dyn Adapter {
        match kind {
            ItemKind::Tap | ItemKind::Formula | ItemKind::Cask => &*self.package_manager,
            ItemKind::AppStoreApp => &*self.app_store,
            ItemKind::Dotfile => &*self.dotfiles,
            ItemKind::Preference => &*self.preferences,
        }
    }
}


#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;

    fn named(name: &'static str) -> Arc<dyn Adapter> {
        let mut mock = MockAdapter::new();
        mock.expect_name().return_const(name);
        Arc::new(mock)
    }

    #[test]
    fn every_kind_has_a_handler() {
        let adapters = Adapters {
            package_manager: named("brew"),
            app_store: named("mas"),
            dotfiles: named("dotfiles"),
            preferences: named("defaults"),
        };
        let names: Vec<&str> = ItemKind::ALL
            .iter()
            .map(|kind| adapters.for_kind(*kind).name())
            .collect();
        assert_eq!(
            names,
            vec!["brew", "brew", "brew", "mas", "dotfiles", "defaults"]
        );
    }

    #[test]
    fn debug_lists_adapter_names() {
        let adapters = Adapters {
            package_manager: named("brew"),
            app_store: named("mas"),
            dotfiles: named("dotfiles"),
            preferences: named("defaults"),
        };
        let debug = format!("{adapters:?}");
        assert!(debug.contains("brew"));
        assert!(debug.contains("defaults"));
    }
}

//! Work items: the unit of idempotence bookkeeping.
//!
//! A resolved profile is flattened into an ordered [`Plan`] of
//! [`WorkItem`]s. Each item has a stable identifier `kind:key` that the run
//! state records once the item is applied.
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::config::{
    AppStoreApp, Dotfile, ManualApp, PreferenceType, PreferenceValue, Profile,
};

/// The closed set of things setup knows how to apply, in install order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemKind {
    /// `brew tap`.
    Tap,
    /// `brew install`.
    Formula,
    /// `brew install --cask`.
    Cask,
    /// `mas install`.
    #[serde(rename = "app_store")]
    AppStoreApp,
    /// A file linked or copied into the home directory.
    Dotfile,
    /// A `defaults write`.
    Preference,
}

impl ItemKind {
    /// Every kind in install order. Taps come first so formulas and casks
    /// from third-party taps resolve.
    pub const ALL: [Self; 6] = [
        Self::Tap,
        Self::Formula,
        Self::Cask,
        Self::AppStoreApp,
        Self::Dotfile,
        Self::Preference,
    ];

    /// Identifier prefix.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Tap => "tap",
            Self::Formula => "formula",
            Self::Cask => "cask",
            Self::AppStoreApp => "app_store",
            Self::Dotfile => "dotfile",
            Self::Preference => "preference",
        }
    }

    /// Section heading used in previews and summaries.
    #[must_use]
    pub const fn heading(self) -> &'static str {
        match self {
            Self::Tap => "Homebrew taps",
            Self::Formula => "Homebrew formulas",
            Self::Cask => "Homebrew casks",
            Self::AppStoreApp => "App Store apps",
            Self::Dotfile => "Dotfiles",
            Self::Preference => "Preferences",
        }
    }
}

impl fmt::Display for ItemKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A preference entry that has both a key and a value and can be written.
#[derive(Debug, Clone, PartialEq)]
pub struct PreferenceWrite {
    /// `defaults` domain, e.g. `com.apple.dock`.
    pub domain: String,
    /// Key within the domain.
    pub key: String,
    /// Value to write.
    pub value: PreferenceValue,
    /// Explicit type from the document, if any.
    pub value_type: Option<PreferenceType>,
}

impl PreferenceWrite {
    /// The explicit type, or the one inferred from the value.
    #[must_use]
    pub fn effective_type(&self) -> PreferenceType {
        self.value_type
            .unwrap_or_else(|| self.value.inferred_type())
    }
}

/// One thing to apply.
#[derive(Debug, Clone, PartialEq)]
pub enum WorkItem {
    /// A Homebrew tap by name.
    Tap(String),
    /// A Homebrew formula by name.
    Formula(String),
    /// A Homebrew cask by name.
    Cask(String),
    /// An App Store app.
    AppStoreApp(AppStoreApp),
    /// A dotfile to install under the home directory.
    Dotfile(Dotfile),
    /// A preference to write.
    Preference(PreferenceWrite),
}

impl WorkItem {
    /// Category of this item.
    #[must_use]
    pub const fn kind(&self) -> ItemKind {
        match self {
            Self::Tap(_) => ItemKind::Tap,
            Self::Formula(_) => ItemKind::Formula,
            Self::Cask(_) => ItemKind::Cask,
            Self::AppStoreApp(_) => ItemKind::AppStoreApp,
            Self::Dotfile(_) => ItemKind::Dotfile,
            Self::Preference(_) => ItemKind::Preference,
        }
    }

    /// The part of the identifier after the kind prefix.
    #[must_use]
    pub fn key(&self) -> String {
        match self {
            Self::Tap(name) | Self::Formula(name) | Self::Cask(name) => name.clone(),
            Self::AppStoreApp(app) => app.id.to_string(),
            Self::Dotfile(dotfile) => dotfile.path.clone(),
            Self::Preference(pref) => format!("{}:{}", pref.domain, pref.key),
        }
    }

    /// Stable identifier, e.g. `formula:git` or `preference:com.apple.dock:autohide`.
    #[must_use]
    pub fn id(&self) -> String {
        format!("{}:{}", self.kind(), self.key())
    }

    /// Human-readable one-line description.
    #[must_use]
    pub fn description(&self) -> String {
        match self {
            Self::Tap(name) => format!("tap {name}"),
            Self::Formula(name) => format!("formula {name}"),
            Self::Cask(name) => format!("cask {name}"),
            Self::AppStoreApp(app) => format!("{} ({})", app.name, app.id),
            Self::Dotfile(dotfile) => {
                format!("~/{} ({})", dotfile.path, mode_name(dotfile))
            }
            Self::Preference(pref) => format!("{} {}", pref.domain, pref.key),
        }
    }
}

const fn mode_name(dotfile: &Dotfile) -> &'static str {
    match dotfile.mode {
        crate::config::DotfileMode::Symlink => "symlink",
        crate::config::DotfileMode::Copy => "copy",
    }
}

/// Which categories to leave out of a plan.
#[derive(Debug, Clone, Copy, Default)]
pub struct PlanOptions {
    /// Leave out dotfiles.
    pub skip_dotfiles: bool,
    /// Leave out preferences.
    pub skip_preferences: bool,
}

/// The ordered work derived from a resolved profile.
#[derive(Debug, Clone, Default)]
pub struct Plan {
    /// Items in install order: by [`ItemKind::ALL`], then declared order.
    pub items: Vec<WorkItem>,
    /// Apps the user installs by hand. Never executed.
    pub manual: Vec<ManualApp>,
    /// Entries that cannot be applied, with the reason.
    pub warnings: Vec<String>,
}

impl Plan {
    /// Flatten `profile` into work items.
    #[must_use]
    pub fn build(profile: &Profile, options: PlanOptions) -> Self {
        let mut plan = Self::default();

        if let Some(apps) = &profile.applications {
            if let Some(brew) = &apps.package_manager {
                plan.items.extend(brew.taps.iter().cloned().map(WorkItem::Tap));
                plan.items
                    .extend(brew.formulas.iter().cloned().map(WorkItem::Formula));
                plan.items.extend(brew.casks.iter().cloned().map(WorkItem::Cask));
            }
            plan.items
                .extend(apps.app_store.iter().cloned().map(WorkItem::AppStoreApp));
            plan.manual.clone_from(&apps.manual);
        }

        if !options.skip_dotfiles {
            for dotfile in &profile.dotfiles {
                match dotfile.path_problem() {
                    Some(problem) => plan
                        .warnings
                        .push(format!("dotfile skipped: {problem}")),
                    None => plan.items.push(WorkItem::Dotfile(dotfile.clone())),
                }
            }
        }

        if !options.skip_preferences {
            for pref in &profile.preferences {
                if let Some(problem) = pref.domain_problem() {
                    plan.warnings.push(format!("preference skipped: {problem}"));
                    continue;
                }
                match (&pref.key, &pref.value) {
                    (Some(key), Some(value)) => {
                        plan.items.push(WorkItem::Preference(PreferenceWrite {
                            domain: pref.domain.clone(),
                            key: key.clone(),
                            value: value.clone(),
                            value_type: pref.value_type,
                        }));
                    }
                    (Some(key), None) => plan.warnings.push(format!(
                        "preference {} {key} has no value and was skipped",
                        pref.domain
                    )),
                    (None, _) => plan.warnings.push(format!(
                        "preference entry for domain {} has no key and was skipped",
                        pref.domain
                    )),
                }
            }
        }

        plan
    }

    /// Items of one kind, in declared order.
    pub fn of_kind(&self, kind: ItemKind) -> impl Iterator<Item = &WorkItem> {
        self.items.iter().filter(move |item| item.kind() == kind)
    }
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use super::*;
    use crate::config::Configuration;
    use std::collections::HashSet;
    use std::path::Path;

    const PROFILE: &str = r"
version: 1
profiles:
  default:
    preferences:
      - { domain: com.apple.dock, key: autohide, value: true }
      - { domain: com.apple.finder }
      - { domain: com.apple.finder, key: ShowPathbar }
    dotfiles:
      - path: .zshrc
      - path: .config/git/config
        mode: copy
    applications:
      mas:
        - { id: 497799835, name: Xcode }
      homebrew:
        casks: [slack, iterm2]
        formulas: [git]
        taps: [homebrew/cask-fonts]
      manual:
        - { name: Logic Pro }
";

    fn profile() -> Profile {
        let doc = Configuration::parse(PROFILE, Path::new("c.yaml")).unwrap();
        doc.profiles["default"].clone()
    }

    fn ids(plan: &Plan) -> Vec<String> {
        plan.items.iter().map(WorkItem::id).collect()
    }

    #[test]
    fn plan_follows_category_order_regardless_of_declaration_order() {
        let plan = Plan::build(&profile(), PlanOptions::default());
        insta::assert_snapshot!(ids(&plan).join("\n"), @r"
        tap:homebrew/cask-fonts
        formula:git
        cask:slack
        cask:iterm2
        app_store:497799835
        dotfile:.zshrc
        dotfile:.config/git/config
        preference:com.apple.dock:autohide
        ");
    }

    #[test]
    fn unapplicable_preferences_become_warnings() {
        let plan = Plan::build(&profile(), PlanOptions::default());
        assert_eq!(plan.warnings.len(), 2);
        assert!(plan.warnings[0].contains("no key"));
        assert!(plan.warnings[1].contains("ShowPathbar"));
    }

    #[test]
    fn skip_options_drop_categories() {
        let plan = Plan::build(
            &profile(),
            PlanOptions {
                skip_dotfiles: true,
                skip_preferences: true,
            },
        );
        assert_eq!(plan.of_kind(ItemKind::Dotfile).count(), 0);
        assert_eq!(plan.of_kind(ItemKind::Preference).count(), 0);
        assert!(plan.warnings.is_empty());
        assert_eq!(plan.items.len(), 5);
    }

    #[test]
    fn dotfiles_outside_home_become_warnings() {
        let doc = Configuration::parse(
            r"
version: 1
profiles:
  default:
    dotfiles:
      - path: /etc/hosts
      - path: ../outside
      - path: .zshrc
",
            Path::new("c.yaml"),
        )
        .unwrap();
        let plan = Plan::build(&doc.profiles["default"], PlanOptions::default());
        assert_eq!(ids(&plan), vec!["dotfile:.zshrc".to_string()]);
        assert_eq!(plan.warnings.len(), 2);
        assert!(plan.warnings[0].contains("/etc/hosts"));
        assert!(plan.warnings[1].contains("'..'"));
    }

    #[test]
    fn preference_domain_with_separator_becomes_warning() {
        let doc = Configuration::parse(
            r"
version: 1
profiles:
  default:
    preferences:
      - { domain: 'a:b', key: c, value: 1 }
      - { domain: a, key: 'b:c', value: 2 }
",
            Path::new("c.yaml"),
        )
        .unwrap();
        let plan = Plan::build(&doc.profiles["default"], PlanOptions::default());
        assert_eq!(ids(&plan), vec!["preference:a:b:c".to_string()]);
        assert_eq!(plan.warnings.len(), 1);
        assert!(plan.warnings[0].contains("'a:b'"));
    }

    #[test]
    fn manual_apps_are_surfaced_not_planned() {
        let plan = Plan::build(&profile(), PlanOptions::default());
        assert_eq!(plan.manual.len(), 1);
        assert!(plan.items.iter().all(|i| !i.id().contains("Logic")));
    }

    #[test]
    fn identifiers_are_distinct_across_kinds() {
        let items = [
            WorkItem::Formula("docker".into()),
            WorkItem::Cask("docker".into()),
            WorkItem::Tap("docker".into()),
        ];
        let ids: HashSet<String> = items.iter().map(WorkItem::id).collect();
        assert_eq!(ids.len(), 3);
    }

    #[test]
    fn effective_type_prefers_explicit() {
        let pref = PreferenceWrite {
            domain: "d".into(),
            key: "k".into(),
            value: PreferenceValue::Int(1),
            value_type: Some(PreferenceType::Float),
        };
        assert_eq!(pref.effective_type(), PreferenceType::Float);
        let inferred = PreferenceWrite {
            value_type: None,
            ..pref
        };
        assert_eq!(inferred.effective_type(), PreferenceType::Int);
    }

    #[test]
    fn kind_serializes_as_identifier_prefix() {
        for kind in ItemKind::ALL {
            let json = serde_json::to_string(&kind).unwrap();
            assert_eq!(json, format!("\"{}\"", kind.as_str()));
        }
    }
}

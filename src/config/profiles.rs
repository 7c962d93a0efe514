//! Profile inheritance.
//!
//! A profile may name one parent through `extends`. Resolution merges the
//! child over the parent field by field:
//!
//! | field              | rule                                                   |
//! |--------------------|--------------------------------------------------------|
//! | `description`      | child unless unset or blank, else parent               |
//! | `applications.*`   | each list: child if non-empty, else parent             |
//! | `dotfiles`         | child if non-empty, else parent                        |
//! | `preferences`      | child if non-empty, else parent                        |
//! | `extends`          | cleared                                                |
//! | `name`             | child                                                  |
//!
//! Lists are overridden, never unioned: a child listing `formulas: [node]`
//! does not also install its parent's formulas.
use crate::config::{Applications, Configuration, PackageManagerApps, Profile};
use crate::error::ConfigError;

/// Resolve `name` against `document`, following `extends`.
///
/// The stored profiles are never modified; the result is a new value.
///
/// # Errors
///
/// - [`ConfigError::ProfileNotFound`] if `name` or its parent is absent.
/// - [`ConfigError::InheritanceCycle`] if the profile extends itself.
/// - [`ConfigError::InheritanceTooDeep`] if the parent declares `extends`
///   too. Only one hop is followed; longer chains are rejected rather than
///   silently truncated.
pub fn resolve(document: &Configuration, name: &str) -> Result<Profile, ConfigError> {
    let profile = lookup(document, name, None)?;
    let Some(parent_name) = profile.extends.as_deref() else {
        return Ok(profile.clone());
    };
    if parent_name == name {
        return Err(ConfigError::InheritanceCycle(name.to_string()));
    }

    let parent = lookup(document, parent_name, Some(name))?;
    if let Some(grandparent) = parent.extends.as_deref() {
        return Err(ConfigError::InheritanceTooDeep {
            profile: name.to_string(),
            parent: parent_name.to_string(),
            grandparent: grandparent.to_string(),
        });
    }

    Ok(merge(profile, parent))
}

/// Merge `child` over `parent` according to the module-level table.
#[must_use]
pub fn merge(child: &Profile, parent: &Profile) -> Profile {
    Profile {
        name: child.name.clone(),
        description: child
            .description
            .clone()
            .filter(|d| !d.trim().is_empty())
            .or_else(|| parent.description.clone()),
        extends: None,
        applications: merge_applications(child.applications.as_ref(), parent.applications.as_ref()),
        dotfiles: override_list(&child.dotfiles, &parent.dotfiles),
        preferences: override_list(&child.preferences, &parent.preferences),
    }
}

fn merge_applications(
    child: Option<&Applications>,
    parent: Option<&Applications>,
) -> Option<Applications> {
    match (child, parent) {
        (None, None) => None,
        (Some(only), None) | (None, Some(only)) => Some(only.clone()),
        (Some(child), Some(parent)) => {
            let package_manager = match (&child.package_manager, &parent.package_manager) {
                (None, None) => None,
                (Some(only), None) | (None, Some(only)) => Some(only.clone()),
                (Some(c), Some(p)) => Some(PackageManagerApps {
                    taps: override_list(&c.taps, &p.taps),
                    formulas: override_list(&c.formulas, &p.formulas),
                    casks: override_list(&c.casks, &p.casks),
                }),
            };
            Some(Applications {
                package_manager,
                app_store: override_list(&child.app_store, &parent.app_store),
                manual: override_list(&child.manual, &parent.manual),
            })
        }
    }
}

fn override_list<T: Clone>(child: &[T], parent: &[T]) -> Vec<T> {
    if child.is_empty() {
        parent.to_vec()
    } else {
        child.to_vec()
    }
}

fn lookup<'a>(
    document: &'a Configuration,
    name: &str,
    referenced_by: Option<&str>,
) -> Result<&'a Profile, ConfigError> {
    document
        .profiles
        .get(name)
        .ok_or_else(|| ConfigError::ProfileNotFound {
            name: name.to_string(),
            referenced_by: referenced_by.map(str::to_string),
            available: document.profile_names(),
        })
}

#[cfg(test)]
#[allow(
    clippy::expect_used,
    clippy::unwrap_used,
    clippy::indexing_slicing,
    clippy::panic
)]
mod tests {
    use super::*;
    use crate::config::{Dotfile, DotfileMode, Preference, PreferenceValue};
    use std::path::Path;

    fn doc(yaml: &str) -> Configuration {
        Configuration::parse(yaml, Path::new("config.yaml")).expect("test document parses")
    }

    fn formulas(profile: &Profile) -> Vec<String> {
        profile
            .applications
            .as_ref()
            .and_then(|a| a.package_manager.as_ref())
            .map(|p| p.formulas.clone())
            .unwrap_or_default()
    }

    fn casks(profile: &Profile) -> Vec<String> {
        profile
            .applications
            .as_ref()
            .and_then(|a| a.package_manager.as_ref())
            .map(|p| p.casks.clone())
            .unwrap_or_default()
    }

    const INHERITING: &str = r"
version: 1
profiles:
  base:
    description: Shared tools
    applications:
      homebrew:
        formulas: [git]
        casks: [slack]
    dotfiles:
      - path: .zshrc
    preferences:
      - domain: com.apple.dock
        key: autohide
        value: true
  work:
    extends: base
    applications:
      homebrew:
        formulas: [node]
";

    // -----------------------------------------------------------------------
    // resolve
    // -----------------------------------------------------------------------

    #[test]
    fn profile_without_extends_is_returned_unchanged() {
        let document = doc(INHERITING);
        let resolved = resolve(&document, "base").unwrap();
        assert_eq!(resolved, document.profiles["base"]);
    }

    #[test]
    fn child_lists_override_and_missing_lists_inherit() {
        let document = doc(INHERITING);
        let resolved = resolve(&document, "work").unwrap();
        assert_eq!(resolved.name, "work");
        assert_eq!(formulas(&resolved), vec!["node"]);
        assert_eq!(casks(&resolved), vec!["slack"]);
        assert_eq!(resolved.dotfiles.len(), 1);
        assert_eq!(resolved.preferences.len(), 1);
        assert_eq!(resolved.description.as_deref(), Some("Shared tools"));
        assert!(resolved.extends.is_none());
    }

    #[test]
    fn resolving_never_mutates_stored_parent() {
        let document = doc(INHERITING);
        let before = document.profiles["base"].clone();
        let _ = resolve(&document, "work").unwrap();
        assert_eq!(document.profiles["base"], before);
    }

    #[test]
    fn unknown_profile_is_not_found() {
        let document = doc(INHERITING);
        let err = resolve(&document, "missing").unwrap_err();
        match err {
            ConfigError::ProfileNotFound {
                name,
                referenced_by,
                available,
            } => {
                assert_eq!(name, "missing");
                assert!(referenced_by.is_none());
                assert_eq!(available, vec!["base", "work"]);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn missing_parent_is_not_found() {
        let document = doc("version: 1\nprofiles:\n  work:\n    extends: gone\n");
        let err = resolve(&document, "work").unwrap_err();
        assert!(matches!(
            err,
            ConfigError::ProfileNotFound { ref name, referenced_by: Some(ref child), .. }
                if name == "gone" && child == "work"
        ));
    }

    #[test]
    fn self_extension_is_rejected() {
        let document = doc("version: 1\nprofiles:\n  loop:\n    extends: loop\n");
        assert!(matches!(
            resolve(&document, "loop").unwrap_err(),
            ConfigError::InheritanceCycle(ref n) if n == "loop"
        ));
    }

    #[test]
    fn two_hop_chain_is_rejected_not_truncated() {
        let document = doc(
            "version: 1\nprofiles:\n  a:\n    extends: b\n  b:\n    extends: c\n  c: {}\n",
        );
        assert!(matches!(
            resolve(&document, "a").unwrap_err(),
            ConfigError::InheritanceTooDeep { ref grandparent, .. } if grandparent == "c"
        ));
        // The middle of the chain still resolves on its own.
        assert!(resolve(&document, "b").is_ok());
    }

    // -----------------------------------------------------------------------
    // merge
    // -----------------------------------------------------------------------

    fn named(name: &str) -> Profile {
        Profile {
            name: name.to_string(),
            ..Profile::default()
        }
    }

    #[test]
    fn blank_description_falls_back_to_parent() {
        let mut child = named("c");
        child.description = Some("   ".to_string());
        let mut parent = named("p");
        parent.description = Some("parent".to_string());
        assert_eq!(merge(&child, &parent).description.as_deref(), Some("parent"));

        child.description = Some("mine".to_string());
        assert_eq!(merge(&child, &parent).description.as_deref(), Some("mine"));
    }

    #[test]
    fn non_empty_child_list_replaces_parent_list() {
        let mut child = named("c");
        child.dotfiles = vec![Dotfile {
            path: ".vimrc".to_string(),
            mode: DotfileMode::Copy,
            template: false,
        }];
        let mut parent = named("p");
        parent.dotfiles = vec![
            Dotfile {
                path: ".zshrc".to_string(),
                mode: DotfileMode::Symlink,
                template: false,
            },
            Dotfile {
                path: ".gitconfig".to_string(),
                mode: DotfileMode::Symlink,
                template: false,
            },
        ];
        parent.preferences = vec![Preference {
            domain: "d".to_string(),
            key: Some("k".to_string()),
            value: Some(PreferenceValue::Int(1)),
            value_type: None,
        }];

        let merged = merge(&child, &parent);
        assert_eq!(merged.dotfiles.len(), 1);
        assert_eq!(merged.dotfiles[0].path, ".vimrc");
        assert_eq!(merged.preferences, parent.preferences);
    }

    #[test]
    fn applications_inherit_when_child_has_none() {
        let child = named("c");
        let mut parent = named("p");
        parent.applications = Some(Applications {
            package_manager: Some(PackageManagerApps {
                taps: vec!["a/b".to_string()],
                ..PackageManagerApps::default()
            }),
            ..Applications::default()
        });
        assert_eq!(merge(&child, &parent).applications, parent.applications);
    }

    #[test]
    fn neither_side_with_applications_stays_none() {
        assert!(merge(&named("c"), &named("p")).applications.is_none());
    }
}

//! Command: list and inspect profiles.
use anyhow::Result;
use serde::Serialize;

use super::{CommandContext, EXIT_SUCCESS, print_json};
use crate::cli::ProfileCommand;
use crate::config::{Configuration, Profile};
use crate::logging::Logger;

/// A profile as declared, before inheritance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProfileListing {
    /// Profile name.
    pub name: String,
    /// Parent profile, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub extends: Option<String>,
    /// Free-form description.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// Item counts of a resolved profile.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ProfileSummary {
    /// Profile name.
    pub name: String,
    /// Free-form description.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Homebrew taps.
    pub taps: usize,
    /// Homebrew formulas.
    pub formulas: usize,
    /// Homebrew casks.
    pub casks: usize,
    /// App Store apps.
    pub app_store: usize,
    /// Apps installed by hand.
    pub manual: usize,
    /// Dotfiles.
    pub dotfiles: usize,
    /// Preference entries, including ones that will be skipped.
    pub preferences: usize,
}

impl ProfileSummary {
    /// Count the items of a resolved profile.
    #[must_use]
    pub fn of(profile: &Profile) -> Self {
        let apps = profile.applications.clone().unwrap_or_default();
        let brew = apps.package_manager.unwrap_or_default();
        Self {
            name: profile.name.clone(),
            description: profile.description.clone(),
            taps: brew.taps.len(),
            formulas: brew.formulas.len(),
            casks: brew.casks.len(),
            app_store: apps.app_store.len(),
            manual: apps.manual.len(),
            dotfiles: profile.dotfiles.len(),
            preferences: profile.preferences.len(),
        }
    }
}

/// Profiles in `document`, sorted by name.
#[must_use]
pub fn list(document: &Configuration) -> Vec<ProfileListing> {
    document
        .profiles
        .values()
        .map(|p| ProfileListing {
            name: p.name.clone(),
            extends: p.extends.clone(),
            description: p.description.clone(),
        })
        .collect()
}

/// Run a `profile` subcommand.
///
/// # Errors
///
/// Returns an error if the document cannot be loaded or, for `show`, the
/// profile cannot be resolved.
pub fn run(ctx: &CommandContext, command: &ProfileCommand, log: &Logger) -> Result<u8> {
    let loaded = ctx.load(log)?;
    match command {
        ProfileCommand::List => {
            let profiles = list(&loaded.document);
            if ctx.global.json {
                print_json(&profiles)?;
                return Ok(EXIT_SUCCESS);
            }
            for p in &profiles {
                let mut line = p.name.clone();
                if let Some(parent) = &p.extends {
                    line.push_str(&format!(" (extends {parent})"));
                }
                if let Some(description) = &p.description {
                    line.push_str(&format!(": {description}"));
                }
                log.info(&line);
            }
        }
        ProfileCommand::Show { name } => {
            let summary = ProfileSummary::of(&loaded.profile(name)?);
            if ctx.global.json {
                print_json(&summary)?;
                return Ok(EXIT_SUCCESS);
            }
            log.stage(&format!("Profile '{}'", summary.name));
            if let Some(description) = &summary.description {
                log.info(description);
            }
            for (label, count) in [
                ("taps", summary.taps),
                ("formulas", summary.formulas),
                ("casks", summary.casks),
                ("App Store apps", summary.app_store),
                ("manual apps", summary.manual),
                ("dotfiles", summary.dotfiles),
                ("preferences", summary.preferences),
            ] {
                log.info(&format!("  {label}: {count}"));
            }
        }
    }
    Ok(EXIT_SUCCESS)
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use super::*;
    use crate::config::profiles;
    use std::path::Path;

    const DOCUMENT: &str = r"
version: 1
profiles:
  base:
    description: Shared
    applications:
      homebrew:
        formulas: [git]
        casks: [slack]
  work:
    extends: base
    applications:
      homebrew:
        formulas: [node, jq]
    dotfiles:
      - path: .zshrc
";

    fn document() -> Configuration {
        Configuration::parse(DOCUMENT, Path::new("config.yaml")).unwrap()
    }

    #[test]
    fn list_is_sorted_and_unresolved() {
        let listing = list(&document());
        let names: Vec<_> = listing.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["base", "work"]);
        assert_eq!(listing[1].extends.as_deref(), Some("base"));
        assert!(listing[1].description.is_none());
    }

    #[test]
    fn show_counts_resolved_profile() {
        let profile = profiles::resolve(&document(), "work").unwrap();
        let summary = ProfileSummary::of(&profile);
        assert_eq!(
            summary,
            ProfileSummary {
                name: "work".to_string(),
                description: Some("Shared".to_string()),
                formulas: 2,
                casks: 1,
                dotfiles: 1,
                ..ProfileSummary::default()
            }
        );
    }
}

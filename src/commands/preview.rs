//! Command: show what `setup` would apply.
use anyhow::Result;
use serde::Serialize;

use super::{CommandContext, EXIT_SUCCESS, print_json};
use crate::cli::PreviewOpts;
use crate::config::ManualApp;
use crate::logging::Logger;
use crate::resources::Adapters;
use crate::setup::{ItemKind, Plan, PlanOptions, WorkItem};

/// One category of the preview.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PreviewSection {
    /// Category of every entry.
    pub kind: ItemKind,
    /// Entries in install order.
    pub entries: Vec<PreviewEntry>,
}

/// One item of the preview.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PreviewEntry {
    /// Work item identifier.
    pub id: String,
    /// Display text.
    pub label: String,
    /// Set with `--diff` for packages and apps.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub installed: Option<bool>,
}

/// The whole preview.
#[derive(Debug, Clone, Serialize)]
pub struct Preview {
    /// Resolved profile name.
    pub profile: String,
    /// Non-empty categories, in install order.
    pub sections: Vec<PreviewSection>,
    /// Apps to install by hand.
    pub manual_apps: Vec<ManualApp>,
    /// Entries left out of the plan.
    pub warnings: Vec<String>,
}

/// Kinds whose installed state `--diff` reports.
const fn is_diffable(kind: ItemKind) -> bool {
    matches!(
        kind,
        ItemKind::Tap | ItemKind::Formula | ItemKind::Cask | ItemKind::AppStoreApp
    )
}

fn label(item: &WorkItem) -> String {
    match item {
        WorkItem::Tap(name) | WorkItem::Formula(name) | WorkItem::Cask(name) => name.clone(),
        WorkItem::AppStoreApp(_) | WorkItem::Dotfile(_) | WorkItem::Preference(_) => {
            item.description()
        }
    }
}

/// Group `plan` by category. With `adapters`, packages and apps are marked
/// installed or not; an unavailable tool counts as nothing installed.
#[must_use]
pub fn build(profile: &str, plan: &Plan, adapters: Option<&Adapters>) -> Preview {
    let sections = ItemKind::ALL
        .into_iter()
        .filter_map(|kind| {
            let entries: Vec<PreviewEntry> = plan
                .of_kind(kind)
                .map(|item| PreviewEntry {
                    id: item.id(),
                    label: label(item),
                    installed: adapters.filter(|_| is_diffable(kind)).map(|a| {
                        let adapter = a.for_kind(kind);
                        adapter.is_available() && adapter.is_installed(item)
                    }),
                })
                .collect();
            (!entries.is_empty()).then_some(PreviewSection { kind, entries })
        })
        .collect();

    Preview {
        profile: profile.to_string(),
        sections,
        manual_apps: plan.manual.clone(),
        warnings: plan.warnings.clone(),
    }
}

/// Render `preview` as console lines.
#[must_use]
pub fn render(preview: &Preview) -> Vec<String> {
    let mut lines = Vec::new();
    for section in &preview.sections {
        lines.push(format!(
            "{} ({}):",
            section.kind.heading(),
            section.entries.len()
        ));
        for entry in &section.entries {
            lines.push(match entry.installed {
                None => format!("  - {}", entry.label),
                Some(false) => format!("  + {}", entry.label),
                Some(true) => format!("  = {} (installed)", entry.label),
            });
        }
    }
    if !preview.manual_apps.is_empty() {
        lines.push(format!("Manual ({}):", preview.manual_apps.len()));
        for app in &preview.manual_apps {
            lines.push(format!("  - {}", app.name));
        }
    }
    lines
}

/// Run the preview command.
///
/// # Errors
///
/// Returns an error if the document cannot be loaded or the profile cannot
/// be resolved.
pub fn run(ctx: &CommandContext, opts: &PreviewOpts, log: &Logger) -> Result<u8> {
    let loaded = ctx.load(log)?;
    let profile = loaded.profile(&ctx.global.profile)?;
    let plan = Plan::build(&profile, PlanOptions::default());
    let adapters = opts
        .diff
        .then(|| ctx.adapters(&loaded.config_dir.path));
    let preview = build(&profile.name, &plan, adapters.as_ref());

    if ctx.global.json {
        print_json(&preview)?;
        return Ok(EXIT_SUCCESS);
    }

    log.stage(&format!("Preview for profile '{}'", profile.name));
    for warning in &preview.warnings {
        log.warn(warning);
    }
    for line in render(&preview) {
        log.info(&line);
    }
    Ok(EXIT_SUCCESS)
}

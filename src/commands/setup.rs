//! Command: apply a profile.
use std::path::PathBuf;

use anyhow::Result;
use serde::Serialize;

use super::{
    CommandContext, EXIT_INTERRUPTED, EXIT_ITEMS_FAILED, EXIT_SUCCESS, LoadedDocument, print_json,
};
use crate::cli::SetupOpts;
use crate::config::{ManualApp, Profile};
use crate::logging::{ItemStatus, Logger};
use crate::platform::Platform;
use crate::setup::{
    self, CancellationToken, FileStateStore, Plan, RunResult, RunState, SetupContext,
    SetupOptions, StateStore,
};

/// JSON body for `setup --json`.
#[derive(Debug, Serialize)]
struct SetupReport<'a> {
    success: bool,
    profile: &'a str,
    config_dir: &'a PathBuf,
    #[serde(flatten)]
    result: &'a RunResult,
}

/// JSON body for `setup --dry-run --json`.
#[derive(Debug, Serialize)]
struct DryRunReport<'a> {
    success: bool,
    dry_run: bool,
    profile: &'a str,
    items: Vec<String>,
    manual_apps: &'a [ManualApp],
    warnings: &'a [String],
}

/// Run the setup command.
///
/// # Errors
///
/// Returns an error if the document cannot be loaded, the profile cannot be
/// resolved, or a saved run state to resume from is corrupt. Item failures
/// are not errors; they are reported and reflected in the exit code.
pub fn run(
    ctx: &CommandContext,
    opts: &SetupOpts,
    token: &CancellationToken,
    log: &Logger,
) -> Result<u8> {
    log.info(&format!("macsetup {}", crate::logging::version()));

    log.stage("Loading configuration");
    let loaded = ctx.load(log)?;
    let profile = loaded.profile(&ctx.global.profile)?;
    log.info(&format!(
        "profile '{}' from {}",
        profile.name,
        loaded.config_dir.path.display()
    ));
    let platform = Platform::detect(&*ctx.executor);
    for warning in platform.compatibility_warnings(loaded.document.metadata.as_ref()) {
        log.warn(&warning);
    }

    let options = SetupOptions {
        force: opts.force,
        skip_dotfiles: opts.no_dotfiles,
        skip_preferences: opts.no_preferences,
    };

    if opts.dry_run {
        return dry_run(ctx, &profile, options, log);
    }

    let store = FileStateStore::in_dir(&loaded.config_dir.path);
    let mut state = initial_state(&store, opts.resume, &profile.name, log)?;
    log.debug(&format!("run state: {}", store.path().display()));

    let adapters = ctx.adapters(&loaded.config_dir.path);
    let setup_ctx = SetupContext {
        adapters: &adapters,
        store: &store,
        token,
        log,
    };
    let result = setup::run(&profile, &setup_ctx, &mut state, options);

    report(ctx, &loaded, &profile, &result, log)?;
    Ok(exit_code(&result))
}

/// The state to run with: a fresh one, or the saved one when resuming.
///
/// A saved state for another profile is ignored. A state that cannot be
/// read is an error; starting over silently would redo completed work.
fn initial_state(
    store: &dyn StateStore,
    resume: bool,
    profile: &str,
    log: &Logger,
) -> Result<RunState> {
    if !resume {
        return Ok(RunState::new(profile));
    }
    match store.load()? {
        Some(mut state) if state.profile == profile => {
            log.info(&format!(
                "resuming run started {}: {} items already completed",
                state.started_at.to_rfc3339(),
                state.completed_items.len()
            ));
            state.begin_resume();
            Ok(state)
        }
        Some(state) => {
            log.warn(&format!(
                "saved run is for profile '{}', not '{profile}'; starting over",
                state.profile
            ));
            Ok(RunState::new(profile))
        }
        None => {
            log.info("no interrupted run to resume; starting a new run");
            Ok(RunState::new(profile))
        }
    }
}

fn dry_run(
    ctx: &CommandContext,
    profile: &Profile,
    options: SetupOptions,
    log: &Logger,
) -> Result<u8> {
    let plan = Plan::build(profile, options.plan_options());
    if ctx.global.json {
        print_json(&DryRunReport {
            success: true,
            dry_run: true,
            profile: &profile.name,
            items: plan.items.iter().map(setup::WorkItem::id).collect(),
            manual_apps: &plan.manual,
            warnings: &plan.warnings,
        })?;
        return Ok(EXIT_SUCCESS);
    }

    log.stage(&format!("Dry run: profile '{}'", profile.name));
    for warning in &plan.warnings {
        log.warn(warning);
    }
    for item in &plan.items {
        log.dry_run(&format!("would apply {}", item.description()));
        log.record_item(&item.id(), ItemStatus::DryRun, None);
    }
    log.print_summary();
    print_manual_steps(&plan.manual, log);
    Ok(EXIT_SUCCESS)
}

fn report(
    ctx: &CommandContext,
    loaded: &LoadedDocument,
    profile: &Profile,
    result: &RunResult,
    log: &Logger,
) -> Result<()> {
    if ctx.global.json {
        return print_json(&SetupReport {
            success: result.is_success(),
            profile: &profile.name,
            config_dir: &loaded.config_dir.path,
            result,
        });
    }

    log.print_summary();
    for failure in &result.failed_items {
        if let Some(hint) = &failure.remediation {
            log.info(&format!("  {}:{}: {hint}", failure.kind, failure.identifier));
        }
    }
    print_manual_steps(&result.manual_apps, log);

    if result.interrupted {
        log.warn("setup was interrupted; run 'macsetup setup --resume' to continue");
    } else if result.failed_count > 0 {
        log.warn(&format!(
            "setup finished with {} failure(s); fix them and run 'macsetup setup --resume' to retry",
            result.failed_count
        ));
    } else {
        log.info("setup complete");
    }
    Ok(())
}

fn print_manual_steps(manual: &[ManualApp], log: &Logger) {
    if manual.is_empty() {
        return;
    }
    log.stage("Manual steps required");
    for app in manual {
        match &app.url {
            Some(url) => log.info(&format!("  - {}: {url}", app.name)),
            None => log.info(&format!("  - {}", app.name)),
        }
        if let Some(instructions) = &app.instructions {
            log.info(&format!("    {instructions}"));
        }
    }
}

/// Exit code for a finished run.
#[must_use]
pub const fn exit_code(result: &RunResult) -> u8 {
    if result.interrupted {
        EXIT_INTERRUPTED
    } else if result.failed_count > 0 {
        EXIT_ITEMS_FAILED
    } else {
        EXIT_SUCCESS
    }
}

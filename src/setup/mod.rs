//! The setup executor: applies a resolved profile item by item.
//!
//! A run walks the [`Plan`] in category order. Each item is skipped when an
//! earlier run already completed it, or (unless forced) when its adapter
//! reports it installed. Failures are recorded and the run moves on. The
//! [`CancellationToken`] is checked before every item, and the run state is
//! persisted after every outcome so an interrupted or killed run can be
//! resumed.
pub mod cancel;
pub mod items;
pub mod state;

pub use cancel::CancellationToken;
pub use items::{ItemKind, Plan, PlanOptions, PreferenceWrite, WorkItem};
pub use state::{FailedItem, FailureKind, FileStateStore, RunState, RunStatus, StateStore};

use std::collections::HashMap;
use std::panic::{self, AssertUnwindSafe};

use chrono::Utc;
use serde::Serialize;

use crate::config::{ManualApp, Profile};
use crate::error::{ItemInstallError, RunFatalError};
use crate::logging::{ItemStatus, Log};
use crate::resources::{Adapters, ResourceChange, ResourceError};

/// Flags for a setup run.
#[derive(Debug, Clone, Copy, Default)]
pub struct SetupOptions {
    /// Apply items even when the adapter reports them installed.
    /// Items completed by an earlier run are still skipped.
    pub force: bool,
    /// Leave dotfiles out of the plan.
    pub skip_dotfiles: bool,
    /// Leave preferences out of the plan.
    pub skip_preferences: bool,
}

impl SetupOptions {
    /// The plan filters these flags imply.
    #[must_use]
    pub const fn plan_options(self) -> PlanOptions {
        PlanOptions {
            skip_dotfiles: self.skip_dotfiles,
            skip_preferences: self.skip_preferences,
        }
    }
}

/// Collaborators a run needs.
pub struct SetupContext<'a> {
    /// Per-kind handlers.
    pub adapters: &'a Adapters,
    /// Where progress is saved after every item.
    pub store: &'a dyn StateStore,
    /// Checked before each item.
    pub token: &'a CancellationToken,
    /// Progress output.
    pub log: &'a dyn Log,
}

impl std::fmt::Debug for SetupContext<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SetupContext")
            .field("adapters", self.adapters)
            .field("store", &"<dyn StateStore>")
            .field("token", self.token)
            .field("log", &"<dyn Log>")
            .finish()
    }
}

/// What a run did.
#[derive(Debug, Clone, Default, Serialize)]
pub struct RunResult {
    /// Items applied during this run.
    pub completed_count: usize,
    /// Items that failed during this run.
    pub failed_count: usize,
    /// Items skipped as already completed or already installed.
    pub skipped_count: usize,
    /// Identifiers applied during this run, in order.
    pub completed: Vec<String>,
    /// Failures of this run, in order.
    pub failed_items: Vec<FailedItem>,
    /// Apps to install by hand. Never executed.
    pub manual_apps: Vec<ManualApp>,
    /// Plan entries that could not be turned into work items.
    pub warnings: Vec<String>,
    /// The run stopped early on cancellation.
    pub interrupted: bool,
}

impl RunResult {
    /// Whether the run finished with nothing failed.
    #[must_use]
    pub const fn is_success(&self) -> bool {
        !self.interrupted && self.failed_count == 0
    }
}

/// Apply `profile`.
///
/// `state` is the fresh or resumed run record; it is updated in place and
/// persisted through `ctx.store`. Never fails: per-item errors and
/// unexpected failures both end up in [`RunResult::failed_items`].
pub fn run(
    profile: &Profile,
    ctx: &SetupContext<'_>,
    state: &mut RunState,
    options: SetupOptions,
) -> RunResult {
    let plan = Plan::build(profile, options.plan_options());
    execute(&plan, ctx, state, options.force)
}

/// Apply an already built plan.
pub fn execute(
    plan: &Plan,
    ctx: &SetupContext<'_>,
    state: &mut RunState,
    force: bool,
) -> RunResult {
    let mut result = RunResult {
        manual_apps: plan.manual.clone(),
        warnings: plan.warnings.clone(),
        ..RunResult::default()
    };
    for warning in &plan.warnings {
        ctx.log.warn(warning);
    }
    state.status = RunStatus::InProgress;

    let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
        apply_items(plan, ctx, state, force, &mut result)
    }));
    let fatal = match outcome {
        Ok(Ok(())) => None,
        Ok(Err(err)) => Some(err),
        Err(payload) => Some(RunFatalError::Panicked(panic_message(payload.as_ref()))),
    };
    if let Some(err) = fatal {
        ctx.log.error(&err.to_string());
        let failure = FailedItem::general(err.to_string());
        state.mark_failed(failure.clone());
        result.failed_items.push(failure);
    }

    finish(ctx, state, &mut result);
    result.failed_count = result.failed_items.len();
    result
}

fn apply_items(
    plan: &Plan,
    ctx: &SetupContext<'_>,
    state: &mut RunState,
    force: bool,
    result: &mut RunResult,
) -> Result<(), RunFatalError> {
    let total = plan.items.len();
    let mut available: HashMap<&'static str, bool> = HashMap::new();
    let mut current_kind = None;

    for (index, item) in plan.items.iter().enumerate() {
        if ctx.token.is_cancelled() {
            result.interrupted = true;
            ctx.log
                .warn("setup interrupted; run 'macsetup setup --resume' to continue");
            break;
        }

        let kind = item.kind();
        if current_kind != Some(kind) {
            ctx.log.stage(kind.heading());
            current_kind = Some(kind);
        }

        let id = item.id();
        let label = format!("[{}/{total}] {}", index + 1, item.description());

        if state.is_completed(&id) {
            ctx.log.debug(&format!("{label}: completed by an earlier run"));
            ctx.log.record_item(&id, ItemStatus::Skipped, None);
            result.skipped_count += 1;
            continue;
        }

        let adapter = ctx.adapters.for_kind(kind);
        let tool_present = *available
            .entry(adapter.name())
            .or_insert_with(|| adapter.is_available());
        if !tool_present {
            let err = ItemInstallError {
                kind,
                identifier: item.key(),
                source: ResourceError::ToolUnavailable {
                    tool: adapter.name(),
                    remediation: adapter.install_hint(),
                },
            };
            record_failure(ctx, state, result, &label, &id, &err)?;
            continue;
        }

        if !force && adapter.is_installed(item) {
            ctx.log.info(&format!("{label}: already installed"));
            ctx.log.record_item(&id, ItemStatus::AlreadyInstalled, None);
            result.skipped_count += 1;
            continue;
        }

        ctx.log.info(&label);
        match adapter.apply(item) {
            Ok(change) => {
                let status = match change {
                    ResourceChange::Applied => ItemStatus::Applied,
                    ResourceChange::AlreadyCorrect => ItemStatus::AlreadyInstalled,
                };
                state.mark_completed(&id);
                ctx.log.record_item(&id, status, None);
                result.completed.push(id);
                result.completed_count += 1;
                ctx.store.save(state)?;
            }
            Err(source) => {
                let err = ItemInstallError {
                    kind,
                    identifier: item.key(),
                    source,
                };
                record_failure(ctx, state, result, &label, &id, &err)?;
            }
        }
    }
    Ok(())
}

fn record_failure(
    ctx: &SetupContext<'_>,
    state: &mut RunState,
    result: &mut RunResult,
    label: &str,
    id: &str,
    err: &ItemInstallError,
) -> Result<(), RunFatalError> {
    let failure = FailedItem {
        kind: err.kind.into(),
        identifier: err.identifier.clone(),
        error: err.source.to_string(),
        remediation: err.source.remediation(),
        timestamp: Utc::now(),
    };
    ctx.log.error(&format!("{label}: {}", failure.error));
    if let Some(hint) = &failure.remediation {
        ctx.log.info(&format!("hint: {hint}"));
    }
    ctx.log
        .record_item(id, ItemStatus::Failed, Some(&failure.error));
    state.mark_failed(failure.clone());
    result.failed_items.push(failure);
    ctx.store.save(state)?;
    Ok(())
}

/// Persist or clear the state for the terminal status.
fn finish(ctx: &SetupContext<'_>, state: &mut RunState, result: &mut RunResult) {
    let persisted = if result.interrupted {
        state.status = RunStatus::InProgress;
        ctx.store.save(state)
    } else {
        state.finish();
        if state.failed_items.is_empty() {
            ctx.store.clear()
        } else {
            ctx.store.save(state)
        }
    };
    if let Err(e) = persisted {
        let err = RunFatalError::from(e);
        ctx.log.error(&err.to_string());
        if !result
            .failed_items
            .iter()
            .any(|f| f.kind == FailureKind::Setup)
        {
            result.failed_items.push(FailedItem::general(err.to_string()));
        }
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    payload
        .downcast_ref::<&str>()
        .map(ToString::to_string)
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "adapter panicked".to_string())
}

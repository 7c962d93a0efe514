//! Command: choose where the configuration is stored.
use anyhow::Result;
use serde::Serialize;

use super::{CommandContext, EXIT_SUCCESS, print_json};
use crate::cli::InitOpts;
use crate::logging::Logger;
use crate::storage::StorageKind;
use crate::storage::migrate::{MigrationReport, RevertReport, StorageStatus};

/// JSON wrapper adding `success: true` to a report.
#[derive(Debug, Serialize)]
struct Success<'a, T: Serialize> {
    success: bool,
    #[serde(flatten)]
    report: &'a T,
}

fn print_success<T: Serialize>(report: &T) -> Result<()> {
    print_json(&Success {
        success: true,
        report,
    })
}

/// Run the init command.
///
/// # Errors
///
/// Returns the [`MigrationError`](crate::error::MigrationError) or
/// [`LocationError`](crate::error::LocationError) that stopped the
/// operation.
pub fn run(ctx: &CommandContext, opts: &InitOpts, log: &Logger) -> Result<u8> {
    let migrator = ctx.migrator();
    if opts.remote {
        log.stage("Switching to iCloud storage");
        let report = migrator.init_remote(opts.force, log)?;
        if ctx.global.json {
            print_success(&report)?;
        } else {
            describe_migration(&report, log);
        }
    } else if opts.local {
        log.stage("Switching to local storage");
        let report = migrator.init_local(log)?;
        if ctx.global.json {
            print_success(&report)?;
        } else {
            describe_revert(&report, log);
        }
    } else {
        let status = migrator.status()?;
        if ctx.global.json {
            print_success(&status)?;
        } else {
            describe_status(&status, log);
        }
    }
    Ok(EXIT_SUCCESS)
}

fn describe_migration(report: &MigrationReport, log: &Logger) {
    if report.migrated {
        log.info(&format!(
            "moved {} files to {}",
            report.files_moved,
            report.config_dir.display()
        ));
    } else if report.existing_remote {
        log.info(&format!(
            "using the existing configuration in {}",
            report.config_dir.display()
        ));
    } else {
        log.info(&format!(
            "configuration will be stored in {}",
            report.config_dir.display()
        ));
    }
}

fn describe_revert(report: &RevertReport, log: &Logger) {
    log.info(&format!(
        "copied {} files to {}",
        report.files_copied,
        report.config_dir.display()
    ));
    log.info(&format!(
        "the iCloud copy in {} was left in place",
        report.remote_dir.display()
    ));
}

fn describe_status(status: &StorageStatus, log: &Logger) {
    log.info(&format!("storage: {}", status.storage));
    log.info(&format!("config directory: {}", status.config_dir.display()));
    if let Some(pointer) = &status.pointer_file {
        log.info(&format!("pointer file: {}", pointer.display()));
    }
    if status.storage == StorageKind::Local {
        log.info(&format!(
            "iCloud Drive: {}",
            if status.remote_available {
                "available"
            } else {
                "not available"
            }
        ));
    }
    for warning in &status.warnings {
        log.warn(warning);
    }
}

//! `macsetup` command-line entry point.

use std::process::ExitCode;

use clap::Parser;

use macsetup_cli::cli::Cli;
use macsetup_cli::commands;
use macsetup_cli::logging::{self, Logger};

fn main() -> ExitCode {
    let _ = enable_ansi_support::enable_ansi_support();
    let args = Cli::parse();
    let command = args.command.name();
    logging::init_subscriber(args.verbose, args.global.json, command);
    let log = Logger::new(command);

    let code = match commands::dispatch(&args, &log) {
        Ok(code) => code,
        Err(err) => commands::report_error(&err, args.global.json, &log),
    };
    ExitCode::from(code)
}

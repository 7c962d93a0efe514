//! Command: print version information.
use anyhow::Result;
use serde::Serialize;

use super::{EXIT_SUCCESS, print_json};
use crate::logging::version;

#[derive(Debug, Serialize)]
struct VersionInfo {
    name: &'static str,
    version: &'static str,
}

/// Print the macsetup version to stdout.
///
/// # Errors
///
/// Returns an error if JSON output cannot be produced.
#[allow(clippy::print_stdout)]
pub fn run(json: bool) -> Result<u8> {
    if json {
        print_json(&VersionInfo {
            name: "macsetup",
            version: version(),
        })?;
    } else {
        println!("macsetup {}", version());
    }
    Ok(EXIT_SUCCESS)
}

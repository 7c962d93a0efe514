//! Build script that embeds the release version into the binary.

use std::process::Command;

fn main() {
    // Release workflows pin MACSETUP_VERSION; local builds fall back to git describe.
    if let Ok(version) = std::env::var("MACSETUP_VERSION") {
        println!("cargo:rustc-env=MACSETUP_VERSION={version}");
    } else if let Ok(output) = Command::new("git")
        .args(["describe", "--tags", "--always", "--dirty"])
        .output()
        && output.status.success()
    {
        let version = String::from_utf8_lossy(&output.stdout).trim().to_string();
        if !version.is_empty() {
            println!("cargo:rustc-env=MACSETUP_VERSION={version}");
        }
    }

    println!("cargo:rerun-if-changed=.git/HEAD");
    println!("cargo:rerun-if-changed=.git/refs/");
    println!("cargo:rerun-if-env-changed=MACSETUP_VERSION");
}

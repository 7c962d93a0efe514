//! Host platform detection and compatibility warnings.
use std::fmt;

use crate::config::Metadata;
use crate::exec::Executor;

/// Detected operating system.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Os {
    /// macOS.
    MacOs,
    /// Anything else; setup still runs but warns.
    Other,
}

impl fmt::Display for Os {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MacOs => write!(f, "macos"),
            Self::Other => write!(f, "other"),
        }
    }
}

/// Platform information for the current system.
#[derive(Debug, Clone)]
pub struct Platform {
    /// Operating system family.
    pub os: Os,
    /// `sw_vers -productVersion`, when it could be read.
    pub os_version: Option<String>,
}

impl Platform {
    /// Detect the current platform, asking `sw_vers` for the OS version.
    #[must_use]
    pub fn detect(executor: &dyn Executor) -> Self {
        let os = if cfg!(target_os = "macos") {
            Os::MacOs
        } else {
            Os::Other
        };
        let os_version = (os == Os::MacOs)
            .then(|| executor.run("sw_vers", &["-productVersion"]).ok())
            .flatten()
            .map(|r| r.stdout.trim().to_string())
            .filter(|v| !v.is_empty());
        Self { os, os_version }
    }

    /// Create a platform with explicit values (for testing).
    #[cfg(test)]
    pub fn new(os: Os, os_version: Option<&str>) -> Self {
        Self {
            os,
            os_version: os_version.map(str::to_string),
        }
    }

    /// Whether this is macOS.
    #[must_use]
    pub fn is_macos(&self) -> bool {
        self.os == Os::MacOs
    }

    /// Warnings about running a document on this machine.
    ///
    /// Never blocks a run: the tools may still work off macOS, and most
    /// settings survive a major version change.
    #[must_use]
    pub fn compatibility_warnings(&self, metadata: Option<&Metadata>) -> Vec<String> {
        let mut warnings = Vec::new();
        if !self.is_macos() {
            warnings.push(format!(
                "running on {}; macsetup targets macOS and most items will fail",
                self.os
            ));
        }
        let captured = metadata.and_then(|m| m.os_version.as_deref());
        if let (Some(captured), Some(current)) = (captured, self.os_version.as_deref())
            && let (Some(captured_major), Some(current_major)) =
                (major_version(captured), major_version(current))
            && captured_major > current_major
        {
            warnings.push(format!(
                "configuration was captured on macOS {captured}, newer than this machine's {current}; some preferences may not apply"
            ));
        }
        warnings
    }
}

/// Leading numeric component of a dotted version (`"14.2.1"` -> 14).
fn major_version(version: &str) -> Option<u32> {
    version.trim().split('.').next()?.parse().ok()
}

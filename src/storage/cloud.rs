//! iCloud Drive: location, availability, and sync hazards.
//!
//! iCloud Drive is a plain directory, so it has no adapter; the hazards are
//! files that are still cloud-only and conflict copies left by concurrent
//! edits on two machines.
use std::fs::Metadata;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use regex::Regex;

use crate::config::DOCUMENT_FILE;
use crate::operations::FileSystemOps;

/// iCloud Drive relative to the home directory.
pub const ICLOUD_DRIVE: &str = "Library/Mobile Documents/com~apple~CloudDocs";

/// Subdirectory of the drive holding the configuration.
pub const REMOTE_SUBDIR: &str = "macsetup";

/// `SF_DATALESS`: the file's contents have been evicted from local storage.
pub const SF_DATALESS: u32 = 0x4000_0000;

/// `"<base> <N>.<ext>"`, the name iCloud gives conflict copies.
static CONFLICT_COPY: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"^(.+)\s+(\d+)(\.\w+)$").ok());

/// The iCloud Drive folder on this machine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ICloudDrive {
    root: PathBuf,
}

impl ICloudDrive {
    /// The standard location under `home`.
    #[must_use]
    pub fn under_home(home: &Path) -> Self {
        Self::at(home.join(ICLOUD_DRIVE))
    }

    /// A drive rooted at `root`.
    #[must_use]
    pub const fn at(root: PathBuf) -> Self {
        Self { root }
    }

    /// The drive folder.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Whether iCloud Drive is enabled (its folder exists).
    #[must_use]
    pub fn is_available(&self, fs: &dyn FileSystemOps) -> bool {
        fs.is_dir(&self.root)
    }

    /// Where the configuration lives on the drive.
    #[must_use]
    pub fn config_dir(&self) -> PathBuf {
        self.root.join(REMOTE_SUBDIR)
    }
}

/// Whether `meta` describes a file whose contents are cloud-only.
///
/// Checks the `SF_DATALESS` flag first, then falls back to a zero block
/// count on a non-empty file.
#[must_use]
pub fn metadata_is_evicted(meta: &Metadata) -> bool {
    is_dataless(meta) || has_no_blocks(meta)
}

#[cfg(target_os = "macos")]
fn is_dataless(meta: &Metadata) -> bool {
    use std::os::macos::fs::MetadataExt as _;
    meta.st_flags() & SF_DATALESS != 0
}

#[cfg(not(target_os = "macos"))]
const fn is_dataless(_: &Metadata) -> bool {
    false
}

#[cfg(unix)]
fn has_no_blocks(meta: &Metadata) -> bool {
    use std::os::unix::fs::MetadataExt as _;
    meta.blocks() == 0 && meta.size() > 0
}

#[cfg(not(unix))]
const fn has_no_blocks(_: &Metadata) -> bool {
    false
}

/// The `.<name>.icloud` placeholder Finder leaves for a file that has not
/// been downloaded yet.
#[must_use]
pub fn placeholder_path(path: &Path) -> Option<PathBuf> {
    let name = path.file_name()?.to_str()?;
    Some(path.with_file_name(format!(".{name}.icloud")))
}

/// Whether the document in `dir` is present but not downloaded.
#[must_use]
pub fn document_not_downloaded(fs: &dyn FileSystemOps, dir: &Path) -> bool {
    let document = dir.join(DOCUMENT_FILE);
    if fs.exists(&document) {
        return fs.is_evicted(&document);
    }
    placeholder_path(&document).is_some_and(|stub| fs.exists(&stub))
}

/// Conflict copies in `dir` (`config 2.yaml`, `config 3.yaml`, ...), sorted.
///
/// An unreadable directory has none.
#[must_use]
pub fn find_conflict_copies(fs: &dyn FileSystemOps, dir: &Path) -> Vec<PathBuf> {
    let Some(pattern) = CONFLICT_COPY.as_ref() else {
        return Vec::new();
    };
    let Ok(entries) = fs.read_dir(dir) else {
        return Vec::new();
    };
    let mut copies: Vec<PathBuf> = entries
        .into_iter()
        .filter(|path| fs.is_file(path))
        .filter(|path| {
            path.file_name()
                .and_then(|name| name.to_str())
                .and_then(|name| pattern.captures(name))
                .and_then(|caps| caps.get(2))
                .and_then(|n| n.as_str().parse::<u64>().ok())
                .is_some_and(|n| n >= 2)
        })
        .collect();
    copies.sort();
    copies
}

/// Human-readable warnings about sync hazards in `dir`.
#[must_use]
pub fn document_warnings(fs: &dyn FileSystemOps, dir: &Path) -> Vec<String> {
    let mut warnings = Vec::new();
    if document_not_downloaded(fs, dir) {
        warnings.push(format!(
            "{DOCUMENT_FILE} in {} has not been downloaded from iCloud yet; open the folder in Finder to download it",
            dir.display()
        ));
    }
    for copy in find_conflict_copies(fs, dir) {
        warnings.push(format!(
            "iCloud conflict copy found: {}; merge it into {DOCUMENT_FILE} and delete it",
            copy.display()
        ));
    }
    warnings
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use super::*;
    use crate::operations::{FaultyFileSystemOps, SystemFileSystemOps};
    use tempfile::TempDir;

    #[test]
    fn drive_layout() {
        let drive = ICloudDrive::under_home(Path::new("/Users/me"));
        assert_eq!(
            drive.config_dir(),
            PathBuf::from("/Users/me/Library/Mobile Documents/com~apple~CloudDocs/macsetup")
        );
        assert!(!drive.is_available(&SystemFileSystemOps));
    }

    #[test]
    fn conflict_copies_need_a_number_of_at_least_two() {
        let tmp = TempDir::new().unwrap();
        for name in [
            "config.yaml",
            "config 2.yaml",
            "config 10.yaml",
            "config 1.yaml",
            "notes 3.txt",
            "config2.yaml",
        ] {
            std::fs::write(tmp.path().join(name), "").unwrap();
        }
        std::fs::create_dir(tmp.path().join("dir 4.d")).unwrap();

        let names: Vec<String> = find_conflict_copies(&SystemFileSystemOps, tmp.path())
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["config 10.yaml", "config 2.yaml", "notes 3.txt"]);
    }

    #[test]
    fn placeholder_stub_means_not_downloaded() {
        let tmp = TempDir::new().unwrap();
        assert!(!document_not_downloaded(&SystemFileSystemOps, tmp.path()));
        std::fs::write(tmp.path().join(".config.yaml.icloud"), "").unwrap();
        assert!(document_not_downloaded(&SystemFileSystemOps, tmp.path()));
    }

    #[test]
    fn regular_document_is_downloaded() {
        let tmp = TempDir::new().unwrap();
        std::fs::write(tmp.path().join("config.yaml"), "version: 1\n").unwrap();
        assert!(!SystemFileSystemOps.is_evicted(&tmp.path().join("config.yaml")));
        assert!(document_warnings(&SystemFileSystemOps, tmp.path()).is_empty());
    }

    #[test]
    fn warnings_name_conflict_copies() {
        let tmp = TempDir::new().unwrap();
        std::fs::write(tmp.path().join("config.yaml"), "version: 1\n").unwrap();
        std::fs::write(tmp.path().join("config 2.yaml"), "version: 1\n").unwrap();
        let warnings = document_warnings(&SystemFileSystemOps, tmp.path());
        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].contains("config 2.yaml"));
    }

    #[test]
    fn evicted_document_is_reported() {
        let tmp = TempDir::new().unwrap();
        let document = tmp.path().join("config.yaml");
        std::fs::write(&document, "version: 1\n").unwrap();
        let fs = FaultyFileSystemOps::new().with_evicted(&document);

        assert!(document_not_downloaded(&fs, tmp.path()));
        let warnings = document_warnings(&fs, tmp.path());
        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].contains("not been downloaded"));
    }

    #[test]
    fn unreadable_directory_has_no_conflict_copies() {
        let tmp = TempDir::new().unwrap();
        std::fs::write(tmp.path().join("config 2.yaml"), "").unwrap();
        let fs = FaultyFileSystemOps::new().with_failing_read_dir(tmp.path());

        assert!(find_conflict_copies(&fs, tmp.path()).is_empty());
        assert_eq!(find_conflict_copies(&SystemFileSystemOps, tmp.path()).len(), 1);
    }

    #[test]
    fn placeholder_path_prefixes_dot() {
        assert_eq!(
            placeholder_path(Path::new("/d/config.yaml")),
            Some(PathBuf::from("/d/.config.yaml.icloud"))
        );
    }
}

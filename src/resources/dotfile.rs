//! Dotfile links and copies.
use std::path::{Path, PathBuf};

use super::helpers::fs::{backup_existing, ensure_parent_dir, remove_existing, same_contents};
use super::{Adapter, ResourceChange, ResourceError, ResourceState};
use crate::config::{Dotfile, DotfileMode};
use crate::setup::WorkItem;

/// Installs dotfiles from the config directory's payload folder into the
/// home directory.
#[derive(Debug, Clone)]
pub struct DotfileAdapter {
    /// Payload root (`<config_dir>/dotfiles`).
    source_root: PathBuf,
    /// Home directory the relative paths are installed under.
    home: PathBuf,
}

impl DotfileAdapter {
    /// Adapter reading payloads from `source_root` and installing them under
    /// `home`.
    #[must_use]
    pub const fn new(source_root: PathBuf, home: PathBuf) -> Self {
        Self { source_root, home }
    }

    /// Where the payload for `dotfile` lives.
    #[must_use]
    pub fn source(&self, dotfile: &Dotfile) -> PathBuf {
        self.source_root.join(&dotfile.path)
    }

    /// Where `dotfile` is installed.
    #[must_use]
    pub fn target(&self, dotfile: &Dotfile) -> PathBuf {
        self.home.join(&dotfile.path)
    }

    /// Check the installed state of `dotfile`.
    #[must_use]
    pub fn current_state(&self, dotfile: &Dotfile) -> ResourceState {
        if let Some(reason) = dotfile.path_problem() {
            return ResourceState::Invalid { reason };
        }
        let source = self.source(dotfile);
        let target = self.target(dotfile);

        if !source.exists() {
            return ResourceState::Invalid {
                reason: format!("source does not exist: {}", source.display()),
            };
        }

        // A real directory at the target is never replaced.
        if is_real_dir(&target) {
            return ResourceState::Invalid {
                reason: format!("{} is a directory", target.display()),
            };
        }

        match dotfile.mode {
            DotfileMode::Symlink => std::fs::read_link(&target).map_or_else(
                |_| {
                    if target.exists() {
                        ResourceState::Incorrect {
                            current: "target is a regular file".to_string(),
                        }
                    } else {
                        ResourceState::Missing
                    }
                },
                |existing| {
                    if existing == source {
                        ResourceState::Correct
                    } else {
                        ResourceState::Incorrect {
                            current: format!("points to {}", existing.display()),
                        }
                    }
                },
            ),
            DotfileMode::Copy => {
                if source.is_dir() {
                    ResourceState::Invalid {
                        reason: "copy mode supports files only; use symlink for directories"
                            .to_string(),
                    }
                } else if is_symlink(&target) {
                    ResourceState::Incorrect {
                        current: "target is a symlink".to_string(),
                    }
                } else if !target.exists() {
                    ResourceState::Missing
                } else if same_contents(&source, &target) {
                    ResourceState::Correct
                } else {
                    ResourceState::Incorrect {
                        current: "contents differ".to_string(),
                    }
                }
            }
        }
    }

    fn install(&self, dotfile: &Dotfile) -> Result<ResourceChange, ResourceError> {
        if let Some(reason) = dotfile.path_problem() {
            return Err(ResourceError::InvalidState {
                resource: dotfile.path.clone(),
                reason,
            });
        }
        let source = self.source(dotfile);
        let target = self.target(dotfile);

        match self.current_state(dotfile) {
            ResourceState::Correct => return Ok(ResourceChange::AlreadyCorrect),
            ResourceState::Invalid { .. } if !source.exists() => {
                return Err(ResourceError::SourceMissing {
                    path: source.display().to_string(),
                });
            }
            ResourceState::Invalid { reason } => {
                return Err(ResourceError::InvalidState {
                    resource: target.display().to_string(),
                    reason,
                });
            }
            ResourceState::Missing | ResourceState::Incorrect { .. } => {}
        }

        ensure_parent_dir(&target)?;
        if backup_existing(&target)?.is_none() {
            remove_existing(&target)?;
        }

        match dotfile.mode {
            DotfileMode::Symlink => std::os::unix::fs::symlink(&source, &target).map_err(|e| {
                ResourceError::Io {
                    action: "create symlink",
                    path: target.display().to_string(),
                    source: e,
                }
            })?,
            DotfileMode::Copy => {
                std::fs::copy(&source, &target).map_err(|e| ResourceError::Io {
                    action: "copy to",
                    path: target.display().to_string(),
                    source: e,
                })?;
            }
        }
        Ok(ResourceChange::Applied)
    }
}

fn is_symlink(path: &Path) -> bool {
    path.symlink_metadata().is_ok_and(|m| m.is_symlink())
}

fn is_real_dir(path: &Path) -> bool {
    path.symlink_metadata().is_ok_and(|m| m.is_dir())
}

impl Adapter for DotfileAdapter {
    fn name(&self) -> &'static str {
        "dotfiles"
    }

    fn is_available(&self) -> bool {
        true
    }

    fn install_hint(&self) -> &'static str {
        ""
    }

    fn is_installed(&self, item: &WorkItem) -> bool {
        match item {
            WorkItem::Dotfile(dotfile) => self.current_state(dotfile) == ResourceState::Correct,
            _ => false,
        }
    }

    fn apply(&self, item: &WorkItem) -> Result<ResourceChange, ResourceError> {
        match item {
            WorkItem::Dotfile(dotfile) => self.install(dotfile),
            _ => Err(ResourceError::UnsupportedItem {
                adapter: "dotfiles",
                item: item.id(),
            }),
        }
    }
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    struct Fixture {
        dir: TempDir,
        adapter: DotfileAdapter,
        payload: PathBuf,
        home: PathBuf,
    }

    fn fixture() -> Fixture {
        let dir = TempDir::new().unwrap();
        let payload = dir.path().join("config/dotfiles");
        let home = dir.path().join("home");
        std::fs::create_dir_all(&payload).unwrap();
        std::fs::create_dir_all(&home).unwrap();
        Fixture {
            adapter: DotfileAdapter::new(payload.clone(), home.clone()),
            dir,
            payload,
            home,
        }
    }

    fn dotfile(path: &str, mode: DotfileMode) -> Dotfile {
        Dotfile {
            path: path.to_string(),
            mode,
            template: false,
        }
    }

    // -----------------------------------------------------------------------
    // symlink mode
    // -----------------------------------------------------------------------

    #[test]
    fn symlink_created_with_parent_dirs() {
        let f = fixture();
        std::fs::create_dir_all(f.payload.join(".config/git")).unwrap();
        std::fs::write(f.payload.join(".config/git/config"), "[user]").unwrap();
        let item = dotfile(".config/git/config", DotfileMode::Symlink);

        assert_eq!(f.adapter.current_state(&item), ResourceState::Missing);
        assert_eq!(f.adapter.install(&item).unwrap(), ResourceChange::Applied);
        let link = std::fs::read_link(f.home.join(".config/git/config")).unwrap();
        assert_eq!(link, f.payload.join(".config/git/config"));
        assert!(f.adapter.is_installed(&WorkItem::Dotfile(item.clone())));
        assert_eq!(
            f.adapter.install(&item).unwrap(),
            ResourceChange::AlreadyCorrect
        );
    }

    #[test]
    fn existing_file_is_backed_up() {
        let f = fixture();
        std::fs::write(f.payload.join(".zshrc"), "new").unwrap();
        std::fs::write(f.home.join(".zshrc"), "old").unwrap();
        let item = dotfile(".zshrc", DotfileMode::Symlink);

        f.adapter.install(&item).unwrap();
        assert_eq!(
            std::fs::read_to_string(f.home.join(".zshrc.backup")).unwrap(),
            "old"
        );
        assert_eq!(std::fs::read_to_string(f.home.join(".zshrc")).unwrap(), "new");
    }

    #[test]
    fn wrong_symlink_is_replaced_without_backup() {
        let f = fixture();
        std::fs::write(f.payload.join(".vimrc"), "set nu").unwrap();
        std::os::unix::fs::symlink("/elsewhere", f.home.join(".vimrc")).unwrap();
        let item = dotfile(".vimrc", DotfileMode::Symlink);

        assert!(matches!(
            f.adapter.current_state(&item),
            ResourceState::Incorrect { .. }
        ));
        f.adapter.install(&item).unwrap();
        assert!(!f.home.join(".vimrc.backup").exists());
        assert_eq!(
            std::fs::read_link(f.home.join(".vimrc")).unwrap(),
            f.payload.join(".vimrc")
        );
    }

    #[test]
    fn missing_source_is_an_error() {
        let f = fixture();
        let err = f
            .adapter
            .install(&dotfile(".nope", DotfileMode::Symlink))
            .unwrap_err();
        assert!(matches!(err, ResourceError::SourceMissing { .. }));
        assert!(err.remediation().is_some());
    }

    #[test]
    fn real_directory_target_is_refused() {
        let f = fixture();
        std::fs::create_dir_all(f.payload.join(".config")).unwrap();
        std::fs::create_dir_all(f.home.join(".config")).unwrap();
        let err = f
            .adapter
            .install(&dotfile(".config", DotfileMode::Symlink))
            .unwrap_err();
        assert!(matches!(err, ResourceError::InvalidState { .. }));
    }

    #[test]
    fn absolute_path_outside_home_is_untouched() {
        let f = fixture();
        let outside = f.dir.path().join("outside.txt");
        std::fs::write(&outside, "keep me").unwrap();
        let item = dotfile(&outside.display().to_string(), DotfileMode::Symlink);

        assert!(matches!(
            f.adapter.current_state(&item),
            ResourceState::Invalid { .. }
        ));
        let err = f.adapter.apply(&WorkItem::Dotfile(item)).unwrap_err();
        assert!(matches!(err, ResourceError::InvalidState { .. }));
        assert!(!is_symlink(&outside));
        assert_eq!(std::fs::read_to_string(&outside).unwrap(), "keep me");
        assert!(!f.dir.path().join("outside.txt.backup").exists());
    }

    #[test]
    fn parent_dir_path_is_refused() {
        let f = fixture();
        std::fs::write(f.dir.path().join("escaped"), "x").unwrap();
        let err = f
            .adapter
            .install(&dotfile("../escaped", DotfileMode::Copy))
            .unwrap_err();
        assert!(matches!(err, ResourceError::InvalidState { .. }));
        assert_eq!(
            std::fs::read_to_string(f.dir.path().join("escaped")).unwrap(),
            "x"
        );
    }

    // -----------------------------------------------------------------------
    // copy mode
    // -----------------------------------------------------------------------

    #[test]
    fn copy_mode_compares_contents() {
        let f = fixture();
        std::fs::write(f.payload.join(".gitconfig"), "[core]").unwrap();
        let item = dotfile(".gitconfig", DotfileMode::Copy);

        assert_eq!(f.adapter.install(&item).unwrap(), ResourceChange::Applied);
        assert!(!is_symlink(&f.home.join(".gitconfig")));
        assert_eq!(f.adapter.current_state(&item), ResourceState::Correct);

        std::fs::write(f.home.join(".gitconfig"), "[edited]").unwrap();
        assert!(matches!(
            f.adapter.current_state(&item),
            ResourceState::Incorrect { .. }
        ));
        f.adapter.install(&item).unwrap();
        assert_eq!(
            std::fs::read_to_string(f.home.join(".gitconfig.backup")).unwrap(),
            "[edited]"
        );
    }
}

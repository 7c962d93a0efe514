#![allow(
    clippy::expect_used,
    clippy::unwrap_used,
    clippy::wildcard_imports,
    clippy::indexing_slicing
)]
//! Integration tests for loading the document and resolving profiles through
//! the command layer.

mod common;

use common::TestMachineBuilder;
use macsetup_cli::cli::{GlobalOpts, ValidateOpts};
use macsetup_cli::commands::{self, EXIT_FAILURE, EXIT_NOT_FOUND, EXIT_SUCCESS};
use macsetup_cli::config::DotfileMode;
use macsetup_cli::error::ConfigError;
use macsetup_cli::logging::Logger;

const DOCUMENT: &str = r"
version: 1
profiles:
  default:
    description: Shared base
    applications:
      homebrew:
        formulas: [git]
        casks: [slack]
    dotfiles:
      - path: .zshrc
    preferences:
      - domain: com.apple.dock
        key: autohide
        value: true
  work:
    extends: default
    applications:
      homebrew:
        formulas: [node]
    dotfiles:
      - path: .zshrc
        mode: copy
  team:
    extends: work
";

// ---------------------------------------------------------------------------
// Resolution
// ---------------------------------------------------------------------------

#[test]
fn child_lists_replace_parent_lists() {
    let m = TestMachineBuilder::new().with_document(DOCUMENT).build();
    let loaded = m.context("work").load(&Logger::with_log_file(None)).unwrap();
    let work = loaded.profile("work").unwrap();

    assert_eq!(work.name, "work");
    assert_eq!(work.description.as_deref(), Some("Shared base"));
    let brew = work.applications.unwrap().package_manager.unwrap();
    assert_eq!(brew.formulas, vec!["node"]);
    assert_eq!(brew.casks, vec!["slack"]);
    assert_eq!(work.preferences.len(), 1);

    assert_eq!(work.dotfiles.len(), 1);
    assert_eq!(work.dotfiles[0].mode, DotfileMode::Copy);
}

#[test]
fn second_level_of_inheritance_is_rejected() {
    let m = TestMachineBuilder::new().with_document(DOCUMENT).build();
    let loaded = m.context("team").load(&Logger::with_log_file(None)).unwrap();

    let err = loaded.profile("team").unwrap_err();
    assert!(matches!(err, ConfigError::InheritanceTooDeep { .. }));
    assert!(err.to_string().contains("only one level"));
}

#[test]
fn missing_parent_names_the_child() {
    let m = TestMachineBuilder::new()
        .with_document("version: 1\nprofiles:\n  work:\n    extends: base\n")
        .build();
    let loaded = m.context("work").load(&Logger::with_log_file(None)).unwrap();

    let err = anyhow::Error::from(loaded.profile("work").unwrap_err());
    assert_eq!(commands::exit_code_for(&err), EXIT_NOT_FOUND);
    assert!(err.to_string().contains("extended by 'work'"));
}

#[test]
fn config_dir_argument_wins() {
    let elsewhere = TestMachineBuilder::new().with_document(DOCUMENT).build();
    let m = TestMachineBuilder::new().build();
    let ctx = m.context_with(GlobalOpts {
        config_dir: Some(elsewhere.config_dir()),
        profile: "default".to_string(),
        json: false,
    });

    let loaded = ctx.load(&Logger::with_log_file(None)).unwrap();
    assert_eq!(loaded.config_dir.path, elsewhere.config_dir());
    assert_eq!(loaded.document.profile_names(), vec!["default", "team", "work"]);
}

// ---------------------------------------------------------------------------
// validate
// ---------------------------------------------------------------------------

#[test]
fn validate_flags_deep_inheritance() {
    let m = TestMachineBuilder::new()
        .with_document(DOCUMENT)
        .with_payload(".zshrc", "")
        .build();
    let code = commands::validate::run(
        &m.context("default"),
        &ValidateOpts::default(),
        &Logger::with_log_file(None),
    )
    .unwrap();
    assert_eq!(code, EXIT_FAILURE);
}

#[test]
fn validate_accepts_a_clean_document() {
    let m = TestMachineBuilder::new()
        .with_document(
            "version: 1\nprofiles:\n  default:\n    dotfiles:\n      - path: .zshrc\n",
        )
        .with_payload(".zshrc", "")
        .build();
    let code = commands::validate::run(
        &m.context("default"),
        &ValidateOpts { strict: true },
        &Logger::with_log_file(None),
    )
    .unwrap();
    assert_eq!(code, EXIT_SUCCESS);
}

#[test]
fn validate_reports_syntax_errors_as_findings() {
    let m = TestMachineBuilder::new()
        .with_document("version: 1\nprofiles: [unclosed\n")
        .build();
    let code = commands::validate::run(
        &m.context("default"),
        &ValidateOpts::default(),
        &Logger::with_log_file(None),
    )
    .unwrap();
    assert_eq!(code, EXIT_FAILURE);
}

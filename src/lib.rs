//! Declarative macOS machine setup.
//!
//! A YAML document lists, per named profile, the Homebrew packages, App Store
//! apps, dotfiles and `defaults` preferences a machine should have. `setup`
//! applies a profile idempotently, records progress so an interrupted run
//! can be resumed, and keeps going past individual failures. The document
//! can live locally or in iCloud Drive, selected through a pointer file.
//!
//! The public API is organised into layers:
//!
//! - **[`config`]**: parse, resolve (`extends`) and validate the document
//! - **[`resources`]**: one adapter per item kind (`brew`, `mas`, files, `defaults`)
//! - **[`setup`]**: the plan, run state and the resumable executor
//! - **[`storage`]**: config directory resolution and local/iCloud migration
//! - **[`commands`]**: top-level subcommand orchestration
#![deny(clippy::or_fun_call)]
#![deny(clippy::bool_to_int_with_if)]

pub mod cli;
pub mod commands;
pub mod config;
pub mod error;
pub mod exec;
pub mod logging;
pub mod operations;
pub mod platform;
pub mod resources;
pub mod setup;
pub mod storage;

//! Command-line interface definition.
use std::path::PathBuf;

use clap::{ArgGroup, Args, Parser, Subcommand};

use crate::config::DEFAULT_PROFILE;

/// Top-level CLI entry point for the macOS setup engine.
#[derive(Parser, Debug)]
#[command(
    name = "macsetup",
    about = "Declarative macOS machine setup",
    version
)]
pub struct Cli {
    /// Subcommand to run.
    #[command(subcommand)]
    pub command: Command,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Options shared by every subcommand.
    #[command(flatten)]
    pub global: GlobalOpts,
}

/// Options shared across all subcommands.
#[derive(Args, Debug, Clone)]
pub struct GlobalOpts {
    /// Directory holding config.yaml (overrides MACSETUP_CONFIG_DIR and the iCloud pointer)
    #[arg(long, global = true, value_name = "PATH")]
    pub config_dir: Option<PathBuf>,

    /// Profile to apply
    #[arg(short, long, global = true, default_value = DEFAULT_PROFILE)]
    pub profile: String,

    /// Machine-readable JSON output on stdout
    #[arg(long, global = true)]
    pub json: bool,
}

/// Available subcommands.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Apply a profile to this machine
    Setup(SetupOpts),
    /// Show what setup would apply
    Preview(PreviewOpts),
    /// Choose between local and iCloud storage
    Init(InitOpts),
    /// Check the configuration document
    Validate(ValidateOpts),
    /// Inspect profiles
    #[command(subcommand)]
    Profile(ProfileCommand),
    /// Print version information
    Version,
}

impl Command {
    /// Name used for the log file.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Setup(_) => "setup",
            Self::Preview(_) => "preview",
            Self::Init(_) => "init",
            Self::Validate(_) => "validate",
            Self::Profile(_) => "profile",
            Self::Version => "version",
        }
    }
}

/// Options for the `setup` subcommand.
#[derive(Args, Debug, Clone, Default)]
#[allow(clippy::struct_excessive_bools)]
pub struct SetupOpts {
    /// Continue an interrupted run, skipping items it already completed
    #[arg(long)]
    pub resume: bool,

    /// Reapply items even if they are already installed
    #[arg(long)]
    pub force: bool,

    /// Print the plan without applying anything
    #[arg(short = 'd', long)]
    pub dry_run: bool,

    /// Skip dotfiles
    #[arg(long)]
    pub no_dotfiles: bool,

    /// Skip preferences
    #[arg(long)]
    pub no_preferences: bool,
}

/// Options for the `preview` subcommand.
#[derive(Args, Debug, Clone, Default)]
pub struct PreviewOpts {
    /// Mark each package and app as to-install (+) or installed (=)
    #[arg(long)]
    pub diff: bool,
}

/// Options for the `init` subcommand.
#[derive(Args, Debug, Clone, Default)]
#[command(group(ArgGroup::new("mode").required(true).args(["remote", "local", "status"])))]
pub struct InitOpts {
    /// Store the configuration in iCloud Drive, moving local data there
    #[arg(long)]
    pub remote: bool,

    /// Copy the configuration back from iCloud and stop using it
    #[arg(long)]
    pub local: bool,

    /// Show where the configuration is stored
    #[arg(long)]
    pub status: bool,

    /// With --remote, overwrite an existing iCloud configuration
    #[arg(long, requires = "remote")]
    pub force: bool,
}

/// Options for the `validate` subcommand.
#[derive(Args, Debug, Clone, Default)]
pub struct ValidateOpts {
    /// Treat warnings as failures
    #[arg(long)]
    pub strict: bool,
}

/// `profile` subcommands.
#[derive(Subcommand, Debug, Clone)]
pub enum ProfileCommand {
    /// List profiles in the document
    List,
    /// Show a resolved profile
    Show {
        /// Profile name
        name: String,
    },
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used, clippy::unreachable)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn verify_cli() {
        Cli::command().debug_assert();
    }

    #[test]
    fn profile_defaults_to_default() {
        let cli = Cli::parse_from(["macsetup", "setup"]);
        assert_eq!(cli.global.profile, "default");
        assert!(cli.global.config_dir.is_none());
        assert!(!cli.global.json);
    }

    #[test]
    fn parse_setup_flags() {
        let cli = Cli::parse_from([
            "macsetup",
            "--profile",
            "work",
            "setup",
            "--resume",
            "--force",
            "--no-dotfiles",
        ]);
        assert_eq!(cli.global.profile, "work");
        let Command::Setup(opts) = cli.command else {
            unreachable!("expected setup");
        };
        assert!(opts.resume);
        assert!(opts.force);
        assert!(opts.no_dotfiles);
        assert!(!opts.no_preferences);
        assert!(!opts.dry_run);
    }

    #[test]
    fn global_flags_after_subcommand() {
        let cli = Cli::parse_from([
            "macsetup",
            "preview",
            "--diff",
            "--json",
            "--config-dir",
            "/tmp/cfg",
            "-v",
        ]);
        assert!(cli.global.json);
        assert!(cli.verbose);
        assert_eq!(cli.global.config_dir, Some(PathBuf::from("/tmp/cfg")));
        assert!(matches!(cli.command, Command::Preview(PreviewOpts { diff: true })));
    }

    #[test]
    fn init_requires_exactly_one_mode() {
        assert!(Cli::try_parse_from(["macsetup", "init"]).is_err());
        assert!(Cli::try_parse_from(["macsetup", "init", "--remote", "--local"]).is_err());
        let cli = Cli::parse_from(["macsetup", "init", "--status"]);
        assert!(matches!(cli.command, Command::Init(InitOpts { status: true, .. })));
    }

    #[test]
    fn init_force_only_with_remote() {
        assert!(Cli::try_parse_from(["macsetup", "init", "--local", "--force"]).is_err());
        let cli = Cli::parse_from(["macsetup", "init", "--remote", "--force"]);
        assert!(matches!(
            cli.command,
            Command::Init(InitOpts {
                remote: true,
                force: true,
                ..
            })
        ));
    }

    #[test]
    fn parse_profile_show() {
        let cli = Cli::parse_from(["macsetup", "profile", "show", "work"]);
        let Command::Profile(ProfileCommand::Show { name }) = cli.command else {
            unreachable!("expected profile show");
        };
        assert_eq!(name, "work");
    }

    #[test]
    fn parse_validate_strict() {
        let cli = Cli::parse_from(["macsetup", "validate", "--strict"]);
        assert!(matches!(cli.command, Command::Validate(ValidateOpts { strict: true })));
        assert_eq!(cli.command.name(), "validate");
    }

    #[test]
    fn parse_version() {
        let cli = Cli::parse_from(["macsetup", "version"]);
        assert!(matches!(cli.command, Command::Version));
    }
}

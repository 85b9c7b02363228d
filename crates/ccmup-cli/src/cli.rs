use std::path::PathBuf;

use clap::{ArgAction, Args, Parser, Subcommand};

use crate::completion::CliCompletionShell;

#[derive(Parser, Debug)]
#[command(name = "ccmup")]
#[command(version, about = "Installs and updates ccm from its release bundles", long_about = None)]
pub(crate) struct Cli {
    /// Increase log verbosity (-v info, -vv debug).
    #[arg(short, long, action = ArgAction::Count, global = true)]
    pub(crate) verbose: u8,
    /// Configuration file (default: $XDG_CONFIG_HOME/ccmup/config.toml).
    #[arg(long, global = true, value_name = "PATH")]
    pub(crate) config: Option<PathBuf>,
    #[command(subcommand)]
    pub(crate) command: Commands,
}

#[derive(Args, Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct LocationArgs {
    /// Directory receiving the `ccm` and `cursor-cli-manager` command links.
    #[arg(long, value_name = "DIR")]
    pub(crate) dest: Option<PathBuf>,
    /// Install root holding `versions/` and the `current` pointer.
    #[arg(long, value_name = "DIR")]
    pub(crate) root: Option<PathBuf>,
}

#[derive(Args, Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct SourceArgs {
    /// GitHub repository as owner/name.
    #[arg(long)]
    pub(crate) repo: Option<String>,
    /// Release tag, or "latest".
    #[arg(long)]
    pub(crate) tag: Option<String>,
    /// Read the bundle and checksums from a local directory instead of the network.
    #[arg(long = "from-dir", value_name = "DIR")]
    pub(crate) from_dir: Option<PathBuf>,
    #[arg(long)]
    pub(crate) os: Option<String>,
    #[arg(long)]
    pub(crate) arch: Option<String>,
    /// Linux ncurses variant: nc6, nc5 or common.
    #[arg(long)]
    pub(crate) variant: Option<String>,
    /// Fail instead of installing when the bundle cannot be verified.
    #[arg(long)]
    pub(crate) strict: bool,
    #[arg(long = "timeout-secs", value_name = "SECS")]
    pub(crate) timeout_secs: Option<u64>,
}

#[derive(Subcommand, Debug)]
pub(crate) enum Commands {
    /// Install ccm (first install or reinstall).
    Install {
        #[command(flatten)]
        location: LocationArgs,
        #[command(flatten)]
        source: SourceArgs,
    },
    /// Upgrade the ccm found on PATH in place.
    Upgrade {
        #[command(flatten)]
        location: LocationArgs,
        #[command(flatten)]
        source: SourceArgs,
    },
    /// Report whether a newer release is available.
    Check {
        #[command(flatten)]
        location: LocationArgs,
        #[command(flatten)]
        source: SourceArgs,
        /// Compare against this version instead of the installed one.
        #[arg(long = "current-version")]
        current_version: Option<String>,
    },
    /// Show install layout, lock and runnability state.
    Doctor {
        #[command(flatten)]
        location: LocationArgs,
    },
    /// Remove a stale install lock.
    Unlock {
        #[command(flatten)]
        location: LocationArgs,
        /// Remove the lock even if its owner may still be running.
        #[arg(long)]
        force: bool,
    },
    /// Print a shell completion script.
    Completions {
        #[arg(value_enum)]
        shell: CliCompletionShell,
    },
}

//! CLI argument parsing using clap derive

use clap::{Parser, Subcommand};
use clap_complete::Shell;

/// Vendored - manage third-party tool bundles in your repository
#[derive(Parser, Debug)]
#[command(name = "vendored")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// The command to run
    #[command(subcommand)]
    pub command: Commands,
}

/// Available commands
#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Commands {
    /// Install a vendor
    ///
    /// A repository spec (owner/name) registers and installs a new vendor.
    /// A bare name reinstalls/updates a registered vendor. `all` installs
    /// every registered vendor in dependency order.
    ///
    /// Examples:
    ///   vendored install owner/tool              # add a new vendor
    ///   vendored install tool --version 1.2.0    # pin a version
    ///   vendored install all --deps install      # batch, auto-installing deps
    Install {
        /// owner/repo to add, a registered vendor name, or "all"
        target: String,

        /// Version to install (default: latest release)
        #[arg(long, default_value = "latest")]
        version: String,

        /// Reinstall even when already at the resolved version
        #[arg(long)]
        force: bool,

        /// Register under a custom name (add path only)
        #[arg(long)]
        name: Option<String>,

        /// Policy for missing dependencies
        #[arg(long, value_parser = ["error", "warn", "install", "skip"])]
        deps: Option<String>,
    },

    /// Update registered vendors
    ///
    /// Alias of install restricted to names already in the registry;
    /// unknown names are rejected with a listing of known vendors.
    Update {
        /// A registered vendor name, or "all"
        target: String,

        /// Version to install (default: latest release)
        #[arg(long, default_value = "latest")]
        version: String,

        /// Reinstall even when already at the resolved version
        #[arg(long)]
        force: bool,

        /// Policy for missing dependencies
        #[arg(long, value_parser = ["error", "warn", "install", "skip"])]
        deps: Option<String>,
    },

    /// Remove a vendor
    ///
    /// Deletes exactly the files listed in the vendor's manifest, its
    /// store records, and its registration. Vendors that other installed
    /// vendors depend on require --force (or an interactive confirmation).
    Remove {
        /// Registered vendor name
        name: String,

        /// Skip confirmation prompts
        #[arg(long)]
        force: bool,
    },

    /// Check a changeset against vendor protection rules
    ///
    /// With --base, checks files changed since that ref; otherwise checks
    /// the staged files. Exits nonzero when a protected, non-allowed path
    /// was changed outside the owning vendor's install branch.
    Check {
        /// Base ref to diff against (default: the staging area)
        #[arg(long)]
        base: Option<String>,
    },

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

//! Install and update command implementations.

use std::path::Path;

use colored::Colorize;
use vendored_core::{DependencyMode, GhRemote, InstallOptions, InstallOutcome, Orchestrator};

use crate::error::{CliError, Result};

/// Flags shared by `install` and `update`.
#[derive(Debug, Clone)]
pub struct InstallArgs {
    pub version: String,
    pub force: bool,
    pub name: Option<String>,
    pub deps: Option<String>,
}

fn parse_dep_mode(deps: Option<&str>) -> Result<Option<DependencyMode>> {
    deps.map(|s| s.parse().map_err(CliError::user)).transpose()
}

fn print_outcome(outcome: &InstallOutcome) {
    let old = outcome.old_version.as_deref().unwrap_or("none");
    if outcome.changed {
        println!(
            "{} {} {} -> {}",
            "=>".blue().bold(),
            outcome.vendor.cyan(),
            old,
            outcome.new_version.bold()
        );
    } else {
        println!(
            "{} {} {} (already up to date)",
            "=>".blue().bold(),
            outcome.vendor.cyan(),
            outcome.new_version
        );
    }
    for dep in &outcome.missing_warned {
        println!(
            "   {} missing dependency: {}",
            "Warning:".yellow().bold(),
            dep.yellow()
        );
    }
}

/// Handle `vendored install <target>`
pub fn run_install(cwd: &Path, target: &str, args: &InstallArgs) -> Result<()> {
    let opts = InstallOptions {
        version: args.version.clone(),
        force: args.force,
        dep_mode: parse_dep_mode(args.deps.as_deref())?,
        name: args.name.clone(),
    };

    let remote = GhRemote::new();
    let orch = Orchestrator::open(&remote, cwd)?;
    orch.install(target, &opts, &mut print_outcome)?;
    Ok(())
}

/// Handle `vendored update <target>`
///
/// Same pipeline as install, but only registered names (or `all`) are
/// accepted; a repository spec is a usage error.
pub fn run_update(cwd: &Path, target: &str, args: &InstallArgs) -> Result<()> {
    let opts = InstallOptions {
        version: args.version.clone(),
        force: args.force,
        dep_mode: parse_dep_mode(args.deps.as_deref())?,
        name: None,
    };

    let remote = GhRemote::new();
    let orch = Orchestrator::open(&remote, cwd)?;

    if target != "all" && target.contains('/') {
        let known = orch.registry().list()?;
        return Err(CliError::user(format!(
            "update takes a registered vendor name, not a repository spec; known vendors: {}",
            if known.is_empty() {
                "(none)".to_string()
            } else {
                known.join(", ")
            }
        )));
    }

    orch.update(target, &opts, &mut print_outcome)?;
    Ok(())
}

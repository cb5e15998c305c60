//! Remove command implementation.

use std::path::Path;

use colored::Colorize;
use vendored_core::{GhRemote, Orchestrator};

use crate::error::Result;

/// Handle `vendored remove <name> [--force]`
///
/// Shows what would be deleted and asks for confirmation unless `--force`
/// is given. Vendors that other installed vendors depend on get a warning
/// naming the dependents; proceeding past it is the explicit override.
pub fn run_remove(cwd: &Path, name: &str, force: bool) -> Result<()> {
    let remote = GhRemote::new();
    let orch = Orchestrator::open(&remote, cwd)?;

    let plan = orch.plan_remove(name)?;

    if !plan.dependents.is_empty() {
        println!(
            "{} {} is required by: {}",
            "Warning:".yellow().bold(),
            name.cyan(),
            plan.dependents.join(", ").yellow()
        );
    }

    if !force {
        println!(
            "{} removing {} deletes {} file(s):",
            "=>".blue().bold(),
            name.cyan(),
            plan.files.len()
        );
        for file in &plan.files {
            println!("   {}", file.dimmed());
        }
        let confirmed = dialoguer::Confirm::new()
            .with_prompt(format!("Remove vendor '{name}'?"))
            .default(false)
            .interact()?;
        if !confirmed {
            println!("Aborted.");
            return Ok(());
        }
    }

    let removed = orch.execute_remove(&plan)?;
    println!(
        "{} Removed {} ({} file(s))",
        "=>".blue().bold(),
        name.cyan(),
        removed
    );
    Ok(())
}

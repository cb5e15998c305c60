//! Vendored CLI
//!
//! The command-line interface for managing vendored tool bundles.

mod cli;
mod commands;
mod error;

use clap::{CommandFactory, Parser};
use colored::Colorize;
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

use cli::{Cli, Commands};
use commands::InstallArgs;
use error::Result;

fn main() {
    if let Err(e) = run() {
        // Single-line `kind: message` diagnostics, usable as CI annotations
        eprintln!("{}: {}", e.kind().red().bold(), e);
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let cli = Cli::parse();

    if cli.verbose {
        let subscriber = FmtSubscriber::builder()
            .with_max_level(Level::DEBUG)
            .with_target(true)
            .finish();
        tracing::subscriber::set_global_default(subscriber)
            .expect("Failed to set tracing subscriber");
        tracing::debug!("Verbose mode enabled");
    }

    let cwd = std::env::current_dir()?;

    match cli.command {
        Commands::Install {
            target,
            version,
            force,
            name,
            deps,
        } => commands::run_install(
            &cwd,
            &target,
            &InstallArgs {
                version,
                force,
                name,
                deps,
            },
        ),
        Commands::Update {
            target,
            version,
            force,
            deps,
        } => commands::run_update(
            &cwd,
            &target,
            &InstallArgs {
                version,
                force,
                name: None,
                deps,
            },
        ),
        Commands::Remove { name, force } => commands::run_remove(&cwd, &name, force),
        Commands::Check { base } => commands::run_check(&cwd, base.as_deref()),
        Commands::Completions { shell } => {
            clap_complete::generate(shell, &mut Cli::command(), "vendored", &mut std::io::stdout());
            Ok(())
        }
    }
}

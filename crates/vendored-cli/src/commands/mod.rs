//! Command implementations for the vendored CLI.

mod check;
mod install;
mod remove;

pub use check::run_check;
pub use install::{InstallArgs, run_install, run_update};
pub use remove::run_remove;

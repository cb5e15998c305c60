//! Check command implementation.
//!
//! Read-only validation of a changeset against every vendor's protection
//! set. The changeset comes from git: staged files by default, or the
//! files changed since `--base`. The branch name comes from
//! `GITHUB_HEAD_REF` in CI, falling back to the local HEAD.

use std::path::Path;
use std::process::Command;

use colored::Colorize;
use vendored_core::{GhRemote, Orchestrator};

use crate::error::{CliError, Result};

/// Handle `vendored check [--base REF]`
pub fn run_check(cwd: &Path, base: Option<&str>) -> Result<()> {
    let changed = changed_files(cwd, base)?;
    let branch = branch_name(cwd);

    let remote = GhRemote::new();
    let orch = Orchestrator::open(&remote, cwd)?;
    let violations = orch.check(&changed, &branch)?;

    if violations.is_empty() {
        println!(
            "{} vendor check passed ({} changed file(s))",
            "=>".green().bold(),
            changed.len()
        );
        return Ok(());
    }

    // One single-line diagnostic per vendor, suitable for CI annotation
    for violation in &violations {
        let err = vendored_core::Error::ProtectionViolation {
            vendor: violation.vendor.clone(),
            paths: violation.paths.clone(),
        };
        eprintln!("{}: {}", err.kind().red().bold(), err);
    }
    Err(CliError::user(format!(
        "{} vendor(s) have protected files changed outside their install flow",
        violations.len()
    )))
}

fn changed_files(cwd: &Path, base: Option<&str>) -> Result<Vec<String>> {
    let output = match base {
        Some(base) => Command::new("git")
            .args(["diff", "--name-only", &format!("{base}...HEAD")])
            .current_dir(cwd)
            .output()?,
        None => Command::new("git")
            .args(["diff", "--cached", "--name-only"])
            .current_dir(cwd)
            .output()?,
    };

    if !output.status.success() {
        return Err(CliError::user(format!(
            "git diff failed: {}",
            String::from_utf8_lossy(&output.stderr).trim()
        )));
    }

    Ok(String::from_utf8_lossy(&output.stdout)
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .map(str::to_string)
        .collect())
}

fn branch_name(cwd: &Path) -> String {
    if let Ok(head_ref) = std::env::var("GITHUB_HEAD_REF") {
        if !head_ref.is_empty() {
            return head_ref;
        }
    }
    Command::new("git")
        .args(["rev-parse", "--abbrev-ref", "HEAD"])
        .current_dir(cwd)
        .output()
        .ok()
        .filter(|o| o.status.success())
        .map(|o| String::from_utf8_lossy(&o.stdout).trim().to_string())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;
    use vendored_core::{Manifest, ManifestStore, StoreLayout, VendorRecord, VendorRegistry};

    fn git(cwd: &Path, args: &[&str]) {
        let status = Command::new("git")
            .args(args)
            .current_dir(cwd)
            .output()
            .unwrap();
        assert!(status.status.success(), "git {args:?} failed");
    }

    fn init_repo(tmp: &TempDir) {
        git(tmp.path(), &["init", "-q"]);
        git(tmp.path(), &["config", "user.email", "test@example.com"]);
        git(tmp.path(), &["config", "user.name", "Test"]);
    }

    #[test]
    fn clean_tree_passes() {
        let tmp = TempDir::new().unwrap();
        init_repo(&tmp);
        run_check(tmp.path(), None).unwrap();
    }

    #[test]
    fn staged_unrelated_file_passes() {
        let tmp = TempDir::new().unwrap();
        init_repo(&tmp);
        std::fs::write(tmp.path().join("README.md"), "hello\n").unwrap();
        git(tmp.path(), &["add", "README.md"]);
        run_check(tmp.path(), None).unwrap();
    }

    #[test]
    fn staged_protected_file_fails() {
        let tmp = TempDir::new().unwrap();
        init_repo(&tmp);

        let layout = StoreLayout::new(tmp.path());
        let registry = VendorRegistry::open(layout.clone()).unwrap();
        registry.put("tool", &VendorRecord::new("owner/tool")).unwrap();
        std::fs::create_dir_all(tmp.path().join(".tool")).unwrap();
        std::fs::write(tmp.path().join(".tool/script.sh"), "#!/bin/bash\n").unwrap();
        ManifestStore::new(layout)
            .save(&Manifest::new(
                "tool",
                "1.0.0",
                vec![".tool/script.sh".to_string()],
            ))
            .unwrap();

        git(tmp.path(), &["add", ".tool/script.sh"]);
        let err = run_check(tmp.path(), None).unwrap_err();
        assert!(format!("{err}").contains("protected files changed"));
    }

    #[test]
    fn nonexistent_base_ref_is_an_error() {
        let tmp = TempDir::new().unwrap();
        init_repo(&tmp);
        let err = run_check(tmp.path(), Some("no-such-ref")).unwrap_err();
        assert!(format!("{err}").contains("git diff failed"));
    }
}

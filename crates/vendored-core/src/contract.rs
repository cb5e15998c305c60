//! The vendor install contract.
//!
//! A vendor's install routine is an opaque external process. This module
//! fetches `install.sh` at the resolved ref, runs it at the repository root
//! under the fixed environment contract, and captures the manifest it wrote:
//!
//! - `VENDOR_REPO`: remote repository identifier
//! - `VENDOR_REF`: resolved version
//! - `VENDOR_MANIFEST`: path to an initially-empty manifest output file
//! - `VENDOR_INSTALL_DIR`: preferred install directory (non-dogfood only)
//! - `VENDOR_TOKEN`: auth token, when one resolved
//!
//! Exit 0 means the manifest file is read; nonzero is a failure with no
//! automatic cleanup of whatever the routine already wrote.

use std::fs;
use std::process::{Command, Stdio};

use tracing::{debug, info};

use crate::error::{Error, Result};
use crate::layout::{INSTALL_SCRIPT, StoreLayout};
use crate::manifest::Manifest;
use crate::registry::VendorRecord;
use crate::remote::Remote;

/// Runs vendor install routines under the environment contract.
pub struct ContractRunner<'a> {
    remote: &'a dyn Remote,
    layout: StoreLayout,
}

impl<'a> ContractRunner<'a> {
    pub fn new(remote: &'a dyn Remote, layout: StoreLayout) -> Self {
        Self { remote, layout }
    }

    /// Fetch the vendor's install script at the resolved version.
    ///
    /// Release refs are commonly tagged `v<version>`; the bare version and
    /// the default branch are tried as fallbacks.
    fn fetch_install_script(
        &self,
        repo: &str,
        version: &str,
        token: Option<&str>,
    ) -> Result<Vec<u8>> {
        let v_tag = format!("v{version}");
        for git_ref in [v_tag.as_str(), version, "HEAD"] {
            if let Some(bytes) = self.remote.fetch_file(repo, git_ref, INSTALL_SCRIPT, token)? {
                debug!(repo, git_ref, "fetched {INSTALL_SCRIPT}");
                return Ok(bytes);
            }
        }
        Err(Error::fetch(
            repo,
            format!("{INSTALL_SCRIPT} not found at {v_tag}, {version}, or HEAD"),
        ))
    }

    /// Execute the install routine and return its manifest.
    ///
    /// `Ok(None)` means the vendor is in pre-manifest compatibility mode and
    /// wrote no manifest; the caller falls back to the record's static
    /// protection list.
    pub fn run(
        &self,
        vendor: &str,
        record: &VendorRecord,
        version: &str,
        token: Option<&str>,
    ) -> Result<Option<Manifest>> {
        let script = self.fetch_install_script(&record.repo, version, token)?;

        let scratch = tempfile::tempdir()
            .map_err(|e| Error::io(std::env::temp_dir(), e))?;
        let script_path = scratch.path().join(INSTALL_SCRIPT);
        fs::write(&script_path, &script).map_err(|e| Error::io(&script_path, e))?;

        let manifest_path = scratch.path().join("manifest");
        fs::write(&manifest_path, b"").map_err(|e| Error::io(&manifest_path, e))?;

        let mut cmd = Command::new("bash");
        cmd.arg(&script_path)
            .current_dir(self.layout.repo_root())
            .env("VENDOR_REPO", &record.repo)
            .env("VENDOR_REF", version)
            .env("VENDOR_MANIFEST", &manifest_path)
            .stdin(Stdio::inherit())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit());

        if !record.dogfood {
            let pkg_dir = self.layout.vendor_pkg_dir(vendor);
            fs::create_dir_all(&pkg_dir).map_err(|e| Error::io(&pkg_dir, e))?;
            cmd.env("VENDOR_INSTALL_DIR", self.layout.vendor_pkg_rel(vendor));
        }
        if let Some(token) = token {
            cmd.env("VENDOR_TOKEN", token);
        }

        info!(vendor, version, "running install script");
        let status = cmd.status().map_err(|_| Error::InstallScriptFailed {
            vendor: vendor.to_string(),
            exit_code: None,
        })?;

        if !status.success() {
            return Err(Error::InstallScriptFailed {
                vendor: vendor.to_string(),
                exit_code: status.code(),
            });
        }

        let content = fs::read_to_string(&manifest_path).unwrap_or_default();
        let manifest = Manifest::new(vendor, version, content.lines().map(str::to_string));

        if manifest.is_empty() {
            if record.is_legacy() {
                // Pre-manifest contract; the static protection list on the
                // record stays authoritative.
                info!(vendor, "no manifest written, using legacy static patterns");
                return Ok(None);
            }
            return Err(Error::ManifestMissing {
                vendor: vendor.to_string(),
            });
        }

        self.validate_on_disk(vendor, &manifest)?;
        Ok(Some(manifest))
    }

    /// Every manifest path must exist on disk after a successful run.
    fn validate_on_disk(&self, vendor: &str, manifest: &Manifest) -> Result<()> {
        let missing: Vec<String> = manifest
            .sorted_paths()
            .into_iter()
            .filter(|path| !self.layout.repo_root().join(path).exists())
            .collect();
        if missing.is_empty() {
            Ok(())
        } else {
            Err(Error::ManifestInvalid {
                vendor: vendor.to_string(),
                missing,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tempfile::TempDir;

    struct FakeRemote {
        install_sh: Option<Vec<u8>>,
    }

    impl FakeRemote {
        fn with_script(script: &str) -> Self {
            Self {
                install_sh: Some(script.as_bytes().to_vec()),
            }
        }
    }

    impl Remote for FakeRemote {
        fn repo_exists(&self, _repo: &str, _token: Option<&str>) -> Result<bool> {
            Ok(true)
        }

        fn latest_release_tag(&self, _repo: &str, _token: Option<&str>) -> Result<Option<String>> {
            Ok(None)
        }

        fn fetch_file(
            &self,
            _repo: &str,
            _git_ref: &str,
            path: &str,
            _token: Option<&str>,
        ) -> Result<Option<Vec<u8>>> {
            let mut files: HashMap<&str, Option<Vec<u8>>> = HashMap::new();
            files.insert(INSTALL_SCRIPT, self.install_sh.clone());
            Ok(files.remove(path).flatten())
        }
    }

    fn run_contract(
        tmp: &TempDir,
        record: &VendorRecord,
        script: &str,
    ) -> Result<Option<Manifest>> {
        let remote = FakeRemote::with_script(script);
        let runner = ContractRunner::new(&remote, StoreLayout::new(tmp.path()));
        runner.run("tool", record, "1.0.0", None)
    }

    #[test]
    fn successful_run_captures_manifest() {
        let tmp = TempDir::new().unwrap();
        let record = VendorRecord::new("owner/tool");
        let script = r#"
mkdir -p .tool
echo '#!/bin/bash' > .tool/script.sh
echo 'data' > .tool/data.txt
printf '%s\n' .tool/script.sh .tool/data.txt > "$VENDOR_MANIFEST"
"#;
        let manifest = run_contract(&tmp, &record, script).unwrap().unwrap();
        assert_eq!(manifest.version, "1.0.0");
        assert_eq!(
            manifest.sorted_paths(),
            vec![".tool/data.txt".to_string(), ".tool/script.sh".to_string()]
        );
    }

    #[test]
    fn nonzero_exit_is_install_script_failed() {
        let tmp = TempDir::new().unwrap();
        let record = VendorRecord::new("owner/tool");
        let err = run_contract(&tmp, &record, "exit 3").unwrap_err();
        match err {
            Error::InstallScriptFailed { vendor, exit_code } => {
                assert_eq!(vendor, "tool");
                assert_eq!(exit_code, Some(3));
            }
            other => panic!("expected InstallScriptFailed, got {other:?}"),
        }
    }

    #[test]
    fn empty_manifest_without_legacy_fails() {
        let tmp = TempDir::new().unwrap();
        let record = VendorRecord::new("owner/tool");
        let err = run_contract(&tmp, &record, "true").unwrap_err();
        assert_eq!(err.kind(), "ManifestMissing");
    }

    #[test]
    fn empty_manifest_with_legacy_record_falls_back() {
        let tmp = TempDir::new().unwrap();
        let record = VendorRecord {
            protected: vec![".tool/**".into()],
            ..VendorRecord::new("owner/tool")
        };
        let outcome = run_contract(&tmp, &record, "true").unwrap();
        assert!(outcome.is_none());
    }

    #[test]
    fn manifest_listing_missing_file_is_invalid() {
        let tmp = TempDir::new().unwrap();
        let record = VendorRecord::new("owner/tool");
        let script = r#"printf '%s\n' .tool/never-written.sh > "$VENDOR_MANIFEST""#;
        let err = run_contract(&tmp, &record, script).unwrap_err();
        match err {
            Error::ManifestInvalid { missing, .. } => {
                assert_eq!(missing, vec![".tool/never-written.sh"]);
            }
            other => panic!("expected ManifestInvalid, got {other:?}"),
        }
    }

    #[test]
    fn install_dir_env_set_and_created_for_regular_vendors() {
        let tmp = TempDir::new().unwrap();
        let record = VendorRecord::new("owner/tool");
        let script = r#"
echo "$VENDOR_INSTALL_DIR" > env-capture.txt
printf '%s\n' env-capture.txt > "$VENDOR_MANIFEST"
"#;
        run_contract(&tmp, &record, script).unwrap().unwrap();
        let captured = std::fs::read_to_string(tmp.path().join("env-capture.txt")).unwrap();
        assert_eq!(captured.trim(), ".vendored/pkg/tool");
        assert!(tmp.path().join(".vendored/pkg/tool").is_dir());
    }

    #[test]
    fn dogfood_vendor_gets_no_install_dir() {
        let tmp = TempDir::new().unwrap();
        let record = VendorRecord {
            dogfood: true,
            ..VendorRecord::new("owner/tool")
        };
        let script = r#"
echo "${VENDOR_INSTALL_DIR:-unset}" > env-capture.txt
printf '%s\n' env-capture.txt > "$VENDOR_MANIFEST"
"#;
        run_contract(&tmp, &record, script).unwrap().unwrap();
        let captured = std::fs::read_to_string(tmp.path().join("env-capture.txt")).unwrap();
        assert_eq!(captured.trim(), "unset");
        assert!(!tmp.path().join(".vendored/pkg/tool").exists());
    }

    #[test]
    fn contract_env_carries_repo_and_ref() {
        let tmp = TempDir::new().unwrap();
        let record = VendorRecord::new("owner/tool");
        let script = r#"
echo "$VENDOR_REPO $VENDOR_REF" > env-capture.txt
printf '%s\n' env-capture.txt > "$VENDOR_MANIFEST"
"#;
        run_contract(&tmp, &record, script).unwrap().unwrap();
        let captured = std::fs::read_to_string(tmp.path().join("env-capture.txt")).unwrap();
        assert_eq!(captured.trim(), "owner/tool 1.0.0");
    }

    #[test]
    fn missing_install_script_is_fetch_error() {
        let tmp = TempDir::new().unwrap();
        let remote = FakeRemote { install_sh: None };
        let runner = ContractRunner::new(&remote, StoreLayout::new(tmp.path()));
        let err = runner
            .run("tool", &VendorRecord::new("owner/tool"), "1.0.0", None)
            .unwrap_err();
        assert_eq!(err.kind(), "Fetch");
    }
}

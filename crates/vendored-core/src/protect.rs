//! Protection derivation and changeset checking.
//!
//! The protection set is derived, never stored: `protected = manifest.paths
//! minus allowed-pattern matches`. Vendors installed under the pre-manifest
//! contract fall back to the static glob list on their record; that fallback
//! is a permanent compatibility path.

use std::collections::BTreeSet;

use globset::{Glob, GlobSet, GlobSetBuilder};

use crate::error::{Error, Result};
use crate::manifest::Manifest;
use crate::registry::VendorRecord;

fn compile_globset(patterns: &[String]) -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        let glob = Glob::new(pattern).map_err(|e| Error::InvalidPattern {
            pattern: pattern.clone(),
            message: e.to_string(),
        })?;
        builder.add(glob);
    }
    builder.build().map_err(|e| Error::InvalidPattern {
        pattern: patterns.join(", "),
        message: e.to_string(),
    })
}

/// True when `path` matches any of `patterns`.
pub fn matches_any(path: &str, patterns: &[String]) -> Result<bool> {
    if patterns.is_empty() {
        return Ok(false);
    }
    Ok(compile_globset(patterns)?.is_match(path))
}

/// Derive the protected path set from a manifest and allowed patterns.
///
/// Every manifest path not matching an allowed pattern is protected.
pub fn derive(manifest: &Manifest, allowed: &[String]) -> Result<BTreeSet<String>> {
    let allowed_set = compile_globset(allowed)?;
    Ok(manifest
        .paths()
        .iter()
        .filter(|path| !allowed_set.is_match(path.as_str()))
        .cloned()
        .collect())
}

/// Check one vendor against a candidate changeset.
///
/// Returns the violating paths: changed paths that are protected, match no
/// allowed pattern, and did not originate from the vendor's install branch.
pub fn check_vendor(
    name: &str,
    record: &VendorRecord,
    manifest: Option<&Manifest>,
    changed: &[String],
    branch: &str,
) -> Result<Vec<String>> {
    // Changes coming in on the vendor's own install branch are the
    // install/update flow itself.
    if branch.starts_with(&record.install_branch_prefix(name)) {
        return Ok(Vec::new());
    }

    let allowed_set = compile_globset(&record.allowed)?;

    let mut violations = Vec::new();
    match manifest {
        Some(manifest) => {
            let protected: BTreeSet<&str> =
                manifest.paths().iter().map(String::as_str).collect();
            for path in changed {
                if protected.contains(path.as_str()) && !allowed_set.is_match(path) {
                    violations.push(path.clone());
                }
            }
        }
        None => {
            // Pre-manifest vendor: static glob fallback
            let protected_set = compile_globset(&record.protected)?;
            for path in changed {
                if protected_set.is_match(path) && !allowed_set.is_match(path) {
                    violations.push(path.clone());
                }
            }
        }
    }
    Ok(violations)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    fn strings(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    fn legacy_record() -> VendorRecord {
        VendorRecord {
            install_branch: Some("chore/install-git-vendored".into()),
            protected: strings(&[
                ".vendored/**",
                ".github/workflows/install-vendored.yml",
            ]),
            allowed: strings(&[".vendored/config.json", ".vendored/.version"]),
            ..VendorRecord::new("owner/git-vendored")
        }
    }

    // --- matches_any ---

    #[rstest]
    #[case::exact(".vendored/config.json", ".vendored/config.json", true)]
    #[case::unrelated("README.md", ".vendored/**", false)]
    #[case::star_single_level(".vendored/install", ".vendored/*", true)]
    #[case::double_star_nested(".pearls/archive/old.jsonl", ".pearls/**", true)]
    #[case::double_star_deep(".vendored/a/b/c.py", ".vendored/**", true)]
    #[case::extension_wildcard(".pearls/archive/2024.jsonl", ".pearls/archive/*.jsonl", true)]
    fn pattern_matching(#[case] path: &str, #[case] pattern: &str, #[case] expected: bool) {
        assert_eq!(matches_any(path, &strings(&[pattern])).unwrap(), expected);
    }

    #[test]
    fn multiple_patterns_any_match_wins() {
        let patterns = strings(&[".vendored/**", ".github/workflows/check-vendor.yml"]);
        assert!(matches_any(".github/workflows/check-vendor.yml", &patterns).unwrap());
        assert!(matches_any(".vendored/install", &patterns).unwrap());
        assert!(!matches_any("src/main.rs", &patterns).unwrap());
    }

    #[test]
    fn invalid_pattern_is_an_error() {
        let err = matches_any("x", &strings(&["a[b"])).unwrap_err();
        assert_eq!(err.kind(), "InvalidPattern");
    }

    // --- derive ---

    #[test]
    fn derive_excludes_allowed_and_keeps_rest() {
        let manifest = Manifest::new(
            "tool",
            "1.0.0",
            strings(&[".tool/script.sh", ".tool/config.json", ".tool/.version"]),
        );
        let allowed = strings(&[".tool/config.json", ".tool/.version"]);
        let protected = derive(&manifest, &allowed).unwrap();
        assert_eq!(
            protected.into_iter().collect::<Vec<_>>(),
            vec![".tool/script.sh".to_string()]
        );
    }

    #[test]
    fn derive_with_no_allowed_protects_everything() {
        let manifest = Manifest::new("tool", "1.0.0", strings(&["f1", "f2"]));
        let protected = derive(&manifest, &[]).unwrap();
        assert_eq!(protected.len(), 2);
        assert!(protected.contains("f1"));
        assert!(protected.contains("f2"));
    }

    // --- check_vendor, legacy glob fallback ---

    #[test]
    fn unrelated_files_pass() {
        let violations = check_vendor(
            "git-vendored",
            &legacy_record(),
            None,
            &strings(&["src/main.rs", "README.md"]),
            "feature/something",
        )
        .unwrap();
        assert!(violations.is_empty());
    }

    #[test]
    fn protected_file_violates() {
        let violations = check_vendor(
            "git-vendored",
            &legacy_record(),
            None,
            &strings(&[".vendored/install", "README.md"]),
            "feature/something",
        )
        .unwrap();
        assert_eq!(violations, vec![".vendored/install"]);
    }

    #[test]
    fn allowed_file_is_not_a_violation() {
        let violations = check_vendor(
            "git-vendored",
            &legacy_record(),
            None,
            &strings(&[".vendored/config.json", ".vendored/.version"]),
            "feature/something",
        )
        .unwrap();
        assert!(violations.is_empty());
    }

    #[test]
    fn install_branch_skips_checks() {
        let violations = check_vendor(
            "git-vendored",
            &legacy_record(),
            None,
            &strings(&[".vendored/install", ".vendored/check"]),
            "chore/install-git-vendored-v1.0",
        )
        .unwrap();
        assert!(violations.is_empty());
    }

    #[test]
    fn other_vendors_install_branch_does_not_skip() {
        let violations = check_vendor(
            "git-vendored",
            &legacy_record(),
            None,
            &strings(&[".vendored/install"]),
            "chore/install-pearls-v2.0",
        )
        .unwrap();
        assert_eq!(violations, vec![".vendored/install"]);
    }

    #[test]
    fn workflow_file_protected() {
        let violations = check_vendor(
            "git-vendored",
            &legacy_record(),
            None,
            &strings(&[".github/workflows/install-vendored.yml"]),
            "feature/something",
        )
        .unwrap();
        assert_eq!(violations.len(), 1);
    }

    #[test]
    fn empty_patterns_mean_nothing_protected() {
        let record = VendorRecord::new("owner/empty");
        let violations = check_vendor(
            "empty",
            &record,
            None,
            &strings(&[".anything/file.py"]),
            "feature/something",
        )
        .unwrap();
        assert!(violations.is_empty());
    }

    // --- check_vendor, manifest-backed ---

    #[test]
    fn manifest_paths_are_protected_exactly() {
        let record = VendorRecord {
            allowed: strings(&[".tool/config.json"]),
            ..VendorRecord::new("owner/tool")
        };
        let manifest = Manifest::new(
            "tool",
            "1.0.0",
            strings(&[".tool/script.sh", ".tool/config.json"]),
        );
        let violations = check_vendor(
            "tool",
            &record,
            Some(&manifest),
            &strings(&[".tool/script.sh", ".tool/config.json", ".tool/untracked.txt"]),
            "feature/x",
        )
        .unwrap();
        // script.sh: in manifest, not allowed -> violation.
        // config.json: in manifest but allowed. untracked.txt: not in manifest.
        assert_eq!(violations, vec![".tool/script.sh"]);
    }

    #[test]
    fn manifest_backed_install_branch_exemption() {
        let record = VendorRecord::new("owner/tool");
        let manifest = Manifest::new("tool", "1.0.0", strings(&[".tool/script.sh"]));
        let violations = check_vendor(
            "tool",
            &record,
            Some(&manifest),
            &strings(&[".tool/script.sh"]),
            "chore/install-tool-v2.0.0",
        )
        .unwrap();
        assert!(violations.is_empty());
    }
}

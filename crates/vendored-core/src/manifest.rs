//! Installed-file manifests.
//!
//! A manifest is the authoritative record of which files a vendor's install
//! routine wrote, plus the version that run installed. One manifest per
//! installed vendor; replaced wholesale on update, deleted on remove. The
//! store also keeps the resolved dependency snapshot (`<name>.deps`) next to
//! the manifest for batch ordering and reverse-dependency lookups.

use std::collections::BTreeSet;
use std::fs;

use tracing::debug;

use crate::error::{Error, Result};
use crate::io;
use crate::layout::StoreLayout;

/// The record of one vendor's installed files at one version.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Manifest {
    pub vendor: String,
    pub version: String,
    /// Repo-relative installed paths, unique, in insertion order.
    paths: Vec<String>,
}

impl Manifest {
    /// Build a manifest from raw path lines, deduplicating while preserving
    /// first-seen order. Blank lines are dropped.
    pub fn new(
        vendor: impl Into<String>,
        version: impl Into<String>,
        raw_paths: impl IntoIterator<Item = String>,
    ) -> Self {
        let mut seen = BTreeSet::new();
        let mut paths = Vec::new();
        for path in raw_paths {
            let path = path.trim().to_string();
            if path.is_empty() {
                continue;
            }
            if seen.insert(path.clone()) {
                paths.push(path);
            }
        }
        Self {
            vendor: vendor.into(),
            version: version.into(),
            paths,
        }
    }

    pub fn paths(&self) -> &[String] {
        &self.paths
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }

    /// Paths in stored (sorted) order.
    pub fn sorted_paths(&self) -> Vec<String> {
        let mut sorted = self.paths.clone();
        sorted.sort();
        sorted
    }
}

/// Reads and writes manifests under `.vendored/manifests/`.
#[derive(Debug, Clone)]
pub struct ManifestStore {
    layout: StoreLayout,
}

impl ManifestStore {
    pub fn new(layout: StoreLayout) -> Self {
        Self { layout }
    }

    /// Load the manifest for a vendor, or `None` when no manifest exists.
    pub fn load(&self, vendor: &str) -> Result<Option<Manifest>> {
        let Some(content) = io::read_text_opt(&self.layout.manifest_files(vendor))? else {
            return Ok(None);
        };
        let version = self.version(vendor)?.unwrap_or_default();
        Ok(Some(Manifest::new(
            vendor,
            version,
            content.lines().map(str::to_string),
        )))
    }

    /// Installed version for a vendor, from the manifest version marker.
    pub fn version(&self, vendor: &str) -> Result<Option<String>> {
        Ok(io::read_text_opt(&self.layout.manifest_version(vendor))?
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty()))
    }

    /// Persist a manifest: sorted path list plus version marker.
    ///
    /// Both writes are atomic; callers must have validated the manifest
    /// against disk before calling (all-or-nothing commit).
    pub fn save(&self, manifest: &Manifest) -> Result<()> {
        let mut content = manifest.sorted_paths().join("\n");
        content.push('\n');
        io::write_atomic(&self.layout.manifest_files(&manifest.vendor), content.as_bytes())?;
        io::write_atomic(
            &self.layout.manifest_version(&manifest.vendor),
            format!("{}\n", manifest.version).as_bytes(),
        )?;
        debug!(
            vendor = %manifest.vendor,
            version = %manifest.version,
            files = manifest.paths().len(),
            "manifest saved"
        );
        Ok(())
    }

    /// Delete a vendor's manifest, version marker, and dependency snapshot.
    pub fn delete(&self, vendor: &str) -> Result<()> {
        io::remove_file_opt(&self.layout.manifest_files(vendor))?;
        io::remove_file_opt(&self.layout.manifest_version(vendor))?;
        io::remove_file_opt(&self.layout.manifest_deps(vendor))?;
        Ok(())
    }

    /// Write the resolved dependency-name snapshot (sorted). `None` or an
    /// empty set removes any stale snapshot instead.
    pub fn save_deps(&self, vendor: &str, deps: Option<&[String]>) -> Result<()> {
        let path = self.layout.manifest_deps(vendor);
        match deps {
            Some(deps) if !deps.is_empty() => {
                let mut sorted: Vec<String> = deps.to_vec();
                sorted.sort();
                sorted.dedup();
                let mut content = sorted.join("\n");
                content.push('\n');
                io::write_atomic(&path, content.as_bytes())
            }
            _ => {
                io::remove_file_opt(&path)?;
                Ok(())
            }
        }
    }

    /// Cached dependency names for a vendor, or `None` when no snapshot.
    pub fn load_deps(&self, vendor: &str) -> Result<Option<Vec<String>>> {
        Ok(io::read_text_opt(&self.layout.manifest_deps(vendor))?.map(|content| {
            content
                .lines()
                .map(str::trim)
                .filter(|l| !l.is_empty())
                .map(str::to_string)
                .collect()
        }))
    }

    /// Every `(vendor, deps)` snapshot in the store, sorted by vendor name.
    pub fn all_deps(&self) -> Result<Vec<(String, Vec<String>)>> {
        let dir = self.layout.manifests_dir();
        let entries = match fs::read_dir(&dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(Error::io(&dir, e)),
        };

        let mut result = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| Error::io(&dir, e))?;
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("deps") {
                continue;
            }
            let Some(vendor) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };
            if let Some(deps) = self.load_deps(vendor)? {
                result.push((vendor.to_string(), deps));
            }
        }
        result.sort();
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    fn store(tmp: &TempDir) -> ManifestStore {
        ManifestStore::new(StoreLayout::new(tmp.path()))
    }

    #[test]
    fn save_and_load_round_trip() {
        let tmp = TempDir::new().unwrap();
        let store = store(&tmp);
        let manifest = Manifest::new(
            "tool",
            "1.2.3",
            vec![".tool/script.sh".to_string(), ".tool/config.json".to_string()],
        );
        store.save(&manifest).unwrap();

        let loaded = store.load("tool").unwrap().unwrap();
        assert_eq!(loaded.version, "1.2.3");
        assert_eq!(
            loaded.paths(),
            &[".tool/config.json".to_string(), ".tool/script.sh".to_string()]
        );
        assert_eq!(store.version("tool").unwrap().as_deref(), Some("1.2.3"));
    }

    #[test]
    fn load_missing_returns_none() {
        let tmp = TempDir::new().unwrap();
        assert!(store(&tmp).load("nonexistent").unwrap().is_none());
        assert!(store(&tmp).version("nonexistent").unwrap().is_none());
    }

    #[test]
    fn paths_are_stored_sorted() {
        let tmp = TempDir::new().unwrap();
        let store = store(&tmp);
        let manifest = Manifest::new(
            "tool",
            "1.0.0",
            vec![
                ".tool/z.sh".to_string(),
                ".tool/a.sh".to_string(),
                ".tool/m.sh".to_string(),
            ],
        );
        store.save(&manifest).unwrap();

        let raw = std::fs::read_to_string(
            tmp.path().join(".vendored/manifests/tool.files"),
        )
        .unwrap();
        let lines: Vec<&str> = raw.lines().collect();
        assert_eq!(lines, vec![".tool/a.sh", ".tool/m.sh", ".tool/z.sh"]);
    }

    #[test]
    fn duplicate_and_blank_lines_are_dropped() {
        let manifest = Manifest::new(
            "tool",
            "1.0.0",
            vec![
                ".tool/a".to_string(),
                "".to_string(),
                ".tool/a".to_string(),
                "  ".to_string(),
                ".tool/b".to_string(),
            ],
        );
        assert_eq!(manifest.paths(), &[".tool/a".to_string(), ".tool/b".to_string()]);
    }

    #[test]
    fn delete_removes_all_records() {
        let tmp = TempDir::new().unwrap();
        let store = store(&tmp);
        let manifest = Manifest::new("tool", "1.0.0", vec![".tool/a".to_string()]);
        store.save(&manifest).unwrap();
        store.save_deps("tool", Some(&["dep".to_string()])).unwrap();

        store.delete("tool").unwrap();
        assert!(store.load("tool").unwrap().is_none());
        assert!(store.version("tool").unwrap().is_none());
        assert!(store.load_deps("tool").unwrap().is_none());
    }

    #[test]
    fn deps_snapshot_written_sorted() {
        let tmp = TempDir::new().unwrap();
        let store = store(&tmp);
        store
            .save_deps(
                "tool",
                Some(&["zebra".to_string(), "alpha".to_string(), "middle".to_string()]),
            )
            .unwrap();
        assert_eq!(
            store.load_deps("tool").unwrap().unwrap(),
            vec!["alpha", "middle", "zebra"]
        );
    }

    #[test]
    fn empty_deps_removes_stale_snapshot() {
        let tmp = TempDir::new().unwrap();
        let store = store(&tmp);
        store.save_deps("tool", Some(&["dep".to_string()])).unwrap();
        store.save_deps("tool", None).unwrap();
        assert!(store.load_deps("tool").unwrap().is_none());
    }

    #[test]
    fn all_deps_lists_every_snapshot() {
        let tmp = TempDir::new().unwrap();
        let store = store(&tmp);
        store.save_deps("b-tool", Some(&["tool".to_string()])).unwrap();
        store
            .save_deps("a-tool", Some(&["tool".to_string(), "other".to_string()]))
            .unwrap();

        let all = store.all_deps().unwrap();
        assert_eq!(
            all,
            vec![
                ("a-tool".to_string(), vec!["other".to_string(), "tool".to_string()]),
                ("b-tool".to_string(), vec!["tool".to_string()]),
            ]
        );
    }
}

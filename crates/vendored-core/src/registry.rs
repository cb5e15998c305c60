//! Vendor registry: per-vendor configuration records and schema migration.
//!
//! The registry owns the framework side of each vendor's configuration file.
//! Two store schemas exist on disk:
//!
//! - **v1**: a single `config.json` with a `"vendors"` map, hand-maintained.
//! - **v2**: one `configs/<name>.json` per vendor. The framework-owned record
//!   lives under the reserved `"_vendor"` key; every other top-level key is
//!   project-owned and passed through untouched.
//!
//! Migration is one-directional and lazy: [`VendorRegistry::open`] detects a
//! v1 store and splits it the first time any v2-aware operation touches it.

use std::collections::BTreeMap;
use std::fs;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{debug, info};

use crate::error::{Error, Result};
use crate::io;
use crate::layout::StoreLayout;

/// Reserved key holding the framework-owned record in a v2 config file.
pub const VENDOR_KEY: &str = "_vendor";

fn is_false(v: &bool) -> bool {
    !v
}

/// Framework-owned registration record for one vendor.
///
/// Only the orchestrator mutates these fields; anything else in the vendor's
/// config file is opaque project data the registry never interprets.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VendorRecord {
    /// Remote repository identifier, `owner/name`.
    pub repo: String,

    /// Install branch prefix; defaults to `chore/install-<name>`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub install_branch: Option<String>,

    /// Private repository; downloads require `VENDOR_PAT`.
    #[serde(default, skip_serializing_if = "is_false")]
    pub private: bool,

    /// Install PRs may merge automatically (consumed by the CI layer).
    #[serde(default, skip_serializing_if = "is_false")]
    pub automerge: bool,

    /// The vendor manages this framework's own files; no install directory
    /// is imposed on its routine.
    #[serde(default, skip_serializing_if = "is_false")]
    pub dogfood: bool,

    /// User-editable exception globs: matching paths are never protected.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub allowed: Vec<String>,

    /// Legacy hand-maintained protection globs. Non-empty marks the vendor
    /// as pre-manifest (compatibility mode) and serves as the protection
    /// fallback when no manifest exists.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub protected: Vec<String>,
}

impl VendorRecord {
    pub fn new(repo: impl Into<String>) -> Self {
        Self {
            repo: repo.into(),
            install_branch: None,
            private: false,
            automerge: false,
            dogfood: false,
            allowed: Vec::new(),
            protected: Vec::new(),
        }
    }

    /// Branch prefix that exempts a changeset from protection checks.
    pub fn install_branch_prefix(&self, name: &str) -> String {
        self.install_branch
            .clone()
            .unwrap_or_else(|| format!("chore/install-{name}"))
    }

    /// Pre-manifest contract vendors carry a hand-maintained protected list.
    pub fn is_legacy(&self) -> bool {
        !self.protected.is_empty()
    }

    /// The vendor's dot-directory, derived from its pattern lists
    /// (`.tool/**` -> `.tool`). Used for legacy version markers and legacy
    /// project-config discovery.
    pub fn dotdir(&self) -> Option<String> {
        self.protected
            .iter()
            .chain(self.allowed.iter())
            .filter_map(|pattern| pattern.split('/').next())
            .find(|c| c.starts_with('.') && c.len() > 1 && !c.contains('*'))
            .map(str::to_string)
    }
}

/// Registry over the v2 per-vendor store.
#[derive(Debug, Clone)]
pub struct VendorRegistry {
    layout: StoreLayout,
}

impl VendorRegistry {
    /// Open the registry, performing any pending store migrations.
    pub fn open(layout: StoreLayout) -> Result<Self> {
        let registry = Self { layout };
        registry.migrate_v1_store()?;
        registry.migrate_project_configs()?;
        Ok(registry)
    }

    /// Fetch a vendor's record by name.
    pub fn get(&self, name: &str) -> Result<Option<VendorRecord>> {
        let path = self.layout.vendor_config_file(name);
        let Some(content) = io::read_text_opt(&path)? else {
            return Ok(None);
        };
        let value: Value = serde_json::from_str(&content).map_err(|e| Error::StoreParse {
            path: path.clone(),
            message: e.to_string(),
        })?;
        Self::record_from_file_value(&path, value).map(Some)
    }

    /// Create or update a vendor's record, preserving any project-owned keys
    /// already present in its config file.
    pub fn put(&self, name: &str, record: &VendorRecord) -> Result<()> {
        let path = self.layout.vendor_config_file(name);
        let mut file_map = match io::read_text_opt(&path)? {
            Some(content) => serde_json::from_str::<Value>(&content)
                .map_err(|e| Error::StoreParse {
                    path: path.clone(),
                    message: e.to_string(),
                })?
                .as_object()
                .cloned()
                .unwrap_or_default(),
            None => Map::new(),
        };
        file_map.insert(VENDOR_KEY.to_string(), serde_json::to_value(record)?);

        let content = serde_json::to_string_pretty(&Value::Object(file_map))?;
        io::write_atomic(&path, format!("{content}\n").as_bytes())
    }

    /// Delete a vendor's config file. Missing files are a no-op.
    pub fn remove(&self, name: &str) -> Result<()> {
        io::remove_file_opt(&self.layout.vendor_config_file(name))?;
        Ok(())
    }

    /// All registered vendor names, sorted.
    pub fn list(&self) -> Result<Vec<String>> {
        Ok(self.records()?.into_keys().collect())
    }

    /// All registered vendors with their records, sorted by name.
    pub fn records(&self) -> Result<BTreeMap<String, VendorRecord>> {
        let dir = self.layout.configs_dir();
        let entries = match fs::read_dir(&dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(BTreeMap::new()),
            Err(e) => return Err(Error::io(&dir, e)),
        };

        let mut records = BTreeMap::new();
        for entry in entries {
            let entry = entry.map_err(|e| Error::io(&dir, e))?;
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            let Some(name) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };
            if let Some(record) = self.get(name)? {
                records.insert(name.to_string(), record);
            }
        }
        Ok(records)
    }

    /// Whether any registered vendor already points at `repo`.
    pub fn find_by_repo(&self, repo: &str) -> Result<Option<String>> {
        Ok(self
            .records()?
            .into_iter()
            .find(|(_, record)| record.repo == repo)
            .map(|(name, _)| name))
    }

    /// Store-level default dependency mode, from the project `config.json`.
    pub fn dependency_mode_default(&self) -> Result<Option<String>> {
        let Some(content) = io::read_text_opt(&self.layout.config_file())? else {
            return Ok(None);
        };
        let value: Value = serde_json::from_str(&content).map_err(|e| Error::StoreParse {
            path: self.layout.config_file(),
            message: e.to_string(),
        })?;
        Ok(value
            .get("dependency_mode")
            .and_then(Value::as_str)
            .map(str::to_string))
    }

    fn record_from_file_value(path: &std::path::Path, value: Value) -> Result<VendorRecord> {
        let record_value = match &value {
            // v2 shape: framework record under "_vendor"
            Value::Object(map) if map.contains_key(VENDOR_KEY) => map[VENDOR_KEY].clone(),
            // flat pre-split files are accepted read-only
            other => other.clone(),
        };
        serde_json::from_value(record_value).map_err(|e| Error::StoreParse {
            path: path.to_path_buf(),
            message: e.to_string(),
        })
    }

    // -- v1 -> v2 migration ------------------------------------------------

    fn should_migrate_v1(&self) -> Result<bool> {
        let Some(content) = io::read_text_opt(&self.layout.config_file())? else {
            return Ok(false);
        };
        let value: Value = serde_json::from_str(&content).map_err(|e| Error::StoreParse {
            path: self.layout.config_file(),
            message: e.to_string(),
        })?;
        let has_vendors = value
            .get("vendors")
            .and_then(Value::as_object)
            .is_some_and(|m| !m.is_empty());
        if !has_vendors {
            return Ok(false);
        }

        // A populated configs/ dir means the split already happened.
        let configs_populated = match fs::read_dir(self.layout.configs_dir()) {
            Ok(entries) => entries.filter_map(|e| e.ok()).any(|e| {
                e.path().extension().and_then(|x| x.to_str()) == Some("json")
            }),
            Err(_) => false,
        };
        Ok(!configs_populated)
    }

    /// Split a v1 monolithic store into per-vendor config files.
    ///
    /// Hand-maintained `protected` lists ride along into the record's legacy
    /// fallback field rather than being discarded.
    fn migrate_v1_store(&self) -> Result<()> {
        if !self.should_migrate_v1()? {
            return Ok(());
        }

        let config_path = self.layout.config_file();
        let content = io::read_text_opt(&config_path)?.unwrap_or_default();
        let mut root: Value = serde_json::from_str(&content).map_err(|e| Error::StoreParse {
            path: config_path.clone(),
            message: e.to_string(),
        })?;

        let Some(vendors) = root.get("vendors").and_then(Value::as_object).cloned() else {
            return Ok(());
        };

        for (name, entry) in &vendors {
            let record: VendorRecord =
                serde_json::from_value(entry.clone()).map_err(|e| Error::StoreParse {
                    path: config_path.clone(),
                    message: format!("vendor '{name}': {e}"),
                })?;
            self.put(name, &record)?;
            info!(vendor = %name, "migrated vendor config to per-vendor store");
        }

        if let Some(map) = root.as_object_mut() {
            map.remove("vendors");
        }
        let remaining = serde_json::to_string_pretty(&root)?;
        io::write_atomic(&config_path, format!("{remaining}\n").as_bytes())?;
        info!(vendors = vendors.len(), "v1 store migration complete");
        Ok(())
    }

    // -- legacy project-config merge ---------------------------------------

    /// Merge legacy `<dotdir>/config.json` files into the per-vendor store.
    ///
    /// Project keys move to the vendor's config file (never touching
    /// `_vendor`), the legacy file is deleted, and a dot-directory left with
    /// no other content is pruned. Data files and git infrastructure stay.
    fn migrate_project_configs(&self) -> Result<()> {
        for (name, record) in self.records()? {
            let Some(dotdir) = record.dotdir() else {
                continue;
            };
            let legacy_path = self.layout.repo_root().join(&dotdir).join("config.json");
            let Some(content) = io::read_text_opt(&legacy_path)? else {
                continue;
            };

            let legacy: Value = serde_json::from_str(&content).map_err(|e| Error::StoreParse {
                path: legacy_path.clone(),
                message: e.to_string(),
            })?;

            let vendor_path = self.layout.vendor_config_file(&name);
            let mut file_map = match io::read_text_opt(&vendor_path)? {
                Some(existing) => serde_json::from_str::<Value>(&existing)
                    .map_err(|e| Error::StoreParse {
                        path: vendor_path.clone(),
                        message: e.to_string(),
                    })?
                    .as_object()
                    .cloned()
                    .unwrap_or_default(),
                None => Map::new(),
            };

            if let Some(legacy_map) = legacy.as_object() {
                for (key, value) in legacy_map {
                    if key == VENDOR_KEY || file_map.contains_key(key) {
                        continue;
                    }
                    file_map.insert(key.clone(), value.clone());
                }
            }

            let serialized = serde_json::to_string_pretty(&Value::Object(file_map))?;
            io::write_atomic(&vendor_path, format!("{serialized}\n").as_bytes())?;
            io::remove_file_opt(&legacy_path)?;
            info!(vendor = %name, from = %legacy_path.display(), "merged project config");

            let dot_path = self.layout.repo_root().join(&dotdir);
            if io::dir_is_empty(&dot_path)? {
                fs::remove_dir(&dot_path).map_err(|e| Error::io(&dot_path, e))?;
                info!(dir = %dot_path.display(), "removed empty directory");
            } else {
                debug!(dir = %dot_path.display(), "directory retained, still has content");
            }
        }
        Ok(())
    }
}

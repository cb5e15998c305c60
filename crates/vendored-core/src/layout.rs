//! On-disk layout of the `.vendored/` store.
//!
//! Every path the engine reads or writes is derived here so the store shape
//! lives in one place: the monolithic v1 config, the per-vendor v2 configs,
//! the manifest records, and the per-vendor package directories.

use std::path::{Path, PathBuf};

/// Directory name of the store at the repository root.
pub const STORE_DIR: &str = ".vendored";

/// File the vendor repo must carry at its root for version-marker fallback.
pub const VERSION_MARKER_FILE: &str = "VERSION";

/// Install routine the vendor repo must carry at its root.
pub const INSTALL_SCRIPT: &str = "install.sh";

/// Optional dependency declaration at the vendor repo root.
pub const DEPS_FILE: &str = "deps.json";

/// Resolves store paths relative to a repository root.
#[derive(Debug, Clone)]
pub struct StoreLayout {
    root: PathBuf,
}

impl StoreLayout {
    pub fn new(repo_root: impl Into<PathBuf>) -> Self {
        Self {
            root: repo_root.into(),
        }
    }

    /// The repository root this layout was created for.
    pub fn repo_root(&self) -> &Path {
        &self.root
    }

    /// `.vendored/`
    pub fn store_dir(&self) -> PathBuf {
        self.root.join(STORE_DIR)
    }

    /// `.vendored/config.json` (v1 monolithic store, project defaults)
    pub fn config_file(&self) -> PathBuf {
        self.store_dir().join("config.json")
    }

    /// `.vendored/configs/` (v2 per-vendor store)
    pub fn configs_dir(&self) -> PathBuf {
        self.store_dir().join("configs")
    }

    /// `.vendored/configs/<name>.json`
    pub fn vendor_config_file(&self, name: &str) -> PathBuf {
        self.configs_dir().join(format!("{name}.json"))
    }

    /// `.vendored/manifests/`
    pub fn manifests_dir(&self) -> PathBuf {
        self.store_dir().join("manifests")
    }

    /// `.vendored/manifests/<name>.files`
    pub fn manifest_files(&self, name: &str) -> PathBuf {
        self.manifests_dir().join(format!("{name}.files"))
    }

    /// `.vendored/manifests/<name>.version`
    pub fn manifest_version(&self, name: &str) -> PathBuf {
        self.manifests_dir().join(format!("{name}.version"))
    }

    /// `.vendored/manifests/<name>.deps`
    pub fn manifest_deps(&self, name: &str) -> PathBuf {
        self.manifests_dir().join(format!("{name}.deps"))
    }

    /// `.vendored/pkg/` (parent of all preferred install directories)
    pub fn pkg_dir(&self) -> PathBuf {
        self.store_dir().join("pkg")
    }

    /// `.vendored/pkg/<name>/`, as handed to the install routine.
    pub fn vendor_pkg_dir(&self, name: &str) -> PathBuf {
        self.pkg_dir().join(name)
    }

    /// The repo-relative form of [`Self::vendor_pkg_dir`], used in the
    /// contract environment.
    pub fn vendor_pkg_rel(&self, name: &str) -> String {
        format!("{STORE_DIR}/pkg/{name}")
    }
}

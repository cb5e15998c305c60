//! The orchestrator: install, update, remove, and check.
//!
//! Composes the version resolver, contract runner, manifest store,
//! protection deriver, dependency resolver, and registry into the four
//! user-facing operations. Per-vendor lifecycle:
//! unregistered -> installed(v1) -> installed(v2) -> ... -> removed.
//!
//! Execution is single-threaded and sequential; batch installs run one
//! vendor at a time in topological order. The on-disk store is the shared
//! mutable state and every write assumes single-writer access for the
//! duration of one invocation.

use std::path::PathBuf;

use tracing::{debug, info, warn};

use crate::contract::ContractRunner;
use crate::dependency::{
    Dependency, DependencyDeclaration, DependencyGraph, DependencyMode, InstallSession,
    fetch_declaration,
};
use crate::error::{Error, Result};
use crate::layout::StoreLayout;
use crate::manifest::{Manifest, ManifestStore};
use crate::registry::{VendorRecord, VendorRegistry};
use crate::remote::{Remote, resolve_auth_token};
use crate::{io, protect, version};

/// Options shared by the install/update entry points.
#[derive(Debug, Clone)]
pub struct InstallOptions {
    /// Requested version; `latest` resolves via the remote.
    pub version: String,
    /// Re-run the contract even when already at the resolved version.
    pub force: bool,
    /// Dependency policy; `None` falls back to the store default, then
    /// `error`.
    pub dep_mode: Option<DependencyMode>,
    /// Custom vendor name for the add path.
    pub name: Option<String>,
}

impl Default for InstallOptions {
    fn default() -> Self {
        Self {
            version: version::LATEST.to_string(),
            force: false,
            dep_mode: None,
            name: None,
        }
    }
}

/// Result of one vendor's install or update.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstallOutcome {
    pub vendor: String,
    pub old_version: Option<String>,
    pub new_version: String,
    pub changed: bool,
    /// Dependencies that were missing under `warn` mode.
    pub missing_warned: Vec<String>,
}

/// What `remove` is about to do, surfaced before anything is deleted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemovePlan {
    pub vendor: String,
    /// Exactly the paths listed in the vendor's manifest.
    pub files: Vec<String>,
    /// Other installed vendors whose cached dependency snapshots reference
    /// this one; removal needs an explicit override when non-empty.
    pub dependents: Vec<String>,
}

/// One vendor's protection violations found by `check`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Violation {
    pub vendor: String,
    pub paths: Vec<String>,
}

/// Callback receiving per-vendor outcomes as they complete.
pub type OutcomeSink<'s> = dyn FnMut(&InstallOutcome) + 's;

/// Composes the engine components against one repository.
pub struct Orchestrator<'a> {
    remote: &'a dyn Remote,
    layout: StoreLayout,
    registry: VendorRegistry,
    manifests: ManifestStore,
}

impl<'a> Orchestrator<'a> {
    /// Open the orchestrator for a repository root. Pending store
    /// migrations run here, before any operation touches the registry.
    pub fn open(remote: &'a dyn Remote, repo_root: impl Into<PathBuf>) -> Result<Self> {
        let layout = StoreLayout::new(repo_root);
        let registry = VendorRegistry::open(layout.clone())?;
        let manifests = ManifestStore::new(layout.clone());
        Ok(Self {
            remote,
            layout,
            registry,
            manifests,
        })
    }

    pub fn registry(&self) -> &VendorRegistry {
        &self.registry
    }

    pub fn manifests(&self) -> &ManifestStore {
        &self.manifests
    }

    /// `install <target>`: a repo spec (`owner/name`) adds a new vendor, a
    /// bare name updates a registered one, `all` runs the whole batch.
    pub fn install(
        &self,
        target: &str,
        opts: &InstallOptions,
        emit: &mut OutcomeSink<'_>,
    ) -> Result<()> {
        let mut session = InstallSession::new();
        if target == "all" {
            self.install_all(opts, emit)
        } else if target.contains('/') {
            self.install_new(target, opts, &mut session, emit)
        } else {
            self.install_existing(target, opts, &mut session, emit)
        }
    }

    /// `update <target>`: alias of install restricted to registered names.
    pub fn update(
        &self,
        target: &str,
        opts: &InstallOptions,
        emit: &mut OutcomeSink<'_>,
    ) -> Result<()> {
        if target == "all" {
            return self.install_all(opts, emit);
        }
        let mut session = InstallSession::new();
        self.install_existing(target, opts, &mut session, emit)
    }

    /// Install every registered vendor, dependencies first.
    ///
    /// The order comes from the cached dependency snapshots; a cycle aborts
    /// the batch before any vendor runs, and the first fatal error aborts
    /// the remainder.
    pub fn install_all(&self, opts: &InstallOptions, emit: &mut OutcomeSink<'_>) -> Result<()> {
        let vendors = self.registry.records()?;
        if vendors.is_empty() {
            return Ok(());
        }

        let snapshots = self.manifests.all_deps()?;
        let graph = DependencyGraph::from_snapshots(&vendors, &snapshots);
        let order = graph.topological_sort()?;
        debug!(?order, "batch install order");

        for name in order {
            let mut session = InstallSession::new();
            self.install_existing(&name, opts, &mut session, emit)?;
        }
        Ok(())
    }

    fn install_new(
        &self,
        repo: &str,
        opts: &InstallOptions,
        session: &mut InstallSession,
        emit: &mut OutcomeSink<'_>,
    ) -> Result<()> {
        session.enter(repo)?;
        let result = self.install_new_inner(repo, opts, session, emit);
        session.leave(repo);
        result
    }

    fn install_new_inner(
        &self,
        repo: &str,
        opts: &InstallOptions,
        session: &mut InstallSession,
        emit: &mut OutcomeSink<'_>,
    ) -> Result<()> {
        if let Some(existing) = self.registry.find_by_repo(repo)? {
            return Err(Error::AlreadyRegistered {
                repo: repo.to_string(),
                vendor: existing,
            });
        }

        let name = match &opts.name {
            Some(name) => name.clone(),
            None => repo.rsplit('/').next().unwrap_or(repo).to_string(),
        };
        let token = resolve_auth_token(&name, false)?;

        if !self.remote.repo_exists(repo, token.as_deref())? {
            return Err(Error::fetch(repo, "repository not found or not accessible"));
        }

        let resolved =
            version::resolve(self.remote, &name, repo, &opts.version, token.as_deref())?;
        info!(vendor = %name, repo, version = %resolved, "adding vendor");

        let declaration = self.fetch_declaration_at(repo, &resolved, token.as_deref())?;
        let missing_warned =
            self.resolve_dependencies(&name, declaration.as_ref(), opts, session, emit)?;

        let record = VendorRecord {
            install_branch: Some(format!("chore/install-{name}")),
            ..VendorRecord::new(repo)
        };

        let runner = ContractRunner::new(self.remote, self.layout.clone());
        let manifest = runner.run(&name, &record, &resolved, token.as_deref())?;
        self.persist_install(&name, &record, &resolved, manifest.as_ref(), declaration.as_ref())?;

        emit(&InstallOutcome {
            vendor: name,
            old_version: None,
            new_version: resolved,
            changed: true,
            missing_warned,
        });
        Ok(())
    }

    fn install_existing(
        &self,
        name: &str,
        opts: &InstallOptions,
        session: &mut InstallSession,
        emit: &mut OutcomeSink<'_>,
    ) -> Result<()> {
        let Some(record) = self.registry.get(name)? else {
            return Err(Error::UnknownVendor {
                vendor: name.to_string(),
                known: self.registry.list()?,
            });
        };

        let token = resolve_auth_token(name, record.private)?;
        let resolved = version::resolve(
            self.remote,
            name,
            &record.repo,
            &opts.version,
            token.as_deref(),
        )?;
        let current =
            version::current_version(&self.manifests, &record, name, self.layout.repo_root())?;

        if !opts.force && current.as_deref() == Some(resolved.as_str()) {
            // Already up to date: the contract does not run again.
            debug!(vendor = name, version = %resolved, "already up to date");
            emit(&InstallOutcome {
                vendor: name.to_string(),
                old_version: current,
                new_version: resolved,
                changed: false,
                missing_warned: Vec::new(),
            });
            return Ok(());
        }

        session.enter(&record.repo)?;
        let result = self.install_existing_inner(
            name, &record, &resolved, current, opts, token.as_deref(), session, emit,
        );
        session.leave(&record.repo);
        result
    }

    #[allow(clippy::too_many_arguments)]
    fn install_existing_inner(
        &self,
        name: &str,
        record: &VendorRecord,
        resolved: &str,
        current: Option<String>,
        opts: &InstallOptions,
        token: Option<&str>,
        session: &mut InstallSession,
        emit: &mut OutcomeSink<'_>,
    ) -> Result<()> {
        info!(vendor = name, from = current.as_deref().unwrap_or("none"), to = resolved, "installing");

        let declaration = self.fetch_declaration_at(&record.repo, resolved, token)?;
        let missing_warned =
            self.resolve_dependencies(name, declaration.as_ref(), opts, session, emit)?;

        let runner = ContractRunner::new(self.remote, self.layout.clone());
        let manifest = runner.run(name, record, resolved, token)?;
        self.persist_install(name, record, resolved, manifest.as_ref(), declaration.as_ref())?;

        emit(&InstallOutcome {
            vendor: name.to_string(),
            old_version: current,
            new_version: resolved.to_string(),
            changed: true,
            missing_warned,
        });
        Ok(())
    }

    /// Persist a completed contract run: manifest (when one was produced),
    /// dependency snapshot, and the registry record.
    fn persist_install(
        &self,
        name: &str,
        record: &VendorRecord,
        resolved: &str,
        manifest: Option<&Manifest>,
        declaration: Option<&DependencyDeclaration>,
    ) -> Result<()> {
        if let Some(manifest) = manifest {
            self.manifests.save(manifest)?;
        } else {
            // Legacy run: no manifest, but the version marker still moves.
            io::write_atomic(
                &self.layout.manifest_version(name),
                format!("{resolved}\n").as_bytes(),
            )?;
        }
        let dep_names = declaration.map(|d| d.names());
        self.manifests.save_deps(name, dep_names.as_deref())?;
        self.registry.put(name, record)?;
        Ok(())
    }

    /// Try the declaration at the tagged ref, the bare version, then HEAD.
    fn fetch_declaration_at(
        &self,
        repo: &str,
        resolved: &str,
        token: Option<&str>,
    ) -> Result<Option<DependencyDeclaration>> {
        let tagged = format!("v{resolved}");
        for git_ref in [tagged.as_str(), resolved, "HEAD"] {
            if let Some(declaration) = fetch_declaration(self.remote, repo, git_ref, token)? {
                return Ok(Some(declaration));
            }
        }
        Ok(None)
    }

    /// Apply the dependency policy before a vendor's contract runs.
    ///
    /// Returns the names reported (but not blocking) under `warn` mode.
    fn resolve_dependencies(
        &self,
        vendor: &str,
        declaration: Option<&DependencyDeclaration>,
        opts: &InstallOptions,
        session: &mut InstallSession,
        emit: &mut OutcomeSink<'_>,
    ) -> Result<Vec<String>> {
        let mode = self.dependency_mode(opts)?;
        if mode == DependencyMode::Skip {
            return Ok(Vec::new());
        }
        let Some(declaration) = declaration else {
            return Ok(Vec::new());
        };

        let registered = self.registry.records()?;
        let (satisfied, missing) = declaration.partition_installed(&registered);
        debug!(
            vendor,
            satisfied = satisfied.len(),
            missing = missing.len(),
            "dependency check"
        );
        if missing.is_empty() {
            return Ok(Vec::new());
        }

        match mode {
            DependencyMode::Error => Err(Error::MissingDependency {
                vendor: vendor.to_string(),
                missing: missing.into_iter().map(|d| d.name).collect(),
            }),
            DependencyMode::Warn => {
                let names: Vec<String> = missing.into_iter().map(|d| d.name).collect();
                warn!(vendor, missing = ?names, "missing dependencies (continuing)");
                Ok(names)
            }
            DependencyMode::Install => {
                for Dependency { name, repo } in missing {
                    info!(vendor, dep = %name, repo = %repo, "auto-installing dependency");
                    let dep_opts = InstallOptions {
                        version: version::LATEST.to_string(),
                        force: false,
                        dep_mode: opts.dep_mode,
                        name: None,
                    };
                    self.install_new(&repo, &dep_opts, session, emit)?;
                }
                Ok(Vec::new())
            }
            DependencyMode::Skip => Ok(Vec::new()),
        }
    }

    fn dependency_mode(&self, opts: &InstallOptions) -> Result<DependencyMode> {
        if let Some(mode) = opts.dep_mode {
            return Ok(mode);
        }
        if let Some(raw) = self.registry.dependency_mode_default()? {
            match raw.parse() {
                Ok(mode) => return Ok(mode),
                Err(message) => warn!(%message, "ignoring store dependency_mode"),
            }
        }
        Ok(DependencyMode::default())
    }

    // -- remove ------------------------------------------------------------

    /// Work out what removing a vendor would delete, without deleting
    /// anything. Fails fast for unknown vendors and for vendors with no
    /// manifest (there is nothing safe to delete).
    pub fn plan_remove(&self, name: &str) -> Result<RemovePlan> {
        let known = self.registry.list()?;
        if !known.contains(&name.to_string()) {
            return Err(Error::UnknownVendor {
                vendor: name.to_string(),
                known,
            });
        }

        let Some(manifest) = self.manifests.load(name)? else {
            return Err(Error::NoManifest {
                vendor: name.to_string(),
            });
        };

        let dependents: Vec<String> = self
            .manifests
            .all_deps()?
            .into_iter()
            .filter(|(vendor, deps)| vendor != name && deps.iter().any(|d| d == name))
            .map(|(vendor, _)| vendor)
            .collect();

        Ok(RemovePlan {
            vendor: name.to_string(),
            files: manifest.sorted_paths(),
            dependents,
        })
    }

    /// Delete exactly the planned files, the vendor's store records, and its
    /// package directory. Returns how many files were actually removed.
    pub fn execute_remove(&self, plan: &RemovePlan) -> Result<usize> {
        let root = self.layout.repo_root();
        let mut removed = 0;
        for file in &plan.files {
            let path = root.join(file);
            if io::remove_file_opt(&path)? {
                removed += 1;
            }
            io::prune_empty_parents(&path, root)?;
        }

        let pkg_dir = self.layout.vendor_pkg_dir(&plan.vendor);
        if pkg_dir.exists() {
            std::fs::remove_dir_all(&pkg_dir).map_err(|e| Error::io(&pkg_dir, e))?;
        }
        io::prune_empty_parents(&pkg_dir.join("removed"), root)?;

        self.manifests.delete(&plan.vendor)?;
        self.registry.remove(&plan.vendor)?;
        info!(vendor = %plan.vendor, files = removed, "vendor removed");
        Ok(removed)
    }

    // -- check -------------------------------------------------------------

    /// Validate a candidate changeset against every vendor's protection
    /// set. Read-only; returns one entry per vendor with violations.
    pub fn check(&self, changed: &[String], branch: &str) -> Result<Vec<Violation>> {
        let mut violations = Vec::new();
        for (name, record) in self.registry.records()? {
            let manifest = self.manifests.load(&name)?;
            let paths = protect::check_vendor(&name, &record, manifest.as_ref(), changed, branch)?;
            if !paths.is_empty() {
                violations.push(Violation {
                    vendor: name,
                    paths,
                });
            }
        }
        Ok(violations)
    }
}

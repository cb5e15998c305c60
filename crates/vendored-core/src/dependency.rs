//! Inter-vendor dependency declarations, ordering, and cycle detection.
//!
//! A vendor may publish a `deps.json` at its repository root mapping each
//! required vendor name to at least that dependency's remote repository
//! identifier. Checks are presence-only; no version ranges are evaluated.
//!
//! Two cycle defenses exist at different levels:
//!
//! - [`InstallSession`] is the recursion-stack set threaded through the
//!   auto-install chain, catching cross-branch cycles regardless of depth.
//! - [`DependencyGraph`] orders a whole batch (`install all`) topologically
//!   up front and rejects cyclic stores before any vendor runs.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;

use serde_json::Value;
use tracing::warn;

use crate::error::{Error, Result};
use crate::layout::DEPS_FILE;
use crate::registry::VendorRecord;
use crate::remote::Remote;

/// Policy applied when a declared dependency is not installed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DependencyMode {
    /// Abort, reporting every missing dependency at once.
    #[default]
    Error,
    /// Report missing dependencies but continue.
    Warn,
    /// Recursively install missing dependencies in declaration order.
    Install,
    /// Bypass dependency checking entirely.
    Skip,
}

impl FromStr for DependencyMode {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "error" => Ok(Self::Error),
            "warn" => Ok(Self::Warn),
            "install" => Ok(Self::Install),
            "skip" => Ok(Self::Skip),
            other => Err(format!(
                "invalid dependency mode '{other}' (expected error, warn, install, or skip)"
            )),
        }
    }
}

impl fmt::Display for DependencyMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Error => "error",
            Self::Warn => "warn",
            Self::Install => "install",
            Self::Skip => "skip",
        };
        f.write_str(s)
    }
}

/// One declared dependency: required vendor name plus its repository.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dependency {
    pub name: String,
    pub repo: String,
}

/// A vendor's parsed dependency declaration, in declaration order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DependencyDeclaration {
    entries: Vec<Dependency>,
}

impl DependencyDeclaration {
    pub fn entries(&self) -> &[Dependency] {
        &self.entries
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn names(&self) -> Vec<String> {
        self.entries.iter().map(|d| d.name.clone()).collect()
    }

    /// Parse declaration bytes. Entries without a usable `repo` are dropped.
    pub fn parse(bytes: &[u8]) -> Option<Self> {
        let value: Value = serde_json::from_slice(bytes).ok()?;
        let map = value.as_object()?;
        let entries = map
            .iter()
            .filter_map(|(name, entry)| {
                let repo = entry.get("repo")?.as_str()?;
                Some(Dependency {
                    name: name.clone(),
                    repo: repo.to_string(),
                })
            })
            .collect();
        Some(Self { entries })
    }

    /// Split into (satisfied, missing) against the registered vendors.
    ///
    /// A dependency is satisfied when any registered vendor matches it by
    /// name or by repository identifier, so installs under a custom name
    /// still count.
    pub fn partition_installed(
        &self,
        registered: &BTreeMap<String, VendorRecord>,
    ) -> (Vec<Dependency>, Vec<Dependency>) {
        self.entries.iter().cloned().partition(|dep| {
            registered.contains_key(&dep.name)
                || registered.values().any(|r| r.repo == dep.repo)
        })
    }
}

/// Fetch and parse a vendor's dependency declaration at a ref.
///
/// Absence is not an error; malformed content is logged and treated as
/// absent.
pub fn fetch_declaration(
    remote: &dyn Remote,
    repo: &str,
    git_ref: &str,
    token: Option<&str>,
) -> Result<Option<DependencyDeclaration>> {
    let Some(bytes) = remote.fetch_file(repo, git_ref, DEPS_FILE, token)? else {
        return Ok(None);
    };
    match DependencyDeclaration::parse(&bytes) {
        Some(declaration) => Ok(Some(declaration)),
        None => {
            warn!(repo, "ignoring malformed {DEPS_FILE}");
            Ok(None)
        }
    }
}

/// The in-flight set of repositories being installed in one recursive call
/// chain. Exists only for cycle detection; discarded when the top-level
/// operation completes or fails.
#[derive(Debug, Default)]
pub struct InstallSession {
    stack: Vec<String>,
}

impl InstallSession {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, repo: &str) -> bool {
        self.stack.iter().any(|r| r == repo)
    }

    /// Push a repository onto the recursion stack, failing with the full
    /// chain when it is already being installed.
    pub fn enter(&mut self, repo: &str) -> Result<()> {
        if self.contains(repo) {
            let mut chain: Vec<String> = self.stack.clone();
            chain.push(repo.to_string());
            return Err(Error::CircularDependency { chain });
        }
        self.stack.push(repo.to_string());
        Ok(())
    }

    /// Pop the most recent entry; called on both success and failure paths.
    pub fn leave(&mut self, repo: &str) {
        if self.stack.last().map(String::as_str) == Some(repo) {
            self.stack.pop();
        } else {
            // Out-of-order unwind; drop the entry wherever it is.
            self.stack.retain(|r| r != repo);
        }
    }
}

/// Directed dependency graph over registered vendors, for batch ordering.
///
/// Edges point from dependent to dependency; the sort returns dependencies
/// before their dependents, ties broken by vendor name.
#[derive(Debug, Clone, Default)]
pub struct DependencyGraph {
    nodes: BTreeSet<String>,
    /// `key` depends on each name in its value set.
    edges: BTreeMap<String, BTreeSet<String>>,
}

impl DependencyGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_node(&mut self, name: impl Into<String>) {
        self.nodes.insert(name.into());
    }

    /// Declare that `from` depends on `to`. Edges to unknown nodes are
    /// ignored at sort time (the dependency may simply not be installed).
    pub fn add_edge(&mut self, from: &str, to: &str) {
        self.edges
            .entry(from.to_string())
            .or_default()
            .insert(to.to_string());
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Build the batch graph: one node per registered vendor, edges from the
    /// cached dependency snapshots. Snapshot names that are not registered
    /// vendors produce no edge.
    pub fn from_snapshots(
        vendors: &BTreeMap<String, VendorRecord>,
        snapshots: &[(String, Vec<String>)],
    ) -> Self {
        let mut graph = Self::new();
        for name in vendors.keys() {
            graph.add_node(name.clone());
        }
        for (vendor, deps) in snapshots {
            if !vendors.contains_key(vendor) {
                continue;
            }
            for dep in deps {
                if vendors.contains_key(dep) {
                    graph.add_edge(vendor, dep);
                }
            }
        }
        graph
    }

    /// Kahn's algorithm, dependency-first, deterministic.
    ///
    /// Zero-in-degree candidates are held in an ordered set so ties always
    /// resolve to the lexically smallest name.
    pub fn topological_sort(&self) -> Result<Vec<String>> {
        let mut dependents: BTreeMap<&str, Vec<&str>> = BTreeMap::new();
        let mut in_degree: BTreeMap<&str, usize> = BTreeMap::new();
        for name in &self.nodes {
            in_degree.insert(name.as_str(), 0);
        }
        for (from, deps) in &self.edges {
            if !self.nodes.contains(from) {
                continue;
            }
            for dep in deps {
                if !self.nodes.contains(dep) {
                    continue;
                }
                dependents.entry(dep.as_str()).or_default().push(from.as_str());
                *in_degree.entry(from.as_str()).or_insert(0) += 1;
            }
        }

        let mut ready: BTreeSet<&str> = in_degree
            .iter()
            .filter(|&(_, &deg)| deg == 0)
            .map(|(&name, _)| name)
            .collect();

        let mut order = Vec::with_capacity(self.nodes.len());
        loop {
            let Some(&current) = ready.iter().next() else {
                break;
            };
            ready.remove(current);
            order.push(current.to_string());

            for &dependent in dependents.get(current).into_iter().flatten() {
                if let Some(degree) = in_degree.get_mut(dependent) {
                    *degree = degree.saturating_sub(1);
                    if *degree == 0 {
                        ready.insert(dependent);
                    }
                }
            }
        }

        if order.len() != self.nodes.len() {
            let placed: BTreeSet<&str> = order.iter().map(String::as_str).collect();
            let chain: Vec<String> = self
                .nodes
                .iter()
                .filter(|n| !placed.contains(n.as_str()))
                .cloned()
                .collect();
            return Err(Error::CircularDependency { chain });
        }

        Ok(order)
    }
}

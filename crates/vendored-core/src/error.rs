//! Error types for vendored-core

use std::path::PathBuf;

/// Result type for vendored-core operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while managing vendors.
///
/// Every variant is terminal for the operation it occurs in; nothing here is
/// retried. [`Error::kind`] returns a stable identifier so callers can print
/// failures as single-line `kind: message` diagnostics.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Neither a release tag nor a version marker file could be found.
    #[error("cannot resolve a version for '{vendor}' ({repo}): no release and no VERSION file")]
    VersionUnresolvable { vendor: String, repo: String },

    /// The vendor's install routine exited with a nonzero status.
    ///
    /// Partial filesystem writes made by the routine are left in place.
    #[error(
        "install script for '{vendor}' failed{}; partial files may remain on disk",
        .exit_code.map(|c| format!(" with exit code {c}")).unwrap_or_default()
    )]
    InstallScriptFailed {
        vendor: String,
        exit_code: Option<i32>,
    },

    /// The install routine exited 0 but wrote no manifest, and the vendor is
    /// not in pre-manifest compatibility mode.
    #[error("install script for '{vendor}' wrote no manifest (contract violation)")]
    ManifestMissing { vendor: String },

    /// A manifest listed paths that do not exist on disk.
    #[error("manifest for '{vendor}' lists missing files: {}", .missing.join(", "))]
    ManifestInvalid {
        vendor: String,
        missing: Vec<String>,
    },

    /// An auto-install recursion reached a repository already being installed.
    #[error("circular dependency: {}", .chain.join(" -> "))]
    CircularDependency { chain: Vec<String> },

    /// Declared dependencies are not installed (dependency mode `error`).
    #[error("'{vendor}' has missing dependencies: {}", .missing.join(", "))]
    MissingDependency {
        vendor: String,
        missing: Vec<String>,
    },

    /// Operation on a vendor name that is not registered.
    #[error("unknown vendor '{vendor}'; known vendors: {}", if .known.is_empty() { "(none)".to_string() } else { .known.join(", ") })]
    UnknownVendor { vendor: String, known: Vec<String> },

    /// Remove was requested for a vendor that has no manifest.
    #[error("no manifest recorded for '{vendor}'; nothing can be removed safely")]
    NoManifest { vendor: String },

    /// A protected, non-allowed path was changed outside the install branch.
    #[error("'{vendor}' protected files changed: {}", .paths.join(", "))]
    ProtectionViolation { vendor: String, paths: Vec<String> },

    /// Add was requested for a repository that is already registered.
    #[error("{repo} is already registered as vendor '{vendor}'")]
    AlreadyRegistered { repo: String, vendor: String },

    /// A private vendor requires VENDOR_PAT and it is not set.
    #[error("private vendor '{vendor}' requires the VENDOR_PAT environment variable")]
    AuthTokenMissing { vendor: String },

    /// The remote fetch collaborator failed.
    #[error("fetch failed for {repo}: {message}")]
    Fetch { repo: String, message: String },

    /// I/O error against the on-disk store or working tree.
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Lock acquisition failed during an atomic write.
    #[error("lock acquisition failed for {path}")]
    LockFailed { path: PathBuf },

    /// A store file contains invalid JSON.
    #[error("failed to parse {path}: {message}")]
    StoreParse { path: PathBuf, message: String },

    /// A configured glob pattern does not compile.
    #[error("invalid glob pattern '{pattern}': {message}")]
    InvalidPattern { pattern: String, message: String },

    /// JSON serialization error
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl Error {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    pub fn fetch(repo: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Fetch {
            repo: repo.into(),
            message: message.into(),
        }
    }

    /// Stable failure category, used for `kind: message` CI annotations.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::VersionUnresolvable { .. } => "VersionUnresolvable",
            Self::InstallScriptFailed { .. } => "InstallScriptFailed",
            Self::ManifestMissing { .. } => "ManifestMissing",
            Self::ManifestInvalid { .. } => "ManifestInvalid",
            Self::CircularDependency { .. } => "CircularDependency",
            Self::MissingDependency { .. } => "MissingDependency",
            Self::UnknownVendor { .. } => "UnknownVendor",
            Self::NoManifest { .. } => "NoManifest",
            Self::ProtectionViolation { .. } => "ProtectionViolation",
            Self::AlreadyRegistered { .. } => "AlreadyRegistered",
            Self::AuthTokenMissing { .. } => "AuthTokenMissing",
            Self::Fetch { .. } => "Fetch",
            Self::Io { .. } | Self::LockFailed { .. } => "Io",
            Self::StoreParse { .. } | Self::Json(_) => "StoreParse",
            Self::InvalidPattern { .. } => "InvalidPattern",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn circular_dependency_names_full_chain() {
        let err = Error::CircularDependency {
            chain: vec!["a".into(), "b".into(), "a".into()],
        };
        assert_eq!(format!("{err}"), "circular dependency: a -> b -> a");
        assert_eq!(err.kind(), "CircularDependency");
    }

    #[test]
    fn unknown_vendor_lists_known_names() {
        let err = Error::UnknownVendor {
            vendor: "ghost".into(),
            known: vec!["pearls".into(), "semver".into()],
        };
        let msg = format!("{err}");
        assert!(msg.contains("pearls, semver"), "got: {msg}");
    }

    #[test]
    fn unknown_vendor_with_empty_registry() {
        let err = Error::UnknownVendor {
            vendor: "ghost".into(),
            known: vec![],
        };
        assert!(format!("{err}").contains("(none)"));
    }

    #[test]
    fn messages_are_single_line() {
        let errors = [
            Error::VersionUnresolvable {
                vendor: "tool".into(),
                repo: "owner/tool".into(),
            },
            Error::ManifestInvalid {
                vendor: "tool".into(),
                missing: vec![".tool/a".into(), ".tool/b".into()],
            },
            Error::ProtectionViolation {
                vendor: "tool".into(),
                paths: vec![".tool/x".into()],
            },
        ];
        for err in errors {
            let line = format!("{}: {}", err.kind(), err);
            assert!(!line.contains('\n'), "multi-line diagnostic: {line}");
        }
    }
}

//! Vendor lifecycle engine.
//!
//! Manages third-party tool bundles ("vendors") inside a consumer git
//! repository: resolving versions, running the vendor's install routine
//! under a fixed environment contract, recording installed files in
//! manifests, deriving hand-edit protection from those records, resolving
//! inter-vendor dependencies, and removing vendors cleanly.
//!
//! # Architecture
//!
//! ```text
//!                 CLI
//!                  |
//!            Orchestrator
//!                  |
//!   +------+-------+-------+--------+
//!   |      |       |       |        |
//! version contract manifest protect dependency
//!   |      |       |                 |
//!   +------+---- remote ----+--------+
//!                  |
//!             registry / io
//! ```
//!
//! The remote fetch layer is an external collaborator behind the
//! [`remote::Remote`] trait; everything else operates on the `.vendored/`
//! store at the repository root.

pub mod contract;
pub mod dependency;
pub mod error;
pub mod io;
pub mod layout;
pub mod manifest;
pub mod orchestrator;
pub mod protect;
pub mod registry;
pub mod remote;
pub mod version;

pub use contract::ContractRunner;
pub use dependency::{
    Dependency, DependencyDeclaration, DependencyGraph, DependencyMode, InstallSession,
};
pub use error::{Error, Result};
pub use layout::StoreLayout;
pub use manifest::{Manifest, ManifestStore};
pub use orchestrator::{
    InstallOptions, InstallOutcome, Orchestrator, RemovePlan, Violation,
};
pub use registry::{VendorRecord, VendorRegistry};
pub use remote::{GhRemote, Remote, resolve_auth_token};

//! Version resolution for vendors.
//!
//! The concrete ref to install comes from, in order: an explicit request,
//! the latest release tag, or a `VERSION` marker file at the vendor repo
//! root. The currently-installed version comes from the manifest store, with
//! a legacy fallback to the vendor's `<dotdir>/.version` marker.

use tracing::debug;

use crate::error::{Error, Result};
use crate::io;
use crate::layout::VERSION_MARKER_FILE;
use crate::manifest::ManifestStore;
use crate::registry::VendorRecord;
use crate::remote::Remote;

/// Requested version meaning "whatever is newest".
pub const LATEST: &str = "latest";

/// Resolve the concrete version to install for a vendor.
///
/// An explicit non-`latest` request is used as-is; its existence is
/// validated when the install script is fetched at that ref. `latest` tries
/// release-tag discovery, then the `VERSION` file, and fails with
/// [`Error::VersionUnresolvable`] when both come up empty.
pub fn resolve(
    remote: &dyn Remote,
    vendor: &str,
    repo: &str,
    requested: &str,
    token: Option<&str>,
) -> Result<String> {
    if requested != LATEST {
        return Ok(requested.to_string());
    }

    if let Some(tag) = remote.latest_release_tag(repo, token)? {
        let version = tag.strip_prefix('v').unwrap_or(&tag).to_string();
        debug!(vendor, %version, "version resolved from release tag");
        return Ok(version);
    }

    if let Some(bytes) = remote.fetch_file(repo, "HEAD", VERSION_MARKER_FILE, token)? {
        let version = String::from_utf8_lossy(&bytes).trim().to_string();
        if !version.is_empty() {
            debug!(vendor, %version, "version resolved from VERSION marker");
            return Ok(version);
        }
    }

    Err(Error::VersionUnresolvable {
        vendor: vendor.to_string(),
        repo: repo.to_string(),
    })
}

/// Currently-installed version of a vendor, if any.
///
/// The manifest store is authoritative; vendors installed under the
/// pre-manifest contract are read from their `<dotdir>/.version` marker.
pub fn current_version(
    manifests: &ManifestStore,
    record: &VendorRecord,
    vendor: &str,
    repo_root: &std::path::Path,
) -> Result<Option<String>> {
    if let Some(version) = manifests.version(vendor)? {
        return Ok(Some(version));
    }

    let Some(dotdir) = record.dotdir() else {
        return Ok(None);
    };
    let marker = repo_root.join(dotdir).join(".version");
    Ok(io::read_text_opt(&marker)?
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty()))
}

//! Remote repository access.
//!
//! The engine never talks to a hosting provider directly; everything goes
//! through the [`Remote`] trait so the fetch layer stays an external
//! collaborator. [`GhRemote`] is the default implementation and shells out to
//! the `gh` CLI. Fetch is a single synchronous call per lookup; transient
//! failures are not retried here.

use std::process::Command;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use tracing::debug;

use crate::error::{Error, Result};

/// Abstract fetch capability against a vendor's remote repository.
///
/// Lookups that can legitimately be absent (`latest_release_tag`,
/// `fetch_file`) return `Ok(None)` for not-found; `Err` is reserved for the
/// fetch layer itself failing.
pub trait Remote {
    /// Whether the repository exists and is reachable with the given token.
    fn repo_exists(&self, repo: &str, token: Option<&str>) -> Result<bool>;

    /// Tag name of the latest release, if any.
    fn latest_release_tag(&self, repo: &str, token: Option<&str>) -> Result<Option<String>>;

    /// Raw contents of `path` at `git_ref`, or `None` when the file is absent.
    fn fetch_file(
        &self,
        repo: &str,
        git_ref: &str,
        path: &str,
        token: Option<&str>,
    ) -> Result<Option<Vec<u8>>>;
}

/// Remote implementation backed by the `gh` CLI.
#[derive(Debug, Clone, Default)]
pub struct GhRemote;

impl GhRemote {
    pub fn new() -> Self {
        Self
    }

    fn gh(&self, args: &[String], token: Option<&str>, repo: &str) -> Result<Option<String>> {
        let mut cmd = Command::new("gh");
        cmd.args(args);
        if let Some(token) = token {
            cmd.env("GH_TOKEN", token);
        }

        debug!(repo, ?args, "gh api call");
        let output = cmd
            .output()
            .map_err(|e| Error::fetch(repo, format!("failed to run gh: {e}")))?;

        if output.status.success() {
            Ok(Some(String::from_utf8_lossy(&output.stdout).into_owned()))
        } else {
            // gh exits nonzero for 404s as well as real failures; callers
            // treat None as "absent" and validate existence separately.
            debug!(
                repo,
                stderr = %String::from_utf8_lossy(&output.stderr).trim(),
                "gh api call returned nonzero"
            );
            Ok(None)
        }
    }
}

impl Remote for GhRemote {
    fn repo_exists(&self, repo: &str, token: Option<&str>) -> Result<bool> {
        let args = vec![
            "api".to_string(),
            format!("repos/{repo}"),
            "--jq".to_string(),
            ".full_name".to_string(),
        ];
        Ok(self.gh(&args, token, repo)?.is_some())
    }

    fn latest_release_tag(&self, repo: &str, token: Option<&str>) -> Result<Option<String>> {
        let args = vec![
            "api".to_string(),
            format!("repos/{repo}/releases/latest"),
            "--jq".to_string(),
            ".tag_name".to_string(),
        ];
        let tag = self
            .gh(&args, token, repo)?
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty());
        Ok(tag)
    }

    fn fetch_file(
        &self,
        repo: &str,
        git_ref: &str,
        path: &str,
        token: Option<&str>,
    ) -> Result<Option<Vec<u8>>> {
        let args = vec![
            "api".to_string(),
            format!("repos/{repo}/contents/{path}?ref={git_ref}"),
            "--jq".to_string(),
            ".content".to_string(),
        ];
        let Some(encoded) = self.gh(&args, token, repo)? else {
            return Ok(None);
        };
        let compact: String = encoded.chars().filter(|c| !c.is_whitespace()).collect();
        let bytes = BASE64
            .decode(compact.as_bytes())
            .map_err(|e| Error::fetch(repo, format!("invalid base64 content for {path}: {e}")))?;
        Ok(Some(bytes))
    }
}

/// Resolve the auth token for a vendor.
///
/// Private vendors require `VENDOR_PAT`; public vendors use `GITHUB_TOKEN`
/// then `GH_TOKEN` and may proceed without one.
pub fn resolve_auth_token(vendor: &str, private: bool) -> Result<Option<String>> {
    fn env_nonempty(key: &str) -> Option<String> {
        std::env::var(key).ok().filter(|v| !v.is_empty())
    }

    if private {
        return match env_nonempty("VENDOR_PAT") {
            Some(token) => Ok(Some(token)),
            None => Err(Error::AuthTokenMissing {
                vendor: vendor.to_string(),
            }),
        };
    }

    Ok(env_nonempty("GITHUB_TOKEN").or_else(|| env_nonempty("GH_TOKEN")))
}

#[cfg(test)]
mod tests {
    use super::*;

    // Env-var scenarios share process state, so they run in one test body.
    #[test]
    fn auth_token_resolution_order() {
        unsafe {
            std::env::remove_var("VENDOR_PAT");
            std::env::remove_var("GITHUB_TOKEN");
            std::env::remove_var("GH_TOKEN");
        }

        // Public vendor without any token: fine, unauthenticated.
        assert_eq!(resolve_auth_token("tool", false).unwrap(), None);

        // Private vendor without VENDOR_PAT: hard error before any fetch.
        let err = resolve_auth_token("tool", true).unwrap_err();
        assert_eq!(err.kind(), "AuthTokenMissing");

        unsafe { std::env::set_var("GH_TOKEN", "gh-tok") };
        assert_eq!(
            resolve_auth_token("tool", false).unwrap().as_deref(),
            Some("gh-tok")
        );

        // GITHUB_TOKEN wins over GH_TOKEN for public vendors.
        unsafe { std::env::set_var("GITHUB_TOKEN", "github-tok") };
        assert_eq!(
            resolve_auth_token("tool", false).unwrap().as_deref(),
            Some("github-tok")
        );

        // Private vendors use VENDOR_PAT only.
        unsafe { std::env::set_var("VENDOR_PAT", "pat-secret") };
        assert_eq!(
            resolve_auth_token("tool", true).unwrap().as_deref(),
            Some("pat-secret")
        );

        unsafe {
            std::env::remove_var("VENDOR_PAT");
            std::env::remove_var("GITHUB_TOKEN");
            std::env::remove_var("GH_TOKEN");
        }
    }

    #[test]
    fn base64_content_decodes_with_embedded_newlines() {
        // gh api returns padded standard base64 broken across lines
        let encoded = "aGVs\nbG8g\nd29y\nbGQ=\n";
        let compact: String = encoded.chars().filter(|c| !c.is_whitespace()).collect();
        assert_eq!(BASE64.decode(compact.as_bytes()).unwrap(), b"hello world");
    }
}

use super::{FilePathManifest, git};
use crate::Result;
use ohno::{EnrichableExt, IntoAppError, bail};
use std::fs;
use std::path::Path;
use std::time::Instant;
use url::Url;

const LOG_TARGET: &str = "  acquirer";

/// How much of a repository gets materialized.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AcquisitionMode {
    /// Every file of the default branch head
    Full,

    /// Only the paths listed in the manifest
    Sparse,
}

impl AcquisitionMode {
    #[must_use]
    pub const fn for_manifest(manifest: Option<&FilePathManifest>) -> Self {
        if manifest.is_some() { Self::Sparse } else { Self::Full }
    }
}

/// What an acquisition actually did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Acquisition {
    Fetched(AcquisitionMode),

    /// The target path already existed and was left untouched
    AlreadyPresent,
}

/// Materializes a local working copy of a repository.
///
/// Implementations must treat an existing `target` as already acquired and never
/// overwrite it.
pub trait Acquirer: Send + Sync + 'static {
    fn acquire(
        &self,
        address: &str,
        manifest: Option<&FilePathManifest>,
        target: &Path,
    ) -> impl Future<Output = Result<Acquisition>> + Send;
}

/// Acquires workspaces with the `git` command line.
#[derive(Debug, Clone, Copy, Default)]
pub struct GitAcquirer;

impl Acquirer for GitAcquirer {
    async fn acquire(&self, address: &str, manifest: Option<&FilePathManifest>, target: &Path) -> Result<Acquisition> {
        if fs::symlink_metadata(target).is_ok() {
            log::debug!(target: LOG_TARGET, "Workspace '{}' already present, not fetching '{address}'", target.display());
            return Ok(Acquisition::AlreadyPresent);
        }

        validate_address(address)?;

        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent).into_app_err_with(|| format!("could not create directory '{}'", parent.display()))?;
        }

        let start_time = Instant::now();
        let mode = AcquisitionMode::for_manifest(manifest);
        let result = match manifest {
            Some(manifest) => git::clone_sparse(target, address, manifest.paths()).await,
            None => git::clone_full(target, address).await,
        };

        if let Err(e) = result {
            discard_partial_workspace(target);
            return Err(e.enrich_with(|| format!("acquiring '{address}' into '{}'", target.display())));
        }

        log::debug!(
            target: LOG_TARGET,
            "Acquired '{address}' ({mode:?}) in {:.3}s",
            start_time.elapsed().as_secs_f64()
        );

        Ok(Acquisition::Fetched(mode))
    }
}

/// Reject addresses git would misread, such as option-looking strings or bare words.
pub fn validate_address(address: &str) -> Result<()> {
    let address = address.trim();

    if address.is_empty() {
        bail!("empty repository address");
    }

    if address.starts_with('-') {
        bail!("malformed repository address '{address}'");
    }

    if let Ok(url) = Url::parse(address) {
        return match url.scheme() {
            "http" | "https" | "git" | "ssh" | "file" => Ok(()),
            other => Err(ohno::app_err!("unsupported scheme '{other}' in repository address '{address}'")),
        };
    }

    // scp-like syntax, e.g. git@github.com:owner/repo.git
    if let Some((host, path)) = address.split_once(':')
        && !host.is_empty()
        && !host.contains('/')
        && !path.is_empty()
    {
        return Ok(());
    }

    bail!("malformed repository address '{address}'")
}

fn discard_partial_workspace(target: &Path) {
    if fs::symlink_metadata(target).is_ok()
        && let Err(e) = fs::remove_dir_all(target)
    {
        log::warn!(target: LOG_TARGET, "Could not remove partial workspace '{}': {e:#}", target.display());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mode_follows_manifest() {
        assert_eq!(AcquisitionMode::for_manifest(None), AcquisitionMode::Full);
        assert_eq!(
            AcquisitionMode::for_manifest(Some(&FilePathManifest::new(["a.rs"]))),
            AcquisitionMode::Sparse
        );
    }

    #[test]
    fn test_validate_address() {
        validate_address("https://android.googlesource.com/platform/external/rust/crates/libc").unwrap();
        validate_address("git@github.com:rust-lang/libc.git").unwrap();
        validate_address("file:///srv/git/repo").unwrap();

        let _ = validate_address("").unwrap_err();
        let _ = validate_address("--upload-pack=evil").unwrap_err();
        let _ = validate_address("not a url").unwrap_err();
        let _ = validate_address("mailto:someone@example.com").unwrap_err();
    }

    #[tokio::test]
    #[cfg_attr(miri, ignore = "Miri cannot call GetTempPathW")]
    async fn test_existing_target_is_already_present() {
        let temp_dir = tempfile::tempdir().unwrap();
        let target = temp_dir.path().join("repo");
        fs::create_dir(&target).unwrap();
        fs::write(target.join("marker"), "keep me").unwrap();

        let outcome = GitAcquirer.acquire("not even valid", None, &target).await.unwrap();

        assert_eq!(outcome, Acquisition::AlreadyPresent);
        assert_eq!(fs::read_to_string(target.join("marker")).unwrap(), "keep me");
    }

    #[tokio::test]
    #[cfg_attr(miri, ignore = "Miri cannot call GetTempPathW")]
    async fn test_malformed_address_fails_without_creating_workspace() {
        let temp_dir = tempfile::tempdir().unwrap();
        let target = temp_dir.path().join("repo");

        let result = GitAcquirer.acquire("-oops", None, &target).await;

        assert!(result.unwrap_err().to_string().contains("malformed"));
        assert!(!target.exists());
    }
}

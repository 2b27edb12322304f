//! Remote enumeration of a repository's files without cloning it.

use crate::Result;
use core::time::Duration;
use flate2::read::GzDecoder;
use ohno::{IntoAppError, bail};
use std::io::Read;
use tar::{Archive, EntryType};
use tokio::task::spawn_blocking;

const LOG_TARGET: &str = "    lister";

const LIST_TIMEOUT: Duration = Duration::from_secs(5 * 60);

/// Suffix gitiles-style hosts serve a gzipped tarball of the default branch head under
pub const GITILES_ARCHIVE_SUFFIX: &str = "/+archive/HEAD.tar.gz";

/// Lists the file paths of a remote repository.
pub trait ArchiveLister: Send + Sync {
    fn list(&self, address: &str) -> impl Future<Output = Result<Vec<String>>> + Send;
}

/// Downloads a repository tarball over HTTP and lists its regular files.
#[derive(Debug, Clone)]
pub struct HttpArchiveLister {
    client: reqwest::Client,
    suffix: String,
}

impl HttpArchiveLister {
    pub fn new() -> Result<Self> {
        Self::with_suffix(GITILES_ARCHIVE_SUFFIX)
    }

    pub fn with_suffix(suffix: impl Into<String>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(LIST_TIMEOUT)
            .user_agent(concat!("ffi-census/", env!("CARGO_PKG_VERSION")))
            .build()
            .into_app_err("creating HTTP client")?;

        Ok(Self {
            client,
            suffix: suffix.into(),
        })
    }

    fn archive_url(&self, address: &str) -> String {
        format!("{}{}", address.trim_end_matches('/'), self.suffix)
    }
}

impl ArchiveLister for HttpArchiveLister {
    async fn list(&self, address: &str) -> Result<Vec<String>> {
        let url = self.archive_url(address);
        log::debug!(target: LOG_TARGET, "Downloading archive '{url}'");

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .into_app_err_with(|| format!("requesting '{url}'"))?;

        let status = response.status();
        if !status.is_success() {
            bail!("requesting '{url}' failed with HTTP {status}");
        }

        let body = response.bytes().await.into_app_err_with(|| format!("downloading '{url}'"))?;

        let paths = spawn_blocking(move || list_tar_gz(body.as_ref()))
            .await
            .into_app_err("archive listing task panicked")??;

        log::debug!(target: LOG_TARGET, "Archive '{url}' lists {} files", paths.len());
        Ok(paths)
    }
}

/// List the regular-file paths of a gzipped tarball, in archive order.
pub fn list_tar_gz(reader: impl Read) -> Result<Vec<String>> {
    let mut archive = Archive::new(GzDecoder::new(reader));
    let mut paths = Vec::new();

    for entry in archive.entries().into_app_err("reading archive")? {
        let entry = entry.into_app_err("reading archive entry")?;

        if !matches!(entry.header().entry_type(), EntryType::Regular | EntryType::Continuous) {
            continue;
        }

        let path = entry.path().into_app_err("reading archive entry path")?;
        let path = path.to_string_lossy();
        let path = path.trim_start_matches("./");
        if !path.is_empty() {
            paths.push(path.replace('\\', "/"));
        }
    }

    Ok(paths)
}

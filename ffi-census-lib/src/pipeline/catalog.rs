//! The candidate catalog: a JSON object mapping repository identifiers to descriptors.
//!
//! ```json
//! {
//!   "platform/external/rust/crates/libc": {
//!     "clone_url": "https://android.googlesource.com/platform/external/rust/crates/libc",
//!     "total": 42,
//!     ".rs": 17,
//!     "rs_path_file": "rs_paths/platform_external_rust_crates_libc.txt"
//!   }
//! }
//! ```
//!
//! Entries keep their file order. An entry with a missing or malformed required field is
//! skipped with a warning; only an unreadable document is fatal.

use crate::Result;
use ohno::{IntoAppError, app_err, bail};
use serde_json::{Map, Value};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

const LOG_TARGET: &str = "   catalog";

pub const ADDRESS_KEY: &str = "clone_url";
pub const TOTAL_KEY: &str = "total";
pub const MANIFEST_KEY: &str = "rs_path_file";
const MANIFEST_ALIAS_KEY: &str = "manifest";

/// One repository the pipeline may process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CandidateRepository {
    id: Arc<str>,
    address: Arc<str>,
    total_files: u64,
    source_files: u64,
    manifest_path: Option<PathBuf>,
}

impl CandidateRepository {
    #[must_use]
    pub fn new(
        id: impl Into<Arc<str>>,
        address: impl Into<Arc<str>>,
        total_files: u64,
        source_files: u64,
        manifest_path: Option<PathBuf>,
    ) -> Self {
        Self {
            id: id.into(),
            address: address.into(),
            total_files,
            source_files,
            manifest_path,
        }
    }

    /// Build a candidate from one catalog entry.
    ///
    /// Relative manifest paths are resolved against `base_dir`.
    pub fn from_descriptor(id: &str, descriptor: &Value, extension: &str, base_dir: &Path) -> Result<Self> {
        let Some(fields) = descriptor.as_object() else {
            bail!("descriptor is not an object");
        };

        let address = fields
            .get(ADDRESS_KEY)
            .and_then(Value::as_str)
            .filter(|s| !s.trim().is_empty())
            .into_app_err_with(|| format!("missing or empty '{ADDRESS_KEY}'"))?;

        let total_files = require_count(fields, TOTAL_KEY)?;
        let source_files = require_count(fields, extension)?;

        let manifest_path = match fields.get(MANIFEST_KEY).or_else(|| fields.get(MANIFEST_ALIAS_KEY)) {
            None | Some(Value::Null) => None,
            Some(Value::String(s)) if s.trim().is_empty() => None,
            Some(Value::String(s)) => {
                let path = Path::new(s.trim());
                Some(if path.is_absolute() { path.to_path_buf() } else { base_dir.join(path) })
            }
            Some(other) => bail!("'{MANIFEST_KEY}' must be a string, found {other}"),
        };

        Ok(Self::new(id, address, total_files, source_files, manifest_path))
    }

    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    #[must_use]
    pub fn address(&self) -> &str {
        &self.address
    }

    #[must_use]
    pub const fn total_files(&self) -> u64 {
        self.total_files
    }

    /// The catalog carries no byte size, so the total file count doubles as the size estimate.
    #[must_use]
    pub const fn size_estimate(&self) -> u64 {
        self.total_files
    }

    #[must_use]
    pub const fn source_files(&self) -> u64 {
        self.source_files
    }

    #[must_use]
    pub fn manifest_path(&self) -> Option<&Path> {
        self.manifest_path.as_deref()
    }
}

fn require_count(fields: &Map<String, Value>, key: &str) -> Result<u64> {
    match fields.get(key) {
        None => Err(app_err!("missing '{key}'")),
        Some(value) => value
            .as_u64()
            .into_app_err_with(|| format!("'{key}' must be a non-negative integer, found {value}")),
    }
}

/// The ordered set of candidates loaded from a catalog document.
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    candidates: Vec<CandidateRepository>,
    skipped: usize,
}

impl Catalog {
    /// Load a catalog file, resolving manifest paths against the file's directory.
    pub fn load(path: &Path, extension: &str) -> Result<Self> {
        let document = load_document(path)?;
        let base_dir = path.parent().unwrap_or_else(|| Path::new(""));
        Ok(Self::from_document(&document, extension, base_dir))
    }

    /// Parse a catalog from JSON text.
    pub fn from_json(text: &str, extension: &str, base_dir: &Path) -> Result<Self> {
        let document: Map<String, Value> = serde_json::from_str(text).into_app_err("parsing catalog: expected a JSON object")?;
        Ok(Self::from_document(&document, extension, base_dir))
    }

    #[must_use]
    pub fn from_document(document: &Map<String, Value>, extension: &str, base_dir: &Path) -> Self {
        let mut catalog = Self::default();

        for (id, descriptor) in document {
            match CandidateRepository::from_descriptor(id, descriptor, extension, base_dir) {
                Ok(candidate) => catalog.candidates.push(candidate),
                Err(e) => {
                    log::warn!(target: LOG_TARGET, "Skipping catalog entry '{id}': {e:#}");
                    catalog.skipped += 1;
                }
            }
        }

        log::debug!(
            target: LOG_TARGET,
            "Loaded {} candidates from catalog ({} malformed entries skipped)",
            catalog.candidates.len(),
            catalog.skipped
        );

        catalog
    }

    #[must_use]
    pub const fn from_candidates(candidates: Vec<CandidateRepository>) -> Self {
        Self { candidates, skipped: 0 }
    }

    #[must_use]
    pub fn candidates(&self) -> &[CandidateRepository] {
        &self.candidates
    }

    /// Number of entries dropped because they were malformed
    #[must_use]
    pub const fn skipped(&self) -> usize {
        self.skipped
    }

    #[must_use]
    pub const fn len(&self) -> usize {
        self.candidates.len()
    }

    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.candidates.is_empty()
    }
}

/// Read a catalog file as a raw, order-preserving JSON object.
pub fn load_document(path: &Path) -> Result<Map<String, Value>> {
    let text = fs::read_to_string(path).into_app_err_with(|| format!("reading catalog '{}'", path.display()))?;
    serde_json::from_str(&text).into_app_err_with(|| format!("parsing catalog '{}': expected a JSON object", path.display()))
}

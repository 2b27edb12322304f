//! Per-repository result records and their one-shot persistence.

use super::{DerivedMetrics, RawMetrics, UsageClassification};
use crate::Result;
use ohno::IntoAppError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::collections::btree_map::Entry;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

const LOG_TARGET: &str = "   results";

/// Everything recorded for one repository.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultRecord {
    #[serde(flatten)]
    pub raw: RawMetrics,

    #[serde(flatten)]
    pub derived: DerivedMetrics,

    /// Absent when the repository had no manifest to classify
    #[serde(flatten)]
    pub usage: Option<UsageClassification>,
}

impl ResultRecord {
    #[must_use]
    pub fn new(raw: RawMetrics, usage: Option<UsageClassification>) -> Self {
        Self {
            derived: DerivedMetrics::from_raw(&raw),
            raw,
            usage,
        }
    }
}

/// Result records keyed by repository identifier, in identifier order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResultSet {
    records: BTreeMap<String, ResultRecord>,
}

impl ResultSet {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a record. Records are never replaced; a second insert for the same
    /// identifier is dropped and reported by returning `false`.
    pub fn insert(&mut self, id: impl Into<String>, record: ResultRecord) -> bool {
        match self.records.entry(id.into()) {
            Entry::Vacant(slot) => {
                let _ = slot.insert(record);
                true
            }
            Entry::Occupied(slot) => {
                log::warn!(target: LOG_TARGET, "Ignoring duplicate result for '{}'", slot.key());
                false
            }
        }
    }

    #[must_use]
    pub fn get(&self, id: &str) -> Option<&ResultRecord> {
        self.records.get(id)
    }

    #[must_use]
    pub fn contains(&self, id: &str) -> bool {
        self.records.contains_key(id)
    }

    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.records.keys().map(String::as_str)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Write the whole set to `path` in one step.
    ///
    /// The document is written to a sibling temporary file which is renamed over `path`
    /// only once it has been fully flushed, so an interrupted run never leaves a
    /// truncated result file behind.
    pub fn persist(&self, path: &Path) -> Result<()> {
        write_atomically(path, |writer| {
            serde_json::to_writer_pretty(&mut *writer, self).into_app_err_with(|| format!("unable to serialize results for '{}'", path.display()))
        })?;

        log::info!(target: LOG_TARGET, "Wrote {} result records to '{}'", self.len(), path.display());
        Ok(())
    }

    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path).into_app_err_with(|| format!("unable to open file '{}'", path.display()))?;
        serde_json::from_str(&text).into_app_err_with(|| format!("unable to parse file '{}'", path.display()))
    }
}

/// Write a file through a temporary sibling and an atomic rename.
pub fn write_atomically(path: &Path, write: impl FnOnce(&mut BufWriter<File>) -> Result<()>) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).into_app_err_with(|| format!("unable to create directory '{}'", parent.display()))?;
    }

    let tmp_path = temp_sibling(path);
    let result = (|| -> Result<()> {
        let file = File::create(&tmp_path).into_app_err_with(|| format!("unable to create file '{}'", tmp_path.display()))?;
        let mut writer = BufWriter::new(file);

        write(&mut writer)?;

        writer
            .flush()
            .into_app_err_with(|| format!("unable to flush file '{}'", tmp_path.display()))?;
        writer
            .get_ref()
            .sync_all()
            .into_app_err_with(|| format!("unable to sync file '{}'", tmp_path.display()))?;
        drop(writer);

        fs::rename(&tmp_path, path).into_app_err_with(|| format!("unable to move '{}' into place at '{}'", tmp_path.display(), path.display()))
    })();

    if result.is_err() {
        let _ = fs::remove_file(&tmp_path);
    }

    result
}

fn temp_sibling(path: &Path) -> PathBuf {
    let mut name = path.file_name().map(ToOwned::to_owned).unwrap_or_default();
    name.push(format!(".{}.tmp", std::process::id()));
    path.with_file_name(name)
}

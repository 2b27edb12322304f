//! The repository metrics collection pipeline.
//!
//! A [`Catalog`] of candidate repositories is filtered by [`RunConfig`], and each eligible
//! candidate is acquired into a private workspace, measured by an external metrics tool,
//! classified by path, and recorded in a [`ResultSet`] that is persisted once at the end
//! of the run.

mod acquirer;
mod archive_lister;
mod catalog;
mod controller;
mod derived;
mod extractor;
mod failure;
mod git;
mod manifest;
mod path_utils;
mod progress;
mod raw_metrics;
mod result_set;
mod usage;

pub use acquirer::{Acquirer, Acquisition, AcquisitionMode, GitAcquirer, validate_address};
pub use archive_lister::{ArchiveLister, GITILES_ARCHIVE_SUFFIX, HttpArchiveLister, list_tar_gz};
pub use catalog::{ADDRESS_KEY, CandidateRepository, Catalog, MANIFEST_KEY, TOTAL_KEY, load_document};
pub use controller::{CapPolicy, Pipeline, RepositoryFailure, RunConfig, RunSummary};
pub use derived::DerivedMetrics;
pub use extractor::{EXTRACTION_TIMEOUT, Extractor, ToolExtractor};
pub use failure::{FailureKind, StepFailure};
pub use manifest::FilePathManifest;
pub use path_utils::workspace_dir_name;
pub use progress::{Progress, SilentProgress};
pub use raw_metrics::{PAYLOAD_SCHEMA, RawMetrics};
pub use result_set::{ResultRecord, ResultSet, write_atomically};
pub use usage::{UsageCategory, UsageClassification, UsageCounts, classify};

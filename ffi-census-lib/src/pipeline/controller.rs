//! Drives each eligible candidate through acquisition, extraction, and classification.

use super::{
    Acquirer, Acquisition, CandidateRepository, Catalog, Extractor, FailureKind, FilePathManifest, Progress, ResultRecord, ResultSet,
    StepFailure, classify, workspace_dir_name,
};
use ohno::IntoAppError;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use strum::Display;
use tokio::task::{Id, JoinSet, spawn_blocking};

const LOG_TARGET: &str = "  pipeline";

/// Which finished candidates use up a slot under `max_count`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Display, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum CapPolicy {
    /// Every attempted candidate counts, whatever its outcome
    #[default]
    Attempted,

    /// Only candidates whose acquisition succeeded count
    Acquired,
}

/// Knobs for one pipeline run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunConfig {
    /// Largest total file count a candidate may have and still be eligible
    pub max_candidate_size: u64,

    /// Most eligible candidates a run will take on
    pub max_count: usize,

    /// Remove each workspace once its candidate is done
    pub delete_workspace_after: bool,

    /// Candidates processed at once
    pub concurrency: usize,

    pub cap_policy: CapPolicy,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            max_candidate_size: 100,
            max_count: 10,
            delete_workspace_after: false,
            concurrency: 4,
            cap_policy: CapPolicy::Attempted,
        }
    }
}

impl RunConfig {
    #[must_use]
    pub const fn is_eligible(&self, candidate: &CandidateRepository) -> bool {
        candidate.source_files() > 0 && candidate.size_estimate() <= self.max_candidate_size
    }
}

/// A candidate that dropped out of the run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RepositoryFailure {
    pub id: String,
    pub kind: FailureKind,
}

/// What a run produced.
#[derive(Debug, Default)]
pub struct RunSummary {
    pub results: ResultSet,

    /// Failed candidates, in identifier order
    pub failures: Vec<RepositoryFailure>,

    /// Eligible candidates that were started
    pub attempted: usize,

    /// Catalog entries filtered out by the eligibility predicate
    pub ineligible: usize,
}

/// The metrics collection pipeline.
#[derive(Debug)]
pub struct Pipeline<A, E> {
    acquirer: Arc<A>,
    extractor: Arc<E>,
    workspace_root: PathBuf,
    config: RunConfig,
}

struct CandidateOutcome {
    id: Arc<str>,
    acquired: bool,
    result: Result<ResultRecord, StepFailure>,
}

impl<A: Acquirer, E: Extractor> Pipeline<A, E> {
    pub fn new(acquirer: A, extractor: E, workspace_root: impl Into<PathBuf>, config: RunConfig) -> Self {
        Self {
            acquirer: Arc::new(acquirer),
            extractor: Arc::new(extractor),
            workspace_root: workspace_root.into(),
            config,
        }
    }

    #[must_use]
    pub const fn config(&self) -> &RunConfig {
        &self.config
    }

    /// Directory a candidate's workspace lives in.
    #[must_use]
    pub fn workspace_path(&self, id: &str) -> PathBuf {
        self.workspace_root.join(workspace_dir_name(id))
    }

    /// Process the catalog in order until `max_count` slots are used up or the catalog runs out.
    ///
    /// Per-candidate failures never end the run; they are logged and listed in the summary.
    pub async fn run(&self, catalog: &Catalog, progress: &dyn Progress) -> RunSummary {
        let start_time = Instant::now();
        let mut summary = RunSummary::default();

        let (eligible, ineligible): (Vec<_>, Vec<_>) = catalog.candidates().iter().partition(|c| self.config.is_eligible(c));
        for candidate in &ineligible {
            log::debug!(
                target: LOG_TARGET,
                "Skipping '{}': {} source files, {} files total",
                candidate.id(),
                candidate.source_files(),
                candidate.size_estimate()
            );
        }
        summary.ineligible = ineligible.len();

        let concurrency = self.config.concurrency.max(1);
        let max_count = self.config.max_count;
        let expected = match self.config.cap_policy {
            CapPolicy::Attempted => eligible.len().min(max_count),
            CapPolicy::Acquired => eligible.len(),
        };

        progress.set_phase("Collecting");
        progress.set_total(expected as u64);

        let mut queue = eligible.into_iter();
        let mut tasks = JoinSet::new();
        let mut task_ids: HashMap<Id, Arc<str>> = HashMap::new();
        let mut committed = 0;

        loop {
            // In-flight tasks hold a slot until they finish and release or commit it.
            while tasks.len() < concurrency && committed + tasks.len() < max_count {
                let Some(candidate) = queue.next() else {
                    break;
                };

                summary.attempted += 1;
                let id: Arc<str> = Arc::from(candidate.id());
                let handle = tasks.spawn(process_candidate(
                    Arc::clone(&self.acquirer),
                    Arc::clone(&self.extractor),
                    candidate.clone(),
                    self.workspace_path(candidate.id()),
                    self.config.delete_workspace_after,
                ));
                let _ = task_ids.insert(handle.id(), id);
            }

            let Some(joined) = tasks.join_next_with_id().await else {
                break;
            };

            match joined {
                Ok((task_id, outcome)) => {
                    let _ = task_ids.remove(&task_id);

                    if outcome.acquired || self.config.cap_policy == CapPolicy::Attempted {
                        committed += 1;
                    }

                    match outcome.result {
                        Ok(record) => {
                            log::info!(target: LOG_TARGET, "Collected metrics for '{}'", outcome.id);
                            let _ = summary.results.insert(outcome.id.as_ref(), record);
                        }
                        Err(failure) => {
                            log::error!(target: LOG_TARGET, "Repository '{}' failed with {failure}", outcome.id);
                            summary.failures.push(RepositoryFailure {
                                id: outcome.id.to_string(),
                                kind: failure.kind,
                            });
                        }
                    }

                    progress.advance(&outcome.id);
                }
                Err(e) => {
                    let id = task_ids.remove(&e.id()).unwrap_or_else(|| Arc::from("<unknown>"));
                    log::error!(target: LOG_TARGET, "Worker for repository '{id}' did not complete: {e}");
                    committed += 1;
                    progress.advance(&id);
                }
            }
        }

        progress.done();
        summary.failures.sort_by(|a, b| a.id.cmp(&b.id));

        log::info!(
            target: LOG_TARGET,
            "Run finished in {:.3}s: {} collected, {} failed, {} ineligible",
            start_time.elapsed().as_secs_f64(),
            summary.results.len(),
            summary.failures.len(),
            summary.ineligible
        );

        summary
    }
}

async fn process_candidate<A: Acquirer, E: Extractor>(
    acquirer: Arc<A>,
    extractor: Arc<E>,
    candidate: CandidateRepository,
    workspace: PathBuf,
    delete_workspace_after: bool,
) -> CandidateOutcome {
    let (acquired, result) = collect(acquirer.as_ref(), extractor.as_ref(), &candidate, &workspace).await;

    if delete_workspace_after {
        remove_workspace(workspace).await;
    }

    CandidateOutcome {
        id: Arc::from(candidate.id()),
        acquired,
        result,
    }
}

/// Returns whether acquisition succeeded, alongside the record or the step that failed.
async fn collect<A: Acquirer, E: Extractor>(
    acquirer: &A,
    extractor: &E,
    candidate: &CandidateRepository,
    workspace: &Path,
) -> (bool, Result<ResultRecord, StepFailure>) {
    let manifest = match load_manifest(candidate).await {
        Ok(manifest) => manifest,
        Err(e) => return (false, Err(StepFailure::new(FailureKind::AcquisitionFailed, e))),
    };

    match acquirer.acquire(candidate.address(), manifest.as_ref(), workspace).await {
        Ok(Acquisition::AlreadyPresent) => {
            log::debug!(target: LOG_TARGET, "Reusing workspace for '{}'", candidate.id());
        }
        Ok(Acquisition::Fetched(_)) => {}
        Err(e) => return (false, Err(StepFailure::new(FailureKind::AcquisitionFailed, e))),
    }

    let raw = match extractor.extract(workspace).await {
        Ok(raw) => raw,
        Err(failure) => return (true, Err(failure)),
    };

    let usage = manifest.as_ref().map(classify);
    if usage.is_none() {
        log::debug!(target: LOG_TARGET, "No manifest for '{}', usage classification skipped", candidate.id());
    }

    (true, Ok(ResultRecord::new(raw, usage)))
}

async fn load_manifest(candidate: &CandidateRepository) -> crate::Result<Option<FilePathManifest>> {
    let Some(path) = candidate.manifest_path() else {
        return Ok(None);
    };

    let path = path.to_path_buf();
    spawn_blocking(move || FilePathManifest::load(&path))
        .await
        .into_app_err("manifest loading task panicked")?
        .map(Some)
}

async fn remove_workspace(workspace: PathBuf) {
    let result = spawn_blocking(move || {
        if fs::symlink_metadata(&workspace).is_err() {
            return Ok(());
        }

        fs::remove_dir_all(&workspace).into_app_err_with(|| format!("could not remove workspace '{}'", workspace.display()))
    })
    .await;

    match result {
        Ok(Ok(())) => {}
        Ok(Err(e)) => log::warn!(target: LOG_TARGET, "{e:#}"),
        Err(e) => log::warn!(target: LOG_TARGET, "Workspace cleanup task panicked: {e}"),
    }
}

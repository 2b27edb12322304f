//! End-to-end pipeline runs against a catalog on disk.
//!
//! Acquisition and extraction go through in-process fakes so these tests need neither
//! network access nor git; the fakes keep the same contracts as the real collaborators.

use ffi_census_lib::pipeline::{
    Acquirer, Acquisition, AcquisitionMode, CapPolicy, Catalog, Extractor, FailureKind, FilePathManifest, Pipeline, RawMetrics,
    ResultSet, RunConfig, SilentProgress, StepFailure,
};
use std::collections::HashMap;
use std::fs;
use std::path::Path;

/// Materializes a workspace holding the address and mode it was acquired with.
#[derive(Debug, Default)]
struct RecordingAcquirer;

impl Acquirer for RecordingAcquirer {
    async fn acquire(&self, address: &str, manifest: Option<&FilePathManifest>, target: &Path) -> ffi_census_lib::Result<Acquisition> {
        if target.exists() {
            return Ok(Acquisition::AlreadyPresent);
        }

        let mode = AcquisitionMode::for_manifest(manifest);
        fs::create_dir_all(target).unwrap();
        fs::write(target.join("ADDRESS"), address).unwrap();
        fs::write(target.join("MODE"), format!("{mode:?}")).unwrap();

        Ok(Acquisition::Fetched(mode))
    }
}

fn recorded_mode(workspace: &Path) -> String {
    fs::read_to_string(workspace.join("MODE")).unwrap()
}

/// Returns canned metrics per address; addresses mapped to a failure kind fail that way.
#[derive(Debug, Default)]
struct ScriptedExtractor {
    failures: HashMap<String, FailureKind>,
}

impl ScriptedExtractor {
    fn failing(address: &str, kind: FailureKind) -> Self {
        Self {
            failures: HashMap::from([(address.to_string(), kind)]),
        }
    }
}

impl Extractor for ScriptedExtractor {
    async fn extract(&self, workspace: &Path) -> Result<RawMetrics, StepFailure> {
        let address = fs::read_to_string(workspace.join("ADDRESS")).unwrap();

        if let Some(kind) = self.failures.get(&address) {
            return Err(StepFailure::new(*kind, ohno::app_err!("scripted {kind} for '{address}'")));
        }

        Ok(RawMetrics {
            total_lines: 1000,
            extern_c: 2,
            link_attrs: 1,
            no_mangle: 3,
            unsafe_count: 4,
            unsafe_fn_count: 0,
            ffi_files: 1,
            syntax_tree_height: 12,
        })
    }
}

fn write_catalog(dir: &Path, text: &str) -> Catalog {
    let path = dir.join("repos.json");
    fs::write(&path, text).unwrap();
    Catalog::load(&path, ".rs").unwrap()
}

fn config(delete_workspace_after: bool) -> RunConfig {
    RunConfig {
        max_candidate_size: 100,
        max_count: 10,
        delete_workspace_after,
        concurrency: 2,
        cap_policy: CapPolicy::Attempted,
    }
}

const TWO_REPOS: &str = r#"{
    "A": { "clone_url": "https://example.com/A", "total": 50, ".rs": 3, "rs_path_file": "rs_paths/A.txt" },
    "B": { "clone_url": "https://example.com/B", "total": 50, ".rs": 0 }
}"#;

#[tokio::test]
#[cfg_attr(miri, ignore = "Miri cannot call GetTempPathW")]
async fn test_only_repository_with_sources_is_recorded() {
    let temp_dir = tempfile::tempdir().unwrap();
    FilePathManifest::new(["src/kernel/a.rs", "lib/b.rs"])
        .save(&temp_dir.path().join("rs_paths/A.txt"))
        .unwrap();
    let catalog = write_catalog(temp_dir.path(), TWO_REPOS);

    let pipeline = Pipeline::new(RecordingAcquirer, ScriptedExtractor::default(), temp_dir.path().join("ws"), config(false));
    let summary = pipeline.run(&catalog, &SilentProgress).await;

    assert_eq!(summary.results.ids().collect::<Vec<_>>(), ["A"]);
    assert_eq!(summary.ineligible, 1);
    assert!(summary.failures.is_empty());

    let record = summary.results.get("A").unwrap();
    let usage = record.usage.unwrap();
    assert_eq!(usage.usage.kernel, 1);
    assert_eq!(usage.usage.library, 1);
    assert_eq!(usage.usage.driver, 0);
    assert_eq!(usage.usage.sandbox, 0);
    assert_eq!(usage.usage.other, 0);
    assert!((usage.average_file_depth - 1.5).abs() < f64::EPSILON);
    assert!((record.derived.ffi_density_per_kloc - 10.0).abs() < f64::EPSILON);
}

#[tokio::test]
#[cfg_attr(miri, ignore = "Miri cannot call GetTempPathW")]
async fn test_manifest_selects_sparse_acquisition() {
    let temp_dir = tempfile::tempdir().unwrap();
    FilePathManifest::new(["src/lib.rs"]).save(&temp_dir.path().join("m.txt")).unwrap();
    let catalog = write_catalog(
        temp_dir.path(),
        r#"{
            "sparse": { "clone_url": "https://example.com/sparse", "total": 5, ".rs": 1, "rs_path_file": "m.txt" },
            "full": { "clone_url": "https://example.com/full", "total": 5, ".rs": 1 }
        }"#,
    );

    let pipeline = Pipeline::new(RecordingAcquirer, ScriptedExtractor::default(), temp_dir.path().join("ws"), config(false));
    let summary = pipeline.run(&catalog, &SilentProgress).await;
    assert_eq!(summary.results.len(), 2);

    assert_eq!(recorded_mode(&pipeline.workspace_path("sparse")), "Sparse");
    assert_eq!(recorded_mode(&pipeline.workspace_path("full")), "Full");

    // Without a manifest the repository is still measured, just not classified.
    assert!(summary.results.get("full").unwrap().usage.is_none());
    assert!(summary.results.get("sparse").unwrap().usage.is_some());
}

#[tokio::test]
#[cfg_attr(miri, ignore = "Miri cannot call GetTempPathW")]
async fn test_ineligible_repositories_never_recorded() {
    let temp_dir = tempfile::tempdir().unwrap();
    let catalog = write_catalog(
        temp_dir.path(),
        r#"{
            "huge": { "clone_url": "https://example.com/huge", "total": 101, ".rs": 40 },
            "empty": { "clone_url": "https://example.com/empty", "total": 3, ".rs": 0 },
            "edge": { "clone_url": "https://example.com/edge", "total": 100, ".rs": 1 }
        }"#,
    );

    let pipeline = Pipeline::new(RecordingAcquirer, ScriptedExtractor::default(), temp_dir.path().join("ws"), config(false));
    let summary = pipeline.run(&catalog, &SilentProgress).await;

    assert_eq!(summary.results.ids().collect::<Vec<_>>(), ["edge"]);
    assert_eq!(summary.attempted, 1);
    assert_eq!(summary.ineligible, 2);
    assert!(!temp_dir.path().join("ws/huge").exists());
}

#[tokio::test]
#[cfg_attr(miri, ignore = "Miri cannot call GetTempPathW")]
async fn test_timed_out_repository_excluded_and_run_continues() {
    let temp_dir = tempfile::tempdir().unwrap();
    let catalog = write_catalog(
        temp_dir.path(),
        r#"{
            "first": { "clone_url": "https://example.com/first", "total": 5, ".rs": 1 },
            "hangs": { "clone_url": "https://example.com/hangs", "total": 5, ".rs": 1 },
            "last": { "clone_url": "https://example.com/last", "total": 5, ".rs": 1 }
        }"#,
    );

    let extractor = ScriptedExtractor::failing("https://example.com/hangs", FailureKind::ExtractionTimedOut);
    let pipeline = Pipeline::new(RecordingAcquirer, extractor, temp_dir.path().join("ws"), config(false));
    let summary = pipeline.run(&catalog, &SilentProgress).await;

    assert_eq!(summary.results.ids().collect::<Vec<_>>(), ["first", "last"]);
    assert_eq!(summary.failures.len(), 1);
    assert_eq!(summary.failures[0].id, "hangs");
    assert_eq!(summary.failures[0].kind, FailureKind::ExtractionTimedOut);
}

#[tokio::test]
#[cfg_attr(miri, ignore = "Miri cannot call GetTempPathW")]
async fn test_rerun_without_cleanup_is_idempotent() {
    let temp_dir = tempfile::tempdir().unwrap();
    FilePathManifest::new(["src/kernel/a.rs", "lib/b.rs"])
        .save(&temp_dir.path().join("rs_paths/A.txt"))
        .unwrap();
    let catalog = write_catalog(temp_dir.path(), TWO_REPOS);

    let pipeline = Pipeline::new(RecordingAcquirer, ScriptedExtractor::default(), temp_dir.path().join("ws"), config(false));
    let first = pipeline.run(&catalog, &SilentProgress).await;
    let second = pipeline.run(&catalog, &SilentProgress).await;

    assert_eq!(first.results, second.results);

    // Both runs persist byte-identical documents.
    let first_path = temp_dir.path().join("first.json");
    let second_path = temp_dir.path().join("second.json");
    first.results.persist(&first_path).unwrap();
    second.results.persist(&second_path).unwrap();
    assert_eq!(fs::read(&first_path).unwrap(), fs::read(&second_path).unwrap());
}

#[tokio::test]
#[cfg_attr(miri, ignore = "Miri cannot call GetTempPathW")]
async fn test_workspaces_removed_after_success_and_failure() {
    let temp_dir = tempfile::tempdir().unwrap();
    let workspace_root = temp_dir.path().join("ws");
    let catalog = write_catalog(
        temp_dir.path(),
        r#"{
            "ok": { "clone_url": "https://example.com/ok", "total": 5, ".rs": 1 },
            "broken/tool": { "clone_url": "https://example.com/broken", "total": 5, ".rs": 1 }
        }"#,
    );

    let extractor = ScriptedExtractor::failing("https://example.com/broken", FailureKind::ExtractionMalformed);
    let pipeline = Pipeline::new(RecordingAcquirer, extractor, &workspace_root, config(true));
    let summary = pipeline.run(&catalog, &SilentProgress).await;

    assert_eq!(summary.results.len(), 1);
    assert!(!pipeline.workspace_path("ok").exists());
    assert!(!pipeline.workspace_path("broken/tool").exists());
}

#[tokio::test]
#[cfg_attr(miri, ignore = "Miri cannot call GetTempPathW")]
async fn test_results_document_shape() {
    let temp_dir = tempfile::tempdir().unwrap();
    FilePathManifest::new(["src/kernel/a.rs", "lib/b.rs"])
        .save(&temp_dir.path().join("rs_paths/A.txt"))
        .unwrap();
    let catalog = write_catalog(temp_dir.path(), TWO_REPOS);

    let pipeline = Pipeline::new(RecordingAcquirer, ScriptedExtractor::default(), temp_dir.path().join("ws"), config(false));
    let summary = pipeline.run(&catalog, &SilentProgress).await;

    let output = temp_dir.path().join("out/results.json");
    summary.results.persist(&output).unwrap();

    let document: serde_json::Value = serde_json::from_str(&fs::read_to_string(&output).unwrap()).unwrap();
    let record = &document["A"];
    assert_eq!(record["extern_c"], 2);
    assert_eq!(record["unsafe_count"], 4);
    assert_eq!(record["syntax_tree_height"], 12);
    assert_eq!(record["ffi_density_per_kloc"], 10.0);
    assert_eq!(record["usage"]["kernel"], 1);
    assert_eq!(record["average_file_depth"], 1.5);

    assert_eq!(ResultSet::load(&output).unwrap(), summary.results);
    assert_eq!(fs::read_dir(temp_dir.path().join("out")).unwrap().count(), 1);
}

#[tokio::test]
#[cfg_attr(miri, ignore = "Miri cannot call GetTempPathW")]
async fn test_both_cap_policies_bound_the_run() {
    let temp_dir = tempfile::tempdir().unwrap();
    let catalog = write_catalog(
        temp_dir.path(),
        r#"{
            "r1": { "clone_url": "-bad", "total": 5, ".rs": 1 },
            "r2": { "clone_url": "https://example.com/r2", "total": 5, ".rs": 1 },
            "r3": { "clone_url": "https://example.com/r3", "total": 5, ".rs": 1 },
            "r4": { "clone_url": "https://example.com/r4", "total": 5, ".rs": 1 }
        }"#,
    );

    /// Refuses option-looking addresses the way the git acquirer does.
    #[derive(Debug, Default)]
    struct StrictAcquirer;

    impl Acquirer for StrictAcquirer {
        async fn acquire(&self, address: &str, manifest: Option<&FilePathManifest>, target: &Path) -> ffi_census_lib::Result<Acquisition> {
            ffi_census_lib::pipeline::validate_address(address)?;
            RecordingAcquirer.acquire(address, manifest, target).await
        }
    }

    for (policy, expected) in [(CapPolicy::Attempted, vec!["r2"]), (CapPolicy::Acquired, vec!["r2", "r3"])] {
        let run_config = RunConfig {
            max_count: 2,
            concurrency: 1,
            cap_policy: policy,
            ..config(true)
        };
        let pipeline = Pipeline::new(StrictAcquirer, ScriptedExtractor::default(), temp_dir.path().join("ws"), run_config);
        let summary = pipeline.run(&catalog, &SilentProgress).await;

        assert_eq!(summary.results.ids().collect::<Vec<_>>(), expected, "policy {policy}");
        assert_eq!(summary.failures[0].kind, FailureKind::AcquisitionFailed);
    }
}

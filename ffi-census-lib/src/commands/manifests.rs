use super::common::{CommonArgs, init_logging};
use super::config::Config;
use super::{Host, ProgressReporter};
use crate::Result;
use crate::pipeline::{
    ADDRESS_KEY, ArchiveLister, FilePathManifest, HttpArchiveLister, MANIFEST_KEY, Progress, TOTAL_KEY, load_document, workspace_dir_name,
    write_atomically,
};
use camino::Utf8PathBuf;
use clap::Parser;
use ohno::IntoAppError;
use serde_json::{Map, Value};
use std::io::Write;
use std::path::{Path, PathBuf};

const LOG_TARGET: &str = " manifests";

#[derive(Parser, Debug)]
pub struct ManifestsArgs {
    #[command(flatten)]
    pub common: CommonArgs,

    /// Directory for the manifest files (default is `<ext>_paths` next to the catalog, e.g. `rs_paths`)
    #[arg(long, value_name = "PATH")]
    pub manifest_dir: Option<Utf8PathBuf>,

    /// Where to write the updated catalog (default is to update the catalog in place)
    #[arg(long, short = 'o', value_name = "PATH")]
    pub output: Option<Utf8PathBuf>,

    /// List repositories again even when they already have a manifest
    #[arg(long)]
    pub refresh: bool,
}

/// What a manifest pass did to the catalog.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ManifestStats {
    pub written: usize,
    pub failed: usize,
    pub skipped: usize,
}

/// Where manifests go and how entries record them.
#[derive(Debug)]
pub struct ManifestLayout<'a> {
    /// Directory the manifest files are written to
    pub manifest_dir: &'a Path,

    /// Directory of the catalog that will reference the manifests
    pub catalog_dir: &'a Path,

    /// Source extension, including the leading dot
    pub extension: &'a str,

    /// Replace manifests that entries already reference
    pub refresh: bool,
}

impl ManifestLayout<'_> {
    fn manifest_file(&self, id: &str) -> PathBuf {
        self.manifest_dir.join(format!("{}.txt", workspace_dir_name(id)))
    }

    /// Path as recorded in the catalog: relative to the catalog when it lives below it.
    fn recorded_path(&self, manifest_file: &Path) -> String {
        let path = manifest_file.strip_prefix(self.catalog_dir).unwrap_or(manifest_file);
        path.to_string_lossy().replace('\\', "/")
    }
}

/// Enumerate remote archives and write a manifest for every catalog entry with source files.
///
/// # Errors
///
/// Fails when the catalog or configuration cannot be loaded or the updated catalog cannot
/// be written. Entries whose listing fails are logged and left unchanged.
pub async fn collect_manifests<H: Host>(host: &mut H, args: &ManifestsArgs) -> Result<()> {
    init_logging(args.common.log_level);

    let catalog_dir = args.common.catalog_dir();
    let config = Config::load(catalog_dir, args.common.config.as_ref())?;

    let output = args.output.clone().unwrap_or_else(|| args.common.catalog.clone()).into_std_path_buf();
    let output_dir = output.parent().filter(|p| !p.as_os_str().is_empty()).unwrap_or_else(|| Path::new("."));
    let manifest_dir = args.manifest_dir.clone().map_or_else(
        || catalog_dir.join(format!("{}_paths", config.source_extension.trim_start_matches('.'))).into_std_path_buf(),
        Utf8PathBuf::into_std_path_buf,
    );

    let mut document = load_document(args.common.catalog.as_std_path())?;
    let lister = HttpArchiveLister::new()?;
    let progress = ProgressReporter::new(args.common.progress_delay(), args.common.color.use_colors(&std::io::stderr()));

    let layout = ManifestLayout {
        manifest_dir: &manifest_dir,
        catalog_dir: output_dir,
        extension: &config.source_extension,
        refresh: args.refresh,
    };
    let stats = update_manifests(&lister, &mut document, &layout, &progress).await;

    write_atomically(&output, |writer| {
        serde_json::to_writer_pretty(&mut *writer, &document).into_app_err_with(|| format!("unable to serialize catalog '{}'", output.display()))
    })?;

    let _ = writeln!(
        host.output(),
        "Wrote {} manifests into {} ({} failed, {} skipped); catalog saved to {}",
        stats.written,
        manifest_dir.display(),
        stats.failed,
        stats.skipped,
        output.display()
    );

    Ok(())
}

/// Write manifests for the entries of a raw catalog document and record them in it.
///
/// Each listed entry also gets its total and source-file counts refreshed from the listing.
pub async fn update_manifests<L: ArchiveLister>(
    lister: &L,
    document: &mut Map<String, Value>,
    layout: &ManifestLayout<'_>,
    progress: &dyn Progress,
) -> ManifestStats {
    let mut stats = ManifestStats::default();

    progress.set_phase("Listing");
    progress.set_total(document.len() as u64);

    for (id, descriptor) in document.iter_mut() {
        match update_entry(lister, id, descriptor, layout).await {
            Ok(true) => stats.written += 1,
            Ok(false) => stats.skipped += 1,
            Err(e) => {
                log::error!(target: LOG_TARGET, "Could not list '{id}': {e:#}");
                stats.failed += 1;
            }
        }
        progress.advance(id);
    }

    progress.done();
    stats
}

/// Returns whether a manifest was written; `false` means the entry was skipped.
async fn update_entry<L: ArchiveLister>(lister: &L, id: &str, descriptor: &mut Value, layout: &ManifestLayout<'_>) -> Result<bool> {
    let Some(fields) = descriptor.as_object_mut() else {
        log::warn!(target: LOG_TARGET, "Skipping '{id}': descriptor is not an object");
        return Ok(false);
    };

    if fields.get(layout.extension).and_then(Value::as_u64).unwrap_or(0) == 0 {
        log::debug!(target: LOG_TARGET, "Skipping '{id}': no '{}' files", layout.extension);
        return Ok(false);
    }

    if !layout.refresh && fields.get(MANIFEST_KEY).is_some_and(|v| !v.is_null()) {
        log::debug!(target: LOG_TARGET, "Skipping '{id}': manifest already recorded");
        return Ok(false);
    }

    let Some(address) = fields.get(ADDRESS_KEY).and_then(Value::as_str) else {
        log::warn!(target: LOG_TARGET, "Skipping '{id}': missing '{ADDRESS_KEY}'");
        return Ok(false);
    };

    let paths = lister.list(address).await?;
    let total = paths.len();
    let manifest = FilePathManifest::new(paths.into_iter().filter(|p| p.ends_with(layout.extension)));

    let manifest_file = layout.manifest_file(id);
    manifest.save(&manifest_file)?;

    let _ = fields.insert(TOTAL_KEY.to_string(), Value::from(total));
    let _ = fields.insert(layout.extension.to_string(), Value::from(manifest.len()));
    let _ = fields.insert(MANIFEST_KEY.to_string(), Value::from(layout.recorded_path(&manifest_file)));

    log::info!(target: LOG_TARGET, "Listed '{id}': {} of {total} files kept", manifest.len());
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::{Catalog, SilentProgress};
    use std::collections::HashMap;
    use std::fs;

    /// Serves canned listings keyed by address.
    struct FakeLister(HashMap<String, Vec<String>>);

    impl ArchiveLister for FakeLister {
        async fn list(&self, address: &str) -> Result<Vec<String>> {
            self.0
                .get(address)
                .cloned()
                .into_app_err_with(|| format!("HTTP 404 for '{address}'"))
        }
    }

    fn lister() -> FakeLister {
        FakeLister(HashMap::from([(
            "https://host/platform/a".to_string(),
            vec!["src/kernel/a.rs".to_string(), "lib/b.rs".to_string(), "README.md".to_string()],
        )]))
    }

    fn document() -> Map<String, Value> {
        serde_json::from_str(
            r#"{
                "platform/a": { "clone_url": "https://host/platform/a", "total": 9, ".rs": 1 },
                "platform/none": { "clone_url": "https://host/platform/none", "total": 9, ".rs": 0 },
                "platform/gone": { "clone_url": "https://host/platform/gone", "total": 9, ".rs": 4 },
                "platform/done": { "clone_url": "https://host/platform/done", "total": 9, ".rs": 4, "rs_path_file": "x.txt" }
            }"#,
        )
        .unwrap()
    }

    #[tokio::test]
    #[cfg_attr(miri, ignore = "Miri cannot call GetTempPathW")]
    async fn test_manifests_written_and_recorded() {
        let temp_dir = tempfile::tempdir().unwrap();
        let manifest_dir = temp_dir.path().join("rs_paths");
        let layout = ManifestLayout {
            manifest_dir: &manifest_dir,
            catalog_dir: temp_dir.path(),
            extension: ".rs",
            refresh: false,
        };

        let mut document = document();
        let stats = update_manifests(&lister(), &mut document, &layout, &SilentProgress).await;

        assert_eq!(stats, ManifestStats { written: 1, failed: 1, skipped: 2 });

        let entry = &document["platform/a"];
        assert_eq!(entry["total"], 3);
        assert_eq!(entry[".rs"], 2);
        assert_eq!(entry["rs_path_file"], "rs_paths/platform%2Fa.txt");
        assert_eq!(document["platform/done"]["rs_path_file"], "x.txt");
        assert!(document["platform/gone"].get("rs_path_file").is_none());

        let written = fs::read_to_string(manifest_dir.join("platform%2Fa.txt")).unwrap();
        assert_eq!(written, "src/kernel/a.rs\nlib/b.rs\n");

        // The updated document loads as a catalog whose manifest resolves on disk.
        let catalog = Catalog::from_document(&document, ".rs", temp_dir.path());
        let candidate = catalog.candidates().iter().find(|c| c.id() == "platform/a").unwrap();
        assert!(candidate.manifest_path().unwrap().exists());
    }

    #[tokio::test]
    #[cfg_attr(miri, ignore = "Miri cannot call GetTempPathW")]
    async fn test_refresh_relists_recorded_entries() {
        let temp_dir = tempfile::tempdir().unwrap();
        let layout = ManifestLayout {
            manifest_dir: temp_dir.path(),
            catalog_dir: temp_dir.path(),
            extension: ".rs",
            refresh: true,
        };

        let mut document = document();
        let stats = update_manifests(&lister(), &mut document, &layout, &SilentProgress).await;

        assert_eq!(stats, ManifestStats { written: 1, failed: 2, skipped: 1 });
    }

    #[test]
    fn test_recorded_path_outside_catalog_dir_stays_absolute() {
        let layout = ManifestLayout {
            manifest_dir: Path::new("/elsewhere"),
            catalog_dir: Path::new("/data"),
            extension: ".rs",
            refresh: false,
        };
        let file = layout.manifest_file("a/b");
        assert_eq!(layout.recorded_path(&file), "/elsewhere/a%2Fb.txt");
    }
}

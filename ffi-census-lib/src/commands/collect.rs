use super::common::{CommonArgs, default_workspace_dir, init_logging};
use super::config::Config;
use super::{Host, ProgressReporter};
use crate::Result;
use crate::pipeline::{Catalog, GitAcquirer, Pipeline, RunSummary, ToolExtractor};
use camino::Utf8PathBuf;
use clap::Parser;
use ohno::EnrichableExt;
use owo_colors::OwoColorize;
use std::io::Write;
use std::path::PathBuf;

const LOG_TARGET: &str = "   collect";

/// Default name of the results document, written next to the catalog
pub const DEFAULT_OUTPUT_FILE: &str = "ffi_metrics.json";

#[derive(Parser, Debug)]
pub struct CollectArgs {
    #[command(flatten)]
    pub common: CommonArgs,

    /// Where to write the results (default is `ffi_metrics.json` next to the catalog)
    #[arg(long, short = 'o', value_name = "PATH")]
    pub output: Option<Utf8PathBuf>,

    /// Directory holding the per-repository workspaces
    #[arg(long, value_name = "PATH")]
    pub workspace_dir: Option<Utf8PathBuf>,

    /// Metrics tool binary, invoked as `<TOOL> <workspace>`
    #[arg(long, value_name = "TOOL")]
    pub tool: Option<Utf8PathBuf>,

    /// Most eligible repositories to take on
    #[arg(long, value_name = "N")]
    pub max_count: Option<usize>,

    /// Largest total file count a repository may have and still be collected
    #[arg(long, value_name = "N")]
    pub max_candidate_size: Option<u64>,

    /// Remove each workspace once its repository is processed
    #[arg(long)]
    pub delete_workspaces: bool,

    /// Repositories processed at once
    #[arg(long, value_name = "N")]
    pub concurrency: Option<usize>,
}

impl CollectArgs {
    fn apply_overrides(&self, config: &mut Config) {
        if let Some(tool) = &self.tool {
            config.tool = tool.to_string();
        }
        if let Some(max_count) = self.max_count {
            config.max_count = max_count;
        }
        if let Some(max_candidate_size) = self.max_candidate_size {
            config.max_candidate_size = max_candidate_size;
        }
        if self.delete_workspaces {
            config.delete_workspace_after = true;
        }
        if let Some(concurrency) = self.concurrency {
            config.concurrency = concurrency;
        }
    }
}

/// Run the pipeline over a catalog and persist the results.
///
/// # Errors
///
/// Fails only when the catalog or configuration cannot be loaded, or when the results
/// cannot be written. Individual repository failures are reported, not returned.
pub async fn collect_metrics<H: Host>(host: &mut H, args: &CollectArgs) -> Result<()> {
    init_logging(args.common.log_level);

    let catalog_dir = args.common.catalog_dir();
    let mut config = Config::load(catalog_dir, args.common.config.as_ref())?;
    args.apply_overrides(&mut config);
    config.validate()?;

    let catalog = Catalog::load(args.common.catalog.as_std_path(), &config.source_extension)?;
    log::info!(
        target: LOG_TARGET,
        "Loaded {} candidates from '{}' ({} malformed entries skipped)",
        catalog.len(),
        args.common.catalog,
        catalog.skipped()
    );

    let workspace_root = match &args.workspace_dir {
        Some(dir) => dir.clone().into_std_path_buf(),
        None => default_workspace_dir()?,
    };
    let output: PathBuf = args
        .output
        .clone()
        .unwrap_or_else(|| catalog_dir.join(DEFAULT_OUTPUT_FILE))
        .into_std_path_buf();

    let progress = ProgressReporter::new(args.common.progress_delay(), args.common.color.use_colors(&std::io::stderr()));
    let pipeline = Pipeline::new(GitAcquirer, ToolExtractor::new(&config.tool), workspace_root, config.run_config());
    let summary = pipeline.run(&catalog, &progress).await;

    summary
        .results
        .persist(&output)
        .map_err(|e| e.enrich_with(|| format!("saving results for '{}'", args.common.catalog)))?;

    let use_colors = args.common.color.use_colors(&std::io::stdout());
    report_summary(host, &summary, &output, use_colors);
    Ok(())
}

fn report_summary<H: Host>(host: &mut H, summary: &RunSummary, output: &std::path::Path, use_colors: bool) {
    if !summary.failures.is_empty() {
        let _ = writeln!(host.error(), "\n{} repositories could not be measured", summary.failures.len());
        for failure in &summary.failures {
            let _ = writeln!(host.error(), "  {}: {}", failure.id, failure.kind);
        }
    }

    let collected = summary.results.len().to_string();
    let collected = if use_colors { collected.green().bold().to_string() } else { collected };

    let _ = writeln!(
        host.output(),
        "Collected metrics for {collected} of {} attempted repositories ({} ineligible) into {}",
        summary.attempted,
        summary.ineligible,
        output.display()
    );
}

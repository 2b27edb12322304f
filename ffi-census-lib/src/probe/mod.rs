//! Source analysis behind the `ffi-metrics` tool.
//!
//! The tool walks a Rust source tree, parses every `.rs` file, and prints one JSON
//! payload on stdout which the census pipeline reads back as raw metrics.

mod source_file_analyzer;

pub use source_file_analyzer::{SourceFileInfo, analyze_source_file};

use crate::Result;
use crate::pipeline::PAYLOAD_SCHEMA;
use clap::Parser;
use ohno::{IntoAppError, bail};
use serde::Serialize;
use std::ffi::OsString;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use walkdir::{DirEntry, WalkDir};

const LOG_TARGET: &str = "     probe";

const MAX_FILE_SIZE: u64 = 5_000_000;
const SKIPPED_DIRS: &[&str] = &[".git", "target"];
const USAGE_ERROR: u8 = 2;

/// Totals for a whole source tree, in the payload shape the pipeline consumes.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ProbeReport {
    pub schema: u32,
    pub total_lines: u64,
    pub extern_c: u64,
    pub link_attrs: u64,
    pub no_mangle: u64,
    pub unsafe_blocks: u64,
    pub unsafe_fns: u64,
    pub ffi_files: u64,
    pub max_syntax_depth: u64,
    pub files_analyzed: u64,
    pub files_with_errors: u64,
}

impl ProbeReport {
    fn add(&mut self, info: &SourceFileInfo) {
        self.files_analyzed += 1;
        self.total_lines += info.lines;
        self.extern_c += info.extern_c;
        self.link_attrs += info.link_attrs;
        self.no_mangle += info.no_mangle;
        self.unsafe_blocks += info.unsafe_blocks;
        self.unsafe_fns += info.unsafe_fns;
        self.max_syntax_depth = self.max_syntax_depth.max(info.max_depth);

        if info.has_boundary_constructs() {
            self.ffi_files += 1;
        }

        if info.has_errors {
            self.files_with_errors += 1;
        }
    }
}

#[derive(Parser, Debug)]
#[command(name = "ffi-metrics", version, about = "Print FFI boundary and unsafe-code counts for a Rust source tree as JSON")]
struct ProbeArgs {
    /// Root of the source tree to analyze
    path: PathBuf,
}

/// Analyze every Rust file under `root`.
///
/// Files that cannot be read are logged and skipped; files that do not parse cleanly are
/// still counted and reported in `files_with_errors`.
pub fn scan(root: &Path) -> Result<ProbeReport> {
    if !root.is_dir() {
        bail!("'{}' is not a directory", root.display());
    }

    let mut report = ProbeReport {
        schema: PAYLOAD_SCHEMA,
        ..ProbeReport::default()
    };

    let walker = WalkDir::new(root)
        .follow_links(false)
        .into_iter()
        .filter_entry(|e| e.depth() == 0 || !is_skipped_dir(e));

    for entry in walker {
        let entry = match entry {
            Ok(entry) => entry,
            Err(err) => {
                log::debug!(target: LOG_TARGET, "Could not walk directory: {err:#}");
                continue;
            }
        };

        if !entry.file_type().is_file() || entry.path().extension().and_then(|s| s.to_str()) != Some("rs") {
            continue;
        }

        if let Ok(metadata) = entry.metadata()
            && metadata.len() > MAX_FILE_SIZE
        {
            log::debug!(target: LOG_TARGET, "Skipping large file '{}' ({} bytes)", entry.path().display(), metadata.len());
            continue;
        }

        match fs::read_to_string(entry.path()) {
            Ok(content) => report.add(&analyze_source_file(&content)),
            Err(e) => log::debug!(target: LOG_TARGET, "Could not read '{}', skipping: {e}", entry.path().display()),
        }
    }

    Ok(report)
}

fn is_skipped_dir(entry: &DirEntry) -> bool {
    entry.file_type().is_dir() && entry.file_name().to_str().is_some_and(|name| SKIPPED_DIRS.contains(&name))
}

/// Parse arguments, scan, and print the payload.
///
/// Returns the process exit status: 0 on success, 1 when the scan fails, 2 on bad usage.
pub fn run_probe<I, T>(args: I, out: &mut impl Write, err: &mut impl Write) -> u8
where
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
{
    let args = match ProbeArgs::try_parse_from(args) {
        Ok(args) => args,
        Err(e) => {
            let sink: &mut dyn Write = if e.use_stderr() { err } else { out };
            let _ = write!(sink, "{e}");
            return u8::try_from(e.exit_code()).unwrap_or(USAGE_ERROR);
        }
    };

    match scan(&args.path).and_then(|report| write_report(&report, out)) {
        Ok(()) => 0,
        Err(e) => {
            let _ = writeln!(err, "ffi-metrics: {e:#}");
            1
        }
    }
}

fn write_report(report: &ProbeReport, out: &mut impl Write) -> Result<()> {
    serde_json::to_writer(&mut *out, report).into_app_err("serializing metrics payload")?;
    writeln!(out).into_app_err("writing metrics payload")
}

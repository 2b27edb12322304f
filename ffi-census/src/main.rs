//! Collect FFI and unsafe-code metrics across a catalog of repositories.
#![cfg_attr(coverage_nightly, feature(coverage_attribute))]

use ffi_census_lib::{Host, run};
use std::io::{Write, stderr, stdout};
use std::process::ExitCode;

/// Host wired to the process's standard streams.
#[derive(Debug, Clone, Copy, Default)]
struct ConsoleHost;

#[cfg_attr(coverage_nightly, coverage(off))]
impl Host for ConsoleHost {
    fn output(&mut self) -> impl Write {
        stdout().lock()
    }

    fn error(&mut self) -> impl Write {
        stderr().lock()
    }
}

#[tokio::main]
#[cfg_attr(coverage_nightly, coverage(off))]
async fn main() -> ExitCode {
    let mut host = ConsoleHost;
    match run(&mut host, std::env::args_os()).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            let _ = writeln!(host.error(), "error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

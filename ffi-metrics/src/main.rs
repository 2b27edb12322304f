//! Print FFI boundary and unsafe-code counts for a Rust source tree as JSON.
#![cfg_attr(coverage_nightly, feature(coverage_attribute))]

use ffi_census_lib::probe::run_probe;
use std::io::{stderr, stdout};
use std::process::ExitCode;

#[cfg_attr(coverage_nightly, coverage(off))]
fn main() -> ExitCode {
    ExitCode::from(run_probe(std::env::args_os(), &mut stdout().lock(), &mut stderr().lock()))
}

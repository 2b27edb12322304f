#![doc(hidden)]
#![cfg_attr(coverage_nightly, feature(coverage_attribute))]

//! Core library for ffi-census
//!
//! This library consolidates all functionality for the ffi-census tool, which collects
//! FFI-boundary and unsafe-code metrics for a catalog of source repositories without
//! keeping permanent checkouts around.
//!
//! # Module Organization
//!
//! - [`commands`]: Command-line interface and orchestration
//! - [`pipeline`]: Catalog filtering, acquisition, extraction and result aggregation
//! - [`probe`]: The source analyzer behind the companion `ffi-metrics` tool

pub type Result<T, E = ohno::AppError> = core::result::Result<T, E>;

#[doc(hidden)]
pub mod commands;

#[doc(hidden)]
pub mod pipeline;

#[doc(hidden)]
pub mod probe;

pub use crate::commands::{Host, run};

//! Command-line interface and orchestration for ffi-census
//!
//! This module implements the CLI commands and wires the pipeline to real
//! collaborators (git, the metrics tool, HTTP archive listings). It handles
//! argument parsing, configuration management, and console output.
//!
//! ## Commands
//!
//! - **collect**: Filter a catalog, acquire and measure each eligible repository,
//!   and persist one result record per repository
//! - **manifests**: List each repository's remote archive and write the file-path
//!   manifests that enable sparse acquisition
//! - **init**: Generate a default configuration file
//!
//! Configuration is a TOML file (`census.toml` next to the catalog by default);
//! command-line flags override its values.

mod collect;
mod common;
mod config;
mod host;
mod init;
mod manifests;
mod progress_reporter;
mod run;

pub use collect::{CollectArgs, DEFAULT_OUTPUT_FILE, collect_metrics};
pub use common::{ColorMode, CommonArgs, LogLevel};
pub use config::{CONFIG_FILE_NAME, Config, DEFAULT_CONFIG_TOML};
pub use host::Host;
pub use init::{InitArgs, init_config};
pub use manifests::{ManifestLayout, ManifestStats, ManifestsArgs, collect_manifests, update_manifests};
pub use progress_reporter::ProgressReporter;
pub use run::run;

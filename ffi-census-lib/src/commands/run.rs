//! Command dispatch logic for ffi-census

use super::{CollectArgs, InitArgs, ManifestsArgs, collect_manifests, collect_metrics, init_config};
use crate::{Host, Result};
use clap::builder::Styles;
use clap::builder::styling::{AnsiColor, Effects};
use clap::{Parser, Subcommand};

const CLAP_STYLES: Styles = Styles::styled()
    .header(AnsiColor::Green.on_default().effects(Effects::BOLD))
    .usage(AnsiColor::Green.on_default().effects(Effects::BOLD))
    .literal(AnsiColor::Cyan.on_default().effects(Effects::BOLD))
    .placeholder(AnsiColor::Cyan.on_default());

#[derive(Parser, Debug)]
#[command(name = "ffi-census", version, author, long_about = None)]
#[command(about = "Collect FFI and unsafe-code metrics across a catalog of repositories")]
#[command(styles = CLAP_STYLES)]
struct Cli {
    #[command(subcommand)]
    command: CensusSubcommand,
}

#[derive(Subcommand, Debug)]
enum CensusSubcommand {
    /// Acquire each eligible repository, measure it, and write the results
    Collect(Box<CollectArgs>),
    /// List remote archives and write a file-path manifest for each catalog entry
    Manifests(Box<ManifestsArgs>),
    /// Generate a default configuration file
    Init(InitArgs),
}

/// Dispatch command-line arguments to the appropriate handler
///
/// This function parses the command-line arguments and executes the corresponding
/// subcommand. It's designed to be called from main.rs with the program arguments.
///
/// # Errors
///
/// Returns an error if the executed command fails
pub async fn run<I, T, H>(host: &mut H, args: I) -> Result<()>
where
    I: IntoIterator<Item = T>,
    T: Into<std::ffi::OsString> + Clone,
    H: Host,
{
    match Cli::parse_from(args).command {
        CensusSubcommand::Collect(collect_args) => collect_metrics(host, &collect_args).await,
        CensusSubcommand::Manifests(manifests_args) => collect_manifests(host, &manifests_args).await,
        CensusSubcommand::Init(init_args) => init_config(host, &init_args),
    }
}

//! Command line interface for the `harvester` library.
//!
//! Harvests arXiv metadata for a date window over OAI-PMH, saves it as one JSONL file per
//! session and optionally downloads the PDFs into a resumable cache.
//!
//! # Usage
//!
//! ```bash
//! # Write the default configuration to ~/.config/harvester/config.toml
//! harvester init
//!
//! # Fetch two days of computer science metadata
//! harvester fetch --start-date 2024-08-01 --end-date 2024-08-02
//!
//! # Keep only vision and AI papers, and download their PDFs into per-category folders
//! harvester fetch --start-date 2024-08-01 --end-date 2024-08-02 \
//!   --category cs.CV --category cs.AI --pdf --fanout
//!
//! # Resume the downloads of a saved session
//! harvester download --input arxiv_cs_2024-08-01_to_2024-08-02.jsonl
//! ```
//!
//! Logging goes to stderr and is controlled by `-v` (repeatable) or `RUST_LOG`.

#![warn(missing_docs, clippy::missing_docs_in_private_items)]

use std::{
  path::{Path, PathBuf},
  process::ExitCode,
};

use chrono::NaiveDate;
use clap::{builder::ArgAction, Args, Parser, Subcommand, ValueEnum};
use console::style;
use harvester::{
  config::{ArtifactLayout, CacheMode, HarvestConfig},
  download::{DownloadReport, Downloader, FanoutReport},
  fetcher::FetchSummary,
  prelude::*,
};
use tracing::{debug, trace};
use tracing_subscriber::EnvFilter;

pub mod commands;
pub mod error;
pub mod interaction;

use crate::{commands::*, error::*, interaction::*};

/// Command line interface configuration and argument parsing
#[derive(Parser)]
#[command(author, version, about = "Harvest arXiv metadata over OAI-PMH and cache the PDFs")]
pub struct Cli {
  /// Verbose mode (-v, -vv, -vvv) for different levels of logging detail
  #[arg(
        short,
        long,
        action = ArgAction::Count,
        global = true,
        help = "Increase logging verbosity"
    )]
  verbose: u8,

  /// Path to the configuration file. If not specified, uses the default platform-specific
  /// configuration directory.
  #[arg(long, short, global = true)]
  config: Option<PathBuf>,

  /// The subcommand to execute
  #[command(subcommand)]
  command: Commands,

  /// Skip all prompts and accept defaults (mostly for testing)
  #[arg(long, hide = true, global = true)]
  accept_defaults: bool,
}

impl Cli {
  /// The configuration file in use.
  fn config_path(&self) -> PathBuf { self.config.clone().unwrap_or_else(HarvestConfig::default_path) }
}

/// Configures the logging system based on the verbosity level
///
/// The verbosity levels are:
/// - 0: warn (default)
/// - 1: info
/// - 2: debug
/// - 3+: trace
fn setup_logging(verbosity: u8) {
  let filter = match verbosity {
    0 => "warn",
    1 => "info",
    2 => "debug",
    _ => "trace",
  };

  let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

  tracing_subscriber::fmt()
    .with_env_filter(filter)
    .with_writer(std::io::stderr)
    .with_file(true)
    .with_line_number(true)
    .with_target(true)
    .init();
}

/// Entry point for the harvester CLI.
///
/// Exits non-zero when a command fails. Artifact download failures are reported in the
/// summary and never change the exit code.
#[tokio::main]
async fn main() -> ExitCode {
  let cli = Cli::parse();
  setup_logging(cli.verbose);

  let terminal = Terminal::new(cli.accept_defaults);
  let result = match &cli.command {
    Commands::Init(args) => init(&terminal, &cli.config_path(), args).await,
    Commands::Fetch(args) => fetch(&terminal, &cli, args).await,
    Commands::Download(args) => download(&terminal, &cli, args).await,
  };

  match result {
    Ok(()) => ExitCode::SUCCESS,
    Err(e) => {
      terminal.reply(ResponseContent::Error(&e)).ok();
      ExitCode::FAILURE
    },
  }
}

//! Errors surfaced by the command line interface.

use thiserror::Error;

/// Result alias for the CLI.
pub type Result<T> = core::result::Result<T, HarvesterdError>;

/// Errors that end a CLI command with a non-zero exit code.
#[derive(Error, Debug)]
pub enum HarvesterdError {
  /// The library failed: fetch, configuration or session file
  #[error(transparent)]
  Harvest(#[from] harvester::error::HarvestError),

  /// A prompt could not be shown or answered
  #[error(transparent)]
  Dialog(#[from] dialoguer::Error),

  /// A file system operation failed
  #[error(transparent)]
  Io(#[from] std::io::Error),
}

//! Error types for the harvester library.
//!
//! Errors here are the ones that abort a fetch session. Problems with a single record
//! container are not errors: they are counted and skipped (see [`crate::oai::ParseSkip`]).
//! Problems with a single artifact download are folded into
//! [`crate::download::DownloadStatus::Failed`] so a batch never aborts on one bad record.
//!
//! # Examples
//!
//! ```no_run
//! use harvester::{
//!   config::FetchConfig,
//!   error::HarvestError,
//!   fetcher::{FetchQuery, Fetcher},
//!   prelude::*,
//! };
//!
//! # async fn example(query: FetchQuery) -> Result<(), HarvestError> {
//! let transport = HttpTransport::new(std::time::Duration::from_secs(30))?.shared();
//! match Fetcher::new(transport, FetchConfig::default()).fetch(&query).await {
//!   Err(HarvestError::BudgetExceeded { pages, .. }) => println!("Gave up after {pages} pages"),
//!   Err(HarvestError::Network(e)) => println!("Network error: {e}"),
//!   Err(e) => println!("Other error: {e}"),
//!   Ok(outcome) => println!("Fetched {} records", outcome.records.len()),
//! }
//! # Ok(())
//! # }
//! ```

use std::time::Duration;

use thiserror::Error;

/// Error type alias used for the [`harvester`](crate) crate.
pub type Result<T> = core::result::Result<T, HarvestError>;

/// Errors that can occur while harvesting.
#[derive(Error, Debug)]
pub enum HarvestError {
  /// A network request failed.
  ///
  /// This covers connection failures, TLS errors and request timeouts. It is fatal to a
  /// fetch session.
  #[error(transparent)]
  Network(#[from] reqwest::Error),

  /// The server answered with a non-success HTTP status.
  #[error("{url} answered with HTTP {status}")]
  HttpStatus {
    /// The requested URL
    url:    String,
    /// The HTTP status code
    status: u16,
  },

  /// The endpoint returned an OAI-PMH protocol error other than `noRecordsMatch`.
  ///
  /// Typical codes are `badArgument`, `badResumptionToken` and `cannotDisseminateFormat`.
  #[error("OAI-PMH error {code}: {message}")]
  Oai {
    /// The OAI-PMH error code attribute
    code:    String,
    /// Human readable message returned with the code
    message: String,
  },

  /// A page could not be parsed as an OAI-PMH document at all.
  #[error("Malformed page: {0}")]
  MalformedPage(String),

  /// The fetch budget ran out before the endpoint returned an empty resumption token.
  ///
  /// An endpoint that keeps handing out tokens would otherwise page forever.
  #[error("Fetch budget exceeded after {pages} pages and {elapsed:?}")]
  BudgetExceeded {
    /// Number of pages requested before giving up
    pages:   u32,
    /// Wall-clock time spent in the session
    elapsed: Duration,
  },

  /// The requested date window starts after it ends.
  #[error("Start date {from} is after end date {to}")]
  InvalidDateRange {
    /// Requested start date
    from: chrono::NaiveDate,
    /// Requested end date
    to:   chrono::NaiveDate,
  },

  /// A file system operation failed.
  #[error(transparent)]
  Path(#[from] std::io::Error),

  /// A JSON line could not be serialized or parsed.
  #[error(transparent)]
  Json(#[from] serde_json::Error),

  /// A line of a session file is not a valid record.
  #[error("{}:{line}: invalid record: {source}", path.display())]
  InvalidRecordLine {
    /// The session file
    path:   std::path::PathBuf,
    /// One-based line number
    line:   usize,
    /// The parse failure
    source: serde_json::Error,
  },

  /// A configuration file could not be parsed.
  #[error(transparent)]
  TomlDe(#[from] toml::de::Error),

  /// A configuration could not be rendered to TOML.
  #[error(transparent)]
  TomlSer(#[from] toml::ser::Error),

  /// The configuration is well formed but unusable.
  #[error("{0}")]
  Config(String),
}

//! Resumable metadata harvesting from token-paginated OAI-PMH endpoints.
//!
//! `harvester` is a library for collecting a complete, date-filtered set of records from an
//! OAI-PMH metadata source (arXiv by default) and materializing each record's associated
//! artifact (a PDF) into a local cache, providing:
//!
//! - Resumption-token driven pagination with an explicit page and wall-clock budget
//! - Exact client-side date-window and category filtering
//! - Streaming artifact downloads with atomic writes and cache-hit short-circuiting
//! - A shared politeness throttle for every request that touches the network
//! - Newline-delimited JSON persistence of a fetch session
//!
//! # Getting Started
//!
//! ```no_run
//! use chrono::NaiveDate;
//! use harvester::{
//!   config::HarvestConfig,
//!   download::Downloader,
//!   fetcher::{FetchQuery, Fetcher},
//!   prelude::*,
//! };
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!   let config = HarvestConfig::default();
//!   let transport = HttpTransport::new(config.fetch.request_timeout())?.shared();
//!
//!   let query = FetchQuery::new(
//!     NaiveDate::from_ymd_opt(2024, 8, 1).unwrap(),
//!     NaiveDate::from_ymd_opt(2024, 8, 2).unwrap(),
//!   )
//!   .with_set("cs")
//!   .with_categories(["cs.CV", "cs.AI"]);
//!
//!   let outcome = Fetcher::new(transport.clone(), config.fetch.clone()).fetch(&query).await?;
//!   println!("Fetched {} records", outcome.records.len());
//!
//!   let downloader = Downloader::new(transport, config.download.clone());
//!   let report = downloader.ensure_all(&outcome.records, "papers".as_ref()).await;
//!   println!("Downloaded {}, cached {}", report.downloaded, report.cached);
//!   Ok(())
//! }
//! ```
//!
//! # Module Organization
//!
//! - [`fetcher`]: The paginated fetch session and its summary
//! - [`oai`]: OAI-PMH page parsing
//! - [`download`]: Artifact cache and downloader
//! - [`transport`]: The network seam and its reqwest implementation
//! - [`throttle`]: Politeness interval shared across requests
//! - [`record`]: The harvested record type
//! - [`jsonl`]: Session persistence
//! - [`config`]: TOML configuration
//! - [`error`]: Error types

#![warn(missing_docs, clippy::missing_docs_in_private_items)]

use std::{
  collections::{BTreeSet, HashSet},
  fmt::Display,
  path::{Path, PathBuf},
  sync::Arc,
  time::Duration,
};

use async_trait::async_trait;
use chrono::NaiveDate;
use futures::{stream::BoxStream, StreamExt};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, trace, warn};
#[cfg(test)]
use {tempfile::tempdir, tracing_test::traced_test};

pub mod config;
pub mod download;
pub mod error;
pub mod fetcher;
pub mod jsonl;
pub mod oai;
pub mod record;
pub mod throttle;
pub mod transport;

use crate::{error::*, record::Record, throttle::Throttle, transport::Transport};

/// Common traits and types for ergonomic imports.
///
/// # Usage
///
/// ```no_run
/// use harvester::prelude::*;
///
/// fn example() -> Result<(), HarvestError> {
///   let transport = HttpTransport::new(std::time::Duration::from_secs(30))?;
///   Ok(())
/// }
/// ```
pub mod prelude {
  pub use crate::{
    error::HarvestError,
    record::Record,
    transport::{HttpTransport, Transport},
  };
}

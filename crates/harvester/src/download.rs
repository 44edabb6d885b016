//! Artifact cache and downloader.
//!
//! Every record maps to one deterministic file under a destination folder. The file's
//! presence is the cache-hit signal: nothing is re-checked or re-downloaded once it exists.
//! Downloads stream chunk by chunk into `{file}.part` and are renamed into place only after the
//! last chunk is on disk, so an interrupted transfer never leaves a file that a later run
//! would mistake for a hit.
//!
//! Each record ends in one of three states, see [`DownloadStatus`]. A failure is reported, not
//! raised; re-running a batch retries exactly the records that failed.
//!
//! # Examples
//!
//! ```no_run
//! use harvester::{config::DownloadConfig, download::Downloader, prelude::*};
//!
//! # async fn example(records: Vec<Record>) -> Result<(), HarvestError> {
//! let transport = HttpTransport::new(std::time::Duration::from_secs(60))?.shared();
//! let downloader = Downloader::new(transport, DownloadConfig::default());
//!
//! let report = downloader.ensure_all(&records, "arxiv_pdfs".as_ref()).await;
//! println!("{} downloaded, {} cached, {} failed", report.downloaded, report.cached, report.failed);
//!
//! let fanout = downloader.fan_out_categories(&records, "arxiv_pdfs".as_ref()).await;
//! println!("{} category copies", fanout.copied);
//! # Ok(())
//! # }
//! ```

use tokio::{fs, io::AsyncWriteExt};

use crate::config::{ArtifactLayout, CacheMode, DownloadConfig};

use super::*;

/// Folder used by the primary-category layout for records without categories.
pub const UNCATEGORIZED: &str = "uncategorized";

/// Terminal state of one record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DownloadStatus {
  /// The artifact was already present; no request was made.
  Hit,
  /// The artifact was fetched and written.
  Downloaded,
  /// The transfer failed; nothing was left at the destination path.
  Failed(String),
}

/// The state a record ended in, with where its artifact lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadOutcome {
  /// Record id
  pub id:     String,
  /// Canonical artifact path
  pub path:   PathBuf,
  /// Terminal state
  pub status: DownloadStatus,
}

/// Outcomes of a batch, in input order, with their counts.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct DownloadReport {
  /// Per-record outcomes
  pub outcomes:   Vec<DownloadOutcome>,
  /// Records fetched over the network
  pub downloaded: u64,
  /// Records already present
  pub cached:     u64,
  /// Records that failed
  pub failed:     u64,
}

impl FromIterator<DownloadOutcome> for DownloadReport {
  fn from_iter<I: IntoIterator<Item = DownloadOutcome>>(iter: I) -> Self {
    let mut report = Self::default();
    for outcome in iter {
      match outcome.status {
        DownloadStatus::Hit => report.cached += 1,
        DownloadStatus::Downloaded => report.downloaded += 1,
        DownloadStatus::Failed(_) => report.failed += 1,
      }
      report.outcomes.push(outcome);
    }
    report
  }
}

/// Result of materializing per-category copies.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct FanoutReport {
  /// Copies written
  pub copied:   u64,
  /// Copies that were already present
  pub existing: u64,
  /// Records whose canonical artifact was absent
  pub missing:  u64,
  /// Copies that could not be written
  pub failed:   u64,
}

/// Downloads artifacts into a cache folder.
pub struct Downloader {
  /// Network access
  transport: Arc<dyn Transport>,
  /// Download settings
  config:    DownloadConfig,
  /// Spacing of network requests across every concurrent download
  throttle:  Arc<Throttle>,
}

impl Downloader {
  /// Creates a downloader with its own throttle built from the configured politeness.
  pub fn new(transport: Arc<dyn Transport>, config: DownloadConfig) -> Self {
    let throttle = Arc::new(Throttle::new(config.politeness()));
    Self { transport, config, throttle }
  }

  /// Replaces the throttle, e.g. to share one with another component.
  pub fn with_throttle(mut self, throttle: Arc<Throttle>) -> Self {
    self.throttle = throttle;
    self
  }

  /// The configuration in use.
  pub fn config(&self) -> &DownloadConfig { &self.config }

  /// Artifact file name for `record`, e.g. `2408.00001.pdf`.
  pub fn file_name(&self, record: &Record) -> String {
    format!("{}.{}", record.file_stem(), self.config.extension)
  }

  /// Deterministic canonical path of `record`'s artifact under `destination`.
  pub fn artifact_path(&self, record: &Record, destination: &Path) -> PathBuf {
    match self.config.layout {
      ArtifactLayout::Flat => destination.join(self.file_name(record)),
      ArtifactLayout::PrimaryCategory => destination
        .join(category_folder(record.primary_category.as_deref().unwrap_or(UNCATEGORIZED)))
        .join(self.file_name(record)),
    }
  }

  /// Makes sure `record`'s artifact is present under `destination`.
  ///
  /// A present artifact is a [`DownloadStatus::Hit`] and costs no request and no throttle
  /// wait (unless [`CacheMode::Refresh`] is configured).
  pub async fn ensure(&self, record: &Record, destination: &Path) -> DownloadStatus {
    let path = self.artifact_path(record, destination);

    if self.config.cache_mode == CacheMode::SkipIfExists {
      match fs::try_exists(&path).await {
        Ok(true) => {
          trace!("Cache hit for {} at {}", record.id, path.display());
          return DownloadStatus::Hit;
        },
        Ok(false) => {},
        Err(e) => return DownloadStatus::Failed(e.to_string()),
      }
    }

    let url = self.config.artifact_url(&record.id);
    let _permit = self.throttle.wait().await;
    match self.download(&url, &path).await {
      Ok(bytes) => {
        debug!("Downloaded {} ({bytes} bytes) to {}", record.id, path.display());
        DownloadStatus::Downloaded
      },
      Err(e) => {
        warn!("Error downloading {}: {e}", record.id);
        DownloadStatus::Failed(e.to_string())
      },
    }
  }

  /// Runs [`Downloader::ensure`] for every record with up to `concurrency` transfers in
  /// flight. Outcomes keep the input order.
  pub async fn ensure_all(&self, records: &[Record], destination: &Path) -> DownloadReport {
    self.ensure_all_with_progress(records, destination, |_| {}).await
  }

  /// Like [`Downloader::ensure_all`], calling `on_item` as each record completes.
  pub async fn ensure_all_with_progress(
    &self,
    records: &[Record],
    destination: &Path,
    mut on_item: impl FnMut(&DownloadOutcome),
  ) -> DownloadReport {
    info!("Ensuring {} artifacts under {}", records.len(), destination.display());
    let outcomes: Vec<DownloadOutcome> = futures::stream::iter(records)
      .map(|record| async move {
        DownloadOutcome {
          id:     record.id.clone(),
          path:   self.artifact_path(record, destination),
          status: self.ensure(record, destination).await,
        }
      })
      .buffered(self.config.concurrency.max(1))
      .inspect(|outcome| on_item(outcome))
      .collect()
      .await;

    let report: DownloadReport = outcomes.into_iter().collect();
    info!(
      "Artifacts: {} downloaded, {} cached, {} failed",
      report.downloaded, report.cached, report.failed
    );
    report
  }

  /// Copies each present artifact into `{destination}/{category}/` for every category of its
  /// record. The canonical copy stays where it is, and existing copies are left alone.
  ///
  /// A copy that cannot be made is warned about and counted; the remaining records are still
  /// processed.
  pub async fn fan_out_categories(&self, records: &[Record], destination: &Path) -> FanoutReport {
    let mut report = FanoutReport::default();
    for record in records {
      let source = self.artifact_path(record, destination);
      match fs::try_exists(&source).await {
        Ok(true) => {},
        Ok(false) => {
          warn!("Artifact for {} not found, skipping", record.id);
          report.missing += 1;
          continue;
        },
        Err(e) => {
          warn!("Could not check artifact for {}: {e}", record.id);
          report.missing += 1;
          continue;
        },
      }
      for category in &record.categories {
        let target = destination.join(category_folder(category)).join(self.file_name(record));
        if target == source {
          continue;
        }
        match fs::try_exists(&target).await {
          Ok(true) => report.existing += 1,
          Ok(false) => match copy_atomically(&source, &target).await {
            Ok(()) => report.copied += 1,
            Err(e) => {
              warn!("Could not copy {} into {category}: {e}", record.id);
              report.failed += 1;
            },
          },
          Err(e) => {
            warn!("Could not copy {} into {category}: {e}", record.id);
            report.failed += 1;
          },
        }
      }
    }
    debug!("Category fan-out: {report:?}");
    report
  }

  /// Streams `url` into `path`, through a `.part` file when writes are atomic or when an existing
  /// file is being refreshed.
  ///
  /// On any error the file being written is removed.
  async fn download(&self, url: &str, path: &Path) -> Result<u64> {
    if let Some(parent) = path.parent() {
      fs::create_dir_all(parent).await?;
    }
    let through_part = self.config.atomic_write || self.config.cache_mode == CacheMode::Refresh;
    let target = if through_part { part_path(path) } else { path.to_path_buf() };

    let written = async {
      let bytes = self.stream_into(url, &target).await?;
      if target != path {
        fs::rename(&target, path).await?;
      }
      Ok::<_, HarvestError>(bytes)
    }
    .await;

    if written.is_err() {
      if let Err(e) = fs::remove_file(&target).await {
        if e.kind() != std::io::ErrorKind::NotFound {
          warn!("Could not remove partial file {}: {e}", target.display());
        }
      }
    }
    written
  }

  /// Writes the response body chunk by chunk into `target`.
  async fn stream_into(&self, url: &str, target: &Path) -> Result<u64> {
    let mut stream = self.transport.open_stream(url).await?;
    let mut file = fs::File::create(target).await?;
    let mut written = 0;
    while let Some(chunk) = stream.next().await {
      let chunk = chunk?;
      file.write_all(&chunk).await?;
      written += chunk.len() as u64;
    }
    file.flush().await?;
    file.sync_all().await?;
    Ok(written)
  }
}

/// `{path}.part`, next to the final file so the rename stays on one file system.
fn part_path(path: &Path) -> PathBuf {
  let mut name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
  name.push(".part");
  path.with_file_name(name)
}

/// Folder name for a category; separators are replaced so a category is always one level.
fn category_folder(category: &str) -> String { category.replace(['/', '\\'], "_") }

/// Copies `source` to `target` through a `.part` file.
async fn copy_atomically(source: &Path, target: &Path) -> Result<()> {
  if let Some(parent) = target.parent() {
    fs::create_dir_all(parent).await?;
  }
  let part = part_path(target);
  if let Err(e) = async {
    fs::copy(source, &part).await?;
    fs::rename(&part, target).await
  }
  .await
  {
    fs::remove_file(&part).await.ok();
    return Err(e.into());
  }
  Ok(())
}

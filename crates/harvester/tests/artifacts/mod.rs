use std::time::Duration;

use harvester::{
  config::{ArtifactLayout, CacheMode, DownloadConfig},
  download::{DownloadStatus, Downloader},
  record::Record,
  throttle::Throttle,
};

use super::*;

fn record(id: &str, categories: &str) -> Record {
  Record::new(id, "title", "abstract", date(2024, 8, 2)).with_categories(categories)
}

fn url(id: &str) -> String { format!("mock://pdf/{id}.pdf") }

fn body(id: &str) -> Artifact { Artifact::Body(vec![b"%PDF-".to_vec(), id.as_bytes().to_vec()]) }

#[traced_test]
#[tokio::test]
async fn test_download_then_hit() -> TestResult<()> {
  let dir = tempfile::tempdir()?;
  let transport = Arc::new(MockTransport::default());
  transport.set_artifact(&url("2408.00001"), body("2408.00001"));
  let downloader = Downloader::new(shared(&transport), fast_download_config());
  let record = record("2408.00001", "cs.AI");

  assert_eq!(downloader.ensure(&record, dir.path()).await, DownloadStatus::Downloaded);
  assert_eq!(std::fs::read(dir.path().join("2408.00001.pdf"))?, b"%PDF-2408.00001");

  assert_eq!(downloader.ensure(&record, dir.path()).await, DownloadStatus::Hit);
  assert_eq!(transport.artifact_requests(), vec![url("2408.00001")]);
  Ok(())
}

#[traced_test]
#[tokio::test]
async fn test_interrupted_transfer_leaves_nothing_behind() -> TestResult<()> {
  let dir = tempfile::tempdir()?;
  let transport = Arc::new(MockTransport::default());
  transport.set_artifact(&url("2408.00001"), Artifact::Interrupted(vec![b"%PDF-half".to_vec()]));
  let downloader = Downloader::new(shared(&transport), fast_download_config());
  let record = record("2408.00001", "cs.AI");

  let status = downloader.ensure(&record, dir.path()).await;
  assert!(matches!(status, DownloadStatus::Failed(_)), "{status:?}");
  assert!(!dir.path().join("2408.00001.pdf").exists());
  assert!(!dir.path().join("2408.00001.pdf.part").exists());

  transport.set_artifact(&url("2408.00001"), body("2408.00001"));
  assert_eq!(downloader.ensure(&record, dir.path()).await, DownloadStatus::Downloaded);
  assert_eq!(transport.artifact_requests().len(), 2);
  Ok(())
}

#[traced_test]
#[tokio::test]
async fn test_interrupted_direct_write_is_removed() -> TestResult<()> {
  let dir = tempfile::tempdir()?;
  let transport = Arc::new(MockTransport::default());
  transport.set_artifact(&url("2408.00001"), Artifact::Interrupted(vec![b"%PDF-half".to_vec()]));
  let mut config = fast_download_config();
  config.atomic_write = false;
  let downloader = Downloader::new(shared(&transport), config);

  let status = downloader.ensure(&record("2408.00001", "cs.AI"), dir.path()).await;
  assert!(matches!(status, DownloadStatus::Failed(_)));
  assert!(!dir.path().join("2408.00001.pdf").exists());
  Ok(())
}

#[traced_test]
#[tokio::test]
async fn test_missing_artifact_fails_without_file() -> TestResult<()> {
  let dir = tempfile::tempdir()?;
  let transport = Arc::new(MockTransport::default());
  let downloader = Downloader::new(shared(&transport), fast_download_config());

  let status = downloader.ensure(&record("2408.99999", "cs.AI"), dir.path()).await;
  match status {
    DownloadStatus::Failed(reason) => assert!(reason.contains("404"), "{reason}"),
    other => panic!("expected a failure, got {other:?}"),
  }
  assert!(!dir.path().join("2408.99999.pdf").exists());
  assert!(logs_contain("Error downloading 2408.99999"));
  Ok(())
}

#[traced_test]
#[tokio::test]
async fn test_batch_keeps_order_and_counts() -> TestResult<()> {
  let dir = tempfile::tempdir()?;
  let transport = Arc::new(MockTransport::default());
  transport.set_artifact(&url("2408.00001"), body("2408.00001"));
  transport.set_artifact(&url("2408.00003"), body("2408.00003"));
  transport.set_artifact(&url("2408.00004"), body("2408.00004"));
  std::fs::write(dir.path().join("2408.00004.pdf"), b"%PDF-cached")?;

  let mut config = fast_download_config();
  config.concurrency = 3;
  let downloader = Downloader::new(shared(&transport), config);
  let records = vec![
    record("2408.00001", "cs.AI"),
    record("2408.00002", "cs.AI"),
    record("2408.00003", "cs.AI"),
    record("2408.00004", "cs.AI"),
  ];

  let mut completed = 0;
  let report = downloader
    .ensure_all_with_progress(&records, dir.path(), |_| completed += 1)
    .await;

  assert_eq!(completed, 4);
  let ids: Vec<_> = report.outcomes.iter().map(|o| o.id.as_str()).collect();
  assert_eq!(ids, vec!["2408.00001", "2408.00002", "2408.00003", "2408.00004"]);
  assert_eq!((report.downloaded, report.cached, report.failed), (2, 1, 1));
  assert_eq!(report.outcomes[3].status, DownloadStatus::Hit);
  assert_eq!(report.outcomes[0].path, dir.path().join("2408.00001.pdf"));
  assert_eq!(std::fs::read(dir.path().join("2408.00004.pdf"))?, b"%PDF-cached");

  let rerun = downloader.ensure_all(&records, dir.path()).await;
  assert_eq!((rerun.downloaded, rerun.cached, rerun.failed), (0, 3, 1));
  assert_eq!(rerun.outcomes[1].id, "2408.00002");
  Ok(())
}

#[traced_test]
#[tokio::test]
async fn test_refresh_replaces_existing_file() -> TestResult<()> {
  let dir = tempfile::tempdir()?;
  let transport = Arc::new(MockTransport::default());
  transport.set_artifact(&url("2408.00001"), body("2408.00001"));
  std::fs::write(dir.path().join("2408.00001.pdf"), b"stale")?;
  let mut config = fast_download_config();
  config.cache_mode = CacheMode::Refresh;
  let downloader = Downloader::new(shared(&transport), config);

  let status = downloader.ensure(&record("2408.00001", "cs.AI"), dir.path()).await;
  assert_eq!(status, DownloadStatus::Downloaded);
  assert_eq!(std::fs::read(dir.path().join("2408.00001.pdf"))?, b"%PDF-2408.00001");
  Ok(())
}

#[traced_test]
#[tokio::test]
async fn test_failed_refresh_keeps_existing_file() -> TestResult<()> {
  let dir = tempfile::tempdir()?;
  let transport = Arc::new(MockTransport::default());
  transport.set_artifact(&url("2408.00001"), Artifact::Interrupted(vec![b"%PDF-half".to_vec()]));
  std::fs::write(dir.path().join("2408.00001.pdf"), b"%PDF-good")?;
  let mut config = fast_download_config();
  config.cache_mode = CacheMode::Refresh;
  config.atomic_write = false;
  let downloader = Downloader::new(shared(&transport), config);

  let status = downloader.ensure(&record("2408.00001", "cs.AI"), dir.path()).await;
  assert!(matches!(status, DownloadStatus::Failed(_)), "{status:?}");
  assert_eq!(std::fs::read(dir.path().join("2408.00001.pdf"))?, b"%PDF-good");
  assert!(!dir.path().join("2408.00001.pdf.part").exists());
  Ok(())
}

#[traced_test]
#[tokio::test]
async fn test_primary_category_layout_writes_into_category_folder() -> TestResult<()> {
  let dir = tempfile::tempdir()?;
  let transport = Arc::new(MockTransport::default());
  transport.set_artifact(&url("2408.00001"), body("2408.00001"));
  let mut config = fast_download_config();
  config.layout = ArtifactLayout::PrimaryCategory;
  let downloader = Downloader::new(shared(&transport), config);

  let status = downloader.ensure(&record("2408.00001", "cs.CV cs.AI"), dir.path()).await;
  assert_eq!(status, DownloadStatus::Downloaded);
  assert!(dir.path().join("cs.CV/2408.00001.pdf").exists());
  assert!(!dir.path().join("2408.00001.pdf").exists());
  Ok(())
}

#[traced_test]
#[tokio::test(start_paused = true)]
async fn test_shared_throttle_spaces_downloads_across_workers() -> TestResult<()> {
  let dir = tempfile::tempdir()?;
  let transport = Arc::new(MockTransport::default());
  let mut records = Vec::new();
  for n in 1..=4 {
    let id = format!("2408.0000{n}");
    transport.set_artifact(&url(&id), body(&id));
    records.push(record(&id, "cs.AI"));
  }
  // Hits never touch the throttle.
  std::fs::write(dir.path().join("2408.00002.pdf"), b"%PDF-cached")?;

  let mut config = fast_download_config();
  config.concurrency = 4;
  let throttle = Arc::new(Throttle::new(Duration::from_secs(1)));
  let downloader = Downloader::new(shared(&transport), config).with_throttle(throttle);

  let started = tokio::time::Instant::now();
  let report = downloader.ensure_all(&records, dir.path()).await;

  assert_eq!((report.downloaded, report.cached), (3, 1));
  assert!(started.elapsed() >= Duration::from_secs(2));
  assert!(started.elapsed() < Duration::from_secs(4));
  Ok(())
}

#[traced_test]
#[tokio::test(start_paused = true)]
async fn test_pause_follows_the_end_of_a_slow_download() -> TestResult<()> {
  let dir = tempfile::tempdir()?;
  let transport = Arc::new(MockTransport::default());
  for id in ["2408.00001", "2408.00002"] {
    transport.set_artifact(&url(id), Artifact::Slow(b"%PDF-slow".to_vec(), Duration::from_secs(3)));
  }
  let config = DownloadConfig { url_template: "mock://pdf/{id}.pdf".to_string(), ..Default::default() };
  assert_eq!(config.politeness(), Duration::from_secs(1));
  let downloader = Downloader::new(shared(&transport), config);

  let records = vec![record("2408.00001", "cs.AI"), record("2408.00002", "cs.AI")];
  let report = downloader.ensure_all(&records, dir.path()).await;

  assert_eq!(report.downloaded, 2);
  let starts = transport.artifact_request_times();
  assert_eq!(starts.len(), 2);
  // Three seconds of transfer, then the full one second pause.
  assert!(starts[1] - starts[0] >= Duration::from_secs(4), "{:?}", starts[1] - starts[0]);
  Ok(())
}

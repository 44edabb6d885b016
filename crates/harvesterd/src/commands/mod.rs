use super::*;

pub mod download;
pub mod fetch;
pub mod init;

pub use download::{download, DownloadArgs};
pub use fetch::{fetch, FetchArgs};
pub use init::{init, InitArgs};

/// Available commands for the CLI
#[derive(Subcommand, Clone)]
pub enum Commands {
  /// Write the default configuration file
  Init(InitArgs),

  /// Fetch the metadata of a date window, optionally downloading the PDFs
  Fetch(FetchArgs),

  /// Download the PDFs of a saved session, skipping those already present
  Download(DownloadArgs),
}

/// Where the canonical copy of each PDF is stored
#[derive(ValueEnum, Clone, Copy, Debug)]
pub enum Layout {
  /// Every PDF directly in the PDF folder
  Flat,
  /// One folder per primary category
  PrimaryCategory,
}

impl From<Layout> for ArtifactLayout {
  fn from(layout: Layout) -> Self {
    match layout {
      Layout::Flat => ArtifactLayout::Flat,
      Layout::PrimaryCategory => ArtifactLayout::PrimaryCategory,
    }
  }
}

/// Options of the PDF download phase, shared by `fetch` and `download`.
#[derive(Args, Clone, Debug)]
pub struct ArtifactArgs {
  /// Folder receiving the PDFs
  #[arg(long)]
  pub pdf_dir: Option<PathBuf>,

  /// Folder layout of the canonical copies (overrides the configuration)
  #[arg(long, value_enum)]
  pub layout: Option<Layout>,

  /// Also copy every PDF into one folder per category
  #[arg(long)]
  pub fanout: bool,

  /// Number of downloads in flight (overrides the configuration)
  #[arg(long)]
  pub concurrency: Option<usize>,

  /// Download again even when the PDF is already present
  #[arg(long)]
  pub refresh: bool,
}

/// Loads the configuration named on the command line, or the default one.
fn load_config(cli: &Cli) -> Result<HarvestConfig> {
  let path = cli.config_path();
  debug!("Using configuration {}", path.display());
  Ok(HarvestConfig::load_or_default(path)?)
}

/// Runs the download phase for `records` into `pdf_dir` and prints its summary.
async fn download_artifacts<I: UserInteraction>(
  interaction: &I,
  config: &HarvestConfig,
  args: &ArtifactArgs,
  records: &[Record],
  pdf_dir: &Path,
) -> Result<()> {
  let mut download = config.download.clone();
  if let Some(layout) = args.layout {
    download.layout = layout.into();
  }
  if let Some(concurrency) = args.concurrency {
    download.concurrency = concurrency.max(1);
  }
  if args.refresh {
    download.cache_mode = CacheMode::Refresh;
  }
  download.category_fanout |= args.fanout;

  let transport = HttpTransport::new(config.fetch.request_timeout())?.shared();
  let downloader = Downloader::new(transport, download);

  interaction.reply(ResponseContent::Working(&format!(
    "Ensuring {} PDFs in {}",
    records.len(),
    pdf_dir.display()
  )))?;
  let report = downloader
    .ensure_all_with_progress(records, pdf_dir, |outcome| {
      trace!("{} -> {:?}", outcome.id, outcome.status);
    })
    .await;

  let fanout = if downloader.config().category_fanout {
    Some(downloader.fan_out_categories(records, pdf_dir).await)
  } else {
    None
  };

  interaction.reply(ResponseContent::DownloadSummary(&report, fanout.as_ref()))?;
  if report.failed > 0 {
    interaction.reply(ResponseContent::Warning(
      "Some PDFs failed to download; run the same command again to retry them",
    ))?;
  }
  Ok(())
}

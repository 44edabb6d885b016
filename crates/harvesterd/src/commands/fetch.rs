//! The `fetch` command: one metadata session, saved as JSONL, with an optional PDF phase.

use clap::ArgGroup;
use harvester::{
  fetcher::{FetchQuery, Fetcher},
  jsonl,
};

use super::*;

/// Arguments of [`Commands::Fetch`]
#[derive(Args, Clone, Debug)]
#[command(group(
  ArgGroup::new("pdf_options")
    .args(["pdf_dir", "layout", "fanout", "concurrency", "refresh"])
    .multiple(true)
    .requires("pdf")
))]
pub struct FetchArgs {
  /// First creation date to keep, e.g. 2024-08-01
  #[arg(long)]
  pub start_date: NaiveDate,

  /// Last creation date to keep (inclusive)
  #[arg(long)]
  pub end_date: NaiveDate,

  /// OAI set requested from the server
  #[arg(long, default_value = "cs")]
  pub subject: String,

  /// Keep only records in one of these categories (repeatable)
  #[arg(long = "category", short = 'C')]
  pub categories: Vec<String>,

  /// Session file to write, defaults to arxiv_{subject}_{start}_to_{end}.jsonl
  #[arg(long, short)]
  pub output: Option<PathBuf>,

  /// Days added past the end date in the server-side request (overrides the configuration)
  #[arg(long)]
  pub padding_days: Option<u32>,

  /// Maximum number of pages to request (overrides the configuration)
  #[arg(long)]
  pub max_pages: Option<u32>,

  /// Download the PDF of every fetched record
  #[arg(long)]
  pub pdf: bool,

  #[command(flatten)]
  pub artifacts: ArtifactArgs,
}

/// Function for the [`Commands::Fetch`] in the CLI.
pub async fn fetch<I: UserInteraction>(interaction: &I, cli: &Cli, args: &FetchArgs) -> Result<()> {
  let mut config = load_config(cli)?;
  if let Some(padding_days) = args.padding_days {
    config.fetch.padding_days = padding_days;
  }
  if let Some(max_pages) = args.max_pages {
    config.fetch.budget.max_pages = max_pages;
  }

  let query = FetchQuery::new(args.start_date, args.end_date)
    .with_set(args.subject.clone())
    .with_categories(args.categories.iter().cloned());

  interaction.reply(ResponseContent::Working(&format!(
    "Fetching {} records created from {} to {}",
    args.subject, args.start_date, args.end_date
  )))?;

  let transport = HttpTransport::new(config.fetch.request_timeout())?.shared();
  let outcome = Fetcher::new(transport, config.fetch.clone())
    .fetch_with_progress(&query, |summary| {
      debug!("Page {}: {} records kept so far", summary.pages, summary.totals.accepted);
    })
    .await?;
  interaction.reply(ResponseContent::FetchSummary(&outcome.summary))?;

  let output = args.output.clone().unwrap_or_else(|| {
    PathBuf::from(jsonl::session_file_name(&args.subject, args.start_date, args.end_date))
  });
  jsonl::write_records(&output, &outcome.records)?;
  interaction.reply(ResponseContent::Success(&format!(
    "Saved {} records to {}",
    outcome.records.len(),
    output.display()
  )))?;

  if args.pdf {
    let pdf_dir = args.artifacts.pdf_dir.clone().unwrap_or_else(|| {
      PathBuf::from(format!("arxiv_pdfs_{}_to_{}", args.start_date, args.end_date))
    });
    download_artifacts(interaction, &config, &args.artifacts, &outcome.records, &pdf_dir).await?;
  }
  Ok(())
}

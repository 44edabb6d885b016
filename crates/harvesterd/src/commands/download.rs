//! The `download` command: resumes the PDF phase of a saved session.

use harvester::jsonl;

use super::*;

/// Arguments of [`Commands::Download`]
#[derive(Args, Clone, Debug)]
pub struct DownloadArgs {
  /// Session file written by `fetch`
  #[arg(long, short)]
  pub input: PathBuf,

  #[command(flatten)]
  pub artifacts: ArtifactArgs,
}

/// Default PDF folder for a session file: `{stem}_pdfs` next to it.
fn default_pdf_dir(input: &Path) -> PathBuf {
  let stem = input.file_stem().map(|s| s.to_string_lossy().into_owned()).unwrap_or_default();
  input.with_file_name(format!("{stem}_pdfs"))
}

/// Function for the [`Commands::Download`] in the CLI.
pub async fn download<I: UserInteraction>(
  interaction: &I,
  cli: &Cli,
  args: &DownloadArgs,
) -> Result<()> {
  let config = load_config(cli)?;
  let records = jsonl::read_records(&args.input)?;
  interaction.reply(ResponseContent::Info(&format!(
    "Loaded {} records from {}",
    records.len(),
    args.input.display()
  )))?;

  let pdf_dir = args.artifacts.pdf_dir.clone().unwrap_or_else(|| default_pdf_dir(&args.input));
  download_artifacts(interaction, &config, &args.artifacts, &records, &pdf_dir).await
}

//! Module for writing a starting configuration.

use harvester::config::DEFAULT_CONFIG_TOML;

use super::*;

/// Arguments of [`Commands::Init`]
#[derive(Args, Clone, Debug)]
pub struct InitArgs {
  /// Overwrite an existing configuration without asking
  #[arg(long)]
  pub force: bool,
}

/// Function for the [`Commands::Init`] in the CLI.
pub async fn init<I: UserInteraction>(interaction: &I, path: &Path, args: &InitArgs) -> Result<()> {
  if path.exists()
    && !args.force
    && !interaction.confirm(&format!(
      "A configuration already exists at {}. Overwrite it?",
      path.display()
    ))?
  {
    interaction.reply(ResponseContent::Info(
      "Keeping the existing configuration. Use --force to overwrite it",
    ))?;
    return Ok(());
  }

  if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
    std::fs::create_dir_all(parent)?;
  }
  std::fs::write(path, DEFAULT_CONFIG_TOML)?;
  interaction
    .reply(ResponseContent::Success(&format!("Wrote default configuration to {}", path.display())))?;
  Ok(())
}

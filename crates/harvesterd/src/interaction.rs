//! Styled terminal output and prompts.

use dialoguer::Confirm;

use super::*;

pub static INFO_PREFIX: &str = "ℹ ";
pub static WORKING_PREFIX: &str = "» ";
pub static SUCCESS_PREFIX: &str = "✓ ";
pub static ERROR_PREFIX: &str = "✗ ";
pub static WARNING_PREFIX: &str = "! ";
pub static PROMPT_PREFIX: &str = "❯ ";
pub static ITEM_PREFIX: &str = "├─";
pub static LAST_ITEM_PREFIX: &str = "└─";

/// Everything a command can report.
#[derive(Debug)]
pub enum ResponseContent<'a> {
  Success(&'a str),
  Info(&'a str),
  Working(&'a str),
  Warning(&'a str),
  Error(&'a HarvesterdError),
  FetchSummary(&'a FetchSummary),
  DownloadSummary(&'a DownloadReport, Option<&'a FanoutReport>),
}

pub trait UserInteraction {
  fn confirm(&self, message: &str) -> Result<bool>;
  fn reply(&self, content: ResponseContent) -> Result<()>;
}

/// Interaction on the controlling terminal.
pub struct Terminal {
  /// Answer every prompt with its default instead of asking
  accept_defaults: bool,
}

impl Terminal {
  pub fn new(accept_defaults: bool) -> Self { Self { accept_defaults } }
}

/// Prints a tree of `label: value` rows.
fn print_rows(rows: &[(&str, String)]) {
  for (index, (label, value)) in rows.iter().enumerate() {
    let prefix = if index + 1 == rows.len() { LAST_ITEM_PREFIX } else { ITEM_PREFIX };
    println!("   {} {}: {}", style(prefix).dim(), style(label).bold(), value);
  }
}

impl UserInteraction for Terminal {
  fn confirm(&self, message: &str) -> Result<bool> {
    if self.accept_defaults {
      trace!("Declining {message:?} because defaults are accepted");
      return Ok(false);
    }
    Ok(
      Confirm::new()
        .with_prompt(format!("{}{message}", style(PROMPT_PREFIX).cyan()))
        .default(false)
        .interact()?,
    )
  }

  fn reply(&self, content: ResponseContent) -> Result<()> {
    match content {
      ResponseContent::Success(message) => {
        println!("{} {}", style(SUCCESS_PREFIX).green(), style(message).green())
      },
      ResponseContent::Info(message) => println!("{} {message}", style(INFO_PREFIX).blue()),
      ResponseContent::Working(message) => println!("{} {message}", style(WORKING_PREFIX).cyan()),
      ResponseContent::Warning(message) => {
        println!("{} {}", style(WARNING_PREFIX).yellow(), style(message).yellow())
      },
      ResponseContent::Error(error) => {
        eprintln!("{} {}", style(ERROR_PREFIX).red(), style(error.to_string()).red())
      },
      ResponseContent::FetchSummary(summary) => {
        let totals = &summary.totals;
        println!("{} Fetch summary", style(SUCCESS_PREFIX).green());
        print_rows(&[
          ("pages", summary.pages.to_string()),
          (
            "reported size",
            summary.complete_list_size.map_or_else(|| "unknown".to_string(), |s| s.to_string()),
          ),
          ("processed", totals.processed.to_string()),
          ("skipped", totals.skipped.to_string()),
          ("outside window", totals.out_of_window.to_string()),
          ("filtered by category", totals.category_rejected.to_string()),
          ("duplicates", totals.duplicates.to_string()),
          ("fetched", style(totals.accepted).green().to_string()),
          ("elapsed", format!("{:.2?}", summary.elapsed)),
        ]);
      },
      ResponseContent::DownloadSummary(report, fanout) => {
        println!("{} Download summary", style(SUCCESS_PREFIX).green());
        let failed = if report.failed > 0 {
          style(report.failed).red().to_string()
        } else {
          report.failed.to_string()
        };
        let mut rows = vec![
          ("downloaded", style(report.downloaded).green().to_string()),
          ("cached", report.cached.to_string()),
          ("failed", failed),
        ];
        if let Some(fanout) = fanout {
          rows.push(("category copies", fanout.copied.to_string()));
          rows.push(("missing for fan-out", fanout.missing.to_string()));
          rows.push(("failed copies", fanout.failed.to_string()));
        }
        print_rows(&rows);
      },
    }
    Ok(())
  }
}

//! Newline-delimited JSON persistence of a fetch session.
//!
//! A session is written once, after it completes: one [`Record`] per line. The file is written
//! to a `.part` sibling and renamed into place, so a reader never sees half a session.

use std::io::{BufRead, BufReader, BufWriter, Write};

use super::*;

/// Default file name for a session, e.g. `arxiv_cs_2024-08-01_to_2024-08-02.jsonl`.
pub fn session_file_name(subject: &str, from: NaiveDate, to: NaiveDate) -> String {
  format!("arxiv_{}_{from}_to_{to}.jsonl", subject.replace(['/', '\\', ':'], "_"))
}

/// Writes `records` to `path`, one JSON object per line.
pub fn write_records(path: impl AsRef<Path>, records: &[Record]) -> Result<()> {
  let path = path.as_ref();
  info!("Saving {} records to {}", records.len(), path.display());
  if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
    std::fs::create_dir_all(parent)?;
  }

  let mut part = path.as_os_str().to_os_string();
  part.push(".part");
  let part = PathBuf::from(part);

  let written = (|| -> Result<()> {
    let mut writer = BufWriter::new(std::fs::File::create(&part)?);
    for record in records {
      serde_json::to_writer(&mut writer, record)?;
      writer.write_all(b"\n")?;
    }
    writer.into_inner().map_err(|e| e.into_error())?.sync_all()?;
    std::fs::rename(&part, path)?;
    Ok(())
  })();

  if written.is_err() {
    std::fs::remove_file(&part).ok();
  }
  written
}

/// Reads the records of a session file. Blank lines are ignored.
///
/// # Errors
///
/// Fails on the first line that is not a valid record, naming its line number.
pub fn read_records(path: impl AsRef<Path>) -> Result<Vec<Record>> {
  let path = path.as_ref();
  let reader = BufReader::new(std::fs::File::open(path)?);
  let mut records = Vec::new();
  for (index, line) in reader.lines().enumerate() {
    let line = line?;
    if line.trim().is_empty() {
      continue;
    }
    let record = serde_json::from_str(&line).map_err(|source| HarvestError::InvalidRecordLine {
      path: path.to_path_buf(),
      line: index + 1,
      source,
    })?;
    records.push(record);
  }
  debug!("Read {} records from {}", records.len(), path.display());
  Ok(records)
}

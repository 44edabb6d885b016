//! The harvested record type.
//!
//! A [`Record`] is one accepted metadata entry. Its serialized form is the line format of the
//! session JSONL file:
//!
//! ```json
//! {"arxiv_id":"2408.00001","title":"...","authors":["Jane Doe"],"abstract":"...",
//!  "categories":["cs.CV","cs.AI"],"primary_category":"cs.CV","created":"2024-08-01","doi":null}
//! ```

use super::*;

/// One fetched metadata entry.
///
/// # Examples
///
/// ```
/// use chrono::NaiveDate;
/// use harvester::record::Record;
///
/// let record = Record::new(
///   "2408.00001",
///   "A Title",
///   "An abstract.",
///   NaiveDate::from_ymd_opt(2024, 8, 1).unwrap(),
/// )
/// .with_authors(["Jane Doe", "John Roe"])
/// .with_categories("cs.CV cs.AI cs.CV");
///
/// assert_eq!(record.categories, vec!["cs.CV", "cs.AI"]);
/// assert_eq!(record.primary_category.as_deref(), Some("cs.CV"));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "RecordLine")]
pub struct Record {
  /// Stable identifier at the source (an arXiv id such as `2408.00001` or `math/0601001`)
  #[serde(rename = "arxiv_id")]
  pub id:               String,
  /// Title with line wraps collapsed
  pub title:            String,
  /// Authors in order of appearance
  pub authors:          Vec<String>,
  /// Abstract text
  #[serde(rename = "abstract")]
  pub abstract_text:    String,
  /// Categories in source order with duplicates removed
  pub categories:       Vec<String>,
  /// The first category, when there is one
  pub primary_category: Option<String>,
  /// Creation date, the key of the date-window filter
  #[serde(rename = "created")]
  pub created_date:     NaiveDate,
  /// Optional DOI reference
  pub doi:              Option<String>,
}

/// The line format accepted when reading a session.
///
/// Older session files store `categories` as one space-separated string and carry no
/// `primary_category`; both shapes are read into the same [`Record`].
#[derive(Deserialize)]
struct RecordLine {
  /// Identifier, `arxiv_id` or `id`
  #[serde(rename = "arxiv_id", alias = "id")]
  id:               String,
  /// Title as written
  title:            String,
  /// Author names
  #[serde(default)]
  authors:          Vec<String>,
  /// Abstract as written
  #[serde(rename = "abstract")]
  abstract_text:    String,
  /// Categories as a list or a space-separated string
  #[serde(default)]
  categories:       CategoriesField,
  /// Primary category, derived from the categories when absent
  #[serde(default)]
  primary_category: Option<String>,
  /// Creation date
  #[serde(rename = "created")]
  created_date:     NaiveDate,
  /// DOI
  #[serde(default)]
  doi:              Option<String>,
}

/// Either shape of the `categories` field.
#[derive(Deserialize)]
#[serde(untagged)]
enum CategoriesField {
  /// `["cs.CV", "cs.AI"]`
  List(Vec<String>),
  /// `"cs.CV cs.AI"`
  Joined(String),
}

impl Default for CategoriesField {
  fn default() -> Self { Self::List(Vec::new()) }
}

impl From<RecordLine> for Record {
  fn from(line: RecordLine) -> Self {
    let categories = match line.categories {
      CategoriesField::List(list) => unique_categories(list.iter().flat_map(|c| c.split_whitespace())),
      CategoriesField::Joined(field) => unique_categories(field.split_whitespace()),
    };
    let primary_category = line
      .primary_category
      .filter(|p| !p.trim().is_empty())
      .or_else(|| categories.first().cloned());
    Self {
      id: line.id,
      title: line.title,
      authors: line.authors,
      abstract_text: line.abstract_text,
      categories,
      primary_category,
      created_date: line.created_date,
      doi: line.doi,
    }
  }
}

/// Category tokens in first-seen order without duplicates.
fn unique_categories<'a>(tokens: impl Iterator<Item = &'a str>) -> Vec<String> {
  let mut seen = HashSet::new();
  tokens.filter(|c| seen.insert(*c)).map(str::to_string).collect()
}

impl Record {
  /// Creates a record with the required fields and no authors, categories or DOI.
  pub fn new(
    id: impl Into<String>,
    title: impl AsRef<str>,
    abstract_text: impl AsRef<str>,
    created_date: NaiveDate,
  ) -> Self {
    Self {
      id: id.into(),
      title: collapse_whitespace(title.as_ref()),
      authors: Vec::new(),
      abstract_text: abstract_text.as_ref().trim().to_string(),
      categories: Vec::new(),
      primary_category: None,
      created_date,
      doi: None,
    }
  }

  /// Sets the author list, preserving order.
  pub fn with_authors<I, S>(mut self, authors: I) -> Self
  where
    I: IntoIterator<Item = S>,
    S: Into<String>, {
    self.authors = authors.into_iter().map(Into::into).collect();
    self
  }

  /// Sets the categories from a space-separated field such as `"cs.CV cs.AI"`.
  ///
  /// Tokens are de-duplicated keeping their first position, and the first token becomes the
  /// primary category.
  pub fn with_categories(mut self, field: &str) -> Self {
    self.categories = unique_categories(field.split_whitespace());
    self.primary_category = self.categories.first().cloned();
    self
  }

  /// Sets the DOI; blank values are treated as absent.
  pub fn with_doi(mut self, doi: Option<impl AsRef<str>>) -> Self {
    self.doi = doi.map(|d| d.as_ref().trim().to_string()).filter(|d| !d.is_empty());
    self
  }

  /// Whether the record was created inside the inclusive window `[from, to]`.
  pub fn created_within(&self, from: NaiveDate, to: NaiveDate) -> bool {
    from <= self.created_date && self.created_date <= to
  }

  /// Whether any of the record's categories is in `filter`.
  pub fn matches_any(&self, filter: &BTreeSet<String>) -> bool {
    self.categories.iter().any(|c| filter.contains(c))
  }

  /// File name stem used for the record's artifacts.
  ///
  /// Old-style arXiv identifiers contain a `/` (`math/0601001`), which is replaced so the
  /// artifact lands directly in its folder.
  pub fn file_stem(&self) -> String { self.id.replace(['/', '\\'], "_") }
}

/// Collapses runs of whitespace (including line wraps) into single spaces.
pub(crate) fn collapse_whitespace(text: &str) -> String {
  text.split_whitespace().collect::<Vec<_>>().join(" ")
}

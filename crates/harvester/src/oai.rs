//! OAI-PMH `ListRecords` requests and response pages.
//!
//! Pages are deserialized with quick-xml's serde support into a loose internal representation
//! in which every metadata field is optional. Each record container is then validated on its
//! own: a container missing a required field becomes a [`ParseSkip`] instead of failing the
//! page, and only a document that is not OAI-PMH XML at all is an error.
//!
//! The metadata format understood is arXiv's (`metadataPrefix=arXiv`):
//!
//! ```xml
//! <OAI-PMH xmlns="http://www.openarchives.org/OAI/2.0/">
//!   <ListRecords>
//!     <record>
//!       <header><identifier>oai:arXiv.org:2408.00001</identifier></header>
//!       <metadata>
//!         <arXiv xmlns="http://arxiv.org/OAI/arXiv/">
//!           <id>2408.00001</id>
//!           <created>2024-08-01</created>
//!           <authors><author><keyname>Doe</keyname><forenames>Jane</forenames></author></authors>
//!           <title>A Title</title>
//!           <categories>cs.CV cs.AI</categories>
//!           <abstract>An abstract.</abstract>
//!         </arXiv>
//!       </metadata>
//!     </record>
//!     <resumptionToken cursor="0" completeListSize="2500">6960524|1001</resumptionToken>
//!   </ListRecords>
//! </OAI-PMH>
//! ```

use quick_xml::de::from_str;

use super::*;

/// OAI-PMH error code meaning the query matched nothing; treated as an empty final page.
pub const NO_RECORDS_MATCH: &str = "noRecordsMatch";

/// Date format of OAI-PMH `from`/`until` arguments and arXiv `created` elements.
pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// One `ListRecords` request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PageRequest {
  /// The first request of a session, carrying the full query.
  Initial {
    /// Metadata format to disseminate
    metadata_prefix: String,
    /// Lower bound of the server-side datestamp window
    from:            NaiveDate,
    /// Upper bound of the server-side datestamp window
    until:           NaiveDate,
    /// Optional OAI set such as `cs` or `physics:hep-th`
    set:             Option<String>,
  },
  /// A continuation request. The token encodes the original query.
  Resume {
    /// The opaque resumption token
    token:           String,
    /// Metadata prefix re-sent for endpoints that expect it next to the token
    metadata_prefix: Option<String>,
  },
}

impl PageRequest {
  /// Query parameters for this request.
  pub fn query(&self) -> Vec<(&'static str, String)> {
    let mut query = vec![("verb", "ListRecords".to_string())];
    match self {
      Self::Initial { metadata_prefix, from, until, set } => {
        query.push(("metadataPrefix", metadata_prefix.clone()));
        query.push(("from", from.format(DATE_FORMAT).to_string()));
        query.push(("until", until.format(DATE_FORMAT).to_string()));
        if let Some(set) = set {
          query.push(("set", set.clone()));
        }
      },
      Self::Resume { token, metadata_prefix } => {
        if let Some(prefix) = metadata_prefix {
          query.push(("metadataPrefix", prefix.clone()));
        }
        query.push(("resumptionToken", token.clone()));
      },
    }
    query
  }
}

/// A parsed `ListRecords` page.
#[derive(Debug, Default)]
pub struct Page {
  /// Every record container on the page, in document order
  pub containers:         Vec<std::result::Result<Record, ParseSkip>>,
  /// Continuation token; `None` when absent or empty
  pub resumption_token:   Option<String>,
  /// Total size of the result set, when the endpoint reports it
  pub complete_list_size: Option<u64>,
}

/// Why a record container was skipped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseSkip {
  /// The header is marked `status="deleted"`.
  Deleted {
    /// OAI identifier from the header, if any
    identifier: Option<String>,
  },
  /// The container has no arXiv metadata block.
  NoMetadata {
    /// OAI identifier from the header, if any
    identifier: Option<String>,
  },
  /// A required field is absent or blank.
  MissingField {
    /// Record identifier, if known
    identifier: Option<String>,
    /// Name of the missing element
    field:      &'static str,
  },
  /// The `created` element is not a `YYYY-MM-DD` date.
  BadDate {
    /// Record identifier
    identifier: String,
    /// The raw element text
    value:      String,
  },
}

impl Display for ParseSkip {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    let name = |identifier: &Option<String>| identifier.clone().unwrap_or_else(|| "<unknown>".into());
    match self {
      Self::Deleted { identifier } => write!(f, "{} is deleted", name(identifier)),
      Self::NoMetadata { identifier } => write!(f, "{} has no metadata", name(identifier)),
      Self::MissingField { identifier, field } =>
        write!(f, "{} is missing <{field}>", name(identifier)),
      Self::BadDate { identifier, value } =>
        write!(f, "{identifier} has an unparseable created date {value:?}"),
    }
  }
}

/// Parses one response body.
///
/// # Errors
///
/// - [`HarvestError::MalformedPage`] if the body is not OAI-PMH XML
/// - [`HarvestError::Oai`] for any OAI-PMH error other than `noRecordsMatch`
pub fn parse_page(data: &[u8]) -> Result<Page> {
  let xml = std::str::from_utf8(data).map_err(|e| HarvestError::MalformedPage(e.to_string()))?;
  let response: OaiResponse = from_str(xml).map_err(|e| HarvestError::MalformedPage(e.to_string()))?;

  if let Some(error) = response.errors.into_iter().next() {
    if error.code == NO_RECORDS_MATCH {
      debug!("Endpoint reported {NO_RECORDS_MATCH}: {}", error.message.trim());
      return Ok(Page::default());
    }
    return Err(HarvestError::Oai { code: error.code, message: error.message.trim().to_string() });
  }

  let Some(list) = response.list_records else {
    return Err(HarvestError::MalformedPage("response has neither ListRecords nor error".into()));
  };

  let (resumption_token, complete_list_size) = match list.resumption_token {
    Some(token) => {
      let value = token.value.trim();
      ((!value.is_empty()).then(|| value.to_string()), token.complete_list_size)
    },
    None => (None, None),
  };

  Ok(Page {
    containers: list.records.into_iter().map(RawRecord::into_record).collect(),
    resumption_token,
    complete_list_size,
  })
}

/// Root `OAI-PMH` element.
#[derive(Debug, Deserialize)]
struct OaiResponse {
  /// Protocol errors
  #[serde(rename = "error", default)]
  errors:       Vec<OaiErrorElement>,
  /// Payload of a successful `ListRecords` request
  #[serde(rename = "ListRecords")]
  list_records: Option<ListRecords>,
}

/// An OAI-PMH `<error code="...">message</error>` element.
#[derive(Debug, Deserialize)]
struct OaiErrorElement {
  /// The error code attribute
  #[serde(rename = "@code")]
  code:    String,
  /// The message text
  #[serde(rename = "$text", default)]
  message: String,
}

/// The `ListRecords` element.
#[derive(Debug, Deserialize)]
struct ListRecords {
  /// Record containers
  #[serde(rename = "record", default)]
  records:          Vec<RawRecord>,
  /// Continuation element
  #[serde(rename = "resumptionToken")]
  resumption_token: Option<RawToken>,
}

/// The `resumptionToken` element; empty on the final page.
#[derive(Debug, Deserialize)]
struct RawToken {
  /// Total size of the result set
  #[serde(rename = "@completeListSize")]
  complete_list_size: Option<u64>,
  /// The token itself
  #[serde(rename = "$text", default)]
  value:              String,
}

/// A `record` container.
#[derive(Debug, Deserialize)]
struct RawRecord {
  /// Record header
  header:   Option<RawHeader>,
  /// Metadata wrapper
  metadata: Option<RawMetadata>,
}

/// A record `header`.
#[derive(Debug, Deserialize)]
struct RawHeader {
  /// `deleted` for withdrawn records
  #[serde(rename = "@status")]
  status:     Option<String>,
  /// OAI identifier such as `oai:arXiv.org:2408.00001`
  identifier: Option<String>,
}

/// The `metadata` wrapper.
#[derive(Debug, Deserialize)]
struct RawMetadata {
  /// The arXiv metadata block
  #[serde(rename = "arXiv")]
  arxiv: Option<RawArxiv>,
}

/// The arXiv metadata block with every field optional.
#[derive(Debug, Deserialize)]
struct RawArxiv {
  /// arXiv identifier
  id:            Option<String>,
  /// Creation date
  created:       Option<String>,
  /// Author list
  authors:       Option<RawAuthors>,
  /// Title
  title:         Option<String>,
  /// Space separated categories
  categories:    Option<String>,
  /// DOI
  doi:           Option<String>,
  /// Abstract
  #[serde(rename = "abstract")]
  abstract_text: Option<String>,
}

/// The `authors` element.
#[derive(Debug, Deserialize)]
struct RawAuthors {
  /// Authors in order of appearance
  #[serde(rename = "author", default)]
  authors: Vec<RawAuthor>,
}

/// One `author`.
#[derive(Debug, Deserialize)]
struct RawAuthor {
  /// Family name
  keyname:   Option<String>,
  /// Given names
  forenames: Option<String>,
  /// Suffix such as `Jr`
  suffix:    Option<String>,
  /// Full name, used by formats that do not split names
  name:      Option<String>,
}

impl RawAuthor {
  /// `forenames keyname suffix`, or `name`, skipping missing parts.
  fn display_name(self) -> Option<String> {
    let joined = [self.forenames, self.keyname, self.suffix]
      .into_iter()
      .flatten()
      .map(|part| record::collapse_whitespace(&part))
      .filter(|part| !part.is_empty())
      .collect::<Vec<_>>()
      .join(" ");
    if joined.is_empty() {
      self.name.map(|n| record::collapse_whitespace(&n)).filter(|n| !n.is_empty())
    } else {
      Some(joined)
    }
  }
}

/// Returns the trimmed text when present and not blank.
fn non_blank(value: Option<String>) -> Option<String> {
  value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

impl RawRecord {
  /// Validates one container into a [`Record`].
  fn into_record(self) -> std::result::Result<Record, ParseSkip> {
    let header_id = self.header.as_ref().and_then(|h| h.identifier.clone());
    if self.header.as_ref().and_then(|h| h.status.as_deref()) == Some("deleted") {
      return Err(ParseSkip::Deleted { identifier: header_id });
    }
    let Some(meta) = self.metadata.and_then(|m| m.arxiv) else {
      return Err(ParseSkip::NoMetadata { identifier: header_id });
    };

    let missing = |identifier: Option<String>, field| ParseSkip::MissingField { identifier, field };
    let id = non_blank(meta.id).ok_or_else(|| missing(header_id, "id"))?;
    let title = non_blank(meta.title).ok_or_else(|| missing(Some(id.clone()), "title"))?;
    let abstract_text =
      non_blank(meta.abstract_text).ok_or_else(|| missing(Some(id.clone()), "abstract"))?;
    let created = non_blank(meta.created).ok_or_else(|| missing(Some(id.clone()), "created"))?;
    let created_date = NaiveDate::parse_from_str(&created, DATE_FORMAT)
      .map_err(|_| ParseSkip::BadDate { identifier: id.clone(), value: created })?;

    let authors = meta
      .authors
      .map(|a| a.authors.into_iter().filter_map(RawAuthor::display_name).collect::<Vec<_>>())
      .unwrap_or_default();

    Ok(
      Record::new(id, title, abstract_text, created_date)
        .with_authors(authors)
        .with_categories(meta.categories.as_deref().unwrap_or_default())
        .with_doi(meta.doi),
    )
  }
}

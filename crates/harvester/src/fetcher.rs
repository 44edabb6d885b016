//! The paginated metadata fetcher.
//!
//! A fetch is one [`FetchSession`]: the first request carries the full query with a padded
//! `until` date, every following request carries only the resumption token from the previous
//! page, and the session ends on the first page without a token. Each page is reduced by
//! [`process_page`] to the records it contributes plus a [`PageTally`], which the session
//! folds into its running [`FetchSummary`].
//!
//! The upstream date window is day-granular with fuzzy boundaries, so the server-side window
//! is padded by [`FetchConfig::padding_days`] and the exact predicate
//! `date_from <= created_date <= date_to` is applied to every record client-side.
//!
//! # Examples
//!
//! ```no_run
//! use chrono::NaiveDate;
//! use harvester::{
//!   config::FetchConfig,
//!   fetcher::{FetchQuery, Fetcher},
//!   prelude::*,
//! };
//!
//! # async fn example() -> Result<(), HarvestError> {
//! let config = FetchConfig::default();
//! let transport = HttpTransport::new(config.request_timeout())?.shared();
//! let query = FetchQuery::new(
//!   NaiveDate::from_ymd_opt(2024, 8, 2).unwrap(),
//!   NaiveDate::from_ymd_opt(2024, 8, 4).unwrap(),
//! )
//! .with_set("cs");
//!
//! let outcome = Fetcher::new(transport, config)
//!   .fetch_with_progress(&query, |summary| println!("{} pages so far", summary.pages))
//!   .await?;
//! println!("{}", outcome.summary);
//! # Ok(())
//! # }
//! ```

use std::ops::AddAssign;

use chrono::Days;
use tokio::time::{sleep, Instant};

use crate::{
  config::FetchConfig,
  oai::{Page, PageRequest},
};

use super::*;

/// What to fetch: a date window, an optional OAI set and an optional category filter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchQuery {
  /// First creation date to keep (inclusive)
  pub date_from:  NaiveDate,
  /// Last creation date to keep (inclusive)
  pub date_to:    NaiveDate,
  /// OAI set requested from the server, e.g. `cs`
  pub set:        Option<String>,
  /// Keep only records with at least one of these categories
  pub categories: Option<BTreeSet<String>>,
}

impl FetchQuery {
  /// A query for every record created in `[date_from, date_to]`.
  pub fn new(date_from: NaiveDate, date_to: NaiveDate) -> Self {
    Self { date_from, date_to, set: None, categories: None }
  }

  /// Restricts the server-side request to an OAI set.
  pub fn with_set(mut self, set: impl Into<String>) -> Self {
    self.set = Some(set.into());
    self
  }

  /// Keeps only records in at least one of `categories`. An empty list disables the filter.
  pub fn with_categories<I, S>(mut self, categories: I) -> Self
  where
    I: IntoIterator<Item = S>,
    S: Into<String>, {
    let categories: BTreeSet<String> = categories.into_iter().map(Into::into).collect();
    self.categories = (!categories.is_empty()).then_some(categories);
    self
  }

  /// Whether `record` passes the exact date window and the category filter.
  fn admits(&self, record: &Record) -> Admission {
    if !record.created_within(self.date_from, self.date_to) {
      Admission::OutOfWindow
    } else if self.categories.as_ref().is_some_and(|filter| !record.matches_any(filter)) {
      Admission::CategoryRejected
    } else {
      Admission::Accepted
    }
  }
}

/// Result of checking a well-formed record against the query.
enum Admission {
  /// Kept
  Accepted,
  /// Created outside `[date_from, date_to]`
  OutOfWindow,
  /// No category in the filter
  CategoryRejected,
}

/// Counts contributed by one page.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct PageTally {
  /// Record containers seen
  pub processed:         u64,
  /// Containers skipped as malformed, deleted or without metadata
  pub skipped:           u64,
  /// Well-formed records created outside the date window
  pub out_of_window:     u64,
  /// Well-formed records rejected by the category filter
  pub category_rejected: u64,
  /// Records whose id was already accepted earlier in the session
  pub duplicates:        u64,
  /// Records kept
  pub accepted:          u64,
}

impl AddAssign for PageTally {
  fn add_assign(&mut self, rhs: Self) {
    self.processed += rhs.processed;
    self.skipped += rhs.skipped;
    self.out_of_window += rhs.out_of_window;
    self.category_rejected += rhs.category_rejected;
    self.duplicates += rhs.duplicates;
    self.accepted += rhs.accepted;
  }
}

/// Running totals of a fetch session.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct FetchSummary {
  /// Pages requested
  pub pages:              u32,
  /// Size of the full result set as reported on the first page
  pub complete_list_size: Option<u64>,
  /// Sum of every page's tally
  pub totals:             PageTally,
  /// Wall-clock time spent so far
  pub elapsed:            Duration,
}

impl AddAssign<&PageOutcome> for FetchSummary {
  fn add_assign(&mut self, page: &PageOutcome) {
    self.pages += 1;
    if self.pages == 1 {
      self.complete_list_size = page.complete_list_size;
    }
    self.totals += page.tally;
  }
}

impl Display for FetchSummary {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    let t = &self.totals;
    write!(
      f,
      "accepted {} of {} records in {} pages ({} skipped, {} outside the date window, {} \
       filtered by category, {} duplicates) in {:.2?}",
      t.accepted,
      t.processed,
      self.pages,
      t.skipped,
      t.out_of_window,
      t.category_rejected,
      t.duplicates,
      self.elapsed
    )
  }
}

/// What one page contributes to a session.
#[derive(Debug, Default)]
pub struct PageOutcome {
  /// Records kept, in page order
  pub accepted:           Vec<Record>,
  /// Counts for this page
  pub tally:              PageTally,
  /// Token for the next request
  pub resumption_token:   Option<String>,
  /// Result set size, when reported
  pub complete_list_size: Option<u64>,
}

/// Reduces a parsed page to the records it contributes.
///
/// `seen` holds the ids accepted earlier in the session; a repeated id is dropped and counted
/// as a duplicate so ids stay unique within one session's output.
pub fn process_page(page: Page, query: &FetchQuery, seen: &mut HashSet<String>) -> PageOutcome {
  let mut outcome = PageOutcome {
    resumption_token: page.resumption_token,
    complete_list_size: page.complete_list_size,
    ..Default::default()
  };

  for container in page.containers {
    outcome.tally.processed += 1;
    let record = match container {
      Ok(record) => record,
      Err(skip) => {
        warn!("Skipping record: {skip}");
        outcome.tally.skipped += 1;
        continue;
      },
    };
    match query.admits(&record) {
      Admission::OutOfWindow => outcome.tally.out_of_window += 1,
      Admission::CategoryRejected => outcome.tally.category_rejected += 1,
      Admission::Accepted if !seen.insert(record.id.clone()) => {
        debug!("Dropping duplicate record {}", record.id);
        outcome.tally.duplicates += 1;
      },
      Admission::Accepted => {
        outcome.tally.accepted += 1;
        outcome.accepted.push(record);
      },
    }
  }
  outcome
}

/// The records of a completed session.
#[derive(Debug)]
pub struct FetchOutcome {
  /// Accepted records in page-arrival order
  pub records: Vec<Record>,
  /// Totals for the session
  pub summary: FetchSummary,
}

/// State owned by one fetch: the query, the current token and everything accepted so far.
#[derive(Debug)]
pub struct FetchSession<'a> {
  /// The query being answered
  query:   &'a FetchQuery,
  /// The next request to send; `None` once the final page has been consumed
  next:    Option<PageRequest>,
  /// Accepted records
  records: Vec<Record>,
  /// Ids accepted so far
  seen:    HashSet<String>,
  /// Running totals
  summary: FetchSummary,
  /// When the session started
  started: Instant,
}

impl<'a> FetchSession<'a> {
  /// Starts a session whose first request is `initial`.
  fn new(query: &'a FetchQuery, initial: PageRequest) -> Self {
    Self {
      query,
      next: Some(initial),
      records: Vec::new(),
      seen: HashSet::new(),
      summary: FetchSummary::default(),
      started: Instant::now(),
    }
  }

  /// Folds a page into the session and returns the token it carried.
  fn absorb(&mut self, page: Page) -> Option<String> {
    let outcome = process_page(page, self.query, &mut self.seen);
    self.summary += &outcome;
    self.summary.elapsed = self.started.elapsed();
    self.records.extend(outcome.accepted);
    outcome.resumption_token
  }

  /// Ends the session.
  fn finish(mut self) -> FetchOutcome {
    self.summary.elapsed = self.started.elapsed();
    FetchOutcome { records: self.records, summary: self.summary }
  }
}

/// Sequential fetcher over a [`Transport`].
pub struct Fetcher {
  /// Network access
  transport: Arc<dyn Transport>,
  /// Fetch settings
  config:    FetchConfig,
}

impl Fetcher {
  /// Creates a fetcher.
  pub fn new(transport: Arc<dyn Transport>, config: FetchConfig) -> Self {
    Self { transport, config }
  }

  /// The first request of a session for `query`.
  ///
  /// # Errors
  ///
  /// [`HarvestError::InvalidDateRange`] when the window is reversed.
  pub fn initial_request(&self, query: &FetchQuery) -> Result<PageRequest> {
    if query.date_from > query.date_to {
      return Err(HarvestError::InvalidDateRange { from: query.date_from, to: query.date_to });
    }
    let until = query
      .date_to
      .checked_add_days(Days::new(u64::from(self.config.padding_days)))
      .ok_or_else(|| HarvestError::Config("Padded end date is out of range".into()))?;
    Ok(PageRequest::Initial {
      metadata_prefix: self.config.metadata_prefix.clone(),
      from: query.date_from,
      until,
      set: query.set.clone(),
    })
  }

  /// Fetches every record matching `query`.
  ///
  /// # Errors
  ///
  /// Any transport failure, non-success status, unparseable page, OAI-PMH error or exhausted
  /// budget aborts the session, and records gathered so far are dropped.
  pub async fn fetch(&self, query: &FetchQuery) -> Result<FetchOutcome> {
    self.fetch_with_progress(query, |_| {}).await
  }

  /// Like [`Fetcher::fetch`], calling `on_page` with the running totals after every page.
  pub async fn fetch_with_progress(
    &self,
    query: &FetchQuery,
    mut on_page: impl FnMut(&FetchSummary),
  ) -> Result<FetchOutcome> {
    let mut session = FetchSession::new(query, self.initial_request(query)?);
    info!(
      "Fetching records from {} to {} (set: {})",
      query.date_from,
      query.date_to,
      query.set.as_deref().unwrap_or("all")
    );

    while let Some(request) = session.next.take() {
      self.check_budget(&session)?;
      let data = self.transport.get_page(&self.config.endpoint, &request.query()).await?;
      let page = oai::parse_page(&data)?;
      let token = session.absorb(page);
      on_page(&session.summary);

      if let Some(token) = token {
        trace!("Next resumption token: {token}");
        session.next = Some(PageRequest::Resume {
          token,
          metadata_prefix: (!self.config.resume_token_only)
            .then(|| self.config.metadata_prefix.clone()),
        });
        sleep(self.config.politeness()).await;
      }
    }

    let outcome = session.finish();
    info!("Fetch complete: {}", outcome.summary);
    Ok(outcome)
  }

  /// Fails when the session may not issue another request.
  fn check_budget(&self, session: &FetchSession) -> Result<()> {
    let budget = &self.config.budget;
    let elapsed = session.started.elapsed();
    if session.summary.pages >= budget.max_pages || elapsed > budget.max_duration() {
      warn!("Fetch budget exhausted after {} pages", session.summary.pages);
      return Err(HarvestError::BudgetExceeded { pages: session.summary.pages, elapsed });
    }
    Ok(())
  }
}

use std::time::Duration;

use harvester::fetcher::{FetchQuery, Fetcher};

use super::*;

fn query() -> FetchQuery { FetchQuery::new(date(2024, 8, 2), date(2024, 8, 3)).with_set("cs") }

fn params(request: &[(String, String)]) -> Vec<(&str, &str)> {
  request.iter().map(|(k, v)| (k.as_str(), v.as_str())).collect()
}

#[traced_test]
#[tokio::test]
async fn test_follows_tokens_until_empty() -> TestResult<()> {
  let transport = Arc::new(MockTransport::with_pages([
    oai_page(&[oai_record("2408.00001", "2024-08-02", "cs.AI")], Some("t1"), Some(3)),
    oai_page(&[oai_record("2408.00002", "2024-08-02", "cs.LG")], Some("t2"), Some(3)),
    oai_page(&[oai_record("2408.00003", "2024-08-03", "cs.CV")], Some(""), Some(3)),
  ]));

  let outcome = Fetcher::new(shared(&transport), fast_fetch_config()).fetch(&query()).await?;

  let requests = transport.page_requests();
  assert_eq!(requests.len(), 3);
  assert_eq!(params(&requests[0]), vec![
    ("verb", "ListRecords"),
    ("metadataPrefix", "arXiv"),
    ("from", "2024-08-02"),
    ("until", "2024-08-04"),
    ("set", "cs"),
  ]);
  assert_eq!(params(&requests[1]), vec![("verb", "ListRecords"), ("resumptionToken", "t1")]);
  assert_eq!(params(&requests[2]), vec![("verb", "ListRecords"), ("resumptionToken", "t2")]);

  let ids: Vec<_> = outcome.records.iter().map(|r| r.id.as_str()).collect();
  assert_eq!(ids, vec!["2408.00001", "2408.00002", "2408.00003"]);
  assert_eq!(outcome.summary.pages, 3);
  assert_eq!(outcome.summary.complete_list_size, Some(3));
  Ok(())
}

#[traced_test]
#[tokio::test]
async fn test_page_without_token_element_ends_session() -> TestResult<()> {
  let transport = Arc::new(MockTransport::with_pages([oai_page(
    &[oai_record("2408.00001", "2024-08-02", "cs.AI")],
    None,
    None,
  )]));
  let outcome = Fetcher::new(shared(&transport), fast_fetch_config()).fetch(&query()).await?;
  assert_eq!(transport.page_requests().len(), 1);
  assert_eq!(outcome.records.len(), 1);
  assert_eq!(outcome.summary.complete_list_size, None);
  Ok(())
}

#[traced_test]
#[tokio::test]
async fn test_padding_records_are_dropped() -> TestResult<()> {
  let transport = Arc::new(MockTransport::with_pages([
    oai_page(
      &[
        oai_record("2408.00001", "2024-08-01", "cs.AI"),
        oai_record("2408.00002", "2024-08-02", "cs.AI"),
      ],
      Some("t1"),
      None,
    ),
    oai_page(
      &[
        oai_record("2408.00003", "2024-08-03", "cs.AI"),
        oai_record("2408.00004", "2024-08-04", "cs.AI"),
      ],
      Some(""),
      None,
    ),
  ]));

  let outcome = Fetcher::new(shared(&transport), fast_fetch_config()).fetch(&query()).await?;

  let ids: Vec<_> = outcome.records.iter().map(|r| r.id.as_str()).collect();
  assert_eq!(ids, vec!["2408.00002", "2408.00003"]);
  assert!(outcome
    .records
    .iter()
    .all(|r| r.created_date >= date(2024, 8, 2) && r.created_date <= date(2024, 8, 3)));
  assert_eq!(outcome.summary.totals.out_of_window, 2);
  assert_eq!(outcome.summary.totals.processed, 4);
  Ok(())
}

#[traced_test]
#[tokio::test]
async fn test_category_filter_keeps_any_match() -> TestResult<()> {
  let transport = Arc::new(MockTransport::with_pages([oai_page(
    &[
      oai_record("2408.00001", "2024-08-02", "cs.CV cs.AI"),
      oai_record("2408.00002", "2024-08-02", "cs.CV"),
      oai_record("2408.00003", "2024-08-03", "cs.LG stat.ML"),
    ],
    Some(""),
    None,
  )]));

  let query = query().with_categories(["cs.AI", "cs.LG"]);
  let outcome = Fetcher::new(shared(&transport), fast_fetch_config()).fetch(&query).await?;

  let ids: Vec<_> = outcome.records.iter().map(|r| r.id.as_str()).collect();
  assert_eq!(ids, vec!["2408.00001", "2408.00003"]);
  assert_eq!(outcome.summary.totals.category_rejected, 1);
  Ok(())
}

#[traced_test]
#[tokio::test]
async fn test_page_budget_stops_endless_tokens() {
  let transport = Arc::new(MockTransport::repeating(oai_page(
    &[oai_record("2408.00001", "2024-08-02", "cs.AI")],
    Some("again"),
    None,
  )));
  let mut config = fast_fetch_config();
  config.budget.max_pages = 3;

  let result = Fetcher::new(shared(&transport), config).fetch(&query()).await;

  assert!(matches!(result, Err(HarvestError::BudgetExceeded { pages: 3, .. })));
  assert_eq!(transport.page_requests().len(), 3);
  assert!(logs_contain("Fetch budget exhausted"));
}

#[traced_test]
#[tokio::test(start_paused = true)]
async fn test_duration_budget_stops_session() {
  let transport = Arc::new(MockTransport::repeating(oai_page(&[], Some("again"), None)));
  let mut config = fast_fetch_config();
  config.politeness_ms = 1_000;
  config.budget.max_pages = 1_000;
  config.budget.max_duration_s = 5;

  let result = Fetcher::new(shared(&transport), config).fetch(&query()).await;

  match result {
    Err(HarvestError::BudgetExceeded { pages, elapsed }) => {
      assert_eq!(pages, 6);
      assert!(elapsed > Duration::from_secs(5));
    },
    other => panic!("expected an exhausted budget, got {other:?}"),
  }
  assert_eq!(transport.page_requests().len(), 6);
}

#[traced_test]
#[tokio::test(start_paused = true)]
async fn test_politeness_spaces_requests() -> TestResult<()> {
  let transport = Arc::new(MockTransport::with_pages([
    oai_page(&[], Some("t1"), None),
    oai_page(&[], Some("t2"), None),
    oai_page(&[], Some(""), None),
  ]));
  let mut config = fast_fetch_config();
  config.politeness_ms = 2_000;

  let started = tokio::time::Instant::now();
  Fetcher::new(shared(&transport), config).fetch(&query()).await?;
  assert_eq!(started.elapsed(), Duration::from_secs(4));
  Ok(())
}

#[traced_test]
#[tokio::test]
async fn test_transport_failure_aborts_session() {
  // The second request finds no page and fails with a 503.
  let transport = Arc::new(MockTransport::with_pages([oai_page(
    &[oai_record("2408.00001", "2024-08-02", "cs.AI")],
    Some("t1"),
    None,
  )]));

  let result = Fetcher::new(shared(&transport), fast_fetch_config()).fetch(&query()).await;

  assert!(matches!(result, Err(HarvestError::HttpStatus { status: 503, .. })));
  assert_eq!(transport.page_requests().len(), 2);
}

#[traced_test]
#[tokio::test]
async fn test_oai_error_aborts_session() {
  let transport = Arc::new(MockTransport::with_pages([r#"<?xml version="1.0" encoding="UTF-8"?>
<OAI-PMH xmlns="http://www.openarchives.org/OAI/2.0/">
  <error code="badResumptionToken">The token is expired</error>
</OAI-PMH>"#
    .to_string()]));

  let result = Fetcher::new(shared(&transport), fast_fetch_config()).fetch(&query()).await;

  match result {
    Err(HarvestError::Oai { code, .. }) => assert_eq!(code, "badResumptionToken"),
    other => panic!("expected an OAI-PMH error, got {other:?}"),
  }
}

#[traced_test]
#[tokio::test]
async fn test_no_records_match_is_empty() -> TestResult<()> {
  let transport = Arc::new(MockTransport::with_pages([r#"<?xml version="1.0" encoding="UTF-8"?>
<OAI-PMH xmlns="http://www.openarchives.org/OAI/2.0/">
  <error code="noRecordsMatch">No records match the request</error>
</OAI-PMH>"#
    .to_string()]));

  let outcome = Fetcher::new(shared(&transport), fast_fetch_config()).fetch(&query()).await?;
  assert!(outcome.records.is_empty());
  assert_eq!(outcome.summary.pages, 1);
  Ok(())
}

#[traced_test]
#[tokio::test]
async fn test_full_resume_requests_repeat_prefix() -> TestResult<()> {
  let transport = Arc::new(MockTransport::with_pages([
    oai_page(&[], Some("t1"), None),
    oai_page(&[], Some(""), None),
  ]));
  let mut config = fast_fetch_config();
  config.resume_token_only = false;

  Fetcher::new(shared(&transport), config).fetch(&query()).await?;

  let requests = transport.page_requests();
  assert_eq!(params(&requests[1]), vec![
    ("verb", "ListRecords"),
    ("metadataPrefix", "arXiv"),
    ("resumptionToken", "t1"),
  ]);
  Ok(())
}

#[traced_test]
#[tokio::test]
async fn test_reversed_range_makes_no_requests() {
  let transport = Arc::new(MockTransport::with_pages(Vec::new()));
  let query = FetchQuery::new(date(2024, 8, 5), date(2024, 8, 1));

  let result = Fetcher::new(shared(&transport), fast_fetch_config()).fetch(&query).await;

  assert!(matches!(result, Err(HarvestError::InvalidDateRange { .. })));
  assert!(transport.page_requests().is_empty());
}

#[traced_test]
#[tokio::test]
async fn test_single_day_window() -> TestResult<()> {
  let transport = Arc::new(MockTransport::with_pages([oai_page(
    &[
      oai_record("2408.00001", "2024-08-02", "cs.AI"),
      oai_record("2408.00002", "2024-08-03", "cs.AI"),
    ],
    Some(""),
    None,
  )]));
  let query = FetchQuery::new(date(2024, 8, 2), date(2024, 8, 2));

  let outcome = Fetcher::new(shared(&transport), fast_fetch_config()).fetch(&query).await?;

  assert_eq!(outcome.records.len(), 1);
  assert_eq!(params(&transport.page_requests()[0])[3], ("until", "2024-08-03"));
  Ok(())
}

#[traced_test]
#[tokio::test]
async fn test_skipped_and_duplicate_records_are_counted() -> TestResult<()> {
  let deleted = r#"
    <record>
      <header status="deleted"><identifier>oai:arXiv.org:2408.00009</identifier></header>
    </record>"#
    .to_string();
  let transport = Arc::new(MockTransport::with_pages([
    oai_page(&[oai_record("2408.00001", "2024-08-02", "cs.AI"), deleted], Some("t1"), Some(2)),
    oai_page(&[oai_record("2408.00001", "2024-08-02", "cs.AI")], Some(""), Some(2)),
  ]));

  let mut pages_seen = Vec::new();
  let outcome = Fetcher::new(shared(&transport), fast_fetch_config())
    .fetch_with_progress(&query(), |summary| pages_seen.push(summary.pages))
    .await?;

  assert_eq!(pages_seen, vec![1, 2]);
  assert_eq!(outcome.records.len(), 1);
  let totals = outcome.summary.totals;
  assert_eq!(totals.processed, 3);
  assert_eq!(totals.skipped, 1);
  assert_eq!(totals.duplicates, 1);
  assert_eq!(totals.accepted, 1);
  Ok(())
}

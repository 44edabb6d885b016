//! The network seam between the harvester and its upstream services.
//!
//! Both components talk to the network only through [`Transport`]: the fetcher asks for whole
//! metadata pages, the downloader for a stream of artifact chunks. [`HttpTransport`] is the
//! reqwest implementation; tests plug in an in-memory one.
//!
//! # Examples
//!
//! ```no_run
//! use std::time::Duration;
//!
//! use harvester::prelude::*;
//!
//! # async fn example() -> Result<(), HarvestError> {
//! let transport = HttpTransport::new(Duration::from_secs(60))?;
//! let page = transport
//!   .get_page("http://export.arxiv.org/oai2", &[("verb", "Identify".to_string())])
//!   .await?;
//! println!("{}", String::from_utf8_lossy(&page));
//! # Ok(())
//! # }
//! ```

use super::*;

/// A stream of artifact chunks; an `Err` item means the transfer broke off.
pub type ChunkStream = BoxStream<'static, Result<Vec<u8>>>;

/// Access to the upstream metadata endpoint and artifact host.
#[async_trait]
pub trait Transport: Send + Sync {
  /// Performs a GET on `url` with the given query and returns the full body.
  ///
  /// Non-success statuses are errors.
  async fn get_page(&self, url: &str, query: &[(&str, String)]) -> Result<Vec<u8>>;

  /// Starts a GET on `url` and returns the body as a stream of chunks.
  ///
  /// Non-success statuses are errors raised before the stream is returned.
  async fn open_stream(&self, url: &str) -> Result<ChunkStream>;
}

/// [`Transport`] over a shared reqwest client with a per-request timeout.
#[derive(Debug, Clone)]
pub struct HttpTransport {
  /// Internal web client reused for every request.
  client: reqwest::Client,
}

impl HttpTransport {
  /// Builds a client whose requests time out after `timeout`.
  pub fn new(timeout: Duration) -> Result<Self> {
    let client = reqwest::Client::builder()
      .timeout(timeout)
      .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
      .build()?;
    Ok(Self { client })
  }

  /// Wraps the transport for sharing between the fetcher and the downloader.
  pub fn shared(self) -> Arc<dyn Transport> { Arc::new(self) }

  /// Turns a non-success response into [`HarvestError::HttpStatus`].
  fn check_status(response: reqwest::Response) -> Result<reqwest::Response> {
    let status = response.status();
    if status.is_success() {
      Ok(response)
    } else {
      trace!("Unsuccessful response: {response:?}");
      Err(HarvestError::HttpStatus { url: response.url().to_string(), status: status.as_u16() })
    }
  }
}

#[async_trait]
impl Transport for HttpTransport {
  async fn get_page(&self, url: &str, query: &[(&str, String)]) -> Result<Vec<u8>> {
    debug!("GET {url} {query:?}");
    let response = Self::check_status(self.client.get(url).query(query).send().await?)?;
    let data = response.bytes().await?;
    trace!("Page response: {}", String::from_utf8_lossy(&data));
    Ok(data.to_vec())
  }

  async fn open_stream(&self, url: &str) -> Result<ChunkStream> {
    debug!("GET (streaming) {url}");
    let response = Self::check_status(self.client.get(url).send().await?)?;
    Ok(
      response
        .bytes_stream()
        .map(|chunk| chunk.map(|bytes| bytes.to_vec()).map_err(HarvestError::from))
        .boxed(),
    )
  }
}

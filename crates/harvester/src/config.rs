//! TOML configuration for fetch sessions and artifact downloads.
//!
//! Every field has a default, so an empty file (or no file at all) yields a working arXiv
//! configuration. A complete file looks like:
//!
//! ```toml
//! [fetch]
//! endpoint          = "http://export.arxiv.org/oai2"
//! metadata_prefix   = "arXiv"
//! padding_days      = 1
//! resume_token_only = true
//! politeness_ms     = 2000
//! request_timeout_s = 60
//!
//! [fetch.budget]
//! max_pages      = 10000
//! max_duration_s = 21600
//!
//! [download]
//! url_template    = "https://arxiv.org/pdf/{id}.pdf"
//! extension       = "pdf"
//! cache_mode      = "skip_if_exists"
//! atomic_write    = true
//! category_fanout = false
//! layout          = "flat"
//! politeness_ms   = 1000
//! concurrency     = 1
//! ```

use url::Url;

use super::*;

/// Name of the configuration file inside [`HarvestConfig::default_dir`].
pub const CONFIG_FILE: &str = "config.toml";

/// The annotated default configuration shipped with the crate.
pub const DEFAULT_CONFIG_TOML: &str =
  include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/config/harvester.toml"));

/// The complete harvester configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HarvestConfig {
  /// How metadata pages are requested
  pub fetch:    FetchConfig,
  /// How artifacts are downloaded and cached
  pub download: DownloadConfig,
}

/// Configuration of the paginated metadata fetcher.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FetchConfig {
  /// OAI-PMH endpoint URL
  pub endpoint:          String,
  /// `metadataPrefix` sent with the first request
  pub metadata_prefix:   String,
  /// Days added past the end date in the server-side `until` parameter
  pub padding_days:      u32,
  /// Send nothing but the verb and token on continuation requests
  pub resume_token_only: bool,
  /// Delay between receiving a page and requesting the next, in milliseconds
  pub politeness_ms:     u64,
  /// Per-request timeout in seconds
  pub request_timeout_s: u64,
  /// Hard limits on one session
  pub budget:            FetchBudget,
}

/// Limits on a single fetch session.
///
/// The endpoint's resumption token is the only natural stop condition, so these bound a
/// misbehaving endpoint that never hands out an empty token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FetchBudget {
  /// Maximum number of page requests
  pub max_pages:      u32,
  /// Maximum wall-clock time for the session in seconds
  pub max_duration_s: u64,
}

/// What to do when an artifact is already present.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CacheMode {
  /// Presence is a cache hit; nothing is downloaded
  #[default]
  SkipIfExists,
  /// Always download and atomically replace the existing file
  Refresh,
}

/// Where the canonical copy of an artifact lives under the destination folder.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ArtifactLayout {
  /// `{destination}/{id}.{ext}`
  #[default]
  Flat,
  /// `{destination}/{primary_category}/{id}.{ext}`
  PrimaryCategory,
}

/// Configuration of the artifact downloader.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DownloadConfig {
  /// Artifact URL with an `{id}` placeholder
  pub url_template:    String,
  /// File extension of cached artifacts
  pub extension:       String,
  /// Behavior when the artifact already exists
  pub cache_mode:      CacheMode,
  /// Stream into a `.part` file and rename on completion (always done when refreshing)
  pub atomic_write:    bool,
  /// Copy artifacts into one folder per category after downloading
  pub category_fanout: bool,
  /// Location of the canonical copy
  pub layout:          ArtifactLayout,
  /// Pause after each download before the next one starts, in milliseconds, across all workers
  pub politeness_ms:   u64,
  /// Number of downloads in flight
  pub concurrency:     usize,
}

impl Default for FetchConfig {
  fn default() -> Self {
    Self {
      endpoint:          "http://export.arxiv.org/oai2".to_string(),
      metadata_prefix:   "arXiv".to_string(),
      padding_days:      1,
      resume_token_only: true,
      politeness_ms:     2_000,
      request_timeout_s: 60,
      budget:            FetchBudget::default(),
    }
  }
}

impl Default for FetchBudget {
  fn default() -> Self { Self { max_pages: 10_000, max_duration_s: 6 * 60 * 60 } }
}

impl Default for DownloadConfig {
  fn default() -> Self {
    Self {
      url_template:    "https://arxiv.org/pdf/{id}.pdf".to_string(),
      extension:       "pdf".to_string(),
      cache_mode:      CacheMode::SkipIfExists,
      atomic_write:    true,
      category_fanout: false,
      layout:          ArtifactLayout::Flat,
      politeness_ms:   1_000,
      concurrency:     1,
    }
  }
}

impl FetchConfig {
  /// Delay between consecutive page requests.
  pub fn politeness(&self) -> Duration { Duration::from_millis(self.politeness_ms) }

  /// Timeout applied to every request.
  pub fn request_timeout(&self) -> Duration { Duration::from_secs(self.request_timeout_s) }
}

impl FetchBudget {
  /// Creates a budget from a page count and a duration.
  pub fn new(max_pages: u32, max_duration: Duration) -> Self {
    Self { max_pages, max_duration_s: max_duration.as_secs() }
  }

  /// Maximum wall-clock time for one session.
  pub fn max_duration(&self) -> Duration { Duration::from_secs(self.max_duration_s) }
}

impl DownloadConfig {
  /// Pause after each download before the next one starts.
  pub fn politeness(&self) -> Duration { Duration::from_millis(self.politeness_ms) }

  /// Builds the artifact URL for `id`.
  pub fn artifact_url(&self, id: &str) -> String { self.url_template.replace("{id}", id) }
}

impl HarvestConfig {
  /// Default directory holding the configuration file.
  ///
  /// - On Unix: `~/.config/harvester`
  /// - On macOS: `~/Library/Application Support/harvester`
  /// - On Windows: `%APPDATA%\harvester`
  /// - Fallback: `./harvester`
  pub fn default_dir() -> PathBuf {
    dirs::config_dir().unwrap_or_else(|| PathBuf::from(".")).join("harvester")
  }

  /// Default path of the configuration file.
  pub fn default_path() -> PathBuf { Self::default_dir().join(CONFIG_FILE) }

  /// Parses and validates a configuration from a TOML string.
  pub fn from_toml_str(toml_str: &str) -> Result<Self> {
    let config: Self = toml::from_str(toml_str)?;
    config.validate()?;
    Ok(config)
  }

  /// Reads and validates a configuration file.
  pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
    let path = path.as_ref();
    debug!("Loading configuration from {}", path.display());
    Self::from_toml_str(&std::fs::read_to_string(path)?)
  }

  /// Loads `path` when it exists, otherwise falls back to defaults.
  pub fn load_or_default(path: impl AsRef<Path>) -> Result<Self> {
    let path = path.as_ref();
    if path.exists() {
      Self::from_path(path)
    } else {
      debug!("No configuration at {}, using defaults", path.display());
      Ok(Self::default())
    }
  }

  /// Writes the configuration as TOML, creating parent directories.
  pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
    let path = path.as_ref();
    if let Some(parent) = path.parent() {
      std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, toml::to_string_pretty(self)?)?;
    Ok(())
  }

  /// Checks the values serde cannot check.
  pub fn validate(&self) -> Result<()> {
    Url::parse(&self.fetch.endpoint)
      .map_err(|e| HarvestError::Config(format!("Invalid endpoint {:?}: {e}", self.fetch.endpoint)))?;
    if self.fetch.metadata_prefix.trim().is_empty() {
      return Err(HarvestError::Config("metadata_prefix must not be empty".into()));
    }
    if self.fetch.budget.max_pages == 0 || self.fetch.budget.max_duration_s == 0 {
      return Err(HarvestError::Config("The fetch budget must allow at least one page".into()));
    }
    if !self.download.url_template.contains("{id}") {
      return Err(HarvestError::Config("url_template must contain an {id} placeholder".into()));
    }
    Url::parse(&self.download.artifact_url("0000.00000")).map_err(|e| {
      HarvestError::Config(format!("Invalid url_template {:?}: {e}", self.download.url_template))
    })?;
    if self.download.extension.is_empty() || self.download.extension.contains(['/', '.']) {
      return Err(HarvestError::Config(format!(
        "Invalid artifact extension {:?}",
        self.download.extension
      )));
    }
    if self.download.concurrency == 0 {
      return Err(HarvestError::Config("concurrency must be at least 1".into()));
    }
    Ok(())
  }
}

//! Application configuration structures.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::{Datelike, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};
use crate::models::PostSelectors;
use crate::models::post::timestamp_opt;

/// Root application configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// Profile crawl settings
    #[serde(default)]
    pub crawl: CrawlConfig,

    /// HTTP client and retry behavior
    #[serde(default)]
    pub http: HttpConfig,

    /// Listing page selectors
    #[serde(default)]
    pub selectors: PostSelectors,

    /// Corpus generation settings
    #[serde(default)]
    pub generate: GenerateConfig,
}

impl Config {
    /// Load configuration from a TOML file, using defaults only when the file
    /// does not exist.
    ///
    /// A file that exists but cannot be read or parsed is a configuration error.
    pub fn load_or_default(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        match fs::read_to_string(path) {
            Ok(content) => toml::from_str(&content).map_err(|e| {
                AppError::config(format!("Invalid config file {}: {}", path.display(), e))
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                log::warn!("Config file {} not found. Using defaults.", path.display());
                Ok(Self::default())
            }
            Err(e) => Err(AppError::config(format!(
                "Cannot read config file {}: {}",
                path.display(),
                e
            ))),
        }
    }

    /// Validate configuration values for basic sanity.
    pub fn validate(&self) -> Result<()> {
        if self.http.user_agent.trim().is_empty() {
            return Err(AppError::validation("http.user_agent is empty"));
        }
        if self.http.timeout_secs == 0 {
            return Err(AppError::validation("http.timeout_secs must be > 0"));
        }
        if url::Url::parse(&self.http.base_url).is_err() {
            return Err(AppError::validation(format!(
                "http.base_url '{}' is not an absolute URL",
                self.http.base_url
            )));
        }
        if self.selectors.id_prefix.is_empty() {
            return Err(AppError::validation("selectors.id_prefix is empty"));
        }
        if self.generate.max_words == 0 {
            return Err(AppError::validation("generate.max_words must be > 0"));
        }
        Ok(())
    }

    /// Check that everything a crawl needs is present.
    ///
    /// A missing credential is fatal before any request is made.
    pub fn validate_crawl(&self) -> Result<()> {
        self.validate()?;
        if self.crawl.uid.trim().is_empty() {
            return Err(AppError::config("crawl.uid is not set"));
        }
        if self.crawl.cookies.trim().is_empty() {
            return Err(AppError::config("crawl.cookies is not set"));
        }
        Ok(())
    }

    /// URL of the first listing page of the configured profile.
    pub fn profile_url(&self) -> String {
        format!(
            "{}/{}/profile",
            self.http.base_url.trim_end_matches('/'),
            self.crawl.uid.trim()
        )
    }
}

/// Profile crawl settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrawlConfig {
    /// Profile user id
    #[serde(default)]
    pub uid: String,

    /// Session cookie header value
    #[serde(default)]
    pub cookies: String,

    /// Maximum number of listing pages; negative means unlimited
    #[serde(default = "defaults::max_page")]
    pub max_page: i64,

    /// Keep posts published at or after this time (default: start of this year)
    #[serde(default, with = "timestamp_opt")]
    pub after: Option<NaiveDateTime>,

    /// Record file (JSON Lines)
    #[serde(default = "defaults::crawl_output")]
    pub output: PathBuf,

    /// Keep existing records instead of truncating the file
    #[serde(default)]
    pub append: bool,
}

impl CrawlConfig {
    /// Page bound, `None` when unlimited.
    pub fn page_limit(&self) -> Option<u32> {
        u32::try_from(self.max_page).ok()
    }

    /// Effective cutoff, resolved against `now` when unset.
    pub fn cutoff(&self, now: NaiveDateTime) -> NaiveDateTime {
        self.after.unwrap_or_else(|| start_of_year(now))
    }
}

impl Default for CrawlConfig {
    fn default() -> Self {
        Self {
            uid: String::new(),
            cookies: String::new(),
            max_page: defaults::max_page(),
            after: None,
            output: defaults::crawl_output(),
            append: false,
        }
    }
}

/// HTTP client, retry and politeness settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpConfig {
    /// Site root; listing and post links are resolved against it
    #[serde(default = "defaults::base_url")]
    pub base_url: String,

    /// User-Agent header for HTTP requests
    #[serde(default = "defaults::user_agent")]
    pub user_agent: String,

    /// Request timeout in seconds
    #[serde(default = "defaults::timeout")]
    pub timeout_secs: u64,

    /// Additional attempts after the first failed request
    #[serde(default = "defaults::max_retries")]
    pub max_retries: u32,

    /// First backoff delay in milliseconds; doubles on every retry
    #[serde(default = "defaults::backoff_base")]
    pub backoff_base_ms: u64,

    /// Politeness unit in milliseconds; each delay is 1 to 2 units
    #[serde(default = "defaults::politeness_base")]
    pub politeness_base_ms: u64,
}

impl HttpConfig {
    pub fn backoff_base(&self) -> Duration {
        Duration::from_millis(self.backoff_base_ms)
    }

    pub fn politeness_base(&self) -> Duration {
        Duration::from_millis(self.politeness_base_ms)
    }
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            base_url: defaults::base_url(),
            user_agent: defaults::user_agent(),
            timeout_secs: defaults::timeout(),
            max_retries: defaults::max_retries(),
            backoff_base_ms: defaults::backoff_base(),
            politeness_base_ms: defaults::politeness_base(),
        }
    }
}

/// Corpus generation settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerateConfig {
    /// Record file to read
    #[serde(default = "defaults::crawl_output")]
    pub input: PathBuf,

    /// Corpus export file (JSON)
    #[serde(default = "defaults::generate_output")]
    pub output: PathBuf,

    /// Window start, inclusive (default: start of this year)
    #[serde(default, with = "timestamp_opt")]
    pub after: Option<NaiveDateTime>,

    /// Window end, inclusive (default: now)
    #[serde(default, with = "timestamp_opt")]
    pub before: Option<NaiveDateTime>,

    /// Word cap handed to the renderer
    #[serde(default = "defaults::max_words")]
    pub max_words: usize,

    /// User dictionary for the segmenter
    #[serde(default)]
    pub custom_dict: Option<PathBuf>,

    /// Extra stopword file, one word per line
    #[serde(default)]
    pub stopwords: Option<PathBuf>,

    /// Longest span emitted by the built-in span segmenter
    #[serde(default = "defaults::max_span")]
    pub max_span: usize,
}

impl GenerateConfig {
    /// Effective inclusive window, resolved against `now`.
    pub fn window(&self, now: NaiveDateTime) -> (NaiveDateTime, NaiveDateTime) {
        (
            self.after.unwrap_or_else(|| start_of_year(now)),
            self.before.unwrap_or(now),
        )
    }
}

impl Default for GenerateConfig {
    fn default() -> Self {
        Self {
            input: defaults::crawl_output(),
            output: defaults::generate_output(),
            after: None,
            before: None,
            max_words: defaults::max_words(),
            custom_dict: None,
            stopwords: None,
            max_span: defaults::max_span(),
        }
    }
}

/// Midnight of January 1st in the year of `now`.
pub fn start_of_year(now: NaiveDateTime) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(now.year(), 1, 1)
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .unwrap_or(now)
}

mod defaults {
    use std::path::PathBuf;

    // Crawl defaults
    pub fn max_page() -> i64 {
        -1
    }
    pub fn crawl_output() -> PathBuf {
        PathBuf::from("weibo.jsonl")
    }

    // HTTP defaults
    pub fn base_url() -> String {
        "https://weibo.cn".into()
    }
    pub fn user_agent() -> String {
        "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/118.0.0.0 Safari/537.36".into()
    }
    pub fn timeout() -> u64 {
        30
    }
    pub fn max_retries() -> u32 {
        3
    }
    pub fn backoff_base() -> u64 {
        1000
    }
    pub fn politeness_base() -> u64 {
        1000
    }

    // Generate defaults
    pub fn generate_output() -> PathBuf {
        PathBuf::from("weibo_corpus.json")
    }
    pub fn max_words() -> usize {
        200
    }
    pub fn max_span() -> usize {
        4
    }
}

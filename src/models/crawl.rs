// src/models/crawl.rs

//! Page results and crawl outcomes.

use std::fmt;

use crate::error::{AppError, Result};

/// Raw fields of a post container, not yet validated.
///
/// Missing elements and the create time are only checked when the crawl
/// reaches the post.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListedPost {
    /// Post id with the container prefix stripped; empty if the container has none
    pub id: String,
    /// Joined content text, `None` if the content element is missing
    pub content: Option<String>,
    /// Create time text, `None` if the time element is missing
    pub created: Option<String>,
}

/// A post found on a listing page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PostEntry {
    /// Complete on the listing
    Listed(ListedPost),
    /// Truncated on the listing; the full text lives at `url`
    Truncated { id: String, url: String },
}

impl PostEntry {
    pub fn id(&self) -> &str {
        match self {
            PostEntry::Listed(listed) => &listed.id,
            PostEntry::Truncated { id, .. } => id,
        }
    }
}

/// Why a single page ends the crawl.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PageStop {
    /// The page has no next-page link
    NoNextPage,
    /// The page could not be fetched
    FetchFailed,
}

/// What follows a page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PageOutcome {
    /// Continue with the listing page at this URL
    Continue(String),
    Stop(PageStop),
}

/// Everything one listing page produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageResult {
    /// Posts in document order (newest first)
    pub entries: Vec<PostEntry>,
    pub outcome: PageOutcome,
}

impl PageResult {
    pub fn failed() -> Self {
        Self {
            entries: Vec::new(),
            outcome: PageOutcome::Stop(PageStop::FetchFailed),
        }
    }
}

/// Terminal state of a crawl.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StopReason {
    /// A post older than the cutoff was reached
    Cutoff,
    /// The last page had no next-page link
    NoNextPage,
    /// The page bound was reached
    MaxPage,
    /// A listing page could not be fetched after retries
    FetchFailed { url: String },
    /// The crawl was cancelled at a page boundary
    Cancelled,
}

impl StopReason {
    /// Whether this ending is an ordinary completion.
    pub fn is_success(&self) -> bool {
        matches!(
            self,
            StopReason::Cutoff | StopReason::NoNextPage | StopReason::MaxPage
        )
    }
}

impl fmt::Display for StopReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StopReason::Cutoff => f.write_str("reached posts older than the cutoff"),
            StopReason::NoNextPage => f.write_str("no next page"),
            StopReason::MaxPage => f.write_str("page limit reached"),
            StopReason::FetchFailed { url } => write!(f, "fetching {url} failed"),
            StopReason::Cancelled => f.write_str("cancelled"),
        }
    }
}

/// Summary of a crawl run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CrawlReport {
    /// Listing pages fetched (including a failed last one)
    pub pages: u32,
    /// Posts appended to the record store
    pub posts_written: usize,
    pub extraction_failures: usize,
    pub time_parse_failures: usize,
    pub stop: StopReason,
}

impl CrawlReport {
    /// Turn an aborted crawl into an error; ordinary endings pass through.
    ///
    /// Records written before the abort stay in the store either way.
    pub fn into_result(self) -> Result<Self> {
        match &self.stop {
            StopReason::FetchFailed { url } => Err(AppError::CrawlAborted(format!(
                "listing page {url} could not be fetched ({} posts kept)",
                self.posts_written
            ))),
            _ => Ok(self),
        }
    }
}

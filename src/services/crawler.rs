// src/services/crawler.rs

//! Paginated post crawler.
//!
//! The crawl is an explicit state machine:
//!
//! ```text
//! FetchingPage ──> Extracting ──> FetchingPage (next page)
//!                             └─> Stopped(Cutoff | NoNextPage | MaxPage | FetchFailed | Cancelled)
//! ```
//!
//! Listing pages are expected newest first. The first post older than the
//! cutoff ends the crawl, so a page served out of chronological order stops
//! it early. Requests are strictly sequential and every post is handed to the
//! sink as soon as it is known, before anything on the page after it is
//! fetched.

use std::sync::Arc;
use std::time::Duration;

use chrono::NaiveDateTime;
use tokio_util::sync::CancellationToken;

use crate::error::{AppError, Result};
use crate::models::{
    Config, CrawlReport, PageOutcome, PageResult, PageStop, Post, PostEntry, StopReason,
};
use crate::services::{
    FetchResponse, Fetcher, PostExtractor, RetryPolicy, Sleeper, fetch_with_retry,
    politeness_delay,
};
use crate::storage::PostSink;
use crate::utils::failures::{FailureKind, FailureLog};

/// Crawl bounds and pacing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CrawlSettings {
    /// First listing page
    pub start_url: String,
    /// Posts strictly older than this end the crawl
    pub cutoff: NaiveDateTime,
    /// Highest page number to fetch; `None` for unbounded
    pub page_limit: Option<u32>,
    pub retry: RetryPolicy,
    /// Politeness delays are drawn from `[base, 2 * base)`
    pub politeness_base: Duration,
}

impl CrawlSettings {
    pub fn from_config(config: &Config, now: NaiveDateTime) -> Self {
        Self {
            start_url: config.profile_url(),
            cutoff: config.crawl.cutoff(now),
            page_limit: config.crawl.page_limit(),
            retry: RetryPolicy::new(config.http.max_retries, config.http.backoff_base()),
            politeness_base: config.http.politeness_base(),
        }
    }

    fn exceeds_limit(&self, page: u32) -> bool {
        self.page_limit.is_some_and(|limit| page > limit)
    }
}

/// Crawl states.
#[derive(Debug)]
enum CrawlState {
    FetchingPage { url: String },
    Extracting { url: String, page: PageResult },
    Stopped(StopReason),
}

/// Mutable bookkeeping of one run.
#[derive(Debug, Default)]
struct CrawlCursor {
    /// Number of the page being fetched, 1-based
    page: u32,
    pages_fetched: u32,
    posts_written: usize,
    failures: FailureLog,
}

/// Sequential crawler over a profile's listing pages.
pub struct PostCrawler {
    settings: CrawlSettings,
    fetcher: Arc<dyn Fetcher>,
    sleeper: Arc<dyn Sleeper>,
    extractor: PostExtractor,
    cancel: CancellationToken,
}

impl PostCrawler {
    pub fn new(
        settings: CrawlSettings,
        fetcher: Arc<dyn Fetcher>,
        sleeper: Arc<dyn Sleeper>,
        extractor: PostExtractor,
    ) -> Self {
        Self {
            settings,
            fetcher,
            sleeper,
            extractor,
            cancel: CancellationToken::new(),
        }
    }

    /// Stop the crawl at the next page boundary once `cancel` fires.
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Fetch and extract a single listing page.
    ///
    /// A page that cannot be fetched yields [`PageResult::failed`].
    pub async fn crawl_page(&self, url: &str) -> PageResult {
        match self.fetch(url).await {
            Ok(response) => self.extractor.extract_listing(&response.body),
            Err(e) => {
                log::error!("Failed to fetch listing page: {}", e);
                PageResult::failed()
            }
        }
    }

    /// Crawl until a terminal state, writing every kept post to `sink`.
    ///
    /// Only sink errors are returned as `Err`. Every other ending is reported
    /// through [`CrawlReport::stop`].
    pub async fn run(&self, sink: &mut dyn PostSink) -> Result<CrawlReport> {
        let mut cursor = CrawlCursor {
            page: 1,
            ..CrawlCursor::default()
        };
        let mut state = if self.settings.exceeds_limit(cursor.page) {
            CrawlState::Stopped(StopReason::MaxPage)
        } else {
            CrawlState::FetchingPage {
                url: self.settings.start_url.clone(),
            }
        };

        let stop = loop {
            state = match state {
                CrawlState::FetchingPage { url } => {
                    if self.cancel.is_cancelled() {
                        CrawlState::Stopped(StopReason::Cancelled)
                    } else {
                        log::info!("Crawling page {}: {}", cursor.page, url);
                        cursor.pages_fetched += 1;
                        let page = self.crawl_page(&url).await;
                        CrawlState::Extracting { url, page }
                    }
                }
                CrawlState::Extracting { url, page } => {
                    self.drain_page(url, page, &mut cursor, sink).await?
                }
                CrawlState::Stopped(reason) => break reason,
            };
        };

        match &stop {
            StopReason::FetchFailed { .. } => log::error!("Crawl stopped: {}", stop),
            StopReason::Cancelled => log::warn!("Crawl stopped: {}", stop),
            _ => log::info!("Crawl finished: {}", stop),
        }

        Ok(CrawlReport {
            pages: cursor.pages_fetched,
            posts_written: cursor.posts_written,
            extraction_failures: cursor.failures.count(FailureKind::Extraction),
            time_parse_failures: cursor.failures.count(FailureKind::TimeParse),
            stop,
        })
    }

    /// Hand the page's posts to `sink` in order, then decide what follows.
    ///
    /// Each entry is resolved only when reached, so nothing after the cutoff
    /// post is validated or fetched.
    async fn drain_page(
        &self,
        url: String,
        page: PageResult,
        cursor: &mut CrawlCursor,
        sink: &mut dyn PostSink,
    ) -> Result<CrawlState> {
        for entry in page.entries {
            let (post, sub_fetched) = match entry {
                PostEntry::Listed(listed) => {
                    let result = self.extractor.resolve(listed, &mut cursor.failures);
                    (cursor.failures.keep(FailureKind::Extraction, result), false)
                }
                PostEntry::Truncated { id, url } => {
                    (self.fetch_full_text(&id, &url, &mut cursor.failures).await, true)
                }
            };

            if let Some(post) = post {
                if post.created_at < self.settings.cutoff {
                    log::info!("Post {} at {} is older than the cutoff", post.id, post.created_at);
                    return Ok(CrawlState::Stopped(StopReason::Cutoff));
                }
                sink.write_post(&post).await?;
                cursor.posts_written += 1;
            }

            if sub_fetched {
                self.sleeper
                    .sleep(politeness_delay(self.settings.politeness_base))
                    .await;
            }
        }

        let next = match page.outcome {
            PageOutcome::Continue(next) => next,
            PageOutcome::Stop(PageStop::NoNextPage) => {
                return Ok(CrawlState::Stopped(StopReason::NoNextPage));
            }
            PageOutcome::Stop(PageStop::FetchFailed) => {
                return Ok(CrawlState::Stopped(StopReason::FetchFailed { url }));
            }
        };

        cursor.page += 1;
        if self.settings.exceeds_limit(cursor.page) {
            return Ok(CrawlState::Stopped(StopReason::MaxPage));
        }

        let delay = politeness_delay(self.settings.politeness_base);
        log::debug!("Waiting {:?} before page {}", delay, cursor.page);
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Ok(CrawlState::Stopped(StopReason::Cancelled)),
            _ = self.sleeper.sleep(delay) => Ok(CrawlState::FetchingPage { url: next }),
        }
    }

    /// Resolve a truncated post through its full-text page.
    ///
    /// Failures are recorded and the post is skipped.
    async fn fetch_full_text(&self, id: &str, url: &str, failures: &mut FailureLog) -> Option<Post> {
        log::debug!("Fetching full text of {} from {}", id, url);
        let result = match self.fetch(url).await {
            Ok(response) => self.extractor.extract_full_text(id, &response.body, failures),
            Err(e) => Err(AppError::extraction(id, e)),
        };
        failures.keep(FailureKind::Extraction, result)
    }

    async fn fetch(&self, url: &str) -> Result<FetchResponse> {
        fetch_with_retry(
            self.fetcher.as_ref(),
            self.sleeper.as_ref(),
            url,
            self.settings.retry,
            FetchResponse::is_ok,
        )
        .await
    }
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;
    use chrono::NaiveDate;

    use super::*;
    use crate::models::PostSelectors;
    use crate::services::fetcher::mock::{RecordingSleeper, ScriptedFetcher};
    use crate::services::{FixedClock, TimeNormalizer};

    const START: &str = "https://weibo.cn/123/profile";
    const PAGE_2: &str = "https://weibo.cn/123/profile?page=2";
    const PAGE_3: &str = "https://weibo.cn/123/profile?page=3";

    fn at(month: u32, day: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2025, month, day)
            .unwrap()
            .and_hms_opt(10, 0, 0)
            .unwrap()
    }

    fn post_div(id: &str, text: &str, time: &str) -> String {
        format!(
            r#"<div class="c" id="M_{id}"><div><span class="ctt">{text}</span><span class="ct">{time}</span></div></div>"#
        )
    }

    fn truncated_div(id: &str) -> String {
        format!(
            r#"<div class="c" id="M_{id}"><div><span class="ctt">截断…</span><a href="/comment/{id}?uid=123">全文</a><span class="ct">2025-05-19 10:00</span></div></div>"#
        )
    }

    fn listing(posts: &[String], next: Option<u32>) -> String {
        let next = next
            .map(|n| format!(r#"<div id="pagelist"><a href="/123/profile?page={n}">下页</a></div>"#))
            .unwrap_or_default();
        format!("<html><body>{}{}</body></html>", posts.concat(), next)
    }

    fn settings(cutoff: NaiveDateTime, page_limit: Option<u32>) -> CrawlSettings {
        CrawlSettings {
            start_url: START.to_string(),
            cutoff,
            page_limit,
            retry: RetryPolicy::new(2, Duration::from_secs(1)),
            politeness_base: Duration::from_secs(1),
        }
    }

    fn crawler(
        fetcher: &Arc<ScriptedFetcher>,
        sleeper: &Arc<RecordingSleeper>,
        settings: CrawlSettings,
    ) -> PostCrawler {
        let now = at(6, 1);
        let normalizer = TimeNormalizer::new(Arc::new(FixedClock(now))).unwrap();
        let extractor =
            PostExtractor::new(&PostSelectors::default(), "https://weibo.cn", normalizer).unwrap();
        PostCrawler::new(settings, fetcher.clone(), sleeper.clone(), extractor)
    }

    fn ids(posts: &[Post]) -> Vec<&str> {
        posts.iter().map(|p| p.id.as_str()).collect()
    }

    fn three_pages() -> ScriptedFetcher {
        ScriptedFetcher::new()
            .page(
                START,
                &listing(
                    &[
                        post_div("A1", "第一页", "2025-05-20 10:00"),
                        post_div("A2", "第一页", "2025-05-18 10:00"),
                    ],
                    Some(2),
                ),
            )
            .page(
                PAGE_2,
                &listing(
                    &[
                        post_div("B1", "第二页", "2025-05-10 10:00"),
                        post_div("B2", "第二页", "2025-05-01 10:00"),
                        post_div("B3", "第二页", "2025-04-28 10:00"),
                    ],
                    Some(3),
                ),
            )
            .page(
                PAGE_3,
                &listing(&[post_div("C1", "第三页", "2025-04-01 10:00")], None),
            )
    }

    #[tokio::test]
    async fn test_cutoff_inside_second_page() {
        let fetcher = Arc::new(three_pages());
        let sleeper = Arc::new(RecordingSleeper::default());
        let crawler = crawler(&fetcher, &sleeper, settings(at(5, 5), None));

        let mut posts: Vec<Post> = Vec::new();
        let report = crawler.run(&mut posts).await.unwrap();

        assert_eq!(ids(&posts), vec!["A1", "A2", "B1"]);
        assert_eq!(report.stop, StopReason::Cutoff);
        assert_eq!(report.pages, 2);
        assert_eq!(report.posts_written, 3);
        assert_eq!(fetcher.request_count(PAGE_3), 0);
        assert_eq!(fetcher.requests(), vec![START, PAGE_2]);

        // One delay between page 1 and page 2, none after the cutoff
        let delays = sleeper.delays();
        assert_eq!(delays.len(), 1);
        assert!(delays[0] >= Duration::from_secs(1) && delays[0] < Duration::from_secs(2));
    }

    #[tokio::test]
    async fn test_post_at_cutoff_is_kept() {
        let fetcher = Arc::new(three_pages());
        let sleeper = Arc::new(RecordingSleeper::default());
        let crawler = crawler(&fetcher, &sleeper, settings(at(5, 1), None));

        let mut posts: Vec<Post> = Vec::new();
        let report = crawler.run(&mut posts).await.unwrap();

        assert_eq!(ids(&posts), vec!["A1", "A2", "B1", "B2"]);
        assert_eq!(report.stop, StopReason::Cutoff);
    }

    #[tokio::test]
    async fn test_runs_to_last_page() {
        let fetcher = Arc::new(three_pages());
        let sleeper = Arc::new(RecordingSleeper::default());
        let crawler = crawler(&fetcher, &sleeper, settings(at(1, 1), None));

        let mut posts: Vec<Post> = Vec::new();
        let report = crawler.run(&mut posts).await.unwrap();

        assert_eq!(ids(&posts), vec!["A1", "A2", "B1", "B2", "B3", "C1"]);
        assert_eq!(report.stop, StopReason::NoNextPage);
        assert_eq!(report.pages, 3);
        assert_eq!(sleeper.delays().len(), 2);
        assert!(report.stop.is_success());
    }

    #[tokio::test]
    async fn test_page_limit() {
        let fetcher = Arc::new(three_pages());
        let sleeper = Arc::new(RecordingSleeper::default());
        let crawler = crawler(&fetcher, &sleeper, settings(at(1, 1), Some(1)));

        let mut posts: Vec<Post> = Vec::new();
        let report = crawler.run(&mut posts).await.unwrap();

        assert_eq!(ids(&posts), vec!["A1", "A2"]);
        assert_eq!(report.stop, StopReason::MaxPage);
        assert_eq!(fetcher.requests(), vec![START]);
        assert!(sleeper.delays().is_empty());
    }

    #[tokio::test]
    async fn test_zero_page_limit_fetches_nothing() {
        let fetcher = Arc::new(three_pages());
        let sleeper = Arc::new(RecordingSleeper::default());
        let crawler = crawler(&fetcher, &sleeper, settings(at(1, 1), Some(0)));

        let mut posts: Vec<Post> = Vec::new();
        let report = crawler.run(&mut posts).await.unwrap();

        assert!(posts.is_empty());
        assert_eq!(report.stop, StopReason::MaxPage);
        assert_eq!(report.pages, 0);
        assert!(fetcher.requests().is_empty());
    }

    #[tokio::test]
    async fn test_fetch_failure_ends_crawl() {
        let fetcher = Arc::new(
            ScriptedFetcher::new()
                .page(
                    START,
                    &listing(&[post_div("A1", "第一页", "2025-05-20 10:00")], Some(2)),
                )
                .script(PAGE_2, vec![Ok(FetchResponse::new(503, "busy"))]),
        );
        let sleeper = Arc::new(RecordingSleeper::default());
        let crawler = crawler(&fetcher, &sleeper, settings(at(1, 1), None));

        let mut posts: Vec<Post> = Vec::new();
        let report = crawler.run(&mut posts).await.unwrap();

        assert_eq!(ids(&posts), vec!["A1"]);
        assert_eq!(
            report.stop,
            StopReason::FetchFailed {
                url: PAGE_2.to_string()
            }
        );
        assert_eq!(report.pages, 2);
        assert_eq!(fetcher.request_count(PAGE_2), 3);
        assert!(report.into_result().is_err());
    }

    #[tokio::test]
    async fn test_truncated_post_resolved_from_full_text() {
        let full_text = listing(
            &[post_div("other", ":完整的长微博内容", "2025-05-19 10:00")],
            None,
        );
        let fetcher = Arc::new(
            ScriptedFetcher::new()
                .page(
                    START,
                    &listing(
                        &[
                            post_div("A1", "短", "2025-05-20 10:00"),
                            truncated_div("A2"),
                            post_div("A3", "短", "2025-05-18 10:00"),
                        ],
                        None,
                    ),
                )
                .page("https://weibo.cn/comment/A2?uid=123", &full_text),
        );
        let sleeper = Arc::new(RecordingSleeper::default());
        let crawler = crawler(&fetcher, &sleeper, settings(at(1, 1), None));

        let mut posts: Vec<Post> = Vec::new();
        let report = crawler.run(&mut posts).await.unwrap();

        assert_eq!(ids(&posts), vec!["A1", "A2", "A3"]);
        assert_eq!(posts[1].content, "完整的长微博内容");
        assert_eq!(posts[1].created_at, at(5, 19));
        assert_eq!(report.stop, StopReason::NoNextPage);
        // Politeness delay after the sub-fetch
        assert_eq!(sleeper.delays().len(), 1);
    }

    #[tokio::test]
    async fn test_failed_full_text_is_skipped() {
        let fetcher = Arc::new(ScriptedFetcher::new().page(
            START,
            &listing(
                &[truncated_div("A1"), post_div("A2", "短", "2025-05-18 10:00")],
                None,
            ),
        ));
        let sleeper = Arc::new(RecordingSleeper::default());
        let crawler = crawler(&fetcher, &sleeper, settings(at(1, 1), None));

        let mut posts: Vec<Post> = Vec::new();
        let report = crawler.run(&mut posts).await.unwrap();

        assert_eq!(ids(&posts), vec!["A2"]);
        assert_eq!(report.extraction_failures, 1);
        assert_eq!(report.stop, StopReason::NoNextPage);
        // Two backoffs for the sub-fetch, then the politeness delay
        assert_eq!(
            sleeper.delays()[..2],
            [Duration::from_secs(1), Duration::from_secs(2)]
        );
        assert_eq!(sleeper.delays().len(), 3);
    }

    #[tokio::test]
    async fn test_posts_after_cutoff_are_not_inspected() {
        let fetcher = Arc::new(ScriptedFetcher::new().page(
            START,
            &listing(
                &[
                    post_div("A1", "新的", "2025-05-20 10:00"),
                    post_div("OLD", "旧的", "2024-12-01 10:00"),
                    r#"<div class="c" id="M_BAD"><span class="ctt">没有时间</span></div>"#.to_string(),
                    post_div("BADT", "时间不对", "刚刚"),
                ],
                Some(2),
            ),
        ));
        let sleeper = Arc::new(RecordingSleeper::default());
        let crawler = crawler(&fetcher, &sleeper, settings(at(5, 5), None));

        let mut posts: Vec<Post> = Vec::new();
        let report = crawler.run(&mut posts).await.unwrap();

        assert_eq!(ids(&posts), vec!["A1"]);
        assert_eq!(report.stop, StopReason::Cutoff);
        assert_eq!(report.extraction_failures, 0);
        assert_eq!(report.time_parse_failures, 0);
        assert_eq!(fetcher.requests(), vec![START]);
    }

    #[tokio::test]
    async fn test_truncated_post_at_cutoff_stops_sub_fetches() {
        let old_full_text = listing(&[post_div("x", "旧的全文", "2025-04-01 10:00")], None);
        let later_full_text = listing(&[post_div("y", "更旧的全文", "2025-03-01 10:00")], None);
        let fetcher = Arc::new(
            ScriptedFetcher::new()
                .page(
                    START,
                    &listing(
                        &[
                            post_div("A1", "新的", "2025-05-20 10:00"),
                            truncated_div("OLD"),
                            truncated_div("LATER"),
                        ],
                        Some(2),
                    ),
                )
                .page("https://weibo.cn/comment/OLD?uid=123", &old_full_text)
                .page("https://weibo.cn/comment/LATER?uid=123", &later_full_text),
        );
        let sleeper = Arc::new(RecordingSleeper::default());
        let crawler = crawler(&fetcher, &sleeper, settings(at(5, 5), None));

        let mut posts: Vec<Post> = Vec::new();
        let report = crawler.run(&mut posts).await.unwrap();

        assert_eq!(ids(&posts), vec!["A1"]);
        assert_eq!(report.stop, StopReason::Cutoff);
        assert_eq!(
            fetcher.requests(),
            vec![START, "https://weibo.cn/comment/OLD?uid=123"]
        );
        // No politeness delay after the sub-fetch that hit the cutoff
        assert!(sleeper.delays().is_empty());
    }

    #[tokio::test]
    async fn test_cancelled_before_start() {
        let fetcher = Arc::new(three_pages());
        let sleeper = Arc::new(RecordingSleeper::default());
        let token = CancellationToken::new();
        token.cancel();
        let crawler =
            crawler(&fetcher, &sleeper, settings(at(1, 1), None)).with_cancellation(token);

        let mut posts: Vec<Post> = Vec::new();
        let report = crawler.run(&mut posts).await.unwrap();

        assert_eq!(report.stop, StopReason::Cancelled);
        assert!(fetcher.requests().is_empty());
        assert!(!report.stop.is_success());
    }

    /// Cancels the crawl as soon as the first post is written.
    struct CancellingSink {
        posts: Vec<Post>,
        token: CancellationToken,
    }

    #[async_trait]
    impl PostSink for CancellingSink {
        async fn write_post(&mut self, post: &Post) -> Result<()> {
            self.posts.push(post.clone());
            self.token.cancel();
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_cancellation_waits_for_page_boundary() {
        let fetcher = Arc::new(three_pages());
        let sleeper = Arc::new(RecordingSleeper::default());
        let token = CancellationToken::new();
        let crawler = crawler(&fetcher, &sleeper, settings(at(1, 1), None))
            .with_cancellation(token.clone());

        let mut sink = CancellingSink {
            posts: Vec::new(),
            token,
        };
        let report = crawler.run(&mut sink).await.unwrap();

        // The whole first page is written before the crawl stops
        assert_eq!(ids(&sink.posts), vec!["A1", "A2"]);
        assert_eq!(report.stop, StopReason::Cancelled);
        assert_eq!(fetcher.requests(), vec![START]);
    }
}

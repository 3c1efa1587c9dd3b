// src/pipeline/crawl.rs

//! Crawl pipeline: profile pages into the record file.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::error::{AppError, Result};
use crate::models::{Config, CrawlReport};
use crate::services::{
    Clock, CrawlSettings, Fetcher, HttpFetcher, PostCrawler, PostExtractor, Sleeper,
    SystemClock, TimeNormalizer, TokioSleeper,
};
use crate::storage::JsonlStore;
use crate::utils::http;

/// Run a crawl over HTTP with the configured session.
pub async fn run_crawl(config: &Config, cancel: CancellationToken) -> Result<CrawlReport> {
    check_config(config)?;
    let client = http::create_async_client(&config.http, &config.crawl.cookies)?;
    run_crawl_with(
        config,
        Arc::new(HttpFetcher::new(client)),
        Arc::new(TokioSleeper),
        Arc::new(SystemClock),
        cancel,
    )
    .await
}

/// Run a crawl with explicit fetcher, sleeper and clock.
///
/// Posts written before an abort stay in the record file. A crawl stopped by
/// a failed listing page returns [`AppError::CrawlAborted`].
pub async fn run_crawl_with(
    config: &Config,
    fetcher: Arc<dyn Fetcher>,
    sleeper: Arc<dyn Sleeper>,
    clock: Arc<dyn Clock>,
    cancel: CancellationToken,
) -> Result<CrawlReport> {
    check_config(config)?;

    let normalizer = TimeNormalizer::new(clock)?;
    let settings = CrawlSettings::from_config(config, normalizer.now());
    let extractor = PostExtractor::new(&config.selectors, &config.http.base_url, normalizer)?;

    log::info!("Crawling {} (posts since {})", settings.start_url, settings.cutoff);
    if let Some(limit) = settings.page_limit {
        log::info!("Page limit: {}", limit);
    }

    let mut store = JsonlStore::open(&config.crawl.output, config.crawl.append).await?;
    let crawler =
        PostCrawler::new(settings, fetcher, sleeper, extractor).with_cancellation(cancel);
    let report = crawler.run(&mut store).await?;

    log::info!(
        "Saved {} posts from {} pages to {}",
        report.posts_written,
        report.pages,
        store.path().display()
    );
    if report.extraction_failures > 0 || report.time_parse_failures > 0 {
        log::warn!(
            "{} posts skipped, {} create times replaced by the current time",
            report.extraction_failures,
            report.time_parse_failures
        );
    }

    report.into_result()
}

/// A crawl without a usable configuration is aborted before any request.
fn check_config(config: &Config) -> Result<()> {
    config
        .validate_crawl()
        .map_err(|e| AppError::CrawlAborted(e.to_string()))
}

//! Service layer for the crawler and corpus builder.
//!
//! This module contains the business logic for:
//! - Page fetching with retries (`fetch_with_retry`)
//! - Create time normalization (`TimeNormalizer`)
//! - Post extraction (`PostExtractor`)
//! - Paginated crawling (`PostCrawler`)
//! - Segmentation and corpus pruning (`CorpusPruner`)

mod crawler;
mod extractor;
mod fetcher;
mod pruner;
mod segmenter;
mod time;

#[cfg(test)]
pub(crate) use fetcher::mock;

pub use crawler::{CrawlSettings, PostCrawler};
pub use extractor::PostExtractor;
pub use fetcher::{
    FetchResponse, Fetcher, HttpFetcher, RetryPolicy, Sleeper, TokioSleeper, fetch_with_retry,
    politeness_delay,
};
pub use pruner::{Corpus, CorpusPruner, SUMMARY_SIZE, TimeWindow, most_common};
#[cfg(feature = "jieba")]
pub use segmenter::JiebaSegmenter;
pub use segmenter::{Segmenter, SpanSegmenter, Stopwords};
pub use time::{Clock, FixedClock, SystemClock, TimeNormalizer};

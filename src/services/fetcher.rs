// src/services/fetcher.rs

//! Page fetching with exponential backoff.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;

use crate::error::{AppError, Result};

/// A fetched page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchResponse {
    pub status: u16,
    pub body: String,
}

impl FetchResponse {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    pub fn is_ok(&self) -> bool {
        self.status == 200
    }
}

/// Issues a single GET request.
#[async_trait]
pub trait Fetcher: Send + Sync {
    async fn get(&self, url: &str) -> Result<FetchResponse>;
}

/// Suspends the crawl between requests.
#[async_trait]
pub trait Sleeper: Send + Sync {
    async fn sleep(&self, duration: Duration);
}

/// Sleeps on the tokio timer.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioSleeper;

#[async_trait]
impl Sleeper for TokioSleeper {
    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

/// Fetcher backed by a `reqwest` client.
///
/// Session headers (user agent, cookie) are baked into the client.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn get(&self, url: &str) -> Result<FetchResponse> {
        let response = self.client.get(url).send().await?;
        let status = response.status().as_u16();
        let body = response.text().await?;
        Ok(FetchResponse { status, body })
    }
}

/// Retry bound and backoff schedule.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Additional attempts after the first one
    pub max_retries: u32,
    /// Delay before the first retry; doubles afterwards
    pub base_delay: Duration,
}

impl RetryPolicy {
    pub fn new(max_retries: u32, base_delay: Duration) -> Self {
        Self {
            max_retries,
            base_delay,
        }
    }

    /// Delay before retry number `retry` (0-based).
    pub fn delay(&self, retry: u32) -> Duration {
        self.base_delay
            .saturating_mul(2u32.saturating_pow(retry.min(31)))
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(3, Duration::from_secs(1))
    }
}

/// Fetch `url` until `accept` approves the response.
///
/// At most `policy.max_retries + 1` requests are made. Transport errors count
/// as rejected attempts. After the last rejected attempt the result is
/// [`AppError::FetchExhausted`].
pub async fn fetch_with_retry<P>(
    fetcher: &dyn Fetcher,
    sleeper: &dyn Sleeper,
    url: &str,
    policy: RetryPolicy,
    accept: P,
) -> Result<FetchResponse>
where
    P: Fn(&FetchResponse) -> bool + Send + Sync,
{
    let mut retry = 0;
    loop {
        match fetcher.get(url).await {
            Ok(response) if accept(&response) => return Ok(response),
            Ok(response) => log::debug!("GET {} returned status {}", url, response.status),
            Err(error) => log::debug!("GET {} failed: {}", url, error),
        }

        if retry >= policy.max_retries {
            return Err(AppError::FetchExhausted {
                url: url.to_string(),
                attempts: retry + 1,
            });
        }

        let delay = policy.delay(retry);
        log::debug!("Retrying {} in {:?}", url, delay);
        sleeper.sleep(delay).await;
        retry += 1;
    }
}

/// Random politeness delay in `[base, 2 * base)`, in whole milliseconds.
///
/// A base below one millisecond gives the base itself.
pub fn politeness_delay(base: Duration) -> Duration {
    let base_ms = u64::try_from(base.as_millis()).unwrap_or(u64::MAX);
    if base_ms == 0 {
        return base;
    }
    Duration::from_millis(fastrand::u64(base_ms..base_ms.saturating_mul(2)))
}

// src/utils/http.rs

//! HTTP client utilities.

use std::time::Duration;

use reqwest::header::{ACCEPT, COOKIE, HeaderMap, HeaderValue};

use crate::error::{AppError, Result};
use crate::models::HttpConfig;

/// Create the session client.
///
/// The cookie string is sent verbatim with every request.
pub fn create_async_client(config: &HttpConfig, cookies: &str) -> Result<reqwest::Client> {
    let mut headers = HeaderMap::new();
    let cookie = HeaderValue::from_str(cookies)
        .map_err(|e| AppError::config(format!("Invalid cookie string: {e}")))?;
    headers.insert(COOKIE, cookie);
    headers.insert(ACCEPT, HeaderValue::from_static("text/html"));

    let client = reqwest::Client::builder()
        .user_agent(&config.user_agent)
        .default_headers(headers)
        .timeout(Duration::from_secs(config.timeout_secs))
        .build()?;
    Ok(client)
}

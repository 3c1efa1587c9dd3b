// src/error.rs

//! Unified error handling for the crawler and corpus builder.

use std::fmt;

use thiserror::Error;

/// Result type alias for postcloud operations.
pub type Result<T> = std::result::Result<T, AppError>;

/// Unified application error type.
#[derive(Error, Debug)]
pub enum AppError {
    /// I/O operation failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// HTTP request failed
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON serialization/deserialization failed
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// TOML parsing failed
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    /// URL parsing failed
    #[error("URL parse error: {0}")]
    Url(#[from] url::ParseError),

    /// CSS selector parsing failed
    #[error("Invalid selector '{selector}': {message}")]
    Selector { selector: String, message: String },

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Data validation error
    #[error("Validation error: {0}")]
    Validation(String),

    /// Every attempt of a retried request failed
    #[error("Fetching {url} failed after {attempts} attempts")]
    FetchExhausted { url: String, attempts: u32 },

    /// The crawl was stopped before finishing
    #[error("Crawl aborted: {0}")]
    CrawlAborted(String),

    /// A timestamp did not match any known shape
    #[error("Cannot parse create time '{0}'")]
    TimeParse(String),

    /// A post container was malformed
    #[error("Cannot extract post {id}: {message}")]
    Extraction { id: String, message: String },

    /// A stored record line was not a valid post
    #[error("Cannot parse record at line {line}: {message}")]
    RecordParse { line: usize, message: String },
}

impl AppError {
    /// Create a selector parsing error.
    pub fn selector(selector: impl Into<String>, message: impl fmt::Display) -> Self {
        Self::Selector {
            selector: selector.into(),
            message: message.to_string(),
        }
    }

    /// Create a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Create a validation error.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    /// Create an extraction error for a post id.
    pub fn extraction(id: impl Into<String>, message: impl fmt::Display) -> Self {
        Self::Extraction {
            id: id.into(),
            message: message.to_string(),
        }
    }

    /// Create a record parse error for a 1-based line number.
    pub fn record_parse(line: usize, message: impl fmt::Display) -> Self {
        Self::RecordParse {
            line,
            message: message.to_string(),
        }
    }
}

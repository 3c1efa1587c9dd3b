// src/models/mod.rs

//! Domain models for the crawler and corpus builder.
//!
//! This module contains all data structures used throughout the application,
//! organized by their primary purpose.

mod config;
mod crawl;
pub mod post;
mod selectors;

// Re-export all public types
pub use config::{Config, CrawlConfig, GenerateConfig, HttpConfig, start_of_year};
pub use crawl::{
    CrawlReport, ListedPost, PageOutcome, PageResult, PageStop, PostEntry, StopReason,
};
pub use post::Post;
pub use selectors::PostSelectors;

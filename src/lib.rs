// src/lib.rs

//! postcloud: crawl a profile's posts and turn them into a word-frequency corpus.

pub mod error;
pub mod models;
pub mod pipeline;
pub mod services;
pub mod storage;
pub mod utils;

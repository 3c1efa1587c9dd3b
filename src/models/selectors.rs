// src/models/selectors.rs

//! CSS selectors and link markers for scraping a profile listing.

use serde::{Deserialize, Serialize};

/// CSS selectors and text markers used to locate posts in a listing page.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PostSelectors {
    /// Selector for each post container
    #[serde(default = "defaults::post_selector")]
    pub post_selector: String,

    /// Prefix of the container `id` attribute preceding the post id
    #[serde(default = "defaults::id_prefix")]
    pub id_prefix: String,

    /// Selector for the content element within a container
    #[serde(default = "defaults::content_selector")]
    pub content_selector: String,

    /// Selector for the create time element within a container
    #[serde(default = "defaults::time_selector")]
    pub time_selector: String,

    /// Selector for candidate links (full text and next page)
    #[serde(default = "defaults::link_selector")]
    pub link_selector: String,

    /// Visible text of the link to a truncated post's full text
    #[serde(default = "defaults::full_text_marker")]
    pub full_text_marker: String,

    /// Visible text of the link to the next listing page
    #[serde(default = "defaults::next_page_marker")]
    pub next_page_marker: String,
}

impl Default for PostSelectors {
    fn default() -> Self {
        Self {
            post_selector: defaults::post_selector(),
            id_prefix: defaults::id_prefix(),
            content_selector: defaults::content_selector(),
            time_selector: defaults::time_selector(),
            link_selector: defaults::link_selector(),
            full_text_marker: defaults::full_text_marker(),
            next_page_marker: defaults::next_page_marker(),
        }
    }
}

mod defaults {
    pub fn post_selector() -> String {
        r#"div.c[id^="M_"]"#.to_string()
    }
    pub fn id_prefix() -> String {
        "M_".to_string()
    }
    pub fn content_selector() -> String {
        "span.ctt".to_string()
    }
    pub fn time_selector() -> String {
        "span.ct".to_string()
    }
    pub fn link_selector() -> String {
        "a[href]".to_string()
    }
    pub fn full_text_marker() -> String {
        "全文".to_string()
    }
    pub fn next_page_marker() -> String {
        "下页".to_string()
    }
}

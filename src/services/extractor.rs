// src/services/extractor.rs

//! Post extraction from listing and full-text pages.
//!
//! A listing page holds post containers (`div.c` with an `id` of `M_<post id>`),
//! each carrying a content span and a create time span. Long posts are cut
//! short on the listing and link to a full-text page instead.

use scraper::{ElementRef, Html, Selector};
use url::Url;

use crate::error::{AppError, Result};
use crate::models::{ListedPost, PageOutcome, PageResult, PageStop, Post, PostEntry, PostSelectors};
use crate::services::TimeNormalizer;
use crate::utils::failures::FailureLog;
use crate::utils::resolve_url;

/// Extracts posts and the next-page link from parsed pages.
pub struct PostExtractor {
    post: Selector,
    content: Selector,
    time: Selector,
    link: Selector,
    id_prefix: String,
    full_text_marker: String,
    next_page_marker: String,
    base_url: Url,
    normalizer: TimeNormalizer,
}

impl PostExtractor {
    /// Compile the configured selectors.
    pub fn new(selectors: &PostSelectors, base_url: &str, normalizer: TimeNormalizer) -> Result<Self> {
        Ok(Self {
            post: parse_selector(&selectors.post_selector)?,
            content: parse_selector(&selectors.content_selector)?,
            time: parse_selector(&selectors.time_selector)?,
            link: parse_selector(&selectors.link_selector)?,
            id_prefix: selectors.id_prefix.clone(),
            full_text_marker: selectors.full_text_marker.clone(),
            next_page_marker: selectors.next_page_marker.clone(),
            base_url: Url::parse(base_url)?,
            normalizer,
        })
    }

    /// Collect the post containers of a listing page and locate the next page.
    ///
    /// Entries keep the raw container fields. Nothing is validated here, so
    /// containers the crawl never reaches cannot fail.
    pub fn extract_listing(&self, html: &str) -> PageResult {
        let document = parse_page(html);

        let entries = document
            .select(&self.post)
            .map(|container| self.list_entry(container))
            .collect();

        let outcome = match self.find_link(document.root_element(), &self.next_page_marker) {
            Some(url) => PageOutcome::Continue(url),
            None => {
                log::info!("Cannot find next page link");
                PageOutcome::Stop(PageStop::NoNextPage)
            }
        };

        PageResult { entries, outcome }
    }

    /// Turn a listed container into a post.
    ///
    /// A missing id, content or create time is an extraction error. An
    /// unparsable create time is replaced by the current time and recorded in
    /// `failures`.
    pub fn resolve(&self, listed: ListedPost, failures: &mut FailureLog) -> Result<Post> {
        let ListedPost {
            id,
            content,
            created,
        } = listed;
        if id.is_empty() {
            return Err(AppError::extraction(id, "container has no post id"));
        }
        let content = content.ok_or_else(|| AppError::extraction(&id, "no content element"))?;
        let created = created.ok_or_else(|| AppError::extraction(&id, "no create time element"))?;

        let created_at = self.normalizer.normalize(&created, failures);
        Ok(Post::new(id, content, created_at))
    }

    /// Extract the post `id` from its full-text page.
    pub fn extract_full_text(&self, id: &str, html: &str, failures: &mut FailureLog) -> Result<Post> {
        let document = parse_page(html);
        let container = document
            .select(&self.post)
            .next()
            .ok_or_else(|| AppError::extraction(id, "full text page has no post container"))?;
        let listed = ListedPost {
            id: id.to_string(),
            ..self.list_fields(container)
        };
        self.resolve(listed, failures)
    }

    fn list_entry(&self, container: ElementRef<'_>) -> PostEntry {
        let listed = self.list_fields(container);
        match self.find_link(container, &self.full_text_marker) {
            Some(url) if !listed.id.is_empty() => PostEntry::Truncated { id: listed.id, url },
            _ => PostEntry::Listed(listed),
        }
    }

    fn list_fields(&self, container: ElementRef<'_>) -> ListedPost {
        let raw_id = container.value().attr("id").unwrap_or_default();
        let id = raw_id.strip_prefix(&self.id_prefix).unwrap_or(raw_id);
        let content = container.select(&self.content).next().map(|element| {
            let text = joined_text(element);
            text.strip_prefix(':').map(str::to_string).unwrap_or(text)
        });
        let created = container
            .select(&self.time)
            .next()
            .map(|element| element.text().collect::<String>().trim().to_string());

        ListedPost {
            id: id.to_string(),
            content,
            created,
        }
    }

    /// First link under `scope` whose visible text equals `marker`, resolved.
    fn find_link(&self, scope: ElementRef<'_>, marker: &str) -> Option<String> {
        scope
            .select(&self.link)
            .find(|a| a.text().collect::<String>().trim() == marker)
            .and_then(|a| a.value().attr("href"))
            .map(|href| resolve_url(&self.base_url, href))
    }
}

/// Parse a page, dropping an XML prolog some pages are served with.
fn parse_page(html: &str) -> Html {
    Html::parse_document(strip_xml_prolog(html))
}

fn strip_xml_prolog(html: &str) -> &str {
    let trimmed = html.trim_start();
    if trimmed.starts_with("<?xml") {
        if let Some(end) = trimmed.find("?>") {
            return &trimmed[end + 2..];
        }
    }
    html
}

/// Text nodes under `element`, trimmed, empties dropped, one per line.
fn joined_text(element: ElementRef<'_>) -> String {
    element
        .text()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

fn parse_selector(s: &str) -> Result<Selector> {
    Selector::parse(s).map_err(|e| AppError::selector(s, format!("{e:?}")))
}

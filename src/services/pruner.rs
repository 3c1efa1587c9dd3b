// src/services/pruner.rs

//! Corpus pruning for frequency-based rendering.
//!
//! Full-mode segmentation produces a lot of noise: stopwords, one-off words,
//! and fragments of longer words (`北京大`, `学` next to `北京大学`). Pruning runs
//! in three passes over the token stream:
//!
//! 1. drop noise tokens (stopwords and punctuation),
//! 2. drop tokens that occur exactly once,
//! 3. drop near-substrings of a longer surviving token, i.e. single
//!    characters and tokens exactly one character shorter than the longer one.
//!
//! The output keeps the original relative order and every occurrence.

use std::collections::{HashMap, HashSet};

use chrono::NaiveDateTime;

use crate::models::Post;
use crate::services::segmenter::{Segmenter, Stopwords};

/// Number of entries in the debug frequency summary.
pub const SUMMARY_SIZE: usize = 30;

/// Inclusive time window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeWindow {
    pub after: NaiveDateTime,
    pub before: NaiveDateTime,
}

impl TimeWindow {
    pub fn new(after: NaiveDateTime, before: NaiveDateTime) -> Self {
        Self { after, before }
    }

    pub fn contains(&self, at: &NaiveDateTime) -> bool {
        self.after <= *at && *at <= self.before
    }
}

/// Pruned tokens of all posts in a window.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Corpus {
    /// Surviving tokens in original order, duplicates kept
    pub tokens: Vec<String>,
    /// Posts inside the window
    pub post_count: usize,
    /// Characters of content inside the window
    pub char_count: usize,
}

impl Corpus {
    /// Tokens joined by single spaces, as renderers expect them.
    pub fn text(&self) -> String {
        self.tokens.join(" ")
    }

    /// The `n` most frequent tokens, ties in order of first occurrence.
    pub fn most_common(&self, n: usize) -> Vec<(String, usize)> {
        most_common(&self.tokens, n)
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }
}

/// Builds pruned corpora from posts.
pub struct CorpusPruner {
    segmenter: Box<dyn Segmenter>,
    stopwords: Stopwords,
}

impl CorpusPruner {
    pub fn new(segmenter: Box<dyn Segmenter>, stopwords: Stopwords) -> Self {
        Self {
            segmenter,
            stopwords,
        }
    }

    /// Segment and prune every post created inside `window`.
    pub fn build<'a>(&self, posts: impl IntoIterator<Item = &'a Post>, window: TimeWindow) -> Corpus {
        let mut corpus = Corpus::default();
        let mut tokens = Vec::new();

        for post in posts.into_iter().filter(|p| window.contains(&p.created_at)) {
            corpus.post_count += 1;
            corpus.char_count += post.content.chars().count();
            tokens.extend(
                self.segmenter
                    .segment(&post.content)
                    .into_iter()
                    .filter(|token| !self.stopwords.is_noise(token)),
            );
        }

        corpus.tokens = prune_near_substrings(prune_singletons(tokens));

        log::debug!(
            "Using {} posts with {} characters, {} words",
            corpus.post_count,
            corpus.char_count,
            corpus.tokens.len()
        );
        log::debug!("Most common: {:?}", corpus.most_common(SUMMARY_SIZE));

        corpus
    }
}

/// Drop every token that occurs exactly once.
pub fn prune_singletons(tokens: Vec<String>) -> Vec<String> {
    let singletons: HashSet<String> = count(&tokens)
        .into_iter()
        .filter(|(_, n)| *n == 1)
        .map(|(token, _)| token.to_owned())
        .collect();
    tokens
        .into_iter()
        .filter(|token| !singletons.contains(token))
        .collect()
}

/// Drop tokens that look like segmentation fragments of a longer token.
///
/// Among the distinct tokens, `t` is removed when it is a substring of a
/// longer `s` and is either a single character or exactly one character
/// shorter than `s`. Removal applies to all occurrences.
pub fn prune_near_substrings(tokens: Vec<String>) -> Vec<String> {
    let mut seen = HashSet::new();
    let distinct: Vec<(&str, usize)> = tokens
        .iter()
        .filter(|token| seen.insert(token.as_str()))
        .map(|token| (token.as_str(), token.chars().count()))
        .collect();

    let mut fragments: HashSet<String> = HashSet::new();
    for &(longer, longer_len) in &distinct {
        for &(shorter, shorter_len) in &distinct {
            if longer_len > shorter_len
                && (shorter_len == 1 || longer_len - shorter_len == 1)
                && longer.contains(shorter)
            {
                fragments.insert(shorter.to_string());
            }
        }
    }

    tokens
        .into_iter()
        .filter(|token| !fragments.contains(token))
        .collect()
}

/// The `n` most frequent tokens, ties in order of first occurrence.
pub fn most_common(tokens: &[String], n: usize) -> Vec<(String, usize)> {
    let mut order: Vec<&str> = Vec::new();
    let mut counts: HashMap<&str, usize> = HashMap::new();
    for token in tokens {
        let entry = counts.entry(token.as_str()).or_insert(0);
        if *entry == 0 {
            order.push(token);
        }
        *entry += 1;
    }

    let mut ranked: Vec<(String, usize)> = order
        .into_iter()
        .map(|token| (token.to_string(), counts[token]))
        .collect();
    ranked.sort_by(|a, b| b.1.cmp(&a.1));
    ranked.truncate(n);
    ranked
}

fn count(tokens: &[String]) -> HashMap<&str, usize> {
    let mut counts = HashMap::new();
    for token in tokens {
        *counts.entry(token.as_str()).or_insert(0) += 1;
    }
    counts
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::*;
    use crate::services::segmenter::SpanSegmenter;

    fn words(tokens: &[&str]) -> Vec<String> {
        tokens.iter().map(|t| t.to_string()).collect()
    }

    fn day(d: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2025, 3, d)
            .unwrap()
            .and_hms_opt(12, 0, 0)
            .unwrap()
    }

    /// Splits on whitespace so tests control the exact token stream.
    struct WhitespaceSegmenter;

    impl Segmenter for WhitespaceSegmenter {
        fn segment(&self, text: &str) -> Vec<String> {
            text.split_whitespace().map(String::from).collect()
        }
    }

    fn pruner() -> CorpusPruner {
        CorpusPruner::new(Box::new(WhitespaceSegmenter), Stopwords::builtin())
    }

    #[test]
    fn test_singleton_pruning() {
        let pruned = prune_singletons(words(&["苹果", "苹果", "香蕉"]));
        assert_eq!(pruned, words(&["苹果", "苹果"]));
    }

    #[test]
    fn test_singleton_pruning_keeps_order_and_repeats() {
        let pruned = prune_singletons(words(&["a", "b", "c", "a", "d", "b", "a"]));
        assert_eq!(pruned, words(&["a", "b", "a", "b", "a"]));
        assert!(prune_singletons(words(&["x", "y"])).is_empty());
    }

    #[test]
    fn test_near_substring_pruning() {
        let pruned = prune_near_substrings(words(&["北京大学", "北京大", "学", "北京大学", "学"]));
        assert_eq!(pruned, words(&["北京大学", "北京大学"]));
    }

    #[test]
    fn test_near_substring_keeps_distant_words() {
        // "北京" is two characters shorter than "北京大学" and stays
        let pruned = prune_near_substrings(words(&["北京大学", "北京", "北京大学", "北京"]));
        assert_eq!(pruned, words(&["北京大学", "北京", "北京大学", "北京"]));
    }

    #[test]
    fn test_build_filters_window_and_noise() {
        let posts = vec![
            Post::new("1", "北京大学 北京大学 的 ， 。。 天气", day(10)),
            Post::new("2", "天气 北京大 北京大", day(5)),
            Post::new("3", "北京大学 天气 天气", day(1)),
        ];
        let window = TimeWindow::new(day(5), day(10));

        let corpus = pruner().build(&posts, window);

        assert_eq!(corpus.post_count, 2);
        assert_eq!(corpus.tokens, words(&["北京大学", "北京大学", "天气", "天气"]));
        assert_eq!(
            corpus.most_common(SUMMARY_SIZE),
            vec![("北京大学".to_string(), 2), ("天气".to_string(), 2)]
        );
        assert_eq!(corpus.text(), "北京大学 北京大学 天气 天气");
    }

    #[test]
    fn test_window_is_inclusive() {
        let posts = vec![
            Post::new("1", "春天 春天", day(5)),
            Post::new("2", "夏天 夏天", day(10)),
        ];
        let corpus = pruner().build(&posts, TimeWindow::new(day(5), day(10)));
        assert_eq!(corpus.post_count, 2);
        assert_eq!(corpus.tokens.len(), 4);
    }

    #[test]
    fn test_empty_window_yields_empty_corpus() {
        let posts = vec![Post::new("1", "春天 春天", day(1))];
        let corpus = pruner().build(&posts, TimeWindow::new(day(5), day(10)));
        assert!(corpus.is_empty());
        assert_eq!(corpus.post_count, 0);
        assert_eq!(corpus.text(), "");
    }

    #[test]
    fn test_pruning_is_deterministic() {
        let posts = vec![
            Post::new("1", "我们去北京大学看樱花，北京大学的樱花很美", day(3)),
            Post::new("2", "樱花季的北京大学人很多，樱花很美", day(4)),
        ];
        let window = TimeWindow::new(day(1), day(10));
        let pruner = CorpusPruner::new(Box::new(SpanSegmenter::new(4)), Stopwords::builtin());

        let first = pruner.build(&posts, window);
        let second = pruner.build(&posts, window);

        assert!(!first.is_empty());
        assert_eq!(first.text(), second.text());
        assert!(first.tokens.iter().any(|t| t == "北京大学"));
        assert!(!first.tokens.iter().any(|t| t == "北京大"));
        assert!(!first.tokens.iter().any(|t| t.chars().count() == 1));
    }

    #[test]
    fn test_most_common_ties_keep_first_occurrence() {
        let tokens = words(&["b", "a", "c", "a", "b", "c", "c"]);
        assert_eq!(
            most_common(&tokens, 2),
            vec![("c".to_string(), 3), ("b".to_string(), 2)]
        );
        assert_eq!(most_common(&tokens, 10).len(), 3);
    }
}

// src/pipeline/generate.rs

//! Generate pipeline: record file into a pruned word-frequency corpus.

use std::path::Path;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::models::{GenerateConfig, Post};
use crate::services::{CorpusPruner, SUMMARY_SIZE, Segmenter, Stopwords, TimeWindow};
use crate::storage::read_records;
use crate::utils::failures::{FailureKind, FailureLog};

/// Corpus export handed to a renderer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CorpusExport {
    /// Pruned tokens joined by single spaces
    pub text: String,
    pub max_words: usize,
    pub post_count: usize,
    pub char_count: usize,
    /// Most frequent tokens with their counts
    pub most_common: Vec<(String, usize)>,
}

/// Segmenter for the configured dictionary.
#[cfg(feature = "jieba")]
pub fn build_segmenter(config: &GenerateConfig) -> Result<Box<dyn Segmenter>> {
    use crate::services::JiebaSegmenter;

    let segmenter = match &config.custom_dict {
        Some(path) => {
            log::debug!("Loading custom dictionary from {}", path.display());
            JiebaSegmenter::with_user_dict(path)?
        }
        None => JiebaSegmenter::new(),
    };
    Ok(Box::new(segmenter))
}

/// Segmenter for the configured dictionary.
#[cfg(not(feature = "jieba"))]
pub fn build_segmenter(config: &GenerateConfig) -> Result<Box<dyn Segmenter>> {
    use crate::services::SpanSegmenter;

    if let Some(path) = &config.custom_dict {
        log::warn!(
            "Ignoring custom dictionary {}: built without the jieba feature",
            path.display()
        );
    }
    Ok(Box::new(SpanSegmenter::new(config.max_span)))
}

/// Built-in stopwords plus the configured extra list.
pub fn build_stopwords(config: &GenerateConfig) -> Result<Stopwords> {
    let mut stopwords = Stopwords::builtin();
    if let Some(path) = &config.stopwords {
        stopwords.load_extra(path)?;
        log::debug!("Loaded extra stopwords from {}", path.display());
    }
    Ok(stopwords)
}

/// Build the corpus export for the configured window and write it.
pub async fn run_generate(config: &GenerateConfig, now: NaiveDateTime) -> Result<CorpusExport> {
    let segmenter = build_segmenter(config)?;
    run_generate_with(config, segmenter, now).await
}

/// Build and write the corpus export with an explicit segmenter.
pub async fn run_generate_with(
    config: &GenerateConfig,
    segmenter: Box<dyn Segmenter>,
    now: NaiveDateTime,
) -> Result<CorpusExport> {
    let (after, before) = config.window(now);
    log::info!(
        "Building corpus from {} ({} to {})",
        config.input.display(),
        after,
        before
    );

    let mut failures = FailureLog::new();
    let posts = read_records(&config.input, &mut failures).await?;
    let skipped = failures.count(FailureKind::RecordParse);
    if skipped > 0 {
        log::warn!("Skipped {} invalid record lines", skipped);
    }

    let pruner = CorpusPruner::new(segmenter, build_stopwords(config)?);
    let export = generate_corpus(&pruner, &posts, TimeWindow::new(after, before), config.max_words);

    if export.post_count == 0 {
        log::warn!("No posts between {} and {}", after, before);
    }
    write_export(&config.output, &export).await?;
    log::info!(
        "Corpus of {} posts written to {}",
        export.post_count,
        config.output.display()
    );
    Ok(export)
}

/// Prune the posts inside `window` into an export.
pub fn generate_corpus(
    pruner: &CorpusPruner,
    posts: &[Post],
    window: TimeWindow,
    max_words: usize,
) -> CorpusExport {
    let corpus = pruner.build(posts, window);
    CorpusExport {
        text: corpus.text(),
        max_words,
        post_count: corpus.post_count,
        char_count: corpus.char_count,
        most_common: corpus.most_common(SUMMARY_SIZE),
    }
}

async fn write_export(path: &Path, export: &CorpusExport) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            tokio::fs::create_dir_all(parent).await?;
        }
    }
    let json = serde_json::to_string_pretty(export)?;
    tokio::fs::write(path, json).await?;
    Ok(())
}

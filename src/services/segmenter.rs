// src/services/segmenter.rs

//! Word segmentation in overlapping (full) mode and the stopword set.
//!
//! Full mode emits every dictionary word found in the text, so one sentence
//! yields overlapping fragments such as `北京大学`, `北京`, `大学`. The pruner
//! relies on this and removes the redundant fragments afterwards.

use std::collections::HashSet;
use std::fs;
use std::path::Path;

use unicode_segmentation::UnicodeSegmentation;

use crate::error::Result;

/// Built-in stopword list, one word per line.
const STOPWORDS: &str = include_str!("../../data/stopwords.txt");

/// Full-width punctuation not covered by the list.
const EXTRA_PUNCTUATION: &str = "，。？《》；：”“’‘【】、——（）……￥！·「」";

/// Splits text into possibly overlapping tokens.
pub trait Segmenter: Send + Sync {
    fn segment(&self, text: &str) -> Vec<String>;
}

/// Segmenter emitting overlapping character spans of ideographic runs.
///
/// Runs of CJK ideographs yield every span of 1 to `max_span` characters,
/// ordered by start position and then by length. Words in other scripts are
/// emitted whole.
#[derive(Debug, Clone)]
pub struct SpanSegmenter {
    max_span: usize,
}

impl SpanSegmenter {
    pub fn new(max_span: usize) -> Self {
        Self {
            max_span: max_span.max(1),
        }
    }

    fn push_spans(&self, run: &[char], tokens: &mut Vec<String>) {
        for start in 0..run.len() {
            let longest = self.max_span.min(run.len() - start);
            for len in 1..=longest {
                tokens.push(run[start..start + len].iter().collect());
            }
        }
    }
}

impl Default for SpanSegmenter {
    fn default() -> Self {
        Self::new(4)
    }
}

impl Segmenter for SpanSegmenter {
    fn segment(&self, text: &str) -> Vec<String> {
        let mut tokens = Vec::new();
        let mut run: Vec<char> = Vec::new();

        for piece in text.split_word_bounds() {
            if piece.chars().all(is_ideograph) {
                run.extend(piece.chars());
                continue;
            }
            self.push_spans(&run, &mut tokens);
            run.clear();
            if piece.chars().any(char::is_alphanumeric) {
                tokens.push(piece.to_string());
            }
        }
        self.push_spans(&run, &mut tokens);

        tokens
    }
}

fn is_ideograph(c: char) -> bool {
    matches!(c,
        '\u{3400}'..='\u{4DBF}'
        | '\u{4E00}'..='\u{9FFF}'
        | '\u{F900}'..='\u{FAFF}'
        | '\u{20000}'..='\u{2FA1F}')
}

/// Dictionary-based segmenter in full mode.
#[cfg(feature = "jieba")]
pub struct JiebaSegmenter {
    jieba: jieba_rs::Jieba,
}

#[cfg(feature = "jieba")]
impl JiebaSegmenter {
    /// Segmenter with the bundled dictionary.
    pub fn new() -> Self {
        Self {
            jieba: jieba_rs::Jieba::new(),
        }
    }

    /// Segmenter with the bundled dictionary plus a user dictionary.
    ///
    /// The user dictionary uses the `word [freq] [tag]` line format.
    pub fn with_user_dict(path: &Path) -> Result<Self> {
        let mut jieba = jieba_rs::Jieba::new();
        let file = fs::File::open(path)?;
        let mut reader = std::io::BufReader::new(file);
        jieba.load_dict(&mut reader).map_err(|e| {
            crate::error::AppError::config(format!("Cannot load dictionary {path:?}: {e}"))
        })?;
        log::debug!("Loaded user dictionary from {}", path.display());
        Ok(Self { jieba })
    }
}

#[cfg(feature = "jieba")]
impl Default for JiebaSegmenter {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(feature = "jieba")]
impl Segmenter for JiebaSegmenter {
    fn segment(&self, text: &str) -> Vec<String> {
        self.jieba
            .cut_all(text)
            .into_iter()
            .map(String::from)
            .collect()
    }
}

/// Words and characters that never count as content.
#[derive(Debug, Clone, Default)]
pub struct Stopwords {
    words: HashSet<String>,
}

impl Stopwords {
    /// The built-in list plus ASCII and full-width punctuation, space and newline.
    pub fn builtin() -> Self {
        let mut stopwords = Self::default();
        stopwords.extend_lines(STOPWORDS);
        for c in EXTRA_PUNCTUATION.chars().chain(" \n".chars()) {
            stopwords.insert(c.to_string());
        }
        for c in (0u8..=127).map(char::from).filter(char::is_ascii_punctuation) {
            stopwords.insert(c.to_string());
        }
        stopwords
    }

    /// Add every non-empty line of `path`.
    pub fn load_extra(&mut self, path: &Path) -> Result<()> {
        let content = fs::read_to_string(path)?;
        self.extend_lines(&content);
        Ok(())
    }

    pub fn insert(&mut self, word: impl Into<String>) {
        self.words.insert(word.into());
    }

    pub fn contains(&self, word: &str) -> bool {
        self.words.contains(word)
    }

    /// Whether `token` carries no content.
    ///
    /// Empty tokens, stopwords, and tokens made only of stopword characters
    /// are noise.
    pub fn is_noise(&self, token: &str) -> bool {
        if token.is_empty() || self.contains(token) {
            return true;
        }
        let mut buf = [0u8; 4];
        token.chars().all(|c| self.contains(c.encode_utf8(&mut buf)))
    }

    pub fn len(&self) -> usize {
        self.words.len()
    }

    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }

    fn extend_lines(&mut self, content: &str) {
        for line in content.lines() {
            let word = line.trim_end_matches('\r');
            if !word.is_empty() {
                self.words.insert(word.to_string());
            }
        }
    }
}

// src/utils/failures.rs

//! Side-channel log for per-item failures.
//!
//! Malformed post containers, unparsable timestamps and broken record lines
//! never stop a run. They are logged, counted here, and the item is either
//! skipped or replaced by a fallback value.

use std::fmt;

/// Category of a contained failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailureKind {
    /// A post container or full-text page could not be turned into a post
    Extraction,
    /// A timestamp was replaced by the current time
    TimeParse,
    /// A stored record line was skipped
    RecordParse,
}

impl FailureKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            FailureKind::Extraction => "extraction",
            FailureKind::TimeParse => "time parse",
            FailureKind::RecordParse => "record parse",
        }
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single contained failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Failure {
    pub kind: FailureKind,
    pub message: String,
}

/// Collects contained failures while a run continues.
#[derive(Debug, Default)]
pub struct FailureLog {
    entries: Vec<Failure>,
}

impl FailureLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Log and remember a failure.
    pub fn record(&mut self, kind: FailureKind, error: impl fmt::Display) {
        let message = error.to_string();
        log::error!("[{}] {}", kind, message);
        self.entries.push(Failure { kind, message });
    }

    /// Keep the value of `result`, or record the error and yield `None`.
    pub fn keep<T, E: fmt::Display>(
        &mut self,
        kind: FailureKind,
        result: std::result::Result<T, E>,
    ) -> Option<T> {
        match result {
            Ok(value) => Some(value),
            Err(error) => {
                self.record(kind, error);
                None
            }
        }
    }

    /// Keep the value of `result`, or record the error and use `fallback`.
    pub fn recover<T, E: fmt::Display>(
        &mut self,
        kind: FailureKind,
        result: std::result::Result<T, E>,
        fallback: impl FnOnce() -> T,
    ) -> T {
        self.keep(kind, result).unwrap_or_else(fallback)
    }

    /// Number of failures of the given kind.
    pub fn count(&self, kind: FailureKind) -> usize {
        self.entries.iter().filter(|f| f.kind == kind).count()
    }

    pub fn entries(&self) -> &[Failure] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Map every item through `f`, dropping the ones that fail.
///
/// Each failure is recorded in `log` under `kind`.
pub fn filter_map_logged<'a, I, T, U, E, F>(
    items: I,
    kind: FailureKind,
    log: &'a mut FailureLog,
    mut f: F,
) -> impl Iterator<Item = U> + 'a
where
    I: IntoIterator<Item = T>,
    I::IntoIter: 'a,
    F: FnMut(T) -> std::result::Result<U, E> + 'a,
    T: 'a,
    U: 'a,
    E: fmt::Display + 'a,
{
    items
        .into_iter()
        .filter_map(move |item| log.keep(kind, f(item)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_filter_map_logged_skips_failures() {
        let mut log = FailureLog::new();
        let parsed: Vec<i32> = filter_map_logged(
            ["1", "x", "3"],
            FailureKind::RecordParse,
            &mut log,
            |s| s.parse::<i32>(),
        )
        .collect();

        assert_eq!(parsed, vec![1, 3]);
        assert_eq!(log.count(FailureKind::RecordParse), 1);
        assert_eq!(log.count(FailureKind::Extraction), 0);
    }

    #[test]
    fn test_recover_uses_fallback() {
        let mut log = FailureLog::new();
        let value = log.recover(FailureKind::TimeParse, "?".parse::<u32>(), || 7);
        assert_eq!(value, 7);
        assert_eq!(log.len(), 1);
        assert_eq!(log.entries()[0].kind, FailureKind::TimeParse);
    }

    #[test]
    fn test_keep_ok_records_nothing() {
        let mut log = FailureLog::new();
        assert_eq!(log.keep(FailureKind::Extraction, Ok::<_, String>(5)), Some(5));
        assert!(log.is_empty());
    }
}

// src/pipeline/query.rs

//! Query pipeline: stored posts within a time range.

use std::path::Path;

use crate::error::Result;
use crate::models::Post;
use crate::services::TimeWindow;
use crate::storage::{query_records, read_records};
use crate::utils::failures::FailureLog;

/// Posts in the record file at `input` created inside `window`.
///
/// A missing record file yields no posts. Invalid lines are skipped.
pub async fn run_query(input: &Path, window: TimeWindow) -> Result<Vec<Post>> {
    if !tokio::fs::try_exists(input).await? {
        log::warn!("Record file {} does not exist", input.display());
        return Ok(Vec::new());
    }

    let mut failures = FailureLog::new();
    let records = read_records(input, &mut failures).await?;
    let matched: Vec<Post> = query_records(&records, window).into_iter().cloned().collect();

    log::info!(
        "{} of {} posts between {} and {}",
        matched.len(),
        records.len(),
        window.after,
        window.before
    );
    Ok(matched)
}

#[cfg(test)]
mod tests {
    use chrono::{NaiveDate, NaiveDateTime};
    use tempfile::TempDir;

    use super::*;

    fn at(d: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2025, 1, d)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap()
    }

    #[tokio::test]
    async fn test_query_range() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("weibo.jsonl");
        let lines = [
            Post::new("3", "c", at(31)).to_record().unwrap(),
            "garbage".to_string(),
            Post::new("2", "b", at(15)).to_record().unwrap(),
            Post::new("1", "a", at(1)).to_record().unwrap(),
        ];
        std::fs::write(&path, lines.join("\n")).unwrap();

        let posts = run_query(&path, TimeWindow::new(at(1), at(15))).await.unwrap();
        let ids: Vec<&str> = posts.iter().map(|p| p.id.as_str()).collect();
        assert_eq!(ids, vec!["2", "1"]);
    }

    #[tokio::test]
    async fn test_query_missing_file_is_empty() {
        let tmp = TempDir::new().unwrap();
        let posts = run_query(&tmp.path().join("none.jsonl"), TimeWindow::new(at(1), at(2)))
            .await
            .unwrap();
        assert!(posts.is_empty());
    }
}

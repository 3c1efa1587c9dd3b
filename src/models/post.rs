// src/models/post.rs

//! Post data structure and its persisted timestamp format.

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};

/// Timestamp format of the `create_at` field in stored records.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

/// A post harvested from a profile listing.
///
/// Serializes to the one-line record format:
/// `{"id":"...","content":"...","create_at":"YYYY-MM-DDTHH:MM:SS"}`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Post {
    /// Opaque post id from the source site
    pub id: String,

    /// Post text, text nodes joined by newlines
    pub content: String,

    /// Publication time (local site time, second precision)
    #[serde(rename = "create_at", with = "timestamp")]
    pub created_at: NaiveDateTime,
}

impl Post {
    pub fn new(id: impl Into<String>, content: impl Into<String>, created_at: NaiveDateTime) -> Self {
        Self {
            id: id.into(),
            content: content.into(),
            created_at,
        }
    }

    /// Serialize as a single JSON line (without the trailing newline).
    pub fn to_record(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// Parse a single JSON line.
    pub fn from_record(line: &str) -> Result<Self> {
        Ok(serde_json::from_str(line)?)
    }
}

/// Format a timestamp in the record format.
pub fn format_timestamp(value: &NaiveDateTime) -> String {
    value.format(TIMESTAMP_FORMAT).to_string()
}

/// Parse a timestamp given on the command line or in the config file.
///
/// Accepts `YYYY-MM-DDTHH:MM:SS`, `YYYY-MM-DD HH:MM:SS` and `YYYY-MM-DD`
/// (midnight).
pub fn parse_timestamp(value: &str) -> Result<NaiveDateTime> {
    let value = value.trim();
    NaiveDateTime::parse_from_str(value, TIMESTAMP_FORMAT)
        .or_else(|_| NaiveDateTime::parse_from_str(value, "%Y-%m-%d %H:%M:%S"))
        .or_else(|_| {
            NaiveDate::parse_from_str(value, "%Y-%m-%d")
                .map(|date| date.and_hms_opt(0, 0, 0).unwrap_or_default())
        })
        .map_err(|e| AppError::validation(format!("Invalid timestamp '{value}': {e}")))
}

/// Serde adapter for the record timestamp format.
pub mod timestamp {
    use chrono::NaiveDateTime;
    use serde::{Deserialize, Deserializer, Serializer, de::Error};

    use super::TIMESTAMP_FORMAT;

    pub fn serialize<S: Serializer>(value: &NaiveDateTime, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(&value.format(TIMESTAMP_FORMAT))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<NaiveDateTime, D::Error> {
        let raw = String::deserialize(deserializer)?;
        NaiveDateTime::parse_from_str(&raw, TIMESTAMP_FORMAT).map_err(D::Error::custom)
    }
}

/// Serde adapter for optional timestamps in config files.
pub mod timestamp_opt {
    use chrono::NaiveDateTime;
    use serde::{Deserialize, Deserializer, Serializer, de::Error};

    use super::{format_timestamp, parse_timestamp};

    pub fn serialize<S: Serializer>(
        value: &Option<NaiveDateTime>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        match value {
            Some(value) => serializer.serialize_some(&format_timestamp(value)),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<NaiveDateTime>, D::Error> {
        match Option::<String>::deserialize(deserializer)? {
            Some(raw) => parse_timestamp(&raw).map(Some).map_err(D::Error::custom),
            None => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(y: i32, mo: u32, d: u32, h: u32, mi: u32, s: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, mo, d)
            .unwrap()
            .and_hms_opt(h, mi, s)
            .unwrap()
    }

    #[test]
    fn test_record_format() {
        let post = Post::new("N1a2B3", "今天天气很好", at(2024, 1, 10, 12, 34, 56));
        let line = post.to_record().unwrap();
        assert_eq!(
            line,
            r#"{"id":"N1a2B3","content":"今天天气很好","create_at":"2024-01-10T12:34:56"}"#
        );
    }

    #[test]
    fn test_record_round_trip_keeps_non_ascii() {
        let post = Post::new("x", "第一行\n第二行 \"引号\" 😀", at(2025, 3, 5, 10, 20, 0));
        let line = post.to_record().unwrap();
        assert!(!line.contains('\n'));
        assert!(line.contains("😀"));

        let parsed = Post::from_record(&line).unwrap();
        assert_eq!(parsed, post);
        assert_eq!(parsed.to_record().unwrap(), line);
    }

    #[test]
    fn test_record_missing_field_is_error() {
        assert!(Post::from_record(r#"{"id":"1","content":"a"}"#).is_err());
        assert!(Post::from_record(r#"{"id":"1","content":"a","create_at":"2024-01-10"}"#).is_err());
        assert!(Post::from_record("not json").is_err());
    }

    #[test]
    fn test_parse_timestamp_shapes() {
        let expected = at(2025, 1, 1, 8, 0, 0);
        assert_eq!(parse_timestamp("2025-01-01T08:00:00").unwrap(), expected);
        assert_eq!(parse_timestamp("2025-01-01 08:00:00").unwrap(), expected);
        assert_eq!(parse_timestamp("2025-01-01").unwrap(), at(2025, 1, 1, 0, 0, 0));
        assert!(parse_timestamp("01/01/2025").is_err());
    }
}

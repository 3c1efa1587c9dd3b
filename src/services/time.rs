// src/services/time.rs

//! Create time normalization.
//!
//! Listing pages print post times in three shapes:
//!
//! - `今天 HH:MM[:SS]` for posts from today,
//! - `MM月DD日 HH:MM[:SS]` for posts from this year,
//! - `YYYY-MM-DD HH:MM[:SS]` for everything else.
//!
//! Anything after the clock time (e.g. `来自iPhone客户端`) is ignored.

use std::sync::Arc;

use chrono::{Datelike, Local, NaiveDate, NaiveDateTime};
use regex::{Captures, Regex};

use crate::error::{AppError, Result};
use crate::utils::failures::{FailureKind, FailureLog};

const CREATE_TIME_PATTERN: &str = r"^(?:今天|(?P<month>[0-9]{2})月(?P<day>[0-9]{2})日|(?P<year>[0-9]{4})-(?P<ymonth>[0-9]{2})-(?P<yday>[0-9]{2}))\s(?P<hour>[0-9]{2}):(?P<minute>[0-9]{2})(?::(?P<second>[0-9]{2}))?";

/// Source of the current local time.
pub trait Clock: Send + Sync {
    fn now(&self) -> NaiveDateTime;
}

/// Wall clock in the local timezone.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> NaiveDateTime {
        Local::now().naive_local()
    }
}

/// A clock stopped at a fixed moment.
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub NaiveDateTime);

impl Clock for FixedClock {
    fn now(&self) -> NaiveDateTime {
        self.0
    }
}

/// Parses listing create times into local timestamps.
#[derive(Clone)]
pub struct TimeNormalizer {
    pattern: Regex,
    clock: Arc<dyn Clock>,
}

impl TimeNormalizer {
    pub fn new(clock: Arc<dyn Clock>) -> Result<Self> {
        let pattern = Regex::new(CREATE_TIME_PATTERN)
            .map_err(|e| AppError::config(format!("create time pattern: {e}")))?;
        Ok(Self { pattern, clock })
    }

    /// Current time according to the injected clock.
    pub fn now(&self) -> NaiveDateTime {
        self.clock.now()
    }

    /// Parse `raw`, failing on unknown shapes and impossible dates.
    ///
    /// A missing year is taken from the current year at call time, not from
    /// the post. Posts crawled right after New Year may land in the wrong year.
    pub fn parse(&self, raw: &str) -> Result<NaiveDateTime> {
        let raw = raw.trim();
        let caps = self
            .pattern
            .captures(raw)
            .ok_or_else(|| AppError::TimeParse(raw.to_string()))?;
        let now = self.now();

        let year = number(&caps, "year").map_or(Some(now.year()), |y| i32::try_from(y).ok());
        let month = number(&caps, "ymonth")
            .or_else(|| number(&caps, "month"))
            .unwrap_or(now.month());
        let day = number(&caps, "yday")
            .or_else(|| number(&caps, "day"))
            .unwrap_or(now.day());
        let hour = number(&caps, "hour").unwrap_or(0);
        let minute = number(&caps, "minute").unwrap_or(0);
        let second = number(&caps, "second").unwrap_or(0);

        year.and_then(|year| NaiveDate::from_ymd_opt(year, month, day))
            .and_then(|date| date.and_hms_opt(hour, minute, second))
            .ok_or_else(|| AppError::TimeParse(raw.to_string()))
    }

    /// Parse `raw`, falling back to the current time.
    ///
    /// The fallback is recorded as a time parse failure; it is never raised.
    pub fn normalize(&self, raw: &str, failures: &mut FailureLog) -> NaiveDateTime {
        failures.recover(FailureKind::TimeParse, self.parse(raw), || {
            log::warn!("Using current time for unparsable create time '{}'", raw.trim());
            self.now()
        })
    }
}

fn number(caps: &Captures<'_>, name: &str) -> Option<u32> {
    caps.name(name).and_then(|m| m.as_str().parse().ok())
}

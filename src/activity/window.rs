use crate::error::{Result, WeeklyUpdatesError};
use chrono::{DateTime, Datelike, Duration, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Utc};

/// Inclusive date range over which activity is collected
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActivityWindow {
    /// Start (inclusive)
    pub since: DateTime<Utc>,
    /// End (inclusive)
    pub until: DateTime<Utc>,
}

/// Which end of the window a user-supplied date describes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Bound {
    Start,
    End,
}

impl ActivityWindow {
    /// Create a window, rejecting `since > until`
    pub fn new(since: DateTime<Utc>, until: DateTime<Utc>) -> Result<Self> {
        if since > until {
            return Err(WeeklyUpdatesError::InvalidWindow(format!(
                "since ({}) is after until ({})",
                since.to_rfc3339(),
                until.to_rfc3339()
            )));
        }
        Ok(Self { since, until })
    }

    /// Build a window from optional CLI/config text, falling back to the defaults
    pub fn resolve(since: Option<&str>, until: Option<&str>, now: DateTime<Utc>) -> Result<Self> {
        let since = match since {
            Some(text) => parse_datetime(text, Bound::Start)?,
            None => default_since(now),
        };
        let until = match until {
            Some(text) => parse_datetime(text, Bound::End)?,
            None => now,
        };
        Self::new(since, until)
    }

    /// Check if a timestamp falls within the window
    pub fn contains(&self, timestamp: &DateTime<Utc>) -> bool {
        timestamp >= &self.since && timestamp <= &self.until
    }

    /// Search qualifier range, e.g. `2025-06-01..2025-06-07`
    pub fn search_range(&self) -> String {
        format!(
            "{}..{}",
            self.since.format("%Y-%m-%d"),
            self.until.format("%Y-%m-%d")
        )
    }

    /// File stem used when publishing, e.g. `2025-06-01-to-2025-06-07`
    pub fn file_stem(&self) -> String {
        format!(
            "{}-to-{}",
            self.since.format("%Y-%m-%d"),
            self.until.format("%Y-%m-%d")
        )
    }

    /// Human readable period
    pub fn label(&self) -> String {
        format!(
            "{} → {}",
            self.since.format("%Y-%m-%d"),
            self.until.format("%Y-%m-%d")
        )
    }
}

/// Monday of the previous week at 00:00 UTC, so at least a full week is covered
pub fn default_since(now: DateTime<Utc>) -> DateTime<Utc> {
    let days_since_monday = now.weekday().num_days_from_monday() as i64;
    let monday = now.date_naive() - Duration::days(days_since_monday + 7);
    Utc.from_utc_datetime(&monday.and_time(NaiveTime::MIN))
}

/// Parse an RFC 3339 timestamp, a naive `YYYY-MM-DDTHH:MM:SS` (UTC) or a bare date.
///
/// A bare date expands to the start or the end of that day depending on `bound`.
pub fn parse_datetime(text: &str, bound: Bound) -> Result<DateTime<Utc>> {
    let text = text.trim();

    if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
        return Ok(dt.with_timezone(&Utc));
    }

    for format in ["%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(text, format) {
            return Ok(Utc.from_utc_datetime(&naive));
        }
    }

    if let Ok(date) = NaiveDate::parse_from_str(text, "%Y-%m-%d") {
        let time = match bound {
            Bound::Start => NaiveTime::MIN,
            Bound::End => NaiveTime::from_hms_opt(23, 59, 59).unwrap_or(NaiveTime::MIN),
        };
        return Ok(Utc.from_utc_datetime(&date.and_time(time)));
    }

    Err(WeeklyUpdatesError::InvalidWindow(format!(
        "cannot parse '{}' as a date (expected YYYY-MM-DD or ISO 8601)",
        text
    )))
}

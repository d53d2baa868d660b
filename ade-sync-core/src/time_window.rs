//! Time window bounding a sync run.

use std::fmt;

use chrono::{DateTime, Duration, NaiveDate, Utc};

use crate::constants::{DEFAULT_FUTURE_DAYS, DEFAULT_PAST_DAYS};
use crate::error::{CoreResult, SyncError};

/// Half-open interval `[start, end)` of instants to synchronize.
///
/// Both the source snapshot and the destination listing are restricted to the
/// same window, so events outside of it are never created or deleted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeWindow {
    start: DateTime<Utc>,
    end: DateTime<Utc>,
}

impl Default for TimeWindow {
    /// Default window: DEFAULT_PAST_DAYS before now to DEFAULT_FUTURE_DAYS after.
    fn default() -> Self {
        Self::around(Utc::now(), DEFAULT_PAST_DAYS, DEFAULT_FUTURE_DAYS)
    }
}

impl fmt::Display for TimeWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} → {}", self.start.to_rfc3339(), self.end.to_rfc3339())
    }
}

impl TimeWindow {
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> CoreResult<Self> {
        if start >= end {
            return Err(SyncError::config(
                "window",
                format!("start {} is not before end {}", start, end),
            ));
        }
        Ok(TimeWindow { start, end })
    }

    /// Window spanning `past_days` before and `future_days` after `now`.
    pub fn around(now: DateTime<Utc>, past_days: i64, future_days: i64) -> Self {
        TimeWindow {
            start: now - Duration::days(past_days.max(0)),
            end: now + Duration::days(future_days.max(0)),
        }
    }

    /// Build a window from optional YYYY-MM-DD bounds.
    ///
    /// `from` is taken as the start of that day, `to` as the end of that day.
    /// Missing bounds fall back to the given day counts around now.
    pub fn from_args(
        from: Option<&str>,
        to: Option<&str>,
        past_days: i64,
        future_days: i64,
    ) -> CoreResult<Self> {
        let fallback = Self::around(Utc::now(), past_days, future_days);

        let start = match from {
            Some(s) => parse_date(s, "from")?
                .and_hms_opt(0, 0, 0)
                .map(|dt| dt.and_utc())
                .unwrap_or(fallback.start),
            None => fallback.start,
        };

        let end = match to {
            Some(s) => parse_date(s, "to")?
                .succ_opt()
                .and_then(|next| next.and_hms_opt(0, 0, 0))
                .map(|dt| dt.and_utc())
                .unwrap_or(fallback.end),
            None => fallback.end,
        };

        Self::new(start, end)
    }

    pub fn start(&self) -> DateTime<Utc> {
        self.start
    }

    pub fn end(&self) -> DateTime<Utc> {
        self.end
    }

    /// Whether an event spanning `[start, end)` overlaps this window.
    pub fn overlaps(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> bool {
        start < self.end && end > self.start
    }
}

fn parse_date(s: &str, field: &str) -> CoreResult<NaiveDate> {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").map_err(|_| {
        SyncError::config(field, format!("invalid date '{}', expected YYYY-MM-DD", s))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_rejects_empty_window() {
        let t = Utc.with_ymd_and_hms(2025, 9, 1, 8, 0, 0).unwrap();
        assert!(TimeWindow::new(t, t).is_err());
    }

    #[test]
    fn test_from_args_covers_whole_days() {
        let window = TimeWindow::from_args(Some("2025-09-01"), Some("2025-09-30"), 7, 120).unwrap();
        assert_eq!(window.start(), Utc.with_ymd_and_hms(2025, 9, 1, 0, 0, 0).unwrap());
        assert_eq!(window.end(), Utc.with_ymd_and_hms(2025, 10, 1, 0, 0, 0).unwrap());
    }

    #[test]
    fn test_from_args_invalid_date() {
        let err = TimeWindow::from_args(Some("01/09/2025"), None, 7, 120).unwrap_err();
        assert!(matches!(err, SyncError::ConfigInvalid { ref field, .. } if field == "from"));
    }

    #[test]
    fn test_overlaps_is_half_open() {
        let window = TimeWindow::new(
            Utc.with_ymd_and_hms(2025, 9, 1, 0, 0, 0).unwrap(),
            Utc.with_ymd_and_hms(2025, 9, 2, 0, 0, 0).unwrap(),
        )
        .unwrap();

        let before = Utc.with_ymd_and_hms(2025, 8, 31, 23, 0, 0).unwrap();
        let midnight = Utc.with_ymd_and_hms(2025, 9, 1, 0, 0, 0).unwrap();
        let next_day = Utc.with_ymd_and_hms(2025, 9, 2, 0, 0, 0).unwrap();

        assert!(!window.overlaps(before, midnight));
        assert!(window.overlaps(before, next_day));
        assert!(!window.overlaps(next_day, next_day + Duration::hours(1)));
    }
}

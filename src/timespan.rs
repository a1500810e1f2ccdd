//! Time windows used to scope queries.

use crate::error::{Error, Result};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A start/end time window in UTC
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeSpan {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl TimeSpan {
    /// Create from explicit start and end
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Result<Self> {
        if start > end {
            return Err(Error::InvalidTimespan(format!(
                "start {} is after end {}",
                start, end
            )));
        }
        Ok(Self { start, end })
    }

    /// Window of `period` ending at `end`
    pub fn ending_at(end: DateTime<Utc>, period: Duration) -> Result<Self> {
        let start = end.checked_sub_signed(period).ok_or_else(|| {
            Error::InvalidTimespan(format!("period of {} is out of range", period))
        })?;
        Self::new(start, end)
    }

    /// Window of `period` ending now
    pub fn last(period: Duration) -> Result<Self> {
        Self::ending_at(Utc::now(), period)
    }

    /// Window ending now whose length is given by a period string such as `"1d"`
    pub fn from_period(period: &str) -> Result<Self> {
        Self::last(parse_period(period)?)
    }

    /// Build from any combination of start, end and period.
    ///
    /// At least one of `start` or `period` must be present; a missing `end`
    /// means now.
    pub fn from_parts(
        start: Option<DateTime<Utc>>,
        end: Option<DateTime<Utc>>,
        period: Option<Duration>,
    ) -> Result<Self> {
        let end = end.unwrap_or_else(Utc::now);
        match (start, period) {
            (Some(start), _) => Self::new(start, end),
            (None, Some(period)) => Self::ending_at(end, period),
            (None, None) => Err(Error::InvalidTimespan(
                "at least one of 'start' or 'period' must be specified".to_string(),
            )),
        }
    }

    /// Length of the window
    pub fn period(&self) -> Duration {
        self.end - self.start
    }
}

impl Default for TimeSpan {
    fn default() -> Self {
        let end = Utc::now();
        Self {
            start: end - Duration::days(1),
            end,
        }
    }
}

impl fmt::Display for TimeSpan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} to {}",
            self.start.format("%Y-%m-%d %H:%M:%S"),
            self.end.format("%Y-%m-%d %H:%M:%S")
        )
    }
}

/// Parse a period such as `30m`, `12h`, `1d` or `2w`
pub fn parse_period(text: &str) -> Result<Duration> {
    let text = text.trim();
    let invalid = || Error::InvalidTimespan(format!("cannot parse period '{}'", text));

    let unit_pos = text
        .find(|c: char| !c.is_ascii_digit())
        .ok_or_else(invalid)?;
    let (count, unit) = text.split_at(unit_pos);
    let count: i64 = count.parse().map_err(|_| invalid())?;

    let duration = match unit.trim().to_ascii_lowercase().as_str() {
        "s" => Duration::try_seconds(count),
        "m" | "min" => Duration::try_minutes(count),
        "h" => Duration::try_hours(count),
        "d" => Duration::try_days(count),
        "w" => Duration::try_weeks(count),
        _ => return Err(invalid()),
    };
    duration.ok_or_else(|| Error::InvalidTimespan(format!("period '{}' is out of range", text)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn ts(hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, hour, 0, 0).unwrap()
    }

    #[test]
    fn test_parse_period_units() {
        assert_eq!(parse_period("30m").unwrap(), Duration::minutes(30));
        assert_eq!(parse_period("12H").unwrap(), Duration::hours(12));
        assert_eq!(parse_period("1d").unwrap(), Duration::days(1));
        assert_eq!(parse_period("2w").unwrap(), Duration::weeks(2));
    }

    #[test]
    fn test_parse_period_invalid() {
        assert!(parse_period("d").is_err());
        assert!(parse_period("12").is_err());
        assert!(parse_period("3y").is_err());
    }

    #[test]
    fn test_oversized_periods_rejected() {
        // parses, but reaches back past the earliest representable date
        assert!(parse_period("1000000000d").is_ok());
        assert!(matches!(
            TimeSpan::from_period("1000000000d"),
            Err(Error::InvalidTimespan(_))
        ));
        // too large for a duration at all
        assert!(matches!(
            parse_period("200000000000d"),
            Err(Error::InvalidTimespan(_))
        ));
        assert!(matches!(
            TimeSpan::from_period("200000000000d"),
            Err(Error::InvalidTimespan(_))
        ));
        assert!(TimeSpan::from_parts(None, Some(ts(1)), Some(Duration::MAX)).is_err());
    }

    #[test]
    fn test_from_parts_start_end() {
        let span = TimeSpan::from_parts(Some(ts(1)), Some(ts(5)), None).unwrap();
        assert_eq!(span.period(), Duration::hours(4));
    }

    #[test]
    fn test_from_parts_period() {
        let span = TimeSpan::from_parts(None, Some(ts(10)), Some(Duration::hours(2))).unwrap();
        assert_eq!(span.start, ts(8));
    }

    #[test]
    fn test_from_parts_requires_start_or_period() {
        assert!(TimeSpan::from_parts(None, Some(ts(10)), None).is_err());
    }

    #[test]
    fn test_start_after_end_rejected() {
        assert!(TimeSpan::new(ts(5), ts(1)).is_err());
    }

    #[test]
    fn test_default_is_one_day() {
        assert_eq!(TimeSpan::default().period(), Duration::days(1));
    }
}

//! Report intervals and date ranges.

use std::str::FromStr;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{ReportError, Result};

/// Length of the range used when the caller gives no start date.
pub const DEFAULT_RANGE_DAYS: i64 = 30;

/// Bucket width for time series.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReportInterval {
    #[default]
    Day,
    Week,
    Month,
}

impl ReportInterval {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReportInterval::Day => "day",
            ReportInterval::Week => "week",
            ReportInterval::Month => "month",
        }
    }

    fn format(&self) -> &'static str {
        match self {
            ReportInterval::Day => "%Y-%m-%d",
            ReportInterval::Week => "%G-W%V",
            ReportInterval::Month => "%Y-%m",
        }
    }

    /// The bucket key a timestamp falls into. Keys sort chronologically.
    pub fn period_key(&self, at: DateTime<Utc>) -> String {
        at.format(self.format()).to_string()
    }
}

impl FromStr for ReportInterval {
    type Err = ReportError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "day" => Ok(ReportInterval::Day),
            "week" => Ok(ReportInterval::Week),
            "month" => Ok(ReportInterval::Month),
            _ => Err(ReportError::InvalidInterval(s.to_string())),
        }
    }
}

impl std::fmt::Display for ReportInterval {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Inclusive time range of a report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ReportRange {
    pub from: DateTime<Utc>,
    pub to: DateTime<Utc>,
}

impl ReportRange {
    /// Fills in missing bounds: `to` defaults to `now`, `from` to
    /// [`DEFAULT_RANGE_DAYS`] before `to`.
    pub fn resolve(
        from: Option<DateTime<Utc>>,
        to: Option<DateTime<Utc>>,
        now: DateTime<Utc>,
    ) -> Result<Self> {
        let to = to.unwrap_or(now);
        let from = from.unwrap_or(to - Duration::days(DEFAULT_RANGE_DAYS));
        if from > to {
            return Err(ReportError::InvalidRange { from, to });
        }
        Ok(Self { from, to })
    }
}

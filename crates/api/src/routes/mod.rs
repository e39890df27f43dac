//! Route handlers grouped by resource.

pub mod admin_orders;
pub mod cart;
pub mod health;
pub mod inventory;
pub mod metrics;
pub mod orders;
pub mod products;
pub mod reports;
pub mod users;

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};

use crate::error::ApiError;

/// Fallback for unknown routes.
pub async fn not_found() -> ApiError {
    ApiError::NotFound("route not found".to_string())
}

/// Which end of a range a date-only value stands for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Bound {
    Start,
    End,
}

/// Parses an RFC 3339 timestamp or a `YYYY-MM-DD` date.
///
/// A bare date covers the whole day: the start bound is midnight and the
/// end bound the last millisecond.
pub(crate) fn parse_date(
    field: &str,
    raw: Option<&str>,
    bound: Bound,
) -> Result<Option<DateTime<Utc>>, ApiError> {
    let Some(raw) = raw.map(str::trim).filter(|s| !s.is_empty()) else {
        return Ok(None);
    };
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Ok(Some(ts.with_timezone(&Utc)));
    }
    let date = NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .map_err(|_| ApiError::BadRequest(format!("invalid '{field}' date: {raw}")))?;
    let time = match bound {
        Bound::Start => NaiveTime::MIN,
        Bound::End => NaiveTime::from_hms_milli_opt(23, 59, 59, 999).unwrap_or(NaiveTime::MIN),
    };
    Ok(Some(date.and_time(time).and_utc()))
}

//! Human-readable order and tracking numbers.

use chrono::{DateTime, Utc};
use rand::Rng;

/// `GF` + two-digit year, month, day + four random digits, e.g. `GF2403070042`.
pub fn order_number(now: DateTime<Utc>) -> String {
    let suffix: u32 = rand::thread_rng().gen_range(0..10_000);
    format!("GF{}{suffix:04}", now.format("%y%m%d"))
}

/// `GF` + last eight digits of the millisecond timestamp + three random digits.
pub fn tracking_number(now: DateTime<Utc>) -> String {
    let millis = now.timestamp_millis().rem_euclid(100_000_000);
    let suffix: u32 = rand::thread_rng().gen_range(0..1_000);
    format!("GF{millis:08}{suffix:03}")
}

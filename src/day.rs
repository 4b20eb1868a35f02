// src/day.rs
use chrono::{DateTime, Duration, Utc};

/// Length of an accounting day
pub const SECONDS_IN_DAY: i64 = 86_400;

/// Midnight UTC at or before `timestamp`.
pub fn day_start(timestamp: i64) -> i64 {
    timestamp.div_euclid(SECONDS_IN_DAY) * SECONDS_IN_DAY
}

/// Start of the most recent day that has fully elapsed at `now`.
pub fn last_complete_day(now: DateTime<Utc>) -> i64 {
    day_start(now.timestamp()) - SECONDS_IN_DAY
}

/// Day boundaries from `first` to `last`, both included.
pub fn days_between(first: i64, last: i64) -> Vec<i64> {
    let first = day_start(first);
    let last = day_start(last);
    (0..)
        .map(|i| first + i * SECONDS_IN_DAY)
        .take_while(|day| *day <= last)
        .collect()
}

/// Next UTC midnight strictly after `now`.
pub fn next_midnight(now: DateTime<Utc>) -> DateTime<Utc> {
    let next = day_start(now.timestamp()) + SECONDS_IN_DAY;
    DateTime::from_timestamp(next, 0).unwrap_or(now + Duration::days(1))
}

/// `YYYY-MM-DD` label for logs.
pub fn label(day: i64) -> String {
    DateTime::from_timestamp(day, 0)
        .map(|dt| dt.format("%Y-%m-%d").to_string())
        .unwrap_or_else(|| day.to_string())
}

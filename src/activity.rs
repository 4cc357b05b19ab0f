use chrono::{DateTime, Duration, Utc};
use serde::Serialize;

/// Lookback window for considering a blog active.
pub const ACTIVITY_WINDOW_DAYS: i64 = 14;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ActivityStatus {
    Active,
    Inactive,
}

/// Classify a blog from its last post timestamp against the current time.
pub fn classify(last_posted: Option<DateTime<Utc>>) -> ActivityStatus {
    classify_at(last_posted, Utc::now())
}

/// Pure form of [`classify`]: Active iff `last_posted` is strictly after
/// `now - 14 days`.
pub fn classify_at(last_posted: Option<DateTime<Utc>>, now: DateTime<Utc>) -> ActivityStatus {
    match last_posted {
        Some(instant) if instant > now - Duration::days(ACTIVITY_WINDOW_DAYS) => {
            ActivityStatus::Active
        }
        _ => ActivityStatus::Inactive,
    }
}

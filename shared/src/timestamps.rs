//! Display conversions for every timestamp the dashboard renders.
//!
//! Missing values never raise; they render as a placeholder instead.

use chrono::{DateTime, Utc};

/// Placeholder used by request views.
pub const PLACEHOLDER: &str = "—";
/// Placeholder used by audit and map views.
pub const NOT_AVAILABLE: &str = "N/A";

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M UTC";
const DATE_FORMAT: &str = "%Y-%m-%d";

pub fn display_timestamp(ts: Option<DateTime<Utc>>) -> String {
    display_timestamp_or(ts, PLACEHOLDER)
}

pub fn display_timestamp_or(ts: Option<DateTime<Utc>>, placeholder: &str) -> String {
    ts.map_or_else(
        || placeholder.to_string(),
        |ts| ts.format(TIMESTAMP_FORMAT).to_string(),
    )
}

pub fn display_date(ts: Option<DateTime<Utc>>) -> String {
    ts.map_or_else(
        || NOT_AVAILABLE.to_string(),
        |ts| ts.format(DATE_FORMAT).to_string(),
    )
}

/// Remaining time until `estimated`, formatted as `"{h}h {m}m"` or `"{m}m"`.
pub fn time_remaining(estimated: Option<DateTime<Utc>>, now: DateTime<Utc>) -> String {
    let Some(estimated) = estimated else {
        return NOT_AVAILABLE.to_string();
    };

    let remaining = estimated - now;
    if remaining <= chrono::TimeDelta::zero() {
        return "Overdue".to_string();
    }

    let hours = remaining.num_hours();
    let minutes = remaining.num_minutes() % 60;
    if hours > 0 {
        format!("{hours}h {minutes}m")
    } else {
        format!("{minutes}m")
    }
}

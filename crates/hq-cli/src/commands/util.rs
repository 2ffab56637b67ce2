//! Shared utilities for CLI commands.

use std::sync::LazyLock;

use anyhow::Context;
use chrono::{Duration, NaiveDateTime, NaiveTime};
use hq_core::Fact;
use regex::Regex;

/// Pre-compiled regex for relative time parsing.
static RELATIVE_TIME_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\d+)\s+(minute|hour|day|week)s?\s+ago$").unwrap());

/// Conservative bounds for relative time parsing (~1000 years in minutes).
const MAX_RELATIVE_MINUTES: i64 = 1000 * 365 * 24 * 60;

const LOCAL_FORMATS: [&str; 4] = [
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M",
];

/// Parse a local time argument relative to `now`.
///
/// Supports:
/// - Local datetime: "2026-01-15T10:30", "2026-01-15 10:30:00"
/// - Time of day, today: "10:30"
/// - Relative: "2 hours ago", "30 minutes ago", "1 day ago", "1 week ago"
pub fn parse_time(s: &str, now: NaiveDateTime) -> anyhow::Result<NaiveDateTime> {
    let s = s.trim();
    for format in LOCAL_FORMATS {
        if let Ok(parsed) = NaiveDateTime::parse_from_str(s, format) {
            return Ok(parsed);
        }
    }

    if let Ok(time) = NaiveTime::parse_from_str(s, "%H:%M") {
        return Ok(now.date().and_time(time));
    }

    let Some(caps) = RELATIVE_TIME_RE.captures(s) else {
        anyhow::bail!(
            "Invalid time: {s}. Use a local datetime (e.g., 2026-01-15T10:30), \
             a time of day (e.g., 10:30) or relative (e.g., '2 hours ago')"
        );
    };

    let n: i64 = caps[1]
        .parse()
        .context("failed to parse number in relative time")?;

    let (max_for_unit, minutes_per_unit) = match &caps[2] {
        "minute" => (MAX_RELATIVE_MINUTES, 1),
        "hour" => (MAX_RELATIVE_MINUTES / 60, 60),
        "day" => (MAX_RELATIVE_MINUTES / (60 * 24), 60 * 24),
        "week" => (MAX_RELATIVE_MINUTES / (60 * 24 * 7), 60 * 24 * 7),
        unit => anyhow::bail!("Unknown time unit: {unit}"),
    };

    if n > max_for_unit {
        anyhow::bail!("Relative time value too large: {n} {}", &caps[2]);
    }

    Ok(now - Duration::minutes(n * minutes_per_unit))
}

/// Parses an optional time argument.
pub fn parse_optional_time(
    s: Option<&str>,
    now: NaiveDateTime,
) -> anyhow::Result<Option<NaiveDateTime>> {
    s.map(|s| parse_time(s, now)).transpose()
}

/// Formats a duration as hours and minutes, e.g. "1h 5m".
pub fn format_duration(duration: Duration) -> String {
    let total_minutes = duration.num_minutes().max(0);
    let hours = total_minutes / 60;
    let minutes = total_minutes % 60;

    if hours >= 1 {
        format!("{hours}h {minutes}m")
    } else {
        format!("{minutes}m")
    }
}

/// `activity@category`, or just the activity when uncategorised.
pub fn fact_label(fact: &Fact) -> String {
    match &fact.category {
        Some(category) => format!("{}@{category}", fact.activity),
        None => fact.activity.to_string(),
    }
}

/// `HH:MM-HH:MM`, open-ended while the fact is tracked.
pub fn fact_span(fact: &Fact) -> String {
    let start = fact.start.format("%H:%M");
    match fact.end {
        Some(end) => format!("{start}-{}", end.format("%H:%M")),
        None => format!("{start}-"),
    }
}

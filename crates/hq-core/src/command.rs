//! Raw fact command parsing.
//!
//! Grammar: `[HH:MM[-HH:MM] ]<activity>[@<category>][,<description>]`.
//!
//! A comma without any `@` introduces a description for an uncategorised
//! activity, so `"lunch, with team"` is activity `lunch` with description
//! `with team` rather than an activity named `"lunch, with team"`.

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};

use crate::fact::optional_text;
use crate::types::{ActivityName, CategoryName, ValidationError};

/// The pieces of a fact described by a raw command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawFact {
    /// Start given by a leading time token.
    pub start: Option<NaiveDateTime>,
    /// End given by a leading `HH:MM-HH:MM` token.
    pub end: Option<NaiveDateTime>,
    pub activity: ActivityName,
    pub category: Option<CategoryName>,
    pub description: Option<String>,
}

/// Parses a raw command. Times in a leading time token are placed on `today`.
pub fn parse_raw_fact(raw: &str, today: NaiveDate) -> Result<RawFact, ValidationError> {
    let raw = raw.trim();
    let (start, end, body) = split_time_prefix(raw, today)?;

    let (activity, category, description) = match body.split_once('@') {
        Some((activity, rest)) => match rest.split_once(',') {
            Some((category, description)) => (activity, category, description),
            None => (activity, rest, ""),
        },
        None => match body.split_once(',') {
            Some((activity, description)) => (activity, "", description),
            None => (body, "", ""),
        },
    };

    Ok(RawFact {
        start,
        end,
        activity: ActivityName::new(activity)?,
        category: CategoryName::optional(category),
        description: optional_text(description),
    })
}

type TimePrefix<'a> = (Option<NaiveDateTime>, Option<NaiveDateTime>, &'a str);

fn split_time_prefix(raw: &str, today: NaiveDate) -> Result<TimePrefix<'_>, ValidationError> {
    let (token, rest) = raw.split_once(char::is_whitespace).unwrap_or((raw, ""));
    if !looks_like_time(token) {
        return Ok((None, None, raw));
    }

    let (start, end) = match token.split_once('-') {
        Some((start, end)) => (parse_clock(start)?, Some(parse_clock(end)?)),
        None => (parse_clock(token)?, None),
    };
    Ok((
        Some(today.and_time(start)),
        end.map(|end| today.and_time(end)),
        rest.trim_start(),
    ))
}

fn looks_like_time(token: &str) -> bool {
    token.starts_with(|c: char| c.is_ascii_digit())
        && token.contains(':')
        && token
            .chars()
            .all(|c| c.is_ascii_digit() || c == ':' || c == '-')
}

fn parse_clock(value: &str) -> Result<NaiveTime, ValidationError> {
    NaiveTime::parse_from_str(value, "%H:%M").map_err(|_| ValidationError::InvalidTime {
        value: value.to_string(),
    })
}

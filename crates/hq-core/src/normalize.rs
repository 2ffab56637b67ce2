//! Timestamp normalization applied before every persist.
//!
//! Facts are started and stopped at minute granularity. Starts are moved to
//! second [`FACT_START_OFFSET_SECS`] of their minute and ends to second zero,
//! so a fact stopped at a given minute never collides with the next fact
//! started in that same minute.

use chrono::{NaiveDateTime, NaiveTime, Timelike};

/// Seconds past the minute at which every start is placed.
pub const FACT_START_OFFSET_SECS: u32 = 10;

/// Places a start time at `:10` of its minute with no sub-second part.
pub fn normalize_start(start: NaiveDateTime) -> NaiveDateTime {
    at_second(start, FACT_START_OFFSET_SECS)
}

/// Places an end time at `:00` of its minute with no sub-second part.
pub fn normalize_end(end: NaiveDateTime) -> NaiveDateTime {
    at_second(end, 0)
}

fn at_second(timestamp: NaiveDateTime, second: u32) -> NaiveDateTime {
    let time = timestamp.time();
    let aligned = NaiveTime::from_hms_opt(time.hour(), time.minute(), second)
        .expect("hour and minute come from a valid time");
    timestamp.date().and_time(aligned)
}

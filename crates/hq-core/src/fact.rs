//! Facts, categories and activities.

use chrono::{Duration, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

use crate::normalize::normalize_end;
use crate::types::{ActivityKey, ActivityName, CategoryKey, CategoryName, FactKey};

/// A recorded or in-progress interval of time spent on an activity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Fact {
    /// Store identity. `None` for the open fact, which is not a stored record yet.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key: Option<FactKey>,
    /// When the fact started.
    pub start: NaiveDateTime,
    /// When the fact ended. `None` while the fact is still being tracked.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end: Option<NaiveDateTime>,
    /// What was being worked on.
    pub activity: ActivityName,
    /// The category the activity belongs to, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<CategoryName>,
    /// Free-form notes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl Fact {
    /// Creates an open fact.
    pub const fn open(start: NaiveDateTime, activity: ActivityName) -> Self {
        Self {
            key: None,
            start,
            end: None,
            activity,
            category: None,
            description: None,
        }
    }

    /// Whether the fact is still being tracked.
    pub const fn is_open(&self) -> bool {
        self.end.is_none()
    }

    /// Tracked time. Zero while the fact is open.
    pub fn duration(&self) -> Duration {
        self.end.map_or_else(Duration::zero, |end| end - self.start)
    }

    /// Tracked time measured from the start minute.
    ///
    /// Undoes the start offset, so a fact started at 10:00 and stopped at
    /// 11:00 reads as one hour.
    pub fn wall_duration(&self) -> Duration {
        self.end
            .map_or_else(Duration::zero, |end| end - normalize_end(self.start))
    }

    /// The calendar day the fact counts towards (the day it ended).
    pub fn day(&self) -> Option<NaiveDate> {
        self.end.map(|end| end.date())
    }

    /// The day the fact counts towards, treating an open fact as ending `now`.
    pub fn day_at(&self, now: NaiveDateTime) -> NaiveDate {
        self.end.unwrap_or(now).date()
    }

    /// The category as display text, empty when uncategorised.
    pub fn category_name(&self) -> &str {
        self.category.as_ref().map_or("", CategoryName::as_str)
    }
}

/// The caller-supplied fields of a closed fact, used by create and update.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FactDraft {
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
    pub activity: String,
    /// Category input. Blank means "no category".
    pub category: String,
    /// Description input. Blank means "no description".
    pub description: String,
}

/// A named group of activities.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Category {
    pub key: CategoryKey,
    pub name: CategoryName,
}

/// Something a fact can be spent on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Activity {
    pub key: ActivityKey,
    pub name: ActivityName,
    /// Reference to the owning category. `None` for uncategorised activities.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<CategoryKey>,
}

/// A category together with the activities that depend on it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CategoryRecord {
    pub category: Category,
    pub activities: Vec<ActivityKey>,
}

/// An activity together with the facts that depend on it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActivityRecord {
    pub activity: Activity,
    pub facts: Vec<FactKey>,
}

/// Turns blank description input into `None`.
pub(crate) fn optional_text(input: &str) -> Option<String> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

//! The fact store contract consumed by the lifecycle manager.
//!
//! A store is the durable record keeper for facts, categories and activities.
//! It is synchronous and blocking: every call either returns or fails with a
//! [`StoreError`]. At most one open fact (a fact without an end) exists in a
//! store at any time, and it carries no key until it is closed.

use std::fmt;

use chrono::{Duration, NaiveDateTime};
use thiserror::Error;

use crate::fact::{Activity, ActivityRecord, Category, CategoryRecord, Fact};
use crate::types::{ActivityKey, ActivityName, CategoryKey, CategoryName, FactKey, ValidationError};

/// Something a store lookup could not resolve.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Missing {
    Fact(FactKey),
    OpenFact,
    Category(CategoryKey),
    CategoryNamed(String),
    Activity(ActivityKey),
    ActivityNamed {
        activity: String,
        category: Option<String>,
    },
}

impl fmt::Display for Missing {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Fact(key) => write!(f, "fact {key}"),
            Self::OpenFact => write!(f, "open fact"),
            Self::Category(key) => write!(f, "category {key}"),
            Self::CategoryNamed(name) => write!(f, "category {name:?}"),
            Self::Activity(key) => write!(f, "activity {key}"),
            Self::ActivityNamed {
                activity,
                category: Some(category),
            } => write!(f, "activity {activity:?} in category {category:?}"),
            Self::ActivityNamed {
                activity,
                category: None,
            } => write!(f, "activity {activity:?}"),
        }
    }
}

/// Errors reported by a fact store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The requested record does not exist.
    #[error("{0} not found")]
    NotFound(Missing),

    /// The store rejected the record.
    #[error(transparent)]
    Invalid(#[from] ValidationError),

    /// The record still has dependents and cannot be removed.
    #[error("{0} still has dependents")]
    DependencyExists(Missing),

    /// The storage backend failed.
    #[error("storage backend error: {0}")]
    Backend(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl StoreError {
    /// Whether this is a failed lookup.
    pub const fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}

/// Durable storage for facts, categories and activities.
pub trait FactStore {
    /// All closed facts.
    fn all_facts(&self) -> Result<Vec<Fact>, StoreError>;

    /// A closed fact by key.
    fn get_fact(&self, key: FactKey) -> Result<Fact, StoreError>;

    /// Persists a fact and returns it as stored.
    ///
    /// - A fact with a key replaces the stored fact with that key.
    /// - A fact without a key and with an end is inserted and given a key.
    /// - A fact without an end becomes the open fact.
    ///
    /// Missing activities and categories are created on the way.
    fn save_fact(&mut self, fact: &Fact) -> Result<Fact, StoreError>;

    /// The open fact. Fails with [`Missing::OpenFact`] when nothing is open.
    fn open_fact(&self) -> Result<Fact, StoreError>;

    /// Closes the open fact at `end`, persisting it as a keyed record.
    ///
    /// Either the open fact is stored and the open slot cleared, or nothing
    /// changes.
    fn stop_open_fact(&mut self, end: NaiveDateTime) -> Result<Fact, StoreError>;

    /// Discards the open fact without recording it.
    fn cancel_open_fact(&mut self) -> Result<(), StoreError>;

    fn all_categories(&self) -> Result<Vec<Category>, StoreError>;

    fn all_activities(&self) -> Result<Vec<Activity>, StoreError>;

    fn get_category(&self, key: CategoryKey) -> Result<Category, StoreError>;

    /// The raw category record, including the keys of its activities.
    fn category_by_name(&self, name: &CategoryName) -> Result<CategoryRecord, StoreError>;

    fn get_activity(&self, key: ActivityKey) -> Result<Activity, StoreError>;

    /// The raw activity record, including the keys of its facts.
    fn activity_record(&self, key: ActivityKey) -> Result<ActivityRecord, StoreError>;

    /// Looks an activity up by name within a category (or among uncategorised activities).
    fn find_activity(
        &self,
        name: &ActivityName,
        category: Option<&CategoryName>,
    ) -> Result<Activity, StoreError>;

    /// Returns the named activity, creating it (and its category) if needed.
    fn save_activity(
        &mut self,
        name: &ActivityName,
        category: Option<&CategoryName>,
    ) -> Result<Activity, StoreError>;

    /// Removes a category. Fails with [`StoreError::DependencyExists`] while it has activities.
    fn remove_category(&mut self, category: &Category) -> Result<(), StoreError>;

    /// Removes an activity. Fails with [`StoreError::DependencyExists`] while it has facts.
    fn remove_activity(&mut self, activity: &Activity) -> Result<(), StoreError>;
}

/// Interval validation shared by store implementations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IntervalRules {
    /// Shortest accepted closed fact.
    pub min_duration: Duration,
}

impl Default for IntervalRules {
    fn default() -> Self {
        Self {
            min_duration: Duration::zero(),
        }
    }
}

impl IntervalRules {
    pub const fn new(min_duration: Duration) -> Self {
        Self { min_duration }
    }

    /// Checks a closed interval on its own.
    pub fn check_closed(
        &self,
        start: NaiveDateTime,
        end: NaiveDateTime,
    ) -> Result<(), ValidationError> {
        if end <= start {
            return Err(ValidationError::EndNotAfterStart { start, end });
        }
        let actual = end - start;
        if actual < self.min_duration {
            return Err(ValidationError::TooShort {
                actual_secs: actual.num_seconds(),
                minimum_secs: self.min_duration.num_seconds(),
            });
        }
        Ok(())
    }

    /// Checks a closed interval against the other stored facts and the open fact.
    ///
    /// `others` yields `(key, start, end)` of every other closed fact.
    pub fn check_placement<I>(
        &self,
        start: NaiveDateTime,
        end: NaiveDateTime,
        others: I,
        open_start: Option<NaiveDateTime>,
    ) -> Result<(), ValidationError>
    where
        I: IntoIterator<Item = (FactKey, NaiveDateTime, NaiveDateTime)>,
    {
        self.check_closed(start, end)?;
        if let Some(other) = others
            .into_iter()
            .find(|&(_, other_start, other_end)| other_start < end && start < other_end)
            .map(|(key, _, _)| key)
        {
            return Err(ValidationError::Overlap { other });
        }
        match open_start {
            Some(open_start) if end > open_start => {
                Err(ValidationError::OverlapsOpenFact { start: open_start })
            }
            _ => Ok(()),
        }
    }

    /// Checks where a new open fact may start.
    pub fn check_open_start<I>(
        &self,
        start: NaiveDateTime,
        others: I,
    ) -> Result<(), ValidationError>
    where
        I: IntoIterator<Item = (FactKey, NaiveDateTime, NaiveDateTime)>,
    {
        match others
            .into_iter()
            .find(|&(_, other_start, other_end)| other_start <= start && start < other_end)
        {
            Some((other, _, _)) => Err(ValidationError::Overlap { other }),
            None => Ok(()),
        }
    }
}

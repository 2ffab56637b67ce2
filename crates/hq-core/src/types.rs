//! Core type definitions with validation.

use std::fmt;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Validation errors for facts and their names.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// The provided value was empty.
    #[error("{field} cannot be empty")]
    Empty { field: &'static str },

    /// A closed fact must end after it starts.
    #[error("fact end ({end}) must be after its start ({start})")]
    EndNotAfterStart {
        start: NaiveDateTime,
        end: NaiveDateTime,
    },

    /// The fact is shorter than the configured minimum duration.
    #[error("fact lasts {actual_secs}s, the minimum is {minimum_secs}s")]
    TooShort { actual_secs: i64, minimum_secs: i64 },

    /// The interval overlaps another stored fact.
    #[error("fact overlaps existing fact {other}")]
    Overlap { other: FactKey },

    /// The interval reaches into the fact that is currently being tracked.
    #[error("fact overlaps the ongoing fact started at {start}")]
    OverlapsOpenFact { start: NaiveDateTime },

    /// Another fact is already open.
    #[error("a fact is already being tracked")]
    AlreadyOpen,

    /// A stored fact was saved without an end time.
    #[error("fact {key} needs an end time")]
    MissingEnd { key: FactKey },

    /// The activity does not exist and inline creation is disabled.
    #[error("unknown activity: {activity}{}", category_suffix(.category.as_deref()))]
    UnknownActivity {
        activity: String,
        category: Option<String>,
    },

    /// A time prefix in a raw command could not be understood.
    #[error("invalid time: {value}")]
    InvalidTime { value: String },
}

fn category_suffix(category: Option<&str>) -> String {
    category.map(|c| format!("@{c}")).unwrap_or_default()
}

/// Generates an integer store key newtype.
macro_rules! define_key {
    (
        $(#[$meta:meta])*
        $name:ident
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(i64);

        impl $name {
            /// Wraps a raw store key.
            #[must_use]
            pub const fn new(key: i64) -> Self {
                Self(key)
            }

            /// Returns the raw store key.
            #[must_use]
            pub const fn get(self) -> i64 {
                self.0
            }
        }

        impl From<i64> for $name {
            fn from(key: i64) -> Self {
                Self(key)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

define_key!(
    /// Identity of a persisted fact.
    FactKey
);

define_key!(
    /// Identity of a category.
    ///
    /// [`CategoryKey::UNCATEGORISED`] names the pseudo category that collects
    /// activities without a category. It has no backing record.
    CategoryKey
);

define_key!(
    /// Identity of an activity.
    ActivityKey
);

impl CategoryKey {
    /// Key of the "(uncategorised)" pseudo category.
    pub const UNCATEGORISED: Self = Self(-1);

    /// Whether this is the uncategorised pseudo category.
    #[must_use]
    pub const fn is_uncategorised(self) -> bool {
        self.0 == Self::UNCATEGORISED.0
    }
}

/// Generates a validated, trimmed name newtype with common trait implementations.
macro_rules! define_name {
    (
        $(#[$meta:meta])*
        $name:ident, $field_name:literal
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(try_from = "String", into = "String")]
        pub struct $name(String);

        impl $name {
            /// Creates a new name after trimming and validation.
            pub fn new(name: impl Into<String>) -> Result<Self, ValidationError> {
                let name = name.into();
                let trimmed = name.trim();
                if trimmed.is_empty() {
                    return Err(ValidationError::Empty { field: $field_name });
                }
                if trimmed.len() == name.len() {
                    Ok(Self(name))
                } else {
                    Ok(Self(trimmed.to_string()))
                }
            }

            /// Returns the name as a string slice.
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl TryFrom<String> for $name {
            type Error = ValidationError;

            fn try_from(value: String) -> Result<Self, Self::Error> {
                Self::new(value)
            }
        }

        impl From<$name> for String {
            fn from(name: $name) -> Self {
                name.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }
    };
}

define_name!(
    /// A validated activity name.
    ///
    /// Activity names must contain at least one non-whitespace character.
    ActivityName, "activity"
);

define_name!(
    /// A validated category name.
    ///
    /// An empty category is never represented by an empty name; use `None`
    /// for "no category" instead.
    CategoryName, "category"
);

impl CategoryName {
    /// Translates free-form input into an optional category.
    ///
    /// Blank input means "no category".
    pub fn optional(input: &str) -> Option<Self> {
        Self::new(input).ok()
    }
}

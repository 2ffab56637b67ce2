//! Core domain logic for the hq time tracker.
//!
//! This crate contains the fundamental types and logic for:
//! - Facts: timed intervals spent on an activity, optionally categorised
//! - Lifecycle: starting, stopping and editing facts with at most one open fact
//! - Day totals: per-day tracked time kept in step with every change
//! - Registry: the category to activity tree and removal checks

mod clock;
pub mod command;
mod events;
mod fact;
mod manager;
pub mod memory;
pub mod normalize;
pub mod registry;
mod store;
mod totals;
pub mod types;

pub use clock::{Clock, ManualClock, SystemClock};
pub use events::LifecycleEvent;
pub use fact::{Activity, ActivityRecord, Category, CategoryRecord, Fact, FactDraft};
pub use manager::{ActivityPolicy, FactManager, LifecycleError, ManagerConfig, OpenSlot};
pub use memory::MemoryStore;
pub use store::{FactStore, IntervalRules, Missing, StoreError};
pub use totals::{DayTotals, TotalsError};
pub use types::{ActivityKey, ActivityName, CategoryKey, CategoryName, FactKey, ValidationError};

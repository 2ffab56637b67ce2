//! CLI subcommand implementations.
//!
//! Each command writes its human-readable output to the given writer so it
//! can be snapshot-tested.

pub mod activity;
pub mod add;
pub mod cancel;
pub mod categories;
pub mod current;
pub mod list;
pub mod start;
pub mod stop;
pub mod totals;
pub mod util;

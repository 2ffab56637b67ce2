//! Per-day duration totals.
//!
//! Totals are rebuilt from the full fact list on refresh and kept up to date
//! incrementally as facts are added or updated. A day only has an entry while
//! its total is non-zero, so both paths produce identical maps.

use std::collections::BTreeMap;

use chrono::{Duration, NaiveDate};
use thiserror::Error;

use crate::events::LifecycleEvent;
use crate::fact::Fact;

/// Errors from updating day totals. The totals are left unchanged.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TotalsError {
    /// The total for a day would overflow.
    #[error("total for {day} overflowed")]
    Overflow { day: NaiveDate },

    /// Removing a contribution would make a day negative.
    #[error("total for {day} would become negative")]
    Negative { day: NaiveDate },
}

/// Mapping from calendar day to accumulated tracked time.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DayTotals {
    totals: BTreeMap<NaiveDate, Duration>,
}

impl DayTotals {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds totals from scratch.
    pub fn rebuild<'a, I>(facts: I) -> Result<Self, TotalsError>
    where
        I: IntoIterator<Item = &'a Fact>,
    {
        let mut totals = Self::new();
        for fact in facts {
            totals.record_added(fact)?;
        }
        Ok(totals)
    }

    /// Total for a day. Zero when nothing was tracked.
    pub fn get(&self, day: NaiveDate) -> Duration {
        self.totals.get(&day).copied().unwrap_or_else(Duration::zero)
    }

    /// Days with tracked time, in calendar order.
    pub fn iter(&self) -> impl Iterator<Item = (NaiveDate, Duration)> + '_ {
        self.totals.iter().map(|(day, total)| (*day, *total))
    }

    pub fn is_empty(&self) -> bool {
        self.totals.is_empty()
    }

    /// Adds a fact's contribution. Open facts contribute nothing.
    pub fn record_added(&mut self, fact: &Fact) -> Result<(), TotalsError> {
        let Some(day) = fact.day() else {
            return Ok(());
        };
        let total = self
            .get(day)
            .checked_add(&fact.duration())
            .ok_or(TotalsError::Overflow { day })?;
        self.set(day, total);
        Ok(())
    }

    /// Moves a fact's contribution from its previous day and duration to its current ones.
    ///
    /// Both halves are computed before either is committed.
    pub fn record_updated(&mut self, previous: &Fact, current: &Fact) -> Result<(), TotalsError> {
        let mut staged: Vec<(NaiveDate, Duration)> = Vec::with_capacity(2);

        if let Some(day) = previous.day() {
            let total = self
                .get(day)
                .checked_sub(&previous.duration())
                .ok_or(TotalsError::Overflow { day })?;
            if total < Duration::zero() {
                return Err(TotalsError::Negative { day });
            }
            staged.push((day, total));
        }

        if let Some(day) = current.day() {
            let base = staged
                .iter()
                .find(|(staged_day, _)| *staged_day == day)
                .map_or_else(|| self.get(day), |(_, total)| *total);
            let total = base
                .checked_add(&current.duration())
                .ok_or(TotalsError::Overflow { day })?;
            staged.retain(|(staged_day, _)| *staged_day != day);
            staged.push((day, total));
        }

        for (day, total) in staged {
            self.set(day, total);
        }
        Ok(())
    }

    /// Applies the fact changes carried by a lifecycle event.
    pub fn apply(&mut self, event: &LifecycleEvent) -> Result<(), TotalsError> {
        match event {
            LifecycleEvent::FactAdded(fact) => self.record_added(fact),
            LifecycleEvent::FactUpdated { previous, current } => {
                self.record_updated(previous, current)
            }
            _ => Ok(()),
        }
    }

    fn set(&mut self, day: NaiveDate, total: Duration) {
        if total.is_zero() {
            self.totals.remove(&day);
        } else {
            self.totals.insert(day, total);
        }
    }
}

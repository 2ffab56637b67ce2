//! Fact lifecycle manager.
//!
//! Owns the "at most one open fact" rule, orchestrates start/stop/cancel/
//! create/update against a [`FactStore`], keeps [`DayTotals`] in step with
//! the store and queues [`LifecycleEvent`]s for presentation layers.
//!
//! Every mutation is persisted first. Totals and events follow only after the
//! store confirmed the write, so a rejected save leaves all in-memory state
//! as it was.

use chrono::{Duration, NaiveDate, NaiveDateTime};
use thiserror::Error;

use crate::clock::{Clock, SystemClock};
use crate::command::parse_raw_fact;
use crate::events::LifecycleEvent;
use crate::fact::{Activity, Fact, FactDraft, optional_text};
use crate::normalize::{FACT_START_OFFSET_SECS, normalize_end, normalize_start};
use crate::registry::{self, CategoryTree};
use crate::store::{FactStore, Missing, StoreError};
use crate::totals::{DayTotals, TotalsError};
use crate::types::{ActivityKey, ActivityName, CategoryKey, CategoryName, FactKey, ValidationError};

/// Errors surfaced by lifecycle operations.
#[derive(Debug, Error)]
pub enum LifecycleError {
    /// The raw command was blank.
    #[error("empty fact information, can't start fact")]
    EmptyInput,

    /// The fact was malformed before it reached the store.
    #[error("invalid fact: {0}")]
    Invalid(#[from] ValidationError),

    /// The key did not resolve.
    #[error("{0} not found")]
    NotFound(Missing),

    /// Stop was requested while nothing is being tracked.
    #[error("no fact is currently being tracked")]
    NoOpenFact,

    /// The store rejected a write.
    #[error("{context}: {source}")]
    Persist {
        context: &'static str,
        #[source]
        source: StoreError,
    },

    /// The store failed while reading.
    #[error("store error: {0}")]
    Store(#[source] StoreError),

    /// Day totals could not be rebuilt.
    #[error(transparent)]
    Totals(#[from] TotalsError),
}

/// Whether activities named by new facts may be created on the fly.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ActivityPolicy {
    /// Unknown activities and categories are created when the fact is stored.
    #[default]
    CreateInline,
    /// The activity must already exist in the given category.
    RequireExisting,
}

/// Settings threaded into the manager.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ManagerConfig {
    pub activity_policy: ActivityPolicy,
}

/// The open-fact slot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OpenSlot {
    Empty,
    Open(Fact),
}

/// How `stop` treats the absence of an open fact.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum MissingOpenFact {
    Surface,
    Ignore,
}

/// Orchestrates fact lifecycle operations over a store.
pub struct FactManager<S, C = SystemClock> {
    store: S,
    clock: C,
    config: ManagerConfig,
    totals: DayTotals,
    slot: OpenSlot,
    events: Vec<LifecycleEvent>,
}

impl<S: FactStore, C: Clock> FactManager<S, C> {
    /// Creates a manager and loads its state from the store.
    pub fn new(store: S, clock: C, config: ManagerConfig) -> Result<Self, LifecycleError> {
        let mut manager = Self {
            store,
            clock,
            config,
            totals: DayTotals::new(),
            slot: OpenSlot::Empty,
            events: Vec::new(),
        };
        manager.refresh()?;
        Ok(manager)
    }

    /// Reloads day totals and the open-fact slot from the store.
    pub fn refresh(&mut self) -> Result<(), LifecycleError> {
        let facts = self.store.all_facts().map_err(LifecycleError::Store)?;
        self.totals = DayTotals::rebuild(&facts)?;
        self.sync_slot()?;
        tracing::debug!(facts = facts.len(), "refreshed fact state");
        Ok(())
    }

    pub const fn store(&self) -> &S {
        &self.store
    }

    pub const fn config(&self) -> &ManagerConfig {
        &self.config
    }

    pub const fn open_slot(&self) -> &OpenSlot {
        &self.slot
    }

    /// The manager's notion of "now".
    pub fn now(&self) -> NaiveDateTime {
        self.clock.now()
    }

    pub const fn is_tracking(&self) -> bool {
        matches!(self.slot, OpenSlot::Open(_))
    }

    /// Takes the events queued since the last call.
    pub fn drain_events(&mut self) -> Vec<LifecycleEvent> {
        std::mem::take(&mut self.events)
    }

    // ========== Lifecycle ==========

    /// Starts tracking the fact described by `raw`.
    ///
    /// Any open fact is closed first, ending on the minute the new fact starts.
    /// One that began in that same minute is discarded.
    pub fn start(
        &mut self,
        raw: &str,
        explicit_start: Option<NaiveDateTime>,
    ) -> Result<Fact, LifecycleError> {
        let result = self.start_inner(raw, explicit_start);
        let result = self.surface(result);
        self.announce_current();
        result
    }

    fn start_inner(
        &mut self,
        raw: &str,
        explicit_start: Option<NaiveDateTime>,
    ) -> Result<Fact, LifecycleError> {
        if raw.trim().is_empty() {
            return Err(LifecycleError::EmptyInput);
        }
        let now = self.clock.now();
        let parsed = parse_raw_fact(raw, now.date())?;
        self.check_activity(&parsed.activity, parsed.category.as_ref())?;

        let start = normalize_start(explicit_start.or(parsed.start).unwrap_or(now));
        let fact = Fact {
            key: None,
            start,
            end: parsed.end.map(normalize_end),
            activity: parsed.activity,
            category: parsed.category,
            description: parsed.description,
        };

        let boundary = start - Duration::seconds(FACT_START_OFFSET_SECS.into());
        if self.supersede_open_fact(boundary)? {
            self.announce_current();
        }

        let saved = self
            .store
            .save_fact(&fact)
            .map_err(|source| LifecycleError::Persist {
                context: "fact start error",
                source,
            })?;
        tracing::info!(
            activity = %saved.activity,
            start = %saved.start,
            open = saved.is_open(),
            "started fact"
        );
        self.emit(LifecycleEvent::StartSucceeded);
        if !saved.is_open() {
            self.emit(LifecycleEvent::FactAdded(saved.clone()));
        }
        Ok(saved)
    }

    /// Makes room for a fact starting just after `boundary`.
    ///
    /// An open fact that would end at or before its own start has no length
    /// to record and is discarded instead of closed.
    fn supersede_open_fact(&mut self, boundary: NaiveDateTime) -> Result<bool, LifecycleError> {
        let open = match self.store.open_fact() {
            Ok(open) => open,
            Err(err) if err.is_not_found() => return Ok(false),
            Err(err) => return Err(LifecycleError::Store(err)),
        };
        if boundary > open.start {
            return Ok(self
                .stop_inner(Some(boundary), MissingOpenFact::Ignore)?
                .is_some());
        }

        tracing::warn!(
            activity = %open.activity,
            start = %open.start,
            %boundary,
            "open fact superseded within its first minute, discarding it"
        );
        self.store
            .cancel_open_fact()
            .map_err(|source| LifecycleError::Persist {
                context: "fact stop error",
                source,
            })?;
        Ok(true)
    }

    /// Stops the open fact, at `explicit_end` or now.
    pub fn stop(&mut self, explicit_end: Option<NaiveDateTime>) -> Result<Fact, LifecycleError> {
        let result = self
            .stop_inner(explicit_end, MissingOpenFact::Surface)
            .and_then(|stopped| stopped.ok_or(LifecycleError::NoOpenFact));
        let result = self.surface(result);
        self.announce_current();
        result
    }

    fn stop_inner(
        &mut self,
        explicit_end: Option<NaiveDateTime>,
        missing: MissingOpenFact,
    ) -> Result<Option<Fact>, LifecycleError> {
        let open = match self.store.open_fact() {
            Ok(open) => open,
            Err(err) if err.is_not_found() => {
                return match missing {
                    MissingOpenFact::Surface => Err(LifecycleError::NoOpenFact),
                    MissingOpenFact::Ignore => {
                        tracing::debug!("no open fact to close");
                        Ok(None)
                    }
                };
            }
            Err(err) => return Err(LifecycleError::Store(err)),
        };

        let end = normalize_end(explicit_end.unwrap_or_else(|| self.clock.now()));
        tracing::debug!(activity = %open.activity, start = %open.start, %end, "stopping open fact");
        let stopped = self
            .store
            .stop_open_fact(end)
            .map_err(|source| LifecycleError::Persist {
                context: "fact stop error",
                source,
            })?;
        tracing::info!(key = ?stopped.key, activity = %stopped.activity, "stopped fact");
        self.emit(LifecycleEvent::StopSucceeded);
        self.emit(LifecycleEvent::FactAdded(stopped.clone()));
        Ok(Some(stopped))
    }

    /// Discards the open fact without recording it.
    ///
    /// Cancelling with nothing open is not an error.
    pub fn cancel(&mut self) -> Result<(), LifecycleError> {
        let result = match self.store.cancel_open_fact() {
            Ok(()) => {
                tracing::info!("cancelled open fact");
                Ok(())
            }
            Err(err) if err.is_not_found() => {
                tracing::info!("no fact to cancel");
                Ok(())
            }
            Err(err) => Err(LifecycleError::Store(err)),
        };
        let result = self.surface(result);
        self.announce_current();
        result
    }

    /// The open fact with its end provisionally set to now.
    ///
    /// Emits [`LifecycleEvent::CurrentFactChanged`] on every call.
    pub fn current(&mut self) -> Result<Option<Fact>, LifecycleError> {
        self.sync_slot()?;
        let current = match &self.slot {
            OpenSlot::Empty => None,
            OpenSlot::Open(open) => Some(Fact {
                end: Some(self.clock.now()),
                ..open.clone()
            }),
        };
        self.emit(LifecycleEvent::CurrentFactChanged(current.clone()));
        Ok(current)
    }

    /// Records a closed fact.
    pub fn create(&mut self, draft: &FactDraft) -> Result<Fact, LifecycleError> {
        let result = self.create_inner(draft);
        self.surface(result)
    }

    fn create_inner(&mut self, draft: &FactDraft) -> Result<Fact, LifecycleError> {
        let fact = self.closed_fact(None, draft)?;
        let saved = self
            .store
            .save_fact(&fact)
            .map_err(|source| LifecycleError::Persist {
                context: "fact error",
                source,
            })?;
        tracing::info!(key = ?saved.key, activity = %saved.activity, "created fact");
        self.emit(LifecycleEvent::FactAdded(saved.clone()));
        Ok(saved)
    }

    /// Replaces the stored fact `key` with the draft.
    pub fn update(&mut self, key: FactKey, draft: &FactDraft) -> Result<Fact, LifecycleError> {
        let result = self.update_inner(key, draft);
        self.surface(result)
    }

    fn update_inner(&mut self, key: FactKey, draft: &FactDraft) -> Result<Fact, LifecycleError> {
        let previous = match self.store.get_fact(key) {
            Ok(previous) => previous,
            Err(err) if err.is_not_found() => {
                return Err(LifecycleError::NotFound(Missing::Fact(key)));
            }
            Err(err) => return Err(LifecycleError::Store(err)),
        };
        let fact = self.closed_fact(Some(key), draft)?;
        let saved = self
            .store
            .save_fact(&fact)
            .map_err(|source| LifecycleError::Persist {
                context: "could not update fact",
                source,
            })?;
        tracing::info!(%key, activity = %saved.activity, "updated fact");
        self.emit(LifecycleEvent::FactUpdated {
            previous,
            current: saved.clone(),
        });
        Ok(saved)
    }

    // ========== Queries ==========

    /// All stored facts ordered by start.
    pub fn list_facts(&self) -> Result<Vec<Fact>, LifecycleError> {
        let mut facts = self.store.all_facts().map_err(LifecycleError::Store)?;
        facts.sort_by_key(|fact| (fact.start, fact.key));
        Ok(facts)
    }

    /// Stored facts whose day falls within `from..=to`, ordered by start.
    pub fn list_facts_between(
        &self,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<Fact>, LifecycleError> {
        let mut facts = self.list_facts()?;
        facts.retain(|fact| fact.day().is_some_and(|day| from <= day && day <= to));
        Ok(facts)
    }

    /// Tracked time for a day. Zero when nothing was tracked.
    pub fn day_total(&self, day: NaiveDate) -> Duration {
        self.totals.get(day)
    }

    pub const fn day_totals(&self) -> &DayTotals {
        &self.totals
    }

    // ========== Categories and activities ==========

    pub fn category_tree(&self) -> Result<CategoryTree, LifecycleError> {
        CategoryTree::build(&self.store).map_err(LifecycleError::Store)
    }

    pub fn can_remove_category(&self, key: CategoryKey) -> Result<bool, LifecycleError> {
        registry::can_remove_category(&self.store, key).map_err(LifecycleError::Store)
    }

    pub fn can_remove_activity(&self, key: ActivityKey) -> Result<bool, LifecycleError> {
        registry::can_remove_activity(&self.store, key).map_err(LifecycleError::Store)
    }

    /// Removes a category that has no activities.
    ///
    /// Returns whether anything was removed. Unknown keys, the uncategorised
    /// pseudo category and categories with activities are left alone.
    pub fn remove_category(&mut self, key: CategoryKey) -> Result<bool, LifecycleError> {
        let result = self.remove_category_inner(key);
        self.surface(result)
    }

    fn remove_category_inner(&mut self, key: CategoryKey) -> Result<bool, LifecycleError> {
        if key.is_uncategorised() {
            return Ok(false);
        }
        let category = match self.store.get_category(key) {
            Ok(category) => category,
            Err(err) if err.is_not_found() => {
                tracing::debug!(%key, "category to remove does not exist");
                return Ok(false);
            }
            Err(err) => return Err(LifecycleError::Store(err)),
        };
        if !self.can_remove_category(key)? {
            tracing::warn!(
                %key,
                name = %category.name,
                "category still has activities, not removing"
            );
            return Ok(false);
        }
        match self.store.remove_category(&category) {
            Ok(()) => {}
            Err(StoreError::DependencyExists(missing)) => {
                tracing::warn!(%missing, "store refused removal");
                return Ok(false);
            }
            Err(err) => return Err(LifecycleError::Store(err)),
        }
        tracing::info!(%key, name = %category.name, "removed category");
        self.emit(LifecycleEvent::CategoriesChanged);
        Ok(true)
    }

    /// Removes an activity that has no facts.
    ///
    /// Returns whether anything was removed.
    pub fn remove_activity(&mut self, key: ActivityKey) -> Result<bool, LifecycleError> {
        let result = self.remove_activity_inner(key);
        self.surface(result)
    }

    fn remove_activity_inner(&mut self, key: ActivityKey) -> Result<bool, LifecycleError> {
        let activity = match self.store.get_activity(key) {
            Ok(activity) => activity,
            Err(err) if err.is_not_found() => {
                tracing::debug!(%key, "activity to remove does not exist");
                return Ok(false);
            }
            Err(err) => return Err(LifecycleError::Store(err)),
        };
        if !self.can_remove_activity(key)? {
            tracing::warn!(%key, name = %activity.name, "activity still has facts, not removing");
            return Ok(false);
        }
        match self.store.remove_activity(&activity) {
            Ok(()) => {}
            Err(StoreError::DependencyExists(missing)) => {
                tracing::warn!(%missing, "store refused removal");
                return Ok(false);
            }
            Err(err) => return Err(LifecycleError::Store(err)),
        }
        tracing::info!(%key, name = %activity.name, "removed activity");
        self.emit(LifecycleEvent::ActivitiesChanged);
        Ok(true)
    }

    /// Adds an activity to a category (blank for uncategorised).
    ///
    /// Returns the existing activity when it is already known.
    pub fn add_activity(&mut self, name: &str, category: &str) -> Result<Activity, LifecycleError> {
        let result = self.add_activity_inner(name, category);
        self.surface(result)
    }

    fn add_activity_inner(
        &mut self,
        name: &str,
        category: &str,
    ) -> Result<Activity, LifecycleError> {
        let name = ActivityName::new(name)?;
        let category = CategoryName::optional(category);

        match self.store.find_activity(&name, category.as_ref()) {
            Ok(existing) => return Ok(existing),
            Err(err) if err.is_not_found() => {}
            Err(err) => return Err(LifecycleError::Store(err)),
        }
        let new_category = match &category {
            Some(category) => match self.store.category_by_name(category) {
                Ok(_) => false,
                Err(err) if err.is_not_found() => true,
                Err(err) => return Err(LifecycleError::Store(err)),
            },
            None => false,
        };

        let activity = self
            .store
            .save_activity(&name, category.as_ref())
            .map_err(|source| LifecycleError::Persist {
                context: "could not add activity",
                source,
            })?;
        tracing::info!(key = %activity.key, name = %activity.name, "added activity");
        if new_category {
            self.emit(LifecycleEvent::CategoriesChanged);
        }
        self.emit(LifecycleEvent::ActivitiesChanged);
        Ok(activity)
    }

    // ========== Internals ==========

    fn closed_fact(&self, key: Option<FactKey>, draft: &FactDraft) -> Result<Fact, LifecycleError> {
        let activity = ActivityName::new(draft.activity.as_str())?;
        let category = CategoryName::optional(&draft.category);
        self.check_activity(&activity, category.as_ref())?;
        Ok(Fact {
            key,
            start: normalize_start(draft.start),
            end: Some(normalize_end(draft.end)),
            activity,
            category,
            description: optional_text(&draft.description),
        })
    }

    fn check_activity(
        &self,
        activity: &ActivityName,
        category: Option<&CategoryName>,
    ) -> Result<(), LifecycleError> {
        if self.config.activity_policy == ActivityPolicy::CreateInline {
            return Ok(());
        }
        match self.store.find_activity(activity, category) {
            Ok(_) => Ok(()),
            Err(err) if err.is_not_found() => Err(ValidationError::UnknownActivity {
                activity: activity.to_string(),
                category: category.map(ToString::to_string),
            }
            .into()),
            Err(err) => Err(LifecycleError::Store(err)),
        }
    }

    fn sync_slot(&mut self) -> Result<(), LifecycleError> {
        self.slot = match self.store.open_fact() {
            Ok(open) => OpenSlot::Open(open),
            Err(err) if err.is_not_found() => OpenSlot::Empty,
            Err(err) => return Err(LifecycleError::Store(err)),
        };
        Ok(())
    }

    /// Refreshes the current fact after a mutation. Failures are logged only.
    fn announce_current(&mut self) {
        if let Err(err) = self.current() {
            tracing::warn!(error = %err, "failed to refresh current fact");
        }
    }

    /// Reports a failed operation as an error message event.
    fn surface<T>(&mut self, result: Result<T, LifecycleError>) -> Result<T, LifecycleError> {
        if let Err(err) = &result {
            tracing::warn!(error = %err, "fact operation failed");
            self.emit(LifecycleEvent::ErrorMessage(err.to_string()));
        }
        result
    }

    fn emit(&mut self, event: LifecycleEvent) {
        if let Err(err) = self.totals.apply(&event) {
            tracing::warn!(error = %err, "day totals out of step, rebuilding");
            match self.store.all_facts() {
                Ok(facts) => match DayTotals::rebuild(&facts) {
                    Ok(totals) => self.totals = totals,
                    Err(err) => tracing::error!(error = %err, "failed to rebuild day totals"),
                },
                Err(err) => tracing::error!(error = %err, "failed to reload facts"),
            }
        }
        self.events.push(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::clock::ManualClock;
    use crate::memory::MemoryStore;

    fn at(date: &str, time: &str) -> NaiveDateTime {
        NaiveDateTime::parse_from_str(&format!("{date} {time}"), "%Y-%m-%d %H:%M:%S").unwrap()
    }

    fn day(date: &str) -> NaiveDate {
        NaiveDate::parse_from_str(date, "%Y-%m-%d").unwrap()
    }

    fn manager(clock: &ManualClock) -> FactManager<MemoryStore, &ManualClock> {
        FactManager::new(MemoryStore::new(), clock, ManagerConfig::default()).unwrap()
    }

    fn draft(
        start: NaiveDateTime,
        end: NaiveDateTime,
        activity: &str,
        category: &str,
    ) -> FactDraft {
        FactDraft {
            start,
            end,
            activity: activity.to_string(),
            category: category.to_string(),
            description: String::new(),
        }
    }

    fn assert_totals_match_store(manager: &FactManager<MemoryStore, &ManualClock>) {
        let facts = manager.store().all_facts().unwrap();
        assert_eq!(manager.day_totals(), &DayTotals::rebuild(&facts).unwrap());
    }

    fn error_messages(events: &[LifecycleEvent]) -> Vec<&str> {
        events
            .iter()
            .filter_map(|event| match event {
                LifecycleEvent::ErrorMessage(message) => Some(message.as_str()),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn start_then_stop_records_fact() {
        let clock = ManualClock::new(at("2024-05-06", "09:00:00"));
        let mut manager = manager(&clock);

        let started = manager.start("write-report@work,Q1 planning", None).unwrap();
        assert_eq!(started.start, at("2024-05-06", "09:00:10"));
        assert_eq!(started.activity.as_str(), "write-report");
        assert_eq!(started.category.as_ref().map(CategoryName::as_str), Some("work"));
        assert_eq!(started.description.as_deref(), Some("Q1 planning"));
        assert!(started.is_open());
        assert!(manager.is_tracking());

        clock.set(at("2024-05-06", "09:30:00"));
        let stopped = manager.stop(None).unwrap();
        assert_eq!(stopped.start, at("2024-05-06", "09:00:10"));
        assert_eq!(stopped.end, Some(at("2024-05-06", "09:30:00")));
        assert!(!manager.is_tracking());
        assert_eq!(
            manager.day_total(day("2024-05-06")),
            Duration::minutes(29) + Duration::seconds(50)
        );
        assert_totals_match_store(&manager);
    }

    #[test]
    fn start_emits_events_in_order() {
        let clock = ManualClock::new(at("2024-05-06", "09:00:00"));
        let mut manager = manager(&clock);
        manager.drain_events();

        let started = manager.start("coding", None).unwrap();
        let events = manager.drain_events();
        assert_eq!(
            events,
            vec![
                LifecycleEvent::StartSucceeded,
                LifecycleEvent::CurrentFactChanged(Some(Fact {
                    end: Some(at("2024-05-06", "09:00:00")),
                    ..started
                })),
            ]
        );
    }

    #[test]
    fn start_while_open_auto_closes_previous() {
        let clock = ManualClock::new(at("2024-05-06", "09:00:00"));
        let mut manager = manager(&clock);
        manager.start("coding@work", None).unwrap();
        manager.drain_events();

        clock.set(at("2024-05-06", "10:15:42"));
        let next = manager.start("email@work", None).unwrap();
        assert_eq!(next.start, at("2024-05-06", "10:15:10"));

        let facts = manager.list_facts().unwrap();
        assert_eq!(facts.len(), 1);
        assert_eq!(facts[0].activity.as_str(), "coding");
        assert_eq!(facts[0].end, Some(at("2024-05-06", "10:15:00")));
        assert!(facts[0].end.unwrap() <= next.start);

        let events = manager.drain_events();
        assert!(error_messages(&events).is_empty());
        assert!(matches!(
            events.as_slice(),
            [
                LifecycleEvent::StopSucceeded,
                LifecycleEvent::FactAdded(_),
                LifecycleEvent::CurrentFactChanged(None),
                LifecycleEvent::StartSucceeded,
                LifecycleEvent::CurrentFactChanged(Some(_)),
            ]
        ));
        assert_totals_match_store(&manager);
    }

    #[test]
    fn at_most_one_open_fact_across_sequences() {
        let clock = ManualClock::new(at("2024-05-06", "08:00:00"));
        let mut manager = manager(&clock);

        for (i, activity) in ["a", "b", "c", "d", "e", "f"].iter().enumerate() {
            clock.advance(Duration::minutes(17));
            if i % 3 == 2 {
                manager.stop(None).unwrap();
            } else {
                manager.start(activity, None).unwrap();
            }
            let open_in_list = manager
                .list_facts()
                .unwrap()
                .iter()
                .filter(|fact| fact.is_open())
                .count();
            assert_eq!(open_in_list, 0);
            let open = usize::from(manager.store().open_fact().is_ok());
            assert!(open <= 1);
            assert_eq!(manager.is_tracking(), open == 1);
        }
        assert_totals_match_store(&manager);
    }

    #[test]
    fn restart_within_same_minute_replaces_open_fact() {
        let clock = ManualClock::new(at("2024-05-06", "09:00:05"));
        let mut manager = manager(&clock);
        manager.start("codng", None).unwrap();
        manager.drain_events();

        clock.set(at("2024-05-06", "09:00:40"));
        let next = manager.start("coding", None).unwrap();
        assert_eq!(next.start, at("2024-05-06", "09:00:10"));

        let open = manager.store().open_fact().unwrap();
        assert_eq!(open.activity.as_str(), "coding");
        assert!(manager.is_tracking());
        assert!(manager.list_facts().unwrap().is_empty());

        let events = manager.drain_events();
        assert!(error_messages(&events).is_empty());
        assert!(matches!(
            events.as_slice(),
            [
                LifecycleEvent::CurrentFactChanged(None),
                LifecycleEvent::StartSucceeded,
                LifecycleEvent::CurrentFactChanged(Some(_)),
            ]
        ));
        assert_totals_match_store(&manager);
    }

    #[test]
    fn explicit_start_in_open_fact_minute_replaces_it() {
        let clock = ManualClock::new(at("2024-05-06", "09:00:05"));
        let mut manager = manager(&clock);
        manager.start("codng@work", None).unwrap();
        manager.drain_events();

        clock.set(at("2024-05-06", "09:05:00"));
        let next = manager
            .start("coding@work", Some(at("2024-05-06", "09:00:30")))
            .unwrap();
        assert_eq!(next.start, at("2024-05-06", "09:00:10"));

        let open = manager.store().open_fact().unwrap();
        assert_eq!(open.activity.as_str(), "coding");
        assert!(manager.list_facts().unwrap().is_empty());
        assert!(error_messages(&manager.drain_events()).is_empty());

        clock.set(at("2024-05-06", "09:30:00"));
        manager.stop(None).unwrap();
        assert_eq!(
            manager.day_total(day("2024-05-06")),
            Duration::minutes(29) + Duration::seconds(50)
        );
        assert_totals_match_store(&manager);
    }

    #[test]
    fn restart_one_minute_later_still_closes_open_fact() {
        let clock = ManualClock::new(at("2024-05-06", "09:00:55"));
        let mut manager = manager(&clock);
        manager.start("coding", None).unwrap();

        clock.set(at("2024-05-06", "09:01:05"));
        manager.start("email", None).unwrap();

        let facts = manager.list_facts().unwrap();
        assert_eq!(facts.len(), 1);
        assert_eq!(facts[0].activity.as_str(), "coding");
        assert_eq!(facts[0].end, Some(at("2024-05-06", "09:01:00")));
        assert_eq!(manager.day_total(day("2024-05-06")), Duration::seconds(50));
        assert_totals_match_store(&manager);
    }

    #[test]
    fn stop_without_open_fact_is_surfaced() {
        let clock = ManualClock::new(at("2024-05-06", "09:00:00"));
        let mut manager = manager(&clock);
        manager.drain_events();

        let err = manager.stop(None).unwrap_err();
        assert!(matches!(err, LifecycleError::NoOpenFact));
        assert_eq!(
            manager.drain_events(),
            vec![
                LifecycleEvent::ErrorMessage("no fact is currently being tracked".to_string()),
                LifecycleEvent::CurrentFactChanged(None),
            ]
        );
    }

    #[test]
    fn stop_with_explicit_end_normalizes_it() {
        let clock = ManualClock::new(at("2024-05-06", "09:00:00"));
        let mut manager = manager(&clock);
        manager.start("coding", None).unwrap();

        clock.set(at("2024-05-06", "12:00:00"));
        let stopped = manager.stop(Some(at("2024-05-06", "10:45:33"))).unwrap();
        assert_eq!(stopped.end, Some(at("2024-05-06", "10:45:00")));
    }

    #[test]
    fn rejected_stop_keeps_fact_open_and_totals_unchanged() {
        let clock = ManualClock::new(at("2024-05-06", "09:00:00"));
        let mut manager = manager(&clock);
        manager.start("coding", None).unwrap();
        manager.drain_events();

        let err = manager.stop(Some(at("2024-05-06", "08:00:00"))).unwrap_err();
        assert!(matches!(err, LifecycleError::Persist { .. }));
        assert!(manager.is_tracking());
        assert!(manager.day_totals().is_empty());
        let events = manager.drain_events();
        assert_eq!(error_messages(&events).len(), 1);
        assert!(error_messages(&events)[0].starts_with("fact stop error"));
    }

    #[test]
    fn cancel_discards_open_fact() {
        let clock = ManualClock::new(at("2024-05-06", "09:00:00"));
        let mut manager = manager(&clock);
        manager.start("coding", None).unwrap();
        clock.advance(Duration::minutes(30));

        manager.cancel().unwrap();
        assert!(!manager.is_tracking());
        assert!(manager.list_facts().unwrap().is_empty());
        assert!(manager.day_totals().is_empty());
    }

    #[test]
    fn cancel_without_open_fact_is_silent() {
        let clock = ManualClock::new(at("2024-05-06", "09:00:00"));
        let mut manager = manager(&clock);
        manager.drain_events();

        manager.cancel().unwrap();
        assert_eq!(
            manager.drain_events(),
            vec![LifecycleEvent::CurrentFactChanged(None)]
        );
    }

    #[test]
    fn current_reports_open_fact_ending_now() {
        let clock = ManualClock::new(at("2024-05-06", "09:00:00"));
        let mut manager = manager(&clock);
        assert_eq!(manager.current().unwrap(), None);

        manager.start("coding", None).unwrap();
        clock.set(at("2024-05-06", "09:20:00"));
        manager.drain_events();

        let current = manager.current().unwrap().unwrap();
        assert_eq!(current.end, Some(at("2024-05-06", "09:20:00")));
        assert_eq!(current.key, None);
        assert_eq!(
            manager.drain_events(),
            vec![LifecycleEvent::CurrentFactChanged(Some(current))]
        );
        // The provisional end is never persisted.
        assert!(manager.store().open_fact().unwrap().is_open());
    }

    #[test]
    fn blank_command_is_rejected() {
        let clock = ManualClock::new(at("2024-05-06", "09:00:00"));
        let mut manager = manager(&clock);
        manager.drain_events();

        let err = manager.start("   ", None).unwrap_err();
        assert!(matches!(err, LifecycleError::EmptyInput));
        let events = manager.drain_events();
        assert_eq!(
            error_messages(&events),
            vec!["empty fact information, can't start fact"]
        );
    }

    #[test]
    fn start_with_interval_adds_closed_fact() {
        let clock = ManualClock::new(at("2024-05-06", "12:00:00"));
        let mut manager = manager(&clock);
        manager.drain_events();

        let fact = manager.start("10:00-11:00 review@work", None).unwrap();
        assert_eq!(fact.start, at("2024-05-06", "10:00:10"));
        assert_eq!(fact.end, Some(at("2024-05-06", "11:00:00")));
        assert!(fact.key.is_some());
        assert!(!manager.is_tracking());

        let events = manager.drain_events();
        assert_eq!(events[0], LifecycleEvent::StartSucceeded);
        assert_eq!(events[1], LifecycleEvent::FactAdded(fact));
        assert_eq!(events[2], LifecycleEvent::CurrentFactChanged(None));
        assert_eq!(
            manager.day_total(day("2024-05-06")),
            Duration::minutes(59) + Duration::seconds(50)
        );
    }

    #[test]
    fn explicit_start_wins_over_now() {
        let clock = ManualClock::new(at("2024-05-06", "12:00:00"));
        let mut manager = manager(&clock);
        let fact = manager
            .start("coding", Some(at("2024-05-06", "11:42:59")))
            .unwrap();
        assert_eq!(fact.start, at("2024-05-06", "11:42:10"));
    }

    #[test]
    fn create_translates_empty_category_to_none() {
        let clock = ManualClock::new(at("2024-03-02", "08:00:00"));
        let mut manager = manager(&clock);

        let fact = manager
            .create(&draft(
                at("2024-03-01", "10:00:00"),
                at("2024-03-01", "11:00:00"),
                "x",
                "",
            ))
            .unwrap();
        assert_eq!(fact.category, None);
        assert_eq!(fact.description, None);
        assert_eq!(fact.wall_duration(), Duration::hours(1));
        assert_eq!(manager.day_total(day("2024-03-01")), fact.duration());
    }

    #[test]
    fn create_overlap_is_rejected_without_side_effects() {
        let clock = ManualClock::new(at("2024-03-02", "08:00:00"));
        let mut manager = manager(&clock);
        manager
            .create(&draft(
                at("2024-03-01", "10:00:00"),
                at("2024-03-01", "11:00:00"),
                "x",
                "work",
            ))
            .unwrap();
        let totals = manager.day_totals().clone();
        manager.drain_events();

        let err = manager
            .create(&draft(
                at("2024-03-01", "10:30:00"),
                at("2024-03-01", "11:30:00"),
                "y",
                "work",
            ))
            .unwrap_err();
        assert!(matches!(
            err,
            LifecycleError::Persist {
                source: StoreError::Invalid(ValidationError::Overlap { .. }),
                ..
            }
        ));
        assert_eq!(manager.day_totals(), &totals);
        assert_eq!(manager.list_facts().unwrap().len(), 1);
        let events = manager.drain_events();
        assert_eq!(events.len(), 1);
        assert!(error_messages(&events)[0].starts_with("fact error: fact overlaps"));
    }

    #[test]
    fn update_moves_day_total() {
        let clock = ManualClock::new(at("2024-01-05", "08:00:00"));
        let mut manager = manager(&clock);
        manager
            .create(&draft(
                at("2024-01-01", "07:00:00"),
                at("2024-01-01", "08:00:00"),
                "other",
                "",
            ))
            .unwrap();
        let fact = manager
            .create(&draft(
                at("2024-01-01", "09:00:00"),
                at("2024-01-01", "09:30:00"),
                "x",
                "work",
            ))
            .unwrap();
        let day1_before = manager.day_total(day("2024-01-01"));
        let day2_before = manager.day_total(day("2024-01-02"));
        manager.drain_events();

        let updated = manager
            .update(
                fact.key.unwrap(),
                &draft(
                    at("2024-01-02", "09:00:00"),
                    at("2024-01-02", "09:45:00"),
                    "x",
                    "work",
                ),
            )
            .unwrap();

        assert_eq!(
            day1_before - manager.day_total(day("2024-01-01")),
            fact.duration()
        );
        assert_eq!(
            manager.day_total(day("2024-01-02")) - day2_before,
            updated.duration()
        );
        assert_eq!(fact.wall_duration(), Duration::minutes(30));
        assert_eq!(updated.wall_duration(), Duration::minutes(45));
        assert_eq!(
            manager.drain_events(),
            vec![LifecycleEvent::FactUpdated {
                previous: fact,
                current: updated
            }]
        );
        assert_totals_match_store(&manager);
    }

    #[test]
    fn update_unknown_key_is_not_found() {
        let clock = ManualClock::new(at("2024-01-05", "08:00:00"));
        let mut manager = manager(&clock);
        let err = manager
            .update(
                FactKey::new(404),
                &draft(
                    at("2024-01-02", "09:00:00"),
                    at("2024-01-02", "09:45:00"),
                    "x",
                    "",
                ),
            )
            .unwrap_err();
        assert!(matches!(err, LifecycleError::NotFound(Missing::Fact(_))));
        assert_eq!(err.to_string(), "fact 404 not found");
    }

    #[test]
    fn update_clears_category_when_blank() {
        let clock = ManualClock::new(at("2024-01-05", "08:00:00"));
        let mut manager = manager(&clock);
        let fact = manager
            .create(&draft(
                at("2024-01-01", "09:00:00"),
                at("2024-01-01", "09:30:00"),
                "x",
                "work",
            ))
            .unwrap();
        let updated = manager
            .update(
                fact.key.unwrap(),
                &draft(fact.start, fact.end.unwrap(), "x", "  "),
            )
            .unwrap();
        assert_eq!(updated.category, None);
        assert_eq!(
            manager.store().get_fact(fact.key.unwrap()).unwrap().category,
            None
        );
    }

    #[test]
    fn failed_update_leaves_totals_untouched() {
        let clock = ManualClock::new(at("2024-01-05", "08:00:00"));
        let mut manager = manager(&clock);
        manager
            .create(&draft(
                at("2024-01-01", "08:00:00"),
                at("2024-01-01", "09:00:00"),
                "a",
                "",
            ))
            .unwrap();
        let fact = manager
            .create(&draft(
                at("2024-01-01", "10:00:00"),
                at("2024-01-01", "11:00:00"),
                "b",
                "",
            ))
            .unwrap();
        let totals = manager.day_totals().clone();

        let err = manager
            .update(
                fact.key.unwrap(),
                &draft(
                    at("2024-01-01", "08:30:00"),
                    at("2024-01-01", "11:00:00"),
                    "b",
                    "",
                ),
            )
            .unwrap_err();
        assert!(err.to_string().starts_with("could not update fact"));
        assert_eq!(manager.day_totals(), &totals);
    }

    #[test]
    fn require_existing_policy_rejects_unknown_activity() {
        let clock = ManualClock::new(at("2024-05-06", "09:00:00"));
        let mut store = MemoryStore::new();
        store
            .save_activity(
                &ActivityName::new("coding").unwrap(),
                Some(&CategoryName::new("work").unwrap()),
            )
            .unwrap();
        let config = ManagerConfig {
            activity_policy: ActivityPolicy::RequireExisting,
        };
        let mut manager = FactManager::new(store, &clock, config).unwrap();

        let err = manager.start("coding@home", None).unwrap_err();
        assert!(matches!(
            err,
            LifecycleError::Invalid(ValidationError::UnknownActivity { .. })
        ));
        assert!(!manager.is_tracking());

        manager.start("coding@work", None).unwrap();
        assert!(manager.is_tracking());
    }

    #[test]
    fn totals_survive_refresh() {
        let clock = ManualClock::new(at("2024-05-06", "09:00:00"));
        let mut manager = manager(&clock);
        manager.start("a", None).unwrap();
        clock.advance(Duration::minutes(40));
        manager.start("b", None).unwrap();
        clock.advance(Duration::minutes(25));
        manager.stop(None).unwrap();

        let incremental = manager.day_totals().clone();
        manager.refresh().unwrap();
        assert_eq!(manager.day_totals(), &incremental);
    }

    #[test]
    fn list_between_filters_by_day_and_sorts_by_start() {
        let clock = ManualClock::new(at("2024-01-10", "08:00:00"));
        let mut manager = manager(&clock);
        for (date, hour) in [
            ("2024-01-03", "15"),
            ("2024-01-01", "09"),
            ("2024-01-02", "12"),
            ("2024-01-02", "08"),
        ] {
            let start = at(date, &format!("{hour}:00:00"));
            manager
                .create(&draft(start, start + Duration::minutes(30), "x", ""))
                .unwrap();
        }

        let facts = manager
            .list_facts_between(day("2024-01-02"), day("2024-01-03"))
            .unwrap();
        let starts: Vec<NaiveDateTime> = facts.iter().map(|fact| fact.start).collect();
        assert_eq!(
            starts,
            vec![
                at("2024-01-02", "08:00:10"),
                at("2024-01-02", "12:00:10"),
                at("2024-01-03", "15:00:10"),
            ]
        );

        let single = manager
            .list_facts_between(day("2024-01-01"), day("2024-01-01"))
            .unwrap();
        assert_eq!(single.len(), 1);
    }

    #[test]
    fn removals_respect_dependents() {
        let clock = ManualClock::new(at("2024-01-10", "08:00:00"));
        let mut manager = manager(&clock);
        manager
            .create(&draft(
                at("2024-01-01", "09:00:00"),
                at("2024-01-01", "10:00:00"),
                "coding",
                "work",
            ))
            .unwrap();
        let idle = manager.add_activity("idle", "spare").unwrap();
        let work = manager
            .store()
            .category_by_name(&CategoryName::new("work").unwrap())
            .unwrap();
        manager.drain_events();

        assert!(!manager.can_remove_category(CategoryKey::UNCATEGORISED).unwrap());
        assert!(!manager.remove_category(CategoryKey::UNCATEGORISED).unwrap());
        assert!(!manager.remove_category(work.category.key).unwrap());
        assert!(!manager.remove_activity(work.activities[0]).unwrap());
        assert!(!manager.remove_category(CategoryKey::new(999)).unwrap());
        assert!(manager.drain_events().is_empty());

        assert!(manager.can_remove_activity(idle.key).unwrap());
        assert!(manager.remove_activity(idle.key).unwrap());
        let spare = idle.category.unwrap();
        assert!(manager.remove_category(spare).unwrap());
        assert_eq!(
            manager.drain_events(),
            vec![
                LifecycleEvent::ActivitiesChanged,
                LifecycleEvent::CategoriesChanged
            ]
        );
        let tree = manager.category_tree().unwrap();
        assert!(tree.get(spare).is_none());
    }

    #[test]
    fn add_activity_reports_new_category() {
        let clock = ManualClock::new(at("2024-01-10", "08:00:00"));
        let mut manager = manager(&clock);
        manager.drain_events();

        let first = manager.add_activity("coding", "work").unwrap();
        assert_eq!(
            manager.drain_events(),
            vec![
                LifecycleEvent::CategoriesChanged,
                LifecycleEvent::ActivitiesChanged
            ]
        );

        let again = manager.add_activity("coding", "work").unwrap();
        assert_eq!(first, again);
        assert!(manager.drain_events().is_empty());

        manager.add_activity("email", "work").unwrap();
        assert_eq!(
            manager.drain_events(),
            vec![LifecycleEvent::ActivitiesChanged]
        );
    }
}

//! In-memory fact store.
//!
//! Holds everything in ordered maps and applies the same [`IntervalRules`] as
//! the SQLite store. Useful for tests and throwaway sessions.

use std::collections::BTreeMap;

use chrono::NaiveDateTime;

use crate::fact::{Activity, ActivityRecord, Category, CategoryRecord, Fact};
use crate::store::{FactStore, IntervalRules, Missing, StoreError};
use crate::types::{ActivityKey, ActivityName, CategoryKey, CategoryName, FactKey, ValidationError};

#[derive(Debug, Clone)]
struct StoredFact {
    start: NaiveDateTime,
    end: NaiveDateTime,
    activity: ActivityKey,
    description: Option<String>,
}

#[derive(Debug, Clone)]
struct StoredActivity {
    name: ActivityName,
    category: Option<CategoryKey>,
}

/// A [`FactStore`] kept entirely in memory.
#[derive(Debug, Default)]
pub struct MemoryStore {
    rules: IntervalRules,
    facts: BTreeMap<FactKey, StoredFact>,
    open: Option<Fact>,
    categories: BTreeMap<CategoryKey, CategoryName>,
    activities: BTreeMap<ActivityKey, StoredActivity>,
    last_key: i64,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_rules(rules: IntervalRules) -> Self {
        Self {
            rules,
            ..Self::default()
        }
    }

    fn next_key(&mut self) -> i64 {
        self.last_key += 1;
        self.last_key
    }

    fn intervals_except(
        &self,
        exclude: Option<FactKey>,
    ) -> impl Iterator<Item = (FactKey, NaiveDateTime, NaiveDateTime)> + '_ {
        self.facts
            .iter()
            .filter(move |(key, _)| Some(**key) != exclude)
            .map(|(key, fact)| (*key, fact.start, fact.end))
    }

    fn category_key(&self, name: &CategoryName) -> Option<CategoryKey> {
        self.categories
            .iter()
            .find(|(_, existing)| *existing == name)
            .map(|(key, _)| *key)
    }

    fn activity_key(
        &self,
        name: &ActivityName,
        category: Option<CategoryKey>,
    ) -> Option<ActivityKey> {
        self.activities
            .iter()
            .find(|(_, activity)| activity.name == *name && activity.category == category)
            .map(|(key, _)| *key)
    }

    fn ensure_activity(
        &mut self,
        name: &ActivityName,
        category: Option<&CategoryName>,
    ) -> ActivityKey {
        let category_key = category.map(|category| {
            self.category_key(category).unwrap_or_else(|| {
                let key = CategoryKey::new(self.next_key());
                self.categories.insert(key, category.clone());
                key
            })
        });
        if let Some(key) = self.activity_key(name, category_key) {
            return key;
        }
        let key = ActivityKey::new(self.next_key());
        self.activities.insert(
            key,
            StoredActivity {
                name: name.clone(),
                category: category_key,
            },
        );
        key
    }

    fn to_activity(&self, key: ActivityKey) -> Result<Activity, StoreError> {
        let stored = self
            .activities
            .get(&key)
            .ok_or(StoreError::NotFound(Missing::Activity(key)))?;
        Ok(Activity {
            key,
            name: stored.name.clone(),
            category: stored.category,
        })
    }

    fn to_fact(&self, key: FactKey, stored: &StoredFact) -> Result<Fact, StoreError> {
        let activity = self.to_activity(stored.activity)?;
        let category = activity
            .category
            .and_then(|category| self.categories.get(&category).cloned());
        Ok(Fact {
            key: Some(key),
            start: stored.start,
            end: Some(stored.end),
            activity: activity.name,
            category,
            description: stored.description.clone(),
        })
    }

    fn insert_closed(&mut self, key: FactKey, fact: &Fact, end: NaiveDateTime) -> Fact {
        let activity = self.ensure_activity(&fact.activity, fact.category.as_ref());
        self.facts.insert(
            key,
            StoredFact {
                start: fact.start,
                end,
                activity,
                description: fact.description.clone(),
            },
        );
        Fact {
            key: Some(key),
            end: Some(end),
            ..fact.clone()
        }
    }
}

impl FactStore for MemoryStore {
    fn all_facts(&self) -> Result<Vec<Fact>, StoreError> {
        self.facts
            .iter()
            .map(|(key, stored)| self.to_fact(*key, stored))
            .collect()
    }

    fn get_fact(&self, key: FactKey) -> Result<Fact, StoreError> {
        let stored = self
            .facts
            .get(&key)
            .ok_or(StoreError::NotFound(Missing::Fact(key)))?;
        self.to_fact(key, stored)
    }

    fn save_fact(&mut self, fact: &Fact) -> Result<Fact, StoreError> {
        let open_start = self.open.as_ref().map(|open| open.start);
        match (fact.key, fact.end) {
            (Some(key), None) => Err(ValidationError::MissingEnd { key }.into()),
            (Some(key), Some(end)) => {
                if !self.facts.contains_key(&key) {
                    return Err(StoreError::NotFound(Missing::Fact(key)));
                }
                self.rules.check_placement(
                    fact.start,
                    end,
                    self.intervals_except(Some(key)),
                    open_start,
                )?;
                Ok(self.insert_closed(key, fact, end))
            }
            (None, Some(end)) => {
                self.rules
                    .check_placement(fact.start, end, self.intervals_except(None), open_start)?;
                let key = FactKey::new(self.next_key());
                Ok(self.insert_closed(key, fact, end))
            }
            (None, None) => {
                if self.open.is_some() {
                    return Err(ValidationError::AlreadyOpen.into());
                }
                self.rules
                    .check_open_start(fact.start, self.intervals_except(None))?;
                self.open = Some(fact.clone());
                Ok(fact.clone())
            }
        }
    }

    fn open_fact(&self) -> Result<Fact, StoreError> {
        self.open
            .clone()
            .ok_or(StoreError::NotFound(Missing::OpenFact))
    }

    fn stop_open_fact(&mut self, end: NaiveDateTime) -> Result<Fact, StoreError> {
        let open = self.open_fact()?;
        self.rules
            .check_placement(open.start, end, self.intervals_except(None), None)?;
        let key = FactKey::new(self.next_key());
        let stored = self.insert_closed(key, &open, end);
        self.open = None;
        Ok(stored)
    }

    fn cancel_open_fact(&mut self) -> Result<(), StoreError> {
        self.open
            .take()
            .map(|_| ())
            .ok_or(StoreError::NotFound(Missing::OpenFact))
    }

    fn all_categories(&self) -> Result<Vec<Category>, StoreError> {
        Ok(self
            .categories
            .iter()
            .map(|(key, name)| Category {
                key: *key,
                name: name.clone(),
            })
            .collect())
    }

    fn all_activities(&self) -> Result<Vec<Activity>, StoreError> {
        self.activities
            .keys()
            .map(|key| self.to_activity(*key))
            .collect()
    }

    fn get_category(&self, key: CategoryKey) -> Result<Category, StoreError> {
        self.categories
            .get(&key)
            .map(|name| Category {
                key,
                name: name.clone(),
            })
            .ok_or(StoreError::NotFound(Missing::Category(key)))
    }

    fn category_by_name(&self, name: &CategoryName) -> Result<CategoryRecord, StoreError> {
        let key = self
            .category_key(name)
            .ok_or_else(|| StoreError::NotFound(Missing::CategoryNamed(name.to_string())))?;
        let activities = self
            .activities
            .iter()
            .filter(|(_, activity)| activity.category == Some(key))
            .map(|(key, _)| *key)
            .collect();
        Ok(CategoryRecord {
            category: Category {
                key,
                name: name.clone(),
            },
            activities,
        })
    }

    fn get_activity(&self, key: ActivityKey) -> Result<Activity, StoreError> {
        self.to_activity(key)
    }

    fn activity_record(&self, key: ActivityKey) -> Result<ActivityRecord, StoreError> {
        let activity = self.to_activity(key)?;
        let facts = self
            .facts
            .iter()
            .filter(|(_, fact)| fact.activity == key)
            .map(|(key, _)| *key)
            .collect();
        Ok(ActivityRecord { activity, facts })
    }

    fn find_activity(
        &self,
        name: &ActivityName,
        category: Option<&CategoryName>,
    ) -> Result<Activity, StoreError> {
        let missing = || {
            StoreError::NotFound(Missing::ActivityNamed {
                activity: name.to_string(),
                category: category.map(ToString::to_string),
            })
        };
        let category_key = match category {
            Some(category) => Some(self.category_key(category).ok_or_else(missing)?),
            None => None,
        };
        let key = self.activity_key(name, category_key).ok_or_else(missing)?;
        self.to_activity(key)
    }

    fn save_activity(
        &mut self,
        name: &ActivityName,
        category: Option<&CategoryName>,
    ) -> Result<Activity, StoreError> {
        let key = self.ensure_activity(name, category);
        self.to_activity(key)
    }

    fn remove_category(&mut self, category: &Category) -> Result<(), StoreError> {
        if !self.categories.contains_key(&category.key) {
            return Err(StoreError::NotFound(Missing::Category(category.key)));
        }
        if self
            .activities
            .values()
            .any(|activity| activity.category == Some(category.key))
        {
            return Err(StoreError::DependencyExists(Missing::Category(
                category.key,
            )));
        }
        self.categories.remove(&category.key);
        Ok(())
    }

    fn remove_activity(&mut self, activity: &Activity) -> Result<(), StoreError> {
        if !self.activities.contains_key(&activity.key) {
            return Err(StoreError::NotFound(Missing::Activity(activity.key)));
        }
        if self.facts.values().any(|fact| fact.activity == activity.key) {
            return Err(StoreError::DependencyExists(Missing::Activity(
                activity.key,
            )));
        }
        self.activities.remove(&activity.key);
        Ok(())
    }
}

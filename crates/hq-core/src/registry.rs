//! Category → activity tree and removal checks.
//!
//! The tree is always rebuilt in full from the store's flat lists. Activities
//! are referenced from their category node by key; the node does not own them.

use std::collections::{BTreeMap, BTreeSet};

use serde::Serialize;

use crate::store::{FactStore, StoreError};
use crate::types::{ActivityKey, ActivityName, CategoryKey};

/// Display name of the pseudo category holding uncategorised activities.
pub const UNCATEGORISED_NAME: &str = "(uncategorised)";

/// An activity as referenced from a category node.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub struct ActivityRef {
    pub key: ActivityKey,
    pub name: ActivityName,
}

/// A category and the activities that reference it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CategoryNode {
    pub key: CategoryKey,
    pub name: String,
    pub activities: BTreeSet<ActivityRef>,
}

/// Categories keyed by identity, always including the uncategorised node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct CategoryTree {
    nodes: BTreeMap<CategoryKey, CategoryNode>,
}

impl CategoryTree {
    /// Builds the tree from the store.
    pub fn build<S: FactStore + ?Sized>(store: &S) -> Result<Self, StoreError> {
        let mut nodes = BTreeMap::new();
        nodes.insert(
            CategoryKey::UNCATEGORISED,
            CategoryNode {
                key: CategoryKey::UNCATEGORISED,
                name: UNCATEGORISED_NAME.to_string(),
                activities: BTreeSet::new(),
            },
        );
        for category in store.all_categories()? {
            nodes.insert(
                category.key,
                CategoryNode {
                    key: category.key,
                    name: category.name.to_string(),
                    activities: BTreeSet::new(),
                },
            );
        }

        for activity in store.all_activities()? {
            let mut bucket = activity.category.unwrap_or(CategoryKey::UNCATEGORISED);
            if !nodes.contains_key(&bucket) {
                tracing::warn!(
                    activity = %activity.key,
                    category = %bucket,
                    "activity references unknown category, listing it as uncategorised"
                );
                bucket = CategoryKey::UNCATEGORISED;
            }
            if let Some(node) = nodes.get_mut(&bucket) {
                node.activities.insert(ActivityRef {
                    key: activity.key,
                    name: activity.name,
                });
            }
        }

        Ok(Self { nodes })
    }

    pub fn get(&self, key: CategoryKey) -> Option<&CategoryNode> {
        self.nodes.get(&key)
    }

    /// Nodes ordered by key, the uncategorised node first.
    pub fn nodes(&self) -> impl Iterator<Item = &CategoryNode> {
        self.nodes.values()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

/// Whether a category can be removed without orphaning activities.
///
/// Always false for the uncategorised pseudo category. Unknown keys are not
/// removable either.
pub fn can_remove_category<S: FactStore + ?Sized>(
    store: &S,
    key: CategoryKey,
) -> Result<bool, StoreError> {
    if key.is_uncategorised() {
        return Ok(false);
    }
    let category = match store.get_category(key) {
        Ok(category) => category,
        Err(err) if err.is_not_found() => return Ok(false),
        Err(err) => return Err(err),
    };
    let record = store.category_by_name(&category.name)?;
    Ok(record.activities.is_empty())
}

/// Whether an activity can be removed without orphaning facts.
pub fn can_remove_activity<S: FactStore + ?Sized>(
    store: &S,
    key: ActivityKey,
) -> Result<bool, StoreError> {
    match store.activity_record(key) {
        Ok(record) => Ok(record.facts.is_empty()),
        Err(err) if err.is_not_found() => Ok(false),
        Err(err) => Err(err),
    }
}

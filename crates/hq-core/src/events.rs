//! Lifecycle events emitted by the fact manager.

use crate::fact::Fact;

/// Notifications for presentation layers, in the order they happened.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LifecycleEvent {
    /// The open fact changed. Its `end` is provisionally set to "now".
    CurrentFactChanged(Option<Fact>),
    /// A closed fact was stored.
    FactAdded(Fact),
    /// A stored fact changed. `previous` is the fact as it was before the update.
    FactUpdated { previous: Fact, current: Fact },
    StartSucceeded,
    StopSucceeded,
    /// A user-facing error description.
    ErrorMessage(String),
    /// Categories were added or removed; dependent views should rebuild.
    CategoriesChanged,
    /// Activities were added or removed; dependent views should rebuild.
    ActivitiesChanged,
}

//! Change-relevance classification.
//!
//! The backing store only emits coarse, aggregated notifications: one batch
//! may describe many unrelated changes. Rather than re-querying the whole
//! tree on every batch, each branch decides from the events themselves
//! whether to ignore the batch, refresh fully, or patch a single child.
//!
//! Classification is a pure function of the batch and the branch's
//! immutable [`BranchScope`], so many branches may classify the same batch
//! concurrently.

use super::item::Item;
use super::source::ChildSource;

/// How one event relates to one branch.
#[derive(Debug, Clone, PartialEq)]
pub enum Relevance<K, P> {
    /// The event does not concern this branch.
    Irrelevant,
    /// The event changes the branch's shape in a way it cannot re-derive
    /// cheaply (for example deletion of the counted category itself).
    Structural,
    /// The event carries enough to rebuild one displayed child.
    Replace(Item<K, P>),
}

/// The decision for a whole batch.
#[derive(Debug, Clone, PartialEq)]
pub enum Action<K, P> {
    /// Nothing in the batch concerns the branch.
    Ignore,
    /// Re-run the collaborator fetch.
    FullRefresh,
    /// Merge this item into the retained children without a fetch.
    ReplaceItem(Item<K, P>),
}

impl<K, P> Action<K, P> {
    /// Returns `true` for [`Action::Ignore`].
    pub fn is_ignore(&self) -> bool {
        matches!(self, Self::Ignore)
    }
}

/// Everything a batch asks of a branch, used by the reconciler so that no
/// replacement in a batch is lost.
#[derive(Debug, Clone, PartialEq)]
pub enum BatchPlan<K, P> {
    /// Nothing to do.
    Ignore,
    /// Re-run the collaborator fetch.
    FullRefresh,
    /// Merge these items, in batch order.
    Replace(Vec<Item<K, P>>),
}

/// The immutable scope a branch filters events with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BranchScope {
    type_key: String,
    data_source_id: Option<i64>,
    accepts_unscoped: bool,
}

impl BranchScope {
    /// A scope for `type_key`, optionally restricted to one data source.
    pub fn new(type_key: impl Into<String>, data_source_id: Option<i64>) -> Self {
        Self {
            type_key: type_key.into(),
            data_source_id,
            accepts_unscoped: false,
        }
    }

    /// Also accept events that carry no data source at all.
    pub fn accepting_unscoped(mut self) -> Self {
        self.accepts_unscoped = true;
        self
    }

    /// The type key this branch cares about.
    pub fn type_key(&self) -> &str {
        &self.type_key
    }

    /// The data source this branch is restricted to, if any.
    pub fn data_source_id(&self) -> Option<i64> {
        self.data_source_id
    }

    /// Returns `true` if an event for `type_key` in `data_source_id`
    /// concerns this scope.
    pub fn matches(&self, type_key: &str, data_source_id: Option<i64>) -> bool {
        if type_key != self.type_key {
            return false;
        }
        match (self.data_source_id, data_source_id) {
            (None, _) => true,
            (Some(_), None) => self.accepts_unscoped,
            (Some(ours), Some(theirs)) => ours == theirs,
        }
    }
}

/// Per-branch relevance logic.
pub trait RelevanceFilter: ChildSource {
    /// The producer-defined change event.
    type Event: Send + Sync;

    /// Judges a single event.
    fn relevance(&self, event: &Self::Event) -> Relevance<Self::Key, Self::Payload>;

    /// Classifies a batch.
    ///
    /// A structural event anywhere in the batch yields
    /// [`Action::FullRefresh`] and stops the scan. Otherwise the first
    /// replacement wins; a batch with no match yields [`Action::Ignore`].
    fn classify(&self, events: &[Self::Event]) -> Action<Self::Key, Self::Payload> {
        let mut first_replacement = None;
        for event in events {
            match self.relevance(event) {
                Relevance::Structural => return Action::FullRefresh,
                Relevance::Replace(item) if first_replacement.is_none() => {
                    first_replacement = Some(item);
                }
                _ => {}
            }
        }
        first_replacement.map_or(Action::Ignore, Action::ReplaceItem)
    }

    /// Like [`classify`](Self::classify) but keeps every replacement.
    fn plan(&self, events: &[Self::Event]) -> BatchPlan<Self::Key, Self::Payload> {
        let mut replacements = Vec::new();
        for event in events {
            match self.relevance(event) {
                Relevance::Structural => return BatchPlan::FullRefresh,
                Relevance::Replace(item) => replacements.push(item),
                Relevance::Irrelevant => {}
            }
        }
        if replacements.is_empty() {
            BatchPlan::Ignore
        } else {
            BatchPlan::Replace(replacements)
        }
    }
}

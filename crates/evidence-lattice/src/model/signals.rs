//! Signals emitted by the model engines.
//!
//! Rendering collaborators connect to these to stay synchronized. Engines
//! always emit after releasing their state lock, so a slot may call back
//! into the engine's read accessors.

use evidence_lattice_core::{PassStats, Signal};

use super::error::FetchError;
use super::flat_list::ListDelta;
use super::paging::PageInfo;

/// Signals emitted by a [`ChildReconciler`](super::ChildReconciler).
///
/// # Signal Usage
///
/// Within one pass the order is `nodes_removed`, `nodes_added`,
/// `nodes_updated`, then `children_reordered` if the displayed order moved,
/// and finally `pass_completed`.
pub struct ReconcileSignals<K> {
    /// Identities whose nodes were discarded.
    pub nodes_removed: Signal<Vec<K>>,
    /// Identities that received new nodes.
    pub nodes_added: Signal<Vec<K>>,
    /// Identities whose nodes were updated in place.
    pub nodes_updated: Signal<Vec<K>>,
    /// The displayed order changed.
    pub children_reordered: Signal<()>,
    /// A pass finished.
    pub pass_completed: Signal<PassStats>,
    /// A collaborator fetch failed; the displayed state was kept.
    pub refresh_failed: Signal<FetchError>,
}

impl<K: Send + 'static> Default for ReconcileSignals<K> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K: Send + 'static> ReconcileSignals<K> {
    /// Creates a new set of reconcile signals.
    pub fn new() -> Self {
        Self {
            nodes_removed: Signal::new(),
            nodes_added: Signal::new(),
            nodes_updated: Signal::new(),
            children_reordered: Signal::new(),
            pass_completed: Signal::new(),
            refresh_failed: Signal::new(),
        }
    }

    /// Blocks or unblocks every signal in the set.
    pub fn set_blocked(&self, blocked: bool) {
        self.nodes_removed.set_blocked(blocked);
        self.nodes_added.set_blocked(blocked);
        self.nodes_updated.set_blocked(blocked);
        self.children_reordered.set_blocked(blocked);
        self.pass_completed.set_blocked(blocked);
        self.refresh_failed.set_blocked(blocked);
    }
}

/// Signals emitted by a [`ResultPageCache`](super::ResultPageCache).
pub struct PageSignals {
    /// A new page was fetched.
    pub page_changed: Signal<PageInfo>,
    /// The query was removed.
    pub query_cleared: Signal<()>,
    /// A fetch failed; the previous page was kept.
    pub fetch_failed: Signal<FetchError>,
}

impl Default for PageSignals {
    fn default() -> Self {
        Self::new()
    }
}

impl PageSignals {
    /// Creates a new set of page signals.
    pub fn new() -> Self {
        Self {
            page_changed: Signal::new(),
            query_cleared: Signal::new(),
            fetch_failed: Signal::new(),
        }
    }
}

/// Signals emitted by a [`FlatResultList`](super::FlatResultList).
pub struct FlatListSignals {
    /// The result set was replaced; rows should be rebuilt by identity.
    pub structure_changed: Signal<ListDelta>,
}

impl Default for FlatListSignals {
    fn default() -> Self {
        Self::new()
    }
}

impl FlatListSignals {
    /// Creates a new set of flat-list signals.
    pub fn new() -> Self {
        Self {
            structure_changed: Signal::new(),
        }
    }
}

//! Tree reconciliation engine.
//!
//! `ChildReconciler` keeps the children of one tree branch consistent with
//! the latest snapshot fetched from its [`ChildSource`]. Each pass updates
//! retained nodes in place, creates nodes only for new identities, and
//! discards nodes whose identity vanished. A failed fetch never partially
//! applies: the previously displayed identities stay as they were.
//!
//! # Example
//!
//! ```
//! use evidence_lattice::model::{ChildReconciler, Count, FnSource, Item};
//!
//! let reconciler = ChildReconciler::new(FnSource::new(|| {
//!     Ok(vec![
//!         Item::new(1_u64, "tag_name", (), "Bookmark").with_count(Count::Exact(3)),
//!         Item::new(2_u64, "tag_name", (), "Follow up").with_count(Count::Exact(0)),
//!     ])
//! }));
//!
//! assert_eq!(reconciler.reconcile(), vec![1, 2]);
//! let bookmark = reconciler.node(&1).unwrap();
//! assert_eq!(bookmark.display_count(), Count::Exact(3));
//! ```

use std::collections::HashSet;
use std::sync::Arc;

use evidence_lattice_core::PassStats;
use evidence_lattice_core::logging::targets;
use parking_lot::{Mutex, RwLock};

use super::error::FetchError;
use super::item::Item;
use super::registry::{NodeRegistry, PassChanges, RetainedNode};
use super::relevance::{Action, BatchPlan, RelevanceFilter};
use super::signals::ReconcileSignals;
use super::source::ChildSource;

type ItemOf<S> = Item<<S as ChildSource>::Key, <S as ChildSource>::Payload>;
type NodeOf<S> = Arc<RetainedNode<<S as ChildSource>::Key, <S as ChildSource>::Payload>>;

struct ReconcileState<K, P> {
    snapshot: Option<Vec<Item<K, P>>>,
    registry: NodeRegistry<K, P>,
    displayed: Vec<K>,
    last_pass: PassStats,
}

impl<K, P> Default for ReconcileState<K, P> {
    fn default() -> Self {
        Self {
            snapshot: None,
            registry: NodeRegistry::default(),
            displayed: Vec::new(),
            last_pass: PassStats::default(),
        }
    }
}

/// Keeps one branch's retained children in line with its source.
///
/// Mutating operations (`reconcile`, `reconcile_with`, `refresh`,
/// `merge_item`, `handle_events`, `try_apply_plan`, `detach`) are serialized
/// per instance and may block on the collaborator fetch. Read accessors
/// never wait for a fetch and always observe a fully applied pass.
pub struct ChildReconciler<S: ChildSource> {
    source: S,
    op_lock: Mutex<()>,
    state: RwLock<ReconcileState<S::Key, S::Payload>>,
    signals: ReconcileSignals<S::Key>,
}

impl<S: ChildSource> ChildReconciler<S> {
    /// Creates a reconciler with no snapshot; the first
    /// [`reconcile`](Self::reconcile) fetches.
    pub fn new(source: S) -> Self {
        Self {
            source,
            op_lock: Mutex::new(()),
            state: RwLock::new(ReconcileState::default()),
            signals: ReconcileSignals::new(),
        }
    }

    /// The child source.
    pub fn source(&self) -> &S {
        &self.source
    }

    /// The signals for this reconciler.
    pub fn signals(&self) -> &ReconcileSignals<S::Key> {
        &self.signals
    }

    // -------------------------------------------------------------------------
    // Mutating operations
    // -------------------------------------------------------------------------

    /// Returns the identities to display.
    ///
    /// On the first call (or after [`detach`](Self::detach)) the source is
    /// fetched once and the result cached. Later calls reuse the cached
    /// snapshot.
    pub fn reconcile(&self) -> Vec<S::Key> {
        let _op = self.op_lock.lock();
        let cached = self.state.read().snapshot.clone();
        match cached {
            Some(snapshot) => self.apply(snapshot),
            None => self.fetch_and_apply(),
        }
    }

    /// Applies a caller-supplied snapshot, which becomes the cached one.
    pub fn reconcile_with(&self, mut snapshot: Vec<ItemOf<S>>) -> Vec<S::Key> {
        let _op = self.op_lock.lock();
        self.sort(&mut snapshot);
        self.apply(snapshot)
    }

    /// Re-fetches unconditionally and applies the result.
    pub fn refresh(&self) -> Vec<S::Key> {
        let _op = self.op_lock.lock();
        self.fetch_and_apply()
    }

    /// Like [`refresh`](Self::refresh), but reports the outcome.
    ///
    /// A failed fetch is still handled fail-soft (logged, signalled, state
    /// kept); the error is returned in addition.
    pub fn try_refresh(&self) -> Result<PassStats, FetchError> {
        let _op = self.op_lock.lock();
        self.try_fetch_and_apply()
    }

    /// Merges one replacement item without a collaborator fetch.
    ///
    /// With no cached snapshot this performs the first fetch instead, which
    /// already reflects the change.
    pub fn merge_item(&self, item: ItemOf<S>) -> Vec<S::Key> {
        self.merge_items(vec![item])
    }

    /// Merges several replacement items in one pass, in order.
    pub fn merge_items(&self, items: Vec<ItemOf<S>>) -> Vec<S::Key> {
        let _op = self.op_lock.lock();
        let cached = self.state.read().snapshot.clone();
        match cached {
            Some(snapshot) => self.merge_into(snapshot, items).0,
            None => self.fetch_and_apply(),
        }
    }

    /// Drops the cached snapshot and every retained node.
    ///
    /// A later [`reconcile`](Self::reconcile) behaves like the first one.
    /// An in-flight fetch on another thread is not cancelled; it completes
    /// after this call returns.
    pub fn detach(&self) {
        let _op = self.op_lock.lock();
        let removed = {
            let mut state = self.state.write();
            state.snapshot = None;
            state.registry.clear();
            state.last_pass = PassStats::default();
            std::mem::take(&mut state.displayed)
        };
        tracing::debug!(target: targets::RECONCILE, removed = removed.len(), "detached");
        if !removed.is_empty() {
            self.signals.nodes_removed.emit(removed);
        }
    }

    // -------------------------------------------------------------------------
    // Read accessors
    // -------------------------------------------------------------------------

    /// The identities currently displayed, in order.
    pub fn displayed(&self) -> Vec<S::Key> {
        self.state.read().displayed.clone()
    }

    /// The retained node for `id`.
    pub fn node(&self, id: &S::Key) -> Option<NodeOf<S>> {
        self.state.read().registry.get(id).cloned()
    }

    /// Every retained node, in display order.
    pub fn nodes(&self) -> Vec<NodeOf<S>> {
        let state = self.state.read();
        state
            .displayed
            .iter()
            .filter_map(|id| state.registry.get(id).cloned())
            .collect()
    }

    /// Number of retained nodes.
    pub fn len(&self) -> usize {
        self.state.read().registry.len()
    }

    /// Returns `true` if no node is retained.
    pub fn is_empty(&self) -> bool {
        self.state.read().registry.is_empty()
    }

    /// Returns `true` once a snapshot has been cached.
    pub fn has_snapshot(&self) -> bool {
        self.state.read().snapshot.is_some()
    }

    /// Bookkeeping from the most recent successful pass.
    pub fn last_pass(&self) -> PassStats {
        self.state.read().last_pass
    }

    // -------------------------------------------------------------------------
    // Internals (op lock held)
    // -------------------------------------------------------------------------

    fn sort(&self, snapshot: &mut [ItemOf<S>]) {
        snapshot.sort_by(|a, b| self.source.compare(a, b));
    }

    fn fetch_and_apply(&self) -> Vec<S::Key> {
        match self.source.fetch_children() {
            Ok(mut snapshot) => {
                self.sort(&mut snapshot);
                self.apply(snapshot)
            }
            Err(err) => self.fetch_failed(err),
        }
    }

    fn try_fetch_and_apply(&self) -> Result<PassStats, FetchError> {
        match self.source.fetch_children() {
            Ok(mut snapshot) => {
                self.sort(&mut snapshot);
                Ok(self.apply_pass(snapshot).1)
            }
            Err(err) => {
                self.fetch_failed(err.clone());
                Err(err)
            }
        }
    }

    fn merge_into(&self, mut snapshot: Vec<ItemOf<S>>, items: Vec<ItemOf<S>>) -> (Vec<S::Key>, PassStats) {
        for item in items {
            match snapshot.iter().position(|existing| existing.id == item.id) {
                Some(pos) => snapshot[pos] = item,
                None => snapshot.push(item),
            }
        }
        self.sort(&mut snapshot);
        self.apply_pass(snapshot)
    }

    fn fetch_failed(&self, err: FetchError) -> Vec<S::Key> {
        tracing::warn!(
            target: targets::RECONCILE,
            error = %err,
            "child fetch failed, keeping displayed children"
        );
        let displayed = self.displayed();
        self.signals.refresh_failed.emit(err);
        displayed
    }

    fn apply(&self, snapshot: Vec<ItemOf<S>>) -> Vec<S::Key> {
        self.apply_pass(snapshot).0
    }

    fn apply_pass(&self, snapshot: Vec<ItemOf<S>>) -> (Vec<S::Key>, PassStats) {
        let mut seen = HashSet::with_capacity(snapshot.len());
        let displayed: Vec<S::Key> = snapshot
            .iter()
            .filter(|item| seen.insert(&item.id))
            .map(|item| item.id.clone())
            .collect();

        let (stats, changes, reordered) = {
            let mut state = self.state.write();
            let (stats, changes) = state.registry.apply(&snapshot);
            let reordered = order_changed(&state.displayed, &displayed);
            state.snapshot = Some(snapshot);
            state.displayed = displayed.clone();
            state.last_pass = stats;
            (stats, changes, reordered)
        };

        tracing::debug!(target: targets::RECONCILE, %stats, "reconciled children");
        self.emit_changes(changes, reordered, stats);
        (displayed, stats)
    }

    fn emit_changes(&self, changes: PassChanges<S::Key>, reordered: bool, stats: PassStats) {
        let PassChanges {
            added,
            removed,
            updated,
        } = changes;
        if !removed.is_empty() {
            self.signals.nodes_removed.emit(removed);
        }
        if !added.is_empty() {
            self.signals.nodes_added.emit(added);
        }
        if !updated.is_empty() {
            self.signals.nodes_updated.emit(updated);
        }
        if reordered {
            self.signals.children_reordered.emit(());
        }
        self.signals.pass_completed.emit(stats);
    }

    /// Acts on a plan only if the branch still holds a snapshot, and reports
    /// the pass it applied.
    ///
    /// The attachment check and the pass run under one hold of the op lock,
    /// so a concurrent [`detach`](Self::detach) is never undone by a plan
    /// classified before it. Returns `Ok(None)` when there was nothing to
    /// act on.
    pub fn try_apply_plan(
        &self,
        plan: BatchPlan<S::Key, S::Payload>,
    ) -> Result<Option<PassStats>, FetchError> {
        let _op = self.op_lock.lock();
        let cached = self.state.read().snapshot.clone();
        let Some(snapshot) = cached else {
            tracing::trace!(target: targets::RELEVANCE, "branch detached, dropping plan");
            return Ok(None);
        };
        match plan {
            BatchPlan::Ignore => Ok(None),
            BatchPlan::FullRefresh => self.try_fetch_and_apply().map(Some),
            BatchPlan::Replace(items) => Ok(Some(self.merge_into(snapshot, items).1)),
        }
    }
}

impl<S: RelevanceFilter> ChildReconciler<S> {
    /// Classifies a batch against this branch without acting on it.
    pub fn classify(&self, events: &[S::Event]) -> Action<S::Key, S::Payload> {
        self.source.classify(events)
    }

    /// Classifies a batch and acts on it: a structural event triggers a
    /// [`refresh`](Self::refresh), replacements are merged in one pass, and
    /// an irrelevant batch does nothing.
    pub fn handle_events(&self, events: &[S::Event]) -> BatchPlan<S::Key, S::Payload> {
        let plan = self.source.plan(events);
        self.apply_plan(plan.clone());
        plan
    }

    /// Acts on a plan produced earlier (possibly on another thread).
    pub fn apply_plan(&self, plan: BatchPlan<S::Key, S::Payload>) -> Vec<S::Key> {
        match plan {
            BatchPlan::Ignore => self.displayed(),
            BatchPlan::FullRefresh => {
                tracing::debug!(target: targets::RELEVANCE, "structural change, refreshing branch");
                self.refresh()
            }
            BatchPlan::Replace(items) => {
                tracing::trace!(target: targets::RELEVANCE, count = items.len(), "merging replacements");
                self.merge_items(items)
            }
        }
    }
}

/// Returns `true` if identities present before and after appear in a
/// different relative order.
fn order_changed<K: Eq + std::hash::Hash>(before: &[K], after: &[K]) -> bool {
    let before_set: HashSet<&K> = before.iter().collect();
    let after_set: HashSet<&K> = after.iter().collect();
    let kept_before = before.iter().filter(|id| after_set.contains(id));
    let kept_after = after.iter().filter(|id| before_set.contains(id));
    !kept_before.eq(kept_after)
}

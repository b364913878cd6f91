//! Identity-keyed flat result listings.
//!
//! Unlike tree nodes, flat rows carry no identity-sensitive state, so a
//! [`FlatResultList`] never patches rows in place. It keeps the latest result
//! set, reports which identities came and went, and leaves rebuilding row
//! objects to a [`RowFactory`].

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::Arc;

use evidence_lattice_core::logging::targets;
use parking_lot::{Mutex, RwLock};

use super::signals::FlatListSignals;

/// The stable key of a flat row: its own id plus the result set's type tag.
///
/// Two rows are the same row iff their identities are equal, whatever
/// else about them changed.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RowIdentity {
    pub id: i64,
    pub type_tag: String,
}

impl RowIdentity {
    /// The identity of row `id` in the result set tagged `type_tag`.
    pub fn new(id: i64, type_tag: impl Into<String>) -> Self {
        Self {
            id,
            type_tag: type_tag.into(),
        }
    }
}

impl fmt::Display for RowIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.type_tag, self.id)
    }
}

/// A row that can name its [`RowIdentity`].
pub trait IdentifiedRow {
    fn row_identity(&self) -> RowIdentity;
}

impl IdentifiedRow for RowIdentity {
    fn row_identity(&self) -> RowIdentity {
        self.clone()
    }
}

/// Identity changes between two result sets.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListDelta {
    /// Identities new in this result set, in result order.
    pub inserted: Vec<RowIdentity>,
    /// Identities no longer present, in previous order.
    pub removed: Vec<RowIdentity>,
    /// Identities present in both, in result order.
    pub retained: Vec<RowIdentity>,
}

impl ListDelta {
    /// Returns `true` if no identity was inserted or removed.
    pub fn is_empty(&self) -> bool {
        self.inserted.is_empty() && self.removed.is_empty()
    }
}

/// Builds row objects for a rendering layer.
///
/// Any `Fn(&RowIdentity, &R) -> T` closure is a factory.
pub trait RowFactory<R> {
    /// The row object handed to the renderer.
    type Row;

    /// Creates a fresh row object for `source`.
    fn create_row(&self, identity: &RowIdentity, source: &R) -> Self::Row;
}

impl<R, T, F> RowFactory<R> for F
where
    F: Fn(&RowIdentity, &R) -> T,
{
    type Row = T;

    fn create_row(&self, identity: &RowIdentity, source: &R) -> T {
        self(identity, source)
    }
}

struct ListState<R> {
    rows: Arc<Vec<R>>,
    identities: Vec<RowIdentity>,
    positions: HashMap<RowIdentity, usize>,
}

impl<R> Default for ListState<R> {
    fn default() -> Self {
        Self {
            rows: Arc::new(Vec::new()),
            identities: Vec::new(),
            positions: HashMap::new(),
        }
    }
}

/// The current result set of a flat listing.
///
/// Updates are serialized per instance, and each `structure_changed` is
/// emitted before the next update starts, so deltas arrive in commit order.
///
/// # Signal Usage
///
/// Slots may call read accessors, but must not call
/// [`update`](Self::update) on the emitting list.
pub struct FlatResultList<R> {
    op_lock: Mutex<()>,
    state: RwLock<ListState<R>>,
    signals: FlatListSignals,
}

impl<R> Default for FlatResultList<R>
where
    R: IdentifiedRow + Send + Sync + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<R> FlatResultList<R>
where
    R: IdentifiedRow + Send + Sync + 'static,
{
    /// Creates an empty list.
    pub fn new() -> Self {
        Self {
            op_lock: Mutex::new(()),
            state: RwLock::new(ListState::default()),
            signals: FlatListSignals::new(),
        }
    }

    /// The signals for this list.
    pub fn signals(&self) -> &FlatListSignals {
        &self.signals
    }

    /// Replaces the result set and emits `structure_changed`.
    ///
    /// The signal fires on every update, even an identity-preserving one,
    /// since row contents may have changed.
    pub fn update(&self, rows: Vec<R>) -> ListDelta {
        let _op = self.op_lock.lock();
        let identities: Vec<RowIdentity> = rows.iter().map(IdentifiedRow::row_identity).collect();

        let mut positions = HashMap::with_capacity(identities.len());
        for (index, identity) in identities.iter().enumerate() {
            positions.entry(identity.clone()).or_insert(index);
        }
        if positions.len() != identities.len() {
            tracing::warn!(
                target: targets::FLAT_LIST,
                duplicates = identities.len() - positions.len(),
                "result set contains duplicate row identities"
            );
        }

        let delta = {
            let mut state = self.state.write();
            let delta = diff(&state.identities, &state.positions, &identities, &positions);
            *state = ListState {
                rows: Arc::new(rows),
                identities,
                positions,
            };
            delta
        };

        tracing::debug!(
            target: targets::FLAT_LIST,
            inserted = delta.inserted.len(),
            removed = delta.removed.len(),
            retained = delta.retained.len(),
            "result set replaced"
        );
        self.signals.structure_changed.emit(delta.clone());
        delta
    }

    /// The current result set.
    pub fn rows(&self) -> Arc<Vec<R>> {
        self.state.read().rows.clone()
    }

    /// Row identities in result order.
    pub fn identities(&self) -> Vec<RowIdentity> {
        self.state.read().identities.clone()
    }

    /// Position of the row with `identity`, if present.
    pub fn position_of(&self, identity: &RowIdentity) -> Option<usize> {
        self.state.read().positions.get(identity).copied()
    }

    /// Returns `true` if a row with `identity` is present.
    pub fn contains(&self, identity: &RowIdentity) -> bool {
        self.state.read().positions.contains_key(identity)
    }

    /// Number of rows, duplicates included.
    pub fn len(&self) -> usize {
        self.state.read().identities.len()
    }

    /// Returns `true` if the result set is empty.
    pub fn is_empty(&self) -> bool {
        self.state.read().identities.is_empty()
    }

    /// Builds a fresh row object for every row, in result order.
    pub fn build_rows<F>(&self, factory: &F) -> Vec<F::Row>
    where
        F: RowFactory<R>,
    {
        let state = self.state.read();
        state
            .rows
            .iter()
            .zip(&state.identities)
            .map(|(row, identity)| factory.create_row(identity, row))
            .collect()
    }
}

fn diff(
    old: &[RowIdentity],
    old_positions: &HashMap<RowIdentity, usize>,
    new: &[RowIdentity],
    new_positions: &HashMap<RowIdentity, usize>,
) -> ListDelta {
    let mut delta = ListDelta::default();
    let mut seen = HashSet::new();
    for identity in new {
        if !seen.insert(identity) {
            continue;
        }
        if old_positions.contains_key(identity) {
            delta.retained.push(identity.clone());
        } else {
            delta.inserted.push(identity.clone());
        }
    }
    seen.clear();
    for identity in old {
        if seen.insert(identity) && !new_positions.contains_key(identity) {
            delta.removed.push(identity.clone());
        }
    }
    delta
}

//! Retained nodes and the identity registry that owns them.
//!
//! A [`RetainedNode`] is created once per logical identity and mutated in
//! place on later passes, so an externally held `Arc<RetainedNode>` (a
//! pending selection, an expanded-state map) stays valid across refreshes.
//!
//! The registry is an arena: nodes live in a `SlotMap` keyed by a
//! generational [`NodeKey`], with a side index from identity to key. When an
//! identity disappears and later comes back it gets a fresh key and a fresh
//! node; it is never resurrected.

use std::collections::{HashMap, HashSet};
use std::fmt::Debug;
use std::hash::Hash;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use evidence_lattice_core::PassStats;
use evidence_lattice_core::logging::targets;
use parking_lot::RwLock;
use slotmap::{SlotMap, new_key_type};

use super::error::{ModelError, ModelResult};
use super::item::{Count, Item};

new_key_type! {
    /// Generational arena key of a retained node.
    pub struct NodeKey;
}

/// A long-lived proxy for one tree identity.
///
/// The identity is fixed at creation. [`update`](Self::update) replaces the
/// displayed item in place and rejects items carrying a different identity.
pub struct RetainedNode<K, P> {
    key: NodeKey,
    id: K,
    item: RwLock<Item<K, P>>,
    rejected_updates: AtomicUsize,
}

impl<K, P> RetainedNode<K, P>
where
    K: Clone + Eq + Debug,
    P: Clone + PartialEq,
{
    fn new(key: NodeKey, item: Item<K, P>) -> Self {
        Self {
            key,
            id: item.id.clone(),
            item: RwLock::new(item),
            rejected_updates: AtomicUsize::new(0),
        }
    }

    /// The identity this node was created for.
    pub fn id(&self) -> &K {
        &self.id
    }

    /// The node's arena key.
    pub fn key(&self) -> NodeKey {
        self.key
    }

    /// A copy of the currently displayed item.
    pub fn item(&self) -> Item<K, P> {
        self.item.read().clone()
    }

    /// Provides read access to the displayed item without cloning it.
    pub fn with_item<F, R>(&self, f: F) -> R
    where
        F: FnOnce(&Item<K, P>) -> R,
    {
        f(&self.item.read())
    }

    /// The currently displayed count.
    pub fn display_count(&self) -> Count {
        self.item.read().display_count
    }

    /// The currently displayed name.
    pub fn display_name(&self) -> String {
        self.item.read().display_name.clone()
    }

    /// The current type key.
    pub fn type_key(&self) -> String {
        self.item.read().type_key.clone()
    }

    /// Applies `item` in place.
    ///
    /// Returns `Ok(true)` if any display field changed and `Ok(false)` if the
    /// item was identical. An item with a different identity is a collaborator
    /// defect: it is logged, counted in
    /// [`rejected_updates`](Self::rejected_updates), and dropped.
    pub fn update(&self, item: Item<K, P>) -> ModelResult<bool> {
        if item.id != self.id {
            self.rejected_updates.fetch_add(1, Ordering::Relaxed);
            tracing::error!(
                target: targets::REGISTRY,
                expected = ?self.id,
                actual = ?item.id,
                "rejected update carrying a different identity"
            );
            return Err(ModelError::identity_mismatch(&self.id, &item.id));
        }

        let mut current = self.item.write();
        if *current == item {
            return Ok(false);
        }
        *current = item;
        Ok(true)
    }

    /// Number of updates rejected for carrying the wrong identity.
    pub fn rejected_updates(&self) -> usize {
        self.rejected_updates.load(Ordering::Relaxed)
    }

    /// Returns `true` if both handles point at the same node object.
    pub fn ptr_eq(a: &Arc<Self>, b: &Arc<Self>) -> bool {
        Arc::ptr_eq(a, b)
    }
}

impl<K: Debug, P> Debug for RetainedNode<K, P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RetainedNode")
            .field("key", &self.key)
            .field("id", &self.id)
            .finish_non_exhaustive()
    }
}

/// Identity changes produced by one registry pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PassChanges<K> {
    /// Identities that received a new node.
    pub added: Vec<K>,
    /// Identities whose node was discarded.
    pub removed: Vec<K>,
    /// Identities whose node was updated in place.
    pub updated: Vec<K>,
}

impl<K> Default for PassChanges<K> {
    fn default() -> Self {
        Self {
            added: Vec::new(),
            removed: Vec::new(),
            updated: Vec::new(),
        }
    }
}

/// Arena of retained nodes indexed by identity.
pub struct NodeRegistry<K, P> {
    nodes: SlotMap<NodeKey, Arc<RetainedNode<K, P>>>,
    index: HashMap<K, NodeKey>,
}

impl<K, P> Default for NodeRegistry<K, P> {
    fn default() -> Self {
        Self {
            nodes: SlotMap::with_key(),
            index: HashMap::new(),
        }
    }
}

impl<K, P> NodeRegistry<K, P>
where
    K: Clone + Eq + Hash + Debug,
    P: Clone + PartialEq,
{
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of retained nodes.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Returns `true` if no node is retained.
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Looks up the node for an identity.
    pub fn get(&self, id: &K) -> Option<&Arc<RetainedNode<K, P>>> {
        self.index.get(id).and_then(|key| self.nodes.get(*key))
    }

    /// Looks up a node by arena key.
    pub fn get_by_key(&self, key: NodeKey) -> Option<&Arc<RetainedNode<K, P>>> {
        self.nodes.get(key)
    }

    /// Returns `true` if a node is retained for `id`.
    pub fn contains(&self, id: &K) -> bool {
        self.index.contains_key(id)
    }

    /// Drops every node.
    pub fn clear(&mut self) {
        self.nodes.clear();
        self.index.clear();
    }

    fn insert(&mut self, item: Item<K, P>) {
        let id = item.id.clone();
        let key = self
            .nodes
            .insert_with_key(|key| Arc::new(RetainedNode::new(key, item)));
        self.index.insert(id, key);
    }

    fn remove(&mut self, id: &K) -> Option<Arc<RetainedNode<K, P>>> {
        let key = self.index.remove(id)?;
        self.nodes.remove(key)
    }

    /// Brings the registry in line with `snapshot`.
    ///
    /// Nodes whose identity is absent from the snapshot are discarded.
    /// Nodes whose identity persists are updated in place, unless the type key
    /// changed, in which case the old node is discarded and a new one
    /// created. New identities get new nodes.
    ///
    /// A snapshot containing the same identity twice is a collaborator
    /// contract violation; the later occurrence wins. Avoid, not fatal.
    pub fn apply(&mut self, snapshot: &[Item<K, P>]) -> (PassStats, PassChanges<K>) {
        let mut stats = PassStats::default();
        let mut changes = PassChanges::default();

        let live: HashSet<&K> = snapshot.iter().map(|item| &item.id).collect();
        if live.len() != snapshot.len() {
            tracing::warn!(
                target: targets::REGISTRY,
                duplicates = snapshot.len() - live.len(),
                "snapshot contains duplicate identities, last occurrence wins"
            );
        }

        let stale: Vec<K> = self
            .index
            .keys()
            .filter(|id| !live.contains(id))
            .cloned()
            .collect();
        for id in stale {
            self.remove(&id);
            stats.removed += 1;
            changes.removed.push(id);
        }

        for item in snapshot {
            let comparable = self
                .get(&item.id)
                .map(|node| node.with_item(|current| current.type_key == item.type_key));

            match comparable {
                Some(true) => {
                    let updated = self
                        .get(&item.id)
                        .map(|node| node.update(item.clone()))
                        .unwrap_or(Ok(false));
                    match updated {
                        Ok(true) => {
                            stats.updated += 1;
                            changes.updated.push(item.id.clone());
                        }
                        Ok(false) => stats.unchanged += 1,
                        Err(_) => {}
                    }
                }
                Some(false) => {
                    self.remove(&item.id);
                    stats.removed += 1;
                    changes.removed.push(item.id.clone());
                    self.insert(item.clone());
                    stats.created += 1;
                    changes.added.push(item.id.clone());
                }
                None => {
                    self.insert(item.clone());
                    stats.created += 1;
                    changes.added.push(item.id.clone());
                }
            }
        }

        (stats, changes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(id: u64, count: Count) -> Item<u64, ()> {
        Item::new(id, "tag_name", (), format!("Item {id}")).with_count(count)
    }

    #[test]
    fn test_update_in_place() {
        let mut registry = NodeRegistry::new();
        registry.apply(&[item(1, Count::Exact(3))]);
        let before = registry.get(&1).cloned().unwrap();

        let (stats, changes) = registry.apply(&[item(1, Count::Exact(4))]);
        let after = registry.get(&1).cloned().unwrap();

        assert!(RetainedNode::ptr_eq(&before, &after));
        assert_eq!(after.display_count(), Count::Exact(4));
        assert_eq!(stats.updated, 1);
        assert!(stats.is_churn_free());
        assert_eq!(changes.updated, vec![1]);
    }

    #[test]
    fn test_identity_mismatch_rejected() {
        let mut registry = NodeRegistry::new();
        registry.apply(&[item(5, Count::Exact(1))]);
        let node = registry.get(&5).cloned().unwrap();

        let result = node.update(item(7, Count::Exact(9)));

        assert!(matches!(result, Err(ModelError::IdentityMismatch { .. })));
        assert_eq!(node.id(), &5);
        assert_eq!(node.display_count(), Count::Exact(1));
        assert_eq!(node.rejected_updates(), 1);
    }

    #[test]
    fn test_unchanged_item_reports_false() {
        let mut registry = NodeRegistry::new();
        registry.apply(&[item(1, Count::Exact(3))]);
        let node = registry.get(&1).cloned().unwrap();

        assert_eq!(node.update(item(1, Count::Exact(3))), Ok(false));
        assert_eq!(node.update(item(1, Count::AtLeast(3))), Ok(true));
    }

    #[test]
    fn test_removed_identity_is_not_resurrected() {
        let mut registry = NodeRegistry::new();
        registry.apply(&[item(1, Count::Exact(1))]);
        let first = registry.get(&1).cloned().unwrap();

        registry.apply(&[]);
        assert!(registry.is_empty());

        registry.apply(&[item(1, Count::Exact(1))]);
        let second = registry.get(&1).cloned().unwrap();

        assert!(!RetainedNode::ptr_eq(&first, &second));
        assert_ne!(first.key(), second.key());
        assert!(registry.get_by_key(first.key()).is_none());
    }

    #[test]
    fn test_type_key_change_replaces_node() {
        let mut registry = NodeRegistry::new();
        registry.apply(&[item(1, Count::Exact(1))]);
        let before = registry.get(&1).cloned().unwrap();

        let moved = Item::new(1_u64, "file_size", (), "Item 1");
        let (stats, _) = registry.apply(&[moved]);
        let after = registry.get(&1).cloned().unwrap();

        assert!(!RetainedNode::ptr_eq(&before, &after));
        assert_eq!(stats.created, 1);
        assert_eq!(stats.removed, 1);
        assert_eq!(after.type_key(), "file_size");
    }

    #[test]
    fn test_duplicate_identity_last_write_wins() {
        let mut registry = NodeRegistry::new();
        let (stats, _) = registry.apply(&[item(1, Count::Exact(1)), item(1, Count::Exact(2))]);

        assert_eq!(registry.len(), 1);
        assert_eq!(stats.created, 1);
        assert_eq!(registry.get(&1).unwrap().display_count(), Count::Exact(2));
    }
}

//! The child-fetch collaborator contract.

use std::cmp::Ordering;
use std::fmt::Debug;
use std::hash::Hash;

use super::error::FetchError;
use super::item::Item;

/// Supplies the children of one tree branch.
///
/// Implementations wrap a data-access collaborator that is handed in at
/// construction time; the engine never reaches for a global accessor.
/// `fetch_children` may block.
pub trait ChildSource: Send + Sync {
    /// Sibling identity.
    type Key: Clone + Eq + Hash + Debug + Send + Sync + 'static;
    /// Item payload.
    type Payload: Clone + PartialEq + Send + Sync + 'static;

    /// Fetches the current children in the collaborator's order.
    fn fetch_children(&self) -> Result<Vec<Item<Self::Key, Self::Payload>>, FetchError>;

    /// Orders two siblings of this branch.
    ///
    /// The default keeps the collaborator's order.
    fn compare(
        &self,
        _a: &Item<Self::Key, Self::Payload>,
        _b: &Item<Self::Key, Self::Payload>,
    ) -> Ordering {
        Ordering::Equal
    }
}

/// A [`ChildSource`] built from closures, handy for tests and simple
/// static branches.
pub struct FnSource<K, P, F> {
    fetch: F,
    _marker: std::marker::PhantomData<fn() -> (K, P)>,
}

impl<K, P, F> FnSource<K, P, F>
where
    F: Fn() -> Result<Vec<Item<K, P>>, FetchError> + Send + Sync,
{
    /// Wraps a fetch closure.
    pub fn new(fetch: F) -> Self {
        Self {
            fetch,
            _marker: std::marker::PhantomData,
        }
    }
}

impl<K, P, F> ChildSource for FnSource<K, P, F>
where
    K: Clone + Eq + Hash + Debug + Send + Sync + 'static,
    P: Clone + PartialEq + Send + Sync + 'static,
    F: Fn() -> Result<Vec<Item<K, P>>, FetchError> + Send + Sync,
{
    type Key = K;
    type Payload = P;

    fn fetch_children(&self) -> Result<Vec<Item<K, P>>, FetchError> {
        (self.fetch)()
    }
}

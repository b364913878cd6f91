//! Paged result caching.
//!
//! A [`ResultPageCache`] holds exactly one materialized page of a larger
//! result set. The page is fetched lazily through a [`PageQuery`] and kept
//! until the paging position or the query changes, or a caller forces a
//! [`refresh`](ResultPageCache::refresh).
//!
//! # Example
//!
//! ```
//! use evidence_lattice::model::{FnQuery, Page, ResultPageCache};
//!
//! let rows: Vec<u32> = (0..37).collect();
//! let cache: ResultPageCache<u32> = ResultPageCache::new(10).unwrap();
//! cache.set_query(FnQuery::new(move |size, index| {
//!     let items = rows.iter().skip(size * index).take(size).copied().collect();
//!     Ok(Page::new(size, index, rows.len() as u64, items))
//! }));
//!
//! assert_eq!(cache.current_page().unwrap().items.len(), 10);
//! assert_eq!(cache.total_pages(), 4);
//! assert!(cache.goto_page(4).is_err());
//! ```

use std::sync::Arc;

use evidence_lattice_core::logging::targets;
use parking_lot::{Mutex, RwLock};

use super::error::{FetchError, ModelError, ModelResult};
use super::signals::PageSignals;

/// Page size used when none is configured.
pub const DEFAULT_PAGE_SIZE: usize = 500;

/// One materialized page of a result set.
#[derive(Debug, Clone, PartialEq)]
pub struct Page<R> {
    /// Rows per page.
    pub page_size: usize,
    /// Zero-based page position.
    pub page_index: usize,
    /// Rows in the whole result set.
    pub total_count: u64,
    /// The rows of this page, in result order.
    pub items: Vec<R>,
}

impl<R> Page<R> {
    /// Creates a page.
    pub fn new(page_size: usize, page_index: usize, total_count: u64, items: Vec<R>) -> Self {
        Self {
            page_size,
            page_index,
            total_count,
            items,
        }
    }

    /// An empty result set.
    pub fn empty(page_size: usize) -> Self {
        Self::new(page_size, 0, 0, Vec::new())
    }

    /// `ceil(total_count / page_size)`.
    pub fn total_pages(&self) -> usize {
        total_pages(self.total_count, self.page_size)
    }

    /// Returns `true` if rows exist past this page.
    pub fn has_next_page(&self) -> bool {
        (self.page_index as u64 + 1).saturating_mul(self.page_size as u64) < self.total_count
    }

    /// Returns `true` if this is not the first page.
    pub fn has_prev_page(&self) -> bool {
        self.page_index > 0
    }

    /// Number of rows on this page.
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Returns `true` if this page holds no rows.
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// The paging coordinates of this page.
    pub fn info(&self) -> PageInfo {
        PageInfo {
            page_size: self.page_size,
            page_index: self.page_index,
            total_count: self.total_count,
            total_pages: self.total_pages(),
        }
    }
}

/// Paging coordinates, emitted with [`PageSignals::page_changed`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageInfo {
    pub page_size: usize,
    pub page_index: usize,
    pub total_count: u64,
    pub total_pages: usize,
}

fn total_pages(total_count: u64, page_size: usize) -> usize {
    if page_size == 0 {
        return 0;
    }
    total_count.div_ceil(page_size as u64) as usize
}

/// The backing query of a page cache.
pub trait PageQuery: Send + Sync {
    /// Row type.
    type Row: Send + Sync + 'static;
    /// Change event that may invalidate a fetched page.
    type Event;

    /// Fetches one page. `hard_refresh` asks the collaborator to bypass any
    /// cache of its own. May block.
    fn fetch(
        &self,
        page_size: usize,
        page_index: usize,
        hard_refresh: bool,
    ) -> Result<Page<Self::Row>, FetchError>;

    /// Returns `true` if `event` makes the page at this position stale.
    fn is_invalidated_by(&self, _page_size: usize, _page_index: usize, _event: &Self::Event) -> bool {
        false
    }
}

type Invalidation<E> = Box<dyn Fn(&E) -> bool + Send + Sync>;

/// A [`PageQuery`] built from a fetch closure.
pub struct FnQuery<R, E, F> {
    fetch: F,
    invalidation: Option<Invalidation<E>>,
    _marker: std::marker::PhantomData<fn() -> R>,
}

impl<R, E, F> FnQuery<R, E, F>
where
    F: Fn(usize, usize) -> Result<Page<R>, FetchError> + Send + Sync,
{
    /// Wraps `fetch(page_size, page_index)`.
    pub fn new(fetch: F) -> Self {
        Self {
            fetch,
            invalidation: None,
            _marker: std::marker::PhantomData,
        }
    }

    /// Sets the predicate deciding which events invalidate a fetched page.
    pub fn invalidated_by<G>(mut self, predicate: G) -> Self
    where
        G: Fn(&E) -> bool + Send + Sync + 'static,
    {
        self.invalidation = Some(Box::new(predicate));
        self
    }
}

impl<R, E, F> PageQuery for FnQuery<R, E, F>
where
    R: Send + Sync + 'static,
    F: Fn(usize, usize) -> Result<Page<R>, FetchError> + Send + Sync,
{
    type Row = R;
    type Event = E;

    fn fetch(&self, page_size: usize, page_index: usize, _hard_refresh: bool) -> Result<Page<R>, FetchError> {
        (self.fetch)(page_size, page_index)
    }

    fn is_invalidated_by(&self, _page_size: usize, _page_index: usize, event: &E) -> bool {
        self.invalidation.as_ref().is_some_and(|predicate| predicate(event))
    }
}

type SharedQuery<R, E> = Arc<dyn PageQuery<Row = R, Event = E>>;

struct CacheState<R, E> {
    query: Option<SharedQuery<R, E>>,
    page_size: usize,
    page_index: usize,
    page: Option<Arc<Page<R>>>,
    fetch_pending: bool,
}

/// Serves one page of a result set at a time.
///
/// Mutating operations are serialized per instance; `current_page` takes
/// the same lock only while a lazy fetch is pending. The other accessors
/// never block on a fetch.
///
/// # Signal Usage
///
/// Slots may call read accessors, but must not call mutating operations on
/// the emitting cache.
pub struct ResultPageCache<R, E = ()> {
    op_lock: Mutex<()>,
    state: RwLock<CacheState<R, E>>,
    signals: PageSignals,
}

impl<R, E> std::fmt::Debug for ResultPageCache<R, E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResultPageCache").finish_non_exhaustive()
    }
}

impl<R, E> Default for ResultPageCache<R, E>
where
    R: Send + Sync + 'static,
    E: 'static,
{
    fn default() -> Self {
        Self::with_page_size(DEFAULT_PAGE_SIZE)
    }
}

impl<R, E> ResultPageCache<R, E>
where
    R: Send + Sync + 'static,
    E: 'static,
{
    /// Creates a cache with no query. `page_size` must be positive.
    pub fn new(page_size: usize) -> ModelResult<Self> {
        if page_size == 0 {
            return Err(ModelError::invalid_argument("page size must be positive"));
        }
        Ok(Self::with_page_size(page_size))
    }

    fn with_page_size(page_size: usize) -> Self {
        Self {
            op_lock: Mutex::new(()),
            state: RwLock::new(CacheState {
                query: None,
                page_size,
                page_index: 0,
                page: None,
                fetch_pending: false,
            }),
            signals: PageSignals::new(),
        }
    }

    /// The signals for this cache.
    pub fn signals(&self) -> &PageSignals {
        &self.signals
    }

    // -------------------------------------------------------------------------
    // Query lifecycle
    // -------------------------------------------------------------------------

    /// Installs a new query and resets to the first page.
    ///
    /// Nothing is fetched until the page is next requested.
    pub fn set_query<Q>(&self, query: Q)
    where
        Q: PageQuery<Row = R, Event = E> + 'static,
    {
        let _op = self.op_lock.lock();
        let mut state = self.state.write();
        state.query = Some(Arc::new(query));
        state.page_index = 0;
        state.page = None;
        state.fetch_pending = true;
        tracing::debug!(target: targets::PAGING, page_size = state.page_size, "query installed");
    }

    /// Removes the query; page accessors return nothing until the next
    /// [`set_query`](Self::set_query).
    pub fn clear_query(&self) {
        let _op = self.op_lock.lock();
        {
            let mut state = self.state.write();
            state.query = None;
            state.page_index = 0;
            state.page = None;
            state.fetch_pending = false;
        }
        tracing::debug!(target: targets::PAGING, "query cleared");
        self.signals.query_cleared.emit(());
    }

    /// Returns `true` if a query is installed.
    pub fn has_query(&self) -> bool {
        self.state.read().query.is_some()
    }

    // -------------------------------------------------------------------------
    // Page access
    // -------------------------------------------------------------------------

    /// The current page, fetching it first if a query was just installed.
    ///
    /// Returns `None` with no query, or when the first fetch for the query
    /// failed.
    pub fn current_page(&self) -> Option<Arc<Page<R>>> {
        if !self.state.read().fetch_pending {
            return self.peek_page();
        }

        let _op = self.op_lock.lock();
        let (index, pending) = {
            let state = self.state.read();
            (state.page_index, state.fetch_pending)
        };
        if pending {
            // Failure is already logged and signalled.
            let _ = self.fetch_locked(None, index, false);
        }
        self.peek_page()
    }

    /// The current page without ever fetching.
    pub fn peek_page(&self) -> Option<Arc<Page<R>>> {
        self.state.read().page.clone()
    }

    /// Moves to page `index`.
    ///
    /// Fails with `InvalidArgument` if no query is installed or, once the
    /// result size is known, if `index` is past the last page. If the result
    /// set shrank since the last fetch, the cache lands on the new last page.
    /// A failed fetch keeps the previous page and position.
    pub fn goto_page(&self, index: usize) -> ModelResult<Arc<Page<R>>> {
        let _op = self.op_lock.lock();
        self.require_query()?;
        match self.peek_page() {
            Some(page) => {
                check_in_range(index, page.total_pages())?;
                self.fetch_clamped(None, index, false)
            }
            None => self.fetch_locked(None, index, false),
        }
    }

    /// Moves to the following page.
    pub fn next(&self) -> ModelResult<Arc<Page<R>>> {
        let _op = self.op_lock.lock();
        self.require_query()?;
        let page = self.ensure_fetched_locked()?;
        if !page.has_next_page() {
            return Err(ModelError::invalid_argument("already on the last page"));
        }
        self.fetch_clamped(None, page.page_index + 1, false)
    }

    /// Moves to the preceding page.
    pub fn previous(&self) -> ModelResult<Arc<Page<R>>> {
        let _op = self.op_lock.lock();
        self.require_query()?;
        let index = self.state.read().page_index;
        if index == 0 {
            return Err(ModelError::invalid_argument("already on the first page"));
        }
        self.fetch_clamped(None, index - 1, false)
    }

    /// Changes the page size, keeping the page index.
    ///
    /// If the kept index would be past the end at the new size, the cache
    /// moves to the last page instead. With no query installed only the size
    /// is recorded and `Ok(None)` is returned.
    pub fn resize(&self, page_size: usize) -> ModelResult<Option<Arc<Page<R>>>> {
        if page_size == 0 {
            return Err(ModelError::invalid_argument("page size must be positive"));
        }

        let _op = self.op_lock.lock();
        let index = {
            let mut state = self.state.write();
            if state.query.is_none() {
                state.page_size = page_size;
                return Ok(None);
            }
            state.page_index
        };

        self.fetch_clamped(Some(page_size), index, false).map(Some)
    }

    /// Re-fetches the current position, asking the collaborator to bypass
    /// its own caches.
    ///
    /// If the result set shrank below the current position, the cache moves
    /// to the new last page.
    pub fn refresh(&self) -> ModelResult<Arc<Page<R>>> {
        let _op = self.op_lock.lock();
        self.require_query()?;
        let index = self.state.read().page_index;
        self.fetch_clamped(None, index, true)
    }

    /// Returns `true` if `event` invalidates the fetched page.
    pub fn is_refresh_required(&self, event: &E) -> bool {
        let state = self.state.read();
        match (&state.query, &state.page) {
            (Some(query), Some(_)) => query.is_invalidated_by(state.page_size, state.page_index, event),
            _ => false,
        }
    }

    // -------------------------------------------------------------------------
    // Paging state
    // -------------------------------------------------------------------------

    /// Rows per page.
    pub fn page_size(&self) -> usize {
        self.state.read().page_size
    }

    /// Zero-based index of the current page.
    pub fn page_index(&self) -> usize {
        self.state.read().page_index
    }

    /// Total pages of the fetched result set, or 0 before the first fetch.
    pub fn total_pages(&self) -> usize {
        self.state.read().page.as_ref().map_or(0, |page| page.total_pages())
    }

    /// Returns `true` if rows exist past the fetched page.
    pub fn has_next_page(&self) -> bool {
        self.state.read().page.as_ref().is_some_and(|page| page.has_next_page())
    }

    /// Returns `true` if the current page is not the first.
    pub fn has_prev_page(&self) -> bool {
        self.state.read().page_index > 0
    }

    // -------------------------------------------------------------------------
    // Internals (op lock held)
    // -------------------------------------------------------------------------

    fn require_query(&self) -> ModelResult<()> {
        if self.state.read().query.is_none() {
            return Err(ModelError::invalid_argument("no query installed"));
        }
        Ok(())
    }

    fn ensure_fetched_locked(&self) -> ModelResult<Arc<Page<R>>> {
        if let Some(page) = self.peek_page() {
            return Ok(page);
        }
        let index = self.state.read().page_index;
        self.fetch_locked(None, index, false)
    }

    /// Fetches `index` at `page_size` (or the current size) and, on
    /// success, commits the page and position.
    fn fetch_locked(
        &self,
        page_size: Option<usize>,
        index: usize,
        hard_refresh: bool,
    ) -> ModelResult<Arc<Page<R>>> {
        let page = self.fetch_raw(page_size, index, hard_refresh)?;
        // Only a page fetched blind (before the size was known) can fail here.
        check_in_range(index, page.total_pages())?;
        Ok(self.commit(page))
    }

    /// Fetches `index`, or the last page if the fresh total puts `index` past
    /// the end, and commits the result.
    fn fetch_clamped(
        &self,
        page_size: Option<usize>,
        index: usize,
        hard_refresh: bool,
    ) -> ModelResult<Arc<Page<R>>> {
        let mut page = self.fetch_raw(page_size, index, hard_refresh)?;
        let last = page.total_pages().max(1) - 1;
        if index > last {
            tracing::debug!(target: targets::PAGING, index, last, "page index clamped to last page");
            page = self.fetch_raw(page_size, last, hard_refresh)?;
        }
        Ok(self.commit(page))
    }

    /// Runs the query without touching the committed page. Failures are
    /// logged and signalled.
    fn fetch_raw(
        &self,
        page_size: Option<usize>,
        index: usize,
        hard_refresh: bool,
    ) -> ModelResult<Page<R>> {
        let (query, size) = {
            let state = self.state.read();
            let query = state
                .query
                .clone()
                .ok_or_else(|| ModelError::invalid_argument("no query installed"))?;
            (query, page_size.unwrap_or(state.page_size))
        };

        match query.fetch(size, index, hard_refresh) {
            Ok(mut page) => {
                page.page_size = size;
                page.page_index = index;
                Ok(page)
            }
            Err(err) => {
                tracing::warn!(
                    target: targets::PAGING,
                    page_size = size,
                    page_index = index,
                    error = %err,
                    "page fetch failed, keeping previous page"
                );
                self.state.write().fetch_pending = false;
                self.signals.fetch_failed.emit(err.clone());
                Err(err.into())
            }
        }
    }

    fn commit(&self, page: Page<R>) -> Arc<Page<R>> {
        let page = Arc::new(page);
        {
            let mut state = self.state.write();
            state.page_size = page.page_size;
            state.page_index = page.page_index;
            state.page = Some(page.clone());
            state.fetch_pending = false;
        }
        tracing::trace!(
            target: targets::PAGING,
            page_size = page.page_size,
            page_index = page.page_index,
            total_count = page.total_count,
            "page fetched"
        );
        self.signals.page_changed.emit(page.info());
        page
    }
}

fn check_in_range(index: usize, total_pages: usize) -> ModelResult<()> {
    // An empty result set still has a (blank) first page.
    if index >= total_pages.max(1) {
        return Err(ModelError::invalid_argument(format!(
            "page {index} is out of range ({total_pages} pages)"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    /// Serves `0..total` and counts fetches.
    struct RangeQuery {
        total: Arc<AtomicUsize>,
        fetches: Arc<AtomicUsize>,
        fail: Arc<AtomicBool>,
        hard: Arc<AtomicUsize>,
    }

    impl RangeQuery {
        fn new(total: usize) -> Self {
            Self {
                total: Arc::new(AtomicUsize::new(total)),
                fetches: Arc::new(AtomicUsize::new(0)),
                fail: Arc::new(AtomicBool::new(false)),
                hard: Arc::new(AtomicUsize::new(0)),
            }
        }

        fn handles(&self) -> (Arc<AtomicUsize>, Arc<AtomicBool>, Arc<AtomicUsize>) {
            (self.fetches.clone(), self.fail.clone(), self.hard.clone())
        }
    }

    impl PageQuery for RangeQuery {
        type Row = usize;
        type Event = usize;

        fn fetch(&self, size: usize, index: usize, hard: bool) -> Result<Page<usize>, FetchError> {
            self.fetches.fetch_add(1, Ordering::SeqCst);
            if hard {
                self.hard.fetch_add(1, Ordering::SeqCst);
            }
            if self.fail.load(Ordering::SeqCst) {
                return Err(FetchError::execution("store unavailable"));
            }
            let total = self.total.load(Ordering::SeqCst);
            let items = (0..total).skip(size * index).take(size).collect();
            Ok(Page::new(size, index, total as u64, items))
        }

        fn is_invalidated_by(&self, size: usize, index: usize, row: &usize) -> bool {
            (size * index..size * (index + 1)).contains(row)
        }
    }

    fn cache_with(total: usize, page_size: usize) -> (ResultPageCache<usize, usize>, Arc<AtomicUsize>, Arc<AtomicBool>) {
        let cache = ResultPageCache::new(page_size).unwrap();
        let query = RangeQuery::new(total);
        let (fetches, fail, _) = query.handles();
        cache.set_query(query);
        (cache, fetches, fail)
    }

    #[test]
    fn test_page_arithmetic() {
        let page: Page<u8> = Page::new(10, 0, 37, Vec::new());
        assert_eq!(page.total_pages(), 4);
        assert!(page.has_next_page());
        assert!(!page.has_prev_page());

        let last: Page<u8> = Page::new(10, 3, 37, Vec::new());
        assert!(!last.has_next_page());
        assert!(last.has_prev_page());

        let exact: Page<u8> = Page::new(10, 3, 40, Vec::new());
        assert_eq!(exact.total_pages(), 4);
        assert!(!exact.has_next_page());

        assert_eq!(Page::<u8>::empty(10).total_pages(), 0);
    }

    #[test]
    fn test_zero_page_size_rejected() {
        assert!(ResultPageCache::<usize>::new(0).unwrap_err().is_invalid_argument());
        let cache = ResultPageCache::<usize>::new(5).unwrap();
        assert!(cache.resize(0).unwrap_err().is_invalid_argument());
        assert_eq!(cache.page_size(), 5);
    }

    #[test]
    fn test_set_query_fetches_lazily() {
        let (cache, fetches, _) = cache_with(37, 10);
        assert_eq!(fetches.load(Ordering::SeqCst), 0);
        assert!(cache.peek_page().is_none());

        let page = cache.current_page().unwrap();
        assert_eq!(page.items, (0..10).collect::<Vec<_>>());
        cache.current_page();
        assert_eq!(fetches.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_paging_invariants() {
        let (cache, _, _) = cache_with(37, 10);
        cache.current_page();
        assert_eq!(cache.total_pages(), 4);

        assert!(cache.goto_page(4).unwrap_err().is_invalid_argument());

        let page = cache.goto_page(3).unwrap();
        assert_eq!(page.items, (30..37).collect::<Vec<_>>());
        assert!(!cache.has_next_page());
        assert!(cache.has_prev_page());
        assert!(cache.next().unwrap_err().is_invalid_argument());
    }

    #[test]
    fn test_goto_before_first_fetch_checks_range() {
        let (cache, _, _) = cache_with(37, 10);

        assert!(cache.goto_page(9).unwrap_err().is_invalid_argument());
        assert!(cache.peek_page().is_none());
        assert_eq!(cache.page_index(), 0);

        assert_eq!(cache.goto_page(2).unwrap().page_index, 2);
    }

    #[test]
    fn test_next_and_previous() {
        let (cache, _, _) = cache_with(25, 10);

        assert!(cache.previous().unwrap_err().is_invalid_argument());
        assert_eq!(cache.next().unwrap().page_index, 1);
        assert_eq!(cache.next().unwrap().items, vec![20, 21, 22, 23, 24]);
        assert_eq!(cache.previous().unwrap().page_index, 1);
    }

    #[test]
    fn test_resize_preserves_index() {
        let (cache, _, _) = cache_with(100, 10);
        cache.goto_page(2).unwrap();

        let page = cache.resize(20).unwrap().unwrap();
        assert_eq!(page.page_index, 2);
        assert_eq!(page.items.first(), Some(&40));
        assert_eq!(cache.page_size(), 20);
    }

    #[test]
    fn test_resize_clamps_past_end() {
        let (cache, _, _) = cache_with(37, 10);
        cache.goto_page(3).unwrap();

        let page = cache.resize(25).unwrap().unwrap();
        assert_eq!(page.page_index, 1);
        assert_eq!(cache.total_pages(), 2);
    }

    #[test]
    fn test_resize_without_query_records_size() {
        let cache = ResultPageCache::<usize>::new(10).unwrap();
        assert_eq!(cache.resize(50).unwrap(), None);
        assert_eq!(cache.page_size(), 50);
    }

    #[test]
    fn test_failed_fetch_keeps_previous_page() {
        let (cache, _, fail) = cache_with(37, 10);
        let first = cache.current_page().unwrap();

        let failures = Arc::new(AtomicUsize::new(0));
        let counter = failures.clone();
        cache.signals().fetch_failed.connect(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        fail.store(true, Ordering::SeqCst);
        assert!(matches!(cache.goto_page(1), Err(ModelError::Fetch(_))));
        assert!(matches!(cache.resize(5), Err(ModelError::Fetch(_))));

        assert_eq!(cache.page_index(), 0);
        assert_eq!(cache.page_size(), 10);
        assert!(Arc::ptr_eq(&first, &cache.current_page().unwrap()));
        assert_eq!(failures.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_failed_first_fetch_leaves_page_absent() {
        let (cache, fetches, fail) = cache_with(37, 10);
        fail.store(true, Ordering::SeqCst);

        assert!(cache.current_page().is_none());
        assert!(cache.current_page().is_none());
        assert_eq!(fetches.load(Ordering::SeqCst), 1);

        fail.store(false, Ordering::SeqCst);
        assert_eq!(cache.refresh().unwrap().page_index, 0);
    }

    #[test]
    fn test_clear_query() {
        let (cache, _, _) = cache_with(37, 10);
        cache.goto_page(2).unwrap();

        let cleared = Arc::new(AtomicBool::new(false));
        let flag = cleared.clone();
        cache.signals().query_cleared.connect(move |_| flag.store(true, Ordering::SeqCst));

        cache.clear_query();
        assert!(cleared.load(Ordering::SeqCst));
        assert!(cache.current_page().is_none());
        assert!(!cache.has_query());
        assert!(cache.next().unwrap_err().is_invalid_argument());
        assert!(cache.refresh().unwrap_err().is_invalid_argument());
    }

    #[test]
    fn test_set_query_resets_index() {
        let (cache, _, _) = cache_with(37, 10);
        cache.goto_page(3).unwrap();

        cache.set_query(RangeQuery::new(5));
        assert_eq!(cache.page_index(), 0);
        assert_eq!(cache.current_page().unwrap().items, vec![0, 1, 2, 3, 4]);
    }

    #[test]
    fn test_refresh_is_hard() {
        let cache = ResultPageCache::new(10).unwrap();
        let query = RangeQuery::new(37);
        let (_, _, hard) = query.handles();
        cache.set_query(query);
        cache.current_page();

        cache.refresh().unwrap();
        assert_eq!(hard.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_refresh_after_shrink_moves_to_last_page() {
        let cache = ResultPageCache::new(10).unwrap();
        let query = RangeQuery::new(37);
        let total = query.total.clone();
        cache.set_query(query);
        cache.goto_page(3).unwrap();

        total.store(5, Ordering::SeqCst);
        let page = cache.refresh().unwrap();

        assert_eq!(page.page_index, 0);
        assert_eq!(page.total_count, 5);
        assert_eq!(page.items, vec![0, 1, 2, 3, 4]);
        assert_eq!(cache.page_index(), 0);
        assert_eq!(cache.total_pages(), 1);
    }

    #[test]
    fn test_navigation_after_shrink_lands_on_last_page() {
        let cache = ResultPageCache::new(10).unwrap();
        let query = RangeQuery::new(37);
        let total = query.total.clone();
        cache.set_query(query);
        cache.goto_page(1).unwrap();

        // The cached total still says four pages.
        total.store(12, Ordering::SeqCst);
        let page = cache.goto_page(3).unwrap();
        assert_eq!(page.page_index, 1);
        assert_eq!(page.items, vec![10, 11]);

        total.store(3, Ordering::SeqCst);
        let page = cache.previous().unwrap();
        assert_eq!(page.page_index, 0);
        assert_eq!(page.total_count, 3);
    }

    #[test]
    fn test_is_refresh_required() {
        let (cache, _, _) = cache_with(37, 10);
        assert!(!cache.is_refresh_required(&3));

        cache.goto_page(1).unwrap();
        assert!(cache.is_refresh_required(&12));
        assert!(!cache.is_refresh_required(&3));
    }

    #[test]
    fn test_page_changed_signal() {
        let (cache, _, _) = cache_with(37, 10);
        let seen = Arc::new(Mutex::new(Vec::new()));
        let log = seen.clone();
        cache.signals().page_changed.connect(move |info| log.lock().push(*info));

        cache.current_page();
        cache.goto_page(3).unwrap();

        let seen = seen.lock();
        assert_eq!(seen.len(), 2);
        assert_eq!(
            seen[1],
            PageInfo {
                page_size: 10,
                page_index: 3,
                total_count: 37,
                total_pages: 4,
            }
        );
    }

    #[test]
    fn test_empty_result_set_has_first_page() {
        let (cache, _, _) = cache_with(0, 10);
        let page = cache.current_page().unwrap();
        assert!(page.is_empty());
        assert_eq!(cache.total_pages(), 0);
        assert!(cache.goto_page(0).is_ok());
        assert!(cache.goto_page(1).is_err());
    }

    #[test]
    fn test_fn_query_invalidation() {
        let cache: ResultPageCache<u8, u8> = ResultPageCache::new(2).unwrap();
        cache.set_query(
            FnQuery::new(|size, index| Ok(Page::new(size, index, 4, vec![1, 2])))
                .invalidated_by(|event: &u8| *event == 1),
        );
        cache.current_page();

        assert!(cache.is_refresh_required(&1));
        assert!(!cache.is_refresh_required(&2));
    }
}

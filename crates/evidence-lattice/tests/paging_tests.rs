//! Tests for paged result views and flat-list diffing.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use evidence_lattice::CatalogConfig;
use evidence_lattice::catalog::{
    AnalysisResultQuery, CatalogDao, CatalogEvent, CatalogItem, CatalogParams, ExtensionFilter,
    ExtensionQuery, ParentKey, ResultRow, result_cache,
};
use evidence_lattice::model::{
    FetchError, FlatResultList, ListDelta, Page, PageInfo, RowIdentity,
};
use parking_lot::Mutex;

/// Serves `total` synthetic file rows.
struct FileStore {
    total: Mutex<u64>,
    failing: AtomicBool,
    fetches: AtomicUsize,
}

impl FileStore {
    fn new(total: u64) -> Arc<Self> {
        Arc::new(Self {
            total: Mutex::new(total),
            failing: AtomicBool::new(false),
            fetches: AtomicUsize::new(0),
        })
    }
}

impl CatalogDao for FileStore {
    fn fetch_children(&self, _parent: &ParentKey) -> Result<Vec<CatalogItem>, FetchError> {
        Ok(Vec::new())
    }

    fn fetch_page(
        &self,
        params: &CatalogParams,
        page_size: usize,
        page_index: usize,
        _hard_refresh: bool,
    ) -> Result<Page<ResultRow>, FetchError> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        if self.failing.load(Ordering::SeqCst) {
            return Err(FetchError::execution("query timed out"));
        }
        let total = *self.total.lock();
        let start = (page_size * page_index) as u64;
        let end = (start + page_size as u64).min(total);
        let rows = (start..end)
            .map(|id| {
                let mut row = ResultRow::new(id as i64, "file", format!("IMG_{id:04}.jpg"));
                row.data_source_id = params.data_source_id();
                row.extension = Some("jpg".into());
                row
            })
            .collect();
        Ok(Page::new(page_size, page_index, total, rows))
    }
}

fn jpg_added() -> CatalogEvent {
    CatalogEvent::ContentChanged {
        data_source_id: Some(1),
        object_id: 1000,
        size: 2048,
        extension: Some("jpg".into()),
        mime_type: Some("image/jpeg".into()),
    }
}

#[test]
fn test_paging_through_results() {
    let store = FileStore::new(37);
    let cache = result_cache(&CatalogConfig::default().with_page_size(10)).unwrap();
    cache.set_query(ExtensionQuery::new(store.clone(), ExtensionFilter::Images, Some(1)));
    assert_eq!(store.fetches.load(Ordering::SeqCst), 0);

    let first = cache.current_page().unwrap();
    assert_eq!(first.len(), 10);
    assert_eq!(first.total_pages(), 4);
    assert!(first.has_next_page());
    assert!(!first.has_prev_page());

    let last = cache.goto_page(3).unwrap();
    assert_eq!(last.len(), 7);
    assert!(!last.has_next_page());
    assert!(cache.next().is_err());

    let third = cache.previous().unwrap();
    assert_eq!(third.page_index, 2);
    assert_eq!(third.items[0].object_id, 20);

    let err = cache.goto_page(4).unwrap_err();
    assert!(err.is_invalid_argument());
    assert_eq!(cache.page_index(), 2);
}

#[test]
fn test_page_changed_signal() {
    let store = FileStore::new(25);
    let cache = result_cache(&CatalogConfig::default().with_page_size(10)).unwrap();
    let pages = Arc::new(Mutex::new(Vec::new()));
    let seen = pages.clone();
    cache.signals().page_changed.connect(move |info: &PageInfo| {
        seen.lock().push(info.page_index);
    });

    cache.set_query(ExtensionQuery::new(store, ExtensionFilter::Images, None));
    cache.current_page();
    cache.next().unwrap();
    cache.next().unwrap();

    assert_eq!(*pages.lock(), vec![0, 1, 2]);
}

#[test]
fn test_event_invalidates_and_refresh_picks_up_new_rows() {
    let store = FileStore::new(10);
    let cache = result_cache(&CatalogConfig::default().with_page_size(10)).unwrap();
    cache.set_query(ExtensionQuery::new(store.clone(), ExtensionFilter::Images, Some(1)));
    assert_eq!(cache.total_pages(), 0);
    cache.current_page();
    assert_eq!(cache.total_pages(), 1);

    *store.total.lock() = 11;
    assert!(cache.is_refresh_required(&jpg_added()));

    let page = cache.refresh().unwrap();
    assert_eq!(page.total_count, 11);
    assert!(cache.has_next_page());
}

#[test]
fn test_refresh_after_results_shrink() {
    let store = FileStore::new(37);
    let cache = result_cache(&CatalogConfig::default().with_page_size(10)).unwrap();
    cache.set_query(ExtensionQuery::new(store.clone(), ExtensionFilter::Images, None));
    cache.goto_page(3).unwrap();

    *store.total.lock() = 5;
    let page = cache.refresh().unwrap();

    assert_eq!(page.page_index, 0);
    assert_eq!(page.total_count, 5);
    assert_eq!(page.len(), 5);
    assert_eq!(cache.peek_page().unwrap().total_count, 5);
    assert!(!cache.has_next_page());
    assert!(!cache.has_prev_page());
}

#[test]
fn test_analysis_results_refresh_on_same_type() {
    let store = FileStore::new(3);
    let cache = result_cache(&CatalogConfig::default().with_page_size(10)).unwrap();
    cache.set_query(AnalysisResultQuery::new(store.clone(), 7, Some(1)));
    assert_eq!(cache.current_page().unwrap().total_count, 3);

    let other_type = CatalogEvent::AnalysisResultsAdded {
        analysis_type_id: 8,
        data_source_id: Some(1),
    };
    assert!(!cache.is_refresh_required(&other_type));

    *store.total.lock() = 4;
    let same_type = CatalogEvent::AnalysisResultsAdded {
        analysis_type_id: 7,
        data_source_id: Some(1),
    };
    assert!(cache.is_refresh_required(&same_type));
    assert_eq!(cache.refresh().unwrap().total_count, 4);
}

#[test]
fn test_failed_navigation_keeps_page() {
    let store = FileStore::new(30);
    let cache = result_cache(&CatalogConfig::default().with_page_size(10)).unwrap();
    cache.set_query(ExtensionQuery::new(store.clone(), ExtensionFilter::Images, None));
    let first = cache.current_page().unwrap();

    store.failing.store(true, Ordering::SeqCst);
    assert!(cache.next().is_err());
    assert_eq!(cache.page_index(), 0);
    assert!(Arc::ptr_eq(&first, &cache.peek_page().unwrap()));
}

#[test]
fn test_resize_clamps_to_last_page() {
    let store = FileStore::new(37);
    let cache = result_cache(&CatalogConfig::default().with_page_size(10)).unwrap();
    cache.set_query(ExtensionQuery::new(store, ExtensionFilter::Images, None));
    cache.goto_page(3).unwrap();

    let page = cache.resize(20).unwrap().unwrap();
    assert_eq!(page.page_index, 1);
    assert_eq!(page.len(), 17);
    assert_eq!(cache.page_size(), 20);
}

#[test]
fn test_clear_query() {
    let store = FileStore::new(5);
    let cache = result_cache(&CatalogConfig::default()).unwrap();
    cache.set_query(ExtensionQuery::new(store, ExtensionFilter::Images, None));
    assert!(cache.current_page().is_some());

    cache.clear_query();
    assert!(!cache.has_query());
    assert!(cache.current_page().is_none());
    assert!(cache.refresh().is_err());
}

#[test]
fn test_flat_list_follows_pages() {
    let store = FileStore::new(15);
    let cache = result_cache(&CatalogConfig::default().with_page_size(10)).unwrap();
    cache.set_query(ExtensionQuery::new(store, ExtensionFilter::Images, None));

    let list: FlatResultList<ResultRow> = FlatResultList::new();
    let deltas = Arc::new(Mutex::new(Vec::<ListDelta>::new()));
    let seen = deltas.clone();
    list.signals().structure_changed.connect(move |delta: &ListDelta| {
        seen.lock().push(delta.clone());
    });

    let first = list.update(cache.current_page().unwrap().items.clone());
    assert_eq!(first.inserted.len(), 10);

    let second = list.update(cache.next().unwrap().items.clone());
    assert_eq!(second.inserted.len(), 5);
    assert_eq!(second.removed.len(), 10);
    assert!(second.retained.is_empty());
    assert_eq!(list.len(), 5);
    assert_eq!(list.position_of(&RowIdentity::new(12, "file")), Some(2));
    assert_eq!(deltas.lock().len(), 2);
}

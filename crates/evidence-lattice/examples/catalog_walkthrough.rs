//! Evidence Lattice Catalog Walkthrough
//!
//! Builds a catalog over an in-memory store and prints what the tree does
//! as change batches arrive:
//! - Lazy branch expansion and sibling ordering
//! - In-place count updates that keep node identity
//! - Structural invalidation and background refresh
//! - Paging through one result set
//!
//! Run with: RUST_LOG=evidence_lattice=debug cargo run -p evidence-lattice --example catalog_walkthrough

use std::collections::HashMap;
use std::sync::Arc;

use evidence_lattice::CatalogConfig;
use evidence_lattice::catalog::{
    CatalogDao, CatalogEvent, CatalogId, CatalogItem, CatalogParams, CatalogRegion, CatalogTree,
    CatalogUpdate, ExtensionFilter, ExtensionQuery, ParentKey, ResultRow, result_cache, type_keys,
};
use evidence_lattice::model::{Count, FetchError, Page};
use parking_lot::Mutex;
use tracing_subscriber::EnvFilter;

/// Store state: children per parent and a number of image files.
struct MemoryStore {
    children: Mutex<HashMap<ParentKey, Vec<CatalogItem>>>,
    images: Mutex<u64>,
}

impl CatalogDao for MemoryStore {
    fn fetch_children(&self, parent: &ParentKey) -> Result<Vec<CatalogItem>, FetchError> {
        Ok(self.children.lock().get(parent).cloned().unwrap_or_default())
    }

    fn fetch_page(
        &self,
        _params: &CatalogParams,
        page_size: usize,
        page_index: usize,
        _hard_refresh: bool,
    ) -> Result<Page<ResultRow>, FetchError> {
        let total = *self.images.lock();
        let start = (page_size * page_index) as u64;
        let end = (start + page_size as u64).min(total);
        let rows = (start..end)
            .map(|id| ResultRow::new(id as i64, "file", format!("DCIM_{id:05}.jpg")))
            .collect();
        Ok(Page::new(page_size, page_index, total, rows))
    }
}

fn tag(id: i64, name: &str, count: u64) -> CatalogItem {
    CatalogParams::TagName {
        tag_name_id: id,
        data_source_id: None,
    }
    .into_item(name)
    .with_count(Count::Exact(count))
}

fn print_region(tree: &CatalogTree, region: CatalogRegion) {
    println!("{region}:");
    for id in tree.displayed(region) {
        if let Some(node) = tree.node(region, &id) {
            println!("  {}{}", node.display_name(), node.display_count().display_suffix());
        }
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let store = Arc::new(MemoryStore {
        children: Mutex::new(HashMap::new()),
        images: Mutex::new(1234),
    });
    store.children.lock().insert(
        ParentKey::TagNames { data_source_id: None },
        vec![tag(2, "Notable Item", 3), tag(1, "Follow Up", 5)],
    );

    let config = CatalogConfig::default().with_page_size(100);
    let tree = Arc::new(CatalogTree::new(store.clone(), None, config.clone()));

    // Expanding a region fetches it once.
    tree.reconcile(CatalogRegion::TagNames);
    print_region(&tree, CatalogRegion::TagNames);

    tree.tag_names().signals().nodes_updated.connect(|ids: &Vec<CatalogId>| {
        println!("updated in place: {ids:?}");
    });

    // A count report patches the retained node.
    let update = tree.handle_events(&[CatalogEvent::TreeCounts(tag(2, "Notable Item", 4))]);
    println!("count batch: {}", update.stats);
    print_region(&tree, CatalogRegion::TagNames);

    // A deletion invalidates the region; refresh it on the worker.
    store
        .children
        .lock()
        .insert(ParentKey::TagNames { data_source_id: None }, vec![tag(1, "Follow Up", 5)]);

    let worker = tree.spawn_worker()?;
    worker.on_result().connect(|update: &CatalogUpdate| {
        println!("background batch: {} region(s), {}", update.regions.len(), update.stats);
    });
    tree.handle_events_in_background(
        &worker,
        vec![CatalogEvent::results_deleted(type_keys::TAG_NAME, None)],
    )?;
    worker.stop_and_join();
    print_region(&tree, CatalogRegion::TagNames);

    // Page through the images.
    let cache = result_cache(&config)?;
    cache.set_query(ExtensionQuery::new(store.clone(), ExtensionFilter::Images, None));
    if let Some(page) = cache.current_page() {
        println!("page 1 of {}: {} rows", page.total_pages(), page.len());
    }
    let last = cache.goto_page(cache.total_pages() - 1)?;
    println!(
        "page {} of {}: first row {}",
        last.page_index + 1,
        last.total_pages(),
        last.items.first().map_or("-", |row| row.name.as_str())
    );

    let added = CatalogEvent::ContentChanged {
        data_source_id: Some(1),
        object_id: 1234,
        size: 4_096,
        extension: Some("JPG".into()),
        mime_type: Some("image/jpeg".into()),
    };
    *store.images.lock() += 1;
    if cache.is_refresh_required(&added) {
        let page = cache.refresh()?;
        println!("after refresh: {} rows in total", page.total_count);
    }

    Ok(())
}

//! Result page queries behind catalog tree items.
//!
//! Each query fetches through [`CatalogDao::fetch_page`] and decides for
//! itself which [`CatalogEvent`]s make a fetched page stale.

use std::sync::Arc;

use crate::config::CatalogConfig;
use crate::model::{FetchError, ModelResult, Page, PageQuery, ResultPageCache};

use super::dao::{CatalogDao, ResultRow};
use super::event::CatalogEvent;
use super::params::{CatalogParams, ExtensionFilter, FileSizeFilter, type_keys};

/// A page cache over catalog results.
pub type CatalogPageCache = ResultPageCache<ResultRow, CatalogEvent>;

/// Creates an empty result cache with the configured page size.
pub fn result_cache(config: &CatalogConfig) -> ModelResult<CatalogPageCache> {
    ResultPageCache::new(config.page_size)
}

/// A query scoped to every data source matches events from any of them.
fn source_matches(ours: Option<i64>, event: Option<i64>) -> bool {
    ours.is_none() || ours == event
}

fn fetch(
    dao: &dyn CatalogDao,
    params: &CatalogParams,
    page_size: usize,
    page_index: usize,
    hard_refresh: bool,
) -> Result<Page<ResultRow>, FetchError> {
    dao.fetch_page(params, page_size, page_index, hard_refresh)
}

/// Results of one data artifact type.
pub struct ArtifactQuery {
    dao: Arc<dyn CatalogDao>,
    params: CatalogParams,
    artifact_type_id: i64,
    data_source_id: Option<i64>,
}

impl ArtifactQuery {
    pub fn new(dao: Arc<dyn CatalogDao>, artifact_type_id: i64, data_source_id: Option<i64>) -> Self {
        Self {
            dao,
            params: CatalogParams::ArtifactType {
                artifact_type_id,
                data_source_id,
            },
            artifact_type_id,
            data_source_id,
        }
    }

    pub fn params(&self) -> &CatalogParams {
        &self.params
    }
}

impl PageQuery for ArtifactQuery {
    type Row = ResultRow;
    type Event = CatalogEvent;

    fn fetch(&self, page_size: usize, page_index: usize, hard_refresh: bool) -> Result<Page<ResultRow>, FetchError> {
        fetch(self.dao.as_ref(), &self.params, page_size, page_index, hard_refresh)
    }

    fn is_invalidated_by(&self, _page_size: usize, _page_index: usize, event: &CatalogEvent) -> bool {
        match event {
            CatalogEvent::ArtifactsAdded {
                artifact_type_id,
                data_source_id,
            } => *artifact_type_id == self.artifact_type_id && source_matches(self.data_source_id, *data_source_id),
            CatalogEvent::CategoryInvalidated {
                type_key,
                data_source_id,
            }
            | CatalogEvent::ResultsDeleted {
                type_key,
                data_source_id,
            } => type_key == type_keys::DATA_ARTIFACT && source_matches(self.data_source_id, *data_source_id),
            _ => false,
        }
    }
}

/// Results of one analysis result type.
pub struct AnalysisResultQuery {
    dao: Arc<dyn CatalogDao>,
    params: CatalogParams,
    analysis_type_id: i64,
    data_source_id: Option<i64>,
}

impl AnalysisResultQuery {
    pub fn new(dao: Arc<dyn CatalogDao>, analysis_type_id: i64, data_source_id: Option<i64>) -> Self {
        Self {
            dao,
            params: CatalogParams::AnalysisResult {
                analysis_type_id,
                data_source_id,
            },
            analysis_type_id,
            data_source_id,
        }
    }

    pub fn params(&self) -> &CatalogParams {
        &self.params
    }
}

impl PageQuery for AnalysisResultQuery {
    type Row = ResultRow;
    type Event = CatalogEvent;

    fn fetch(&self, page_size: usize, page_index: usize, hard_refresh: bool) -> Result<Page<ResultRow>, FetchError> {
        fetch(self.dao.as_ref(), &self.params, page_size, page_index, hard_refresh)
    }

    fn is_invalidated_by(&self, _page_size: usize, _page_index: usize, event: &CatalogEvent) -> bool {
        match event {
            CatalogEvent::AnalysisResultsAdded {
                analysis_type_id,
                data_source_id,
            } => *analysis_type_id == self.analysis_type_id && source_matches(self.data_source_id, *data_source_id),
            CatalogEvent::CategoryInvalidated {
                type_key,
                data_source_id,
            }
            | CatalogEvent::ResultsDeleted {
                type_key,
                data_source_id,
            } => type_key == type_keys::ANALYSIS_RESULT && source_matches(self.data_source_id, *data_source_id),
            _ => false,
        }
    }
}

/// Files in one extension group.
pub struct ExtensionQuery {
    dao: Arc<dyn CatalogDao>,
    params: CatalogParams,
    filter: ExtensionFilter,
    data_source_id: Option<i64>,
}

impl ExtensionQuery {
    pub fn new(dao: Arc<dyn CatalogDao>, filter: ExtensionFilter, data_source_id: Option<i64>) -> Self {
        Self {
            dao,
            params: CatalogParams::FileExtension { filter, data_source_id },
            filter,
            data_source_id,
        }
    }

    pub fn params(&self) -> &CatalogParams {
        &self.params
    }
}

impl PageQuery for ExtensionQuery {
    type Row = ResultRow;
    type Event = CatalogEvent;

    fn fetch(&self, page_size: usize, page_index: usize, hard_refresh: bool) -> Result<Page<ResultRow>, FetchError> {
        fetch(self.dao.as_ref(), &self.params, page_size, page_index, hard_refresh)
    }

    fn is_invalidated_by(&self, _page_size: usize, _page_index: usize, event: &CatalogEvent) -> bool {
        match event {
            CatalogEvent::ContentChanged {
                data_source_id,
                extension: Some(extension),
                ..
            } => self.filter.matches(extension) && source_matches(self.data_source_id, *data_source_id),
            CatalogEvent::CategoryInvalidated {
                type_key,
                data_source_id,
            } => type_key == type_keys::FILE_EXTENSION && source_matches(self.data_source_id, *data_source_id),
            _ => false,
        }
    }
}

/// Files of one full mime type.
pub struct MimeQuery {
    dao: Arc<dyn CatalogDao>,
    params: CatalogParams,
    mime_type: String,
    data_source_id: Option<i64>,
}

impl MimeQuery {
    pub fn new(dao: Arc<dyn CatalogDao>, mime_type: impl Into<String>, data_source_id: Option<i64>) -> Self {
        let mime_type = mime_type.into();
        Self {
            dao,
            params: CatalogParams::MimeType {
                mime_type: mime_type.clone(),
                data_source_id,
            },
            mime_type,
            data_source_id,
        }
    }

    pub fn params(&self) -> &CatalogParams {
        &self.params
    }
}

impl PageQuery for MimeQuery {
    type Row = ResultRow;
    type Event = CatalogEvent;

    fn fetch(&self, page_size: usize, page_index: usize, hard_refresh: bool) -> Result<Page<ResultRow>, FetchError> {
        fetch(self.dao.as_ref(), &self.params, page_size, page_index, hard_refresh)
    }

    fn is_invalidated_by(&self, _page_size: usize, _page_index: usize, event: &CatalogEvent) -> bool {
        match event {
            CatalogEvent::ContentChanged {
                data_source_id,
                mime_type: Some(mime_type),
                ..
            } => self.mime_type.eq_ignore_ascii_case(mime_type) && source_matches(self.data_source_id, *data_source_id),
            CatalogEvent::CategoryInvalidated {
                type_key,
                data_source_id,
            } => type_key == type_keys::MIME_TYPE && source_matches(self.data_source_id, *data_source_id),
            _ => false,
        }
    }
}

/// Files in one size bucket.
pub struct SizeQuery {
    dao: Arc<dyn CatalogDao>,
    params: CatalogParams,
    filter: FileSizeFilter,
    data_source_id: Option<i64>,
}

impl SizeQuery {
    pub fn new(dao: Arc<dyn CatalogDao>, filter: FileSizeFilter, data_source_id: Option<i64>) -> Self {
        Self {
            dao,
            params: CatalogParams::FileSize { filter, data_source_id },
            filter,
            data_source_id,
        }
    }

    pub fn params(&self) -> &CatalogParams {
        &self.params
    }
}

impl PageQuery for SizeQuery {
    type Row = ResultRow;
    type Event = CatalogEvent;

    fn fetch(&self, page_size: usize, page_index: usize, hard_refresh: bool) -> Result<Page<ResultRow>, FetchError> {
        fetch(self.dao.as_ref(), &self.params, page_size, page_index, hard_refresh)
    }

    fn is_invalidated_by(&self, _page_size: usize, _page_index: usize, event: &CatalogEvent) -> bool {
        match event {
            CatalogEvent::ContentChanged {
                data_source_id, size, ..
            } => self.filter.contains(*size) && source_matches(self.data_source_id, *data_source_id),
            CatalogEvent::CategoryInvalidated {
                type_key,
                data_source_id,
            } => type_key == type_keys::FILE_SIZE && source_matches(self.data_source_id, *data_source_id),
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::dao::ParentKey;
    use crate::catalog::params::CatalogItem;
    use parking_lot::Mutex;

    const MB: u64 = 1024 * 1024;

    #[derive(Default)]
    struct RecordingDao {
        calls: Mutex<Vec<(CatalogParams, usize, usize, bool)>>,
    }

    impl CatalogDao for RecordingDao {
        fn fetch_children(&self, _parent: &ParentKey) -> Result<Vec<CatalogItem>, FetchError> {
            Ok(Vec::new())
        }

        fn fetch_page(
            &self,
            params: &CatalogParams,
            page_size: usize,
            page_index: usize,
            hard_refresh: bool,
        ) -> Result<Page<ResultRow>, FetchError> {
            self.calls.lock().push((params.clone(), page_size, page_index, hard_refresh));
            let rows = (0..3).map(|id| ResultRow::new(id, "file", format!("f{id}"))).collect();
            Ok(Page::new(page_size, page_index, 3, rows))
        }
    }

    fn changed(data_source_id: Option<i64>, size: u64, extension: &str, mime_type: &str) -> CatalogEvent {
        CatalogEvent::ContentChanged {
            data_source_id,
            object_id: 77,
            size,
            extension: Some(extension.to_string()),
            mime_type: Some(mime_type.to_string()),
        }
    }

    #[test]
    fn test_artifact_invalidation() {
        let query = ArtifactQuery::new(Arc::new(RecordingDao::default()), 2, Some(1));
        let added = |type_id, ds| CatalogEvent::ArtifactsAdded {
            artifact_type_id: type_id,
            data_source_id: ds,
        };

        assert!(query.is_invalidated_by(10, 0, &added(2, Some(1))));
        assert!(!query.is_invalidated_by(10, 0, &added(2, Some(5))));
        assert!(!query.is_invalidated_by(10, 0, &added(3, Some(1))));
        assert!(query.is_invalidated_by(
            10,
            0,
            &CatalogEvent::results_deleted(type_keys::DATA_ARTIFACT, Some(1))
        ));
        assert!(!query.is_invalidated_by(10, 0, &CatalogEvent::results_deleted(type_keys::TAG_NAME, Some(1))));
    }

    #[test]
    fn test_analysis_result_invalidation() {
        let query = AnalysisResultQuery::new(Arc::new(RecordingDao::default()), 12, Some(1));
        let added = |type_id, ds| CatalogEvent::AnalysisResultsAdded {
            analysis_type_id: type_id,
            data_source_id: ds,
        };
        assert!(query.is_invalidated_by(10, 0, &added(12, Some(1))));
        assert!(!query.is_invalidated_by(10, 0, &added(13, Some(1))));
        assert!(!query.is_invalidated_by(10, 0, &added(12, Some(2))));

        let artifacts = CatalogEvent::ArtifactsAdded {
            artifact_type_id: 12,
            data_source_id: Some(1),
        };
        assert!(!query.is_invalidated_by(10, 0, &artifacts));
        assert!(query.is_invalidated_by(
            10,
            0,
            &CatalogEvent::results_deleted(type_keys::ANALYSIS_RESULT, Some(1))
        ));
        assert_eq!(
            query.params(),
            &CatalogParams::AnalysisResult { analysis_type_id: 12, data_source_id: Some(1) }
        );
    }

    #[test]
    fn test_unscoped_query_matches_any_source() {
        let query = ArtifactQuery::new(Arc::new(RecordingDao::default()), 2, None);
        let event = CatalogEvent::ArtifactsAdded {
            artifact_type_id: 2,
            data_source_id: Some(9),
        };
        assert!(query.is_invalidated_by(10, 0, &event));
    }

    #[test]
    fn test_extension_invalidation() {
        let query = ExtensionQuery::new(Arc::new(RecordingDao::default()), ExtensionFilter::Images, None);
        assert!(query.is_invalidated_by(10, 0, &changed(Some(1), 10, "JPG", "image/jpeg")));
        assert!(!query.is_invalidated_by(10, 0, &changed(Some(1), 10, "pdf", "application/pdf")));

        let no_extension = CatalogEvent::ContentChanged {
            data_source_id: None,
            object_id: 1,
            size: 0,
            extension: None,
            mime_type: None,
        };
        assert!(!query.is_invalidated_by(10, 0, &no_extension));
    }

    #[test]
    fn test_mime_invalidation_ignores_case() {
        let query = MimeQuery::new(Arc::new(RecordingDao::default()), "image/png", Some(3));
        assert!(query.is_invalidated_by(10, 0, &changed(Some(3), 10, "png", "IMAGE/PNG")));
        assert!(!query.is_invalidated_by(10, 0, &changed(Some(4), 10, "png", "image/png")));
        assert!(!query.is_invalidated_by(10, 0, &changed(Some(3), 10, "gif", "image/gif")));
    }

    #[test]
    fn test_size_invalidation() {
        let query = SizeQuery::new(Arc::new(RecordingDao::default()), FileSizeFilter::Size50To200Mb, None);
        assert!(query.is_invalidated_by(10, 0, &changed(None, 60 * MB, "bin", "application/octet-stream")));
        assert!(!query.is_invalidated_by(10, 0, &changed(None, 200 * MB, "bin", "application/octet-stream")));
    }

    #[test]
    fn test_cache_forwards_hard_refresh() {
        let dao = Arc::new(RecordingDao::default());
        let cache = result_cache(&CatalogConfig::default().with_page_size(25)).unwrap();
        cache.set_query(MimeQuery::new(dao.clone(), "text/plain", None));

        assert_eq!(cache.current_page().unwrap().len(), 3);
        cache.refresh().unwrap();

        let calls = dao.calls.lock();
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[0].1, 25);
        assert!(!calls[0].3);
        assert!(calls[1].3);
        assert_eq!(calls[1].0, CatalogParams::MimeType { mime_type: "text/plain".into(), data_source_id: None });
    }

    #[test]
    fn test_cache_consults_query_on_events() {
        let cache = result_cache(&CatalogConfig::default()).unwrap();
        cache.set_query(SizeQuery::new(Arc::new(RecordingDao::default()), FileSizeFilter::Size1GbPlus, None));

        let big = changed(None, 2048 * MB, "iso", "application/x-iso9660-image");
        // Nothing fetched yet, so nothing to invalidate.
        assert!(!cache.is_refresh_required(&big));

        cache.current_page();
        assert!(cache.is_refresh_required(&big));
        assert!(!cache.is_refresh_required(&changed(None, MB, "txt", "text/plain")));
    }
}

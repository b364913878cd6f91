//! Change events delivered by the backing store.

use super::dao::FileSystemParent;
use super::params::CatalogItem;

/// One change notification. The store delivers these in coarse batches.
#[derive(Debug, Clone, PartialEq)]
pub enum CatalogEvent {
    /// New display count for one tree item.
    TreeCounts(CatalogItem),
    /// Counts for a whole category changed in a way that cannot be
    /// expressed per item.
    CategoryInvalidated {
        type_key: String,
        data_source_id: Option<i64>,
    },
    /// Results of a category were deleted.
    ResultsDeleted {
        type_key: String,
        data_source_id: Option<i64>,
    },
    /// A file was added or its metadata changed.
    ContentChanged {
        data_source_id: Option<i64>,
        object_id: i64,
        size: u64,
        extension: Option<String>,
        mime_type: Option<String>,
    },
    /// Artifacts of one type were posted.
    ArtifactsAdded {
        artifact_type_id: i64,
        data_source_id: Option<i64>,
    },
    /// Analysis results of one type were posted.
    AnalysisResultsAdded {
        analysis_type_id: i64,
        data_source_id: Option<i64>,
    },
    /// A file system object appeared or changed under `parent`. `item` is
    /// `None` when the store cannot name the object, which invalidates every
    /// file system level.
    FileSystemChanged {
        parent: FileSystemParent,
        item: Option<CatalogItem>,
    },
}

impl CatalogEvent {
    pub fn category_invalidated(type_key: impl Into<String>, data_source_id: Option<i64>) -> Self {
        Self::CategoryInvalidated {
            type_key: type_key.into(),
            data_source_id,
        }
    }

    pub fn results_deleted(type_key: impl Into<String>, data_source_id: Option<i64>) -> Self {
        Self::ResultsDeleted {
            type_key: type_key.into(),
            data_source_id,
        }
    }

    /// The data source the event concerns, if it names one.
    pub fn data_source_id(&self) -> Option<i64> {
        match self {
            Self::TreeCounts(item) => item.payload.data_source_id(),
            Self::CategoryInvalidated { data_source_id, .. }
            | Self::ResultsDeleted { data_source_id, .. }
            | Self::ContentChanged { data_source_id, .. }
            | Self::ArtifactsAdded { data_source_id, .. }
            | Self::AnalysisResultsAdded { data_source_id, .. } => *data_source_id,
            Self::FileSystemChanged { item, .. } => item.as_ref().and_then(|item| item.payload.data_source_id()),
        }
    }
}

//! The catalog data-access collaborator.

use std::fmt;

use crate::model::{FetchError, IdentifiedRow, Page, RowIdentity};

use super::params::{CatalogItem, CatalogParams, ExtensionFilter};

/// Identifies the children a branch asks for.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ParentKey {
    TagNames {
        data_source_id: Option<i64>,
    },
    ArtifactTypes {
        data_source_id: Option<i64>,
    },
    DeletedContent {
        data_source_id: Option<i64>,
    },
    FileSizes {
        data_source_id: Option<i64>,
    },
    FileExtensions {
        data_source_id: Option<i64>,
        filters: Vec<ExtensionFilter>,
    },
    /// Top-level mime media types (`image`, `text`, ...).
    MimePrefixes {
        data_source_id: Option<i64>,
    },
    /// Full mime types under one media type.
    MimeTypes {
        data_source_id: Option<i64>,
        prefix: String,
    },
    /// One level of the file system tree.
    FileSystem(FileSystemParent),
}

/// The parent of one file system tree level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum FileSystemParent {
    /// The data sources of a host.
    Host(i64),
    /// The displayable children of a content object.
    Content(i64),
    /// The single node for a data source, used when grouping by host.
    DataSource(i64),
}

impl fmt::Display for FileSystemParent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Host(id) => write!(f, "host:{id}"),
            Self::Content(id) => write!(f, "content:{id}"),
            Self::DataSource(id) => write!(f, "data_source:{id}"),
        }
    }
}

/// One row of a result page.
#[derive(Debug, Clone, PartialEq)]
pub struct ResultRow {
    pub object_id: i64,
    /// Tag of the result set the row belongs to (e.g. `file`, `artifact`).
    pub type_tag: String,
    pub name: String,
    pub data_source_id: Option<i64>,
    pub size: u64,
    pub extension: Option<String>,
    pub mime_type: Option<String>,
}

impl ResultRow {
    pub fn new(object_id: i64, type_tag: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            object_id,
            type_tag: type_tag.into(),
            name: name.into(),
            data_source_id: None,
            size: 0,
            extension: None,
            mime_type: None,
        }
    }
}

impl IdentifiedRow for ResultRow {
    fn row_identity(&self) -> RowIdentity {
        RowIdentity::new(self.object_id, self.type_tag.clone())
    }
}

/// Row-count and query access to the backing store.
///
/// Every engine and branch receives its DAO at construction, so tests can
/// substitute a fake. Both methods may block.
pub trait CatalogDao: Send + Sync {
    /// Fetches the children of `parent` with their display counts.
    fn fetch_children(&self, parent: &ParentKey) -> Result<Vec<CatalogItem>, FetchError>;

    /// Fetches one page of the rows `params` selects. `hard_refresh` asks
    /// the store to bypass its own caches.
    fn fetch_page(
        &self,
        params: &CatalogParams,
        page_size: usize,
        page_index: usize,
        hard_refresh: bool,
    ) -> Result<Page<ResultRow>, FetchError>;
}

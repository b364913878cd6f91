//! The evidence catalog tree.
//!
//! The catalog groups a case's results into regions (tags, data artifact
//! types, deleted files, file sizes, extensions and mime types). Each region
//! is a branch reconciled against a [`CatalogDao`]; change batches from the
//! store are classified per branch and applied as in-place count updates
//! where possible.
//!
//! Expanding a mime media type or a file system object attaches a sub-level
//! with its own reconciler; sub-levels receive the same change batches.
//!
//! Leaf items open paged result views through the queries in [`queries`].

mod branches;
mod dao;
mod event;
mod params;
pub mod queries;
mod tree;

pub use branches::{
    ArtifactTypeBranch, DeletedContentBranch, FileExtensionBranch, FileSizeBranch, FileSystemBranch,
    MimeTypeBranch, TagNameBranch,
};
pub use dao::{CatalogDao, FileSystemParent, ParentKey, ResultRow};
pub use event::CatalogEvent;
pub use params::{
    CatalogId, CatalogItem, CatalogParams, ContentKind, DeletedContentFilter, ExtensionFilter,
    FileMetaType, FileSizeFilter, type_keys,
};
pub use queries::{
    AnalysisResultQuery, ArtifactQuery, CatalogPageCache, ExtensionQuery, MimeQuery, SizeQuery,
    result_cache,
};
pub use tree::{
    CatalogNode, CatalogPlan, CatalogRegion, CatalogSublevel, CatalogTree, CatalogUpdate,
};

//! The catalog's tree branches.
//!
//! Each branch is a [`ChildSource`] over an injected [`CatalogDao`] and a
//! [`RelevanceFilter`] over [`CatalogEvent`]s. Replacement items are rebuilt
//! with the branch's own data-source scope so that the identity of a
//! displayed child never depends on which data source reported the count.

use std::cmp::Ordering;
use std::collections::HashSet;
use std::sync::Arc;

use evidence_lattice_core::logging::targets;

use crate::model::{BranchScope, ChildSource, FetchError, Relevance, RelevanceFilter};

use super::dao::{CatalogDao, FileSystemParent, ParentKey};
use super::event::CatalogEvent;
use super::params::{CatalogId, CatalogItem, CatalogParams, ExtensionFilter, type_keys};

type CatalogRelevance = Relevance<CatalogId, CatalogParams>;

/// `true` for an event that invalidates the whole branch.
fn is_structural(scope: &BranchScope, event: &CatalogEvent, on_results_deleted: bool) -> bool {
    match event {
        CatalogEvent::CategoryInvalidated {
            type_key,
            data_source_id,
        } => scope.matches(type_key, *data_source_id),
        CatalogEvent::ResultsDeleted {
            type_key,
            data_source_id,
        } if on_results_deleted => scope.matches(type_key, *data_source_id),
        _ => false,
    }
}

/// The tree item carried by an in-scope count event.
fn scoped_tree_item<'a>(scope: &BranchScope, event: &'a CatalogEvent) -> Option<&'a CatalogItem> {
    match event {
        CatalogEvent::TreeCounts(item)
            if scope.matches(&item.type_key, item.payload.data_source_id()) =>
        {
            Some(item)
        }
        _ => None,
    }
}

fn replacement(
    scope: &BranchScope,
    reported: &CatalogItem,
    params: &CatalogParams,
    display_name: impl Into<String>,
) -> CatalogRelevance {
    let item = params
        .scoped_to(scope.data_source_id())
        .into_item(display_name)
        .with_count(reported.display_count);
    Relevance::Replace(item)
}

fn by_filter_id(a: &CatalogItem, b: &CatalogItem) -> Ordering {
    a.id.cmp(&b.id)
}

// =============================================================================
// Tag names
// =============================================================================

/// Tag names in use, ordered by display name.
///
/// Deleting results rebuilds the branch, since tag counts cannot be
/// decremented from the event alone.
pub struct TagNameBranch {
    dao: Arc<dyn CatalogDao>,
    scope: BranchScope,
}

impl TagNameBranch {
    /// Tag names over `dao`, optionally restricted to one data source.
    pub fn new(dao: Arc<dyn CatalogDao>, data_source_id: Option<i64>) -> Self {
        Self {
            dao,
            scope: BranchScope::new(type_keys::TAG_NAME, data_source_id),
        }
    }

    /// The type key and data source this branch filters events with.
    pub fn scope(&self) -> &BranchScope {
        &self.scope
    }
}

impl ChildSource for TagNameBranch {
    type Key = CatalogId;
    type Payload = CatalogParams;

    fn fetch_children(&self) -> Result<Vec<CatalogItem>, FetchError> {
        self.dao.fetch_children(&ParentKey::TagNames {
            data_source_id: self.scope.data_source_id(),
        })
    }

    fn compare(&self, a: &CatalogItem, b: &CatalogItem) -> Ordering {
        a.display_name.cmp(&b.display_name)
    }
}

impl RelevanceFilter for TagNameBranch {
    type Event = CatalogEvent;

    fn relevance(&self, event: &CatalogEvent) -> CatalogRelevance {
        if is_structural(&self.scope, event, true) {
            return Relevance::Structural;
        }
        match scoped_tree_item(&self.scope, event) {
            Some(item) if matches!(item.payload, CatalogParams::TagName { .. }) => {
                replacement(&self.scope, item, &item.payload, item.display_name.clone())
            }
            _ => Relevance::Irrelevant,
        }
    }
}

// =============================================================================
// Data artifact types
// =============================================================================

/// Data artifact types with results, ordered case-insensitively by display
/// name. Ignored types are never shown.
pub struct ArtifactTypeBranch {
    dao: Arc<dyn CatalogDao>,
    scope: BranchScope,
    ignored: HashSet<i64>,
}

impl ArtifactTypeBranch {
    /// Every artifact type over `dao`; see
    /// [`with_ignored_types`](Self::with_ignored_types).
    pub fn new(dao: Arc<dyn CatalogDao>, data_source_id: Option<i64>) -> Self {
        Self {
            dao,
            scope: BranchScope::new(type_keys::DATA_ARTIFACT, data_source_id),
            ignored: HashSet::new(),
        }
    }

    /// Hides these artifact type ids from the branch.
    pub fn with_ignored_types(mut self, ignored: impl IntoIterator<Item = i64>) -> Self {
        self.ignored.extend(ignored);
        self
    }

    /// The type key and data source this branch filters events with.
    pub fn scope(&self) -> &BranchScope {
        &self.scope
    }

    /// Returns `true` if `artifact_type_id` is hidden from the branch.
    pub fn is_ignored(&self, artifact_type_id: i64) -> bool {
        self.ignored.contains(&artifact_type_id)
    }

    fn is_shown(&self, params: &CatalogParams) -> bool {
        match params {
            CatalogParams::ArtifactType {
                artifact_type_id, ..
            } => !self.is_ignored(*artifact_type_id),
            _ => false,
        }
    }
}

impl ChildSource for ArtifactTypeBranch {
    type Key = CatalogId;
    type Payload = CatalogParams;

    fn fetch_children(&self) -> Result<Vec<CatalogItem>, FetchError> {
        let mut items = self.dao.fetch_children(&ParentKey::ArtifactTypes {
            data_source_id: self.scope.data_source_id(),
        })?;
        let fetched = items.len();
        items.retain(|item| self.is_shown(&item.payload));
        if items.len() != fetched {
            tracing::trace!(
                target: targets::CATALOG,
                hidden = fetched - items.len(),
                "dropped ignored artifact types"
            );
        }
        Ok(items)
    }

    fn compare(&self, a: &CatalogItem, b: &CatalogItem) -> Ordering {
        a.display_name
            .to_lowercase()
            .cmp(&b.display_name.to_lowercase())
    }
}

impl RelevanceFilter for ArtifactTypeBranch {
    type Event = CatalogEvent;

    fn relevance(&self, event: &CatalogEvent) -> CatalogRelevance {
        if is_structural(&self.scope, event, false) {
            return Relevance::Structural;
        }
        match event {
            // A post carries no count, so the branch has to be re-counted.
            CatalogEvent::ArtifactsAdded {
                artifact_type_id,
                data_source_id,
            } if !self.is_ignored(*artifact_type_id)
                && self.scope.matches(type_keys::DATA_ARTIFACT, *data_source_id) =>
            {
                Relevance::Structural
            }
            _ => match scoped_tree_item(&self.scope, event) {
                Some(item) if self.is_shown(&item.payload) => {
                    replacement(&self.scope, item, &item.payload, item.display_name.clone())
                }
                _ => Relevance::Irrelevant,
            },
        }
    }
}

// =============================================================================
// Deleted content
// =============================================================================

/// Deleted-content views, ordered by filter id.
pub struct DeletedContentBranch {
    dao: Arc<dyn CatalogDao>,
    scope: BranchScope,
}

impl DeletedContentBranch {
    /// The deleted-content views over `dao`.
    pub fn new(dao: Arc<dyn CatalogDao>, data_source_id: Option<i64>) -> Self {
        Self {
            dao,
            scope: BranchScope::new(type_keys::DELETED_CONTENT, data_source_id),
        }
    }

    /// The type key and data source this branch filters events with.
    pub fn scope(&self) -> &BranchScope {
        &self.scope
    }
}

impl ChildSource for DeletedContentBranch {
    type Key = CatalogId;
    type Payload = CatalogParams;

    fn fetch_children(&self) -> Result<Vec<CatalogItem>, FetchError> {
        self.dao.fetch_children(&ParentKey::DeletedContent {
            data_source_id: self.scope.data_source_id(),
        })
    }

    fn compare(&self, a: &CatalogItem, b: &CatalogItem) -> Ordering {
        by_filter_id(a, b)
    }
}

impl RelevanceFilter for DeletedContentBranch {
    type Event = CatalogEvent;

    fn relevance(&self, event: &CatalogEvent) -> CatalogRelevance {
        if is_structural(&self.scope, event, false) {
            return Relevance::Structural;
        }
        let Some(item) = scoped_tree_item(&self.scope, event) else {
            return Relevance::Irrelevant;
        };
        match &item.payload {
            CatalogParams::DeletedContent { filter, .. } => {
                replacement(&self.scope, item, &item.payload, filter.display_name())
            }
            _ => Relevance::Irrelevant,
        }
    }
}

// =============================================================================
// File sizes
// =============================================================================

/// File size buckets, ordered by filter id.
///
/// Size counts may be reported without a data source; such reports apply
/// to every scope.
pub struct FileSizeBranch {
    dao: Arc<dyn CatalogDao>,
    scope: BranchScope,
}

impl FileSizeBranch {
    /// The size buckets over `dao`.
    pub fn new(dao: Arc<dyn CatalogDao>, data_source_id: Option<i64>) -> Self {
        Self {
            dao,
            scope: BranchScope::new(type_keys::FILE_SIZE, data_source_id).accepting_unscoped(),
        }
    }

    /// The type key and data source this branch filters events with.
    pub fn scope(&self) -> &BranchScope {
        &self.scope
    }
}

impl ChildSource for FileSizeBranch {
    type Key = CatalogId;
    type Payload = CatalogParams;

    fn fetch_children(&self) -> Result<Vec<CatalogItem>, FetchError> {
        self.dao.fetch_children(&ParentKey::FileSizes {
            data_source_id: self.scope.data_source_id(),
        })
    }

    fn compare(&self, a: &CatalogItem, b: &CatalogItem) -> Ordering {
        by_filter_id(a, b)
    }
}

impl RelevanceFilter for FileSizeBranch {
    type Event = CatalogEvent;

    fn relevance(&self, event: &CatalogEvent) -> CatalogRelevance {
        if is_structural(&self.scope, event, false) {
            return Relevance::Structural;
        }
        let Some(item) = scoped_tree_item(&self.scope, event) else {
            return Relevance::Irrelevant;
        };
        match &item.payload {
            CatalogParams::FileSize { filter, .. } => {
                replacement(&self.scope, item, &item.payload, filter.display_name())
            }
            _ => Relevance::Irrelevant,
        }
    }
}

// =============================================================================
// File extensions
// =============================================================================

/// Extension groups, ordered by filter id. Only the groups the branch was
/// built with are shown.
pub struct FileExtensionBranch {
    dao: Arc<dyn CatalogDao>,
    scope: BranchScope,
    filters: Vec<ExtensionFilter>,
}

impl FileExtensionBranch {
    /// A branch over every extension group.
    pub fn new(dao: Arc<dyn CatalogDao>, data_source_id: Option<i64>) -> Self {
        Self::with_filters(dao, data_source_id, ExtensionFilter::ALL)
    }

    /// A branch over the given extension groups only.
    pub fn with_filters(
        dao: Arc<dyn CatalogDao>,
        data_source_id: Option<i64>,
        filters: impl IntoIterator<Item = ExtensionFilter>,
    ) -> Self {
        Self {
            dao,
            scope: BranchScope::new(type_keys::FILE_EXTENSION, data_source_id),
            filters: filters.into_iter().collect(),
        }
    }

    /// The type key and data source this branch filters events with.
    pub fn scope(&self) -> &BranchScope {
        &self.scope
    }

    /// The extension groups shown.
    pub fn filters(&self) -> &[ExtensionFilter] {
        &self.filters
    }
}

impl ChildSource for FileExtensionBranch {
    type Key = CatalogId;
    type Payload = CatalogParams;

    fn fetch_children(&self) -> Result<Vec<CatalogItem>, FetchError> {
        self.dao.fetch_children(&ParentKey::FileExtensions {
            data_source_id: self.scope.data_source_id(),
            filters: self.filters.clone(),
        })
    }

    fn compare(&self, a: &CatalogItem, b: &CatalogItem) -> Ordering {
        by_filter_id(a, b)
    }
}

impl RelevanceFilter for FileExtensionBranch {
    type Event = CatalogEvent;

    fn relevance(&self, event: &CatalogEvent) -> CatalogRelevance {
        if is_structural(&self.scope, event, false) {
            return Relevance::Structural;
        }
        let Some(item) = scoped_tree_item(&self.scope, event) else {
            return Relevance::Irrelevant;
        };
        match &item.payload {
            CatalogParams::FileExtension { filter, .. } if self.filters.contains(filter) => {
                replacement(&self.scope, item, &item.payload, filter.display_name())
            }
            _ => Relevance::Irrelevant,
        }
    }
}

// =============================================================================
// Mime types
// =============================================================================

/// Mime types, ordered by mime string.
///
/// The top level lists media types (`image`, `text`); a branch built with
/// [`under`](Self::under) lists the full types of one media type, each
/// displayed by its subtype (`png` under `image`).
pub struct MimeTypeBranch {
    dao: Arc<dyn CatalogDao>,
    scope: BranchScope,
    prefix: Option<String>,
}

impl MimeTypeBranch {
    /// The top-level media types.
    pub fn prefixes(dao: Arc<dyn CatalogDao>, data_source_id: Option<i64>) -> Self {
        Self {
            dao,
            scope: BranchScope::new(type_keys::MIME_TYPE, data_source_id),
            prefix: None,
        }
    }

    /// The full mime types under `prefix`.
    pub fn under(dao: Arc<dyn CatalogDao>, data_source_id: Option<i64>, prefix: impl Into<String>) -> Self {
        Self {
            dao,
            scope: BranchScope::new(type_keys::MIME_TYPE, data_source_id),
            prefix: Some(prefix.into()),
        }
    }

    /// The type key and data source this branch filters events with.
    pub fn scope(&self) -> &BranchScope {
        &self.scope
    }

    /// The media type this level lists subtypes of; `None` at the top.
    pub fn prefix(&self) -> Option<&str> {
        self.prefix.as_deref()
    }

    fn mime_relevance(&self, item: &CatalogItem, mime_type: &str) -> CatalogRelevance {
        let media_type = mime_type.split('/').next().unwrap_or(mime_type);
        let is_full_type = media_type.len() != mime_type.len();

        match (&self.prefix, is_full_type) {
            (None, false) => replacement(&self.scope, item, &item.payload, mime_type),
            // A subtype count says nothing about its media type's total.
            (None, true) => Relevance::Structural,
            (Some(prefix), true) if prefix == media_type => {
                let subtype = &mime_type[media_type.len() + 1..];
                replacement(&self.scope, item, &item.payload, subtype)
            }
            _ => Relevance::Irrelevant,
        }
    }
}

impl ChildSource for MimeTypeBranch {
    type Key = CatalogId;
    type Payload = CatalogParams;

    fn fetch_children(&self) -> Result<Vec<CatalogItem>, FetchError> {
        let data_source_id = self.scope.data_source_id();
        let parent = match &self.prefix {
            None => ParentKey::MimePrefixes { data_source_id },
            Some(prefix) => ParentKey::MimeTypes {
                data_source_id,
                prefix: prefix.clone(),
            },
        };
        self.dao.fetch_children(&parent)
    }

    fn compare(&self, a: &CatalogItem, b: &CatalogItem) -> Ordering {
        match (&a.payload, &b.payload) {
            (
                CatalogParams::MimeType { mime_type: left, .. },
                CatalogParams::MimeType { mime_type: right, .. },
            ) => left.cmp(right),
            _ => a.id.cmp(&b.id),
        }
    }
}

impl RelevanceFilter for MimeTypeBranch {
    type Event = CatalogEvent;

    fn relevance(&self, event: &CatalogEvent) -> CatalogRelevance {
        if is_structural(&self.scope, event, false) {
            return Relevance::Structural;
        }
        let Some(item) = scoped_tree_item(&self.scope, event) else {
            return Relevance::Irrelevant;
        };
        match &item.payload {
            CatalogParams::MimeType { mime_type, .. } => self.mime_relevance(item, mime_type),
            _ => Relevance::Irrelevant,
        }
    }
}

// =============================================================================
// File system
// =============================================================================

/// One level of the file system tree.
///
/// Under a host or a content object, siblings are ordered by metadata type
/// (higher values first, untyped objects ahead of typed ones) and then by
/// case-insensitive display name. The data source level holds the data
/// source's own node and orders by name only.
pub struct FileSystemBranch {
    dao: Arc<dyn CatalogDao>,
    scope: BranchScope,
    parent: FileSystemParent,
}

impl FileSystemBranch {
    /// The children of `parent`.
    pub fn new(dao: Arc<dyn CatalogDao>, parent: FileSystemParent) -> Self {
        Self {
            dao,
            scope: BranchScope::new(type_keys::FILE_SYSTEM, None),
            parent,
        }
    }

    /// The object whose children this level lists.
    pub fn parent(&self) -> FileSystemParent {
        self.parent
    }

    /// Returns `true` if `item` describes a child of this level.
    fn is_own_child(&self, item: &CatalogItem, parent: FileSystemParent) -> bool {
        match self.parent {
            FileSystemParent::DataSource(id) => item.id == CatalogId::Content(id),
            ours => ours == parent,
        }
    }

    fn is_shown(&self, item: &CatalogItem) -> bool {
        match &item.payload {
            CatalogParams::FileSystem { kind, .. } => {
                !matches!(self.parent, FileSystemParent::DataSource(_)) || kind.is_data_source()
            }
            _ => false,
        }
    }
}

impl ChildSource for FileSystemBranch {
    type Key = CatalogId;
    type Payload = CatalogParams;

    fn fetch_children(&self) -> Result<Vec<CatalogItem>, FetchError> {
        let mut items = self.dao.fetch_children(&ParentKey::FileSystem(self.parent))?;
        items.retain(|item| {
            let shown = self.is_shown(item);
            if !shown {
                tracing::warn!(
                    target: targets::CATALOG,
                    parent = %self.parent,
                    id = %item.id,
                    "dropped file system item of an unexpected kind"
                );
            }
            shown
        });
        Ok(items)
    }

    fn compare(&self, a: &CatalogItem, b: &CatalogItem) -> Ordering {
        let by_name = || {
            a.display_name
                .to_lowercase()
                .cmp(&b.display_name.to_lowercase())
        };
        if matches!(self.parent, FileSystemParent::DataSource(_)) {
            return by_name();
        }
        match (a.payload.meta_type(), b.payload.meta_type()) {
            (Some(left), Some(right)) => right.value().cmp(&left.value()).then_with(by_name),
            (None, Some(_)) => Ordering::Less,
            (Some(_), None) => Ordering::Greater,
            (None, None) => by_name(),
        }
    }
}

impl RelevanceFilter for FileSystemBranch {
    type Event = CatalogEvent;

    fn relevance(&self, event: &CatalogEvent) -> CatalogRelevance {
        if is_structural(&self.scope, event, true) {
            return Relevance::Structural;
        }
        match event {
            // An object the store cannot name may sit under any level.
            CatalogEvent::FileSystemChanged { item: None, .. } => Relevance::Structural,
            CatalogEvent::FileSystemChanged {
                parent,
                item: Some(item),
            } if self.is_own_child(item, *parent) && self.is_shown(item) => {
                Relevance::Replace(item.clone())
            }
            _ => Relevance::Irrelevant,
        }
    }
}

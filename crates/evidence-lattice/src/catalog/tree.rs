//! The evidence catalog tree.
//!
//! A [`CatalogTree`] owns one [`ChildReconciler`] per [`CatalogRegion`], plus
//! one per expanded [`CatalogSublevel`], and routes store change batches to
//! all of them. Classification is pure and runs on the rayon pool when
//! configured; each reconciler then acts on its own plan under its own lock.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use evidence_lattice::catalog::{CatalogDao, CatalogTree};
//! use evidence_lattice::CatalogConfig;
//!
//! fn build(dao: Arc<dyn CatalogDao>) {
//!     let tree = Arc::new(CatalogTree::new(dao, None, CatalogConfig::default()));
//!     let worker = tree.spawn_worker().unwrap();
//!
//!     worker.on_result().connect(|update| {
//!         println!("refreshed {} regions: {}", update.regions.len(), update.stats);
//!     });
//!     tree.refresh_in_background(&worker).unwrap();
//! }
//! ```

use std::collections::HashMap;
use std::fmt;
use std::hash::Hash;
use std::sync::Arc;

use evidence_lattice_core::logging::targets;
use evidence_lattice_core::{PassStats, Worker, WorkerError};
use parking_lot::RwLock;
use rayon::prelude::*;

use crate::config::CatalogConfig;
use crate::model::{
    BatchPlan, ChildReconciler, ChildSource, FetchError, RelevanceFilter, RetainedNode,
};

use super::branches::{
    ArtifactTypeBranch, DeletedContentBranch, FileExtensionBranch, FileSizeBranch, FileSystemBranch,
    MimeTypeBranch, TagNameBranch,
};
use super::dao::{CatalogDao, FileSystemParent};
use super::event::CatalogEvent;
use super::params::{CatalogId, CatalogParams, type_keys};

/// A plan for one catalog region.
pub type CatalogPlan = BatchPlan<CatalogId, CatalogParams>;

/// A retained catalog node.
pub type CatalogNode = Arc<RetainedNode<CatalogId, CatalogParams>>;

/// The top-level regions of the catalog tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum CatalogRegion {
    TagNames,
    DataArtifacts,
    DeletedContent,
    FileSizes,
    FileExtensions,
    MimeTypes,
}

impl CatalogRegion {
    /// Every region, in display order.
    pub const ALL: [Self; 6] = [
        Self::TagNames,
        Self::DataArtifacts,
        Self::DeletedContent,
        Self::FileSizes,
        Self::FileExtensions,
        Self::MimeTypes,
    ];

    /// The type key events for this region carry.
    pub fn type_key(self) -> &'static str {
        match self {
            Self::TagNames => type_keys::TAG_NAME,
            Self::DataArtifacts => type_keys::DATA_ARTIFACT,
            Self::DeletedContent => type_keys::DELETED_CONTENT,
            Self::FileSizes => type_keys::FILE_SIZE,
            Self::FileExtensions => type_keys::FILE_EXTENSION,
            Self::MimeTypes => type_keys::MIME_TYPE,
        }
    }

    /// The region's heading.
    pub fn display_name(self) -> &'static str {
        match self {
            Self::TagNames => "Tags",
            Self::DataArtifacts => "Data Artifacts",
            Self::DeletedContent => "Deleted Files",
            Self::FileSizes => "File Size",
            Self::FileExtensions => "By Extension",
            Self::MimeTypes => "By MIME Type",
        }
    }
}

impl fmt::Display for CatalogRegion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

/// An expanded level below a region.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum CatalogSublevel {
    /// The full mime types under one media type.
    MimeSubtypes(String),
    /// The children of one file system object.
    FileSystem(FileSystemParent),
}

impl fmt::Display for CatalogSublevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MimeSubtypes(prefix) => write!(f, "mime:{prefix}/*"),
            Self::FileSystem(parent) => write!(f, "fs:{parent}"),
        }
    }
}

/// Outcome of a tree-wide operation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CatalogUpdate {
    /// Regions that applied a pass.
    pub regions: Vec<CatalogRegion>,
    /// Regions whose fetch failed; they kept their displayed children.
    pub failed: Vec<CatalogRegion>,
    /// Expanded sub-levels that applied a pass.
    pub sublevels: Vec<CatalogSublevel>,
    /// Expanded sub-levels whose fetch failed.
    pub failed_sublevels: Vec<CatalogSublevel>,
    /// Combined pass counts of `regions` and `sublevels`.
    pub stats: PassStats,
}

impl CatalogUpdate {
    fn record(&mut self, region: CatalogRegion, outcome: Result<Option<PassStats>, FetchError>) {
        match outcome {
            Ok(Some(stats)) => {
                self.regions.push(region);
                self.stats += stats;
            }
            Ok(None) => {}
            Err(_) => self.failed.push(region),
        }
    }

    fn record_sublevel(&mut self, level: CatalogSublevel, outcome: Result<Option<PassStats>, FetchError>) {
        match outcome {
            Ok(Some(stats)) => {
                self.sublevels.push(level);
                self.stats += stats;
            }
            Ok(None) => {}
            Err(_) => self.failed_sublevels.push(level),
        }
    }

    /// Returns `true` if no region or sub-level did anything.
    pub fn is_empty(&self) -> bool {
        self.regions.is_empty()
            && self.failed.is_empty()
            && self.sublevels.is_empty()
            && self.failed_sublevels.is_empty()
    }
}

/// Reconcilers of expanded sub-levels, keyed by what was expanded.
struct Sublevels<K, S: ChildSource> {
    levels: RwLock<HashMap<K, Arc<ChildReconciler<S>>>>,
}

impl<K: Clone + Eq + Hash + Ord, S: ChildSource> Sublevels<K, S> {
    fn new() -> Self {
        Self {
            levels: RwLock::new(HashMap::new()),
        }
    }

    fn get(&self, key: &K) -> Option<Arc<ChildReconciler<S>>> {
        self.levels.read().get(key).cloned()
    }

    fn get_or_insert_with(&self, key: K, make: impl FnOnce() -> S) -> Arc<ChildReconciler<S>> {
        let mut levels = self.levels.write();
        Arc::clone(
            levels
                .entry(key)
                .or_insert_with(|| Arc::new(ChildReconciler::new(make()))),
        )
    }

    fn remove(&self, key: &K) -> Option<Arc<ChildReconciler<S>>> {
        self.levels.write().remove(key)
    }

    /// Every level, ordered by key.
    fn entries(&self) -> Vec<(K, Arc<ChildReconciler<S>>)> {
        let mut entries: Vec<_> = self
            .levels
            .read()
            .iter()
            .map(|(key, reconciler)| (key.clone(), Arc::clone(reconciler)))
            .collect();
        entries.sort_by(|(a, _), (b, _)| a.cmp(b));
        entries
    }

    fn drain(&self) -> Vec<Arc<ChildReconciler<S>>> {
        self.levels.write().drain().map(|(_, reconciler)| reconciler).collect()
    }
}

/// Binds `$reconciler` to the region's reconciler and evaluates `$body`.
macro_rules! with_region {
    ($tree:expr, $region:expr, |$reconciler:ident| $body:expr) => {
        match $region {
            CatalogRegion::TagNames => {
                let $reconciler = &$tree.tag_names;
                $body
            }
            CatalogRegion::DataArtifacts => {
                let $reconciler = &$tree.data_artifacts;
                $body
            }
            CatalogRegion::DeletedContent => {
                let $reconciler = &$tree.deleted_content;
                $body
            }
            CatalogRegion::FileSizes => {
                let $reconciler = &$tree.file_sizes;
                $body
            }
            CatalogRegion::FileExtensions => {
                let $reconciler = &$tree.file_extensions;
                $body
            }
            CatalogRegion::MimeTypes => {
                let $reconciler = &$tree.mime_types;
                $body
            }
        }
    };
}

/// The evidence catalog: one reconciled branch per region and per expanded
/// sub-level.
pub struct CatalogTree {
    config: CatalogConfig,
    data_source_id: Option<i64>,
    dao: Arc<dyn CatalogDao>,
    tag_names: ChildReconciler<TagNameBranch>,
    data_artifacts: ChildReconciler<ArtifactTypeBranch>,
    deleted_content: ChildReconciler<DeletedContentBranch>,
    file_sizes: ChildReconciler<FileSizeBranch>,
    file_extensions: ChildReconciler<FileExtensionBranch>,
    mime_types: ChildReconciler<MimeTypeBranch>,
    mime_subtypes: Sublevels<String, MimeTypeBranch>,
    file_system: Sublevels<FileSystemParent, FileSystemBranch>,
}

impl CatalogTree {
    /// Builds the tree over `dao`, optionally restricted to one data source.
    ///
    /// Nothing is fetched until a region is reconciled.
    pub fn new(dao: Arc<dyn CatalogDao>, data_source_id: Option<i64>, config: CatalogConfig) -> Self {
        let artifacts = ArtifactTypeBranch::new(dao.clone(), data_source_id)
            .with_ignored_types(config.ignored_artifact_types.iter().copied());
        Self {
            tag_names: ChildReconciler::new(TagNameBranch::new(dao.clone(), data_source_id)),
            data_artifacts: ChildReconciler::new(artifacts),
            deleted_content: ChildReconciler::new(DeletedContentBranch::new(dao.clone(), data_source_id)),
            file_sizes: ChildReconciler::new(FileSizeBranch::new(dao.clone(), data_source_id)),
            file_extensions: ChildReconciler::new(FileExtensionBranch::new(dao.clone(), data_source_id)),
            mime_types: ChildReconciler::new(MimeTypeBranch::prefixes(dao.clone(), data_source_id)),
            mime_subtypes: Sublevels::new(),
            file_system: Sublevels::new(),
            dao,
            config,
            data_source_id,
        }
    }

    /// The configuration the tree was built with.
    pub fn config(&self) -> &CatalogConfig {
        &self.config
    }

    /// The data source every region is restricted to, if any.
    pub fn data_source_id(&self) -> Option<i64> {
        self.data_source_id
    }

    // -------------------------------------------------------------------------
    // Region access
    // -------------------------------------------------------------------------

    /// The tag names region.
    pub fn tag_names(&self) -> &ChildReconciler<TagNameBranch> {
        &self.tag_names
    }

    /// The data artifact types region.
    pub fn data_artifacts(&self) -> &ChildReconciler<ArtifactTypeBranch> {
        &self.data_artifacts
    }

    /// The deleted content region.
    pub fn deleted_content(&self) -> &ChildReconciler<DeletedContentBranch> {
        &self.deleted_content
    }

    /// The file size region.
    pub fn file_sizes(&self) -> &ChildReconciler<FileSizeBranch> {
        &self.file_sizes
    }

    /// The file extension region.
    pub fn file_extensions(&self) -> &ChildReconciler<FileExtensionBranch> {
        &self.file_extensions
    }

    /// The top level of the mime type region (media types).
    pub fn mime_types(&self) -> &ChildReconciler<MimeTypeBranch> {
        &self.mime_types
    }

    /// Reconciles one region (fetching on first use).
    pub fn reconcile(&self, region: CatalogRegion) -> Vec<CatalogId> {
        with_region!(self, region, |reconciler| reconciler.reconcile())
    }

    /// Re-fetches one region.
    pub fn refresh(&self, region: CatalogRegion) -> Vec<CatalogId> {
        with_region!(self, region, |reconciler| reconciler.refresh())
    }

    /// Drops one region's children.
    pub fn detach(&self, region: CatalogRegion) {
        with_region!(self, region, |reconciler| reconciler.detach())
    }

    /// The identities one region displays, in order.
    pub fn displayed(&self, region: CatalogRegion) -> Vec<CatalogId> {
        with_region!(self, region, |reconciler| reconciler.displayed())
    }

    /// A retained node of one region.
    pub fn node(&self, region: CatalogRegion, id: &CatalogId) -> Option<CatalogNode> {
        with_region!(self, region, |reconciler| reconciler.node(id))
    }

    /// Returns `true` if the region holds a snapshot, i.e. it was reconciled
    /// and not detached since.
    pub fn is_attached(&self, region: CatalogRegion) -> bool {
        with_region!(self, region, |reconciler| reconciler.has_snapshot())
    }

    // -------------------------------------------------------------------------
    // Expanded sub-levels
    // -------------------------------------------------------------------------

    /// Expands a mime media type (`image`) and reconciles its full types.
    ///
    /// The level is created on first use and receives every later batch
    /// until it is collapsed.
    pub fn expand_mime_type(&self, prefix: &str) -> Vec<CatalogId> {
        let data_source_id = self.data_source_id;
        self.mime_subtypes
            .get_or_insert_with(prefix.to_owned(), || {
                MimeTypeBranch::under(self.dao.clone(), data_source_id, prefix)
            })
            .reconcile()
    }

    /// The level under an expanded media type.
    pub fn mime_subtypes(&self, prefix: &str) -> Option<Arc<ChildReconciler<MimeTypeBranch>>> {
        self.mime_subtypes.get(&prefix.to_owned())
    }

    /// Drops the level under a media type. Returns `false` if it was not
    /// expanded.
    pub fn collapse_mime_type(&self, prefix: &str) -> bool {
        match self.mime_subtypes.remove(&prefix.to_owned()) {
            Some(level) => {
                level.detach();
                true
            }
            None => false,
        }
    }

    /// Expands a file system object (or a host's data sources) and
    /// reconciles its children.
    pub fn expand_file_system(&self, parent: FileSystemParent) -> Vec<CatalogId> {
        self.file_system
            .get_or_insert_with(parent, || FileSystemBranch::new(self.dao.clone(), parent))
            .reconcile()
    }

    /// The level under an expanded file system object.
    pub fn file_system(&self, parent: FileSystemParent) -> Option<Arc<ChildReconciler<FileSystemBranch>>> {
        self.file_system.get(&parent)
    }

    /// Drops the level under a file system object. Returns `false` if it
    /// was not expanded.
    pub fn collapse_file_system(&self, parent: FileSystemParent) -> bool {
        match self.file_system.remove(&parent) {
            Some(level) => {
                level.detach();
                true
            }
            None => false,
        }
    }

    /// Every expanded sub-level, mime types first.
    pub fn sublevels(&self) -> Vec<CatalogSublevel> {
        let mime = self
            .mime_subtypes
            .entries()
            .into_iter()
            .map(|(prefix, _)| CatalogSublevel::MimeSubtypes(prefix));
        let file_system = self
            .file_system
            .entries()
            .into_iter()
            .map(|(parent, _)| CatalogSublevel::FileSystem(parent));
        mime.chain(file_system).collect()
    }

    // -------------------------------------------------------------------------
    // Tree-wide operations
    // -------------------------------------------------------------------------

    /// Re-fetches every region and every expanded sub-level.
    pub fn refresh_all(&self) -> CatalogUpdate {
        let outcomes = self.map_work(CatalogRegion::ALL.to_vec(), |region| {
            let outcome = with_region!(self, region, |reconciler| reconciler.try_refresh());
            (region, outcome.map(Some))
        });

        let mut update = CatalogUpdate::default();
        for (region, outcome) in outcomes {
            update.record(region, outcome);
        }
        self.run_sublevels(
            &self.mime_subtypes,
            CatalogSublevel::MimeSubtypes,
            |reconciler| reconciler.try_refresh().map(Some),
            &mut update,
        );
        self.run_sublevels(
            &self.file_system,
            CatalogSublevel::FileSystem,
            |reconciler| reconciler.try_refresh().map(Some),
            &mut update,
        );

        tracing::debug!(
            target: targets::CATALOG,
            refreshed = update.regions.len() + update.sublevels.len(),
            failed = update.failed.len() + update.failed_sublevels.len(),
            stats = %update.stats,
            "catalog refreshed"
        );
        update
    }

    /// Drops every region's children and every expanded sub-level.
    pub fn detach_all(&self) {
        for region in CatalogRegion::ALL {
            self.detach(region);
        }
        for level in self.mime_subtypes.drain() {
            level.detach();
        }
        for level in self.file_system.drain() {
            level.detach();
        }
    }

    /// Classifies a batch against every region without acting on it.
    pub fn classify(&self, events: &[CatalogEvent]) -> Vec<(CatalogRegion, CatalogPlan)> {
        let plan = |region: CatalogRegion| {
            let plan = with_region!(self, region, |reconciler| reconciler.source().plan(events));
            (region, plan)
        };
        if self.config.parallel_classification {
            CatalogRegion::ALL.par_iter().map(|&region| plan(region)).collect()
        } else {
            CatalogRegion::ALL.iter().map(|&region| plan(region)).collect()
        }
    }

    /// Classifies a batch and applies the resulting plans to every region
    /// and expanded sub-level.
    ///
    /// Regions that were never reconciled (or were detached, even while the
    /// batch was being classified) are skipped: they hold nothing to patch,
    /// and their first reconcile fetches fresh counts anyway.
    pub fn handle_events(&self, events: &[CatalogEvent]) -> CatalogUpdate {
        let plans: Vec<_> = self
            .classify(events)
            .into_iter()
            .filter(|(_, plan)| !matches!(plan, BatchPlan::Ignore))
            .collect();
        let outcomes = self.map_work(plans, |(region, plan)| (region, self.act(region, plan)));

        let mut update = CatalogUpdate::default();
        for (region, outcome) in outcomes {
            update.record(region, outcome);
        }
        self.run_sublevels(
            &self.mime_subtypes,
            CatalogSublevel::MimeSubtypes,
            |reconciler| apply_batch(reconciler, events),
            &mut update,
        );
        self.run_sublevels(
            &self.file_system,
            CatalogSublevel::FileSystem,
            |reconciler| apply_batch(reconciler, events),
            &mut update,
        );

        tracing::debug!(
            target: targets::CATALOG,
            events = events.len(),
            touched = update.regions.len() + update.sublevels.len(),
            failed = update.failed.len() + update.failed_sublevels.len(),
            "event batch handled"
        );
        update
    }

    fn act(&self, region: CatalogRegion, plan: CatalogPlan) -> Result<Option<PassStats>, FetchError> {
        with_region!(self, region, |reconciler| reconciler.try_apply_plan(plan))
    }

    /// Maps `work` on the rayon pool when parallel classification is on.
    fn map_work<T, R>(&self, work: Vec<T>, f: impl Fn(T) -> R + Send + Sync) -> Vec<R>
    where
        T: Send,
        R: Send,
    {
        if self.config.parallel_classification {
            work.into_par_iter().map(f).collect()
        } else {
            work.into_iter().map(f).collect()
        }
    }

    fn run_sublevels<K, S>(
        &self,
        levels: &Sublevels<K, S>,
        label: fn(K) -> CatalogSublevel,
        op: impl Fn(&ChildReconciler<S>) -> Result<Option<PassStats>, FetchError> + Send + Sync,
        update: &mut CatalogUpdate,
    ) where
        K: Clone + Eq + Hash + Ord + Send + Sync,
        S: ChildSource,
    {
        let outcomes = self.map_work(levels.entries(), |(key, reconciler)| {
            (label(key), op(reconciler.as_ref()))
        });
        for (level, outcome) in outcomes {
            update.record_sublevel(level, outcome);
        }
    }

    // -------------------------------------------------------------------------
    // Background work
    // -------------------------------------------------------------------------

    /// Starts a worker configured from [`CatalogConfig`].
    pub fn spawn_worker(&self) -> Result<Worker<CatalogUpdate>, WorkerError> {
        self.config.worker_builder().build()
    }

    /// Queues [`refresh_all`](Self::refresh_all) on `worker`; the result is
    /// emitted through the worker's `on_result` signal.
    pub fn refresh_in_background(self: &Arc<Self>, worker: &Worker<CatalogUpdate>) -> Result<(), WorkerError> {
        let tree = Arc::clone(self);
        worker.send(move || tree.refresh_all())
    }

    /// Queues [`handle_events`](Self::handle_events) on `worker`.
    pub fn handle_events_in_background(
        self: &Arc<Self>,
        worker: &Worker<CatalogUpdate>,
        events: Vec<CatalogEvent>,
    ) -> Result<(), WorkerError> {
        let tree = Arc::clone(self);
        worker.send(move || tree.handle_events(&events))
    }
}

/// Plans a batch for one sub-level and applies it if it is still attached.
fn apply_batch<S>(reconciler: &ChildReconciler<S>, events: &[CatalogEvent]) -> Result<Option<PassStats>, FetchError>
where
    S: RelevanceFilter<Event = CatalogEvent>,
{
    match reconciler.source().plan(events) {
        BatchPlan::Ignore => Ok(None),
        plan => reconciler.try_apply_plan(plan),
    }
}

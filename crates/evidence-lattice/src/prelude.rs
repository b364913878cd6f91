//! Prelude module for Evidence Lattice.
//!
//! This module re-exports the most commonly used types for convenient importing:
//!
//! ```ignore
//! use evidence_lattice::prelude::*;
//! ```
//!
//! This provides access to:
//! - Signal/slot system (`Signal`, `ConnectionId`)
//! - Background work (`Worker`, `WorkerBuilder`)
//! - Tree reconciliation (`ChildReconciler`, `ChildSource`, `RelevanceFilter`)
//! - Paged results (`ResultPageCache`, `PageQuery`) and flat-list diffing
//! - The evidence catalog (`CatalogTree`, `CatalogDao`, `CatalogEvent`)

// ============================================================================
// Signal/Slot System
// ============================================================================

pub use crate::signal::{ConnectionGuard, ConnectionId, Signal};

// ============================================================================
// Background Work
// ============================================================================

pub use crate::worker::{Worker, WorkerBuilder};
pub use crate::logging::PassStats;

// ============================================================================
// Model Layer
// ============================================================================

pub use crate::model::{
    Action, BatchPlan, BranchScope, ChildReconciler, ChildSource, Count, FetchError, Item,
    ModelError, ModelResult, Relevance, RelevanceFilter, RetainedNode,
};

pub use crate::model::{Page, PageQuery, ResultPageCache};

pub use crate::model::{FlatResultList, IdentifiedRow, ListDelta, RowIdentity};

// ============================================================================
// Evidence Catalog
// ============================================================================

pub use crate::catalog::{
    CatalogDao, CatalogEvent, CatalogId, CatalogItem, CatalogParams, CatalogRegion,
    CatalogSublevel, CatalogTree, CatalogUpdate, FileSystemParent, ResultRow,
};

pub use crate::{CatalogConfig, ConfigError};

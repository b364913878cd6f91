//! Model synchronization engines.
//!
//! This module keeps displayed models consistent with a backing store that
//! changes asynchronously, without rebuilding the visible structure:
//!
//! - `ChildReconciler`: reconciles one tree branch's children against fresh
//!   snapshots, preserving node identity
//! - `RelevanceFilter`: decides per branch whether a change batch matters
//! - `ResultPageCache`: serves one page of a large result set at a time
//! - `FlatResultList`: identity-keyed diffing for single-level listings
//!
//! # Core Types
//!
//! - `Item`: one snapshot row (identity, type key, payload, name, count)
//! - `Count`: display count (`Exact`, `AtLeast`, `NotShown`)
//! - `RetainedNode`: the long-lived, in-place updated proxy for an identity
//! - `Page`: one materialized page of results
//!
//! # Architecture Overview
//!
//! ```text
//! ┌─────────────┐  fetch   ┌──────────────────┐  signals  ┌─────────────┐
//! │ ChildSource │<─────────│ ChildReconciler  │──────────>│  Renderer   │
//! │ (collab.)   │─────────>│  NodeRegistry    │           │             │
//! └─────────────┘ snapshot └──────────────────┘           └─────────────┘
//!        ▲                          ▲
//!        │                          │ BatchPlan
//!        │                 ┌──────────────────┐
//!        └─────────────────│ RelevanceFilter  │<──── change events
//!                          └──────────────────┘
//! ```
//!
//! Renderers hold `Arc<RetainedNode>` handles; those stay valid across every
//! pass in which their identity persists.

mod error;
mod flat_list;
mod item;
mod paging;
mod reconcile;
mod registry;
mod relevance;
mod signals;
mod source;

pub use error::{FetchError, ModelError, ModelResult};
pub use flat_list::{FlatResultList, IdentifiedRow, ListDelta, RowFactory, RowIdentity};
pub use item::{Count, Item};
pub use paging::{DEFAULT_PAGE_SIZE, FnQuery, Page, PageInfo, PageQuery, ResultPageCache};
pub use reconcile::ChildReconciler;
pub use registry::{NodeKey, NodeRegistry, PassChanges, RetainedNode};
pub use relevance::{Action, BatchPlan, BranchScope, Relevance, RelevanceFilter};
pub use signals::{FlatListSignals, PageSignals, ReconcileSignals};
pub use source::{ChildSource, FnSource};

//! Evidence Lattice - retained tree and paged result models for evidence
//! catalogs.
//!
//! The crate keeps a lazily populated, hierarchical catalog in sync with a
//! backing store that reports changes in coarse batches. Tree nodes are
//! retained across refreshes so a presentation layer keeps its expansion and
//! selection state; result sets are served one cached page at a time.
//!
//! # Example
//!
//! ```
//! use evidence_lattice::model::{ChildReconciler, Count, FnSource, Item};
//!
//! let source = FnSource::new(|| {
//!     Ok(vec![
//!         Item::new(1u32, "tag", (), "Notable").with_count(Count::Exact(3)),
//!         Item::new(2u32, "tag", (), "Follow Up"),
//!     ])
//! });
//! let branch = ChildReconciler::new(source);
//!
//! assert_eq!(branch.reconcile(), vec![1, 2]);
//! assert_eq!(branch.node(&1).unwrap().display_count(), Count::Exact(3));
//! ```

pub use evidence_lattice_core::*;

pub mod catalog;
mod config;
pub mod model;
pub mod prelude;

pub use config::{CatalogConfig, ConfigError};

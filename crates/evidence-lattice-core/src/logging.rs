//! Logging facilities for Evidence Lattice.
//!
//! Evidence Lattice uses the `tracing` crate for instrumentation and never
//! installs a subscriber itself. To see logs, install one in the host
//! application:
//!
//! ```no_run
//! fn main() {
//!     tracing_subscriber::fmt()
//!         .with_env_filter("evidence_lattice::reconcile=debug")
//!         .init();
//! }
//! ```
//!
//! Severity conventions used across the workspace:
//!
//! - `error`: a collaborator broke a contract (for example an identity
//!   mismatch on a retained node). These indicate defects, not runtime
//!   conditions.
//! - `warn`: a collaborator fetch failed and the engine kept its last good
//!   state.
//! - `debug`: per-pass bookkeeping (created/updated/removed counts).
//! - `trace`: signal emission and other hot paths.

use std::fmt;

/// Target names for log filtering.
///
/// Use these with `tracing` directives to filter logs by subsystem.
pub mod targets {
    /// Core crate target.
    pub const CORE: &str = "evidence_lattice_core";
    /// Signal/slot system target.
    pub const SIGNAL: &str = "evidence_lattice_core::signal";
    /// Background worker target.
    pub const WORKER: &str = "evidence_lattice_core::worker";
    /// Tree reconciliation target.
    pub const RECONCILE: &str = "evidence_lattice::reconcile";
    /// Retained node registry target.
    pub const REGISTRY: &str = "evidence_lattice::registry";
    /// Change-relevance classification target.
    pub const RELEVANCE: &str = "evidence_lattice::relevance";
    /// Result page cache target.
    pub const PAGING: &str = "evidence_lattice::paging";
    /// Flat result list target.
    pub const FLAT_LIST: &str = "evidence_lattice::flat_list";
    /// Evidence catalog tree target.
    pub const CATALOG: &str = "evidence_lattice::catalog";
}

/// Counts recorded for a single reconciliation pass.
///
/// Engines log this at `debug` after each pass and keep the last one around
/// for inspection.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PassStats {
    /// Nodes created because their identity was new.
    pub created: usize,
    /// Retained nodes whose display fields changed in place.
    pub updated: usize,
    /// Retained nodes dropped because their identity disappeared.
    pub removed: usize,
    /// Retained nodes that were present and unchanged.
    pub unchanged: usize,
}

impl PassStats {
    /// Returns `true` if the pass neither created nor removed a node.
    pub fn is_churn_free(&self) -> bool {
        self.created == 0 && self.removed == 0
    }

    /// Returns `true` if the pass changed nothing at all.
    pub fn is_noop(&self) -> bool {
        self.is_churn_free() && self.updated == 0
    }
}

impl std::ops::AddAssign for PassStats {
    fn add_assign(&mut self, other: Self) {
        self.created += other.created;
        self.updated += other.updated;
        self.removed += other.removed;
        self.unchanged += other.unchanged;
    }
}

impl std::iter::Sum for PassStats {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Self::default(), |mut total, stats| {
            total += stats;
            total
        })
    }
}

impl fmt::Display for PassStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "+{} ~{} -{} ={}",
            self.created, self.updated, self.removed, self.unchanged
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pass_stats_churn() {
        let stats = PassStats {
            updated: 1,
            unchanged: 4,
            ..Default::default()
        };
        assert!(stats.is_churn_free());
        assert!(!stats.is_noop());
        assert_eq!(stats.to_string(), "+0 ~1 -0 =4");

        let stats = PassStats {
            created: 1,
            ..Default::default()
        };
        assert!(!stats.is_churn_free());
    }

    #[test]
    fn test_pass_stats_sum() {
        let total: PassStats = [
            PassStats { created: 2, ..Default::default() },
            PassStats { updated: 1, unchanged: 3, ..Default::default() },
        ]
        .into_iter()
        .sum();
        assert_eq!(total.to_string(), "+2 ~1 -0 =3");
    }

    #[test]
    fn test_targets_are_namespaced() {
        assert!(targets::SIGNAL.starts_with(targets::CORE));
        assert!(targets::RECONCILE.starts_with("evidence_lattice::"));
    }

    #[test]
    fn test_targets_are_valid_filter_directives() {
        use tracing_subscriber::EnvFilter;

        for target in [
            targets::CORE,
            targets::SIGNAL,
            targets::WORKER,
            targets::RECONCILE,
            targets::REGISTRY,
            targets::RELEVANCE,
            targets::PAGING,
            targets::FLAT_LIST,
            targets::CATALOG,
        ] {
            let directive = format!("{target}=debug");
            assert!(EnvFilter::try_new(&directive).is_ok(), "bad directive {directive}");
        }
    }
}

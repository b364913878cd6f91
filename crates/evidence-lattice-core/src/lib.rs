//! Core systems for Evidence Lattice.
//!
//! This crate provides the primitives the model layer in `evidence-lattice`
//! is built on:
//!
//! - **Signal/Slot System**: Type-safe change notification from engines to
//!   the rendering collaborator
//! - **Worker**: A dedicated background thread so blocking collaborator
//!   fetches never run on the rendering thread
//! - **Logging**: `tracing` targets and per-pass bookkeeping
//!
//! # Signal/Slot Example
//!
//! ```
//! use evidence_lattice_core::Signal;
//!
//! let value_changed = Signal::<i32>::new();
//!
//! let conn_id = value_changed.connect(|value| {
//!     println!("Value changed to: {}", value);
//! });
//!
//! value_changed.emit(42);
//! value_changed.disconnect(conn_id);
//! ```

mod error;
pub mod logging;
pub mod signal;
pub mod worker;

pub use error::{CoreError, Result, SignalError, WorkerError};
pub use logging::PassStats;
pub use signal::{ConnectionGuard, ConnectionId, Signal};
pub use worker::{Worker, WorkerBuilder, WorkerConfig};

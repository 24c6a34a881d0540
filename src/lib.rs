//! The Orchestrator: one bounded run synchronizing every discovered
//! database between a hosted store and a local folder tree.
//!
//! This crate wires together the sync primitives built in `tablesync-*`:
//! discovery, schema reconciliation, row sync in both directions, record
//! file sync, the registry/folder layout, process-wide locking, and
//! execution logging. It owns none of the domain logic itself — only
//! the run loop, `Config`, and the two invariants (agent-tasks priority,
//! Single-In-Progress) that only make sense at the whole-run level.

mod config;
mod engine;
mod error;
mod invariants;
mod result;

pub use config::Config;
pub use engine::{DatabaseError, Engine};
pub use error::EngineError;
pub use invariants::{enforce_single_in_progress, Demotion, IN_PROGRESS};
pub use result::{DatabaseOutcome, DatabaseState, RunResult};

//! Column/cell model, schema reconciliation, and property matching.
//!
//! Replaces the source's dynamic property bag with a typed `Cell` over
//! the fixed `PropertyKind` enumeration, per the engine's design notes.

mod cache;
mod cell;
mod diff;
mod error;
mod matcher;

pub use cache::{RunCaches, Side};
pub use cell::{Cell, Column};
pub use diff::{sync_schema, SchemaAction, SchemaDiff};
pub use error::SchemaError;
pub use matcher::{MatchResult, MatchStrategyKind, PropertyMatcher};

pub use tablesync_remote::PropertyKind;

//! Remote-store domain types and the [`RemoteClient`] trait boundary.
//!
//! This crate deliberately contains no HTTP client. The hosted service's
//! REST semantics are a host concern (see the engine's scope notes); this
//! crate only defines the shapes that cross the boundary and the trait a
//! host implements to provide them.

mod client;
mod error;
mod types;

#[cfg(feature = "mock")]
pub mod mock;

pub use client::RemoteClient;
pub use error::RemoteError;
pub use types::{
    ExecutionPageFields, InlineSpan, PageBlock, PropertyKind, RemoteDatabase, RemotePage,
    RemoteProperty, RemoteRow, RemoteValue, RowPage,
};

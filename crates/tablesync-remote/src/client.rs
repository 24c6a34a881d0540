//! The `RemoteClient` capability boundary.
//!
//! This crate never implements HTTP itself — per the engine's scope, the
//! remote store's REST semantics are a host concern. Hosts provide a
//! `RemoteClient`; tests use [`crate::mock::MockRemoteClient`].

use std::collections::BTreeMap;

use async_trait::async_trait;

use crate::error::RemoteError;
use crate::types::{
    ExecutionPageFields, PageBlock, RemoteDatabase, RemotePage, RemoteProperty, RemoteRow,
    RemoteValue, RowPage,
};

/// Everything the engine needs from the hosted service.
///
/// Mirrors the shape of `SyncTransport` in the teacher's sync layer: a
/// narrow, `Send + Sync` trait object the engine drives without knowing
/// the transport underneath.
#[async_trait]
pub trait RemoteClient: Send + Sync {
    /// Enumerate every database visible to the caller.
    async fn search_databases(&self) -> Result<Vec<RemoteDatabase>, RemoteError>;

    /// Resolve a database id to the stable data-source id required for
    /// all write paths.
    async fn resolve_data_source_id(&self, database_id: &str) -> Result<String, RemoteError>;

    /// Fetch the current column/property schema for a data source.
    async fn fetch_schema(&self, data_source_id: &str) -> Result<Vec<RemoteProperty>, RemoteError>;

    /// Page through rows in stable remote-row-id order.
    async fn list_rows(
        &self,
        data_source_id: &str,
        cursor: Option<&str>,
    ) -> Result<RowPage, RemoteError>;

    /// Fetch a single row by id, e.g. to check for orphans.
    async fn fetch_row(
        &self,
        data_source_id: &str,
        row_id: &str,
    ) -> Result<Option<RemoteRow>, RemoteError>;

    /// Create a new row with the given property values.
    async fn create_row(
        &self,
        data_source_id: &str,
        values: &BTreeMap<String, RemoteValue>,
    ) -> Result<RemoteRow, RemoteError>;

    /// Update an existing row's property values.
    async fn update_row(
        &self,
        data_source_id: &str,
        row_id: &str,
        values: &BTreeMap<String, RemoteValue>,
    ) -> Result<RemoteRow, RemoteError>;

    /// Add a new property/column to the remote schema.
    async fn create_property(
        &self,
        data_source_id: &str,
        property: &RemoteProperty,
    ) -> Result<(), RemoteError>;

    /// Add options to a single/multi-select or status property, unioning
    /// with whatever options already exist.
    async fn add_property_options(
        &self,
        data_source_id: &str,
        property_name: &str,
        new_options: &[String],
    ) -> Result<(), RemoteError>;

    /// Fetch a row's page content for record-file sync.
    async fn fetch_page(&self, page_id: &str) -> Result<RemotePage, RemoteError>;

    /// Create a page for a row that doesn't have one yet, returning its id.
    async fn create_page(&self, data_source_id: &str, row_id: &str) -> Result<String, RemoteError>;

    /// Replace a page's body content.
    async fn update_page(&self, page_id: &str, blocks: &[PageBlock]) -> Result<(), RemoteError>;

    /// Create the execution-record page for this run.
    /// A failure here is logged but not fatal to the run.
    async fn create_execution_page(
        &self,
        fields: &ExecutionPageFields,
    ) -> Result<String, RemoteError>;

    /// Update the execution-record page, e.g. at finalization.
    async fn update_execution_page(
        &self,
        page_id: &str,
        fields: &ExecutionPageFields,
    ) -> Result<(), RemoteError>;

    /// Pause an external trigger whose handler name matches this run's
    /// entrypoint, so a second concurrent run can't be invoked. Scoped narrowly by the host implementation.
    async fn pause_trigger(&self, handler_name: &str) -> Result<(), RemoteError>;

    /// Resume a previously paused trigger.
    async fn resume_trigger(&self, handler_name: &str) -> Result<(), RemoteError>;
}

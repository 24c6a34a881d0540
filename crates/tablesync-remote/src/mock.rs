//! An in-memory [`RemoteClient`] used by the engine's integration tests
//! to simulate the remote store deterministically.

use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;

use crate::client::RemoteClient;
use crate::error::RemoteError;
use crate::types::{
    ExecutionPageFields, PageBlock, RemoteDatabase, RemotePage, RemoteProperty, RemoteRow,
    RemoteValue, RowPage,
};

#[derive(Default)]
struct DatabaseState {
    database: RemoteDatabase,
    schema: Vec<RemoteProperty>,
    rows: BTreeMap<String, RemoteRow>,
    next_row_seq: u64,
}

impl Default for RemoteDatabase {
    fn default() -> Self {
        RemoteDatabase {
            id: String::new(),
            display_name: String::new(),
            parent_workspace: String::new(),
            schema_version_stamp: String::new(),
            data_source_id: None,
        }
    }
}

#[derive(Default)]
struct State {
    databases: BTreeMap<String, DatabaseState>,
    pages: BTreeMap<String, RemotePage>,
    execution_pages: BTreeMap<String, ExecutionPageFields>,
    paused_triggers: Vec<String>,
    next_page_seq: u64,
    /// Database ids whose next call should fail transiently, once.
    fail_transient_once: Vec<String>,
    /// Database ids whose next `add_property_options` call should fail
    /// permanently, once, simulating a rejected option payload.
    fail_option_sync_once: Vec<String>,
}

/// A fully in-process stand-in for the hosted service.
pub struct MockRemoteClient {
    state: Mutex<State>,
}

impl Default for MockRemoteClient {
    fn default() -> Self {
        Self::new()
    }
}

impl MockRemoteClient {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(State::default()),
        }
    }

    /// Seed a database with a schema and no rows yet.
    pub fn seed_database(&self, db: RemoteDatabase, schema: Vec<RemoteProperty>) {
        let mut state = self.state.lock();
        let id = db.id.clone();
        state.databases.insert(
            id,
            DatabaseState {
                database: db,
                schema,
                rows: BTreeMap::new(),
                next_row_seq: 1,
            },
        );
    }

    /// Seed a row directly (bypassing `create_row`'s id generation), used
    /// to set up pre-existing remote state for a scenario.
    pub fn seed_row(&self, database_id: &str, row: RemoteRow) {
        let mut state = self.state.lock();
        if let Some(db) = state.databases.get_mut(database_id) {
            db.rows.insert(row.id.clone(), row);
        }
    }

    pub fn seed_page(&self, page: RemotePage) {
        self.state.lock().pages.insert(page.page_id.clone(), page);
    }

    /// Directly mutate a row's values and last-edited stamp, simulating
    /// an edit made on the remote side between runs.
    pub fn edit_row(
        &self,
        database_id: &str,
        row_id: &str,
        values: BTreeMap<String, RemoteValue>,
        last_edited_time: DateTime<Utc>,
    ) {
        let mut state = self.state.lock();
        if let Some(db) = state.databases.get_mut(database_id) {
            if let Some(row) = db.rows.get_mut(row_id) {
                row.values.extend(values);
                row.last_edited_time = last_edited_time;
            }
        }
    }

    pub fn remove_row(&self, database_id: &str, row_id: &str) {
        let mut state = self.state.lock();
        if let Some(db) = state.databases.get_mut(database_id) {
            db.rows.remove(row_id);
        }
    }

    pub fn rename_database(&self, database_id: &str, new_name: &str) {
        let mut state = self.state.lock();
        if let Some(db) = state.databases.get_mut(database_id) {
            db.database.display_name = new_name.to_string();
        }
    }

    pub fn add_schema_property(&self, database_id: &str, property: RemoteProperty) {
        let mut state = self.state.lock();
        if let Some(db) = state.databases.get_mut(database_id) {
            db.schema.push(property);
        }
    }

    pub fn is_trigger_paused(&self, handler_name: &str) -> bool {
        self.state
            .lock()
            .paused_triggers
            .iter()
            .any(|h| h == handler_name)
    }

    pub fn execution_page(&self, page_id: &str) -> Option<ExecutionPageFields> {
        self.state.lock().execution_pages.get(page_id).cloned()
    }

    /// Arrange for the next operation against `database_id` to fail with
    /// a transient error, exercising the retry/backoff path.
    pub fn fail_next_transient(&self, database_id: &str) {
        self.state
            .lock()
            .fail_transient_once
            .push(database_id.to_string());
    }

    /// Arrange for the next `add_property_options` call against
    /// `database_id` to fail permanently, exercising the per-row
    /// failure-isolation path.
    pub fn fail_next_option_sync(&self, database_id: &str) {
        self.state
            .lock()
            .fail_option_sync_once
            .push(database_id.to_string());
    }

    fn maybe_fail_option_sync(&self, database_id: &str) -> Result<(), RemoteError> {
        let mut state = self.state.lock();
        if let Some(pos) = state
            .fail_option_sync_once
            .iter()
            .position(|id| id == database_id)
        {
            state.fail_option_sync_once.remove(pos);
            return Err(RemoteError::Permanent {
                status: Some(400),
                message: "simulated invalid option payload".to_string(),
            });
        }
        Ok(())
    }

    fn maybe_fail_transient(&self, database_id: &str) -> Result<(), RemoteError> {
        let mut state = self.state.lock();
        if let Some(pos) = state
            .fail_transient_once
            .iter()
            .position(|id| id == database_id)
        {
            state.fail_transient_once.remove(pos);
            return Err(RemoteError::Transient {
                status: Some(503),
                message: "simulated transient failure".to_string(),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl RemoteClient for MockRemoteClient {
    async fn search_databases(&self) -> Result<Vec<RemoteDatabase>, RemoteError> {
        Ok(self
            .state
            .lock()
            .databases
            .values()
            .map(|d| d.database.clone())
            .collect())
    }

    async fn resolve_data_source_id(&self, database_id: &str) -> Result<String, RemoteError> {
        let state = self.state.lock();
        state
            .databases
            .get(database_id)
            .map(|_| format!("ds_{database_id}"))
            .ok_or_else(|| RemoteError::UnresolvedDataSource(database_id.to_string()))
    }

    async fn fetch_schema(&self, data_source_id: &str) -> Result<Vec<RemoteProperty>, RemoteError> {
        let database_id = strip_ds_prefix(data_source_id);
        self.maybe_fail_transient(database_id)?;
        let state = self.state.lock();
        state
            .databases
            .get(database_id)
            .map(|d| d.schema.clone())
            .ok_or_else(|| RemoteError::NotFound(data_source_id.to_string()))
    }

    async fn list_rows(
        &self,
        data_source_id: &str,
        cursor: Option<&str>,
    ) -> Result<RowPage, RemoteError> {
        let database_id = strip_ds_prefix(data_source_id);
        self.maybe_fail_transient(database_id)?;
        let state = self.state.lock();
        let db = state
            .databases
            .get(database_id)
            .ok_or_else(|| RemoteError::NotFound(data_source_id.to_string()))?;
        let mut rows: Vec<RemoteRow> = db.rows.values().cloned().collect();
        rows.sort_by(|a, b| a.id.cmp(&b.id));
        let start: usize = cursor.and_then(|c| c.parse().ok()).unwrap_or(0);
        const PAGE_SIZE: usize = 100;
        let end = (start + PAGE_SIZE).min(rows.len());
        let page_rows = rows.get(start..end).unwrap_or_default().to_vec();
        let next_cursor = if end < rows.len() {
            Some(end.to_string())
        } else {
            None
        };
        Ok(RowPage {
            rows: page_rows,
            next_cursor,
        })
    }

    async fn fetch_row(
        &self,
        data_source_id: &str,
        row_id: &str,
    ) -> Result<Option<RemoteRow>, RemoteError> {
        let database_id = strip_ds_prefix(data_source_id);
        let state = self.state.lock();
        Ok(state
            .databases
            .get(database_id)
            .and_then(|d| d.rows.get(row_id).cloned()))
    }

    async fn create_row(
        &self,
        data_source_id: &str,
        values: &BTreeMap<String, RemoteValue>,
    ) -> Result<RemoteRow, RemoteError> {
        let database_id = strip_ds_prefix(data_source_id).to_string();
        let mut state = self.state.lock();
        let db = state
            .databases
            .get_mut(&database_id)
            .ok_or_else(|| RemoteError::NotFound(data_source_id.to_string()))?;
        let seq = db.next_row_seq;
        db.next_row_seq += 1;
        let row = RemoteRow {
            id: format!("row_{database_id}_{seq}"),
            last_edited_time: Utc::now(),
            values: values.clone(),
            page_id: None,
        };
        db.rows.insert(row.id.clone(), row.clone());
        Ok(row)
    }

    async fn update_row(
        &self,
        data_source_id: &str,
        row_id: &str,
        values: &BTreeMap<String, RemoteValue>,
    ) -> Result<RemoteRow, RemoteError> {
        let database_id = strip_ds_prefix(data_source_id);
        let mut state = self.state.lock();
        let db = state
            .databases
            .get_mut(database_id)
            .ok_or_else(|| RemoteError::NotFound(data_source_id.to_string()))?;
        let row = db
            .rows
            .get_mut(row_id)
            .ok_or_else(|| RemoteError::NotFound(row_id.to_string()))?;
        row.values.extend(values.clone());
        row.last_edited_time = Utc::now();
        Ok(row.clone())
    }

    async fn create_property(
        &self,
        data_source_id: &str,
        property: &RemoteProperty,
    ) -> Result<(), RemoteError> {
        let database_id = strip_ds_prefix(data_source_id);
        let mut state = self.state.lock();
        let db = state
            .databases
            .get_mut(database_id)
            .ok_or_else(|| RemoteError::NotFound(data_source_id.to_string()))?;
        if !db.schema.iter().any(|p| p.name == property.name) {
            db.schema.push(property.clone());
        }
        Ok(())
    }

    async fn add_property_options(
        &self,
        data_source_id: &str,
        property_name: &str,
        new_options: &[String],
    ) -> Result<(), RemoteError> {
        let database_id = strip_ds_prefix(data_source_id);
        self.maybe_fail_option_sync(database_id)?;
        let mut state = self.state.lock();
        let db = state
            .databases
            .get_mut(database_id)
            .ok_or_else(|| RemoteError::NotFound(data_source_id.to_string()))?;
        if let Some(prop) = db.schema.iter_mut().find(|p| p.name == property_name) {
            for opt in new_options {
                if !prop.options.contains(opt) {
                    prop.options.push(opt.clone());
                }
            }
        }
        Ok(())
    }

    async fn fetch_page(&self, page_id: &str) -> Result<RemotePage, RemoteError> {
        self.state
            .lock()
            .pages
            .get(page_id)
            .cloned()
            .ok_or_else(|| RemoteError::NotFound(page_id.to_string()))
    }

    async fn create_page(&self, data_source_id: &str, row_id: &str) -> Result<String, RemoteError> {
        let database_id = strip_ds_prefix(data_source_id);
        let mut state = self.state.lock();
        let seq = state.next_page_seq;
        state.next_page_seq += 1;
        let page_id = format!("page_{database_id}_{row_id}_{seq}");
        state.pages.insert(
            page_id.clone(),
            RemotePage {
                page_id: page_id.clone(),
                last_edited_time: Utc::now(),
                blocks: Vec::new(),
            },
        );
        if let Some(db) = state.databases.get_mut(database_id) {
            if let Some(row) = db.rows.get_mut(row_id) {
                row.page_id = Some(page_id.clone());
            }
        }
        Ok(page_id)
    }

    async fn update_page(&self, page_id: &str, blocks: &[PageBlock]) -> Result<(), RemoteError> {
        let mut state = self.state.lock();
        let page = state
            .pages
            .get_mut(page_id)
            .ok_or_else(|| RemoteError::NotFound(page_id.to_string()))?;
        page.blocks = blocks.to_vec();
        page.last_edited_time = Utc::now();
        Ok(())
    }

    async fn create_execution_page(
        &self,
        fields: &ExecutionPageFields,
    ) -> Result<String, RemoteError> {
        let mut state = self.state.lock();
        let page_id = format!("exec_{}", fields.run_id);
        state.execution_pages.insert(page_id.clone(), fields.clone());
        Ok(page_id)
    }

    async fn update_execution_page(
        &self,
        page_id: &str,
        fields: &ExecutionPageFields,
    ) -> Result<(), RemoteError> {
        let mut state = self.state.lock();
        state
            .execution_pages
            .insert(page_id.to_string(), fields.clone());
        Ok(())
    }

    async fn pause_trigger(&self, handler_name: &str) -> Result<(), RemoteError> {
        let mut state = self.state.lock();
        if !state.paused_triggers.iter().any(|h| h == handler_name) {
            state.paused_triggers.push(handler_name.to_string());
        }
        Ok(())
    }

    async fn resume_trigger(&self, handler_name: &str) -> Result<(), RemoteError> {
        let mut state = self.state.lock();
        state.paused_triggers.retain(|h| h != handler_name);
        Ok(())
    }
}

fn strip_ds_prefix(data_source_id: &str) -> &str {
    data_source_id.strip_prefix("ds_").unwrap_or(data_source_id)
}

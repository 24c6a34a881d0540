//! The Orchestrator: one bounded run over every discovered
//! database, under a single process-wide lock.

use std::time::{Duration, Instant};

use thiserror::Error;
use tracing::{info, warn};
use uuid::Uuid;

use tablesync_concurrency::{Clock, Lock, Scheduler};
use tablesync_discovery::DiscoveryFilter;
use tablesync_logging::{ExecutionSummary, LogEntry, LogFileSpec, LogLevel, Logger, RunStatus};
use tablesync_registry::{FolderManager, RegistrySpreadsheet};
use tablesync_remote::{PropertyKind, RemoteClient, RemoteProperty};
use tablesync_schema::{sync_schema, Column, PropertyMatcher, RunCaches, SchemaAction};
use tablesync_table::{export_rows, upsert_rows, CanonicalTable};

use crate::config::Config;
use crate::invariants::enforce_single_in_progress;
use crate::result::{DatabaseOutcome, DatabaseState, RunResult};

/// A failure contained at the database level. Only [`DatabaseError::credential`]
/// escapes the per-database catch in [`Engine::run`].
#[derive(Debug, Error)]
pub enum DatabaseError {
    #[error(transparent)]
    Table(#[from] tablesync_table::TableError),
    #[error(transparent)]
    Records(#[from] tablesync_records::RecordsError),
    #[error(transparent)]
    Registry(#[from] tablesync_registry::RegistryError),
    #[error(transparent)]
    Remote(#[from] tablesync_remote::RemoteError),
}

impl DatabaseError {
    fn credential_message(&self) -> Option<&str> {
        let remote = match self {
            DatabaseError::Table(tablesync_table::TableError::Remote(e)) => Some(e),
            DatabaseError::Records(tablesync_records::RecordsError::Remote(e)) => Some(e),
            DatabaseError::Remote(e) => Some(e),
            _ => None,
        }?;
        match remote {
            tablesync_remote::RemoteError::Credential(msg) => Some(msg.as_str()),
            _ => None,
        }
    }
}

pub struct Engine<'a> {
    pub config: Config,
    pub client: &'a dyn RemoteClient,
    pub lock: &'a dyn Lock,
    pub scheduler: &'a dyn Scheduler,
    pub clock: &'a dyn Clock,
}

impl<'a> Engine<'a> {
    pub fn new(
        config: Config,
        client: &'a dyn RemoteClient,
        lock: &'a dyn Lock,
        scheduler: &'a dyn Scheduler,
        clock: &'a dyn Clock,
    ) -> Self {
        Self {
            config,
            client,
            lock,
            scheduler,
            clock,
        }
    }

    pub async fn run(&self) -> Result<RunResult, crate::error::EngineError> {
        let run_id = Uuid::new_v4().to_string();
        let wall_clock_start = Instant::now();
        let start_time = self.clock.now();

        let guard = self.lock.try_acquire(self.config.lock_wait_duration)?;
        let Some(_guard) = guard else {
            info!(run_id = %run_id, "lock unavailable, exiting cleanly");
            return Ok(RunResult::lock_unavailable(run_id, wall_clock_start.elapsed()));
        };

        self.scheduler.pause(self.client, &self.config.script_id).await.ok();

        let mut summary = ExecutionSummary {
            run_id: run_id.clone(),
            script_name: self.config.script_name.clone(),
            start_time,
            end_time: start_time,
            status: RunStatus::Running,
            duration_seconds: 0.0,
            environment: self.config.environment.clone(),
            script_id: self.config.script_id.clone(),
            steps: Vec::new(),
            errors: Vec::new(),
            warnings: Vec::new(),
            summary: String::new(),
            performance_metrics: serde_json::json!({}),
        };

        let spec = LogFileSpec {
            script_name: self.config.script_name.clone(),
            script_version: self.config.script_version.clone(),
            environment: self.config.environment.clone(),
            start_time,
            script_id: self.config.script_id.clone(),
            run_id: run_id.clone(),
        };
        let mut logger = Logger::start(&self.config.root_path, spec, self.client, &summary).await?;

        let environment_root = self.config.root_path.join(&self.config.environment);
        let registry_path = environment_root.join("registry.xlsx");
        let mut registry = RegistrySpreadsheet::load(&registry_path)?;
        let folders = FolderManager::new(&environment_root);

        let filter = DiscoveryFilter {
            allow: if self.config.database_allow_list.is_empty() {
                None
            } else {
                Some(self.config.database_allow_list.clone())
            },
            deny: self.config.database_deny_list.clone(),
        };

        let databases = match tablesync_discovery::discover(self.client, &mut registry, &folders, &filter).await {
            Ok(dbs) => dbs,
            Err(err) => {
                self.scheduler.resume(self.client, &self.config.script_id).await.ok();
                summary.status = RunStatus::Failed;
                summary.end_time = self.clock.now();
                summary.errors.push(format!("discovery: {err}"));
                logger.finalize(&summary).await?;
                return Err(crate::error::EngineError::Discovery(err));
            }
        };
        summary.steps.push("discovery".to_string());

        let (ordered, next_cursor) = order_databases(
            databases,
            self.config.agent_tasks_database_id.as_deref(),
            registry.rotation_cursor(),
        );
        registry.set_rotation_cursor(next_cursor);
        registry.save(&registry_path)?;

        let mut outcomes = Vec::new();
        let mut caches = RunCaches::new();
        let safety_margin = Duration::from_secs(5);

        for db in ordered {
            if wall_clock_start.elapsed() + safety_margin >= self.config.max_run_duration {
                warn!(database_id = %db.id, "time budget exhausted, skipping remaining databases");
                outcomes.push(DatabaseOutcome::skipped(db.id.clone(), db.display_name.clone(), "time budget exhausted"));
                continue;
            }

            let matcher = PropertyMatcher::new();
            match self
                .process_database(&db, &folders, &matcher, &mut caches, start_time, wall_clock_start)
                .await
            {
                Ok(outcome) => {
                    logger
                        .log(&LogEntry {
                            run_id: run_id.clone(),
                            timestamp: self.clock.now(),
                            level: LogLevel::Info,
                            component: "orchestrator".to_string(),
                            message: format!("processed database {}", db.display_name),
                            context: serde_json::json!({ "databaseId": db.id }),
                        })
                        .ok();
                    outcomes.push(outcome);
                }
                Err(err) => {
                    if let Some(message) = err.credential_message() {
                        self.scheduler.resume(self.client, &self.config.script_id).await.ok();
                        summary.status = RunStatus::Failed;
                        summary.end_time = self.clock.now();
                        summary.errors.push(format!("credential: {message}"));
                        logger.finalize(&summary).await?;
                        return Err(crate::error::EngineError::Credential(message.to_string()));
                    }
                    warn!(database_id = %db.id, error = %err, "database failed, continuing with next");
                    summary.errors.push(format!("{}: {err}", db.id));
                    outcomes.push(DatabaseOutcome::failed(db.id.clone(), db.display_name.clone(), err.to_string()));
                }
            }
        }

        self.scheduler.resume(self.client, &self.config.script_id).await.ok();

        summary.status = RunStatus::Completed;
        summary.end_time = self.clock.now();
        summary.duration_seconds = wall_clock_start.elapsed().as_secs_f64();
        summary.summary = format!("processed {} database(s)", outcomes.len());
        logger.finalize(&summary).await?;

        Ok(RunResult {
            run_id,
            databases: outcomes,
            elapsed: wall_clock_start.elapsed(),
            execution_record_written: true,
        })
    }

    #[allow(clippy::too_many_arguments)]
    async fn process_database(
        &self,
        db: &tablesync_remote::RemoteDatabase,
        folders: &FolderManager,
        matcher: &PropertyMatcher,
        caches: &mut RunCaches,
        run_start: chrono::DateTime<chrono::Utc>,
        wall_clock_start: Instant,
    ) -> Result<DatabaseOutcome, DatabaseError> {
        let data_source_id = db
            .data_source_id
            .clone()
            .ok_or_else(|| tablesync_remote::RemoteError::UnresolvedDataSource(db.id.clone()))?;
        caches.set_data_source_id(&db.id, data_source_id.clone());

        let folder = folders.ensure_folder(&db.display_name, None)?;
        let table_path = folder.absolute_path.join("table.csv");
        let mut table = CanonicalTable::read_csv(&table_path)?;

        let remote_schema = self.client.fetch_schema(&data_source_id).await?;
        let diff = sync_schema(&table.columns, &remote_schema, matcher, self.config.allow_schema_deletions);
        self.apply_schema_diff(&mut table, &data_source_id, diff).await?;

        if self.config.require_item_type_column && table.column("itemType").is_none() {
            let column = Column::new("itemType", PropertyKind::Text);
            self.client
                .create_property(&data_source_id, &RemoteProperty::new("itemType", PropertyKind::Text))
                .await?;
            table.insert_column(table.columns.len(), column);
        }
        caches.set_column_schema(&db.id, table.columns.clone());

        let export_stats = export_rows(&mut table, self.client, &data_source_id, run_start).await?;

        let title_column = table
            .columns
            .iter()
            .find(|c| c.kind == PropertyKind::Title)
            .map(|c| c.name.clone())
            .unwrap_or_default();

        let policy = self.config.conflict_policy_for(&db.id);
        let upsert_outcome = upsert_rows(
            &mut table,
            self.client,
            &data_source_id,
            &title_column,
            policy,
            self.config.deletion_archives_records,
            run_start,
        )
        .await?;

        let summary_columns: Vec<String> = table
            .columns
            .iter()
            .filter(|c| c.kind.has_options())
            .map(|c| c.name.clone())
            .collect();

        let record_stats = tablesync_records::sync_records(
            &folder.absolute_path,
            &table,
            self.client,
            &data_source_id,
            &title_column,
            &summary_columns,
            policy,
            run_start,
            self.config.deletion_archives_records,
        )
        .await?;

        // Record-file sync above still needed the original `row_key` to
        // locate each orphan's file; only now is it safe to clear it, so
        // invariant 1 (no non-blank `__rowKey` pointing at a gone remote
        // row) actually holds once this run's table is written.
        for row_key in &upsert_outcome.archived_row_keys {
            if let Some(idx) = table.find_row_index_by_key(row_key) {
                table.rows[idx].row_key = String::new();
            }
        }

        if self.config.agent_tasks_database_id.as_deref() == Some(db.id.as_str()) {
            if let Some(status_column) = table.columns.iter().find(|c| c.kind == PropertyKind::Status) {
                let status_column = status_column.name.clone();
                enforce_single_in_progress(&mut table, &status_column);
            }
        }

        table.write_csv(&table_path)?;

        let state = if wall_clock_start.elapsed() >= self.config.max_run_duration {
            DatabaseState::Partial
        } else {
            DatabaseState::Ok
        };

        Ok(DatabaseOutcome {
            database_id: db.id.clone(),
            display_name: db.display_name.clone(),
            state,
            export_stats,
            upsert_stats: upsert_outcome.stats,
            record_stats,
        })
    }

    async fn apply_schema_diff(
        &self,
        table: &mut CanonicalTable,
        data_source_id: &str,
        diff: tablesync_schema::SchemaDiff,
    ) -> Result<(), DatabaseError> {
        for action in diff.actions {
            match action {
                SchemaAction::AddColumnToTable(column) => {
                    table.insert_column(table.columns.len(), column);
                }
                SchemaAction::AddPropertyToRemote(column) => {
                    let property = RemoteProperty::new(column.name.clone(), column.kind).with_options(column.options.clone());
                    self.client.create_property(data_source_id, &property).await?;
                }
                SchemaAction::UnionOptions { column, options } => {
                    if let Some(existing) = table.columns.iter_mut().find(|c| c.name == column) {
                        existing.options = options.clone();
                    }
                    self.client.add_property_options(data_source_id, &column, &options).await?;
                }
                SchemaAction::TypeMismatch { column, table_kind, remote_kind } => {
                    warn!(%column, ?table_kind, ?remote_kind, "schema type mismatch, leaving both sides untouched");
                }
                SchemaAction::RetainedMissingFromRemote(column) => {
                    info!(%column, "column retained locally, not propagated to remote");
                }
                SchemaAction::FuzzyMatchUsed { expected, matched, strategy } => {
                    tracing::debug!(%expected, %matched, ?strategy, "property resolved via fallback strategy");
                }
            }
        }
        Ok(())
    }
}

/// Order databases for one run: the agent-tasks database (if configured
/// and present) always goes first; every other database rotates by
/// `cursor`, the id the last run stopped at, so that the same handful of
/// databases don't monopolize the front of the list run after run. Returns
/// the ordered list alongside the cursor to persist for the next run.
fn order_databases(
    mut databases: Vec<tablesync_remote::RemoteDatabase>,
    agent_tasks_id: Option<&str>,
    cursor: Option<&str>,
) -> (Vec<tablesync_remote::RemoteDatabase>, Option<String>) {
    let agent_tasks_db = agent_tasks_id
        .and_then(|id| databases.iter().position(|d| d.id == id))
        .map(|pos| databases.remove(pos));

    let rotated = match cursor.and_then(|cursor| databases.iter().position(|d| d.id == cursor)) {
        Some(pos) => {
            let mut rest = databases.split_off(pos + 1);
            rest.append(&mut databases);
            rest
        }
        None => databases,
    };
    let next_cursor = rotated.first().map(|d| d.id.clone());

    let mut ordered = Vec::with_capacity(rotated.len() + 1);
    ordered.extend(agent_tasks_db);
    ordered.extend(rotated);
    (ordered, next_cursor)
}

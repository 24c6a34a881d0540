//! `RunResult`: what `Engine::run` reports back to its caller.

use std::time::Duration;

use tablesync_records::RecordStats;
use tablesync_table::{ExportStats, UpsertStats};

/// Per-database outcome. Purely a reporting value — the Orchestrator
/// does not branch control flow on it (the next database is attempted
/// regardless of how this one finished).
#[derive(Debug, Clone, PartialEq)]
pub enum DatabaseState {
    Ok,
    /// Time budget was exhausted partway through this database's pipeline.
    Partial,
    Skipped(String),
    Failed(String),
}

#[derive(Debug, Clone)]
pub struct DatabaseOutcome {
    pub database_id: String,
    pub display_name: String,
    pub state: DatabaseState,
    pub export_stats: ExportStats,
    pub upsert_stats: UpsertStats,
    pub record_stats: RecordStats,
}

impl DatabaseOutcome {
    pub fn skipped(database_id: impl Into<String>, display_name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            database_id: database_id.into(),
            display_name: display_name.into(),
            state: DatabaseState::Skipped(reason.into()),
            export_stats: ExportStats::default(),
            upsert_stats: UpsertStats::default(),
            record_stats: RecordStats::default(),
        }
    }

    pub fn failed(database_id: impl Into<String>, display_name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            database_id: database_id.into(),
            display_name: display_name.into(),
            state: DatabaseState::Failed(reason.into()),
            export_stats: ExportStats::default(),
            upsert_stats: UpsertStats::default(),
            record_stats: RecordStats::default(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct RunResult {
    pub run_id: String,
    pub databases: Vec<DatabaseOutcome>,
    pub elapsed: Duration,
    /// `None` when the lock could not be acquired — no databases were
    /// touched and no execution record was written.
    pub execution_record_written: bool,
}

impl RunResult {
    pub fn lock_unavailable(run_id: impl Into<String>, elapsed: Duration) -> Self {
        Self {
            run_id: run_id.into(),
            databases: Vec::new(),
            elapsed,
            execution_record_written: false,
        }
    }
}

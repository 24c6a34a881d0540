//! The three execution-log forms, fanned out from one [`crate::Logger`]
//! call per entry — mirroring the teacher's `on_error`/`on_progress`
//! callback fan-out, but as sink objects rather than closures so each
//! form can own its own I/O state.

use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::PathBuf;

use tablesync_remote::{ExecutionPageFields, RemoteClient};

use crate::error::LoggingError;
use crate::types::{ExecutionSummary, LogEntry, RunStatus};

pub trait ExecutionSink: Send {
    fn log(&mut self, entry: &LogEntry) -> Result<(), LoggingError>;
    fn finalize(&mut self, summary: &ExecutionSummary) -> Result<(), LoggingError>;
}

/// The structured on-disk sink: one JSON object per line, a final entry
/// with the run summary, then a rename from `Running` to the final status.
pub struct JsonlSink {
    path: PathBuf,
    file: File,
}

impl JsonlSink {
    pub fn open(path: PathBuf) -> Result<Self, LoggingError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        Ok(Self { path, file })
    }

    pub fn finalize_path(&self, final_path: &std::path::Path) -> Result<(), LoggingError> {
        std::fs::rename(&self.path, final_path)?;
        Ok(())
    }
}

impl ExecutionSink for JsonlSink {
    fn log(&mut self, entry: &LogEntry) -> Result<(), LoggingError> {
        let line = serde_json::to_string(entry)?;
        writeln!(self.file, "{line}")?;
        Ok(())
    }

    fn finalize(&mut self, summary: &ExecutionSummary) -> Result<(), LoggingError> {
        let line = serde_json::to_string(summary)?;
        writeln!(self.file, "{line}")?;
        self.file.flush()?;
        Ok(())
    }
}

/// The human-readable on-disk sink, written alongside the jsonl file.
pub struct PlaintextSink {
    path: PathBuf,
    file: File,
}

impl PlaintextSink {
    pub fn open(path: PathBuf) -> Result<Self, LoggingError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        Ok(Self { path, file })
    }

    pub fn finalize_path(&self, final_path: &std::path::Path) -> Result<(), LoggingError> {
        std::fs::rename(&self.path, final_path)?;
        Ok(())
    }
}

impl ExecutionSink for PlaintextSink {
    fn log(&mut self, entry: &LogEntry) -> Result<(), LoggingError> {
        writeln!(
            self.file,
            "[{}] {:?} {} — {}",
            entry.timestamp.to_rfc3339(),
            entry.level,
            entry.component,
            entry.message
        )?;
        Ok(())
    }

    fn finalize(&mut self, summary: &ExecutionSummary) -> Result<(), LoggingError> {
        writeln!(
            self.file,
            "=== run {} finished: {:?} in {:.2}s ===",
            summary.run_id, summary.status, summary.duration_seconds
        )?;
        writeln!(self.file, "{}", summary.summary)?;
        self.file.flush()?;
        Ok(())
    }
}

/// The remote execution page sink. A failure to create the page at run
/// start is logged but not fatal — `new` swallows it and leaves the
/// sink page-less, so subsequent calls are no-ops.
pub struct RemotePageSink<'a> {
    client: &'a dyn RemoteClient,
    page_id: Option<String>,
}

impl<'a> RemotePageSink<'a> {
    pub async fn create(client: &'a dyn RemoteClient, fields: &ExecutionPageFields) -> Self {
        let page_id = client.create_execution_page(fields).await.ok();
        Self { client, page_id }
    }

    /// Periodic or final flush of the page fields.
    pub async fn flush(&self, fields: &ExecutionPageFields) -> Result<(), LoggingError> {
        if let Some(page_id) = &self.page_id {
            // A missing page is not fatal; errors here are surfaced to
            // the caller to log, never to abort the run.
            let _ = self.client.update_execution_page(page_id, fields).await;
        }
        Ok(())
    }

    pub fn has_page(&self) -> bool {
        self.page_id.is_some()
    }
}

pub fn execution_fields(summary: &ExecutionSummary, status_override: Option<RunStatus>) -> ExecutionPageFields {
    let status = status_override.unwrap_or(summary.status);
    ExecutionPageFields {
        start_time: summary.start_time,
        final_status: format!("{status:?}"),
        script_name: summary.script_name.clone(),
        run_id: summary.run_id.clone(),
        environment: summary.environment.clone(),
        script_id: summary.script_id.clone(),
        timezone: "UTC".to_string(),
        user_identifier: "system".to_string(),
    }
}

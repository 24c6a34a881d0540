//! `Logger`: fans out one call per entry to the structured sink, the
//! plaintext sink, and (periodically/at finalization) the remote page.

use tablesync_remote::RemoteClient;

use crate::error::LoggingError;
use crate::naming::LogFileSpec;
use crate::sinks::{execution_fields, ExecutionSink, JsonlSink, PlaintextSink, RemotePageSink};
use crate::types::{ExecutionSummary, LogEntry, RunStatus};

pub struct Logger<'a> {
    root: std::path::PathBuf,
    spec: LogFileSpec,
    jsonl: JsonlSink,
    plaintext: PlaintextSink,
    remote_page: RemotePageSink<'a>,
}

impl<'a> Logger<'a> {
    pub async fn start(
        root: impl Into<std::path::PathBuf>,
        spec: LogFileSpec,
        client: &'a dyn RemoteClient,
        summary_so_far: &ExecutionSummary,
    ) -> Result<Self, LoggingError> {
        let root = root.into();
        let jsonl_path = spec.path(&root, RunStatus::Running, "jsonl");
        let plaintext_path = spec.path(&root, RunStatus::Running, "log");
        let jsonl = JsonlSink::open(jsonl_path)?;
        let plaintext = PlaintextSink::open(plaintext_path)?;
        let fields = execution_fields(summary_so_far, Some(RunStatus::Running));
        let remote_page = RemotePageSink::create(client, &fields).await;

        Ok(Self {
            root,
            spec,
            jsonl,
            plaintext,
            remote_page,
        })
    }

    pub fn log(&mut self, entry: &LogEntry) -> Result<(), LoggingError> {
        self.jsonl.log(entry)?;
        self.plaintext.log(entry)?;
        Ok(())
    }

    /// A mid-run flush of the remote page, independent of the on-disk
    /// sinks.
    pub async fn flush_remote(&self, summary_so_far: &ExecutionSummary) -> Result<(), LoggingError> {
        let fields = execution_fields(summary_so_far, Some(RunStatus::Running));
        self.remote_page.flush(&fields).await
    }

    pub fn remote_page_created(&self) -> bool {
        self.remote_page.has_page()
    }

    /// Write the final entry to both on-disk sinks, rename both files to
    /// their final status together, and set the remote page's Final
    /// Status last so external observers can treat a non-Running page as
    /// complete.
    pub async fn finalize(mut self, summary: &ExecutionSummary) -> Result<(), LoggingError> {
        self.jsonl.finalize(summary)?;
        self.plaintext.finalize(summary)?;

        let jsonl_final = self.spec.path(&self.root, summary.status, "jsonl");
        let plaintext_final = self.spec.path(&self.root, summary.status, "log");
        self.jsonl.finalize_path(&jsonl_final)?;
        self.plaintext.finalize_path(&plaintext_final)?;

        let fields = execution_fields(summary, None);
        // Errors finalizing the remote page are non-fatal; the on-disk
        // files have already been renamed to their final status.
        let _ = self.remote_page.flush(&fields).await;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use serde_json::json;
    use tablesync_remote::mock::MockRemoteClient;

    fn fixed_start_time() -> chrono::DateTime<Utc> {
        chrono::DateTime::parse_from_rfc3339("2026-08-01T00:00:00Z")
            .unwrap()
            .with_timezone(&Utc)
    }

    fn spec() -> LogFileSpec {
        LogFileSpec {
            script_name: "syncmirror".to_string(),
            script_version: "1".to_string(),
            environment: "prod".to_string(),
            start_time: fixed_start_time(),
            script_id: "scr_1".to_string(),
            run_id: "run_1".to_string(),
        }
    }

    fn summary(status: RunStatus) -> ExecutionSummary {
        ExecutionSummary {
            run_id: "run_1".to_string(),
            script_name: "syncmirror".to_string(),
            start_time: Utc::now(),
            end_time: Utc::now(),
            status,
            duration_seconds: 1.5,
            environment: "prod".to_string(),
            script_id: "scr_1".to_string(),
            steps: vec!["discovery".to_string()],
            errors: Vec::new(),
            warnings: Vec::new(),
            summary: "ok".to_string(),
            performance_metrics: json!({}),
        }
    }

    #[tokio::test]
    async fn finalize_renames_both_files_to_completed() {
        let dir = tempfile::tempdir().unwrap();
        let client = MockRemoteClient::new();
        let s = spec();
        let logger = Logger::start(dir.path(), s, &client, &summary(RunStatus::Running))
            .await
            .unwrap();
        assert!(logger.remote_page_created());

        logger.finalize(&summary(RunStatus::Completed)).await.unwrap();

        let base = spec().base_dir(dir.path());
        let entries: Vec<_> = std::fs::read_dir(&base).unwrap().collect();
        assert_eq!(entries.len(), 2);
        for entry in entries {
            let name = entry.unwrap().file_name();
            assert!(name.to_string_lossy().contains("Completed"));
        }
    }
}

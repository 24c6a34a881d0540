//! The on-disk log file naming scheme:
//! `<root>/<environment>/<YYYY>/<MM>/<scriptName> — v<ver> — <env> — <timestamp> — <status> [<scriptId>] (<runId>).<ext>`

use std::path::PathBuf;

use chrono::{DateTime, Utc};

use crate::types::RunStatus;

pub struct LogFileSpec {
    pub script_name: String,
    pub script_version: String,
    pub environment: String,
    pub start_time: DateTime<Utc>,
    pub script_id: String,
    pub run_id: String,
}

impl LogFileSpec {
    pub fn base_dir(&self, root: &std::path::Path) -> PathBuf {
        root.join(&self.environment)
            .join("logs")
            .join(self.start_time.format("%Y").to_string())
            .join(self.start_time.format("%m").to_string())
    }

    fn file_stem(&self, status: RunStatus) -> String {
        format!(
            "{} — v{} — {} — {} — {} [{}] ({})",
            self.script_name,
            self.script_version,
            self.environment,
            self.start_time.to_rfc3339(),
            status.as_filename_token(),
            self.script_id,
            self.run_id,
        )
    }

    pub fn path(&self, root: &std::path::Path, status: RunStatus, ext: &str) -> PathBuf {
        self.base_dir(root).join(format!(
            "{}.{ext}",
            self.file_stem(status)
        ))
    }
}

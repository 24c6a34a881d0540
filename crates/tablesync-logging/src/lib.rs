//! Execution records: one run produces a structured on-disk log, a
//! plaintext on-disk log, and a remote execution page, kept consistent
//! by a single [`Logger`].

mod error;
mod logger;
mod naming;
mod sinks;
mod types;

pub use error::LoggingError;
pub use logger::Logger;
pub use naming::LogFileSpec;
pub use sinks::{execution_fields, ExecutionSink, JsonlSink, PlaintextSink, RemotePageSink};
pub use types::{ExecutionSummary, LogEntry, LogLevel, RunStatus};

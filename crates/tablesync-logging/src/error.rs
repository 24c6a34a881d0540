use thiserror::Error;

#[derive(Debug, Error)]
pub enum LoggingError {
    #[error("local I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to serialize log entry: {0}")]
    Serialize(#[from] serde_json::Error),
}

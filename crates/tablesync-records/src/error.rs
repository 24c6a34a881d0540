use thiserror::Error;

#[derive(Debug, Error)]
pub enum RecordsError {
    #[error("local I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("malformed record file {path}: {reason}")]
    Malformed { path: String, reason: String },

    #[error("name index corrupt: {0}")]
    NameIndex(#[from] serde_json::Error),

    #[error("remote error: {0}")]
    Remote(#[from] tablesync_remote::RemoteError),
}

use thiserror::Error;

#[derive(Debug, Error)]
pub enum TableError {
    #[error("local I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("malformed canonical table: {0}")]
    Malformed(String),

    #[error("remote error: {0}")]
    Remote(#[from] tablesync_remote::RemoteError),
}

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConcurrencyError {
    #[error("local I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("could not acquire run lock within {0:?}")]
    LockTimeout(std::time::Duration),
}

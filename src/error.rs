use thiserror::Error;

/// Run-level failures that escape the Orchestrator. Per-database and per-row
/// failures are caught and folded into `RunResult`/the execution record
/// instead of surfacing here.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("credential rejected: {0}")]
    Credential(String),

    #[error(transparent)]
    Concurrency(#[from] tablesync_concurrency::ConcurrencyError),

    #[error(transparent)]
    Discovery(#[from] tablesync_discovery::DiscoveryError),

    #[error(transparent)]
    Registry(#[from] tablesync_registry::RegistryError),

    #[error(transparent)]
    Logging(#[from] tablesync_logging::LoggingError),

    #[error(transparent)]
    Remote(#[from] tablesync_remote::RemoteError),
}

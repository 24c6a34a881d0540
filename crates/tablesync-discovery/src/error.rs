use thiserror::Error;

#[derive(Debug, Error)]
pub enum DiscoveryError {
    #[error("remote database entry is missing required field {field}")]
    MissingField { field: &'static str },

    #[error("remote error: {0}")]
    Remote(#[from] tablesync_remote::RemoteError),

    #[error("registry error: {0}")]
    Registry(#[from] tablesync_registry::RegistryError),
}

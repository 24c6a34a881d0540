use thiserror::Error;

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("local I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to read registry workbook: {0}")]
    Read(#[from] calamine::XlsxError),

    #[error("failed to write registry workbook: {0}")]
    Write(#[from] rust_xlsxwriter::XlsxError),

    #[error("malformed registry row: {0}")]
    Malformed(String),

    #[error("could not create or verify archive folder at {0}")]
    ArchiveMissing(String),
}

use thiserror::Error;

/// Errors raised while reconciling schema or coercing cell values.
///
/// These are always contained at the row or column level — callers
/// clear the offending cell or skip the column and log a warning.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SchemaError {
    #[error("value {value:?} is not valid for column kind {kind}")]
    InvalidCellValue { kind: String, value: String },

    #[error("column {0} not found")]
    UnknownColumn(String),

    #[error("duplicate column name {0}")]
    DuplicateColumn(String),
}

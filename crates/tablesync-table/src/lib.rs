//! The canonical table: CSV-backed local storage plus the two row-sync
//! directions that keep it aligned with a remote database.

mod error;
mod export;
mod retry;
mod row;
mod upsert;

pub use error::TableError;
pub use export::{export_rows, ExportStats};
pub use retry::retry_with_backoff;
pub use row::{CanonicalTable, Row, LAST_SYNC_COLUMN, ROW_KEY_COLUMN};
pub use upsert::{
    upsert_rows, ConflictPolicy, ConflictRecord, UpsertOutcome, UpsertStats, UpsertWarning,
};

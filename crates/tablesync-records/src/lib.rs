//! Per-row record files mirrored against remote page content.

mod error;
mod filename;
mod page_text;
mod record;
mod sync;

pub use error::RecordsError;
pub use filename::{sanitize_title, NameIndex};
pub use page_text::{blocks_to_body, body_to_blocks};
pub use record::RecordFile;
pub use sync::{sync_records, RecordStats};

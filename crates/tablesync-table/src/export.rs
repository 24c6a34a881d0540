//! Row sync, remote → canonical table.

use chrono::{DateTime, Utc};
use tablesync_remote::RemoteClient;
use tablesync_schema::Cell;

use crate::error::TableError;
use crate::retry::retry_with_backoff;
use crate::row::CanonicalTable;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExportStats {
    pub read: usize,
    pub added: usize,
    pub updated: usize,
    pub unchanged: usize,
}

/// Page through every remote row and reconcile it into `table`.
///
/// Every row touched gets `__lastSyncTimestamp` stamped to `run_start`,
/// so a later push can tell which rows this run already saw.
pub async fn export_rows(
    table: &mut CanonicalTable,
    client: &dyn RemoteClient,
    data_source_id: &str,
    run_start: DateTime<Utc>,
) -> Result<ExportStats, TableError> {
    let mut stats = ExportStats::default();
    let mut cursor: Option<String> = None;

    loop {
        let page = retry_with_backoff(|| client.list_rows(data_source_id, cursor.as_deref()))
            .await
            .map_err(TableError::Remote)?;

        for remote_row in &page.rows {
            stats.read += 1;
            let mut cells = std::collections::BTreeMap::new();
            for column in &table.columns {
                let cell = remote_row
                    .values
                    .get(&column.name)
                    .map(Cell::from_remote)
                    .unwrap_or(Cell::Empty);
                cells.insert(column.name.clone(), cell);
            }

            match table.find_row_index_by_key(&remote_row.id) {
                Some(idx) => {
                    let row = &mut table.rows[idx];
                    if row.cells != cells {
                        row.cells = cells;
                        stats.updated += 1;
                    } else {
                        stats.unchanged += 1;
                    }
                    row.last_sync_timestamp = Some(run_start);
                    row.remote_last_edited_time = Some(remote_row.last_edited_time);
                }
                None => {
                    let mut row = crate::row::Row::with_row_key(remote_row.id.clone());
                    row.cells = cells;
                    row.last_sync_timestamp = Some(run_start);
                    row.remote_last_edited_time = Some(remote_row.last_edited_time);
                    table.rows.push(row);
                    stats.added += 1;
                }
            }
        }

        cursor = page.next_cursor;
        if cursor.is_none() {
            break;
        }
    }

    Ok(stats)
}

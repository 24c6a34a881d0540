//! `SyncRecords`: align each row's on-disk record file with its remote
//! page content.

use std::path::Path;

use chrono::{DateTime, Utc};
use tablesync_remote::RemoteClient;
use tablesync_table::{retry_with_backoff, CanonicalTable, ConflictPolicy};

use crate::error::RecordsError;
use crate::filename::NameIndex;
use crate::record::RecordFile;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RecordStats {
    pub materialized: usize,
    pub updated: usize,
    pub archived: usize,
    /// Orphaned record files left in place because `deletion_archives` is
    /// disabled.
    pub retained: usize,
}

fn file_modified_at(path: &Path) -> Option<DateTime<Utc>> {
    std::fs::metadata(path)
        .and_then(|m| m.modified())
        .ok()
        .map(DateTime::<Utc>::from)
}

/// Reconcile every row's record file against its remote page. Rows with
/// a blank `__rowKey` are skipped — they haven't been pushed yet, so
/// there's no remote page to pair them with (run `upsert_rows` first).
#[allow(clippy::too_many_arguments)]
pub async fn sync_records(
    folder: &Path,
    table: &CanonicalTable,
    client: &dyn RemoteClient,
    data_source_id: &str,
    title_column: &str,
    summary_columns: &[String],
    policy: ConflictPolicy,
    run_start: DateTime<Utc>,
    deletion_archives: bool,
) -> Result<RecordStats, RecordsError> {
    std::fs::create_dir_all(folder)?;
    let archive_dir = folder.join(".archive");
    std::fs::create_dir_all(&archive_dir)?;

    let mut index = NameIndex::load(folder)?;
    let mut stats = RecordStats::default();

    for row in &table.rows {
        if row.row_key.is_empty() {
            continue;
        }
        let Some(title) = row.title(title_column) else {
            continue;
        };
        let filename = index.resolve(&row.row_key, title, "txt");
        let path = folder.join(&filename);

        let remote_row = retry_with_backoff(|| client.fetch_row(data_source_id, &row.row_key))
            .await
            .map_err(RecordsError::Remote)?;

        let Some(remote_row) = remote_row else {
            if path.exists() {
                if deletion_archives {
                    let archived_path = archive_dir.join(&filename);
                    std::fs::rename(&path, &archived_path)?;
                    stats.archived += 1;
                    index.forget(&row.row_key);
                } else {
                    stats.retained += 1;
                }
            }
            continue;
        };

        let page_id = match remote_row.page_id {
            Some(id) => id,
            None => retry_with_backoff(|| client.create_page(data_source_id, &row.row_key))
                .await
                .map_err(RecordsError::Remote)?,
        };
        let remote_page = retry_with_backoff(|| client.fetch_page(&page_id))
            .await
            .map_err(RecordsError::Remote)?;

        let summary = summary_columns
            .iter()
            .filter_map(|name| {
                row.cell(name)
                    .map(|cell| (name.clone(), cell.to_csv_field()))
            })
            .collect();

        if !path.exists() {
            let record = RecordFile {
                row_key: row.row_key.clone(),
                last_sync: Some(run_start),
                summary,
                blocks: remote_page.blocks.clone(),
            };
            std::fs::write(&path, record.render())?;
            stats.materialized += 1;
            continue;
        }

        let contents = std::fs::read_to_string(&path)?;
        let mut local_record = RecordFile::parse(&contents, &path)?;
        let remote_changed = row
            .last_sync_timestamp
            .map(|stamp| remote_page.last_edited_time > stamp)
            .unwrap_or(true);
        let local_changed = row
            .last_sync_timestamp
            .zip(file_modified_at(&path))
            .map(|(stamp, mtime)| mtime > stamp)
            .unwrap_or(false);

        let pull_from_remote = match (remote_changed, local_changed) {
            (true, true) => policy == ConflictPolicy::RemoteWins,
            (true, false) => true,
            (false, true) => false,
            (false, false) => false,
        };

        if pull_from_remote {
            local_record.blocks = remote_page.blocks.clone();
        } else if local_changed || remote_changed {
            retry_with_backoff(|| client.update_page(&page_id, &local_record.blocks))
                .await
                .map_err(RecordsError::Remote)?;
        }

        local_record.last_sync = Some(run_start);
        local_record.summary = summary;
        std::fs::write(&path, local_record.render())?;
        if local_changed || remote_changed {
            stats.updated += 1;
        }
    }

    index.save(folder)?;
    Ok(stats)
}

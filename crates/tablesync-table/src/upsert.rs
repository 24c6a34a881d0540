//! Row sync, canonical table → remote.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tablesync_remote::{RemoteClient, RemoteValue};
use tablesync_schema::{Cell, Column};

use crate::error::TableError;
use crate::retry::retry_with_backoff;
use crate::row::CanonicalTable;

/// How a conflicting edit (both sides touched since the last sync) is
/// resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ConflictPolicy {
    #[default]
    RemoteWins,
    LocalWins,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ConflictRecord {
    pub row_key: String,
    pub policy: ConflictPolicy,
}

#[derive(Debug, Clone, PartialEq)]
pub struct UpsertWarning {
    pub row_key: Option<String>,
    pub message: String,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UpsertStats {
    pub created: usize,
    pub updated: usize,
    pub skipped: usize,
    pub conflicted: usize,
}

#[derive(Debug, Clone, Default)]
pub struct UpsertOutcome {
    pub stats: UpsertStats,
    pub conflicts: Vec<ConflictRecord>,
    pub warnings: Vec<UpsertWarning>,
    /// Row keys of orphaned rows (remote counterpart gone) whose
    /// `__rowKey` should be cleared because `deletion_archives` is set.
    /// Left non-blank here on purpose: record-file sync still needs the
    /// original key to locate and archive the matching file, and runs
    /// after this function returns. The caller clears these keys once
    /// record-file sync has had its turn.
    pub archived_row_keys: Vec<String>,
}

/// Push every locally-changed row to the remote store.
///
/// A row is "locally changed" when it has no `row_key` (never pushed) or
/// its `last_sync_timestamp` predates the remote's own `last_edited_time`
/// — the latter case is a conflict, resolved per `policy`. Rows whose
/// remote counterpart has disappeared are orphans: archived (not deleted)
/// when `deletion_archives` is set, otherwise left untouched and logged.
#[allow(clippy::too_many_arguments)]
pub async fn upsert_rows(
    table: &mut CanonicalTable,
    client: &dyn RemoteClient,
    data_source_id: &str,
    title_column: &str,
    policy: ConflictPolicy,
    deletion_archives: bool,
    run_start: DateTime<Utc>,
) -> Result<UpsertOutcome, TableError> {
    let mut outcome = UpsertOutcome::default();
    let columns = table.columns.clone();

    for idx in 0..table.rows.len() {
        let row_key = table.rows[idx].row_key.clone();

        if table.rows[idx].title(title_column).is_none() {
            outcome.stats.skipped += 1;
            outcome.warnings.push(UpsertWarning {
                row_key: Some(row_key.clone()).filter(|k| !k.is_empty()),
                message: "row has no title value; skipped".to_string(),
            });
            continue;
        }

        if row_key.is_empty() {
            let cleared = ensure_options(client, data_source_id, &columns, &mut table.rows[idx].cells).await;
            for column in &cleared {
                outcome.warnings.push(UpsertWarning {
                    row_key: None,
                    message: format!("could not register new options for column {column:?}; cell cleared"),
                });
            }
            let values = remote_values(&table.rows[idx].cells, &columns);
            let created = retry_with_backoff(|| client.create_row(data_source_id, &values))
                .await
                .map_err(TableError::Remote)?;
            table.rows[idx].row_key = created.id;
            table.rows[idx].last_sync_timestamp = Some(run_start);
            outcome.stats.created += 1;
            continue;
        }

        let remote_row = retry_with_backoff(|| client.fetch_row(data_source_id, &row_key))
            .await
            .map_err(TableError::Remote)?;

        let Some(remote_row) = remote_row else {
            if deletion_archives {
                outcome.warnings.push(UpsertWarning {
                    row_key: Some(row_key.clone()),
                    message: "remote row missing; archived locally".to_string(),
                });
                outcome.archived_row_keys.push(row_key.clone());
            } else {
                outcome.warnings.push(UpsertWarning {
                    row_key: Some(row_key.clone()),
                    message: "remote row missing; retained locally".to_string(),
                });
            }
            outcome.stats.skipped += 1;
            continue;
        };

        let remote_is_newer = table.rows[idx]
            .last_sync_timestamp
            .map(|stamp| remote_row.last_edited_time > stamp)
            .unwrap_or(true);

        if remote_is_newer {
            outcome.conflicts.push(ConflictRecord {
                row_key: row_key.clone(),
                policy,
            });
            outcome.stats.conflicted += 1;
            match policy {
                ConflictPolicy::RemoteWins => {
                    for column in &columns {
                        let cell = remote_row
                            .values
                            .get(&column.name)
                            .map(Cell::from_remote)
                            .unwrap_or(Cell::Empty);
                        table.rows[idx].cells.insert(column.name.clone(), cell);
                    }
                    table.rows[idx].last_sync_timestamp = Some(run_start);
                    continue;
                }
                ConflictPolicy::LocalWins => {
                    // fall through to push local values below
                }
            }
        }

        let cleared = ensure_options(client, data_source_id, &columns, &mut table.rows[idx].cells).await;
        for column in &cleared {
            outcome.warnings.push(UpsertWarning {
                row_key: Some(row_key.clone()),
                message: format!("could not register new options for column {column:?}; cell cleared"),
            });
        }
        let values = remote_values(&table.rows[idx].cells, &columns);
        retry_with_backoff(|| client.update_row(data_source_id, &row_key, &values))
            .await
            .map_err(TableError::Remote)?;
        table.rows[idx].last_sync_timestamp = Some(run_start);
        outcome.stats.updated += 1;
    }

    Ok(outcome)
}

fn remote_values(
    cells: &BTreeMap<String, Cell>,
    columns: &[Column],
) -> BTreeMap<String, RemoteValue> {
    let mut values = BTreeMap::new();
    for column in columns {
        if let Some(cell) = cells.get(&column.name) {
            if let Some(value) = cell.to_remote(column.kind) {
                values.insert(column.name.clone(), value);
            }
        }
    }
    values
}

/// Union any select/status options the row introduces into the remote
/// schema before the value write lands.
///
/// A single column's option payload can be rejected by the remote store
/// (invalid characters, option-count limits) without compromising the
/// rest of the row or the rest of the database's batch: on failure, that
/// column's cell is cleared so the eventual push carries a value the
/// remote schema already accepts, and the column name is returned so the
/// caller can record a warning.
async fn ensure_options(
    client: &dyn RemoteClient,
    data_source_id: &str,
    columns: &[Column],
    cells: &mut BTreeMap<String, Cell>,
) -> Vec<String> {
    let mut cleared = Vec::new();
    for column in columns {
        if !column.kind.has_options() {
            continue;
        }
        let Some(cell) = cells.get(&column.name) else {
            continue;
        };
        let new_options: Vec<String> = match cell {
            Cell::SingleSelect(Some(v)) => vec![v.clone()],
            Cell::MultiSelect(values) => values.clone(),
            _ => Vec::new(),
        };
        let unknown: Vec<String> = new_options
            .into_iter()
            .filter(|v| !column.options.contains(v))
            .collect();
        if unknown.is_empty() {
            continue;
        }
        let result = retry_with_backoff(|| client.add_property_options(data_source_id, &column.name, &unknown)).await;
        if result.is_err() {
            cells.insert(column.name.clone(), Cell::Empty);
            cleared.push(column.name.clone());
        }
    }
    cleared
}

#[cfg(test)]
mod tests {
    use super::*;
    use tablesync_remote::mock::MockRemoteClient;
    use tablesync_remote::{PropertyKind, RemoteDatabase};
    use tablesync_schema::Column;

    fn seeded_client() -> (MockRemoteClient, String) {
        let client = MockRemoteClient::new();
        let database_id = "db1".to_string();
        client.seed_database(
            RemoteDatabase {
                id: database_id.clone(),
                display_name: "Tasks".to_string(),
                ..Default::default()
            },
            vec![Column::new("Title", PropertyKind::Title)]
                .into_iter()
                .map(|c| tablesync_remote::RemoteProperty::new(c.name, c.kind))
                .collect(),
        );
        (client, database_id)
    }

    #[tokio::test]
    async fn unpushed_rows_are_created() {
        let (client, database_id) = seeded_client();
        let ds = client.resolve_data_source_id(&database_id).await.unwrap();
        let mut table = CanonicalTable::new(vec![Column::new("Title", PropertyKind::Title)]);
        let mut row = crate::row::Row::new();
        row.cells
            .insert("Title".to_string(), Cell::Text("New task".to_string()));
        table.rows.push(row);

        let outcome = upsert_rows(
            &mut table,
            &client,
            &ds,
            "Title",
            ConflictPolicy::RemoteWins,
            false,
            Utc::now(),
        )
        .await
        .unwrap();

        assert_eq!(outcome.stats.created, 1);
        assert!(!table.rows[0].row_key.is_empty());
    }

    #[tokio::test]
    async fn titleless_rows_are_skipped_with_warning() {
        let (client, database_id) = seeded_client();
        let ds = client.resolve_data_source_id(&database_id).await.unwrap();
        let mut table = CanonicalTable::new(vec![Column::new("Title", PropertyKind::Title)]);
        table.rows.push(crate::row::Row::new());

        let outcome = upsert_rows(
            &mut table,
            &client,
            &ds,
            "Title",
            ConflictPolicy::RemoteWins,
            false,
            Utc::now(),
        )
        .await
        .unwrap();

        assert_eq!(outcome.stats.skipped, 1);
        assert_eq!(outcome.warnings.len(), 1);
    }

    #[tokio::test]
    async fn remote_wins_conflict_overwrites_local_edit() {
        let (client, database_id) = seeded_client();
        let ds = client.resolve_data_source_id(&database_id).await.unwrap();

        let mut table = CanonicalTable::new(vec![Column::new("Title", PropertyKind::Title)]);
        let mut row = crate::row::Row::new();
        row.cells
            .insert("Title".to_string(), Cell::Text("Local edit".to_string()));
        table.rows.push(row);
        let created = upsert_rows(
            &mut table,
            &client,
            &ds,
            "Title",
            ConflictPolicy::RemoteWins,
            false,
            Utc::now(),
        )
        .await
        .unwrap();
        assert_eq!(created.stats.created, 1);

        let row_key = table.rows[0].row_key.clone();
        let mut values = std::collections::BTreeMap::new();
        values.insert(
            "Title".to_string(),
            tablesync_remote::RemoteValue::Text("Remote edit".to_string()),
        );
        client.edit_row(&database_id, &row_key, values, Utc::now() + chrono::Duration::seconds(5));

        table.rows[0].cells.insert(
            "Title".to_string(),
            Cell::Text("Conflicting local edit".to_string()),
        );

        let outcome = upsert_rows(
            &mut table,
            &client,
            &ds,
            "Title",
            ConflictPolicy::RemoteWins,
            false,
            Utc::now(),
        )
        .await
        .unwrap();

        assert_eq!(outcome.stats.conflicted, 1);
        assert_eq!(
            table.rows[0].cells.get("Title"),
            Some(&Cell::Text("Remote edit".to_string()))
        );
    }

    #[tokio::test]
    async fn orphaned_row_is_reported_for_archival_but_row_key_left_intact_here() {
        let (client, database_id) = seeded_client();
        let ds = client.resolve_data_source_id(&database_id).await.unwrap();
        let mut table = CanonicalTable::new(vec![Column::new("Title", PropertyKind::Title)]);
        let mut row = crate::row::Row::new();
        row.cells
            .insert("Title".to_string(), Cell::Text("Gone soon".to_string()));
        table.rows.push(row);
        upsert_rows(&mut table, &client, &ds, "Title", ConflictPolicy::RemoteWins, true, Utc::now())
            .await
            .unwrap();

        let row_key = table.rows[0].row_key.clone();
        client.remove_row(&database_id, &row_key);

        let outcome = upsert_rows(&mut table, &client, &ds, "Title", ConflictPolicy::RemoteWins, true, Utc::now())
            .await
            .unwrap();

        assert_eq!(outcome.archived_row_keys, vec![row_key.clone()]);
        assert_eq!(table.rows[0].row_key, row_key, "key clearing is the caller's job, after record-file sync runs");
    }

    #[tokio::test]
    async fn orphaned_row_is_not_flagged_for_archival_when_disabled() {
        let (client, database_id) = seeded_client();
        let ds = client.resolve_data_source_id(&database_id).await.unwrap();
        let mut table = CanonicalTable::new(vec![Column::new("Title", PropertyKind::Title)]);
        let mut row = crate::row::Row::new();
        row.cells
            .insert("Title".to_string(), Cell::Text("Stays put".to_string()));
        table.rows.push(row);
        upsert_rows(&mut table, &client, &ds, "Title", ConflictPolicy::RemoteWins, false, Utc::now())
            .await
            .unwrap();

        let row_key = table.rows[0].row_key.clone();
        client.remove_row(&database_id, &row_key);

        let outcome = upsert_rows(&mut table, &client, &ds, "Title", ConflictPolicy::RemoteWins, false, Utc::now())
            .await
            .unwrap();

        assert!(outcome.archived_row_keys.is_empty());
        assert_eq!(table.rows[0].row_key, row_key);
    }

    #[tokio::test]
    async fn failed_option_sync_clears_the_cell_and_continues_instead_of_aborting() {
        let client = MockRemoteClient::new();
        let database_id = "db1".to_string();
        client.seed_database(
            RemoteDatabase {
                id: database_id.clone(),
                display_name: "Tasks".to_string(),
                ..Default::default()
            },
            vec![
                tablesync_remote::RemoteProperty::new("Title", PropertyKind::Title),
                tablesync_remote::RemoteProperty::new("Status", PropertyKind::SingleSelect)
                    .with_options(vec!["Ready".to_string()]),
            ],
        );
        let ds = client.resolve_data_source_id(&database_id).await.unwrap();
        client.fail_next_option_sync(&database_id);

        let mut table = CanonicalTable::new(vec![
            Column::new("Title", PropertyKind::Title),
            Column::new("Status", PropertyKind::SingleSelect),
        ]);
        let mut row = crate::row::Row::new();
        row.cells
            .insert("Title".to_string(), Cell::Text("New task".to_string()));
        row.cells
            .insert("Status".to_string(), Cell::SingleSelect(Some("Brand New".to_string())));
        table.rows.push(row);

        let outcome = upsert_rows(&mut table, &client, &ds, "Title", ConflictPolicy::RemoteWins, false, Utc::now())
            .await
            .unwrap();

        assert_eq!(outcome.stats.created, 1, "the row is still pushed despite the option failure");
        assert!(!outcome.warnings.is_empty());
        assert_eq!(table.rows[0].cells.get("Status"), Some(&Cell::Empty));
    }
}

//! Single-In-Progress enforcement for the agent-tasks database. Runs once after that database's own pipeline finishes.

use tablesync_schema::Cell;
use tablesync_table::CanonicalTable;

pub const IN_PROGRESS: &str = "In Progress";

#[derive(Debug, Clone, PartialEq)]
pub struct Demotion {
    pub row_key: String,
    pub from: String,
    pub to: String,
}

/// Keep the most-recently-*edited* "In Progress" row as-is; demote every
/// other offender to the first other option on the status column (there
/// is no edit-history to recover an actual "prior status" from, so the
/// column's own option order stands in for it — see DESIGN.md).
///
/// Ties break on `remote_last_edited_time`, not `last_sync_timestamp`:
/// row-sync stamps every touched row's `last_sync_timestamp` to the same
/// run-start value, so that field can't distinguish which offender was
/// actually edited more recently on the remote side.
pub fn enforce_single_in_progress(table: &mut CanonicalTable, status_column: &str) -> Vec<Demotion> {
    let Some(column) = table.column(status_column).cloned() else {
        return Vec::new();
    };

    let mut offenders: Vec<usize> = table
        .rows
        .iter()
        .enumerate()
        .filter(|(_, row)| matches!(row.cell(status_column), Some(Cell::SingleSelect(Some(v))) if v == IN_PROGRESS))
        .map(|(idx, _)| idx)
        .collect();

    if offenders.len() <= 1 {
        return Vec::new();
    }

    offenders.sort_by_key(|&idx| {
        let row = &table.rows[idx];
        row.remote_last_edited_time.or(row.last_sync_timestamp)
    });
    let keep = *offenders.last().expect("checked len > 1 above");

    let demote_to = column
        .options
        .iter()
        .find(|o| o.as_str() != IN_PROGRESS)
        .cloned()
        .unwrap_or_else(|| IN_PROGRESS.to_string());

    let mut demotions = Vec::new();
    for idx in offenders {
        if idx == keep {
            continue;
        }
        table.rows[idx].cells.insert(
            status_column.to_string(),
            Cell::SingleSelect(Some(demote_to.clone())),
        );
        demotions.push(Demotion {
            row_key: table.rows[idx].row_key.clone(),
            from: IN_PROGRESS.to_string(),
            to: demote_to.clone(),
        });
    }
    demotions
}

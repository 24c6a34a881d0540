//! `RegistrySpreadsheet`: the `.xlsx` ledger of every known remote
//! database. Read with `calamine`, written with `rust_xlsxwriter`.

use std::path::Path;

use calamine::{open_workbook, Reader, Xlsx};
use chrono::{DateTime, Utc};
use rust_xlsxwriter::Workbook;

use crate::error::RegistryError;

const SHEET_NAME: &str = "Registry";
const HEADER: [&str; 5] = ["id", "displayName", "folderPath", "lastSeen", "environment"];
const META_SHEET_NAME: &str = "Meta";
const META_HEADER: [&str; 2] = ["key", "value"];
const ROTATION_CURSOR_KEY: &str = "rotationCursor";

#[derive(Debug, Clone, PartialEq)]
pub struct RegistryRow {
    pub id: String,
    pub display_name: String,
    pub folder_path: String,
    pub last_seen: DateTime<Utc>,
    pub environment: String,
}

/// In-memory view of the registry workbook. Rows are unique by `id`;
/// callers mutate through [`RegistrySpreadsheet::upsert`]
/// and persist with [`RegistrySpreadsheet::save`].
#[derive(Debug, Clone, Default)]
pub struct RegistrySpreadsheet {
    rows: Vec<RegistryRow>,
    /// Id of the non-priority database that rotation should start *after*
    /// on the next run. Persisted in a dedicated `Meta` sheet since it's a
    /// single run-level value, not a per-row field.
    rotation_cursor: Option<String>,
}

impl RegistrySpreadsheet {
    pub fn load(path: &Path) -> Result<Self, RegistryError> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let mut workbook: Xlsx<_> = open_workbook(path)?;
        let range = match workbook.worksheet_range(SHEET_NAME) {
            Ok(range) => range,
            Err(_) => return Ok(Self::default()),
        };

        let mut rows = Vec::new();
        for row in range.rows().skip(1) {
            if row.len() < HEADER.len() {
                continue;
            }
            let id = row[0].to_string();
            if id.is_empty() {
                continue;
            }
            let last_seen = row[3]
                .to_string()
                .parse::<DateTime<Utc>>()
                .unwrap_or_else(|_| Utc::now());
            rows.push(RegistryRow {
                id,
                display_name: row[1].to_string(),
                folder_path: row[2].to_string(),
                last_seen,
                environment: row[4].to_string(),
            });
        }

        let rotation_cursor = workbook.worksheet_range(META_SHEET_NAME).ok().and_then(|range| {
            range.rows().skip(1).find_map(|row| {
                if row.len() < META_HEADER.len() || row[0].to_string() != ROTATION_CURSOR_KEY {
                    return None;
                }
                let value = row[1].to_string();
                if value.is_empty() {
                    None
                } else {
                    Some(value)
                }
            })
        });

        Ok(Self { rows, rotation_cursor })
    }

    pub fn save(&self, path: &Path) -> Result<(), RegistryError> {
        let mut workbook = Workbook::new();
        let sheet = workbook.add_worksheet().set_name(SHEET_NAME)?;
        for (col, header) in HEADER.iter().enumerate() {
            sheet.write_string(0, col as u16, *header)?;
        }
        for (row_idx, row) in self.rows.iter().enumerate() {
            let r = (row_idx + 1) as u32;
            sheet.write_string(r, 0, &row.id)?;
            sheet.write_string(r, 1, &row.display_name)?;
            sheet.write_string(r, 2, &row.folder_path)?;
            sheet.write_string(r, 3, &row.last_seen.to_rfc3339())?;
            sheet.write_string(r, 4, &row.environment)?;
        }

        let meta_sheet = workbook.add_worksheet().set_name(META_SHEET_NAME)?;
        for (col, header) in META_HEADER.iter().enumerate() {
            meta_sheet.write_string(0, col as u16, *header)?;
        }
        if let Some(cursor) = &self.rotation_cursor {
            meta_sheet.write_string(1, 0, ROTATION_CURSOR_KEY)?;
            meta_sheet.write_string(1, 1, cursor)?;
        }

        workbook.save(path)?;
        Ok(())
    }

    pub fn rotation_cursor(&self) -> Option<&str> {
        self.rotation_cursor.as_deref()
    }

    pub fn set_rotation_cursor(&mut self, cursor: Option<String>) {
        self.rotation_cursor = cursor;
    }

    pub fn rows(&self) -> &[RegistryRow] {
        &self.rows
    }

    pub fn find_by_id(&self, id: &str) -> Option<&RegistryRow> {
        self.rows.iter().find(|r| r.id == id)
    }

    pub fn find_by_display_name(&self, name: &str) -> Vec<&RegistryRow> {
        self.rows.iter().filter(|r| r.display_name == name).collect()
    }

    /// Insert, or update `lastSeen`/`displayName` in place.
    pub fn upsert(&mut self, row: RegistryRow) {
        match self.rows.iter_mut().find(|r| r.id == row.id) {
            Some(existing) => {
                existing.display_name = row.display_name;
                existing.last_seen = row.last_seen;
            }
            None => self.rows.push(row),
        }
    }

    /// Repoint a duplicate's row at the surviving folder, consolidating
    /// two registry entries that shared a `displayName`.
    pub fn repoint(&mut self, duplicate_id: &str, survivor_folder_path: &str) {
        if let Some(row) = self.rows.iter_mut().find(|r| r.id == duplicate_id) {
            row.folder_path = survivor_folder_path.to_string();
        }
    }

    pub fn remove(&mut self, id: &str) {
        self.rows.retain(|r| r.id != id);
    }
}

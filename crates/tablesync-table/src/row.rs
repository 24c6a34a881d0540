//! The canonical table: an ordered column list plus rows, persisted as
//! RFC-4180 CSV. Two synthetic columns, `__rowKey` and
//! `__lastSyncTimestamp`, are always present and always last.

use std::collections::BTreeMap;
use std::io::Read;
use std::path::Path;

use chrono::{DateTime, Utc};
use tablesync_schema::{Cell, Column, PropertyKind};

use crate::error::TableError;

pub const ROW_KEY_COLUMN: &str = "__rowKey";
pub const LAST_SYNC_COLUMN: &str = "__lastSyncTimestamp";

fn kind_token(kind: PropertyKind) -> &'static str {
    match kind {
        PropertyKind::Title => "title",
        PropertyKind::Text => "text",
        PropertyKind::Number => "number",
        PropertyKind::Checkbox => "checkbox",
        PropertyKind::Date => "date",
        PropertyKind::SingleSelect => "singleSelect",
        PropertyKind::MultiSelect => "multiSelect",
        PropertyKind::Url => "url",
        PropertyKind::Email => "email",
        PropertyKind::Phone => "phone",
        PropertyKind::Status => "status",
        PropertyKind::Relation => "relation",
        PropertyKind::People => "people",
        PropertyKind::Files => "files",
        PropertyKind::Formula => "formula",
        PropertyKind::Rollup => "rollup",
        PropertyKind::CreatedTime => "createdTime",
        PropertyKind::LastEditedTime => "lastEditedTime",
        PropertyKind::CreatedBy => "createdBy",
        PropertyKind::LastEditedBy => "lastEditedBy",
    }
}

fn kind_from_token(token: &str) -> Result<PropertyKind, TableError> {
    Ok(match token {
        "title" => PropertyKind::Title,
        "text" => PropertyKind::Text,
        "number" => PropertyKind::Number,
        "checkbox" => PropertyKind::Checkbox,
        "date" => PropertyKind::Date,
        "singleSelect" => PropertyKind::SingleSelect,
        "multiSelect" => PropertyKind::MultiSelect,
        "url" => PropertyKind::Url,
        "email" => PropertyKind::Email,
        "phone" => PropertyKind::Phone,
        "status" => PropertyKind::Status,
        "relation" => PropertyKind::Relation,
        "people" => PropertyKind::People,
        "files" => PropertyKind::Files,
        "formula" => PropertyKind::Formula,
        "rollup" => PropertyKind::Rollup,
        "createdTime" => PropertyKind::CreatedTime,
        "lastEditedTime" => PropertyKind::LastEditedTime,
        "createdBy" => PropertyKind::CreatedBy,
        "lastEditedBy" => PropertyKind::LastEditedBy,
        other => return Err(TableError::Malformed(format!("unknown column kind {other:?}"))),
    })
}

/// One row of the canonical table.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Row {
    pub cells: BTreeMap<String, Cell>,
    /// The remote row id, or empty if this row originated locally and
    /// hasn't been pushed yet.
    pub row_key: String,
    pub last_sync_timestamp: Option<DateTime<Utc>>,
    /// The remote's own `last_edited_time`, captured by row-sync each run
    /// before `last_sync_timestamp` is stamped with this run's start time.
    /// Transient: never written to or read from the CSV, since every row
    /// touched by a run gets the same `last_sync_timestamp`, and code that
    /// needs genuine edit-recency (single-in-progress enforcement) needs
    /// this instead.
    pub remote_last_edited_time: Option<DateTime<Utc>>,
}

impl Row {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_row_key(row_key: impl Into<String>) -> Self {
        Self {
            row_key: row_key.into(),
            ..Self::default()
        }
    }

    pub fn is_unpushed(&self) -> bool {
        self.row_key.is_empty()
    }

    pub fn cell(&self, column: &str) -> Option<&Cell> {
        self.cells.get(column)
    }

    pub fn title(&self, title_column: &str) -> Option<&str> {
        match self.cells.get(title_column) {
            Some(Cell::Text(s)) if !s.is_empty() => Some(s.as_str()),
            _ => None,
        }
    }
}

/// The canonical table: a fixed column order plus an unordered row set.
#[derive(Debug, Clone, Default)]
pub struct CanonicalTable {
    /// Domain columns only, in remote display order. The two synthetic
    /// columns are implicit and always appended last on disk.
    pub columns: Vec<Column>,
    pub rows: Vec<Row>,
}

impl CanonicalTable {
    pub fn new(columns: Vec<Column>) -> Self {
        Self {
            columns,
            rows: Vec::new(),
        }
    }

    pub fn find_row_index_by_key(&self, row_key: &str) -> Option<usize> {
        if row_key.is_empty() {
            return None;
        }
        self.rows.iter().position(|r| r.row_key == row_key)
    }

    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.name == name)
    }

    /// Insert a new domain column at the given position (left of the
    /// synthetic columns, preserving remote display order).
    pub fn insert_column(&mut self, index: usize, column: Column) {
        let index = index.min(self.columns.len());
        self.columns.insert(index, column);
    }

    pub fn read_csv(path: &Path) -> Result<Self, TableError> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let mut file = std::fs::File::open(path)?;
        let mut contents = String::new();
        file.read_to_string(&mut contents)?;
        Self::parse_csv(&contents)
    }

    pub fn parse_csv(contents: &str) -> Result<Self, TableError> {
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(false)
            .from_reader(contents.as_bytes());
        let mut records = reader.records();

        let header = match records.next() {
            Some(r) => r?,
            None => return Ok(Self::default()),
        };
        let kinds_row = match records.next() {
            Some(r) => r?,
            None => return Err(TableError::Malformed("missing kind row".to_string())),
        };

        let headers: Vec<String> = header.iter().map(|s| s.to_string()).collect();
        if headers.len() < 2
            || headers[headers.len() - 2] != ROW_KEY_COLUMN
            || headers[headers.len() - 1] != LAST_SYNC_COLUMN
        {
            return Err(TableError::Malformed(
                "synthetic columns must be last two columns".to_string(),
            ));
        }
        let domain_count = headers.len() - 2;
        let mut columns = Vec::with_capacity(domain_count);
        for i in 0..domain_count {
            let kind = kind_from_token(kinds_row.get(i).unwrap_or(""))?;
            columns.push(Column::new(headers[i].clone(), kind));
        }

        let mut rows = Vec::new();
        for record in records {
            let record = record?;
            let mut cells = BTreeMap::new();
            for (i, column) in columns.iter().enumerate() {
                let text = record.get(i).unwrap_or("");
                let cell = Cell::from_csv_field(text, column.kind)
                    .unwrap_or_else(|_| Cell::Text(text.to_string()));
                cells.insert(column.name.clone(), cell);
            }
            let row_key = record.get(domain_count).unwrap_or("").to_string();
            let last_sync_timestamp = record
                .get(domain_count + 1)
                .filter(|s| !s.is_empty())
                .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
                .map(|dt| dt.with_timezone(&Utc));
            rows.push(Row {
                cells,
                row_key,
                last_sync_timestamp,
                remote_last_edited_time: None,
            });
        }

        Ok(Self { columns, rows })
    }

    pub fn write_csv(&self, path: &Path) -> Result<(), TableError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let file = std::fs::File::create(path)?;
        let mut writer = csv::WriterBuilder::new()
            .has_headers(false)
            .terminator(csv::Terminator::Any(b'\n'))
            .from_writer(file);

        let mut header: Vec<String> = self.columns.iter().map(|c| c.name.clone()).collect();
        header.push(ROW_KEY_COLUMN.to_string());
        header.push(LAST_SYNC_COLUMN.to_string());
        writer.write_record(&header)?;

        let mut kinds: Vec<&str> = self.columns.iter().map(|c| kind_token(c.kind)).collect();
        kinds.push("text");
        kinds.push("text");
        writer.write_record(&kinds)?;

        for row in &self.rows {
            let mut fields: Vec<String> = self
                .columns
                .iter()
                .map(|c| {
                    row.cells
                        .get(&c.name)
                        .map(|cell| cell.to_csv_field())
                        .unwrap_or_default()
                })
                .collect();
            fields.push(row.row_key.clone());
            fields.push(
                row.last_sync_timestamp
                    .map(|t| t.to_rfc3339())
                    .unwrap_or_default(),
            );
            writer.write_record(&fields)?;
        }
        writer.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tablesync_schema::PropertyKind;

    fn sample_table() -> CanonicalTable {
        let mut table = CanonicalTable::new(vec![
            Column::new("Title", PropertyKind::Title),
            Column::new("Status", PropertyKind::Status),
        ]);
        let mut row = Row::with_row_key("r1");
        row.cells
            .insert("Title".to_string(), Cell::Text("Alpha".to_string()));
        row.cells.insert(
            "Status".to_string(),
            Cell::SingleSelect(Some("Open".to_string())),
        );
        row.last_sync_timestamp = Some(Utc::now());
        table.rows.push(row);
        table
    }

    #[test]
    fn csv_round_trips() {
        let table = sample_table();
        let mut buf = Vec::new();
        {
            let mut writer = csv::WriterBuilder::new()
                .has_headers(false)
                .from_writer(&mut buf);
            let mut header: Vec<String> = table.columns.iter().map(|c| c.name.clone()).collect();
            header.push(ROW_KEY_COLUMN.to_string());
            header.push(LAST_SYNC_COLUMN.to_string());
            writer.write_record(&header).unwrap();
        }
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("table.csv");
        table.write_csv(&path).unwrap();
        let parsed = CanonicalTable::read_csv(&path).unwrap();
        assert_eq!(parsed.columns, table.columns);
        assert_eq!(parsed.rows.len(), 1);
        assert_eq!(parsed.rows[0].row_key, "r1");
        assert_eq!(
            parsed.rows[0].cells.get("Title"),
            Some(&Cell::Text("Alpha".to_string()))
        );
    }

    #[test]
    fn missing_file_yields_empty_table() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("does-not-exist.csv");
        let table = CanonicalTable::read_csv(&path).unwrap();
        assert!(table.columns.is_empty());
        assert!(table.rows.is_empty());
    }

    #[test]
    fn synthetic_columns_must_be_last_two() {
        let bad = "Title,__rowKey\ntitle,text\n";
        let err = CanonicalTable::parse_csv(bad).unwrap_err();
        assert!(matches!(err, TableError::Malformed(_)));
    }

}

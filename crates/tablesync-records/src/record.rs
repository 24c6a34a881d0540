//! On-disk shape of a record file: a short metadata block followed by
//! the page body.

use std::collections::BTreeMap;
use std::path::Path;

use chrono::{DateTime, Utc};
use tablesync_remote::PageBlock;

use crate::error::RecordsError;
use crate::page_text::{blocks_to_body, body_to_blocks};

#[derive(Debug, Clone, PartialEq)]
pub struct RecordFile {
    pub row_key: String,
    pub last_sync: Option<DateTime<Utc>>,
    /// A short glance at select-column values, refreshed every sync so a
    /// reader doesn't need to reopen `table.csv`.
    pub summary: BTreeMap<String, String>,
    pub blocks: Vec<PageBlock>,
}

impl RecordFile {
    pub fn parse(contents: &str, path_for_errors: &Path) -> Result<Self, RecordsError> {
        let Some((header, body)) = contents.split_once("\n\n") else {
            return Err(RecordsError::Malformed {
                path: path_for_errors.display().to_string(),
                reason: "metadata block must be terminated by a blank line".to_string(),
            });
        };

        let mut row_key = String::new();
        let mut last_sync = None;
        let mut summary = BTreeMap::new();
        for line in header.lines() {
            let Some((key, value)) = line.split_once(':') else {
                continue;
            };
            let key = key.trim();
            let value = value.trim();
            match key {
                "rowKey" => row_key = value.to_string(),
                "lastSync" => {
                    last_sync = DateTime::parse_from_rfc3339(value)
                        .ok()
                        .map(|dt| dt.with_timezone(&Utc));
                }
                other => {
                    summary.insert(other.to_string(), value.to_string());
                }
            }
        }

        Ok(RecordFile {
            row_key,
            last_sync,
            summary,
            blocks: body_to_blocks(body),
        })
    }

    pub fn render(&self) -> String {
        let mut header = String::new();
        header.push_str(&format!("rowKey: {}\n", self.row_key));
        if let Some(ts) = self.last_sync {
            header.push_str(&format!("lastSync: {}\n", ts.to_rfc3339()));
        }
        for (key, value) in &self.summary {
            header.push_str(&format!("{key}: {value}\n"));
        }
        format!("{header}\n{}", blocks_to_body(&self.blocks))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tablesync_remote::InlineSpan;

    #[test]
    fn round_trips_through_render_and_parse() {
        let mut summary = BTreeMap::new();
        summary.insert("Status".to_string(), "Open".to_string());
        let record = RecordFile {
            row_key: "row_1".to_string(),
            last_sync: Some(Utc::now()),
            summary,
            blocks: vec![PageBlock::Paragraph {
                spans: vec![InlineSpan::Text("hello".to_string())],
            }],
        };
        let rendered = record.render();
        let parsed = RecordFile::parse(&rendered, Path::new("Alpha.txt")).unwrap();
        assert_eq!(parsed.row_key, "row_1");
        assert_eq!(parsed.summary.get("Status"), Some(&"Open".to_string()));
        assert_eq!(parsed.blocks, record.blocks);
    }

    #[test]
    fn missing_blank_line_is_malformed() {
        let err = RecordFile::parse("rowKey: r1\nno blank line here", Path::new("x.txt")).unwrap_err();
        assert!(matches!(err, RecordsError::Malformed { .. }));
    }
}

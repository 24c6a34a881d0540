//! Remote-store domain types: what the engine reads from and writes to
//! the hosted service, transport-agnostic (the caller owns HTTP/JSON).

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The sixteen property kinds the remote store can expose, per the data
/// model's `Column.kind` enumeration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum PropertyKind {
    Title,
    Text,
    Number,
    Checkbox,
    Date,
    SingleSelect,
    MultiSelect,
    Url,
    Email,
    Phone,
    Status,
    Relation,
    People,
    Files,
    Formula,
    Rollup,
    CreatedTime,
    LastEditedTime,
    CreatedBy,
    LastEditedBy,
}

impl PropertyKind {
    /// Kinds the remote store computes itself; the engine reads them but
    /// never pushes values back.
    pub fn is_read_only(self) -> bool {
        matches!(
            self,
            PropertyKind::Formula
                | PropertyKind::Rollup
                | PropertyKind::CreatedTime
                | PropertyKind::LastEditedTime
                | PropertyKind::CreatedBy
                | PropertyKind::LastEditedBy
        )
    }

    /// Whether this kind carries an enumerable option set (single/multi
    /// select and status) that schema sync unions rather than replaces.
    pub fn has_options(self) -> bool {
        matches!(
            self,
            PropertyKind::SingleSelect | PropertyKind::MultiSelect | PropertyKind::Status
        )
    }
}

/// A single column/property as the remote store describes it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoteProperty {
    pub name: String,
    pub kind: PropertyKind,
    /// Allowed choice labels; only meaningful when `kind.has_options()`.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub options: Vec<String>,
}

impl RemoteProperty {
    pub fn new(name: impl Into<String>, kind: PropertyKind) -> Self {
        Self {
            name: name.into(),
            kind,
            options: Vec::new(),
        }
    }

    pub fn with_options(mut self, options: Vec<String>) -> Self {
        self.options = options;
        self
    }
}

/// A remote database as Discovery sees it, before schema/rows are synced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoteDatabase {
    pub id: String,
    pub display_name: String,
    pub parent_workspace: String,
    pub schema_version_stamp: String,
    /// Resolved lazily; write paths must have this populated.
    #[serde(default)]
    pub data_source_id: Option<String>,
}

/// One cell value as fetched from or destined for the remote store, in
/// the remote's own shape — mapping to/from the canonical table's `Cell`
/// happens in `tablesync-schema`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum RemoteValue {
    Text(String),
    Number(f64),
    Checkbox(bool),
    /// ISO-8601 date or interval start; `end` set for intervals.
    Date { start: String, end: Option<String> },
    SingleSelect(Option<String>),
    MultiSelect(Vec<String>),
    Relation(Vec<String>),
    People(Vec<String>),
    Files(Vec<String>),
    /// Read-only kinds are still surfaced as plain text for export.
    ReadOnly(String),
    Empty,
}

/// A single row of a remote database.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoteRow {
    pub id: String,
    pub last_edited_time: DateTime<Utc>,
    pub values: BTreeMap<String, RemoteValue>,
    /// The row's own content page, if the database has page bodies.
    #[serde(default)]
    pub page_id: Option<String>,
}

/// One page of a row listing, with a pagination cursor.
#[derive(Debug, Clone, Default)]
pub struct RowPage {
    pub rows: Vec<RemoteRow>,
    pub next_cursor: Option<String>,
}

/// A block of remote page content, in the minimal shape record-file sync
/// needs to round-trip headings/lists/links.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "block", rename_all = "camelCase")]
pub enum PageBlock {
    Heading { level: u8, text: String },
    Paragraph { spans: Vec<InlineSpan> },
    BulletItem { spans: Vec<InlineSpan> },
    NumberedItem { spans: Vec<InlineSpan> },
}

/// Plain text, or a link annotation over a run of text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum InlineSpan {
    Text(String),
    Link { text: String, url: String },
}

impl InlineSpan {
    pub fn plain_text(&self) -> &str {
        match self {
            InlineSpan::Text(t) => t,
            InlineSpan::Link { text, .. } => text,
        }
    }
}

/// A row's page content: ordered blocks plus the remote's last-edited
/// stamp, used by record-file sync to decide which side changed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemotePage {
    pub page_id: String,
    pub last_edited_time: DateTime<Utc>,
    pub blocks: Vec<PageBlock>,
}

/// Fields written to the well-known execution-record database.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionPageFields {
    pub start_time: DateTime<Utc>,
    pub final_status: String,
    pub script_name: String,
    pub run_id: String,
    pub environment: String,
    pub script_id: String,
    pub timezone: String,
    pub user_identifier: String,
}

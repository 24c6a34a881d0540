//! `Column`/`Cell`: the typed replacement for the source's dynamic
//! property bag (per the engine's design notes). `Cell` is a tagged
//! variant over `PropertyKind`; the canonical table stores its CSV-text
//! serialization, recovered with kind-aware parsing on read.

use serde::{Deserialize, Serialize};
use tablesync_remote::{PropertyKind, RemoteValue};

use crate::error::SchemaError;

/// A column on the canonical table (or the remote schema it mirrors).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Column {
    pub name: String,
    pub kind: PropertyKind,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub options: Vec<String>,
}

impl Column {
    pub fn new(name: impl Into<String>, kind: PropertyKind) -> Self {
        Self {
            name: name.into(),
            kind,
            options: Vec::new(),
        }
    }
}

/// A cell value in canonical-table representation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Cell {
    Text(String),
    Number(f64),
    Checkbox(bool),
    Date { start: String, end: Option<String> },
    SingleSelect(Option<String>),
    MultiSelect(Vec<String>),
    Relation(Vec<String>),
    People(Vec<String>),
    Files(Vec<String>),
    Empty,
}

/// Multi-value cells join with `, `; a literal `, ` inside a value is
/// escaped by doubling it.
const SEPARATOR: &str = ", ";

fn join_multi(values: &[String]) -> String {
    values
        .iter()
        .map(|v| v.replace(SEPARATOR, ", , "))
        .collect::<Vec<_>>()
        .join(SEPARATOR)
}

fn split_multi(text: &str) -> Vec<String> {
    if text.is_empty() {
        return Vec::new();
    }
    // A doubled separator (no gap between the two matches) marks an
    // escaped literal; a lone separator is a real value boundary.
    let mut result = Vec::new();
    let mut current = String::new();
    let mut rest = text;
    loop {
        if let Some(after_first) = rest.strip_prefix(SEPARATOR) {
            if let Some(after_second) = after_first.strip_prefix(SEPARATOR) {
                current.push_str(SEPARATOR);
                rest = after_second;
                continue;
            }
            result.push(std::mem::take(&mut current));
            rest = after_first;
            continue;
        }
        match rest.chars().next() {
            Some(ch) => {
                current.push(ch);
                rest = &rest[ch.len_utf8()..];
            }
            None => break,
        }
    }
    result.push(current);
    result
}

impl Cell {
    /// Serialize to the plain-text representation stored in a CSV cell.
    pub fn to_csv_field(&self) -> String {
        match self {
            Cell::Text(s) => s.clone(),
            Cell::Number(n) => {
                if n.fract() == 0.0 && n.abs() < 1e15 {
                    format!("{}", *n as i64)
                } else {
                    n.to_string()
                }
            }
            Cell::Checkbox(b) => b.to_string(),
            Cell::Date { start, end } => match end {
                Some(end) => format!("{start}/{end}"),
                None => start.clone(),
            },
            Cell::SingleSelect(opt) => opt.clone().unwrap_or_default(),
            Cell::MultiSelect(values) => join_multi(values),
            Cell::Relation(ids) => join_multi(ids),
            Cell::People(ids) => join_multi(ids),
            Cell::Files(urls) => join_multi(urls),
            Cell::Empty => String::new(),
        }
    }

    /// Parse a CSV field back into a typed cell, given the column kind.
    pub fn from_csv_field(text: &str, kind: PropertyKind) -> Result<Cell, SchemaError> {
        if text.is_empty() && !matches!(kind, PropertyKind::Checkbox) {
            return Ok(match kind {
                PropertyKind::MultiSelect => Cell::MultiSelect(Vec::new()),
                PropertyKind::Relation => Cell::Relation(Vec::new()),
                PropertyKind::People => Cell::People(Vec::new()),
                PropertyKind::Files => Cell::Files(Vec::new()),
                PropertyKind::SingleSelect | PropertyKind::Status => Cell::SingleSelect(None),
                _ => Cell::Empty,
            });
        }
        Ok(match kind {
            PropertyKind::Title
            | PropertyKind::Text
            | PropertyKind::Url
            | PropertyKind::Email
            | PropertyKind::Phone
            | PropertyKind::Formula
            | PropertyKind::Rollup
            | PropertyKind::CreatedBy
            | PropertyKind::LastEditedBy => Cell::Text(text.to_string()),
            PropertyKind::Number => {
                let n: f64 = text.parse().map_err(|_| SchemaError::InvalidCellValue {
                    kind: "number".to_string(),
                    value: text.to_string(),
                })?;
                Cell::Number(n)
            }
            PropertyKind::Checkbox => {
                let b = match text {
                    "true" | "1" => true,
                    "false" | "0" | "" => false,
                    _ => {
                        return Err(SchemaError::InvalidCellValue {
                            kind: "checkbox".to_string(),
                            value: text.to_string(),
                        })
                    }
                };
                Cell::Checkbox(b)
            }
            PropertyKind::Date | PropertyKind::CreatedTime | PropertyKind::LastEditedTime => {
                match text.split_once('/') {
                    Some((start, end)) => Cell::Date {
                        start: start.to_string(),
                        end: Some(end.to_string()),
                    },
                    None => Cell::Date {
                        start: text.to_string(),
                        end: None,
                    },
                }
            }
            PropertyKind::SingleSelect | PropertyKind::Status => {
                Cell::SingleSelect(Some(text.to_string()))
            }
            PropertyKind::MultiSelect => Cell::MultiSelect(split_multi(text)),
            PropertyKind::Relation => Cell::Relation(split_multi(text)),
            PropertyKind::People => Cell::People(split_multi(text)),
            PropertyKind::Files => Cell::Files(split_multi(text)),
        })
    }

    /// Map a remote value into canonical-cell representation. Multi-segment formatted text is assumed already flattened
    /// by the caller (the remote client owns that flattening since it's
    /// transport-specific).
    pub fn from_remote(value: &RemoteValue) -> Cell {
        match value {
            RemoteValue::Text(s) => Cell::Text(s.clone()),
            RemoteValue::Number(n) => Cell::Number(*n),
            RemoteValue::Checkbox(b) => Cell::Checkbox(*b),
            RemoteValue::Date { start, end } => Cell::Date {
                start: start.clone(),
                end: end.clone(),
            },
            RemoteValue::SingleSelect(opt) => Cell::SingleSelect(opt.clone()),
            RemoteValue::MultiSelect(values) => Cell::MultiSelect(values.clone()),
            RemoteValue::Relation(ids) => Cell::Relation(ids.clone()),
            RemoteValue::People(ids) => Cell::People(ids.clone()),
            RemoteValue::Files(urls) => Cell::Files(urls.clone()),
            RemoteValue::ReadOnly(text) => Cell::Text(text.clone()),
            RemoteValue::Empty => Cell::Empty,
        }
    }

    /// Map a canonical cell back to a remote value for push.
    /// Returns `None` for read-only kinds, which are never pushed.
    pub fn to_remote(&self, kind: PropertyKind) -> Option<RemoteValue> {
        if kind.is_read_only() {
            return None;
        }
        Some(match self {
            Cell::Text(s) => RemoteValue::Text(s.clone()),
            Cell::Number(n) => RemoteValue::Number(*n),
            Cell::Checkbox(b) => RemoteValue::Checkbox(*b),
            Cell::Date { start, end } => RemoteValue::Date {
                start: start.clone(),
                end: end.clone(),
            },
            Cell::SingleSelect(opt) => RemoteValue::SingleSelect(opt.clone()),
            Cell::MultiSelect(values) => RemoteValue::MultiSelect(values.clone()),
            Cell::Relation(ids) => RemoteValue::Relation(ids.clone()),
            Cell::People(ids) => RemoteValue::People(ids.clone()),
            Cell::Files(urls) => RemoteValue::Files(urls.clone()),
            Cell::Empty => RemoteValue::Empty,
        })
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, Cell::Empty)
            || matches!(self, Cell::Text(s) if s.is_empty())
            || matches!(self, Cell::SingleSelect(None))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_multi_select_through_csv() {
        let cell = Cell::MultiSelect(vec!["a, b".to_string(), "c".to_string()]);
        let text = cell.to_csv_field();
        let back = Cell::from_csv_field(&text, PropertyKind::MultiSelect).unwrap();
        assert_eq!(back, cell);
    }

    #[test]
    fn round_trips_plain_multi_select() {
        let cell = Cell::MultiSelect(vec!["Open".to_string(), "Done".to_string()]);
        let text = cell.to_csv_field();
        assert_eq!(text, "Open, Done");
        let back = Cell::from_csv_field(&text, PropertyKind::MultiSelect).unwrap();
        assert_eq!(back, cell);
    }

    #[test]
    fn number_round_trips_as_integer_when_whole() {
        let cell = Cell::Number(42.0);
        assert_eq!(cell.to_csv_field(), "42");
    }

    #[test]
    fn checkbox_rejects_garbage() {
        let err = Cell::from_csv_field("maybe", PropertyKind::Checkbox).unwrap_err();
        assert!(matches!(err, SchemaError::InvalidCellValue { .. }));
    }

    #[test]
    fn read_only_kinds_never_push() {
        let cell = Cell::Text("computed".to_string());
        assert_eq!(cell.to_remote(PropertyKind::Formula), None);
        assert_eq!(cell.to_remote(PropertyKind::CreatedTime), None);
    }

    #[test]
    fn date_interval_round_trips() {
        let cell = Cell::Date {
            start: "2026-01-01".to_string(),
            end: Some("2026-01-05".to_string()),
        };
        let text = cell.to_csv_field();
        assert_eq!(text, "2026-01-01/2026-01-05");
        let back = Cell::from_csv_field(&text, PropertyKind::Date).unwrap();
        assert_eq!(back, cell);
    }
}

//! Schema reconciliation: compares the table's domain columns
//! against the remote property set and decides what each side should
//! gain, retain, or flag.
//!
//! This module is pure — it never touches the table or the remote client.
//! Callers execute the returned [`SchemaAction`]s (create the column on
//! the table, call `RemoteClient::create_property`, etc).

use std::collections::HashSet;

use tablesync_remote::{PropertyKind, RemoteProperty};

use crate::cell::Column;
use crate::matcher::{MatchStrategyKind, PropertyMatcher};

/// One decision made while reconciling schema.
#[derive(Debug, Clone, PartialEq)]
pub enum SchemaAction {
    /// Remote has this property and the table doesn't: add it, placed
    /// left of the synthetic columns, preserving remote display order.
    AddColumnToTable(Column),
    /// Table has this column and the remote doesn't: push it as a new
    /// remote property (only when `allowSchemaDeletions` is set — see
    /// DESIGN.md for why this reuses the deletion gate).
    AddPropertyToRemote(Column),
    /// A matched option-bearing column's allowed values differ; the
    /// union becomes the new option set on both sides.
    UnionOptions { column: String, options: Vec<String> },
    /// Matched columns disagree on kind. Never auto-coerced; both sides
    /// are left untouched and a warning is logged.
    TypeMismatch {
        column: String,
        table_kind: PropertyKind,
        remote_kind: PropertyKind,
    },
    /// Column exists in the table but not on the remote, and schema
    /// deletions are disabled: retained as-is, not pushed, logged.
    RetainedMissingFromRemote(String),
    /// A debug note recording which fallback strategy (2-5) resolved a
    /// match requirement to record the strategy used.
    FuzzyMatchUsed {
        expected: String,
        matched: String,
        strategy: MatchStrategyKind,
    },
}

/// The full set of decisions from one schema reconciliation pass.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SchemaDiff {
    pub actions: Vec<SchemaAction>,
}

impl SchemaDiff {
    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }
}

/// Reconcile `table_columns` (the table's current domain columns, i.e.
/// excluding the two synthetic columns) against `remote_properties`.
pub fn sync_schema(
    table_columns: &[Column],
    remote_properties: &[RemoteProperty],
    matcher: &PropertyMatcher,
    allow_schema_deletions: bool,
) -> SchemaDiff {
    let table_names: Vec<String> = table_columns.iter().map(|c| c.name.clone()).collect();
    let mut matched_table_names = HashSet::new();
    let mut actions = Vec::new();

    for prop in remote_properties {
        match matcher.resolve(&prop.name, &table_names) {
            Some(m) => {
                matched_table_names.insert(m.matched_name.clone());
                if !m.strategy.is_preferred() {
                    actions.push(SchemaAction::FuzzyMatchUsed {
                        expected: prop.name.clone(),
                        matched: m.matched_name.clone(),
                        strategy: m.strategy,
                    });
                }
                let table_col = table_columns
                    .iter()
                    .find(|c| c.name == m.matched_name)
                    .expect("matched name must come from table_columns");
                reconcile_matched(table_col, prop, &mut actions);
            }
            None => {
                actions.push(SchemaAction::AddColumnToTable(Column {
                    name: prop.name.clone(),
                    kind: prop.kind,
                    options: prop.options.clone(),
                }));
            }
        }
    }

    let remote_names: Vec<String> = remote_properties.iter().map(|p| p.name.clone()).collect();
    for col in table_columns {
        if matched_table_names.contains(&col.name) {
            continue;
        }
        // Re-run matching from the table's side too, independent of the
        // remote-first pass above, since a fuzzy match is not guaranteed
        // symmetric and the remote-first loop only records the winning
        // table name once per remote property.
        if matcher.resolve(&col.name, &remote_names).is_some() {
            continue;
        }
        if allow_schema_deletions {
            actions.push(SchemaAction::AddPropertyToRemote(col.clone()));
        } else {
            actions.push(SchemaAction::RetainedMissingFromRemote(col.name.clone()));
        }
    }

    SchemaDiff { actions }
}

fn reconcile_matched(table_col: &Column, remote_prop: &RemoteProperty, actions: &mut Vec<SchemaAction>) {
    if table_col.kind != remote_prop.kind {
        actions.push(SchemaAction::TypeMismatch {
            column: table_col.name.clone(),
            table_kind: table_col.kind,
            remote_kind: remote_prop.kind,
        });
        return;
    }
    if remote_prop.kind.has_options() {
        let mut union: Vec<String> = table_col.options.clone();
        for opt in &remote_prop.options {
            if !union.contains(opt) {
                union.push(opt.clone());
            }
        }
        if union != table_col.options || union != remote_prop.options {
            actions.push(SchemaAction::UnionOptions {
                column: table_col.name.clone(),
                options: union,
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn col(name: &str, kind: PropertyKind) -> Column {
        Column::new(name, kind)
    }

    fn prop(name: &str, kind: PropertyKind) -> RemoteProperty {
        RemoteProperty::new(name, kind)
    }

    #[test]
    fn new_remote_column_is_added_to_table() {
        let matcher = PropertyMatcher::new();
        let table = vec![col("Title", PropertyKind::Title)];
        let remote = vec![
            prop("Title", PropertyKind::Title),
            prop("Priority", PropertyKind::Number),
        ];
        let diff = sync_schema(&table, &remote, &matcher, false);
        assert!(diff
            .actions
            .iter()
            .any(|a| matches!(a, SchemaAction::AddColumnToTable(c) if c.name == "Priority")));
    }

    #[test]
    fn table_only_column_is_retained_when_deletions_disabled() {
        let matcher = PropertyMatcher::new();
        let table = vec![
            col("Title", PropertyKind::Title),
            col("Local Notes", PropertyKind::Text),
        ];
        let remote = vec![prop("Title", PropertyKind::Title)];
        let diff = sync_schema(&table, &remote, &matcher, false);
        assert!(diff.actions.iter().any(|a| matches!(
            a,
            SchemaAction::RetainedMissingFromRemote(name) if name == "Local Notes"
        )));
        assert!(!diff
            .actions
            .iter()
            .any(|a| matches!(a, SchemaAction::AddPropertyToRemote(_))));
    }

    #[test]
    fn table_only_column_is_pushed_when_deletions_enabled() {
        let matcher = PropertyMatcher::new();
        let table = vec![
            col("Title", PropertyKind::Title),
            col("Local Notes", PropertyKind::Text),
        ];
        let remote = vec![prop("Title", PropertyKind::Title)];
        let diff = sync_schema(&table, &remote, &matcher, true);
        assert!(diff.actions.iter().any(
            |a| matches!(a, SchemaAction::AddPropertyToRemote(c) if c.name == "Local Notes")
        ));
    }

    #[test]
    fn type_mismatch_never_coerces() {
        let matcher = PropertyMatcher::new();
        let table = vec![col("Count", PropertyKind::Text)];
        let remote = vec![prop("Count", PropertyKind::Number)];
        let diff = sync_schema(&table, &remote, &matcher, false);
        assert_eq!(diff.actions.len(), 1);
        assert!(matches!(
            &diff.actions[0],
            SchemaAction::TypeMismatch { column, .. } if column == "Count"
        ));
    }

    #[test]
    fn options_are_unioned_never_removed() {
        let matcher = PropertyMatcher::new();
        let mut table_col = col("Status", PropertyKind::Status);
        table_col.options = vec!["Open".to_string(), "Archived".to_string()];
        let mut remote_prop = prop("Status", PropertyKind::Status);
        remote_prop.options = vec!["Open".to_string(), "Done".to_string()];
        let diff = sync_schema(&[table_col], &[remote_prop], &matcher, false);
        let SchemaAction::UnionOptions { options, .. } = &diff.actions[0] else {
            panic!("expected UnionOptions action, got {:?}", diff.actions);
        };
        assert!(options.contains(&"Open".to_string()));
        assert!(options.contains(&"Archived".to_string()));
        assert!(options.contains(&"Done".to_string()));
    }

    #[test]
    fn running_twice_with_no_change_is_empty() {
        let matcher = PropertyMatcher::new();
        let table = vec![col("Title", PropertyKind::Title)];
        let remote = vec![prop("Title", PropertyKind::Title)];
        let first = sync_schema(&table, &remote, &matcher, false);
        assert!(first.is_empty());
        let second = sync_schema(&table, &remote, &matcher, false);
        assert!(second.is_empty());
    }

    #[test]
    fn fuzzy_match_is_recorded_but_exact_is_not() {
        let matcher = PropertyMatcher::new();
        let table = vec![col("status", PropertyKind::Status)];
        let remote = vec![prop("Status", PropertyKind::Status)];
        let diff = sync_schema(&table, &remote, &matcher, false);
        assert!(diff
            .actions
            .iter()
            .any(|a| matches!(a, SchemaAction::FuzzyMatchUsed { .. })));

        let table_exact = vec![col("Status", PropertyKind::Status)];
        let diff_exact = sync_schema(&table_exact, &remote, &matcher, false);
        assert!(diff_exact.is_empty());
    }
}

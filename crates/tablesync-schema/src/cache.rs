//! Per-run caches: reduce API chatter and stabilize which
//! fuzzy strategy resolved a given pair across a single run. All caches
//! are invalidated at run start and on any schema change for that
//! database — they carry no state across runs.

use std::collections::HashMap;

use crate::cell::Column;
use crate::matcher::MatchStrategyKind;

/// Which side a cached property-name resolution came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Side {
    Table,
    Remote,
}

/// Caches scoped to a single `Engine::run` invocation.
#[derive(Debug, Default)]
pub struct RunCaches {
    data_source_ids: HashMap<String, String>,
    column_schemas: HashMap<String, Vec<Column>>,
    property_matches: HashMap<(Side, String), (String, MatchStrategyKind)>,
}

impl RunCaches {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn data_source_id(&self, database_id: &str) -> Option<&str> {
        self.data_source_ids.get(database_id).map(|s| s.as_str())
    }

    pub fn set_data_source_id(&mut self, database_id: &str, data_source_id: String) {
        self.data_source_ids
            .insert(database_id.to_string(), data_source_id);
    }

    pub fn column_schema(&self, database_id: &str) -> Option<&[Column]> {
        self.column_schemas.get(database_id).map(|v| v.as_slice())
    }

    pub fn set_column_schema(&mut self, database_id: &str, columns: Vec<Column>) {
        self.column_schemas.insert(database_id.to_string(), columns);
    }

    pub fn property_match(&self, side: Side, column_name: &str) -> Option<&(String, MatchStrategyKind)> {
        self.property_matches.get(&(side, column_name.to_string()))
    }

    pub fn set_property_match(
        &mut self,
        side: Side,
        column_name: &str,
        resolved: (String, MatchStrategyKind),
    ) {
        self.property_matches
            .insert((side, column_name.to_string()), resolved);
    }

    /// Invalidate everything for one database, e.g. right after its
    /// schema changed mid-run.
    pub fn invalidate_database(&mut self, database_id: &str) {
        self.column_schemas.remove(database_id);
        self.property_matches
            .retain(|(_, name), _| !name.starts_with(database_id));
    }

    /// Drop everything; called at the start of a run.
    pub fn clear(&mut self) {
        self.data_source_ids.clear();
        self.column_schemas.clear();
        self.property_matches.clear();
    }
}

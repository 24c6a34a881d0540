//! The engine's configuration surface: a single populated
//! struct, no loading or credential management performed here.

use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tablesync_table::ConflictPolicy;

/// Everything `Engine::run` needs for one bounded run. The host is
/// responsible for populating this from its own config/secret store and
/// for constructing the `RemoteClient` the credential handle authorizes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Opaque identifier for whichever credential the host's
    /// `RemoteClient` was built with. The engine never inspects it —
    /// it exists so `RunResult`/log entries can say which identity ran.
    pub credential_handle: String,
    pub root_path: PathBuf,
    pub environment: String,
    /// If non-empty, only these database ids are processed.
    pub database_allow_list: Vec<String>,
    pub database_deny_list: Vec<String>,
    pub allow_schema_deletions: bool,
    pub conflict_policy: ConflictPolicy,
    /// Per-database override of `conflict_policy`, keyed by database id.
    pub conflict_policy_overrides: HashMap<String, ConflictPolicy>,
    pub max_run_duration: Duration,
    pub lock_wait_duration: Duration,
    pub require_item_type_column: bool,
    pub deletion_archives_records: bool,
    pub agent_tasks_database_id: Option<String>,
    /// Identity the on-disk/remote execution record is filed under.
    pub script_name: String,
    pub script_version: String,
    pub script_id: String,
}

impl Config {
    pub fn conflict_policy_for(&self, database_id: &str) -> ConflictPolicy {
        self.conflict_policy_overrides
            .get(database_id)
            .copied()
            .unwrap_or(self.conflict_policy)
    }

    pub fn admits(&self, database_id: &str) -> bool {
        if self.database_deny_list.iter().any(|d| d == database_id) {
            return false;
        }
        if self.database_allow_list.is_empty() {
            return true;
        }
        self.database_allow_list.iter().any(|a| a == database_id)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            credential_handle: String::new(),
            root_path: PathBuf::from("."),
            environment: "dev".to_string(),
            database_allow_list: Vec::new(),
            database_deny_list: Vec::new(),
            allow_schema_deletions: false,
            conflict_policy: ConflictPolicy::RemoteWins,
            conflict_policy_overrides: HashMap::new(),
            max_run_duration: Duration::from_secs(600),
            lock_wait_duration: Duration::from_secs(8),
            require_item_type_column: false,
            deletion_archives_records: true,
            agent_tasks_database_id: None,
            script_name: "syncmirror".to_string(),
            script_version: "1".to_string(),
            script_id: "syncmirror".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deny_list_wins_over_empty_allow_list() {
        let mut config = Config::default();
        config.database_deny_list.push("d1".to_string());
        assert!(!config.admits("d1"));
        assert!(config.admits("d2"));
    }

    #[test]
    fn non_empty_allow_list_restricts_processing() {
        let mut config = Config::default();
        config.database_allow_list.push("d1".to_string());
        assert!(config.admits("d1"));
        assert!(!config.admits("d2"));
    }

    #[test]
    fn per_database_override_beats_default_policy() {
        let mut config = Config::default();
        config
            .conflict_policy_overrides
            .insert("d1".to_string(), ConflictPolicy::LocalWins);
        assert_eq!(config.conflict_policy_for("d1"), ConflictPolicy::LocalWins);
        assert_eq!(config.conflict_policy_for("d2"), ConflictPolicy::RemoteWins);
    }
}

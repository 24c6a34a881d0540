//! End-to-end scenarios driving `Engine::run` against a `MockRemoteClient`
//! and a temp-directory root.

use std::collections::BTreeMap;
use std::time::Duration;

use chrono::Utc;
use tablesync_concurrency::{InMemoryLock, Lock, NoopScheduler, SystemClock};
use tablesync_remote::mock::MockRemoteClient;
use tablesync_remote::{
    PropertyKind, RemoteClient, RemoteDatabase, RemoteProperty, RemoteRow, RemoteValue,
};
use tablesync_table::CanonicalTable;
use syncmirror::{Config, DatabaseState, Engine};

fn base_config(root: &std::path::Path) -> Config {
    Config {
        credential_handle: "cred".to_string(),
        root_path: root.to_path_buf(),
        environment: "test".to_string(),
        lock_wait_duration: Duration::from_millis(200),
        max_run_duration: Duration::from_secs(600),
        script_name: "syncmirror-test".to_string(),
        script_version: "1".to_string(),
        script_id: "scr_test".to_string(),
        ..Config::default()
    }
}

fn seed_tasks_database(client: &MockRemoteClient) -> String {
    let database_id = "db_tasks".to_string();
    client.seed_database(
        RemoteDatabase {
            id: database_id.clone(),
            display_name: "Tasks".to_string(),
            parent_workspace: "ws".to_string(),
            schema_version_stamp: "v1".to_string(),
            data_source_id: None,
        },
        vec![RemoteProperty::new("Title", PropertyKind::Title)],
    );
    database_id
}

fn table_path(root: &std::path::Path, folder: &str) -> std::path::PathBuf {
    root.join("test").join("databases").join(folder).join("table.csv")
}

/// Scenario A: a never-before-seen database is discovered, its folder and
/// registry row are created, and its remote rows land in `table.csv`.
#[tokio::test]
async fn fresh_database_sync_materializes_table_and_record() {
    let dir = tempfile::tempdir().unwrap();
    let client = MockRemoteClient::new();
    let database_id = seed_tasks_database(&client);

    let mut values = BTreeMap::new();
    values.insert("Title".to_string(), RemoteValue::Text("Write the launch doc".to_string()));
    client.seed_row(
        &database_id,
        RemoteRow {
            id: "row_1".to_string(),
            last_edited_time: Utc::now(),
            values,
            page_id: None,
        },
    );

    let config = base_config(dir.path());
    let lock = InMemoryLock::new();
    let scheduler = NoopScheduler;
    let clock = SystemClock;
    let engine = Engine::new(config, &client, &lock, &scheduler, &clock);

    let result = engine.run().await.unwrap();

    assert_eq!(result.databases.len(), 1);
    assert_eq!(result.databases[0].state, DatabaseState::Ok);
    assert_eq!(result.databases[0].export_stats.added, 1);

    let table = CanonicalTable::read_csv(&table_path(dir.path(), "Tasks")).unwrap();
    assert_eq!(table.rows.len(), 1);
    assert_eq!(table.rows[0].row_key, "row_1");

    let record_path = dir.path().join("test/databases/Tasks/Write the launch doc.txt");
    assert!(record_path.exists(), "expected a materialized record file");

    let registry_path = dir.path().join("test/registry.xlsx");
    assert!(registry_path.exists());
}

/// Scenario B: a row added to the local CSV between runs (no `__rowKey`
/// yet) gets pushed to the remote store on the next run.
#[tokio::test]
async fn locally_added_row_is_pushed_on_next_run() {
    let dir = tempfile::tempdir().unwrap();
    let client = MockRemoteClient::new();
    let database_id = seed_tasks_database(&client);

    let lock = InMemoryLock::new();
    let scheduler = NoopScheduler;
    let clock = SystemClock;

    {
        let engine = Engine::new(base_config(dir.path()), &client, &lock, &scheduler, &clock);
        engine.run().await.unwrap();
    }

    let path = table_path(dir.path(), "Tasks");
    let mut table = CanonicalTable::read_csv(&path).unwrap();
    let mut row = tablesync_table::Row::new();
    row.cells.insert(
        "Title".to_string(),
        tablesync_schema::Cell::Text("Drafted locally".to_string()),
    );
    table.rows.push(row);
    table.write_csv(&path).unwrap();

    {
        let engine = Engine::new(base_config(dir.path()), &client, &lock, &scheduler, &clock);
        let result = engine.run().await.unwrap();
        assert_eq!(result.databases[0].upsert_stats.created, 1);
    }

    let ds = client.resolve_data_source_id(&database_id).await.unwrap();
    let page = client.list_rows(&ds, None).await.unwrap();
    assert!(page
        .rows
        .iter()
        .any(|r| r.values.get("Title") == Some(&RemoteValue::Text("Drafted locally".to_string()))));
}

/// Scenario C: a remote edit made between runs overwrites whatever sits
/// in the corresponding local cell once export reconciles it, independent
/// of any local edit made in the same window (export always reflects the
/// remote's current value; see DESIGN.md on where ConflictPolicy applies).
#[tokio::test]
async fn remote_edit_between_runs_overwrites_the_local_cell() {
    let dir = tempfile::tempdir().unwrap();
    let client = MockRemoteClient::new();
    let database_id = seed_tasks_database(&client);

    let mut values = BTreeMap::new();
    values.insert("Title".to_string(), RemoteValue::Text("Original".to_string()));
    client.seed_row(
        &database_id,
        RemoteRow {
            id: "row_1".to_string(),
            last_edited_time: Utc::now(),
            values,
            page_id: None,
        },
    );

    let lock = InMemoryLock::new();
    let scheduler = NoopScheduler;
    let clock = SystemClock;

    {
        let engine = Engine::new(base_config(dir.path()), &client, &lock, &scheduler, &clock);
        engine.run().await.unwrap();
    }

    // Simulate an edit on the remote side after this run's sync stamp, and
    // an edit to the same row's title cell on disk, so the next run sees
    // both sides changed and must apply the conflict policy.
    let mut edited = BTreeMap::new();
    edited.insert("Title".to_string(), RemoteValue::Text("Edited remotely".to_string()));
    client.edit_row(&database_id, "row_1", edited, Utc::now() + chrono::Duration::seconds(30));

    let path = table_path(dir.path(), "Tasks");
    let mut table = CanonicalTable::read_csv(&path).unwrap();
    table.rows[0].cells.insert(
        "Title".to_string(),
        tablesync_schema::Cell::Text("Edited locally".to_string()),
    );
    table.write_csv(&path).unwrap();

    {
        let engine = Engine::new(base_config(dir.path()), &client, &lock, &scheduler, &clock);
        let result = engine.run().await.unwrap();
        assert_eq!(result.databases[0].state, DatabaseState::Ok);
    }

    let table = CanonicalTable::read_csv(&path).unwrap();
    assert_eq!(
        table.rows[0].cells.get("Title"),
        Some(&tablesync_schema::Cell::Text("Edited remotely".to_string()))
    );
}

/// Scenario D: a property added to the remote schema between runs shows
/// up as a new column in `table.csv` without disturbing existing ones.
#[tokio::test]
async fn new_remote_property_is_added_as_a_column() {
    let dir = tempfile::tempdir().unwrap();
    let client = MockRemoteClient::new();
    let database_id = seed_tasks_database(&client);

    let lock = InMemoryLock::new();
    let scheduler = NoopScheduler;
    let clock = SystemClock;

    {
        let engine = Engine::new(base_config(dir.path()), &client, &lock, &scheduler, &clock);
        engine.run().await.unwrap();
    }

    client.add_schema_property(
        &database_id,
        RemoteProperty::new("Priority", PropertyKind::SingleSelect).with_options(vec!["Low".to_string(), "High".to_string()]),
    );

    {
        let engine = Engine::new(base_config(dir.path()), &client, &lock, &scheduler, &clock);
        engine.run().await.unwrap();
    }

    let table = CanonicalTable::read_csv(&table_path(dir.path(), "Tasks")).unwrap();
    assert!(table.column("Priority").is_some());
}

/// Scenario E: a row's record filename is assigned once
/// and stays stable even after the row's title changes on a later run.
#[tokio::test]
async fn record_filename_stays_stable_after_title_change() {
    let dir = tempfile::tempdir().unwrap();
    let client = MockRemoteClient::new();
    let database_id = seed_tasks_database(&client);

    let mut values = BTreeMap::new();
    values.insert("Title".to_string(), RemoteValue::Text("Alpha".to_string()));
    client.seed_row(
        &database_id,
        RemoteRow {
            id: "row_1".to_string(),
            last_edited_time: Utc::now(),
            values,
            page_id: None,
        },
    );

    let lock = InMemoryLock::new();
    let scheduler = NoopScheduler;
    let clock = SystemClock;

    {
        let engine = Engine::new(base_config(dir.path()), &client, &lock, &scheduler, &clock);
        engine.run().await.unwrap();
    }
    let folder = dir.path().join("test/databases/Tasks");
    assert!(folder.join("Alpha.txt").exists());

    let mut renamed = BTreeMap::new();
    renamed.insert("Title".to_string(), RemoteValue::Text("Beta".to_string()));
    client.edit_row(&database_id, "row_1", renamed, Utc::now() + chrono::Duration::seconds(30));

    {
        let engine = Engine::new(base_config(dir.path()), &client, &lock, &scheduler, &clock);
        engine.run().await.unwrap();
    }

    assert!(folder.join("Alpha.txt").exists(), "filename must not follow the title");
    assert!(!folder.join("Beta.txt").exists());
}

/// When a row's remote counterpart disappears and `deletionArchivesRecords`
/// is enabled, its `__rowKey` goes blank and its record file moves to
/// `.archive/` in the same run.
#[tokio::test]
async fn orphaned_row_key_is_cleared_and_its_record_archived() {
    let dir = tempfile::tempdir().unwrap();
    let client = MockRemoteClient::new();
    let database_id = seed_tasks_database(&client);

    let mut values = BTreeMap::new();
    values.insert("Title".to_string(), RemoteValue::Text("Gone soon".to_string()));
    client.seed_row(
        &database_id,
        RemoteRow {
            id: "row_1".to_string(),
            last_edited_time: Utc::now(),
            values,
            page_id: None,
        },
    );

    let lock = InMemoryLock::new();
    let scheduler = NoopScheduler;
    let clock = SystemClock;

    {
        let engine = Engine::new(base_config(dir.path()), &client, &lock, &scheduler, &clock);
        engine.run().await.unwrap();
    }

    client.remove_row(&database_id, "row_1");

    {
        let engine = Engine::new(base_config(dir.path()), &client, &lock, &scheduler, &clock);
        engine.run().await.unwrap();
    }

    let table = CanonicalTable::read_csv(&table_path(dir.path(), "Tasks")).unwrap();
    assert_eq!(table.rows.len(), 1);
    assert!(table.rows[0].row_key.is_empty(), "orphaned row's __rowKey must be cleared");

    let folder = dir.path().join("test/databases/Tasks");
    assert!(!folder.join("Gone soon.txt").exists());
    assert!(folder.join(".archive").join("Gone soon.txt").exists());
}

/// Scenario F: when two rows in the agent-tasks
/// database both read "In Progress", the run demotes every offender but
/// the most recently synced one.
#[tokio::test]
async fn single_in_progress_is_enforced_on_the_agent_tasks_database() {
    let dir = tempfile::tempdir().unwrap();
    let client = MockRemoteClient::new();
    let database_id = "db_agent_tasks".to_string();
    client.seed_database(
        RemoteDatabase {
            id: database_id.clone(),
            display_name: "Agent Tasks".to_string(),
            parent_workspace: "ws".to_string(),
            schema_version_stamp: "v1".to_string(),
            data_source_id: None,
        },
        vec![
            RemoteProperty::new("Title", PropertyKind::Title),
            RemoteProperty::new("Status", PropertyKind::Status)
                .with_options(vec!["Ready".to_string(), "In Progress".to_string(), "Done".to_string()]),
        ],
    );

    let mut older = BTreeMap::new();
    older.insert("Title".to_string(), RemoteValue::Text("Task A".to_string()));
    older.insert("Status".to_string(), RemoteValue::SingleSelect(Some("In Progress".to_string())));
    client.seed_row(
        &database_id,
        RemoteRow {
            id: "row_a".to_string(),
            last_edited_time: Utc::now() - chrono::Duration::seconds(60),
            values: older,
            page_id: None,
        },
    );
    let mut newer = BTreeMap::new();
    newer.insert("Title".to_string(), RemoteValue::Text("Task B".to_string()));
    newer.insert("Status".to_string(), RemoteValue::SingleSelect(Some("In Progress".to_string())));
    client.seed_row(
        &database_id,
        RemoteRow {
            id: "row_b".to_string(),
            last_edited_time: Utc::now(),
            values: newer,
            page_id: None,
        },
    );

    let mut config = base_config(dir.path());
    config.agent_tasks_database_id = Some(database_id.clone());

    let lock = InMemoryLock::new();
    let scheduler = NoopScheduler;
    let clock = SystemClock;
    let engine = Engine::new(config, &client, &lock, &scheduler, &clock);
    engine.run().await.unwrap();

    let table = CanonicalTable::read_csv(&table_path(dir.path(), "Agent_Tasks")).unwrap();
    let in_progress: Vec<&tablesync_table::Row> = table
        .rows
        .iter()
        .filter(|r| {
            matches!(
                r.cell("Status"),
                Some(tablesync_schema::Cell::SingleSelect(Some(v))) if v == "In Progress"
            )
        })
        .collect();
    assert_eq!(in_progress.len(), 1, "exactly one row should remain In Progress");
    assert_eq!(
        in_progress[0].row_key, "row_b",
        "the row edited more recently on the remote side must be the survivor, not whichever sorts first"
    );
}

/// Every database folder gets exactly one `.archive/` subfolder, created
/// alongside the folder itself.
#[tokio::test]
async fn every_database_folder_has_exactly_one_archive_subfolder() {
    let dir = tempfile::tempdir().unwrap();
    let client = MockRemoteClient::new();
    seed_tasks_database(&client);

    let lock = InMemoryLock::new();
    let scheduler = NoopScheduler;
    let clock = SystemClock;
    let engine = Engine::new(base_config(dir.path()), &client, &lock, &scheduler, &clock);
    engine.run().await.unwrap();

    let archive = dir.path().join("test/databases/Tasks/.archive");
    assert!(archive.is_dir());
}

/// The registry has exactly one row per database id, even across
/// repeated runs that rediscover the same database.
#[tokio::test]
async fn registry_has_one_row_per_database_id_across_runs() {
    let dir = tempfile::tempdir().unwrap();
    let client = MockRemoteClient::new();
    seed_tasks_database(&client);

    let lock = InMemoryLock::new();
    let scheduler = NoopScheduler;
    let clock = SystemClock;

    for _ in 0..3 {
        let engine = Engine::new(base_config(dir.path()), &client, &lock, &scheduler, &clock);
        engine.run().await.unwrap();
    }

    let registry = tablesync_registry::RegistrySpreadsheet::load(&dir.path().join("test/registry.xlsx")).unwrap();
    assert_eq!(registry.rows().len(), 1);
}

/// The jsonl and plaintext execution logs are written as a pair and
/// share the same final status token.
#[tokio::test]
async fn the_two_log_files_share_a_final_status() {
    let dir = tempfile::tempdir().unwrap();
    let client = MockRemoteClient::new();
    seed_tasks_database(&client);

    let lock = InMemoryLock::new();
    let scheduler = NoopScheduler;
    let clock = SystemClock;
    let engine = Engine::new(base_config(dir.path()), &client, &lock, &scheduler, &clock);
    engine.run().await.unwrap();

    let log_root = dir.path().join("test/logs");
    let mut names = Vec::new();
    collect_filenames(&log_root, &mut names);
    assert_eq!(names.len(), 2, "expected a jsonl/plaintext pair, found {names:?}");
    assert!(names.iter().all(|n| n.contains("Completed")));
}

fn collect_filenames(dir: &std::path::Path, out: &mut Vec<String>) {
    let Ok(entries) = std::fs::read_dir(dir) else { return };
    for entry in entries.flatten() {
        let path = entry.path();
        if path.is_dir() {
            collect_filenames(&path, out);
        } else {
            out.push(entry.file_name().to_string_lossy().to_string());
        }
    }
}

/// A second run while the lock is already held exits cleanly with no
/// databases touched, rather than erroring.
#[tokio::test]
async fn concurrent_run_with_lock_held_exits_cleanly() {
    let dir = tempfile::tempdir().unwrap();
    let client = MockRemoteClient::new();
    seed_tasks_database(&client);

    let lock = InMemoryLock::new();
    let _guard = lock.try_acquire(Duration::from_millis(10)).unwrap();

    let mut config = base_config(dir.path());
    config.lock_wait_duration = Duration::from_millis(50);
    let scheduler = NoopScheduler;
    let clock = SystemClock;
    let engine = Engine::new(config, &client, &lock, &scheduler, &clock);
    let result = engine.run().await.unwrap();

    assert!(result.databases.is_empty());
    assert!(!result.execution_record_written);
}

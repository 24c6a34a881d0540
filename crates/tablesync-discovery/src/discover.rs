//! The discovery algorithm itself: enumerate remote databases,
//! reconcile the registry, apply allow/deny filters, and consolidate any
//! historical duplicates.

use chrono::Utc;
use tablesync_registry::{FolderManager, RegistryRow, RegistrySpreadsheet};
use tablesync_remote::{RemoteClient, RemoteDatabase};
use tracing::warn;

use crate::error::DiscoveryError;
use crate::filter::DiscoveryFilter;
use crate::validate::validate_database;

/// `Discover(ctx) -> []RemoteDatabase`.
///
/// `registry` and `folders` are mutated in place; callers persist the
/// registry with [`RegistrySpreadsheet::save`] after this returns.
pub async fn discover(
    client: &dyn RemoteClient,
    registry: &mut RegistrySpreadsheet,
    folders: &FolderManager,
    filter: &DiscoveryFilter,
) -> Result<Vec<RemoteDatabase>, DiscoveryError> {
    let found = client.search_databases().await?;
    let now = Utc::now();
    let mut admitted = Vec::new();

    for mut db in found {
        if let Err(err) = validate_database(&db) {
            warn!(error = %err, "skipping malformed search result");
            continue;
        }

        let data_source_id = match client.resolve_data_source_id(&db.id).await {
            Ok(id) => id,
            Err(err) => {
                warn!(database_id = %db.id, error = %err, "skipping database with no resolvable data source id");
                continue;
            }
        };
        db.data_source_id = Some(data_source_id);

        let previous_name = registry.find_by_id(&db.id).map(|row| row.display_name.clone());
        registry.upsert(RegistryRow {
            id: db.id.clone(),
            display_name: db.display_name.clone(),
            folder_path: folders
                .ensure_folder(&db.display_name, previous_name.as_deref())?
                .absolute_path
                .display()
                .to_string(),
            last_seen: now,
            environment: registry
                .find_by_id(&db.id)
                .map(|row| row.environment.clone())
                .unwrap_or_default(),
        });

        if !filter.admits(&db.display_name) {
            continue;
        }

        admitted.push(db);
    }

    consolidate_duplicates(registry, folders)?;
    Ok(admitted)
}

/// Resolve any registry rows that share a `displayName` but differ in
/// `id`, keeping the folder with content and merging the other into it.
fn consolidate_duplicates(
    registry: &mut RegistrySpreadsheet,
    folders: &FolderManager,
) -> Result<(), DiscoveryError> {
    let display_names: Vec<String> = {
        let mut names: Vec<String> = registry.rows().iter().map(|r| r.display_name.clone()).collect();
        names.sort();
        names.dedup();
        names
    };

    for name in display_names {
        let matches = registry.find_by_display_name(&name);
        if matches.len() < 2 {
            continue;
        }
        let mut ids: Vec<String> = matches.iter().map(|r| r.id.clone()).collect();
        ids.sort();

        let survivor_id = ids
            .iter()
            .find(|id| {
                registry
                    .find_by_id(id)
                    .map(|row| FolderManager::has_content(std::path::Path::new(&row.folder_path)))
                    .unwrap_or(false)
            })
            .cloned()
            .unwrap_or_else(|| ids[0].clone());

        let survivor_path = registry
            .find_by_id(&survivor_id)
            .map(|row| row.folder_path.clone())
            .unwrap_or_default();

        for id in ids {
            if id == survivor_id {
                continue;
            }
            let duplicate_path = registry.find_by_id(&id).map(|row| row.folder_path.clone());
            if let Some(duplicate_path) = duplicate_path {
                folders.consolidate_duplicate(
                    std::path::Path::new(&survivor_path),
                    std::path::Path::new(&duplicate_path),
                )?;
            }
            registry.repoint(&id, &survivor_path);
            registry.remove(&id);
        }
    }
    Ok(())
}

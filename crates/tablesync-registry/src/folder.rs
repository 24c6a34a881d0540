//! `FolderManager`: the on-disk database/archive layout.

use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use regex::Regex;

use crate::error::RegistryError;

const ARCHIVE_DIR: &str = ".archive";

fn reserved_chars() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r#"[<>:"/\\|?*\x00-\x1f]+"#).unwrap())
}

/// Deterministic folder-name normalization from a database's display
/// name, so remote renames are detected as the same folder rather than
/// producing a new one.
pub fn normalize_folder_name(display_name: &str) -> String {
    let collapsed = reserved_chars().replace_all(display_name.trim(), "_");
    let collapsed = collapsed.split_whitespace().collect::<Vec<_>>().join("_");
    if collapsed.is_empty() {
        "untitled".to_string()
    } else {
        collapsed
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct LocalFolder {
    pub absolute_path: PathBuf,
    pub name: String,
    pub archive_subfolder: PathBuf,
}

pub struct FolderManager {
    databases_root: PathBuf,
}

impl FolderManager {
    pub fn new(environment_root: &Path) -> Self {
        Self {
            databases_root: environment_root.join("databases"),
        }
    }

    /// Ensure a folder exists for `database_id` under the name derived
    /// from `display_name`. If a folder already exists under the
    /// database's previous name (tracked by `previous_name`), it is
    /// moved rather than recreated.
    pub fn ensure_folder(
        &self,
        display_name: &str,
        previous_name: Option<&str>,
    ) -> Result<LocalFolder, RegistryError> {
        let name = normalize_folder_name(display_name);
        let target = self.databases_root.join(&name);

        if let Some(previous) = previous_name {
            let previous_normalized = normalize_folder_name(previous);
            if previous_normalized != name {
                let previous_path = self.databases_root.join(&previous_normalized);
                if previous_path.exists() && !target.exists() {
                    std::fs::create_dir_all(&self.databases_root)?;
                    std::fs::rename(&previous_path, &target)?;
                }
            }
        }

        std::fs::create_dir_all(&target)?;
        let archive_subfolder = self.ensure_archive(&target)?;
        Ok(LocalFolder {
            absolute_path: target,
            name,
            archive_subfolder,
        })
    }

    /// Create or verify the folder's `.archive/` subfolder. Failure here
    /// is never silent — the caller must surface it as a logged error and
    /// mark the database `failed` for this run.
    pub fn ensure_archive(&self, folder: &Path) -> Result<PathBuf, RegistryError> {
        let archive = folder.join(ARCHIVE_DIR);
        std::fs::create_dir_all(&archive)
            .map_err(|_| RegistryError::ArchiveMissing(archive.display().to_string()))?;
        if !archive.is_dir() {
            return Err(RegistryError::ArchiveMissing(archive.display().to_string()));
        }
        Ok(archive)
    }

    /// Move every entry from `duplicate` into `survivor`, skipping names
    /// that already exist in the survivor. Returns the
    /// number of entries moved.
    pub fn consolidate_duplicate(
        &self,
        survivor: &Path,
        duplicate: &Path,
    ) -> Result<usize, RegistryError> {
        if !duplicate.exists() {
            return Ok(0);
        }
        let mut moved = 0;
        for entry in std::fs::read_dir(duplicate)? {
            let entry = entry?;
            let dest = survivor.join(entry.file_name());
            if dest.exists() {
                continue;
            }
            std::fs::rename(entry.path(), dest)?;
            moved += 1;
        }
        std::fs::remove_dir_all(duplicate).ok();
        Ok(moved)
    }

    /// A folder counts as "having content" if it contains anything besides
    /// an empty `.archive/`.
    pub fn has_content(folder: &Path) -> bool {
        let Ok(entries) = std::fs::read_dir(folder) else {
            return false;
        };
        for entry in entries.flatten() {
            if entry.file_name() == ARCHIVE_DIR {
                continue;
            }
            return true;
        }
        false
    }
}

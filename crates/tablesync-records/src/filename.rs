//! Filename derivation and the suffix-stability index.
//!
//! The "hidden metadata column" the source describes is kept out of
//! `table.csv` entirely — the canonical table's invariant is exactly two
//! trailing synthetic columns — and lives instead as a
//! sidecar index file per database folder, keyed by `__rowKey`.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::RecordsError;

const MAX_BASENAME_LEN: usize = 80;
const INDEX_FILENAME: &str = ".record-names.json";

/// Strip filesystem-reserved characters, collapse whitespace, cap length.
pub fn sanitize_title(title: &str) -> String {
    let mut out = String::with_capacity(title.len());
    let mut last_was_space = false;
    for ch in title.chars() {
        let keep = !matches!(ch, '<' | '>' | ':' | '"' | '/' | '\\' | '|' | '?' | '*')
            && !ch.is_control();
        if !keep {
            continue;
        }
        if ch.is_whitespace() {
            if !last_was_space && !out.is_empty() {
                out.push(' ');
            }
            last_was_space = true;
        } else {
            out.push(ch);
            last_was_space = false;
        }
    }
    let trimmed = out.trim();
    let truncated: String = trimmed.chars().take(MAX_BASENAME_LEN).collect();
    if truncated.is_empty() {
        "Untitled".to_string()
    } else {
        truncated
    }
}

/// Per-folder record of which filename each row was last assigned, so a
/// ` (2)`-style collision suffix stays attached to the same row across
/// runs even if a same-named row is created and deleted elsewhere.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NameIndex {
    /// `__rowKey` -> filename (including extension), for rows already
    /// assigned one.
    by_row_key: HashMap<String, String>,
}

impl NameIndex {
    pub fn load(folder: &Path) -> Result<Self, RecordsError> {
        let path = folder.join(INDEX_FILENAME);
        if !path.exists() {
            return Ok(Self::default());
        }
        let contents = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&contents)?)
    }

    pub fn save(&self, folder: &Path) -> Result<(), RecordsError> {
        let path = folder.join(INDEX_FILENAME);
        let contents = serde_json::to_string_pretty(self)?;
        std::fs::write(path, contents)?;
        Ok(())
    }

    /// Resolve the stable filename for `row_key`, assigning the lowest
    /// unused `(n)` suffix the first time a row is seen.
    pub fn resolve(&mut self, row_key: &str, title: &str, extension: &str) -> PathBuf {
        if let Some(existing) = self.by_row_key.get(row_key) {
            return PathBuf::from(existing);
        }
        let base = sanitize_title(title);
        let taken: std::collections::HashSet<&str> =
            self.by_row_key.values().map(|s| s.as_str()).collect();

        let plain = format!("{base}.{extension}");
        let filename = if !taken.contains(plain.as_str()) {
            plain
        } else {
            let mut n = 2u32;
            loop {
                let candidate = format!("{base} ({n}).{extension}");
                if !taken.contains(candidate.as_str()) {
                    break candidate;
                }
                n += 1;
            }
        };
        self.by_row_key
            .insert(row_key.to_string(), filename.clone());
        PathBuf::from(filename)
    }

    pub fn forget(&mut self, row_key: &str) {
        self.by_row_key.remove(row_key);
    }
}

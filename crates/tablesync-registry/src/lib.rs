//! The RegistrySpreadsheet and the on-disk database/archive layout it
//! tracks.

mod error;
mod folder;
mod spreadsheet;

pub use error::RegistryError;
pub use folder::{normalize_folder_name, FolderManager, LocalFolder};
pub use spreadsheet::{RegistryRow, RegistrySpreadsheet};

//! Field-by-field validation of a search result, in the same defensive
//! style used at the remote-metadata trust boundary elsewhere in the
//! sync stack — even though the boundary here is a typed `RemoteDatabase`
//! rather than raw JSON, a malformed host implementation can still hand
//! back an entry with an empty id or name.

use tablesync_remote::RemoteDatabase;

use crate::error::DiscoveryError;

pub fn validate_database(db: &RemoteDatabase) -> Result<(), DiscoveryError> {
    if db.id.is_empty() {
        return Err(DiscoveryError::MissingField { field: "id" });
    }
    if db.display_name.is_empty() {
        return Err(DiscoveryError::MissingField {
            field: "displayName",
        });
    }
    Ok(())
}

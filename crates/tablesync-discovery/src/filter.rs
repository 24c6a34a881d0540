//! Allow/deny filtering applied to discovered databases.
//!
//! Kept local to this crate rather than depending on the engine's own
//! configuration type, so the engine depends on discovery and not the
//! other way around.

#[derive(Debug, Clone, Default)]
pub struct DiscoveryFilter {
    /// If `Some`, only `display_name`s in this list are kept.
    pub allow: Option<Vec<String>>,
    /// `display_name`s in this list are always dropped, even if also allowed.
    pub deny: Vec<String>,
}

impl DiscoveryFilter {
    pub fn admits(&self, display_name: &str) -> bool {
        if self.deny.iter().any(|d| d == display_name) {
            return false;
        }
        match &self.allow {
            Some(allow) => allow.iter().any(|a| a == display_name),
            None => true,
        }
    }
}

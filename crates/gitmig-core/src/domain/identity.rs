//! Author identity mapping.
//!
//! A static table from original author name to replacement name/email,
//! loaded once per process from a JSON file. Applied uniformly to both the
//! author and committer fields of every commit whose author name matches.

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::domain::error::{MigrateError, Result};

/// Replacement identity for a mapped author.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    /// Replacement author/committer name.
    pub new_name: String,
    /// Replacement author/committer email.
    pub new_email: String,
}

/// Mapping from original author name to replacement identity.
///
/// Keys are unique and matched case-sensitively. Mapped values must be fixed
/// points: a `new_name` that is itself a key would make repeated rewrites
/// cycle instead of converging, so such tables are rejected at load time.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdentityMapping {
    entries: BTreeMap<String, Identity>,
}

impl IdentityMapping {
    /// Build a mapping from explicit entries, enforcing the fixed-point rule.
    pub fn new(entries: BTreeMap<String, Identity>) -> Result<Self> {
        for identity in entries.values() {
            if entries.contains_key(&identity.new_name) {
                return Err(MigrateError::Config(format!(
                    "identity mapping is not a fixed point: mapped name {:?} is also a key",
                    identity.new_name
                )));
            }
        }
        Ok(IdentityMapping { entries })
    }

    /// Load the mapping from a JSON file of the form
    /// `{ "old name": { "new_name": "...", "new_email": "..." }, ... }`.
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read(path).map_err(|e| {
            MigrateError::Config(format!("cannot read author map {}: {e}", path.display()))
        })?;
        let entries: BTreeMap<String, Identity> = serde_json::from_slice(&raw).map_err(|e| {
            MigrateError::Config(format!("cannot parse author map {}: {e}", path.display()))
        })?;
        Self::new(entries)
    }

    /// Look up a replacement identity by exact author name.
    pub fn lookup(&self, author_name: &[u8]) -> Option<&Identity> {
        // Author names in commit objects are raw bytes; only valid UTF-8
        // names can match keys of the JSON table.
        std::str::from_utf8(author_name)
            .ok()
            .and_then(|name| self.entries.get(name))
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(name: &str, email: &str) -> Identity {
        Identity {
            new_name: name.to_string(),
            new_email: email.to_string(),
        }
    }

    #[test]
    fn lookup_is_exact_and_case_sensitive() {
        let mut entries = BTreeMap::new();
        entries.insert("olduser_1".to_string(), entry("X", "x@y.com"));
        let mapping = IdentityMapping::new(entries).unwrap();

        assert_eq!(mapping.lookup(b"olduser_1").unwrap().new_name, "X");
        assert!(mapping.lookup(b"OldUser_1").is_none());
        assert!(mapping.lookup(b"olduser_2").is_none());
    }

    #[test]
    fn non_utf8_author_never_matches() {
        let mut entries = BTreeMap::new();
        entries.insert("olduser_1".to_string(), entry("X", "x@y.com"));
        let mapping = IdentityMapping::new(entries).unwrap();
        assert!(mapping.lookup(b"oldu\xffser_1").is_none());
    }

    #[test]
    fn mapped_name_reappearing_as_key_is_rejected() {
        let mut entries = BTreeMap::new();
        entries.insert("a".to_string(), entry("b", "b@x.com"));
        entries.insert("b".to_string(), entry("c", "c@x.com"));
        let err = IdentityMapping::new(entries).unwrap_err();
        assert!(err.to_string().contains("fixed point"));
    }

    #[test]
    fn load_parses_json_table() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("authors.json");
        std::fs::write(
            &path,
            r#"{ "olduser_1": { "new_name": "X", "new_email": "x@y.com" } }"#,
        )
        .unwrap();
        let mapping = IdentityMapping::load(&path).unwrap();
        assert_eq!(mapping.len(), 1);
        assert_eq!(mapping.lookup(b"olduser_1").unwrap().new_email, "x@y.com");
    }

    #[test]
    fn load_rejects_malformed_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("authors.json");
        std::fs::write(&path, "not json").unwrap();
        assert!(matches!(
            IdentityMapping::load(&path),
            Err(MigrateError::Config(_))
        ));
    }
}

//! Write claims held by pending transactions.

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;

use crate::error::{ConfigError, ConfigResult};
use crate::section::StagedMutation;

type ClaimKey = (String, String);

/// Which pending transaction has staged each (level file, section) key.
///
/// Anyone else writing a claimed key is rejected until the owner commits,
/// aborts or expires.
#[derive(Debug, Default)]
pub struct ClaimTable {
    claims: DashMap<ClaimKey, String>,
}

impl ClaimTable {
    pub fn new() -> Self {
        Self::default()
    }

    fn key(file: &str, section: &str) -> ClaimKey {
        (file.to_string(), section.to_string())
    }

    pub fn holder(&self, file: &str, section: &str) -> Option<String> {
        self.claims
            .get(&Self::key(file, section))
            .map(|entry| entry.value().clone())
    }

    /// Fail with `Locked` when a transaction other than `caller` holds the key.
    pub fn check(&self, staged: &StagedMutation, caller: Option<&str>) -> ConfigResult<()> {
        match self.holder(&staged.file, &staged.section) {
            Some(owner) if Some(owner.as_str()) != caller => Err(ConfigError::locked(
                staged.section_path(),
                format!("staged in transaction {}", owner),
            )),
            _ => Ok(()),
        }
    }

    /// Claim the key of `staged` for `owner`.
    pub fn claim(&self, staged: &StagedMutation, owner: &str) -> ConfigResult<()> {
        match self.claims.entry(Self::key(&staged.file, &staged.section)) {
            Entry::Occupied(entry) if entry.get().as_str() != owner => Err(ConfigError::locked(
                staged.section_path(),
                format!("staged in transaction {}", entry.get()),
            )),
            Entry::Occupied(_) => Ok(()),
            Entry::Vacant(entry) => {
                entry.insert(owner.to_string());
                Ok(())
            }
        }
    }

    /// Drop every claim held by `owner`.
    pub fn release(&self, owner: &str) {
        self.claims.retain(|_, holder| holder.as_str() != owner);
    }

    pub fn len(&self) -> usize {
        self.claims.len()
    }

    pub fn is_empty(&self) -> bool {
        self.claims.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scope::{LevelRef, Scope};
    use crate::section::SectionMutation;
    use serde_json::json;

    fn staged(file: &str) -> StagedMutation {
        StagedMutation::new(
            Scope::global(),
            &LevelRef {
                location_id: "host".into(),
                file: file.into(),
            },
            "default_document",
            SectionMutation::replace(json!({})),
        )
    }

    #[test]
    fn test_claims_are_exclusive() {
        let table = ClaimTable::new();
        let m = staged("host.toml");

        table.claim(&m, "tx_a").unwrap();
        table.claim(&m, "tx_a").unwrap();
        assert!(matches!(table.claim(&m, "tx_b"), Err(ConfigError::Locked { .. })));

        table.check(&m, Some("tx_a")).unwrap();
        assert!(table.check(&m, None).is_err());
        table.check(&staged("other/web.toml"), None).unwrap();

        table.release("tx_a");
        assert!(table.is_empty());
        table.check(&m, None).unwrap();
    }
}

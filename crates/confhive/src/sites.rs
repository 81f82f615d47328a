//! Sites registry, stored as the host-only `sites` section.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{ConfigError, ConfigResult};
use crate::scope::normalize_path;

/// Name of the section that holds the sites registry.
pub const SITES_SECTION: &str = "sites";

/// An application boundary inside a site. Owns its own level file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApplicationEntry {
    pub path: String,
    pub physical_path: String,
}

/// One site. Its root directory owns a level file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SiteEntry {
    pub id: i64,
    pub name: String,
    pub physical_path: String,
    #[serde(default)]
    pub server_auto_start: bool,
    #[serde(default)]
    pub applications: Vec<ApplicationEntry>,
}

/// Request to create a site. Without an id the next free one is used.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewSite {
    #[serde(default)]
    pub id: Option<i64>,
    pub name: String,
    pub physical_path: String,
    #[serde(default)]
    pub server_auto_start: bool,
    #[serde(default)]
    pub applications: Vec<ApplicationEntry>,
}

impl NewSite {
    pub fn into_entry(self, id: i64) -> SiteEntry {
        SiteEntry {
            id,
            name: self.name,
            physical_path: self.physical_path,
            server_auto_start: self.server_auto_start,
            applications: self.applications,
        }
    }
}

/// Value of the `sites` section.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SitesSection {
    #[serde(default)]
    pub entries: Vec<SiteEntry>,
}

impl SitesSection {
    pub fn from_value(value: &Value) -> ConfigResult<Self> {
        serde_json::from_value(value.clone())
            .map_err(|e| ConfigError::validation(format!("invalid sites section: {}", e)))
    }

    pub fn to_value(&self) -> Value {
        serde_json::to_value(self).unwrap_or_else(|_| Value::Object(Default::default()))
    }

    pub fn find(&self, id: i64) -> Option<&SiteEntry> {
        self.entries.iter().find(|s| s.id == id)
    }

    pub fn find_mut(&mut self, id: i64) -> Option<&mut SiteEntry> {
        self.entries.iter_mut().find(|s| s.id == id)
    }

    pub fn next_id(&self) -> i64 {
        self.entries.iter().map(|s| s.id).max().unwrap_or(0) + 1
    }

    /// Add a site, rejecting duplicate ids and names.
    pub fn add(&mut self, site: SiteEntry) -> ConfigResult<()> {
        validate_site(&site)?;
        if self.find(site.id).is_some() {
            return Err(ConfigError::already_exists(format!("site id {}", site.id)));
        }
        if self
            .entries
            .iter()
            .any(|s| s.name.eq_ignore_ascii_case(&site.name))
        {
            return Err(ConfigError::already_exists(format!("site '{}'", site.name)));
        }
        self.entries.push(site);
        Ok(())
    }

    /// Apply a partial update to one site and return the result.
    pub fn update(&mut self, id: i64, update: SiteUpdate) -> ConfigResult<SiteEntry> {
        let mut site = self
            .find(id)
            .cloned()
            .ok_or_else(|| ConfigError::not_found(format!("site {}", id)))?;
        update.apply_to(&mut site);
        validate_site(&site)?;
        if self
            .entries
            .iter()
            .any(|s| s.id != id && s.name.eq_ignore_ascii_case(&site.name))
        {
            return Err(ConfigError::already_exists(format!("site '{}'", site.name)));
        }

        if let Some(slot) = self.find_mut(id) {
            *slot = site.clone();
        }
        Ok(site)
    }

    pub fn remove(&mut self, id: i64) -> ConfigResult<SiteEntry> {
        let index = self
            .entries
            .iter()
            .position(|s| s.id == id)
            .ok_or_else(|| ConfigError::not_found(format!("site {}", id)))?;
        Ok(self.entries.remove(index))
    }
}

/// Partial site change; absent fields keep their value.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SiteUpdate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub physical_path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub server_auto_start: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub applications: Option<Vec<ApplicationEntry>>,
}

impl SiteUpdate {
    pub fn apply_to(self, site: &mut SiteEntry) {
        if let Some(name) = self.name {
            site.name = name;
        }
        if let Some(physical_path) = self.physical_path {
            site.physical_path = physical_path;
        }
        if let Some(auto_start) = self.server_auto_start {
            site.server_auto_start = auto_start;
        }
        if let Some(applications) = self.applications {
            site.applications = applications;
        }
    }
}

/// Check names and store-relative paths of a site definition.
pub fn validate_site(site: &SiteEntry) -> ConfigResult<()> {
    if site.id <= 0 {
        return Err(ConfigError::validation("site id must be positive"));
    }
    if site.name.trim().is_empty() {
        return Err(ConfigError::validation("site name must not be empty"));
    }
    validate_physical_path(&site.physical_path)?;
    for app in &site.applications {
        if normalize_path(&app.path)? == "/" {
            return Err(ConfigError::validation(
                "application path must not be the site root",
            ));
        }
        validate_physical_path(&app.physical_path)?;
    }
    Ok(())
}

fn validate_physical_path(path: &str) -> ConfigResult<()> {
    let normalized = normalize_path(path)?;
    if normalized == "/" {
        return Err(ConfigError::validation(
            "physical_path must name a directory below the store root",
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn site(id: i64, name: &str) -> SiteEntry {
        SiteEntry {
            id,
            name: name.to_string(),
            physical_path: format!("sites/{}", name),
            server_auto_start: false,
            applications: Vec::new(),
        }
    }

    #[test]
    fn test_from_value_defaults() {
        let sites = SitesSection::from_value(&json!({})).unwrap();
        assert!(sites.entries.is_empty());

        let sites = SitesSection::from_value(&json!({
            "entries": [{"id": 4, "name": "a", "physical_path": "sites/a"}]
        }))
        .unwrap();
        assert_eq!(sites.next_id(), 5);
        assert!(!sites.entries[0].server_auto_start);
    }

    #[test]
    fn test_add_rejects_duplicates() {
        let mut sites = SitesSection::default();
        sites.add(site(1, "shop")).unwrap();

        let err = sites.add(site(1, "other")).unwrap_err();
        assert!(matches!(err, ConfigError::AlreadyExists(_)));

        let err = sites.add(site(2, "SHOP")).unwrap_err();
        assert!(matches!(err, ConfigError::AlreadyExists(_)));
    }

    #[test]
    fn test_validate_rejects_root_physical_path() {
        let mut entry = site(1, "shop");
        entry.physical_path = "/".to_string();
        assert!(matches!(
            validate_site(&entry),
            Err(ConfigError::Validation(_))
        ));
    }

    #[test]
    fn test_update_keeps_unset_fields() {
        let mut sites = SitesSection::default();
        sites.add(site(1, "shop")).unwrap();
        sites.add(site(2, "blog")).unwrap();

        let updated = sites
            .update(
                1,
                SiteUpdate {
                    server_auto_start: Some(true),
                    ..Default::default()
                },
            )
            .unwrap();
        assert!(updated.server_auto_start);
        assert_eq!(updated.physical_path, "sites/shop");
        assert_eq!(sites.find(1), Some(&updated));

        let rename = SiteUpdate {
            name: Some("Blog".into()),
            ..Default::default()
        };
        assert!(matches!(
            sites.update(1, rename),
            Err(ConfigError::AlreadyExists(_))
        ));
    }

    #[test]
    fn test_remove_unknown_site() {
        let mut sites = SitesSection::default();
        assert!(matches!(sites.remove(3), Err(ConfigError::NotFound(_))));
    }
}

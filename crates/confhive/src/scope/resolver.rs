//! Scope resolution: (site, path, explicit file) to an ordered level chain.

use tracing::trace;

use super::{Scope, normalize_path};
use crate::error::{ConfigError, ConfigResult};
use crate::sites::SitesSection;
use crate::store::{HOST_FILE, LEVEL_FILE_NAME};

/// Location id of the global level.
pub const HOST_LOCATION: &str = "host";

/// A level before it is materialized for a particular section.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct LevelRef {
    /// Human readable location, e.g. `Default Web Site/app`.
    pub location_id: String,
    /// Store-relative level file.
    pub file: String,
}

/// Resolves scopes against the sites registry.
#[derive(Debug, Clone)]
pub struct ScopeResolver {
    host_file: String,
}

impl Default for ScopeResolver {
    fn default() -> Self {
        Self {
            host_file: HOST_FILE.to_string(),
        }
    }
}

impl ScopeResolver {
    pub fn new(host_file: impl Into<String>) -> Self {
        Self {
            host_file: host_file.into(),
        }
    }

    pub fn host_file(&self) -> &str {
        &self.host_file
    }

    pub fn host_level(&self) -> LevelRef {
        LevelRef {
            location_id: HOST_LOCATION.to_string(),
            file: self.host_file.clone(),
        }
    }

    /// Resolve `scope` to levels ordered from the global level to the most
    /// specific boundary on its path.
    ///
    /// Boundaries are the site root and every application whose path is a
    /// segment prefix of the requested path. A path between boundaries
    /// resolves to its nearest ancestor boundary.
    pub fn resolve(&self, scope: &Scope, sites: &SitesSection) -> ConfigResult<Vec<LevelRef>> {
        if let Some(file) = scope.config_path() {
            if file == self.host_file {
                return Ok(vec![self.host_level()]);
            }
            return Ok(vec![LevelRef {
                location_id: file.to_string(),
                file: file.to_string(),
            }]);
        }

        let Some(site_id) = scope.site_id() else {
            return Ok(vec![self.host_level()]);
        };

        let site = sites
            .find(site_id)
            .ok_or_else(|| ConfigError::not_found(format!("site {}", site_id)))?;

        let mut chain = vec![
            self.host_level(),
            LevelRef {
                location_id: site.name.clone(),
                file: level_file(&site.physical_path),
            },
        ];

        let mut boundaries = Vec::new();
        for app in &site.applications {
            let app_path = normalize_path(&app.path)?;
            if app_path != "/" && is_segment_prefix(&app_path, scope.path()) {
                boundaries.push((app_path, app));
            }
        }
        boundaries.sort_by_key(|(path, _)| path.matches('/').count());

        for (app_path, app) in boundaries {
            chain.push(LevelRef {
                location_id: format!("{}{}", site.name, app_path),
                file: level_file(&app.physical_path),
            });
        }

        trace!(scope = %scope, levels = chain.len(), "Resolved scope");
        Ok(chain)
    }
}

/// Level file inside a store-relative directory.
pub fn level_file(dir: &str) -> String {
    let dir = dir.trim_matches('/');
    if dir.is_empty() {
        LEVEL_FILE_NAME.to_string()
    } else {
        format!("{}/{}", dir, LEVEL_FILE_NAME)
    }
}

fn is_segment_prefix(prefix: &str, path: &str) -> bool {
    path == prefix
        || path
            .strip_prefix(prefix)
            .is_some_and(|rest| rest.starts_with('/'))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sites::{ApplicationEntry, SiteEntry};

    fn registry() -> SitesSection {
        SitesSection {
            entries: vec![SiteEntry {
                id: 1,
                name: "shop".to_string(),
                physical_path: "sites/shop".to_string(),
                server_auto_start: true,
                applications: vec![
                    ApplicationEntry {
                        path: "/api".to_string(),
                        physical_path: "apps/api".to_string(),
                    },
                    ApplicationEntry {
                        path: "/api/v2".to_string(),
                        physical_path: "apps/api-v2".to_string(),
                    },
                    ApplicationEntry {
                        path: "/apiary".to_string(),
                        physical_path: "apps/apiary".to_string(),
                    },
                ],
            }],
        }
    }

    fn files(chain: &[LevelRef]) -> Vec<&str> {
        chain.iter().map(|l| l.file.as_str()).collect()
    }

    #[test]
    fn test_global_scope_is_host_only() {
        let chain = ScopeResolver::default()
            .resolve(&Scope::global(), &registry())
            .unwrap();
        assert_eq!(files(&chain), vec!["host.toml"]);
    }

    #[test]
    fn test_site_root() {
        let chain = ScopeResolver::default()
            .resolve(&Scope::site(1, "/").unwrap(), &registry())
            .unwrap();
        assert_eq!(files(&chain), vec!["host.toml", "sites/shop/web.toml"]);
        assert_eq!(chain[1].location_id, "shop");
    }

    #[test]
    fn test_nested_applications_in_order() {
        let chain = ScopeResolver::default()
            .resolve(&Scope::site(1, "/api/v2/orders").unwrap(), &registry())
            .unwrap();
        assert_eq!(
            files(&chain),
            vec![
                "host.toml",
                "sites/shop/web.toml",
                "apps/api/web.toml",
                "apps/api-v2/web.toml"
            ]
        );
        assert_eq!(chain[3].location_id, "shop/api/v2");
    }

    #[test]
    fn test_unaligned_path_uses_nearest_ancestor() {
        let chain = ScopeResolver::default()
            .resolve(&Scope::site(1, "/api/v1/x").unwrap(), &registry())
            .unwrap();
        assert_eq!(
            files(&chain),
            vec!["host.toml", "sites/shop/web.toml", "apps/api/web.toml"]
        );
    }

    #[test]
    fn test_prefix_must_align_on_segments() {
        let chain = ScopeResolver::default()
            .resolve(&Scope::site(1, "/apiary").unwrap(), &registry())
            .unwrap();
        assert_eq!(
            files(&chain),
            vec!["host.toml", "sites/shop/web.toml", "apps/apiary/web.toml"]
        );
    }

    #[test]
    fn test_unknown_site_is_not_found() {
        let err = ScopeResolver::default()
            .resolve(&Scope::site(9, "/").unwrap(), &registry())
            .unwrap_err();
        assert!(matches!(err, ConfigError::NotFound(_)));
    }

    #[test]
    fn test_explicit_path_bypasses_sites() {
        let chain = ScopeResolver::default()
            .resolve(&Scope::explicit("shared/web.toml").unwrap(), &SitesSection::default())
            .unwrap();
        assert_eq!(files(&chain), vec!["shared/web.toml"]);
    }
}

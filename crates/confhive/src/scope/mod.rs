//! Configuration scopes and the level chains they resolve to.

mod override_mode;
mod resolver;

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{ConfigError, ConfigResult};

pub use override_mode::{effective_mode, parent_effective_mode};
pub use resolver::{HOST_LOCATION, LevelRef, ScopeResolver, level_file};

/// Delegation setting of a section at one level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum OverrideMode {
    Allow,
    Deny,
    #[default]
    Inherit,
}

impl OverrideMode {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "allow" => Some(Self::Allow),
            "deny" => Some(Self::Deny),
            "inherit" => Some(Self::Inherit),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Allow => "allow",
            Self::Deny => "deny",
            Self::Inherit => "inherit",
        }
    }
}

impl fmt::Display for OverrideMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Address of a configuration location.
///
/// `site_id = None` is the global level. An explicit config path bypasses
/// site/path resolution and names one level file directly.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Scope {
    site_id: Option<i64>,
    path: String,
    config_path: Option<String>,
}

impl Scope {
    /// The global (web-server) scope.
    pub fn global() -> Self {
        Self {
            site_id: None,
            path: "/".to_string(),
            config_path: None,
        }
    }

    /// A path inside a site.
    pub fn site(site_id: i64, path: &str) -> ConfigResult<Self> {
        Ok(Self {
            site_id: Some(site_id),
            path: normalize_path(path)?,
            config_path: None,
        })
    }

    /// One level file addressed directly.
    pub fn explicit(config_path: &str) -> ConfigResult<Self> {
        let trimmed = config_path.trim().trim_start_matches('/');
        if trimmed.is_empty() {
            return Err(ConfigError::validation("config_path must not be empty"));
        }
        normalize_path(trimmed)?;
        Ok(Self {
            site_id: None,
            path: "/".to_string(),
            config_path: Some(trimmed.to_string()),
        })
    }

    /// Build a scope from optional request parameters.
    pub fn from_parts(
        site_id: Option<i64>,
        path: Option<&str>,
        config_path: Option<&str>,
    ) -> ConfigResult<Self> {
        match (site_id, config_path) {
            (Some(_), Some(_)) => Err(ConfigError::validation(
                "config_path cannot be combined with site_id",
            )),
            (None, Some(file)) => {
                if path.is_some_and(|p| normalize_path(p).ok().as_deref() != Some("/")) {
                    return Err(ConfigError::validation(
                        "config_path cannot be combined with path",
                    ));
                }
                Self::explicit(file)
            }
            (Some(id), None) => Self::site(id, path.unwrap_or("/")),
            (None, None) => {
                if path.is_some_and(|p| normalize_path(p).ok().as_deref() != Some("/")) {
                    return Err(ConfigError::validation("path requires site_id"));
                }
                Ok(Self::global())
            }
        }
    }

    pub fn site_id(&self) -> Option<i64> {
        self.site_id
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn config_path(&self) -> Option<&str> {
        self.config_path.as_deref()
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.config_path, self.site_id) {
            (Some(file), _) => write!(f, "file:{}", file),
            (None, Some(id)) => write!(f, "site:{}{}", id, self.path),
            (None, None) => f.write_str("global"),
        }
    }
}

/// Normalize a request path to `/a/b` form. Rejects `..` segments.
pub fn normalize_path(path: &str) -> ConfigResult<String> {
    let mut segments = Vec::new();
    for segment in path.split(['/', '\\']) {
        match segment {
            "" | "." => {}
            ".." => {
                return Err(ConfigError::validation(format!(
                    "path must not contain '..': {}",
                    path
                )));
            }
            s => segments.push(s),
        }
    }
    Ok(format!("/{}", segments.join("/")))
}

/// One node of a materialized chain, specific to a single section.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigLevel {
    pub location_id: String,
    pub file: String,
    pub override_mode: OverrideMode,
    pub is_locally_stored: bool,
    pub parent: Option<usize>,
}

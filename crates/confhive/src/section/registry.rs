//! Registered section definitions and their global defaults.

use serde::Serialize;
use serde_json::{Value, json};
use std::collections::BTreeMap;

use crate::error::{ConfigError, ConfigResult};
use crate::sites::SITES_SECTION;
use crate::store::check_representable;

/// Levels at which a section may be stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AllowDefinition {
    /// Only the global level.
    HostOnly,
    /// Any level.
    Everywhere,
}

/// A named, typed group of settings.
#[derive(Debug, Clone, Serialize)]
pub struct SectionDefinition {
    pub name: String,
    pub description: String,
    /// Value in effect when no level stores the section.
    pub default: Value,
    pub allow_definition: AllowDefinition,
}

impl SectionDefinition {
    pub fn new(name: impl Into<String>, description: impl Into<String>, default: Value) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            default,
            allow_definition: AllowDefinition::Everywhere,
        }
    }

    pub fn host_only(mut self) -> Self {
        self.allow_definition = AllowDefinition::HostOnly;
        self
    }

    /// Check that a value can be stored for this section.
    pub fn validate_value(&self, value: &Value) -> ConfigResult<()> {
        if !value.is_object() {
            return Err(ConfigError::validation(format!(
                "section '{}' must be an object",
                self.name
            )));
        }
        check_representable(value).map_err(|e| {
            ConfigError::validation(format!("section '{}': {}", self.name, e))
        })
    }
}

/// Lookup table of known sections.
#[derive(Debug, Clone, Default)]
pub struct SectionRegistry {
    definitions: BTreeMap<String, SectionDefinition>,
}

impl SectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with the sections every server knows about.
    pub fn builtin() -> Self {
        let mut registry = Self::new();
        let definitions = [
            SectionDefinition::new(SITES_SECTION, "Sites and their applications", json!({ "entries": [] }))
                .host_only(),
            SectionDefinition::new(
                "default_document",
                "Files served when a request names a directory",
                json!({ "enabled": true, "files": ["index.html", "index.htm", "default.htm"] }),
            ),
            SectionDefinition::new(
                "directory_browse",
                "Directory listing",
                json!({ "enabled": false, "show_flags": ["date", "time", "size", "extension"] }),
            ),
            SectionDefinition::new(
                "request_filtering",
                "Request limits and blocked file extensions",
                json!({
                    "allow_double_escaping": false,
                    "allow_high_bit_characters": true,
                    "max_allowed_content_length": 30_000_000,
                    "max_url_length": 4096,
                    "max_query_string_length": 2048,
                    "file_extensions": []
                }),
            ),
            SectionDefinition::new(
                "http_response_headers",
                "Custom headers added to every response",
                json!({ "allow_keep_alive": true, "custom_headers": [] }),
            ),
            SectionDefinition::new(
                "anonymous_authentication",
                "Anonymous access",
                json!({ "enabled": true, "user": "" }),
            ),
            SectionDefinition::new(
                "static_content",
                "Static file handling and client caching",
                json!({ "client_cache": { "max_age_secs": 86400, "mode": "no_control" }, "mime_maps": [] }),
            ),
        ];
        for definition in definitions {
            registry
                .definitions
                .insert(definition.name.clone(), definition);
        }
        registry
    }

    /// Register an additional section.
    pub fn register(&mut self, definition: SectionDefinition) -> ConfigResult<()> {
        if self.definitions.contains_key(&definition.name) {
            return Err(ConfigError::already_exists(format!(
                "section '{}'",
                definition.name
            )));
        }
        definition.validate_value(&definition.default)?;
        self.definitions.insert(definition.name.clone(), definition);
        Ok(())
    }

    pub fn get(&self, name: &str) -> ConfigResult<&SectionDefinition> {
        self.definitions
            .get(name)
            .ok_or_else(|| ConfigError::not_found(format!("section '{}'", name)))
    }

    pub fn list(&self) -> impl Iterator<Item = &SectionDefinition> {
        self.definitions.values()
    }
}

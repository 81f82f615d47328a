//! Level file codec: TOML on disk, JSON values in memory.

use serde_json::Value;
use std::collections::BTreeMap;

use super::{StoreError, StoreResult};
use crate::scope::OverrideMode;

const OVERRIDE_MODES_KEY: &str = "override_modes";
const SECTIONS_KEY: &str = "sections";

/// Parsed contents of one level file.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LevelDocument {
    override_modes: BTreeMap<String, OverrideMode>,
    sections: BTreeMap<String, Value>,
}

impl LevelDocument {
    /// Parse a level file. `path` is only used in error messages.
    pub fn parse(path: &str, content: &str) -> StoreResult<Self> {
        let root: toml::Value = content
            .parse::<toml::Table>()
            .map(toml::Value::Table)
            .map_err(|e| StoreError::parse(path, e))?;

        let mut doc = Self::default();

        if let Some(modes) = root.get(OVERRIDE_MODES_KEY) {
            let table = modes
                .as_table()
                .ok_or_else(|| StoreError::parse(path, "override_modes must be a table"))?;
            for (name, mode) in table {
                let mode = mode
                    .as_str()
                    .and_then(OverrideMode::parse)
                    .ok_or_else(|| {
                        StoreError::parse(path, format!("invalid override mode for '{}'", name))
                    })?;
                if mode != OverrideMode::Inherit {
                    doc.override_modes.insert(name.clone(), mode);
                }
            }
        }

        if let Some(sections) = root.get(SECTIONS_KEY) {
            let table = sections
                .as_table()
                .ok_or_else(|| StoreError::parse(path, "sections must be a table"))?;
            for (name, value) in table {
                if !value.is_table() {
                    return Err(StoreError::parse(
                        path,
                        format!("section '{}' must be a table", name),
                    ));
                }
                let json = toml_to_json(value).map_err(|e| StoreError::parse(path, e))?;
                doc.sections.insert(name.clone(), json);
            }
        }

        Ok(doc)
    }

    /// Serialize back to TOML.
    pub fn render(&self, path: &str) -> StoreResult<String> {
        let mut root = toml::Table::new();

        if !self.override_modes.is_empty() {
            let modes: toml::Table = self
                .override_modes
                .iter()
                .map(|(name, mode)| (name.clone(), toml::Value::String(mode.as_str().into())))
                .collect();
            root.insert(OVERRIDE_MODES_KEY.into(), toml::Value::Table(modes));
        }

        if !self.sections.is_empty() {
            let mut sections = toml::Table::new();
            for (name, value) in &self.sections {
                let converted = json_to_toml(value).map_err(|e| StoreError::parse(path, e))?;
                sections.insert(name.clone(), converted);
            }
            root.insert(SECTIONS_KEY.into(), toml::Value::Table(sections));
        }

        toml::to_string_pretty(&root).map_err(|e| StoreError::parse(path, e))
    }

    pub fn section(&self, name: &str) -> Option<&Value> {
        self.sections.get(name)
    }

    pub fn set_section(&mut self, name: &str, value: Value) {
        self.sections.insert(name.to_string(), value);
    }

    pub fn remove_section(&mut self, name: &str) -> Option<Value> {
        self.sections.remove(name)
    }

    /// Mode declared at this level. Absent entries are `Inherit`.
    pub fn override_mode(&self, name: &str) -> OverrideMode {
        self.override_modes
            .get(name)
            .copied()
            .unwrap_or(OverrideMode::Inherit)
    }

    pub fn set_override_mode(&mut self, name: &str, mode: OverrideMode) {
        match mode {
            OverrideMode::Inherit => {
                self.override_modes.remove(name);
            }
            _ => {
                self.override_modes.insert(name.to_string(), mode);
            }
        }
    }
}

/// Convert TOML Value to JSON Value.
fn toml_to_json(toml: &toml::Value) -> Result<Value, String> {
    match toml {
        toml::Value::String(s) => Ok(Value::String(s.clone())),
        toml::Value::Integer(i) => Ok(Value::Number((*i).into())),
        toml::Value::Float(f) => serde_json::Number::from_f64(*f)
            .map(Value::Number)
            .ok_or_else(|| "invalid float value".to_string()),
        toml::Value::Boolean(b) => Ok(Value::Bool(*b)),
        toml::Value::Datetime(dt) => Ok(Value::String(dt.to_string())),
        toml::Value::Array(arr) => {
            let json_arr: Result<Vec<Value>, String> = arr.iter().map(toml_to_json).collect();
            Ok(Value::Array(json_arr?))
        }
        toml::Value::Table(table) => {
            let mut map = serde_json::Map::new();
            for (k, v) in table {
                map.insert(k.clone(), toml_to_json(v)?);
            }
            Ok(Value::Object(map))
        }
    }
}

/// Convert JSON Value to TOML Value. Object members that are `null` are dropped.
fn json_to_toml(json: &Value) -> Result<toml::Value, String> {
    match json {
        Value::Null => Err("null is not representable".to_string()),
        Value::Bool(b) => Ok(toml::Value::Boolean(*b)),
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                Ok(toml::Value::Integer(i))
            } else if let Some(f) = n.as_f64() {
                Ok(toml::Value::Float(f))
            } else {
                Err(format!("number out of range: {}", n))
            }
        }
        Value::String(s) => Ok(toml::Value::String(s.clone())),
        Value::Array(arr) => {
            let toml_arr: Result<Vec<toml::Value>, String> = arr.iter().map(json_to_toml).collect();
            Ok(toml::Value::Array(toml_arr?))
        }
        Value::Object(map) => {
            let mut table = toml::map::Map::new();
            for (k, v) in map {
                if v.is_null() {
                    continue;
                }
                table.insert(k.clone(), json_to_toml(v)?);
            }
            Ok(toml::Value::Table(table))
        }
    }
}

/// Check that a value can be stored in a level file.
pub fn check_representable(value: &Value) -> Result<(), String> {
    json_to_toml(value).map(|_| ())
}

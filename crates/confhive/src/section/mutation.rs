//! Section mutations and ordered, keyed sets of staged mutations.

use serde::Serialize;
use serde_json::Value;

use crate::scope::{LevelRef, OverrideMode, Scope};
use crate::store::LevelDocument;

/// Change to the locally stored value of a section.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum ContentChange {
    /// Store this value locally at the target level.
    Replace(Value),
    /// Delete the local copy so the inherited value applies.
    Revert,
}

/// Everything one request can change about a section at one level.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SectionMutation {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<ContentChange>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub override_mode: Option<OverrideMode>,
}

impl SectionMutation {
    pub fn replace(value: Value) -> Self {
        Self {
            content: Some(ContentChange::Replace(value)),
            override_mode: None,
        }
    }

    pub fn revert() -> Self {
        Self {
            content: Some(ContentChange::Revert),
            override_mode: None,
        }
    }

    pub fn override_mode(mode: OverrideMode) -> Self {
        Self {
            content: None,
            override_mode: Some(mode),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.content.is_none() && self.override_mode.is_none()
    }

    /// Fold a later change into this one. Fields set by `later` win.
    pub fn merged_with(mut self, later: SectionMutation) -> Self {
        if later.content.is_some() {
            self.content = later.content;
        }
        if later.override_mode.is_some() {
            self.override_mode = later.override_mode;
        }
        self
    }

    pub fn apply_to(&self, section: &str, doc: &mut LevelDocument) {
        match &self.content {
            Some(ContentChange::Replace(value)) => doc.set_section(section, value.clone()),
            Some(ContentChange::Revert) => {
                doc.remove_section(section);
            }
            None => {}
        }
        if let Some(mode) = self.override_mode {
            doc.set_override_mode(section, mode);
        }
    }
}

/// A mutation bound to the level it targets.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StagedMutation {
    pub scope: Scope,
    pub location_id: String,
    pub file: String,
    pub section: String,
    pub mutation: SectionMutation,
}

impl StagedMutation {
    pub fn new(scope: Scope, target: &LevelRef, section: &str, mutation: SectionMutation) -> Self {
        Self {
            scope,
            location_id: target.location_id.clone(),
            file: target.file.clone(),
            section: section.to_string(),
            mutation,
        }
    }

    pub fn section_path(&self) -> String {
        format!("{}/{}", self.location_id, self.section)
    }
}

/// Staged mutations keyed by (level file, section), kept in staging order.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct MutationSet {
    entries: Vec<StagedMutation>,
}

impl MutationSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stage a mutation. A later change to an already staged key is merged
    /// into that entry, which keeps its original position so commit applies
    /// keys in the order they were first staged.
    pub fn stage(&mut self, staged: StagedMutation) {
        match self
            .entries
            .iter_mut()
            .find(|e| e.file == staged.file && e.section == staged.section)
        {
            Some(existing) => {
                let earlier = std::mem::take(&mut existing.mutation);
                existing.mutation = earlier.merged_with(staged.mutation);
                existing.scope = staged.scope;
            }
            None => self.entries.push(staged),
        }
    }

    pub fn get(&self, file: &str, section: &str) -> Option<&StagedMutation> {
        self.entries
            .iter()
            .find(|e| e.file == file && e.section == section)
    }

    pub fn contains(&self, file: &str, section: &str) -> bool {
        self.get(file, section).is_some()
    }

    /// Apply every staged mutation for `file` to a live document.
    pub fn overlay(&self, file: &str, doc: &mut LevelDocument) {
        for entry in self.entries.iter().filter(|e| e.file == file) {
            entry.mutation.apply_to(&entry.section, doc);
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &StagedMutation> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn target(file: &str) -> LevelRef {
        LevelRef {
            location_id: file.trim_end_matches("/web.toml").to_string(),
            file: file.to_string(),
        }
    }

    fn staged(file: &str, section: &str, mutation: SectionMutation) -> StagedMutation {
        StagedMutation::new(Scope::global(), &target(file), section, mutation)
    }

    #[test]
    fn test_restaged_key_keeps_first_position() {
        let mut set = MutationSet::new();
        set.stage(staged("a/web.toml", "x", SectionMutation::replace(json!({"v": 1}))));
        set.stage(staged("b/web.toml", "x", SectionMutation::replace(json!({"v": 2}))));
        set.stage(staged("a/web.toml", "x", SectionMutation::replace(json!({"v": 3}))));

        assert_eq!(set.len(), 2);
        let order: Vec<_> = set.iter().map(|e| e.file.as_str()).collect();
        assert_eq!(order, vec!["a/web.toml", "b/web.toml"]);
        assert_eq!(
            set.get("a/web.toml", "x").unwrap().mutation,
            SectionMutation::replace(json!({"v": 3}))
        );
    }

    #[test]
    fn test_merge_keeps_unrelated_fields() {
        let first = SectionMutation::override_mode(OverrideMode::Deny);
        let merged = first.merged_with(SectionMutation::replace(json!({"a": true})));
        assert_eq!(merged.override_mode, Some(OverrideMode::Deny));
        assert_eq!(
            merged.content,
            Some(ContentChange::Replace(json!({"a": true})))
        );
    }

    #[test]
    fn test_restaging_merges_fields() {
        let mut set = MutationSet::new();
        set.stage(staged("a/web.toml", "x", SectionMutation::replace(json!({"v": 1}))));
        set.stage(staged("a/web.toml", "x", SectionMutation::override_mode(OverrideMode::Deny)));

        let mutation = &set.get("a/web.toml", "x").unwrap().mutation;
        assert_eq!(mutation.content, Some(ContentChange::Replace(json!({"v": 1}))));
        assert_eq!(mutation.override_mode, Some(OverrideMode::Deny));
    }

    #[test]
    fn test_overlay_only_touches_its_file() {
        let mut set = MutationSet::new();
        set.stage(staged("a/web.toml", "x", SectionMutation::replace(json!({"v": 1}))));
        set.stage(staged("a/web.toml", "y", SectionMutation::revert()));

        let mut doc = LevelDocument::default();
        doc.set_section("y", json!({"old": true}));
        set.overlay("a/web.toml", &mut doc);
        assert_eq!(doc.section("x"), Some(&json!({"v": 1})));
        assert!(doc.section("y").is_none());

        let mut other = LevelDocument::default();
        set.overlay("b/web.toml", &mut other);
        assert_eq!(other, LevelDocument::default());
    }
}

//! Reads and writes of a named section at a resolved scope.

use std::sync::Arc;

use tracing::{debug, instrument};

use super::{
    AllowDefinition, ContentChange, MutationSet, Section, SectionMutation, SectionRegistry,
    StagedMutation,
};
use crate::error::{ConfigError, ConfigResult};
use crate::scope::{
    ConfigLevel, LevelRef, OverrideMode, Scope, ScopeResolver, effective_mode,
    parent_effective_mode,
};
use crate::sites::{SITES_SECTION, SitesSection};
use crate::store::{ConfigStore, LevelDocument, load_document};
use crate::transaction::WriteJournal;

/// Chain of one scope, loaded and materialized for one section.
struct Materialized {
    chain: Vec<LevelRef>,
    docs: Vec<LevelDocument>,
    levels: Vec<ConfigLevel>,
}

impl Materialized {
    fn target_index(&self) -> usize {
        self.levels.len().saturating_sub(1)
    }

    fn target(&self) -> &LevelRef {
        &self.chain[self.target_index()]
    }
}

/// Section reads and writes with delegation enforcement.
///
/// Every read takes an optional overlay of staged mutations which is
/// applied on top of the live files; `None` means the live store only.
pub struct SectionAccessor {
    store: Arc<dyn ConfigStore>,
    registry: Arc<SectionRegistry>,
    resolver: ScopeResolver,
}

impl SectionAccessor {
    pub fn new(
        store: Arc<dyn ConfigStore>,
        registry: Arc<SectionRegistry>,
        resolver: ScopeResolver,
    ) -> Self {
        Self {
            store,
            registry,
            resolver,
        }
    }

    pub fn store(&self) -> &dyn ConfigStore {
        self.store.as_ref()
    }

    pub fn registry(&self) -> &SectionRegistry {
        &self.registry
    }

    pub fn resolver(&self) -> &ScopeResolver {
        &self.resolver
    }

    async fn load(&self, file: &str, overlay: Option<&MutationSet>) -> ConfigResult<LevelDocument> {
        let mut doc = load_document(self.store.as_ref(), file)
            .await
            .map_err(|e| ConfigError::from_store(e, file))?;
        if let Some(overlay) = overlay {
            overlay.overlay(file, &mut doc);
        }
        Ok(doc)
    }

    /// Sites registry as seen through `overlay`.
    pub async fn sites(&self, overlay: Option<&MutationSet>) -> ConfigResult<SitesSection> {
        let doc = self.load(self.resolver.host_file(), overlay).await?;
        match doc.section(SITES_SECTION) {
            Some(value) => SitesSection::from_value(value),
            None => Ok(SitesSection::default()),
        }
    }

    pub async fn resolve(
        &self,
        scope: &Scope,
        overlay: Option<&MutationSet>,
    ) -> ConfigResult<Vec<LevelRef>> {
        let sites = self.sites(overlay).await?;
        self.resolver.resolve(scope, &sites)
    }

    async fn materialize(
        &self,
        scope: &Scope,
        name: &str,
        overlay: Option<&MutationSet>,
    ) -> ConfigResult<Materialized> {
        let chain = self.resolve(scope, overlay).await?;
        let mut docs = Vec::with_capacity(chain.len());
        for level in &chain {
            docs.push(self.load(&level.file, overlay).await?);
        }

        let levels = chain
            .iter()
            .zip(&docs)
            .enumerate()
            .map(|(i, (level, doc))| ConfigLevel {
                location_id: level.location_id.clone(),
                file: level.file.clone(),
                override_mode: doc.override_mode(name),
                is_locally_stored: doc.section(name).is_some(),
                parent: i.checked_sub(1),
            })
            .collect();

        Ok(Materialized {
            chain,
            docs,
            levels,
        })
    }

    /// Resolve `name` at `scope`: nearest locally stored copy walking from the
    /// most specific level upward, else the registered default.
    #[instrument(skip(self, scope, overlay), fields(scope = %scope))]
    pub async fn get_section(
        &self,
        scope: &Scope,
        name: &str,
        overlay: Option<&MutationSet>,
    ) -> ConfigResult<Section> {
        let definition = self.registry.get(name)?;
        let m = self.materialize(scope, name, overlay).await?;
        let target = m.target_index();

        let owner = (0..m.levels.len())
            .rev()
            .find(|&i| m.levels[i].is_locally_stored);
        let (value, owning_location) = match owner {
            Some(i) => (
                m.docs[i].section(name).cloned().unwrap_or_default(),
                Some(m.levels[i].location_id.clone()),
            ),
            None => (definition.default.clone(), None),
        };

        let dirty = overlay.is_some_and(|o| m.chain.iter().any(|l| o.contains(&l.file, name)));

        Ok(Section {
            name: name.to_string(),
            scope: scope.clone(),
            location: m.target().location_id.clone(),
            owning_location,
            value,
            is_locally_stored: owner == Some(target),
            override_mode: m.levels[target].override_mode,
            override_mode_effective: effective_mode(&m.levels, target),
            dirty,
        })
    }

    /// Validate a mutation against the current chain and return the level it
    /// targets. Called before staging and again right before applying.
    pub async fn check_write(
        &self,
        scope: &Scope,
        name: &str,
        mutation: &SectionMutation,
        overlay: Option<&MutationSet>,
    ) -> ConfigResult<LevelRef> {
        let definition = self.registry.get(name)?;
        if mutation.is_empty() {
            return Err(ConfigError::validation("mutation changes nothing"));
        }
        if let Some(ContentChange::Replace(value)) = &mutation.content {
            definition.validate_value(value)?;
        }

        let m = self.materialize(scope, name, overlay).await?;
        let target = m.target_index();
        let level = m.target().clone();
        let section_path = format!("{}/{}", level.location_id, name);

        if definition.allow_definition == AllowDefinition::HostOnly
            && level.file != self.resolver.host_file()
        {
            return Err(ConfigError::validation(format!(
                "section '{}' can only be set at the global level",
                name
            )));
        }

        if mutation.content.is_some() && effective_mode(&m.levels, target) == OverrideMode::Deny {
            return Err(ConfigError::locked(
                section_path,
                "override mode is deny at or above this level",
            ));
        }
        if mutation.override_mode.is_some()
            && parent_effective_mode(&m.levels, target) == OverrideMode::Deny
        {
            return Err(ConfigError::locked(
                section_path,
                "override mode is deny above this level",
            ));
        }

        Ok(level)
    }

    /// Write one mutation straight to the live store.
    #[instrument(skip(self, scope, mutation), fields(scope = %scope))]
    pub async fn set_section(
        &self,
        scope: &Scope,
        name: &str,
        mutation: SectionMutation,
    ) -> ConfigResult<()> {
        let target = self.check_write(scope, name, &mutation, None).await?;
        let staged = StagedMutation::new(scope.clone(), &target, name, mutation);
        let mut journal = WriteJournal::new();
        if let Err(e) = self.apply_in_journal(&staged, &mut journal).await {
            journal.rollback(self.store.as_ref()).await;
            return Err(e);
        }
        Ok(())
    }

    /// Drop the local copy at `scope` so the inherited value applies.
    /// Returns false when there was nothing to revert.
    pub async fn revert_to_parent(&self, scope: &Scope, name: &str) -> ConfigResult<bool> {
        let current = self.get_section(scope, name, None).await?;
        if !current.is_locally_stored {
            return Ok(false);
        }
        self.set_section(scope, name, SectionMutation::revert())
            .await?;
        Ok(true)
    }

    /// Re-validate against the live store, lease the target file and apply.
    pub(crate) async fn apply_in_journal(
        &self,
        staged: &StagedMutation,
        journal: &mut WriteJournal,
    ) -> ConfigResult<()> {
        let section_path = staged.section_path();
        let target = self
            .check_write(&staged.scope, &staged.section, &staged.mutation, None)
            .await?;
        if target.file != staged.file {
            return Err(ConfigError::ScopeNotFound(format!(
                "{} no longer resolves to {}",
                staged.scope, staged.file
            )));
        }

        let lease = journal
            .lease(self.store.as_ref(), &target.file)
            .await
            .map_err(|e| ConfigError::from_store(e, &section_path))?;

        let mut doc = self.load(&target.file, None).await?;
        staged.mutation.apply_to(&staged.section, &mut doc);
        let content = doc
            .render(&target.file)
            .map_err(|e| ConfigError::from_store(e, &section_path))?;
        self.store
            .write(lease, &content)
            .await
            .map_err(|e| ConfigError::from_store(e, &section_path))?;

        debug!(section = %section_path, "Applied section mutation");
        Ok(())
    }
}

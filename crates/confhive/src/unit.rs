//! Per-request unit of work.
//!
//! A unit either batches its own edits and flushes them when the request
//! ends (Default), or forwards every read and write to a named transaction
//! (Transactional), in which case its own `commit` does nothing.

use serde_json::Value;
use tracing::{debug, instrument};

use crate::error::{ConfigError, ConfigResult};
use crate::scope::{OverrideMode, Scope};
use crate::section::{MutationSet, Section, SectionMutation, StagedMutation};
use crate::service::ConfigService;
use crate::sites::{NewSite, SITES_SECTION, SiteEntry, SiteUpdate, SitesSection};

/// Where a unit's edits go.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UnitContext {
    /// Edits are kept in the unit and flushed by `commit`.
    Default,
    /// Edits are staged in the named transaction.
    Transactional(String),
}

pub struct ManagementUnit {
    service: ConfigService,
    context: UnitContext,
    pending: MutationSet,
}

impl ManagementUnit {
    pub fn new(service: ConfigService, transaction_id: Option<String>) -> Self {
        let context = match transaction_id {
            Some(id) => UnitContext::Transactional(id),
            None => UnitContext::Default,
        };
        Self {
            service,
            context,
            pending: MutationSet::new(),
        }
    }

    pub fn transaction_id(&self) -> Option<&str> {
        match &self.context {
            UnitContext::Transactional(id) => Some(id),
            UnitContext::Default => None,
        }
    }

    /// Edits not yet flushed by a Default unit.
    pub fn pending(&self) -> &MutationSet {
        &self.pending
    }

    /// Staged edits this unit reads through.
    async fn overlay(&self) -> ConfigResult<Option<MutationSet>> {
        match &self.context {
            UnitContext::Default if self.pending.is_empty() => Ok(None),
            UnitContext::Default => Ok(Some(self.pending.clone())),
            UnitContext::Transactional(id) => {
                self.service.transactions().snapshot(id).await.map(Some)
            }
        }
    }

    pub async fn get_section(&self, scope: &Scope, name: &str) -> ConfigResult<Section> {
        let overlay = self.overlay().await?;
        self.service
            .accessor()
            .get_section(scope, name, overlay.as_ref())
            .await
    }

    /// Validate `change` for `scope` and bind it to its target level. Fails
    /// with `Locked` when another transaction has claimed that key.
    #[instrument(skip(self, scope, change), fields(scope = %scope))]
    async fn prepare(
        &self,
        scope: &Scope,
        name: &str,
        change: SectionMutation,
    ) -> ConfigResult<StagedMutation> {
        let overlay = self.overlay().await?;
        let target = self
            .service
            .accessor()
            .check_write(scope, name, &change, overlay.as_ref())
            .await?;

        let staged = StagedMutation::new(scope.clone(), &target, name, change);
        self.service
            .transactions()
            .claims()
            .check(&staged, self.transaction_id())?;
        Ok(staged)
    }

    /// Merge `staged` into this unit's edits or its transaction.
    async fn push(&mut self, staged: StagedMutation) -> ConfigResult<()> {
        match &self.context {
            UnitContext::Default => self.pending.stage(staged),
            UnitContext::Transactional(id) => {
                self.service.transactions().stage(id, staged).await?;
            }
        }
        Ok(())
    }

    async fn stage(&mut self, scope: &Scope, name: &str, change: SectionMutation) -> ConfigResult<()> {
        let staged = self.prepare(scope, name, change).await?;
        self.push(staged).await
    }

    pub async fn set_section(&mut self, scope: &Scope, name: &str, value: Value) -> ConfigResult<()> {
        self.stage(scope, name, SectionMutation::replace(value)).await
    }

    pub async fn set_override_mode(
        &mut self,
        scope: &Scope,
        name: &str,
        mode: OverrideMode,
    ) -> ConfigResult<()> {
        self.stage(scope, name, SectionMutation::override_mode(mode))
            .await
    }

    /// Apply a combined content and override-mode change as one staged entry.
    pub async fn apply(
        &mut self,
        scope: &Scope,
        name: &str,
        mutation: SectionMutation,
    ) -> ConfigResult<()> {
        self.stage(scope, name, mutation).await
    }

    /// Drop the local copy at `scope`. Returns false, staging nothing, when
    /// the section is only inherited there.
    pub async fn revert_to_parent(&mut self, scope: &Scope, name: &str) -> ConfigResult<bool> {
        let current = self.get_section(scope, name).await?;
        if !current.is_locally_stored {
            return Ok(false);
        }
        self.stage(scope, name, SectionMutation::revert()).await?;
        Ok(true)
    }

    /// End of request. Default units flush their edits all or nothing;
    /// transactional units leave the real commit to the transaction.
    pub async fn commit(&mut self) -> ConfigResult<()> {
        if let UnitContext::Transactional(id) = &self.context {
            debug!(transaction = %id, "Unit commit deferred to transaction");
            return Ok(());
        }
        if self.pending.is_empty() {
            return Ok(());
        }

        self.service
            .coordinator()
            .apply(&self.pending, None)
            .await?;
        self.pending.clear();
        Ok(())
    }

    pub async fn sites(&self) -> ConfigResult<SitesSection> {
        let overlay = self.overlay().await?;
        self.service.accessor().sites(overlay.as_ref()).await
    }

    pub async fn get_site(&self, id: i64) -> ConfigResult<SiteEntry> {
        self.sites()
            .await?
            .find(id)
            .cloned()
            .ok_or_else(|| ConfigError::not_found(format!("site {}", id)))
    }

    /// Register a site and create its directories. Directory creation is
    /// immediate even inside a transaction; an aborted site leaves empty
    /// directories behind. Nothing is created when the registry cannot be
    /// written.
    pub async fn create_site(&mut self, new_site: NewSite) -> ConfigResult<SiteEntry> {
        let mut sites = self.sites().await?;
        let id = new_site.id.unwrap_or_else(|| sites.next_id());
        let site = new_site.into_entry(id);
        sites.add(site.clone())?;
        let staged = self
            .prepare(&Scope::global(), SITES_SECTION, SectionMutation::replace(sites.to_value()))
            .await?;

        let store = self.service.accessor().store();
        for dir in std::iter::once(&site.physical_path)
            .chain(site.applications.iter().map(|a| &a.physical_path))
        {
            store
                .create_dir(dir)
                .await
                .map_err(|e| ConfigError::from_store(e, dir))?;
        }

        self.push(staged).await?;
        Ok(site)
    }

    pub async fn update_site(&mut self, id: i64, update: SiteUpdate) -> ConfigResult<SiteEntry> {
        let mut sites = self.sites().await?;
        let site = sites.update(id, update)?;
        self.put_sites(&sites).await?;
        Ok(site)
    }

    pub async fn delete_site(&mut self, id: i64) -> ConfigResult<SiteEntry> {
        let mut sites = self.sites().await?;
        let site = sites.remove(id)?;
        self.put_sites(&sites).await?;
        Ok(site)
    }

    async fn put_sites(&mut self, sites: &SitesSection) -> ConfigResult<()> {
        self.set_section(&Scope::global(), SITES_SECTION, sites.to_value())
            .await
    }
}

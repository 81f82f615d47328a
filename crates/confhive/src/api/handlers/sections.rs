//! Section handlers.

use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tracing::instrument;

use crate::api::error::{ApiError, ApiResult};
use crate::api::extract::Unit;
use crate::api::state::AppState;
use crate::error::ConfigResult;
use crate::scope::{OverrideMode, Scope};
use crate::section::{ContentChange, Section, SectionMutation};

/// Scope parameters shared by the section routes.
#[derive(Debug, Default, Deserialize)]
pub struct ScopeQuery {
    pub site_id: Option<i64>,
    pub path: Option<String>,
    pub config_path: Option<String>,
}

impl ScopeQuery {
    pub fn scope(&self) -> ConfigResult<Scope> {
        Scope::from_parts(
            self.site_id,
            self.path.as_deref(),
            self.config_path.as_deref(),
        )
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SectionMetadata {
    pub override_mode: OverrideMode,
    pub override_mode_effective: OverrideMode,
    pub is_local: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub owning_location: Option<String>,
    pub dirty: bool,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SectionResponse {
    pub name: String,
    pub location: String,
    pub value: Value,
    pub metadata: SectionMetadata,
}

impl From<Section> for SectionResponse {
    fn from(section: Section) -> Self {
        Self {
            name: section.name,
            location: section.location,
            value: section.value,
            metadata: SectionMetadata {
                override_mode: section.override_mode,
                override_mode_effective: section.override_mode_effective,
                is_local: section.is_locally_stored,
                owning_location: section.owning_location,
                dirty: section.dirty,
            },
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct MetadataPatch {
    pub override_mode: Option<OverrideMode>,
}

/// PATCH body: a new local value, a new override mode, or both.
#[derive(Debug, Default, Deserialize)]
pub struct SectionPatch {
    pub value: Option<Value>,
    pub metadata: Option<MetadataPatch>,
}

impl SectionPatch {
    fn into_mutation(self) -> ApiResult<SectionMutation> {
        let mutation = SectionMutation {
            content: self.value.map(ContentChange::Replace),
            override_mode: self.metadata.and_then(|m| m.override_mode),
        };
        if mutation.is_empty() {
            return Err(ApiError::bad_request(
                "expected 'value' or 'metadata.override_mode'",
            ));
        }
        Ok(mutation)
    }
}

/// List registered section definitions.
pub async fn list_sections(State(state): State<AppState>) -> Json<Value> {
    let sections: Vec<_> = state.config.accessor().registry().list().collect();
    Json(json!({ "sections": sections }))
}

/// Get a section at a scope.
#[instrument(skip(unit))]
pub async fn get_section(
    Unit(unit): Unit,
    Path(name): Path<String>,
    Query(query): Query<ScopeQuery>,
) -> ApiResult<Json<SectionResponse>> {
    let scope = query.scope()?;
    let section = unit.get_section(&scope, &name).await?;
    Ok(Json(section.into()))
}

/// Change a section's local value and/or override mode at a scope.
#[instrument(skip(unit, patch))]
pub async fn patch_section(
    Unit(mut unit): Unit,
    Path(name): Path<String>,
    Query(query): Query<ScopeQuery>,
    Json(patch): Json<SectionPatch>,
) -> ApiResult<Json<SectionResponse>> {
    let scope = query.scope()?;
    let mutation = patch.into_mutation()?;
    unit.apply(&scope, &name, mutation).await?;
    unit.commit().await?;

    let section = unit.get_section(&scope, &name).await?;
    Ok(Json(section.into()))
}

/// Revert a section to its inherited value at a scope.
#[instrument(skip(unit))]
pub async fn delete_section(
    Unit(mut unit): Unit,
    Path(name): Path<String>,
    Query(query): Query<ScopeQuery>,
) -> ApiResult<StatusCode> {
    let scope = query.scope()?;
    unit.revert_to_parent(&scope, &name).await?;
    unit.commit().await?;
    Ok(StatusCode::NO_CONTENT)
}

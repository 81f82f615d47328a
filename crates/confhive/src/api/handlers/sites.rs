//! Site handlers.

use axum::{
    Json,
    extract::Path,
    http::StatusCode,
};
use serde_json::{Value, json};
use tracing::{info, instrument};

use crate::api::error::ApiResult;
use crate::api::extract::Unit;
use crate::sites::{NewSite, SiteEntry, SiteUpdate};

pub async fn list_sites(Unit(unit): Unit) -> ApiResult<Json<Value>> {
    let sites = unit.sites().await?;
    Ok(Json(json!({ "sites": sites.entries })))
}

pub async fn get_site(Unit(unit): Unit, Path(id): Path<i64>) -> ApiResult<Json<SiteEntry>> {
    Ok(Json(unit.get_site(id).await?))
}

/// Create a site and its directories.
#[instrument(skip(unit, request), fields(name = %request.name))]
pub async fn create_site(
    Unit(mut unit): Unit,
    Json(request): Json<NewSite>,
) -> ApiResult<(StatusCode, Json<SiteEntry>)> {
    let site = unit.create_site(request).await?;
    unit.commit().await?;
    info!(site_id = site.id, "Created site");
    Ok((StatusCode::CREATED, Json(site)))
}

#[instrument(skip(unit, update))]
pub async fn patch_site(
    Unit(mut unit): Unit,
    Path(id): Path<i64>,
    Json(update): Json<SiteUpdate>,
) -> ApiResult<Json<SiteEntry>> {
    let site = unit.update_site(id, update).await?;
    unit.commit().await?;
    Ok(Json(site))
}

#[instrument(skip(unit))]
pub async fn delete_site(Unit(mut unit): Unit, Path(id): Path<i64>) -> ApiResult<StatusCode> {
    unit.delete_site(id).await?;
    unit.commit().await?;
    info!(site_id = id, "Deleted site");
    Ok(StatusCode::NO_CONTENT)
}

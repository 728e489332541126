//! Asset CRUD plus the impact engine's two read endpoints.
//!
//! POST   /assets
//! GET    /assets
//! GET    /assets/:id
//! PATCH  /assets/:id
//! DELETE /assets/:id
//! POST   /assets/:id/impact?depth=
//! GET    /assets/:id/lineage

use std::sync::Arc;

use axum::extract::{Path, Query};
use axum::{Extension, Json};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use tessera_core::error::TesseraError;
use tessera_core::impact::{downstream_assets, MAX_LINEAGE_RESULTS};
use tessera_core::ports::{AssetUpdate, Stores};
use tessera_core::principal::Principal;
use tessera_core::service::CoreService;
use tessera_core::types::{ApiKeyScope, Asset};

use crate::error::AppError;
use crate::middleware::RequestId;

const DEFAULT_LINEAGE_DEPTH: u32 = 3;
const MAX_LINEAGE_DEPTH: u32 = 10;

#[derive(Debug, Deserialize)]
pub struct CreateAssetRequest {
    pub fqn: String,
    pub environment: String,
    pub resource_type: String,
    #[serde(default)]
    pub metadata: Value,
}

#[derive(Debug, Deserialize)]
pub struct UpdateAssetRequest {
    pub fqn: Option<String>,
    pub owner_team_id: Option<Uuid>,
    pub metadata: Option<Value>,
}

#[derive(Debug, Deserialize)]
pub struct ListAssetsQuery {
    pub owner: Option<Uuid>,
    #[serde(default = "default_limit")]
    pub limit: i64,
    #[serde(default)]
    pub offset: i64,
}

fn default_limit() -> i64 {
    100
}

#[derive(Debug, Deserialize)]
pub struct ImpactQuery {
    pub depth: Option<u32>,
}

#[derive(Debug, Serialize)]
pub struct LineageResponse {
    pub asset_id: Uuid,
    pub upstream: Vec<Value>,
    pub downstream: Vec<tessera_core::impact::DownstreamAsset>,
    pub truncated: bool,
}

pub async fn create(
    Extension(principal): Extension<Principal>,
    Extension(service): Extension<Arc<dyn CoreService>>,
    Extension(RequestId(rid)): Extension<RequestId>,
    Json(body): Json<CreateAssetRequest>,
) -> Result<Json<Asset>, AppError> {
    let asset = service
        .create_asset(&principal, &body.fqn, &body.environment, &body.resource_type, body.metadata)
        .await
        .map_err(|e| AppError::new(e, rid))?;
    Ok(Json(asset))
}

pub async fn list(
    Extension(service): Extension<Arc<dyn CoreService>>,
    Extension(RequestId(rid)): Extension<RequestId>,
    Query(query): Query<ListAssetsQuery>,
) -> Result<Json<Vec<Asset>>, AppError> {
    let assets = service
        .list_assets(query.owner, query.limit, query.offset)
        .await
        .map_err(|e| AppError::new(e, rid))?;
    Ok(Json(assets))
}

pub async fn get(
    Extension(service): Extension<Arc<dyn CoreService>>,
    Extension(RequestId(rid)): Extension<RequestId>,
    Path(id): Path<Uuid>,
) -> Result<Json<Asset>, AppError> {
    let asset = service.get_asset(id).await.map_err(|e| AppError::new(e, rid))?;
    Ok(Json(asset))
}

pub async fn update(
    Extension(principal): Extension<Principal>,
    Extension(stores): Extension<Arc<Stores>>,
    Extension(RequestId(rid)): Extension<RequestId>,
    Path(id): Path<Uuid>,
    Json(body): Json<UpdateAssetRequest>,
) -> Result<Json<Asset>, AppError> {
    let existing = stores
        .assets
        .get(id)
        .await
        .map_err(|e| AppError::new(e, rid))?
        .ok_or_else(|| AppError::new(TesseraError::not_found("asset", id.to_string()), rid))?;
    principal.require_scope(ApiKeyScope::Write).map_err(|e| AppError::new(e, rid))?;
    principal.owns_or_admin(existing.owner_team_id).map_err(|e| AppError::new(e, rid))?;

    let updated = stores
        .assets
        .update(
            id,
            AssetUpdate {
                fqn: body.fqn,
                owner_team_id: body.owner_team_id,
                metadata: body.metadata,
            },
        )
        .await
        .map_err(|e| AppError::new(e, rid))?
        .ok_or_else(|| AppError::new(TesseraError::not_found("asset", id.to_string()), rid))?;
    Ok(Json(updated))
}

pub async fn delete(
    Extension(principal): Extension<Principal>,
    Extension(service): Extension<Arc<dyn CoreService>>,
    Extension(RequestId(rid)): Extension<RequestId>,
    Path(id): Path<Uuid>,
) -> Result<axum::http::StatusCode, AppError> {
    service.delete_asset(&principal, id).await.map_err(|e| AppError::new(e, rid))?;
    Ok(axum::http::StatusCode::NO_CONTENT)
}

pub async fn impact(
    Extension(principal): Extension<Principal>,
    Extension(service): Extension<Arc<dyn CoreService>>,
    Extension(RequestId(rid)): Extension<RequestId>,
    Path(id): Path<Uuid>,
    Query(query): Query<ImpactQuery>,
    Json(proposed_schema): Json<Value>,
) -> Result<Json<tessera_core::impact::ImpactReport>, AppError> {
    let depth = query.depth.unwrap_or(DEFAULT_LINEAGE_DEPTH).min(MAX_LINEAGE_DEPTH);
    let report = service
        .analyze_impact(&principal, id, &proposed_schema, depth)
        .await
        .map_err(|e| AppError::new(e, rid))?;
    Ok(Json(report))
}

pub async fn lineage(
    Extension(stores): Extension<Arc<Stores>>,
    Extension(RequestId(rid)): Extension<RequestId>,
    Path(id): Path<Uuid>,
) -> Result<Json<LineageResponse>, AppError> {
    stores
        .assets
        .get(id)
        .await
        .map_err(|e| AppError::new(e, rid))?
        .ok_or_else(|| AppError::new(TesseraError::not_found("asset", id.to_string()), rid))?;

    let (downstream, truncated) = downstream_assets(
        stores.dependencies.as_ref(),
        id,
        DEFAULT_LINEAGE_DEPTH,
        MAX_LINEAGE_RESULTS,
    )
    .await
    .map_err(|e| AppError::new(e, rid))?;

    Ok(Json(LineageResponse {
        asset_id: id,
        upstream: Vec::new(),
        downstream,
        truncated,
    }))
}

//! Team CRUD.
//!
//! POST   /teams
//! GET    /teams
//! GET    /teams/:id
//! PATCH  /teams/:id
//! DELETE /teams/:id

use std::sync::Arc;

use axum::extract::Path;
use axum::{Extension, Json};
use serde::Deserialize;
use serde_json::Value;
use uuid::Uuid;

use tessera_core::error::TesseraError;
use tessera_core::ports::TeamUpdate;
use tessera_core::principal::Principal;
use tessera_core::service::CoreService;
use tessera_core::types::Team;

use crate::error::AppError;
use crate::middleware::RequestId;

#[derive(Debug, Deserialize)]
pub struct CreateTeamRequest {
    pub name: String,
    #[serde(default)]
    pub metadata: Value,
}

#[derive(Debug, Deserialize)]
pub struct UpdateTeamRequest {
    pub name: Option<String>,
    pub metadata: Option<Value>,
}

pub async fn create(
    Extension(principal): Extension<Principal>,
    Extension(service): Extension<Arc<dyn CoreService>>,
    Extension(RequestId(rid)): Extension<RequestId>,
    Json(body): Json<CreateTeamRequest>,
) -> Result<Json<Team>, AppError> {
    let team = service
        .create_team(&principal, &body.name, body.metadata)
        .await
        .map_err(|e| AppError::new(e, rid))?;
    Ok(Json(team))
}

pub async fn list(
    Extension(service): Extension<Arc<dyn CoreService>>,
    Extension(RequestId(rid)): Extension<RequestId>,
) -> Result<Json<Vec<Team>>, AppError> {
    let teams = service.list_teams().await.map_err(|e| AppError::new(e, rid))?;
    Ok(Json(teams))
}

pub async fn get(
    Extension(service): Extension<Arc<dyn CoreService>>,
    Extension(RequestId(rid)): Extension<RequestId>,
    Path(id): Path<Uuid>,
) -> Result<Json<Team>, AppError> {
    let team = service.get_team(id).await.map_err(|e| AppError::new(e, rid))?;
    Ok(Json(team))
}

pub async fn update(
    Extension(principal): Extension<Principal>,
    Extension(stores): Extension<Arc<tessera_core::ports::Stores>>,
    Extension(RequestId(rid)): Extension<RequestId>,
    Path(id): Path<Uuid>,
    Json(body): Json<UpdateTeamRequest>,
) -> Result<Json<Team>, AppError> {
    let existing = stores
        .teams
        .get(id)
        .await
        .map_err(|e| AppError::new(e, rid))?
        .ok_or_else(|| AppError::new(TesseraError::not_found("team", id.to_string()), rid))?;
    principal
        .require_scope(tessera_core::types::ApiKeyScope::Write)
        .map_err(|e| AppError::new(e, rid))?;
    principal.owns_or_admin(existing.id).map_err(|e| AppError::new(e, rid))?;

    let updated = stores
        .teams
        .update(
            id,
            TeamUpdate {
                name: body.name,
                metadata: body.metadata,
            },
        )
        .await
        .map_err(|e| AppError::new(e, rid))?
        .ok_or_else(|| AppError::new(TesseraError::not_found("team", id.to_string()), rid))?;
    Ok(Json(updated))
}

pub async fn delete(
    Extension(principal): Extension<Principal>,
    Extension(stores): Extension<Arc<tessera_core::ports::Stores>>,
    Extension(RequestId(rid)): Extension<RequestId>,
    Path(id): Path<Uuid>,
) -> Result<axum::http::StatusCode, AppError> {
    principal
        .require_scope(tessera_core::types::ApiKeyScope::Admin)
        .map_err(|e| AppError::new(e, rid))?;
    let deleted = stores.teams.soft_delete(id).await.map_err(|e| AppError::new(e, rid))?;
    if !deleted {
        return Err(AppError::new(TesseraError::not_found("team", id.to_string()), rid));
    }
    Ok(axum::http::StatusCode::NO_CONTENT)
}

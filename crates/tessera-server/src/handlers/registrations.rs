//! Registration CRUD.
//!
//! POST   /registrations
//! GET    /registrations/:id
//! PATCH  /registrations/:id
//! DELETE /registrations/:id

use std::sync::Arc;

use axum::extract::Path;
use axum::{Extension, Json};
use serde::Deserialize;
use uuid::Uuid;

use tessera_core::error::TesseraError;
use tessera_core::ports::{RegistrationUpdate, Stores};
use tessera_core::service::CoreService;
use tessera_core::types::{Registration, RegistrationStatus};

use crate::error::AppError;
use crate::middleware::RequestId;

#[derive(Debug, Deserialize)]
pub struct CreateRegistrationRequest {
    pub contract_id: Uuid,
    pub consumer_team_id: Uuid,
    pub pinned_version: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateRegistrationRequest {
    pub pinned_version: Option<String>,
    pub status: Option<RegistrationStatus>,
}

pub async fn create(
    Extension(service): Extension<Arc<dyn CoreService>>,
    Extension(RequestId(rid)): Extension<RequestId>,
    Json(body): Json<CreateRegistrationRequest>,
) -> Result<Json<Registration>, AppError> {
    let registration = service
        .create_registration(body.contract_id, body.consumer_team_id, body.pinned_version)
        .await
        .map_err(|e| AppError::new(e, rid))?;
    Ok(Json(registration))
}

pub async fn get(
    Extension(stores): Extension<Arc<Stores>>,
    Extension(RequestId(rid)): Extension<RequestId>,
    Path(id): Path<Uuid>,
) -> Result<Json<Registration>, AppError> {
    let registration = stores
        .registrations
        .get(id)
        .await
        .map_err(|e| AppError::new(e, rid))?
        .ok_or_else(|| AppError::new(TesseraError::not_found("registration", id.to_string()), rid))?;
    Ok(Json(registration))
}

pub async fn update(
    Extension(stores): Extension<Arc<Stores>>,
    Extension(RequestId(rid)): Extension<RequestId>,
    Path(id): Path<Uuid>,
    Json(body): Json<UpdateRegistrationRequest>,
) -> Result<Json<Registration>, AppError> {
    let registration = stores
        .registrations
        .update(
            id,
            RegistrationUpdate {
                pinned_version: body.pinned_version,
                status: body.status,
            },
        )
        .await
        .map_err(|e| AppError::new(e, rid))?
        .ok_or_else(|| AppError::new(TesseraError::not_found("registration", id.to_string()), rid))?;
    Ok(Json(registration))
}

pub async fn delete(
    Extension(service): Extension<Arc<dyn CoreService>>,
    Extension(RequestId(rid)): Extension<RequestId>,
    Path(id): Path<Uuid>,
) -> Result<axum::http::StatusCode, AppError> {
    service.delete_registration(id).await.map_err(|e| AppError::new(e, rid))?;
    Ok(axum::http::StatusCode::NO_CONTENT)
}

//! Contract publishing and read access.
//!
//! POST /assets/:id/contracts     (publish)
//! POST /contracts/bulk           (publish_bulk)
//! GET  /assets/:id/contracts     (list for asset)
//! GET  /contracts/:id
//! GET  /contracts/:id/registrations

use std::sync::Arc;

use axum::extract::Path;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::{Extension, Json};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use tessera_core::error::TesseraError;
use tessera_core::ports::Stores;
use tessera_core::principal::Principal;
use tessera_core::publishing::{BulkPublishResult, ContractToPublish, PublishOutcome};
use tessera_core::service::CoreService;
use tessera_core::types::{ChangeType, CompatibilityMode, Contract, Guarantees, Proposal, Registration};

use crate::error::AppError;
use crate::middleware::RequestId;

#[derive(Debug, Deserialize)]
pub struct PublishContractRequest {
    pub schema_def: Value,
    pub compatibility_mode: Option<CompatibilityMode>,
    pub guarantees: Option<Guarantees>,
    #[serde(default)]
    pub force: bool,
}

/// `action` tags whether the publish landed immediately or, for a breaking
/// change submitted without `force`, turned into a proposal instead.
#[derive(Debug, Serialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum PublishResponse {
    Published {
        contract: Contract,
        change_type: Option<ChangeType>,
    },
    ProposalCreated {
        proposal: Proposal,
    },
}

impl IntoResponse for PublishResponse {
    fn into_response(self) -> Response {
        (StatusCode::CREATED, Json(self)).into_response()
    }
}

pub async fn publish(
    Extension(principal): Extension<Principal>,
    Extension(service): Extension<Arc<dyn CoreService>>,
    Extension(RequestId(rid)): Extension<RequestId>,
    Path(asset_id): Path<Uuid>,
    Json(body): Json<PublishContractRequest>,
) -> Result<PublishResponse, AppError> {
    let outcome = service
        .publish_contract(
            &principal,
            asset_id,
            body.schema_def,
            body.compatibility_mode,
            body.guarantees,
            body.force,
        )
        .await
        .map_err(|e| AppError::new(e, rid))?;
    Ok(match outcome {
        PublishOutcome::Published { contract, change_type } => PublishResponse::Published { contract, change_type },
        PublishOutcome::ProposalCreated(proposal) => PublishResponse::ProposalCreated { proposal },
    })
}

pub async fn list_for_asset(
    Extension(stores): Extension<Arc<Stores>>,
    Extension(RequestId(rid)): Extension<RequestId>,
    Path(asset_id): Path<Uuid>,
) -> Result<Json<Vec<Contract>>, AppError> {
    let contracts = stores
        .contracts
        .list_for_asset(asset_id)
        .await
        .map_err(|e| AppError::new(e, rid))?;
    Ok(Json(contracts))
}

pub async fn get(
    Extension(stores): Extension<Arc<Stores>>,
    Extension(RequestId(rid)): Extension<RequestId>,
    Path(id): Path<Uuid>,
) -> Result<Json<Contract>, AppError> {
    let contract = stores
        .contracts
        .get(id)
        .await
        .map_err(|e| AppError::new(e, rid))?
        .ok_or_else(|| AppError::new(TesseraError::not_found("contract", id.to_string()), rid))?;
    Ok(Json(contract))
}

pub async fn registrations_for_contract(
    Extension(stores): Extension<Arc<Stores>>,
    Extension(RequestId(rid)): Extension<RequestId>,
    Path(id): Path<Uuid>,
) -> Result<Json<Vec<Registration>>, AppError> {
    let registrations = stores
        .registrations
        .list_for_contract(id)
        .await
        .map_err(|e| AppError::new(e, rid))?;
    Ok(Json(registrations))
}

#[derive(Debug, Deserialize)]
pub struct PublishBulkRequest {
    pub items: Vec<ContractToPublish>,
    #[serde(default)]
    pub dry_run: bool,
    #[serde(default)]
    pub create_proposals_for_breaking: bool,
}

pub async fn publish_bulk(
    Extension(principal): Extension<Principal>,
    Extension(service): Extension<Arc<dyn CoreService>>,
    Extension(RequestId(rid)): Extension<RequestId>,
    Json(body): Json<PublishBulkRequest>,
) -> Result<Json<BulkPublishResult>, AppError> {
    let result = service
        .publish_bulk(&principal, body.items, body.dry_run, body.create_proposals_for_breaking)
        .await
        .map_err(|e| AppError::new(e, rid))?;
    Ok(Json(result))
}

//! Proposal lifecycle: create, list, inspect status, acknowledge/object/
//! withdraw/force-approve/publish-from-proposal, and the bulk acknowledgment
//! endpoint.
//!
//! POST /assets/:id/proposals
//! GET  /proposals
//! GET  /proposals/:id
//! GET  /proposals/:id/status
//! POST /proposals/:id/acknowledge
//! POST /proposals/:id/object
//! POST /proposals/:id/withdraw
//! POST /proposals/:id/force
//! POST /proposals/:id/publish
//! POST /bulk/acknowledgments

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use axum::extract::{Path, Query};
use axum::{Extension, Json};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use tessera_core::error::TesseraError;
use tessera_core::ports::Stores;
use tessera_core::principal::Principal;
use tessera_core::service::CoreService;
use tessera_core::types::{AcknowledgmentResponse, Contract, Guarantees, Proposal, ProposalStatus};

use crate::error::AppError;
use crate::middleware::RequestId;

#[derive(Debug, Deserialize)]
pub struct CreateProposalRequest {
    pub proposed_schema: Value,
    pub proposed_guarantees: Option<Guarantees>,
}

#[derive(Debug, Deserialize)]
pub struct ListProposalsQuery {
    pub asset_id: Option<Uuid>,
    pub status: Option<ProposalStatus>,
    pub proposed_by: Option<Uuid>,
    #[serde(default = "default_limit")]
    pub limit: i64,
    #[serde(default)]
    pub offset: i64,
}

fn default_limit() -> i64 {
    100
}

#[derive(Debug, Serialize)]
pub struct AcknowledgmentDetail {
    pub id: Uuid,
    pub consumer_team_id: Uuid,
    pub consumer_team_name: String,
    pub response: AcknowledgmentResponse,
    pub migration_deadline: Option<DateTime<Utc>>,
    pub responded_at: DateTime<Utc>,
    pub notes: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct PendingConsumer {
    pub consumer_team_id: Uuid,
    pub consumer_team_name: String,
    pub registered_at: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub struct ConsumerSummary {
    pub total: usize,
    pub acknowledged: usize,
    pub pending: usize,
    pub blocked: usize,
}

#[derive(Debug, Serialize)]
pub struct ProposalStatusResponse {
    pub proposal_id: Uuid,
    pub status: ProposalStatus,
    pub proposing_team_name: String,
    pub acknowledgments: Vec<AcknowledgmentDetail>,
    pub blocked_count: usize,
    pub pending_consumers: Vec<PendingConsumer>,
    pub consumers: ConsumerSummary,
    pub is_complete: bool,
}

#[derive(Debug, Deserialize)]
pub struct AcknowledgeRequest {
    pub consumer_team_id: Uuid,
    pub response: AcknowledgmentResponse,
    pub migration_deadline: Option<chrono::DateTime<chrono::Utc>>,
    pub notes: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ObjectRequest {
    pub objector_team_id: Uuid,
    pub reason: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct PublishFromProposalRequest {
    pub version: String,
}

#[derive(Debug, Deserialize)]
pub struct BulkAcknowledgmentItem {
    pub proposal_id: Uuid,
    pub consumer_team_id: Uuid,
    pub response: AcknowledgmentResponse,
    pub migration_deadline: Option<chrono::DateTime<chrono::Utc>>,
    pub notes: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct BulkAcknowledgmentRequest {
    pub items: Vec<BulkAcknowledgmentItem>,
    #[serde(default)]
    pub continue_on_error: bool,
}

#[derive(Debug, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum BulkAcknowledgmentOutcome {
    Ok { acknowledgment_id: Uuid },
    Error { message: String },
}

pub async fn create(
    Extension(principal): Extension<Principal>,
    Extension(service): Extension<Arc<dyn CoreService>>,
    Extension(RequestId(rid)): Extension<RequestId>,
    Path(asset_id): Path<Uuid>,
    Json(body): Json<CreateProposalRequest>,
) -> Result<Json<Proposal>, AppError> {
    let proposal = service
        .create_proposal(&principal, asset_id, body.proposed_schema, body.proposed_guarantees)
        .await
        .map_err(|e| AppError::new(e, rid))?;
    Ok(Json(proposal))
}

pub async fn list(
    Extension(stores): Extension<Arc<Stores>>,
    Extension(RequestId(rid)): Extension<RequestId>,
    Query(query): Query<ListProposalsQuery>,
) -> Result<Json<Vec<Proposal>>, AppError> {
    let proposals = stores
        .proposals
        .list(query.asset_id, query.status, query.proposed_by, query.limit, query.offset)
        .await
        .map_err(|e| AppError::new(e, rid))?;
    Ok(Json(proposals))
}

async fn load_proposal(stores: &Stores, id: Uuid, rid: Uuid) -> Result<Proposal, AppError> {
    stores
        .proposals
        .get(id)
        .await
        .map_err(|e| AppError::new(e, rid))?
        .ok_or_else(|| AppError::new(TesseraError::not_found("proposal", id.to_string()), rid))
}

pub async fn get(
    Extension(stores): Extension<Arc<Stores>>,
    Extension(RequestId(rid)): Extension<RequestId>,
    Path(id): Path<Uuid>,
) -> Result<Json<Proposal>, AppError> {
    Ok(Json(load_proposal(&stores, id, rid).await?))
}

async fn team_name(stores: &Stores, team_id: Uuid, rid: Uuid) -> Result<String, AppError> {
    Ok(stores
        .teams
        .get(team_id)
        .await
        .map_err(|e| AppError::new(e, rid))?
        .map(|team| team.name)
        .unwrap_or_else(|| "unknown".to_string()))
}

pub async fn status(
    Extension(stores): Extension<Arc<Stores>>,
    Extension(RequestId(rid)): Extension<RequestId>,
    Path(id): Path<Uuid>,
) -> Result<Json<ProposalStatusResponse>, AppError> {
    let proposal = load_proposal(&stores, id, rid).await?;
    let acknowledgments = stores
        .acknowledgments
        .list_for_proposal(id)
        .await
        .map_err(|e| AppError::new(e, rid))?;

    let active_contract = stores
        .contracts
        .lock_active(proposal.asset_id)
        .await
        .map_err(|e| AppError::new(e, rid))?;
    let registrations_with_team = if let Some(contract) = active_contract {
        stores
            .registrations
            .list_active_with_team_for_contracts(&[contract.id])
            .await
            .map_err(|e| AppError::new(e, rid))?
    } else {
        Vec::new()
    };

    let mut team_names: HashMap<Uuid, String> =
        registrations_with_team.iter().map(|(reg, team)| (reg.consumer_team_id, team.name.clone())).collect();
    for ack in &acknowledgments {
        if !team_names.contains_key(&ack.consumer_team_id) {
            let name = team_name(&stores, ack.consumer_team_id, rid).await?;
            team_names.insert(ack.consumer_team_id, name);
        }
    }
    let proposing_team_name = team_name(&stores, proposal.proposed_by, rid).await?;

    let acked_team_ids: HashSet<Uuid> = acknowledgments.iter().map(|a| a.consumer_team_id).collect();
    let blocked_count = acknowledgments.iter().filter(|a| a.response == AcknowledgmentResponse::Blocked).count();

    let pending_consumers: Vec<PendingConsumer> = registrations_with_team
        .iter()
        .filter(|(reg, _)| !acked_team_ids.contains(&reg.consumer_team_id))
        .map(|(reg, team)| PendingConsumer {
            consumer_team_id: reg.consumer_team_id,
            consumer_team_name: team.name.clone(),
            registered_at: reg.registered_at,
        })
        .collect();

    let total = registrations_with_team.len();
    let acknowledged = registrations_with_team
        .iter()
        .filter(|(reg, _)| acked_team_ids.contains(&reg.consumer_team_id))
        .count();
    let consumers = ConsumerSummary { total, acknowledged, pending: total - acknowledged, blocked: blocked_count };

    let acknowledgment_details: Vec<AcknowledgmentDetail> = acknowledgments
        .into_iter()
        .map(|ack| AcknowledgmentDetail {
            id: ack.id,
            consumer_team_id: ack.consumer_team_id,
            consumer_team_name: team_names.get(&ack.consumer_team_id).cloned().unwrap_or_else(|| "unknown".to_string()),
            response: ack.response,
            migration_deadline: ack.migration_deadline,
            responded_at: ack.responded_at,
            notes: ack.notes,
        })
        .collect();

    Ok(Json(ProposalStatusResponse {
        proposal_id: id,
        status: proposal.status,
        proposing_team_name,
        acknowledgments: acknowledgment_details,
        blocked_count,
        pending_consumers,
        consumers,
        is_complete: total == acknowledged,
    }))
}

pub async fn acknowledge(
    Extension(service): Extension<Arc<dyn CoreService>>,
    Extension(RequestId(rid)): Extension<RequestId>,
    Path(id): Path<Uuid>,
    Json(body): Json<AcknowledgeRequest>,
) -> Result<Json<tessera_core::types::Acknowledgment>, AppError> {
    let ack = service
        .acknowledge_proposal(id, body.consumer_team_id, body.response, body.migration_deadline, body.notes)
        .await
        .map_err(|e| AppError::new(e, rid))?;
    Ok(Json(ack))
}

pub async fn object(
    Extension(service): Extension<Arc<dyn CoreService>>,
    Extension(RequestId(rid)): Extension<RequestId>,
    Path(id): Path<Uuid>,
    Json(body): Json<ObjectRequest>,
) -> Result<Json<tessera_core::types::Objection>, AppError> {
    let objection = service
        .object_to_proposal(id, body.objector_team_id, body.reason)
        .await
        .map_err(|e| AppError::new(e, rid))?;
    Ok(Json(objection))
}

pub async fn withdraw(
    Extension(service): Extension<Arc<dyn CoreService>>,
    Extension(RequestId(rid)): Extension<RequestId>,
    Path(id): Path<Uuid>,
) -> Result<Json<Proposal>, AppError> {
    let proposal = service.withdraw_proposal(id).await.map_err(|e| AppError::new(e, rid))?;
    Ok(Json(proposal))
}

pub async fn force(
    Extension(principal): Extension<Principal>,
    Extension(service): Extension<Arc<dyn CoreService>>,
    Extension(RequestId(rid)): Extension<RequestId>,
    Path(id): Path<Uuid>,
) -> Result<Json<Proposal>, AppError> {
    let proposal = service
        .force_approve_proposal(&principal, id)
        .await
        .map_err(|e| AppError::new(e, rid))?;
    Ok(Json(proposal))
}

pub async fn publish(
    Extension(principal): Extension<Principal>,
    Extension(service): Extension<Arc<dyn CoreService>>,
    Extension(RequestId(rid)): Extension<RequestId>,
    Path(id): Path<Uuid>,
    Json(body): Json<PublishFromProposalRequest>,
) -> Result<Json<Contract>, AppError> {
    let contract = service
        .publish_from_proposal(&principal, id, &body.version)
        .await
        .map_err(|e| AppError::new(e, rid))?;
    Ok(Json(contract))
}

pub async fn bulk_acknowledge(
    Extension(service): Extension<Arc<dyn CoreService>>,
    Json(body): Json<BulkAcknowledgmentRequest>,
) -> Json<Vec<BulkAcknowledgmentOutcome>> {
    let mut outcomes = Vec::with_capacity(body.items.len());
    for item in body.items {
        let result = service
            .acknowledge_proposal(item.proposal_id, item.consumer_team_id, item.response, item.migration_deadline, item.notes)
            .await;
        match result {
            Ok(ack) => outcomes.push(BulkAcknowledgmentOutcome::Ok { acknowledgment_id: ack.id }),
            Err(e) => {
                outcomes.push(BulkAcknowledgmentOutcome::Error { message: e.to_string() });
                if !body.continue_on_error {
                    break;
                }
            }
        }
    }
    Json(outcomes)
}

//! Audit-run reporting and history.
//!
//! POST /assets/:id/audit-results
//! GET  /assets/:id/audit-history

use std::sync::Arc;

use axum::extract::{Path, Query};
use axum::{Extension, Json};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use tessera_core::ports::Stores;
use tessera_core::service::CoreService;
use tessera_core::types::{AuditRun, AuditRunStatus};

use crate::error::AppError;
use crate::middleware::RequestId;

#[derive(Debug, Deserialize)]
pub struct ReportAuditResultRequest {
    pub contract_id: Option<Uuid>,
    pub status: AuditRunStatus,
    pub guarantees_checked: i32,
    pub guarantees_passed: i32,
    pub guarantees_failed: i32,
    pub triggered_by: String,
    pub run_id: Option<String>,
    #[serde(default)]
    pub details: Value,
}

#[derive(Debug, Deserialize)]
pub struct AuditHistoryQuery {
    pub triggered_by: Option<String>,
    pub status: Option<AuditRunStatus>,
    #[serde(default = "default_limit")]
    pub limit: i64,
}

fn default_limit() -> i64 {
    50
}

#[derive(Debug, Serialize)]
pub struct AuditHistoryResponse {
    pub runs: Vec<AuditRun>,
    pub total: i64,
}

pub async fn report(
    Extension(service): Extension<Arc<dyn CoreService>>,
    Extension(RequestId(rid)): Extension<RequestId>,
    Path(asset_id): Path<Uuid>,
    Json(body): Json<ReportAuditResultRequest>,
) -> Result<Json<AuditRun>, AppError> {
    let run = service
        .report_audit_result(
            asset_id,
            body.contract_id,
            body.status,
            body.guarantees_checked,
            body.guarantees_passed,
            body.guarantees_failed,
            &body.triggered_by,
            body.run_id,
            body.details,
        )
        .await
        .map_err(|e| AppError::new(e, rid))?;
    Ok(Json(run))
}

pub async fn history(
    Extension(stores): Extension<Arc<Stores>>,
    Extension(RequestId(rid)): Extension<RequestId>,
    Path(asset_id): Path<Uuid>,
    Query(query): Query<AuditHistoryQuery>,
) -> Result<Json<AuditHistoryResponse>, AppError> {
    let (runs, total) = stores
        .audit_runs
        .list_for_asset(asset_id, query.limit, query.triggered_by.as_deref(), query.status)
        .await
        .map_err(|e| AppError::new(e, rid))?;
    Ok(Json(AuditHistoryResponse { runs, total }))
}

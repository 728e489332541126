use anyhow::anyhow;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;
use sqlx::PgPool;
use uuid::Uuid;

use tessera_core::error::{Result, TesseraError};
use tessera_core::ports::{AuditRunStore, AuditStore};
use tessera_core::types::{AuditEvent, AuditRun, AuditRunStatus};

use crate::internal;
use crate::sqlx_types::{audit_run_status_str, AuditEventRow, AuditRunRow};

pub struct PgAuditStore {
    pool: PgPool,
}

impl PgAuditStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl AuditStore for PgAuditStore {
    async fn append(
        &self,
        entity_type: &str,
        entity_id: Uuid,
        action: &str,
        actor_id: Option<Uuid>,
        payload: Value,
    ) -> Result<AuditEvent> {
        let row: AuditEventRow = sqlx::query_as(
            r#"INSERT INTO core.audit_events (id, entity_type, entity_id, action, actor_id, payload, occurred_at)
               VALUES ($1, $2, $3, $4, $5, $6, now())
               RETURNING id, entity_type, entity_id, action, actor_id, payload, occurred_at"#,
        )
        .bind(Uuid::new_v4())
        .bind(entity_type)
        .bind(entity_id)
        .bind(action)
        .bind(actor_id)
        .bind(payload)
        .fetch_one(&self.pool)
        .await
        .map_err(internal)?;
        Ok(row.into())
    }
}

pub struct PgAuditRunStore {
    pool: PgPool,
}

impl PgAuditRunStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

const AUDIT_RUN_COLUMNS: &str = "id, asset_id, contract_id, status::text AS status, guarantees_checked, guarantees_passed, guarantees_failed, triggered_by, run_id, details, run_at";

#[async_trait]
impl AuditRunStore for PgAuditRunStore {
    async fn create(
        &self,
        asset_id: Uuid,
        contract_id: Option<Uuid>,
        status: AuditRunStatus,
        guarantees_checked: i32,
        guarantees_passed: i32,
        guarantees_failed: i32,
        triggered_by: &str,
        run_id: Option<String>,
        details: Value,
        run_at: DateTime<Utc>,
    ) -> Result<AuditRun> {
        let query = format!(
            r#"INSERT INTO core.audit_runs (id, asset_id, contract_id, status, guarantees_checked, guarantees_passed, guarantees_failed, triggered_by, run_id, details, run_at)
               VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
               RETURNING {AUDIT_RUN_COLUMNS}"#
        );
        let row: AuditRunRow = sqlx::query_as(&query)
            .bind(Uuid::new_v4())
            .bind(asset_id)
            .bind(contract_id)
            .bind(audit_run_status_str(status))
            .bind(guarantees_checked)
            .bind(guarantees_passed)
            .bind(guarantees_failed)
            .bind(triggered_by)
            .bind(run_id)
            .bind(details)
            .bind(run_at)
            .fetch_one(&self.pool)
            .await
            .map_err(internal)?;
        row.try_into().map_err(|e: anyhow::Error| TesseraError::Internal(anyhow!(e)))
    }

    async fn list_for_asset(
        &self,
        asset_id: Uuid,
        limit: i64,
        triggered_by: Option<&str>,
        status: Option<AuditRunStatus>,
    ) -> Result<(Vec<AuditRun>, i64)> {
        let query = format!(
            r#"SELECT {AUDIT_RUN_COLUMNS} FROM core.audit_runs
               WHERE asset_id = $1
                 AND ($2::text IS NULL OR triggered_by = $2)
                 AND ($3::text IS NULL OR status::text = $3)
               ORDER BY run_at DESC LIMIT $4"#
        );
        let rows: Vec<AuditRunRow> = sqlx::query_as(&query)
            .bind(asset_id)
            .bind(triggered_by)
            .bind(status.map(audit_run_status_str))
            .bind(limit)
            .fetch_all(&self.pool)
            .await
            .map_err(internal)?;
        let total: (i64,) = sqlx::query_as(
            r#"SELECT count(*) FROM core.audit_runs
               WHERE asset_id = $1
                 AND ($2::text IS NULL OR triggered_by = $2)
                 AND ($3::text IS NULL OR status::text = $3)"#,
        )
        .bind(asset_id)
        .bind(triggered_by)
        .bind(status.map(audit_run_status_str))
        .fetch_one(&self.pool)
        .await
        .map_err(internal)?;
        let runs = rows
            .into_iter()
            .map(TryInto::try_into)
            .collect::<anyhow::Result<Vec<_>>>()
            .map_err(|e| TesseraError::Internal(anyhow!(e)))?;
        Ok((runs, total.0))
    }
}

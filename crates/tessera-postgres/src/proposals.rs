use anyhow::anyhow;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;
use sqlx::PgPool;
use uuid::Uuid;

use tessera_core::error::{Result, TesseraError};
use tessera_core::ports::{AcknowledgmentStore, ObjectionStore, ProposalStore};
use tessera_core::types::{
    Acknowledgment, AcknowledgmentResponse, AffectedAsset, AffectedTeam, ChangeType, Objection,
    Proposal, ProposalStatus,
};

use crate::internal;
use crate::sqlx_types::{
    acknowledgment_response_str, change_type_str, proposal_status_str, AcknowledgmentRow,
    ObjectionRow, ProposalRow,
};

pub struct PgProposalStore {
    pool: PgPool,
}

impl PgProposalStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

const PROPOSAL_COLUMNS: &str = "id, asset_id, proposed_schema, proposed_guarantees, change_type::text AS change_type, breaking_changes, affected_teams, affected_assets, status::text AS status, proposed_by, proposed_by_user_id, proposed_at, resolved_at";

#[async_trait]
impl ProposalStore for PgProposalStore {
    async fn create(
        &self,
        asset_id: Uuid,
        proposed_schema: Value,
        proposed_guarantees: Option<tessera_core::types::Guarantees>,
        change_type: ChangeType,
        breaking_changes: Vec<Value>,
        affected_teams: Vec<AffectedTeam>,
        affected_assets: Vec<AffectedAsset>,
        proposed_by: Uuid,
        proposed_by_user_id: Option<Uuid>,
    ) -> Result<Proposal> {
        let guarantees_json = proposed_guarantees.map(|g| serde_json::to_value(g).unwrap_or_default());
        let query = format!(
            r#"INSERT INTO core.proposals (id, asset_id, proposed_schema, proposed_guarantees, change_type,
                   breaking_changes, affected_teams, affected_assets, status, proposed_by, proposed_by_user_id, proposed_at)
               VALUES ($1, $2, $3, $4, $5, $6, $7, $8, 'pending', $9, $10, now())
               RETURNING {PROPOSAL_COLUMNS}"#
        );
        let row: ProposalRow = sqlx::query_as(&query)
            .bind(Uuid::new_v4())
            .bind(asset_id)
            .bind(proposed_schema)
            .bind(guarantees_json)
            .bind(change_type_str(change_type))
            .bind(serde_json::to_value(breaking_changes).unwrap_or_default())
            .bind(serde_json::to_value(affected_teams).unwrap_or_default())
            .bind(serde_json::to_value(affected_assets).unwrap_or_default())
            .bind(proposed_by)
            .bind(proposed_by_user_id)
            .fetch_one(&self.pool)
            .await
            .map_err(internal)?;
        row.try_into().map_err(|e: anyhow::Error| TesseraError::Internal(anyhow!(e)))
    }

    async fn lock(&self, id: Uuid) -> Result<Option<Proposal>> {
        let query = format!("SELECT {PROPOSAL_COLUMNS} FROM core.proposals WHERE id = $1 FOR UPDATE");
        let row: Option<ProposalRow> = sqlx::query_as(&query)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(internal)?;
        row.map(TryInto::try_into).transpose().map_err(|e: anyhow::Error| TesseraError::Internal(anyhow!(e)))
    }

    async fn get(&self, id: Uuid) -> Result<Option<Proposal>> {
        let query = format!("SELECT {PROPOSAL_COLUMNS} FROM core.proposals WHERE id = $1");
        let row: Option<ProposalRow> = sqlx::query_as(&query)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(internal)?;
        row.map(TryInto::try_into).transpose().map_err(|e: anyhow::Error| TesseraError::Internal(anyhow!(e)))
    }

    async fn get_pending_for_asset(&self, asset_id: Uuid) -> Result<Option<Proposal>> {
        let query = format!("SELECT {PROPOSAL_COLUMNS} FROM core.proposals WHERE asset_id = $1 AND status = 'pending' LIMIT 1");
        let row: Option<ProposalRow> = sqlx::query_as(&query)
            .bind(asset_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(internal)?;
        row.map(TryInto::try_into).transpose().map_err(|e: anyhow::Error| TesseraError::Internal(anyhow!(e)))
    }

    async fn get_pending_batch(&self, asset_ids: &[Uuid]) -> Result<Vec<(Uuid, Option<Proposal>)>> {
        let query =
            format!("SELECT {PROPOSAL_COLUMNS} FROM core.proposals WHERE asset_id = ANY($1) AND status = 'pending'");
        let rows: Vec<ProposalRow> = sqlx::query_as(&query).bind(asset_ids).fetch_all(&self.pool).await.map_err(internal)?;
        let proposals: Vec<Proposal> = rows
            .into_iter()
            .map(TryInto::try_into)
            .collect::<anyhow::Result<Vec<_>>>()
            .map_err(|e| TesseraError::Internal(anyhow!(e)))?;
        Ok(asset_ids.iter().map(|&id| (id, proposals.iter().find(|p| p.asset_id == id).cloned())).collect())
    }

    async fn list(
        &self,
        asset_id: Option<Uuid>,
        status: Option<ProposalStatus>,
        proposed_by: Option<Uuid>,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Proposal>> {
        let query = format!(
            r#"SELECT {PROPOSAL_COLUMNS} FROM core.proposals
               WHERE ($1::uuid IS NULL OR asset_id = $1)
                 AND ($2::text IS NULL OR status::text = $2)
                 AND ($3::uuid IS NULL OR proposed_by = $3)
               ORDER BY proposed_at DESC LIMIT $4 OFFSET $5"#
        );
        let rows: Vec<ProposalRow> = sqlx::query_as(&query)
            .bind(asset_id)
            .bind(status.map(proposal_status_str))
            .bind(proposed_by)
            .bind(limit)
            .bind(offset)
            .fetch_all(&self.pool)
            .await
            .map_err(internal)?;
        rows.into_iter()
            .map(TryInto::try_into)
            .collect::<anyhow::Result<Vec<_>>>()
            .map_err(|e| TesseraError::Internal(anyhow!(e)))
    }

    async fn set_status(&self, id: Uuid, status: ProposalStatus, resolved: bool) -> Result<()> {
        sqlx::query(
            r#"UPDATE core.proposals
               SET status = $2, resolved_at = CASE WHEN $3 THEN now() ELSE resolved_at END
               WHERE id = $1"#,
        )
        .bind(id)
        .bind(proposal_status_str(status))
        .bind(resolved)
        .execute(&self.pool)
        .await
        .map_err(internal)?;
        Ok(())
    }
}

pub struct PgAcknowledgmentStore {
    pool: PgPool,
}

impl PgAcknowledgmentStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

const ACK_COLUMNS: &str = "id, proposal_id, consumer_team_id, response::text AS response, migration_deadline, responded_at, notes";

#[async_trait]
impl AcknowledgmentStore for PgAcknowledgmentStore {
    async fn create(
        &self,
        proposal_id: Uuid,
        consumer_team_id: Uuid,
        response: AcknowledgmentResponse,
        migration_deadline: Option<DateTime<Utc>>,
        notes: Option<String>,
    ) -> Result<Acknowledgment> {
        let query = format!(
            r#"INSERT INTO core.acknowledgments (id, proposal_id, consumer_team_id, response, migration_deadline, responded_at, notes)
               VALUES ($1, $2, $3, $4, $5, now(), $6)
               RETURNING {ACK_COLUMNS}"#
        );
        let row: AcknowledgmentRow = sqlx::query_as(&query)
            .bind(Uuid::new_v4())
            .bind(proposal_id)
            .bind(consumer_team_id)
            .bind(acknowledgment_response_str(response))
            .bind(migration_deadline)
            .bind(notes)
            .fetch_one(&self.pool)
            .await
            .map_err(internal)?;
        row.try_into().map_err(|e: anyhow::Error| TesseraError::Internal(anyhow!(e)))
    }

    async fn get_for_team(&self, proposal_id: Uuid, consumer_team_id: Uuid) -> Result<Option<Acknowledgment>> {
        let query = format!(
            "SELECT {ACK_COLUMNS} FROM core.acknowledgments WHERE proposal_id = $1 AND consumer_team_id = $2"
        );
        let row: Option<AcknowledgmentRow> = sqlx::query_as(&query)
            .bind(proposal_id)
            .bind(consumer_team_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(internal)?;
        row.map(TryInto::try_into).transpose().map_err(|e: anyhow::Error| TesseraError::Internal(anyhow!(e)))
    }

    async fn list_for_proposal(&self, proposal_id: Uuid) -> Result<Vec<Acknowledgment>> {
        let query = format!("SELECT {ACK_COLUMNS} FROM core.acknowledgments WHERE proposal_id = $1");
        let rows: Vec<AcknowledgmentRow> = sqlx::query_as(&query)
            .bind(proposal_id)
            .fetch_all(&self.pool)
            .await
            .map_err(internal)?;
        rows.into_iter()
            .map(TryInto::try_into)
            .collect::<anyhow::Result<Vec<_>>>()
            .map_err(|e| TesseraError::Internal(anyhow!(e)))
    }
}

pub struct PgObjectionStore {
    pool: PgPool,
}

impl PgObjectionStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ObjectionStore for PgObjectionStore {
    async fn create(&self, proposal_id: Uuid, objector_team_id: Uuid, reason: Option<String>) -> Result<Objection> {
        let row: ObjectionRow = sqlx::query_as(
            r#"INSERT INTO core.objections (id, proposal_id, objector_team_id, reason, created_at)
               VALUES ($1, $2, $3, $4, now())
               RETURNING id, proposal_id, objector_team_id, reason, created_at"#,
        )
        .bind(Uuid::new_v4())
        .bind(proposal_id)
        .bind(objector_team_id)
        .bind(reason)
        .fetch_one(&self.pool)
        .await
        .map_err(internal)?;
        Ok(row.into())
    }

    async fn list_for_proposal(&self, proposal_id: Uuid) -> Result<Vec<Objection>> {
        let rows: Vec<ObjectionRow> = sqlx::query_as(
            "SELECT id, proposal_id, objector_team_id, reason, created_at FROM core.objections WHERE proposal_id = $1",
        )
        .bind(proposal_id)
        .fetch_all(&self.pool)
        .await
        .map_err(internal)?;
        Ok(rows.into_iter().map(Into::into).collect())
    }
}

use anyhow::anyhow;
use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use tessera_core::error::{ErrorCode, Result, TesseraError};
use tessera_core::ports::{ContractStore, RegistrationStore, RegistrationUpdate};
use tessera_core::types::{CompatibilityMode, Contract, Guarantees, Registration, Team};

use crate::internal;
use crate::sqlx_types::{
    compatibility_mode_str, registration_status_str, ContractRow, RegistrationRow,
    RegistrationWithTeamRow,
};

pub struct PgContractStore {
    pool: PgPool,
}

impl PgContractStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

const CONTRACT_COLUMNS: &str = "id, asset_id, version, schema_def, compatibility_mode::text AS compatibility_mode, guarantees, status::text AS status, published_at, published_by, published_by_user_id";

#[async_trait]
impl ContractStore for PgContractStore {
    async fn lock_active(&self, asset_id: Uuid) -> Result<Option<Contract>> {
        let query = format!(
            r#"SELECT {CONTRACT_COLUMNS} FROM core.contracts
               WHERE asset_id = $1 AND status = 'active'
               ORDER BY published_at DESC LIMIT 1 FOR UPDATE"#
        );
        let row: Option<ContractRow> = sqlx::query_as(&query)
            .bind(asset_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(internal)?;
        row.map(TryInto::try_into).transpose().map_err(|e: anyhow::Error| TesseraError::Internal(anyhow!(e)))
    }

    async fn get(&self, id: Uuid) -> Result<Option<Contract>> {
        let query = format!("SELECT {CONTRACT_COLUMNS} FROM core.contracts WHERE id = $1");
        let row: Option<ContractRow> = sqlx::query_as(&query)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(internal)?;
        row.map(TryInto::try_into).transpose().map_err(|e: anyhow::Error| TesseraError::Internal(anyhow!(e)))
    }

    async fn list_for_asset(&self, asset_id: Uuid) -> Result<Vec<Contract>> {
        let query = format!("SELECT {CONTRACT_COLUMNS} FROM core.contracts WHERE asset_id = $1 ORDER BY published_at DESC");
        let rows: Vec<ContractRow> = sqlx::query_as(&query)
            .bind(asset_id)
            .fetch_all(&self.pool)
            .await
            .map_err(internal)?;
        rows.into_iter()
            .map(TryInto::try_into)
            .collect::<anyhow::Result<Vec<_>>>()
            .map_err(|e| TesseraError::Internal(anyhow!(e)))
    }

    async fn insert_active(
        &self,
        asset_id: Uuid,
        version: &str,
        schema_def: serde_json::Value,
        compatibility_mode: CompatibilityMode,
        guarantees: Option<Guarantees>,
        published_by: Uuid,
        published_by_user_id: Option<Uuid>,
    ) -> Result<Contract> {
        let existing: Option<(Uuid,)> =
            sqlx::query_as("SELECT id FROM core.contracts WHERE asset_id = $1 AND version = $2")
                .bind(asset_id)
                .bind(version)
                .fetch_optional(&self.pool)
                .await
                .map_err(internal)?;
        if existing.is_some() {
            return Err(TesseraError::conflict(
                ErrorCode::DuplicateRegistration,
                format!("contract version '{version}' already exists for this asset"),
            ));
        }
        let guarantees_json = guarantees.map(|g| serde_json::to_value(g).unwrap_or_default());
        let query = format!(
            r#"INSERT INTO core.contracts (id, asset_id, version, schema_def, compatibility_mode, guarantees, status, published_at, published_by, published_by_user_id)
               VALUES ($1, $2, $3, $4, $5, $6, 'active', now(), $7, $8)
               RETURNING {CONTRACT_COLUMNS}"#
        );
        let row: ContractRow = sqlx::query_as(&query)
            .bind(Uuid::new_v4())
            .bind(asset_id)
            .bind(version)
            .bind(schema_def)
            .bind(compatibility_mode_str(compatibility_mode))
            .bind(guarantees_json)
            .bind(published_by)
            .bind(published_by_user_id)
            .fetch_one(&self.pool)
            .await
            .map_err(internal)?;
        row.try_into().map_err(|e: anyhow::Error| TesseraError::Internal(anyhow!(e)))
    }

    async fn deprecate(&self, id: Uuid) -> Result<()> {
        sqlx::query("UPDATE core.contracts SET status = 'deprecated' WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(internal)?;
        Ok(())
    }

    async fn lock_active_batch(&self, asset_ids: &[Uuid]) -> Result<Vec<(Uuid, Option<Contract>)>> {
        let query = format!(
            r#"SELECT {CONTRACT_COLUMNS} FROM core.contracts
               WHERE asset_id = ANY($1) AND status = 'active' FOR UPDATE"#
        );
        let rows: Vec<ContractRow> = sqlx::query_as(&query)
            .bind(asset_ids)
            .fetch_all(&self.pool)
            .await
            .map_err(internal)?;
        let contracts: Vec<Contract> = rows
            .into_iter()
            .map(TryInto::try_into)
            .collect::<anyhow::Result<Vec<_>>>()
            .map_err(|e| TesseraError::Internal(anyhow!(e)))?;
        Ok(asset_ids
            .iter()
            .map(|&id| (id, contracts.iter().find(|c| c.asset_id == id).cloned()))
            .collect())
    }

    async fn search(&self, query: &str, limit: i64) -> Result<Vec<Contract>> {
        let sql = r#"
            SELECT c.id, c.asset_id, c.version, c.schema_def, c.compatibility_mode::text AS compatibility_mode,
                   c.guarantees, c.status::text AS status, c.published_at, c.published_by, c.published_by_user_id
            FROM core.contracts c
            JOIN core.assets a ON a.id = c.asset_id
            WHERE a.fqn ILIKE '%' || $1 || '%' OR c.version ILIKE '%' || $1 || '%'
            ORDER BY c.published_at DESC LIMIT $2
        "#;
        let rows: Vec<ContractRow> = sqlx::query_as(sql)
            .bind(query)
            .bind(limit)
            .fetch_all(&self.pool)
            .await
            .map_err(internal)?;
        rows.into_iter()
            .map(TryInto::try_into)
            .collect::<anyhow::Result<Vec<_>>>()
            .map_err(|e| TesseraError::Internal(anyhow!(e)))
    }
}

pub struct PgRegistrationStore {
    pool: PgPool,
}

impl PgRegistrationStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

const REGISTRATION_COLUMNS: &str =
    "id, contract_id, consumer_team_id, pinned_version, status::text AS status, registered_at, acknowledged_at, deleted_at";

#[async_trait]
impl RegistrationStore for PgRegistrationStore {
    async fn create(&self, contract_id: Uuid, consumer_team_id: Uuid, pinned_version: Option<String>) -> Result<Registration> {
        let existing: Option<(Uuid,)> = sqlx::query_as(
            "SELECT id FROM core.registrations WHERE contract_id = $1 AND consumer_team_id = $2 AND deleted_at IS NULL",
        )
        .bind(contract_id)
        .bind(consumer_team_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(internal)?;
        if existing.is_some() {
            return Err(TesseraError::conflict(ErrorCode::DuplicateRegistration, "team is already registered for this contract"));
        }
        let query = format!(
            r#"INSERT INTO core.registrations (id, contract_id, consumer_team_id, pinned_version, status, registered_at)
               VALUES ($1, $2, $3, $4, 'active', now())
               RETURNING {REGISTRATION_COLUMNS}"#
        );
        let row: RegistrationRow = sqlx::query_as(&query)
            .bind(Uuid::new_v4())
            .bind(contract_id)
            .bind(consumer_team_id)
            .bind(pinned_version)
            .fetch_one(&self.pool)
            .await
            .map_err(internal)?;
        row.try_into().map_err(|e: anyhow::Error| TesseraError::Internal(anyhow!(e)))
    }

    async fn get(&self, id: Uuid) -> Result<Option<Registration>> {
        let query = format!("SELECT {REGISTRATION_COLUMNS} FROM core.registrations WHERE id = $1 AND deleted_at IS NULL");
        let row: Option<RegistrationRow> = sqlx::query_as(&query)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(internal)?;
        row.map(TryInto::try_into).transpose().map_err(|e: anyhow::Error| TesseraError::Internal(anyhow!(e)))
    }

    async fn update(&self, id: Uuid, update: RegistrationUpdate) -> Result<Option<Registration>> {
        let query = format!(
            r#"UPDATE core.registrations
               SET pinned_version = COALESCE($2, pinned_version),
                   status = COALESCE($3, status)
               WHERE id = $1 AND deleted_at IS NULL
               RETURNING {REGISTRATION_COLUMNS}"#
        );
        let row: Option<RegistrationRow> = sqlx::query_as(&query)
            .bind(id)
            .bind(update.pinned_version)
            .bind(update.status.map(registration_status_str))
            .fetch_optional(&self.pool)
            .await
            .map_err(internal)?;
        row.map(TryInto::try_into).transpose().map_err(|e: anyhow::Error| TesseraError::Internal(anyhow!(e)))
    }

    async fn soft_delete(&self, id: Uuid) -> Result<bool> {
        let result = sqlx::query("UPDATE core.registrations SET deleted_at = now() WHERE id = $1 AND deleted_at IS NULL")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(internal)?;
        Ok(result.rows_affected() > 0)
    }

    async fn list_for_contract(&self, contract_id: Uuid) -> Result<Vec<Registration>> {
        let query = format!("SELECT {REGISTRATION_COLUMNS} FROM core.registrations WHERE contract_id = $1 AND deleted_at IS NULL");
        let rows: Vec<RegistrationRow> = sqlx::query_as(&query)
            .bind(contract_id)
            .fetch_all(&self.pool)
            .await
            .map_err(internal)?;
        rows.into_iter()
            .map(TryInto::try_into)
            .collect::<anyhow::Result<Vec<_>>>()
            .map_err(|e| TesseraError::Internal(anyhow!(e)))
    }

    async fn list_active_with_team_for_contracts(&self, contract_ids: &[Uuid]) -> Result<Vec<(Registration, Team)>> {
        let query = r#"
            SELECT r.id, r.contract_id, r.consumer_team_id, r.pinned_version, r.status::text AS status,
                   r.registered_at, r.acknowledged_at, r.deleted_at,
                   t.name AS team_name, t.metadata AS team_metadata,
                   t.created_at AS team_created_at, t.updated_at AS team_updated_at, t.deleted_at AS team_deleted_at
            FROM core.registrations r
            JOIN core.teams t ON t.id = r.consumer_team_id
            WHERE r.contract_id = ANY($1) AND r.status = 'active' AND r.deleted_at IS NULL AND t.deleted_at IS NULL
        "#;
        let rows: Vec<RegistrationWithTeamRow> = sqlx::query_as(query)
            .bind(contract_ids)
            .fetch_all(&self.pool)
            .await
            .map_err(internal)?;
        rows.into_iter()
            .map(TryInto::try_into)
            .collect::<anyhow::Result<Vec<_>>>()
            .map_err(|e| TesseraError::Internal(anyhow!(e)))
    }
}

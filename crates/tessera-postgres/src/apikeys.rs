use anyhow::anyhow;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use tessera_core::error::{Result, TesseraError};
use tessera_core::ports::ApiKeyStore;
use tessera_core::types::{ApiKey, ApiKeyScope};

use crate::internal;
use crate::sqlx_types::{api_key_scope_str, ApiKeyRow};

pub struct PgApiKeyStore {
    pool: PgPool,
}

impl PgApiKeyStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

const API_KEY_COLUMNS: &str =
    "id, key_hash, key_prefix, name, team_id, scopes, expires_at, created_at, revoked_at";

#[async_trait]
impl ApiKeyStore for PgApiKeyStore {
    async fn find_by_prefix(&self, prefix: &str) -> Result<Option<ApiKey>> {
        let query = format!(
            r#"SELECT {API_KEY_COLUMNS} FROM core.api_keys
               WHERE key_prefix = $1 AND revoked_at IS NULL AND (expires_at IS NULL OR expires_at > now())"#
        );
        let row: Option<ApiKeyRow> = sqlx::query_as(&query)
            .bind(prefix)
            .fetch_optional(&self.pool)
            .await
            .map_err(internal)?;
        row.map(TryInto::try_into).transpose().map_err(|e: anyhow::Error| TesseraError::Internal(anyhow!(e)))
    }

    async fn create(
        &self,
        key_hash: String,
        key_prefix: String,
        name: String,
        team_id: Uuid,
        scopes: Vec<ApiKeyScope>,
        expires_at: Option<DateTime<Utc>>,
    ) -> Result<ApiKey> {
        let scope_strs: Vec<&str> = scopes.iter().map(|s| api_key_scope_str(*s)).collect();
        let query = format!(
            r#"INSERT INTO core.api_keys (id, key_hash, key_prefix, name, team_id, scopes, expires_at, created_at)
               VALUES ($1, $2, $3, $4, $5, $6, $7, now())
               RETURNING {API_KEY_COLUMNS}"#
        );
        let row: ApiKeyRow = sqlx::query_as(&query)
            .bind(Uuid::new_v4())
            .bind(key_hash)
            .bind(key_prefix)
            .bind(name)
            .bind(team_id)
            .bind(&scope_strs)
            .bind(expires_at)
            .fetch_one(&self.pool)
            .await
            .map_err(internal)?;
        row.try_into().map_err(|e: anyhow::Error| TesseraError::Internal(anyhow!(e)))
    }
}

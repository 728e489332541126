use anyhow::anyhow;
use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use tessera_core::error::{ErrorCode, Result, TesseraError};
use tessera_core::ports::{TeamStore, TeamUpdate, UserStore};
use tessera_core::types::{Team, User};

use crate::internal;
use crate::sqlx_types::{TeamRow, UserRow};

pub struct PgTeamStore {
    pool: PgPool,
}

impl PgTeamStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

const TEAM_COLUMNS: &str = "id, name, metadata, created_at, updated_at, deleted_at";

#[async_trait]
impl TeamStore for PgTeamStore {
    async fn create(&self, name: &str, metadata: serde_json::Value) -> Result<Team> {
        let existing: Option<(Uuid,)> =
            sqlx::query_as("SELECT id FROM core.teams WHERE name = $1 AND deleted_at IS NULL")
                .bind(name)
                .fetch_optional(&self.pool)
                .await
                .map_err(internal)?;
        if existing.is_some() {
            return Err(TesseraError::conflict(
                ErrorCode::DuplicateTeam,
                format!("team '{name}' already exists"),
            ));
        }
        let query = format!(
            r#"INSERT INTO core.teams (id, name, metadata, created_at, updated_at)
               VALUES ($1, $2, $3, now(), now())
               RETURNING {TEAM_COLUMNS}"#
        );
        let row: TeamRow = sqlx::query_as(&query)
            .bind(Uuid::new_v4())
            .bind(name)
            .bind(metadata)
            .fetch_one(&self.pool)
            .await
            .map_err(internal)?;
        Ok(row.into())
    }

    async fn get(&self, id: Uuid) -> Result<Option<Team>> {
        let query = format!("SELECT {TEAM_COLUMNS} FROM core.teams WHERE id = $1 AND deleted_at IS NULL");
        let row: Option<TeamRow> = sqlx::query_as(&query)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(internal)?;
        Ok(row.map(Into::into))
    }

    async fn list(&self) -> Result<Vec<Team>> {
        let query = format!("SELECT {TEAM_COLUMNS} FROM core.teams WHERE deleted_at IS NULL ORDER BY name");
        let rows: Vec<TeamRow> = sqlx::query_as(&query).fetch_all(&self.pool).await.map_err(internal)?;
        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn update(&self, id: Uuid, update: TeamUpdate) -> Result<Option<Team>> {
        let query = format!(
            r#"UPDATE core.teams
               SET name = COALESCE($2, name), metadata = COALESCE($3, metadata), updated_at = now()
               WHERE id = $1 AND deleted_at IS NULL
               RETURNING {TEAM_COLUMNS}"#
        );
        let row: Option<TeamRow> = sqlx::query_as(&query)
            .bind(id)
            .bind(update.name)
            .bind(update.metadata)
            .fetch_optional(&self.pool)
            .await
            .map_err(internal)?;
        Ok(row.map(Into::into))
    }

    async fn soft_delete(&self, id: Uuid) -> Result<bool> {
        let result = sqlx::query("UPDATE core.teams SET deleted_at = now() WHERE id = $1 AND deleted_at IS NULL")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(internal)?;
        Ok(result.rows_affected() > 0)
    }

    async fn search_by_name(&self, query: &str, limit: i64) -> Result<Vec<Team>> {
        let sql = format!(
            r#"SELECT {TEAM_COLUMNS} FROM core.teams
               WHERE deleted_at IS NULL AND name ILIKE '%' || $1 || '%'
               ORDER BY name LIMIT $2"#
        );
        let rows: Vec<TeamRow> = sqlx::query_as(&sql)
            .bind(query)
            .bind(limit)
            .fetch_all(&self.pool)
            .await
            .map_err(internal)?;
        Ok(rows.into_iter().map(Into::into).collect())
    }
}

pub struct PgUserStore {
    pool: PgPool,
}

impl PgUserStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

const USER_COLUMNS: &str = "id, email, name, team_id, role::text AS role, created_at, updated_at, deactivated_at";

#[async_trait]
impl UserStore for PgUserStore {
    async fn get(&self, id: Uuid) -> Result<Option<User>> {
        let query = format!("SELECT {USER_COLUMNS} FROM core.users WHERE id = $1");
        let row: Option<UserRow> = sqlx::query_as(&query)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(internal)?;
        row.map(TryInto::try_into).transpose().map_err(|e: anyhow::Error| TesseraError::Internal(anyhow!(e)))
    }

    async fn search(&self, query: &str, limit: i64) -> Result<Vec<User>> {
        let sql = format!(
            r#"SELECT {USER_COLUMNS} FROM core.users
               WHERE deactivated_at IS NULL AND (email ILIKE '%' || $1 || '%' OR name ILIKE '%' || $1 || '%')
               ORDER BY name LIMIT $2"#
        );
        let rows: Vec<UserRow> = sqlx::query_as(&sql)
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

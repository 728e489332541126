use anyhow::anyhow;
use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use tessera_core::error::{ErrorCode, Result, TesseraError};
use tessera_core::ports::{AssetStore, AssetUpdate, DependencyStore};
use tessera_core::types::{Asset, Dependency, DependencyType};

use crate::internal;
use crate::sqlx_types::{dependency_type_str, AssetRow, DependencyEdgeRow};

pub struct PgAssetStore {
    pool: PgPool,
}

impl PgAssetStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

const ASSET_COLUMNS: &str =
    "id, fqn, environment, owner_team_id, resource_type, metadata, created_at, updated_at, deleted_at";

#[async_trait]
impl AssetStore for PgAssetStore {
    async fn create(
        &self,
        fqn: &str,
        environment: &str,
        owner_team_id: Uuid,
        resource_type: &str,
        metadata: serde_json::Value,
    ) -> Result<Asset> {
        if self.get_by_fqn(fqn, environment).await?.is_some() {
            return Err(TesseraError::conflict(
                ErrorCode::DuplicateAsset,
                format!("asset '{fqn}' already exists in environment '{environment}'"),
            ));
        }
        let query = format!(
            r#"INSERT INTO core.assets (id, fqn, environment, owner_team_id, resource_type, metadata, created_at, updated_at)
               VALUES ($1, $2, $3, $4, $5, $6, now(), now())
               RETURNING {ASSET_COLUMNS}"#
        );
        let row: AssetRow = sqlx::query_as(&query)
            .bind(Uuid::new_v4())
            .bind(fqn)
            .bind(environment)
            .bind(owner_team_id)
            .bind(resource_type)
            .bind(metadata)
            .fetch_one(&self.pool)
            .await
            .map_err(internal)?;
        Ok(row.into())
    }

    async fn get(&self, id: Uuid) -> Result<Option<Asset>> {
        let query = format!("SELECT {ASSET_COLUMNS} FROM core.assets WHERE id = $1 AND deleted_at IS NULL");
        let row: Option<AssetRow> = sqlx::query_as(&query)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(internal)?;
        Ok(row.map(Into::into))
    }

    async fn get_batch(&self, ids: &[Uuid]) -> Result<Vec<(Uuid, Option<Asset>)>> {
        let query = format!("SELECT {ASSET_COLUMNS} FROM core.assets WHERE id = ANY($1) AND deleted_at IS NULL");
        let rows: Vec<AssetRow> = sqlx::query_as(&query).bind(ids).fetch_all(&self.pool).await.map_err(internal)?;
        let assets: Vec<Asset> = rows.into_iter().map(Into::into).collect();
        Ok(ids.iter().map(|&id| (id, assets.iter().find(|a| a.id == id).cloned())).collect())
    }

    async fn get_by_fqn(&self, fqn: &str, environment: &str) -> Result<Option<Asset>> {
        let query = format!(
            "SELECT {ASSET_COLUMNS} FROM core.assets WHERE fqn = $1 AND environment = $2 AND deleted_at IS NULL"
        );
        let row: Option<AssetRow> = sqlx::query_as(&query)
            .bind(fqn)
            .bind(environment)
            .fetch_optional(&self.pool)
            .await
            .map_err(internal)?;
        Ok(row.map(Into::into))
    }

    async fn list(&self, owner: Option<Uuid>, limit: i64, offset: i64) -> Result<Vec<Asset>> {
        let query = format!(
            r#"SELECT {ASSET_COLUMNS} FROM core.assets
               WHERE deleted_at IS NULL AND ($1::uuid IS NULL OR owner_team_id = $1)
               ORDER BY fqn LIMIT $2 OFFSET $3"#
        );
        let rows: Vec<AssetRow> = sqlx::query_as(&query)
            .bind(owner)
            .bind(limit)
            .bind(offset)
            .fetch_all(&self.pool)
            .await
            .map_err(internal)?;
        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn update(&self, id: Uuid, update: AssetUpdate) -> Result<Option<Asset>> {
        let query = format!(
            r#"UPDATE core.assets
               SET fqn = COALESCE($2, fqn),
                   owner_team_id = COALESCE($3, owner_team_id),
                   metadata = COALESCE($4, metadata),
                   updated_at = now()
               WHERE id = $1 AND deleted_at IS NULL
               RETURNING {ASSET_COLUMNS}"#
        );
        let row: Option<AssetRow> = sqlx::query_as(&query)
            .bind(id)
            .bind(update.fqn)
            .bind(update.owner_team_id)
            .bind(update.metadata)
            .fetch_optional(&self.pool)
            .await
            .map_err(internal)?;
        Ok(row.map(Into::into))
    }

    async fn soft_delete(&self, id: Uuid) -> Result<bool> {
        let result = sqlx::query("UPDATE core.assets SET deleted_at = now() WHERE id = $1 AND deleted_at IS NULL")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(internal)?;
        Ok(result.rows_affected() > 0)
    }

    async fn search_by_fqn(&self, query: &str, limit: i64) -> Result<Vec<Asset>> {
        let sql = format!(
            "SELECT {ASSET_COLUMNS} FROM core.assets WHERE deleted_at IS NULL AND fqn ILIKE '%' || $1 || '%' ORDER BY fqn LIMIT $2"
        );
        let rows: Vec<AssetRow> = sqlx::query_as(&sql)
            .bind(query)
            .bind(limit)
            .fetch_all(&self.pool)
            .await
            .map_err(internal)?;
        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn find_by_depends_on(&self, fqn: &str) -> Result<Vec<Asset>> {
        let sql = format!(
            r#"SELECT {ASSET_COLUMNS} FROM core.assets
               WHERE deleted_at IS NULL AND metadata -> 'depends_on' @> to_jsonb($1::text)"#
        );
        let rows: Vec<AssetRow> = sqlx::query_as(&sql)
            .bind(fqn)
            .fetch_all(&self.pool)
            .await
            .map_err(internal)?;
        Ok(rows.into_iter().map(Into::into).collect())
    }
}

pub struct PgDependencyStore {
    pool: PgPool,
}

impl PgDependencyStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl DependencyStore for PgDependencyStore {
    async fn create(
        &self,
        dependent_asset_id: Uuid,
        dependency_asset_id: Uuid,
        dependency_type: DependencyType,
    ) -> Result<Dependency> {
        let row: (Uuid, Uuid, Uuid, String, chrono::DateTime<chrono::Utc>, Option<chrono::DateTime<chrono::Utc>>) =
            sqlx::query_as(
                r#"INSERT INTO core.asset_dependencies (id, dependent_asset_id, dependency_asset_id, dependency_type, created_at)
                   VALUES ($1, $2, $3, $4, now())
                   RETURNING id, dependent_asset_id, dependency_asset_id, dependency_type::text, created_at, deleted_at"#,
            )
            .bind(Uuid::new_v4())
            .bind(dependent_asset_id)
            .bind(dependency_asset_id)
            .bind(dependency_type_str(dependency_type))
            .fetch_one(&self.pool)
            .await
            .map_err(internal)?;
        Ok(Dependency {
            id: row.0,
            dependent_asset_id: row.1,
            dependency_asset_id: row.2,
            dependency_type,
            created_at: row.4,
            deleted_at: row.5,
        })
    }

    async fn downstream_of(&self, dependency_asset_ids: &[Uuid]) -> Result<Vec<(Asset, DependencyType)>> {
        let query = r#"
            SELECT a.id, a.fqn, a.environment, a.owner_team_id, a.resource_type, a.metadata,
                   a.created_at, a.updated_at, a.deleted_at, d.dependency_type::text AS dependency_type
            FROM core.asset_dependencies d
            JOIN core.assets a ON a.id = d.dependent_asset_id
            WHERE d.dependency_asset_id = ANY($1) AND d.deleted_at IS NULL AND a.deleted_at IS NULL
        "#;
        let rows: Vec<DependencyEdgeRow> = sqlx::query_as(query)
            .bind(dependency_asset_ids)
            .fetch_all(&self.pool)
            .await
            .map_err(internal)?;
        rows.into_iter()
            .map(TryInto::try_into)
            .collect::<anyhow::Result<Vec<_>>>()
            .map_err(|e| TesseraError::Internal(anyhow!(e)))
    }
}

//! Connector surface: bulk-register assets from external schema sources
//! (dbt, OpenAPI, GraphQL) and the optional git-backed export/import round
//! trip.
//!
//! POST /sync/dbt/upload
//! POST /sync/dbt/impact
//! POST /sync/openapi
//! POST /sync/graphql
//! POST /sync/push   (requires GIT_SYNC_PATH)
//! POST /sync/pull   (requires GIT_SYNC_PATH)

use std::path::{Path, PathBuf};
use std::sync::Arc;

use axum::{Extension, Json};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use tessera_core::classifier::classify;
use tessera_core::connectors::{dbt_manifest_to_assets, dedup_by_fqn, graphql_to_assets, openapi_to_assets, ConnectorAsset, UpsertCounts};
use tessera_core::differ::diff_schemas;
use tessera_core::error::TesseraError;
use tessera_core::ports::{AssetUpdate, Stores};
use tessera_core::principal::Principal;
use tessera_core::types::{ApiKeyScope, ChangeType, CompatibilityMode};

use crate::error::AppError;
use crate::middleware::RequestId;
use crate::state::AppState;

const DEFAULT_ENVIRONMENT: &str = "production";
const EXPORT_BATCH_LIMIT: i64 = 100_000;

async fn upsert_assets(
    stores: &Stores,
    owner_team_id: Uuid,
    environment: &str,
    assets: Vec<ConnectorAsset>,
) -> tessera_core::error::Result<UpsertCounts> {
    let mut counts = UpsertCounts::default();
    for asset in dedup_by_fqn(assets) {
        match stores.assets.get_by_fqn(&asset.fqn, environment).await? {
            Some(existing) => {
                let mut metadata = asset.metadata.clone();
                if let Some(obj) = metadata.as_object_mut() {
                    obj.insert("schema_hint".to_string(), asset.schema.clone());
                }
                stores
                    .assets
                    .update(existing.id, AssetUpdate { fqn: None, owner_team_id: None, metadata: Some(metadata) })
                    .await?;
                counts.record(true);
            }
            None => {
                let mut metadata = asset.metadata.clone();
                if let Some(obj) = metadata.as_object_mut() {
                    obj.insert("schema_hint".to_string(), asset.schema.clone());
                }
                stores.assets.create(&asset.fqn, environment, owner_team_id, &asset.resource_type, metadata).await?;
                counts.record(false);
            }
        }
    }
    Ok(counts)
}

#[derive(Debug, Deserialize)]
pub struct DbtUploadRequest {
    pub manifest: Value,
    pub owner_team_id: Uuid,
    pub environment: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct UpsertSummary {
    pub status: &'static str,
    pub created: usize,
    pub updated: usize,
}

pub async fn dbt_upload(
    Extension(principal): Extension<Principal>,
    Extension(stores): Extension<Arc<Stores>>,
    Extension(RequestId(rid)): Extension<RequestId>,
    Json(body): Json<DbtUploadRequest>,
) -> Result<Json<UpsertSummary>, AppError> {
    principal.require_scope(ApiKeyScope::Admin).map_err(|e| AppError::new(e, rid))?;
    let environment = body.environment.as_deref().unwrap_or(DEFAULT_ENVIRONMENT);
    let assets = dbt_manifest_to_assets(&body.manifest);
    let counts = upsert_assets(&stores, body.owner_team_id, environment, assets)
        .await
        .map_err(|e| AppError::new(e, rid))?;
    Ok(Json(UpsertSummary { status: "success", created: counts.created, updated: counts.updated }))
}

#[derive(Debug, Deserialize)]
pub struct OpenApiUploadRequest {
    pub document: Value,
    pub owner_team_id: Uuid,
    pub environment: Option<String>,
}

pub async fn openapi_upload(
    Extension(principal): Extension<Principal>,
    Extension(stores): Extension<Arc<Stores>>,
    Extension(RequestId(rid)): Extension<RequestId>,
    Json(body): Json<OpenApiUploadRequest>,
) -> Result<Json<UpsertSummary>, AppError> {
    principal.require_scope(ApiKeyScope::Admin).map_err(|e| AppError::new(e, rid))?;
    let environment = body.environment.as_deref().unwrap_or(DEFAULT_ENVIRONMENT);
    let assets = openapi_to_assets(&body.document);
    let counts = upsert_assets(&stores, body.owner_team_id, environment, assets)
        .await
        .map_err(|e| AppError::new(e, rid))?;
    Ok(Json(UpsertSummary { status: "success", created: counts.created, updated: counts.updated }))
}

#[derive(Debug, Deserialize)]
pub struct GraphqlUploadRequest {
    pub introspection: Value,
    pub owner_team_id: Uuid,
    pub environment: Option<String>,
}

pub async fn graphql_upload(
    Extension(principal): Extension<Principal>,
    Extension(stores): Extension<Arc<Stores>>,
    Extension(RequestId(rid)): Extension<RequestId>,
    Json(body): Json<GraphqlUploadRequest>,
) -> Result<Json<UpsertSummary>, AppError> {
    principal.require_scope(ApiKeyScope::Admin).map_err(|e| AppError::new(e, rid))?;
    let environment = body.environment.as_deref().unwrap_or(DEFAULT_ENVIRONMENT);
    let assets = graphql_to_assets(&body.introspection);
    let counts = upsert_assets(&stores, body.owner_team_id, environment, assets)
        .await
        .map_err(|e| AppError::new(e, rid))?;
    Ok(Json(UpsertSummary { status: "success", created: counts.created, updated: counts.updated }))
}

#[derive(Debug, Deserialize)]
pub struct DbtImpactRequest {
    pub manifest: Value,
    pub environment: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct DbtImpactResult {
    pub fqn: String,
    pub has_contract: bool,
    pub safe_to_publish: bool,
    pub change_type: Option<ChangeType>,
    pub breaking_changes: Vec<tessera_core::differ::Change>,
}

#[derive(Debug, Serialize)]
pub struct DbtImpactResponse {
    pub status: &'static str,
    pub total_models: usize,
    pub models_with_contracts: usize,
    pub breaking_changes_count: usize,
    pub results: Vec<DbtImpactResult>,
}

/// Checks a dbt manifest against contracts already on file without
/// mutating anything: every asset the manifest would create or update is
/// diffed against its current active contract, the same way `/assets/:id/impact`
/// diffs a proposed schema.
pub async fn dbt_impact(
    Extension(stores): Extension<Arc<Stores>>,
    Extension(RequestId(rid)): Extension<RequestId>,
    Json(body): Json<DbtImpactRequest>,
) -> Result<Json<DbtImpactResponse>, AppError> {
    let environment = body.environment.as_deref().unwrap_or(DEFAULT_ENVIRONMENT);
    let assets = dedup_by_fqn(dbt_manifest_to_assets(&body.manifest));

    let mut results = Vec::with_capacity(assets.len());
    let mut models_with_contracts = 0;
    let mut breaking_changes_count = 0;

    for asset in &assets {
        let existing = stores.assets.get_by_fqn(&asset.fqn, environment).await.map_err(|e| AppError::new(e, rid))?;
        let Some(existing) = existing else {
            results.push(DbtImpactResult {
                fqn: asset.fqn.clone(),
                has_contract: false,
                safe_to_publish: true,
                change_type: None,
                breaking_changes: Vec::new(),
            });
            continue;
        };
        let active = stores.contracts.lock_active(existing.id).await.map_err(|e| AppError::new(e, rid))?;
        let Some(active) = active else {
            results.push(DbtImpactResult {
                fqn: asset.fqn.clone(),
                has_contract: false,
                safe_to_publish: true,
                change_type: None,
                breaking_changes: Vec::new(),
            });
            continue;
        };

        models_with_contracts += 1;
        let diff = diff_schemas(&active.schema_def, &asset.schema);
        let (_, breaking) = classify(&diff, active.compatibility_mode);
        let breaking_changes: Vec<_> = breaking.into_iter().cloned().collect();
        breaking_changes_count += breaking_changes.len();
        results.push(DbtImpactResult {
            fqn: asset.fqn.clone(),
            has_contract: true,
            safe_to_publish: breaking_changes.is_empty(),
            change_type: Some(diff.change_type),
            breaking_changes,
        });
    }

    Ok(Json(DbtImpactResponse {
        status: "success",
        total_models: assets.len(),
        models_with_contracts,
        breaking_changes_count,
        results,
    }))
}

fn require_git_sync_path(state: &AppState, rid: Uuid) -> Result<PathBuf, AppError> {
    state
        .config
        .git_sync_path
        .as_ref()
        .map(PathBuf::from)
        .ok_or_else(|| AppError::new(TesseraError::validation("GIT_SYNC_PATH not configured"), rid))
}

fn io_error(context: &str, err: std::io::Error, rid: Uuid) -> AppError {
    AppError::new(TesseraError::Internal(anyhow::anyhow!("{context}: {err}")), rid)
}

#[derive(Debug, Serialize, Deserialize)]
struct TeamFile {
    id: Uuid,
    name: String,
    #[serde(default)]
    metadata: Value,
}

#[derive(Debug, Serialize, Deserialize)]
struct RegistrationFile {
    consumer_team_id: Uuid,
    pinned_version: Option<String>,
    status: tessera_core::types::RegistrationStatus,
}

#[derive(Debug, Serialize, Deserialize)]
struct ContractFile {
    version: String,
    schema: Value,
    compatibility_mode: CompatibilityMode,
    guarantees: Option<tessera_core::types::Guarantees>,
    #[serde(default)]
    registrations: Vec<RegistrationFile>,
}

#[derive(Debug, Serialize, Deserialize)]
struct AssetFile {
    fqn: String,
    owner_team_id: Uuid,
    #[serde(default)]
    metadata: Value,
    #[serde(default)]
    contracts: Vec<ContractFile>,
}

fn escape_fqn(fqn: &str) -> String {
    fqn.replace('/', "__").replace('.', "_")
}

#[derive(Debug, Serialize)]
pub struct SyncCounts {
    pub teams: usize,
    pub assets: usize,
    pub contracts: usize,
}

#[derive(Debug, Serialize)]
pub struct SyncResponse {
    pub status: &'static str,
    pub path: String,
}

#[derive(Debug, Serialize)]
pub struct PushResponse {
    pub status: &'static str,
    pub path: String,
    pub exported: SyncCounts,
}

/// Exports every team and asset (with its contracts and registrations) as
/// one YAML file each, under `{git_sync_path}/teams/` and `.../assets/`.
/// Entities keep their database id so a later pull can recognize what's
/// already present.
pub async fn push(
    Extension(principal): Extension<Principal>,
    Extension(state): Extension<AppState>,
    Extension(RequestId(rid)): Extension<RequestId>,
) -> Result<Json<PushResponse>, AppError> {
    principal.require_scope(ApiKeyScope::Admin).map_err(|e| AppError::new(e, rid))?;
    let sync_path = require_git_sync_path(&state, rid)?;
    let teams_dir = sync_path.join("teams");
    let assets_dir = sync_path.join("assets");
    std::fs::create_dir_all(&teams_dir).map_err(|e| io_error("creating teams dir", e, rid))?;
    std::fs::create_dir_all(&assets_dir).map_err(|e| io_error("creating assets dir", e, rid))?;

    let stores = &state.stores;
    let teams = stores.teams.list().await.map_err(|e| AppError::new(e, rid))?;
    for team in &teams {
        let file = TeamFile { id: team.id, name: team.name.clone(), metadata: team.metadata.clone() };
        write_yaml(&teams_dir.join(format!("{}.yaml", team.name)), &file, rid)?;
    }

    let assets = stores.assets.list(None, EXPORT_BATCH_LIMIT, 0).await.map_err(|e| AppError::new(e, rid))?;
    let mut contracts_exported = 0;
    for asset in &assets {
        let contracts = stores.contracts.list_for_asset(asset.id).await.map_err(|e| AppError::new(e, rid))?;
        let mut contract_files = Vec::with_capacity(contracts.len());
        for contract in contracts {
            let registrations =
                stores.registrations.list_for_contract(contract.id).await.map_err(|e| AppError::new(e, rid))?;
            contract_files.push(ContractFile {
                version: contract.version,
                schema: contract.schema_def,
                compatibility_mode: contract.compatibility_mode,
                guarantees: contract.guarantees,
                registrations: registrations
                    .into_iter()
                    .map(|r| RegistrationFile {
                        consumer_team_id: r.consumer_team_id,
                        pinned_version: r.pinned_version,
                        status: r.status,
                    })
                    .collect(),
            });
            contracts_exported += 1;
        }
        let file = AssetFile {
            fqn: asset.fqn.clone(),
            owner_team_id: asset.owner_team_id,
            metadata: asset.metadata.clone(),
            contracts: contract_files,
        };
        write_yaml(&assets_dir.join(format!("{}.yaml", escape_fqn(&asset.fqn))), &file, rid)?;
    }

    Ok(Json(PushResponse {
        status: "success",
        path: sync_path.display().to_string(),
        exported: SyncCounts { teams: teams.len(), assets: assets.len(), contracts: contracts_exported },
    }))
}

fn write_yaml<T: Serialize>(path: &Path, value: &T, rid: Uuid) -> Result<(), AppError> {
    let rendered = serde_yaml::to_string(value)
        .map_err(|e| AppError::new(TesseraError::Internal(anyhow::anyhow!("serializing {}: {e}", path.display())), rid))?;
    std::fs::write(path, rendered).map_err(|e| io_error(&format!("writing {}", path.display()), e, rid))
}

#[derive(Debug, Serialize)]
pub struct PullResponse {
    pub status: &'static str,
    pub path: String,
    pub imported: SyncCounts,
}

/// Imports whatever `/sync/push` last wrote. Teams and assets are matched
/// by name/fqn and updated in place; contracts are immutable once
/// published, so a contract whose version already exists for its asset is
/// left untouched rather than re-inserted.
pub async fn pull(
    Extension(principal): Extension<Principal>,
    Extension(state): Extension<AppState>,
    Extension(RequestId(rid)): Extension<RequestId>,
) -> Result<Json<PullResponse>, AppError> {
    principal.require_scope(ApiKeyScope::Admin).map_err(|e| AppError::new(e, rid))?;
    let sync_path = require_git_sync_path(&state, rid)?;
    if !sync_path.exists() {
        return Err(AppError::new(TesseraError::not_found("sync_path", sync_path.display().to_string()), rid));
    }
    let stores = &state.stores;

    let mut teams_imported = 0;
    let teams_dir = sync_path.join("teams");
    if teams_dir.exists() {
        for entry in read_yaml_dir::<TeamFile>(&teams_dir, rid)? {
            match stores.teams.get(entry.id).await.map_err(|e| AppError::new(e, rid))? {
                Some(_) => {
                    stores
                        .teams
                        .update(entry.id, tessera_core::ports::TeamUpdate { name: Some(entry.name), metadata: Some(entry.metadata) })
                        .await
                        .map_err(|e| AppError::new(e, rid))?;
                }
                None => {
                    stores.teams.create(&entry.name, entry.metadata).await.map_err(|e| AppError::new(e, rid))?;
                }
            }
            teams_imported += 1;
        }
    }

    let mut assets_imported = 0;
    let mut contracts_imported = 0;
    let assets_dir = sync_path.join("assets");
    if assets_dir.exists() {
        for entry in read_yaml_dir::<AssetFile>(&assets_dir, rid)? {
            let existing = stores
                .assets
                .get_by_fqn(&entry.fqn, DEFAULT_ENVIRONMENT)
                .await
                .map_err(|e| AppError::new(e, rid))?;
            let asset = match existing {
                Some(existing) => {
                    stores
                        .assets
                        .update(
                            existing.id,
                            AssetUpdate {
                                fqn: None,
                                owner_team_id: Some(entry.owner_team_id),
                                metadata: Some(entry.metadata.clone()),
                            },
                        )
                        .await
                        .map_err(|e| AppError::new(e, rid))?
                        .unwrap_or(existing)
                }
                None => stores
                    .assets
                    .create(&entry.fqn, DEFAULT_ENVIRONMENT, entry.owner_team_id, "synced", entry.metadata.clone())
                    .await
                    .map_err(|e| AppError::new(e, rid))?,
            };
            assets_imported += 1;

            for contract in entry.contracts {
                let result = stores
                    .contracts
                    .insert_active(
                        asset.id,
                        &contract.version,
                        contract.schema,
                        contract.compatibility_mode,
                        contract.guarantees,
                        entry.owner_team_id,
                        None,
                    )
                    .await;
                let published = match result {
                    Ok(published) => {
                        contracts_imported += 1;
                        Some(published)
                    }
                    Err(TesseraError::Conflict { .. }) => None,
                    Err(e) => return Err(AppError::new(e, rid)),
                };
                let Some(published) = published else { continue };
                for registration in contract.registrations {
                    stores
                        .registrations
                        .create(published.id, registration.consumer_team_id, registration.pinned_version)
                        .await
                        .map_err(|e| AppError::new(e, rid))?;
                }
            }
        }
    }

    Ok(Json(PullResponse {
        status: "success",
        path: sync_path.display().to_string(),
        imported: SyncCounts { teams: teams_imported, assets: assets_imported, contracts: contracts_imported },
    }))
}

fn read_yaml_dir<T: serde::de::DeserializeOwned>(dir: &Path, rid: Uuid) -> Result<Vec<T>, AppError> {
    let mut out = Vec::new();
    let entries = std::fs::read_dir(dir).map_err(|e| io_error(&format!("reading {}", dir.display()), e, rid))?;
    for entry in entries {
        let entry = entry.map_err(|e| io_error("reading directory entry", e, rid))?;
        let path = entry.path();
        if path.extension().and_then(|e| e.to_str()) != Some("yaml") {
            continue;
        }
        let raw = std::fs::read_to_string(&path).map_err(|e| io_error(&format!("reading {}", path.display()), e, rid))?;
        let parsed = serde_yaml::from_str(&raw)
            .map_err(|e| AppError::new(TesseraError::Internal(anyhow::anyhow!("parsing {}: {e}", path.display())), rid))?;
        out.push(parsed);
    }
    Ok(out)
}

//! Global search across teams, users, assets, and contracts.
//!
//! GET /search?q=&limit=&types=

use std::sync::Arc;

use axum::extract::Query;
use axum::{Extension, Json};
use serde::{Deserialize, Serialize};

use tessera_core::ports::Stores;
use tessera_core::types::{Asset, Contract, Team, User};

use crate::error::AppError;
use crate::middleware::RequestId;

#[derive(Debug, Deserialize)]
pub struct SearchQuery {
    pub q: String,
    #[serde(default = "default_limit")]
    pub limit: i64,
    /// Comma-separated subset of `teams,users,assets,contracts`; empty means all.
    pub types: Option<String>,
}

fn default_limit() -> i64 {
    20
}

#[derive(Debug, Serialize, Deserialize, Default)]
pub struct SearchResults {
    pub teams: Vec<Team>,
    pub users: Vec<User>,
    pub assets: Vec<Asset>,
    pub contracts: Vec<Contract>,
    pub total: usize,
}

fn wants(types: &Option<String>, kind: &str) -> bool {
    match types {
        None => true,
        Some(raw) if raw.trim().is_empty() => true,
        Some(raw) => raw.split(',').any(|t| t.trim() == kind),
    }
}

const CACHE_PREFIX: &str = "search";

pub async fn search(
    Extension(stores): Extension<Arc<Stores>>,
    Extension(RequestId(rid)): Extension<RequestId>,
    Query(query): Query<SearchQuery>,
) -> Result<Json<SearchResults>, AppError> {
    let cache_key = format!("{}:{}:{}", query.q, query.limit, query.types.clone().unwrap_or_default());
    let is_default_call = query.limit == default_limit() && query.types.is_none();
    if is_default_call {
        if let Some(cached) = stores.cache.get(CACHE_PREFIX, &cache_key).await {
            if let Ok(results) = serde_json::from_value::<SearchResults>(cached) {
                return Ok(Json(results));
            }
        }
    }

    let mut results = SearchResults::default();
    if wants(&query.types, "teams") {
        results.teams = stores.teams.search_by_name(&query.q, query.limit).await.map_err(|e| AppError::new(e, rid))?;
    }
    if wants(&query.types, "users") {
        results.users = stores.users.search(&query.q, query.limit).await.map_err(|e| AppError::new(e, rid))?;
    }
    if wants(&query.types, "assets") {
        results.assets = stores.assets.search_by_fqn(&query.q, query.limit).await.map_err(|e| AppError::new(e, rid))?;
    }
    if wants(&query.types, "contracts") {
        results.contracts = stores.contracts.search(&query.q, query.limit).await.map_err(|e| AppError::new(e, rid))?;
    }
    results.total = results.teams.len() + results.users.len() + results.assets.len() + results.contracts.len();

    if is_default_call {
        if let Ok(value) = serde_json::to_value(&results) {
            stores.cache.set(CACHE_PREFIX, &cache_key, value, 30).await;
        }
    }

    Ok(Json(results))
}

//! Issues API keys for a team. The plaintext key is returned exactly once,
//! at creation time; only its argon2 hash and an 18-character prefix are
//! ever persisted.
//!
//! POST /teams/:id/api-keys

use std::sync::Arc;

use argon2::password_hash::rand_core::OsRng;
use argon2::password_hash::{PasswordHasher, SaltString};
use argon2::Argon2;
use axum::extract::Path;
use axum::{Extension, Json};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use tessera_core::error::TesseraError;
use tessera_core::ports::Stores;
use tessera_core::principal::Principal;
use tessera_core::types::ApiKeyScope;

use crate::error::AppError;
use crate::middleware::RequestId;

const KEY_PREFIX_LEN: usize = 18;

#[derive(Debug, Deserialize)]
pub struct CreateApiKeyRequest {
    pub name: String,
    #[serde(default = "default_scopes")]
    pub scopes: Vec<ApiKeyScope>,
    pub expires_at: Option<chrono::DateTime<chrono::Utc>>,
}

fn default_scopes() -> Vec<ApiKeyScope> {
    vec![ApiKeyScope::Read]
}

#[derive(Debug, Serialize)]
pub struct CreateApiKeyResponse {
    pub id: Uuid,
    pub key: String,
    pub key_prefix: String,
    pub name: String,
    pub scopes: Vec<ApiKeyScope>,
}

fn generate_key() -> String {
    let mut bytes = [0u8; 24];
    rand::thread_rng().fill_bytes(&mut bytes);
    format!("tess_live_{}", hex::encode(bytes))
}

pub async fn create(
    Extension(principal): Extension<Principal>,
    Extension(stores): Extension<Arc<Stores>>,
    Extension(RequestId(rid)): Extension<RequestId>,
    Path(team_id): Path<Uuid>,
    Json(body): Json<CreateApiKeyRequest>,
) -> Result<Json<CreateApiKeyResponse>, AppError> {
    principal.require_scope(ApiKeyScope::Admin).map_err(|e| AppError::new(e, rid))?;
    principal.owns_or_admin(team_id).map_err(|e| AppError::new(e, rid))?;

    let plaintext = generate_key();
    let key_prefix = plaintext.chars().take(KEY_PREFIX_LEN).collect::<String>();
    let salt = SaltString::generate(&mut OsRng);
    let key_hash = Argon2::default()
        .hash_password(plaintext.as_bytes(), &salt)
        .map_err(|e| AppError::new(TesseraError::Internal(anyhow::anyhow!("hashing api key: {e}")), rid))?
        .to_string();

    let record = stores
        .api_keys
        .create(key_hash, key_prefix.clone(), body.name.clone(), team_id, body.scopes.clone(), body.expires_at)
        .await
        .map_err(|e| AppError::new(e, rid))?;

    Ok(Json(CreateApiKeyResponse {
        id: record.id,
        key: plaintext,
        key_prefix,
        name: record.name,
        scopes: record.scopes,
    }))
}

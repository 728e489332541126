//! Resolves the caller's `Principal` from either an API key, a session
//! cookie, or the configured bootstrap key, and injects it into request
//! extensions. Mirrors the shape the router's other middleware use:
//! `Result<Response, Response>` so a failure short-circuits with its own
//! response instead of falling through to the handler.

use argon2::password_hash::{PasswordHash, PasswordVerifier};
use argon2::Argon2;
use axum::extract::Request;
use axum::http::{header, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use uuid::Uuid;

use tessera_core::error::ErrorCode;
use tessera_core::principal::{scopes_for_role, Principal};

use crate::state::AppState;

const SESSION_COOKIE: &str = "tessera_session";

fn unauthorized(code: ErrorCode, message: impl Into<String>) -> Response {
    let body = json!({"error": {"code": code, "message": message.into()}});
    (StatusCode::UNAUTHORIZED, Json(body)).into_response()
}

fn key_prefix(key: &str) -> &str {
    // `tess_live_` plus the first 8 characters of the random suffix; stored
    // at issuance time as `key_prefix` and indexed for O(1) lookup.
    let end = key.len().min(18);
    &key[..end]
}

pub async fn auth_middleware(mut request: Request, next: Next) -> Result<Response, Response> {
    let state = request
        .extensions()
        .get::<AppState>()
        .cloned()
        .ok_or_else(|| unauthorized(ErrorCode::InvalidApiKey, "server misconfigured"))?;

    if state.config.auth_disabled {
        request.extensions_mut().insert(Principal {
            team_id: Uuid::nil(),
            user_id: None,
            scopes: vec![
                tessera_core::types::ApiKeyScope::Read,
                tessera_core::types::ApiKeyScope::Write,
                tessera_core::types::ApiKeyScope::Admin,
            ],
            user_email: None,
        });
        return Ok(next.run(request).await);
    }

    let principal = if let Some(header_value) = request.headers().get(header::AUTHORIZATION) {
        let raw = header_value
            .to_str()
            .map_err(|_| unauthorized(ErrorCode::InvalidAuthHeader, "authorization header is not valid UTF-8"))?;
        let token = raw
            .strip_prefix("Bearer ")
            .ok_or_else(|| unauthorized(ErrorCode::InvalidAuthHeader, "expected 'Bearer <api_key>'"))?;
        resolve_api_key(&state, token).await?
    } else if let Some(cookie) = session_cookie(&request) {
        resolve_session(&state, &cookie).await?
    } else {
        return Err(unauthorized(ErrorCode::MissingApiKey, "missing Authorization header or session cookie"));
    };

    request.extensions_mut().insert(principal);
    Ok(next.run(request).await)
}

fn session_cookie(request: &Request) -> Option<String> {
    let header_value = request.headers().get(header::COOKIE)?.to_str().ok()?;
    header_value.split(';').find_map(|pair| {
        let (name, value) = pair.trim().split_once('=')?;
        (name == SESSION_COOKIE).then(|| value.to_string())
    })
}

async fn resolve_api_key(state: &AppState, token: &str) -> Result<Principal, Response> {
    if let Some(bootstrap) = &state.config.bootstrap_api_key {
        if token == bootstrap {
            return Ok(Principal {
                team_id: Uuid::nil(),
                user_id: None,
                scopes: vec![
                    tessera_core::types::ApiKeyScope::Read,
                    tessera_core::types::ApiKeyScope::Write,
                    tessera_core::types::ApiKeyScope::Admin,
                ],
                user_email: None,
            });
        }
    }

    let prefix = key_prefix(token);
    let record = state
        .stores
        .api_keys
        .find_by_prefix(prefix)
        .await
        .map_err(|_| unauthorized(ErrorCode::InvalidApiKey, "credential lookup failed"))?
        .ok_or_else(|| unauthorized(ErrorCode::InvalidApiKey, "unknown api key"))?;

    if record.revoked_at.is_some() {
        return Err(unauthorized(ErrorCode::InvalidApiKey, "api key revoked"));
    }
    if let Some(expires_at) = record.expires_at {
        if expires_at < chrono::Utc::now() {
            return Err(unauthorized(ErrorCode::InvalidApiKey, "api key expired"));
        }
    }

    let parsed_hash = PasswordHash::new(&record.key_hash)
        .map_err(|_| unauthorized(ErrorCode::InvalidApiKey, "stored credential is malformed"))?;
    Argon2::default()
        .verify_password(token.as_bytes(), &parsed_hash)
        .map_err(|_| unauthorized(ErrorCode::InvalidApiKey, "invalid api key"))?;

    let team = state
        .stores
        .teams
        .get(record.team_id)
        .await
        .map_err(|_| unauthorized(ErrorCode::InvalidApiKey, "credential lookup failed"))?
        .ok_or_else(|| unauthorized(ErrorCode::InvalidApiKey, "owning team not found"))?;
    if team.deleted_at.is_some() {
        return Err(unauthorized(ErrorCode::InvalidApiKey, "owning team is deleted"));
    }

    Ok(Principal {
        team_id: record.team_id,
        user_id: None,
        scopes: record.scopes,
        user_email: None,
    })
}

async fn resolve_session(state: &AppState, cookie: &str) -> Result<Principal, Response> {
    let user_id = Uuid::parse_str(cookie)
        .map_err(|_| unauthorized(ErrorCode::InvalidApiKey, "malformed session cookie"))?;
    let user = state
        .stores
        .users
        .get(user_id)
        .await
        .map_err(|_| unauthorized(ErrorCode::InvalidApiKey, "session lookup failed"))?
        .ok_or_else(|| unauthorized(ErrorCode::InvalidApiKey, "session user not found"))?;
    if user.deactivated_at.is_some() {
        return Err(unauthorized(ErrorCode::InvalidApiKey, "user deactivated"));
    }
    let team_id = user
        .team_id
        .ok_or_else(|| unauthorized(ErrorCode::InvalidApiKey, "user has no team"))?;

    Ok(Principal {
        team_id,
        user_id: Some(user.id),
        scopes: scopes_for_role(user.role),
        user_email: Some(user.email),
    })
}

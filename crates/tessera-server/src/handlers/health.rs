//! Health check endpoints.
//!
//! - `GET /health` — status plus database connectivity
//! - `GET /health/live` — process liveness, no dependency checks
//! - `GET /health/ready` — readiness, fails if the database is unreachable

use axum::{Extension, Json};
use serde_json::{json, Value};

use crate::state::AppState;

pub async fn health(Extension(state): Extension<AppState>) -> Json<Value> {
    let database_ok = sqlx::query("SELECT 1").execute(&state.db_pool).await.is_ok();
    Json(json!({"status": if database_ok { "ok" } else { "degraded" }, "database": database_ok}))
}

pub async fn live() -> Json<Value> {
    Json(json!({"status": "ok"}))
}

pub async fn ready(Extension(state): Extension<AppState>) -> (axum::http::StatusCode, Json<Value>) {
    match sqlx::query("SELECT 1").execute(&state.db_pool).await {
        Ok(_) => (axum::http::StatusCode::OK, Json(json!({"status": "ready"}))),
        Err(err) => {
            tracing::warn!(error = %err, "readiness check failed");
            (axum::http::StatusCode::SERVICE_UNAVAILABLE, Json(json!({"status": "not_ready"})))
        }
    }
}

//! Maps `TesseraError` (and a handful of server-only error kinds) onto the
//! `{"error": {...}}` envelope every non-2xx response carries.

use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use chrono::Utc;
use serde_json::json;
use uuid::Uuid;

use tessera_core::error::{ErrorCode, TesseraError};

pub struct AppError {
    inner: TesseraError,
    request_id: Uuid,
}

impl AppError {
    pub fn new(inner: TesseraError, request_id: Uuid) -> Self {
        Self { inner, request_id }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.inner.http_status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        if matches!(self.inner, TesseraError::Internal(_)) {
            tracing::error!(error = %self.inner, request_id = %self.request_id, "internal error");
        }
        let body = json!({
            "error": {
                "code": self.inner.code(),
                "message": self.inner.to_string(),
                "request_id": self.request_id,
                "timestamp": Utc::now().to_rfc3339(),
            }
        });
        (status, Json(body)).into_response()
    }
}

/// Surfaces axum's own body-extraction failures (malformed JSON) as the
/// same envelope, under the `422` status §6 reserves for body-schema
/// validation.
pub struct BodyRejection(pub JsonRejection, pub Uuid);

impl IntoResponse for BodyRejection {
    fn into_response(self) -> Response {
        let body = json!({
            "error": {
                "code": ErrorCode::ValidationError,
                "message": self.0.body_text(),
                "request_id": self.1,
                "timestamp": Utc::now().to_rfc3339(),
            }
        });
        (StatusCode::UNPROCESSABLE_ENTITY, Json(body)).into_response()
    }
}

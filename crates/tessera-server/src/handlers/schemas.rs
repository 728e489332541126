//! POST /schemas/validate — standalone well-formedness check, independent
//! of any asset or contract.

use axum::Json;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use tessera_core::validation::validate_schema;

#[derive(Debug, Deserialize)]
pub struct ValidateSchemaRequest {
    pub schema: Value,
}

#[derive(Debug, Serialize)]
pub struct ValidateSchemaResponse {
    pub valid: bool,
    pub error: Option<String>,
}

pub async fn validate(Json(body): Json<ValidateSchemaRequest>) -> Json<ValidateSchemaResponse> {
    match validate_schema(&body.schema) {
        Ok(()) => Json(ValidateSchemaResponse { valid: true, error: None }),
        Err(e) => Json(ValidateSchemaResponse { valid: false, error: Some(e.to_string()) }),
    }
}

//! Shared input validation: FQN shape, schema size/well-formedness, semver
//! strictness. Handlers call into here rather than inlining checks so every
//! endpoint rejects malformed input the same way.

use serde_json::Value;

use crate::error::{ErrorCode, Result, TesseraError};
use crate::version::parse_semver;

pub const MAX_SCHEMA_BYTES: usize = 1_048_576;

/// A fully qualified asset name: two or more `[A-Za-z_][A-Za-z0-9_]*`
/// segments joined by dots, e.g. `warehouse.raw.orders`.
pub fn validate_fqn(fqn: &str) -> Result<()> {
    let segments: Vec<&str> = fqn.split('.').collect();
    if segments.len() < 2 {
        return Err(TesseraError::validation(format!(
            "fqn '{fqn}' must have at least 2 dot-separated segments"
        )));
    }
    for segment in &segments {
        if !is_valid_identifier(segment) {
            return Err(TesseraError::validation(format!(
                "fqn '{fqn}' has invalid segment '{segment}'"
            )));
        }
    }
    Ok(())
}

fn is_valid_identifier(segment: &str) -> bool {
    let mut chars = segment.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Strict semver, used wherever a caller supplies a version rather than the
/// server computing one (pinned registrations, manual overrides).
pub fn validate_semver(version: &str) -> Result<()> {
    parse_semver(version)
        .map(|_| ())
        .map_err(|e| TesseraError::Validation {
            code: ErrorCode::InvalidSemver,
            message: e,
            field_errors: Vec::new(),
        })
}

/// Rejects oversized or structurally unusable schema payloads. A schema
/// must be a JSON object; anything else (array, scalar) cannot carry
/// `properties`/`required` and is never valid here.
pub fn validate_schema(schema: &Value) -> Result<()> {
    let serialized = serde_json::to_vec(schema).map_err(|e| TesseraError::validation(e.to_string()))?;
    if serialized.len() > MAX_SCHEMA_BYTES {
        return Err(TesseraError::Validation {
            code: ErrorCode::SchemaTooLarge,
            message: format!(
                "schema is {} bytes, exceeds the {MAX_SCHEMA_BYTES} byte limit",
                serialized.len()
            ),
            field_errors: Vec::new(),
        });
    }
    if !schema.is_object() {
        return Err(TesseraError::Validation {
            code: ErrorCode::InvalidSchema,
            message: "schema must be a JSON object".to_string(),
            field_errors: Vec::new(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn accepts_multi_segment_fqn() {
        assert!(validate_fqn("warehouse.raw.orders").is_ok());
        assert!(validate_fqn("a.b").is_ok());
    }

    #[test]
    fn rejects_single_segment_fqn() {
        assert!(validate_fqn("orders").is_err());
    }

    #[test]
    fn rejects_fqn_with_bad_characters() {
        assert!(validate_fqn("warehouse.raw-orders").is_err());
        assert!(validate_fqn("warehouse.1orders").is_err());
    }

    #[test]
    fn schema_must_be_an_object() {
        assert!(validate_schema(&json!({"type": "object"})).is_ok());
        assert!(validate_schema(&json!([1, 2, 3])).is_err());
    }

    #[test]
    fn schema_over_size_cap_is_rejected() {
        let huge = "x".repeat(MAX_SCHEMA_BYTES + 1);
        let schema = json!({"type": "string", "description": huge});
        assert!(validate_schema(&schema).is_err());
    }

    #[test]
    fn semver_validation_matches_parser() {
        assert!(validate_semver("1.2.3").is_ok());
        assert!(validate_semver("1.2").is_err());
    }
}

//! Normalizes an Avro schema (already parsed into JSON by the caller; this
//! crate never touches an Avro IDL parser) into the JSON-Schema-like shape
//! [`crate::differ`] understands. The differ never sees raw Avro.

use serde_json::{json, Map, Value};

use crate::error::{Result, TesseraError};

/// Converts a parsed Avro schema document into the JSON-Schema-like model.
/// Only the record/primitive/array/map/union/enum shapes needed to diff a
/// data contract are handled; anything else is rejected rather than
/// silently dropped.
pub fn normalize_avro_schema(avro: &Value) -> Result<Value> {
    convert(avro)
}

fn convert(node: &Value) -> Result<Value> {
    match node {
        Value::String(type_name) => convert_primitive(type_name),
        Value::Array(variants) => convert_union(variants),
        Value::Object(obj) => convert_object(obj),
        other => Err(TesseraError::validation(format!(
            "unsupported avro schema node: {other}"
        ))),
    }
}

fn convert_primitive(type_name: &str) -> Result<Value> {
    let json_type = match type_name {
        "null" => "null",
        "boolean" => "boolean",
        "int" | "long" => "integer",
        "float" | "double" => "number",
        "bytes" | "string" => "string",
        other => {
            return Err(TesseraError::validation(format!(
                "unknown avro primitive type '{other}'"
            )))
        }
    };
    Ok(json!({ "type": json_type }))
}

/// An Avro union `["null", T]` (in either order) becomes a nullable `T`; any
/// other union is treated as the first non-null branch, the closest
/// approximation a single JSON Schema node can express.
fn convert_union(variants: &[Value]) -> Result<Value> {
    let has_null = variants.iter().any(|v| v.as_str() == Some("null"));
    let non_null: Vec<&Value> = variants
        .iter()
        .filter(|v| v.as_str() != Some("null"))
        .collect();

    let mut converted = match non_null.first() {
        Some(first) => convert(first)?,
        None => json!({ "type": "null" }),
    };
    if has_null {
        if let Some(obj) = converted.as_object_mut() {
            obj.insert("nullable".to_string(), json!(true));
        }
    }
    Ok(converted)
}

fn convert_object(obj: &Map<String, Value>) -> Result<Value> {
    match obj.get("type").and_then(Value::as_str) {
        Some("record") => convert_record(obj),
        Some("array") => convert_array(obj),
        Some("map") => convert_map(obj),
        Some("enum") => convert_enum(obj),
        Some(primitive) => convert_primitive(primitive),
        None => Err(TesseraError::validation(
            "avro schema node missing 'type'".to_string(),
        )),
    }
}

fn convert_record(obj: &Map<String, Value>) -> Result<Value> {
    let fields = obj
        .get("fields")
        .and_then(Value::as_array)
        .ok_or_else(|| TesseraError::validation("avro record missing 'fields'".to_string()))?;

    let mut properties = Map::new();
    let mut required = Vec::new();
    for field in fields {
        let name = field
            .get("name")
            .and_then(Value::as_str)
            .ok_or_else(|| TesseraError::validation("avro field missing 'name'".to_string()))?;
        let field_type = field
            .get("type")
            .ok_or_else(|| TesseraError::validation(format!("avro field '{name}' missing 'type'")))?;
        let converted = convert(field_type)?;
        let is_nullable = converted.get("nullable").and_then(Value::as_bool).unwrap_or(false);
        if field.get("default").is_none() && !is_nullable {
            required.push(json!(name));
        }
        properties.insert(name.to_string(), converted);
    }

    Ok(json!({
        "type": "object",
        "properties": Value::Object(properties),
        "required": required,
    }))
}

fn convert_array(obj: &Map<String, Value>) -> Result<Value> {
    let items = obj
        .get("items")
        .ok_or_else(|| TesseraError::validation("avro array missing 'items'".to_string()))?;
    Ok(json!({
        "type": "array",
        "items": convert(items)?,
    }))
}

fn convert_map(obj: &Map<String, Value>) -> Result<Value> {
    let values = obj
        .get("values")
        .ok_or_else(|| TesseraError::validation("avro map missing 'values'".to_string()))?;
    Ok(json!({
        "type": "object",
        "additionalProperties": convert(values)?,
    }))
}

fn convert_enum(obj: &Map<String, Value>) -> Result<Value> {
    let symbols = obj
        .get("symbols")
        .and_then(Value::as_array)
        .ok_or_else(|| TesseraError::validation("avro enum missing 'symbols'".to_string()))?;
    Ok(json!({
        "type": "string",
        "enum": symbols,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn converts_record_with_required_and_optional_fields() {
        let avro = json!({
            "type": "record",
            "name": "Order",
            "fields": [
                {"name": "id", "type": "long"},
                {"name": "note", "type": ["null", "string"], "default": null},
            ]
        });
        let schema = normalize_avro_schema(&avro).unwrap();
        assert_eq!(schema["type"], "object");
        assert_eq!(schema["properties"]["id"]["type"], "integer");
        assert_eq!(schema["properties"]["note"]["type"], "string");
        assert_eq!(schema["properties"]["note"]["nullable"], true);
        assert_eq!(schema["required"], json!(["id"]));
    }

    #[test]
    fn converts_array_and_map_and_enum() {
        let array = json!({"type": "array", "items": "string"});
        assert_eq!(normalize_avro_schema(&array).unwrap()["items"]["type"], "string");

        let map = json!({"type": "map", "values": "int"});
        assert_eq!(
            normalize_avro_schema(&map).unwrap()["additionalProperties"]["type"],
            "integer"
        );

        let en = json!({"type": "enum", "name": "Status", "symbols": ["A", "B"]});
        let converted = normalize_avro_schema(&en).unwrap();
        assert_eq!(converted["type"], "string");
        assert_eq!(converted["enum"], json!(["A", "B"]));
    }

    #[test]
    fn rejects_unknown_primitive() {
        assert!(normalize_avro_schema(&json!("decimal")).is_err());
    }
}

//! Pure translation from already-parsed external manifests (dbt's
//! `manifest.json`, an OpenAPI document, a GraphQL introspection result)
//! into the JSON-Schema-like model the rest of the core operates on. No I/O
//! happens here; callers own fetching the manifest and persisting the
//! result.

use std::collections::HashMap;

use serde_json::{json, Map, Value};

/// One asset discovered in an external manifest, ready to upsert.
#[derive(Debug, Clone)]
pub struct ConnectorAsset {
    pub fqn: String,
    pub resource_type: String,
    pub schema: Value,
    pub metadata: Value,
}

fn dbt_type_to_json_type(data_type: &str) -> &'static str {
    let base = data_type.split('(').next().unwrap_or(data_type).trim().to_lowercase();
    match base.as_str() {
        "string" | "text" | "varchar" | "char" | "character varying" => "string",
        "integer" | "int" | "bigint" | "smallint" | "int64" | "int32" => "integer",
        "number" | "numeric" | "decimal" | "float" | "double" | "real" | "float64" => "number",
        "boolean" | "bool" => "boolean",
        "date" | "datetime" | "timestamp" | "timestamp_ntz" | "timestamp_tz" | "time" => "string",
        "json" | "jsonb" | "variant" | "object" => "object",
        "array" => "array",
        _ => "string",
    }
}

/// Converts a dbt node's `columns` map into a JSON Schema object, the same
/// shape `validate_schema` and the differ operate on elsewhere in the core.
pub fn dbt_columns_to_json_schema(columns: &Map<String, Value>) -> Value {
    let mut properties = Map::new();
    for (name, info) in columns {
        let data_type = info.get("data_type").and_then(Value::as_str).unwrap_or("string");
        let mut property = Map::new();
        property.insert("type".to_string(), json!(dbt_type_to_json_type(data_type)));
        if let Some(description) = info.get("description").and_then(Value::as_str) {
            if !description.is_empty() {
                property.insert("description".to_string(), json!(description));
            }
        }
        properties.insert(name.clone(), Value::Object(property));
    }
    json!({
        "type": "object",
        "properties": properties,
        "required": Vec::<String>::new(),
    })
}

fn dbt_entry_to_asset(node_id: &str, resource_type: &str, node: &Value) -> Option<ConnectorAsset> {
    let database = node.get("database").and_then(Value::as_str).unwrap_or("");
    let schema = node.get("schema").and_then(Value::as_str).unwrap_or("");
    let name = node.get("name").and_then(Value::as_str)?;
    let fqn = format!("{database}.{schema}.{name}").to_lowercase();
    let columns = node.get("columns").and_then(Value::as_object).cloned().unwrap_or_default();

    Some(ConnectorAsset {
        fqn,
        resource_type: resource_type.to_string(),
        schema: dbt_columns_to_json_schema(&columns),
        metadata: json!({
            "dbt_node_id": node_id,
            "resource_type": resource_type,
            "description": node.get("description").and_then(Value::as_str).unwrap_or(""),
            "tags": node.get("tags").cloned().unwrap_or_else(|| json!([])),
        }),
    })
}

/// Every model/seed/snapshot node plus every source in a dbt `manifest.json`,
/// translated to `ConnectorAsset`s. Anything else under `nodes` (tests,
/// analyses, macros) is ignored.
pub fn dbt_manifest_to_assets(manifest: &Value) -> Vec<ConnectorAsset> {
    let mut assets = Vec::new();
    if let Some(nodes) = manifest.get("nodes").and_then(Value::as_object) {
        for (node_id, node) in nodes {
            let resource_type = node.get("resource_type").and_then(Value::as_str).unwrap_or("");
            if !matches!(resource_type, "model" | "seed" | "snapshot") {
                continue;
            }
            if let Some(asset) = dbt_entry_to_asset(node_id, resource_type, node) {
                assets.push(asset);
            }
        }
    }
    if let Some(sources) = manifest.get("sources").and_then(Value::as_object) {
        for (source_id, source) in sources {
            if let Some(asset) = dbt_entry_to_asset(source_id, "source", source) {
                assets.push(asset);
            }
        }
    }
    assets
}

/// `components.schemas.*` from an OpenAPI 3 document, one asset per schema
/// object, fqn `{api_title}.{schema_name}`.
pub fn openapi_to_assets(document: &Value) -> Vec<ConnectorAsset> {
    let api_title = document
        .pointer("/info/title")
        .and_then(Value::as_str)
        .unwrap_or("api")
        .to_lowercase()
        .replace(' ', "_");
    let mut assets = Vec::new();
    if let Some(schemas) = document.pointer("/components/schemas").and_then(Value::as_object) {
        for (name, schema) in schemas {
            assets.push(ConnectorAsset {
                fqn: format!("{api_title}.{}", name.to_lowercase()),
                resource_type: "api_schema".to_string(),
                schema: schema.clone(),
                metadata: json!({"source": "openapi", "schema_name": name}),
            });
        }
    }
    assets
}

/// GraphQL introspection's `__schema.types`, one asset per object type that
/// isn't a GraphQL built-in (`__`-prefixed).
pub fn graphql_to_assets(introspection: &Value) -> Vec<ConnectorAsset> {
    let mut assets = Vec::new();
    let Some(types) = introspection.pointer("/data/__schema/types").and_then(Value::as_array) else {
        return assets;
    };
    for gql_type in types {
        let Some(name) = gql_type.get("name").and_then(Value::as_str) else { continue };
        if name.starts_with("__") {
            continue;
        }
        if gql_type.get("kind").and_then(Value::as_str) != Some("OBJECT") {
            continue;
        }
        let mut properties = Map::new();
        if let Some(fields) = gql_type.get("fields").and_then(Value::as_array) {
            for field in fields {
                if let Some(field_name) = field.get("name").and_then(Value::as_str) {
                    properties.insert(field_name.to_string(), json!({"type": "string"}));
                }
            }
        }
        assets.push(ConnectorAsset {
            fqn: format!("graphql.{}", name.to_lowercase()),
            resource_type: "graphql_type".to_string(),
            schema: json!({"type": "object", "properties": properties, "required": Vec::<String>::new()}),
            metadata: json!({"source": "graphql", "type_name": name}),
        });
    }
    assets
}

/// Tally of an upsert pass, returned to the caller for the HTTP response.
#[derive(Debug, Clone, Default)]
pub struct UpsertCounts {
    pub created: usize,
    pub updated: usize,
}

impl UpsertCounts {
    pub fn record(&mut self, existing: bool) {
        if existing {
            self.updated += 1;
        } else {
            self.created += 1;
        }
    }
}

/// Groups assets by fqn, last one wins — a manifest should never list the
/// same fqn twice, but connector input is untrusted.
pub fn dedup_by_fqn(assets: Vec<ConnectorAsset>) -> Vec<ConnectorAsset> {
    let mut by_fqn: HashMap<String, ConnectorAsset> = HashMap::new();
    for asset in assets {
        by_fqn.insert(asset.fqn.clone(), asset);
    }
    by_fqn.into_values().collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dbt_type_mapping_covers_common_warehouse_types() {
        assert_eq!(dbt_type_to_json_type("VARCHAR(256)"), "string");
        assert_eq!(dbt_type_to_json_type("bigint"), "integer");
        assert_eq!(dbt_type_to_json_type("numeric(10,2)"), "number");
        assert_eq!(dbt_type_to_json_type("boolean"), "boolean");
        assert_eq!(dbt_type_to_json_type("timestamp_ntz"), "string");
        assert_eq!(dbt_type_to_json_type("totally_unknown"), "string");
    }

    #[test]
    fn dbt_manifest_yields_models_and_sources_not_tests() {
        let manifest = json!({
            "nodes": {
                "model.proj.orders": {
                    "resource_type": "model",
                    "database": "warehouse",
                    "schema": "raw",
                    "name": "orders",
                    "columns": {"id": {"data_type": "bigint"}},
                },
                "test.proj.not_null_orders_id": {
                    "resource_type": "test",
                    "database": "warehouse",
                    "schema": "raw",
                    "name": "not_null_orders_id",
                },
            },
            "sources": {
                "source.proj.raw.events": {
                    "database": "warehouse",
                    "schema": "raw",
                    "name": "events",
                    "columns": {},
                }
            },
        });
        let assets = dbt_manifest_to_assets(&manifest);
        assert_eq!(assets.len(), 2);
        assert!(assets.iter().any(|a| a.fqn == "warehouse.raw.orders"));
        assert!(assets.iter().any(|a| a.fqn == "warehouse.raw.events"));
    }

    #[test]
    fn openapi_schemas_become_assets() {
        let doc = json!({
            "info": {"title": "Orders API"},
            "components": {"schemas": {"Order": {"type": "object"}}},
        });
        let assets = openapi_to_assets(&doc);
        assert_eq!(assets.len(), 1);
        assert_eq!(assets[0].fqn, "orders_api.order");
    }

    #[test]
    fn graphql_object_types_become_assets_ignoring_introspection_builtins() {
        let doc = json!({
            "data": {
                "__schema": {
                    "types": [
                        {"name": "__Type", "kind": "OBJECT", "fields": []},
                        {"name": "Order", "kind": "OBJECT", "fields": [{"name": "id"}]},
                        {"name": "OrderStatus", "kind": "ENUM", "fields": []},
                    ]
                }
            }
        });
        let assets = graphql_to_assets(&doc);
        assert_eq!(assets.len(), 1);
        assert_eq!(assets[0].fqn, "graphql.order");
    }
}

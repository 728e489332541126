//! Structural diff of two JSON-Schema-like documents (C1).
//!
//! The documents are plain `serde_json::Value` objects using the subset of
//! JSON Schema vocabulary this service understands: `type`, `properties`,
//! `required`, `enum`, `items`, `default`, `nullable`, and the numeric/string
//! constraint keywords (`minimum`, `maximum`, `minLength`, `maxLength`,
//! `pattern`, ...). Avro documents are normalized into this shape by
//! [`crate::avro`] before ever reaching this module.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::types::ChangeType;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeKind {
    PropertyAdded,
    PropertyRemoved,
    RequiredAdded,
    RequiredRemoved,
    TypeChanged,
    TypeWidened,
    TypeNarrowed,
    EnumValuesAdded,
    EnumValuesRemoved,
    ConstraintTightened,
    ConstraintRelaxed,
    DefaultAdded,
    DefaultRemoved,
    DefaultChanged,
    NullableAdded,
    NullableRemoved,
}

impl ChangeKind {
    /// The `change_type` this kind contributes on its own; `diff` takes the
    /// strongest kind observed across the whole document.
    fn severity(self) -> ChangeType {
        use ChangeKind::*;
        match self {
            PropertyRemoved | RequiredAdded | TypeChanged | TypeNarrowed
            | EnumValuesRemoved | ConstraintTightened => ChangeType::Major,
            PropertyAdded | TypeWidened | EnumValuesAdded | ConstraintRelaxed
            | RequiredRemoved | NullableAdded | NullableRemoved => ChangeType::Minor,
            DefaultAdded | DefaultRemoved | DefaultChanged => ChangeType::Patch,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Change {
    pub kind: ChangeKind,
    pub path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub old: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub new: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl Change {
    fn new(kind: ChangeKind, path: impl Into<String>) -> Self {
        Self {
            kind,
            path: path.into(),
            old: None,
            new: None,
            details: None,
        }
    }

    fn with_values(mut self, old: Option<Value>, new: Option<Value>) -> Self {
        self.old = old;
        self.new = new;
        self
    }

    fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiffResult {
    pub changes: Vec<Change>,
    pub change_type: ChangeType,
}

impl DiffResult {
    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }
}

const NUMERIC_TYPES: [&str; 2] = ["integer", "number"];

fn schema_type(schema: &Value) -> Option<&str> {
    schema.get("type").and_then(Value::as_str)
}

fn join_path(base: &str, segment: &str) -> String {
    if base.is_empty() {
        segment.to_string()
    } else {
        format!("{base}.{segment}")
    }
}

/// Diffs `old` against `new`, returning every observed [`Change`] plus the
/// strongest [`ChangeType`] across them (`patch` if there are none).
pub fn diff_schemas(old: &Value, new: &Value) -> DiffResult {
    let mut changes = Vec::new();
    diff_node(old, new, "", &mut changes);

    let change_type = changes
        .iter()
        .map(|c| c.kind.severity())
        .max()
        .unwrap_or(ChangeType::Patch);

    DiffResult {
        changes,
        change_type,
    }
}

fn diff_node(old: &Value, new: &Value, path: &str, changes: &mut Vec<Change>) {
    diff_type(old, new, path, changes);
    diff_nullable(old, new, path, changes);
    diff_enum(old, new, path, changes);
    diff_default(old, new, path, changes);
    diff_constraints(old, new, path, changes);
    diff_properties(old, new, path, changes);
    diff_required(old, new, path, changes);
    diff_items(old, new, path, changes);
}

fn diff_type(old: &Value, new: &Value, path: &str, changes: &mut Vec<Change>) {
    let (old_ty, new_ty) = (schema_type(old), schema_type(new));
    match (old_ty, new_ty) {
        (Some(o), Some(n)) if o != n => {
            let kind = if o == "integer" && n == "number" {
                ChangeKind::TypeWidened
            } else if o == "number" && n == "integer" {
                ChangeKind::TypeNarrowed
            } else {
                ChangeKind::TypeChanged
            };
            changes.push(
                Change::new(kind, join_path(path, "type")).with_values(
                    Some(Value::String(o.to_string())),
                    Some(Value::String(n.to_string())),
                ),
            );
        }
        _ => {}
    }
}

fn diff_nullable(old: &Value, new: &Value, path: &str, changes: &mut Vec<Change>) {
    let old_nullable = old.get("nullable").and_then(Value::as_bool).unwrap_or(false);
    let new_nullable = new.get("nullable").and_then(Value::as_bool).unwrap_or(false);
    if !old_nullable && new_nullable {
        changes.push(Change::new(ChangeKind::NullableAdded, join_path(path, "nullable")));
    } else if old_nullable && !new_nullable {
        changes.push(Change::new(ChangeKind::NullableRemoved, join_path(path, "nullable")));
    }
}

fn diff_enum(old: &Value, new: &Value, path: &str, changes: &mut Vec<Change>) {
    let old_set: Vec<&Value> = old.get("enum").and_then(Value::as_array).map(|a| a.iter().collect()).unwrap_or_default();
    let new_set: Vec<&Value> = new.get("enum").and_then(Value::as_array).map(|a| a.iter().collect()).unwrap_or_default();
    if old_set.is_empty() && new_set.is_empty() {
        return;
    }
    let removed: Vec<Value> = old_set
        .iter()
        .filter(|v| !new_set.contains(v))
        .map(|v| (*v).clone())
        .collect();
    let added: Vec<Value> = new_set
        .iter()
        .filter(|v| !old_set.contains(v))
        .map(|v| (*v).clone())
        .collect();
    if !removed.is_empty() {
        changes.push(
            Change::new(ChangeKind::EnumValuesRemoved, join_path(path, "enum"))
                .with_values(Some(Value::Array(removed)), None),
        );
    }
    if !added.is_empty() {
        changes.push(
            Change::new(ChangeKind::EnumValuesAdded, join_path(path, "enum"))
                .with_values(None, Some(Value::Array(added))),
        );
    }
}

fn diff_default(old: &Value, new: &Value, path: &str, changes: &mut Vec<Change>) {
    let old_default = old.get("default");
    let new_default = new.get("default");
    match (old_default, new_default) {
        (None, Some(n)) => {
            changes.push(
                Change::new(ChangeKind::DefaultAdded, join_path(path, "default"))
                    .with_values(None, Some(n.clone())),
            );
        }
        (Some(o), None) => {
            changes.push(
                Change::new(ChangeKind::DefaultRemoved, join_path(path, "default"))
                    .with_values(Some(o.clone()), None),
            );
        }
        (Some(o), Some(n)) if o != n => {
            changes.push(
                Change::new(ChangeKind::DefaultChanged, join_path(path, "default"))
                    .with_values(Some(o.clone()), Some(n.clone())),
            );
        }
        _ => {}
    }
}

/// Numeric/string constraint keywords checked for tightening/relaxation.
/// `raises` means "a larger value is stricter" (minimums); `lowers` means
/// the opposite (maximums).
const RAISING_CONSTRAINTS: [&str; 2] = ["minimum", "minLength"];
const LOWERING_CONSTRAINTS: [&str; 2] = ["maximum", "maxLength"];

fn diff_constraints(old: &Value, new: &Value, path: &str, changes: &mut Vec<Change>) {
    for key in RAISING_CONSTRAINTS {
        if let (Some(o), Some(n)) = (as_f64(old.get(key)), as_f64(new.get(key))) {
            if n > o {
                changes.push(constraint_change(true, path, key, o, n));
            } else if n < o {
                changes.push(constraint_change(false, path, key, o, n));
            }
        } else if old.get(key).is_none() && new.get(key).is_some() {
            changes.push(
                Change::new(ChangeKind::ConstraintTightened, join_path(path, key))
                    .with_details(format!("{key} added")),
            );
        } else if old.get(key).is_some() && new.get(key).is_none() {
            changes.push(
                Change::new(ChangeKind::ConstraintRelaxed, join_path(path, key))
                    .with_details(format!("{key} removed")),
            );
        }
    }
    for key in LOWERING_CONSTRAINTS {
        if let (Some(o), Some(n)) = (as_f64(old.get(key)), as_f64(new.get(key))) {
            if n < o {
                changes.push(constraint_change(true, path, key, o, n));
            } else if n > o {
                changes.push(constraint_change(false, path, key, o, n));
            }
        } else if old.get(key).is_none() && new.get(key).is_some() {
            changes.push(
                Change::new(ChangeKind::ConstraintTightened, join_path(path, key))
                    .with_details(format!("{key} added")),
            );
        } else if old.get(key).is_some() && new.get(key).is_none() {
            changes.push(
                Change::new(ChangeKind::ConstraintRelaxed, join_path(path, key))
                    .with_details(format!("{key} removed")),
            );
        }
    }

    let old_pattern = old.get("pattern").and_then(Value::as_str);
    let new_pattern = new.get("pattern").and_then(Value::as_str);
    match (old_pattern, new_pattern) {
        (None, Some(_)) => {
            changes.push(
                Change::new(ChangeKind::ConstraintTightened, join_path(path, "pattern"))
                    .with_details("pattern added"),
            );
        }
        (Some(_), None) => {
            changes.push(
                Change::new(ChangeKind::ConstraintRelaxed, join_path(path, "pattern"))
                    .with_details("pattern removed"),
            );
        }
        (Some(o), Some(n)) if o != n => {
            // A changed pattern is treated conservatively as a tightening:
            // we cannot prove the new pattern is a superset of the old one.
            changes.push(
                Change::new(ChangeKind::ConstraintTightened, join_path(path, "pattern"))
                    .with_values(
                        Some(Value::String(o.to_string())),
                        Some(Value::String(n.to_string())),
                    ),
            );
        }
        _ => {}
    }
}

fn constraint_change(tightened: bool, path: &str, key: &str, old: f64, new: f64) -> Change {
    let kind = if tightened {
        ChangeKind::ConstraintTightened
    } else {
        ChangeKind::ConstraintRelaxed
    };
    Change::new(kind, join_path(path, key)).with_values(
        Some(serde_json::json!(old)),
        Some(serde_json::json!(new)),
    )
}

fn as_f64(value: Option<&Value>) -> Option<f64> {
    value.and_then(Value::as_f64)
}

fn diff_properties(old: &Value, new: &Value, path: &str, changes: &mut Vec<Change>) {
    let old_props = old.get("properties").and_then(Value::as_object);
    let new_props = new.get("properties").and_then(Value::as_object);
    let (old_props, new_props) = match (old_props, new_props) {
        (Some(o), Some(n)) => (o, n),
        (Some(o), None) => {
            for key in o.keys() {
                changes.push(Change::new(
                    ChangeKind::PropertyRemoved,
                    join_path(&join_path(path, "properties"), key),
                ));
            }
            return;
        }
        (None, Some(n)) => {
            for key in n.keys() {
                changes.push(Change::new(
                    ChangeKind::PropertyAdded,
                    join_path(&join_path(path, "properties"), key),
                ));
            }
            return;
        }
        (None, None) => return,
    };

    for (key, old_value) in old_props {
        let prop_path = join_path(&join_path(path, "properties"), key);
        match new_props.get(key) {
            Some(new_value) => diff_node(old_value, new_value, &prop_path, changes),
            None => changes.push(Change::new(ChangeKind::PropertyRemoved, prop_path)),
        }
    }
    for key in new_props.keys() {
        if !old_props.contains_key(key) {
            changes.push(Change::new(
                ChangeKind::PropertyAdded,
                join_path(&join_path(path, "properties"), key),
            ));
        }
    }
}

fn diff_required(old: &Value, new: &Value, path: &str, changes: &mut Vec<Change>) {
    let old_required = string_array(old.get("required"));
    let new_required = string_array(new.get("required"));
    for field in &new_required {
        if !old_required.contains(field) {
            changes.push(
                Change::new(ChangeKind::RequiredAdded, join_path(path, "required"))
                    .with_values(None, Some(Value::String(field.clone()))),
            );
        }
    }
    for field in &old_required {
        if !new_required.contains(field) {
            changes.push(
                Change::new(ChangeKind::RequiredRemoved, join_path(path, "required"))
                    .with_values(Some(Value::String(field.clone())), None),
            );
        }
    }
}

fn string_array(value: Option<&Value>) -> Vec<String> {
    value
        .and_then(Value::as_array)
        .map(|arr| arr.iter().filter_map(Value::as_str).map(str::to_owned).collect())
        .unwrap_or_default()
}

fn diff_items(old: &Value, new: &Value, path: &str, changes: &mut Vec<Change>) {
    if let (Some(old_items), Some(new_items)) = (old.get("items"), new.get("items")) {
        diff_node(old_items, new_items, &join_path(path, "items"), changes);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn base_schema() -> Value {
        json!({
            "type": "object",
            "properties": {
                "id": {"type": "integer"},
                "email": {"type": "string"}
            },
            "required": ["id", "email"]
        })
    }

    #[test]
    fn identical_schemas_produce_no_changes() {
        let schema = base_schema();
        let result = diff_schemas(&schema, &schema);
        assert!(result.is_empty());
        assert_eq!(result.change_type, ChangeType::Patch);
    }

    #[test]
    fn added_optional_property_is_minor() {
        let old = base_schema();
        let mut new = base_schema();
        new["properties"]["name"] = json!({"type": "string"});
        let result = diff_schemas(&old, &new);
        assert_eq!(result.change_type, ChangeType::Minor);
        assert!(result
            .changes
            .iter()
            .any(|c| c.kind == ChangeKind::PropertyAdded && c.path == "properties.name"));
    }

    #[test]
    fn removed_required_property_is_major() {
        let old = base_schema();
        let mut new = base_schema();
        new["properties"].as_object_mut().unwrap().remove("email");
        new["required"] = json!(["id"]);
        let result = diff_schemas(&old, &new);
        assert_eq!(result.change_type, ChangeType::Major);
        assert!(result
            .changes
            .iter()
            .any(|c| c.kind == ChangeKind::PropertyRemoved && c.path == "properties.email"));
        assert!(result
            .changes
            .iter()
            .any(|c| c.kind == ChangeKind::RequiredRemoved));
    }

    #[test]
    fn widened_numeric_type_is_minor() {
        let old = base_schema();
        let mut new = base_schema();
        new["properties"]["id"]["type"] = json!("number");
        let result = diff_schemas(&old, &new);
        assert_eq!(result.change_type, ChangeType::Minor);
        assert!(result.changes.iter().any(|c| c.kind == ChangeKind::TypeWidened));
    }

    #[test]
    fn narrowed_numeric_type_is_major() {
        let mut old = base_schema();
        old["properties"]["id"]["type"] = json!("number");
        let new = base_schema();
        let result = diff_schemas(&old, &new);
        assert_eq!(result.change_type, ChangeType::Major);
        assert!(result.changes.iter().any(|c| c.kind == ChangeKind::TypeNarrowed));
    }

    #[test]
    fn tightened_constraint_is_major() {
        let mut old = base_schema();
        old["properties"]["email"]["maxLength"] = json!(255);
        let mut new = base_schema();
        new["properties"]["email"]["maxLength"] = json!(50);
        let result = diff_schemas(&old, &new);
        assert_eq!(result.change_type, ChangeType::Major);
        assert!(result
            .changes
            .iter()
            .any(|c| c.kind == ChangeKind::ConstraintTightened));
    }

    #[test]
    fn new_required_field_with_default_is_still_major() {
        let old = base_schema();
        let mut new = base_schema();
        new["properties"]["tier"] = json!({"type": "string", "default": "free"});
        new["required"] = json!(["id", "email", "tier"]);
        let result = diff_schemas(&old, &new);
        assert_eq!(result.change_type, ChangeType::Major);
        assert!(result.changes.iter().any(|c| c.kind == ChangeKind::RequiredAdded));
    }
}

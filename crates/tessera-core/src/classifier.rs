//! Compatibility classification (C2): given a change list and a
//! [`CompatibilityMode`], decide which changes break that mode.

use crate::differ::{Change, ChangeKind, DiffResult};
use crate::types::CompatibilityMode;

fn breaks_backward(kind: ChangeKind) -> bool {
    matches!(
        kind,
        ChangeKind::PropertyRemoved
            | ChangeKind::RequiredAdded
            | ChangeKind::TypeChanged
            | ChangeKind::TypeNarrowed
            | ChangeKind::EnumValuesRemoved
            | ChangeKind::ConstraintTightened
    )
}

fn breaks_forward(kind: ChangeKind) -> bool {
    matches!(
        kind,
        ChangeKind::PropertyAdded
            | ChangeKind::RequiredRemoved
            | ChangeKind::TypeWidened
            | ChangeKind::EnumValuesAdded
            | ChangeKind::ConstraintRelaxed
    )
}

/// Whether a single change kind is breaking under `mode`.
pub fn breaks_mode(kind: ChangeKind, mode: CompatibilityMode) -> bool {
    match mode {
        CompatibilityMode::Backward => breaks_backward(kind),
        CompatibilityMode::Forward => breaks_forward(kind),
        CompatibilityMode::Full => breaks_backward(kind) || breaks_forward(kind),
        CompatibilityMode::None => false,
    }
}

/// Splits `diff.changes` into breaking and non-breaking changes for `mode`,
/// returning `(is_compatible, breaking_changes)`.
pub fn classify<'a>(diff: &'a DiffResult, mode: CompatibilityMode) -> (bool, Vec<&'a Change>) {
    let breaking: Vec<&Change> = diff
        .changes
        .iter()
        .filter(|c| breaks_mode(c.kind, mode))
        .collect();
    (breaking.is_empty(), breaking)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::differ::diff_schemas;
    use serde_json::json;

    #[test]
    fn empty_diff_is_always_compatible() {
        let schema = json!({"type": "object", "properties": {"id": {"type": "integer"}}});
        let diff = diff_schemas(&schema, &schema);
        for mode in [
            CompatibilityMode::Backward,
            CompatibilityMode::Forward,
            CompatibilityMode::Full,
            CompatibilityMode::None,
        ] {
            let (compatible, breaking) = classify(&diff, mode);
            assert!(compatible);
            assert!(breaking.is_empty());
        }
    }

    #[test]
    fn backward_mode_breaks_on_property_removal() {
        let old = json!({
            "type": "object",
            "properties": {"id": {"type": "integer"}, "email": {"type": "string"}},
            "required": ["id", "email"]
        });
        let mut new = old.clone();
        new["properties"].as_object_mut().unwrap().remove("email");
        new["required"] = json!(["id"]);
        let diff = diff_schemas(&old, &new);
        let (compatible, breaking) = classify(&diff, CompatibilityMode::Backward);
        assert!(!compatible);
        assert!(!breaking.is_empty());
    }

    #[test]
    fn forward_mode_breaks_on_property_addition_backward_does_not() {
        let old = json!({"type": "object", "properties": {"id": {"type": "integer"}}});
        let mut new = old.clone();
        new["properties"]["name"] = json!({"type": "string"});
        let diff = diff_schemas(&old, &new);

        let (compat_backward, _) = classify(&diff, CompatibilityMode::Backward);
        assert!(compat_backward);

        let (compat_forward, breaking_forward) = classify(&diff, CompatibilityMode::Forward);
        assert!(!compat_forward);
        assert!(!breaking_forward.is_empty());
    }

    #[test]
    fn none_mode_never_breaks() {
        let old = json!({"type": "object", "properties": {"id": {"type": "integer"}}, "required": ["id"]});
        let mut new = old.clone();
        new["properties"].as_object_mut().unwrap().remove("id");
        new["required"] = json!([]);
        let diff = diff_schemas(&old, &new);
        let (compatible, breaking) = classify(&diff, CompatibilityMode::None);
        assert!(compatible);
        assert!(breaking.is_empty());
    }

    #[test]
    fn full_mode_is_union_of_backward_and_forward() {
        let old = json!({"type": "object", "properties": {"id": {"type": "integer"}}});
        let mut new = old.clone();
        new["properties"]["name"] = json!({"type": "string"});
        let diff = diff_schemas(&old, &new);
        let (compatible, _) = classify(&diff, CompatibilityMode::Full);
        assert!(!compatible);
    }
}

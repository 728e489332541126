//! Publishing workflow (C4): pure decision logic for whether a proposed
//! schema can publish straight away or needs a proposal, both for a single
//! asset and for a batch. Persistence (locking the active contract row,
//! inserting the new one, recording audit events) lives in the server's
//! orchestration layer, which calls into this module for the decision.

use serde::Deserialize;
use serde_json::Value;
use uuid::Uuid;

use crate::classifier::classify;
use crate::differ::{diff_schemas, Change};
use crate::types::{ChangeType, CompatibilityMode, Contract};
use crate::version::compute_next_version;

#[derive(Debug, Clone)]
pub enum PublishDecision {
    /// No active contract yet for this asset: always publishable at
    /// [`crate::version::INITIAL_VERSION`].
    FirstContract { suggested_version: String },
    /// The proposed schema is byte-for-byte identical in shape to the
    /// active one; nothing to publish.
    NoChanges { current_version: String },
    /// Compatible under the asset's compatibility mode; can publish
    /// immediately, deprecating the current contract.
    Compatible {
        suggested_version: String,
        current_version: String,
        change_type: ChangeType,
    },
    /// Breaking under the asset's compatibility mode; publishing requires
    /// either `force` or routing through a proposal.
    Breaking {
        suggested_version: String,
        current_version: String,
        change_type: ChangeType,
        breaking_changes: Vec<Change>,
    },
}

/// What actually happened as a result of a publish call, once a decision
/// has been carried out against storage. A breaking change without `force`
/// never reaches here as `Published` — it's turned into a proposal instead.
#[derive(Debug, Clone)]
pub enum PublishOutcome {
    Published {
        contract: Contract,
        change_type: Option<ChangeType>,
    },
    ProposalCreated(crate::types::Proposal),
}

impl PublishDecision {
    pub fn is_breaking(&self) -> bool {
        matches!(self, Self::Breaking { .. })
    }
}

/// Decides what publishing `proposed_schema` against `current` would do.
/// `compat_mode_override` lets a publish request pick a compatibility mode
/// different from the current contract's (only meaningful once a contract
/// already exists; a first contract always uses the override or defaults
/// to [`CompatibilityMode::Backward`]).
pub fn decide_publish(
    current: Option<&Contract>,
    proposed_schema: &Value,
    compat_mode_override: Option<CompatibilityMode>,
) -> PublishDecision {
    let Some(current) = current else {
        return PublishDecision::FirstContract {
            suggested_version: crate::version::INITIAL_VERSION.to_string(),
        };
    };

    let mode = compat_mode_override.unwrap_or(current.compatibility_mode);
    let diff = diff_schemas(&current.schema_def, proposed_schema);

    if diff.is_empty() {
        return PublishDecision::NoChanges {
            current_version: current.version.clone(),
        };
    }

    let (is_compatible, breaking) = classify(&diff, mode);
    let suggested_version = compute_next_version(Some(&current.version), is_compatible, diff.change_type)
        .unwrap_or_else(|_| current.version.clone());

    if is_compatible {
        PublishDecision::Compatible {
            suggested_version,
            current_version: current.version.clone(),
            change_type: diff.change_type,
        }
    } else {
        PublishDecision::Breaking {
            suggested_version,
            current_version: current.version.clone(),
            change_type: diff.change_type,
            breaking_changes: breaking.into_iter().cloned().collect(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ContractToPublish {
    pub asset_id: Uuid,
    pub schema_def: Value,
    pub compatibility_mode: Option<CompatibilityMode>,
    pub guarantees: Option<crate::types::Guarantees>,
}

#[derive(Debug, Clone)]
pub enum BulkItemOutcome {
    AssetNotFound,
    PendingProposalExists,
    Decision(PublishDecision),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BulkItemStatus {
    WillPublish,
    WillSkip,
    Breaking,
    Published,
    Skipped,
    ProposalCreated,
    Failed,
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct BulkPublishItemResult {
    pub asset_id: Uuid,
    pub status: BulkItemStatus,
    pub contract_id: Option<Uuid>,
    pub proposal_id: Option<Uuid>,
    pub suggested_version: Option<String>,
    pub current_version: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub breaking_changes: Vec<Value>,
    pub reason: Option<String>,
    pub error: Option<String>,
}

impl BulkPublishItemResult {
    pub(crate) fn new(asset_id: Uuid, status: BulkItemStatus) -> Self {
        Self {
            asset_id,
            status,
            contract_id: None,
            proposal_id: None,
            suggested_version: None,
            current_version: None,
            breaking_changes: Vec::new(),
            reason: None,
            error: None,
        }
    }

    pub fn failed(asset_id: Uuid, error: impl Into<String>) -> Self {
        Self { error: Some(error.into()), ..Self::new(asset_id, BulkItemStatus::Failed) }
    }
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct BulkPublishResult {
    pub preview: bool,
    pub total: usize,
    pub published: usize,
    pub skipped: usize,
    pub proposals_created: usize,
    pub failed: usize,
    pub results: Vec<BulkPublishItemResult>,
}

impl BulkPublishResult {
    pub fn new(preview: bool, total: usize) -> Self {
        Self { preview, total, published: 0, skipped: 0, proposals_created: 0, failed: 0, results: Vec::new() }
    }

    pub fn record(&mut self, item: BulkPublishItemResult) {
        match item.status {
            BulkItemStatus::Published | BulkItemStatus::WillPublish => self.published += 1,
            BulkItemStatus::Skipped | BulkItemStatus::WillSkip => self.skipped += 1,
            BulkItemStatus::ProposalCreated => self.proposals_created += 1,
            BulkItemStatus::Failed | BulkItemStatus::Breaking => self.failed += 1,
        }
        self.results.push(item);
    }
}

/// Per-item decision for a bulk publish batch. `asset_exists` and
/// `has_pending_proposal` are pre-fetched by the caller in one batched
/// query each, keeping this function itself allocation-light and pure.
pub fn decide_bulk_item(
    item: &ContractToPublish,
    asset_exists: bool,
    has_pending_proposal: bool,
    current: Option<&Contract>,
) -> BulkItemOutcome {
    if !asset_exists {
        return BulkItemOutcome::AssetNotFound;
    }
    if has_pending_proposal {
        return BulkItemOutcome::PendingProposalExists;
    }
    BulkItemOutcome::Decision(decide_publish(
        current,
        &item.schema_def,
        item.compatibility_mode,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ContractStatus;
    use chrono::Utc;
    use serde_json::json;

    fn contract(schema: Value, mode: CompatibilityMode, version: &str) -> Contract {
        Contract {
            id: Uuid::new_v4(),
            asset_id: Uuid::new_v4(),
            version: version.to_string(),
            schema_def: schema,
            compatibility_mode: mode,
            guarantees: None,
            status: ContractStatus::Active,
            published_at: Utc::now(),
            published_by: Uuid::new_v4(),
            published_by_user_id: None,
        }
    }

    #[test]
    fn no_current_contract_is_always_first_contract() {
        let decision = decide_publish(None, &json!({"type": "object"}), None);
        matches!(decision, PublishDecision::FirstContract { .. });
    }

    #[test]
    fn identical_schema_is_no_changes() {
        let schema = json!({"type": "object", "properties": {"id": {"type": "integer"}}});
        let current = contract(schema.clone(), CompatibilityMode::Backward, "1.0.0");
        let decision = decide_publish(Some(&current), &schema, None);
        assert!(matches!(decision, PublishDecision::NoChanges { .. }));
    }

    #[test]
    fn compatible_addition_bumps_minor() {
        let old = json!({"type": "object", "properties": {"id": {"type": "integer"}}});
        let mut new = old.clone();
        new["properties"]["name"] = json!({"type": "string"});
        let current = contract(old, CompatibilityMode::Backward, "1.0.0");
        let decision = decide_publish(Some(&current), &new, None);
        match decision {
            PublishDecision::Compatible { suggested_version, .. } => {
                assert_eq!(suggested_version, "1.1.0");
            }
            other => panic!("expected Compatible, got {other:?}"),
        }
    }

    #[test]
    fn removing_required_property_is_breaking() {
        let old = json!({
            "type": "object",
            "properties": {"id": {"type": "integer"}, "email": {"type": "string"}},
            "required": ["id", "email"]
        });
        let mut new = old.clone();
        new["properties"].as_object_mut().unwrap().remove("email");
        new["required"] = json!(["id"]);
        let current = contract(old, CompatibilityMode::Backward, "1.0.0");
        let decision = decide_publish(Some(&current), &new, None);
        assert!(decision.is_breaking());
    }
}

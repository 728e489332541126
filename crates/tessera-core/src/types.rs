use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompatibilityMode {
    Backward,
    Forward,
    Full,
    None,
}

impl Default for CompatibilityMode {
    fn default() -> Self {
        Self::Backward
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContractStatus {
    Active,
    Deprecated,
    Retired,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RegistrationStatus {
    Active,
    Migrating,
    Inactive,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeType {
    Patch,
    Minor,
    Major,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProposalStatus {
    Pending,
    Approved,
    Rejected,
    Withdrawn,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AcknowledgmentResponse {
    Approved,
    Blocked,
    Migrating,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DependencyType {
    Consumes,
    References,
    Transforms,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApiKeyScope {
    Read,
    Write,
    Admin,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UserRole {
    User,
    TeamAdmin,
    Admin,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WebhookDeliveryStatus {
    Pending,
    Delivered,
    Failed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditRunStatus {
    Passed,
    Failed,
    Partial,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Team {
    pub id: Uuid,
    pub name: String,
    #[serde(default)]
    pub metadata: Value,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    pub name: String,
    pub team_id: Option<Uuid>,
    pub role: UserRole,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub deactivated_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Asset {
    pub id: Uuid,
    pub fqn: String,
    pub environment: String,
    pub owner_team_id: Uuid,
    pub resource_type: String,
    #[serde(default)]
    pub metadata: Value,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
}

impl Asset {
    /// Reads the `depends_on` hint an ingested asset can carry in its metadata:
    /// `{"depends_on": ["warehouse.raw.orders", ...]}`.
    pub fn depends_on_fqns(&self) -> Vec<String> {
        self.metadata
            .get("depends_on")
            .and_then(Value::as_array)
            .map(|arr| {
                arr.iter()
                    .filter_map(Value::as_str)
                    .map(str::to_owned)
                    .collect()
            })
            .unwrap_or_default()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Guarantees {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub freshness: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub volume: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nullability: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub accepted_values: Option<Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Contract {
    pub id: Uuid,
    pub asset_id: Uuid,
    pub version: String,
    pub schema_def: Value,
    pub compatibility_mode: CompatibilityMode,
    pub guarantees: Option<Guarantees>,
    pub status: ContractStatus,
    pub published_at: DateTime<Utc>,
    pub published_by: Uuid,
    pub published_by_user_id: Option<Uuid>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Registration {
    pub id: Uuid,
    pub contract_id: Uuid,
    pub consumer_team_id: Uuid,
    pub pinned_version: Option<String>,
    pub status: RegistrationStatus,
    pub registered_at: DateTime<Utc>,
    pub acknowledged_at: Option<DateTime<Utc>>,
    pub deleted_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Dependency {
    pub id: Uuid,
    pub dependent_asset_id: Uuid,
    pub dependency_asset_id: Uuid,
    pub dependency_type: DependencyType,
    pub created_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AffectedTeam {
    pub team_id: Uuid,
    pub team_name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AffectedAsset {
    pub asset_id: Uuid,
    pub fqn: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Proposal {
    pub id: Uuid,
    pub asset_id: Uuid,
    pub proposed_schema: Value,
    pub proposed_guarantees: Option<Guarantees>,
    pub change_type: ChangeType,
    pub breaking_changes: Vec<Value>,
    pub affected_teams: Vec<AffectedTeam>,
    pub affected_assets: Vec<AffectedAsset>,
    pub status: ProposalStatus,
    pub proposed_by: Uuid,
    pub proposed_by_user_id: Option<Uuid>,
    pub proposed_at: DateTime<Utc>,
    pub resolved_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Acknowledgment {
    pub id: Uuid,
    pub proposal_id: Uuid,
    pub consumer_team_id: Uuid,
    pub response: AcknowledgmentResponse,
    pub migration_deadline: Option<DateTime<Utc>>,
    pub responded_at: DateTime<Utc>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Objection {
    pub id: Uuid,
    pub proposal_id: Uuid,
    pub objector_team_id: Uuid,
    pub reason: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEvent {
    pub id: Uuid,
    pub entity_type: String,
    pub entity_id: Uuid,
    pub action: String,
    pub actor_id: Option<Uuid>,
    #[serde(default)]
    pub payload: Value,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditRun {
    pub id: Uuid,
    pub asset_id: Uuid,
    pub contract_id: Option<Uuid>,
    pub status: AuditRunStatus,
    pub guarantees_checked: i32,
    pub guarantees_passed: i32,
    pub guarantees_failed: i32,
    pub triggered_by: String,
    pub run_id: Option<String>,
    #[serde(default)]
    pub details: Value,
    pub run_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebhookDelivery {
    pub id: Uuid,
    pub event_type: String,
    pub payload: Value,
    pub url: String,
    pub status: WebhookDeliveryStatus,
    pub attempts: i32,
    pub last_attempt_at: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
    pub last_status_code: Option<i32>,
    pub delivered_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiKey {
    pub id: Uuid,
    pub key_hash: String,
    pub key_prefix: String,
    pub name: String,
    pub team_id: Uuid,
    pub scopes: Vec<ApiKeyScope>,
    pub expires_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub revoked_at: Option<DateTime<Utc>>,
}

/// Arbitrary key/value bag attached to entities at creation time; mirrors the
/// permissive JSON `metadata` column every soft-deletable entity carries.
pub type Metadata = HashMap<String, Value>;

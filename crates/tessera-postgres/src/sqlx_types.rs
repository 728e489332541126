//! Row structs mirroring the SQL column layout, with `TryFrom` conversions
//! into the domain types. `tessera-core` stays free of a `sqlx` dependency,
//! so its enums don't implement `sqlx::Type`; every enum column is cast to
//! `::text` in SQL and parsed here instead.

use anyhow::{anyhow, Result};
use chrono::{DateTime, Utc};
use serde_json::Value;
use sqlx::FromRow;
use uuid::Uuid;

use tessera_core::types::{
    AcknowledgmentResponse, AffectedAsset, AffectedTeam, ApiKey, ApiKeyScope, Asset, AuditEvent,
    AuditRun, AuditRunStatus, ChangeType, CompatibilityMode, Contract, ContractStatus,
    DependencyType, Guarantees, Objection, Proposal, ProposalStatus, Registration,
    RegistrationStatus, Team, User, UserRole, WebhookDelivery, WebhookDeliveryStatus,
};

use tessera_core::types::Acknowledgment;

fn parse_enum<T: Copy>(field: &str, raw: &str, variants: &[(&str, T)]) -> Result<T> {
    variants
        .iter()
        .find(|(name, _)| *name == raw)
        .map(|(_, value)| *value)
        .ok_or_else(|| anyhow!("unrecognized {field} value: {raw}"))
}

pub fn compatibility_mode_str(mode: CompatibilityMode) -> &'static str {
    match mode {
        CompatibilityMode::Backward => "backward",
        CompatibilityMode::Forward => "forward",
        CompatibilityMode::Full => "full",
        CompatibilityMode::None => "none",
    }
}

pub fn registration_status_str(status: RegistrationStatus) -> &'static str {
    match status {
        RegistrationStatus::Active => "active",
        RegistrationStatus::Migrating => "migrating",
        RegistrationStatus::Inactive => "inactive",
    }
}

pub fn dependency_type_str(dep: DependencyType) -> &'static str {
    match dep {
        DependencyType::Consumes => "consumes",
        DependencyType::References => "references",
        DependencyType::Transforms => "transforms",
    }
}

pub fn change_type_str(change: ChangeType) -> &'static str {
    match change {
        ChangeType::Patch => "patch",
        ChangeType::Minor => "minor",
        ChangeType::Major => "major",
    }
}

pub fn proposal_status_str(status: ProposalStatus) -> &'static str {
    match status {
        ProposalStatus::Pending => "pending",
        ProposalStatus::Approved => "approved",
        ProposalStatus::Rejected => "rejected",
        ProposalStatus::Withdrawn => "withdrawn",
    }
}

pub fn acknowledgment_response_str(response: AcknowledgmentResponse) -> &'static str {
    match response {
        AcknowledgmentResponse::Approved => "approved",
        AcknowledgmentResponse::Blocked => "blocked",
        AcknowledgmentResponse::Migrating => "migrating",
    }
}

pub fn audit_run_status_str(status: AuditRunStatus) -> &'static str {
    match status {
        AuditRunStatus::Passed => "passed",
        AuditRunStatus::Failed => "failed",
        AuditRunStatus::Partial => "partial",
    }
}

pub fn webhook_delivery_status_str(status: WebhookDeliveryStatus) -> &'static str {
    match status {
        WebhookDeliveryStatus::Pending => "pending",
        WebhookDeliveryStatus::Delivered => "delivered",
        WebhookDeliveryStatus::Failed => "failed",
    }
}

pub fn user_role_str(role: UserRole) -> &'static str {
    match role {
        UserRole::User => "user",
        UserRole::TeamAdmin => "team_admin",
        UserRole::Admin => "admin",
    }
}

pub fn api_key_scope_str(scope: ApiKeyScope) -> &'static str {
    match scope {
        ApiKeyScope::Read => "read",
        ApiKeyScope::Write => "write",
        ApiKeyScope::Admin => "admin",
    }
}

#[derive(Debug, FromRow)]
pub struct TeamRow {
    pub id: Uuid,
    pub name: String,
    pub metadata: Value,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
}

impl From<TeamRow> for Team {
    fn from(row: TeamRow) -> Self {
        Team {
            id: row.id,
            name: row.name,
            metadata: row.metadata,
            created_at: row.created_at,
            updated_at: row.updated_at,
            deleted_at: row.deleted_at,
        }
    }
}

#[derive(Debug, FromRow)]
pub struct UserRow {
    pub id: Uuid,
    pub email: String,
    pub name: String,
    pub team_id: Option<Uuid>,
    pub role: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub deactivated_at: Option<DateTime<Utc>>,
}

impl TryFrom<UserRow> for User {
    type Error = anyhow::Error;

    fn try_from(row: UserRow) -> Result<Self> {
        let role = parse_enum(
            "user role",
            &row.role,
            &[
                ("user", UserRole::User),
                ("team_admin", UserRole::TeamAdmin),
                ("admin", UserRole::Admin),
            ],
        )?;
        Ok(User {
            id: row.id,
            email: row.email,
            name: row.name,
            team_id: row.team_id,
            role,
            created_at: row.created_at,
            updated_at: row.updated_at,
            deactivated_at: row.deactivated_at,
        })
    }
}

#[derive(Debug, FromRow)]
pub struct AssetRow {
    pub id: Uuid,
    pub fqn: String,
    pub environment: String,
    pub owner_team_id: Uuid,
    pub resource_type: String,
    pub metadata: Value,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
}

impl From<AssetRow> for Asset {
    fn from(row: AssetRow) -> Self {
        Asset {
            id: row.id,
            fqn: row.fqn,
            environment: row.environment,
            owner_team_id: row.owner_team_id,
            resource_type: row.resource_type,
            metadata: row.metadata,
            created_at: row.created_at,
            updated_at: row.updated_at,
            deleted_at: row.deleted_at,
        }
    }
}

#[derive(Debug, FromRow)]
pub struct DependencyEdgeRow {
    pub id: Uuid,
    pub fqn: String,
    pub environment: String,
    pub owner_team_id: Uuid,
    pub resource_type: String,
    pub metadata: Value,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
    pub dependency_type: String,
}

impl TryFrom<DependencyEdgeRow> for (Asset, DependencyType) {
    type Error = anyhow::Error;

    fn try_from(row: DependencyEdgeRow) -> Result<Self> {
        let dependency_type = parse_enum(
            "dependency_type",
            &row.dependency_type,
            &[
                ("consumes", DependencyType::Consumes),
                ("references", DependencyType::References),
                ("transforms", DependencyType::Transforms),
            ],
        )?;
        let asset = Asset {
            id: row.id,
            fqn: row.fqn,
            environment: row.environment,
            owner_team_id: row.owner_team_id,
            resource_type: row.resource_type,
            metadata: row.metadata,
            created_at: row.created_at,
            updated_at: row.updated_at,
            deleted_at: row.deleted_at,
        };
        Ok((asset, dependency_type))
    }
}

#[derive(Debug, FromRow)]
pub struct ContractRow {
    pub id: Uuid,
    pub asset_id: Uuid,
    pub version: String,
    pub schema_def: Value,
    pub compatibility_mode: String,
    pub guarantees: Option<Value>,
    pub status: String,
    pub published_at: DateTime<Utc>,
    pub published_by: Uuid,
    pub published_by_user_id: Option<Uuid>,
}

impl TryFrom<ContractRow> for Contract {
    type Error = anyhow::Error;

    fn try_from(row: ContractRow) -> Result<Self> {
        let compatibility_mode = parse_enum(
            "compatibility_mode",
            &row.compatibility_mode,
            &[
                ("backward", CompatibilityMode::Backward),
                ("forward", CompatibilityMode::Forward),
                ("full", CompatibilityMode::Full),
                ("none", CompatibilityMode::None),
            ],
        )?;
        let status = parse_enum(
            "contract status",
            &row.status,
            &[
                ("active", ContractStatus::Active),
                ("deprecated", ContractStatus::Deprecated),
                ("retired", ContractStatus::Retired),
            ],
        )?;
        let guarantees = row
            .guarantees
            .map(serde_json::from_value::<Guarantees>)
            .transpose()?;
        Ok(Contract {
            id: row.id,
            asset_id: row.asset_id,
            version: row.version,
            schema_def: row.schema_def,
            compatibility_mode,
            guarantees,
            status,
            published_at: row.published_at,
            published_by: row.published_by,
            published_by_user_id: row.published_by_user_id,
        })
    }
}

#[derive(Debug, FromRow)]
pub struct RegistrationRow {
    pub id: Uuid,
    pub contract_id: Uuid,
    pub consumer_team_id: Uuid,
    pub pinned_version: Option<String>,
    pub status: String,
    pub registered_at: DateTime<Utc>,
    pub acknowledged_at: Option<DateTime<Utc>>,
    pub deleted_at: Option<DateTime<Utc>>,
}

impl TryFrom<RegistrationRow> for Registration {
    type Error = anyhow::Error;

    fn try_from(row: RegistrationRow) -> Result<Self> {
        let status = parse_enum(
            "registration status",
            &row.status,
            &[
                ("active", RegistrationStatus::Active),
                ("migrating", RegistrationStatus::Migrating),
                ("inactive", RegistrationStatus::Inactive),
            ],
        )?;
        Ok(Registration {
            id: row.id,
            contract_id: row.contract_id,
            consumer_team_id: row.consumer_team_id,
            pinned_version: row.pinned_version,
            status,
            registered_at: row.registered_at,
            acknowledged_at: row.acknowledged_at,
            deleted_at: row.deleted_at,
        })
    }
}

#[derive(Debug, FromRow)]
pub struct RegistrationWithTeamRow {
    pub id: Uuid,
    pub contract_id: Uuid,
    pub consumer_team_id: Uuid,
    pub pinned_version: Option<String>,
    pub status: String,
    pub registered_at: DateTime<Utc>,
    pub acknowledged_at: Option<DateTime<Utc>>,
    pub deleted_at: Option<DateTime<Utc>>,
    pub team_name: String,
    pub team_metadata: Value,
    pub team_created_at: DateTime<Utc>,
    pub team_updated_at: DateTime<Utc>,
    pub team_deleted_at: Option<DateTime<Utc>>,
}

impl TryFrom<RegistrationWithTeamRow> for (Registration, Team) {
    type Error = anyhow::Error;

    fn try_from(row: RegistrationWithTeamRow) -> Result<Self> {
        let status = parse_enum(
            "registration status",
            &row.status,
            &[
                ("active", RegistrationStatus::Active),
                ("migrating", RegistrationStatus::Migrating),
                ("inactive", RegistrationStatus::Inactive),
            ],
        )?;
        let registration = Registration {
            id: row.id,
            contract_id: row.contract_id,
            consumer_team_id: row.consumer_team_id,
            pinned_version: row.pinned_version,
            status,
            registered_at: row.registered_at,
            acknowledged_at: row.acknowledged_at,
            deleted_at: row.deleted_at,
        };
        let team = Team {
            id: row.consumer_team_id,
            name: row.team_name,
            metadata: row.team_metadata,
            created_at: row.team_created_at,
            updated_at: row.team_updated_at,
            deleted_at: row.team_deleted_at,
        };
        Ok((registration, team))
    }
}

#[derive(Debug, FromRow)]
pub struct ProposalRow {
    pub id: Uuid,
    pub asset_id: Uuid,
    pub proposed_schema: Value,
    pub proposed_guarantees: Option<Value>,
    pub change_type: String,
    pub breaking_changes: Value,
    pub affected_teams: Value,
    pub affected_assets: Value,
    pub status: String,
    pub proposed_by: Uuid,
    pub proposed_by_user_id: Option<Uuid>,
    pub proposed_at: DateTime<Utc>,
    pub resolved_at: Option<DateTime<Utc>>,
}

impl TryFrom<ProposalRow> for Proposal {
    type Error = anyhow::Error;

    fn try_from(row: ProposalRow) -> Result<Self> {
        let change_type = parse_enum(
            "change_type",
            &row.change_type,
            &[
                ("patch", ChangeType::Patch),
                ("minor", ChangeType::Minor),
                ("major", ChangeType::Major),
            ],
        )?;
        let status = parse_enum(
            "proposal status",
            &row.status,
            &[
                ("pending", ProposalStatus::Pending),
                ("approved", ProposalStatus::Approved),
                ("rejected", ProposalStatus::Rejected),
                ("withdrawn", ProposalStatus::Withdrawn),
            ],
        )?;
        let proposed_guarantees = row
            .proposed_guarantees
            .map(serde_json::from_value::<Guarantees>)
            .transpose()?;
        let breaking_changes: Vec<Value> = serde_json::from_value(row.breaking_changes)?;
        let affected_teams: Vec<AffectedTeam> = serde_json::from_value(row.affected_teams)?;
        let affected_assets: Vec<AffectedAsset> = serde_json::from_value(row.affected_assets)?;
        Ok(Proposal {
            id: row.id,
            asset_id: row.asset_id,
            proposed_schema: row.proposed_schema,
            proposed_guarantees,
            change_type,
            breaking_changes,
            affected_teams,
            affected_assets,
            status,
            proposed_by: row.proposed_by,
            proposed_by_user_id: row.proposed_by_user_id,
            proposed_at: row.proposed_at,
            resolved_at: row.resolved_at,
        })
    }
}

#[derive(Debug, FromRow)]
pub struct AcknowledgmentRow {
    pub id: Uuid,
    pub proposal_id: Uuid,
    pub consumer_team_id: Uuid,
    pub response: String,
    pub migration_deadline: Option<DateTime<Utc>>,
    pub responded_at: DateTime<Utc>,
    pub notes: Option<String>,
}

impl TryFrom<AcknowledgmentRow> for Acknowledgment {
    type Error = anyhow::Error;

    fn try_from(row: AcknowledgmentRow) -> Result<Self> {
        let response = parse_enum(
            "acknowledgment response",
            &row.response,
            &[
                ("approved", AcknowledgmentResponse::Approved),
                ("blocked", AcknowledgmentResponse::Blocked),
                ("migrating", AcknowledgmentResponse::Migrating),
            ],
        )?;
        Ok(Acknowledgment {
            id: row.id,
            proposal_id: row.proposal_id,
            consumer_team_id: row.consumer_team_id,
            response,
            migration_deadline: row.migration_deadline,
            responded_at: row.responded_at,
            notes: row.notes,
        })
    }
}

#[derive(Debug, FromRow)]
pub struct ObjectionRow {
    pub id: Uuid,
    pub proposal_id: Uuid,
    pub objector_team_id: Uuid,
    pub reason: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl From<ObjectionRow> for Objection {
    fn from(row: ObjectionRow) -> Self {
        Objection {
            id: row.id,
            proposal_id: row.proposal_id,
            objector_team_id: row.objector_team_id,
            reason: row.reason,
            created_at: row.created_at,
        }
    }
}

#[derive(Debug, FromRow)]
pub struct AuditEventRow {
    pub id: Uuid,
    pub entity_type: String,
    pub entity_id: Uuid,
    pub action: String,
    pub actor_id: Option<Uuid>,
    pub payload: Value,
    pub occurred_at: DateTime<Utc>,
}

impl From<AuditEventRow> for AuditEvent {
    fn from(row: AuditEventRow) -> Self {
        AuditEvent {
            id: row.id,
            entity_type: row.entity_type,
            entity_id: row.entity_id,
            action: row.action,
            actor_id: row.actor_id,
            payload: row.payload,
            occurred_at: row.occurred_at,
        }
    }
}

#[derive(Debug, FromRow)]
pub struct AuditRunRow {
    pub id: Uuid,
    pub asset_id: Uuid,
    pub contract_id: Option<Uuid>,
    pub status: String,
    pub guarantees_checked: i32,
    pub guarantees_passed: i32,
    pub guarantees_failed: i32,
    pub triggered_by: String,
    pub run_id: Option<String>,
    pub details: Value,
    pub run_at: DateTime<Utc>,
}

impl TryFrom<AuditRunRow> for AuditRun {
    type Error = anyhow::Error;

    fn try_from(row: AuditRunRow) -> Result<Self> {
        let status = parse_enum(
            "audit run status",
            &row.status,
            &[
                ("passed", AuditRunStatus::Passed),
                ("failed", AuditRunStatus::Failed),
                ("partial", AuditRunStatus::Partial),
            ],
        )?;
        Ok(AuditRun {
            id: row.id,
            asset_id: row.asset_id,
            contract_id: row.contract_id,
            status,
            guarantees_checked: row.guarantees_checked,
            guarantees_passed: row.guarantees_passed,
            guarantees_failed: row.guarantees_failed,
            triggered_by: row.triggered_by,
            run_id: row.run_id,
            details: row.details,
            run_at: row.run_at,
        })
    }
}

#[derive(Debug, FromRow)]
pub struct WebhookDeliveryRow {
    pub id: Uuid,
    pub event_type: String,
    pub payload: Value,
    pub url: String,
    pub status: String,
    pub attempts: i32,
    pub last_attempt_at: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
    pub last_status_code: Option<i32>,
    pub delivered_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl TryFrom<WebhookDeliveryRow> for WebhookDelivery {
    type Error = anyhow::Error;

    fn try_from(row: WebhookDeliveryRow) -> Result<Self> {
        let status = parse_enum(
            "webhook delivery status",
            &row.status,
            &[
                ("pending", WebhookDeliveryStatus::Pending),
                ("delivered", WebhookDeliveryStatus::Delivered),
                ("failed", WebhookDeliveryStatus::Failed),
            ],
        )?;
        Ok(WebhookDelivery {
            id: row.id,
            event_type: row.event_type,
            payload: row.payload,
            url: row.url,
            status,
            attempts: row.attempts,
            last_attempt_at: row.last_attempt_at,
            last_error: row.last_error,
            last_status_code: row.last_status_code,
            delivered_at: row.delivered_at,
            created_at: row.created_at,
        })
    }
}

#[derive(Debug, FromRow)]
pub struct ApiKeyRow {
    pub id: Uuid,
    pub key_hash: String,
    pub key_prefix: String,
    pub name: String,
    pub team_id: Uuid,
    pub scopes: Vec<String>,
    pub expires_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub revoked_at: Option<DateTime<Utc>>,
}

impl TryFrom<ApiKeyRow> for ApiKey {
    type Error = anyhow::Error;

    fn try_from(row: ApiKeyRow) -> Result<Self> {
        let scopes = row
            .scopes
            .iter()
            .map(|s| {
                parse_enum(
                    "api key scope",
                    s,
                    &[
                        ("read", ApiKeyScope::Read),
                        ("write", ApiKeyScope::Write),
                        ("admin", ApiKeyScope::Admin),
                    ],
                )
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(ApiKey {
            id: row.id,
            key_hash: row.key_hash,
            key_prefix: row.key_prefix,
            name: row.name,
            team_id: row.team_id,
            scopes,
            expires_at: row.expires_at,
            created_at: row.created_at,
            revoked_at: row.revoked_at,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn contract_row_roundtrips_through_domain_enums() {
        let row = ContractRow {
            id: Uuid::new_v4(),
            asset_id: Uuid::new_v4(),
            version: "1.2.0".to_string(),
            schema_def: serde_json::json!({"type": "object"}),
            compatibility_mode: "backward".to_string(),
            guarantees: None,
            status: "active".to_string(),
            published_at: Utc::now(),
            published_by: Uuid::new_v4(),
            published_by_user_id: None,
        };
        let contract: Contract = row.try_into().unwrap();
        assert_eq!(contract.compatibility_mode, CompatibilityMode::Backward);
        assert_eq!(contract.status, ContractStatus::Active);
    }

    #[test]
    fn contract_row_rejects_unknown_enum_text() {
        let row = ContractRow {
            id: Uuid::new_v4(),
            asset_id: Uuid::new_v4(),
            version: "1.2.0".to_string(),
            schema_def: serde_json::json!({}),
            compatibility_mode: "sideways".to_string(),
            guarantees: None,
            status: "active".to_string(),
            published_at: Utc::now(),
            published_by: Uuid::new_v4(),
            published_by_user_id: None,
        };
        let result: Result<Contract> = row.try_into();
        assert!(result.is_err());
    }

    #[test]
    fn proposal_row_parses_embedded_json_arrays() {
        let row = ProposalRow {
            id: Uuid::new_v4(),
            asset_id: Uuid::new_v4(),
            proposed_schema: serde_json::json!({}),
            proposed_guarantees: None,
            change_type: "major".to_string(),
            breaking_changes: serde_json::json!([{"field": "x", "reason": "removed"}]),
            affected_teams: serde_json::json!([]),
            affected_assets: serde_json::json!([]),
            status: "pending".to_string(),
            proposed_by: Uuid::new_v4(),
            proposed_by_user_id: None,
            proposed_at: Utc::now(),
            resolved_at: None,
        };
        let proposal: Proposal = row.try_into().unwrap();
        assert_eq!(proposal.change_type, ChangeType::Major);
        assert_eq!(proposal.breaking_changes.len(), 1);
    }

    #[test]
    fn api_key_row_parses_scope_list() {
        let row = ApiKeyRow {
            id: Uuid::new_v4(),
            key_hash: "hash".to_string(),
            key_prefix: "tsr_abc".to_string(),
            name: "ci".to_string(),
            team_id: Uuid::new_v4(),
            scopes: vec!["read".to_string(), "write".to_string()],
            expires_at: None,
            created_at: Utc::now(),
            revoked_at: None,
        };
        let key: ApiKey = row.try_into().unwrap();
        assert_eq!(key.scopes, vec![ApiKeyScope::Read, ApiKeyScope::Write]);
    }

    #[test]
    fn enum_string_helpers_match_migration_literals() {
        assert_eq!(compatibility_mode_str(CompatibilityMode::Full), "full");
        assert_eq!(registration_status_str(RegistrationStatus::Migrating), "migrating");
        assert_eq!(dependency_type_str(DependencyType::Transforms), "transforms");
        assert_eq!(change_type_str(ChangeType::Patch), "patch");
        assert_eq!(proposal_status_str(ProposalStatus::Withdrawn), "withdrawn");
        assert_eq!(acknowledgment_response_str(AcknowledgmentResponse::Blocked), "blocked");
        assert_eq!(audit_run_status_str(AuditRunStatus::Partial), "partial");
        assert_eq!(webhook_delivery_status_str(WebhookDeliveryStatus::Failed), "failed");
        assert_eq!(user_role_str(UserRole::TeamAdmin), "team_admin");
        assert_eq!(api_key_scope_str(ApiKeyScope::Admin), "admin");
    }
}

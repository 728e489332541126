//! Port traits the domain depends on. Production implementations live in
//! `tessera-postgres`; tests wire up in-memory fakes instead.

use async_trait::async_trait;
use serde_json::Value;
use uuid::Uuid;

use crate::error::Result;
use crate::types::*;

#[derive(Debug, Clone, Default)]
pub struct TeamUpdate {
    pub name: Option<String>,
    pub metadata: Option<Value>,
}

#[async_trait]
pub trait TeamStore: Send + Sync {
    async fn create(&self, name: &str, metadata: Value) -> Result<Team>;
    async fn get(&self, id: Uuid) -> Result<Option<Team>>;
    async fn list(&self) -> Result<Vec<Team>>;
    async fn update(&self, id: Uuid, update: TeamUpdate) -> Result<Option<Team>>;
    async fn soft_delete(&self, id: Uuid) -> Result<bool>;
    async fn search_by_name(&self, query: &str, limit: i64) -> Result<Vec<Team>>;
}

#[derive(Debug, Clone, Default)]
pub struct AssetUpdate {
    pub fqn: Option<String>,
    pub owner_team_id: Option<Uuid>,
    pub metadata: Option<Value>,
}

#[async_trait]
pub trait AssetStore: Send + Sync {
    async fn create(
        &self,
        fqn: &str,
        environment: &str,
        owner_team_id: Uuid,
        resource_type: &str,
        metadata: Value,
    ) -> Result<Asset>;
    async fn get(&self, id: Uuid) -> Result<Option<Asset>>;
    /// Batched `get` for bulk publish: one round trip covering every asset
    /// id in the slice.
    async fn get_batch(&self, ids: &[Uuid]) -> Result<Vec<(Uuid, Option<Asset>)>>;
    async fn get_by_fqn(&self, fqn: &str, environment: &str) -> Result<Option<Asset>>;
    async fn list(&self, owner: Option<Uuid>, limit: i64, offset: i64) -> Result<Vec<Asset>>;
    async fn update(&self, id: Uuid, update: AssetUpdate) -> Result<Option<Asset>>;
    async fn soft_delete(&self, id: Uuid) -> Result<bool>;
    async fn search_by_fqn(&self, query: &str, limit: i64) -> Result<Vec<Asset>>;
    /// Secondary discovery path for affected-parties computation: finds
    /// assets whose `metadata.depends_on` array references `fqn`.
    async fn find_by_depends_on(&self, fqn: &str) -> Result<Vec<Asset>>;
}

#[async_trait]
pub trait DependencyStore: Send + Sync {
    async fn create(
        &self,
        dependent_asset_id: Uuid,
        dependency_asset_id: Uuid,
        dependency_type: DependencyType,
    ) -> Result<Dependency>;
    /// One batched level of BFS: live assets that directly depend on any of
    /// `dependency_asset_ids`, paired with the edge's dependency type.
    async fn downstream_of(
        &self,
        dependency_asset_ids: &[Uuid],
    ) -> Result<Vec<(Asset, DependencyType)>>;
}

/// Holds the active contract row locked for the duration of a publish.
/// Implementations that don't have real row locks (an in-memory fake) may
/// implement this as a no-op guard.
pub trait RowLock: Send {}

#[async_trait]
pub trait ContractStore: Send + Sync {
    /// Locks (if the backing store supports it) and returns the current
    /// active contract for `asset_id`, for the duration of a publish.
    async fn lock_active(&self, asset_id: Uuid) -> Result<Option<Contract>>;
    async fn get(&self, id: Uuid) -> Result<Option<Contract>>;
    async fn list_for_asset(&self, asset_id: Uuid) -> Result<Vec<Contract>>;
    async fn insert_active(
        &self,
        asset_id: Uuid,
        version: &str,
        schema_def: Value,
        compatibility_mode: CompatibilityMode,
        guarantees: Option<Guarantees>,
        published_by: Uuid,
        published_by_user_id: Option<Uuid>,
    ) -> Result<Contract>;
    async fn deprecate(&self, id: Uuid) -> Result<()>;
    /// Batched `lock_active` for bulk publish: one round trip covering every
    /// asset id in the slice.
    async fn lock_active_batch(&self, asset_ids: &[Uuid]) -> Result<Vec<(Uuid, Option<Contract>)>>;
    /// Search surface for `GET /search`: active contracts whose asset fqn or
    /// version matches `query`.
    async fn search(&self, query: &str, limit: i64) -> Result<Vec<Contract>>;
}

#[derive(Debug, Clone, Default)]
pub struct RegistrationUpdate {
    pub pinned_version: Option<String>,
    pub status: Option<RegistrationStatus>,
}

#[async_trait]
pub trait RegistrationStore: Send + Sync {
    async fn create(
        &self,
        contract_id: Uuid,
        consumer_team_id: Uuid,
        pinned_version: Option<String>,
    ) -> Result<Registration>;
    async fn get(&self, id: Uuid) -> Result<Option<Registration>>;
    async fn update(&self, id: Uuid, update: RegistrationUpdate) -> Result<Option<Registration>>;
    async fn soft_delete(&self, id: Uuid) -> Result<bool>;
    async fn list_for_contract(&self, contract_id: Uuid) -> Result<Vec<Registration>>;
    /// Batched consumer resolution for the impact engine: every live active
    /// registration for any of `contract_ids`, joined against its team.
    async fn list_active_with_team_for_contracts(
        &self,
        contract_ids: &[Uuid],
    ) -> Result<Vec<(Registration, Team)>>;
}

#[async_trait]
pub trait ProposalStore: Send + Sync {
    async fn create(
        &self,
        asset_id: Uuid,
        proposed_schema: Value,
        proposed_guarantees: Option<Guarantees>,
        change_type: ChangeType,
        breaking_changes: Vec<Value>,
        affected_teams: Vec<AffectedTeam>,
        affected_assets: Vec<AffectedAsset>,
        proposed_by: Uuid,
        proposed_by_user_id: Option<Uuid>,
    ) -> Result<Proposal>;
    /// Locks (if supported) and returns the proposal row.
    async fn lock(&self, id: Uuid) -> Result<Option<Proposal>>;
    async fn get(&self, id: Uuid) -> Result<Option<Proposal>>;
    async fn get_pending_for_asset(&self, asset_id: Uuid) -> Result<Option<Proposal>>;
    /// Batched `get_pending_for_asset` for bulk publish: one round trip
    /// covering every asset id in the slice.
    async fn get_pending_batch(&self, asset_ids: &[Uuid]) -> Result<Vec<(Uuid, Option<Proposal>)>>;
    async fn list(
        &self,
        asset_id: Option<Uuid>,
        status: Option<ProposalStatus>,
        proposed_by: Option<Uuid>,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Proposal>>;
    async fn set_status(
        &self,
        id: Uuid,
        status: ProposalStatus,
        resolved: bool,
    ) -> Result<()>;
}

#[async_trait]
pub trait AcknowledgmentStore: Send + Sync {
    async fn create(
        &self,
        proposal_id: Uuid,
        consumer_team_id: Uuid,
        response: AcknowledgmentResponse,
        migration_deadline: Option<chrono::DateTime<chrono::Utc>>,
        notes: Option<String>,
    ) -> Result<Acknowledgment>;
    async fn get_for_team(
        &self,
        proposal_id: Uuid,
        consumer_team_id: Uuid,
    ) -> Result<Option<Acknowledgment>>;
    async fn list_for_proposal(&self, proposal_id: Uuid) -> Result<Vec<Acknowledgment>>;
}

#[async_trait]
pub trait ObjectionStore: Send + Sync {
    async fn create(
        &self,
        proposal_id: Uuid,
        objector_team_id: Uuid,
        reason: Option<String>,
    ) -> Result<Objection>;
    async fn list_for_proposal(&self, proposal_id: Uuid) -> Result<Vec<Objection>>;
}

#[async_trait]
pub trait AuditStore: Send + Sync {
    async fn append(
        &self,
        entity_type: &str,
        entity_id: Uuid,
        action: &str,
        actor_id: Option<Uuid>,
        payload: Value,
    ) -> Result<AuditEvent>;
}

#[async_trait]
pub trait AuditRunStore: Send + Sync {
    #[allow(clippy::too_many_arguments)]
    async fn create(
        &self,
        asset_id: Uuid,
        contract_id: Option<Uuid>,
        status: AuditRunStatus,
        guarantees_checked: i32,
        guarantees_passed: i32,
        guarantees_failed: i32,
        triggered_by: &str,
        run_id: Option<String>,
        details: Value,
        run_at: chrono::DateTime<chrono::Utc>,
    ) -> Result<AuditRun>;
    async fn list_for_asset(
        &self,
        asset_id: Uuid,
        limit: i64,
        triggered_by: Option<&str>,
        status: Option<AuditRunStatus>,
    ) -> Result<(Vec<AuditRun>, i64)>;
}

#[async_trait]
pub trait WebhookDeliveryStore: Send + Sync {
    async fn create_pending(&self, event_type: &str, payload: Value, url: &str) -> Result<WebhookDelivery>;
    async fn mark_delivered(&self, id: Uuid) -> Result<()>;
    async fn mark_failed(&self, id: Uuid, last_error: &str, last_status_code: Option<i32>) -> Result<()>;
    async fn record_attempt(&self, id: Uuid) -> Result<()>;
}

#[async_trait]
pub trait ApiKeyStore: Send + Sync {
    async fn find_by_prefix(&self, prefix: &str) -> Result<Option<ApiKey>>;
    async fn create(
        &self,
        key_hash: String,
        key_prefix: String,
        name: String,
        team_id: Uuid,
        scopes: Vec<ApiKeyScope>,
        expires_at: Option<chrono::DateTime<chrono::Utc>>,
    ) -> Result<ApiKey>;
}

#[async_trait]
pub trait UserStore: Send + Sync {
    async fn get(&self, id: Uuid) -> Result<Option<User>>;
    async fn search(&self, query: &str, limit: i64) -> Result<Vec<User>>;
}

/// Fail-open cache port: every method degrades to a miss/no-op, never an
/// error, so a backend outage never affects request correctness.
#[async_trait]
pub trait Cache: Send + Sync {
    async fn get(&self, prefix: &str, key: &str) -> Option<Value>;
    async fn set(&self, prefix: &str, key: &str, value: Value, ttl_secs: u64);
    async fn delete(&self, prefix: &str, key: &str);
    async fn invalidate_pattern(&self, prefix: &str, pattern: &str);
}

/// Fire-and-forget egress into the webhook fan-out pipeline. Never
/// returns an error to the caller: delivery outcomes are tracked
/// separately via [`WebhookDeliveryStore`], not by this call's result.
#[async_trait]
pub trait WebhookNotifier: Send + Sync {
    async fn notify(&self, event_type: &str, payload: Value);
}

/// Bundles every store trait a `CoreService` needs, so callers pass one
/// object instead of eight. Every field is an `Arc`, so cloning the bundle
/// is cheap — the server keeps one copy for the service and a second for
/// middleware that needs direct store access (auth, session resolution).
#[derive(Clone)]
pub struct Stores {
    pub teams: std::sync::Arc<dyn TeamStore>,
    pub users: std::sync::Arc<dyn UserStore>,
    pub assets: std::sync::Arc<dyn AssetStore>,
    pub dependencies: std::sync::Arc<dyn DependencyStore>,
    pub contracts: std::sync::Arc<dyn ContractStore>,
    pub registrations: std::sync::Arc<dyn RegistrationStore>,
    pub proposals: std::sync::Arc<dyn ProposalStore>,
    pub acknowledgments: std::sync::Arc<dyn AcknowledgmentStore>,
    pub objections: std::sync::Arc<dyn ObjectionStore>,
    pub audit: std::sync::Arc<dyn AuditStore>,
    pub audit_runs: std::sync::Arc<dyn AuditRunStore>,
    pub webhook_deliveries: std::sync::Arc<dyn WebhookDeliveryStore>,
    pub api_keys: std::sync::Arc<dyn ApiKeyStore>,
    pub cache: std::sync::Arc<dyn Cache>,
    pub webhooks: std::sync::Arc<dyn WebhookNotifier>,
}

//! Orchestrates the pure C1–C6 logic against the store ports. Handlers in
//! the server crate are thin: validate the request shape, call one
//! `CoreService` method, map the result to a response body.

use async_trait::async_trait;
use serde_json::Value;
use uuid::Uuid;

use crate::error::{ErrorCode, Result, TesseraError};
use crate::impact::{analyze_impact, ImpactReport};
use crate::ports::Stores;
use crate::principal::Principal;
use crate::proposals::{
    completion_status, decide_acknowledge, decide_force_approve, decide_publish_from_proposal, decide_withdraw,
    AcknowledgeOutcome,
};
use crate::publishing::{
    decide_bulk_item, decide_publish, BulkItemOutcome, BulkItemStatus, BulkPublishItemResult, BulkPublishResult,
    ContractToPublish, PublishDecision, PublishOutcome,
};
use crate::types::*;
use crate::validation::{validate_fqn, validate_schema, validate_semver};

#[async_trait]
pub trait CoreService: Send + Sync {
    async fn create_team(&self, principal: &Principal, name: &str, metadata: Value) -> Result<Team>;
    async fn get_team(&self, id: Uuid) -> Result<Team>;
    async fn list_teams(&self) -> Result<Vec<Team>>;

    async fn create_asset(
        &self,
        principal: &Principal,
        fqn: &str,
        environment: &str,
        resource_type: &str,
        metadata: Value,
    ) -> Result<Asset>;
    async fn get_asset(&self, id: Uuid) -> Result<Asset>;
    async fn list_assets(&self, owner: Option<Uuid>, limit: i64, offset: i64) -> Result<Vec<Asset>>;
    async fn delete_asset(&self, principal: &Principal, id: Uuid) -> Result<()>;

    async fn publish_contract(
        &self,
        principal: &Principal,
        asset_id: Uuid,
        schema_def: Value,
        compatibility_mode: Option<CompatibilityMode>,
        guarantees: Option<Guarantees>,
        force: bool,
    ) -> Result<PublishOutcome>;

    async fn publish_bulk(
        &self,
        principal: &Principal,
        items: Vec<ContractToPublish>,
        dry_run: bool,
        create_proposals_for_breaking: bool,
    ) -> Result<BulkPublishResult>;

    async fn analyze_impact(
        &self,
        principal: &Principal,
        asset_id: Uuid,
        proposed_schema: &Value,
        depth: u32,
    ) -> Result<ImpactReport>;

    async fn create_registration(
        &self,
        contract_id: Uuid,
        consumer_team_id: Uuid,
        pinned_version: Option<String>,
    ) -> Result<Registration>;
    async fn delete_registration(&self, id: Uuid) -> Result<()>;

    async fn create_proposal(
        &self,
        principal: &Principal,
        asset_id: Uuid,
        proposed_schema: Value,
        proposed_guarantees: Option<Guarantees>,
    ) -> Result<Proposal>;
    async fn acknowledge_proposal(
        &self,
        proposal_id: Uuid,
        consumer_team_id: Uuid,
        response: AcknowledgmentResponse,
        migration_deadline: Option<chrono::DateTime<chrono::Utc>>,
        notes: Option<String>,
    ) -> Result<Acknowledgment>;
    async fn object_to_proposal(
        &self,
        proposal_id: Uuid,
        objector_team_id: Uuid,
        reason: Option<String>,
    ) -> Result<Objection>;
    async fn withdraw_proposal(&self, id: Uuid) -> Result<Proposal>;
    async fn force_approve_proposal(&self, principal: &Principal, id: Uuid) -> Result<Proposal>;
    async fn publish_from_proposal(&self, principal: &Principal, proposal_id: Uuid, version: &str) -> Result<Contract>;

    async fn report_audit_result(
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
    ) -> Result<AuditRun>;
}

pub struct CoreServiceImpl {
    stores: Stores,
}

impl CoreServiceImpl {
    pub fn new(stores: Stores) -> Self {
        Self { stores }
    }

    async fn audit(&self, entity_type: &str, entity_id: Uuid, action: &str, actor_id: Option<Uuid>, payload: Value) {
        if let Err(err) = self.stores.audit.append(entity_type, entity_id, action, actor_id, payload).await {
            tracing::warn!(%err, entity_type, %entity_id, action, "failed to record audit event");
        }
    }
}

fn change_type_label(change_type: ChangeType) -> &'static str {
    match change_type {
        ChangeType::Patch => "patch",
        ChangeType::Minor => "minor",
        ChangeType::Major => "major",
    }
}

#[async_trait]
impl CoreService for CoreServiceImpl {
    async fn create_team(&self, _principal: &Principal, name: &str, metadata: Value) -> Result<Team> {
        if name.trim().is_empty() {
            return Err(TesseraError::validation("team name must not be empty"));
        }
        let team = self.stores.teams.create(name, metadata).await?;
        self.audit("team", team.id, "team.created", None, serde_json::json!({"name": team.name})).await;
        self.stores.cache.invalidate_pattern("team", "*").await;
        Ok(team)
    }

    async fn get_team(&self, id: Uuid) -> Result<Team> {
        self.stores
            .teams
            .get(id)
            .await?
            .ok_or_else(|| TesseraError::not_found("team", id.to_string()))
    }

    async fn list_teams(&self) -> Result<Vec<Team>> {
        self.stores.teams.list().await
    }

    async fn create_asset(
        &self,
        principal: &Principal,
        fqn: &str,
        environment: &str,
        resource_type: &str,
        metadata: Value,
    ) -> Result<Asset> {
        validate_fqn(fqn)?;
        let asset = self
            .stores
            .assets
            .create(fqn, environment, principal.team_id, resource_type, metadata)
            .await?;
        self.audit(
            "asset",
            asset.id,
            "asset.created",
            principal.user_id,
            serde_json::json!({"fqn": asset.fqn, "environment": asset.environment}),
        )
        .await;
        Ok(asset)
    }

    async fn get_asset(&self, id: Uuid) -> Result<Asset> {
        if let Some(cached) = self.stores.cache.get("asset", &id.to_string()).await {
            if let Ok(asset) = serde_json::from_value(cached) {
                return Ok(asset);
            }
        }
        let asset = self
            .stores
            .assets
            .get(id)
            .await?
            .ok_or_else(|| TesseraError::not_found("asset", id.to_string()))?;
        self.stores
            .cache
            .set("asset", &id.to_string(), serde_json::to_value(&asset).unwrap_or_default(), 300)
            .await;
        Ok(asset)
    }

    async fn list_assets(&self, owner: Option<Uuid>, limit: i64, offset: i64) -> Result<Vec<Asset>> {
        self.stores.assets.list(owner, limit, offset).await
    }

    async fn delete_asset(&self, principal: &Principal, id: Uuid) -> Result<()> {
        let asset = self.get_asset(id).await?;
        principal.owns_or_admin(asset.owner_team_id)?;
        self.stores.assets.soft_delete(id).await?;
        self.stores.cache.delete("asset", &id.to_string()).await;
        self.audit("asset", id, "asset.deleted", principal.user_id, Value::Null).await;
        Ok(())
    }

    async fn publish_contract(
        &self,
        principal: &Principal,
        asset_id: Uuid,
        schema_def: Value,
        compatibility_mode: Option<CompatibilityMode>,
        guarantees: Option<Guarantees>,
        force: bool,
    ) -> Result<PublishOutcome> {
        validate_schema(&schema_def)?;
        let asset = self.get_asset(asset_id).await?;
        principal.owns_or_admin(asset.owner_team_id)?;

        if let Some(pending) = self.stores.proposals.get_pending_for_asset(asset_id).await? {
            return Err(TesseraError::conflict(
                ErrorCode::PendingProposalConflict,
                format!("asset has a pending proposal ({}); resolve it before publishing", pending.id),
            ));
        }

        let current = self.stores.contracts.lock_active(asset_id).await?;
        let decision = decide_publish(current.as_ref(), &schema_def, compatibility_mode);

        let (suggested_version, change_type) = match decision {
            PublishDecision::NoChanges { .. } => {
                return Err(TesseraError::business_rule(
                    ErrorCode::BadRequest,
                    "no schema changes detected; nothing to publish",
                ));
            }
            PublishDecision::Breaking { .. } if !force => {
                // A breaking change without `force` never lands as a contract;
                // it routes through the same path a direct proposal would.
                let proposal = self.create_proposal(principal, asset_id, schema_def, guarantees).await?;
                return Ok(PublishOutcome::ProposalCreated(proposal));
            }
            PublishDecision::FirstContract { suggested_version } => (suggested_version, None),
            PublishDecision::Compatible { suggested_version, change_type, .. } => (suggested_version, Some(change_type)),
            PublishDecision::Breaking { suggested_version, change_type, .. } => (suggested_version, Some(change_type)),
        };

        let mode = compatibility_mode
            .or(current.as_ref().map(|c| c.compatibility_mode))
            .unwrap_or_default();
        let contract = self
            .stores
            .contracts
            .insert_active(
                asset_id,
                &suggested_version,
                schema_def,
                mode,
                guarantees,
                principal.team_id,
                principal.user_id,
            )
            .await?;
        if let Some(current) = current {
            self.stores.contracts.deprecate(current.id).await?;
            self.audit(
                "contract",
                current.id,
                "contract.deprecated",
                principal.user_id,
                serde_json::json!({"superseded_by": contract.id}),
            )
            .await;
        }
        self.audit(
            "contract",
            contract.id,
            "contract.published",
            principal.user_id,
            serde_json::json!({"version": contract.version}),
        )
        .await;
        self.stores
            .webhooks
            .notify(
                "contract.published",
                serde_json::json!({
                    "contract_id": contract.id,
                    "asset_id": contract.asset_id,
                    "version": contract.version,
                }),
            )
            .await;
        self.stores.cache.delete("asset", &asset_id.to_string()).await;
        self.stores.cache.invalidate_pattern("schema_diff", &asset_id.to_string()).await;
        Ok(PublishOutcome::Published { contract, change_type })
    }

    async fn publish_bulk(
        &self,
        principal: &Principal,
        items: Vec<ContractToPublish>,
        dry_run: bool,
        create_proposals_for_breaking: bool,
    ) -> Result<BulkPublishResult> {
        let mut result = BulkPublishResult::new(dry_run, items.len());
        if items.is_empty() {
            return Ok(result);
        }

        let asset_ids: Vec<Uuid> = items.iter().map(|i| i.asset_id).collect();
        let current_by_asset: std::collections::HashMap<Uuid, Option<Contract>> =
            self.stores.contracts.lock_active_batch(&asset_ids).await?.into_iter().collect();
        let asset_by_id: std::collections::HashMap<Uuid, Option<Asset>> =
            self.stores.assets.get_batch(&asset_ids).await?.into_iter().collect();
        let pending_by_asset: std::collections::HashMap<Uuid, Option<Proposal>> =
            self.stores.proposals.get_pending_batch(&asset_ids).await?.into_iter().collect();

        for item in items {
            let asset = match asset_by_id.get(&item.asset_id).cloned().flatten() {
                Some(asset) => asset,
                None => {
                    result.record(BulkPublishItemResult::failed(item.asset_id, "asset not found"));
                    continue;
                }
            };
            if principal.owns_or_admin(asset.owner_team_id).is_err() {
                result.record(BulkPublishItemResult::failed(item.asset_id, "insufficient scope for this asset's owning team"));
                continue;
            }
            if let Err(e) = validate_schema(&item.schema_def) {
                result.record(BulkPublishItemResult::failed(item.asset_id, e.to_string()));
                continue;
            }
            let has_pending = pending_by_asset.get(&item.asset_id).cloned().flatten().is_some();
            let current = current_by_asset.get(&item.asset_id).cloned().flatten();
            let outcome = decide_bulk_item(&item, true, has_pending, current.as_ref());

            match outcome {
                BulkItemOutcome::AssetNotFound => unreachable!("asset existence already checked above"),
                BulkItemOutcome::PendingProposalExists => {
                    result.record(BulkPublishItemResult::failed(
                        item.asset_id,
                        "asset has a pending proposal; resolve it before publishing",
                    ));
                }
                BulkItemOutcome::Decision(PublishDecision::NoChanges { current_version }) => {
                    let mut r = BulkPublishItemResult::new(
                        item.asset_id,
                        if dry_run { BulkItemStatus::WillSkip } else { BulkItemStatus::Skipped },
                    );
                    r.current_version = Some(current_version);
                    r.reason = Some("no schema changes detected".to_string());
                    result.record(r);
                }
                BulkItemOutcome::Decision(PublishDecision::Breaking {
                    suggested_version,
                    current_version,
                    breaking_changes,
                    ..
                }) => {
                    let breaking_json: Vec<Value> =
                        breaking_changes.iter().map(|c| serde_json::to_value(c).unwrap_or(Value::Null)).collect();
                    if dry_run {
                        let mut r = BulkPublishItemResult::new(item.asset_id, BulkItemStatus::Breaking);
                        r.suggested_version = Some(suggested_version);
                        r.current_version = Some(current_version);
                        r.breaking_changes = breaking_json;
                        result.record(r);
                    } else if create_proposals_for_breaking {
                        match self.create_proposal(principal, item.asset_id, item.schema_def.clone(), item.guarantees.clone()).await {
                            Ok(proposal) => {
                                let mut r = BulkPublishItemResult::new(item.asset_id, BulkItemStatus::ProposalCreated);
                                r.proposal_id = Some(proposal.id);
                                r.suggested_version = Some(suggested_version);
                                r.current_version = Some(current_version);
                                r.breaking_changes = breaking_json;
                                result.record(r);
                            }
                            Err(e) => result.record(BulkPublishItemResult::failed(item.asset_id, e.to_string())),
                        }
                    } else {
                        let mut r = BulkPublishItemResult::failed(
                            item.asset_id,
                            "breaking change requires a proposal; set create_proposals_for_breaking=true or resolve manually",
                        );
                        r.suggested_version = Some(suggested_version);
                        r.current_version = Some(current_version);
                        r.breaking_changes = breaking_json;
                        result.record(r);
                    }
                }
                BulkItemOutcome::Decision(decision) => {
                    let (suggested_version, current_version, reason) = match &decision {
                        PublishDecision::FirstContract { suggested_version } => {
                            (suggested_version.clone(), None, "first contract for this asset".to_string())
                        }
                        PublishDecision::Compatible { suggested_version, current_version, change_type } => (
                            suggested_version.clone(),
                            Some(current_version.clone()),
                            format!("compatible {} change", change_type_label(*change_type)),
                        ),
                        _ => unreachable!("NoChanges and Breaking handled above"),
                    };
                    if dry_run {
                        let mut r = BulkPublishItemResult::new(item.asset_id, BulkItemStatus::WillPublish);
                        r.suggested_version = Some(suggested_version);
                        r.current_version = current_version;
                        r.reason = Some(reason);
                        result.record(r);
                        continue;
                    }
                    let mode = item
                        .compatibility_mode
                        .or(current.as_ref().map(|c| c.compatibility_mode))
                        .unwrap_or_default();
                    let inserted = self
                        .stores
                        .contracts
                        .insert_active(
                            item.asset_id,
                            &suggested_version,
                            item.schema_def.clone(),
                            mode,
                            item.guarantees.clone(),
                            principal.team_id,
                            principal.user_id,
                        )
                        .await;
                    match inserted {
                        Ok(contract) => {
                            if let Some(prev) = &current {
                                let _ = self.stores.contracts.deprecate(prev.id).await;
                                self.audit(
                                    "contract",
                                    prev.id,
                                    "contract.deprecated",
                                    principal.user_id,
                                    serde_json::json!({"superseded_by": contract.id}),
                                )
                                .await;
                            }
                            self.audit(
                                "contract",
                                contract.id,
                                "contract.published",
                                principal.user_id,
                                serde_json::json!({"version": contract.version}),
                            )
                            .await;
                            self.stores.cache.delete("asset", &item.asset_id.to_string()).await;
                            self.stores.cache.invalidate_pattern("schema_diff", &item.asset_id.to_string()).await;
                            let mut r = BulkPublishItemResult::new(item.asset_id, BulkItemStatus::Published);
                            r.contract_id = Some(contract.id);
                            r.suggested_version = Some(suggested_version);
                            r.current_version = current_version;
                            r.reason = Some(reason);
                            result.record(r);
                        }
                        Err(e) => result.record(BulkPublishItemResult::failed(item.asset_id, e.to_string())),
                    }
                }
            }
        }

        Ok(result)
    }

    async fn analyze_impact(
        &self,
        principal: &Principal,
        asset_id: Uuid,
        proposed_schema: &Value,
        depth: u32,
    ) -> Result<ImpactReport> {
        validate_schema(proposed_schema)?;
        let asset = self.get_asset(asset_id).await?;
        principal.owns_or_admin(asset.owner_team_id)?;
        let current = self.stores.contracts.list_for_asset(asset_id).await?.into_iter().find(|c| c.status == ContractStatus::Active);
        analyze_impact(
            self.stores.dependencies.as_ref(),
            self.stores.contracts.as_ref(),
            self.stores.registrations.as_ref(),
            asset_id,
            current.as_ref(),
            proposed_schema,
            depth,
        )
        .await
    }

    async fn create_registration(
        &self,
        contract_id: Uuid,
        consumer_team_id: Uuid,
        pinned_version: Option<String>,
    ) -> Result<Registration> {
        if let Some(ref v) = pinned_version {
            validate_semver(v)?;
        }
        self.stores
            .contracts
            .get(contract_id)
            .await?
            .ok_or_else(|| TesseraError::not_found("contract", contract_id.to_string()))?;
        let registration = self
            .stores
            .registrations
            .create(contract_id, consumer_team_id, pinned_version)
            .await?;
        self.audit(
            "registration",
            registration.id,
            "registration.created",
            None,
            serde_json::json!({"contract_id": contract_id, "consumer_team_id": consumer_team_id}),
        )
        .await;
        Ok(registration)
    }

    async fn delete_registration(&self, id: Uuid) -> Result<()> {
        self.stores
            .registrations
            .get(id)
            .await?
            .ok_or_else(|| TesseraError::not_found("registration", id.to_string()))?;
        self.stores.registrations.soft_delete(id).await?;
        self.audit("registration", id, "registration.deleted", None, Value::Null).await;
        Ok(())
    }

    async fn create_proposal(
        &self,
        principal: &Principal,
        asset_id: Uuid,
        proposed_schema: Value,
        proposed_guarantees: Option<Guarantees>,
    ) -> Result<Proposal> {
        validate_schema(&proposed_schema)?;
        let asset = self.get_asset(asset_id).await?;
        principal.owns_or_admin(asset.owner_team_id)?;

        if self.stores.proposals.get_pending_for_asset(asset_id).await?.is_some() {
            return Err(TesseraError::conflict(
                ErrorCode::PendingProposalConflict,
                "asset already has a pending proposal",
            ));
        }

        let current = self.stores.contracts.list_for_asset(asset_id).await?.into_iter().find(|c| c.status == ContractStatus::Active);
        let impact = analyze_impact(
            self.stores.dependencies.as_ref(),
            self.stores.contracts.as_ref(),
            self.stores.registrations.as_ref(),
            asset_id,
            current.as_ref(),
            &proposed_schema,
            3,
        )
        .await?;

        let affected_teams: Vec<AffectedTeam> = impact
            .impacted_consumers
            .iter()
            .map(|c| AffectedTeam { team_id: c.team_id, team_name: c.team_name.clone() })
            .collect();
        let affected_assets: Vec<AffectedAsset> = impact
            .impacted_assets
            .iter()
            .map(|a| AffectedAsset { asset_id: a.asset_id, fqn: a.fqn.clone() })
            .collect();
        let breaking_changes: Vec<Value> = impact
            .breaking_changes
            .iter()
            .map(|c| serde_json::to_value(c).unwrap_or(Value::Null))
            .collect();

        let proposal = self
            .stores
            .proposals
            .create(
                asset_id,
                proposed_schema,
                proposed_guarantees,
                impact.change_type,
                breaking_changes,
                affected_teams,
                affected_assets,
                principal.team_id,
                principal.user_id,
                )
            .await?;

        self.audit(
            "proposal",
            proposal.id,
            "proposal.created",
            principal.user_id,
            serde_json::json!({"asset_id": asset_id, "change_type": proposal.change_type}),
        )
        .await;
        self.stores
            .webhooks
            .notify(
                "proposal.created",
                serde_json::json!({
                    "proposal_id": proposal.id,
                    "asset_id": proposal.asset_id,
                    "change_type": proposal.change_type,
                    "breaking_changes": proposal.breaking_changes,
                }),
            )
            .await;
        Ok(proposal)
    }

    async fn acknowledge_proposal(
        &self,
        proposal_id: Uuid,
        consumer_team_id: Uuid,
        response: AcknowledgmentResponse,
        migration_deadline: Option<chrono::DateTime<chrono::Utc>>,
        notes: Option<String>,
    ) -> Result<Acknowledgment> {
        let proposal = self
            .stores
            .proposals
            .lock(proposal_id)
            .await?
            .ok_or_else(|| TesseraError::not_found("proposal", proposal_id.to_string()))?;

        if self
            .stores
            .acknowledgments
            .get_for_team(proposal_id, consumer_team_id)
            .await?
            .is_some()
        {
            return Err(TesseraError::conflict(
                ErrorCode::DuplicateAcknowledgment,
                "this team has already acknowledged this proposal",
            ));
        }

        let ack = self
            .stores
            .acknowledgments
            .create(proposal_id, consumer_team_id, response, migration_deadline, notes)
            .await?;
        self.audit(
            "proposal",
            proposal_id,
            "proposal.acknowledged",
            None,
            serde_json::json!({"consumer_team_id": consumer_team_id, "response": response}),
        )
        .await;

        let contract = self
            .stores
            .contracts
            .list_for_asset(proposal.asset_id)
            .await?
            .into_iter()
            .find(|c| c.status == ContractStatus::Active);
        let active_registrations = match &contract {
            Some(c) => self.stores.registrations.list_for_contract(c.id).await?,
            None => Vec::new(),
        };
        let acks = self.stores.acknowledgments.list_for_proposal(proposal_id).await?;

        match decide_acknowledge(proposal.status, response, &active_registrations, &acks)? {
            AcknowledgeOutcome::Rejected => {
                self.stores.proposals.set_status(proposal_id, ProposalStatus::Rejected, true).await?;
                self.audit(
                    "proposal",
                    proposal_id,
                    "proposal.rejected",
                    None,
                    serde_json::json!({"blocked_by": consumer_team_id}),
                )
                .await;
            }
            AcknowledgeOutcome::AutoApproved => {
                self.stores.proposals.set_status(proposal_id, ProposalStatus::Approved, true).await?;
                let (_, count) = completion_status(&active_registrations, &acks);
                self.audit(
                    "proposal",
                    proposal_id,
                    "proposal.approved",
                    None,
                    serde_json::json!({"acknowledged_count": count}),
                )
                .await;
            }
            AcknowledgeOutcome::StillPending => {}
        }

        Ok(ack)
    }

    async fn object_to_proposal(&self, proposal_id: Uuid, objector_team_id: Uuid, reason: Option<String>) -> Result<Objection> {
        self.stores
            .proposals
            .get(proposal_id)
            .await?
            .ok_or_else(|| TesseraError::not_found("proposal", proposal_id.to_string()))?;
        let objection = self.stores.objections.create(proposal_id, objector_team_id, reason).await?;
        self.audit(
            "proposal",
            proposal_id,
            "proposal.objected",
            None,
            serde_json::json!({"objector_team_id": objector_team_id}),
        )
        .await;
        Ok(objection)
    }

    async fn withdraw_proposal(&self, id: Uuid) -> Result<Proposal> {
        let proposal = self
            .stores
            .proposals
            .get(id)
            .await?
            .ok_or_else(|| TesseraError::not_found("proposal", id.to_string()))?;
        decide_withdraw(proposal.status)?;
        self.stores.proposals.set_status(id, ProposalStatus::Withdrawn, true).await?;
        self.audit("proposal", id, "proposal.withdrawn", None, Value::Null).await;
        self.stores
            .proposals
            .get(id)
            .await?
            .ok_or_else(|| TesseraError::not_found("proposal", id.to_string()))
    }

    async fn force_approve_proposal(&self, principal: &Principal, id: Uuid) -> Result<Proposal> {
        principal.require_scope(ApiKeyScope::Admin)?;
        let proposal = self
            .stores
            .proposals
            .get(id)
            .await?
            .ok_or_else(|| TesseraError::not_found("proposal", id.to_string()))?;
        decide_force_approve(proposal.status)?;
        self.stores.proposals.set_status(id, ProposalStatus::Approved, true).await?;
        self.audit(
            "proposal",
            id,
            "proposal.force_approved",
            principal.user_id,
            serde_json::json!({"actor_team_id": principal.team_id}),
        )
        .await;
        self.stores
            .proposals
            .get(id)
            .await?
            .ok_or_else(|| TesseraError::not_found("proposal", id.to_string()))
    }

    async fn publish_from_proposal(&self, principal: &Principal, proposal_id: Uuid, version: &str) -> Result<Contract> {
        validate_semver(version)?;
        let proposal = self
            .stores
            .proposals
            .get(proposal_id)
            .await?
            .ok_or_else(|| TesseraError::not_found("proposal", proposal_id.to_string()))?;
        decide_publish_from_proposal(proposal.status)?;

        let current = self
            .stores
            .contracts
            .lock_active(proposal.asset_id)
            .await?;
        let mode = current.as_ref().map(|c| c.compatibility_mode).unwrap_or_default();
        let guarantees = current.as_ref().and_then(|c| c.guarantees.clone());

        let contract = self
            .stores
            .contracts
            .insert_active(
                proposal.asset_id,
                version,
                proposal.proposed_schema.clone(),
                mode,
                guarantees,
                principal.team_id,
                principal.user_id,
            )
            .await?;
        if let Some(current) = &current {
            self.stores.contracts.deprecate(current.id).await?;
        }
        self.audit(
            "contract",
            contract.id,
            "contract.published",
            principal.user_id,
            serde_json::json!({"proposal_id": proposal_id, "version": contract.version}),
        )
        .await;
        self.stores.cache.delete("asset", &proposal.asset_id.to_string()).await;
        Ok(contract)
    }

    async fn report_audit_result(
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
    ) -> Result<AuditRun> {
        self.get_asset(asset_id).await?;
        let run_at = chrono::Utc::now();
        let run = self
            .stores
            .audit_runs
            .create(
                asset_id,
                contract_id,
                status,
                guarantees_checked,
                guarantees_passed,
                guarantees_failed,
                triggered_by,
                run_id,
                details,
                run_at,
            )
            .await?;
        self.audit(
            "audit_run",
            run.id,
            "audit.reported",
            None,
            serde_json::json!({"status": status, "asset_id": asset_id}),
        )
        .await;
        Ok(run)
    }
}

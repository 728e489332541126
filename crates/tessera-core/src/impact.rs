//! Impact Engine (C6): breadth-first downstream traversal plus batched
//! consumer resolution, so "what proposing this change would affect" is one
//! bounded set of round trips instead of N+1 queries.

use std::collections::HashSet;

use serde::Serialize;
use serde_json::Value;
use uuid::Uuid;

use crate::classifier::classify;
use crate::differ::{diff_schemas, Change};
use crate::error::Result;
use crate::ports::{ContractStore, DependencyStore, RegistrationStore};
use crate::types::{ChangeType, Contract, DependencyType, RegistrationStatus};

/// Hard ceiling on downstream assets returned from one traversal. Wide
/// graphs truncate rather than grow the response without bound.
pub const MAX_LINEAGE_RESULTS: usize = 500;

#[derive(Debug, Clone, Serialize)]
pub struct DownstreamAsset {
    pub asset_id: Uuid,
    pub fqn: String,
    pub dependency_type: DependencyType,
    pub depth: u32,
}

/// Iterative BFS over the dependency graph, one batched query per level.
/// `visited` guards against cycles; a cyclic graph simply stops expanding
/// once every reachable asset has been seen.
pub async fn downstream_assets(
    deps: &dyn DependencyStore,
    root_asset_id: Uuid,
    max_depth: u32,
    max_results: usize,
) -> Result<(Vec<DownstreamAsset>, bool)> {
    let mut visited: HashSet<Uuid> = HashSet::from([root_asset_id]);
    let mut results = Vec::new();
    let mut current_ids = vec![root_asset_id];
    let mut truncated = false;

    for current_depth in 1..=max_depth {
        if current_ids.is_empty() {
            break;
        }
        let downstream = deps.downstream_of(&current_ids).await?;

        let mut next_ids = Vec::new();
        for (asset, dep_type) in downstream {
            if visited.insert(asset.id) {
                results.push(DownstreamAsset {
                    asset_id: asset.id,
                    fqn: asset.fqn,
                    dependency_type: dep_type,
                    depth: current_depth,
                });
                next_ids.push(asset.id);
                if results.len() >= max_results {
                    truncated = true;
                    break;
                }
            }
        }
        if truncated {
            break;
        }
        current_ids = next_ids;
    }

    Ok((results, truncated))
}

#[derive(Debug, Clone, Serialize)]
pub struct ImpactedConsumer {
    pub team_id: Uuid,
    pub team_name: String,
    pub status: RegistrationStatus,
    pub pinned_version: Option<String>,
    pub depth: u32,
}

/// For every asset id, the active contract's consumer registrations joined
/// to their team — one round trip covering the whole set, not one per asset.
pub async fn impacted_consumers_batch(
    contracts: &dyn ContractStore,
    registrations: &dyn RegistrationStore,
    asset_ids: &[Uuid],
) -> Result<Vec<(Uuid, ImpactedConsumer)>> {
    if asset_ids.is_empty() {
        return Ok(Vec::new());
    }
    let active = contracts.lock_active_batch(asset_ids).await?;
    let contract_to_asset: std::collections::HashMap<Uuid, Uuid> = active
        .iter()
        .filter_map(|(asset_id, contract)| contract.as_ref().map(|c| (c.id, *asset_id)))
        .collect();
    let contract_ids: Vec<Uuid> = contract_to_asset.keys().copied().collect();
    if contract_ids.is_empty() {
        return Ok(Vec::new());
    }

    let rows = registrations
        .list_active_with_team_for_contracts(&contract_ids)
        .await?;

    let mut out = Vec::new();
    for (registration, team) in rows {
        if let Some(&asset_id) = contract_to_asset.get(&registration.contract_id) {
            out.push((
                asset_id,
                ImpactedConsumer {
                    team_id: team.id,
                    team_name: team.name,
                    status: registration.status,
                    pinned_version: registration.pinned_version,
                    depth: 0,
                },
            ));
        }
    }
    Ok(out)
}

#[derive(Debug, Clone, Serialize)]
pub struct ImpactReport {
    pub change_type: ChangeType,
    pub breaking_changes: Vec<Change>,
    pub impacted_consumers: Vec<ImpactedConsumer>,
    pub impacted_assets: Vec<DownstreamAsset>,
    pub safe_to_publish: bool,
    pub traversal_depth: u32,
    pub truncated: bool,
}

/// Full impact analysis: diffs `proposed_schema` against the asset's current
/// active contract (if any), walks the downstream graph, and resolves every
/// affected asset's live consumers. An asset with no active contract yet is
/// trivially safe: there is nothing for the proposal to break.
pub async fn analyze_impact(
    deps: &dyn DependencyStore,
    contracts: &dyn ContractStore,
    registrations: &dyn RegistrationStore,
    root_asset_id: Uuid,
    current_contract: Option<&Contract>,
    proposed_schema: &Value,
    depth: u32,
) -> Result<ImpactReport> {
    let Some(current_contract) = current_contract else {
        return Ok(ImpactReport {
            change_type: ChangeType::Minor,
            breaking_changes: Vec::new(),
            impacted_consumers: Vec::new(),
            impacted_assets: Vec::new(),
            safe_to_publish: true,
            traversal_depth: depth,
            truncated: false,
        });
    };

    let diff = diff_schemas(&current_contract.schema_def, proposed_schema);
    let (_, breaking) = classify(&diff, current_contract.compatibility_mode);
    let breaking_changes: Vec<Change> = breaking.into_iter().cloned().collect();

    let (downstream, truncated) =
        downstream_assets(deps, root_asset_id, depth, MAX_LINEAGE_RESULTS).await?;

    let mut all_asset_ids = vec![root_asset_id];
    all_asset_ids.extend(downstream.iter().map(|d| d.asset_id));
    let consumer_rows = impacted_consumers_batch(contracts, registrations, &all_asset_ids).await?;

    let depth_by_asset: std::collections::HashMap<Uuid, u32> = downstream
        .iter()
        .map(|d| (d.asset_id, d.depth))
        .collect();

    // Dedup by team, first occurrence wins, walking asset ids in traversal
    // order (root first) so the reported depth is the shallowest one.
    let mut seen_teams = HashSet::new();
    let mut impacted_consumers = Vec::new();
    for asset_id in &all_asset_ids {
        let asset_depth = if *asset_id == root_asset_id {
            0
        } else {
            *depth_by_asset.get(asset_id).unwrap_or(&1)
        };
        for (row_asset_id, consumer) in &consumer_rows {
            if row_asset_id != asset_id || !seen_teams.insert(consumer.team_id) {
                continue;
            }
            let mut consumer = consumer.clone();
            consumer.depth = asset_depth;
            impacted_consumers.push(consumer);
        }
    }

    Ok(ImpactReport {
        change_type: diff.change_type,
        safe_to_publish: breaking_changes.is_empty(),
        breaking_changes,
        impacted_consumers,
        impacted_assets: downstream,
        traversal_depth: depth,
        truncated,
    })
}

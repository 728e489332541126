//! Proposal workflow (C5): pure state-transition decisions for acknowledging,
//! withdrawing, and force-approving a proposal. Persistence is the server's
//! job; this module is the rulebook it consults. Objecting has no decision
//! to make here — it's valid regardless of status and never changes it, so
//! the service layer records it directly against the store.

use std::collections::HashSet;

use uuid::Uuid;

use crate::error::{ErrorCode, Result, TesseraError};
use crate::types::{Acknowledgment, AcknowledgmentResponse, ProposalStatus, Registration, RegistrationStatus};

fn require_pending(status: ProposalStatus) -> Result<()> {
    if status == ProposalStatus::Pending {
        Ok(())
    } else {
        Err(TesseraError::business_rule(
            ErrorCode::ProposalNotPending,
            format!("proposal is not pending (current status: {status:?})"),
        ))
    }
}

/// Whether every team with a live active registration against the asset's
/// current contract has acknowledged the proposal. An asset with no active
/// contract, or a contract with no active registrations, auto-completes
/// with zero required acknowledgments — there is nobody to wait on.
pub fn completion_status(
    active_registrations: &[Registration],
    acknowledgments: &[Acknowledgment],
) -> (bool, usize) {
    let registered_teams: HashSet<Uuid> = active_registrations
        .iter()
        .filter(|r| r.status == RegistrationStatus::Active)
        .map(|r| r.consumer_team_id)
        .collect();
    let acknowledged_teams: HashSet<Uuid> = acknowledgments.iter().map(|a| a.consumer_team_id).collect();

    let all_acknowledged = registered_teams.is_subset(&acknowledged_teams);
    (all_acknowledged, acknowledgments.len())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AcknowledgeOutcome {
    /// A `blocked` response rejects the proposal outright.
    Rejected,
    /// Every registered consumer has now acknowledged without blocking.
    AutoApproved,
    /// Recorded, but other consumers still haven't responded.
    StillPending,
}

/// Decides the proposal-level effect of recording one more acknowledgment.
/// The acknowledgment itself is assumed already persisted by the caller;
/// this only tells the caller what to do with the proposal's status next.
pub fn decide_acknowledge(
    proposal_status: ProposalStatus,
    response: AcknowledgmentResponse,
    active_registrations: &[Registration],
    acknowledgments_including_new: &[Acknowledgment],
) -> Result<AcknowledgeOutcome> {
    require_pending(proposal_status)?;

    if response == AcknowledgmentResponse::Blocked {
        return Ok(AcknowledgeOutcome::Rejected);
    }

    let (all_acknowledged, _) = completion_status(active_registrations, acknowledgments_including_new);
    Ok(if all_acknowledged {
        AcknowledgeOutcome::AutoApproved
    } else {
        AcknowledgeOutcome::StillPending
    })
}

/// A pending proposal can always be withdrawn by its proposing team.
pub fn decide_withdraw(proposal_status: ProposalStatus) -> Result<()> {
    require_pending(proposal_status)
}

/// Force-approval bypasses consumer acknowledgments entirely; only the
/// pending-status guard applies.
pub fn decide_force_approve(proposal_status: ProposalStatus) -> Result<()> {
    require_pending(proposal_status)
}

/// Publishing from a proposal requires it to have already resolved to
/// approved, whether by consensus or by force.
pub fn decide_publish_from_proposal(proposal_status: ProposalStatus) -> Result<()> {
    if proposal_status == ProposalStatus::Approved {
        Ok(())
    } else {
        Err(TesseraError::business_rule(
            ErrorCode::ProposalNotPending,
            format!(
                "cannot publish from proposal with status {proposal_status:?}; it must be approved first"
            ),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn registration(team_id: Uuid, status: RegistrationStatus) -> Registration {
        Registration {
            id: Uuid::new_v4(),
            contract_id: Uuid::new_v4(),
            consumer_team_id: team_id,
            pinned_version: None,
            status,
            registered_at: Utc::now(),
            acknowledged_at: None,
            deleted_at: None,
        }
    }

    fn ack(team_id: Uuid, response: AcknowledgmentResponse) -> Acknowledgment {
        Acknowledgment {
            id: Uuid::new_v4(),
            proposal_id: Uuid::new_v4(),
            consumer_team_id: team_id,
            response,
            migration_deadline: None,
            responded_at: Utc::now(),
            notes: None,
        }
    }

    #[test]
    fn no_registrations_auto_completes() {
        let (complete, count) = completion_status(&[], &[]);
        assert!(complete);
        assert_eq!(count, 0);
    }

    #[test]
    fn partial_acknowledgment_is_incomplete() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let regs = vec![
            registration(a, RegistrationStatus::Active),
            registration(b, RegistrationStatus::Active),
        ];
        let acks = vec![ack(a, AcknowledgmentResponse::Approved)];
        let (complete, count) = completion_status(&regs, &acks);
        assert!(!complete);
        assert_eq!(count, 1);
    }

    #[test]
    fn blocked_response_rejects_regardless_of_others() {
        let team = Uuid::new_v4();
        let regs = vec![registration(team, RegistrationStatus::Active)];
        let acks = vec![ack(team, AcknowledgmentResponse::Blocked)];
        let outcome =
            decide_acknowledge(ProposalStatus::Pending, AcknowledgmentResponse::Blocked, &regs, &acks)
                .unwrap();
        assert_eq!(outcome, AcknowledgeOutcome::Rejected);
    }

    #[test]
    fn last_acknowledgment_auto_approves() {
        let team = Uuid::new_v4();
        let regs = vec![registration(team, RegistrationStatus::Active)];
        let acks = vec![ack(team, AcknowledgmentResponse::Approved)];
        let outcome = decide_acknowledge(
            ProposalStatus::Pending,
            AcknowledgmentResponse::Approved,
            &regs,
            &acks,
        )
        .unwrap();
        assert_eq!(outcome, AcknowledgeOutcome::AutoApproved);
    }

    #[test]
    fn non_pending_proposal_rejects_withdraw_and_force() {
        assert!(decide_withdraw(ProposalStatus::Approved).is_err());
        assert!(decide_force_approve(ProposalStatus::Rejected).is_err());
    }

    #[test]
    fn publish_from_proposal_requires_approved_status() {
        assert!(decide_publish_from_proposal(ProposalStatus::Pending).is_err());
        assert!(decide_publish_from_proposal(ProposalStatus::Approved).is_ok());
    }
}

//! Dispute lifecycle engine.
//!
//! Sits on top of the escrow service: opening a dispute freezes the order's
//! funds before the dispute record exists, and every transition into a
//! terminal dispute status carries an explicit decision that settles the
//! frozen escrow in the same operation. The escrow status gate is the race
//! arbiter throughout; the dispute record follows it.

use std::sync::Arc;

use tracing::{info, warn};

use crate::authz::Authorizer;
use crate::dispute::{
    ActionMetadata, ActionType, Dispute, DisputeAction, DisputeMessage, DisputePriority,
    DisputeStatus, DisputeType, ResolutionDecision,
};
use crate::error::EscrowError;
use crate::escrow::EscrowService;
use crate::ledger::TransactionType;
use crate::order::{EscrowStatus, Order};
use crate::store::EscrowStore;
use crate::time::TimeStamp;

/// Admin dashboard aggregate.
#[derive(Debug, Default)]
pub struct AdminDisputeStats {
    pub total: usize,
    pub open: usize,
    pub pending_resolution: usize,
    pub escalated: usize,
    pub resolved: usize,
    pub closed: usize,
    /// The ten most recently filed disputes, newest first.
    pub recent: Vec<Dispute>,
}

pub struct DisputeService {
    store: Arc<EscrowStore>,
    escrow: Arc<EscrowService>,
    authz: Authorizer,
}

impl DisputeService {
    pub fn new(store: Arc<EscrowStore>, escrow: Arc<EscrowService>) -> Self {
        let authz = Authorizer::new(Arc::clone(&store));
        Self {
            store,
            escrow,
            authz,
        }
    }

    /// File a dispute against an order. Freezes escrow before the dispute
    /// record is written: the `held -> disputed` gate is what closes the
    /// window where two parties could file simultaneously.
    pub fn create_dispute(
        &self,
        order_id: &str,
        complainant_id: &str,
        dispute_type: DisputeType,
        title: &str,
        description: &str,
        evidence_urls: Vec<String>,
        priority: DisputePriority,
    ) -> Result<Dispute, EscrowError> {
        let order = self.require_order(order_id)?;
        let respondent_id = order
            .counterparty(complainant_id)
            .ok_or_else(|| EscrowError::NotAParty(complainant_id.to_string()))?
            .to_string();
        if self.store.live_dispute_for_order(order_id)?.is_some() {
            return Err(EscrowError::DisputeAlreadyOpen(order_id.to_string()));
        }

        let dispute = Dispute::new(
            order_id,
            complainant_id,
            &respondent_id,
            dispute_type,
            title,
            description,
            evidence_urls,
            priority,
        )?;

        match self.escrow.freeze_funds(order_id, &dispute.id) {
            Ok(_) => {}
            Err(EscrowError::InvalidEscrowTransition {
                from: EscrowStatus::Disputed,
                ..
            }) => {
                // Lost the filing race to a concurrent dispute.
                return Err(EscrowError::DisputeAlreadyOpen(order_id.to_string()));
            }
            Err(e) => return Err(e),
        }

        self.store.insert_dispute(&dispute)?;
        self.record_action(
            &dispute.id,
            ActionType::Created,
            complainant_id,
            format!("Dispute filed against order {order_id}"),
            None,
        )?;

        info!(dispute_id = %dispute.id, order_id, "dispute created");
        Ok(dispute)
    }

    /// Post a message to the dispute thread. Internal notes are admin-only
    /// both to write and, later, to read.
    pub fn send_dispute_message(
        &self,
        dispute_id: &str,
        sender_id: &str,
        message: &str,
        attachments: Vec<String>,
        is_internal: bool,
    ) -> Result<DisputeMessage, EscrowError> {
        let dispute = self.require_dispute(dispute_id)?;
        if dispute.status.is_terminal() {
            return Err(EscrowError::DisputeFinalized(dispute.status));
        }
        let admin = self.authz.is_admin(sender_id)?;
        if !admin && !dispute.is_party(sender_id) {
            return Err(EscrowError::NotAParty(sender_id.to_string()));
        }
        if is_internal && !admin {
            return Err(EscrowError::Unauthorized(format!(
                "user {sender_id} cannot post internal notes"
            )));
        }

        let msg = DisputeMessage::new(dispute_id, sender_id, message, attachments, is_internal)?;
        self.store.append_message(&msg)?;
        self.touch(dispute_id)?;
        Ok(msg)
    }

    /// Append evidence URLs to a live dispute.
    pub fn add_evidence(
        &self,
        dispute_id: &str,
        user_id: &str,
        evidence_urls: Vec<String>,
    ) -> Result<Dispute, EscrowError> {
        let urls = evidence_urls.clone();
        let updated = self.store.commit_dispute_update(dispute_id, |mut d| {
            if d.status.is_terminal() {
                return Err(EscrowError::DisputeFinalized(d.status));
            }
            if !d.is_party(user_id) {
                return Err(EscrowError::NotAParty(user_id.to_string()));
            }
            d.evidence_urls.extend(urls.iter().cloned());
            d.updated_at = TimeStamp::now();
            Ok(d)
        })?;

        self.record_action(
            dispute_id,
            ActionType::EvidenceAdded,
            user_id,
            format!("Added {} evidence item(s)", evidence_urls.len()),
            Some(ActionMetadata {
                evidence_urls,
                ..ActionMetadata::default()
            }),
        )?;
        Ok(updated)
    }

    /// Admin moves a dispute along its non-terminal edges: into review or
    /// escalation. Terminal statuses must go through `resolve_dispute` or
    /// `close_dispute`, which carry the escrow decision.
    pub fn update_dispute_status(
        &self,
        dispute_id: &str,
        admin_id: &str,
        target: DisputeStatus,
    ) -> Result<Dispute, EscrowError> {
        self.authz.require_admin(admin_id)?;
        if target.is_terminal() {
            return Err(EscrowError::ResolutionDecisionRequired);
        }

        let updated = self.store.commit_dispute_update(dispute_id, |mut d| {
            Self::check_dispute_edge(&d, target)?;
            d.status = target;
            d.updated_at = TimeStamp::now();
            Ok(d)
        })?;

        let (action_type, description) = match target {
            DisputeStatus::PendingResolution => (
                ActionType::Assigned,
                "Dispute taken under review".to_string(),
            ),
            DisputeStatus::Escalated => {
                (ActionType::Escalated, "Dispute escalated".to_string())
            }
            other => (
                ActionType::Assigned,
                format!("Dispute moved to {other}"),
            ),
        };
        self.record_action(dispute_id, action_type, admin_id, description, None)?;

        info!(dispute_id, status = %target, "dispute status updated");
        Ok(updated)
    }

    /// Resolve a dispute and settle the frozen escrow per `decision`.
    /// Resolution notes are mandatory.
    pub fn resolve_dispute(
        &self,
        dispute_id: &str,
        admin_id: &str,
        decision: ResolutionDecision,
        resolution_notes: &str,
    ) -> Result<Dispute, EscrowError> {
        if resolution_notes.trim().is_empty() {
            return Err(EscrowError::ResolutionNotesRequired);
        }
        self.finalize(
            dispute_id,
            admin_id,
            DisputeStatus::Resolved,
            decision,
            Some(resolution_notes),
        )
    }

    /// Close an escalated dispute. Still settles escrow: closing can never
    /// strand frozen funds.
    pub fn close_dispute(
        &self,
        dispute_id: &str,
        admin_id: &str,
        decision: ResolutionDecision,
        resolution_notes: Option<&str>,
    ) -> Result<Dispute, EscrowError> {
        self.finalize(
            dispute_id,
            admin_id,
            DisputeStatus::Closed,
            decision,
            resolution_notes,
        )
    }

    fn finalize(
        &self,
        dispute_id: &str,
        admin_id: &str,
        target: DisputeStatus,
        decision: ResolutionDecision,
        resolution_notes: Option<&str>,
    ) -> Result<Dispute, EscrowError> {
        self.authz.require_admin(admin_id)?;
        let dispute = self.require_dispute(dispute_id)?;
        Self::check_dispute_edge(&dispute, target)?;

        // Settle escrow first. Its status gate arbitrates concurrent
        // finalizations: the loser fails here and never touches the dispute.
        let order = match decision {
            ResolutionDecision::ReleaseToSeller => {
                self.escrow.release_after_dispute(&dispute.order_id, admin_id)?
            }
            ResolutionDecision::RefundToBuyer => {
                let reason = resolution_notes
                    .map(str::to_string)
                    .unwrap_or_else(|| format!("Refund per dispute {dispute_id}"));
                self.escrow
                    .refund_funds(&dispute.order_id, &reason, Some(admin_id))?
            }
        };

        let now = TimeStamp::now();
        let notes = resolution_notes.map(str::to_string);
        let committed = self.store.commit_dispute_update(dispute_id, |mut d| {
            Self::check_dispute_edge(&d, target)?;
            d.status = target;
            d.resolution_notes = notes.clone();
            d.resolved_by = Some(admin_id.to_string());
            d.resolved_at = Some(now.clone());
            d.updated_at = now.clone();
            Ok(d)
        });
        let updated = match committed {
            Ok(d) => d,
            Err(e) => {
                // Funds already moved; the dispute record is now behind.
                warn!(dispute_id, error = %e, "escrow settled but dispute finalization lost a race; manual reconciliation required");
                return Err(e);
            }
        };

        let action_type = match target {
            DisputeStatus::Resolved => ActionType::Resolved,
            _ => ActionType::Closed,
        };
        let outcome = match decision {
            ResolutionDecision::ReleaseToSeller => "funds released to seller",
            ResolutionDecision::RefundToBuyer => "buyer refunded",
        };
        self.record_action(
            dispute_id,
            action_type,
            admin_id,
            format!("Dispute {}: {outcome}", target.as_str()),
            None,
        )?;

        if decision == ResolutionDecision::RefundToBuyer {
            let refund_ref = self
                .escrow
                .get_escrow_transactions(&dispute.order_id)?
                .into_iter()
                .find(|t| t.transaction_type == TransactionType::Refund)
                .and_then(|t| t.refund_id);
            self.record_action(
                dispute_id,
                ActionType::RefundIssued,
                admin_id,
                format!("Refund of {} cents issued to buyer", order.total_amount),
                Some(ActionMetadata {
                    amount: Some(order.total_amount),
                    processor_ref: refund_ref,
                    ..ActionMetadata::default()
                }),
            )?;
        }

        info!(dispute_id, status = %target, "dispute finalized");
        Ok(updated)
    }

    // ---- read-only projections ----

    /// Disputes where the user is a party, newest first.
    pub fn get_user_disputes(&self, user_id: &str) -> Result<Vec<Dispute>, EscrowError> {
        let mut disputes: Vec<Dispute> = self
            .store
            .disputes()?
            .into_iter()
            .filter(|d| d.is_party(user_id))
            .collect();
        disputes.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(disputes)
    }

    pub fn get_dispute(&self, dispute_id: &str, requester_id: &str) -> Result<Dispute, EscrowError> {
        let dispute = self.require_dispute(dispute_id)?;
        if !dispute.is_party(requester_id) && !self.authz.is_admin(requester_id)? {
            return Err(EscrowError::NotAParty(requester_id.to_string()));
        }
        Ok(dispute)
    }

    /// Thread messages, oldest first. Internal notes are stripped for
    /// non-admin readers.
    pub fn get_dispute_messages(
        &self,
        dispute_id: &str,
        requester_id: &str,
    ) -> Result<Vec<DisputeMessage>, EscrowError> {
        let dispute = self.require_dispute(dispute_id)?;
        let admin = self.authz.is_admin(requester_id)?;
        if !admin && !dispute.is_party(requester_id) {
            return Err(EscrowError::NotAParty(requester_id.to_string()));
        }

        let mut messages = self.store.messages_for_dispute(dispute_id)?;
        if !admin {
            messages.retain(|m| !m.is_internal);
        }
        Ok(messages)
    }

    /// Audit trail, oldest first. Visible to both parties and admins.
    pub fn get_dispute_actions(
        &self,
        dispute_id: &str,
        requester_id: &str,
    ) -> Result<Vec<DisputeAction>, EscrowError> {
        let dispute = self.require_dispute(dispute_id)?;
        if !dispute.is_party(requester_id) && !self.authz.is_admin(requester_id)? {
            return Err(EscrowError::NotAParty(requester_id.to_string()));
        }
        self.store.actions_for_dispute(dispute_id)
    }

    pub fn get_admin_dispute_stats(&self, admin_id: &str) -> Result<AdminDisputeStats, EscrowError> {
        self.authz.require_admin(admin_id)?;

        let mut disputes = self.store.disputes()?;
        let mut stats = AdminDisputeStats {
            total: disputes.len(),
            ..AdminDisputeStats::default()
        };
        for dispute in &disputes {
            match dispute.status {
                DisputeStatus::Open => stats.open += 1,
                DisputeStatus::PendingResolution => stats.pending_resolution += 1,
                DisputeStatus::Escalated => stats.escalated += 1,
                DisputeStatus::Resolved => stats.resolved += 1,
                DisputeStatus::Closed => stats.closed += 1,
            }
        }
        disputes.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        disputes.truncate(10);
        stats.recent = disputes;
        Ok(stats)
    }

    // ---- helpers ----

    fn require_order(&self, order_id: &str) -> Result<Order, EscrowError> {
        self.escrow
            .get_escrow_status(order_id)?
            .ok_or_else(|| EscrowError::OrderNotFound(order_id.to_string()))
    }

    fn require_dispute(&self, dispute_id: &str) -> Result<Dispute, EscrowError> {
        self.store
            .get_dispute(dispute_id)?
            .ok_or_else(|| EscrowError::DisputeNotFound(dispute_id.to_string()))
    }

    fn check_dispute_edge(dispute: &Dispute, target: DisputeStatus) -> Result<(), EscrowError> {
        if dispute.status.can_transition_to(&target) {
            Ok(())
        } else {
            Err(EscrowError::InvalidDisputeTransition {
                from: dispute.status,
                to: target,
            })
        }
    }

    fn record_action(
        &self,
        dispute_id: &str,
        action_type: ActionType,
        performed_by: &str,
        description: String,
        metadata: Option<ActionMetadata>,
    ) -> Result<(), EscrowError> {
        let action =
            DisputeAction::new(dispute_id, action_type, performed_by, description, metadata)?;
        self.store.append_action(&action)
    }

    fn touch(&self, dispute_id: &str) -> Result<(), EscrowError> {
        self.store.commit_dispute_update(dispute_id, |mut d| {
            d.updated_at = TimeStamp::now();
            Ok(d)
        })?;
        Ok(())
    }
}

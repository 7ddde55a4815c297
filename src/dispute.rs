//! Dispute records, thread messages, and the dispute status state machine.
//!
//! Legal transitions: `open -> pending_resolution -> {resolved, escalated}`,
//! `open -> escalated`, `escalated -> {resolved, closed}`. Resolved and
//! closed are terminal. There is one canonical `PendingResolution` value;
//! the UI label "under_review" is presentation only.

use std::fmt;

use chrono::Utc;

use crate::error::EscrowError;
use crate::time::TimeStamp;
use crate::utils::new_uuid_to_bech32;

#[derive(Debug, Clone, Copy, PartialEq, Eq, minicbor::Encode, minicbor::Decode)]
pub enum DisputeStatus {
    #[n(0)]
    Open,
    #[n(1)]
    PendingResolution,
    #[n(2)]
    Resolved,
    #[n(3)]
    Closed,
    #[n(4)]
    Escalated,
}

impl DisputeStatus {
    pub const fn can_transition_to(&self, target: &Self) -> bool {
        use DisputeStatus::{Closed, Escalated, Open, PendingResolution, Resolved};

        matches!(
            (self, target),
            (Open, PendingResolution | Escalated)
                | (PendingResolution, Resolved | Escalated)
                | (Escalated, Resolved | Closed)
        )
    }

    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::Resolved | Self::Closed)
    }

    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Open => "open",
            Self::PendingResolution => "pending_resolution",
            Self::Resolved => "resolved",
            Self::Closed => "closed",
            Self::Escalated => "escalated",
        }
    }

    /// Label shown to end users; differs from the backing value only for
    /// `PendingResolution`.
    pub const fn user_label(&self) -> &'static str {
        match self {
            Self::PendingResolution => "under_review",
            other => other.as_str(),
        }
    }
}

impl fmt::Display for DisputeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, minicbor::Encode, minicbor::Decode)]
pub enum DisputeType {
    #[n(0)]
    QualityIssue,
    #[n(1)]
    DeliveryProblem,
    #[n(2)]
    PaymentDispute,
    #[n(3)]
    CommunicationIssue,
    #[n(4)]
    Other,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, minicbor::Encode, minicbor::Decode)]
pub enum DisputePriority {
    #[n(0)]
    Low,
    #[n(1)]
    Medium,
    #[n(2)]
    High,
    #[n(3)]
    Urgent,
}

/// How a terminal dispute settles the frozen escrow. Required on every
/// transition into a terminal status so a closed dispute can never leave
/// funds frozen.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolutionDecision {
    ReleaseToSeller,
    RefundToBuyer,
}

#[derive(Debug, Clone, PartialEq, Eq, minicbor::Encode, minicbor::Decode)]
pub struct Dispute {
    #[n(0)]
    pub id: String,
    #[n(1)]
    pub order_id: String,
    /// The party who filed the dispute.
    #[n(2)]
    pub complainant_id: String,
    /// The other order party.
    #[n(3)]
    pub respondent_id: String,
    #[n(4)]
    pub dispute_type: DisputeType,
    #[n(5)]
    pub title: String,
    #[n(6)]
    pub description: String,
    #[n(7)]
    pub status: DisputeStatus,
    #[n(8)]
    pub priority: DisputePriority,
    /// Append-only evidence list; grown via the add-evidence operation.
    #[n(9)]
    pub evidence_urls: Vec<String>,
    #[n(10)]
    pub resolution_notes: Option<String>,
    #[n(11)]
    pub resolved_by: Option<String>,
    #[n(12)]
    pub resolved_at: Option<TimeStamp<Utc>>,
    #[n(13)]
    pub created_at: TimeStamp<Utc>,
    #[n(14)]
    pub updated_at: TimeStamp<Utc>,
}

impl Dispute {
    pub fn new(
        order_id: &str,
        complainant_id: &str,
        respondent_id: &str,
        dispute_type: DisputeType,
        title: &str,
        description: &str,
        evidence_urls: Vec<String>,
        priority: DisputePriority,
    ) -> Result<Self, EscrowError> {
        let now = TimeStamp::now();
        Ok(Self {
            id: new_uuid_to_bech32("dispute_")?,
            order_id: order_id.to_string(),
            complainant_id: complainant_id.to_string(),
            respondent_id: respondent_id.to_string(),
            dispute_type,
            title: title.to_string(),
            description: description.to_string(),
            status: DisputeStatus::Open,
            priority,
            evidence_urls,
            resolution_notes: None,
            resolved_by: None,
            resolved_at: None,
            created_at: now.clone(),
            updated_at: now,
        })
    }

    pub fn is_party(&self, user_id: &str) -> bool {
        self.complainant_id == user_id || self.respondent_id == user_id
    }
}

/// One message in a dispute's conversation thread. Append-only.
#[derive(Debug, Clone, PartialEq, Eq, minicbor::Encode, minicbor::Decode)]
pub struct DisputeMessage {
    #[n(0)]
    pub id: String,
    #[n(1)]
    pub dispute_id: String,
    #[n(2)]
    pub sender_id: String,
    #[n(3)]
    pub message: String,
    #[n(4)]
    pub attachments: Vec<String>,
    /// Admin-only visibility; filtered out of party reads.
    #[n(5)]
    pub is_internal: bool,
    #[n(6)]
    pub created_at: TimeStamp<Utc>,
}

impl DisputeMessage {
    pub fn new(
        dispute_id: &str,
        sender_id: &str,
        message: &str,
        attachments: Vec<String>,
        is_internal: bool,
    ) -> Result<Self, EscrowError> {
        Ok(Self {
            id: new_uuid_to_bech32("msg_")?,
            dispute_id: dispute_id.to_string(),
            sender_id: sender_id.to_string(),
            message: message.to_string(),
            attachments,
            is_internal,
            created_at: TimeStamp::now(),
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, minicbor::Encode, minicbor::Decode)]
pub enum ActionType {
    #[n(0)]
    Created,
    #[n(1)]
    Assigned,
    #[n(2)]
    Escalated,
    #[n(3)]
    Resolved,
    #[n(4)]
    Closed,
    #[n(5)]
    EvidenceAdded,
    #[n(6)]
    RefundIssued,
    #[n(7)]
    ReplacementSent,
}

/// Structured payload attached to some actions.
#[derive(Debug, Clone, Default, PartialEq, Eq, minicbor::Encode, minicbor::Decode)]
pub struct ActionMetadata {
    #[n(0)]
    pub evidence_urls: Vec<String>,
    #[n(1)]
    pub amount: Option<u64>,
    #[n(2)]
    pub processor_ref: Option<String>,
}

/// Audit-trail entry; one per state-changing dispute operation. This is the
/// authoritative history rendered to both parties.
#[derive(Debug, Clone, PartialEq, Eq, minicbor::Encode, minicbor::Decode)]
pub struct DisputeAction {
    #[n(0)]
    pub id: String,
    #[n(1)]
    pub dispute_id: String,
    #[n(2)]
    pub action_type: ActionType,
    #[n(3)]
    pub performed_by: String,
    #[n(4)]
    pub description: String,
    #[n(5)]
    pub metadata: Option<ActionMetadata>,
    #[n(6)]
    pub created_at: TimeStamp<Utc>,
}

impl DisputeAction {
    pub fn new(
        dispute_id: &str,
        action_type: ActionType,
        performed_by: &str,
        description: String,
        metadata: Option<ActionMetadata>,
    ) -> Result<Self, EscrowError> {
        Ok(Self {
            id: new_uuid_to_bech32("act_")?,
            dispute_id: dispute_id.to_string(),
            action_type,
            performed_by: performed_by.to_string(),
            description,
            metadata,
            created_at: TimeStamp::now(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn review_path_edges() {
        assert!(DisputeStatus::Open.can_transition_to(&DisputeStatus::PendingResolution));
        assert!(DisputeStatus::PendingResolution.can_transition_to(&DisputeStatus::Resolved));
        assert!(DisputeStatus::PendingResolution.can_transition_to(&DisputeStatus::Escalated));
    }

    #[test]
    fn direct_escalation_is_legal() {
        assert!(DisputeStatus::Open.can_transition_to(&DisputeStatus::Escalated));
        assert!(DisputeStatus::Escalated.can_transition_to(&DisputeStatus::Resolved));
        assert!(DisputeStatus::Escalated.can_transition_to(&DisputeStatus::Closed));
    }

    #[test]
    fn terminal_statuses_accept_nothing() {
        for terminal in [DisputeStatus::Resolved, DisputeStatus::Closed] {
            assert!(terminal.is_terminal());
            for target in [
                DisputeStatus::Open,
                DisputeStatus::PendingResolution,
                DisputeStatus::Resolved,
                DisputeStatus::Closed,
                DisputeStatus::Escalated,
            ] {
                assert!(!terminal.can_transition_to(&target));
            }
        }
    }

    #[test]
    fn resolved_is_not_reachable_from_open() {
        assert!(!DisputeStatus::Open.can_transition_to(&DisputeStatus::Resolved));
        assert!(!DisputeStatus::Open.can_transition_to(&DisputeStatus::Closed));
    }

    #[test]
    fn pending_resolution_surfaces_as_under_review() {
        assert_eq!(DisputeStatus::PendingResolution.as_str(), "pending_resolution");
        assert_eq!(DisputeStatus::PendingResolution.user_label(), "under_review");
        assert_eq!(DisputeStatus::Open.user_label(), "open");
    }

    #[test]
    fn new_dispute_starts_open() {
        let dispute = Dispute::new(
            "order_1",
            "user_buyer",
            "user_seller",
            DisputeType::QualityIssue,
            "Damaged item",
            "Arrived cracked",
            vec![],
            DisputePriority::High,
        )
        .unwrap();

        assert_eq!(dispute.status, DisputeStatus::Open);
        assert!(dispute.id.starts_with("dispute_1"));
        assert!(dispute.is_party("user_buyer"));
        assert!(dispute.is_party("user_seller"));
        assert!(!dispute.is_party("user_other"));
        assert!(dispute.resolved_by.is_none());
    }
}

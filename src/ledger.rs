//! Append-only escrow transaction ledger entries.
//!
//! One `hold` entry is written when payment succeeds, exactly one terminal
//! `release` or `refund` entry when escrow closes, and optionally one
//! `dispute` entry when funds are frozen. Entries are immutable once written
//! except for the pending -> completed/failed status flip that brackets the
//! external processor call.

use std::fmt;

use chrono::Utc;

use crate::error::EscrowError;
use crate::order::Order;
use crate::time::TimeStamp;
use crate::utils::new_uuid_to_bech32;

/// `processed_by` value for entries written by the auto-release sweep.
pub const SYSTEM_ACTOR: &str = "system";

#[derive(Debug, Clone, Copy, PartialEq, Eq, minicbor::Encode, minicbor::Decode)]
pub enum TransactionType {
    #[n(0)]
    Hold,
    #[n(1)]
    Release,
    #[n(2)]
    Refund,
    #[n(3)]
    Dispute,
}

impl TransactionType {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Hold => "hold",
            Self::Release => "release",
            Self::Refund => "refund",
            Self::Dispute => "dispute",
        }
    }
}

impl fmt::Display for TransactionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, minicbor::Encode, minicbor::Decode)]
pub enum TransactionStatus {
    #[n(0)]
    Pending,
    #[n(1)]
    Completed,
    #[n(2)]
    Failed,
}

#[derive(Debug, Clone, PartialEq, Eq, minicbor::Encode, minicbor::Decode)]
pub struct EscrowTransaction {
    #[n(0)]
    pub id: String,
    #[n(1)]
    pub order_id: String,
    #[n(2)]
    pub transaction_type: TransactionType,
    /// Amount moved, in cents. Net amount for hold/release/dispute entries,
    /// gross amount for refunds.
    #[n(3)]
    pub amount: u64,
    /// Processor transfer reference; only ever set on release entries.
    #[n(4)]
    pub transfer_id: Option<String>,
    /// Processor refund reference; only ever set on refund entries.
    #[n(5)]
    pub refund_id: Option<String>,
    #[n(6)]
    pub status: TransactionStatus,
    #[n(7)]
    pub reason: String,
    /// User id that triggered the movement, or `"system"` for the sweep.
    #[n(8)]
    pub processed_by: Option<String>,
    #[n(9)]
    pub created_at: TimeStamp<Utc>,
    #[n(10)]
    pub processed_at: Option<TimeStamp<Utc>>,
}

impl EscrowTransaction {
    fn new(
        order: &Order,
        transaction_type: TransactionType,
        amount: u64,
        status: TransactionStatus,
        reason: String,
        processed_by: Option<&str>,
    ) -> Result<Self, EscrowError> {
        Ok(Self {
            id: new_uuid_to_bech32("txn_")?,
            order_id: order.id.clone(),
            transaction_type,
            amount,
            transfer_id: None,
            refund_id: None,
            status,
            reason,
            processed_by: processed_by.map(str::to_string),
            created_at: TimeStamp::now(),
            processed_at: None,
        })
    }

    /// Hold entry written together with the escrow-status flip to `held`.
    pub fn hold(order: &Order) -> Result<Self, EscrowError> {
        Self::new(
            order,
            TransactionType::Hold,
            order.net_amount,
            TransactionStatus::Completed,
            "Funds held in escrow after successful payment".to_string(),
            None,
        )
    }

    /// Release entry, written `pending` before the processor transfer.
    pub fn release(order: &Order, processed_by: Option<&str>) -> Result<Self, EscrowError> {
        Self::new(
            order,
            TransactionType::Release,
            order.net_amount,
            TransactionStatus::Pending,
            "Funds released to seller after delivery confirmation".to_string(),
            processed_by,
        )
    }

    /// Refund entry, written `pending` before the processor refund.
    pub fn refund(
        order: &Order,
        reason: &str,
        processed_by: Option<&str>,
    ) -> Result<Self, EscrowError> {
        Self::new(
            order,
            TransactionType::Refund,
            order.total_amount,
            TransactionStatus::Pending,
            reason.to_string(),
            processed_by,
        )
    }

    /// Dispute-freeze entry referencing the dispute that froze the funds.
    pub fn dispute_freeze(order: &Order, dispute_id: &str) -> Result<Self, EscrowError> {
        Self::new(
            order,
            TransactionType::Dispute,
            order.net_amount,
            TransactionStatus::Completed,
            format!("Funds frozen due to dispute: {dispute_id}"),
            None,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::order::{EscrowStatus, OrderStatus};

    fn sample_order() -> Order {
        Order {
            id: "order_test".to_string(),
            buyer_id: "user_buyer".to_string(),
            seller_id: "user_seller".to_string(),
            product_id: "prod_1".to_string(),
            quantity: 1,
            total_amount: 10_000,
            commission_amount: 500,
            net_amount: 9_500,
            order_status: OrderStatus::Paid,
            escrow_status: EscrowStatus::Held,
            escrow_release_date: None,
            dispute_deadline: None,
            delivery_confirmation_date: None,
            payment_intent_id: Some("pi_test".to_string()),
            created_at: TimeStamp::now(),
        }
    }

    #[test]
    fn hold_entries_record_net_amount() {
        let entry = EscrowTransaction::hold(&sample_order()).unwrap();

        assert_eq!(entry.transaction_type, TransactionType::Hold);
        assert_eq!(entry.amount, 9_500);
        assert_eq!(entry.status, TransactionStatus::Completed);
        assert!(entry.id.starts_with("txn_1"));
    }

    #[test]
    fn refund_entries_record_gross_amount() {
        let entry = EscrowTransaction::refund(&sample_order(), "item damaged", Some("user_admin"))
            .unwrap();

        assert_eq!(entry.amount, 10_000);
        assert_eq!(entry.status, TransactionStatus::Pending);
        assert_eq!(entry.processed_by.as_deref(), Some("user_admin"));
    }

    #[test]
    fn release_entries_start_pending() {
        let entry = EscrowTransaction::release(&sample_order(), Some(SYSTEM_ACTOR)).unwrap();

        assert_eq!(entry.status, TransactionStatus::Pending);
        assert!(entry.transfer_id.is_none());
        assert!(entry.processed_at.is_none());
    }
}

//! Order record and the escrow status state machine.
//!
//! The escrow status is the financially load-bearing field: transitions are
//! monotone along `pending -> held -> {released | refunded | disputed}` with
//! `disputed -> {released | refunded}` the only way out of a dispute. Every
//! mutation of it goes through the escrow service, which re-checks these
//! edges inside a storage transaction.

use std::fmt;

use chrono::Utc;

use crate::time::TimeStamp;

#[derive(Debug, Clone, Copy, PartialEq, Eq, minicbor::Encode, minicbor::Decode)]
pub enum OrderStatus {
    #[n(0)]
    Pending,
    #[n(1)]
    Paid,
    #[n(2)]
    Shipped,
    #[n(3)]
    Delivered,
    #[n(4)]
    Cancelled,
    #[n(5)]
    Disputed,
    #[n(6)]
    Refunded,
}

impl OrderStatus {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Paid => "paid",
            Self::Shipped => "shipped",
            Self::Delivered => "delivered",
            Self::Cancelled => "cancelled",
            Self::Disputed => "disputed",
            Self::Refunded => "refunded",
        }
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, minicbor::Encode, minicbor::Decode)]
pub enum EscrowStatus {
    #[n(0)]
    Pending,
    #[n(1)]
    Held,
    #[n(2)]
    Released,
    #[n(3)]
    Refunded,
    #[n(4)]
    Disputed,
}

impl EscrowStatus {
    /// Whether the edge `self -> target` is legal.
    pub const fn can_transition_to(&self, target: &Self) -> bool {
        use EscrowStatus::{Disputed, Held, Pending, Refunded, Released};

        matches!(
            (self, target),
            (Pending, Held) | (Held | Disputed, Released) | (Held | Disputed, Refunded) | (Held, Disputed)
        )
    }

    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::Released | Self::Refunded)
    }

    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Held => "held",
            Self::Released => "released",
            Self::Refunded => "refunded",
            Self::Disputed => "disputed",
        }
    }
}

impl fmt::Display for EscrowStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A marketplace order. Created at checkout, mutated only by the escrow and
/// dispute services, never deleted (financial record).
#[derive(Debug, Clone, PartialEq, Eq, minicbor::Encode, minicbor::Decode)]
pub struct Order {
    #[n(0)]
    pub id: String,
    #[n(1)]
    pub buyer_id: String,
    #[n(2)]
    pub seller_id: String,
    #[n(3)]
    pub product_id: String,
    #[n(4)]
    pub quantity: u32,
    /// Gross amount charged to the buyer, in cents.
    #[n(5)]
    pub total_amount: u64,
    /// Platform fee, in cents.
    #[n(6)]
    pub commission_amount: u64,
    /// Amount owed to the seller: total minus commission.
    #[n(7)]
    pub net_amount: u64,
    #[n(8)]
    pub order_status: OrderStatus,
    #[n(9)]
    pub escrow_status: EscrowStatus,
    /// Set at hold time: hold instant plus the release window.
    #[n(10)]
    pub escrow_release_date: Option<TimeStamp<Utc>>,
    /// Set at hold time: hold instant plus the dispute window.
    #[n(11)]
    pub dispute_deadline: Option<TimeStamp<Utc>>,
    #[n(12)]
    pub delivery_confirmation_date: Option<TimeStamp<Utc>>,
    /// Processor reference to the original charge, needed to issue refunds.
    #[n(13)]
    pub payment_intent_id: Option<String>,
    #[n(14)]
    pub created_at: TimeStamp<Utc>,
}

impl Order {
    pub fn is_party(&self, user_id: &str) -> bool {
        self.buyer_id == user_id || self.seller_id == user_id
    }

    /// The other order party, from one party's point of view.
    pub fn counterparty(&self, user_id: &str) -> Option<&str> {
        if user_id == self.buyer_id {
            Some(&self.seller_id)
        } else if user_id == self.seller_id {
            Some(&self.buyer_id)
        } else {
            None
        }
    }
}

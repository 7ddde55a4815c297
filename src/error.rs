//! Closed error taxonomy for the escrow and dispute engine.
//!
//! Every fallible operation returns one of these kinds so callers can branch
//! on the variant instead of matching message substrings. Authorization
//! failures are deliberately distinct from not-found failures.

use crate::dispute::DisputeStatus;
use crate::order::{EscrowStatus, OrderStatus};
use crate::processor::ProcessorError;

#[derive(thiserror::Error, Debug)]
pub enum EscrowError {
    #[error("order not found: {0}")]
    OrderNotFound(String),
    #[error("dispute not found: {0}")]
    DisputeNotFound(String),
    #[error("illegal escrow transition from {from} to {to}")]
    InvalidEscrowTransition { from: EscrowStatus, to: EscrowStatus },
    #[error("illegal order transition from {from} to {to}")]
    InvalidOrderTransition { from: OrderStatus, to: OrderStatus },
    #[error("illegal dispute transition from {from} to {to}")]
    InvalidDisputeTransition {
        from: DisputeStatus,
        to: DisputeStatus,
    },
    #[error("order {0} already has a live dispute")]
    DisputeAlreadyOpen(String),
    #[error("user {0} is not a party to this order or dispute")]
    NotAParty(String),
    #[error("admin access required: {0}")]
    Unauthorized(String),
    #[error("seller {0} has no payout account configured")]
    SellerPayoutAccountMissing(String),
    #[error("order {0} has no payment intent to refund against")]
    MissingPaymentIntent(String),
    #[error("dispute is {0} and no longer accepts updates")]
    DisputeFinalized(DisputeStatus),
    #[error("resolution notes are required to resolve a dispute")]
    ResolutionNotesRequired,
    #[error("terminal dispute statuses require an explicit resolution decision")]
    ResolutionDecisionRequired,
    #[error("unknown seller tier: {0}")]
    InvalidTier(String),
    #[error("invalid amount: {0}")]
    InvalidAmount(String),
    #[error("payment processor call failed: {0}")]
    Processor(#[from] ProcessorError),
    #[error("storage error: {0}")]
    Store(#[from] sled::Error),
    #[error("codec error: {0}")]
    Codec(String),
    #[error("identifier encoding failed: {0}")]
    IdEncoding(String),
}

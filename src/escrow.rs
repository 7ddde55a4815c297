//! Escrow ledger service.
//!
//! Owns every mutation of an order's escrow status and writes the matching
//! ledger entry in the same storage transaction. Processor-backed operations
//! (release, refund) bracket the external call with a pending ledger entry
//! so a crash or a lost race leaves an auditable trace instead of silent
//! fund loss: the entry is written `pending` before the call and flipped to
//! `completed` or `failed` after. Failed processor calls never advance order
//! state and are never retried automatically.

use std::sync::Arc;

use tracing::{error, info, warn};

use crate::commission::{SellerTier, commission_for};
use crate::config::EscrowConfig;
use crate::error::EscrowError;
use crate::ledger::{EscrowTransaction, SYSTEM_ACTOR, TransactionStatus};
use crate::order::{EscrowStatus, Order, OrderStatus};
use crate::processor::{PaymentProcessor, RefundMetadata, TransferMetadata};
use crate::store::EscrowStore;
use crate::sweep::SweepReport;
use crate::time::TimeStamp;
use crate::utils::new_uuid_to_bech32;

/// Per-seller aggregate over escrowed funds, in cents.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SellerEscrowSummary {
    pub total_held: u64,
    pub total_released: u64,
    pub total_refunded: u64,
    pub pending_orders: usize,
    pub released_orders: usize,
}

pub struct EscrowService {
    store: Arc<EscrowStore>,
    processor: Arc<dyn PaymentProcessor>,
    config: EscrowConfig,
}

impl EscrowService {
    pub fn new(
        store: Arc<EscrowStore>,
        processor: Arc<dyn PaymentProcessor>,
        config: EscrowConfig,
    ) -> Self {
        Self {
            store,
            processor,
            config,
        }
    }

    /// Checkout entry point: computes the platform fee for the seller's tier
    /// and inserts the order as `pending/pending`.
    pub fn create_order(
        &self,
        buyer_id: &str,
        seller_id: &str,
        product_id: &str,
        quantity: u32,
        total_amount: u64,
        seller_tier: SellerTier,
        payment_intent_id: Option<String>,
    ) -> Result<Order, EscrowError> {
        if quantity == 0 {
            return Err(EscrowError::InvalidAmount(
                "quantity must be at least one".to_string(),
            ));
        }
        let commission_amount = commission_for(total_amount, seller_tier);
        if commission_amount >= total_amount {
            return Err(EscrowError::InvalidAmount(format!(
                "total of {total_amount} cents does not cover the minimum platform commission"
            )));
        }

        let order = Order {
            id: new_uuid_to_bech32("order_")?,
            buyer_id: buyer_id.to_string(),
            seller_id: seller_id.to_string(),
            product_id: product_id.to_string(),
            quantity,
            total_amount,
            commission_amount,
            net_amount: total_amount - commission_amount,
            order_status: OrderStatus::Pending,
            escrow_status: EscrowStatus::Pending,
            escrow_release_date: None,
            dispute_deadline: None,
            delivery_confirmation_date: None,
            payment_intent_id,
            created_at: TimeStamp::now(),
        };
        self.store.insert_order(&order)?;

        info!(
            order_id = %order.id,
            total = order.total_amount,
            commission = order.commission_amount,
            "order created"
        );
        Ok(order)
    }

    /// Take funds into escrow after a successful payment. Stamps the release
    /// date and dispute deadline from the hold instant.
    pub fn hold_funds(&self, order_id: &str) -> Result<Order, EscrowError> {
        let order = self.require_order(order_id)?;
        let now = TimeStamp::now();
        let release_date = now.plus_days(self.config.release_days);
        let dispute_deadline = now.plus_days(self.config.dispute_days);
        let entry = EscrowTransaction::hold(&order)?;

        let updated = self.store.commit_order_transition(order_id, &entry, |mut o| {
            Self::check_escrow_edge(&o, EscrowStatus::Held)?;
            o.escrow_status = EscrowStatus::Held;
            o.order_status = OrderStatus::Paid;
            o.escrow_release_date = Some(release_date.clone());
            o.dispute_deadline = Some(dispute_deadline.clone());
            Ok(o)
        })?;

        info!(order_id, amount = updated.net_amount, "funds held in escrow");
        Ok(updated)
    }

    /// Seller ships the order. Order-status glue only; escrow stays held.
    pub fn mark_shipped(&self, order_id: &str) -> Result<Order, EscrowError> {
        let updated = self.store.commit_order_update(order_id, |mut o| {
            if o.order_status != OrderStatus::Paid {
                return Err(EscrowError::InvalidOrderTransition {
                    from: o.order_status,
                    to: OrderStatus::Shipped,
                });
            }
            o.order_status = OrderStatus::Shipped;
            Ok(o)
        })?;

        info!(order_id, "order marked shipped");
        Ok(updated)
    }

    /// Release held funds to the seller via a processor transfer.
    pub fn release_funds(
        &self,
        order_id: &str,
        processed_by: Option<&str>,
    ) -> Result<Order, EscrowError> {
        self.settle_release(order_id, processed_by, EscrowStatus::Held)
    }

    /// Release path for a dispute resolved in the seller's favor; gates on
    /// `disputed` instead of `held`. Not reachable from the public release
    /// surface, so a buyer cannot unfreeze funds by confirming delivery.
    pub(crate) fn release_after_dispute(
        &self,
        order_id: &str,
        processed_by: &str,
    ) -> Result<Order, EscrowError> {
        self.settle_release(order_id, Some(processed_by), EscrowStatus::Disputed)
    }

    fn settle_release(
        &self,
        order_id: &str,
        processed_by: Option<&str>,
        expected: EscrowStatus,
    ) -> Result<Order, EscrowError> {
        let order = self.require_order(order_id)?;
        if order.escrow_status != expected {
            return Err(EscrowError::InvalidEscrowTransition {
                from: order.escrow_status,
                to: EscrowStatus::Released,
            });
        }

        // Hard stop, not a silent skip: releasing without a payout account
        // would strand the funds.
        let payout_account = self
            .store
            .get_user(&order.seller_id)?
            .and_then(|profile| profile.payout_account)
            .ok_or_else(|| EscrowError::SellerPayoutAccountMissing(order.seller_id.clone()))?;

        let mut entry = EscrowTransaction::release(&order, processed_by)?;
        self.store.append_transaction(&entry)?;

        // The key is stable across attempts for this order, so the processor
        // collapses concurrent or retried releases into a single transfer.
        let metadata = TransferMetadata {
            order_id: order.id.clone(),
            seller_id: order.seller_id.clone(),
            product_id: order.product_id.clone(),
            idempotency_key: format!("{}/release", order.id),
        };
        let transfer_id =
            match self
                .processor
                .create_transfer(&payout_account, order.net_amount, &metadata)
            {
                Ok(id) => id,
                Err(e) => {
                    self.store.update_transaction(order_id, &entry.id, |t| {
                        t.status = TransactionStatus::Failed;
                        t.processed_at = Some(TimeStamp::now());
                    })?;
                    error!(order_id, error = %e, "transfer failed; order queued for manual retry");
                    return Err(EscrowError::Processor(e));
                }
            };

        let now = TimeStamp::now();
        entry.status = TransactionStatus::Completed;
        entry.transfer_id = Some(transfer_id.clone());
        entry.processed_at = Some(now.clone());

        let committed = self.store.commit_order_transition(order_id, &entry, |mut o| {
            if o.escrow_status != expected {
                return Err(EscrowError::InvalidEscrowTransition {
                    from: o.escrow_status,
                    to: EscrowStatus::Released,
                });
            }
            o.escrow_status = EscrowStatus::Released;
            o.order_status = OrderStatus::Delivered;
            o.delivery_confirmation_date = Some(now.clone());
            Ok(o)
        });

        match committed {
            Ok(updated) => {
                info!(order_id, amount = updated.net_amount, transfer_id, "funds released");
                Ok(updated)
            }
            Err(e) => {
                // The transfer went through but a concurrent writer advanced
                // the order first. Keep the entry pending with the transfer
                // reference so reconciliation can find it.
                self.store.update_transaction(order_id, &entry.id, |t| {
                    t.status = TransactionStatus::Pending;
                    t.transfer_id = Some(transfer_id.clone());
                })?;
                warn!(order_id, transfer_id, "transfer sent but local commit lost a race; manual reconciliation required");
                Err(e)
            }
        }
    }

    /// Refund the gross amount to the buyer against the original payment
    /// intent. Legal from `held` (cancellation) and `disputed` (resolution).
    pub fn refund_funds(
        &self,
        order_id: &str,
        reason: &str,
        processed_by: Option<&str>,
    ) -> Result<Order, EscrowError> {
        let order = self.require_order(order_id)?;
        if !matches!(order.escrow_status, EscrowStatus::Held | EscrowStatus::Disputed) {
            return Err(EscrowError::InvalidEscrowTransition {
                from: order.escrow_status,
                to: EscrowStatus::Refunded,
            });
        }
        let payment_intent_id = order
            .payment_intent_id
            .clone()
            .ok_or_else(|| EscrowError::MissingPaymentIntent(order.id.clone()))?;

        let mut entry = EscrowTransaction::refund(&order, reason, processed_by)?;
        self.store.append_transaction(&entry)?;

        let metadata = RefundMetadata {
            order_id: order.id.clone(),
            buyer_id: order.buyer_id.clone(),
            reason: reason.to_string(),
            idempotency_key: format!("{}/refund", order.id),
        };
        let refund_id = match self.processor.create_refund(
            &payment_intent_id,
            order.total_amount,
            &metadata,
        ) {
            Ok(id) => id,
            Err(e) => {
                self.store.update_transaction(order_id, &entry.id, |t| {
                    t.status = TransactionStatus::Failed;
                    t.processed_at = Some(TimeStamp::now());
                })?;
                error!(order_id, error = %e, "refund failed; order queued for manual retry");
                return Err(EscrowError::Processor(e));
            }
        };

        let now = TimeStamp::now();
        entry.status = TransactionStatus::Completed;
        entry.refund_id = Some(refund_id.clone());
        entry.processed_at = Some(now);

        let committed = self.store.commit_order_transition(order_id, &entry, |mut o| {
            if !matches!(o.escrow_status, EscrowStatus::Held | EscrowStatus::Disputed) {
                return Err(EscrowError::InvalidEscrowTransition {
                    from: o.escrow_status,
                    to: EscrowStatus::Refunded,
                });
            }
            o.escrow_status = EscrowStatus::Refunded;
            o.order_status = OrderStatus::Refunded;
            Ok(o)
        });

        match committed {
            Ok(updated) => {
                info!(order_id, amount = updated.total_amount, refund_id, "funds refunded");
                Ok(updated)
            }
            Err(e) => {
                self.store.update_transaction(order_id, &entry.id, |t| {
                    t.status = TransactionStatus::Pending;
                    t.refund_id = Some(refund_id.clone());
                })?;
                warn!(order_id, refund_id, "refund sent but local commit lost a race; manual reconciliation required");
                Err(e)
            }
        }
    }

    /// Freeze held funds while a dispute is live. Invoked by the dispute
    /// engine, never directly by users. The `held -> disputed` gate inside
    /// the transaction is what guarantees a freeze and a concurrent release
    /// cannot both win.
    pub fn freeze_funds(&self, order_id: &str, dispute_id: &str) -> Result<Order, EscrowError> {
        let order = self.require_order(order_id)?;
        let entry = EscrowTransaction::dispute_freeze(&order, dispute_id)?;

        let updated = self.store.commit_order_transition(order_id, &entry, |mut o| {
            Self::check_escrow_edge(&o, EscrowStatus::Disputed)?;
            o.escrow_status = EscrowStatus::Disputed;
            o.order_status = OrderStatus::Disputed;
            Ok(o)
        })?;

        info!(order_id, dispute_id, amount = updated.net_amount, "funds frozen for dispute");
        Ok(updated)
    }

    /// One sweep pass: release every held order past its window. Failures
    /// are isolated per order and retried on the next pass, never inline.
    pub fn auto_release_expired_funds(&self) -> Result<SweepReport, EscrowError> {
        let mut report = SweepReport::default();
        for order in self.store.orders()? {
            if !Self::eligible_for_auto_release(&order) {
                continue;
            }
            match self.release_funds(&order.id, Some(SYSTEM_ACTOR)) {
                Ok(_) => {
                    info!(order_id = %order.id, "auto-released expired escrow");
                    report.released.push(order.id);
                }
                Err(e) => {
                    warn!(order_id = %order.id, error = %e, "auto-release failed; will retry next sweep");
                    report.failed.push((order.id, e));
                }
            }
        }
        Ok(report)
    }

    // ---- read-only projections ----

    pub fn get_escrow_status(&self, order_id: &str) -> Result<Option<Order>, EscrowError> {
        self.store.get_order(order_id)
    }

    pub fn get_escrow_transactions(
        &self,
        order_id: &str,
    ) -> Result<Vec<EscrowTransaction>, EscrowError> {
        self.store.transactions_for_order(order_id)
    }

    pub fn get_seller_escrow_summary(
        &self,
        seller_id: &str,
    ) -> Result<SellerEscrowSummary, EscrowError> {
        let mut summary = SellerEscrowSummary::default();
        for order in self.store.orders()? {
            if order.seller_id != seller_id {
                continue;
            }
            match order.escrow_status {
                EscrowStatus::Held => {
                    summary.total_held += order.net_amount;
                    summary.pending_orders += 1;
                }
                EscrowStatus::Released => {
                    summary.total_released += order.net_amount;
                    summary.released_orders += 1;
                }
                EscrowStatus::Refunded => {
                    summary.total_refunded += order.total_amount;
                }
                EscrowStatus::Pending | EscrowStatus::Disputed => {}
            }
        }
        Ok(summary)
    }

    /// Eligible iff held, past the release date, and past the dispute
    /// deadline. A frozen order is never eligible no matter how old.
    pub fn check_auto_release_eligibility(&self, order_id: &str) -> Result<bool, EscrowError> {
        Ok(self
            .store
            .get_order(order_id)?
            .is_some_and(|order| Self::eligible_for_auto_release(&order)))
    }

    fn eligible_for_auto_release(order: &Order) -> bool {
        let now = TimeStamp::now();
        order.escrow_status == EscrowStatus::Held
            && order
                .escrow_release_date
                .as_ref()
                .is_some_and(|release| now >= *release)
            && order
                .dispute_deadline
                .as_ref()
                .is_some_and(|deadline| now > *deadline)
    }

    fn require_order(&self, order_id: &str) -> Result<Order, EscrowError> {
        self.store
            .get_order(order_id)?
            .ok_or_else(|| EscrowError::OrderNotFound(order_id.to_string()))
    }

    fn check_escrow_edge(order: &Order, target: EscrowStatus) -> Result<(), EscrowError> {
        if order.escrow_status.can_transition_to(&target) {
            Ok(())
        } else {
            Err(EscrowError::InvalidEscrowTransition {
                from: order.escrow_status,
                to: target,
            })
        }
    }
}

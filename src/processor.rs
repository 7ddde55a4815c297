//! Payment processor interface.
//!
//! The engine never talks to the processor's wire API directly; it goes
//! through this trait so the real integration and the in-crate mock are
//! interchangeable. Both calls carry an idempotency key derived from the
//! order id and movement type, so concurrent or retried attempts for the
//! same order collapse into a single transfer or refund at the processor.

use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};

use uuid7::uuid7;

#[derive(thiserror::Error, Debug)]
pub enum ProcessorError {
    #[error("transfer or refund declined: {0}")]
    Declined(String),
    #[error("rate limited by processor")]
    RateLimited,
    #[error("processor call timed out")]
    Timeout,
    #[error("processor api error: {0}")]
    Api(String),
}

#[derive(Debug, Clone)]
pub struct TransferMetadata {
    pub order_id: String,
    pub seller_id: String,
    pub product_id: String,
    pub idempotency_key: String,
}

#[derive(Debug, Clone)]
pub struct RefundMetadata {
    pub order_id: String,
    pub buyer_id: String,
    pub reason: String,
    pub idempotency_key: String,
}

pub trait PaymentProcessor: Send + Sync {
    /// Transfer `amount` cents to a seller payout account. Returns the
    /// processor's transfer id.
    fn create_transfer(
        &self,
        destination: &str,
        amount: u64,
        metadata: &TransferMetadata,
    ) -> Result<String, ProcessorError>;

    /// Refund `amount` cents against the original charge. Returns the
    /// processor's refund id.
    fn create_refund(
        &self,
        payment_intent_id: &str,
        amount: u64,
        metadata: &RefundMetadata,
    ) -> Result<String, ProcessorError>;
}

#[derive(Debug, Clone)]
pub struct TransferRecord {
    pub id: String,
    pub destination: String,
    pub amount: u64,
    pub order_id: String,
    pub idempotency_key: String,
}

#[derive(Debug, Clone)]
pub struct RefundRecord {
    pub id: String,
    pub payment_intent_id: String,
    pub amount: u64,
    pub order_id: String,
    pub idempotency_key: String,
}

/// In-memory processor double. Records every successful call, dedupes on
/// the idempotency key like the real processor, and can be scripted to
/// fail, for exercising the failed-transfer and reconciliation paths.
#[derive(Debug, Default)]
pub struct MockProcessor {
    transfers: Mutex<Vec<TransferRecord>>,
    refunds: Mutex<Vec<RefundRecord>>,
    fail_transfers: AtomicBool,
    fail_refunds: AtomicBool,
}

impl MockProcessor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_fail_transfers(&self, fail: bool) {
        self.fail_transfers.store(fail, Ordering::SeqCst);
    }

    pub fn set_fail_refunds(&self, fail: bool) {
        self.fail_refunds.store(fail, Ordering::SeqCst);
    }

    pub fn transfers(&self) -> Vec<TransferRecord> {
        self.transfers.lock().expect("mock lock poisoned").clone()
    }

    pub fn refunds(&self) -> Vec<RefundRecord> {
        self.refunds.lock().expect("mock lock poisoned").clone()
    }
}

impl PaymentProcessor for MockProcessor {
    fn create_transfer(
        &self,
        destination: &str,
        amount: u64,
        metadata: &TransferMetadata,
    ) -> Result<String, ProcessorError> {
        if self.fail_transfers.load(Ordering::SeqCst) {
            return Err(ProcessorError::Api("simulated transfer failure".to_string()));
        }

        let mut transfers = self.transfers.lock().expect("mock lock poisoned");
        if let Some(existing) = transfers
            .iter()
            .find(|t| t.idempotency_key == metadata.idempotency_key)
        {
            return Ok(existing.id.clone());
        }

        let record = TransferRecord {
            id: format!("tr_{}", uuid7()),
            destination: destination.to_string(),
            amount,
            order_id: metadata.order_id.clone(),
            idempotency_key: metadata.idempotency_key.clone(),
        };
        let id = record.id.clone();
        transfers.push(record);
        Ok(id)
    }

    fn create_refund(
        &self,
        payment_intent_id: &str,
        amount: u64,
        metadata: &RefundMetadata,
    ) -> Result<String, ProcessorError> {
        if self.fail_refunds.load(Ordering::SeqCst) {
            return Err(ProcessorError::Api("simulated refund failure".to_string()));
        }

        let mut refunds = self.refunds.lock().expect("mock lock poisoned");
        if let Some(existing) = refunds
            .iter()
            .find(|r| r.idempotency_key == metadata.idempotency_key)
        {
            return Ok(existing.id.clone());
        }

        let record = RefundRecord {
            id: format!("re_{}", uuid7()),
            payment_intent_id: payment_intent_id.to_string(),
            amount,
            order_id: metadata.order_id.clone(),
            idempotency_key: metadata.idempotency_key.clone(),
        };
        let id = record.id.clone();
        refunds.push(record);
        Ok(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn transfer_meta() -> TransferMetadata {
        TransferMetadata {
            order_id: "order_1".to_string(),
            seller_id: "user_seller".to_string(),
            product_id: "prod_1".to_string(),
            idempotency_key: "order_1/release".to_string(),
        }
    }

    #[test]
    fn mock_records_transfers() {
        let mock = MockProcessor::new();

        let id = mock.create_transfer("acct_123", 9_500, &transfer_meta()).unwrap();

        let transfers = mock.transfers();
        assert_eq!(transfers.len(), 1);
        assert_eq!(transfers[0].id, id);
        assert_eq!(transfers[0].amount, 9_500);
        assert!(id.starts_with("tr_"));
    }

    #[test]
    fn repeated_idempotency_keys_return_the_original_transfer() {
        let mock = MockProcessor::new();

        let first = mock.create_transfer("acct_123", 9_500, &transfer_meta()).unwrap();
        let second = mock.create_transfer("acct_123", 9_500, &transfer_meta()).unwrap();

        assert_eq!(first, second);
        assert_eq!(mock.transfers().len(), 1);
    }

    #[test]
    fn failed_attempts_do_not_burn_the_idempotency_key() {
        let mock = MockProcessor::new();
        mock.set_fail_transfers(true);
        mock.create_transfer("acct_123", 9_500, &transfer_meta()).unwrap_err();

        mock.set_fail_transfers(false);
        let id = mock.create_transfer("acct_123", 9_500, &transfer_meta()).unwrap();

        assert!(id.starts_with("tr_"));
        assert_eq!(mock.transfers().len(), 1);
    }

    #[test]
    fn scripted_failure_surfaces_as_api_error() {
        let mock = MockProcessor::new();
        mock.set_fail_transfers(true);

        let err = mock
            .create_transfer("acct_123", 9_500, &transfer_meta())
            .unwrap_err();

        assert!(matches!(err, ProcessorError::Api(_)));
        assert!(mock.transfers().is_empty());
    }
}

//! Sled-backed persistent store for orders, ledger entries, disputes, and
//! user profiles.
//!
//! Key layout: orders, disputes, and users are keyed by their bech32 id.
//! Per-parent logs (ledger entries, messages, actions) are keyed as
//! `"{parent_id}/{entry_id}"` so a prefix scan returns one record's log.
//!
//! Status-gated mutations run inside a sled transaction that re-reads the
//! row and re-checks the precondition, which is what makes two concurrent
//! operations on the same order (say a release and a freeze) resolve to
//! exactly one winner instead of both committing.

use std::sync::Arc;

use sled::Transactional;
use sled::transaction::{ConflictableTransactionError, TransactionError};

use crate::authz::UserProfile;
use crate::dispute::{Dispute, DisputeAction, DisputeMessage};
use crate::error::EscrowError;
use crate::ledger::EscrowTransaction;
use crate::order::Order;

pub struct EscrowStore {
    orders: sled::Tree,
    transactions: sled::Tree,
    disputes: sled::Tree,
    messages: sled::Tree,
    actions: sled::Tree,
    users: sled::Tree,
}

fn encode<T: minicbor::Encode<()>>(value: &T) -> Result<Vec<u8>, EscrowError> {
    minicbor::to_vec(value).map_err(|e| EscrowError::Codec(e.to_string()))
}

fn decode<T: for<'b> minicbor::Decode<'b, ()>>(bytes: &[u8]) -> Result<T, EscrowError> {
    minicbor::decode(bytes).map_err(|e| EscrowError::Codec(e.to_string()))
}

fn abort(err: EscrowError) -> ConflictableTransactionError<EscrowError> {
    ConflictableTransactionError::Abort(err)
}

fn unwrap_transaction<T>(
    result: Result<T, TransactionError<EscrowError>>,
) -> Result<T, EscrowError> {
    result.map_err(|e| match e {
        TransactionError::Abort(err) => err,
        TransactionError::Storage(err) => EscrowError::Store(err),
    })
}

fn log_key(parent_id: &str, entry_id: &str) -> String {
    format!("{parent_id}/{entry_id}")
}

impl EscrowStore {
    pub fn open(db: &sled::Db) -> Result<Self, EscrowError> {
        Ok(Self {
            orders: db.open_tree("orders")?,
            transactions: db.open_tree("escrow_transactions")?,
            disputes: db.open_tree("disputes")?,
            messages: db.open_tree("dispute_messages")?,
            actions: db.open_tree("dispute_actions")?,
            users: db.open_tree("users")?,
        })
    }

    pub fn open_shared(db: &sled::Db) -> Result<Arc<Self>, EscrowError> {
        Ok(Arc::new(Self::open(db)?))
    }

    // ---- orders ----

    pub fn insert_order(&self, order: &Order) -> Result<(), EscrowError> {
        self.orders.insert(order.id.as_bytes(), encode(order)?)?;
        Ok(())
    }

    pub fn get_order(&self, order_id: &str) -> Result<Option<Order>, EscrowError> {
        self.orders
            .get(order_id.as_bytes())?
            .map(|raw| decode(&raw))
            .transpose()
    }

    pub fn orders(&self) -> Result<Vec<Order>, EscrowError> {
        self.iter_values(&self.orders)
    }

    /// Status-gated order mutation with no ledger entry. `apply` re-checks
    /// its precondition inside the transaction.
    pub fn commit_order_update<F>(&self, order_id: &str, apply: F) -> Result<Order, EscrowError>
    where
        F: Fn(Order) -> Result<Order, EscrowError>,
    {
        let result = self.orders.transaction(|orders| {
            let raw = orders
                .get(order_id.as_bytes())?
                .ok_or_else(|| abort(EscrowError::OrderNotFound(order_id.to_string())))?;
            let order: Order = decode(&raw).map_err(abort)?;
            let updated = apply(order).map_err(abort)?;
            orders.insert(order_id.as_bytes(), encode(&updated).map_err(abort)?)?;
            Ok(updated)
        });
        unwrap_transaction(result)
    }

    /// Status-gated order mutation plus one ledger entry, committed
    /// atomically. The entry value overwrites any earlier pending version of
    /// the same entry, which is how release/refund flip pending entries to
    /// completed in the same commit that advances the order.
    pub fn commit_order_transition<F>(
        &self,
        order_id: &str,
        entry: &EscrowTransaction,
        apply: F,
    ) -> Result<Order, EscrowError>
    where
        F: Fn(Order) -> Result<Order, EscrowError>,
    {
        let entry_key = log_key(order_id, &entry.id);
        let entry_bytes = encode(entry)?;

        let result = (&self.orders, &self.transactions).transaction(|(orders, txns)| {
            let raw = orders
                .get(order_id.as_bytes())?
                .ok_or_else(|| abort(EscrowError::OrderNotFound(order_id.to_string())))?;
            let order: Order = decode(&raw).map_err(abort)?;
            let updated = apply(order).map_err(abort)?;
            orders.insert(order_id.as_bytes(), encode(&updated).map_err(abort)?)?;
            txns.insert(entry_key.as_bytes(), entry_bytes.clone())?;
            Ok(updated)
        });
        unwrap_transaction(result)
    }

    // ---- ledger entries ----

    pub fn append_transaction(&self, entry: &EscrowTransaction) -> Result<(), EscrowError> {
        let key = log_key(&entry.order_id, &entry.id);
        self.transactions.insert(key.as_bytes(), encode(entry)?)?;
        Ok(())
    }

    /// Flip a single entry in place (pending -> completed/failed, or
    /// recording a processor reference for reconciliation).
    pub fn update_transaction<F>(
        &self,
        order_id: &str,
        entry_id: &str,
        apply: F,
    ) -> Result<EscrowTransaction, EscrowError>
    where
        F: Fn(&mut EscrowTransaction),
    {
        let key = log_key(order_id, entry_id);
        let raw = self
            .transactions
            .get(key.as_bytes())?
            .ok_or_else(|| EscrowError::Codec(format!("ledger entry missing: {key}")))?;
        let mut entry: EscrowTransaction = decode(&raw)?;
        apply(&mut entry);
        self.transactions.insert(key.as_bytes(), encode(&entry)?)?;
        Ok(entry)
    }

    /// All ledger entries for an order, newest first.
    pub fn transactions_for_order(
        &self,
        order_id: &str,
    ) -> Result<Vec<EscrowTransaction>, EscrowError> {
        let mut entries: Vec<EscrowTransaction> = self.iter_prefix(&self.transactions, order_id)?;
        entries.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(entries)
    }

    // ---- disputes ----

    pub fn insert_dispute(&self, dispute: &Dispute) -> Result<(), EscrowError> {
        self.disputes.insert(dispute.id.as_bytes(), encode(dispute)?)?;
        Ok(())
    }

    pub fn get_dispute(&self, dispute_id: &str) -> Result<Option<Dispute>, EscrowError> {
        self.disputes
            .get(dispute_id.as_bytes())?
            .map(|raw| decode(&raw))
            .transpose()
    }

    pub fn disputes(&self) -> Result<Vec<Dispute>, EscrowError> {
        self.iter_values(&self.disputes)
    }

    /// The at-most-one live dispute for an order, if any.
    pub fn live_dispute_for_order(&self, order_id: &str) -> Result<Option<Dispute>, EscrowError> {
        Ok(self
            .disputes()?
            .into_iter()
            .find(|d| d.order_id == order_id && !d.status.is_terminal()))
    }

    /// Status-gated dispute mutation; same compare-and-set discipline as
    /// orders, so two admins cannot both resolve the same dispute.
    pub fn commit_dispute_update<F>(
        &self,
        dispute_id: &str,
        apply: F,
    ) -> Result<Dispute, EscrowError>
    where
        F: Fn(Dispute) -> Result<Dispute, EscrowError>,
    {
        let result = self.disputes.transaction(|disputes| {
            let raw = disputes
                .get(dispute_id.as_bytes())?
                .ok_or_else(|| abort(EscrowError::DisputeNotFound(dispute_id.to_string())))?;
            let dispute: Dispute = decode(&raw).map_err(abort)?;
            let updated = apply(dispute).map_err(abort)?;
            disputes.insert(dispute_id.as_bytes(), encode(&updated).map_err(abort)?)?;
            Ok(updated)
        });
        unwrap_transaction(result)
    }

    // ---- dispute messages and actions ----

    pub fn append_message(&self, message: &DisputeMessage) -> Result<(), EscrowError> {
        let key = log_key(&message.dispute_id, &message.id);
        self.messages.insert(key.as_bytes(), encode(message)?)?;
        Ok(())
    }

    /// Conversation order: oldest first.
    pub fn messages_for_dispute(
        &self,
        dispute_id: &str,
    ) -> Result<Vec<DisputeMessage>, EscrowError> {
        let mut messages: Vec<DisputeMessage> = self.iter_prefix(&self.messages, dispute_id)?;
        messages.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(messages)
    }

    pub fn append_action(&self, action: &DisputeAction) -> Result<(), EscrowError> {
        let key = log_key(&action.dispute_id, &action.id);
        self.actions.insert(key.as_bytes(), encode(action)?)?;
        Ok(())
    }

    /// History order: oldest first.
    pub fn actions_for_dispute(&self, dispute_id: &str) -> Result<Vec<DisputeAction>, EscrowError> {
        let mut actions: Vec<DisputeAction> = self.iter_prefix(&self.actions, dispute_id)?;
        actions.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(actions)
    }

    // ---- users ----

    pub fn upsert_user(&self, profile: &UserProfile) -> Result<(), EscrowError> {
        self.users.insert(profile.id.as_bytes(), encode(profile)?)?;
        Ok(())
    }

    pub fn get_user(&self, user_id: &str) -> Result<Option<UserProfile>, EscrowError> {
        self.users
            .get(user_id.as_bytes())?
            .map(|raw| decode(&raw))
            .transpose()
    }

    // ---- scan helpers ----

    fn iter_values<T: for<'b> minicbor::Decode<'b, ()>>(
        &self,
        tree: &sled::Tree,
    ) -> Result<Vec<T>, EscrowError> {
        tree.iter()
            .map(|kv| {
                let (_, raw) = kv?;
                decode(&raw)
            })
            .collect()
    }

    fn iter_prefix<T: for<'b> minicbor::Decode<'b, ()>>(
        &self,
        tree: &sled::Tree,
        parent_id: &str,
    ) -> Result<Vec<T>, EscrowError> {
        tree.scan_prefix(format!("{parent_id}/").as_bytes())
            .map(|kv| {
                let (_, raw) = kv?;
                decode(&raw)
            })
            .collect()
    }
}

//! User profiles and the admin capability check.
//!
//! Admin-only operations go through `Authorizer::require_admin` before any
//! mutation runs; it returns a dedicated `Unauthorized` kind so callers can
//! distinguish "forbidden" from "missing".

use std::sync::Arc;

use crate::error::EscrowError;
use crate::store::EscrowStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq, minicbor::Encode, minicbor::Decode)]
pub enum Role {
    #[n(0)]
    User,
    #[n(1)]
    Admin,
}

#[derive(Debug, Clone, PartialEq, Eq, minicbor::Encode, minicbor::Decode)]
pub struct UserProfile {
    #[n(0)]
    pub id: String,
    #[n(1)]
    pub role: Role,
    /// Processor payout-account reference. Sellers without one cannot
    /// receive released funds.
    #[n(2)]
    pub payout_account: Option<String>,
}

pub struct Authorizer {
    store: Arc<EscrowStore>,
}

impl Authorizer {
    pub fn new(store: Arc<EscrowStore>) -> Self {
        Self { store }
    }

    pub fn is_admin(&self, user_id: &str) -> Result<bool, EscrowError> {
        Ok(self
            .store
            .get_user(user_id)?
            .is_some_and(|profile| profile.role == Role::Admin))
    }

    pub fn require_admin(&self, user_id: &str) -> Result<(), EscrowError> {
        if self.is_admin(user_id)? {
            Ok(())
        } else {
            Err(EscrowError::Unauthorized(format!(
                "user {user_id} does not hold the admin role"
            )))
        }
    }
}

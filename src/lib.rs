//! Marketplace escrow and dispute resolution engine.
//!
//! Funds captured at checkout are held in escrow until delivery is
//! confirmed, the release window lapses, or a dispute settles them. All
//! state lives in sled; all money is integer cents.

pub mod authz;
pub mod commission;
pub mod config;
pub mod dispute;
pub mod disputes;
pub mod error;
pub mod escrow;
pub mod ledger;
pub mod order;
pub mod processor;
pub mod store;
pub mod sweep;
pub mod time;
pub mod utils;

//! Identifier minting helpers

use bech32::Bech32m;
use uuid7::uuid7;

use crate::error::EscrowError;

// construct a unique record id then encode using bech32
pub fn new_uuid_to_bech32(hrp: &str) -> Result<String, EscrowError> {
    let hrp = bech32::Hrp::parse(hrp).map_err(|e| EscrowError::IdEncoding(e.to_string()))?;
    let encode = bech32::encode::<Bech32m>(hrp, uuid7().as_bytes())
        .map_err(|e| EscrowError::IdEncoding(e.to_string()))?;
    Ok(encode)
}

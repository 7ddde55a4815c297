//! Platform commission calculator.
//!
//! Pure integer math in USD cents: `commission = clamp(amount * rate_bps /
//! 10_000, MIN_COMMISSION, MAX_COMMISSION)`. The floor and ceiling protect
//! the platform fee against pathological tiny or huge order totals.

use std::fmt;
use std::str::FromStr;

use crate::error::EscrowError;

/// $0.50 floor, in cents.
pub const MIN_COMMISSION: u64 = 50;
/// $100.00 ceiling per transaction, in cents.
pub const MAX_COMMISSION: u64 = 10_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, minicbor::Encode, minicbor::Decode)]
pub enum SellerTier {
    #[n(0)]
    Basic,
    #[n(1)]
    Pro,
    #[n(2)]
    Enterprise,
}

impl SellerTier {
    /// Commission rate in basis points.
    pub const fn rate_bps(&self) -> u64 {
        match self {
            Self::Basic => 500,
            Self::Pro => 300,
            Self::Enterprise => 200,
        }
    }

    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Basic => "basic",
            Self::Pro => "pro",
            Self::Enterprise => "enterprise",
        }
    }
}

impl fmt::Display for SellerTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SellerTier {
    type Err = EscrowError;

    // Unknown tiers fail loudly. Defaulting to basic here would silently
    // overcharge pro and enterprise sellers.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "basic" => Ok(Self::Basic),
            "pro" => Ok(Self::Pro),
            "enterprise" => Ok(Self::Enterprise),
            other => Err(EscrowError::InvalidTier(other.to_string())),
        }
    }
}

/// Compute the platform fee for a transaction amount, in cents.
pub fn commission_for(amount: u64, tier: SellerTier) -> u64 {
    let raw = amount.saturating_mul(tier.rate_bps()) / 10_000;
    raw.clamp(MIN_COMMISSION, MAX_COMMISSION)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn basic_tier_takes_five_percent() {
        // $100.00 at 5% -> $5.00
        assert_eq!(commission_for(10_000, SellerTier::Basic), 500);
    }

    #[test]
    fn pro_and_enterprise_rates() {
        assert_eq!(commission_for(10_000, SellerTier::Pro), 300);
        assert_eq!(commission_for(10_000, SellerTier::Enterprise), 200);
    }

    #[test]
    fn tiny_amounts_hit_the_floor() {
        // $5.00 at 5% is $0.25, below the $0.50 minimum
        assert_eq!(commission_for(500, SellerTier::Basic), MIN_COMMISSION);
    }

    #[test]
    fn huge_amounts_hit_the_ceiling() {
        // $10,000.00 at 5% is $500.00, above the $100.00 maximum
        assert_eq!(commission_for(1_000_000, SellerTier::Basic), MAX_COMMISSION);
    }

    #[test]
    fn tier_parsing_round_trips() {
        for tier in [SellerTier::Basic, SellerTier::Pro, SellerTier::Enterprise] {
            assert_eq!(tier.as_str().parse::<SellerTier>().unwrap(), tier);
        }
    }

    #[test]
    fn unknown_tier_is_rejected() {
        let err = "platinum".parse::<SellerTier>().unwrap_err();
        assert!(matches!(err, EscrowError::InvalidTier(t) if t == "platinum"));
    }
}

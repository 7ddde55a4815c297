//! Property-based tests for commission math.
//!
//! These use the proptest crate to check invariants that must hold for every
//! order amount and seller tier, not just hand-picked cases. All arithmetic
//! is integer cents, so the properties are exact.

use proptest::prelude::*;

use escrow_engine::commission::{
    MAX_COMMISSION, MIN_COMMISSION, SellerTier, commission_for,
};

/// Strategy to generate random SellerTier values
fn tier_strategy() -> impl Strategy<Value = SellerTier> {
    (0u8..=2).prop_map(|i| match i {
        0 => SellerTier::Basic,
        1 => SellerTier::Pro,
        _ => SellerTier::Enterprise,
    })
}

/// Strategy for order totals from one cent up to $10M
fn amount_strategy() -> impl Strategy<Value = u64> {
    1u64..=1_000_000_000u64
}

proptest! {
    /// The commission is always inside [MIN_COMMISSION, MAX_COMMISSION].
    #[test]
    fn commission_is_always_bounded(amount in amount_strategy(), tier in tier_strategy()) {
        let commission = commission_for(amount, tier);
        prop_assert!(commission >= MIN_COMMISSION);
        prop_assert!(commission <= MAX_COMMISSION);
    }

    /// More expensive orders never pay less commission at the same tier.
    #[test]
    fn commission_is_monotone_in_amount(
        a in amount_strategy(),
        b in amount_strategy(),
        tier in tier_strategy(),
    ) {
        let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
        prop_assert!(commission_for(lo, tier) <= commission_for(hi, tier));
    }

    /// A cheaper tier never pays more than a more expensive one on the same
    /// amount: enterprise <= pro <= basic.
    #[test]
    fn tier_ordering_holds(amount in amount_strategy()) {
        let basic = commission_for(amount, SellerTier::Basic);
        let pro = commission_for(amount, SellerTier::Pro);
        let enterprise = commission_for(amount, SellerTier::Enterprise);
        prop_assert!(enterprise <= pro);
        prop_assert!(pro <= basic);
    }

    /// Between the clamp bounds the fee is exactly rate_bps / 10_000 of the
    /// amount, rounded down.
    #[test]
    fn unclamped_region_is_exact(amount in 10_000u64..=200_000u64, tier in tier_strategy()) {
        let raw = amount * tier.rate_bps() / 10_000;
        let expected = raw.clamp(MIN_COMMISSION, MAX_COMMISSION);
        prop_assert_eq!(commission_for(amount, tier), expected);
    }

    /// Splitting an order total into commission and net never creates or
    /// destroys a cent, whenever the total covers the commission.
    #[test]
    fn split_conserves_total(amount in 2_000u64..=1_000_000u64, tier in tier_strategy()) {
        let commission = commission_for(amount, tier);
        prop_assume!(commission < amount);
        let net = amount - commission;
        prop_assert_eq!(net + commission, amount);
    }

    /// Tier names round-trip through parsing.
    #[test]
    fn tier_display_parse_round_trip(tier in tier_strategy()) {
        let parsed: SellerTier = tier.as_str().parse().unwrap();
        prop_assert_eq!(parsed, tier);
    }
}

//! Property-based tests for the escrow and dispute state machines.
//!
//! Random transition pairs verify the allow-lists stay closed: no edge is
//! legal unless it appears in the documented lifecycle, terminal states
//! accept nothing, and timestamps order consistently however they are built.

use proptest::prelude::*;

use escrow_engine::dispute::DisputeStatus;
use escrow_engine::order::EscrowStatus;
use escrow_engine::time::TimeStamp;

const ESCROW_STATES: [EscrowStatus; 5] = [
    EscrowStatus::Pending,
    EscrowStatus::Held,
    EscrowStatus::Released,
    EscrowStatus::Refunded,
    EscrowStatus::Disputed,
];

const DISPUTE_STATES: [DisputeStatus; 5] = [
    DisputeStatus::Open,
    DisputeStatus::PendingResolution,
    DisputeStatus::Resolved,
    DisputeStatus::Closed,
    DisputeStatus::Escalated,
];

fn escrow_status_strategy() -> impl Strategy<Value = EscrowStatus> {
    (0usize..ESCROW_STATES.len()).prop_map(|i| ESCROW_STATES[i])
}

fn dispute_status_strategy() -> impl Strategy<Value = DisputeStatus> {
    (0usize..DISPUTE_STATES.len()).prop_map(|i| DISPUTE_STATES[i])
}

/// The complete escrow lifecycle, as an explicit edge list.
fn escrow_edge_is_documented(from: EscrowStatus, to: EscrowStatus) -> bool {
    matches!(
        (from, to),
        (EscrowStatus::Pending, EscrowStatus::Held)
            | (EscrowStatus::Held, EscrowStatus::Released)
            | (EscrowStatus::Held, EscrowStatus::Refunded)
            | (EscrowStatus::Held, EscrowStatus::Disputed)
            | (EscrowStatus::Disputed, EscrowStatus::Released)
            | (EscrowStatus::Disputed, EscrowStatus::Refunded)
    )
}

/// The complete dispute lifecycle, as an explicit edge list.
fn dispute_edge_is_documented(from: DisputeStatus, to: DisputeStatus) -> bool {
    matches!(
        (from, to),
        (DisputeStatus::Open, DisputeStatus::PendingResolution)
            | (DisputeStatus::Open, DisputeStatus::Escalated)
            | (DisputeStatus::PendingResolution, DisputeStatus::Resolved)
            | (DisputeStatus::PendingResolution, DisputeStatus::Escalated)
            | (DisputeStatus::Escalated, DisputeStatus::Resolved)
            | (DisputeStatus::Escalated, DisputeStatus::Closed)
    )
}

proptest! {
    /// `can_transition_to` agrees exactly with the documented edge list.
    #[test]
    fn escrow_transitions_match_the_lifecycle(
        from in escrow_status_strategy(),
        to in escrow_status_strategy(),
    ) {
        prop_assert_eq!(from.can_transition_to(&to), escrow_edge_is_documented(from, to));
    }

    /// Terminal escrow states admit no outgoing edge.
    #[test]
    fn terminal_escrow_states_are_absorbing(
        from in escrow_status_strategy(),
        to in escrow_status_strategy(),
    ) {
        if from.is_terminal() {
            prop_assert!(!from.can_transition_to(&to));
        }
    }

    /// No escrow state transitions to itself, so every committed transition
    /// makes observable progress.
    #[test]
    fn escrow_has_no_self_loops(state in escrow_status_strategy()) {
        prop_assert!(!state.can_transition_to(&state));
    }

    /// Dispute `can_transition_to` agrees exactly with the documented edges.
    #[test]
    fn dispute_transitions_match_the_lifecycle(
        from in dispute_status_strategy(),
        to in dispute_status_strategy(),
    ) {
        prop_assert_eq!(from.can_transition_to(&to), dispute_edge_is_documented(from, to));
    }

    /// Terminal dispute states admit no outgoing edge.
    #[test]
    fn terminal_dispute_states_are_absorbing(
        from in dispute_status_strategy(),
        to in dispute_status_strategy(),
    ) {
        if from.is_terminal() {
            prop_assert!(!from.can_transition_to(&to));
        }
    }

    /// Every non-terminal dispute state can still reach a terminal one in at
    /// most two documented hops, so no dispute can get stuck.
    #[test]
    fn no_dispute_state_is_stuck(from in dispute_status_strategy()) {
        if !from.is_terminal() {
            let one_hop = DISPUTE_STATES
                .iter()
                .any(|mid| from.can_transition_to(mid) && mid.is_terminal());
            let two_hops = DISPUTE_STATES.iter().any(|mid| {
                from.can_transition_to(mid)
                    && DISPUTE_STATES
                        .iter()
                        .any(|end| mid.can_transition_to(end) && end.is_terminal())
            });
            prop_assert!(one_hop || two_hops);
        }
    }

    /// Timestamps round-trip through the CBOR codec at nanosecond precision.
    #[test]
    fn timestamp_codec_round_trips(
        year in 2020i32..=2030,
        month in 1u32..=12,
        day in 1u32..=28,
        hour in 0u32..=23,
        min in 0u32..=59,
        sec in 0u32..=59,
    ) {
        let original = TimeStamp::new_with(year, month, day, hour, min, sec);
        let bytes = minicbor::to_vec(original.clone()).unwrap();
        let decoded: TimeStamp<chrono::Utc> = minicbor::decode(&bytes).unwrap();
        prop_assert_eq!(original, decoded);
    }

    /// Shifting a timestamp forward by a positive number of days always
    /// yields a strictly later timestamp, and shifts compose additively.
    #[test]
    fn plus_days_is_ordered_and_additive(
        year in 2020i32..=2030,
        month in 1u32..=12,
        day in 1u32..=28,
        a in 1i64..=30,
        b in 1i64..=30,
    ) {
        let base = TimeStamp::new_with(year, month, day, 0, 0, 0);
        let shifted = base.plus_days(a);
        prop_assert!(shifted > base);
        prop_assert_eq!(base.plus_days(a).plus_days(b), base.plus_days(a + b));
    }
}

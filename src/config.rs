//! Escrow timing configuration

/// Windows applied when funds are taken into escrow. Injected into the
/// escrow service so tests can shrink them to zero instead of sleeping.
#[derive(Debug, Clone, Copy)]
pub struct EscrowConfig {
    /// Days after the hold before funds become eligible for auto-release.
    pub release_days: i64,
    /// Days after the hold during which a dispute may be filed.
    pub dispute_days: i64,
}

impl Default for EscrowConfig {
    fn default() -> Self {
        Self {
            release_days: 7,
            dispute_days: 14,
        }
    }
}

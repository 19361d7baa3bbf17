//! Timing policy shared by the trial timer and the periodic verifier.

use chrono::Duration;

/// Timing constants that drive lazy reconciliation.
///
/// Built from `EntitlementConfig` at startup; `Default` carries the
/// production values.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EntitlementPolicy {
    /// Length of a trial measured from its start.
    pub trial_period: Duration,

    /// How far ahead of expiry the "ending soon" flag is raised.
    pub trial_ending_soon_window: Duration,

    /// Maximum age of `verified_at` before the provider is asked again.
    pub verification_ttl: Duration,

    /// How long an optimistic activation may stand without a provider
    /// subscription id before it is verified.
    pub unconfirmed_activation_grace: Duration,
}

impl Default for EntitlementPolicy {
    fn default() -> Self {
        Self {
            trial_period: Duration::days(7),
            trial_ending_soon_window: Duration::hours(24),
            verification_ttl: Duration::days(31),
            unconfirmed_activation_grace: Duration::minutes(60),
        }
    }
}

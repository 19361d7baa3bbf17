//! Entitlement policy configuration

use serde::Deserialize;
use std::time::Duration;

use super::error::ValidationError;
use crate::domain::entitlement::EntitlementPolicy;

/// Timing knobs for trials, verification and provider calls.
#[derive(Debug, Clone, Deserialize)]
pub struct EntitlementConfig {
    #[serde(default = "default_trial_period_days")]
    pub trial_period_days: i64,

    #[serde(default = "default_trial_ending_soon_hours")]
    pub trial_ending_soon_hours: i64,

    #[serde(default = "default_verification_ttl_days")]
    pub verification_ttl_days: i64,

    /// Grace before an unconfirmed optimistic activation is re-checked.
    #[serde(default = "default_unconfirmed_activation_grace_mins")]
    pub unconfirmed_activation_grace_mins: i64,

    /// Upper bound for any single payment provider call.
    #[serde(default = "default_provider_timeout_secs")]
    pub provider_timeout_secs: u64,
}

impl EntitlementConfig {
    /// Build the domain policy from the configured values.
    pub fn policy(&self) -> EntitlementPolicy {
        EntitlementPolicy {
            trial_period: chrono::Duration::days(self.trial_period_days),
            trial_ending_soon_window: chrono::Duration::hours(self.trial_ending_soon_hours),
            verification_ttl: chrono::Duration::days(self.verification_ttl_days),
            unconfirmed_activation_grace: chrono::Duration::minutes(
                self.unconfirmed_activation_grace_mins,
            ),
        }
    }

    pub fn provider_timeout(&self) -> Duration {
        Duration::from_secs(self.provider_timeout_secs)
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if !(1..=365).contains(&self.trial_period_days) {
            return Err(ValidationError::OutOfRange("trial_period_days"));
        }
        if self.trial_ending_soon_hours < 0
            || self.trial_ending_soon_hours > self.trial_period_days * 24
        {
            return Err(ValidationError::OutOfRange("trial_ending_soon_hours"));
        }
        if !(1..=366).contains(&self.verification_ttl_days) {
            return Err(ValidationError::OutOfRange("verification_ttl_days"));
        }
        if !(1..=24 * 60).contains(&self.unconfirmed_activation_grace_mins) {
            return Err(ValidationError::OutOfRange("unconfirmed_activation_grace_mins"));
        }
        if !(1..=120).contains(&self.provider_timeout_secs) {
            return Err(ValidationError::OutOfRange("provider_timeout_secs"));
        }
        Ok(())
    }
}

impl Default for EntitlementConfig {
    fn default() -> Self {
        Self {
            trial_period_days: default_trial_period_days(),
            trial_ending_soon_hours: default_trial_ending_soon_hours(),
            verification_ttl_days: default_verification_ttl_days(),
            unconfirmed_activation_grace_mins: default_unconfirmed_activation_grace_mins(),
            provider_timeout_secs: default_provider_timeout_secs(),
        }
    }
}

fn default_trial_period_days() -> i64 {
    7
}

fn default_trial_ending_soon_hours() -> i64 {
    24
}

fn default_verification_ttl_days() -> i64 {
    31
}

fn default_unconfirmed_activation_grace_mins() -> i64 {
    60
}

fn default_provider_timeout_secs() -> u64 {
    10
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_domain_policy() {
        let config = EntitlementConfig::default();
        assert_eq!(config.policy(), EntitlementPolicy::default());
        assert_eq!(config.provider_timeout(), Duration::from_secs(10));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn zero_length_trial_is_rejected() {
        let config = EntitlementConfig {
            trial_period_days: 0,
            ..Default::default()
        };
        assert_eq!(
            config.validate(),
            Err(ValidationError::OutOfRange("trial_period_days"))
        );
    }

    #[test]
    fn warning_window_longer_than_trial_is_rejected() {
        let config = EntitlementConfig {
            trial_period_days: 1,
            trial_ending_soon_hours: 48,
            ..Default::default()
        };
        assert_eq!(
            config.validate(),
            Err(ValidationError::OutOfRange("trial_ending_soon_hours"))
        );
    }

    #[test]
    fn provider_timeout_must_be_bounded() {
        let config = EntitlementConfig {
            provider_timeout_secs: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }
}

//! Read-side entitlement predicate.

use crate::domain::foundation::Timestamp;
use serde::{Deserialize, Serialize};

use super::{EntitlementRecord, Plan};

/// Whether `record` grants paid functionality at `now`.
///
/// Pure and synchronous. A trial whose end equals `now` no longer entitles.
pub fn is_entitled(record: &EntitlementRecord, now: Timestamp) -> bool {
    match record.plan {
        Plan::Active => true,
        Plan::Trial => record.trial_ends_at.is_some_and(|ends_at| ends_at > now),
        Plan::Free | Plan::Inactive => false,
    }
}

/// What the UI needs for banners and upgrade prompts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntitlementSnapshot {
    pub plan: Plan,
    pub trial_ends_at: Option<Timestamp>,
    pub trial_ending_soon: bool,
    pub provider_subscription_status: Option<String>,
    pub entitled: bool,
}

impl EntitlementSnapshot {
    pub fn of(record: &EntitlementRecord, now: Timestamp) -> Self {
        Self {
            plan: record.plan,
            trial_ends_at: record.trial_ends_at,
            trial_ending_soon: record.trial_ending_soon,
            provider_subscription_status: record.provider_subscription_status.clone(),
            entitled: is_entitled(record, now),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::entitlement::{CreationIntent, EntitlementPolicy};
    use crate::domain::foundation::AccountId;

    fn now() -> Timestamp {
        Timestamp::from_unix_secs(1_750_000_000).unwrap()
    }

    fn record(plan: Plan, trial_ends_at: Option<Timestamp>) -> EntitlementRecord {
        let mut record = EntitlementRecord::provision(
            AccountId::new("acct-gate").unwrap(),
            CreationIntent::Standard,
            now().minus_days(3),
            &EntitlementPolicy::default(),
        );
        record.plan = plan;
        record.trial_ends_at = trial_ends_at;
        record
    }

    #[test]
    fn active_is_entitled() {
        assert!(is_entitled(&record(Plan::Active, None), now()));
    }

    #[test]
    fn running_trial_is_entitled() {
        assert!(is_entitled(&record(Plan::Trial, Some(now().plus_secs(1))), now()));
    }

    #[test]
    fn trial_ending_now_is_not_entitled() {
        assert!(!is_entitled(&record(Plan::Trial, Some(now())), now()));
    }

    #[test]
    fn trial_without_expiry_is_not_entitled() {
        assert!(!is_entitled(&record(Plan::Trial, None), now()));
    }

    #[test]
    fn free_and_inactive_are_not_entitled() {
        assert!(!is_entitled(&record(Plan::Free, None), now()));
        assert!(!is_entitled(&record(Plan::Inactive, Some(now().plus_days(3))), now()));
    }

    #[test]
    fn snapshot_reports_entitlement_and_flags() {
        let mut r = record(Plan::Trial, Some(now().plus_secs(3600)));
        r.trial_ending_soon = true;

        let snapshot = EntitlementSnapshot::of(&r, now());

        assert_eq!(snapshot.plan, Plan::Trial);
        assert!(snapshot.trial_ending_soon);
        assert!(snapshot.entitled);
    }
}

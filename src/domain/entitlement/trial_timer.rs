//! Lazy trial timer.
//!
//! There is no scheduler: the timer is evaluated whenever a trial record is
//! observed on the request path. Evaluation is pure and returns the patch
//! that brings the record up to date, or `None` when nothing changes.
//!
//! Order of checks for a `Trial` record:
//!
//! 1. effective expiry is `trial_ends_at`, or `account_created_at +
//!    trial_period` when unset
//! 2. expiry `<= now` moves the plan to `Free` (the derived expiry is not
//!    persisted in that case)
//! 3. otherwise a derived expiry is persisted, and the ending-soon flag is
//!    raised once inside the final window

use crate::domain::foundation::Timestamp;

use super::{EntitlementPatch, EntitlementPolicy, EntitlementRecord, Plan};

/// Returns the expiry this record's trial is measured against.
pub fn effective_trial_end(record: &EntitlementRecord, policy: &EntitlementPolicy) -> Timestamp {
    record
        .trial_ends_at
        .unwrap_or_else(|| record.account_created_at.plus(policy.trial_period))
}

/// Computes the trial-timer patch for `record` at `now`.
pub fn evaluate(
    record: &EntitlementRecord,
    now: Timestamp,
    policy: &EntitlementPolicy,
) -> Option<EntitlementPatch> {
    if record.plan != Plan::Trial {
        // Stray flag left behind by a legacy writer.
        return record
            .trial_ending_soon
            .then(|| EntitlementPatch::new().with_trial_ending_soon(false));
    }

    let ends_at = effective_trial_end(record, policy);

    if ends_at <= now {
        return Some(
            EntitlementPatch::new()
                .with_plan(Plan::Free)
                .with_trial_ending_soon(false),
        );
    }

    let mut patch = EntitlementPatch::new();

    if record.trial_ends_at.is_none() {
        patch = patch.with_trial_ends_at(Some(ends_at));
    }

    if !record.trial_ending_soon && ends_at.duration_since(&now) < policy.trial_ending_soon_window
    {
        patch = patch.with_trial_ending_soon(true);
    }

    (!patch.is_empty()).then_some(patch)
}

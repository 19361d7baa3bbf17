//! Target states for every provider-driven writer.
//!
//! Each function returns the full set of fields its writer owns, computed
//! only from its inputs. Writers never increment or toggle, so replaying an
//! event or racing another writer converges on the same record.

use crate::domain::foundation::Timestamp;

use super::{EntitlementPatch, EntitlementPolicy, EntitlementRecord, Plan, Subscription};

/// Status mirrored when the provider deleted, or no longer knows, a subscription.
pub const CANCELED_STATUS: &str = "canceled";

/// Checkout completed, subscription created and invoice paid all converge here.
pub fn activation(customer_id: &str, subscription: &Subscription, now: Timestamp) -> EntitlementPatch {
    EntitlementPatch::new()
        .with_plan(Plan::Active)
        .with_customer_id(customer_id)
        .with_subscription_id(subscription.id.clone())
        .with_subscription_status(subscription.status.as_str())
        .with_trial_ending_soon(false)
        .with_verified_at(now)
}

/// Subscription updated: active iff the provider says "active".
pub fn subscription_updated(subscription: &Subscription, now: Timestamp) -> EntitlementPatch {
    let plan = if subscription.status.is_active() {
        Plan::Active
    } else {
        Plan::Inactive
    };

    EntitlementPatch::new()
        .with_plan(plan)
        .with_subscription_id(subscription.id.clone())
        .with_subscription_status(subscription.status.as_str())
        .with_verified_at(now)
}

/// Subscription deleted: back to `Inactive` with no trial left over.
pub fn subscription_deleted(now: Timestamp) -> EntitlementPatch {
    EntitlementPatch::new()
        .with_plan(Plan::Inactive)
        .with_subscription_status(CANCELED_STATUS)
        .with_trial_ends_at(None)
        .with_trial_ending_soon(false)
        .with_verified_at(now)
}

/// Outcome of a successful verification round-trip.
///
/// `None` means the provider has no subscription for this account.
pub fn verified(subscription: Option<&Subscription>, now: Timestamp) -> EntitlementPatch {
    match subscription {
        Some(subscription) => {
            let plan = if subscription.status.is_active() {
                Plan::Active
            } else {
                Plan::Free
            };
            EntitlementPatch::new()
                .with_plan(plan)
                .with_subscription_id(subscription.id.clone())
                .with_subscription_status(subscription.status.as_str())
                .with_verified_at(now)
        }
        None => EntitlementPatch::new()
            .with_plan(Plan::Free)
            .with_subscription_status(CANCELED_STATUS)
            .with_verified_at(now),
    }
}

/// Active record with no provider link to check against.
///
/// Lapses to `Free` and leaves `verified_at` alone, since no round-trip
/// happened.
pub fn unverifiable() -> EntitlementPatch {
    EntitlementPatch::new().with_plan(Plan::Free)
}

/// Unverified write after the checkout-success redirect.
pub fn optimistic_activation(now: Timestamp) -> EntitlementPatch {
    EntitlementPatch::new()
        .with_plan(Plan::Active)
        .with_verified_at(now)
}

/// Whether an `Active` record is due for a provider round-trip.
///
/// Records in any other plan are governed by the trial timer and never
/// verified. An optimistic activation that still has no subscription id
/// after the grace period is verified early.
pub fn needs_verification(
    record: &EntitlementRecord,
    now: Timestamp,
    policy: &EntitlementPolicy,
) -> bool {
    if record.plan != Plan::Active {
        return false;
    }

    let Some(verified_at) = record.verified_at else {
        return true;
    };

    let age = now.duration_since(&verified_at);
    if age > policy.verification_ttl {
        return true;
    }

    record.provider_subscription_id.is_none() && age > policy.unconfirmed_activation_grace
}

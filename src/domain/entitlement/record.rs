//! Entitlement record and typed partial updates.
//!
//! The record is the only shared mutable state in the engine. Four writers
//! (webhooks, periodic verification, the optimistic checkout write and the
//! checkout poll) update it without coordinating with each other, so every
//! update is expressed as an `EntitlementPatch`: a set of target field
//! values. Applying a patch is pure and enforces the record invariants in
//! one place, whichever store performs the write.
//!
//! # Invariants
//!
//! - `trial_ending_soon` is only ever true while `plan == Trial`
//! - inside a trial, `trial_ending_soon` never goes back to false
//! - plan changes follow the `Plan` state machine

use crate::domain::foundation::{AccountId, StateMachine, Timestamp, ValidationError};
use serde::{Deserialize, Serialize};

use super::{EntitlementPolicy, Plan};

/// What kind of account the identity layer is provisioning.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CreationIntent {
    /// Plain account, starts `inactive`.
    #[default]
    Standard,

    /// Account created through a trial sign-up, starts `trial`.
    Trial,
}

/// Entitlement state of one account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntitlementRecord {
    /// Owning account. Primary key.
    pub account_id: AccountId,

    /// Current plan.
    pub plan: Plan,

    /// End of the current trial. Set once per trial.
    pub trial_ends_at: Option<Timestamp>,

    /// Raised once when the trial enters its final window.
    pub trial_ending_soon: bool,

    /// Provider customer, once one exists.
    pub provider_customer_id: Option<String>,

    /// Provider subscription, once one exists.
    pub provider_subscription_id: Option<String>,

    /// Mirror of the provider's status string. Observational only.
    pub provider_subscription_status: Option<String>,

    /// Last successful round-trip with the provider.
    pub verified_at: Option<Timestamp>,

    /// When the account was created. Never changes.
    pub account_created_at: Timestamp,
}

impl EntitlementRecord {
    /// Builds the initial record for a newly created account.
    ///
    /// A trial intent starts the trial immediately with an explicit expiry.
    pub fn provision(
        account_id: AccountId,
        intent: CreationIntent,
        created_at: Timestamp,
        policy: &EntitlementPolicy,
    ) -> Self {
        let (plan, trial_ends_at) = match intent {
            CreationIntent::Standard => (Plan::Inactive, None),
            CreationIntent::Trial => (Plan::Trial, Some(created_at.plus(policy.trial_period))),
        };

        Self {
            account_id,
            plan,
            trial_ends_at,
            trial_ending_soon: false,
            provider_customer_id: None,
            provider_subscription_id: None,
            provider_subscription_status: None,
            verified_at: None,
            account_created_at: created_at,
        }
    }

    /// Returns the record that results from applying `patch`.
    ///
    /// Fails only when the patch asks for a plan change the state machine
    /// forbids.
    pub fn apply(&self, patch: &EntitlementPatch) -> Result<Self, ValidationError> {
        let plan = match patch.plan {
            Some(target) => self.plan.transition_to(target)?,
            None => self.plan,
        };

        let mut next = Self {
            account_id: self.account_id.clone(),
            plan,
            trial_ends_at: patch.trial_ends_at.unwrap_or(self.trial_ends_at),
            trial_ending_soon: patch.trial_ending_soon.unwrap_or(self.trial_ending_soon),
            provider_customer_id: patch
                .provider_customer_id
                .clone()
                .or_else(|| self.provider_customer_id.clone()),
            provider_subscription_id: patch
                .provider_subscription_id
                .clone()
                .or_else(|| self.provider_subscription_id.clone()),
            provider_subscription_status: patch
                .provider_subscription_status
                .clone()
                .or_else(|| self.provider_subscription_status.clone()),
            verified_at: patch.verified_at.or(self.verified_at),
            account_created_at: self.account_created_at,
        };

        if next.plan != Plan::Trial {
            next.trial_ending_soon = false;
        } else if self.plan == Plan::Trial && self.trial_ending_soon {
            next.trial_ending_soon = true;
        }

        Ok(next)
    }
}

/// Typed partial update of an `EntitlementRecord`.
///
/// `None` leaves a field untouched. `trial_ends_at` is doubly optional so a
/// patch can clear it (`Some(None)`).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EntitlementPatch {
    pub plan: Option<Plan>,
    pub trial_ends_at: Option<Option<Timestamp>>,
    pub trial_ending_soon: Option<bool>,
    pub provider_customer_id: Option<String>,
    pub provider_subscription_id: Option<String>,
    pub provider_subscription_status: Option<String>,
    pub verified_at: Option<Timestamp>,
}

impl EntitlementPatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_plan(mut self, plan: Plan) -> Self {
        self.plan = Some(plan);
        self
    }

    pub fn with_trial_ends_at(mut self, trial_ends_at: Option<Timestamp>) -> Self {
        self.trial_ends_at = Some(trial_ends_at);
        self
    }

    pub fn with_trial_ending_soon(mut self, flag: bool) -> Self {
        self.trial_ending_soon = Some(flag);
        self
    }

    pub fn with_customer_id(mut self, customer_id: impl Into<String>) -> Self {
        self.provider_customer_id = Some(customer_id.into());
        self
    }

    pub fn with_subscription_id(mut self, subscription_id: impl Into<String>) -> Self {
        self.provider_subscription_id = Some(subscription_id.into());
        self
    }

    pub fn with_subscription_status(mut self, status: impl Into<String>) -> Self {
        self.provider_subscription_status = Some(status.into());
        self
    }

    pub fn with_verified_at(mut self, verified_at: Timestamp) -> Self {
        self.verified_at = Some(verified_at);
        self
    }

    /// True when the patch sets nothing.
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

/// State a record must still be in for a conditional update to land.
///
/// Writers that computed their patch from an earlier read use this to
/// avoid overwriting state written since. Unset fields match anything.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Precondition {
    pub plan: Option<Plan>,
    pub verified_at: Option<Option<Timestamp>>,
}

impl Precondition {
    /// Requires the record to still be in `plan`.
    pub fn plan(plan: Plan) -> Self {
        Self {
            plan: Some(plan),
            verified_at: None,
        }
    }

    /// Also requires `verified_at` to be unchanged since the read.
    pub fn with_verified_at(mut self, verified_at: Option<Timestamp>) -> Self {
        self.verified_at = Some(verified_at);
        self
    }

    pub fn holds(&self, record: &EntitlementRecord) -> bool {
        self.plan.map_or(true, |plan| record.plan == plan)
            && self
                .verified_at
                .map_or(true, |verified_at| record.verified_at == verified_at)
    }
}

/// Result of a conditional update.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConditionalUpdate {
    /// The precondition held and the patch was written.
    Applied(EntitlementRecord),
    /// A fresher write got there first; this is the record as stored.
    Superseded(EntitlementRecord),
}

impl ConditionalUpdate {
    pub fn record(&self) -> &EntitlementRecord {
        match self {
            ConditionalUpdate::Applied(record) | ConditionalUpdate::Superseded(record) => record,
        }
    }

    pub fn into_record(self) -> EntitlementRecord {
        match self {
            ConditionalUpdate::Applied(record) | ConditionalUpdate::Superseded(record) => record,
        }
    }

    pub fn is_applied(&self) -> bool {
        matches!(self, ConditionalUpdate::Applied(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn account() -> AccountId {
        AccountId::new("acct-1").unwrap()
    }

    fn t0() -> Timestamp {
        Timestamp::from_unix_secs(1_704_067_200).unwrap()
    }

    fn trial_record() -> EntitlementRecord {
        EntitlementRecord::provision(
            account(),
            CreationIntent::Trial,
            t0(),
            &EntitlementPolicy::default(),
        )
    }

    #[test]
    fn standard_provisioning_starts_inactive() {
        let record = EntitlementRecord::provision(
            account(),
            CreationIntent::Standard,
            t0(),
            &EntitlementPolicy::default(),
        );
        assert_eq!(record.plan, Plan::Inactive);
        assert_eq!(record.trial_ends_at, None);
        assert_eq!(record.account_created_at, t0());
    }

    #[test]
    fn trial_provisioning_sets_expiry_from_creation() {
        let record = trial_record();
        assert_eq!(record.plan, Plan::Trial);
        assert_eq!(record.trial_ends_at, Some(t0().plus_days(7)));
        assert!(!record.trial_ending_soon);
    }

    #[test]
    fn precondition_matches_plan_and_verified_at() {
        let mut record = trial_record();
        assert!(Precondition::plan(Plan::Trial).holds(&record));
        assert!(!Precondition::plan(Plan::Active).holds(&record));
        assert!(Precondition::default().holds(&record));

        record.verified_at = Some(t0());
        let guard = Precondition::plan(Plan::Trial).with_verified_at(Some(t0()));
        assert!(guard.holds(&record));

        record.verified_at = Some(t0().plus_secs(1));
        assert!(!guard.holds(&record));
        assert!(!Precondition::plan(Plan::Trial)
            .with_verified_at(None)
            .holds(&record));
    }

    #[test]
    fn empty_patch_is_identity() {
        let record = trial_record();
        assert!(EntitlementPatch::new().is_empty());
        assert_eq!(record.apply(&EntitlementPatch::new()).unwrap(), record);
    }

    #[test]
    fn apply_sets_only_patched_fields() {
        let record = trial_record();
        let patch = EntitlementPatch::new().with_customer_id("cus_1");

        let next = record.apply(&patch).unwrap();

        assert_eq!(next.provider_customer_id.as_deref(), Some("cus_1"));
        assert_eq!(next.plan, Plan::Trial);
        assert_eq!(next.trial_ends_at, record.trial_ends_at);
    }

    #[test]
    fn apply_can_clear_trial_ends_at() {
        let next = trial_record()
            .apply(
                &EntitlementPatch::new()
                    .with_plan(Plan::Inactive)
                    .with_trial_ends_at(None),
            )
            .unwrap();
        assert_eq!(next.trial_ends_at, None);
    }

    #[test]
    fn leaving_trial_clears_ending_soon() {
        let mut record = trial_record();
        record.trial_ending_soon = true;

        let next = record
            .apply(&EntitlementPatch::new().with_plan(Plan::Active))
            .unwrap();

        assert!(!next.trial_ending_soon);
    }

    #[test]
    fn ending_soon_cannot_be_reset_inside_trial() {
        let mut record = trial_record();
        record.trial_ending_soon = true;

        let next = record
            .apply(&EntitlementPatch::new().with_trial_ending_soon(false))
            .unwrap();

        assert!(next.trial_ending_soon);
    }

    #[test]
    fn ending_soon_cannot_be_raised_outside_trial() {
        let record = EntitlementRecord::provision(
            account(),
            CreationIntent::Standard,
            t0(),
            &EntitlementPolicy::default(),
        );

        let next = record
            .apply(&EntitlementPatch::new().with_trial_ending_soon(true))
            .unwrap();

        assert!(!next.trial_ending_soon);
    }

    #[test]
    fn forbidden_plan_change_is_rejected() {
        let mut record = trial_record();
        record.plan = Plan::Free;

        assert!(record
            .apply(&EntitlementPatch::new().with_plan(Plan::Trial))
            .is_err());
    }

    #[test]
    fn account_created_at_never_changes() {
        let record = trial_record();
        let next = record
            .apply(
                &EntitlementPatch::new()
                    .with_plan(Plan::Active)
                    .with_verified_at(t0().plus_days(3)),
            )
            .unwrap();
        assert_eq!(next.account_created_at, record.account_created_at);
    }
}

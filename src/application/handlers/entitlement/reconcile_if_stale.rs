//! ReconcileIfStaleHandler - Brings a record up to date before it is read.
//!
//! Runs the trial timer, then the verifier when an active record is due.
//! Invoked explicitly by the gate and the snapshot endpoint.

use std::sync::Arc;

use crate::domain::entitlement::{
    transitions, trial_timer, EntitlementError, EntitlementPolicy, EntitlementRecord,
    Precondition,
};
use crate::domain::foundation::AccountId;
use crate::ports::{Clock, EntitlementStore};

use super::VerifySubscriptionHandler;

/// Reconcile-then-read for one account.
pub struct ReconcileIfStaleHandler {
    store: Arc<dyn EntitlementStore>,
    verifier: Arc<VerifySubscriptionHandler>,
    clock: Arc<dyn Clock>,
    policy: EntitlementPolicy,
}

impl ReconcileIfStaleHandler {
    pub fn new(
        store: Arc<dyn EntitlementStore>,
        verifier: Arc<VerifySubscriptionHandler>,
        clock: Arc<dyn Clock>,
        policy: EntitlementPolicy,
    ) -> Self {
        Self {
            store,
            verifier,
            clock,
            policy,
        }
    }

    /// Returns the account's record after any due reconciliation.
    ///
    /// Provider failures are logged and swallowed; the stored record is
    /// returned as is. Store failures propagate.
    pub async fn handle(&self, account_id: &AccountId) -> Result<EntitlementRecord, EntitlementError> {
        let mut record = self
            .store
            .get(account_id)
            .await?
            .ok_or_else(|| EntitlementError::not_found(account_id.clone()))?;

        let now = self.clock.now();

        if let Some(patch) = trial_timer::evaluate(&record, now, &self.policy) {
            let before = record.plan;
            let outcome = self
                .store
                .update_if(account_id, &Precondition::plan(before), &patch)
                .await?;
            let applied = outcome.is_applied();
            record = outcome.into_record();
            if !applied {
                tracing::debug!(
                    account_id = %account_id,
                    plan = %record.plan,
                    "Plan changed since read; trial timer skipped"
                );
            } else if record.plan != before {
                tracing::info!(
                    account_id = %account_id,
                    from = %before,
                    to = %record.plan,
                    "Trial expired"
                );
            } else if record.trial_ending_soon {
                tracing::debug!(account_id = %account_id, "Trial ending soon");
            }
        }

        if transitions::needs_verification(&record, now, &self.policy) {
            match self.verifier.verify(&record).await {
                Ok(verified) => record = verified,
                Err(EntitlementError::Infrastructure(msg)) => {
                    return Err(EntitlementError::Infrastructure(msg));
                }
                // Already logged by the verifier; the next read retries.
                Err(_) => {}
            }
        }

        Ok(record)
    }
}

//! EntitlementGate - Access decisions and UI snapshots.
//!
//! Reconciles first, then answers from the resulting record. A provider
//! outage never blocks the answer; an unreadable store denies access.

use std::sync::Arc;

use crate::domain::entitlement::{
    is_entitled, EntitlementError, EntitlementRecord, EntitlementSnapshot,
};
use crate::domain::foundation::AccountId;
use crate::ports::{Clock, EntitlementStore};

use super::ReconcileIfStaleHandler;

/// Query-side entry point for "may this account use paid functionality?".
pub struct EntitlementGate {
    reconciler: Arc<ReconcileIfStaleHandler>,
    store: Arc<dyn EntitlementStore>,
    clock: Arc<dyn Clock>,
}

impl EntitlementGate {
    pub fn new(
        reconciler: Arc<ReconcileIfStaleHandler>,
        store: Arc<dyn EntitlementStore>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            reconciler,
            store,
            clock,
        }
    }

    /// Reconciled view of the account for banners and upgrade prompts.
    pub async fn snapshot(
        &self,
        account_id: &AccountId,
    ) -> Result<EntitlementSnapshot, EntitlementError> {
        let record = match self.reconciler.handle(account_id).await {
            Ok(record) => record,
            Err(err @ EntitlementError::NotFound(_)) => return Err(err),
            Err(err) => {
                tracing::warn!(
                    account_id = %account_id,
                    error = %err,
                    "Reconciliation failed; answering from stored record"
                );
                self.store
                    .get(account_id)
                    .await?
                    .ok_or_else(|| EntitlementError::not_found(account_id.clone()))?
            }
        };

        Ok(EntitlementSnapshot::of(&record, self.clock.now()))
    }

    /// Whether the account may use paid functionality right now.
    ///
    /// Never fails: unknown accounts and store outages both deny.
    pub async fn is_entitled(&self, account_id: &AccountId) -> bool {
        match self.snapshot(account_id).await {
            Ok(snapshot) => snapshot.entitled,
            Err(EntitlementError::NotFound(_)) => {
                tracing::debug!(account_id = %account_id, "No entitlement record; denying");
                false
            }
            Err(err) => {
                tracing::error!(
                    account_id = %account_id,
                    error = %err,
                    "Entitlement check failed; denying"
                );
                false
            }
        }
    }

    /// Entitlement of an already loaded record, without reconciling.
    pub fn check(&self, record: &EntitlementRecord) -> bool {
        is_entitled(record, self.clock.now())
    }
}

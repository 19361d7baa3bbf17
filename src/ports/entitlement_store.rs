//! Entitlement record store port.
//!
//! The store is a keyed map from account to `EntitlementRecord` with
//! per-account atomic updates. There are no cross-account transactions
//! and no locks held across provider calls.
//!
//! # Example
//!
//! ```ignore
//! async fn expire(store: &dyn EntitlementStore, id: &AccountId) -> Result<(), DomainError> {
//!     let patch = EntitlementPatch::new().with_plan(Plan::Free);
//!     store.update(id, &patch).await?;
//!     Ok(())
//! }
//! ```

use crate::domain::entitlement::{
    ConditionalUpdate, EntitlementPatch, EntitlementRecord, Precondition,
};
use crate::domain::foundation::{AccountId, DomainError};
use async_trait::async_trait;

/// Persistence port for entitlement records.
#[async_trait]
pub trait EntitlementStore: Send + Sync {
    /// Get the record for an account.
    ///
    /// Returns `None` if the account has no record.
    async fn get(&self, account_id: &AccountId) -> Result<Option<EntitlementRecord>, DomainError>;

    /// Find the record linked to a provider customer.
    async fn find_by_customer_id(
        &self,
        customer_id: &str,
    ) -> Result<Option<EntitlementRecord>, DomainError>;

    /// Insert a new record.
    ///
    /// # Errors
    ///
    /// - `AlreadyExists` if the account already has a record
    /// - `DatabaseError` on persistence failure
    async fn create(&self, record: &EntitlementRecord) -> Result<(), DomainError>;

    /// Atomically apply a patch and return the stored result.
    ///
    /// Implementations must go through `EntitlementRecord::apply` so the
    /// record invariants hold regardless of backend.
    ///
    /// # Errors
    ///
    /// - `EntitlementNotFound` if the account has no record
    /// - `InvalidStateTransition` if the patch's plan change is forbidden
    /// - `DatabaseError` on persistence failure
    async fn update(
        &self,
        account_id: &AccountId,
        patch: &EntitlementPatch,
    ) -> Result<EntitlementRecord, DomainError>;

    /// Atomically apply a patch only if the stored record still satisfies
    /// `expected`.
    ///
    /// The check and the write happen under the same lock. When the
    /// precondition fails nothing is written and the current record is
    /// returned as `Superseded`.
    ///
    /// # Errors
    ///
    /// Same as `update`.
    async fn update_if(
        &self,
        account_id: &AccountId,
        expected: &Precondition,
        patch: &EntitlementPatch,
    ) -> Result<ConditionalUpdate, DomainError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn entitlement_store_is_object_safe() {
        fn _accepts_dyn(_store: &dyn EntitlementStore) {}
    }
}

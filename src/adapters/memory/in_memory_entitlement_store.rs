//! In-Memory Entitlement Store Adapter
//!
//! Keeps records in a map behind a tokio `RwLock`. The write lock makes
//! every `update` atomic per call. Used for tests and local development.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::domain::entitlement::{
    ConditionalUpdate, EntitlementPatch, EntitlementRecord, Precondition,
};
use crate::domain::foundation::{AccountId, DomainError, ErrorCode};
use crate::ports::EntitlementStore;

/// In-memory entitlement store.
#[derive(Debug, Clone, Default)]
pub struct InMemoryEntitlementStore {
    records: Arc<RwLock<HashMap<AccountId, EntitlementRecord>>>,
    writes: Arc<RwLock<usize>>,
}

impl InMemoryEntitlementStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store pre-loaded with records.
    pub fn with_records(records: impl IntoIterator<Item = EntitlementRecord>) -> Self {
        let map = records
            .into_iter()
            .map(|r| (r.account_id.clone(), r))
            .collect();
        Self {
            records: Arc::new(RwLock::new(map)),
            writes: Arc::new(RwLock::new(0)),
        }
    }

    /// Number of successful `update` calls so far.
    pub async fn write_count(&self) -> usize {
        *self.writes.read().await
    }

    /// Number of stored records.
    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.records.read().await.is_empty()
    }
}

#[async_trait]
impl EntitlementStore for InMemoryEntitlementStore {
    async fn get(&self, account_id: &AccountId) -> Result<Option<EntitlementRecord>, DomainError> {
        Ok(self.records.read().await.get(account_id).cloned())
    }

    async fn find_by_customer_id(
        &self,
        customer_id: &str,
    ) -> Result<Option<EntitlementRecord>, DomainError> {
        let records = self.records.read().await;
        Ok(records
            .values()
            .filter(|r| r.provider_customer_id.as_deref() == Some(customer_id))
            .min_by_key(|r| r.account_created_at)
            .cloned())
    }

    async fn create(&self, record: &EntitlementRecord) -> Result<(), DomainError> {
        let mut records = self.records.write().await;
        if records.contains_key(&record.account_id) {
            return Err(DomainError::new(
                ErrorCode::AlreadyExists,
                "Account already has an entitlement record",
            )
            .with_detail("account_id", record.account_id.as_str()));
        }
        records.insert(record.account_id.clone(), record.clone());
        Ok(())
    }

    async fn update(
        &self,
        account_id: &AccountId,
        patch: &EntitlementPatch,
    ) -> Result<EntitlementRecord, DomainError> {
        self.update_if(account_id, &Precondition::default(), patch)
            .await
            .map(ConditionalUpdate::into_record)
    }

    async fn update_if(
        &self,
        account_id: &AccountId,
        expected: &Precondition,
        patch: &EntitlementPatch,
    ) -> Result<ConditionalUpdate, DomainError> {
        let mut records = self.records.write().await;
        let current = records.get(account_id).ok_or_else(|| {
            DomainError::new(ErrorCode::EntitlementNotFound, "Entitlement not found")
                .with_detail("account_id", account_id.as_str())
        })?;

        if !expected.holds(current) {
            return Ok(ConditionalUpdate::Superseded(current.clone()));
        }

        let next = current.apply(patch)?;
        records.insert(account_id.clone(), next.clone());
        drop(records);

        *self.writes.write().await += 1;
        Ok(ConditionalUpdate::Applied(next))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::entitlement::{CreationIntent, EntitlementPolicy, Plan};
    use crate::domain::foundation::Timestamp;

    fn record(id: &str) -> EntitlementRecord {
        EntitlementRecord::provision(
            AccountId::new(id).unwrap(),
            CreationIntent::Standard,
            Timestamp::from_unix_secs(1_700_000_000).unwrap(),
            &EntitlementPolicy::default(),
        )
    }

    #[tokio::test]
    async fn create_then_get() {
        let store = InMemoryEntitlementStore::new();
        let r = record("a");
        store.create(&r).await.unwrap();

        assert_eq!(store.get(&r.account_id).await.unwrap(), Some(r));
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn create_twice_fails() {
        let store = InMemoryEntitlementStore::new();
        store.create(&record("a")).await.unwrap();

        let err = store.create(&record("a")).await.unwrap_err();
        assert_eq!(err.code, ErrorCode::AlreadyExists);
    }

    #[tokio::test]
    async fn update_applies_patch_and_returns_result() {
        let store = InMemoryEntitlementStore::with_records([record("a")]);
        let id = AccountId::new("a").unwrap();

        let updated = store
            .update(&id, &EntitlementPatch::new().with_plan(Plan::Active))
            .await
            .unwrap();

        assert_eq!(updated.plan, Plan::Active);
        assert_eq!(store.get(&id).await.unwrap().unwrap().plan, Plan::Active);
        assert_eq!(store.write_count().await, 1);
    }

    #[tokio::test]
    async fn update_missing_account_is_not_found() {
        let store = InMemoryEntitlementStore::new();
        let err = store
            .update(&AccountId::new("ghost").unwrap(), &EntitlementPatch::new())
            .await
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::EntitlementNotFound);
    }

    #[tokio::test]
    async fn forbidden_transition_leaves_record_untouched() {
        let mut r = record("a");
        r.plan = Plan::Free;
        let store = InMemoryEntitlementStore::with_records([r.clone()]);

        let err = store
            .update(&r.account_id, &EntitlementPatch::new().with_plan(Plan::Trial))
            .await
            .unwrap_err();

        assert_eq!(err.code, ErrorCode::InvalidStateTransition);
        assert_eq!(store.get(&r.account_id).await.unwrap(), Some(r));
        assert_eq!(store.write_count().await, 0);
    }

    #[tokio::test]
    async fn conditional_update_skips_when_state_moved_on() {
        let mut active = record("a");
        active.plan = Plan::Active;
        let store = InMemoryEntitlementStore::with_records([active.clone()]);

        let outcome = store
            .update_if(
                &active.account_id,
                &Precondition::plan(Plan::Trial),
                &EntitlementPatch::new().with_plan(Plan::Free),
            )
            .await
            .unwrap();

        assert_eq!(outcome, ConditionalUpdate::Superseded(active.clone()));
        assert_eq!(store.get(&active.account_id).await.unwrap(), Some(active));
        assert_eq!(store.write_count().await, 0);
    }

    #[tokio::test]
    async fn conditional_update_applies_when_state_matches() {
        let store = InMemoryEntitlementStore::with_records([record("a")]);
        let id = AccountId::new("a").unwrap();

        let outcome = store
            .update_if(
                &id,
                &Precondition::plan(Plan::Inactive),
                &EntitlementPatch::new().with_plan(Plan::Active),
            )
            .await
            .unwrap();

        assert!(outcome.is_applied());
        assert_eq!(outcome.record().plan, Plan::Active);
        assert_eq!(store.write_count().await, 1);
    }

    #[tokio::test]
    async fn find_by_customer_id_matches_linked_record() {
        let mut linked = record("linked");
        linked.provider_customer_id = Some("cus_1".into());
        let store = InMemoryEntitlementStore::with_records([linked.clone(), record("other")]);

        assert_eq!(
            store.find_by_customer_id("cus_1").await.unwrap(),
            Some(linked)
        );
        assert_eq!(store.find_by_customer_id("cus_2").await.unwrap(), None);
    }
}

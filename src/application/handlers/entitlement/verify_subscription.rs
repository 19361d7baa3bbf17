//! VerifySubscriptionHandler - Pull-based re-check of an active subscription.
//!
//! One provider round-trip under a deadline. A failed or timed-out
//! round-trip never writes, so `verified_at` only moves when the provider
//! actually answered. Writes are conditional on the record still being the
//! one that was checked.

use std::sync::Arc;
use std::time::Duration;

use crate::domain::entitlement::{
    transitions, EntitlementError, EntitlementRecord, Plan, Precondition, Subscription,
};
use crate::domain::foundation::AccountId;
use crate::ports::{Clock, EntitlementStore, PaymentError, PaymentProvider};

use super::call_provider;

/// Command to force a verification of one account.
#[derive(Debug, Clone)]
pub struct VerifySubscriptionCommand {
    pub account_id: AccountId,
}

/// Handler for provider re-verification.
pub struct VerifySubscriptionHandler {
    store: Arc<dyn EntitlementStore>,
    provider: Arc<dyn PaymentProvider>,
    clock: Arc<dyn Clock>,
    provider_timeout: Duration,
}

impl VerifySubscriptionHandler {
    pub fn new(
        store: Arc<dyn EntitlementStore>,
        provider: Arc<dyn PaymentProvider>,
        clock: Arc<dyn Clock>,
        provider_timeout: Duration,
    ) -> Self {
        Self {
            store,
            provider,
            clock,
            provider_timeout,
        }
    }

    /// Verify the account now, regardless of how fresh its record is.
    ///
    /// Records that are not `Active` are returned unchanged.
    pub async fn handle(
        &self,
        cmd: VerifySubscriptionCommand,
    ) -> Result<EntitlementRecord, EntitlementError> {
        let record = self
            .store
            .get(&cmd.account_id)
            .await?
            .ok_or_else(|| EntitlementError::not_found(cmd.account_id.clone()))?;

        self.verify(&record).await
    }

    /// Verify `record` against the provider and persist the observation.
    ///
    /// # Errors
    ///
    /// Provider failures surface as `ProviderUnavailable` or `Provider`
    /// with nothing written. Store failures surface as `Infrastructure`.
    pub async fn verify(
        &self,
        record: &EntitlementRecord,
    ) -> Result<EntitlementRecord, EntitlementError> {
        if record.plan != Plan::Active {
            return Ok(record.clone());
        }

        if record.provider_subscription_id.is_none() && record.provider_customer_id.is_none() {
            return self.lapse_unlinked(record).await;
        }

        let observed = match self.fetch_subscription(record).await {
            Ok(observed) => observed,
            Err(err) => {
                tracing::warn!(
                    account_id = %record.account_id,
                    error = %err,
                    retryable = err.is_retryable(),
                    "Subscription verification failed; record left unchanged"
                );
                return Err(err.into());
            }
        };

        // A webhook or redirect may have written while we waited on the provider.
        let patch = transitions::verified(observed.as_ref(), self.clock.now());
        let outcome = self
            .store
            .update_if(&record.account_id, &unchanged_since(record), &patch)
            .await?;

        if !outcome.is_applied() {
            tracing::debug!(
                account_id = %record.account_id,
                "Concurrent write during verification; keeping the fresher record"
            );
            return Ok(outcome.into_record());
        }

        let updated = outcome.into_record();
        tracing::info!(
            account_id = %updated.account_id,
            plan = %updated.plan,
            status = updated.provider_subscription_status.as_deref().unwrap_or("none"),
            "Subscription verified"
        );

        Ok(updated)
    }

    /// An active record with no provider link cannot be checked. It lapses
    /// to free and `verified_at` stays where it was.
    async fn lapse_unlinked(
        &self,
        record: &EntitlementRecord,
    ) -> Result<EntitlementRecord, EntitlementError> {
        let outcome = self
            .store
            .update_if(
                &record.account_id,
                &unchanged_since(record),
                &transitions::unverifiable(),
            )
            .await?;

        if outcome.is_applied() {
            tracing::info!(
                account_id = %record.account_id,
                "Active record has no provider link; lapsed to free"
            );
        }

        Ok(outcome.into_record())
    }

    /// Looks the subscription up by id, falling back to the customer's
    /// active subscriptions when no id was ever recorded.
    ///
    /// Callers make sure at least one of the two ids is present.
    async fn fetch_subscription(
        &self,
        record: &EntitlementRecord,
    ) -> Result<Option<Subscription>, PaymentError> {
        if let Some(subscription_id) = &record.provider_subscription_id {
            return call_provider(
                self.provider_timeout,
                self.provider.get_subscription(subscription_id),
            )
            .await;
        }

        let Some(customer_id) = record.provider_customer_id.as_deref() else {
            return Ok(None);
        };
        let active = call_provider(
            self.provider_timeout,
            self.provider.list_active_subscriptions(customer_id),
        )
        .await?;
        Ok(active.into_iter().next())
    }
}

/// The verifier only writes over the exact active record it checked.
fn unchanged_since(record: &EntitlementRecord) -> Precondition {
    Precondition::plan(Plan::Active).with_verified_at(record.verified_at)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::MockPaymentProvider;
    use crate::application::handlers::entitlement::test_support::{
        account, active_record, now, record, Fixture, RacingStore,
    };
    use crate::application::handlers::entitlement::DEFAULT_PROVIDER_TIMEOUT;
    use crate::domain::entitlement::{EntitlementPatch, SubscriptionStatus};
    use crate::ports::{EntitlementStore, PaymentError};

    fn handler(fx: &Fixture) -> VerifySubscriptionHandler {
        VerifySubscriptionHandler::new(
            fx.store(),
            fx.provider(),
            fx.clock(),
            DEFAULT_PROVIDER_TIMEOUT,
        )
    }

    #[tokio::test]
    async fn active_subscription_refreshes_verified_at() {
        let fx = Fixture::with_provider(MockPaymentProvider::with_active_subscription(
            "cus_1", "sub_1",
        ));
        fx.seed(active_record("acct-a", 40)).await;

        let updated = handler(&fx)
            .handle(VerifySubscriptionCommand {
                account_id: account("acct-a"),
            })
            .await
            .unwrap();

        assert_eq!(updated.plan, Plan::Active);
        assert_eq!(updated.verified_at, Some(now()));
    }

    #[tokio::test]
    async fn canceled_subscription_drops_to_free() {
        let fx = Fixture::with_provider(MockPaymentProvider::with_active_subscription(
            "cus_1", "sub_1",
        ));
        fx.provider
            .set_subscription_status("sub_1", SubscriptionStatus::Canceled);
        fx.seed(active_record("acct-a", 40)).await;

        let updated = handler(&fx).verify(&active_record("acct-a", 40)).await.unwrap();

        assert_eq!(updated.plan, Plan::Free);
        assert_eq!(updated.provider_subscription_status.as_deref(), Some("canceled"));
        assert_eq!(updated.verified_at, Some(now()));
    }

    #[tokio::test]
    async fn subscription_unknown_to_provider_is_canceled() {
        let fx = Fixture::new();
        fx.seed(active_record("acct-a", 40)).await;

        let updated = handler(&fx).verify(&active_record("acct-a", 40)).await.unwrap();

        assert_eq!(updated.plan, Plan::Free);
        assert_eq!(updated.provider_subscription_status.as_deref(), Some("canceled"));
    }

    #[tokio::test]
    async fn provider_failure_leaves_record_unchanged() {
        let fx = Fixture::with_provider(MockPaymentProvider::with_active_subscription(
            "cus_1", "sub_1",
        ));
        fx.provider
            .set_method_error("get_subscription", PaymentError::network("reset"));
        let before = active_record("acct-a", 40);
        fx.seed(before.clone()).await;

        let err = handler(&fx).verify(&before).await.unwrap_err();

        assert!(err.is_retryable());
        assert_eq!(fx.stored("acct-a").await, before);
        assert_eq!(fx.store.write_count().await, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn timeout_counts_as_failure() {
        let fx = Fixture::with_provider(MockPaymentProvider::with_active_subscription(
            "cus_1", "sub_1",
        ));
        fx.provider.set_latency(Duration::from_secs(60));
        let before = active_record("acct-a", 40);
        fx.seed(before.clone()).await;

        let err = handler(&fx).verify(&before).await.unwrap_err();

        assert!(matches!(err, EntitlementError::ProviderUnavailable(_)));
        assert_eq!(fx.stored("acct-a").await, before);
    }

    #[tokio::test]
    async fn missing_subscription_id_adopts_first_active_subscription() {
        let fx = Fixture::with_provider(MockPaymentProvider::with_active_subscription(
            "cus_1", "sub_77",
        ));
        let mut optimistic = record("acct-a", Plan::Active);
        optimistic.provider_customer_id = Some("cus_1".into());
        optimistic.verified_at = Some(now().minus_days(1));
        fx.seed(optimistic.clone()).await;

        let updated = handler(&fx).verify(&optimistic).await.unwrap();

        assert_eq!(updated.plan, Plan::Active);
        assert_eq!(updated.provider_subscription_id.as_deref(), Some("sub_77"));
        assert!(fx.provider.was_called("list_active_subscriptions"));
    }

    #[tokio::test]
    async fn concurrent_write_wins_over_verifier() {
        let fx = Fixture::with_provider(MockPaymentProvider::with_active_subscription(
            "cus_1", "sub_1",
        ));
        fx.provider
            .set_subscription_status("sub_1", SubscriptionStatus::Canceled);
        let stale = active_record("acct-a", 40);
        fx.seed(stale.clone()).await;
        // Webhook lands between our read and our write.
        fx.store
            .update(
                &stale.account_id,
                &EntitlementPatch::new().with_verified_at(now().minus_days(1)),
            )
            .await
            .unwrap();

        let result = handler(&fx).verify(&stale).await.unwrap();

        assert_eq!(result.plan, Plan::Active);
        assert_eq!(result.verified_at, Some(now().minus_days(1)));
    }

    #[tokio::test]
    async fn webhook_racing_the_write_is_not_overwritten() {
        let fx = Fixture::with_provider(MockPaymentProvider::with_active_subscription(
            "cus_1", "sub_1",
        ));
        fx.provider
            .set_subscription_status("sub_1", SubscriptionStatus::Canceled);
        fx.seed(active_record("acct-a", 40)).await;
        let renewal = EntitlementPatch::new()
            .with_subscription_status("active")
            .with_verified_at(now().minus_days(1));
        let verifier = VerifySubscriptionHandler::new(
            Arc::new(RacingStore::new(fx.store.clone(), renewal)),
            fx.provider(),
            fx.clock(),
            DEFAULT_PROVIDER_TIMEOUT,
        );

        let result = verifier
            .handle(VerifySubscriptionCommand {
                account_id: account("acct-a"),
            })
            .await
            .unwrap();

        assert_eq!(result.plan, Plan::Active);
        assert_eq!(result.verified_at, Some(now().minus_days(1)));
        assert_eq!(fx.stored("acct-a").await, result);
    }

    #[tokio::test]
    async fn unlinked_active_record_lapses_without_provider_call() {
        let fx = Fixture::new();
        let mut optimistic = record("acct-u", Plan::Active);
        optimistic.verified_at = Some(now().minus_days(1));
        fx.seed(optimistic.clone()).await;

        let result = handler(&fx).verify(&optimistic).await.unwrap();

        assert_eq!(result.plan, Plan::Free);
        assert_eq!(result.verified_at, Some(now().minus_days(1)));
        assert_eq!(fx.stored("acct-u").await, result);
        assert!(fx.provider.calls().is_empty());
    }

    #[tokio::test]
    async fn non_active_records_are_not_verified() {
        let fx = Fixture::new();
        let trial = record("acct-a", Plan::Trial);

        let result = handler(&fx).verify(&trial).await.unwrap();

        assert_eq!(result, trial);
        assert!(fx.provider.calls().is_empty());
    }
}

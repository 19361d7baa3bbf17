//! ActivateAfterCheckoutHandler - Optimistic activation on the success redirect.
//!
//! No provider round-trip. The write is corrected by the checkout webhook or,
//! failing that, by an early verification once the grace period passes.

use std::sync::Arc;

use crate::domain::entitlement::{transitions, EntitlementError, EntitlementRecord};
use crate::domain::foundation::AccountId;
use crate::ports::{Clock, EntitlementStore};

/// Command issued when the browser lands on the checkout success URL.
#[derive(Debug, Clone)]
pub struct ActivateAfterCheckoutCommand {
    pub account_id: AccountId,
    /// Session id from the redirect, logged for correlation only.
    pub session_id: Option<String>,
}

/// Handler for the optimistic activation path.
pub struct ActivateAfterCheckoutHandler {
    store: Arc<dyn EntitlementStore>,
    clock: Arc<dyn Clock>,
}

impl ActivateAfterCheckoutHandler {
    pub fn new(store: Arc<dyn EntitlementStore>, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    pub async fn handle(
        &self,
        cmd: ActivateAfterCheckoutCommand,
    ) -> Result<EntitlementRecord, EntitlementError> {
        let patch = transitions::optimistic_activation(self.clock.now());
        let record = self.store.update(&cmd.account_id, &patch).await?;

        tracing::info!(
            account_id = %record.account_id,
            session_id = cmd.session_id.as_deref().unwrap_or("none"),
            "Optimistic activation after checkout"
        );

        Ok(record)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::handlers::entitlement::test_support::{account, now, record, Fixture};
    use crate::domain::entitlement::{is_entitled, EntitlementPolicy, Plan};

    fn handler(fx: &Fixture) -> ActivateAfterCheckoutHandler {
        ActivateAfterCheckoutHandler::new(fx.store(), fx.clock())
    }

    #[tokio::test]
    async fn redirect_activates_without_provider_call() {
        let fx = Fixture::new();
        fx.seed(record("acct-c", Plan::Free)).await;

        let result = handler(&fx)
            .handle(ActivateAfterCheckoutCommand {
                account_id: account("acct-c"),
                session_id: Some("cs_1".into()),
            })
            .await
            .unwrap();

        assert_eq!(result.plan, Plan::Active);
        assert_eq!(result.verified_at, Some(now()));
        assert_eq!(result.provider_subscription_id, None);
        assert!(is_entitled(&result, now()));
        assert!(fx.provider.calls().is_empty());
    }

    #[tokio::test]
    async fn unconfirmed_activation_is_verified_after_grace() {
        let fx = Fixture::new();
        fx.seed(record("acct-c", Plan::Trial)).await;

        let result = handler(&fx)
            .handle(ActivateAfterCheckoutCommand {
                account_id: account("acct-c"),
                session_id: None,
            })
            .await
            .unwrap();

        let policy = EntitlementPolicy::default();
        assert!(!transitions::needs_verification(&result, now(), &policy));
        let later = now().plus(policy.unconfirmed_activation_grace).plus_secs(1);
        assert!(transitions::needs_verification(&result, later, &policy));
    }

    #[tokio::test]
    async fn unknown_account_is_not_found() {
        let fx = Fixture::new();

        let err = handler(&fx)
            .handle(ActivateAfterCheckoutCommand {
                account_id: account("ghost"),
                session_id: None,
            })
            .await
            .unwrap_err();

        assert_eq!(err, EntitlementError::NotFound(account("ghost")));
    }
}

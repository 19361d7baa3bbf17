//! StartCheckoutHandler - Command handler for starting a hosted subscription checkout.

use std::sync::Arc;
use std::time::Duration;

use crate::domain::entitlement::{EntitlementError, EntitlementPatch};
use crate::domain::foundation::AccountId;
use crate::ports::{
    CreateCheckoutRequest, CreateCustomerRequest, EntitlementStore, PaymentProvider,
};

use super::call_provider;

/// Command to start a checkout for an existing account.
#[derive(Debug, Clone)]
pub struct StartCheckoutCommand {
    pub account_id: AccountId,
    pub email: String,
    pub success_url: String,
    pub cancel_url: String,
}

/// Where the browser should go to pay.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StartCheckoutResult {
    pub session_id: String,
    pub checkout_url: String,
}

/// Handler for starting checkouts.
///
/// Links a provider customer to the account first, so every later webhook
/// resolves the account by customer id.
pub struct StartCheckoutHandler {
    store: Arc<dyn EntitlementStore>,
    provider: Arc<dyn PaymentProvider>,
    provider_timeout: Duration,
}

impl StartCheckoutHandler {
    pub fn new(
        store: Arc<dyn EntitlementStore>,
        provider: Arc<dyn PaymentProvider>,
        provider_timeout: Duration,
    ) -> Self {
        Self {
            store,
            provider,
            provider_timeout,
        }
    }

    pub async fn handle(
        &self,
        cmd: StartCheckoutCommand,
    ) -> Result<StartCheckoutResult, EntitlementError> {
        if !cmd.email.contains('@') {
            return Err(EntitlementError::validation("email", "Not an email address"));
        }
        if cmd.success_url.trim().is_empty() || cmd.cancel_url.trim().is_empty() {
            return Err(EntitlementError::validation(
                "success_url",
                "Redirect URLs are required",
            ));
        }

        let record = self
            .store
            .get(&cmd.account_id)
            .await?
            .ok_or_else(|| EntitlementError::not_found(cmd.account_id.clone()))?;

        let customer_id = match record.provider_customer_id {
            Some(customer_id) => customer_id,
            None => {
                let customer = call_provider(
                    self.provider_timeout,
                    self.provider.create_customer(CreateCustomerRequest {
                        account_id: cmd.account_id.clone(),
                        email: cmd.email.clone(),
                    }),
                )
                .await?;

                self.store
                    .update(
                        &cmd.account_id,
                        &EntitlementPatch::new().with_customer_id(customer.id.clone()),
                    )
                    .await?;

                tracing::info!(
                    account_id = %cmd.account_id,
                    customer_id = %customer.id,
                    "Linked provider customer"
                );
                customer.id
            }
        };

        let redirect = call_provider(
            self.provider_timeout,
            self.provider.create_checkout_session(CreateCheckoutRequest {
                account_id: cmd.account_id.clone(),
                customer_id,
                success_url: cmd.success_url,
                cancel_url: cmd.cancel_url,
            }),
        )
        .await?;

        tracing::info!(
            account_id = %cmd.account_id,
            session_id = %redirect.session_id,
            "Checkout started"
        );

        Ok(StartCheckoutResult {
            session_id: redirect.session_id,
            checkout_url: redirect.url,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::handlers::entitlement::test_support::{account, record, Fixture};
    use crate::application::handlers::entitlement::DEFAULT_PROVIDER_TIMEOUT;
    use crate::domain::entitlement::Plan;
    use crate::ports::PaymentError;

    fn handler(fx: &Fixture) -> StartCheckoutHandler {
        StartCheckoutHandler::new(fx.store(), fx.provider(), DEFAULT_PROVIDER_TIMEOUT)
    }

    fn cmd(id: &str) -> StartCheckoutCommand {
        StartCheckoutCommand {
            account_id: account(id),
            email: "a@example.com".into(),
            success_url: "https://app.example.com/billing/success".into(),
            cancel_url: "https://app.example.com/billing".into(),
        }
    }

    #[tokio::test]
    async fn first_checkout_creates_and_links_customer() {
        let fx = Fixture::new();
        fx.seed(record("acct-a", Plan::Trial)).await;

        let result = handler(&fx).handle(cmd("acct-a")).await.unwrap();

        let stored = fx.stored("acct-a").await;
        let customer_id = stored.provider_customer_id.unwrap();
        assert!(customer_id.starts_with("cus_mock_"));
        assert!(result.checkout_url.contains(&result.session_id));
        assert_eq!(fx.provider.call_count("create_customer"), 1);
        assert_eq!(
            fx.provider.calls().last().unwrap().args[1],
            customer_id,
            "checkout is created for the linked customer"
        );
    }

    #[tokio::test]
    async fn existing_customer_is_reused() {
        let fx = Fixture::new();
        let mut r = record("acct-a", Plan::Free);
        r.provider_customer_id = Some("cus_existing".into());
        fx.seed(r).await;

        handler(&fx).handle(cmd("acct-a")).await.unwrap();

        assert!(!fx.provider.was_called("create_customer"));
    }

    #[tokio::test]
    async fn unknown_account_is_not_found() {
        let fx = Fixture::new();
        let err = handler(&fx).handle(cmd("ghost")).await.unwrap_err();
        assert_eq!(err, EntitlementError::NotFound(account("ghost")));
    }

    #[tokio::test]
    async fn invalid_email_is_rejected_before_any_call() {
        let fx = Fixture::new();
        let mut c = cmd("acct-a");
        c.email = "nope".into();

        let err = handler(&fx).handle(c).await.unwrap_err();

        assert!(matches!(err, EntitlementError::ValidationFailed { .. }));
        assert!(fx.provider.calls().is_empty());
    }

    #[tokio::test]
    async fn provider_outage_leaves_record_unlinked() {
        let fx = Fixture::new();
        fx.seed(record("acct-a", Plan::Inactive)).await;
        fx.provider
            .set_method_error("create_customer", PaymentError::network("reset"));

        let err = handler(&fx).handle(cmd("acct-a")).await.unwrap_err();

        assert!(err.is_retryable());
        assert_eq!(fx.stored("acct-a").await.provider_customer_id, None);
    }
}

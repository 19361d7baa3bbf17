//! ConfirmCheckoutHandler - Poll-for-confirmation after the checkout redirect.
//!
//! Lets the client confirm a payment without waiting for the webhook. A paid
//! session gets exactly the checkout-completed activation patch, so a later
//! webhook for the same session writes the same record.

use std::sync::Arc;
use std::time::Duration;

use crate::domain::entitlement::{transitions, EntitlementError, Plan};
use crate::domain::foundation::AccountId;
use crate::ports::{CheckoutSession, Clock, EntitlementStore, PaymentProvider};

use super::call_provider;

/// Command to confirm a checkout session for the calling account.
#[derive(Debug, Clone)]
pub struct ConfirmCheckoutCommand {
    pub account_id: AccountId,
    pub session_id: String,
}

/// What the client shows after polling.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfirmCheckoutResult {
    /// True when this call observed a paid session and activated the account.
    pub activated: bool,
    pub plan: Plan,
    pub provider_subscription_status: Option<String>,
}

/// Handler for checkout confirmation.
pub struct ConfirmCheckoutHandler {
    store: Arc<dyn EntitlementStore>,
    provider: Arc<dyn PaymentProvider>,
    clock: Arc<dyn Clock>,
    provider_timeout: Duration,
}

impl ConfirmCheckoutHandler {
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

    pub async fn handle(
        &self,
        cmd: ConfirmCheckoutCommand,
    ) -> Result<ConfirmCheckoutResult, EntitlementError> {
        if cmd.session_id.trim().is_empty() {
            return Err(EntitlementError::validation("session_id", "Session id is required"));
        }
        if !cmd
            .session_id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_')
        {
            return Err(EntitlementError::validation(
                "session_id",
                "Session id may only contain letters, digits and underscores",
            ));
        }

        let record = self
            .store
            .get(&cmd.account_id)
            .await?
            .ok_or_else(|| EntitlementError::not_found(cmd.account_id.clone()))?;

        let session = call_provider(
            self.provider_timeout,
            self.provider.get_checkout_session(&cmd.session_id),
        )
        .await?
        .ok_or_else(|| EntitlementError::CheckoutSessionNotFound(cmd.session_id.clone()))?;

        if !owned_by(&session, &cmd.account_id, record.provider_customer_id.as_deref()) {
            tracing::warn!(
                account_id = %cmd.account_id,
                session_id = %cmd.session_id,
                "Checkout session confirmation attempted by another account"
            );
            return Err(EntitlementError::CheckoutSessionNotOwned(cmd.session_id));
        }

        let subscription_id = match (&session.subscription_id, session.is_paid()) {
            (Some(subscription_id), true) => subscription_id.clone(),
            _ => {
                tracing::debug!(
                    account_id = %cmd.account_id,
                    session_id = %cmd.session_id,
                    status = %session.status,
                    payment_status = %session.payment_status,
                    "Checkout not yet paid"
                );
                return Ok(ConfirmCheckoutResult {
                    activated: false,
                    plan: record.plan,
                    provider_subscription_status: record.provider_subscription_status,
                });
            }
        };

        let subscription = call_provider(
            self.provider_timeout,
            self.provider.get_subscription(&subscription_id),
        )
        .await?
        .ok_or_else(|| {
            EntitlementError::Provider(format!(
                "Subscription {} attached to session {} not found",
                subscription_id, cmd.session_id
            ))
        })?;

        let customer_id = session
            .customer_id
            .clone()
            .unwrap_or_else(|| subscription.customer_id.clone());
        let patch = transitions::activation(&customer_id, &subscription, self.clock.now());
        let updated = self.store.update(&cmd.account_id, &patch).await?;

        tracing::info!(
            account_id = %updated.account_id,
            session_id = %cmd.session_id,
            plan = %updated.plan,
            "Checkout confirmed"
        );

        Ok(ConfirmCheckoutResult {
            activated: true,
            plan: updated.plan,
            provider_subscription_status: updated.provider_subscription_status,
        })
    }
}

/// A session belongs to the account it was tagged with, or failing a tag,
/// to the account linked to its customer.
fn owned_by(session: &CheckoutSession, account_id: &AccountId, customer_id: Option<&str>) -> bool {
    match &session.account_id {
        Some(tagged) => tagged == account_id.as_str(),
        None => matches!(
            (session.customer_id.as_deref(), customer_id),
            (Some(a), Some(b)) if a == b
        ),
    }
}

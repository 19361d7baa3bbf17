//! Entitlement handlers.
//!
//! Command and query handlers for the entitlement lifecycle:
//!
//! ## Commands
//! - Provisioning a record for a new account
//! - Starting a hosted checkout
//! - Optimistic activation after the checkout redirect
//! - Confirming a checkout by polling the provider
//! - Applying provider webhooks
//! - Verifying an active subscription against the provider
//!
//! ## Queries
//! - Reconcile-then-read (`ReconcileIfStaleHandler`)
//! - Gate checks and UI snapshots (`EntitlementGate`)
//!
//! Every write goes through `EntitlementStore::update` with a patch computed
//! by `domain::entitlement`; handlers only decide when to write. Writers
//! acting on an earlier read (trial timer, verifier) use `update_if` so a
//! fresher write is never overwritten.

mod activate_after_checkout;
mod confirm_checkout;
mod create_entitlement;
mod entitlement_gate;
mod handle_provider_webhook;
mod reconcile_if_stale;
mod start_checkout;
mod verify_subscription;

use std::future::Future;
use std::time::Duration;

use crate::ports::PaymentError;

// Commands
pub use activate_after_checkout::{ActivateAfterCheckoutCommand, ActivateAfterCheckoutHandler};
pub use confirm_checkout::{ConfirmCheckoutCommand, ConfirmCheckoutHandler, ConfirmCheckoutResult};
pub use create_entitlement::{CreateEntitlementCommand, CreateEntitlementHandler};
pub use handle_provider_webhook::{
    HandleProviderWebhookCommand, HandleProviderWebhookHandler, HandleProviderWebhookResult,
};
pub use start_checkout::{StartCheckoutCommand, StartCheckoutHandler, StartCheckoutResult};
pub use verify_subscription::{VerifySubscriptionCommand, VerifySubscriptionHandler};

// Queries
pub use entitlement_gate::EntitlementGate;
pub use reconcile_if_stale::ReconcileIfStaleHandler;

/// Provider deadline used when none is configured.
pub const DEFAULT_PROVIDER_TIMEOUT: Duration = Duration::from_secs(10);

/// Runs a provider call under `limit`. Elapsing counts as a retryable failure.
pub(crate) async fn call_provider<T, F>(limit: Duration, call: F) -> Result<T, PaymentError>
where
    F: Future<Output = Result<T, PaymentError>>,
{
    match tokio::time::timeout(limit, call).await {
        Ok(result) => result,
        Err(_) => Err(PaymentError::timeout(format!(
            "no answer within {}ms",
            limit.as_millis()
        ))),
    }
}

//! HandleProviderWebhookHandler - Applies payment provider push events.
//!
//! Delivery is at-least-once and unordered. Every event is reduced to a patch
//! that depends only on the payload, a fresh provider read and `now`, so a
//! redelivered event writes the same record again.
//!
//! Outcomes map to the provider's redelivery contract:
//! - `Applied` / `Ignored` acknowledge the event (200)
//! - `WebhookError::is_retryable()` errors ask for redelivery (500)
//! - signature and payload errors reject it for good (401 / 400)
//! - permanent provider or transition failures reject it for good (422)

use std::sync::Arc;
use std::time::Duration;

use crate::domain::entitlement::{
    transitions, EntitlementPatch, Plan, Subscription, WebhookError,
};
use crate::domain::foundation::{AccountId, DomainError, ErrorCode};
use crate::ports::{
    Clock, EntitlementStore, PaymentProvider, WebhookEvent, WebhookEventData, WebhookEventType,
};

use super::call_provider;

/// Raw webhook request as received at the boundary.
#[derive(Debug, Clone)]
pub struct HandleProviderWebhookCommand {
    pub payload: Vec<u8>,
    pub signature: String,
}

/// What happened to an authenticated event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HandleProviderWebhookResult {
    /// A patch was written.
    Applied {
        event_id: String,
        account_id: AccountId,
        plan: Plan,
    },
    /// Acknowledged without a write.
    Ignored { event_id: String, reason: String },
}

impl HandleProviderWebhookResult {
    pub fn event_id(&self) -> &str {
        match self {
            Self::Applied { event_id, .. } | Self::Ignored { event_id, .. } => event_id,
        }
    }
}

/// Handler for provider webhooks.
pub struct HandleProviderWebhookHandler {
    store: Arc<dyn EntitlementStore>,
    provider: Arc<dyn PaymentProvider>,
    clock: Arc<dyn Clock>,
    provider_timeout: Duration,
}

impl HandleProviderWebhookHandler {
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
        cmd: HandleProviderWebhookCommand,
    ) -> Result<HandleProviderWebhookResult, WebhookError> {
        let event = self
            .provider
            .verify_webhook(&cmd.payload, &cmd.signature)
            .await
            .map_err(|err| {
                tracing::warn!(error = %err, "Webhook rejected at verification");
                WebhookError::from(err)
            })?;

        let event_id = event.id.clone();
        let event_type = event.event_type.clone();

        let result = match event.event_type {
            WebhookEventType::CheckoutSessionCompleted => self.on_checkout_completed(event).await,
            WebhookEventType::SubscriptionCreated => self.on_subscription_created(event).await,
            WebhookEventType::SubscriptionUpdated => self.on_subscription_updated(event).await,
            WebhookEventType::SubscriptionDeleted => self.on_subscription_deleted(event).await,
            WebhookEventType::InvoicePaymentSucceeded => self.on_invoice_paid(event).await,
            WebhookEventType::Unknown(_) => Ok(ignored(&event_id, "Unhandled event type")),
        };

        match &result {
            Ok(HandleProviderWebhookResult::Applied {
                account_id, plan, ..
            }) => tracing::info!(
                event_id = %event_id,
                event_type = event_type.as_str(),
                account_id = %account_id,
                plan = %plan,
                "Webhook applied"
            ),
            Ok(HandleProviderWebhookResult::Ignored { reason, .. }) => tracing::debug!(
                event_id = %event_id,
                event_type = event_type.as_str(),
                reason = %reason,
                "Webhook acknowledged without changes"
            ),
            Err(err) if err.is_retryable() => tracing::error!(
                event_id = %event_id,
                event_type = event_type.as_str(),
                error = %err,
                "Webhook failed; provider will redeliver"
            ),
            Err(err) => tracing::warn!(
                event_id = %event_id,
                event_type = event_type.as_str(),
                error = %err,
                "Webhook rejected"
            ),
        }

        result
    }

    // ════════════════════════════════════════════════════════════════════════════
    // Event handlers
    // ════════════════════════════════════════════════════════════════════════════

    async fn on_checkout_completed(
        &self,
        event: WebhookEvent,
    ) -> Result<HandleProviderWebhookResult, WebhookError> {
        let WebhookEventData::Checkout {
            session_id,
            customer_id,
            subscription_id,
            account_id,
        } = event.data
        else {
            return Err(WebhookError::ParseError(
                "checkout event without session data".to_string(),
            ));
        };

        let Some(subscription_id) = subscription_id else {
            return Ok(ignored(&event.id, "Checkout session has no subscription"));
        };

        let referenced = account_id.and_then(|id| AccountId::new(id).ok());
        let resolved = match referenced {
            Some(id) => Some(id),
            None => match &customer_id {
                Some(customer_id) => self.account_for_customer(customer_id).await?,
                None => None,
            },
        };
        let Some(account_id) = resolved else {
            return Ok(self.unresolved(&event.id, &session_id));
        };

        let Some(subscription) = self.fetch_subscription(&subscription_id).await? else {
            tracing::warn!(
                event_id = %event.id,
                subscription_id = %subscription_id,
                "Checkout references a subscription the provider does not know"
            );
            return Ok(ignored(&event.id, "Subscription not found at provider"));
        };

        let customer_id = customer_id.unwrap_or_else(|| subscription.customer_id.clone());
        let patch = transitions::activation(&customer_id, &subscription, self.clock.now());
        self.write(&event.id, &account_id, &patch).await
    }

    async fn on_subscription_created(
        &self,
        event: WebhookEvent,
    ) -> Result<HandleProviderWebhookResult, WebhookError> {
        let subscription = subscription_payload(event.data)?;

        let account_id = match self.account_for_customer(&subscription.customer_id).await? {
            Some(id) => Some(id),
            None => self.account_from_customer_metadata(&subscription.customer_id).await?,
        };
        let Some(account_id) = account_id else {
            return Ok(self.unresolved(&event.id, &subscription.customer_id));
        };

        let patch = transitions::activation(
            &subscription.customer_id,
            &subscription,
            self.clock.now(),
        );
        self.write(&event.id, &account_id, &patch).await
    }

    async fn on_subscription_updated(
        &self,
        event: WebhookEvent,
    ) -> Result<HandleProviderWebhookResult, WebhookError> {
        let subscription = subscription_payload(event.data)?;

        let Some(account_id) = self.account_for_customer(&subscription.customer_id).await? else {
            return Ok(self.unresolved(&event.id, &subscription.customer_id));
        };

        let patch = transitions::subscription_updated(&subscription, self.clock.now());
        self.write(&event.id, &account_id, &patch).await
    }

    async fn on_subscription_deleted(
        &self,
        event: WebhookEvent,
    ) -> Result<HandleProviderWebhookResult, WebhookError> {
        let subscription = subscription_payload(event.data)?;

        let Some(account_id) = self.account_for_customer(&subscription.customer_id).await? else {
            return Ok(self.unresolved(&event.id, &subscription.customer_id));
        };

        let patch = transitions::subscription_deleted(self.clock.now());
        self.write(&event.id, &account_id, &patch).await
    }

    async fn on_invoice_paid(
        &self,
        event: WebhookEvent,
    ) -> Result<HandleProviderWebhookResult, WebhookError> {
        let WebhookEventData::Invoice {
            customer_id,
            subscription_id,
            ..
        } = event.data
        else {
            return Err(WebhookError::ParseError(
                "invoice event without invoice data".to_string(),
            ));
        };

        let Some(subscription_id) = subscription_id else {
            return Ok(ignored(&event.id, "Invoice has no subscription"));
        };

        let Some(account_id) = self.account_for_customer(&customer_id).await? else {
            return Ok(self.unresolved(&event.id, &customer_id));
        };

        let Some(subscription) = self.fetch_subscription(&subscription_id).await? else {
            return Ok(ignored(&event.id, "Subscription not found at provider"));
        };

        let patch = transitions::activation(&customer_id, &subscription, self.clock.now());
        self.write(&event.id, &account_id, &patch).await
    }

    // ════════════════════════════════════════════════════════════════════════════
    // Helpers
    // ════════════════════════════════════════════════════════════════════════════

    async fn account_for_customer(
        &self,
        customer_id: &str,
    ) -> Result<Option<AccountId>, WebhookError> {
        let record = self
            .store
            .find_by_customer_id(customer_id)
            .await
            .map_err(store_error)?;
        Ok(record.map(|r| r.account_id))
    }

    async fn account_from_customer_metadata(
        &self,
        customer_id: &str,
    ) -> Result<Option<AccountId>, WebhookError> {
        let customer = call_provider(self.provider_timeout, self.provider.get_customer(customer_id))
            .await?;
        Ok(customer
            .and_then(|c| c.account_id)
            .and_then(|id| AccountId::new(id).ok()))
    }

    async fn fetch_subscription(
        &self,
        subscription_id: &str,
    ) -> Result<Option<Subscription>, WebhookError> {
        let subscription = call_provider(
            self.provider_timeout,
            self.provider.get_subscription(subscription_id),
        )
        .await?;
        Ok(subscription)
    }

    /// Applies `patch` atomically. The store re-reads the row under its own
    /// lock, so the patch always lands on the freshest record.
    async fn write(
        &self,
        event_id: &str,
        account_id: &AccountId,
        patch: &EntitlementPatch,
    ) -> Result<HandleProviderWebhookResult, WebhookError> {
        match self.store.update(account_id, patch).await {
            Ok(record) => Ok(HandleProviderWebhookResult::Applied {
                event_id: event_id.to_string(),
                account_id: record.account_id,
                plan: record.plan,
            }),
            Err(err) if err.code == ErrorCode::EntitlementNotFound => {
                Ok(self.unresolved(event_id, account_id.as_str()))
            }
            Err(err) => Err(store_error(err)),
        }
    }

    fn unresolved(&self, event_id: &str, reference: &str) -> HandleProviderWebhookResult {
        tracing::warn!(
            event_id = %event_id,
            reference = %reference,
            "Webhook references no known account"
        );
        ignored(event_id, "No matching account")
    }
}

fn ignored(event_id: &str, reason: &str) -> HandleProviderWebhookResult {
    HandleProviderWebhookResult::Ignored {
        event_id: event_id.to_string(),
        reason: reason.to_string(),
    }
}

fn subscription_payload(data: WebhookEventData) -> Result<Subscription, WebhookError> {
    match data {
        WebhookEventData::Subscription(subscription) => {
            if subscription.customer_id.is_empty() {
                return Err(WebhookError::MissingField("customer"));
            }
            Ok(subscription)
        }
        _ => Err(WebhookError::ParseError(
            "subscription event without subscription data".to_string(),
        )),
    }
}

fn store_error(err: DomainError) -> WebhookError {
    match err.code {
        ErrorCode::InvalidStateTransition => WebhookError::InvalidTransition(err.message),
        _ => WebhookError::Database(err.message),
    }
}

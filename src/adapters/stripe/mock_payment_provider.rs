//! Mock payment provider for testing.
//!
//! Provides a configurable mock implementation of `PaymentProvider` for unit
//! and integration tests. Supports:
//! - Pre-configured customers, subscriptions and checkout sessions
//! - Error injection and artificial latency
//! - Call tracking
//! - Webhook event simulation

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;

use crate::domain::entitlement::{Subscription, SubscriptionStatus};
use crate::ports::{
    CheckoutRedirect, CheckoutSession, CreateCheckoutRequest, CreateCustomerRequest, Customer,
    PaymentError, PaymentProvider, WebhookEvent, WebhookEventData, WebhookEventType,
};

use super::stripe_adapter::decode_event;

/// Mock payment provider for testing.
///
/// Clones share state, so a test can keep a handle while the handlers own
/// an `Arc<dyn PaymentProvider>`.
///
/// # Example
///
/// ```ignore
/// let mock = MockPaymentProvider::with_active_subscription("cus_1", "sub_1");
/// mock.set_method_error("get_subscription", PaymentError::network("reset"));
/// ```
#[derive(Default, Clone)]
pub struct MockPaymentProvider {
    /// Inner state (thread-safe for async tests).
    inner: Arc<Mutex<MockState>>,
}

/// Internal mutable state.
#[derive(Default)]
struct MockState {
    customers: HashMap<String, Customer>,

    subscriptions: HashMap<String, Subscription>,

    checkout_sessions: HashMap<String, CheckoutSession>,

    /// Event returned by `verify_webhook` instead of decoding the payload.
    next_webhook_event: Option<WebhookEvent>,

    /// Error to return on next call.
    next_error: Option<PaymentError>,

    /// Specific errors by method name.
    method_errors: HashMap<String, PaymentError>,

    /// Sleep applied to every call before answering.
    latency: Option<Duration>,

    /// Track method calls for assertions.
    call_log: Vec<MethodCall>,

    /// Webhook verification behavior.
    webhook_verify_mode: WebhookVerifyMode,

    next_id: u64,
}

/// Recorded method call for assertions.
#[derive(Debug, Clone)]
pub struct MethodCall {
    pub method: String,
    pub args: Vec<String>,
}

/// How to handle webhook verification.
#[derive(Default, Clone)]
enum WebhookVerifyMode {
    /// Accept any signature.
    #[default]
    AcceptAll,

    /// Accept only this exact signature header.
    RequireSignature(String),

    /// Always fail verification.
    AlwaysFail,
}

impl MockPaymentProvider {
    /// Create a new mock provider with default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a mock that fails all webhook verifications.
    pub fn rejecting_webhooks() -> Self {
        let mock = Self::new();
        mock.state().webhook_verify_mode = WebhookVerifyMode::AlwaysFail;
        mock
    }

    /// Create a mock that only accepts `signature`.
    pub fn requiring_signature(signature: impl Into<String>) -> Self {
        let mock = Self::new();
        mock.state().webhook_verify_mode = WebhookVerifyMode::RequireSignature(signature.into());
        mock
    }

    /// Create a mock with a customer holding one active subscription.
    pub fn with_active_subscription(customer_id: &str, subscription_id: &str) -> Self {
        let mock = Self::new();
        mock.add_customer(Customer {
            id: customer_id.to_string(),
            email: Some("test@example.com".to_string()),
            account_id: None,
        });
        mock.add_subscription(Self::subscription(
            subscription_id,
            customer_id,
            SubscriptionStatus::Active,
        ));
        mock
    }

    /// Build a subscription value.
    pub fn subscription(id: &str, customer_id: &str, status: SubscriptionStatus) -> Subscription {
        Subscription {
            id: id.to_string(),
            customer_id: customer_id.to_string(),
            status,
            price_id: Some("price_mock".to_string()),
        }
    }

    // ════════════════════════════════════════════════════════════════════════════
    // Configuration Methods
    // ════════════════════════════════════════════════════════════════════════════

    /// Add a customer to the "database".
    pub fn add_customer(&self, customer: Customer) {
        let id = customer.id.clone();
        self.state().customers.insert(id, customer);
    }

    /// Add or replace a subscription.
    pub fn add_subscription(&self, subscription: Subscription) {
        let id = subscription.id.clone();
        self.state().subscriptions.insert(id, subscription);
    }

    /// Change the status of a known subscription.
    pub fn set_subscription_status(&self, subscription_id: &str, status: SubscriptionStatus) {
        if let Some(sub) = self.state().subscriptions.get_mut(subscription_id) {
            sub.status = status;
        }
    }

    /// Forget a subscription, as if the provider had purged it.
    pub fn remove_subscription(&self, subscription_id: &str) {
        self.state().subscriptions.remove(subscription_id);
    }

    /// Add or replace a checkout session.
    pub fn add_checkout_session(&self, session: CheckoutSession) {
        let id = session.id.clone();
        self.state().checkout_sessions.insert(id, session);
    }

    /// Mark a checkout session paid and create its active subscription.
    pub fn complete_checkout(&self, session_id: &str, subscription_id: &str) {
        let mut state = self.state();
        let Some(session) = state.checkout_sessions.get_mut(session_id) else {
            return;
        };
        session.status = "complete".to_string();
        session.payment_status = "paid".to_string();
        session.subscription_id = Some(subscription_id.to_string());
        let customer_id = session.customer_id.clone().unwrap_or_default();

        state.subscriptions.insert(
            subscription_id.to_string(),
            Self::subscription(subscription_id, &customer_id, SubscriptionStatus::Active),
        );
    }

    /// Set the webhook event to return on verification.
    pub fn set_webhook_event(&self, event: WebhookEvent) {
        self.state().next_webhook_event = Some(event);
    }

    /// Set an error to return on the next call to any method.
    pub fn set_error(&self, error: PaymentError) {
        self.state().next_error = Some(error);
    }

    /// Set an error for a specific method.
    pub fn set_method_error(&self, method: &str, error: PaymentError) {
        self.state()
            .method_errors
            .insert(method.to_string(), error);
    }

    /// Clear all configured errors.
    pub fn clear_errors(&self) {
        let mut state = self.state();
        state.next_error = None;
        state.method_errors.clear();
    }

    /// Delay every call by `latency`.
    pub fn set_latency(&self, latency: Duration) {
        self.state().latency = Some(latency);
    }

    // ════════════════════════════════════════════════════════════════════════════
    // Call Tracking
    // ════════════════════════════════════════════════════════════════════════════

    /// Get all recorded method calls.
    pub fn calls(&self) -> Vec<MethodCall> {
        self.state().call_log.clone()
    }

    /// Check if a method was called.
    pub fn was_called(&self, method: &str) -> bool {
        self.call_count(method) > 0
    }

    /// Get count of calls to a method.
    pub fn call_count(&self, method: &str) -> usize {
        self.state()
            .call_log
            .iter()
            .filter(|c| c.method == method)
            .count()
    }

    /// Clear the call log.
    pub fn clear_calls(&self) {
        self.state().call_log.clear();
    }

    // ════════════════════════════════════════════════════════════════════════════
    // Internal Helpers
    // ════════════════════════════════════════════════════════════════════════════

    fn state(&self) -> MutexGuard<'_, MockState> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Record the call, wait out any latency, then surface injected errors.
    async fn enter(&self, method: &str, args: Vec<String>) -> Result<(), PaymentError> {
        let latency = {
            let mut state = self.state();
            state.call_log.push(MethodCall {
                method: method.to_string(),
                args,
            });
            state.latency
        };

        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }

        let mut state = self.state();
        if let Some(error) = state.method_errors.get(method) {
            return Err(error.clone());
        }
        if let Some(error) = state.next_error.take() {
            return Err(error);
        }
        Ok(())
    }

    fn generate_id(&self, prefix: &str) -> String {
        let mut state = self.state();
        state.next_id += 1;
        format!("{}_mock_{}", prefix, state.next_id)
    }
}

#[async_trait]
impl PaymentProvider for MockPaymentProvider {
    async fn create_customer(
        &self,
        request: CreateCustomerRequest,
    ) -> Result<Customer, PaymentError> {
        self.enter(
            "create_customer",
            vec![request.account_id.to_string(), request.email.clone()],
        )
        .await?;

        let customer = Customer {
            id: self.generate_id("cus"),
            email: Some(request.email),
            account_id: Some(request.account_id.to_string()),
        };
        self.add_customer(customer.clone());
        Ok(customer)
    }

    async fn get_customer(&self, customer_id: &str) -> Result<Option<Customer>, PaymentError> {
        self.enter("get_customer", vec![customer_id.to_string()])
            .await?;
        Ok(self.state().customers.get(customer_id).cloned())
    }

    async fn get_subscription(
        &self,
        subscription_id: &str,
    ) -> Result<Option<Subscription>, PaymentError> {
        self.enter("get_subscription", vec![subscription_id.to_string()])
            .await?;
        Ok(self.state().subscriptions.get(subscription_id).cloned())
    }

    async fn list_active_subscriptions(
        &self,
        customer_id: &str,
    ) -> Result<Vec<Subscription>, PaymentError> {
        self.enter("list_active_subscriptions", vec![customer_id.to_string()])
            .await?;

        let mut active: Vec<Subscription> = self
            .state()
            .subscriptions
            .values()
            .filter(|s| s.customer_id == customer_id && s.status.is_active())
            .cloned()
            .collect();
        active.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(active)
    }

    async fn get_checkout_session(
        &self,
        session_id: &str,
    ) -> Result<Option<CheckoutSession>, PaymentError> {
        self.enter("get_checkout_session", vec![session_id.to_string()])
            .await?;
        Ok(self.state().checkout_sessions.get(session_id).cloned())
    }

    async fn create_checkout_session(
        &self,
        request: CreateCheckoutRequest,
    ) -> Result<CheckoutRedirect, PaymentError> {
        self.enter(
            "create_checkout_session",
            vec![
                request.account_id.to_string(),
                request.customer_id.clone(),
                request.success_url.clone(),
            ],
        )
        .await?;

        let id = self.generate_id("cs");
        self.add_checkout_session(CheckoutSession {
            id: id.clone(),
            status: "open".to_string(),
            payment_status: "unpaid".to_string(),
            account_id: Some(request.account_id.to_string()),
            customer_id: Some(request.customer_id),
            subscription_id: None,
        });

        Ok(CheckoutRedirect {
            url: format!("https://checkout.stripe.com/c/pay/{}", id),
            session_id: id,
        })
    }

    async fn verify_webhook(
        &self,
        payload: &[u8],
        signature: &str,
    ) -> Result<WebhookEvent, PaymentError> {
        self.enter(
            "verify_webhook",
            vec![
                String::from_utf8_lossy(payload).chars().take(50).collect(),
                signature.chars().take(20).collect(),
            ],
        )
        .await?;

        let state = self.state();

        match &state.webhook_verify_mode {
            WebhookVerifyMode::AcceptAll => {}
            WebhookVerifyMode::RequireSignature(required) => {
                if signature != required {
                    return Err(PaymentError::invalid_signature("Invalid signature"));
                }
            }
            WebhookVerifyMode::AlwaysFail => {
                return Err(PaymentError::invalid_signature("Verification disabled"));
            }
        }

        if let Some(event) = &state.next_webhook_event {
            return Ok(event.clone());
        }
        drop(state);

        decode_event(payload, false)
    }
}

// ════════════════════════════════════════════════════════════════════════════════
// Event Builders
// ════════════════════════════════════════════════════════════════════════════════

impl MockPaymentProvider {
    /// Build a checkout completed webhook event.
    pub fn checkout_completed_event(
        session_id: &str,
        customer_id: &str,
        subscription_id: Option<&str>,
        account_id: &str,
    ) -> WebhookEvent {
        WebhookEvent {
            id: format!("evt_checkout_{}", session_id),
            event_type: WebhookEventType::CheckoutSessionCompleted,
            data: WebhookEventData::Checkout {
                session_id: session_id.to_string(),
                customer_id: Some(customer_id.to_string()),
                subscription_id: subscription_id.map(str::to_string),
                account_id: Some(account_id.to_string()),
            },
            created_at: chrono::Utc::now().timestamp(),
        }
    }

    /// Build a subscription lifecycle event carrying `subscription`.
    pub fn subscription_event(
        event_type: WebhookEventType,
        subscription: Subscription,
    ) -> WebhookEvent {
        WebhookEvent {
            id: format!("evt_{}_{}", event_type.as_str(), subscription.id),
            event_type,
            data: WebhookEventData::Subscription(subscription),
            created_at: chrono::Utc::now().timestamp(),
        }
    }

    /// Build an invoice paid event.
    pub fn invoice_paid_event(customer_id: &str, subscription_id: Option<&str>) -> WebhookEvent {
        WebhookEvent {
            id: format!("evt_invoice_{}", customer_id),
            event_type: WebhookEventType::InvoicePaymentSucceeded,
            data: WebhookEventData::Invoice {
                invoice_id: format!("in_{}", customer_id),
                customer_id: customer_id.to_string(),
                subscription_id: subscription_id.map(str::to_string),
            },
            created_at: chrono::Utc::now().timestamp(),
        }
    }
}

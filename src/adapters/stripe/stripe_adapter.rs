//! Stripe payment provider adapter.
//!
//! Implements the `PaymentProvider` trait against the Stripe REST API:
//! customer and subscription reads for reconciliation, hosted checkout for
//! upgrades, and webhook verification.
//!
//! # Security
//!
//! - HMAC-SHA256 signature verification with constant-time comparison
//! - Timestamp validation (5-minute window) for replay attack prevention
//! - Secrets handled via `secrecy::SecretString`
//!
//! # Configuration
//!
//! ```ignore
//! let config = StripeConfig::new(api_key, webhook_secret, price_id);
//! let adapter = StripePaymentAdapter::new(config);
//! ```

use async_trait::async_trait;
use hmac::{Hmac, Mac};
use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use sha2::Sha256;
use subtle::ConstantTimeEq;

use crate::domain::entitlement::{Subscription, SubscriptionStatus};
use crate::ports::{
    CheckoutRedirect, CheckoutSession, CreateCheckoutRequest, CreateCustomerRequest, Customer,
    PaymentError, PaymentProvider, WebhookEvent, WebhookEventData, WebhookEventType,
};

use super::webhook_types::{
    hex_encode, SignatureHeader, StripeCheckoutSession, StripeCustomer, StripeErrorBody,
    StripeInvoice, StripeList, StripeSubscription, StripeWebhookEvent,
};

type HmacSha256 = Hmac<Sha256>;

/// Maximum age for webhook events (5 minutes).
const MAX_TIMESTAMP_AGE_SECS: i64 = 300;

/// Clock skew tolerance for future timestamps (60 seconds).
const MAX_FUTURE_TOLERANCE_SECS: i64 = 60;

const DEFAULT_API_BASE_URL: &str = "https://api.stripe.com";

/// Stripe API configuration.
#[derive(Clone)]
pub struct StripeConfig {
    /// Stripe secret API key (sk_live_... or sk_test_...).
    api_key: SecretString,

    /// Webhook signing secret (whsec_...).
    webhook_secret: SecretString,

    /// Recurring price sold by hosted checkout.
    price_id: String,

    /// Base URL for Stripe API (default: https://api.stripe.com).
    api_base_url: String,

    /// Whether to reject test-mode events.
    require_livemode: bool,
}

impl StripeConfig {
    /// Create a new Stripe configuration.
    pub fn new(
        api_key: impl Into<String>,
        webhook_secret: impl Into<String>,
        price_id: impl Into<String>,
    ) -> Self {
        Self {
            api_key: SecretString::new(api_key.into()),
            webhook_secret: SecretString::new(webhook_secret.into()),
            price_id: price_id.into(),
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            require_livemode: false,
        }
    }

    /// Set a custom API base URL (for testing).
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.api_base_url = url.into().trim_end_matches('/').to_string();
        self
    }

    /// Require livemode events in production.
    pub fn with_require_livemode(mut self, require: bool) -> Self {
        self.require_livemode = require;
        self
    }
}

impl std::fmt::Debug for StripeConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StripeConfig")
            .field("api_key", &"[REDACTED]")
            .field("webhook_secret", &"[REDACTED]")
            .field("price_id", &self.price_id)
            .field("api_base_url", &self.api_base_url)
            .field("require_livemode", &self.require_livemode)
            .finish()
    }
}

/// Stripe payment provider adapter.
pub struct StripePaymentAdapter {
    config: StripeConfig,
    http_client: reqwest::Client,
}

impl StripePaymentAdapter {
    /// Create a new Stripe adapter with the given configuration.
    pub fn new(config: StripeConfig) -> Self {
        Self {
            config,
            http_client: reqwest::Client::new(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.config.api_base_url, path)
    }

    /// Verify webhook signature using HMAC-SHA256.
    ///
    /// Any `v1` entry may match, so deliveries signed during a secret roll
    /// still verify.
    fn verify_signature(&self, payload: &[u8], header: &SignatureHeader) -> Result<(), PaymentError> {
        let now = chrono::Utc::now().timestamp();
        let age = now - header.timestamp;

        if age > MAX_TIMESTAMP_AGE_SECS {
            tracing::warn!(
                event_timestamp = header.timestamp,
                current_time = now,
                age_secs = age,
                "Webhook event too old - possible replay attack"
            );
            return Err(PaymentError::invalid_signature(format!(
                "Event too old ({} seconds)",
                age
            )));
        }

        if age < -MAX_FUTURE_TOLERANCE_SECS {
            tracing::warn!(
                event_timestamp = header.timestamp,
                current_time = now,
                "Webhook event from future - clock skew or manipulation"
            );
            return Err(PaymentError::invalid_signature("Event timestamp in future"));
        }

        let mut mac =
            HmacSha256::new_from_slice(self.config.webhook_secret.expose_secret().as_bytes())
                .map_err(|e| PaymentError::invalid_signature(format!("Bad signing key: {}", e)))?;
        mac.update(header.timestamp.to_string().as_bytes());
        mac.update(b".");
        mac.update(payload);
        let expected = mac.finalize().into_bytes();
        let expected_bytes: &[u8] = expected.as_slice();

        let matched = header
            .v1_signatures
            .iter()
            .any(|provided| expected_bytes.ct_eq(provided.as_slice()).unwrap_u8() == 1);

        if !matched {
            tracing::warn!(
                candidates = header.v1_signatures.len(),
                "Invalid webhook signature"
            );
            return Err(PaymentError::invalid_signature("Invalid signature"));
        }

        Ok(())
    }

    /// Parse a verified Stripe event into the port's event type.
    fn parse_event(&self, payload: &[u8]) -> Result<WebhookEvent, PaymentError> {
        decode_event(payload, self.config.require_livemode)
    }

    /// GET a Stripe object. A 404 becomes `None`.
    async fn fetch<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, &str)],
    ) -> Result<Option<T>, PaymentError> {
        let response = self
            .http_client
            .get(self.url(path))
            .basic_auth(self.config.api_key.expose_secret(), Option::<&str>::None)
            .query(query)
            .send()
            .await
            .map_err(transport_error)?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }

        read_body(response, path).await.map(Some)
    }

    /// POST a form to Stripe and decode the created object.
    async fn post<T: DeserializeOwned>(
        &self,
        path: &str,
        params: &[(&str, String)],
    ) -> Result<T, PaymentError> {
        let response = self
            .http_client
            .post(self.url(path))
            .basic_auth(self.config.api_key.expose_secret(), Option::<&str>::None)
            .form(params)
            .send()
            .await
            .map_err(transport_error)?;

        read_body(response, path).await
    }
}

/// Decode a Stripe event envelope. Does not check signatures.
pub(crate) fn decode_event(
    payload: &[u8],
    require_livemode: bool,
) -> Result<WebhookEvent, PaymentError> {
    let stripe_event: StripeWebhookEvent = serde_json::from_slice(payload).map_err(|e| {
        tracing::warn!(error = %e, "Failed to parse webhook payload");
        PaymentError::invalid_payload(format!("Invalid JSON: {}", e))
    })?;

    if require_livemode && !stripe_event.livemode {
        tracing::warn!(
            event_id = %stripe_event.id,
            "Rejected test mode event in production"
        );
        return Err(PaymentError::invalid_payload(
            "Test mode events not allowed in production",
        ));
    }

    let event_type = match stripe_event.event_type.as_str() {
        "checkout.session.completed" => WebhookEventType::CheckoutSessionCompleted,
        "customer.subscription.created" => WebhookEventType::SubscriptionCreated,
        "customer.subscription.updated" => WebhookEventType::SubscriptionUpdated,
        "customer.subscription.deleted" => WebhookEventType::SubscriptionDeleted,
        "invoice.payment_succeeded" | "invoice.paid" => WebhookEventType::InvoicePaymentSucceeded,
        other => WebhookEventType::Unknown(other.to_string()),
    };

    let data = extract_event_data(&event_type, &stripe_event)?;

    Ok(WebhookEvent {
        id: stripe_event.id,
        event_type,
        data,
        created_at: stripe_event.created,
    })
}

fn transport_error(err: reqwest::Error) -> PaymentError {
    if err.is_timeout() {
        PaymentError::timeout(err.to_string())
    } else {
        PaymentError::network(err.to_string())
    }
}

async fn read_body<T: DeserializeOwned>(
    response: reqwest::Response,
    path: &str,
) -> Result<T, PaymentError> {
    let status = response.status();
    if !status.is_success() {
        let error_text = response.text().await.unwrap_or_default();
        let message = serde_json::from_str::<StripeErrorBody>(&error_text)
            .map(|body| body.error.message)
            .unwrap_or(error_text);
        tracing::error!(path, status = status.as_u16(), error = %message, "Stripe API call failed");
        return Err(PaymentError::provider(
            status.as_u16(),
            format!("Stripe API error: {}", message),
        ));
    }

    response.json().await.map_err(|e| {
        PaymentError::provider(
            status.as_u16(),
            format!("Failed to parse Stripe response: {}", e),
        )
    })
}

/// Builds `{collection}/{id}`. Stripe ids are `[A-Za-z0-9_]+`; anything
/// else is refused so caller input never reshapes the request path.
fn object_path(collection: &str, id: &str) -> Result<String, PaymentError> {
    let well_formed =
        !id.is_empty() && id.chars().all(|c| c.is_ascii_alphanumeric() || c == '_');
    if !well_formed {
        return Err(PaymentError::invalid_request(format!(
            "Malformed object id: {:?}",
            id
        )));
    }
    Ok(format!("{}/{}", collection, id))
}

fn to_subscription(sub: StripeSubscription) -> Subscription {
    let price_id = sub.price_id();
    Subscription {
        id: sub.id,
        customer_id: sub.customer,
        status: SubscriptionStatus::from_provider(&sub.status),
        price_id,
    }
}

fn to_checkout_session(session: StripeCheckoutSession) -> CheckoutSession {
    let account_id = session.account_reference();
    CheckoutSession {
        id: session.id,
        status: session.status,
        payment_status: session.payment_status,
        account_id,
        customer_id: session.customer,
        subscription_id: session.subscription,
    }
}

fn decode_object<T: DeserializeOwned>(
    event: &StripeWebhookEvent,
    what: &str,
) -> Result<T, PaymentError> {
    serde_json::from_value(event.data.object.clone())
        .map_err(|e| PaymentError::invalid_payload(format!("Invalid {}: {}", what, e)))
}

/// Reduce the event object to the fields reconciliation uses.
fn extract_event_data(
    event_type: &WebhookEventType,
    event: &StripeWebhookEvent,
) -> Result<WebhookEventData, PaymentError> {
    match event_type {
        WebhookEventType::CheckoutSessionCompleted => {
            let session: StripeCheckoutSession = decode_object(event, "checkout session")?;
            let account_id = session.account_reference();
            Ok(WebhookEventData::Checkout {
                session_id: session.id,
                customer_id: session.customer,
                subscription_id: session.subscription,
                account_id,
            })
        }

        WebhookEventType::SubscriptionCreated
        | WebhookEventType::SubscriptionUpdated
        | WebhookEventType::SubscriptionDeleted => {
            let sub: StripeSubscription = decode_object(event, "subscription")?;
            Ok(WebhookEventData::Subscription(to_subscription(sub)))
        }

        WebhookEventType::InvoicePaymentSucceeded => {
            let invoice: StripeInvoice = decode_object(event, "invoice")?;
            let customer_id = invoice
                .customer
                .ok_or_else(|| PaymentError::invalid_payload("Invoice has no customer"))?;
            Ok(WebhookEventData::Invoice {
                invoice_id: invoice.id,
                customer_id,
                subscription_id: invoice.subscription,
            })
        }

        WebhookEventType::Unknown(_) => Ok(WebhookEventData::Raw),
    }
}

#[async_trait]
impl PaymentProvider for StripePaymentAdapter {
    async fn create_customer(
        &self,
        request: CreateCustomerRequest,
    ) -> Result<Customer, PaymentError> {
        let params = vec![
            ("email", request.email.clone()),
            ("metadata[account_id]", request.account_id.to_string()),
        ];

        let customer: StripeCustomer = self.post("/v1/customers", &params).await?;

        tracing::info!(
            customer_id = %customer.id,
            account_id = %request.account_id,
            "Created Stripe customer"
        );

        Ok(Customer {
            id: customer.id,
            email: customer.email.or(Some(request.email)),
            account_id: Some(request.account_id.to_string()),
        })
    }

    async fn get_customer(&self, customer_id: &str) -> Result<Option<Customer>, PaymentError> {
        let path = object_path("/v1/customers", customer_id)?;
        let customer: Option<StripeCustomer> = self.fetch(&path, &[]).await?;

        Ok(customer.filter(|c| !c.deleted).map(|mut c| Customer {
            account_id: c.metadata.remove("account_id"),
            id: c.id,
            email: c.email,
        }))
    }

    async fn get_subscription(
        &self,
        subscription_id: &str,
    ) -> Result<Option<Subscription>, PaymentError> {
        let path = object_path("/v1/subscriptions", subscription_id)?;
        let sub: Option<StripeSubscription> = self.fetch(&path, &[]).await?;
        Ok(sub.map(to_subscription))
    }

    async fn list_active_subscriptions(
        &self,
        customer_id: &str,
    ) -> Result<Vec<Subscription>, PaymentError> {
        let list: Option<StripeList<StripeSubscription>> = self
            .fetch(
                "/v1/subscriptions",
                &[("customer", customer_id), ("status", "active")],
            )
            .await?;

        Ok(list
            .map(|l| l.data.into_iter().map(to_subscription).collect())
            .unwrap_or_default())
    }

    async fn get_checkout_session(
        &self,
        session_id: &str,
    ) -> Result<Option<CheckoutSession>, PaymentError> {
        let path = object_path("/v1/checkout/sessions", session_id)?;
        let session: Option<StripeCheckoutSession> = self.fetch(&path, &[]).await?;
        Ok(session.map(to_checkout_session))
    }

    async fn create_checkout_session(
        &self,
        request: CreateCheckoutRequest,
    ) -> Result<CheckoutRedirect, PaymentError> {
        let params = vec![
            ("mode", "subscription".to_string()),
            ("customer", request.customer_id.clone()),
            ("line_items[0][price]", self.config.price_id.clone()),
            ("line_items[0][quantity]", "1".to_string()),
            ("client_reference_id", request.account_id.to_string()),
            ("metadata[account_id]", request.account_id.to_string()),
            ("success_url", request.success_url),
            ("cancel_url", request.cancel_url),
        ];

        let session: StripeCheckoutSession = self.post("/v1/checkout/sessions", &params).await?;

        let url = session.url.ok_or_else(|| {
            PaymentError::provider(200, "Checkout session returned without a URL")
        })?;

        tracing::info!(
            session_id = %session.id,
            account_id = %request.account_id,
            "Created Stripe checkout session"
        );

        Ok(CheckoutRedirect {
            session_id: session.id,
            url,
        })
    }

    async fn verify_webhook(
        &self,
        payload: &[u8],
        signature: &str,
    ) -> Result<WebhookEvent, PaymentError> {
        let header = SignatureHeader::parse(signature).map_err(|e| {
            tracing::warn!(error = %e, "Failed to parse Stripe-Signature header");
            PaymentError::invalid_signature(e.to_string())
        })?;

        self.verify_signature(payload, &header)?;

        let event = self.parse_event(payload)?;

        tracing::info!(
            event_id = %event.id,
            event_type = event.event_type.as_str(),
            "Webhook signature verified"
        );

        Ok(event)
    }
}

/// Sign a payload the way Stripe does. Used by tests and local tooling.
pub fn sign_payload(secret: &str, timestamp: i64, payload: &[u8]) -> Option<String> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).ok()?;
    mac.update(timestamp.to_string().as_bytes());
    mac.update(b".");
    mac.update(payload);
    Some(format!(
        "t={},v1={}",
        timestamp,
        hex_encode(&mac.finalize().into_bytes())
    ))
}

//! Payment provider port.
//!
//! The engine consumes the provider through this trait only: a handful of
//! reads used for reconciliation, customer and checkout creation for the
//! upgrade flow, and authenticated decoding of push events.
//!
//! One client is built per process and shared as `Arc<dyn PaymentProvider>`.

use crate::domain::entitlement::{EntitlementError, Subscription, WebhookError};
use crate::domain::foundation::{AccountId, DomainError, ErrorCode};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Port for payment provider integrations.
#[async_trait]
pub trait PaymentProvider: Send + Sync {
    /// Create a customer in the payment system.
    async fn create_customer(&self, request: CreateCustomerRequest)
        -> Result<Customer, PaymentError>;

    /// Get customer by provider ID. `None` for unknown or deleted customers.
    async fn get_customer(&self, customer_id: &str) -> Result<Option<Customer>, PaymentError>;

    /// Get subscription by provider ID.
    async fn get_subscription(
        &self,
        subscription_id: &str,
    ) -> Result<Option<Subscription>, PaymentError>;

    /// List a customer's subscriptions that are currently active.
    async fn list_active_subscriptions(
        &self,
        customer_id: &str,
    ) -> Result<Vec<Subscription>, PaymentError>;

    /// Get a checkout session by provider ID.
    async fn get_checkout_session(
        &self,
        session_id: &str,
    ) -> Result<Option<CheckoutSession>, PaymentError>;

    /// Create a hosted subscription checkout.
    async fn create_checkout_session(
        &self,
        request: CreateCheckoutRequest,
    ) -> Result<CheckoutRedirect, PaymentError>;

    /// Authenticate and decode a webhook delivery.
    ///
    /// Implementations must check the signature before parsing anything.
    async fn verify_webhook(
        &self,
        payload: &[u8],
        signature: &str,
    ) -> Result<WebhookEvent, PaymentError>;
}

/// Request to create a provider customer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateCustomerRequest {
    pub account_id: AccountId,
    pub email: String,
}

/// Provider customer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Customer {
    pub id: String,
    pub email: Option<String>,

    /// Account reference stored in the customer's metadata, when present.
    pub account_id: Option<String>,
}

/// Checkout session as reported by the provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckoutSession {
    pub id: String,

    /// `open`, `complete` or `expired`.
    pub status: String,

    /// `paid`, `unpaid` or `no_payment_required`.
    pub payment_status: String,

    /// Account the session was created for (client reference or metadata).
    pub account_id: Option<String>,

    pub customer_id: Option<String>,
    pub subscription_id: Option<String>,
}

impl CheckoutSession {
    /// Whether the provider considers this checkout finished and paid for.
    pub fn is_paid(&self) -> bool {
        self.status == "complete"
            && matches!(self.payment_status.as_str(), "paid" | "no_payment_required")
    }
}

/// Request to create a checkout session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateCheckoutRequest {
    pub account_id: AccountId,
    pub customer_id: String,
    pub success_url: String,
    pub cancel_url: String,
}

/// Where to send the browser to pay.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckoutRedirect {
    pub session_id: String,
    pub url: String,
}

/// Webhook event after signature verification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WebhookEvent {
    /// Provider event ID.
    pub id: String,

    pub event_type: WebhookEventType,

    pub data: WebhookEventData,

    /// Unix timestamp when the provider created the event.
    pub created_at: i64,
}

/// Event types the engine reacts to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WebhookEventType {
    CheckoutSessionCompleted,
    SubscriptionCreated,
    SubscriptionUpdated,
    SubscriptionDeleted,
    InvoicePaymentSucceeded,
    Unknown(String),
}

impl WebhookEventType {
    pub fn as_str(&self) -> &str {
        match self {
            WebhookEventType::CheckoutSessionCompleted => "checkout.session.completed",
            WebhookEventType::SubscriptionCreated => "customer.subscription.created",
            WebhookEventType::SubscriptionUpdated => "customer.subscription.updated",
            WebhookEventType::SubscriptionDeleted => "customer.subscription.deleted",
            WebhookEventType::InvoicePaymentSucceeded => "invoice.payment_succeeded",
            WebhookEventType::Unknown(other) => other,
        }
    }
}

/// Event payload, reduced to the fields reconciliation uses.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WebhookEventData {
    Checkout {
        session_id: String,
        customer_id: Option<String>,
        subscription_id: Option<String>,
        account_id: Option<String>,
    },
    Subscription(Subscription),
    Invoice {
        invoice_id: String,
        customer_id: String,
        subscription_id: Option<String>,
    },
    Raw,
}

/// Payment provider error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaymentError {
    pub code: PaymentErrorCode,
    pub message: String,
    pub retryable: bool,
}

impl PaymentError {
    /// Create a new payment error. Retryability follows the code.
    pub fn new(code: PaymentErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            retryable: code.is_retryable(),
        }
    }

    /// Create a network error.
    pub fn network(message: impl Into<String>) -> Self {
        Self::new(PaymentErrorCode::NetworkError, message)
    }

    /// Create a timeout error.
    pub fn timeout(message: impl Into<String>) -> Self {
        Self::new(PaymentErrorCode::Timeout, message)
    }

    /// Create a provider-side error. 5xx responses are retryable.
    pub fn provider(status: u16, message: impl Into<String>) -> Self {
        let code = match status {
            401 | 403 => PaymentErrorCode::AuthenticationError,
            404 => PaymentErrorCode::NotFound,
            429 => PaymentErrorCode::RateLimitExceeded,
            _ => PaymentErrorCode::ProviderError,
        };
        let mut err = Self::new(code, message);
        err.retryable = err.retryable || status >= 500;
        err
    }

    /// Create an invalid signature error.
    pub fn invalid_signature(message: impl Into<String>) -> Self {
        Self::new(PaymentErrorCode::InvalidSignature, message)
    }

    /// Create an invalid payload error.
    pub fn invalid_payload(message: impl Into<String>) -> Self {
        Self::new(PaymentErrorCode::InvalidPayload, message)
    }

    /// Create an error for a request that was never sent.
    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::new(PaymentErrorCode::InvalidRequest, message)
    }

    pub fn is_retryable(&self) -> bool {
        self.retryable
    }
}

impl std::fmt::Display for PaymentError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.code, self.message)
    }
}

impl std::error::Error for PaymentError {}

impl From<PaymentError> for DomainError {
    fn from(err: PaymentError) -> Self {
        let code = match err.code {
            PaymentErrorCode::NotFound => ErrorCode::NotFound,
            PaymentErrorCode::InvalidSignature
            | PaymentErrorCode::InvalidPayload
            | PaymentErrorCode::InvalidRequest => ErrorCode::ValidationFailed,
            _ => ErrorCode::ExternalServiceError,
        };
        DomainError::new(code, err.message)
    }
}

impl From<PaymentError> for EntitlementError {
    fn from(err: PaymentError) -> Self {
        if err.is_retryable() {
            EntitlementError::ProviderUnavailable(err.to_string())
        } else {
            EntitlementError::Provider(err.to_string())
        }
    }
}

impl From<PaymentError> for WebhookError {
    fn from(err: PaymentError) -> Self {
        match err.code {
            PaymentErrorCode::InvalidSignature => WebhookError::InvalidSignature(err.message),
            PaymentErrorCode::InvalidPayload => WebhookError::ParseError(err.message),
            _ if err.is_retryable() => WebhookError::ProviderUnavailable(err.to_string()),
            _ => WebhookError::Provider(err.to_string()),
        }
    }
}

/// Payment error codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentErrorCode {
    /// Network connectivity issue.
    NetworkError,

    /// Round-trip exceeded its deadline.
    Timeout,

    /// Too many requests.
    RateLimitExceeded,

    /// API key rejected.
    AuthenticationError,

    /// Referenced object does not exist.
    NotFound,

    /// Webhook signature missing, stale or wrong.
    InvalidSignature,

    /// Webhook body could not be decoded.
    InvalidPayload,

    /// Request rejected before reaching the provider.
    InvalidRequest,

    /// Any other provider failure.
    ProviderError,
}

impl PaymentErrorCode {
    /// Check if this error type is typically retryable.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            PaymentErrorCode::NetworkError
                | PaymentErrorCode::Timeout
                | PaymentErrorCode::RateLimitExceeded
        )
    }
}

impl std::fmt::Display for PaymentErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            PaymentErrorCode::NetworkError => "network_error",
            PaymentErrorCode::Timeout => "timeout",
            PaymentErrorCode::RateLimitExceeded => "rate_limit_exceeded",
            PaymentErrorCode::AuthenticationError => "authentication_error",
            PaymentErrorCode::NotFound => "not_found",
            PaymentErrorCode::InvalidSignature => "invalid_signature",
            PaymentErrorCode::InvalidPayload => "invalid_payload",
            PaymentErrorCode::InvalidRequest => "invalid_request",
            PaymentErrorCode::ProviderError => "provider_error",
        };
        write!(f, "{}", s)
    }
}

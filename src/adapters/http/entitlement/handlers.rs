//! HTTP handlers for entitlement endpoints.
//!
//! These handlers connect Axum routes to application layer command/query handlers.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::extract::{FromRequestParts, Json, State};
use axum::http::request::Parts;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};

use crate::application::{
    ActivateAfterCheckoutCommand, ActivateAfterCheckoutHandler, ConfirmCheckoutCommand,
    ConfirmCheckoutHandler, CreateEntitlementCommand, CreateEntitlementHandler, EntitlementGate,
    HandleProviderWebhookCommand, HandleProviderWebhookHandler, ReconcileIfStaleHandler,
    StartCheckoutCommand, StartCheckoutHandler, VerifySubscriptionCommand,
    VerifySubscriptionHandler,
};
use crate::domain::entitlement::{
    EntitlementError, EntitlementPolicy, EntitlementSnapshot, WebhookError,
};
use crate::domain::foundation::AccountId;
use crate::ports::{Clock, EntitlementStore, PaymentProvider};

use super::dto::{
    AccessResponse, CheckoutResponse, CheckoutSuccessRequest, ConfirmCheckoutRequest,
    ConfirmCheckoutResponse, CreateEntitlementRequest, EntitlementResponse,
    EntitlementSnapshotResponse, ErrorResponse, HealthResponse, StartCheckoutRequest,
    WebhookAckResponse,
};

/// Header carrying the account id established by the upstream identity layer.
pub const ACCOUNT_ID_HEADER: &str = "X-Account-Id";

/// Header carrying the Stripe webhook signature.
pub const STRIPE_SIGNATURE_HEADER: &str = "Stripe-Signature";

// ════════════════════════════════════════════════════════════════════════════════
// Application State
// ════════════════════════════════════════════════════════════════════════════════

/// Shared application state containing all dependencies.
///
/// This struct is cloned for each request and contains Arc-wrapped dependencies
/// for efficient sharing across handlers.
#[derive(Clone)]
pub struct EntitlementAppState {
    pub store: Arc<dyn EntitlementStore>,
    pub payment_provider: Arc<dyn PaymentProvider>,
    pub clock: Arc<dyn Clock>,
    pub policy: EntitlementPolicy,
    pub provider_timeout: Duration,
}

impl EntitlementAppState {
    pub fn new(
        store: Arc<dyn EntitlementStore>,
        payment_provider: Arc<dyn PaymentProvider>,
        clock: Arc<dyn Clock>,
        policy: EntitlementPolicy,
        provider_timeout: Duration,
    ) -> Self {
        Self {
            store,
            payment_provider,
            clock,
            policy,
            provider_timeout,
        }
    }

    /// Create handlers on demand from the shared state.
    pub fn create_entitlement_handler(&self) -> CreateEntitlementHandler {
        CreateEntitlementHandler::new(self.store.clone(), self.clock.clone(), self.policy)
    }

    pub fn start_checkout_handler(&self) -> StartCheckoutHandler {
        StartCheckoutHandler::new(
            self.store.clone(),
            self.payment_provider.clone(),
            self.provider_timeout,
        )
    }

    pub fn activate_after_checkout_handler(&self) -> ActivateAfterCheckoutHandler {
        ActivateAfterCheckoutHandler::new(self.store.clone(), self.clock.clone())
    }

    pub fn confirm_checkout_handler(&self) -> ConfirmCheckoutHandler {
        ConfirmCheckoutHandler::new(
            self.store.clone(),
            self.payment_provider.clone(),
            self.clock.clone(),
            self.provider_timeout,
        )
    }

    pub fn webhook_handler(&self) -> HandleProviderWebhookHandler {
        HandleProviderWebhookHandler::new(
            self.store.clone(),
            self.payment_provider.clone(),
            self.clock.clone(),
            self.provider_timeout,
        )
    }

    pub fn verify_subscription_handler(&self) -> VerifySubscriptionHandler {
        VerifySubscriptionHandler::new(
            self.store.clone(),
            self.payment_provider.clone(),
            self.clock.clone(),
            self.provider_timeout,
        )
    }

    pub fn reconcile_handler(&self) -> ReconcileIfStaleHandler {
        ReconcileIfStaleHandler::new(
            self.store.clone(),
            Arc::new(self.verify_subscription_handler()),
            self.clock.clone(),
            self.policy,
        )
    }

    pub fn gate(&self) -> EntitlementGate {
        EntitlementGate::new(
            Arc::new(self.reconcile_handler()),
            self.store.clone(),
            self.clock.clone(),
        )
    }
}

// ════════════════════════════════════════════════════════════════════════════════
// Account Context
// ════════════════════════════════════════════════════════════════════════════════

/// Account the request acts for.
///
/// Identity is established upstream; this service trusts the
/// `X-Account-Id` header set by the gateway.
#[derive(Debug, Clone)]
pub struct AuthenticatedAccount {
    pub account_id: AccountId,
}

/// Rejection type for AuthenticatedAccount extraction.
pub struct AuthenticationRequired;

impl IntoResponse for AuthenticationRequired {
    fn into_response(self) -> Response {
        let error = ErrorResponse::new("AUTHENTICATION_REQUIRED", "Authentication is required");
        (StatusCode::UNAUTHORIZED, Json(error)).into_response()
    }
}

impl AuthenticatedAccount {
    /// Reads the account from request headers.
    pub fn from_headers(headers: &HeaderMap) -> Option<Self> {
        headers
            .get(ACCOUNT_ID_HEADER)
            .and_then(|v| v.to_str().ok())
            .and_then(|s| AccountId::new(s.trim()).ok())
            .map(|account_id| AuthenticatedAccount { account_id })
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for AuthenticatedAccount
where
    S: Send + Sync,
{
    type Rejection = AuthenticationRequired;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Self::from_headers(&parts.headers).ok_or(AuthenticationRequired)
    }
}

// ════════════════════════════════════════════════════════════════════════════════
// Query Handlers (GET endpoints)
// ════════════════════════════════════════════════════════════════════════════════

/// GET /api/entitlements - Reconciled snapshot for the caller
pub async fn get_entitlement(
    State(state): State<EntitlementAppState>,
    account: AuthenticatedAccount,
) -> Result<impl IntoResponse, EntitlementApiError> {
    let snapshot: EntitlementSnapshot = state.gate().snapshot(&account.account_id).await?;
    Ok(Json(EntitlementSnapshotResponse::from(snapshot)))
}

/// GET /api/entitlements/access - Gate decision for the caller
pub async fn check_access(
    State(state): State<EntitlementAppState>,
    account: AuthenticatedAccount,
) -> impl IntoResponse {
    let entitled = state.gate().is_entitled(&account.account_id).await;
    Json(AccessResponse { entitled })
}

/// GET /health - Liveness probe
pub async fn health() -> impl IntoResponse {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

// ════════════════════════════════════════════════════════════════════════════════
// Command Handlers (POST endpoints)
// ════════════════════════════════════════════════════════════════════════════════

/// POST /api/entitlements - Provision the caller's record
pub async fn create_entitlement(
    State(state): State<EntitlementAppState>,
    account: AuthenticatedAccount,
    Json(request): Json<CreateEntitlementRequest>,
) -> Result<impl IntoResponse, EntitlementApiError> {
    let handler = state.create_entitlement_handler();
    let cmd = CreateEntitlementCommand {
        account_id: account.account_id,
        intent: request.intent,
    };

    let record = handler.handle(cmd).await?;

    Ok((StatusCode::CREATED, Json(EntitlementResponse::from(record))))
}

/// POST /api/entitlements/checkout - Start a hosted checkout
pub async fn start_checkout(
    State(state): State<EntitlementAppState>,
    account: AuthenticatedAccount,
    Json(request): Json<StartCheckoutRequest>,
) -> Result<impl IntoResponse, EntitlementApiError> {
    let handler = state.start_checkout_handler();
    let cmd = StartCheckoutCommand {
        account_id: account.account_id,
        email: request.email,
        success_url: request.success_url,
        cancel_url: request.cancel_url,
    };

    let result = handler.handle(cmd).await?;

    Ok((StatusCode::CREATED, Json(CheckoutResponse::from(result))))
}

/// POST /api/entitlements/checkout/success - Optimistic activation on redirect
pub async fn checkout_success(
    State(state): State<EntitlementAppState>,
    account: AuthenticatedAccount,
    body: Option<Json<CheckoutSuccessRequest>>,
) -> Result<impl IntoResponse, EntitlementApiError> {
    let request = body.map(|Json(r)| r).unwrap_or_default();
    let handler = state.activate_after_checkout_handler();
    let cmd = ActivateAfterCheckoutCommand {
        account_id: account.account_id,
        session_id: request.session_id,
    };

    let record = handler.handle(cmd).await?;
    let snapshot = EntitlementSnapshot::of(&record, state.clock.now());

    Ok(Json(EntitlementSnapshotResponse::from(snapshot)))
}

/// POST /api/entitlements/checkout/confirm - Poll the provider for payment
pub async fn confirm_checkout(
    State(state): State<EntitlementAppState>,
    account: AuthenticatedAccount,
    Json(request): Json<ConfirmCheckoutRequest>,
) -> Result<impl IntoResponse, EntitlementApiError> {
    let handler = state.confirm_checkout_handler();
    let cmd = ConfirmCheckoutCommand {
        account_id: account.account_id,
        session_id: request.session_id,
    };

    let result = handler.handle(cmd).await?;

    Ok(Json(ConfirmCheckoutResponse::from(result)))
}

/// POST /api/entitlements/verify - Force a provider re-check
pub async fn verify_subscription(
    State(state): State<EntitlementAppState>,
    account: AuthenticatedAccount,
) -> Result<impl IntoResponse, EntitlementApiError> {
    let handler = state.verify_subscription_handler();
    let cmd = VerifySubscriptionCommand {
        account_id: account.account_id,
    };

    let record = handler.handle(cmd).await?;
    let snapshot = EntitlementSnapshot::of(&record, state.clock.now());

    Ok(Json(EntitlementSnapshotResponse::from(snapshot)))
}

/// POST /api/webhooks/stripe - Handle Stripe webhook events
pub async fn handle_stripe_webhook(
    State(state): State<EntitlementAppState>,
    headers: HeaderMap,
    body: axum::body::Bytes,
) -> Result<impl IntoResponse, WebhookApiError> {
    let signature = headers
        .get(STRIPE_SIGNATURE_HEADER)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| {
            WebhookError::InvalidSignature("Missing Stripe-Signature header".to_string())
        })?;

    let handler = state.webhook_handler();
    let cmd = HandleProviderWebhookCommand {
        payload: body.to_vec(),
        signature: signature.to_string(),
    };

    let result = handler.handle(cmd).await?;

    Ok(Json(WebhookAckResponse::from(result)))
}

// ════════════════════════════════════════════════════════════════════════════════
// Error Handling
// ════════════════════════════════════════════════════════════════════════════════

/// API error type that converts domain errors to HTTP responses.
#[derive(Debug)]
pub struct EntitlementApiError(EntitlementError);

impl From<EntitlementError> for EntitlementApiError {
    fn from(err: EntitlementError) -> Self {
        Self(err)
    }
}

impl IntoResponse for EntitlementApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            EntitlementError::NotFound(_) | EntitlementError::CheckoutSessionNotFound(_) => {
                StatusCode::NOT_FOUND
            }
            EntitlementError::AlreadyExists(_) | EntitlementError::InvalidTransition(_) => {
                StatusCode::CONFLICT
            }
            EntitlementError::CheckoutSessionNotOwned(_) => StatusCode::FORBIDDEN,
            EntitlementError::ProviderUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            EntitlementError::Provider(_) => StatusCode::BAD_GATEWAY,
            EntitlementError::ValidationFailed { .. } => StatusCode::BAD_REQUEST,
            EntitlementError::Infrastructure(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        if status.is_server_error() {
            tracing::error!(error = %self.0, "Request failed");
        }

        let body = match &self.0 {
            EntitlementError::ValidationFailed { field, message } => ErrorResponse::with_details(
                self.0.code().to_string(),
                message.clone(),
                serde_json::json!({ "field": field }),
            ),
            err => ErrorResponse::new(err.code().to_string(), err.message()),
        };
        (status, Json(body)).into_response()
    }
}

/// Webhook error response. The status code drives provider redelivery.
#[derive(Debug)]
pub struct WebhookApiError(WebhookError);

impl From<WebhookError> for WebhookApiError {
    fn from(err: WebhookError) -> Self {
        Self(err)
    }
}

impl IntoResponse for WebhookApiError {
    fn into_response(self) -> Response {
        let code = match &self.0 {
            WebhookError::InvalidSignature(_) => "INVALID_WEBHOOK_SIGNATURE",
            WebhookError::ParseError(_) | WebhookError::MissingField(_) => "INVALID_PAYLOAD",
            WebhookError::ProviderUnavailable(_) | WebhookError::Provider(_) => {
                "EXTERNAL_SERVICE_ERROR"
            }
            WebhookError::InvalidTransition(_) => "INVALID_STATE_TRANSITION",
            WebhookError::Database(_) => "DATABASE_ERROR",
        };
        let body = ErrorResponse::new(code, self.0.to_string());
        (self.0.status_code(), Json(body)).into_response()
    }
}

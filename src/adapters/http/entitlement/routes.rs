//! Axum router configuration for entitlement endpoints.
//!
//! This module defines the route structure for entitlement-related API endpoints
//! and wires them to their corresponding handlers.

use axum::{
    routing::{get, post},
    Router,
};

use super::handlers::{
    check_access, checkout_success, confirm_checkout, create_entitlement, get_entitlement,
    handle_stripe_webhook, health, start_checkout, verify_subscription, EntitlementAppState,
};

/// Create the entitlement API router.
///
/// # Routes (require `X-Account-Id`)
/// - `GET /` - Reconciled snapshot
/// - `POST /` - Provision the record
/// - `GET /access` - Gate decision
/// - `POST /checkout` - Start a hosted checkout
/// - `POST /checkout/success` - Optimistic activation after redirect
/// - `POST /checkout/confirm` - Poll the provider for payment
/// - `POST /verify` - Force a provider re-check
pub fn entitlement_routes() -> Router<EntitlementAppState> {
    Router::new()
        .route("/", get(get_entitlement).post(create_entitlement))
        .route("/access", get(check_access))
        .route("/checkout", post(start_checkout))
        .route("/checkout/success", post(checkout_success))
        .route("/checkout/confirm", post(confirm_checkout))
        .route("/verify", post(verify_subscription))
}

/// Create the Stripe webhook router.
///
/// Separate from the entitlement routes because webhooks carry no account
/// header; they are authenticated by signature.
pub fn webhook_routes() -> Router<EntitlementAppState> {
    Router::new().route("/stripe", post(handle_stripe_webhook))
}

/// Create the complete entitlement router.
///
/// Mounts `/api/entitlements`, `/api/webhooks` and `/health`.
///
/// # Example
///
/// ```ignore
/// let app = entitlement_router().with_state(state);
/// ```
pub fn entitlement_router() -> Router<EntitlementAppState> {
    Router::new()
        .nest("/api/entitlements", entitlement_routes())
        .nest("/api/webhooks", webhook_routes())
        .route("/health", get(health))
}

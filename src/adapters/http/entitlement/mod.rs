//! HTTP adapter for entitlement endpoints.
//!
//! Exposes the entitlement engine via REST API:
//! - `GET /api/entitlements` - Reconciled snapshot for the caller
//! - `POST /api/entitlements` - Provision the caller's record
//! - `GET /api/entitlements/access` - Gate decision
//! - `POST /api/entitlements/checkout` - Start a hosted checkout
//! - `POST /api/entitlements/checkout/success` - Optimistic activation
//! - `POST /api/entitlements/checkout/confirm` - Poll for payment confirmation
//! - `POST /api/entitlements/verify` - Force a provider re-check
//! - `POST /api/webhooks/stripe` - Handle Stripe webhooks
//! - `GET /health` - Liveness probe

pub mod dto;
pub mod handlers;
pub mod routes;

pub use dto::*;
pub use handlers::{
    AuthenticatedAccount, EntitlementApiError, EntitlementAppState, WebhookApiError,
    ACCOUNT_ID_HEADER, STRIPE_SIGNATURE_HEADER,
};
pub use routes::{entitlement_router, entitlement_routes, webhook_routes};

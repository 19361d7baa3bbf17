//! HTTP adapters - REST API implementations.
//!
//! `build_app` assembles the full service: entitlement routes, webhooks and
//! the health probe, wrapped in the request-scoped layers.

pub mod entitlement;
pub mod middleware;

use std::time::Duration;

use axum::Router;
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

// Re-export key types for convenience
pub use entitlement::{entitlement_router, AuthenticatedAccount, EntitlementAppState};
pub use middleware::require_entitlement;

/// Builds the service router with its middleware stack.
///
/// Layers, outermost first: HTTP tracing, request id, request timeout.
pub fn build_app(state: EntitlementAppState, request_timeout: Duration) -> Router {
    entitlement_router()
        .with_state(state)
        .layer(TimeoutLayer::new(request_timeout))
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(TraceLayer::new_for_http())
}

//! Entitlement guard middleware for paid routes.
//!
//! ```text
//! Request → require_entitlement → gate.is_entitled(account)
//!                                      ↓ true        ↓ false
//!                                   Handler      402 Payment Required
//! ```
//!
//! # Example
//!
//! ```ignore
//! use axum::{Router, routing::get, middleware};
//!
//! let paid = Router::new()
//!     .route("/api/reports", get(reports))
//!     .layer(middleware::from_fn_with_state(state.clone(), require_entitlement));
//! ```

use axum::{
    extract::{Request, State},
    http::StatusCode,
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};

use crate::adapters::http::entitlement::{AuthenticatedAccount, EntitlementAppState, ErrorResponse};
use crate::domain::foundation::ErrorCode;

/// Rejects requests from accounts without paid entitlement.
///
/// Missing account header gives 401. The gate reconciles before
/// answering and denies when the record cannot be read.
pub async fn require_entitlement(
    State(state): State<EntitlementAppState>,
    request: Request,
    next: Next,
) -> Response {
    let Some(account) = AuthenticatedAccount::from_headers(request.headers()) else {
        let body = ErrorResponse::new("AUTHENTICATION_REQUIRED", "Authentication is required");
        return (StatusCode::UNAUTHORIZED, Json(body)).into_response();
    };

    if state.gate().is_entitled(&account.account_id).await {
        return next.run(request).await;
    }

    tracing::debug!(account_id = %account.account_id, "Paid route denied");
    let body = ErrorResponse::new(
        ErrorCode::PaymentRequired.to_string(),
        "An active subscription or trial is required",
    );
    (StatusCode::PAYMENT_REQUIRED, Json(body)).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;

    use axum::body::Body;
    use axum::http::Request as HttpRequest;
    use axum::routing::get;
    use axum::{middleware, Router};
    use tower::ServiceExt;

    use crate::adapters::{FixedClock, InMemoryEntitlementStore, MockPaymentProvider};
    use crate::domain::entitlement::{
        CreationIntent, EntitlementPolicy, EntitlementRecord, Plan,
    };
    use crate::domain::foundation::{AccountId, Timestamp};

    fn now() -> Timestamp {
        Timestamp::from_unix_secs(1_750_000_000).unwrap()
    }

    fn record(id: &str, plan: Plan) -> EntitlementRecord {
        let mut record = EntitlementRecord::provision(
            AccountId::new(id).unwrap(),
            CreationIntent::Trial,
            now().minus_days(1),
            &EntitlementPolicy::default(),
        );
        record.plan = plan;
        record
    }

    fn app(records: Vec<EntitlementRecord>) -> Router {
        let state = EntitlementAppState::new(
            Arc::new(InMemoryEntitlementStore::with_records(records)),
            Arc::new(MockPaymentProvider::new()),
            Arc::new(FixedClock::new(now())),
            EntitlementPolicy::default(),
            Duration::from_secs(10),
        );
        Router::new()
            .route("/paid", get(|| async { "ok" }))
            .layer(middleware::from_fn_with_state(state, require_entitlement))
    }

    async fn call(app: Router, account: Option<&str>) -> StatusCode {
        let mut builder = HttpRequest::builder().uri("/paid");
        if let Some(account) = account {
            builder = builder.header("X-Account-Id", account);
        }
        app.oneshot(builder.body(Body::empty()).unwrap())
            .await
            .unwrap()
            .status()
    }

    #[tokio::test]
    async fn trial_account_passes() {
        let status = call(app(vec![record("acct-a", Plan::Trial)]), Some("acct-a")).await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn lapsed_account_gets_payment_required() {
        let status = call(app(vec![record("acct-a", Plan::Free)]), Some("acct-a")).await;
        assert_eq!(status, StatusCode::PAYMENT_REQUIRED);
    }

    #[tokio::test]
    async fn unknown_account_gets_payment_required() {
        let status = call(app(vec![]), Some("ghost")).await;
        assert_eq!(status, StatusCode::PAYMENT_REQUIRED);
    }

    #[tokio::test]
    async fn anonymous_request_is_unauthorized() {
        let status = call(app(vec![]), None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }
}

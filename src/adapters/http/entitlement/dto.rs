//! HTTP DTOs (Data Transfer Objects) for entitlement endpoints.
//!
//! These types define the JSON request/response structure for the entitlement API.
//! They serve as the boundary between HTTP and the application layer.

use serde::{Deserialize, Serialize};

use crate::application::{ConfirmCheckoutResult, HandleProviderWebhookResult, StartCheckoutResult};
use crate::domain::entitlement::{CreationIntent, EntitlementRecord, EntitlementSnapshot, Plan};

// ════════════════════════════════════════════════════════════════════════════════
// Request DTOs
// ════════════════════════════════════════════════════════════════════════════════

/// Request to provision the caller's entitlement record.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CreateEntitlementRequest {
    /// `standard` (default) or `trial`.
    #[serde(default)]
    pub intent: CreationIntent,
}

/// Request to start a hosted checkout.
#[derive(Debug, Clone, Deserialize)]
pub struct StartCheckoutRequest {
    /// Email for the provider customer.
    pub email: String,
    /// URL to redirect after successful checkout.
    pub success_url: String,
    /// URL to redirect after cancelled checkout.
    pub cancel_url: String,
}

/// Body of the checkout-success redirect callback.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CheckoutSuccessRequest {
    #[serde(default)]
    pub session_id: Option<String>,
}

/// Request to confirm a checkout session by polling the provider.
#[derive(Debug, Clone, Deserialize)]
pub struct ConfirmCheckoutRequest {
    pub session_id: String,
}

// ════════════════════════════════════════════════════════════════════════════════
// Response DTOs
// ════════════════════════════════════════════════════════════════════════════════

/// What the UI needs for banners and upgrade prompts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntitlementSnapshotResponse {
    pub plan: Plan,
    /// End of the trial (ISO 8601).
    pub trial_ends_at: Option<String>,
    pub trial_ending_soon: bool,
    pub provider_subscription_status: Option<String>,
    pub entitled: bool,
}

impl From<EntitlementSnapshot> for EntitlementSnapshotResponse {
    fn from(snapshot: EntitlementSnapshot) -> Self {
        Self {
            plan: snapshot.plan,
            trial_ends_at: snapshot.trial_ends_at.map(|t| t.to_rfc3339()),
            trial_ending_soon: snapshot.trial_ending_soon,
            provider_subscription_status: snapshot.provider_subscription_status,
            entitled: snapshot.entitled,
        }
    }
}

/// Full record view returned after provisioning.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntitlementResponse {
    pub account_id: String,
    pub plan: Plan,
    pub trial_ends_at: Option<String>,
    pub trial_ending_soon: bool,
    pub provider_subscription_status: Option<String>,
    pub verified_at: Option<String>,
    pub account_created_at: String,
}

impl From<EntitlementRecord> for EntitlementResponse {
    fn from(record: EntitlementRecord) -> Self {
        Self {
            account_id: record.account_id.to_string(),
            plan: record.plan,
            trial_ends_at: record.trial_ends_at.map(|t| t.to_rfc3339()),
            trial_ending_soon: record.trial_ending_soon,
            provider_subscription_status: record.provider_subscription_status,
            verified_at: record.verified_at.map(|t| t.to_rfc3339()),
            account_created_at: record.account_created_at.to_rfc3339(),
        }
    }
}

/// Response for the gate check.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccessResponse {
    pub entitled: bool,
}

/// Response for a started checkout.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckoutResponse {
    pub session_id: String,
    /// Hosted payment page the browser should be sent to.
    pub checkout_url: String,
}

impl From<StartCheckoutResult> for CheckoutResponse {
    fn from(result: StartCheckoutResult) -> Self {
        Self {
            session_id: result.session_id,
            checkout_url: result.checkout_url,
        }
    }
}

/// Response for a checkout confirmation poll.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfirmCheckoutResponse {
    pub activated: bool,
    pub plan: Plan,
    pub provider_subscription_status: Option<String>,
}

impl From<ConfirmCheckoutResult> for ConfirmCheckoutResponse {
    fn from(result: ConfirmCheckoutResult) -> Self {
        Self {
            activated: result.activated,
            plan: result.plan,
            provider_subscription_status: result.provider_subscription_status,
        }
    }
}

/// Acknowledgement returned to the payment provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebhookAckResponse {
    pub received: bool,
    pub event_id: String,
    /// `applied` or `ignored`.
    pub outcome: String,
}

impl From<HandleProviderWebhookResult> for WebhookAckResponse {
    fn from(result: HandleProviderWebhookResult) -> Self {
        let outcome = match &result {
            HandleProviderWebhookResult::Applied { .. } => "applied",
            HandleProviderWebhookResult::Ignored { .. } => "ignored",
        };
        Self {
            received: true,
            event_id: result.event_id().to_string(),
            outcome: outcome.to_string(),
        }
    }
}

/// Liveness probe body.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

/// Standard error response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Error code for programmatic handling.
    pub error_code: String,
    /// Human-readable error message.
    pub message: String,
    /// Additional details (optional).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl ErrorResponse {
    /// Create a new error response.
    pub fn new(error_code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            error_code: error_code.into(),
            message: message.into(),
            details: None,
        }
    }

    /// Create an error response with details.
    pub fn with_details(
        error_code: impl Into<String>,
        message: impl Into<String>,
        details: serde_json::Value,
    ) -> Self {
        Self {
            error_code: error_code.into(),
            message: message.into(),
            details: Some(details),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::foundation::Timestamp;

    #[test]
    fn create_request_defaults_to_standard() {
        let request: CreateEntitlementRequest = serde_json::from_str("{}").unwrap();
        assert_eq!(request.intent, CreationIntent::Standard);

        let request: CreateEntitlementRequest =
            serde_json::from_str(r#"{"intent":"trial"}"#).unwrap();
        assert_eq!(request.intent, CreationIntent::Trial);
    }

    #[test]
    fn snapshot_serializes_plan_in_snake_case() {
        let snapshot = EntitlementSnapshot {
            plan: Plan::Trial,
            trial_ends_at: Timestamp::from_unix_secs(0),
            trial_ending_soon: true,
            provider_subscription_status: None,
            entitled: true,
        };

        let json = serde_json::to_value(EntitlementSnapshotResponse::from(snapshot)).unwrap();

        assert_eq!(json["plan"], "trial");
        assert_eq!(json["trial_ends_at"], "1970-01-01T00:00:00+00:00");
        assert_eq!(json["trial_ending_soon"], true);
    }

    #[test]
    fn webhook_ack_reports_outcome() {
        let ack = WebhookAckResponse::from(HandleProviderWebhookResult::Ignored {
            event_id: "evt_1".into(),
            reason: "Unhandled event type".into(),
        });
        assert!(ack.received);
        assert_eq!(ack.outcome, "ignored");
        assert_eq!(ack.event_id, "evt_1");
    }

    #[test]
    fn error_response_omits_empty_details() {
        let json = serde_json::to_value(ErrorResponse::new("NOT_FOUND", "missing")).unwrap();
        assert!(json.get("details").is_none());

        let with = ErrorResponse::with_details(
            "VALIDATION_FAILED",
            "bad",
            serde_json::json!({"field": "email"}),
        );
        assert_eq!(with.details.unwrap()["field"], "email");
    }
}

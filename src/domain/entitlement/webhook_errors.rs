//! Webhook error types for provider push events.
//!
//! Status codes drive the provider's redelivery: 2xx acknowledges, 4xx is a
//! permanent rejection, 5xx asks for the event to be sent again.

use axum::http::StatusCode;
use thiserror::Error;

/// Errors that occur during webhook processing.
#[derive(Debug, Error)]
pub enum WebhookError {
    /// Signature header missing, malformed, stale or not matching.
    #[error("Invalid signature: {0}")]
    InvalidSignature(String),

    /// Payload could not be decoded.
    #[error("Parse error: {0}")]
    ParseError(String),

    /// Required field missing from the payload.
    #[error("Missing field: {0}")]
    MissingField(&'static str),

    /// Provider round-trip failed transiently; redelivery may succeed.
    #[error("Provider unavailable: {0}")]
    ProviderUnavailable(String),

    /// Provider rejected the round-trip.
    #[error("Provider error: {0}")]
    Provider(String),

    /// The computed patch was refused by the plan state machine.
    #[error("Invalid state transition: {0}")]
    InvalidTransition(String),

    /// Record store failed.
    #[error("Database error: {0}")]
    Database(String),
}

impl WebhookError {
    /// Returns true if the provider should redeliver this event.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            WebhookError::ProviderUnavailable(_) | WebhookError::Database(_)
        )
    }

    /// Maps the error to the HTTP status returned to the provider.
    pub fn status_code(&self) -> StatusCode {
        match self {
            WebhookError::InvalidSignature(_) => StatusCode::UNAUTHORIZED,

            WebhookError::ParseError(_) | WebhookError::MissingField(_) => {
                StatusCode::BAD_REQUEST
            }

            // Permanent: redelivering the same event cannot succeed.
            WebhookError::Provider(_) | WebhookError::InvalidTransition(_) => {
                StatusCode::UNPROCESSABLE_ENTITY
            }

            WebhookError::ProviderUnavailable(_) | WebhookError::Database(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // ══════════════════════════════════════════════════════════════
    // Display
    // ══════════════════════════════════════════════════════════════

    #[test]
    fn parse_error_displays_message() {
        let err = WebhookError::ParseError("invalid JSON".to_string());
        assert_eq!(format!("{}", err), "Parse error: invalid JSON");
    }

    #[test]
    fn missing_field_displays_field_name() {
        let err = WebhookError::MissingField("customer");
        assert_eq!(format!("{}", err), "Missing field: customer");
    }

    // ══════════════════════════════════════════════════════════════
    // Status codes
    // ══════════════════════════════════════════════════════════════

    #[test]
    fn bad_signature_is_unauthorized() {
        assert_eq!(
            WebhookError::InvalidSignature("mismatch".into()).status_code(),
            StatusCode::UNAUTHORIZED
        );
    }

    #[test]
    fn malformed_payload_is_bad_request() {
        assert_eq!(
            WebhookError::ParseError("x".into()).status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            WebhookError::MissingField("customer").status_code(),
            StatusCode::BAD_REQUEST
        );
    }

    #[test]
    fn transient_failures_ask_for_redelivery() {
        for err in [
            WebhookError::ProviderUnavailable("timeout".into()),
            WebhookError::Database("pool closed".into()),
        ] {
            assert!(err.is_retryable());
            assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        }
    }

    #[test]
    fn rejections_are_not_retryable() {
        for err in [
            WebhookError::InvalidSignature("stale".into()),
            WebhookError::ParseError("x".into()),
            WebhookError::InvalidTransition("x".into()),
            WebhookError::Provider("bad request".into()),
        ] {
            assert!(!err.is_retryable(), "{:?}", err);
        }
    }

    #[test]
    fn only_retryable_errors_map_to_server_error() {
        for err in [
            WebhookError::InvalidSignature("stale".into()),
            WebhookError::ParseError("x".into()),
            WebhookError::MissingField("customer"),
            WebhookError::ProviderUnavailable("timeout".into()),
            WebhookError::Provider("bad request".into()),
            WebhookError::InvalidTransition("x".into()),
            WebhookError::Database("down".into()),
        ] {
            assert_eq!(
                err.status_code().is_server_error(),
                err.is_retryable(),
                "{:?}",
                err
            );
        }
    }

    #[test]
    fn permanent_processing_failures_are_unprocessable() {
        assert_eq!(
            WebhookError::Provider("no such price".into()).status_code(),
            StatusCode::UNPROCESSABLE_ENTITY
        );
        assert_eq!(
            WebhookError::InvalidTransition("free -> trial".into()).status_code(),
            StatusCode::UNPROCESSABLE_ENTITY
        );
    }
}

//! Entitlement-specific error types.
//!
//! # HTTP Status Mapping
//!
//! | Error | HTTP Status |
//! |-------|-------------|
//! | NotFound | 404 |
//! | AlreadyExists | 409 |
//! | CheckoutSessionNotFound | 404 |
//! | CheckoutSessionNotOwned | 403 |
//! | InvalidTransition | 409 |
//! | ProviderUnavailable | 503 |
//! | Provider | 502 |
//! | ValidationFailed | 400 |
//! | Infrastructure | 500 |

use crate::domain::foundation::{AccountId, DomainError, ErrorCode};

/// Errors surfaced by entitlement commands and queries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EntitlementError {
    /// No entitlement record exists for this account.
    NotFound(AccountId),

    /// The account already has an entitlement record.
    AlreadyExists(AccountId),

    /// The provider does not know this checkout session.
    CheckoutSessionNotFound(String),

    /// The checkout session belongs to a different account.
    CheckoutSessionNotOwned(String),

    /// A write asked for a plan change the state machine forbids.
    InvalidTransition(String),

    /// Transient provider failure (network, rate limit, timeout).
    ProviderUnavailable(String),

    /// Non-transient provider failure.
    Provider(String),

    /// Validation failed.
    ValidationFailed { field: String, message: String },

    /// Store or other infrastructure failure.
    Infrastructure(String),
}

impl EntitlementError {
    pub fn not_found(account_id: AccountId) -> Self {
        EntitlementError::NotFound(account_id)
    }

    pub fn already_exists(account_id: AccountId) -> Self {
        EntitlementError::AlreadyExists(account_id)
    }

    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        EntitlementError::ValidationFailed {
            field: field.into(),
            message: message.into(),
        }
    }

    pub fn infrastructure(message: impl Into<String>) -> Self {
        EntitlementError::Infrastructure(message.into())
    }

    /// Returns the error code for this error.
    pub fn code(&self) -> ErrorCode {
        match self {
            EntitlementError::NotFound(_) => ErrorCode::EntitlementNotFound,
            EntitlementError::AlreadyExists(_) => ErrorCode::AlreadyExists,
            EntitlementError::CheckoutSessionNotFound(_) => ErrorCode::NotFound,
            EntitlementError::CheckoutSessionNotOwned(_) => ErrorCode::Forbidden,
            EntitlementError::InvalidTransition(_) => ErrorCode::InvalidStateTransition,
            EntitlementError::ProviderUnavailable(_) | EntitlementError::Provider(_) => {
                ErrorCode::ExternalServiceError
            }
            EntitlementError::ValidationFailed { .. } => ErrorCode::ValidationFailed,
            EntitlementError::Infrastructure(_) => ErrorCode::DatabaseError,
        }
    }

    /// Returns a user-facing error message.
    pub fn message(&self) -> String {
        match self {
            EntitlementError::NotFound(id) => format!("No entitlement found for account: {}", id),
            EntitlementError::AlreadyExists(id) => {
                format!("Account {} already has an entitlement record", id)
            }
            EntitlementError::CheckoutSessionNotFound(id) => {
                format!("Checkout session not found: {}", id)
            }
            EntitlementError::CheckoutSessionNotOwned(id) => {
                format!("Checkout session {} belongs to another account", id)
            }
            EntitlementError::InvalidTransition(msg) => msg.clone(),
            EntitlementError::ProviderUnavailable(msg) => {
                format!("Payment provider unavailable: {}", msg)
            }
            EntitlementError::Provider(msg) => format!("Payment provider error: {}", msg),
            EntitlementError::ValidationFailed { field, message } => {
                format!("Validation failed for '{}': {}", field, message)
            }
            EntitlementError::Infrastructure(msg) => format!("Error: {}", msg),
        }
    }

    /// Returns true if the caller may retry the same request later.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            EntitlementError::ProviderUnavailable(_) | EntitlementError::Infrastructure(_)
        )
    }
}

impl std::fmt::Display for EntitlementError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message())
    }
}

impl std::error::Error for EntitlementError {}

impl From<DomainError> for EntitlementError {
    fn from(err: DomainError) -> Self {
        let account = || {
            err.details
                .get("account_id")
                .and_then(|id| AccountId::new(id.as_str()).ok())
        };

        match err.code {
            ErrorCode::EntitlementNotFound => match account() {
                Some(id) => EntitlementError::NotFound(id),
                None => EntitlementError::Infrastructure(err.message),
            },
            ErrorCode::AlreadyExists => match account() {
                Some(id) => EntitlementError::AlreadyExists(id),
                None => EntitlementError::Infrastructure(err.message),
            },
            ErrorCode::InvalidStateTransition => EntitlementError::InvalidTransition(err.message),
            ErrorCode::ValidationFailed | ErrorCode::EmptyField | ErrorCode::InvalidFormat => {
                EntitlementError::ValidationFailed {
                    field: err.details.get("field").cloned().unwrap_or_default(),
                    message: err.message,
                }
            }
            _ => EntitlementError::Infrastructure(err.message),
        }
    }
}

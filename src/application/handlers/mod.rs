//! Application handlers.
//!
//! Command and query handlers that orchestrate domain operations.

pub mod entitlement;

pub use entitlement::{
    // Commands
    ActivateAfterCheckoutCommand,
    ActivateAfterCheckoutHandler,
    ConfirmCheckoutCommand,
    ConfirmCheckoutHandler,
    ConfirmCheckoutResult,
    CreateEntitlementCommand,
    CreateEntitlementHandler,
    HandleProviderWebhookCommand,
    HandleProviderWebhookHandler,
    HandleProviderWebhookResult,
    StartCheckoutCommand,
    StartCheckoutHandler,
    StartCheckoutResult,
    VerifySubscriptionCommand,
    VerifySubscriptionHandler,
    // Queries
    EntitlementGate,
    ReconcileIfStaleHandler,
    DEFAULT_PROVIDER_TIMEOUT,
};

//! Application layer - Commands, Queries, and Handlers.
//!
//! This layer orchestrates domain operations and coordinates between ports.
//! Command handlers decide when to write; the domain decides what to write.

pub mod handlers;

pub use handlers::{
    ActivateAfterCheckoutCommand, ActivateAfterCheckoutHandler, ConfirmCheckoutCommand,
    ConfirmCheckoutHandler, ConfirmCheckoutResult, CreateEntitlementCommand,
    CreateEntitlementHandler, EntitlementGate, HandleProviderWebhookCommand,
    HandleProviderWebhookHandler, HandleProviderWebhookResult, ReconcileIfStaleHandler,
    StartCheckoutCommand, StartCheckoutHandler, StartCheckoutResult, VerifySubscriptionCommand,
    VerifySubscriptionHandler, DEFAULT_PROVIDER_TIMEOUT,
};

//! Ports - Interfaces for external dependencies.
//!
//! Following hexagonal architecture, ports define the contracts between
//! the domain and the outside world. Adapters implement these ports.
//!
//! - `EntitlementStore` - keyed record store with per-account atomic updates
//! - `PaymentProvider` - payment provider reads, checkout, webhook decoding
//! - `Clock` - injected wall-clock time

mod clock;
mod entitlement_store;
mod payment_provider;

pub use clock::Clock;
pub use entitlement_store::EntitlementStore;
pub use payment_provider::{
    CheckoutRedirect, CheckoutSession, CreateCheckoutRequest, CreateCustomerRequest, Customer,
    PaymentError, PaymentErrorCode, PaymentProvider, WebhookEvent, WebhookEventData,
    WebhookEventType,
};

//! Adapters - Implementations of port interfaces.
//!
//! Adapters connect the domain to external systems:
//! - `clock` - System and fixed clocks
//! - `memory` - In-memory entitlement store
//! - `postgres` - PostgreSQL entitlement store
//! - `stripe` - Stripe payment provider and its mock
//! - `http` - Axum routes, handlers and middleware

pub mod clock;
pub mod http;
pub mod memory;
pub mod postgres;
pub mod stripe;

pub use clock::{FixedClock, SystemClock};
pub use memory::InMemoryEntitlementStore;
pub use postgres::PostgresEntitlementStore;
pub use stripe::{MockPaymentProvider, StripeConfig, StripePaymentAdapter};

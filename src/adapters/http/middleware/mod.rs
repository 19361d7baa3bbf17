//! HTTP middleware for axum.
//!
//! - `entitlement_guard` - 402 for accounts without paid entitlement

pub mod entitlement_guard;

pub use entitlement_guard::require_entitlement;

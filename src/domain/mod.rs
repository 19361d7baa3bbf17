//! Domain layer - pure business logic with no infrastructure dependencies.

pub mod entitlement;
pub mod foundation;

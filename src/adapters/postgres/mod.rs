//! PostgreSQL adapters - Database implementations for store ports.

mod entitlement_store;

pub use entitlement_store::PostgresEntitlementStore;

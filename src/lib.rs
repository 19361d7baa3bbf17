//! Entitlement Engine - subscription and trial lifecycle reconciliation
//!
//! Decides whether an account may use paid features. Each account has one
//! entitlement record whose plan moves through trial, active, free and
//! inactive states. Three independent writers converge on it:
//!
//! - payment provider webhooks
//! - a checkout-completion path that activates optimistically and then
//!   confirms by polling the provider
//! - lazy reconciliation on read, which expires trials and re-verifies
//!   stale subscriptions
//!
//! The crate follows a ports-and-adapters layout: `domain` holds the pure
//! state machine, `ports` the store, provider and clock traits, `adapters`
//! their PostgreSQL, in-memory, Stripe and axum implementations, and
//! `application` the command handlers that tie them together.

pub mod adapters;
pub mod application;
pub mod config;
pub mod domain;
pub mod ports;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use config::ServerConfig;

/// Install the global tracing subscriber.
///
/// `RUST_LOG` takes precedence over the configured filter. Output is JSON
/// lines when `log_json` is set, human-readable otherwise.
pub fn init_tracing(config: &ServerConfig) {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    if config.log_json {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    }
}

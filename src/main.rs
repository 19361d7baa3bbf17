//! Entitlement engine HTTP server.

use std::sync::Arc;
use std::time::Duration;

use tokio::signal;

use entitlement_engine::adapters::http::{build_app, EntitlementAppState};
use entitlement_engine::adapters::{
    InMemoryEntitlementStore, MockPaymentProvider, PostgresEntitlementStore, StripeConfig,
    StripePaymentAdapter, SystemClock,
};
use entitlement_engine::config::{AppConfig, DatabaseConfig, PaymentConfig};
use entitlement_engine::init_tracing;
use entitlement_engine::ports::{EntitlementStore, PaymentProvider};

type BoxError = Box<dyn std::error::Error + Send + Sync>;

#[tokio::main]
async fn main() -> Result<(), BoxError> {
    let config = AppConfig::load()?;
    init_tracing(&config.server);
    config.validate()?;

    let addr = config.server.socket_addr()?;
    tracing::info!(
        environment = ?config.server.environment,
        %addr,
        "Starting entitlement engine"
    );

    let store = build_store(&config.database).await?;
    let provider = build_provider(&config.payment);

    let state = EntitlementAppState::new(
        store,
        provider,
        Arc::new(SystemClock),
        config.entitlement.policy(),
        config.entitlement.provider_timeout(),
    );
    let app = build_app(state, config.server.request_timeout());

    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!("Listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn build_store(config: &DatabaseConfig) -> Result<Arc<dyn EntitlementStore>, BoxError> {
    if !config.is_configured() {
        tracing::warn!("No database URL configured; using in-memory entitlement store");
        return Ok(Arc::new(InMemoryEntitlementStore::new()));
    }

    let store = PostgresEntitlementStore::connect(config).await?;
    if config.run_migrations {
        store.run_migrations().await?;
    }
    Ok(Arc::new(store))
}

fn build_provider(config: &PaymentConfig) -> Arc<dyn PaymentProvider> {
    if !config.is_configured() {
        tracing::warn!("No Stripe API key configured; using mock payment provider");
        return Arc::new(MockPaymentProvider::new());
    }

    let mut stripe = StripeConfig::new(
        &config.stripe_api_key,
        &config.stripe_webhook_secret,
        &config.stripe_price_id,
    )
    .with_require_livemode(config.require_livemode);
    if let Some(base_url) = &config.stripe_api_base_url {
        stripe = stripe.with_base_url(base_url);
    }
    Arc::new(StripePaymentAdapter::new(stripe))
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C signal, starting graceful shutdown");
        },
        _ = terminate => {
            tracing::info!("Received terminate signal, starting graceful shutdown");
        },
    }

    tokio::time::sleep(Duration::from_millis(500)).await;
}

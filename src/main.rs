//! Provider Directory server binary.

use std::sync::Arc;
use std::time::Duration;

use axum::http::HeaderName;
use tokio::signal;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use provider_directory::adapters::{
    app_router, AppState, BillingUrls, InMemoryBackend, LogEmailSender, ResendEmailSender,
    RestBackendClient, StoreWebhookEventRepository, StripeConfig, StripePaymentAdapter,
};
use provider_directory::application::{
    BillingNotifier, HandlePaymentWebhookHandler, ListingStore, ListingWebhookDispatcher,
};
use provider_directory::config::{AppConfig, PaymentConfig};
use provider_directory::domain::webhook::{IdempotentWebhookProcessor, WebhookAuthenticator};
use provider_directory::ports::{BackendAuth, BackendStore, EmailSender, WebhookEventRepository};

/// How often handled webhook records past retention are purged.
const PURGE_INTERVAL: Duration = Duration::from_secs(6 * 60 * 60);

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::load()?;
    init_tracing(&config);
    config.validate()?;

    if !config.payment.has_webhook_secret() {
        tracing::error!(
            "Payment webhook signing secret is not configured; every webhook will be refused with 500 until it is set"
        );
    }
    if config.payment.is_test_mode() {
        tracing::warn!("Stripe is in test mode");
    }

    // Hosted backend
    let (store, auth): (Arc<dyn BackendStore>, Arc<dyn BackendAuth>) = match &config.backend.url {
        Some(url) => {
            let client = Arc::new(RestBackendClient::new(
                url.clone(),
                config.backend.service_key.clone(),
            ));
            let store: Arc<dyn BackendStore> = client.clone();
            let auth: Arc<dyn BackendAuth> = client;
            (store, auth)
        }
        None => {
            tracing::warn!("No backend URL configured; using in-memory backend");
            let backend = Arc::new(InMemoryBackend::new());
            let store: Arc<dyn BackendStore> = backend.clone();
            let auth: Arc<dyn BackendAuth> = backend;
            (store, auth)
        }
    };

    // Email
    let email_sender: Arc<dyn EmailSender> = match config.email.api_key() {
        Some(key) => Arc::new(ResendEmailSender::new(
            key.clone(),
            config.email.from_header(),
        )),
        None => {
            tracing::warn!("No email provider configured; emails will only be logged");
            Arc::new(LogEmailSender::new())
        }
    };

    // Webhook pipeline
    let listings = ListingStore::new(store.clone());
    let notifier = BillingNotifier::new(email_sender, config.payment.dashboard_url());
    let events: Arc<dyn WebhookEventRepository> =
        Arc::new(StoreWebhookEventRepository::new(store.clone()));
    let processor = IdempotentWebhookProcessor::new(
        events.clone(),
        Arc::new(ListingWebhookDispatcher::new(listings.clone(), notifier)),
    );
    let authenticator = WebhookAuthenticator::new(config.payment.stripe_webhook_secret.clone())
        .with_tolerance(config.payment.webhook_tolerance_secs);
    let signature_header = HeaderName::from_bytes(config.payment.signature_header.as_bytes())?;

    // Payment provider
    let payment_provider = Arc::new(StripePaymentAdapter::new(
        StripeConfig::new(
            config.payment.stripe_api_key.clone(),
            config.payment.featured_price_id.clone(),
        )
        .with_base_url(config.payment.stripe_api_base_url.clone()),
    ));

    let state = AppState {
        webhook_handler: Arc::new(HandlePaymentWebhookHandler::new(authenticator, processor)),
        signature_header,
        listings,
        payment_provider,
        auth,
        billing_urls: BillingUrls {
            checkout_success: config.payment.checkout_success_url(),
            checkout_cancel: config.payment.checkout_cancel_url(),
            portal_return: config.payment.dashboard_url(),
        },
    };

    spawn_webhook_purge(events, config.payment.clone());

    let app = app_router(state, &config.server);
    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;

    tracing::info!(
        %addr,
        environment = ?config.server.environment,
        signature_header = %config.payment.signature_header,
        "Server starting"
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

/// JSON logs in production, compact text otherwise. `RUST_LOG` wins over the
/// configured filter.
fn init_tracing(config: &AppConfig) {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.server.log_level));

    if config.is_production() {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer().compact())
            .init();
    }
}

/// Periodically drops webhook records older than the retention window.
fn spawn_webhook_purge(events: Arc<dyn WebhookEventRepository>, payment: PaymentConfig) {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(PURGE_INTERVAL);
        loop {
            interval.tick().await;
            let Some(cutoff) = payment.webhook_retention_cutoff(chrono::Utc::now()) else {
                tracing::error!(
                    retention_days = payment.webhook_retention_days,
                    "Webhook retention is out of range, skipping purge"
                );
                continue;
            };
            match events.delete_before(cutoff).await {
                Ok(0) => {}
                Ok(removed) => tracing::info!(removed, "Purged old webhook records"),
                Err(e) => tracing::warn!(error = %e, "Webhook record purge failed"),
            }
        }
    });
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
            Ok(mut sig) => {
                sig.recv().await;
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
        _ = ctrl_c => tracing::info!("Received Ctrl+C, shutting down"),
        _ = terminate => tracing::info!("Received terminate signal, shutting down"),
    }
}

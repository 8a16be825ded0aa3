use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use herald_common::config::AppConfig;
use herald_common::db;
use herald_common::types::ChannelType;
use herald_notifier::gateway::{ChannelRouter, DeliveryGateway, HttpRelayGateway, LogGateway};
use herald_notifier::store::PgNotificationStore;
use herald_notifier::worker::{DispatchWorker, WorkerConfig};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "herald_notifier=info,herald_common=info".into()),
        )
        .json()
        .init();

    tracing::info!("Herald notifier starting...");

    let config = AppConfig::from_env()?;

    let pool = db::create_pool(&config.database_url, config.db_max_connections).await?;
    db::run_migrations(&pool).await?;

    let store = Arc::new(PgNotificationStore::new(pool));
    let gateway = Arc::new(build_router(&config)?);

    let cancel = CancellationToken::new();
    let shutdown = cancel.clone();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => tracing::info!("Received shutdown signal, stopping gracefully..."),
            Err(e) => tracing::error!(error = %e, "Failed to listen for shutdown signal"),
        }
        shutdown.cancel();
    });

    let worker = DispatchWorker::new(store, gateway, WorkerConfig::from(&config), cancel);
    let summary = worker.run().await;

    tracing::info!(
        cycles = summary.cycles,
        sent = summary.sent,
        failed = summary.failed,
        "Herald notifier stopped."
    );
    Ok(())
}

/// One route per channel: the HTTP relay when a URL is configured, otherwise log-only delivery.
fn build_router(config: &AppConfig) -> anyhow::Result<ChannelRouter> {
    let timeout = Duration::from_secs(config.delivery_timeout_secs);
    let mut router = ChannelRouter::new();

    for channel in ChannelType::ALL {
        let relay_url = match channel {
            ChannelType::Email => config.email_relay_url.as_deref(),
            ChannelType::Sms => config.sms_relay_url.as_deref(),
            ChannelType::Push => config.push_relay_url.as_deref(),
        };

        let gateway: Arc<dyn DeliveryGateway> = match relay_url {
            Some(url) => {
                tracing::info!(channel = %channel, endpoint = url, "Using HTTP relay");
                Arc::new(HttpRelayGateway::new(url, timeout)?)
            }
            None => {
                tracing::warn!(channel = %channel, "No relay configured, deliveries are only logged");
                Arc::new(LogGateway::new())
            }
        };
        router.register(channel, gateway);
    }

    Ok(router)
}

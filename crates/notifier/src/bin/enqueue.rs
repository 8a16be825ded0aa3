//! Create one notification from the command line and print it as JSON.

use std::sync::Arc;

use clap::Parser;

use herald_common::config::AppConfig;
use herald_common::db;
use herald_common::types::ChannelType;
use herald_notifier::service::NotificationService;
use herald_notifier::store::PgNotificationStore;

#[derive(Debug, Parser)]
#[command(name = "enqueue")]
#[command(about = "Queue a notification for the Herald dispatch worker")]
#[command(version)]
struct Args {
    /// Delivery channel: email, sms or push
    channel: ChannelType,

    /// Address, phone number or device token
    recipient: String,

    /// Message text; remaining words are joined with spaces
    #[arg(required = true, trailing_var_arg = true)]
    message: Vec<String>,
}

impl Args {
    fn message(&self) -> String {
        self.message.join(" ")
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "herald_notifier=warn".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let config = AppConfig::from_env()?;
    let pool = db::create_pool(&config.database_url, config.db_max_connections).await?;
    db::run_migrations(&pool).await?;

    let service = NotificationService::new(Arc::new(PgNotificationStore::new(pool)));
    let notification = service
        .create_notification(&args.message(), &args.recipient, args.channel)
        .await?;

    println!("{}", serde_json::to_string_pretty(&notification)?);
    Ok(())
}

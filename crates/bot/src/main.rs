use std::sync::Arc;

use bot::polling::run_polling;
use bot::retry::RetryPolicy;
use bot::telegram::TelegramClient;
use shared::config::BotConfig;
use shared::outbound::OutboundGate;
use shared::reminder::ReminderScheduler;
use shared::store::EventStore;
use shared::tracker::Tracker;
use tokio::signal;
use tracing::{error, info};

#[tokio::main]
async fn main() {
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "bot=debug,shared=info".to_string()),
        )
        .init();

    let config = match BotConfig::from_env() {
        Ok(cfg) => cfg,
        Err(err) => {
            error!("failed to read bot config: {err}");
            std::process::exit(1);
        }
    };

    let client = match TelegramClient::new(
        &config.telegram_api_url,
        &config.telegram_bot_token,
        config.poll_timeout_seconds,
    ) {
        Ok(client) => client,
        Err(err) => {
            error!("failed to build telegram client: {err}");
            std::process::exit(1);
        }
    };

    match client.get_me().await {
        Ok(me) => info!(
            bot_id = me.id,
            username = me.username.as_deref().unwrap_or("<unnamed>"),
            "bot authenticated"
        ),
        Err(err) => {
            error!("failed to reach telegram: {err}");
            std::process::exit(1);
        }
    }

    let store = Arc::new(EventStore::open(&config.data_file));
    let tracker = Tracker::new(
        store,
        OutboundGate::new(client.clone()),
        ReminderScheduler::new(config.reminder_unit),
        config.utc_offset,
    );

    info!(
        data_file = %config.data_file.display(),
        utc_offset = %config.utc_offset,
        "bot starting (long poll timeout {} seconds)",
        config.poll_timeout_seconds
    );

    run_polling(
        &client,
        &tracker,
        RetryPolicy {
            base_seconds: config.retry_base_seconds,
            max_seconds: config.retry_max_seconds,
        },
        async {
            if let Err(err) = signal::ctrl_c().await {
                error!("failed to listen for shutdown signal: {err}");
                std::future::pending::<()>().await;
            }
            info!("shutdown signal received");
        },
    )
    .await;
}

mod coingecko;
mod config;
mod digest;
mod format;
mod handlers;
mod platform;
mod scheduler;
mod subscribers;
mod trending;

#[cfg(test)]
mod testing;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use teloxide::Bot;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::coingecko::CoinGeckoClient;
use crate::config::Config;
use crate::digest::DigestService;
use crate::platform::telegram::{self, TelegramMessenger};
use crate::platform::Messenger;
use crate::scheduler::tasks::register_digest_jobs;
use crate::scheduler::Scheduler;
use crate::subscribers::SubscriberRegistry;

#[tokio::main]
async fn main() -> Result<()> {
    // Secrets may live in a local .env file
    dotenvy::dotenv().ok();

    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,trending_digest_bot=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let config_path = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("config.toml"));

    info!("Loading configuration from: {}", config_path.display());
    let config = Config::load(&config_path)
        .with_context(|| format!("Failed to load config from {}", config_path.display()))?;

    info!("Configuration loaded successfully");
    info!("  CoinGecko: {}", config.coingecko.base_url);
    info!("  Request timeout: {}s", config.coingecko.request_timeout_secs);

    let bot = Bot::new(&config.telegram.bot_token);
    let source = Arc::new(CoinGeckoClient::new(config.coingecko.clone())?);
    let service = Arc::new(DigestService::new(source, SubscriberRegistry::new()));
    let messenger: Arc<dyn Messenger> = Arc::new(TelegramMessenger::new(bot.clone()));

    // Daily broadcasts
    let mut scheduler = Scheduler::new().await?;
    register_digest_jobs(&scheduler, service.clone(), messenger).await?;
    scheduler.start().await?;

    // Run the Telegram bot
    info!("Bot is starting...");
    telegram::run(bot, service).await?;

    scheduler.shutdown().await?;
    Ok(())
}

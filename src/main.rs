mod bot;
mod config;
mod platform;
mod relay;
mod scheduler;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use teloxide::prelude::*;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::bot::AppState;
use crate::config::Config;
use crate::scheduler::{tasks, Scheduler};

#[tokio::main]
async fn main() -> Result<()> {
    // BOT_TOKEN / ADMIN_IDS may come from a .env file
    dotenvy::dotenv().ok();

    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,askrelay=debug".into()),
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
    info!("  Administrators: {:?}", config.telegram.admin_ids);
    info!(
        "  Choice TTL: {}h, question TTL: {}h, sweep: {}",
        config.relay.choice_ttl_hours, config.relay.question_ttl_hours, config.relay.sweep_cron
    );

    let bot = Bot::new(&config.telegram.bot_token);
    let me = bot.get_me().await.context("Failed to fetch bot account")?;
    info!("Logged in as @{}", me.username());

    let relay_config = config.relay.clone();
    let state = Arc::new(AppState::new(config, me.id));

    let mut scheduler = Scheduler::new(state.clone()).await?;
    tasks::register_builtin_tasks(&scheduler, relay_config).await?;
    scheduler.start().await?;

    info!("Bot is starting...");
    platform::telegram::run(state, bot).await?;

    scheduler.shutdown().await?;

    Ok(())
}

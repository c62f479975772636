use std::sync::Arc;
use telecust::{config::Config, db::Database, llm::LlmClient, transport, Data};
use teloxide::prelude::*;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // Load configuration
    let config = Config::from_env()?;
    info!("Loaded configuration: {:?}", config);

    let db = Database::new(&config)
        .map_err(|e| anyhow::anyhow!("Failed to open database: {}", e))?;
    db.execute_init()?;

    let llm_client = Arc::new(LlmClient::new(&config)?);

    let bot = Bot::new(config.telegram_token.clone());
    let me = bot.get_me().await?;
    info!("Authorized on account {}", me.username());

    let telegram = Arc::new(transport::TelegramTransport::new(bot.clone()));
    let data = Data::new(config, db, telegram, llm_client);

    info!("Starting bot...");
    transport::telegram::run_polling(bot, Arc::clone(&data.dispatcher)).await;

    info!("Waiting for in-flight replies...");
    data.dispatcher.drain().await;
    info!("Shut down cleanly");

    Ok(())
}

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use teloxide::Bot;
use tracing::info;
use tracing_subscriber::EnvFilter;

use courier::channel::telegram::TelegramAdapter;
use courier::{ActionsClient, Assistant, CourierConfig, InMemoryUsageStore, Router, UsageStore};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "courier.toml".into());
    let config = if Path::new(&config_path).exists() {
        CourierConfig::from_file(Path::new(&config_path))
            .with_context(|| format!("failed to load {config_path}"))?
    } else {
        info!(path = %config_path, "config file not found, using defaults");
        CourierConfig::default()
    };

    let token = config
        .telegram
        .resolve_token()
        .context("telegram token required")?;
    let bot = Bot::new(token);

    let actions = ActionsClient::new(&config.actions);
    let assistant = Assistant::from_config(&config);
    info!(primary = assistant.is_primary(), "assistant backend selected");

    #[cfg(feature = "postgres")]
    if let Some(url) = &config.database_url {
        let store = courier::PostgresUsageStore::connect(url)
            .await
            .context("usage store connection failed")?;
        store
            .run_migration()
            .await
            .context("usage store migration failed")?;
        info!("usage store: postgres");
        return run_bot(bot, &config, actions, assistant, store).await;
    }

    if config.database_url.is_some() {
        info!("database_url set but postgres feature disabled, using in-memory store");
    }
    run_bot(bot, &config, actions, assistant, InMemoryUsageStore::new()).await
}

async fn run_bot<U: UsageStore + 'static>(
    bot: Bot,
    config: &CourierConfig,
    actions: ActionsClient,
    assistant: Assistant,
    usage: U,
) -> Result<()> {
    let router = Router::new(actions, assistant, usage);
    let adapter = Arc::new(TelegramAdapter::new(bot, &config.telegram, router));
    info!("courier bot starting (long polling)");
    adapter.run().await;
    Ok(())
}

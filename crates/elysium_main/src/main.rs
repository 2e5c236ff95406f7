use std::sync::Arc;

use elysium_core::{
    ChatService, Config, GenAiChatModel, KnowledgeStore, SubprocessExecutor, spawn_daily_reset,
};
use elysium_discord::run_discord_bot;
use miette::Result;
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    init_logging();

    // Load environment variables from .env if present
    dotenvy::dotenv().ok();

    let config = Config::load()?;
    config.validate()?;
    info!("Loaded configuration, model '{}'", config.model.model);

    let knowledge = KnowledgeStore::load(&config.knowledge.directory).await?;
    info!(
        "Knowledge base loaded: {} document(s) from {}",
        knowledge.len().await,
        knowledge.directory().display()
    );

    let model = Arc::new(GenAiChatModel::new(config.model.clone()));
    let executor = Arc::new(SubprocessExecutor::new(config.executor.clone()));

    let service = Arc::new(ChatService::new(
        config.chat.clone(),
        model,
        executor,
        knowledge,
    ));

    let reset_time = config.chat.reset_time()?;
    let reset_task = spawn_daily_reset(service.clone(), reset_time);
    info!("Daily conversation reset scheduled at {} UTC", reset_time);

    let result = run_discord_bot(config.discord, service).await;
    reset_task.abort();
    result?;

    Ok(())
}

fn init_logging() {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

    std::fs::create_dir_all("logs").ok();

    let file_appender = tracing_appender::rolling::daily("logs", "elysium.log");
    let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);

    // Leak the guard to keep it alive for the entire program
    Box::leak(Box::new(_guard));

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "elysium=debug,serenity=info".into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(true)
                .with_thread_ids(false)
                .with_line_number(true),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(non_blocking)
                .with_target(true)
                .with_thread_ids(true)
                .with_line_number(true)
                .with_ansi(false),
        )
        .init();
}

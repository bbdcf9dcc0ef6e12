use oddsmith::api::router::create_router;
use oddsmith::config::AppConfig;
use oddsmith::services::notifier::{run_event_notifier, Notifier};
use oddsmith::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let config = AppConfig::from_env()?;
    init_tracing(&config.log_format);

    let addr = format!("{}:{}", config.host, config.port);

    let state = AppState::from_config(config.clone()).await?;

    // --- Notifications: resolutions → Telegram ---
    if config.has_telegram() {
        let notifier = Notifier::new(
            config.telegram_bot_token.clone().unwrap_or_default(),
            config.telegram_chat_id.clone().unwrap_or_default(),
        );
        let rx = state.exchange.subscribe();
        tokio::spawn(async move {
            run_event_notifier(rx, notifier).await;
        });
        tracing::info!("Telegram notifier spawned");
    } else {
        tracing::info!("Telegram notifications disabled");
    }

    tracing::info!(
        slippage_tolerance = config.slippage_tolerance,
        lock_timeout_ms = config.lock_timeout_ms,
        max_commit_retries = config.max_commit_retries,
        "Settlement configured"
    );

    let router = create_router(state);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Server listening on {addr}");
    axum::serve(listener, router).await?;

    Ok(())
}

fn init_tracing(format: &str) {
    use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let registry = tracing_subscriber::registry().with(filter);

    if format.eq_ignore_ascii_case("json") {
        registry.with(fmt::layer().json()).init();
    } else {
        registry.with(fmt::layer()).init();
    }
}

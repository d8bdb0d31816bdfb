mod alerts;
mod api;
mod bot;
mod config;
mod db;
mod error;
mod pipeline;
mod state;
mod types;
mod webhook;

#[cfg(test)]
mod test_helpers;

use std::sync::Arc;
use std::time::Duration;

use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use crate::alerts::TelegramNotifier;
use crate::api::routes::{router, ApiState};
use crate::bot::{AdminCommandHandler, CommandBot};
use crate::config::{Config, DEDUP_MAX_ENTRIES, RATE_WINDOW_SECS};
use crate::db::{ProcessedJournal, SettingsRepository, WhaleRepository};
use crate::error::Result;
use crate::pipeline::dedup::warm_from_journal;
use crate::pipeline::{DedupSweeper, Deduplicator, EventPipeline, RateLimiter};
use crate::state::{AlertSwitch, Registry};

#[tokio::main]
async fn main() {
    let cfg = match Config::from_env() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Config error: {e}");
            std::process::exit(1);
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(&cfg.log_level))
        .init();

    if let Err(e) = run(cfg).await {
        error!("Fatal error: {e}");
        std::process::exit(1);
    }
}

async fn run(cfg: Config) -> Result<()> {
    // --- Database setup ---
    let pool = db::connect(&cfg.db_path).await?;
    info!("Database ready at {}", cfg.db_path);

    // --- Watch list ---
    let registry = Registry::load(WhaleRepository::new(pool.clone())).await?;
    if !cfg.watchlist_seed.is_empty() {
        registry.seed(&cfg.watchlist_seed).await?;
    }
    if registry.len() == 0 {
        warn!("Watch list is empty: add wallets with /addwhale or WATCHLIST_SEED");
    }

    let alerts = Arc::new(AlertSwitch::load(SettingsRepository::new(pool.clone())).await?);
    if !alerts.is_enabled() {
        warn!("Alerts are switched off; /alertson re-enables delivery");
    }

    // --- Dedup, warm from the journal so a restart does not re-alert ---
    let journal = ProcessedJournal::new(pool.clone());
    let dedup = Arc::new(Deduplicator::new(
        Duration::from_secs(cfg.dedup_retention_secs),
        DEDUP_MAX_ENTRIES,
    ));
    let restored = warm_from_journal(&dedup, &journal).await?;
    info!(
        restored,
        retention_secs = cfg.dedup_retention_secs,
        "Dedup store warmed from journal"
    );

    // --- Pipeline ---
    let limiter = RateLimiter::new(
        cfg.rate_limit_per_window,
        Duration::from_secs(RATE_WINDOW_SECS),
    );
    let notifier = Arc::new(TelegramNotifier::new(
        &cfg.telegram_api_url,
        &cfg.telegram_bot_token,
    )?);
    let pipeline = Arc::new(EventPipeline::new(
        Arc::clone(&registry),
        Arc::clone(&alerts),
        Arc::clone(&dedup),
        journal.clone(),
        limiter,
        notifier,
        cfg.alert_chat_id.clone(),
    ));
    info!(
        cap = cfg.rate_limit_per_window,
        window_secs = RATE_WINDOW_SECS,
        chat = %cfg.alert_chat_id,
        "Alert pipeline ready"
    );

    // --- Spawn tasks ---

    // Dedup sweeper (background, every DEDUP_SWEEP_INTERVAL_SECS)
    let sweeper = DedupSweeper::new(Arc::clone(&dedup), journal);
    tokio::spawn(async move { sweeper.run().await });

    // Command bot (long polling)
    let handler = AdminCommandHandler::new(
        Arc::clone(&registry),
        Arc::clone(&alerts),
        cfg.admin_user_ids.clone(),
        pipeline.stats(),
        cfg.db_path.clone(),
    );
    let command_bot = Arc::new(CommandBot::new(
        &cfg.telegram_bot_token,
        handler,
        cfg.allowed_chat_ids.clone(),
    ));
    tokio::spawn(async move { command_bot.run().await });

    // Webhook + read-only HTTP API
    if cfg.webhook_auth_token.is_none() {
        warn!("WEBHOOK_AUTH_TOKEN not set: /webhook accepts unauthenticated requests");
    }
    let api_state = ApiState {
        stats: pipeline.stats(),
        latency: pipeline.latency(),
        pipeline,
        registry,
        alerts,
        db: pool,
        auth_token: cfg.webhook_auth_token.clone(),
    };
    let app = router(api_state);
    let bind_addr = format!("0.0.0.0:{}", cfg.webhook_port);
    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    info!("Webhook listening on {bind_addr}");

    axum::serve(listener, app).await?;

    Ok(())
}

use std::collections::HashSet;

use crate::error::{AppError, Result};

pub const TELEGRAM_API_URL: &str = "https://api.telegram.org";

/// Wrapped SOL mint. Balance changes in this mint count toward the native side of a swap.
pub const WSOL_MINT: &str = "So11111111111111111111111111111111111111112";

/// Native SOL is carried in lamports; 1 SOL = 10^9 lamports.
pub const LAMPORTS_DECIMALS: u32 = 9;

/// Length of one rate-limit window (seconds). The cap per window comes from config.
pub const RATE_WINDOW_SECS: u64 = 60;

/// Upper bound on remembered dedup keys. Past this, expired keys are purged
/// and then the oldest keys are evicted.
pub const DEDUP_MAX_ENTRIES: usize = 100_000;

/// How often the sweeper purges expired dedup keys and prunes the journal (seconds).
pub const DEDUP_SWEEP_INTERVAL_SECS: u64 = 300;

/// Timeout for a single Telegram `sendMessage` call (seconds).
pub const DELIVERY_TIMEOUT_SECS: u64 = 10;

/// Deep-link bases used by the alert formatter.
pub mod links {
    pub const DEXSCREENER: &str = "https://dexscreener.com/solana";
    pub const SOLSCAN_TOKEN: &str = "https://solscan.io/token";
    pub const PUMP_FUN: &str = "https://pump.fun/coin";
}

#[derive(Debug, Clone)]
pub struct Config {
    pub telegram_bot_token: String,
    pub telegram_api_url: String,
    /// Chat that receives trade alerts (ALERT_CHAT_ID).
    pub alert_chat_id: String,
    /// Telegram user ids allowed to run mutating commands (ADMIN_USER_IDS, comma-separated).
    pub admin_user_ids: HashSet<i64>,
    /// Chats the command bot answers in (ALLOWED_CHAT_IDS). Empty means every chat.
    pub allowed_chat_ids: HashSet<i64>,
    pub webhook_port: u16,
    /// Shared secret the webhook provider sends in the Authorization header.
    pub webhook_auth_token: Option<String>,
    pub db_path: String,
    pub log_level: String,
    /// Max alerts delivered per RATE_WINDOW_SECS window (RATE_LIMIT_PER_MINUTE)
    pub rate_limit_per_window: u32,
    /// How long a delivered transaction is remembered (DEDUP_RETENTION_SECS)
    pub dedup_retention_secs: u64,
    /// Initial watch list, `Label:Address` pairs (WATCHLIST_SEED, comma-separated).
    pub watchlist_seed: Vec<(String, String)>,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        let telegram_bot_token = required("TELEGRAM_BOT_TOKEN")?;
        let alert_chat_id = required("ALERT_CHAT_ID")?;

        let admin_user_ids = parse_id_set(&std::env::var("ADMIN_USER_IDS").unwrap_or_default())
            .map_err(|_| AppError::Config("ADMIN_USER_IDS must be comma-separated integers".to_string()))?;
        if admin_user_ids.is_empty() {
            return Err(AppError::Config("ADMIN_USER_IDS must name at least one admin".to_string()));
        }

        let allowed_chat_ids = parse_id_set(&std::env::var("ALLOWED_CHAT_IDS").unwrap_or_default())
            .map_err(|_| AppError::Config("ALLOWED_CHAT_IDS must be comma-separated integers".to_string()))?;

        let rate_limit_per_window = std::env::var("RATE_LIMIT_PER_MINUTE")
            .unwrap_or_else(|_| "20".to_string())
            .parse::<u32>()
            .map_err(|_| AppError::Config("RATE_LIMIT_PER_MINUTE must be a positive integer".to_string()))?;
        if rate_limit_per_window == 0 {
            return Err(AppError::Config("RATE_LIMIT_PER_MINUTE must be at least 1".to_string()));
        }

        let dedup_retention_secs = parse_retention(
            &std::env::var("DEDUP_RETENTION_SECS").unwrap_or_else(|_| "21600".to_string()),
        )?;

        Ok(Self {
            telegram_bot_token,
            telegram_api_url: std::env::var("TELEGRAM_API_URL")
                .unwrap_or_else(|_| TELEGRAM_API_URL.to_string()),
            alert_chat_id,
            admin_user_ids,
            allowed_chat_ids,
            webhook_port: std::env::var("WEBHOOK_PORT")
                .unwrap_or_else(|_| "5000".to_string())
                .parse::<u16>()
                .map_err(|_| AppError::Config("WEBHOOK_PORT must be a valid port number".to_string()))?,
            webhook_auth_token: std::env::var("WEBHOOK_AUTH_TOKEN")
                .ok()
                .filter(|t| !t.trim().is_empty()),
            db_path: std::env::var("DB_PATH").unwrap_or_else(|_| "whales.db".to_string()),
            log_level: std::env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
            rate_limit_per_window,
            dedup_retention_secs,
            watchlist_seed: parse_seed(&std::env::var("WATCHLIST_SEED").unwrap_or_default())?,
        })
    }
}

/// Dedup retention in seconds. Zero would let every replay through.
fn parse_retention(raw: &str) -> Result<u64> {
    let secs = raw
        .trim()
        .parse::<u64>()
        .map_err(|_| AppError::Config("DEDUP_RETENTION_SECS must be a positive integer".to_string()))?;
    if secs == 0 {
        return Err(AppError::Config("DEDUP_RETENTION_SECS must be at least 1".to_string()));
    }
    Ok(secs)
}

fn required(name: &str) -> Result<String> {
    std::env::var(name)
        .ok()
        .filter(|v| !v.trim().is_empty())
        .ok_or_else(|| AppError::Config(format!("{name} must be set")))
}

fn parse_id_set(raw: &str) -> std::result::Result<HashSet<i64>, std::num::ParseIntError> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::parse::<i64>)
        .collect()
}

/// Parses `Label:Address,Label:Address`. Blank entries are skipped.
fn parse_seed(raw: &str) -> Result<Vec<(String, String)>> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|entry| match entry.split_once(':') {
            Some((label, address)) if !label.trim().is_empty() && !address.trim().is_empty() => {
                Ok((label.trim().to_string(), address.trim().to_string()))
            }
            _ => Err(AppError::Config(format!(
                "WATCHLIST_SEED entry '{entry}' must look like Label:Address"
            ))),
        })
        .collect()
}

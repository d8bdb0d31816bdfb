//! Shared fixtures for unit tests.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::json;
use sqlx::SqlitePool;

use crate::alerts::{DeliveryError, Notifier};
use crate::db::{memory_pool, ProcessedJournal, SettingsRepository, WhaleRepository};
use crate::pipeline::{Deduplicator, EventPipeline, RateLimiter};
use crate::state::{AlertSwitch, Registry};
use crate::types::FormattedAlert;
use crate::webhook::RawNotification;

/// Real mainnet program ids; they are valid 32-byte base58 keys.
pub const GAKE: &str = "JUP6LkbZbjS1jKKwapdHNy74zcZ3tLUZoi5QNyVTaV4";
pub const OTHER_WHALE: &str = "675kPX9MHTjS2zt1qfr1NYHuzeLXfQM9H24wFSUt1Mp8";
pub const TOKEN_MINT: &str = "TokenMint1111111111111111111111111111111pump";
pub const ALERT_CHAT: &str = "-100500";

// ---------------------------------------------------------------------------
// Notifier doubles
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct RecordingNotifier {
    sent: Mutex<Vec<(String, FormattedAlert)>>,
}

impl RecordingNotifier {
    pub fn sent(&self) -> Vec<(String, FormattedAlert)> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn deliver(&self, chat_id: &str, alert: &FormattedAlert) -> Result<(), DeliveryError> {
        self.sent
            .lock()
            .unwrap()
            .push((chat_id.to_string(), alert.clone()));
        Ok(())
    }
}

pub struct FailingNotifier;

#[async_trait]
impl Notifier for FailingNotifier {
    async fn deliver(&self, _chat_id: &str, _alert: &FormattedAlert) -> Result<(), DeliveryError> {
        Err(DeliveryError::Api(teloxide::RequestError::Api(
            teloxide::ApiError::BotBlocked,
        )))
    }
}

// ---------------------------------------------------------------------------
// Notifications
// ---------------------------------------------------------------------------

pub struct SwapSpec<'a> {
    pub signature: &'a str,
    pub wallet: &'a str,
    pub mint: &'a str,
    /// Signed lamport change of the wallet.
    pub lamports: i64,
    /// Signed base-unit token change of the wallet.
    pub raw_token: &'a str,
    pub decimals: u32,
    pub source: Option<&'a str>,
    pub symbol: Option<&'a str>,
}

/// Enhanced-transaction payload with one account entry for `wallet` and a
/// matching token transfer against a pool account.
pub fn swap_notification(spec: &SwapSpec<'_>) -> RawNotification {
    let buying = !spec.raw_token.starts_with('-');
    let (from, to) = if buying {
        ("PoolVault", spec.wallet)
    } else {
        (spec.wallet, "PoolVault")
    };
    serde_json::from_value(json!({
        "signature": spec.signature,
        "timestamp": 1_700_000_000,
        "type": "SWAP",
        "source": spec.source,
        "tokenTransfers": [{
            "fromUserAccount": from,
            "toUserAccount": to,
            "mint": spec.mint,
            "symbol": spec.symbol,
        }],
        "accountData": [{
            "account": spec.wallet,
            "nativeBalanceChange": spec.lamports,
            "tokenBalanceChanges": [{
                "userAccount": spec.wallet,
                "tokenAccount": "WalletTokenAccount",
                "mint": spec.mint,
                "rawTokenAmount": { "tokenAmount": spec.raw_token, "decimals": spec.decimals },
            }],
        }],
    }))
    .unwrap()
}

/// The 10.5 SOL → 1.2M TOKEN buy on PumpSwap.
pub fn buy_for(signature: &str, wallet: &str) -> RawNotification {
    swap_notification(&SwapSpec {
        signature,
        wallet,
        mint: TOKEN_MINT,
        lamports: -10_500_000_000,
        raw_token: "1200000000000",
        decimals: 6,
        source: Some("PUMP_AMM"),
        symbol: Some("TOKEN"),
    })
}

// ---------------------------------------------------------------------------
// Wiring
// ---------------------------------------------------------------------------

pub struct TestPipeline {
    pub pipeline: EventPipeline,
    pub registry: Arc<Registry>,
    pub alerts: Arc<AlertSwitch>,
    pub dedup: Arc<Deduplicator>,
    pub pool: SqlitePool,
}

pub async fn test_registry(pool: &SqlitePool) -> Arc<Registry> {
    Registry::load(WhaleRepository::new(pool.clone())).await.unwrap()
}

pub async fn test_alert_switch(pool: &SqlitePool) -> Arc<AlertSwitch> {
    Arc::new(
        AlertSwitch::load(SettingsRepository::new(pool.clone()))
            .await
            .unwrap(),
    )
}

pub async fn test_pipeline(notifier: Arc<dyn Notifier>, cap: u32) -> TestPipeline {
    let pool = memory_pool().await;
    let registry = test_registry(&pool).await;
    let alerts = test_alert_switch(&pool).await;
    let dedup = Arc::new(Deduplicator::new(Duration::from_secs(3600), 10_000));
    let pipeline = EventPipeline::new(
        Arc::clone(&registry),
        Arc::clone(&alerts),
        Arc::clone(&dedup),
        ProcessedJournal::new(pool.clone()),
        RateLimiter::new(cap, Duration::from_secs(60)),
        notifier,
        ALERT_CHAT.to_string(),
    );
    TestPipeline {
        pipeline,
        registry,
        alerts,
        dedup,
        pool,
    }
}

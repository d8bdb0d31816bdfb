use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, error, info, warn};

use crate::alerts::{format_trade, Notifier};
use crate::api::health::PipelineStats;
use crate::api::latency::LatencyStats;
use crate::db::ProcessedJournal;
use crate::pipeline::classifier::{classify, Classification};
use crate::pipeline::dedup::{dedup_key, now_secs, Deduplicator};
use crate::pipeline::rate_limit::RateLimiter;
use crate::state::{AlertSwitch, Registry};
use crate::types::{PipelineOutcome, TradeEvent};
use crate::webhook::RawNotification;

/// Runs one notification through filter → classify → dedup → rate limit →
/// format → deliver, once per active watched address it touches.
///
/// Every drop is terminal and only logged. Nothing in here returns an error
/// to the caller; the outcome list says what happened.
pub struct EventPipeline {
    registry: Arc<Registry>,
    alerts: Arc<AlertSwitch>,
    dedup: Arc<Deduplicator>,
    journal: ProcessedJournal,
    limiter: RateLimiter,
    notifier: Arc<dyn Notifier>,
    chat_id: String,
    stats: Arc<PipelineStats>,
    latency: Arc<LatencyStats>,
}

impl EventPipeline {
    pub fn new(
        registry: Arc<Registry>,
        alerts: Arc<AlertSwitch>,
        dedup: Arc<Deduplicator>,
        journal: ProcessedJournal,
        limiter: RateLimiter,
        notifier: Arc<dyn Notifier>,
        chat_id: String,
    ) -> Self {
        Self {
            registry,
            alerts,
            dedup,
            journal,
            limiter,
            notifier,
            chat_id,
            stats: Arc::new(PipelineStats::new()),
            latency: Arc::new(LatencyStats::new()),
        }
    }

    pub fn stats(&self) -> Arc<PipelineStats> {
        Arc::clone(&self.stats)
    }

    pub fn latency(&self) -> Arc<LatencyStats> {
        Arc::clone(&self.latency)
    }

    /// Process one notification. Returns one outcome per active watched
    /// address involved, or a single `NotWatched`.
    pub async fn process(&self, notification: &RawNotification) -> Vec<PipelineOutcome> {
        let started = Instant::now();

        let candidates: Vec<&str> = notification
            .involved_accounts()
            .into_iter()
            .filter(|account| self.registry.is_active_watched(account))
            .collect();

        let mut outcomes = Vec::with_capacity(candidates.len().max(1));
        if candidates.is_empty() {
            debug!(signature = %notification.signature, "[PIPELINE] no active watched wallet involved");
            outcomes.push(PipelineOutcome::NotWatched);
        }
        for address in candidates {
            outcomes.push(self.process_for(notification, address).await);
        }

        for outcome in &outcomes {
            self.stats.record(*outcome);
        }
        self.latency.record(started.elapsed());
        outcomes
    }

    async fn process_for(&self, notification: &RawNotification, address: &str) -> PipelineOutcome {
        if !self.alerts.is_enabled() {
            debug!(signature = %notification.signature, "[PIPELINE] alerts switched off");
            return PipelineOutcome::AlertsDisabled;
        }

        let mut event = match classify(notification, address) {
            Classification::Trade(event) => event,
            Classification::Unrecognized(reason) => {
                debug!(
                    signature = %notification.signature,
                    address,
                    %reason,
                    "[PIPELINE] not a recognized swap"
                );
                return PipelineOutcome::Unrecognized;
            }
        };

        let key = dedup_key(&event.signature, address);
        if !self.dedup.check_and_mark(&key) {
            debug!(key = %key, "[PIPELINE] duplicate delivery dropped");
            return PipelineOutcome::Duplicate;
        }
        if let Err(e) = self.journal.record(&key, now_secs()).await {
            // A mark is only kept once it is journaled.
            self.dedup.forget(&key);
            error!(key = %key, "[PIPELINE] dedup journal write failed: {e}");
            return PipelineOutcome::PersistenceFailed;
        }

        if !self.limiter.allow() {
            warn!(
                key = %key,
                cap = self.limiter.cap(),
                "[PIPELINE] rate limit reached, alert dropped"
            );
            return PipelineOutcome::RateLimited;
        }

        event.label = self.registry.get(address).map(|entry| entry.label);
        self.deliver(&event).await
    }

    async fn deliver(&self, event: &TradeEvent) -> PipelineOutcome {
        let alert = format_trade(event);
        match self.notifier.deliver(&self.chat_id, &alert).await {
            Ok(()) => {
                self.stats.set_last_delivered_at(now_secs().max(0) as u64);
                info!(
                    event = "ALERT_DELIVERED",
                    signature = %event.signature,
                    label = event.label_display(),
                    direction = %event.direction,
                    token = %event.token_display(),
                    native = %event.native_amount,
                    venue = %event.venue,
                    "[ALERT] delivered"
                );
                PipelineOutcome::Delivered
            }
            Err(e) => {
                error!(signature = %event.signature, "[ALERT] delivery failed: {e}");
                PipelineOutcome::DeliveryFailed
            }
        }
    }
}

//! Shared pipeline counters for the /health and /stats endpoints.
//! Updated by EventPipeline and the webhook handler.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

use crate::types::PipelineOutcome;

/// One counter per pipeline outcome plus webhook intake counters.
#[derive(Default)]
pub struct PipelineStats {
    pub webhooks_received: AtomicU64,
    pub notifications_rejected: AtomicU64,
    pub not_watched: AtomicU64,
    pub alerts_disabled: AtomicU64,
    pub unrecognized: AtomicU64,
    pub duplicates: AtomicU64,
    pub persistence_failed: AtomicU64,
    pub rate_limited: AtomicU64,
    pub delivery_failed: AtomicU64,
    pub delivered: AtomicU64,
    /// Unix seconds of the last successful delivery (0 = none).
    pub last_delivered_at: AtomicU64,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct StatsSnapshot {
    pub webhooks_received: u64,
    pub notifications_rejected: u64,
    pub not_watched: u64,
    pub alerts_disabled: u64,
    pub unrecognized: u64,
    pub duplicates: u64,
    pub persistence_failed: u64,
    pub rate_limited: u64,
    pub delivery_failed: u64,
    pub delivered: u64,
    pub last_delivered_at: u64,
}

impl PipelineStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_webhook(&self, rejected: usize) {
        self.webhooks_received.fetch_add(1, Ordering::Relaxed);
        self.notifications_rejected
            .fetch_add(rejected as u64, Ordering::Relaxed);
    }

    pub fn record(&self, outcome: PipelineOutcome) {
        let counter = match outcome {
            PipelineOutcome::NotWatched => &self.not_watched,
            PipelineOutcome::AlertsDisabled => &self.alerts_disabled,
            PipelineOutcome::Unrecognized => &self.unrecognized,
            PipelineOutcome::Duplicate => &self.duplicates,
            PipelineOutcome::PersistenceFailed => &self.persistence_failed,
            PipelineOutcome::RateLimited => &self.rate_limited,
            PipelineOutcome::DeliveryFailed => &self.delivery_failed,
            PipelineOutcome::Delivered => &self.delivered,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn set_last_delivered_at(&self, unix_secs: u64) {
        self.last_delivered_at.store(unix_secs, Ordering::Relaxed);
    }

    pub fn delivered(&self) -> u64 {
        self.delivered.load(Ordering::Relaxed)
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        let load = |c: &AtomicU64| c.load(Ordering::Relaxed);
        StatsSnapshot {
            webhooks_received: load(&self.webhooks_received),
            notifications_rejected: load(&self.notifications_rejected),
            not_watched: load(&self.not_watched),
            alerts_disabled: load(&self.alerts_disabled),
            unrecognized: load(&self.unrecognized),
            duplicates: load(&self.duplicates),
            persistence_failed: load(&self.persistence_failed),
            rate_limited: load(&self.rate_limited),
            delivery_failed: load(&self.delivery_failed),
            delivered: load(&self.delivered),
            last_delivered_at: load(&self.last_delivered_at),
        }
    }
}

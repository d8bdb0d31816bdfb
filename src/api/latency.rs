//! In-memory latency histogram for pipeline instrumentation.
//! Records time from webhook receipt to the terminal outcome of a notification.

use std::sync::Mutex;
use std::time::Duration;

use serde::Serialize;

/// Shared latency stats. Pipeline records, API reads.
/// Values stored in microseconds.
pub struct LatencyStats {
    inner: Mutex<Option<hdrhistogram::Histogram<u64>>>,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct LatencySummary {
    pub samples: u64,
    pub p50_us: Option<u64>,
    pub p95_us: Option<u64>,
    pub p99_us: Option<u64>,
}

impl LatencyStats {
    /// Tracks 1us to 100s, 3 significant figures.
    pub fn new() -> Self {
        let histogram = hdrhistogram::Histogram::new_with_bounds(1, 100_000_000, 3).ok();
        Self {
            inner: Mutex::new(histogram),
        }
    }

    pub fn record_us(&self, us: u64) {
        if let Ok(mut guard) = self.inner.lock() {
            if let Some(h) = guard.as_mut() {
                // Out-of-range samples saturate instead of being dropped.
                h.saturating_record(us.max(1));
            }
        }
    }

    pub fn record(&self, d: Duration) {
        let us = d.as_micros().min(u128::from(u64::MAX)) as u64;
        self.record_us(us);
    }

    /// Sample count and p50/p95/p99. Percentiles are None without samples.
    pub fn summary(&self) -> LatencySummary {
        let empty = LatencySummary {
            samples: 0,
            p50_us: None,
            p95_us: None,
            p99_us: None,
        };
        let Ok(guard) = self.inner.lock() else {
            return empty;
        };
        let Some(h) = guard.as_ref().filter(|h| h.len() > 0) else {
            return empty;
        };
        LatencySummary {
            samples: h.len(),
            p50_us: Some(h.value_at_quantile(0.5)),
            p95_us: Some(h.value_at_quantile(0.95)),
            p99_us: Some(h.value_at_quantile(0.99)),
        }
    }
}

impl Default for LatencyStats {
    fn default() -> Self {
        Self::new()
    }
}

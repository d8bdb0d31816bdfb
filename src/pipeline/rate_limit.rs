use std::sync::Mutex;
use std::time::{Duration, Instant};

struct WindowState {
    started_at: Instant,
    count: u32,
}

/// Fixed-window cap on outbound alerts, global across all watched addresses.
/// Denied events are dropped by the caller, never queued.
pub struct RateLimiter {
    cap: u32,
    window: Duration,
    state: Mutex<WindowState>,
}

impl RateLimiter {
    pub fn new(cap: u32, window: Duration) -> Self {
        Self {
            cap,
            window,
            state: Mutex::new(WindowState {
                started_at: Instant::now(),
                count: 0,
            }),
        }
    }

    pub fn allow(&self) -> bool {
        self.allow_at(Instant::now())
    }

    /// Take one slot in the window containing `now`. The window rolls over
    /// once `window` has elapsed since it started.
    pub fn allow_at(&self, now: Instant) -> bool {
        let Ok(mut state) = self.state.lock() else {
            return false;
        };
        if now.saturating_duration_since(state.started_at) >= self.window {
            state.started_at = now;
            state.count = 0;
        }
        if state.count >= self.cap {
            return false;
        }
        state.count += 1;
        true
    }

    pub fn cap(&self) -> u32 {
        self.cap
    }
}

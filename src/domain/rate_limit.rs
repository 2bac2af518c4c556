//! Per-operation minimum call spacing.

use std::collections::HashMap;
use std::sync::Mutex;
use std::thread;
use std::time::{Duration, Instant};

use tracing::trace;

/// Enforces `min_interval` between calls tagged with the same operation name.
///
/// Safe to share between threads: each caller reserves its slot under the
/// lock and waits outside it, so concurrent callers are spaced in turn.
#[derive(Debug)]
pub struct RateLimiter {
    min_interval: Duration,
    slots: Mutex<HashMap<String, Instant>>,
}

impl RateLimiter {
    pub fn new(min_interval: Duration) -> Self {
        Self {
            min_interval,
            slots: Mutex::new(HashMap::new()),
        }
    }

    pub fn min_interval(&self) -> Duration {
        self.min_interval
    }

    /// Blocks until `operation` may run again; returns the time waited.
    pub fn acquire(&self, operation: &str) -> Duration {
        let now = Instant::now();
        let slot = {
            let mut slots = self.slots.lock().unwrap_or_else(|e| e.into_inner());
            let slot = match slots.get(operation) {
                Some(&last) => (last + self.min_interval).max(now),
                None => now,
            };
            slots.insert(operation.to_string(), slot);
            slot
        };

        let wait = slot.saturating_duration_since(now);
        if !wait.is_zero() {
            trace!(operation, wait_ms = wait.as_millis() as u64, "rate limited");
            thread::sleep(wait);
        }
        wait
    }
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new(Duration::from_millis(100))
    }
}

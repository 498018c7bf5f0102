//! Last real user input, shared with an external poller

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Timestamp of the last user input, in milliseconds since the epoch
///
/// One thread records (a keyboard/mouse hook), the engine reads.
#[derive(Debug, Clone, Default)]
pub struct ActivityFlag {
    last_input_ms: Arc<AtomicU64>,
}

impl ActivityFlag {
    pub fn new() -> Self {
        Self::default()
    }

    /// Note user input at `now` (seconds)
    pub fn record(&self, now: f64) {
        let ms = (now.max(0.0) * 1000.0) as u64;
        self.last_input_ms.store(ms, Ordering::Release);
    }

    /// Seconds timestamp of the last input, `None` if there was none
    pub fn last_input(&self) -> Option<f64> {
        match self.last_input_ms.load(Ordering::Acquire) {
            0 => None,
            ms => Some(ms as f64 / 1000.0),
        }
    }

    /// Whether the user touched something within the last `idle_secs`
    pub fn is_recent(&self, now: f64, idle_secs: f64) -> bool {
        self.last_input()
            .map(|t| now - t < idle_secs)
            .unwrap_or(false)
    }

    /// Seconds until the user counts as idle again, 0 when already idle
    pub fn idle_in(&self, now: f64, idle_secs: f64) -> f64 {
        self.last_input()
            .map(|t| (t + idle_secs - now).max(0.0))
            .unwrap_or(0.0)
    }
}

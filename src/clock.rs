//! Time source
//!
//! Timers, cooldowns and the engine's pauses all read time through this
//! trait so that a whole session can be driven by a manual clock in tests.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Wall-clock time in seconds plus a way to wait
pub trait Clock: Send + Sync {
    /// Current time as seconds since the Unix epoch
    fn now(&self) -> f64;

    /// Block the calling thread for `duration`
    fn sleep(&self, duration: Duration);
}

/// Real clock backed by `SystemTime` and `thread::sleep`
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> f64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs_f64())
            .unwrap_or(0.0)
    }

    fn sleep(&self, duration: Duration) {
        if !duration.is_zero() {
            std::thread::sleep(duration);
        }
    }
}

/// Convert a millisecond count into a `Duration`
pub fn millis(ms: u64) -> Duration {
    Duration::from_millis(ms)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_system_clock_advances() {
        let clock = SystemClock;
        let a = clock.now();
        clock.sleep(millis(2));
        assert!(clock.now() >= a);
        assert!(a > 1_600_000_000.0);
    }
}

//! Host clock adapter.
//!
//! Provides epoch-millisecond timestamps for the runtime driver.  The
//! wall clock is sampled once at construction; later readings add the
//! elapsed monotonic time, so a clock step on the host never moves a
//! deadline backwards.

use std::time::{Instant, SystemTime, UNIX_EPOCH};

use crate::app::ports::ClockPort;
use crate::model::Timestamp;

/// Time adapter for host builds.
pub struct SystemClock {
    start: Instant,
    epoch_at_start_ms: u64,
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl SystemClock {
    pub fn new() -> Self {
        let epoch_at_start_ms = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| u64::try_from(d.as_millis()).unwrap_or(u64::MAX))
            .unwrap_or(0);
        Self {
            start: Instant::now(),
            epoch_at_start_ms,
        }
    }

    /// Milliseconds since construction (monotonic).
    pub fn uptime_ms(&self) -> u64 {
        u64::try_from(self.start.elapsed().as_millis()).unwrap_or(u64::MAX)
    }
}

impl ClockPort for SystemClock {
    fn now(&self) -> Timestamp {
        Timestamp::from_millis(self.epoch_at_start_ms.saturating_add(self.uptime_ms()))
    }
}

use std::time::Duration;

use tokio::time::{Instant, Interval, MissedTickBehavior};

use crate::config::HeartbeatConfig;

pub const DEFAULT_HEARTBEAT_INTERVAL: Duration = Duration::from_secs(45);
pub const DEFAULT_HEARTBEAT_TIMEOUT: Duration = Duration::from_secs(90);

/// Tracks client liveness for one connection.
///
/// Any inbound frame counts as a sign of life. The connection is checked on
/// every interval tick and dropped once it has been silent for `timeout`.
#[derive(Debug)]
pub struct HeartbeatMonitor {
    timeout: Duration,
    last_seen: Instant,
}

impl HeartbeatMonitor {
    pub fn new(config: &HeartbeatConfig) -> Self {
        Self::started_at(config.timeout, Instant::now())
    }

    fn started_at(timeout: Duration, now: Instant) -> Self {
        Self {
            timeout,
            last_seen: now,
        }
    }

    pub fn touch(&mut self) {
        self.last_seen = Instant::now();
    }

    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Instant::now())
    }

    fn is_expired_at(&self, now: Instant) -> bool {
        now.saturating_duration_since(self.last_seen) > self.timeout
    }
}

/// Ticker for liveness checks. A stalled task skips missed ticks instead of
/// firing them in a burst.
pub fn check_interval(config: &HeartbeatConfig) -> Interval {
    let mut interval = tokio::time::interval(config.interval);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    interval
}

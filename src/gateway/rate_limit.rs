use std::time::Duration;

use tokio::time::Instant;

use crate::config::GatewayLimits;

/// Window duration in seconds. Tokens refill fully after this period.
const WINDOW_SECS: u64 = 60;
const WINDOW_MS: u64 = WINDOW_SECS * 1000;

/// Token bucket limiting inbound frames on one connection.
#[derive(Debug, Clone)]
pub struct FrameBucket {
    capacity: u32,
    remaining: u32,
    last_refill: Instant,
}

impl FrameBucket {
    pub fn new(limits: &GatewayLimits) -> Self {
        Self::with_capacity(limits.rate_limit.saturating_add(limits.rate_burst), Instant::now())
    }

    fn with_capacity(capacity: u32, now: Instant) -> Self {
        Self {
            capacity,
            remaining: capacity,
            last_refill: now,
        }
    }

    /// Take one token. Returns `false` if the bucket is empty.
    pub fn try_acquire(&mut self) -> bool {
        self.try_acquire_at(Instant::now())
    }

    fn try_acquire_at(&mut self, now: Instant) -> bool {
        self.refill(now);
        if self.remaining == 0 {
            false
        } else {
            self.remaining -= 1;
            true
        }
    }

    /// Credit whole tokens for the time since `last_refill`. The clock only
    /// advances by the time those tokens cost, so partial tokens carry over.
    fn refill(&mut self, now: Instant) {
        let capacity = u64::from(self.capacity);
        let elapsed_ms = now.saturating_duration_since(self.last_refill).as_millis();
        if elapsed_ms >= u128::from(WINDOW_MS) || capacity == 0 {
            self.remaining = self.capacity;
            self.last_refill = now;
            return;
        }

        let elapsed_ms = elapsed_ms as u64;
        let tokens = elapsed_ms * capacity / WINDOW_MS;
        if tokens == 0 {
            return;
        }
        if u64::from(self.remaining) + tokens >= capacity {
            self.remaining = self.capacity;
            self.last_refill = now;
        } else {
            self.remaining += tokens as u32;
            self.last_refill += Duration::from_millis(tokens * WINDOW_MS / capacity);
        }
    }
}

//! Throughput limiter for one transfer.
//!
//! Tracks cumulative bytes against wall-clock time since creation; after each
//! chunk the copy loop calls [`RateLimiter::throttle`], which sleeps in small
//! fixed steps while the instantaneous rate is above the ceiling. A ceiling
//! of `None` disables throttling entirely.

use std::time::{Duration, Instant};

const SLEEP_STEP: Duration = Duration::from_millis(10);

pub struct RateLimiter {
    ceiling: Option<u64>,
    started: Instant,
    transferred: u64,
}

impl RateLimiter {
    pub fn new(ceiling: Option<u64>) -> Self {
        Self {
            ceiling,
            started: Instant::now(),
            transferred: 0,
        }
    }

    /// The ceiling to seed a transfer with: the larger of the user's group
    /// ceiling and the server-wide ceiling; an unlimited side wins.
    pub fn effective_ceiling(group: Option<u64>, server: Option<u64>) -> Option<u64> {
        match (group, server) {
            (Some(g), Some(s)) => Some(g.max(s)),
            _ => None,
        }
    }

    /// Accounts for `bytes` just transferred and sleeps until the cumulative
    /// rate drops back under the ceiling.
    pub async fn throttle(&mut self, bytes: u64) {
        self.transferred += bytes;
        let Some(limit) = self.ceiling else {
            return;
        };
        loop {
            let elapsed = self.started.elapsed().as_secs_f64();
            if elapsed > 0.0 && self.transferred as f64 / elapsed <= limit as f64 {
                break;
            }
            tokio::time::sleep(SLEEP_STEP).await;
        }
    }

    /// Cumulative throughput in bytes per second since the limiter started.
    pub fn current_rate(&self) -> f64 {
        let elapsed = self.started.elapsed().as_secs_f64();
        if elapsed <= 0.0 {
            return 0.0;
        }
        self.transferred as f64 / elapsed
    }
}

//! Named per-user statistics with group-defined upper limits.
//!
//! Counters are keyed by (user, day) and live for the process lifetime. All
//! sessions of one user share the same counters behind a per-user lock so
//! concurrent transfers cannot jointly overshoot a limit by more than one
//! buffered chunk: increments are applied and checked under that lock.

use std::collections::HashMap;
use std::sync::{Arc, Mutex as StdMutex};
use tokio::sync::Mutex;

use super::error::QuotaError;

/// Upper limits for one user's daily statistics; `None` = unlimited.
#[derive(Debug, Clone, Copy, Default)]
pub struct StatLimits {
    pub max_bytes_up: Option<u64>,
    pub max_files_up: Option<u64>,
    pub max_bytes_down: Option<u64>,
    pub max_files_down: Option<u64>,
}

#[derive(Debug, Default)]
pub struct UserCounters {
    pub bytes_uploaded: u64,
    pub files_uploaded: u64,
    pub bytes_downloaded: u64,
    pub files_downloaded: u64,
    rate_samples: u64,
    mean_rate: f64,
}

impl UserCounters {
    /// Folds one instantaneous throughput sample (bytes/s) into the running
    /// incremental mean. Deliberately unbounded over the counter's lifetime.
    pub fn note_rate_sample(&mut self, bytes_per_sec: f64) {
        self.rate_samples += 1;
        self.mean_rate += (bytes_per_sec - self.mean_rate) / self.rate_samples as f64;
    }

    pub fn average_rate(&self) -> f64 {
        self.mean_rate
    }
}

#[derive(Hash, PartialEq, Eq, Clone)]
struct StatKey {
    user: String,
    day: String,
}

/// Server-wide registry of per-(user, day) counters.
pub struct QuotaRegistry {
    inner: StdMutex<HashMap<StatKey, Arc<Mutex<UserCounters>>>>,
}

impl Default for QuotaRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl QuotaRegistry {
    pub fn new() -> Self {
        Self {
            inner: StdMutex::new(HashMap::new()),
        }
    }

    fn today() -> String {
        chrono::Local::now().format("%Y%m%d").to_string()
    }

    /// The shared counter cell for this user's current day.
    pub fn counters(&self, user: &str) -> Arc<Mutex<UserCounters>> {
        let key = StatKey {
            user: user.to_string(),
            day: Self::today(),
        };
        let mut map = self.inner.lock().expect("quota registry poisoned");
        Arc::clone(map.entry(key).or_default())
    }

    /// Pre-transfer upload check: fails when the user is already at or over
    /// a byte or file limit.
    pub async fn check_upload(&self, user: &str, limits: &StatLimits) -> Result<(), QuotaError> {
        let cell = self.counters(user);
        let counters = cell.lock().await;
        if let Some(max) = limits.max_bytes_up {
            if counters.bytes_uploaded >= max {
                return Err(QuotaError::QuotaExceeded(user.to_string()));
            }
        }
        if let Some(max) = limits.max_files_up {
            if counters.files_uploaded >= max {
                return Err(QuotaError::QuotaExceeded(user.to_string()));
            }
        }
        Ok(())
    }

    /// Charges one received chunk against the upload byte limit.
    ///
    /// The increment is applied first (the bytes are already on disk), then
    /// checked: crossing the limit reports an error so the transfer aborts
    /// within one chunk of the boundary.
    pub async fn charge_upload(
        &self,
        user: &str,
        limits: &StatLimits,
        bytes: u64,
    ) -> Result<(), QuotaError> {
        let cell = self.counters(user);
        let mut counters = cell.lock().await;
        counters.bytes_uploaded += bytes;
        if let Some(max) = limits.max_bytes_up {
            if counters.bytes_uploaded > max {
                return Err(QuotaError::QuotaExceeded(user.to_string()));
            }
        }
        Ok(())
    }

    pub async fn record_upload_file(&self, user: &str) {
        let cell = self.counters(user);
        cell.lock().await.files_uploaded += 1;
    }

    pub async fn check_download(&self, user: &str, limits: &StatLimits) -> Result<(), QuotaError> {
        let cell = self.counters(user);
        let counters = cell.lock().await;
        if let Some(max) = limits.max_bytes_down {
            if counters.bytes_downloaded >= max {
                return Err(QuotaError::QuotaExceeded(user.to_string()));
            }
        }
        if let Some(max) = limits.max_files_down {
            if counters.files_downloaded >= max {
                return Err(QuotaError::QuotaExceeded(user.to_string()));
            }
        }
        Ok(())
    }

    pub async fn record_download(&self, user: &str, bytes: u64) {
        let cell = self.counters(user);
        let mut counters = cell.lock().await;
        counters.bytes_downloaded += bytes;
    }

    pub async fn record_download_file(&self, user: &str) {
        let cell = self.counters(user);
        cell.lock().await.files_downloaded += 1;
    }

    pub async fn note_rate_sample(&self, user: &str, bytes_per_sec: f64) {
        let cell = self.counters(user);
        cell.lock().await.note_rate_sample(bytes_per_sec);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn upload_charge_crosses_limit_by_at_most_one_chunk() {
        let registry = QuotaRegistry::new();
        let limits = StatLimits {
            max_bytes_up: Some(1000),
            ..Default::default()
        };

        // 4 chunks of 300 bytes: the fourth crosses the 1000-byte limit.
        for _ in 0..3 {
            registry.charge_upload("alice", &limits, 300).await.unwrap();
        }
        assert!(registry.charge_upload("alice", &limits, 300).await.is_err());

        let cell = registry.counters("alice");
        let counters = cell.lock().await;
        assert!(counters.bytes_uploaded <= 1000 + 300);
    }

    #[tokio::test]
    async fn concurrent_sessions_share_one_limit() {
        let registry = Arc::new(QuotaRegistry::new());
        let limits = StatLimits {
            max_bytes_up: Some(10_000),
            ..Default::default()
        };

        // Two "sessions" of the same user each push 100-byte chunks until
        // rejected; jointly they must not exceed the limit by more than one
        // chunk.
        let mut tasks = Vec::new();
        for _ in 0..2 {
            let registry = Arc::clone(&registry);
            tasks.push(tokio::spawn(async move {
                loop {
                    if registry.charge_upload("bob", &limits, 100).await.is_err() {
                        break;
                    }
                }
            }));
        }
        for task in tasks {
            task.await.unwrap();
        }

        let cell = registry.counters("bob");
        let counters = cell.lock().await;
        assert!(counters.bytes_uploaded <= 10_000 + 100);
    }

    #[tokio::test]
    async fn pre_check_rejects_exhausted_user() {
        let registry = QuotaRegistry::new();
        let limits = StatLimits {
            max_files_up: Some(1),
            ..Default::default()
        };
        registry.check_upload("carol", &limits).await.unwrap();
        registry.record_upload_file("carol").await;
        assert!(registry.check_upload("carol", &limits).await.is_err());
    }

    #[test]
    fn incremental_mean_is_order_insensitive_for_constant_series() {
        let mut counters = UserCounters::default();
        for _ in 0..10 {
            counters.note_rate_sample(512.0);
        }
        assert!((counters.average_rate() - 512.0).abs() < 1e-9);

        let mut counters = UserCounters::default();
        counters.note_rate_sample(100.0);
        counters.note_rate_sample(300.0);
        assert!((counters.average_rate() - 200.0).abs() < 1e-9);
    }
}

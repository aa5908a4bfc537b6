use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::{Duration, Instant, SystemTime};

use async_trait::async_trait;

use super::{capped, StorageBackend};
use crate::error::{RateLimiterError, Result};

const DEFAULT_SWEEP_INTERVAL: Duration = Duration::from_secs(10);

/// In-process backend; state is lost on restart and not shared between
/// instances of the service.
///
/// Expired counters and blocks are swept from the hot path at most once per
/// sweep interval, so memory stays bounded by the keys seen recently.
#[derive(Debug, Clone)]
pub struct MemoryBackend {
    counters: Arc<RwLock<Counters>>,
    blocks: Arc<RwLock<HashMap<String, SystemTime>>>,
    sweep_interval: Duration,
}

#[derive(Debug)]
struct Counters {
    entries: HashMap<String, WindowCounter>,
    last_sweep: Instant,
}

#[derive(Debug, Clone, Copy)]
struct WindowCounter {
    started: Instant,
    window: Duration,
    count: u64,
}

impl WindowCounter {
    fn expired(&self, now: Instant) -> bool {
        now.duration_since(self.started) >= self.window
    }
}

impl Default for MemoryBackend {
    fn default() -> Self {
        Self::with_sweep_interval(DEFAULT_SWEEP_INTERVAL)
    }
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_sweep_interval(sweep_interval: Duration) -> Self {
        Self {
            counters: Arc::new(RwLock::new(Counters {
                entries: HashMap::new(),
                last_sweep: Instant::now(),
            })),
            blocks: Arc::new(RwLock::new(HashMap::new())),
            sweep_interval,
        }
    }

    /// Number of counters and blocks currently held.
    pub fn tracked_keys(&self) -> Result<usize> {
        let counters = self.counters.read().map_err(|_| {
            RateLimiterError::Internal("Failed to acquire read lock on counters".to_string())
        })?;
        let blocks = self.blocks.read().map_err(|_| {
            RateLimiterError::Internal("Failed to acquire read lock on blocks".to_string())
        })?;
        Ok(counters.entries.len() + blocks.len())
    }

    /// Drop counters whose window has passed and blocks that have ended.
    pub fn cleanup_expired(&self) -> Result<usize> {
        let mut counters = self.counters.write().map_err(|_| {
            RateLimiterError::Internal("Failed to acquire write lock on counters".to_string())
        })?;
        self.sweep(&mut counters)
    }

    fn sweep(&self, counters: &mut Counters) -> Result<usize> {
        let now = Instant::now();
        let wall_now = SystemTime::now();

        let mut blocks = self.blocks.write().map_err(|_| {
            RateLimiterError::Internal("Failed to acquire write lock on blocks".to_string())
        })?;

        let initial = counters.entries.len() + blocks.len();
        counters.entries.retain(|_, counter| !counter.expired(now));
        blocks.retain(|_, until| *until > wall_now);
        counters.last_sweep = now;

        Ok(initial - counters.entries.len() - blocks.len())
    }
}

#[async_trait]
impl StorageBackend for MemoryBackend {
    async fn record_attempt(&self, key: &str, window: Duration) -> Result<u64> {
        let now = Instant::now();
        let window = capped(window);
        let mut counters = self.counters.write().map_err(|_| {
            RateLimiterError::Internal("Failed to acquire write lock on counters".to_string())
        })?;

        if now.duration_since(counters.last_sweep) >= self.sweep_interval {
            let removed = self.sweep(&mut counters)?;
            tracing::debug!(removed, "Swept expired rate limit entries");
        }

        let counter = counters
            .entries
            .entry(key.to_string())
            .or_insert(WindowCounter {
                started: now,
                window,
                count: 0,
            });

        if counter.expired(now) {
            counter.started = now;
            counter.count = 0;
        }
        counter.window = window;
        counter.count += 1;

        Ok(counter.count)
    }

    async fn blocked_until(&self, key: &str) -> Result<Option<SystemTime>> {
        let now = SystemTime::now();
        let until = {
            let blocks = self.blocks.read().map_err(|_| {
                RateLimiterError::Internal("Failed to acquire read lock on blocks".to_string())
            })?;
            blocks.get(key).copied()
        };

        match until {
            Some(until) if until > now => Ok(Some(until)),
            Some(_) => {
                let mut blocks = self.blocks.write().map_err(|_| {
                    RateLimiterError::Internal("Failed to acquire write lock on blocks".to_string())
                })?;
                if blocks.get(key).is_some_and(|until| *until <= now) {
                    blocks.remove(key);
                }
                Ok(None)
            }
            None => Ok(None),
        }
    }

    async fn block(&self, key: &str, duration: Duration) -> Result<SystemTime> {
        let until = SystemTime::now() + capped(duration);
        let mut blocks = self.blocks.write().map_err(|_| {
            RateLimiterError::Internal("Failed to acquire write lock on blocks".to_string())
        })?;
        blocks.insert(key.to_string(), until);
        Ok(until)
    }
}

//! Storage backends for per-scope attempt counters and block marks.
//!
//! The admission logic that decides allow/block lives outside this crate; it
//! talks to whichever backend the resolved configuration selected through
//! [`StorageBackend`].

mod memory;
mod redis;

pub use self::memory::MemoryBackend;
pub use self::redis::{RedisBackend, RedisSettings};

use crate::error::Result;
use async_trait::async_trait;
use serde::Serialize;
use std::time::{Duration, SystemTime};

/// Capability consumed by the admission-control component.
#[async_trait]
pub trait StorageBackend: Send + Sync {
    /// Record one attempt for `key` and return the count inside the active
    /// window of length `window`.
    async fn record_attempt(&self, key: &str, window: Duration) -> Result<u64>;

    /// When `key` stops being blocked, or `None` if it is not blocked now.
    async fn blocked_until(&self, key: &str) -> Result<Option<SystemTime>>;

    /// Block `key` for `duration` and return when the block ends.
    async fn block(&self, key: &str, duration: Duration) -> Result<SystemTime>;
}

/// Longest window or block a backend honours; longer durations are capped.
pub const MAX_DURATION: Duration = Duration::from_secs(100 * 365 * 24 * 60 * 60);

pub(crate) fn capped(duration: Duration) -> Duration {
    duration.min(MAX_DURATION)
}

/// Which backend a resolved configuration ended up with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    Memory,
    Redis,
    Custom,
}

impl std::fmt::Display for BackendKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BackendKind::Memory => write!(f, "Default"),
            BackendKind::Redis => write!(f, "Redis"),
            BackendKind::Custom => write!(f, "Custom"),
        }
    }
}

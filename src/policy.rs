use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Requests-per-second ceiling and block duration for one policy scope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RatePolicy {
    pub max_requests_per_second: u64,
    #[serde(rename = "blockTimeMilliseconds")]
    pub block_duration_millis: u64,
}

impl RatePolicy {
    /// Create a new rate policy
    pub const fn new(max_requests_per_second: u64, block_duration_millis: u64) -> Self {
        Self {
            max_requests_per_second,
            block_duration_millis,
        }
    }

    /// Block duration as a `Duration`
    pub fn block_duration(&self) -> Duration {
        Duration::from_millis(self.block_duration_millis)
    }

    /// Copy of this policy with the max requests replaced
    pub fn with_max_requests(self, max_requests_per_second: u64) -> Self {
        Self {
            max_requests_per_second,
            ..self
        }
    }

    /// Copy of this policy with the block duration replaced
    pub fn with_block_duration_millis(self, block_duration_millis: u64) -> Self {
        Self {
            block_duration_millis,
            ..self
        }
    }
}

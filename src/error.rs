use thiserror::Error;

#[derive(Debug, Error)]
pub enum RateLimiterError {
    /// The networked backend was selected but no address was configured.
    #[error("RATE_LIMITER_REDIS_ADDRESS env is required when using redis adapter with env configuration")]
    MissingRedisAddress,

    #[error("Invalid redis address '{0}': expected host or host:port")]
    InvalidRedisAddress(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl RateLimiterError {
    /// Errors that mean the process must not start serving traffic.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            RateLimiterError::MissingRedisAddress
                | RateLimiterError::InvalidRedisAddress(_)
                | RateLimiterError::Config(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, RateLimiterError>;

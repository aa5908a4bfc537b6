use std::time::{Duration, SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use redis::aio::MultiplexedConnection;
use redis::{Client, IntoConnectionInfo};
use serde::Serialize;
use tokio::sync::OnceCell;

use super::{capped, StorageBackend};
use crate::error::{RateLimiterError, Result};

const ATTEMPTS_PREFIX: &str = "ratelimiter:attempts";
const BLOCK_PREFIX: &str = "ratelimiter:block";

/// Connection parameters for the networked backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RedisSettings {
    pub address: String,
    #[serde(skip_serializing)]
    pub password: String,
    pub db: i64,
}

impl RedisSettings {
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            password: String::new(),
            db: 0,
        }
    }

    pub fn with_password(mut self, password: impl Into<String>) -> Self {
        self.password = password.into();
        self
    }

    pub fn with_db(mut self, db: i64) -> Self {
        self.db = db;
        self
    }

    fn client(&self) -> Result<Client> {
        let address = self.address.trim();
        if address.is_empty() {
            return Err(RateLimiterError::InvalidRedisAddress(self.address.clone()));
        }

        let url = if address.contains("://") {
            address.to_string()
        } else {
            format!("redis://{}", address)
        };

        let mut info = url
            .as_str()
            .into_connection_info()
            .map_err(|_| RateLimiterError::InvalidRedisAddress(self.address.clone()))?;
        info.redis.db = self.db;
        if !self.password.is_empty() {
            info.redis.password = Some(self.password.clone());
        }

        Client::open(info)
            .map_err(|_| RateLimiterError::InvalidRedisAddress(self.address.clone()))
    }
}

/// Backend storing counters and block marks in Redis, so every instance of
/// the service shares them. The connection is opened on first use.
pub struct RedisBackend {
    client: Client,
    settings: RedisSettings,
    connection: OnceCell<MultiplexedConnection>,
}

impl RedisBackend {
    /// Build the client without connecting.
    pub fn new(settings: RedisSettings) -> Result<Self> {
        let client = settings.client()?;
        Ok(Self {
            client,
            settings,
            connection: OnceCell::new(),
        })
    }

    pub fn settings(&self) -> &RedisSettings {
        &self.settings
    }

    async fn connection(&self) -> Result<MultiplexedConnection> {
        let conn = self
            .connection
            .get_or_try_init(|| async {
                tracing::info!(
                    address = %self.settings.address,
                    db = self.settings.db,
                    "Connecting to Redis"
                );
                self.client.get_multiplexed_async_connection().await
            })
            .await?;
        Ok(conn.clone())
    }
}

impl std::fmt::Debug for RedisBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisBackend")
            .field("address", &self.settings.address)
            .field("db", &self.settings.db)
            .finish()
    }
}

#[async_trait]
impl StorageBackend for RedisBackend {
    async fn record_attempt(&self, key: &str, window: Duration) -> Result<u64> {
        let redis_key = format!("{}:{}", ATTEMPTS_PREFIX, key);
        let mut conn = self.connection().await?;

        let (count,): (u64,) = attempt_pipeline(&redis_key, window)
            .query_async(&mut conn)
            .await?;

        Ok(count)
    }

    async fn blocked_until(&self, key: &str) -> Result<Option<SystemTime>> {
        let redis_key = format!("{}:{}", BLOCK_PREFIX, key);
        let mut conn = self.connection().await?;

        let until: Option<u64> = redis::cmd("GET")
            .arg(&redis_key)
            .query_async(&mut conn)
            .await?;

        Ok(until
            .and_then(|millis| UNIX_EPOCH.checked_add(Duration::from_millis(millis)))
            .filter(|until| *until > SystemTime::now()))
    }

    async fn block(&self, key: &str, duration: Duration) -> Result<SystemTime> {
        let duration = capped(duration);
        let until = SystemTime::now() + duration;
        let millis = window_millis(duration);
        if millis == 0 {
            return Ok(until);
        }

        let until_millis = until
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_millis() as u64;

        let redis_key = format!("{}:{}", BLOCK_PREFIX, key);
        let mut conn = self.connection().await?;
        redis::cmd("SET")
            .arg(&redis_key)
            .arg(until_millis)
            .arg("PX")
            .arg(millis)
            .query_async::<_, ()>(&mut conn)
            .await?;

        Ok(until)
    }
}

/// Creates the counter with its expiry and increments it in one
/// transaction, so a counter never outlives its window.
fn attempt_pipeline(redis_key: &str, window: Duration) -> redis::Pipeline {
    let mut pipe = redis::pipe();
    pipe.atomic()
        .cmd("SET")
        .arg(redis_key)
        .arg(0)
        .arg("PX")
        .arg(window_millis(capped(window)).max(1))
        .arg("NX")
        .ignore()
        .cmd("INCR")
        .arg(redis_key);
    pipe
}

fn window_millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

//! Redis connection pool using deadpool-redis.
//!
//! Besides handing out connections, the pool carries the few hash commands
//! the presence snapshot needs.

use board_core::TransportError;
use deadpool_redis::{Config, Pool, Runtime};
use redis::AsyncCommands;
use std::collections::HashMap;
use std::time::Duration;

/// Redis pool configuration
#[derive(Debug, Clone)]
pub struct RedisPoolConfig {
    /// Redis connection URL (e.g., `redis://localhost:6379`)
    pub url: String,
    /// Maximum number of connections in the pool
    pub max_connections: usize,
}

impl Default for RedisPoolConfig {
    fn default() -> Self {
        Self {
            url: "redis://127.0.0.1:6379".to_string(),
            max_connections: 10,
        }
    }
}

impl From<&board_common::RedisConfig> for RedisPoolConfig {
    fn from(config: &board_common::RedisConfig) -> Self {
        Self {
            url: config.url.clone(),
            max_connections: config.max_connections as usize,
        }
    }
}

/// Error type for Redis pool operations
#[derive(Debug, thiserror::Error)]
pub enum RedisPoolError {
    #[error("Failed to create Redis pool: {0}")]
    CreatePool(String),

    #[error("Failed to get connection from pool: {0}")]
    GetConnection(#[from] deadpool_redis::PoolError),

    #[error("Redis command error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
}

impl From<RedisPoolError> for TransportError {
    fn from(err: RedisPoolError) -> Self {
        match err {
            RedisPoolError::Serialization(e) => Self::Serialization(e.to_string()),
            RedisPoolError::CreatePool(_) | RedisPoolError::GetConnection(_) => {
                Self::Unavailable(err.to_string())
            }
            RedisPoolError::Redis(_) | RedisPoolError::InvalidArgument(_) => {
                Self::Publish(err.to_string())
            }
        }
    }
}

/// Result type for Redis pool operations
pub type RedisResult<T> = Result<T, RedisPoolError>;

/// Managed Redis connection pool
#[derive(Clone)]
pub struct RedisPool {
    pool: Pool,
    url: String,
}

impl std::fmt::Debug for RedisPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisPool")
            .field("status", &self.pool.status())
            .finish_non_exhaustive()
    }
}

impl RedisPool {
    /// Create a new Redis pool with the given configuration
    ///
    /// No connection is made until the first command.
    ///
    /// # Errors
    /// Returns an error if the URL cannot be parsed into a pool config
    pub fn new(config: RedisPoolConfig) -> RedisResult<Self> {
        let cfg = Config::from_url(&config.url);
        let pool = cfg
            .builder()
            .map_err(|e| RedisPoolError::CreatePool(e.to_string()))?
            .max_size(config.max_connections)
            .runtime(Runtime::Tokio1)
            .build()
            .map_err(|e| RedisPoolError::CreatePool(e.to_string()))?;

        tracing::info!(
            url = %redact_url(&config.url),
            max_connections = config.max_connections,
            "Redis pool created"
        );

        Ok(Self {
            pool,
            url: config.url,
        })
    }

    /// Create a new Redis pool from board-common config
    ///
    /// # Errors
    /// See [`RedisPool::new`]
    pub fn from_config(config: &board_common::RedisConfig) -> RedisResult<Self> {
        Self::new(RedisPoolConfig::from(config))
    }

    /// URL the pool connects to, used to open dedicated pub/sub connections
    #[must_use]
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Get a connection from the pool
    ///
    /// # Errors
    /// Returns an error if no connection can be established
    pub async fn get(&self) -> RedisResult<deadpool_redis::Connection> {
        self.pool.get().await.map_err(RedisPoolError::GetConnection)
    }

    /// Check if the pool is healthy by pinging Redis
    ///
    /// # Errors
    /// Returns an error if Redis does not answer
    pub async fn health_check(&self) -> RedisResult<()> {
        let mut conn = self.get().await?;
        redis::cmd("PING").query_async::<String>(&mut conn).await?;
        Ok(())
    }

    /// Write one hash field as JSON and refresh the hash's expiry
    ///
    /// # Errors
    /// Returns an error if serialization or the Redis command fails
    pub async fn hset_json<V: serde::Serialize>(
        &self,
        key: &str,
        field: &str,
        value: &V,
        ttl: Duration,
    ) -> RedisResult<()> {
        let ttl = i64::try_from(ttl.as_secs())
            .map_err(|_| RedisPoolError::InvalidArgument("TTL value too large".to_string()))?;
        let serialized = serde_json::to_string(value)?;
        let mut conn = self.get().await?;

        redis::pipe()
            .atomic()
            .hset(key, field, &serialized)
            .ignore()
            .expire(key, ttl)
            .ignore()
            .query_async::<()>(&mut conn)
            .await?;

        Ok(())
    }

    /// Read every field of a hash as raw strings
    ///
    /// # Errors
    /// Returns an error if the Redis command fails
    pub async fn hgetall(&self, key: &str) -> RedisResult<HashMap<String, String>> {
        let mut conn = self.get().await?;
        let fields: HashMap<String, String> = conn.hgetall(key).await?;
        Ok(fields)
    }

    /// Remove one hash field
    ///
    /// # Errors
    /// Returns an error if the Redis command fails
    pub async fn hdel(&self, key: &str, field: &str) -> RedisResult<bool> {
        let mut conn = self.get().await?;
        let removed: i32 = conn.hdel(key, field).await?;
        Ok(removed > 0)
    }
}

/// Strip credentials from a Redis URL for logging
fn redact_url(url: &str) -> &str {
    url.split('@').next_back().unwrap_or(url)
}

//! # board-cache
//!
//! Redis layer for group presence.
//!
//! ## Features
//!
//! - **Connection Pool**: Managed Redis connection pool with deadpool
//! - **Pub/Sub**: Shared subscriber connection and publisher for group channels
//! - **Presence**: [`RedisPresenceTransport`], the production `PresenceTransport`
//!
//! ## Example
//!
//! ```ignore
//! use board_cache::{RedisPool, RedisPoolConfig, RedisPresenceConfig, RedisPresenceTransport};
//!
//! let pool = RedisPool::new(RedisPoolConfig::default())?;
//! let transport = RedisPresenceTransport::new(pool, RedisPresenceConfig::default());
//!
//! let subscription = transport.subscribe(&topic, &user_id).await?;
//! transport.track(&subscription.key, meta).await?;
//! ```

pub mod pool;
pub mod presence;
pub mod pubsub;

// Re-export pool types
pub use pool::{RedisPool, RedisPoolConfig, RedisPoolError, RedisResult};

// Re-export presence types
pub use presence::{
    PresenceMessage, RedisPresenceConfig, RedisPresenceTransport, PRESENCE_STATE_PREFIX,
};

// Re-export pubsub types
pub use pubsub::{
    PubSubChannel, Publisher, ReceivedMessage, Subscriber, SubscriberConfig, SubscriberError,
    SubscriberResult,
};

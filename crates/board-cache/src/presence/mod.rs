//! Redis-backed presence transport.

mod redis_transport;
mod wire;

pub use redis_transport::{
    RedisPresenceConfig, RedisPresenceTransport, PRESENCE_STATE_PREFIX,
};
pub use wire::PresenceMessage;

//! Redis Pub/Sub module.
//!
//! Provides publish/subscribe plumbing for the Redis presence transport.

mod channels;
mod publisher;
mod subscriber;

pub use channels::PubSubChannel;
pub use publisher::Publisher;
pub use subscriber::{
    ReceivedMessage, Subscriber, SubscriberConfig, SubscriberError, SubscriberResult,
};

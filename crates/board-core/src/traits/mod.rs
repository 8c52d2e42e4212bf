//! Ports - interfaces the domain needs from infrastructure

mod transport;

pub use transport::{
    PresenceTransport, SubscriptionKey, TransportError, TransportResult, TransportSubscription,
};

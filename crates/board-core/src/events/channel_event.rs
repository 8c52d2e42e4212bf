//! Channel events - what a presence transport delivers to a subscriber
//!
//! Payloads come from other clients and are not trusted to be complete:
//! every field of [`PresenceMeta`] is optional and malformed values
//! deserialize as missing instead of failing the whole event.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::entities::PresenceStatus;
use crate::value_objects::UserId;

/// One published presence entry, as tracked by a single connection
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PresenceMeta {
    #[serde(
        default,
        deserialize_with = "lenient_string",
        skip_serializing_if = "Option::is_none"
    )]
    pub user_id: Option<String>,

    #[serde(
        default,
        deserialize_with = "lenient_string",
        skip_serializing_if = "Option::is_none"
    )]
    pub status: Option<String>,

    #[serde(
        default,
        deserialize_with = "lenient_timestamp",
        skip_serializing_if = "Option::is_none"
    )]
    pub last_seen: Option<DateTime<Utc>>,
}

impl PresenceMeta {
    /// Entry a client publishes for itself
    #[must_use]
    pub fn tracked(user_id: &UserId, status: PresenceStatus, last_seen: DateTime<Utc>) -> Self {
        Self {
            user_id: Some(user_id.to_string()),
            status: Some(status.as_str().to_string()),
            last_seen: Some(last_seen),
        }
    }

    /// Parsed status, `None` when missing or unrecognised
    #[must_use]
    pub fn parsed_status(&self) -> Option<PresenceStatus> {
        self.status.as_deref().and_then(|s| s.parse().ok())
    }

    /// Parsed user id, `None` when missing or blank
    #[must_use]
    pub fn parsed_user_id(&self) -> Option<UserId> {
        self.user_id.as_deref().and_then(|s| UserId::parse(s).ok())
    }
}

/// All entries currently delivered for one presence key
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeerPresence {
    /// Presence key the peer subscribed with (its user id)
    pub key: String,
    /// Entries in delivery order; the transport appends, so the last is the newest
    #[serde(default)]
    pub metas: Vec<PresenceMeta>,
}

impl PeerPresence {
    #[must_use]
    pub fn new(key: impl Into<String>, metas: Vec<PresenceMeta>) -> Self {
        Self {
            key: key.into(),
            metas,
        }
    }

    /// Convenience for a peer with a single entry
    #[must_use]
    pub fn single(key: impl Into<String>, meta: PresenceMeta) -> Self {
        Self::new(key, vec![meta])
    }
}

/// Event delivered on a presence subscription
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChannelEvent {
    /// Subscription acknowledged by the transport
    Subscribed,
    /// Full snapshot of every currently tracked peer
    Sync(Vec<PeerPresence>),
    /// Peers that started being tracked
    Join(Vec<PeerPresence>),
    /// Peers that stopped being tracked
    Leave(Vec<PeerPresence>),
    /// The transport closed the subscription from its side
    Closed,
}

impl ChannelEvent {
    /// Short name for logging
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Subscribed => "subscribed",
            Self::Sync(_) => "sync",
            Self::Join(_) => "join",
            Self::Leave(_) => "leave",
            Self::Closed => "closed",
        }
    }

    /// Peers carried by the event, empty for control events
    #[must_use]
    pub fn peers(&self) -> &[PeerPresence] {
        match self {
            Self::Sync(peers) | Self::Join(peers) | Self::Leave(peers) => peers,
            Self::Subscribed | Self::Closed => &[],
        }
    }
}

fn lenient_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(Value::String(s)) if !s.trim().is_empty() => Some(s),
        Some(Value::Number(n)) => Some(n.to_string()),
        _ => None,
    })
}

fn lenient_timestamp<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(Value::String(s)) => DateTime::parse_from_rfc3339(&s)
            .ok()
            .map(|t| t.with_timezone(&Utc)),
        // epoch milliseconds, as browsers send Date.now()
        Some(Value::Number(n)) => n.as_i64().and_then(DateTime::from_timestamp_millis),
        _ => None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tracked_meta() {
        let now = Utc::now();
        let meta = PresenceMeta::tracked(&UserId::parse("u1").unwrap(), PresenceStatus::Idle, now);

        assert_eq!(meta.parsed_user_id().unwrap().as_str(), "u1");
        assert_eq!(meta.parsed_status(), Some(PresenceStatus::Idle));
        assert_eq!(meta.last_seen, Some(now));
    }

    #[test]
    fn test_full_meta_deserialization() {
        let json = r#"{"user_id":"u1","status":"online","last_seen":"2024-05-01T10:00:00Z"}"#;
        let meta: PresenceMeta = serde_json::from_str(json).unwrap();

        assert_eq!(meta.user_id.as_deref(), Some("u1"));
        assert_eq!(meta.parsed_status(), Some(PresenceStatus::Online));
        assert_eq!(
            meta.last_seen,
            Some(DateTime::parse_from_rfc3339("2024-05-01T10:00:00Z").unwrap().with_timezone(&Utc))
        );
    }

    #[test]
    fn test_partial_meta_deserialization() {
        let meta: PresenceMeta = serde_json::from_str("{}").unwrap();
        assert_eq!(meta, PresenceMeta::default());

        let meta: PresenceMeta =
            serde_json::from_str(r#"{"status":42,"last_seen":"yesterday","user_id":""}"#).unwrap();
        assert!(meta.parsed_user_id().is_none());
        assert!(meta.parsed_status().is_none());
        assert!(meta.last_seen.is_none());
    }

    #[test]
    fn test_epoch_millis_timestamp() {
        let meta: PresenceMeta = serde_json::from_str(r#"{"last_seen":1714557600000}"#).unwrap();
        assert_eq!(meta.last_seen.unwrap().timestamp(), 1_714_557_600);
    }

    #[test]
    fn test_unknown_status_is_not_parsed() {
        let meta = PresenceMeta {
            status: Some("dnd".to_string()),
            ..PresenceMeta::default()
        };
        assert!(meta.parsed_status().is_none());
    }

    #[test]
    fn test_event_kind_and_peers() {
        let event = ChannelEvent::Join(vec![PeerPresence::single("a", PresenceMeta::default())]);
        assert_eq!(event.kind(), "join");
        assert_eq!(event.peers().len(), 1);

        assert!(ChannelEvent::Subscribed.peers().is_empty());
        assert_eq!(ChannelEvent::Closed.kind(), "closed");
    }

    #[test]
    fn test_peer_without_metas_deserializes() {
        let peer: PeerPresence = serde_json::from_str(r#"{"key":"u9"}"#).unwrap();
        assert_eq!(peer.key, "u9");
        assert!(peer.metas.is_empty());
    }
}

//! Presence reconciler - the authoritative `user -> record` map for one group
//!
//! Policy:
//! - `Sync` and `Join` upsert every peer they mention. A sync never removes
//!   peers it does not mention, so snapshots are additive.
//! - `Leave` forces `Offline` stamped with the local time; a peer's own
//!   timestamp is not trusted for its departure.
//! - Within one event, duplicated entries are resolved by [`TieBreak`].
//!   Across events the later event always wins.
//! - Missing fields are filled in (status `Online`, timestamp now) rather
//!   than dropping the entry.

use board_core::{
    ChannelEvent, PeerPresence, PresenceMeta, PresenceRecord, PresenceStatus, TieBreak, UserId,
};
use chrono::{DateTime, Utc};
use std::collections::HashMap;

/// Merges channel events into one record per user
#[derive(Debug, Clone, Default)]
pub struct PresenceReconciler {
    records: HashMap<UserId, PresenceRecord>,
    tie_break: TieBreak,
}

/// One entry picked from a peer, before merging into the map
struct Candidate {
    record: PresenceRecord,
    /// Timestamp as published, `None` when it had to be filled in
    published_at: Option<DateTime<Utc>>,
}

impl PresenceReconciler {
    #[must_use]
    pub fn new(tie_break: TieBreak) -> Self {
        Self {
            records: HashMap::new(),
            tie_break,
        }
    }

    #[must_use]
    pub fn tie_break(&self) -> TieBreak {
        self.tie_break
    }

    /// Apply one delivered event, returning how many records it touched
    pub fn apply(&mut self, event: &ChannelEvent, now: DateTime<Utc>) -> usize {
        let touched = match event {
            ChannelEvent::Sync(peers) | ChannelEvent::Join(peers) => self.upsert(peers, now),
            ChannelEvent::Leave(peers) => self.leave(peers, now),
            ChannelEvent::Subscribed | ChannelEvent::Closed => 0,
        };

        tracing::debug!(
            event = event.kind(),
            peers = event.peers().len(),
            touched,
            known = self.records.len(),
            "Applied presence event"
        );

        touched
    }

    #[must_use]
    pub fn get(&self, user_id: &UserId) -> Option<&PresenceRecord> {
        self.records.get(user_id)
    }

    /// Status of a user; unknown users are `Offline`
    #[must_use]
    pub fn status(&self, user_id: &UserId) -> PresenceStatus {
        self.records
            .get(user_id)
            .map_or(PresenceStatus::Offline, |record| record.status)
    }

    #[must_use]
    pub fn records(&self) -> &HashMap<UserId, PresenceRecord> {
        &self.records
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Discard every record
    pub fn clear(&mut self) {
        self.records.clear();
    }

    fn upsert(&mut self, peers: &[PeerPresence], now: DateTime<Utc>) -> usize {
        let mut batch: Vec<Candidate> = Vec::with_capacity(peers.len());

        for peer in peers {
            let Some(candidate) = self.pick(peer, now) else {
                continue;
            };
            match batch
                .iter_mut()
                .find(|c| c.record.user_id == candidate.record.user_id)
            {
                Some(current) => {
                    if self.replaces(candidate.published_at, current.published_at) {
                        *current = candidate;
                    }
                }
                None => batch.push(candidate),
            }
        }

        let touched = batch.len();
        for candidate in batch {
            self.records
                .insert(candidate.record.user_id.clone(), candidate.record);
        }
        touched
    }

    fn leave(&mut self, peers: &[PeerPresence], now: DateTime<Utc>) -> usize {
        let mut touched = 0;
        for peer in peers {
            let user_id = peer
                .metas
                .last()
                .and_then(PresenceMeta::parsed_user_id)
                .or_else(|| UserId::parse(&peer.key).ok());

            match user_id.and_then(|id| self.records.get_mut(&id)) {
                Some(record) => {
                    record.mark_offline(now);
                    touched += 1;
                }
                None => {
                    tracing::trace!(key = %peer.key, "Leave for unknown peer ignored");
                }
            }
        }
        touched
    }

    /// Choose the entry that represents `peer` in this delivery
    fn pick(&self, peer: &PeerPresence, now: DateTime<Utc>) -> Option<Candidate> {
        let default_meta = PresenceMeta::default();
        let mut chosen: Option<&PresenceMeta> = None;
        for meta in &peer.metas {
            chosen = match chosen {
                Some(current) if !self.replaces(meta.last_seen, current.last_seen) => Some(current),
                _ => Some(meta),
            };
        }
        let meta = chosen.unwrap_or(&default_meta);

        let Some(user_id) = meta
            .parsed_user_id()
            .or_else(|| UserId::parse(&peer.key).ok())
        else {
            tracing::warn!(key = %peer.key, "Presence entry without usable user id, skipping");
            return None;
        };

        let status = meta.parsed_status().unwrap_or_else(|| {
            if let Some(raw) = &meta.status {
                tracing::warn!(user_id = %user_id, status = %raw, "Unknown presence status, assuming online");
            }
            PresenceStatus::Online
        });

        Some(Candidate {
            record: PresenceRecord::new(user_id, status, meta.last_seen.unwrap_or(now)),
            published_at: meta.last_seen,
        })
    }

    /// Whether a later-delivered entry beats an earlier one
    fn replaces(&self, later: Option<DateTime<Utc>>, earlier: Option<DateTime<Utc>>) -> bool {
        match (self.tie_break, later, earlier) {
            (TieBreak::LatestLastSeen, Some(later), Some(earlier)) => later >= earlier,
            _ => true,
        }
    }
}

//! Room membership from presence notifications.
//!
//! The realtime channel reports who is subscribed to a room. Membership keeps
//! at most two occupants in join order: the first plays X, the second O.
//! Handlers dedupe by presence key so repeated delivery is harmless.

use chrono::{DateTime, Utc};
use derive_more::{Display, Error};
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument, warn};

use super::board::Mark;

/// Maximum occupants per room.
pub const MAX_ROOM_OCCUPANTS: usize = 2;

/// Name shown for occupants that never announced one.
pub const ANONYMOUS_NAME: &str = "Anonymous";

/// Metadata a client tracks on its presence slot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PresenceMeta {
    /// When the client came online
    pub online_at: DateTime<Utc>,

    /// Display name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl PresenceMeta {
    pub fn new(name: impl Into<String>, online_at: DateTime<Utc>) -> Self {
        Self {
            online_at,
            name: Some(name.into()),
        }
    }
}

/// One key of a presence snapshot with its tracked metadata.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PresenceEntry {
    pub key: String,
    pub metas: Vec<PresenceMeta>,
}

/// Presence notifications delivered by the channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PresenceEvent {
    /// Full snapshot of the room, in join order
    Sync { state: Vec<PresenceEntry> },
    /// A key came online
    Join {
        key: String,
        new_presences: Vec<PresenceMeta>,
    },
    /// A key went away
    Leave {
        key: String,
        left_presences: Vec<PresenceMeta>,
    },
}

/// Name from the first tracked meta, falling back to [`ANONYMOUS_NAME`].
pub fn display_name(metas: &[PresenceMeta]) -> String {
    metas
        .first()
        .and_then(|m| m.name.clone())
        .unwrap_or_else(|| ANONYMOUS_NAME.to_string())
}

/// A client present in the room.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Occupant {
    /// Presence key (authenticated id or ephemeral key)
    pub key: String,

    /// Display name
    pub name: String,
}

impl Occupant {
    pub fn new(key: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            name: name.into(),
        }
    }

    pub fn from_metas(key: impl Into<String>, metas: &[PresenceMeta]) -> Self {
        Self::new(key, display_name(metas))
    }
}

/// Membership errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, Error)]
pub enum MembershipError {
    #[display("Room is full")]
    Full,
    #[display("Already in this room")]
    AlreadyMember,
}

/// Result of applying a presence snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncOutcome {
    /// Membership now mirrors the snapshot.
    Replaced,
    /// Snapshot held more than two keys; the overflow was dropped.
    Trimmed { dropped: Vec<Occupant> },
    /// Snapshot held more than two keys and the local key is not among the
    /// first two. The local client has to leave the room.
    Evicted,
}

/// Ordered room occupants, at most [`MAX_ROOM_OCCUPANTS`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RoomMembership {
    occupants: Vec<Occupant>,
}

impl RoomMembership {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an occupant.
    pub fn add(&mut self, occupant: Occupant) -> Result<(), MembershipError> {
        if self.contains(&occupant.key) {
            return Err(MembershipError::AlreadyMember);
        }

        if self.is_full() {
            return Err(MembershipError::Full);
        }

        self.occupants.push(occupant);
        Ok(())
    }

    /// Remove the occupant with `key`, if present.
    pub fn remove(&mut self, key: &str) -> Option<Occupant> {
        let pos = self.occupants.iter().position(|o| o.key == key)?;
        Some(self.occupants.remove(pos))
    }

    /// Replace membership with a presence snapshot.
    #[instrument(level = "debug", skip(self, state), fields(keys = state.len()))]
    pub fn sync(&mut self, state: &[PresenceEntry], local_key: &str) -> SyncOutcome {
        let mut occupants: Vec<Occupant> = Vec::with_capacity(state.len());
        for entry in state {
            if occupants.iter().any(|o| o.key == entry.key) {
                continue;
            }
            occupants.push(Occupant::from_metas(entry.key.clone(), &entry.metas));
        }

        if occupants.len() <= MAX_ROOM_OCCUPANTS {
            debug!(occupants = occupants.len(), "Membership synced");
            self.occupants = occupants;
            return SyncOutcome::Replaced;
        }

        let dropped = occupants.split_off(MAX_ROOM_OCCUPANTS);
        let local_kept = occupants.iter().any(|o| o.key == local_key);
        self.occupants = occupants;

        if local_kept {
            warn!(dropped = dropped.len(), "Snapshot over capacity, extra keys dropped");
            SyncOutcome::Trimmed { dropped }
        } else {
            warn!(local_key, "Snapshot over capacity, local client not seated");
            SyncOutcome::Evicted
        }
    }

    pub fn get(&self, key: &str) -> Option<&Occupant> {
        self.occupants.iter().find(|o| o.key == key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    /// Occupant playing `mark`: first for X, second for O.
    pub fn occupant_for(&self, mark: Mark) -> Option<&Occupant> {
        match mark {
            Mark::X => self.occupants.first(),
            Mark::O => self.occupants.get(1),
        }
    }

    /// Mark assigned to `key` by position.
    pub fn mark_of(&self, key: &str) -> Option<Mark> {
        match self.occupants.iter().position(|o| o.key == key)? {
            0 => Some(Mark::X),
            1 => Some(Mark::O),
            _ => None,
        }
    }

    pub fn occupants(&self) -> &[Occupant] {
        &self.occupants
    }

    pub fn len(&self) -> usize {
        self.occupants.len()
    }

    pub fn is_empty(&self) -> bool {
        self.occupants.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.occupants.len() >= MAX_ROOM_OCCUPANTS
    }

    pub fn to_json(&self) -> serde_json::Value {
        let occupants: Vec<serde_json::Value> = self
            .occupants
            .iter()
            .enumerate()
            .map(|(i, o)| {
                serde_json::json!({
                    "key": o.key,
                    "name": o.name,
                    "mark": if i == 0 { "X" } else { "O" }
                })
            })
            .collect();

        serde_json::json!({
            "occupants": occupants,
            "capacity": MAX_ROOM_OCCUPANTS
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn entry(key: &str, name: Option<&str>) -> PresenceEntry {
        PresenceEntry {
            key: key.to_string(),
            metas: vec![PresenceMeta {
                online_at: Utc::now(),
                name: name.map(str::to_string),
            }],
        }
    }

    #[test]
    fn test_membership_order_is_join_order() {
        let mut room = RoomMembership::new();
        room.add(Occupant::new("a", "Alice")).unwrap();
        room.add(Occupant::new("b", "Bob")).unwrap();

        assert_eq!(room.len(), 2);
        assert_eq!(room.occupant_for(Mark::X).unwrap().key, "a");
        assert_eq!(room.occupant_for(Mark::O).unwrap().key, "b");
        assert_eq!(room.mark_of("b"), Some(Mark::O));
        assert!(room.is_full());
    }

    #[test]
    fn test_third_join_rejected() {
        let mut room = RoomMembership::new();
        room.add(Occupant::new("a", "Alice")).unwrap();
        room.add(Occupant::new("b", "Bob")).unwrap();

        let result = room.add(Occupant::new("c", "Carol"));
        assert_eq!(result, Err(MembershipError::Full));
        assert_eq!(room.len(), 2);
    }

    #[test]
    fn test_duplicate_join_is_harmless() {
        let mut room = RoomMembership::new();
        room.add(Occupant::new("a", "Alice")).unwrap();
        room.add(Occupant::new("b", "Bob")).unwrap();

        // Checked before capacity so a full room still reports the duplicate.
        let result = room.add(Occupant::new("a", "Alice"));
        assert_eq!(result, Err(MembershipError::AlreadyMember));
        assert_eq!(room.len(), 2);
    }

    #[test]
    fn test_remove_absent_key() {
        let mut room = RoomMembership::new();
        room.add(Occupant::new("a", "Alice")).unwrap();

        assert_eq!(room.remove("zzz"), None);
        assert_eq!(room.remove("a").unwrap().name, "Alice");
        assert_eq!(room.remove("a"), None);
        assert!(room.is_empty());
    }

    #[test]
    fn test_leave_promotes_second_occupant() {
        let mut room = RoomMembership::new();
        room.add(Occupant::new("a", "Alice")).unwrap();
        room.add(Occupant::new("b", "Bob")).unwrap();
        room.remove("a");

        assert_eq!(room.mark_of("b"), Some(Mark::X));
    }

    #[test]
    fn test_sync_replaces_and_dedupes() {
        let mut room = RoomMembership::new();
        room.add(Occupant::new("stale", "Old")).unwrap();

        let outcome = room.sync(
            &[entry("a", Some("Alice")), entry("a", Some("Alice")), entry("b", None)],
            "a",
        );

        assert_eq!(outcome, SyncOutcome::Replaced);
        assert_eq!(
            room.occupants(),
            &[Occupant::new("a", "Alice"), Occupant::new("b", ANONYMOUS_NAME)]
        );
    }

    #[test]
    fn test_sync_over_capacity_keeps_seated_client() {
        let mut room = RoomMembership::new();
        let state = [entry("a", Some("A")), entry("b", Some("B")), entry("c", Some("C"))];

        let outcome = room.sync(&state, "b");
        assert_eq!(
            outcome,
            SyncOutcome::Trimmed {
                dropped: vec![Occupant::new("c", "C")]
            }
        );
        assert_eq!(room.len(), 2);
    }

    #[test]
    fn test_sync_over_capacity_evicts_late_client() {
        let mut room = RoomMembership::new();
        let state = [entry("a", Some("A")), entry("b", Some("B")), entry("c", Some("C"))];

        assert_eq!(room.sync(&state, "c"), SyncOutcome::Evicted);
    }

    #[test]
    fn test_display_name_fallback() {
        assert_eq!(display_name(&[]), ANONYMOUS_NAME);
        assert_eq!(display_name(&entry("k", Some("Kim")).metas), "Kim");
    }

    #[test]
    fn test_meta_json_shape() {
        let meta = PresenceMeta::new("Alice", Utc::now());
        let value = serde_json::to_value(&meta).unwrap();
        assert_eq!(value["name"], "Alice");
        assert!(value["online_at"].is_string());
    }
}

#![forbid(unsafe_code)]

//! Presence records, snapshots and the reactive presence state.
//!
//! # Invariants
//!
//! 1. [`PresenceState::peers`] never contains the local user's own peer id.
//! 2. Merging a snapshot always clears `is_loading`.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::ErrorValue;

/// Field of a presence record holding the peer id the core assigned.
pub const PEER_ID_FIELD: &str = "peerId";

/// Free-form presence data published by one peer.
pub type PresenceRecord = Map<String, Value>;

/// Restricts a presence subscription.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PresenceOpts {
    /// Only deliver these top-level presence keys.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub keys: Option<Vec<String>>,
    /// Only deliver these peers.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub peers: Option<Vec<String>>,
}

impl PresenceOpts {
    #[must_use]
    pub fn keys<I, S>(keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            keys: Some(keys.into_iter().map(Into::into).collect()),
            peers: None,
        }
    }
}

/// What the core delivers to a presence subscriber, or returns from its
/// snapshot accessor. Absent fields leave the current state untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PresenceSnapshot {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<PresenceRecord>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub peers: Option<BTreeMap<String, PresenceRecord>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorValue>,
}

impl PresenceSnapshot {
    #[must_use]
    pub fn peers(peers: BTreeMap<String, PresenceRecord>) -> Self {
        Self {
            peers: Some(peers),
            ..Self::default()
        }
    }
}

/// Reactive view of a room's presence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PresenceState {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<PresenceRecord>,
    pub peers: BTreeMap<String, PresenceRecord>,
    pub is_loading: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorValue>,
}

impl Default for PresenceState {
    fn default() -> Self {
        Self {
            user: None,
            peers: BTreeMap::new(),
            is_loading: true,
            error: None,
        }
    }
}

impl PresenceState {
    /// State seeded from the core's synchronous snapshot.
    #[must_use]
    pub fn from_snapshot(snapshot: PresenceSnapshot) -> Self {
        let mut state = Self::default();
        state.merge(snapshot);
        state
    }

    /// Apply a delivery. Always clears `is_loading`.
    pub fn merge(&mut self, snapshot: PresenceSnapshot) {
        if let Some(user) = snapshot.user {
            self.user = Some(user);
        }
        if let Some(peers) = snapshot.peers {
            self.peers = peers;
        }
        self.error = snapshot.error;
        self.is_loading = false;

        if let Some(own) = self.local_peer_id().map(str::to_owned) {
            self.peers.remove(&own);
        }
    }

    /// The local user's peer id, when the core has assigned one.
    #[must_use]
    pub fn local_peer_id(&self) -> Option<&str> {
        self.user
            .as_ref()
            .and_then(|user| user.get(PEER_ID_FIELD))
            .and_then(Value::as_str)
    }
}

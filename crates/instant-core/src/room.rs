#![forbid(unsafe_code)]

//! Room identity and topic messages.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

pub const DEFAULT_ROOM_TYPE: &str = "_defaultRoomType";
pub const DEFAULT_ROOM_ID: &str = "_defaultRoomId";

/// A logical presence/broadcast channel, compared by value.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomHandle {
    pub room_type: String,
    pub room_id: String,
}

impl RoomHandle {
    #[must_use]
    pub fn new(room_type: impl Into<String>, room_id: impl Into<String>) -> Self {
        Self {
            room_type: room_type.into(),
            room_id: room_id.into(),
        }
    }

    #[must_use]
    pub fn default_room() -> Self {
        Self::new(DEFAULT_ROOM_TYPE, DEFAULT_ROOM_ID)
    }
}

impl fmt::Display for RoomHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.room_type, self.room_id)
    }
}

/// A broadcast on a room topic.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TopicMessage {
    pub room_type: String,
    pub room_id: String,
    pub topic: String,
    pub data: Value,
}

impl TopicMessage {
    #[must_use]
    pub fn new(room: &RoomHandle, topic: impl Into<String>, data: Value) -> Self {
        Self {
            room_type: room.room_type.clone(),
            room_id: room.room_id.clone(),
            topic: topic.into(),
            data,
        }
    }
}

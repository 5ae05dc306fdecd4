#![forbid(unsafe_code)]

//! Shared cursor positions, stored as presence under a per-space key.
//!
//! Every peer publishes `{space: {x, y, xPercent, yPercent, color}}`. The
//! presence subscription only asks for the space key, so cursors in other
//! spaces of the same room never reach this handle.
//!
//! # Invariants
//!
//! - The space id is `opts.space_id` when set, otherwise derived from the
//!   current room as `cursors-space-default--{type}-{id}`.
//! - [`Cursors::peers`] is ordered by peer id and skips peers whose entry is
//!   missing, `null` or malformed.

use std::fmt;

use instant_core::{CoreHandle, PresenceOpts, PresenceRecord, RoomHandle};
use instant_reactive::{Computed, Input, Scope, sources};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tracing::warn;

use crate::presence::{PresenceHandle, create_presence};

const DEFAULT_SPACE_PREFIX: &str = "cursors-space-default--";

/// Options for [`create_cursors`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CursorsOpts {
    #[serde(default)]
    pub space_id: Option<String>,
    /// Colour attached to every published position.
    #[serde(default)]
    pub user_cursor_color: Option<String>,
}

/// Bounding box of the tracked surface, in client coordinates.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct CursorRect {
    pub left: f64,
    pub top: f64,
    pub width: f64,
    pub height: f64,
}

impl CursorRect {
    #[must_use]
    pub const fn new(left: f64, top: f64, width: f64, height: f64) -> Self {
        Self {
            left,
            top,
            width,
            height,
        }
    }

    fn percent(offset: f64, extent: f64) -> f64 {
        if extent == 0.0 {
            0.0
        } else {
            offset / extent * 100.0
        }
    }
}

/// One remote cursor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PeerCursor {
    #[serde(default)]
    pub peer_id: String,
    pub x: f64,
    pub y: f64,
    pub x_percent: f64,
    pub y_percent: f64,
    #[serde(default)]
    pub color: Option<String>,
}

/// Handle returned by [`create_cursors`].
#[derive(Clone)]
pub struct Cursors {
    presence: PresenceHandle,
    space: Computed<Option<String>>,
    color: Option<String>,
}

impl fmt::Debug for Cursors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Cursors")
            .field("space", &self.space.get())
            .field("color", &self.color)
            .finish_non_exhaustive()
    }
}

fn space_id(explicit: Option<&str>, room: Option<&RoomHandle>) -> Option<String> {
    match (explicit, room) {
        (Some(id), _) if !id.is_empty() => Some(id.to_owned()),
        (_, Some(room)) => Some(format!(
            "{DEFAULT_SPACE_PREFIX}{}-{}",
            room.room_type, room.room_id
        )),
        _ => None,
    }
}

impl Cursors {
    /// The presence key cursors are stored under.
    #[must_use]
    pub fn space_id(&self) -> Option<String> {
        self.space.get()
    }

    #[must_use]
    pub fn presence(&self) -> &PresenceHandle {
        &self.presence
    }

    /// Publish the local cursor at `(client_x, client_y)` within `rect`.
    pub fn publish_position(&self, rect: CursorRect, client_x: f64, client_y: f64) {
        let cursor = json!({
            "x": client_x,
            "y": client_y,
            "xPercent": CursorRect::percent(client_x - rect.left, rect.width),
            "yPercent": CursorRect::percent(client_y - rect.top, rect.height),
            "color": self.color,
        });
        self.publish(cursor);
    }

    /// Remove the local cursor from the space.
    pub fn clear(&self) {
        self.publish(Value::Null);
    }

    fn publish(&self, cursor: Value) {
        let Some(space) = self.space.get() else {
            warn!("cannot publish cursor, room is not available yet");
            return;
        };
        let mut data = PresenceRecord::new();
        data.insert(space, cursor);
        self.presence.publish_presence(data);
    }

    /// Remote cursors in this space, ordered by peer id.
    #[must_use]
    pub fn peers(&self) -> Vec<PeerCursor> {
        let Some(space) = self.space.get() else {
            return Vec::new();
        };
        self.presence.state().with(|state| {
            state
                .peers
                .iter()
                .filter_map(|(peer_id, record)| {
                    let entry = record.get(&space).filter(|v| !v.is_null())?;
                    let mut cursor = PeerCursor::deserialize(entry).ok()?;
                    cursor.peer_id.clone_from(peer_id);
                    Some(cursor)
                })
                .collect()
        })
    }
}

/// Track cursor positions in `room`.
pub fn create_cursors(
    scope: &Scope,
    core: &CoreHandle,
    room: impl Into<Input<Option<RoomHandle>>>,
    opts: CursorsOpts,
) -> Cursors {
    let room = room.into();
    let explicit = opts.space_id.clone();

    let space = {
        let watched = sources(&[room.source()]);
        let reader = room.clone();
        Computed::new(&watched, move || {
            space_id(explicit.as_deref(), reader.get().as_ref())
        })
    };
    let presence_opts = Computed::new(&[&space], {
        let space = space.clone();
        move || PresenceOpts {
            keys: Some(space.get().into_iter().collect()),
            peers: None,
        }
    });

    let presence = create_presence(scope, core, room, presence_opts);
    Cursors {
        presence,
        space,
        color: opts.user_cursor_color,
    }
}

#![forbid(unsafe_code)]

//! Keep this peer's presence in sync with a reactive value.

use instant_core::{CoreHandle, PresenceRecord, RoomHandle};
use instant_reactive::{Effect, Input, Scope, sources};
use tracing::debug;

use crate::topic::join_on_change;

/// Join `room` and publish `data` whenever either changes.
///
/// Nothing is published while the room is absent.
pub fn create_sync_presence(
    scope: &Scope,
    core: &CoreHandle,
    room: impl Into<Input<Option<RoomHandle>>>,
    data: impl Into<Input<PresenceRecord>>,
) {
    let room = room.into();
    let data = data.into();
    join_on_change(scope, core, room.clone());

    let core = CoreHandle::clone(core);
    let scope_id = scope.id();
    let (room_src, data_src) = (room.clone(), data.clone());
    let watched = sources(&[room_src.source(), data_src.source()]);
    Effect::new(scope, &watched, move |_| {
        let Some(room) = room.get() else {
            return;
        };
        debug!(scope_id, room_id = %room.room_id, "syncing presence");
        core.publish_presence(&room.room_type, &room.room_id, &data.get());
    });
}

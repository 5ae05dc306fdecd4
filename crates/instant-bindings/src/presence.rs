#![forbid(unsafe_code)]

//! Presence subscription adapter.
//!
//! [`create_presence`] keys its subscription on `(room, opts)` value
//! equality and follows the same teardown-then-subscribe discipline as the
//! query adapter. Publishing is a passthrough that resolves the room at call
//! time.

use std::collections::BTreeMap;
use std::fmt;

use instant_core::{
    CoreHandle, PresenceOpts, PresenceRecord, PresenceState, RoomHandle,
};
use instant_reactive::{Effect, Input, Observable, Scope, sources};
use tracing::{debug, warn};

use crate::keyed::Keyed;

type PresenceKey = (RoomHandle, PresenceOpts);

/// Reactive handle returned by [`create_presence`].
#[derive(Clone)]
pub struct PresenceHandle {
    core: CoreHandle,
    room: Input<Option<RoomHandle>>,
    state: Observable<PresenceState>,
    keyed: Keyed<PresenceKey>,
}

impl fmt::Debug for PresenceHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PresenceHandle")
            .field("room", &self.room)
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}

impl PresenceHandle {
    #[must_use]
    pub fn state(&self) -> &Observable<PresenceState> {
        &self.state
    }

    #[must_use]
    pub fn get(&self) -> PresenceState {
        self.state.get()
    }

    #[must_use]
    pub fn is_loading(&self) -> bool {
        self.state.with(|s| s.is_loading)
    }

    #[must_use]
    pub fn peers(&self) -> BTreeMap<String, PresenceRecord> {
        self.state.with(|s| s.peers.clone())
    }

    #[must_use]
    pub fn user(&self) -> Option<PresenceRecord> {
        self.state.with(|s| s.user.clone())
    }

    /// The room publishes go to right now.
    #[must_use]
    pub fn room(&self) -> Option<RoomHandle> {
        self.room.get()
    }

    /// The room currently subscribed, if any.
    #[must_use]
    pub fn subscribed_room(&self) -> Option<RoomHandle> {
        self.keyed.with_key(|key| key.map(|(room, _)| room.clone()))
    }

    /// Publish `data` as this peer's presence in the current room.
    ///
    /// Without a room this logs a warning and does nothing.
    pub fn publish_presence(&self, data: PresenceRecord) {
        let Some(room) = self.room.get() else {
            warn!("cannot publish presence, room is not available yet");
            return;
        };
        self.core
            .publish_presence(&room.room_type, &room.room_id, &data);
    }
}

/// Subscribe to presence in `room` for the lifetime of `scope`.
pub fn create_presence(
    scope: &Scope,
    core: &CoreHandle,
    room: impl Into<Input<Option<RoomHandle>>>,
    opts: impl Into<Input<PresenceOpts>>,
) -> PresenceHandle {
    let room = room.into();
    let opts = opts.into();

    let state = Observable::new(PresenceState::default());
    let keyed = Keyed::new(scope);
    let handle = PresenceHandle {
        core: CoreHandle::clone(core),
        room: room.clone(),
        state: state.clone(),
        keyed: keyed.clone(),
    };

    let core = CoreHandle::clone(core);
    let scope_id = scope.id();
    let (room_src, opts_src) = (room.clone(), opts.clone());
    let watched = sources(&[room_src.source(), opts_src.source()]);
    Effect::new(scope, &watched, move |_| {
        let next = room.get().map(|room| (room, opts.get()));
        if keyed.holds(next.as_ref()) {
            return;
        }
        if keyed.release() {
            debug!(scope_id, "presence unsubscribed");
        }

        let Some((room, opts)) = next else {
            state.set(PresenceState::default());
            return;
        };

        let seeded = core
            .get_presence(&room.room_type, &room.room_id, &opts)
            .map(PresenceState::from_snapshot)
            .unwrap_or_default();
        state.set(seeded);

        debug!(
            scope_id,
            room_type = %room.room_type,
            room_id = %room.room_id,
            "presence subscribed"
        );
        let cell = state.clone();
        let client = CoreHandle::clone(&core);
        keyed.bind((room, opts), move |(room, opts), epoch| {
            client.subscribe_presence(
                &room.room_type,
                &room.room_id,
                opts,
                Box::new(move |snapshot| {
                    if epoch.is_current() {
                        cell.update(|state| state.merge(snapshot));
                    }
                }),
            )
        });
    });

    handle
}

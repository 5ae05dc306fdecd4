#![forbid(unsafe_code)]

//! Topic broadcast adapters.
//!
//! - [`create_topic_effect`] listens on a room topic, re-subscribing whenever
//!   the room or topic changes and staying idle while either is absent.
//! - [`create_publish_topic`] joins the room whenever it changes and returns
//!   a [`PublishTopic`] whose `publish` resolves room and topic at call time.

use std::fmt;
use std::rc::Rc;

use instant_core::{CoreHandle, PresenceRecord, RoomHandle, TopicMessage};
use instant_reactive::{Effect, Input, Scope, sources};
use serde_json::Value;
use tracing::{debug, warn};

use crate::keyed::Keyed;

type TopicKey = (RoomHandle, String);

/// Handle returned by [`create_topic_effect`].
#[derive(Clone)]
pub struct TopicEffect {
    keyed: Keyed<TopicKey>,
}

impl fmt::Debug for TopicEffect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TopicEffect")
            .field("subscribed", &self.subscribed())
            .finish()
    }
}

impl TopicEffect {
    /// The `(room, topic)` currently listened to.
    #[must_use]
    pub fn subscribed(&self) -> Option<(RoomHandle, String)> {
        self.keyed.with_key(|key| key.cloned())
    }
}

/// Call `on_event(payload, peer)` for every broadcast on `topic` in `room`.
pub fn create_topic_effect(
    scope: &Scope,
    core: &CoreHandle,
    room: impl Into<Input<Option<RoomHandle>>>,
    topic: impl Into<Input<Option<String>>>,
    on_event: impl Fn(&Value, &PresenceRecord) + 'static,
) -> TopicEffect {
    let room = room.into();
    let topic = topic.into();
    let on_event: Rc<dyn Fn(&Value, &PresenceRecord)> = Rc::new(on_event);
    let keyed = Keyed::new(scope);
    let handle = TopicEffect {
        keyed: keyed.clone(),
    };

    let core = CoreHandle::clone(core);
    let scope_id = scope.id();
    let (room_src, topic_src) = (room.clone(), topic.clone());
    let watched = sources(&[room_src.source(), topic_src.source()]);
    Effect::new(scope, &watched, move |_| {
        let next = room.get().zip(topic.get());
        if keyed.holds(next.as_ref()) {
            return;
        }
        if keyed.release() {
            debug!(scope_id, "topic unsubscribed");
        }
        let Some(key) = next else {
            return;
        };

        debug!(
            scope_id,
            room_id = %key.0.room_id,
            topic = %key.1,
            "topic subscribed"
        );
        let client = CoreHandle::clone(&core);
        let on_event = Rc::clone(&on_event);
        keyed.bind(key, move |(room, topic), epoch| {
            client.subscribe_topic(
                &room.room_id,
                topic,
                Box::new(move |data: &Value, peer: &PresenceRecord| {
                    if epoch.is_current() {
                        on_event(data, peer);
                    }
                }),
            )
        });
    });

    handle
}

/// Publisher returned by [`create_publish_topic`].
#[derive(Clone)]
pub struct PublishTopic {
    core: CoreHandle,
    room: Input<Option<RoomHandle>>,
    topic: Input<Option<String>>,
}

impl fmt::Debug for PublishTopic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PublishTopic")
            .field("room", &self.room)
            .field("topic", &self.topic)
            .finish_non_exhaustive()
    }
}

impl PublishTopic {
    /// Broadcast `data` on the current room and topic.
    ///
    /// Logs a warning and does nothing if either is absent.
    pub fn publish(&self, data: Value) {
        let Some(room) = self.room.get() else {
            warn!("cannot publish topic, room is not available yet");
            return;
        };
        let Some(topic) = self.topic.get() else {
            warn!(room_id = %room.room_id, "cannot publish topic, topic is not available yet");
            return;
        };
        self.core.publish_topic(TopicMessage::new(&room, topic, data));
    }
}

/// Join `room` whenever it changes and return a publisher for `topic`.
pub fn create_publish_topic(
    scope: &Scope,
    core: &CoreHandle,
    room: impl Into<Input<Option<RoomHandle>>>,
    topic: impl Into<Input<Option<String>>>,
) -> PublishTopic {
    let room = room.into();
    let publisher = PublishTopic {
        core: CoreHandle::clone(core),
        room: room.clone(),
        topic: topic.into(),
    };

    join_on_change(scope, core, room);
    publisher
}

/// Issue a room join each time `room` changes to a new non-null value.
pub(crate) fn join_on_change(scope: &Scope, core: &CoreHandle, room: Input<Option<RoomHandle>>) {
    let core = CoreHandle::clone(core);
    let mut joined: Option<RoomHandle> = None;
    let room_src = room.clone();
    let watched = sources(&[room_src.source()]);
    let scope_id = scope.id();
    Effect::new(scope, &watched, move |_| {
        let current = room.get();
        if joined == current {
            return;
        }
        if let Some(room) = &current {
            debug!(
                scope_id,
                room_type = %room.room_type,
                room_id = %room.room_id,
                "joining room"
            );
            core.join_room(&room.room_id);
        }
        joined = current;
    });
}

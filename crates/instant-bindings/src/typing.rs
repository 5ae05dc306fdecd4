#![forbid(unsafe_code)]

//! Typing indicator: presence on one field plus an auto-expiring timer.
//!
//! `set_active(true)` publishes `{field: true}` and arms the expiry timer;
//! `set_active(false)` publishes `{field: null}` and disarms it. Both are
//! no-ops while no room is bound. The derived
//! [`TypingIndicator::active`] list holds the presence records whose field is
//! `true`.

use std::fmt;
use std::rc::Rc;

use instant_core::{CoreHandle, PresenceOpts, PresenceRecord, PresenceState, RoomHandle};
use instant_reactive::{Computed, Duration, Input, Scope};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::trace;

use crate::presence::{PresenceHandle, create_presence};
use crate::timeout::Timeout;

pub const DEFAULT_TYPING_TIMEOUT: Duration = Duration::from_millis(1000);

/// Key that stops typing when `stop_on_enter` is set.
pub const ENTER_KEY: &str = "Enter";

mod timeout_ms {
    use instant_reactive::Duration;
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    pub(super) fn serialize<S: Serializer>(
        value: &Option<Duration>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        value
            .map(|d| u64::try_from(d.as_millis()).unwrap_or(u64::MAX))
            .serialize(serializer)
    }

    pub(super) fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<Duration>, D::Error> {
        Ok(Option::<u64>::deserialize(deserializer)?.map(Duration::from_millis))
    }
}

fn default_timeout() -> Option<Duration> {
    Some(DEFAULT_TYPING_TIMEOUT)
}

/// Options for [`create_typing_indicator`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TypingIndicatorOpts {
    /// Auto-expiry delay. `None` or zero never expires.
    #[serde(with = "timeout_ms", default = "default_timeout")]
    pub timeout: Option<Duration>,
    /// Enter stops typing instead of refreshing it.
    #[serde(default)]
    pub stop_on_enter: bool,
    /// Only publish; `active` stays empty.
    #[serde(default)]
    pub write_only: bool,
    /// List the local user in `active` too.
    #[serde(default)]
    pub include_self: bool,
}

impl Default for TypingIndicatorOpts {
    fn default() -> Self {
        Self {
            timeout: default_timeout(),
            stop_on_enter: false,
            write_only: false,
            include_self: false,
        }
    }
}

impl TypingIndicatorOpts {
    fn expiry(&self) -> Option<Duration> {
        self.timeout.filter(|d| !d.is_zero())
    }
}

/// Writes `{field: value}` through the presence handle.
#[derive(Clone)]
struct FieldPublisher {
    field: Rc<str>,
    presence: PresenceHandle,
}

impl FieldPublisher {
    fn has_room(&self) -> bool {
        self.presence.room().is_some()
    }

    fn publish(&self, value: Value) {
        let mut data = PresenceRecord::new();
        data.insert(self.field.to_string(), value);
        self.presence.publish_presence(data);
    }
}

struct Shared {
    publisher: FieldPublisher,
    timer: Timeout,
    expiry: Option<Duration>,
    stop_on_enter: bool,
}

/// Handle returned by [`create_typing_indicator`].
#[derive(Clone)]
pub struct TypingIndicator {
    shared: Rc<Shared>,
    active: Computed<Vec<PresenceRecord>>,
}

impl fmt::Debug for TypingIndicator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TypingIndicator")
            .field("field", &self.shared.publisher.field)
            .field("timer", &self.shared.timer)
            .finish_non_exhaustive()
    }
}

impl TypingIndicator {
    /// Start or stop typing.
    ///
    /// Does nothing while no room is bound.
    pub fn set_active(&self, active: bool) {
        let publisher = &self.shared.publisher;
        if !publisher.has_room() {
            trace!(field = %publisher.field, "typing ignored, no room bound");
            return;
        }
        if !active {
            publisher.publish(Value::Null);
            self.shared.timer.clear();
            return;
        }

        publisher.publish(Value::Bool(true));
        if let Some(delay) = self.shared.expiry {
            // Held strongly: expiry must outlive dropped handles. Scope
            // disposal cancels the timer.
            let publisher = publisher.clone();
            self.shared.timer.set(delay, move || {
                if publisher.has_room() {
                    trace!(field = %publisher.field, "typing expired");
                    publisher.publish(Value::Null);
                }
            });
        }
    }

    /// Key-down handler: Enter stops typing when configured, anything else
    /// (re)starts it.
    pub fn on_key_down(&self, key: &str) {
        let stop = self.shared.stop_on_enter && key == ENTER_KEY;
        self.set_active(!stop);
    }

    /// Blur handler: always stops typing.
    pub fn on_blur(&self) {
        self.set_active(false);
    }

    /// Presence records currently typing.
    #[must_use]
    pub fn active(&self) -> Vec<PresenceRecord> {
        self.active.get()
    }

    /// The derived `active` list, for use as a reactive source.
    #[must_use]
    pub fn active_signal(&self) -> &Computed<Vec<PresenceRecord>> {
        &self.active
    }

    #[must_use]
    pub fn presence(&self) -> &PresenceHandle {
        &self.shared.publisher.presence
    }
}

fn typing_records(state: &PresenceState, field: &str, include_self: bool) -> Vec<PresenceRecord> {
    let is_typing = |record: &PresenceRecord| record.get(field) == Some(&Value::Bool(true));
    let own = state
        .user
        .iter()
        .filter(|_| include_self)
        .filter(|user| is_typing(user));
    let peers = state.peers.values().filter(|peer| is_typing(peer));
    own.chain(peers).cloned().collect()
}

/// Track who is typing into `field` in `room`.
pub fn create_typing_indicator(
    scope: &Scope,
    core: &CoreHandle,
    room: impl Into<Input<Option<RoomHandle>>>,
    field: impl Into<String>,
    opts: TypingIndicatorOpts,
) -> TypingIndicator {
    let field = field.into();
    let keys = if opts.write_only {
        Vec::new()
    } else {
        vec![field.clone()]
    };
    let presence = create_presence(
        scope,
        core,
        room,
        Input::value(PresenceOpts {
            keys: Some(keys),
            peers: None,
        }),
    );

    let active = if opts.write_only {
        Computed::new(&[], Vec::new)
    } else {
        let state = presence.state().clone();
        let field = field.clone();
        let include_self = opts.include_self;
        Computed::new(&[presence.state()], move || {
            state.with(|s| typing_records(s, &field, include_self))
        })
    };

    TypingIndicator {
        shared: Rc::new(Shared {
            publisher: FieldPublisher {
                field: field.into(),
                presence,
            },
            timer: Timeout::new(scope),
            expiry: opts.expiry(),
            stop_on_enter: opts.stop_on_enter,
        }),
        active,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use instant_core::PresenceSnapshot;
    use instant_core::testing::{CoreCall, RecordingCore};
    use instant_reactive::{LabClock, Runtime};
    use serde_json::json;
    use std::collections::BTreeMap;

    fn record(value: Value) -> PresenceRecord {
        match value {
            Value::Object(map) => map,
            other => panic!("not an object: {other}"),
        }
    }

    fn publishes(core: &RecordingCore) -> Vec<Value> {
        core.calls()
            .into_iter()
            .filter_map(|call| match call {
                CoreCall::PublishPresence { data, .. } => Some(Value::Object(data)),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn opts_default_to_one_second() {
        let opts: TypingIndicatorOpts = serde_json::from_value(json!({})).unwrap();
        assert_eq!(opts, TypingIndicatorOpts::default());
        assert_eq!(opts.expiry(), Some(Duration::from_millis(1000)));

        let never: TypingIndicatorOpts = serde_json::from_value(json!({"timeout": null})).unwrap();
        assert_eq!(never.expiry(), None);
        let zero: TypingIndicatorOpts = serde_json::from_value(json!({"timeout": 0})).unwrap();
        assert_eq!(zero.expiry(), None);
    }

    #[test]
    fn key_handlers_follow_stop_on_enter() {
        let core = RecordingCore::new();
        let handle: CoreHandle = core.clone();
        let clock = LabClock::new();
        let scope = Runtime::lab(&clock).root();
        let typing = create_typing_indicator(
            &scope,
            &handle,
            Input::value(Some(RoomHandle::new("chat", "r1"))),
            "chat-input",
            TypingIndicatorOpts {
                stop_on_enter: true,
                ..TypingIndicatorOpts::default()
            },
        );

        typing.on_key_down("a");
        typing.on_key_down("Enter");
        typing.on_key_down("b");
        typing.on_blur();

        assert_eq!(
            publishes(&core),
            vec![
                json!({"chat-input": true}),
                json!({"chat-input": null}),
                json!({"chat-input": true}),
                json!({"chat-input": null}),
            ]
        );
    }

    #[test]
    fn expiry_fires_after_handle_is_dropped() {
        let core = RecordingCore::new();
        let handle: CoreHandle = core.clone();
        let clock = LabClock::new();
        let runtime = Runtime::lab(&clock);
        let scope = runtime.root();
        {
            let typing = create_typing_indicator(
                &scope,
                &handle,
                Input::value(Some(RoomHandle::new("chat", "r1"))),
                "chat-input",
                TypingIndicatorOpts::default(),
            );
            typing.set_active(true);
        }

        runtime.advance(Duration::from_secs(5));

        assert!(!scope.is_disposed());
        assert_eq!(
            publishes(&core),
            vec![json!({"chat-input": true}), json!({"chat-input": null})]
        );
    }

    #[test]
    fn no_room_publishes_nothing_and_arms_nothing() {
        let core = RecordingCore::new();
        let handle: CoreHandle = core.clone();
        let clock = LabClock::new();
        let runtime = Runtime::lab(&clock);
        let scope = runtime.root();
        let typing = create_typing_indicator(
            &scope,
            &handle,
            Input::value(None::<RoomHandle>),
            "chat-input",
            TypingIndicatorOpts::default(),
        );

        typing.on_key_down("a");
        assert_eq!(runtime.pending_timers(), 0);
        runtime.advance(Duration::from_secs(5));
        typing.on_blur();

        assert!(publishes(&core).is_empty());
    }

    #[test]
    fn active_lists_typing_peers_only() {
        let core = RecordingCore::new();
        let handle: CoreHandle = core.clone();
        let scope = Runtime::new().root();
        let room = RoomHandle::new("chat", "r1");
        let typing = create_typing_indicator(
            &scope,
            &handle,
            Input::value(Some(room.clone())),
            "chat-input",
            TypingIndicatorOpts::default(),
        );

        core.emit_presence(
            &room,
            PresenceSnapshot {
                user: Some(record(json!({"peerId": "me", "chat-input": true}))),
                peers: Some(BTreeMap::from([
                    ("u1".into(), record(json!({"peerId": "u1", "chat-input": true}))),
                    ("u2".into(), record(json!({"peerId": "u2", "chat-input": null}))),
                ])),
                error: None,
            },
        );

        let active = typing.active();
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].get("peerId"), Some(&json!("u1")));
    }

    #[test]
    fn include_self_lists_local_user_first() {
        let core = RecordingCore::new();
        let handle: CoreHandle = core.clone();
        let scope = Runtime::new().root();
        let room = RoomHandle::new("chat", "r1");
        let typing = create_typing_indicator(
            &scope,
            &handle,
            Input::value(Some(room.clone())),
            "chat-input",
            TypingIndicatorOpts {
                include_self: true,
                ..TypingIndicatorOpts::default()
            },
        );
        core.emit_presence(
            &room,
            PresenceSnapshot {
                user: Some(record(json!({"peerId": "me", "chat-input": true}))),
                peers: Some(BTreeMap::from([(
                    "u1".into(),
                    record(json!({"peerId": "u1", "chat-input": true})),
                )])),
                error: None,
            },
        );

        let ids: Vec<_> = typing
            .active()
            .iter()
            .map(|r| r.get("peerId").cloned())
            .collect();
        assert_eq!(ids, vec![Some(json!("me")), Some(json!("u1"))]);
    }
}

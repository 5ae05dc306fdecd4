#![forbid(unsafe_code)]

//! In-memory [`CoreClient`] double.
//!
//! [`RecordingCore`] logs every call as a [`CoreCall`], keeps subscription
//! callbacks so a test can fire them, and serves configurable cache peeks and
//! async outcomes. Unsubscribing removes the stored callback, so the
//! "no callbacks after unsubscribe" contract holds by construction.

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::rc::{Rc, Weak};

use async_trait::async_trait;
use serde_json::Value;

use crate::auth::{AuthSnapshot, ConnectionStatus, User};
use crate::client::{
    AuthCallback, CoreClient, PresenceCallback, QueryCallback, StatusCallback, TopicCallback,
    TransactionChunk, Unsubscribe,
};
use crate::error::{CoreError, Result};
use crate::presence::{PresenceOpts, PresenceRecord, PresenceSnapshot};
use crate::query::{QueryOnceResult, QueryOpts, QueryResult};
use crate::room::{RoomHandle, TopicMessage};

/// One recorded interaction with the core.
#[derive(Debug, Clone, PartialEq)]
pub enum CoreCall {
    SubscribeQuery(Value),
    UnsubscribeQuery(Value),
    SubscribePresence {
        room: RoomHandle,
        opts: PresenceOpts,
    },
    UnsubscribePresence(RoomHandle),
    PublishPresence {
        room: RoomHandle,
        data: PresenceRecord,
    },
    SubscribeTopic {
        room_id: String,
        topic: String,
    },
    UnsubscribeTopic {
        room_id: String,
        topic: String,
    },
    PublishTopic(TopicMessage),
    JoinRoom(String),
    SubscribeAuth,
    UnsubscribeAuth,
    SubscribeConnectionStatus,
    UnsubscribeConnectionStatus,
    Transact(Vec<TransactionChunk>),
    QueryOnce(Value),
    GetLocalId(String),
    GetAuth,
}

impl CoreCall {
    #[must_use]
    pub fn is_subscribe(&self) -> bool {
        matches!(
            self,
            Self::SubscribeQuery(_)
                | Self::SubscribePresence { .. }
                | Self::SubscribeTopic { .. }
                | Self::SubscribeAuth
                | Self::SubscribeConnectionStatus
        )
    }

    #[must_use]
    pub fn is_unsubscribe(&self) -> bool {
        matches!(
            self,
            Self::UnsubscribeQuery(_)
                | Self::UnsubscribePresence(_)
                | Self::UnsubscribeTopic { .. }
                | Self::UnsubscribeAuth
                | Self::UnsubscribeConnectionStatus
        )
    }
}

struct Slot<K, C: ?Sized> {
    id: u64,
    key: K,
    callback: Rc<C>,
}

#[derive(Default)]
struct State {
    calls: Vec<CoreCall>,
    next_id: u64,
    queries: Vec<Slot<Value, dyn Fn(QueryResult)>>,
    presence: Vec<Slot<RoomHandle, dyn Fn(PresenceSnapshot)>>,
    topics: Vec<Slot<(String, String), dyn Fn(&Value, &PresenceRecord)>>,
    auth: Vec<Slot<(), dyn Fn(AuthSnapshot)>>,
    statuses: Vec<Slot<(), dyn Fn(ConnectionStatus)>>,
    cached_results: Vec<(Value, QueryResult)>,
    snapshots: BTreeMap<RoomHandle, PresenceSnapshot>,
    cached_auth: Option<AuthSnapshot>,
    status: ConnectionStatus,
    rejection: Option<CoreError>,
    local_ids: BTreeMap<String, String>,
    query_once: QueryOnceResult,
    user: Option<User>,
}

impl State {
    fn next_id(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }
}

/// Recording, scriptable [`CoreClient`].
///
/// Construct with [`RecordingCore::new`] and coerce a clone of the `Rc` into
/// a [`CoreHandle`](crate::CoreHandle).
pub struct RecordingCore {
    state: Rc<RefCell<State>>,
}

impl std::fmt::Debug for RecordingCore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.borrow();
        f.debug_struct("RecordingCore")
            .field("calls", &state.calls.len())
            .field("queries", &state.queries.len())
            .field("presence", &state.presence.len())
            .field("topics", &state.topics.len())
            .finish()
    }
}

impl RecordingCore {
    #[must_use]
    pub fn new() -> Rc<Self> {
        Rc::new(Self {
            state: Rc::new(RefCell::new(State::default())),
        })
    }

    // ── Inspection ───────────────────────────────────────────────────

    /// Every call so far, in order.
    #[must_use]
    pub fn calls(&self) -> Vec<CoreCall> {
        self.state.borrow().calls.clone()
    }

    /// Number of recorded calls matching `pred`.
    #[must_use]
    pub fn count(&self, pred: impl Fn(&CoreCall) -> bool) -> usize {
        self.state.borrow().calls.iter().filter(|c| pred(c)).count()
    }

    pub fn clear_calls(&self) {
        self.state.borrow_mut().calls.clear();
    }

    #[must_use]
    pub fn live_query_subscriptions(&self) -> usize {
        self.state.borrow().queries.len()
    }

    #[must_use]
    pub fn live_presence_subscriptions(&self) -> usize {
        self.state.borrow().presence.len()
    }

    #[must_use]
    pub fn live_topic_subscriptions(&self) -> usize {
        self.state.borrow().topics.len()
    }

    /// Live subscriptions of every kind.
    #[must_use]
    pub fn live_subscriptions(&self) -> usize {
        let state = self.state.borrow();
        state.queries.len()
            + state.presence.len()
            + state.topics.len()
            + state.auth.len()
            + state.statuses.len()
    }

    /// Canonical queries with a live subscription, oldest first.
    #[must_use]
    pub fn subscribed_queries(&self) -> Vec<Value> {
        self.state
            .borrow()
            .queries
            .iter()
            .map(|slot| slot.key.clone())
            .collect()
    }

    // ── Scripting ────────────────────────────────────────────────────

    pub fn set_cached_result(&self, query: Value, result: QueryResult) {
        let mut state = self.state.borrow_mut();
        state.cached_results.retain(|(q, _)| *q != query);
        state.cached_results.push((query, result));
    }

    pub fn set_presence_snapshot(&self, room: RoomHandle, snapshot: PresenceSnapshot) {
        self.state.borrow_mut().snapshots.insert(room, snapshot);
    }

    pub fn set_cached_auth(&self, auth: Option<AuthSnapshot>) {
        self.state.borrow_mut().cached_auth = auth;
    }

    pub fn set_status(&self, status: ConnectionStatus) {
        self.state.borrow_mut().status = status;
    }

    /// Make every async call fail with `err` until cleared with `None`.
    pub fn set_rejection(&self, err: Option<CoreError>) {
        self.state.borrow_mut().rejection = err;
    }

    pub fn set_local_id(&self, name: impl Into<String>, id: impl Into<String>) {
        self.state.borrow_mut().local_ids.insert(name.into(), id.into());
    }

    pub fn set_query_once_result(&self, result: QueryOnceResult) {
        self.state.borrow_mut().query_once = result;
    }

    pub fn set_user(&self, user: Option<User>) {
        self.state.borrow_mut().user = user;
    }

    // ── Emitting ─────────────────────────────────────────────────────
    //
    // Callbacks are snapshotted and run with the state borrow released, so
    // a callback may unsubscribe or call back into the core.

    /// Deliver `result` to every live subscription on `query`. Returns how
    /// many callbacks ran.
    pub fn emit_query(&self, query: &Value, result: QueryResult) -> usize {
        let callbacks: Vec<_> = self
            .state
            .borrow()
            .queries
            .iter()
            .filter(|slot| slot.key == *query)
            .map(|slot| Rc::clone(&slot.callback))
            .collect();
        for callback in &callbacks {
            callback(result.clone());
        }
        callbacks.len()
    }

    pub fn emit_presence(&self, room: &RoomHandle, snapshot: PresenceSnapshot) -> usize {
        let callbacks: Vec<_> = self
            .state
            .borrow()
            .presence
            .iter()
            .filter(|slot| slot.key == *room)
            .map(|slot| Rc::clone(&slot.callback))
            .collect();
        for callback in &callbacks {
            callback(snapshot.clone());
        }
        callbacks.len()
    }

    pub fn emit_topic(
        &self,
        room_id: &str,
        topic: &str,
        data: &Value,
        peer: &PresenceRecord,
    ) -> usize {
        let callbacks: Vec<_> = self
            .state
            .borrow()
            .topics
            .iter()
            .filter(|slot| slot.key.0 == room_id && slot.key.1 == topic)
            .map(|slot| Rc::clone(&slot.callback))
            .collect();
        for callback in &callbacks {
            callback(data, peer);
        }
        callbacks.len()
    }

    /// Update the cached auth value and notify subscribers.
    pub fn emit_auth(&self, snapshot: AuthSnapshot) -> usize {
        let callbacks: Vec<_> = {
            let mut state = self.state.borrow_mut();
            state.cached_auth = Some(snapshot.clone());
            state.auth.iter().map(|slot| Rc::clone(&slot.callback)).collect()
        };
        for callback in &callbacks {
            callback(snapshot.clone());
        }
        callbacks.len()
    }

    /// Update the cached status and notify subscribers.
    pub fn emit_status(&self, status: ConnectionStatus) -> usize {
        let callbacks: Vec<_> = {
            let mut state = self.state.borrow_mut();
            state.status = status;
            state
                .statuses
                .iter()
                .map(|slot| Rc::clone(&slot.callback))
                .collect()
        };
        for callback in &callbacks {
            callback(status);
        }
        callbacks.len()
    }

    // ── Internals ────────────────────────────────────────────────────

    fn record(&self, call: CoreCall) {
        self.state.borrow_mut().calls.push(call);
    }

    fn rejection(&self) -> Result<()> {
        match &self.state.borrow().rejection {
            Some(err) => Err(err.clone()),
            None => Ok(()),
        }
    }

    fn unsubscriber(
        &self,
        remove: impl FnOnce(&mut State) -> Option<CoreCall> + 'static,
    ) -> Unsubscribe {
        let weak: Weak<RefCell<State>> = Rc::downgrade(&self.state);
        Box::new(move || {
            let Some(shared) = weak.upgrade() else {
                return;
            };
            let mut state = shared.borrow_mut();
            if let Some(call) = remove(&mut state) {
                state.calls.push(call);
            }
        })
    }
}

fn take_slot<K, C: ?Sized>(slots: &mut Vec<Slot<K, C>>, id: u64) -> Option<Slot<K, C>> {
    let index = slots.iter().position(|slot| slot.id == id)?;
    Some(slots.remove(index))
}

#[async_trait(?Send)]
impl CoreClient for RecordingCore {
    fn subscribe_query(&self, query: &Value, callback: QueryCallback) -> Unsubscribe {
        let id = {
            let mut state = self.state.borrow_mut();
            let id = state.next_id();
            state.calls.push(CoreCall::SubscribeQuery(query.clone()));
            state.queries.push(Slot {
                id,
                key: query.clone(),
                callback: Rc::from(callback),
            });
            id
        };
        self.unsubscriber(move |state| {
            let slot = take_slot(&mut state.queries, id)?;
            Some(CoreCall::UnsubscribeQuery(slot.key))
        })
    }

    fn get_previous_result(&self, query: &Value) -> Option<QueryResult> {
        self.state
            .borrow()
            .cached_results
            .iter()
            .find(|(q, _)| q == query)
            .map(|(_, result)| result.clone())
    }

    fn subscribe_presence(
        &self,
        room_type: &str,
        room_id: &str,
        opts: &PresenceOpts,
        callback: PresenceCallback,
    ) -> Unsubscribe {
        let room = RoomHandle::new(room_type, room_id);
        let id = {
            let mut state = self.state.borrow_mut();
            let id = state.next_id();
            state.calls.push(CoreCall::SubscribePresence {
                room: room.clone(),
                opts: opts.clone(),
            });
            state.presence.push(Slot {
                id,
                key: room,
                callback: Rc::from(callback),
            });
            id
        };
        self.unsubscriber(move |state| {
            let slot = take_slot(&mut state.presence, id)?;
            Some(CoreCall::UnsubscribePresence(slot.key))
        })
    }

    fn get_presence(
        &self,
        room_type: &str,
        room_id: &str,
        _opts: &PresenceOpts,
    ) -> Option<PresenceSnapshot> {
        self.state
            .borrow()
            .snapshots
            .get(&RoomHandle::new(room_type, room_id))
            .cloned()
    }

    fn publish_presence(&self, room_type: &str, room_id: &str, data: &PresenceRecord) {
        self.record(CoreCall::PublishPresence {
            room: RoomHandle::new(room_type, room_id),
            data: data.clone(),
        });
    }

    fn subscribe_topic(&self, room_id: &str, topic: &str, callback: TopicCallback) -> Unsubscribe {
        let key = (room_id.to_owned(), topic.to_owned());
        let id = {
            let mut state = self.state.borrow_mut();
            let id = state.next_id();
            state.calls.push(CoreCall::SubscribeTopic {
                room_id: key.0.clone(),
                topic: key.1.clone(),
            });
            state.topics.push(Slot {
                id,
                key,
                callback: Rc::from(callback),
            });
            id
        };
        self.unsubscriber(move |state| {
            let slot = take_slot(&mut state.topics, id)?;
            let (room_id, topic) = slot.key;
            Some(CoreCall::UnsubscribeTopic { room_id, topic })
        })
    }

    fn publish_topic(&self, message: TopicMessage) {
        self.record(CoreCall::PublishTopic(message));
    }

    fn join_room(&self, room_id: &str) {
        self.record(CoreCall::JoinRoom(room_id.to_owned()));
    }

    fn subscribe_auth(&self, callback: AuthCallback) -> Unsubscribe {
        let id = {
            let mut state = self.state.borrow_mut();
            let id = state.next_id();
            state.calls.push(CoreCall::SubscribeAuth);
            state.auth.push(Slot {
                id,
                key: (),
                callback: Rc::from(callback),
            });
            id
        };
        self.unsubscriber(move |state| {
            take_slot(&mut state.auth, id)?;
            Some(CoreCall::UnsubscribeAuth)
        })
    }

    fn current_user_cached(&self) -> Option<AuthSnapshot> {
        self.state.borrow().cached_auth.clone()
    }

    fn subscribe_connection_status(&self, callback: StatusCallback) -> Unsubscribe {
        let id = {
            let mut state = self.state.borrow_mut();
            let id = state.next_id();
            state.calls.push(CoreCall::SubscribeConnectionStatus);
            state.statuses.push(Slot {
                id,
                key: (),
                callback: Rc::from(callback),
            });
            id
        };
        self.unsubscriber(move |state| {
            take_slot(&mut state.statuses, id)?;
            Some(CoreCall::UnsubscribeConnectionStatus)
        })
    }

    fn status(&self) -> ConnectionStatus {
        self.state.borrow().status
    }

    async fn transact(&self, chunks: Vec<TransactionChunk>) -> Result<()> {
        self.record(CoreCall::Transact(chunks));
        self.rejection()
    }

    async fn query_once(&self, query: &Value, _opts: &QueryOpts) -> Result<QueryOnceResult> {
        self.record(CoreCall::QueryOnce(query.clone()));
        self.rejection()?;
        Ok(self.state.borrow().query_once.clone())
    }

    async fn get_local_id(&self, name: &str) -> Result<String> {
        self.record(CoreCall::GetLocalId(name.to_owned()));
        self.rejection()?;
        let mut state = self.state.borrow_mut();
        let next = state.local_ids.len() + 1;
        Ok(state
            .local_ids
            .entry(name.to_owned())
            .or_insert_with(|| format!("local-{name}-{next}"))
            .clone())
    }

    async fn get_auth(&self) -> Result<Option<User>> {
        self.record(CoreCall::GetAuth);
        self.rejection()?;
        Ok(self.state.borrow().user.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::executor::block_on;
    use serde_json::json;
    use std::cell::Cell;

    #[test]
    fn unsubscribe_stops_delivery_and_is_recorded() {
        let core = RecordingCore::new();
        let hits = Rc::new(Cell::new(0));
        let counter = Rc::clone(&hits);
        let query = json!({"tasks": {}});
        let unsubscribe =
            core.subscribe_query(&query, Box::new(move |_| counter.set(counter.get() + 1)));

        assert_eq!(core.emit_query(&query, QueryResult::data(json!([]))), 1);
        unsubscribe();
        assert_eq!(core.emit_query(&query, QueryResult::data(json!([]))), 0);

        assert_eq!(hits.get(), 1);
        assert_eq!(
            core.calls(),
            vec![
                CoreCall::SubscribeQuery(query.clone()),
                CoreCall::UnsubscribeQuery(query)
            ]
        );
        assert_eq!(core.live_subscriptions(), 0);
    }

    #[test]
    fn emit_only_reaches_matching_room() {
        let core = RecordingCore::new();
        let hits = Rc::new(Cell::new(0));
        let counter = Rc::clone(&hits);
        let _unsub = core.subscribe_presence(
            "chat",
            "r1",
            &PresenceOpts::default(),
            Box::new(move |_| counter.set(counter.get() + 1)),
        );

        core.emit_presence(&RoomHandle::new("chat", "r2"), PresenceSnapshot::default());
        core.emit_presence(&RoomHandle::new("chat", "r1"), PresenceSnapshot::default());
        assert_eq!(hits.get(), 1);
    }

    #[test]
    fn callback_may_unsubscribe_itself() {
        let core = RecordingCore::new();
        let slot: Rc<RefCell<Option<Unsubscribe>>> = Rc::new(RefCell::new(None));
        let inner = Rc::clone(&slot);
        let unsubscribe = core.subscribe_topic(
            "r1",
            "emoji",
            Box::new(move |_: &Value, _: &PresenceRecord| {
                if let Some(unsubscribe) = inner.borrow_mut().take() {
                    unsubscribe();
                }
            }),
        );
        *slot.borrow_mut() = Some(unsubscribe);

        assert_eq!(core.emit_topic("r1", "emoji", &json!(1), &PresenceRecord::new()), 1);
        assert_eq!(core.live_topic_subscriptions(), 0);
    }

    #[test]
    fn cached_values_are_served() {
        let core = RecordingCore::new();
        let query = json!({"goals": {}});
        core.set_cached_result(query.clone(), QueryResult::data(json!({"goals": []})));
        core.set_status(ConnectionStatus::Authenticated);

        assert!(core.get_previous_result(&query).is_some());
        assert!(core.get_previous_result(&json!({"other": {}})).is_none());
        assert_eq!(core.status(), ConnectionStatus::Authenticated);
        assert!(core.calls().is_empty());
    }

    #[test]
    fn rejection_applies_to_async_calls() {
        let core = RecordingCore::new();
        core.set_rejection(Some(CoreError::rejected("nope")));
        let err = block_on(core.transact(Vec::new())).unwrap_err();
        assert_eq!(err, CoreError::rejected("nope"));

        core.set_rejection(None);
        assert!(block_on(core.transact(Vec::new())).is_ok());
    }

    #[test]
    fn local_ids_are_stable_per_name() {
        let core = RecordingCore::new();
        let a = block_on(core.get_local_id("device")).unwrap();
        let b = block_on(core.get_local_id("device")).unwrap();
        assert_eq!(a, b);
    }
}

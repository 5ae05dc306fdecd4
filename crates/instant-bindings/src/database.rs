#![forbid(unsafe_code)]

//! The [`Database`] facade.
//!
//! A `Database` owns one core client and the configuration it was built
//! from. Every reactive adapter is exposed as a `use_*` method bound to that
//! client; the async operations are direct passthroughs whose errors come
//! back exactly as the core raised them.
//!
//! # Invariants
//!
//! - Clones share the same core client.
//! - [`Room`]s compare equal when they name the same `(type, id)` on the
//!   same client.

use std::fmt;
use std::rc::Rc;

use instant_core::{
    AuthState, ConnectionStatus, ContextError, CoreConnector, CoreError, CoreHandle, InitError,
    InstantConfig, PresenceOpts, PresenceRecord, QueryOnceResult, QueryOpts, RoomHandle,
    TransactionChunk, User,
};
use instant_reactive::{Input, Observable, Scope};
use serde_json::Value;
use tracing::{debug, info};

use crate::auth::{create_auth, create_connection_status};
use crate::cursors::{Cursors, CursorsOpts, create_cursors};
use crate::presence::{PresenceHandle, create_presence};
use crate::query::{QueryHandle, create_query};
use crate::sync_presence::create_sync_presence;
use crate::topic::{PublishTopic, TopicEffect, create_publish_topic, create_topic_effect};
use crate::typing::{TypingIndicator, TypingIndicatorOpts, create_typing_indicator};

/// Entry point for application code.
#[derive(Clone)]
pub struct Database {
    core: CoreHandle,
    config: Rc<InstantConfig>,
}

impl fmt::Debug for Database {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Database")
            .field("app_id", &self.config.app_id)
            .finish_non_exhaustive()
    }
}

impl Database {
    /// Validate `config` and build the core client through `connector`.
    pub fn init(config: InstantConfig, connector: &dyn CoreConnector) -> Result<Self, InitError> {
        config.validate()?;
        let core = connector.connect(&config)?;
        info!(app_id = %config.app_id, devtool = config.devtool, "database initialised");
        Ok(Self {
            core,
            config: Rc::new(config),
        })
    }

    /// Wrap an already constructed core client.
    #[must_use]
    pub fn from_core(core: CoreHandle, config: InstantConfig) -> Self {
        Self {
            core,
            config: Rc::new(config),
        }
    }

    #[must_use]
    pub fn core(&self) -> &CoreHandle {
        &self.core
    }

    #[must_use]
    pub fn config(&self) -> &InstantConfig {
        &self.config
    }

    // ── Rooms ────────────────────────────────────────────────────────

    #[must_use]
    pub fn room(&self, room_type: impl Into<String>, room_id: impl Into<String>) -> Room {
        Room {
            db: self.clone(),
            handle: RoomHandle::new(room_type, room_id),
        }
    }

    /// The room used when an application never names one.
    #[must_use]
    pub fn default_room(&self) -> Room {
        Room {
            db: self.clone(),
            handle: RoomHandle::default_room(),
        }
    }

    // ── Reactive adapters ────────────────────────────────────────────

    pub fn use_query(
        &self,
        scope: &Scope,
        query: impl Into<Input<Option<Value>>>,
        opts: impl Into<Input<Option<QueryOpts>>>,
    ) -> QueryHandle {
        create_query(scope, &self.core, query, opts)
    }

    pub fn use_auth(&self, scope: &Scope) -> Observable<AuthState> {
        create_auth(scope, &self.core)
    }

    pub fn use_connection_status(&self, scope: &Scope) -> Observable<ConnectionStatus> {
        create_connection_status(scope, &self.core)
    }

    pub fn use_presence(
        &self,
        scope: &Scope,
        room: impl Into<Input<Option<RoomHandle>>>,
        opts: impl Into<Input<PresenceOpts>>,
    ) -> PresenceHandle {
        create_presence(scope, &self.core, room, opts)
    }

    pub fn use_topic_effect(
        &self,
        scope: &Scope,
        room: impl Into<Input<Option<RoomHandle>>>,
        topic: impl Into<Input<Option<String>>>,
        on_event: impl Fn(&Value, &PresenceRecord) + 'static,
    ) -> TopicEffect {
        create_topic_effect(scope, &self.core, room, topic, on_event)
    }

    pub fn use_publish_topic(
        &self,
        scope: &Scope,
        room: impl Into<Input<Option<RoomHandle>>>,
        topic: impl Into<Input<Option<String>>>,
    ) -> PublishTopic {
        create_publish_topic(scope, &self.core, room, topic)
    }

    pub fn use_typing_indicator(
        &self,
        scope: &Scope,
        room: impl Into<Input<Option<RoomHandle>>>,
        field: impl Into<String>,
        opts: TypingIndicatorOpts,
    ) -> TypingIndicator {
        create_typing_indicator(scope, &self.core, room, field, opts)
    }

    pub fn use_sync_presence(
        &self,
        scope: &Scope,
        room: impl Into<Input<Option<RoomHandle>>>,
        data: impl Into<Input<PresenceRecord>>,
    ) {
        create_sync_presence(scope, &self.core, room, data);
    }

    pub fn use_cursors(
        &self,
        scope: &Scope,
        room: impl Into<Input<Option<RoomHandle>>>,
        opts: CursorsOpts,
    ) -> Cursors {
        create_cursors(scope, &self.core, room, opts)
    }

    // ── Async passthroughs ───────────────────────────────────────────

    pub async fn transact<I>(&self, chunks: I) -> Result<(), CoreError>
    where
        I: IntoIterator,
        I::Item: Into<TransactionChunk>,
    {
        let chunks: Vec<TransactionChunk> = chunks.into_iter().map(Into::into).collect();
        debug!(chunks = chunks.len(), "transact");
        self.core.transact(chunks).await
    }

    pub async fn query_once(
        &self,
        query: &Value,
        opts: Option<QueryOpts>,
    ) -> Result<QueryOnceResult, CoreError> {
        self.core.query_once(query, &opts.unwrap_or_default()).await
    }

    pub async fn get_local_id(&self, name: &str) -> Result<String, CoreError> {
        self.core.get_local_id(name).await
    }

    pub async fn get_auth(&self) -> Result<Option<User>, CoreError> {
        self.core.get_auth().await
    }

    // ── Context ──────────────────────────────────────────────────────

    /// Make this database available to `scope` and its descendants.
    pub fn provide(&self, scope: &Scope) {
        scope.provide_context(self.clone());
    }
}

/// The nearest [`Database`] provided on `scope` or a parent.
pub fn use_database(scope: &Scope) -> Result<Database, ContextError> {
    scope
        .use_context::<Database>()
        .ok_or(ContextError::Missing {
            type_name: "Database",
        })
}

/// A room bound to a database.
#[derive(Clone)]
pub struct Room {
    db: Database,
    handle: RoomHandle,
}

impl fmt::Debug for Room {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Room").field(&self.handle).finish()
    }
}

impl PartialEq for Room {
    fn eq(&self, other: &Self) -> bool {
        self.handle == other.handle && Rc::ptr_eq(&self.db.core, &other.db.core)
    }
}

impl Room {
    #[must_use]
    pub fn handle(&self) -> &RoomHandle {
        &self.handle
    }

    #[must_use]
    pub fn room_type(&self) -> &str {
        &self.handle.room_type
    }

    #[must_use]
    pub fn room_id(&self) -> &str {
        &self.handle.room_id
    }

    fn input(&self) -> Input<Option<RoomHandle>> {
        Input::value(Some(self.handle.clone()))
    }

    pub fn use_presence(&self, scope: &Scope, opts: PresenceOpts) -> PresenceHandle {
        self.db.use_presence(scope, self.input(), Input::value(opts))
    }

    pub fn use_topic_effect(
        &self,
        scope: &Scope,
        topic: impl Into<String>,
        on_event: impl Fn(&Value, &PresenceRecord) + 'static,
    ) -> TopicEffect {
        self.db
            .use_topic_effect(scope, self.input(), Input::value(Some(topic.into())), on_event)
    }

    pub fn use_publish_topic(&self, scope: &Scope, topic: impl Into<String>) -> PublishTopic {
        self.db
            .use_publish_topic(scope, self.input(), Input::value(Some(topic.into())))
    }

    pub fn use_typing_indicator(
        &self,
        scope: &Scope,
        field: impl Into<String>,
        opts: TypingIndicatorOpts,
    ) -> TypingIndicator {
        self.db
            .use_typing_indicator(scope, self.input(), field, opts)
    }

    pub fn use_sync_presence(&self, scope: &Scope, data: impl Into<Input<PresenceRecord>>) {
        self.db.use_sync_presence(scope, self.input(), data);
    }

    pub fn use_cursors(&self, scope: &Scope, opts: CursorsOpts) -> Cursors {
        self.db.use_cursors(scope, self.input(), opts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::executor::block_on;
    use instant_core::testing::{CoreCall, RecordingCore};
    use instant_core::{ConfigError, FixedConnector};
    use instant_reactive::Runtime;
    use serde_json::json;

    fn db() -> (Rc<RecordingCore>, Database) {
        let core = RecordingCore::new();
        let handle: CoreHandle = core.clone();
        let db = Database::init(InstantConfig::new("app-1"), &FixedConnector::new(handle))
            .expect("valid config");
        (core, db)
    }

    #[test]
    fn init_rejects_empty_app_id() {
        let core: CoreHandle = RecordingCore::new();
        let err = Database::init(InstantConfig::new(""), &FixedConnector::new(core)).unwrap_err();
        assert!(matches!(err, InitError::Config(ConfigError::EmptyAppId)));
    }

    #[test]
    fn rooms_compare_by_value_on_same_client() {
        let (_core, db) = db();
        assert_eq!(db.room("chat", "r1"), db.room("chat", "r1"));
        assert_ne!(db.room("chat", "r1"), db.room("chat", "r2"));

        let (_other_core, other) = self::db();
        assert_ne!(db.room("chat", "r1"), other.room("chat", "r1"));
        assert_eq!(db.default_room().room_type(), "_defaultRoomType");
    }

    #[test]
    fn room_helpers_route_through_core() {
        let (core, db) = db();
        let scope = Runtime::new().root();
        let room = db.room("t", "room-A");
        let publisher = room.use_publish_topic(&scope, "emoji");
        publisher.publish(json!("🎉"));

        assert_eq!(
            core.calls(),
            vec![
                CoreCall::JoinRoom("room-A".into()),
                CoreCall::PublishTopic(instant_core::TopicMessage {
                    room_type: "t".into(),
                    room_id: "room-A".into(),
                    topic: "emoji".into(),
                    data: json!("🎉"),
                }),
            ]
        );
    }

    #[test]
    fn context_lookup_walks_parents() {
        let (_core, db) = db();
        let root = Runtime::new().root();
        let child = root.child();
        assert_eq!(
            use_database(&child).unwrap_err(),
            ContextError::Missing {
                type_name: "Database"
            }
        );

        db.provide(&root);
        let found = use_database(&child.child()).expect("provided on root");
        assert!(Rc::ptr_eq(found.core(), db.core()));
    }

    #[test]
    fn transact_records_chunks() {
        let (core, db) = db();
        block_on(db.transact([json!({"update": "tasks"})])).expect("ok");
        assert_eq!(
            core.calls(),
            vec![CoreCall::Transact(vec![TransactionChunk(json!({"update": "tasks"}))])]
        );
    }
}

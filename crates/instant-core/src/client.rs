#![forbid(unsafe_code)]

//! The core-client seam.
//!
//! [`CoreClient`] is everything the bindings consume from the real-time
//! database client: callback subscriptions returning an [`Unsubscribe`], a
//! few synchronous cache peeks, fire-and-forget publishes, and four async
//! passthroughs.
//!
//! # Contract
//!
//! 1. After an [`Unsubscribe`] has run, the matching callback is never
//!    invoked again.
//! 2. Callbacks are invoked on the thread that owns the reactive runtime.
//! 3. Cache peeks (`get_previous_result`, `get_presence`,
//!    `current_user_cached`, `status`) have no subscription side effects.

use std::fmt;
use std::rc::Rc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::auth::{AuthSnapshot, ConnectionStatus, User};
use crate::config::InstantConfig;
use crate::error::Result;
use crate::presence::{PresenceOpts, PresenceRecord, PresenceSnapshot};
use crate::query::{QueryOnceResult, QueryOpts, QueryResult};
use crate::room::TopicMessage;

/// Tears down one subscription.
pub type Unsubscribe = Box<dyn FnOnce()>;

/// Shared handle to the core client.
pub type CoreHandle = Rc<dyn CoreClient>;

pub type QueryCallback = Box<dyn Fn(QueryResult)>;
pub type PresenceCallback = Box<dyn Fn(PresenceSnapshot)>;
/// Receives `(payload, originating peer)`.
pub type TopicCallback = Box<dyn Fn(&Value, &PresenceRecord)>;
pub type AuthCallback = Box<dyn Fn(AuthSnapshot)>;
pub type StatusCallback = Box<dyn Fn(ConnectionStatus)>;

/// One step of a transaction, already built by the core's transaction DSL.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TransactionChunk(pub Value);

impl From<Value> for TransactionChunk {
    fn from(value: Value) -> Self {
        Self(value)
    }
}

/// The real-time database client the bindings adapt.
#[async_trait(?Send)]
pub trait CoreClient {
    /// Normalize a user query into the form used for subscriptions and
    /// cache lookups.
    fn coerce_query(&self, query: &Value) -> Value {
        query.clone()
    }

    fn subscribe_query(&self, query: &Value, callback: QueryCallback) -> Unsubscribe;

    /// Last result delivered for `query`, if cached.
    fn get_previous_result(&self, query: &Value) -> Option<QueryResult>;

    fn subscribe_presence(
        &self,
        room_type: &str,
        room_id: &str,
        opts: &PresenceOpts,
        callback: PresenceCallback,
    ) -> Unsubscribe;

    /// Current presence for a room, if the core has any.
    fn get_presence(
        &self,
        room_type: &str,
        room_id: &str,
        opts: &PresenceOpts,
    ) -> Option<PresenceSnapshot>;

    fn publish_presence(&self, room_type: &str, room_id: &str, data: &PresenceRecord);

    fn subscribe_topic(&self, room_id: &str, topic: &str, callback: TopicCallback) -> Unsubscribe;

    fn publish_topic(&self, message: TopicMessage);

    /// Join a room. Repeated joins are deduplicated by the core.
    fn join_room(&self, room_id: &str);

    fn subscribe_auth(&self, callback: AuthCallback) -> Unsubscribe;

    /// Last known auth state; `None` until the core has resolved it.
    fn current_user_cached(&self) -> Option<AuthSnapshot>;

    fn subscribe_connection_status(&self, callback: StatusCallback) -> Unsubscribe;

    fn status(&self) -> ConnectionStatus;

    async fn transact(&self, chunks: Vec<TransactionChunk>) -> Result<()>;

    async fn query_once(&self, query: &Value, opts: &QueryOpts) -> Result<QueryOnceResult>;

    /// A stable id for `name` on this device.
    async fn get_local_id(&self, name: &str) -> Result<String>;

    async fn get_auth(&self) -> Result<Option<User>>;
}

/// Builds the core client from configuration.
///
/// Storage and network-listener strategies belong to the connector.
pub trait CoreConnector {
    fn connect(&self, config: &InstantConfig) -> Result<CoreHandle>;
}

/// A connector that hands out an already constructed client.
#[derive(Clone)]
pub struct FixedConnector {
    core: CoreHandle,
}

impl FixedConnector {
    #[must_use]
    pub fn new(core: CoreHandle) -> Self {
        Self { core }
    }
}

impl fmt::Debug for FixedConnector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FixedConnector").finish_non_exhaustive()
    }
}

impl CoreConnector for FixedConnector {
    fn connect(&self, config: &InstantConfig) -> Result<CoreHandle> {
        debug!(app_id = %config.app_id, "reusing existing core client");
        Ok(Rc::clone(&self.core))
    }
}

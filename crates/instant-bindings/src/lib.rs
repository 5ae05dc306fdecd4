#![forbid(unsafe_code)]

//! Reactive adapters over the Instant core client.
//!
//! Each adapter turns one of the core's `subscribe(callback) -> unsubscribe`
//! interfaces into reactive state owned by a [`Scope`](instant_reactive::Scope):
//!
//! | Adapter | Output |
//! |---------|--------|
//! | [`create_query`] | [`QueryHandle`] over query lifecycle state |
//! | [`create_presence`] | [`PresenceHandle`] over room presence |
//! | [`create_topic_effect`] | callback per topic broadcast |
//! | [`create_publish_topic`] | [`PublishTopic`] publisher |
//! | [`create_typing_indicator`] | [`TypingIndicator`] |
//! | [`create_auth`], [`create_connection_status`] | mirrored cells |
//! | [`create_sync_presence`] | publishes a reactive record |
//! | [`create_cursors`] | [`Cursors`] over a presence space |
//!
//! [`Database`] binds all of them to one core client.
//!
//! # Invariants
//!
//! - An adapter holds at most one live subscription.
//! - On a key change the old subscription is torn down before the new one
//!   is opened, and callbacks from a torn-down subscription are ignored.
//! - Disposing the owning scope unsubscribes everything the adapter opened
//!   and cancels its pending timers.

pub mod auth;
pub mod cursors;
pub mod database;
mod keyed;
pub mod presence;
pub mod query;
pub mod sync_presence;
pub mod timeout;
pub mod topic;
pub mod typing;

pub use auth::{create_auth, create_connection_status};
pub use cursors::{CursorRect, Cursors, CursorsOpts, PeerCursor, create_cursors};
pub use database::{Database, Room, use_database};
pub use presence::{PresenceHandle, create_presence};
pub use query::{QueryHandle, create_query};
pub use sync_presence::create_sync_presence;
pub use timeout::Timeout;
pub use topic::{PublishTopic, TopicEffect, create_publish_topic, create_topic_effect};
pub use typing::{
    DEFAULT_TYPING_TIMEOUT, ENTER_KEY, TypingIndicator, TypingIndicatorOpts,
    create_typing_indicator,
};

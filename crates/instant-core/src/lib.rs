#![forbid(unsafe_code)]

//! The core-client seam for the Instant bindings.
//!
//! The real-time database client is an external collaborator. This crate
//! names what the bindings need from it ([`CoreClient`]) and the values that
//! cross the boundary: query keys and lifecycle state, presence, rooms and
//! topic messages, auth and connection status. It also holds the client
//! configuration ([`InstantConfig`]) and the error types.
//!
//! Enable the `test-helpers` feature for [`testing::RecordingCore`], an
//! in-memory client that records calls and lets tests fire callbacks.

pub mod auth;
pub mod client;
pub mod config;
pub mod error;
pub mod presence;
pub mod query;
pub mod room;

#[cfg(any(test, feature = "test-helpers"))]
pub mod testing;

pub use auth::{AuthSnapshot, AuthState, ConnectionStatus, User};
pub use client::{
    AuthCallback, CoreClient, CoreConnector, CoreHandle, FixedConnector, PresenceCallback,
    QueryCallback, StatusCallback, TopicCallback, TransactionChunk, Unsubscribe,
};
pub use config::InstantConfig;
pub use error::{ConfigError, ContextError, CoreError, ErrorValue, InitError};
pub use presence::{PresenceOpts, PresenceRecord, PresenceSnapshot, PresenceState};
pub use query::{
    QueryKey, QueryOnceResult, QueryOpts, QueryResult, QueryState, with_rule_params,
};
pub use room::{RoomHandle, TopicMessage};

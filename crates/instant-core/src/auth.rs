#![forbid(unsafe_code)]

//! Auth and connection-status values mirrored by the bindings.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::ErrorValue;

/// A signed-in user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl User {
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            email: None,
            refresh_token: None,
            extra: Map::new(),
        }
    }
}

/// What the core delivers to auth subscribers and keeps as its cached value.
///
/// `user: None` means signed out.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AuthSnapshot {
    #[serde(default)]
    pub user: Option<User>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorValue>,
}

/// Reactive view of the auth stream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthState {
    pub is_loading: bool,
    #[serde(default)]
    pub user: Option<User>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorValue>,
}

impl Default for AuthState {
    fn default() -> Self {
        Self {
            is_loading: true,
            user: None,
            error: None,
        }
    }
}

impl AuthState {
    /// Seed from the core's cached value; loading when nothing is known yet.
    #[must_use]
    pub fn seed(cached: Option<AuthSnapshot>) -> Self {
        cached.map_or_else(Self::default, Self::from_snapshot)
    }

    /// State after a delivery. Never loading.
    #[must_use]
    pub fn from_snapshot(snapshot: AuthSnapshot) -> Self {
        Self {
            is_loading: false,
            user: snapshot.user,
            error: snapshot.error,
        }
    }
}

/// Lifecycle of the core's connection to the sync server.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionStatus {
    #[default]
    Connecting,
    Opened,
    Authenticated,
    Closed,
    Errored,
}

impl ConnectionStatus {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Connecting => "connecting",
            Self::Opened => "opened",
            Self::Authenticated => "authenticated",
            Self::Closed => "closed",
            Self::Errored => "errored",
        }
    }

    #[must_use]
    pub const fn is_connected(self) -> bool {
        matches!(self, Self::Opened | Self::Authenticated)
    }
}

impl fmt::Display for ConnectionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#![forbid(unsafe_code)]

//! Error types shared by the core client and the bindings.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, CoreError>;

/// Failure reported by the core client's asynchronous calls.
///
/// The bindings hand these back to callers untouched.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CoreError {
    #[error("{message}")]
    Rejected {
        message: String,
        hint: Option<Value>,
    },

    #[error("network error: {0}")]
    Network(String),

    #[error("connection closed")]
    Closed,

    #[error("JSON error: {0}")]
    Json(String),
}

impl CoreError {
    #[must_use]
    pub fn rejected(message: impl Into<String>) -> Self {
        Self::Rejected {
            message: message.into(),
            hint: None,
        }
    }

    #[must_use]
    pub fn with_hint(self, hint: Value) -> Self {
        match self {
            Self::Rejected { message, .. } => Self::Rejected {
                message,
                hint: Some(hint),
            },
            other => other,
        }
    }
}

impl From<serde_json::Error> for CoreError {
    fn from(err: serde_json::Error) -> Self {
        Self::Json(err.to_string())
    }
}

/// Invalid [`InstantConfig`](crate::InstantConfig).
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("app id must not be empty")]
    EmptyAppId,

    #[error("{field} must start with {expected}: {uri}")]
    InvalidUri {
        field: &'static str,
        uri: String,
        expected: &'static str,
    },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Failure constructing a database facade.
#[derive(Debug, Error)]
pub enum InitError {
    #[error("invalid config: {0}")]
    Config(#[from] ConfigError),

    #[error("core client failed to start: {0}")]
    Core(#[from] CoreError),
}

/// A required value was not provided by any enclosing scope.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ContextError {
    #[error("no {type_name} provided in this scope or any parent")]
    Missing { type_name: &'static str },
}

/// An upstream error delivered inside query, presence or auth state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorValue {
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hint: Option<Value>,
}

impl ErrorValue {
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            hint: None,
        }
    }
}

impl fmt::Display for ErrorValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn rejected_displays_message() {
        let err = CoreError::rejected("permission denied").with_hint(json!({"rule": "view"}));
        assert_eq!(err.to_string(), "permission denied");
        assert!(matches!(err, CoreError::Rejected { hint: Some(_), .. }));
    }

    #[test]
    fn hint_is_ignored_on_other_variants() {
        assert_eq!(CoreError::Closed.with_hint(json!(1)), CoreError::Closed);
    }

    #[test]
    fn error_value_round_trips_without_hint() {
        let value: ErrorValue = serde_json::from_value(json!({"message": "boom"})).unwrap();
        assert_eq!(value, ErrorValue::new("boom"));
        assert_eq!(serde_json::to_value(&value).unwrap(), json!({"message": "boom"}));
    }

    #[test]
    fn context_error_names_type() {
        let err = ContextError::Missing {
            type_name: "Database",
        };
        assert!(err.to_string().contains("Database"));
    }
}

#![forbid(unsafe_code)]

//! Client configuration.

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

pub const DEFAULT_API_URI: &str = "https://api.instantdb.com";
pub const DEFAULT_WEBSOCKET_URI: &str = "wss://api.instantdb.com/runtime/session";

fn default_api_uri() -> String {
    DEFAULT_API_URI.to_owned()
}

fn default_websocket_uri() -> String {
    DEFAULT_WEBSOCKET_URI.to_owned()
}

fn default_true() -> bool {
    true
}

/// Settings used to construct the core client.
///
/// Field names follow the JSON the hosted service documents, so a config
/// file can be shared with other clients.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstantConfig {
    #[serde(rename = "appId")]
    pub app_id: String,
    #[serde(rename = "apiURI", default = "default_api_uri")]
    pub api_uri: String,
    #[serde(rename = "websocketURI", default = "default_websocket_uri")]
    pub websocket_uri: String,
    #[serde(default = "default_true")]
    pub devtool: bool,
    #[serde(default)]
    pub verbose: bool,
}

impl InstantConfig {
    #[must_use]
    pub fn new(app_id: impl Into<String>) -> Self {
        Self {
            app_id: app_id.into(),
            api_uri: default_api_uri(),
            websocket_uri: default_websocket_uri(),
            devtool: true,
            verbose: false,
        }
    }

    /// Parse from JSON and validate.
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    #[must_use]
    pub fn with_api_uri(mut self, uri: impl Into<String>) -> Self {
        self.api_uri = uri.into();
        self
    }

    #[must_use]
    pub fn with_websocket_uri(mut self, uri: impl Into<String>) -> Self {
        self.websocket_uri = uri.into();
        self
    }

    #[must_use]
    pub fn with_devtool(mut self, enabled: bool) -> Self {
        self.devtool = enabled;
        self
    }

    #[must_use]
    pub fn with_verbose(mut self, enabled: bool) -> Self {
        self.verbose = enabled;
        self
    }

    /// Reject an empty app id and URIs with the wrong scheme.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.app_id.trim().is_empty() {
            return Err(ConfigError::EmptyAppId);
        }
        check_scheme("apiURI", &self.api_uri, &["http://", "https://"], "http:// or https://")?;
        check_scheme(
            "websocketURI",
            &self.websocket_uri,
            &["ws://", "wss://"],
            "ws:// or wss://",
        )
    }
}

fn check_scheme(
    field: &'static str,
    uri: &str,
    schemes: &[&str],
    expected: &'static str,
) -> Result<(), ConfigError> {
    if schemes.iter().any(|scheme| uri.starts_with(scheme)) {
        Ok(())
    } else {
        Err(ConfigError::InvalidUri {
            field,
            uri: uri.to_owned(),
            expected,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_fill_missing_fields() {
        let config = InstantConfig::from_json_str(r#"{"appId": "app-1"}"#).unwrap();
        assert_eq!(config, InstantConfig::new("app-1"));
        assert!(config.devtool);
        assert!(!config.verbose);
    }

    #[test]
    fn explicit_fields_override_defaults() {
        let config = InstantConfig::from_json_str(
            r#"{"appId": "a", "apiURI": "http://localhost:8888",
                "websocketURI": "ws://localhost:8888/runtime/session", "verbose": true}"#,
        )
        .unwrap();
        assert_eq!(config.api_uri, "http://localhost:8888");
        assert!(config.verbose);
    }

    #[test]
    fn empty_app_id_is_rejected() {
        let err = InstantConfig::new("  ").validate().unwrap_err();
        assert!(matches!(err, ConfigError::EmptyAppId));
    }

    #[test]
    fn wrong_scheme_is_rejected() {
        let err = InstantConfig::new("a")
            .with_websocket_uri("https://api.instantdb.com")
            .validate()
            .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidUri { field: "websocketURI", .. }));
    }

    #[test]
    fn malformed_json_is_a_config_error() {
        assert!(matches!(
            InstantConfig::from_json_str("{"),
            Err(ConfigError::Json(_))
        ));
    }
}

#![forbid(unsafe_code)]

//! Query keys and query lifecycle state.
//!
//! A [`QueryKey`] is the canonical form of a query plus injected rule
//! parameters. It carries a precomputed hash used as a fast reject when
//! comparing keys; equality always falls back to a structural compare, so a
//! hash collision can never make two different queries share a subscription.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::ErrorValue;

/// Name of the synthetic top-level field carrying rule parameters.
pub const RULE_PARAMS_FIELD: &str = "$$ruleParams";

// Fixed seeds keep key hashes stable across runs, so they can be logged and
// compared between sessions.
const KEY_SEEDS: [u64; 4] = [
    0x243f_6a88_85a3_08d3,
    0x1319_8a2e_0370_7344,
    0xa409_3822_299f_31d0,
    0x082e_fa98_ec4e_6c89,
];

fn digest(value: &Value) -> u64 {
    ahash::RandomState::with_seeds(KEY_SEEDS[0], KEY_SEEDS[1], KEY_SEEDS[2], KEY_SEEDS[3])
        .hash_one(value.to_string())
}

/// Options accepted by the query adapter and `query_once`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryOpts {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rule_params: Option<Value>,
}

impl QueryOpts {
    #[must_use]
    pub fn with_rule_params(rule_params: Value) -> Self {
        Self {
            rule_params: Some(rule_params),
        }
    }
}

/// Merge rule parameters from `opts` into `query`.
///
/// Fields already present on the query win over the injected field. Queries
/// that are not JSON objects are returned unchanged.
#[must_use]
pub fn with_rule_params(query: &Value, opts: Option<&QueryOpts>) -> Value {
    let Some(params) = opts.and_then(|opts| opts.rule_params.as_ref()) else {
        return query.clone();
    };
    let Value::Object(fields) = query else {
        return query.clone();
    };
    let mut merged = Map::new();
    merged.insert(RULE_PARAMS_FIELD.to_owned(), params.clone());
    merged.extend(fields.iter().map(|(k, v)| (k.clone(), v.clone())));
    Value::Object(merged)
}

/// The canonical form of a query, used as subscription argument and identity.
#[derive(Clone)]
pub struct QueryKey {
    canonical: Value,
    hash: u64,
}

impl QueryKey {
    #[must_use]
    pub fn new(canonical: Value) -> Self {
        let hash = digest(&canonical);
        Self { canonical, hash }
    }

    #[must_use]
    pub fn canonical(&self) -> &Value {
        &self.canonical
    }

    #[must_use]
    pub fn hash(&self) -> u64 {
        self.hash
    }
}

impl PartialEq for QueryKey {
    fn eq(&self, other: &Self) -> bool {
        self.hash == other.hash && self.canonical == other.canonical
    }
}

impl Eq for QueryKey {}

impl fmt::Debug for QueryKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QueryKey")
            .field("hash", &format_args!("{:016x}", self.hash))
            .field("canonical", &self.canonical)
            .finish()
    }
}

/// One delivery from a query subscription, or a cached previous result.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryResult {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page_info: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorValue>,
}

impl QueryResult {
    #[must_use]
    pub fn data(data: Value) -> Self {
        Self {
            data: Some(data),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn error(error: ErrorValue) -> Self {
        Self {
            error: Some(error),
            ..Self::default()
        }
    }
}

/// Reactive view of a query: loading, or a delivered result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryState {
    pub is_loading: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page_info: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorValue>,
}

impl Default for QueryState {
    fn default() -> Self {
        Self::loading()
    }
}

impl QueryState {
    /// Nothing delivered yet.
    #[must_use]
    pub fn loading() -> Self {
        Self {
            is_loading: true,
            data: None,
            page_info: None,
            error: None,
        }
    }

    /// State for an optional result: loading when absent, else the result.
    #[must_use]
    pub fn for_result(result: Option<&QueryResult>) -> Self {
        match result {
            None => Self::loading(),
            Some(result) => Self {
                is_loading: false,
                data: result.data.clone(),
                page_info: result.page_info.clone(),
                error: result.error.clone(),
            },
        }
    }
}

/// Result of a one-shot query.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryOnceResult {
    pub data: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page_info: Option<Value>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn rule_params_are_injected_first() {
        let query = json!({"tasks": {}});
        let opts = QueryOpts::with_rule_params(json!({"owner": "u1"}));
        let merged = with_rule_params(&query, Some(&opts));
        assert_eq!(
            merged,
            json!({"$$ruleParams": {"owner": "u1"}, "tasks": {}})
        );
    }

    #[test]
    fn query_field_wins_over_injected_params() {
        let query = json!({"$$ruleParams": {"a": 1}, "tasks": {}});
        let opts = QueryOpts::with_rule_params(json!({"a": 2}));
        assert_eq!(with_rule_params(&query, Some(&opts)), query);
    }

    #[test]
    fn missing_params_leave_query_unchanged() {
        let query = json!({"tasks": {}});
        assert_eq!(with_rule_params(&query, None), query);
        assert_eq!(with_rule_params(&query, Some(&QueryOpts::default())), query);
    }

    #[test]
    fn keys_compare_structurally() {
        let a = QueryKey::new(json!({"tasks": {"$": {"where": {"done": false}}}}));
        let b = QueryKey::new(json!({"tasks": {"$": {"where": {"done": false}}}}));
        let c = QueryKey::new(json!({"tasks": {"$": {"where": {"done": true}}}}));
        assert_eq!(a, b);
        assert_eq!(a.hash(), b.hash());
        assert_ne!(a, c);
    }

    #[test]
    fn state_for_missing_result_is_loading() {
        let state = QueryState::for_result(None);
        assert!(state.is_loading);
        assert_eq!(state, QueryState::default());
    }

    #[test]
    fn state_for_result_copies_fields() {
        let result = QueryResult {
            data: Some(json!({"tasks": []})),
            page_info: Some(json!({"tasks": {"hasNextPage": false}})),
            error: None,
        };
        let state = QueryState::for_result(Some(&result));
        assert!(!state.is_loading);
        assert_eq!(state.data, result.data);
        assert_eq!(state.page_info, result.page_info);
    }

    #[test]
    fn state_serializes_camel_case() {
        let state = QueryState::for_result(Some(&QueryResult::data(json!([1]))));
        assert_eq!(
            serde_json::to_value(&state).unwrap(),
            json!({"isLoading": false, "data": [1]})
        );
    }
}

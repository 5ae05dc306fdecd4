#![forbid(unsafe_code)]

//! Query subscription adapter.
//!
//! [`create_query`] turns a (possibly reactive, possibly absent) query into a
//! reactive [`QueryState`] cell. The effective key is the core's canonical
//! form of the query with rule parameters merged in.
//!
//! # Lifecycle
//!
//! ```text
//!   key changes to K ──► release old ──► seed from cache(K) ──► subscribe(K)
//!   key becomes None ──► release old ──► reset to loading
//!   key unchanged    ──► nothing
//!   scope disposed   ──► release
//! ```
//!
//! # Invariants
//!
//! 1. At most one live core subscription per adapter.
//! 2. An absent query never reaches the core.
//! 3. A delivery from a released subscription is dropped.

use std::fmt;

use instant_core::{
    CoreHandle, ErrorValue, QueryKey, QueryOpts, QueryState, with_rule_params,
};
use instant_reactive::{Effect, Input, Observable, Scope, sources};
use serde_json::Value;
use tracing::debug;

use crate::keyed::Keyed;

/// Reactive handle returned by [`create_query`].
#[derive(Clone)]
pub struct QueryHandle {
    state: Observable<QueryState>,
    keyed: Keyed<QueryKey>,
}

impl fmt::Debug for QueryHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QueryHandle")
            .field("state", &self.state)
            .field("key", &self.key())
            .finish()
    }
}

impl QueryHandle {
    /// The reactive state cell.
    #[must_use]
    pub fn state(&self) -> &Observable<QueryState> {
        &self.state
    }

    #[must_use]
    pub fn get(&self) -> QueryState {
        self.state.get()
    }

    #[must_use]
    pub fn is_loading(&self) -> bool {
        self.state.with(|s| s.is_loading)
    }

    #[must_use]
    pub fn data(&self) -> Option<Value> {
        self.state.with(|s| s.data.clone())
    }

    #[must_use]
    pub fn error(&self) -> Option<ErrorValue> {
        self.state.with(|s| s.error.clone())
    }

    /// The key currently subscribed, if any.
    #[must_use]
    pub fn key(&self) -> Option<QueryKey> {
        self.keyed.with_key(|key| key.cloned())
    }
}

fn effective_key(
    core: &CoreHandle,
    query: Option<Value>,
    opts: Option<QueryOpts>,
) -> Option<QueryKey> {
    let query = query?;
    let merged = with_rule_params(&query, opts.as_ref());
    Some(QueryKey::new(core.coerce_query(&merged)))
}

/// Subscribe to `query` for the lifetime of `scope`.
///
/// Both arguments may be reactive; the subscription follows them.
pub fn create_query(
    scope: &Scope,
    core: &CoreHandle,
    query: impl Into<Input<Option<Value>>>,
    opts: impl Into<Input<Option<QueryOpts>>>,
) -> QueryHandle {
    let query = query.into();
    let opts = opts.into();

    let state = Observable::new(QueryState::loading());
    let keyed = Keyed::new(scope);
    let handle = QueryHandle {
        state: state.clone(),
        keyed: keyed.clone(),
    };

    let core = CoreHandle::clone(core);
    let scope_id = scope.id();
    let (query_src, opts_src) = (query.clone(), opts.clone());
    let watched = sources(&[query_src.source(), opts_src.source()]);
    Effect::new(scope, &watched, move |_| {
        let next = effective_key(&core, query.get(), opts.get());
        if keyed.holds(next.as_ref()) {
            return;
        }
        if keyed.release() {
            debug!(scope_id, "query unsubscribed");
        }

        let Some(key) = next else {
            state.set(QueryState::loading());
            return;
        };

        let cached = core.get_previous_result(key.canonical());
        state.set(QueryState::for_result(cached.as_ref()));

        debug!(scope_id, key_hash = key.hash(), "query subscribed");
        let cell = state.clone();
        let client = CoreHandle::clone(&core);
        keyed.bind(key, move |key, epoch| {
            client.subscribe_query(
                key.canonical(),
                Box::new(move |result| {
                    if epoch.is_current() {
                        cell.set(QueryState::for_result(Some(&result)));
                    }
                }),
            )
        });
    });

    handle
}

#[cfg(test)]
mod tests {
    use super::*;
    use instant_core::testing::{CoreCall, RecordingCore};
    use instant_core::QueryResult;
    use instant_reactive::Runtime;
    use serde_json::json;

    fn setup() -> (std::rc::Rc<RecordingCore>, CoreHandle, Scope) {
        let core = RecordingCore::new();
        let handle: CoreHandle = core.clone();
        (core, handle, Runtime::new().root())
    }

    fn fixed(scope: &Scope, core: &CoreHandle, query: Value) -> QueryHandle {
        create_query(scope, core, Input::value(Some(query)), Input::value(None::<QueryOpts>))
    }

    #[test]
    fn subscribes_once_for_static_query() {
        let (core, handle, scope) = setup();
        let query = fixed(&scope, &handle, json!({"tasks": {}}));

        assert!(query.is_loading());
        assert_eq!(core.calls(), vec![CoreCall::SubscribeQuery(json!({"tasks": {}}))]);
        assert!(query.key().is_some());
    }

    #[test]
    fn delivery_is_written_verbatim() {
        let (core, handle, scope) = setup();
        let query = fixed(&scope, &handle, json!({"tasks": {}}));
        core.emit_query(&json!({"tasks": {}}), QueryResult::error(ErrorValue::new("denied")));

        let state = query.get();
        assert!(!state.is_loading);
        assert_eq!(state.error, Some(ErrorValue::new("denied")));
        assert!(state.data.is_none());
    }

    #[test]
    fn rule_params_reach_the_core() {
        let (core, handle, scope) = setup();
        let opts = QueryOpts::with_rule_params(json!({"owner": "u1"}));
        let _query = create_query(
            &scope,
            &handle,
            Input::value(Some(json!({"tasks": {}}))),
            Input::value(Some(opts)),
        );
        assert_eq!(
            core.subscribed_queries(),
            vec![json!({"$$ruleParams": {"owner": "u1"}, "tasks": {}})]
        );
    }

    #[test]
    fn equal_key_does_not_resubscribe() {
        let (core, handle, scope) = setup();
        let opts = Observable::new(None::<QueryOpts>);
        let _query = create_query(&scope, &handle, Input::value(Some(json!({"tasks": {}}))), &opts);

        // The effect re-runs, but the derived key is structurally unchanged.
        opts.set(Some(QueryOpts::default()));

        assert_eq!(core.count(CoreCall::is_subscribe), 1);
        assert_eq!(core.count(CoreCall::is_unsubscribe), 0);
    }

    #[test]
    fn cached_result_seeds_before_any_delivery() {
        let (core, handle, scope) = setup();
        core.set_cached_result(json!({"goals": {}}), QueryResult::data(json!({"goals": [1]})));
        let query = fixed(&scope, &handle, json!({"goals": {}}));

        assert!(!query.is_loading());
        assert_eq!(query.data(), Some(json!({"goals": [1]})));
    }

    #[test]
    fn stale_delivery_after_rekey_is_dropped() {
        let (core, handle, scope) = setup();
        let input = Observable::new(Some(json!({"a": {}})));
        let query = create_query(&scope, &handle, &input, Input::value(None::<QueryOpts>));
        input.set(Some(json!({"b": {}})));

        // The core no longer holds the old callback, so nothing is delivered.
        assert_eq!(core.emit_query(&json!({"a": {}}), QueryResult::data(json!(1))), 0);
        assert!(query.is_loading());
    }

    #[test]
    fn clearing_the_query_resets_to_loading() {
        let (core, handle, scope) = setup();
        let input = Observable::new(Some(json!({"tasks": {}})));
        let query = create_query(&scope, &handle, &input, Input::value(None::<QueryOpts>));
        core.emit_query(&json!({"tasks": {}}), QueryResult::data(json!([{"id": "t1"}])));
        assert!(!query.is_loading());

        input.set(None);

        assert_eq!(query.get(), QueryState::loading());
        assert!(query.key().is_none());
        assert_eq!(core.live_query_subscriptions(), 0);
    }
}

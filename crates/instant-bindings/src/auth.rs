#![forbid(unsafe_code)]

//! Auth and connection-status mirrors.
//!
//! Both streams are process-wide and owned by the core. These adapters seed a
//! local cell from the core's cached value and follow the stream until their
//! scope is disposed. There is no re-keying.

use instant_core::{AuthState, ConnectionStatus, CoreHandle};
use instant_reactive::{Observable, Scope};
use tracing::debug;

/// Mirror the core's auth state.
#[must_use]
pub fn create_auth(scope: &Scope, core: &CoreHandle) -> Observable<AuthState> {
    let state = Observable::new(AuthState::seed(core.current_user_cached()));
    let cell = state.clone();
    let unsubscribe = core.subscribe_auth(Box::new(move |snapshot| {
        cell.set(AuthState::from_snapshot(snapshot));
    }));
    let scope_id = scope.id();
    debug!(scope_id, "auth subscribed");
    scope.on_cleanup(move || {
        unsubscribe();
        debug!(scope_id, "auth unsubscribed");
    });
    state
}

/// Mirror the core's connection status.
#[must_use]
pub fn create_connection_status(scope: &Scope, core: &CoreHandle) -> Observable<ConnectionStatus> {
    let status = Observable::new(core.status());
    let cell = status.clone();
    let unsubscribe = core.subscribe_connection_status(Box::new(move |next| {
        cell.set(next);
    }));
    let scope_id = scope.id();
    debug!(scope_id, "connection status subscribed");
    scope.on_cleanup(move || {
        unsubscribe();
        debug!(scope_id, "connection status unsubscribed");
    });
    status
}

#[cfg(test)]
mod tests {
    use super::*;
    use instant_core::testing::RecordingCore;
    use instant_core::{AuthSnapshot, ErrorValue, User};
    use instant_reactive::Runtime;

    #[test]
    fn auth_seeds_from_cache_then_follows() {
        let core = RecordingCore::new();
        core.set_cached_auth(Some(AuthSnapshot {
            user: Some(User::new("u1")),
            error: None,
        }));
        let handle: CoreHandle = core.clone();
        let scope = Runtime::new().root();
        let auth = create_auth(&scope, &handle);
        assert!(!auth.get().is_loading);

        core.emit_auth(AuthSnapshot {
            user: None,
            error: Some(ErrorValue::new("expired")),
        });
        let state = auth.get();
        assert!(!state.is_loading);
        assert!(state.user.is_none());
        assert_eq!(state.error, Some(ErrorValue::new("expired")));
    }

    #[test]
    fn auth_without_cache_is_loading() {
        let core = RecordingCore::new();
        let handle: CoreHandle = core.clone();
        let auth = create_auth(&Runtime::new().root(), &handle);
        assert!(auth.get().is_loading);
    }

    #[test]
    fn status_follows_stream_until_disposed() {
        let core = RecordingCore::new();
        core.set_status(ConnectionStatus::Opened);
        let handle: CoreHandle = core.clone();
        let scope = Runtime::new().root();
        let status = create_connection_status(&scope, &handle);
        assert_eq!(status.get(), ConnectionStatus::Opened);

        core.emit_status(ConnectionStatus::Authenticated);
        assert_eq!(status.get(), ConnectionStatus::Authenticated);

        scope.dispose();
        assert_eq!(core.live_subscriptions(), 0);
        core.emit_status(ConnectionStatus::Closed);
        assert_eq!(status.get(), ConnectionStatus::Authenticated);
    }
}

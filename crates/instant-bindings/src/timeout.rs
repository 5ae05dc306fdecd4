#![forbid(unsafe_code)]

//! Scoped single-slot timer.
//!
//! [`Timeout`] holds at most one pending callback. Arming it again cancels
//! the previous callback first, and disposing the owning scope cancels
//! whatever is pending.
//!
//! Timers fire when the runtime is pumped (`Runtime::run_due_timers`, or
//! `Runtime::advance` on a lab clock). A panicking callback propagates to
//! the pump.

use std::cell::Cell;
use std::fmt;
use std::rc::Rc;

use instant_reactive::{Duration, Runtime, Scope, TimerId};
use tracing::{trace, warn};

struct TimeoutInner {
    runtime: Runtime,
    pending: Cell<Option<TimerId>>,
    disposed: Cell<bool>,
}

impl TimeoutInner {
    fn clear(&self) {
        if let Some(id) = self.pending.take() {
            self.runtime.cancel(id);
            trace!(timer_id = id.raw(), "timeout cleared");
        }
    }
}

/// A cancel-on-dispose, last-write-wins timer.
#[derive(Clone)]
pub struct Timeout {
    inner: Rc<TimeoutInner>,
}

impl fmt::Debug for Timeout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Timeout")
            .field("pending", &self.inner.pending.get())
            .field("disposed", &self.inner.disposed.get())
            .finish()
    }
}

impl Timeout {
    /// A timer owned by `scope`.
    #[must_use]
    pub fn new(scope: &Scope) -> Self {
        let inner = Rc::new(TimeoutInner {
            runtime: scope.runtime().clone(),
            pending: Cell::new(None),
            disposed: Cell::new(scope.is_disposed()),
        });
        let owned = Rc::clone(&inner);
        scope.on_cleanup(move || {
            owned.disposed.set(true);
            owned.clear();
        });
        Self { inner }
    }

    /// Run `callback` after `delay`, replacing any pending callback.
    pub fn set(&self, delay: Duration, callback: impl FnOnce() + 'static) {
        self.inner.clear();
        if self.inner.disposed.get() {
            warn!("timeout armed after its scope was disposed, ignoring");
            return;
        }
        let weak = Rc::downgrade(&self.inner);
        let id = self.inner.runtime.schedule(delay, move || {
            // Only the current timer can fire; earlier ones were cancelled.
            if let Some(inner) = weak.upgrade() {
                inner.pending.set(None);
            }
            callback();
        });
        self.inner.pending.set(Some(id));
    }

    /// Cancel the pending callback, if any.
    pub fn clear(&self) {
        self.inner.clear();
    }

    #[must_use]
    pub fn is_pending(&self) -> bool {
        self.inner.pending.get().is_some()
    }
}

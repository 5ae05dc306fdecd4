#![forbid(unsafe_code)]

//! Single-slot keyed subscription holder.
//!
//! Every adapter that re-subscribes on input changes follows the same
//! discipline: compare the new key with the bound one, and if they differ,
//! tear the old subscription down *before* opening the new one. [`Keyed`]
//! holds the bound key, its unsubscribe handle and an epoch counter.
//!
//! # Invariants
//!
//! 1. At most one subscription is open per `Keyed`.
//! 2. `release` bumps the epoch, so an [`Epoch`] captured by a callback of a
//!    torn-down subscription reports stale even if the core delivers late.
//! 3. Disposing the owner scope releases the slot; nothing binds afterwards.

use std::cell::{Cell, RefCell};
use std::rc::{Rc, Weak};

use instant_core::Unsubscribe;
use instant_reactive::Scope;

struct KeyedInner<K> {
    key: RefCell<Option<K>>,
    unsubscribe: RefCell<Option<Unsubscribe>>,
    epoch: Rc<Cell<u64>>,
    disposed: Cell<bool>,
}

impl<K> KeyedInner<K> {
    fn release(&self) -> bool {
        self.epoch.set(self.epoch.get() + 1);
        let key = self.key.borrow_mut().take();
        let unsubscribe = self.unsubscribe.borrow_mut().take();
        drop(key);
        match unsubscribe {
            Some(unsubscribe) => {
                unsubscribe();
                true
            }
            None => false,
        }
    }
}

/// Token handed to subscription callbacks to detect staleness.
#[derive(Clone)]
pub(crate) struct Epoch {
    expected: u64,
    current: Weak<Cell<u64>>,
}

impl Epoch {
    #[must_use]
    pub(crate) fn is_current(&self) -> bool {
        self.current
            .upgrade()
            .is_some_and(|current| current.get() == self.expected)
    }
}

pub(crate) struct Keyed<K> {
    inner: Rc<KeyedInner<K>>,
}

impl<K> Clone for Keyed<K> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<K: PartialEq + 'static> Keyed<K> {
    /// An empty slot released when `scope` is disposed.
    pub(crate) fn new(scope: &Scope) -> Self {
        let inner = Rc::new(KeyedInner {
            key: RefCell::new(None),
            unsubscribe: RefCell::new(None),
            epoch: Rc::new(Cell::new(0)),
            disposed: Cell::new(false),
        });
        let owned = Rc::clone(&inner);
        scope.on_cleanup(move || {
            owned.disposed.set(true);
            owned.release();
        });
        Self { inner }
    }

    /// Whether `key` equals the bound key (`None` matches an empty slot).
    pub(crate) fn holds(&self, key: Option<&K>) -> bool {
        self.inner.key.borrow().as_ref() == key
    }

    pub(crate) fn with_key<R>(&self, f: impl FnOnce(Option<&K>) -> R) -> R {
        f(self.inner.key.borrow().as_ref())
    }

    pub(crate) fn is_bound(&self) -> bool {
        self.inner.unsubscribe.borrow().is_some()
    }

    pub(crate) fn is_disposed(&self) -> bool {
        self.inner.disposed.get()
    }

    /// Tear down the open subscription, if any. Returns whether one was open.
    pub(crate) fn release(&self) -> bool {
        self.inner.release()
    }

    /// Bind `key` and open its subscription with `open`.
    ///
    /// The slot must be empty; call [`release`](Self::release) first.
    pub(crate) fn bind(&self, key: K, open: impl FnOnce(&K, Epoch) -> Unsubscribe) {
        if self.is_disposed() {
            return;
        }
        debug_assert!(!self.is_bound(), "bind on an occupied slot");
        let epoch = Epoch {
            expected: self.inner.epoch.get(),
            current: Rc::downgrade(&self.inner.epoch),
        };
        let unsubscribe = open(&key, epoch);
        *self.inner.key.borrow_mut() = Some(key);
        *self.inner.unsubscribe.borrow_mut() = Some(unsubscribe);
    }
}

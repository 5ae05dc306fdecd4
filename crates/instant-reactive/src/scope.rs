#![forbid(unsafe_code)]

//! Reactive ownership and cleanup.
//!
//! A [`Scope`] is the "owner" node of the reactive graph. Effects, timers and
//! subscriptions register cleanup callbacks on the scope that owns them;
//! disposing the scope runs those callbacks synchronously. Scopes form a tree:
//! disposing a parent disposes its children first.
//!
//! Scopes also carry typed context values that descendants can look up,
//! which is how a database handle is made available to a whole subtree.
//!
//! # Invariants
//!
//! 1. `dispose()` is idempotent; cleanups run exactly once.
//! 2. Children are disposed before the parent's own cleanups run.
//! 3. Cleanups run in reverse registration order.
//! 4. A cleanup registered on an already disposed scope runs immediately, so
//!    nothing registered late can leak.

use std::any::{Any, TypeId, type_name};
use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::{Rc, Weak};
use std::sync::atomic::{AtomicU64, Ordering};

use ahash::AHashMap;
use tracing::{debug, warn};

use crate::runtime::Runtime;

static NEXT_SCOPE_ID: AtomicU64 = AtomicU64::new(1);

fn next_scope_id() -> u64 {
    NEXT_SCOPE_ID.fetch_add(1, Ordering::Relaxed)
}

type Cleanup = Box<dyn FnOnce()>;

struct ScopeInner {
    id: u64,
    runtime: Runtime,
    parent: Option<Weak<ScopeInner>>,
    children: RefCell<Vec<Scope>>,
    cleanups: RefCell<Vec<Cleanup>>,
    contexts: RefCell<AHashMap<TypeId, Rc<dyn Any>>>,
    disposed: Cell<bool>,
}

/// A node in the reactive ownership tree.
///
/// Cloning yields another handle to the same node.
#[derive(Clone)]
pub struct Scope {
    inner: Rc<ScopeInner>,
}

/// Non-owning handle to a [`Scope`].
#[derive(Clone)]
pub struct WeakScope {
    inner: Weak<ScopeInner>,
}

impl WeakScope {
    /// Upgrade to a strong handle if the scope is still alive.
    #[must_use]
    pub fn upgrade(&self) -> Option<Scope> {
        self.inner.upgrade().map(|inner| Scope { inner })
    }
}

impl fmt::Debug for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Scope")
            .field("id", &self.inner.id)
            .field("children", &self.inner.children.borrow().len())
            .field("cleanups", &self.inner.cleanups.borrow().len())
            .field("disposed", &self.inner.disposed.get())
            .finish()
    }
}

impl Scope {
    pub(crate) fn root(runtime: Runtime) -> Self {
        let scope = Self {
            inner: Rc::new(ScopeInner {
                id: next_scope_id(),
                runtime,
                parent: None,
                children: RefCell::new(Vec::new()),
                cleanups: RefCell::new(Vec::new()),
                contexts: RefCell::new(AHashMap::new()),
                disposed: Cell::new(false),
            }),
        };
        debug!(scope_id = scope.id(), "root scope created");
        scope
    }

    /// Unique id, for logging.
    #[must_use]
    pub fn id(&self) -> u64 {
        self.inner.id
    }

    /// The runtime this scope belongs to.
    #[must_use]
    pub fn runtime(&self) -> &Runtime {
        &self.inner.runtime
    }

    /// Whether `dispose()` has run.
    #[must_use]
    pub fn is_disposed(&self) -> bool {
        self.inner.disposed.get()
    }

    /// Non-owning handle.
    #[must_use]
    pub fn downgrade(&self) -> WeakScope {
        WeakScope {
            inner: Rc::downgrade(&self.inner),
        }
    }

    /// Create a child scope that is disposed together with this one.
    ///
    /// A child of a disposed scope is born disposed.
    #[must_use]
    pub fn child(&self) -> Scope {
        let child = Scope {
            inner: Rc::new(ScopeInner {
                id: next_scope_id(),
                runtime: self.inner.runtime.clone(),
                parent: Some(Rc::downgrade(&self.inner)),
                children: RefCell::new(Vec::new()),
                cleanups: RefCell::new(Vec::new()),
                contexts: RefCell::new(AHashMap::new()),
                disposed: Cell::new(self.is_disposed()),
            }),
        };
        if !self.is_disposed() {
            self.inner.children.borrow_mut().push(child.clone());
        }
        child
    }

    /// Number of live child scopes.
    #[must_use]
    pub fn child_count(&self) -> usize {
        self.inner.children.borrow().len()
    }

    /// Register `cleanup` to run when this scope is disposed.
    pub fn on_cleanup(&self, cleanup: impl FnOnce() + 'static) {
        if self.is_disposed() {
            warn!(
                scope_id = self.id(),
                "cleanup registered on a disposed scope, running it now"
            );
            cleanup();
            return;
        }
        self.inner.cleanups.borrow_mut().push(Box::new(cleanup));
    }

    /// Dispose children, then run this scope's cleanups.
    pub fn dispose(&self) {
        if self.inner.disposed.replace(true) {
            return;
        }

        let children = std::mem::take(&mut *self.inner.children.borrow_mut());
        for child in children.into_iter().rev() {
            child.dispose();
        }

        let cleanups = std::mem::take(&mut *self.inner.cleanups.borrow_mut());
        let count = cleanups.len();
        for cleanup in cleanups.into_iter().rev() {
            cleanup();
        }

        self.inner.contexts.borrow_mut().clear();

        if let Some(parent) = self.inner.parent.as_ref().and_then(Weak::upgrade) {
            let id = self.id();
            parent
                .children
                .borrow_mut()
                .retain(|child| child.inner.id != id);
        }

        debug!(scope_id = self.id(), cleanups = count, "scope disposed");
    }

    // ── Context ──────────────────────────────────────────────────────

    /// Make `value` visible to this scope and all of its descendants.
    ///
    /// Providing the same type twice on one scope replaces the earlier value.
    pub fn provide_context<T: 'static>(&self, value: T) {
        self.inner
            .contexts
            .borrow_mut()
            .insert(TypeId::of::<T>(), Rc::new(value));
    }

    /// Look up the nearest provided value of type `T`.
    #[must_use]
    pub fn use_context<T: Clone + 'static>(&self) -> Option<T> {
        let mut current = Some(Rc::clone(&self.inner));
        while let Some(node) = current {
            let found = node
                .contexts
                .borrow()
                .get(&TypeId::of::<T>())
                .and_then(|value| value.downcast_ref::<T>().cloned());
            if found.is_some() {
                return found;
            }
            current = node.parent.as_ref().and_then(Weak::upgrade);
        }
        debug!(scope_id = self.id(), context = type_name::<T>(), "context not found");
        None
    }
}

#![forbid(unsafe_code)]

//! Memoized derived values.
//!
//! # Design
//!
//! [`Computed<T>`] wraps a compute function and its cached result in shared,
//! reference-counted storage. When any source changes the cache is marked
//! dirty and every dependent watching the computed value is woken. The next
//! [`get()`](Computed::get) recomputes and caches the result.
//!
//! Waking is push-based while recomputation is pull-based: an effect that
//! depends on a `Computed` re-runs, reads it, and only then pays for the
//! recomputation.
//!
//! # Invariants
//!
//! 1. `get()` is never stale once a source mutation has completed.
//! 2. The compute function runs at most once per dirty cycle.
//! 3. `version` increments by exactly 1 per recomputation.
//!
//! # Failure Modes
//!
//! - **Compute function panics**: the last cached value is kept and the dirty
//!   flag stays set, so the next `get()` retries.
//! - **Source dropped**: the watch becomes inert; the computed value keeps its
//!   last result and is never dirtied by that source again.

use std::cell::RefCell;
use std::fmt;
use std::rc::{Rc, Weak};

use super::observable::{Observable, Subscription, Track};

struct ComputedInner<T> {
    compute: Rc<dyn Fn() -> T>,
    cached: Option<T>,
    dirty: bool,
    version: u64,
    dependents: Vec<Weak<dyn Fn()>>,
    /// Guards on the sources. Never read, only kept alive.
    _sources: Vec<Subscription>,
}

/// A lazily evaluated, memoized value derived from reactive sources.
///
/// Cloning a `Computed` creates a new handle to the **same** cache.
pub struct Computed<T> {
    inner: Rc<RefCell<ComputedInner<T>>>,
}

impl<T> Clone for Computed<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<T: fmt::Debug> fmt::Debug for Computed<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.inner.borrow();
        f.debug_struct("Computed")
            .field("cached", &inner.cached)
            .field("dirty", &inner.dirty)
            .field("version", &inner.version)
            .finish()
    }
}

impl<T: Clone + 'static> Computed<T> {
    /// Derive a value from any number of sources.
    ///
    /// `compute` may read whatever it likes, but only changes to `sources`
    /// mark the cache dirty.
    pub fn new(sources: &[&dyn Track], compute: impl Fn() -> T + 'static) -> Self {
        let inner = Rc::new(RefCell::new(ComputedInner {
            compute: Rc::new(compute),
            cached: None,
            dirty: true,
            version: 0,
            dependents: Vec::new(),
            _sources: Vec::new(),
        }));

        let guards = sources
            .iter()
            .map(|source| {
                let weak = Rc::downgrade(&inner);
                source.watch(Rc::new(move || {
                    if let Some(strong) = weak.upgrade() {
                        mark_dirty(&strong);
                    }
                }))
            })
            .collect();
        inner.borrow_mut()._sources = guards;

        Self { inner }
    }

    /// Derive a value from a single observable.
    pub fn map<S: Clone + PartialEq + 'static>(
        source: &Observable<S>,
        map: impl Fn(&S) -> T + 'static,
    ) -> Self {
        let reader = source.clone();
        Self::new(&[source], move || reader.with(|value| map(value)))
    }

    /// Current value, recomputing first if any source changed.
    #[must_use]
    pub fn get(&self) -> T {
        self.refresh();
        self.inner
            .borrow()
            .cached
            .clone()
            .expect("cached is always Some after refresh")
    }

    /// Borrow the current value, recomputing first if needed.
    ///
    /// # Panics
    ///
    /// Panics if `f` reads this same `Computed` re-entrantly through `get()`
    /// while it is dirty.
    pub fn with<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        self.refresh();
        let inner = self.inner.borrow();
        f(inner
            .cached
            .as_ref()
            .expect("cached is always Some after refresh"))
    }

    /// Whether the cached value is stale.
    #[must_use]
    pub fn is_dirty(&self) -> bool {
        let inner = self.inner.borrow();
        inner.dirty || inner.cached.is_none()
    }

    /// Mark the cache stale and wake dependents.
    pub fn invalidate(&self) {
        mark_dirty(&self.inner);
    }

    /// Number of recomputations so far.
    #[must_use]
    pub fn version(&self) -> u64 {
        self.inner.borrow().version
    }

    fn refresh(&self) {
        let compute = {
            let inner = self.inner.borrow();
            if !inner.dirty && inner.cached.is_some() {
                return;
            }
            Rc::clone(&inner.compute)
        };
        // The borrow is released while computing so sources can be read freely.
        let value = compute();
        let mut inner = self.inner.borrow_mut();
        inner.cached = Some(value);
        inner.dirty = false;
        inner.version += 1;
    }
}

impl<T: Clone + 'static> Track for Computed<T> {
    fn watch(&self, wake: Rc<dyn Fn()>) -> Subscription {
        self.inner
            .borrow_mut()
            .dependents
            .push(Rc::downgrade(&wake));
        Subscription::holding(wake)
    }
}

fn mark_dirty<T>(inner: &Rc<RefCell<ComputedInner<T>>>) {
    let dependents: Vec<Rc<dyn Fn()>> = {
        let mut inner = inner.borrow_mut();
        inner.dirty = true;
        inner.dependents.retain(|weak| weak.strong_count() > 0);
        inner.dependents.iter().filter_map(Weak::upgrade).collect()
    };
    for wake in dependents {
        wake();
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

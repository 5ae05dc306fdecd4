#![forbid(unsafe_code)]

//! Effects: side-effecting computations that re-run when their sources change.
//!
//! An [`Effect`] runs once on creation and again after every change to one of
//! its sources. Each run receives a fresh child [`Scope`]; the previous run's
//! scope is disposed *before* the next run starts, so cleanups registered
//! during a run always execute ahead of the re-run that replaces them.
//!
//! # Re-entrancy
//!
//! A run that changes one of its own sources does not recurse. The change is
//! recorded and the effect runs again once the current run returns.
//!
//! # Invariants
//!
//! 1. Runs never overlap.
//! 2. After disposal the effect never runs again and holds no source guards.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;

use tracing::trace;

use crate::observable::{Subscription, Track};
use crate::scope::{Scope, WeakScope};

type RunFn = Box<dyn FnMut(&Scope)>;

struct EffectInner {
    owner: WeakScope,
    run: RefCell<RunFn>,
    run_scope: RefCell<Option<Scope>>,
    sources: RefCell<Vec<Subscription>>,
    running: Cell<bool>,
    pending: Cell<bool>,
    disposed: Cell<bool>,
    runs: Cell<u64>,
}

/// Handle to a running effect.
#[derive(Clone)]
pub struct Effect {
    inner: Rc<EffectInner>,
}

impl fmt::Debug for Effect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Effect")
            .field("runs", &self.inner.runs.get())
            .field("disposed", &self.inner.disposed.get())
            .finish()
    }
}

impl Effect {
    /// Create an effect owned by `scope`, run it once, and re-run it whenever
    /// one of `sources` changes.
    ///
    /// The effect is disposed together with `scope`.
    pub fn new(scope: &Scope, sources: &[&dyn Track], run: impl FnMut(&Scope) + 'static) -> Self {
        let inner = Rc::new(EffectInner {
            owner: scope.downgrade(),
            run: RefCell::new(Box::new(run)),
            run_scope: RefCell::new(None),
            sources: RefCell::new(Vec::new()),
            running: Cell::new(false),
            pending: Cell::new(false),
            disposed: Cell::new(scope.is_disposed()),
            runs: Cell::new(0),
        });

        if inner.disposed.get() {
            return Self { inner };
        }

        let guards = sources
            .iter()
            .map(|source| {
                let weak = Rc::downgrade(&inner);
                source.watch(Rc::new(move || {
                    if let Some(effect) = weak.upgrade() {
                        effect.schedule();
                    }
                }))
            })
            .collect();
        *inner.sources.borrow_mut() = guards;

        let owned = Rc::clone(&inner);
        scope.on_cleanup(move || owned.dispose());

        inner.schedule();
        Self { inner }
    }

    /// How many times the effect has run.
    #[must_use]
    pub fn run_count(&self) -> u64 {
        self.inner.runs.get()
    }

    /// Whether the effect has been disposed.
    #[must_use]
    pub fn is_disposed(&self) -> bool {
        self.inner.disposed.get()
    }

    /// Stop the effect early and dispose its current run scope.
    pub fn dispose(&self) {
        self.inner.dispose();
    }
}

impl EffectInner {
    fn schedule(&self) {
        if self.disposed.get() {
            return;
        }
        if self.running.get() {
            self.pending.set(true);
            return;
        }

        self.running.set(true);
        loop {
            self.pending.set(false);
            self.run_once();
            if !self.pending.get() || self.disposed.get() {
                break;
            }
        }
        self.running.set(false);
    }

    fn run_once(&self) {
        let previous = self.run_scope.borrow_mut().take();
        if let Some(previous) = previous {
            previous.dispose();
        }

        let Some(owner) = self.owner.upgrade() else {
            self.dispose();
            return;
        };
        let scope = owner.child();
        *self.run_scope.borrow_mut() = Some(scope.clone());

        let run_no = self.runs.get() + 1;
        self.runs.set(run_no);
        trace!(scope_id = scope.id(), run = run_no, "effect run");
        (self.run.borrow_mut())(&scope);
    }

    fn dispose(&self) {
        if self.disposed.replace(true) {
            return;
        }
        self.sources.borrow_mut().clear();
        let current = self.run_scope.borrow_mut().take();
        if let Some(current) = current {
            current.dispose();
        }
    }
}

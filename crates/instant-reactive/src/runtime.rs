#![forbid(unsafe_code)]

//! The reactive runtime handle.
//!
//! A [`Runtime`] owns the clock and the timer queue. Every [`Scope`] carries
//! the runtime it was created from, so anything that needs time (timeouts,
//! debouncers) reaches it through the scope it is registered on.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use tracing::trace;
use web_time::{Duration, Instant};

use crate::scope::Scope;
use crate::timer::{Clock, LabClock, TimerId, TimerQueue};

struct RuntimeInner {
    clock: Clock,
    timers: RefCell<TimerQueue>,
}

/// Cheaply cloneable handle to the clock and timer queue.
#[derive(Clone)]
pub struct Runtime {
    inner: Rc<RuntimeInner>,
}

impl fmt::Debug for Runtime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Runtime")
            .field("clock", &self.inner.clock)
            .field("timers", &self.inner.timers.borrow())
            .finish()
    }
}

impl Default for Runtime {
    fn default() -> Self {
        Self::new()
    }
}

impl Runtime {
    /// A runtime on wall-clock time.
    #[must_use]
    pub fn new() -> Self {
        Self::with_clock(Clock::Real)
    }

    /// A runtime on a deterministic [`LabClock`].
    #[must_use]
    pub fn lab(clock: &LabClock) -> Self {
        Self::with_clock(Clock::Lab(clock.clone()))
    }

    fn with_clock(clock: Clock) -> Self {
        Self {
            inner: Rc::new(RuntimeInner {
                clock,
                timers: RefCell::new(TimerQueue::default()),
            }),
        }
    }

    /// Create a new root scope owned by the caller.
    #[must_use]
    pub fn root(&self) -> Scope {
        Scope::root(self.clone())
    }

    /// Current time.
    #[must_use]
    pub fn now(&self) -> Instant {
        self.inner.clock.now()
    }

    /// Whether this runtime runs on lab time.
    #[must_use]
    pub fn is_lab(&self) -> bool {
        matches!(self.inner.clock, Clock::Lab(_))
    }

    // ── Timers ───────────────────────────────────────────────────────

    /// Schedule `callback` to run once, `delay` from now.
    pub fn schedule(&self, delay: Duration, callback: impl FnOnce() + 'static) -> TimerId {
        let deadline = self.now() + delay;
        let id = self
            .inner
            .timers
            .borrow_mut()
            .schedule(deadline, Box::new(callback));
        trace!(timer_id = id.raw(), delay_ms = delay.as_millis() as u64, "timer scheduled");
        id
    }

    /// Cancel a pending timer. Returns `false` if it already fired or was
    /// cancelled.
    pub fn cancel(&self, id: TimerId) -> bool {
        self.inner.timers.borrow_mut().cancel(id)
    }

    /// Whether `id` is still waiting to fire.
    #[must_use]
    pub fn is_pending(&self, id: TimerId) -> bool {
        self.inner.timers.borrow().is_pending(id)
    }

    /// Number of timers waiting to fire.
    #[must_use]
    pub fn pending_timers(&self) -> usize {
        self.inner.timers.borrow().len()
    }

    /// Deadline of the earliest pending timer.
    #[must_use]
    pub fn next_deadline(&self) -> Option<Instant> {
        self.inner.timers.borrow().next_deadline()
    }

    /// Fire every timer whose deadline has passed. Returns how many fired.
    ///
    /// Callback panics propagate to the caller.
    pub fn run_due_timers(&self) -> usize {
        let mut fired = 0;
        loop {
            let due = self.inner.timers.borrow_mut().pop_due(self.now());
            let Some((id, callback)) = due else {
                break;
            };
            trace!(timer_id = id.raw(), "timer fired");
            callback();
            fired += 1;
        }
        fired
    }

    /// Move lab time forward by `delta`, firing timers at their own deadlines
    /// along the way. On a real clock this only drains due timers.
    pub fn advance(&self, delta: Duration) -> usize {
        let Clock::Lab(clock) = &self.inner.clock else {
            return self.run_due_timers();
        };
        let target = clock.now() + delta;
        let mut fired = 0;
        loop {
            let next = self.inner.timers.borrow().next_deadline();
            match next {
                Some(deadline) if deadline <= target => {
                    clock.advance_to(deadline);
                    fired += self.run_due_timers();
                }
                _ => break,
            }
        }
        clock.advance_to(target);
        fired + self.run_due_timers()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;

    #[test]
    fn timers_fire_at_their_deadlines() {
        let clock = LabClock::new();
        let runtime = Runtime::lab(&clock);
        let log = Rc::new(RefCell::new(Vec::new()));

        for ms in [300u64, 100, 200] {
            let log = Rc::clone(&log);
            let clock = clock.clone();
            runtime.schedule(Duration::from_millis(ms), move || {
                log.borrow_mut().push((ms, clock.elapsed().as_millis() as u64));
            });
        }

        assert_eq!(runtime.advance(Duration::from_millis(250)), 2);
        assert_eq!(*log.borrow(), vec![(100, 100), (200, 200)]);
        assert_eq!(runtime.advance(Duration::from_millis(100)), 1);
        assert_eq!(log.borrow().last(), Some(&(300, 300)));
        assert_eq!(clock.elapsed(), Duration::from_millis(350));
    }

    #[test]
    fn cancelled_timer_never_fires() {
        let clock = LabClock::new();
        let runtime = Runtime::lab(&clock);
        let fired = Rc::new(RefCell::new(false));
        let flag = Rc::clone(&fired);
        let id = runtime.schedule(Duration::from_millis(10), move || *flag.borrow_mut() = true);

        assert!(runtime.cancel(id));
        runtime.advance(Duration::from_secs(1));
        assert!(!*fired.borrow());
        assert_eq!(runtime.pending_timers(), 0);
    }

    #[test]
    fn timer_scheduled_from_callback_runs_later() {
        let clock = LabClock::new();
        let runtime = Runtime::lab(&clock);
        let count = Rc::new(RefCell::new(0));
        let inner_count = Rc::clone(&count);
        let rt = runtime.clone();
        runtime.schedule(Duration::from_millis(10), move || {
            *inner_count.borrow_mut() += 1;
            let again = Rc::clone(&inner_count);
            rt.schedule(Duration::from_millis(10), move || *again.borrow_mut() += 1);
        });

        runtime.advance(Duration::from_millis(15));
        assert_eq!(*count.borrow(), 1);
        runtime.advance(Duration::from_millis(5));
        assert_eq!(*count.borrow(), 2);
    }
}

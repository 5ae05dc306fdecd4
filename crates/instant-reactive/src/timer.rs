#![forbid(unsafe_code)]

//! Clocks and the single-threaded timer queue.
//!
//! The runtime never spawns threads. Timers are entries in a deadline-ordered
//! queue that the host drains from its own loop with
//! [`Runtime::run_due_timers`](crate::Runtime::run_due_timers). In tests the
//! queue runs against a [`LabClock`] whose time only moves when told to, so
//! "fires at t=700ms" is an exact, reproducible statement.

use std::cell::Cell;
use std::collections::BTreeMap;
use std::fmt;
use std::rc::Rc;

use ahash::AHashMap;
use web_time::{Duration, Instant};

// ─── Clocks ──────────────────────────────────────────────────────────────────

/// A manually advanced clock for deterministic tests.
///
/// Clones share the same time.
#[derive(Debug, Clone)]
pub struct LabClock {
    epoch: Instant,
    offset_us: Rc<Cell<u64>>,
}

impl LabClock {
    /// Create a clock frozen at `Instant::now()`.
    #[must_use]
    pub fn new() -> Self {
        Self {
            epoch: Instant::now(),
            offset_us: Rc::new(Cell::new(0)),
        }
    }

    /// Move the clock forward by `delta`.
    pub fn advance(&self, delta: Duration) {
        let us = duration_us(delta);
        self.offset_us.set(self.offset_us.get().saturating_add(us));
    }

    /// Current lab time.
    #[must_use]
    pub fn now(&self) -> Instant {
        self.epoch + Duration::from_micros(self.offset_us.get())
    }

    /// Time elapsed since the clock was created.
    #[must_use]
    pub fn elapsed(&self) -> Duration {
        Duration::from_micros(self.offset_us.get())
    }

    /// Jump forward to `instant`. Never moves backwards.
    pub(crate) fn advance_to(&self, instant: Instant) {
        let target = duration_us(instant.saturating_duration_since(self.epoch));
        if target > self.offset_us.get() {
            self.offset_us.set(target);
        }
    }
}

impl Default for LabClock {
    fn default() -> Self {
        Self::new()
    }
}

/// Where the runtime reads the current time from.
#[derive(Debug, Clone)]
pub enum Clock {
    /// Wall-clock time.
    Real,
    /// Deterministic lab time.
    Lab(LabClock),
}

impl Clock {
    /// Current time according to this clock.
    #[must_use]
    pub fn now(&self) -> Instant {
        match self {
            Self::Real => Instant::now(),
            Self::Lab(clock) => clock.now(),
        }
    }
}

fn duration_us(d: Duration) -> u64 {
    d.as_micros().min(u64::MAX as u128) as u64
}

// ─── Timer queue ─────────────────────────────────────────────────────────────

/// Handle to a scheduled timer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TimerId(u64);

impl TimerId {
    /// Raw id, for logging.
    #[must_use]
    pub const fn raw(self) -> u64 {
        self.0
    }
}

type TimerFn = Box<dyn FnOnce()>;

/// Deadline-ordered queue of one-shot callbacks.
///
/// Ties on the same deadline fire in scheduling order.
#[derive(Default)]
pub(crate) struct TimerQueue {
    next_id: u64,
    by_deadline: BTreeMap<(Instant, u64), TimerFn>,
    deadlines: AHashMap<u64, Instant>,
}

impl TimerQueue {
    pub(crate) fn schedule(&mut self, deadline: Instant, callback: TimerFn) -> TimerId {
        self.next_id += 1;
        let id = self.next_id;
        self.by_deadline.insert((deadline, id), callback);
        self.deadlines.insert(id, deadline);
        TimerId(id)
    }

    pub(crate) fn cancel(&mut self, id: TimerId) -> bool {
        match self.deadlines.remove(&id.0) {
            Some(deadline) => self.by_deadline.remove(&(deadline, id.0)).is_some(),
            None => false,
        }
    }

    pub(crate) fn is_pending(&self, id: TimerId) -> bool {
        self.deadlines.contains_key(&id.0)
    }

    pub(crate) fn next_deadline(&self) -> Option<Instant> {
        self.by_deadline.keys().next().map(|(deadline, _)| *deadline)
    }

    /// Remove and return the earliest timer due at `now`, if any.
    pub(crate) fn pop_due(&mut self, now: Instant) -> Option<(TimerId, TimerFn)> {
        let key = *self.by_deadline.keys().next()?;
        if key.0 > now {
            return None;
        }
        let callback = self.by_deadline.remove(&key)?;
        self.deadlines.remove(&key.1);
        Some((TimerId(key.1), callback))
    }

    pub(crate) fn len(&self) -> usize {
        self.by_deadline.len()
    }
}

impl fmt::Debug for TimerQueue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TimerQueue")
            .field("pending", &self.by_deadline.len())
            .field("next_deadline", &self.next_deadline())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lab_clock_advances_only_when_told() {
        let clock = LabClock::new();
        let t0 = clock.now();
        assert_eq!(clock.now(), t0);
        clock.advance(Duration::from_millis(250));
        assert_eq!(clock.now().duration_since(t0), Duration::from_millis(250));
        assert_eq!(clock.elapsed(), Duration::from_millis(250));
    }

    #[test]
    fn advance_to_never_goes_back() {
        let clock = LabClock::new();
        let start = clock.now();
        clock.advance(Duration::from_millis(100));
        clock.advance_to(start + Duration::from_millis(50));
        assert_eq!(clock.elapsed(), Duration::from_millis(100));
    }

    #[test]
    fn queue_pops_in_deadline_order() {
        let clock = LabClock::new();
        let now = clock.now();
        let mut queue = TimerQueue::default();
        let late = queue.schedule(now + Duration::from_millis(20), Box::new(|| {}));
        let early = queue.schedule(now + Duration::from_millis(10), Box::new(|| {}));

        let horizon = now + Duration::from_millis(30);
        assert_eq!(queue.pop_due(horizon).map(|(id, _)| id), Some(early));
        assert_eq!(queue.pop_due(horizon).map(|(id, _)| id), Some(late));
        assert!(queue.pop_due(horizon).is_none());
    }

    #[test]
    fn nothing_due_before_deadline() {
        let clock = LabClock::new();
        let mut queue = TimerQueue::default();
        queue.schedule(clock.now() + Duration::from_millis(5), Box::new(|| {}));
        assert!(queue.pop_due(clock.now()).is_none());
        assert_eq!(queue.len(), 1);
    }

    #[test]
    fn cancel_removes_entry_once() {
        let clock = LabClock::new();
        let mut queue = TimerQueue::default();
        let id = queue.schedule(clock.now(), Box::new(|| {}));
        assert!(queue.is_pending(id));
        assert!(queue.cancel(id));
        assert!(!queue.cancel(id));
        assert!(!queue.is_pending(id));
        assert_eq!(queue.len(), 0);
    }
}

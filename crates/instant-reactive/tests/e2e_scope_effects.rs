//! Property tests for the ownership tree and effect lifecycle.
//!
//! 1. Every effect run's cleanup fires exactly once, before the next run or
//!    on disposal.
//! 2. An effect re-runs once per distinct change of its source.
//! 3. Disposal leaves no live subscribers on the sources.
//! 4. Lab timers fire in deadline order no matter how time is advanced.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use instant_reactive::{Duration, Effect, LabClock, Observable, Runtime};
use proptest::prelude::*;

// ── Helpers ──────────────────────────────────────────────────────────

fn distinct_changes(start: u8, values: &[u8]) -> u64 {
    let mut current = start;
    let mut changes = 0;
    for &value in values {
        if value != current {
            current = value;
            changes += 1;
        }
    }
    changes
}

proptest! {
    #[test]
    fn cleanups_balance_runs(values in proptest::collection::vec(0u8..4, 0..40)) {
        let scope = Runtime::new().root();
        let source = Observable::new(0u8);
        let setups = Rc::new(Cell::new(0u64));
        let cleanups = Rc::new(Cell::new(0u64));
        let (s, c) = (Rc::clone(&setups), Rc::clone(&cleanups));

        let effect = Effect::new(&scope, &[&source], move |run| {
            s.set(s.get() + 1);
            let c = Rc::clone(&c);
            run.on_cleanup(move || c.set(c.get() + 1));
        });

        for &value in &values {
            source.set(value);
            prop_assert_eq!(cleanups.get() + 1, setups.get());
        }

        prop_assert_eq!(effect.run_count(), 1 + distinct_changes(0, &values));

        scope.dispose();
        prop_assert_eq!(cleanups.get(), setups.get());
        prop_assert_eq!(source.subscriber_count(), 0);
    }

    #[test]
    fn lab_timers_fire_in_order(
        delays in proptest::collection::vec(1u64..500, 1..20),
        steps in proptest::collection::vec(1u64..200, 1..20),
    ) {
        let clock = LabClock::new();
        let runtime = Runtime::lab(&clock);
        let fired = Rc::new(RefCell::new(Vec::new()));

        for (index, &delay) in delays.iter().enumerate() {
            let fired = Rc::clone(&fired);
            let clock = clock.clone();
            runtime.schedule(Duration::from_millis(delay), move || {
                fired.borrow_mut().push((delay, index, clock.elapsed()));
            });
        }

        for &step in &steps {
            runtime.advance(Duration::from_millis(step));
        }
        runtime.advance(Duration::from_millis(500));

        let fired = fired.borrow();
        prop_assert_eq!(fired.len(), delays.len());
        for window in fired.windows(2) {
            prop_assert!((window[0].0, window[0].1) <= (window[1].0, window[1].1));
        }
        for (delay, _, at) in fired.iter() {
            prop_assert_eq!(*at, Duration::from_millis(*delay));
        }
        prop_assert_eq!(runtime.pending_timers(), 0);
    }
}

#[test]
fn nested_effect_scopes_are_torn_down_with_owner() {
    let runtime = Runtime::new();
    let root = runtime.root();
    let outer = Observable::new(0);
    let inner = Observable::new(0);
    let inner_runs = Rc::new(Cell::new(0));

    let (inner_src, counter) = (inner.clone(), Rc::clone(&inner_runs));
    let _effect = Effect::new(&root, &[&outer], move |run| {
        let counter = Rc::clone(&counter);
        Effect::new(run, &[&inner_src], move |_| counter.set(counter.get() + 1));
    });

    inner.set(1);
    assert_eq!(inner_runs.get(), 2);

    // Re-running the outer effect replaces the nested one.
    outer.set(1);
    assert_eq!(inner_runs.get(), 3);
    inner.set(2);
    assert_eq!(inner_runs.get(), 4);
    assert_eq!(inner.subscriber_count(), 1);

    root.dispose();
    inner.set(3);
    assert_eq!(inner_runs.get(), 4);
    assert_eq!(inner.subscriber_count(), 0);
}

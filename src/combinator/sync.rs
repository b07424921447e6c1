//! A single-shot join point between independent sequences.
//!
//! `sync(n)` hands back a `{now, later}` pair. The sequence that reaches
//! `now` parks its success continuation; every sequence that reaches a
//! `later` decrements the shared counter and passes through. When the
//! counter hits zero, the parked continuation fires with the input it
//! parked with.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use crate::action::Action;
use crate::value::Value;

/// The two halves of a sync point.
#[derive(Debug, Clone)]
pub struct SyncPoint {
    /// Parks until the counter drains; then continues.
    pub now: Action,
    /// Decrements the counter and passes through.
    pub later: Action,
}

struct SyncState {
    remaining: Cell<usize>,
    parked: RefCell<Option<(Value, Action)>>,
    fired: Cell<bool>,
}

impl SyncState {
    fn try_fire(&self, engine: &crate::engine::Engine) {
        if self.remaining.get() > 0 || self.fired.get() {
            return;
        }
        if let Some((input, continuation)) = self.parked.borrow_mut().take() {
            self.fired.set(true);
            let engine = engine.clone();
            engine.clone().next_tick(move || {
                engine.call(&continuation, input, None, None);
            });
        }
    }
}

/// Creates a single-shot sync point expecting `n` later arrivals.
///
/// # Panics
///
/// Panics if `n` is zero; a zero-count sync point could never park.
#[must_use]
pub fn sync(n: usize) -> SyncPoint {
    assert!(n > 0, "sync requires at least one later arrival");
    let state = Rc::new(SyncState {
        remaining: Cell::new(n),
        parked: RefCell::new(None),
        fired: Cell::new(false),
    });

    let now = {
        let state = Rc::clone(&state);
        Action::native("sync-now", move |engine, input, success, _failure| {
            if state.fired.get() {
                return;
            }
            *state.parked.borrow_mut() = Some((input, success));
            state.try_fire(engine);
        })
    };

    let later = {
        let state = Rc::clone(&state);
        Action::native("sync-later", move |engine, input, success, failure| {
            if state.remaining.get() > 0 {
                state.remaining.set(state.remaining.get() - 1);
            }
            state.try_fire(engine);
            engine.call(&success, input, None, Some(failure));
        })
    };

    SyncPoint { now, later }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::combinator::{chain, delay_for};
    use crate::engine::Engine;
    use crate::test_support::capture;

    #[test]
    fn now_waits_for_all_laters() {
        let engine = Engine::lab();
        let (end, seen) = capture();
        let point = sync(2);

        engine.run(Value::from("joined"), chain([point.now, end]));
        engine.run(Value::Null, chain([delay_for(5), point.later.clone()]));
        engine.run(Value::Null, chain([delay_for(10), point.later]));
        engine.run_until_quiescent();
        assert_eq!(seen.borrow().as_slice(), &[Value::from("joined")]);
    }

    #[test]
    fn now_does_not_fire_early() {
        let engine = Engine::lab();
        let (end, seen) = capture();
        let point = sync(2);
        engine.run(Value::Null, chain([point.now, end]));
        engine.run(Value::Null, point.later);
        engine.run_until_quiescent();
        assert!(seen.borrow().is_empty());
    }
}

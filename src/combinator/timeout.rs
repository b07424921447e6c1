//! Deadline supervision for a single operation.
//!
//! The watchdog races the operation. Cancellation is continuation-level
//! only: a timed-out operation is not preempted, its continuations are
//! simply disconnected, and the timeout handler decides what happens next
//! — including restarting the whole supervised operation, which it
//! receives as its input.

use std::cell::Cell;
use std::rc::Rc;

use crate::action::Action;
use crate::value::Value;

use super::seq::send;

/// Supervises `action` with a watchdog of `millis`.
///
/// If `action` completes (either way) before the watchdog fires, the
/// watchdog is suppressed and the result flows through unchanged. If the
/// watchdog fires first, `on_timeout` runs with the whole timeout action
/// — rebound to the original input — as its input, so it may restart the
/// operation; its continuations are the outer ones, so whatever it
/// produces flows out of the timeout.
#[must_use]
pub fn timeout(millis: u64, action: Action, on_timeout: Action) -> Action {
    Action::native("timeout", move |engine, input, success, failure| {
        let settled = Rc::new(Cell::new(false));

        let guard = |inner: Action| {
            let settled = Rc::clone(&settled);
            Action::native("timeout-settle", move |rt, out, _s, failure| {
                if settled.replace(true) {
                    return;
                }
                rt.call(&inner, out, None, Some(failure));
            })
        };
        let on_ok = guard(success.clone());
        let on_err = guard(failure.clone());

        // Restartable handle: the same supervised operation, re-bound to
        // the input it was originally given.
        let whole = send(
            input.clone(),
            timeout(millis, action.clone(), on_timeout.clone()),
        );

        let engine_at_start = engine.clone();
        let on_timeout = on_timeout.clone();
        let success = success.clone();
        let failure = failure.clone();
        let settled_for_watchdog = Rc::clone(&settled);
        engine.delay_thunk(millis, move || {
            if settled_for_watchdog.replace(true) {
                return;
            }
            tracing::debug!(target: "strand::combinator", millis, "watchdog fired");
            engine_at_start.call(
                &on_timeout,
                Value::Action(whole),
                Some(success),
                Some(failure),
            );
        });

        engine.call(&action, input, Some(on_ok), Some(on_err));
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::combinator::{chain, delay_for, supply};
    use crate::engine::Engine;
    use crate::test_support::capture;

    #[test]
    fn completion_before_the_deadline_flows_through() {
        let engine = Engine::lab();
        let (end, seen) = capture();
        let op = chain([delay_for(5), supply(Value::from("done"))]);
        let handler = supply(Value::from("timed out"));
        engine.run(Value::Null, chain([timeout(50, op, handler), end]));
        engine.run_until_quiescent();
        assert_eq!(seen.borrow().as_slice(), &[Value::from("done")]);
    }

    #[test]
    fn watchdog_first_runs_the_handler() {
        let engine = Engine::lab();
        let (end, seen) = capture();
        let op = chain([delay_for(100), supply(Value::from("late"))]);
        let handler = supply(Value::from("timed out"));
        engine.run(Value::Null, chain([timeout(10, op, handler), end]));
        engine.run_until_quiescent();
        // The late result is disconnected, only the handler output flows.
        assert_eq!(seen.borrow().as_slice(), &[Value::from("timed out")]);
    }
}

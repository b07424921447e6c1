//! Generic data-flow combinators.
//!
//! Small single-purpose stages: transform, drop, accumulate, merge,
//! replace, observe, log, defer. `filter` rejections stop the sequence —
//! a rejected item is neither a success nor a failure.

use std::cell::RefCell;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::rc::Rc;

use crate::action::{Action, Step};
use crate::value::Value;

/// Transforms the input with `f` and threads the result forward.
#[must_use]
pub fn map(f: impl Fn(Value) -> Value + 'static) -> Action {
    Action::pure("map", move |input| Step::Emit(f(input)))
}

/// Drops inputs rejected by `predicate`; accepted inputs flow unchanged.
#[must_use]
pub fn filter(predicate: impl Fn(&Value) -> bool + 'static) -> Action {
    Action::pure("filter", move |input| {
        if predicate(&input) {
            Step::Emit(input)
        } else {
            Step::Stop
        }
    })
}

/// Folds activations into an accumulator, emitting the running value.
///
/// The accumulator persists across activations of the same action
/// instance, so a generator upstream turns this into a running fold.
#[must_use]
pub fn reduce(f: impl Fn(Value, Value) -> Value + 'static, init: Value) -> Action {
    let accumulator = Rc::new(RefCell::new(init));
    Action::pure("reduce", move |input| {
        let current = accumulator.borrow().clone();
        let next = f(current, input);
        *accumulator.borrow_mut() = next.clone();
        Step::Emit(next)
    })
}

/// Shallow-merges the keys of `extra` on top of a record input.
///
/// Keys in `extra` win over keys already present. A non-record input is
/// a raise.
#[must_use]
pub fn add(extra: Value) -> Action {
    Action::pure("add", move |input| match (input, &extra) {
        (Value::Record(mut base), Value::Record(extra)) => {
            for (key, value) in extra {
                base.insert(key.clone(), value.clone());
            }
            Step::Emit(Value::Record(base))
        }
        (other, _) => Step::Raise(Value::Str(format!(
            "add: expected a record input, got {other}"
        ))),
    })
}

/// Replaces the input with `value`.
#[must_use]
pub fn supply(value: Value) -> Action {
    Action::pure("supply", move |_input| Step::Emit(value.clone()))
}

/// Observes the passing value without affecting it.
///
/// Panics inside the observer are swallowed; the sequence continues with
/// the original input either way.
#[must_use]
pub fn probe(observer: impl Fn(&Value) + 'static) -> Action {
    Action::pure("probe", move |input| {
        if catch_unwind(AssertUnwindSafe(|| observer(&input))).is_err() {
            tracing::debug!(target: "strand::combinator", "probe observer panicked");
        }
        Step::Emit(input)
    })
}

/// Logs the passing value under `label` and threads it forward.
#[must_use]
pub fn emit(label: impl Into<String>) -> Action {
    let label = label.into();
    Action::pure("emit", move |input| {
        tracing::info!(target: "strand::flow", label = %label, value = %input.summary());
        Step::Emit(input)
    })
}

/// Forwards the input unchanged after `millis`.
#[must_use]
pub fn delay_for(millis: u64) -> Action {
    Action::native("delay", move |engine, input, success, failure| {
        let engine_at_start = engine.clone();
        engine.delay_thunk(millis, move || {
            engine_at_start.call(&success, input, None, Some(failure));
        });
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::combinator::{chain, spray};
    use crate::engine::Engine;
    use crate::test_support::capture;

    #[test]
    fn filter_drops_without_failing() {
        let engine = Engine::lab();
        let (end, seen) = capture();
        engine.run(
            Value::Null,
            chain([
                spray(Some((1..=6).map(Value::Int).collect())),
                filter(|v| v.as_int().is_some_and(|n| n % 2 == 0)),
                end,
            ]),
        );
        engine.run_until_quiescent();
        assert_eq!(
            seen.borrow().as_slice(),
            &[Value::Int(2), Value::Int(4), Value::Int(6)]
        );
    }

    #[test]
    fn reduce_carries_the_accumulator_across_activations() {
        let engine = Engine::lab();
        let (end, seen) = capture();
        engine.run(
            Value::Null,
            chain([
                spray(Some((1..=4).map(Value::Int).collect())),
                reduce(
                    |acc, v| Value::Int(acc.as_int().unwrap_or(0) + v.as_int().unwrap_or(0)),
                    Value::Int(0),
                ),
                end,
            ]),
        );
        engine.run_until_quiescent();
        assert_eq!(
            seen.borrow().as_slice(),
            &[Value::Int(1), Value::Int(3), Value::Int(6), Value::Int(10)]
        );
    }

    #[test]
    fn add_merges_on_top_of_the_input() {
        let engine = Engine::lab();
        let (end, seen) = capture();
        engine.run(
            Value::record([("kept", Value::Int(1)), ("replaced", Value::Int(2))]),
            chain([add(Value::record([("replaced", Value::Int(9))])), end]),
        );
        engine.run_until_quiescent();
        assert_eq!(
            seen.borrow().as_slice(),
            &[Value::record([
                ("kept", Value::Int(1)),
                ("replaced", Value::Int(9)),
            ])]
        );
    }

    #[test]
    fn probe_swallows_observer_panics() {
        let engine = Engine::lab();
        let (end, seen) = capture();
        engine.run(
            Value::Int(5),
            chain([probe(|_| panic!("observer bug")), end]),
        );
        engine.run_until_quiescent();
        assert_eq!(seen.borrow().as_slice(), &[Value::Int(5)]);
    }
}

//! The sequencing core: sources, sinks, and ordered composition.
//!
//! `seq` composes with the right-fold convention: the success continuation
//! handed to the first action is materialized lazily and wired to run the
//! second, while the failure continuation threads through dynamically.
//! This keeps the nearest failure handler the dynamically enclosing one —
//! the branching alternative can lose the outer failure continuation.

use crate::action::Action;
use crate::condition::Condition;
use crate::engine::Engine;
use crate::value::Value;

/// Invokes the success continuation with the input, unchanged.
#[must_use]
pub fn pass() -> Action {
    Action::native("pass", |engine, input, success, failure| {
        engine.call(&success, input, None, Some(failure));
    })
}

/// Invokes the failure continuation with the input.
///
/// A bare value on the failure channel is wrapped into a condition whose
/// payload and captured input are both the inbound value; a condition
/// input is forwarded as-is.
#[must_use]
pub fn fail() -> Action {
    Action::native("fail", |engine, input, success, failure| {
        let carried = match &input {
            Value::Condition(_) => input.clone(),
            other => Value::Condition(Condition::raised(
                engine.clone(),
                other.clone(),
                input.clone(),
                success,
                failure.clone(),
            )),
        };
        engine.call(&failure, carried, None, None);
    })
}

/// Invokes `action` with the fixed input `x`, ignoring the inbound input.
#[must_use]
pub fn send(x: Value, action: Action) -> Action {
    Action::native("send", move |engine, _input, success, failure| {
        engine.call(&action, x.clone(), Some(success), Some(failure));
    })
}

/// An action that unconditionally dispatches on the given engine.
#[must_use]
pub fn bind(engine: Engine, action: Action) -> Action {
    Action::native("bind", move |_rt, input, success, failure| {
        engine.call(&action, input, Some(success), Some(failure));
    })
}

/// Runs `a`, then `b` on `a`'s output.
///
/// The continuation running `b` is materialized lazily at each
/// invocation, so long chains do not nest eagerly.
#[must_use]
pub fn seq(a: Action, b: Action) -> Action {
    Action::native("seq", move |engine, input, success, failure| {
        let next = {
            let b = b.clone();
            let success = success.clone();
            Action::native(b.name().to_owned(), move |rt, out, _success, failure| {
                rt.call(&b, out, Some(success.clone()), Some(failure));
            })
        };
        engine.call(&a, input, Some(next), Some(failure));
    })
}

/// Folds a list of actions into one ordered sequence.
///
/// An empty list is `pass`; a single action is that action itself.
#[must_use]
pub fn chain(actions: impl IntoIterator<Item = Action>) -> Action {
    let mut actions: Vec<Action> = actions.into_iter().collect();
    let Some(mut composite) = actions.pop() else {
        return pass();
    };
    while let Some(action) = actions.pop() {
        composite = seq(action, composite);
    }
    composite
}

/// Invokes `action` with fixed continuations, ignoring the outer ones.
#[must_use]
pub fn branch(action: Action, on_success: Action, on_failure: Action) -> Action {
    Action::native("branch", move |engine, input, _success, _failure| {
        engine.call(
            &action,
            input,
            Some(on_success.clone()),
            Some(on_failure.clone()),
        );
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::combinator::{map, supply};
    use crate::test_support::capture;

    #[test]
    fn chain_runs_in_source_order() {
        let engine = Engine::lab();
        let (probe, seen) = capture();
        let plus = |n: i64| map(move |v: Value| Value::Int(v.as_int().unwrap_or(0) + n));
        engine.run(Value::Int(0), chain([plus(1), plus(2), plus(3), probe]));
        engine.run_until_quiescent();
        assert_eq!(seen.borrow().as_slice(), &[Value::Int(6)]);
    }

    #[test]
    fn empty_chain_is_pass() {
        let engine = Engine::lab();
        let (probe, seen) = capture();
        engine.run(Value::Int(4), seq(chain([]), probe));
        engine.run_until_quiescent();
        assert_eq!(seen.borrow().as_slice(), &[Value::Int(4)]);
    }

    #[test]
    fn sequence_identity_around_pass() {
        let engine = Engine::lab();
        let (probe_a, seen_a) = capture();
        let (probe_b, seen_b) = capture();
        let stage = map(|v: Value| Value::Int(v.as_int().unwrap_or(0) * 10));

        engine.run(Value::Int(3), chain([pass(), stage.clone(), pass(), probe_a]));
        engine.run(Value::Int(3), chain([stage, probe_b]));
        engine.run_until_quiescent();
        assert_eq!(seen_a.borrow().as_slice(), seen_b.borrow().as_slice());
    }

    #[test]
    fn send_replaces_the_inbound_input() {
        let engine = Engine::lab();
        let (probe, seen) = capture();
        engine.run(
            Value::from("inbound"),
            chain([send(Value::Int(12), pass()), probe]),
        );
        engine.run_until_quiescent();
        assert_eq!(seen.borrow().as_slice(), &[Value::Int(12)]);
    }

    #[test]
    fn branch_pins_its_continuations() {
        let engine = Engine::lab();
        let (on_ok, seen_ok) = capture();
        let (outer, seen_outer) = capture();
        engine.run(
            Value::Int(1),
            chain([branch(supply(Value::from("fixed")), on_ok, fail()), outer]),
        );
        engine.run_until_quiescent();
        assert_eq!(seen_ok.borrow().as_slice(), &[Value::from("fixed")]);
        assert!(seen_outer.borrow().is_empty());
    }

    #[test]
    fn bind_dispatches_on_the_bound_engine() {
        let outer = Engine::lab();
        let bound = outer.child();
        let (probe, seen) = capture();
        outer.run(Value::Int(2), chain([bind(bound, pass()), probe]));
        outer.run_until_quiescent();
        assert_eq!(seen.borrow().as_slice(), &[Value::Int(2)]);
    }
}

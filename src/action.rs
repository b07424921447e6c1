//! The action representation and its adapters.
//!
//! An [`Action`] is the one internal shape every computation is normalized
//! to: a callable invoked as `action(engine, input, success, failure)`.
//! It is effectful, not a value — it returns nothing and must eventually
//! invoke exactly one of its continuations, unless it deliberately stops
//! (generator end, rejected filter item, dropped branch).
//!
//! `success` and `failure` are themselves actions. Composition follows the
//! right-fold convention: success continuations are wired when combinators
//! are built, while the failure continuation threads dynamically through
//! every invocation, so the nearest installed handler is always the
//! dynamically enclosing one.
//!
//! The source model dispatched on user-callable arity at runtime; here the
//! shapes are explicit constructors ([`Action::pure`], [`Action::cb2`],
//! [`Action::native`]) and a misshapen action graph is a compile error
//! rather than a runtime one. The input-plus-continuations form collapses
//! into [`Action::native`], because continuations always dispatch through
//! the engine.

use std::fmt;
use std::rc::Rc;

use crate::engine::Engine;
use crate::value::Value;

/// What a pure (1-argument) action does with its input.
#[derive(Clone)]
pub enum Step {
    /// Thread the value to the success continuation.
    Emit(Value),
    /// Stop the sequence: no continuation is invoked.
    Stop,
    /// Re-dispatch another action at the current position, with the same
    /// input and continuations (dynamic dispatch on input).
    Splice(Action),
    /// Route a payload to the failure continuation as a fresh condition.
    Raise(Value),
}

type NativeFn = dyn Fn(&Engine, Value, Action, Action);

/// A composable unit of effectful computation.
///
/// Cheaply clonable; clones share the same underlying callable. The name
/// is diagnostic only — it shows up in trace output and in `drain`'s
/// report of uncaught failures.
#[derive(Clone)]
pub struct Action {
    name: Rc<str>,
    run: Rc<NativeFn>,
}

impl Action {
    /// Creates an action from the full four-argument form.
    pub fn native(
        name: impl Into<Rc<str>>,
        run: impl Fn(&Engine, Value, Action, Action) + 'static,
    ) -> Self {
        Self {
            name: name.into(),
            run: Rc::new(run),
        }
    }

    /// Creates an action from a pure function over the input.
    ///
    /// The returned [`Step`] decides the disposition: emit forward, stop,
    /// splice another action in, or raise. Panics inside `f` are caught by
    /// the engine and routed to the failure continuation.
    pub fn pure(name: impl Into<Rc<str>>, f: impl Fn(Value) -> Step + 'static) -> Self {
        Self::native(name, move |engine, input, success, failure| {
            match f(input.clone()) {
                Step::Emit(out) => engine.call(&success, out, None, Some(failure)),
                Step::Stop => {}
                Step::Splice(action) => {
                    engine.call(&action, input, Some(success), Some(failure));
                }
                Step::Raise(error) => engine.raise_to(&failure, error, input, success),
            }
        })
    }

    /// Creates an action from a callable that only wants its continuations.
    ///
    /// The input is discarded; the callable succeeds or fails explicitly by
    /// dispatching one of the two actions it is given.
    pub fn cb2(
        name: impl Into<Rc<str>>,
        f: impl Fn(&Engine, Action, Action) + 'static,
    ) -> Self {
        Self::native(name, move |engine, _input, success, failure| {
            f(engine, success, failure);
        })
    }

    /// The diagnostic name of this action.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns true if both handles refer to the same underlying callable.
    #[must_use]
    pub fn same_instance(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.run, &other.run)
    }

    /// Invokes the underlying callable directly.
    ///
    /// Callers almost always want [`Engine::call`] instead, which enforces
    /// the trampoline bound and the panic guard.
    pub(crate) fn invoke(&self, engine: &Engine, input: Value, success: Action, failure: Action) {
        (self.run)(engine, input, success, failure);
    }
}

impl fmt::Debug for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Action({})", self.name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::combinator::{chain, pass, supply};
    use crate::test_support::capture;

    #[test]
    fn pure_emit_threads_forward() {
        let engine = Engine::lab();
        let (probe, seen) = capture();
        let double = Action::pure("double", |v| {
            Step::Emit(Value::Int(v.as_int().unwrap_or(0) * 2))
        });
        engine.run(Value::Int(21), chain([double, probe]));
        engine.run_until_quiescent();
        assert_eq!(seen.borrow().as_slice(), &[Value::Int(42)]);
    }

    #[test]
    fn pure_stop_invokes_no_continuation() {
        let engine = Engine::lab();
        let (probe, seen) = capture();
        let stop = Action::pure("stop", |_| Step::Stop);
        engine.run(Value::Int(1), chain([stop, probe]));
        engine.run_until_quiescent();
        assert!(seen.borrow().is_empty());
    }

    #[test]
    fn pure_splice_redispatches_with_same_input() {
        let engine = Engine::lab();
        let (probe, seen) = capture();
        let splice = Action::pure("dispatch", |_| Step::Splice(supply(Value::from("spliced"))));
        engine.run(Value::Null, chain([splice, probe]));
        engine.run_until_quiescent();
        assert_eq!(seen.borrow().as_slice(), &[Value::from("spliced")]);
    }

    #[test]
    fn cb2_discards_input() {
        let engine = Engine::lab();
        let (probe, seen) = capture();
        let fixed = Action::cb2("fixed", |engine, success, failure| {
            engine.call(&success, Value::Int(7), None, Some(failure));
        });
        engine.run(Value::from("ignored"), chain([fixed, probe]));
        engine.run_until_quiescent();
        assert_eq!(seen.borrow().as_slice(), &[Value::Int(7)]);
    }

    #[test]
    fn names_survive_cloning() {
        let action = pass();
        let clone = action.clone();
        assert_eq!(action.name(), clone.name());
        assert!(action.same_instance(&clone));
    }
}

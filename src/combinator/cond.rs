//! Pattern dispatch.
//!
//! `cond` tries its branches in order against the input and runs the
//! first whose pattern matches. Patterns are recursive: a predicate, a
//! record of sub-patterns (declared keys must be present and match,
//! extra candidate keys are ignored), or a literal compared for
//! equality.

use std::collections::BTreeMap;
use std::rc::Rc;

use crate::action::Action;
use crate::value::Value;

use super::recover::synthesize_failure;

/// A recursive match criterion for [`cond`].
#[derive(Clone)]
pub enum Pattern {
    /// An arbitrary predicate over the candidate.
    Pred(Rc<dyn Fn(&Value) -> bool>),
    /// Every declared key must exist on a record candidate and its
    /// sub-pattern must match; extra candidate keys are ignored.
    Record(BTreeMap<String, Pattern>),
    /// Strict equality with a literal.
    Eq(Value),
}

impl Pattern {
    /// Builds a predicate pattern from a closure.
    pub fn when(predicate: impl Fn(&Value) -> bool + 'static) -> Self {
        Self::Pred(Rc::new(predicate))
    }

    /// Builds a record pattern from key/sub-pattern pairs.
    pub fn record<K: Into<String>>(entries: impl IntoIterator<Item = (K, Pattern)>) -> Self {
        Self::Record(entries.into_iter().map(|(k, p)| (k.into(), p)).collect())
    }

    /// Tests this pattern against a candidate value.
    #[must_use]
    pub fn matches(&self, candidate: &Value) -> bool {
        match self {
            Self::Pred(predicate) => predicate(candidate),
            Self::Record(fields) => match candidate.as_record() {
                Some(record) => fields.iter().all(|(key, sub)| {
                    record.get(key).is_some_and(|value| sub.matches(value))
                }),
                None => false,
            },
            Self::Eq(literal) => literal == candidate,
        }
    }
}

impl std::fmt::Debug for Pattern {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Pred(_) => f.write_str("Pred(..)"),
            Self::Record(fields) => f.debug_tuple("Record").field(fields).finish(),
            Self::Eq(literal) => f.debug_tuple("Eq").field(literal).finish(),
        }
    }
}

impl From<Value> for Pattern {
    fn from(literal: Value) -> Self {
        Self::Eq(literal)
    }
}

/// Dispatches the input to the first branch whose pattern matches.
///
/// With no match, the default runs; with no default either, a
/// `cond failed` condition is raised.
#[must_use]
pub fn cond(branches: Vec<(Pattern, Action)>, default: Option<Action>) -> Action {
    Action::native("cond", move |engine, input, success, failure| {
        for (pattern, action) in &branches {
            if pattern.matches(&input) {
                engine.call(action, input, Some(success), Some(failure));
                return;
            }
        }
        match &default {
            Some(action) => engine.call(action, input, Some(success), Some(failure)),
            None => synthesize_failure(engine, &failure, "cond failed", input, success),
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::combinator::{chain, supply};
    use crate::engine::Engine;
    use crate::test_support::capture;

    #[test]
    fn first_matching_branch_wins() {
        let engine = Engine::lab();
        let (end, seen) = capture();
        let dispatch = cond(
            vec![
                (
                    Pattern::when(|v| v.as_int().is_some_and(|n| n < 0)),
                    supply(Value::from("negative")),
                ),
                (
                    Pattern::when(|v| v.as_int().is_some()),
                    supply(Value::from("number")),
                ),
            ],
            Some(supply(Value::from("other"))),
        );
        engine.run(Value::Int(-4), chain([dispatch, end]));
        engine.run_until_quiescent();
        assert_eq!(seen.borrow().as_slice(), &[Value::from("negative")]);
    }

    #[test]
    fn record_patterns_ignore_extra_keys() {
        let matching = Pattern::record([
            ("kind", Pattern::Eq(Value::from("user"))),
            ("age", Pattern::when(|v| v.as_int().is_some_and(|n| n >= 18))),
        ]);
        let candidate = Value::record([
            ("kind", Value::from("user")),
            ("age", Value::Int(30)),
            ("extra", Value::from("ignored")),
        ]);
        assert!(matching.matches(&candidate));
        assert!(!matching.matches(&Value::record([("kind", Value::from("user"))])));
        assert!(!matching.matches(&Value::Int(3)));
    }

    #[test]
    fn nested_record_patterns_recurse() {
        let pattern = Pattern::record([(
            "session",
            Pattern::record([("active", Pattern::Eq(Value::Bool(true)))]),
        )]);
        let candidate = Value::record([(
            "session",
            Value::record([("active", Value::Bool(true)), ("id", Value::Int(9))]),
        )]);
        assert!(pattern.matches(&candidate));
    }

    #[test]
    fn no_match_without_default_raises() {
        let engine = Engine::lab();
        let seen = Rc::new(std::cell::RefCell::new(Vec::new()));
        let sink = {
            let seen = Rc::clone(&seen);
            Action::native("sink", move |_rt, input, _s, _f| {
                seen.borrow_mut().push(input);
            })
        };
        let dispatch = cond(vec![(Pattern::Eq(Value::Int(1)), supply(Value::Null))], None);
        engine.run(
            Value::Int(2),
            Action::native("root", move |rt, input, _s, _f| {
                rt.call(&dispatch, input, None, Some(sink.clone()));
            }),
        );
        engine.run_until_quiescent();
        let seen = seen.borrow();
        let condition = seen[0].as_condition().expect("condition");
        assert_eq!(condition.error(), &Value::from("cond failed"));
    }
}

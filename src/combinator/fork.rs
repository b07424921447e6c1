//! Parallel dispatch: fork, tee, any, alt.
//!
//! "Parallel" here means interleaved across scheduler turns — each branch
//! is launched on a fresh tick, and apparent concurrency comes from the
//! branches suspending independently. There is no guaranteed FIFO between
//! independent branches; `fork` restores submission order positionally
//! when it assembles its result list.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use crate::action::Action;
use crate::value::Value;

use super::recover::synthesize_failure;

struct ForkState {
    results: RefCell<Vec<Value>>,
    remaining: Cell<usize>,
    any_ok: Cell<bool>,
    first_failure: RefCell<Option<Value>>,
}

/// Launches all actions simultaneously and joins their results.
///
/// Each branch gets a clone of the input on a fresh tick. Successes and
/// failure conditions are both collected; when every branch has reported,
/// the result list (in submission order, regardless of completion order)
/// is delivered to success — unless *every* branch failed, in which case
/// one representative condition is delivered to failure. `fork([])`
/// succeeds with an empty list.
#[must_use]
pub fn fork(actions: impl IntoIterator<Item = Action>) -> Action {
    let actions: Rc<Vec<Action>> = Rc::new(actions.into_iter().collect());
    Action::native("fork", move |engine, input, success, failure| {
        if actions.is_empty() {
            engine.call(&success, Value::List(Vec::new()), None, Some(failure));
            return;
        }

        let state = Rc::new(ForkState {
            results: RefCell::new(vec![Value::Null; actions.len()]),
            remaining: Cell::new(actions.len()),
            any_ok: Cell::new(false),
            first_failure: RefCell::new(None),
        });

        for (index, action) in actions.iter().enumerate() {
            let action = action.clone();
            let input = input.clone();
            let engine_at_launch = engine.clone();
            let state = Rc::clone(&state);
            let success = success.clone();
            let failure = failure.clone();

            engine.next_tick(move || {
                let settle = {
                    let state = Rc::clone(&state);
                    let success = success.clone();
                    let failure = failure.clone();
                    move |rt: &crate::engine::Engine, result: Value, ok: bool| {
                        state.results.borrow_mut()[index] = result.clone();
                        if ok {
                            state.any_ok.set(true);
                        } else if state.first_failure.borrow().is_none() {
                            *state.first_failure.borrow_mut() = Some(result);
                        }
                        state.remaining.set(state.remaining.get() - 1);
                        if state.remaining.get() > 0 {
                            return;
                        }
                        if state.any_ok.get() {
                            let joined = Value::List(state.results.borrow().clone());
                            rt.call(&success, joined, None, Some(failure.clone()));
                        } else {
                            let representative = state
                                .first_failure
                                .borrow()
                                .clone()
                                .unwrap_or(Value::Null);
                            rt.call(&failure, representative, None, None);
                        }
                    }
                };

                let on_ok = {
                    let settle = settle.clone();
                    Action::native("fork-join", move |rt, out, _s, _f| {
                        settle(rt, out, true);
                    })
                };
                let on_err = Action::native("fork-join", move |rt, carried, _s, _f| {
                    settle(rt, carried, false);
                });
                engine_at_launch.call(&action, input, Some(on_ok), Some(on_err));
            });
        }
    })
}

/// Dispatches `action` on the next tick and forwards the input onward
/// synchronously.
///
/// The tee'd action runs with drained continuations; its failures are
/// isolated from the main sequence and reported at DEBUG only.
#[must_use]
pub fn tee(action: Action) -> Action {
    Action::native("tee", move |engine, input, success, failure| {
        let side = action.clone();
        let side_input = input.clone();
        let engine_at_launch = engine.clone();
        engine.next_tick(move || {
            let isolated = Action::native("tee-isolated", |_rt, carried, _s, _f| {
                tracing::debug!(
                    target: "strand::combinator",
                    carried = %carried.summary(),
                    "failure isolated in tee branch"
                );
            });
            engine_at_launch.call(&side, side_input, None, Some(isolated));
        });
        engine.call(&success, input, None, Some(failure));
    })
}

/// Launches all actions; the first success wins.
///
/// Remaining results are dropped once a winner is chosen. If every branch
/// fails (or the list is empty), a failure is raised.
#[must_use]
pub fn any(actions: impl IntoIterator<Item = Action>) -> Action {
    let actions: Rc<Vec<Action>> = Rc::new(actions.into_iter().collect());
    Action::native("any", move |engine, input, success, failure| {
        if actions.is_empty() {
            synthesize_failure(engine, &failure, "any: nothing to run", input, success);
            return;
        }

        let done = Rc::new(Cell::new(false));
        let failed = Rc::new(Cell::new(0_usize));
        let total = actions.len();

        for action in actions.iter() {
            let action = action.clone();
            let input = input.clone();
            let engine_at_launch = engine.clone();
            let done = Rc::clone(&done);
            let failed = Rc::clone(&failed);
            let success = success.clone();
            let failure = failure.clone();

            engine.next_tick(move || {
                let on_ok = {
                    let done = Rc::clone(&done);
                    let success = success.clone();
                    let failure = failure.clone();
                    Action::native("any-winner", move |rt, out, _s, _f| {
                        if done.replace(true) {
                            return;
                        }
                        rt.call(&success, out, None, Some(failure.clone()));
                    })
                };
                let on_err = {
                    let done = Rc::clone(&done);
                    let success = success.clone();
                    let failure = failure.clone();
                    Action::native("any-loser", move |rt, carried, _s, _f| {
                        failed.set(failed.get() + 1);
                        if done.get() || failed.get() < total {
                            return;
                        }
                        done.set(true);
                        synthesize_failure(
                            rt,
                            &failure,
                            "any: every branch failed",
                            carried,
                            success.clone(),
                        );
                    })
                };
                engine_at_launch.call(&action, input, Some(on_ok), Some(on_err));
            });
        }
    })
}

/// Sequential fallback: tries each action with the same input, proceeding
/// with the first success; exhaustion raises.
#[must_use]
pub fn alt(actions: impl IntoIterator<Item = Action>) -> Action {
    let actions: Rc<Vec<Action>> = Rc::new(actions.into_iter().collect());
    Action::native("alt", move |engine, input, success, failure| {
        try_from(engine, Rc::clone(&actions), 0, input, success, failure);
    })
}

fn try_from(
    engine: &crate::engine::Engine,
    actions: Rc<Vec<Action>>,
    index: usize,
    input: Value,
    success: Action,
    failure: Action,
) {
    let Some(action) = actions.get(index).cloned() else {
        synthesize_failure(
            engine,
            &failure,
            "alt: every alternative failed",
            input,
            success,
        );
        return;
    };
    let on_err = {
        let actions = Rc::clone(&actions);
        let input = input.clone();
        let success = success.clone();
        let failure = failure.clone();
        Action::native("alt-next", move |rt, _carried, _s, _f| {
            try_from(
                rt,
                Rc::clone(&actions),
                index + 1,
                input.clone(),
                success.clone(),
                failure.clone(),
            );
        })
    };
    engine.call(&action, input, Some(success), Some(on_err));
}

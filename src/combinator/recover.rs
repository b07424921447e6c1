//! The error model: raise, catch, finally, attempt, forgive.
//!
//! A raise reifies the failure as a [`Condition`] capturing the input and
//! both continuations at the raise site, then delivers it on the failure
//! channel. The nearest dynamically enclosing `catch` sees it first and
//! runs its handler with the condition as input. The handler has four
//! exits:
//!
//! - succeed with a value: control resumes forward from the raise site's
//!   successor ("swallowed, resume forward");
//! - call `resume(v)` on the condition: the same thing, explicitly;
//! - fail (or call `rollback`): the condition reaches the next outer
//!   handler unchanged, apart from the restart rebind;
//! - call `restart(v)`: re-enter the whole protected region from the top.
//!
//! Pause conditions are backpressure, not errors: `catch` propagates them
//! outward without consulting the handler.

use crate::action::Action;
use crate::condition::Condition;
use crate::value::Value;

/// Raises `error` as a fresh condition on the failure channel.
///
/// The condition captures the inbound input and both continuations, so a
/// downstream handler can resume the successor of this raise site.
#[must_use]
pub fn raise(error: Value) -> Action {
    Action::native("raise", move |engine, input, success, failure| {
        engine.raise_to(&failure, error.clone(), input, success);
    })
}

/// Protects the rest of the sequence with a failure handler.
///
/// The handler runs with the condition as its input, the raise site's
/// successor as its success continuation, and the outer failure as its
/// failure continuation. Before the handler runs, the condition's
/// rollback target is rebound to the outer failure and a restart action
/// re-entering the whole protected region is attached.
///
/// If the protected region never raises, `catch` is a no-op.
#[must_use]
pub fn catch(handler: Action) -> Action {
    Action::native("catch", move |engine, input, success, failure| {
        let dispatcher = {
            let handler = handler.clone();
            let success = success.clone();
            let failure = failure.clone();
            Action::native("catch-dispatch", move |rt, carried, _success, _failure| {
                let Some(condition) = carried.as_condition().cloned() else {
                    rt.call(&failure, carried, None, None);
                    return;
                };
                if condition.is_pause() {
                    rt.call(&failure, carried, None, None);
                    return;
                }

                let restart = {
                    let handler = handler.clone();
                    let success = success.clone();
                    let failure = failure.clone();
                    Action::native("catch-restart", move |rt, value, _s, _f| {
                        let again = catch(handler.clone());
                        rt.call(&again, value, Some(success.clone()), Some(failure.clone()));
                    })
                };
                condition.adopt_restart(restart);
                condition.rebind_failure(failure.clone());

                let resume_site = condition.success();
                rt.call(&handler, carried, Some(resume_site), Some(failure.clone()));
            })
        };
        engine.call(&success, input, None, Some(dispatcher));
    })
}

/// Runs `action`; on both exits runs `cleanup` with the *original* input.
///
/// `cleanup`'s output is discarded. On the failure path the condition's
/// resume target is rebound to the finally boundary before the condition
/// is delivered outward, so an outer `resume(v)` continues after the
/// finally rather than at the raw raise site.
///
/// `cleanup` is not expected to raise; if it does, behavior is undefined —
/// wrap it in `tee` if isolation is needed.
#[must_use]
pub fn finally(cleanup: Action, action: Action) -> Action {
    Action::native("finally", move |engine, input, success, failure| {
        let on_success = {
            let cleanup = cleanup.clone();
            let success = success.clone();
            let input = input.clone();
            Action::native("finally-ok", move |rt, out, _success, failure| {
                let deliver = {
                    let success = success.clone();
                    let out = out.clone();
                    Action::native("finally-deliver", move |rt, _cleanup_out, _s, failure| {
                        rt.call(&success, out.clone(), None, Some(failure));
                    })
                };
                rt.call(&cleanup, input.clone(), Some(deliver), Some(failure));
            })
        };

        let on_failure = {
            let cleanup = cleanup.clone();
            let success = success.clone();
            let failure = failure.clone();
            let input = input.clone();
            Action::native("finally-err", move |rt, carried, _success, _failure| {
                if let Some(condition) = carried.as_condition() {
                    condition.rebind_success(success.clone());
                }
                let deliver = {
                    let failure = failure.clone();
                    let carried = carried.clone();
                    Action::native("finally-deliver", move |rt, _cleanup_out, _s, _f| {
                        rt.call(&failure, carried.clone(), None, None);
                    })
                };
                rt.call(&cleanup, input.clone(), Some(deliver), None);
            })
        };

        engine.call(&action, input.clone(), Some(on_success), Some(on_failure));
    })
}

/// One-shot catch around a single action.
///
/// On failure inside `action`, `handler` runs with the condition as input
/// and joins back to the surrounding success; a failing handler delivers
/// to the outer failure. Restart re-enters the `attempt`.
#[must_use]
pub fn attempt(action: Action, handler: Action) -> Action {
    Action::native("attempt", move |engine, input, success, failure| {
        let dispatcher = {
            let action = action.clone();
            let handler = handler.clone();
            let success = success.clone();
            let failure = failure.clone();
            Action::native("attempt-dispatch", move |rt, carried, _s, _f| {
                let Some(condition) = carried.as_condition().cloned() else {
                    rt.call(&failure, carried, None, None);
                    return;
                };
                if condition.is_pause() {
                    rt.call(&failure, carried, None, None);
                    return;
                }
                let restart = {
                    let action = action.clone();
                    let handler = handler.clone();
                    let success = success.clone();
                    let failure = failure.clone();
                    Action::native("attempt-restart", move |rt, value, _s, _f| {
                        let again = attempt(action.clone(), handler.clone());
                        rt.call(&again, value, Some(success.clone()), Some(failure.clone()));
                    })
                };
                condition.adopt_restart(restart);
                condition.rebind_failure(failure.clone());
                rt.call(&handler, carried, Some(success.clone()), Some(failure.clone()));
            })
        };
        engine.call(&action, input, Some(success), Some(dispatcher));
    })
}

/// A handler that discards the error and continues with the pre-error
/// input.
///
/// Reads the condition's captured input and forwards it to success. Used
/// as `catch(forgive())`, it makes `raise` behave like `pass`.
#[must_use]
pub fn forgive() -> Action {
    Action::native("forgive", |engine, input, success, failure| {
        let out = match input.as_condition() {
            Some(condition) => condition.input().clone(),
            None => input,
        };
        engine.call(&success, out, None, Some(failure));
    })
}

/// Builds a fresh condition from a raw payload and delivers it.
///
/// Shared by combinators that synthesize their own failures (`alt`
/// exhaustion, `any` all-failed, unmatched `cond`).
pub(crate) fn synthesize_failure(
    engine: &crate::engine::Engine,
    failure: &Action,
    error: &str,
    input: Value,
    success: Action,
) {
    let condition = Condition::raised(
        engine.clone(),
        Value::from(error),
        input,
        success,
        failure.clone(),
    );
    engine.call(failure, Value::Condition(condition), None, None);
}

//! Error-model E2E suite: raise, catch, resume, rollback, restart,
//! finally, forgive.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use strand::test_support::{capture, failure_sink};
use strand::{
    catch, chain, emit, finally, forgive, map, probe, raise, supply, Action, Engine, Value,
};

/// Renders kernel log output when `RUST_LOG` asks for it.
fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// A handler that resumes the raise site with a fixed value.
fn resume_with(value: Value) -> Action {
    Action::native("resume-with", move |_rt, input, _success, _failure| {
        if let Some(condition) = input.as_condition() {
            condition.resume(value.clone());
        }
    })
}

#[test]
fn catch_resume_rejoins_after_the_raise() {
    init_tracing();
    let engine = Engine::lab();
    let (end, seen) = capture();
    let observed = Rc::new(RefCell::new(Vec::new()));

    let observer = {
        let observed = Rc::clone(&observed);
        probe(move |v| observed.borrow_mut().push(v.clone()))
    };

    engine.run(
        Value::from("x"),
        chain([
            emit("before"),
            catch(resume_with(Value::from("y"))),
            raise(Value::from("boom")),
            observer,
            emit("after"),
            end,
        ]),
    );
    engine.run_until_quiescent();

    // The probe past the raise site sees the resumed value.
    assert_eq!(observed.borrow().as_slice(), &[Value::from("y")]);
    assert_eq!(seen.borrow().as_slice(), &[Value::from("y")]);
}

#[test]
fn resume_equivalence_with_supply() {
    let engine = Engine::lab();
    let (via_resume, seen_resume) = capture();
    let (via_supply, seen_supply) = capture();

    engine.run(
        Value::Int(1),
        chain([
            catch(resume_with(Value::from("v"))),
            raise(Value::from("e")),
            via_resume,
        ]),
    );
    engine.run(Value::Int(1), chain([supply(Value::from("v")), via_supply]));
    engine.run_until_quiescent();

    assert_eq!(
        seen_resume.borrow().as_slice(),
        seen_supply.borrow().as_slice()
    );
}

#[test]
fn forgive_restores_the_pre_error_input() {
    let engine = Engine::lab();
    let (end, seen) = capture();
    let forward = Rc::new(RefCell::new(Vec::new()));

    let observer = {
        let forward = Rc::clone(&forward);
        probe(move |v| forward.borrow_mut().push(v.clone()))
    };

    engine.run(
        Value::Int(1),
        chain([
            catch(forgive()),
            map(|v: Value| Value::Int(v.as_int().unwrap_or(0) + 1)),
            observer,
            raise(Value::from("stop")),
            end,
        ]),
    );
    engine.run_until_quiescent();

    // The forward path sees 2, the raise bounces through forgive, and the
    // final continuation sees 2 again.
    assert_eq!(forward.borrow().as_slice(), &[Value::Int(2)]);
    assert_eq!(seen.borrow().as_slice(), &[Value::Int(2)]);
}

#[test]
fn rollback_transitivity_inner_handler_failing_reaches_outer() {
    let engine = Engine::lab();
    let (end, seen) = capture();

    let outer = Action::native("outer-handler", |rt, input, success, failure| {
        let payload = input
            .as_condition()
            .map_or(Value::Null, |c| c.error().clone());
        rt.call(&success, payload, None, Some(failure));
    });
    // The inner handler fails straight away: the condition must reach the
    // outer handler unchanged.
    let inner = strand::fail();

    engine.run(
        Value::Int(1),
        chain([catch(outer), catch(inner), raise(Value::from("original")), end]),
    );
    engine.run_until_quiescent();

    assert_eq!(seen.borrow().as_slice(), &[Value::from("original")]);
}

#[test]
fn explicit_rollback_skips_the_current_handler() {
    let engine = Engine::lab();
    let (end, seen) = capture();

    let outer = Action::native("outer-handler", |rt, input, success, failure| {
        let payload = input
            .as_condition()
            .map_or(Value::Null, |c| c.error().clone());
        rt.call(&success, payload, None, Some(failure));
    });
    let rolls_back = Action::native("rolls-back", |_rt, input, _success, _failure| {
        if let Some(condition) = input.as_condition() {
            condition.rollback(Value::Null);
        }
    });

    engine.run(
        Value::Int(1),
        chain([catch(outer), catch(rolls_back), raise(Value::from("deep")), end]),
    );
    engine.run_until_quiescent();

    assert_eq!(seen.borrow().as_slice(), &[Value::from("deep")]);
}

#[test]
fn restart_runs_the_protected_region_again() {
    let engine = Engine::lab();
    let (end, seen) = capture();
    let tries = Rc::new(Cell::new(0));

    let flaky = {
        let tries = Rc::clone(&tries);
        Action::native("flaky", move |rt, input, success, failure| {
            tries.set(tries.get() + 1);
            if tries.get() < 3 {
                rt.raise_to(&failure, Value::from("transient"), input, success);
            } else {
                rt.call(&success, input, None, Some(failure));
            }
        })
    };
    let retry = Action::native("retry", |_rt, input, _success, _failure| {
        if let Some(condition) = input.as_condition() {
            condition.restart(condition.input().clone());
        }
    });

    engine.run(Value::from("job"), chain([catch(retry), flaky, end]));
    engine.run_until_quiescent();

    assert_eq!(tries.get(), 3);
    assert_eq!(seen.borrow().as_slice(), &[Value::from("job")]);
}

#[test]
fn finally_cleanup_runs_on_both_paths() {
    let engine = Engine::lab();
    let cleanups = Rc::new(RefCell::new(Vec::new()));
    let cleanup = |cleanups: &Rc<RefCell<Vec<Value>>>| {
        let cleanups = Rc::clone(cleanups);
        probe(move |v| cleanups.borrow_mut().push(v.clone()))
    };

    // Success path.
    let (ok_end, ok_seen) = capture();
    engine.run(
        Value::from("in-ok"),
        chain([
            finally(cleanup(&cleanups), supply(Value::from("out"))),
            ok_end,
        ]),
    );

    // Failure path: the condition keeps flowing outward after cleanup.
    let (sink, sunk) = failure_sink();
    let guarded = finally(cleanup(&cleanups), raise(Value::from("bad")));
    engine.run(
        Value::from("in-err"),
        Action::native("root", move |rt, input, _s, _f| {
            rt.call(&guarded, input, None, Some(sink.clone()));
        }),
    );
    engine.run_until_quiescent();

    assert_eq!(
        cleanups.borrow().as_slice(),
        &[Value::from("in-ok"), Value::from("in-err")]
    );
    assert_eq!(ok_seen.borrow().as_slice(), &[Value::from("out")]);
    assert_eq!(sunk.borrow().len(), 1);
    assert!(sunk.borrow()[0].as_condition().is_some());
}

#[test]
fn uncaught_failures_reach_the_drain_without_unwinding() {
    init_tracing();
    let engine = Engine::lab();
    engine.run(Value::Int(1), chain([raise(Value::from("nobody home"))]));
    engine.run_until_quiescent();
    // Nothing to assert beyond "no panic escaped": the drain reported it.
    assert!(engine.is_quiescent());
}

#[test]
fn host_panics_are_recoverable_conditions() {
    let engine = Engine::lab();
    let (end, seen) = capture();

    engine.run(
        Value::Int(1),
        chain([
            catch(forgive()),
            map(|_| panic!("host exception")),
            end,
        ]),
    );
    engine.run_until_quiescent();

    // Forgive restores the input the panicking stage received.
    assert_eq!(seen.borrow().as_slice(), &[Value::Int(1)]);
}

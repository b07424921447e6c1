//! Periodic ticks and activation settling.
//!
//! `clock` is a control action: it consumes `"start"` / `"stop"` /
//! `"reset"` inputs and emits ticks into its success continuation on its
//! own schedule. It is not self-throttling — the caller ensures the
//! downstream completes within the period.
//!
//! `debounce` is the inverse shape: it swallows bursts of activations and
//! forwards only the one that goes quiet for the configured window.

use std::cell::Cell;
use std::rc::Rc;

use crate::action::Action;
use crate::engine::Engine;
use crate::value::Value;

struct ClockState {
    running: Cell<bool>,
    counter: Cell<u64>,
    /// Bumped on every start/stop so stale timer chains lapse.
    generation: Cell<u64>,
}

/// A periodic tick source controlled by its inputs.
///
/// `"start"` begins ticking: every `period_ms` the next `tick_fn(i)` is
/// delivered to the success continuation captured at the start. `"stop"`
/// halts; `"reset"` zeroes the counter for the next tick; anything else
/// is ignored. Control inputs themselves produce no continuation.
#[must_use]
pub fn clock(period_ms: u64, tick_fn: impl Fn(u64) -> Value + 'static) -> Action {
    let state = Rc::new(ClockState {
        running: Cell::new(false),
        counter: Cell::new(0),
        generation: Cell::new(0),
    });
    let tick_fn: Rc<dyn Fn(u64) -> Value> = Rc::new(tick_fn);

    Action::native("clock", move |engine, input, success, failure| {
        match input.as_str() {
            Some("start") => {
                if state.running.replace(true) {
                    return;
                }
                state.generation.set(state.generation.get() + 1);
                schedule_tick(
                    engine,
                    period_ms,
                    Rc::clone(&state),
                    Rc::clone(&tick_fn),
                    success,
                    failure,
                    state.generation.get(),
                );
            }
            Some("stop") => {
                state.running.set(false);
                state.generation.set(state.generation.get() + 1);
            }
            Some("reset") => state.counter.set(0),
            _ => {}
        }
    })
}

fn schedule_tick(
    engine: &Engine,
    period_ms: u64,
    state: Rc<ClockState>,
    tick_fn: Rc<dyn Fn(u64) -> Value>,
    success: Action,
    failure: Action,
    generation: u64,
) {
    let engine_at_start = engine.clone();
    engine.delay_thunk(period_ms, move || {
        if !state.running.get() || state.generation.get() != generation {
            return;
        }
        let index = state.counter.get();
        state.counter.set(index + 1);
        engine_at_start.call(&success, tick_fn(index), None, Some(failure.clone()));
        schedule_tick(
            &engine_at_start,
            period_ms,
            state,
            tick_fn,
            success,
            failure,
            generation,
        );
    });
}

/// Forwards an activation only after `millis` of quiet.
///
/// Each new activation supersedes the pending one; when no further
/// activation arrives within the window, the latest input is delivered.
#[must_use]
pub fn debounce(millis: u64) -> Action {
    let generation = Rc::new(Cell::new(0_u64));
    Action::native("debounce", move |engine, input, success, failure| {
        generation.set(generation.get() + 1);
        let mine = generation.get();
        let generation = Rc::clone(&generation);
        let engine_at_start = engine.clone();
        engine.delay_thunk(millis, move || {
            if generation.get() != mine {
                return;
            }
            engine_at_start.call(&success, input, None, Some(failure));
        });
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::combinator::{chain, delay_for, send, spray};
    use crate::test_support::capture;

    #[test]
    fn clock_ticks_until_stopped() {
        let engine = Engine::lab();
        let (end, seen) = capture();
        let ticker = clock(10, |i| Value::Int(i64::try_from(i).unwrap_or(0)));

        engine.run(Value::from("start"), chain([ticker.clone(), end]));
        engine.run(
            Value::Null,
            chain([delay_for(35), send(Value::from("stop"), ticker)]),
        );
        engine.run_until_quiescent();
        assert_eq!(
            seen.borrow().as_slice(),
            &[Value::Int(0), Value::Int(1), Value::Int(2)]
        );
    }

    #[test]
    fn clock_reset_zeroes_the_counter() {
        let engine = Engine::lab();
        let (end, seen) = capture();
        let ticker = clock(10, |i| Value::Int(i64::try_from(i).unwrap_or(0)));

        engine.run(Value::from("start"), chain([ticker.clone(), end]));
        engine.run(
            Value::Null,
            chain([delay_for(15), send(Value::from("reset"), ticker.clone())]),
        );
        engine.run(
            Value::Null,
            chain([delay_for(25), send(Value::from("stop"), ticker)]),
        );
        engine.run_until_quiescent();
        // One tick before the reset, one renumbered tick after it.
        assert_eq!(seen.borrow().as_slice(), &[Value::Int(0), Value::Int(0)]);
    }

    #[test]
    fn debounce_keeps_only_the_quiet_activation() {
        let engine = Engine::lab();
        let (end, seen) = capture();
        let settle = debounce(10);

        engine.run(
            Value::Null,
            chain([
                spray(Some(vec![Value::Int(1), Value::Int(2), Value::Int(3)])),
                settle,
                end,
            ]),
        );
        engine.run_until_quiescent();
        assert_eq!(seen.borrow().as_slice(), &[Value::Int(3)]);
    }
}

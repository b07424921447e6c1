//! Generators: push-driven streams with pause/resume backpressure.
//!
//! A generator emits values into its downstream success continuation in a
//! tight loop, without waiting for each emission to complete. Downstream
//! bounded buffers push back by raising a pause condition into the
//! failure continuation the generator supplies with every emission; the
//! generator traps it, registers an on-resume callback, and stops
//! producing until buffer space reopens. Non-pause conditions propagate
//! to the generator's own failure continuation.
//!
//! A burst budget equal to the engine's buffer capacity bounds successive
//! synchronous emissions; past it, the generator yields to the scheduler
//! so timers and peer sequences are not starved.
//!
//! A refused emission is replayed into the downstream after the pause
//! lifts, so no item is lost; stages sitting between a generator and a
//! bounded buffer can therefore observe a refused item twice.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use crate::action::Action;
use crate::condition::Condition;
use crate::engine::Engine;
use crate::value::Value;

/// One running producer loop.
struct GenRun {
    engine: Engine,
    producer: RefCell<Box<dyn FnMut() -> Option<Value>>>,
    delay_ms: u64,
    downstream: Action,
    failure: Action,
    paused: Cell<bool>,
    resume_pending: Cell<bool>,
    /// A value the downstream refused; re-emitted first on resume.
    rejected: RefCell<Option<Value>>,
}

impl GenRun {
    fn spin(self: &Rc<Self>) {
        let budget = self.engine.buffer_capacity().max(1);
        for _ in 0..budget {
            if self.paused.get() {
                return;
            }
            let pending = self.rejected.borrow_mut().take();
            let value = match pending {
                Some(value) => value,
                None => match (self.producer.borrow_mut())() {
                    Some(value) => value,
                    None => return,
                },
            };
            let trap = {
                let run = Rc::clone(self);
                let emitted = value.clone();
                Action::native("generator-trap", move |rt, carried, _s, _f| {
                    run.on_failure(rt, carried, emitted.clone());
                })
            };
            self.engine
                .call(&self.downstream, value, None, Some(trap));
            if self.paused.get() {
                return;
            }
        }
        // Burst budget exhausted; yield before the next round.
        let run = Rc::clone(self);
        self.engine.delay_thunk(self.delay_ms, move || run.spin());
    }

    fn on_failure(self: &Rc<Self>, rt: &Engine, carried: Value, emitted: Value) {
        let Some(signal) = carried
            .as_condition()
            .and_then(|condition| condition.pause_signal())
        else {
            // Not backpressure: hand it to the generator's own failure.
            rt.call(&self.failure, carried, None, None);
            return;
        };

        // Keep the refused emission so no item is lost across the pause;
        // it is replayed into the downstream once buffer space reopens.
        *self.rejected.borrow_mut() = Some(emitted);
        self.paused.set(true);
        if self.resume_pending.replace(true) {
            return;
        }
        let run = Rc::clone(self);
        signal.on_resume(move || {
            run.resume_pending.set(false);
            run.paused.set(false);
            let again = Rc::clone(&run);
            run.engine.next_tick(move || again.spin());
        });
    }
}

/// An action that pumps `producer` into its downstream until exhaustion.
///
/// `producer` yields `Some(value)` per item and `None` at end of stream,
/// after which the generator stops — no continuation is invoked. The
/// producer state is shared between invocations of the same action.
/// `delay_ms` is the yield interval inserted when a burst budget is
/// spent.
#[must_use]
pub fn generate(producer: impl FnMut() -> Option<Value> + 'static, delay_ms: u64) -> Action {
    let shared = Rc::new(RefCell::new(producer));
    generator_with(delay_ms, move |_input| {
        let shared = Rc::clone(&shared);
        Box::new(move || (shared.borrow_mut())())
    })
}

/// Generator whose producer is built from the inbound input.
///
/// Each invocation constructs a fresh producer; `spray`, `cycle` and
/// `enum_from` are built on this.
pub(crate) fn generator_with(
    delay_ms: u64,
    make: impl Fn(&Value) -> Box<dyn FnMut() -> Option<Value>> + 'static,
) -> Action {
    Action::native("generate", move |engine, input, success, failure| {
        let run = Rc::new(GenRun {
            engine: engine.clone(),
            producer: RefCell::new(make(&input)),
            delay_ms,
            downstream: success,
            failure,
            paused: Cell::new(false),
            resume_pending: Cell::new(false),
            rejected: RefCell::new(None),
        });
        run.spin();
    })
}

/// Immediately raises a fresh pause condition.
#[must_use]
pub fn pause() -> Action {
    Action::native("pause", |engine, input, success, failure| {
        let condition = Condition::paused(
            engine.clone(),
            crate::condition::PauseSignal::new(),
            input,
            success,
            failure.clone(),
        );
        engine.call(&failure, Value::Condition(condition), None, None);
    })
}

/// Emits each item of `items` once, then stops.
///
/// With `None`, the inbound input must be a list and its items are
/// sprayed instead.
#[must_use]
pub fn spray(items: Option<Vec<Value>>) -> Action {
    generator_with(0, move |input| {
        let source = match &items {
            Some(fixed) => fixed.clone(),
            None => input.as_list().map(<[Value]>::to_vec).unwrap_or_default(),
        };
        let mut iter = source.into_iter();
        Box::new(move || iter.next())
    })
}

/// Emits the items of `items` over and over, never stopping on its own.
///
/// With `None`, cycles the inbound input list. An empty sequence stops
/// immediately.
#[must_use]
pub fn cycle(items: Option<Vec<Value>>) -> Action {
    generator_with(0, move |input| {
        let source = match &items {
            Some(fixed) => fixed.clone(),
            None => input.as_list().map(<[Value]>::to_vec).unwrap_or_default(),
        };
        let mut index = 0;
        Box::new(move || {
            if source.is_empty() {
                return None;
            }
            let value = source[index % source.len()].clone();
            index += 1;
            Some(value)
        })
    })
}

/// Emits the numeric sequence `from, from + step, …`.
///
/// `to` is exclusive; `None` means the sequence never ends on its own.
#[must_use]
pub fn enum_from(from: i64, step: i64, to: Option<i64>) -> Action {
    generator_with(0, move |_input| {
        let mut next = from;
        Box::new(move || {
            if let Some(to) = to {
                let past_end = if step >= 0 { next >= to } else { next <= to };
                if past_end {
                    return None;
                }
            }
            let value = next;
            next += step;
            Some(Value::Int(value))
        })
    })
}

/// Accumulates inputs until `test` matches, then drains the collection.
///
/// Per activation: if `test(input)` holds — or the input is null, when no
/// test is given — the accumulated list is sent to the engine's drain and
/// the sequence stops; otherwise the input is appended and the running
/// list is delivered to success.
#[must_use]
pub fn collect_until(test: Option<Rc<dyn Fn(&Value) -> bool>>) -> Action {
    let collected: Rc<RefCell<Vec<Value>>> = Rc::new(RefCell::new(Vec::new()));
    Action::native("collect-until", move |engine, input, success, failure| {
        let finished = match &test {
            Some(test) => test(&input),
            None => input.is_null(),
        };
        if finished {
            let list = Value::List(collected.borrow_mut().drain(..).collect());
            let drain = engine.drain();
            engine.call(&drain, list, None, None);
            return;
        }
        collected.borrow_mut().push(input);
        let running = Value::List(collected.borrow().clone());
        engine.call(&success, running, None, Some(failure));
    })
}

/// Convenience wrapper building the predicate from a closure.
#[must_use]
pub fn collect_while(test: impl Fn(&Value) -> bool + 'static) -> Action {
    collect_until(Some(Rc::new(test)))
}

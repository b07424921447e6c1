//! Cooperative interruption.
//!
//! Interruption never preempts: it runs registered cleanups and then
//! raises an `interrupted` condition into the target's continuation chain
//! on a fresh tick. In-flight side effects are not rolled back unless a
//! `finally` defined them to be.
//!
//! Two granularities:
//!
//! - [`interruptible`] wraps a single low-level producer and pairs it
//!   with an `interrupt` action;
//! - [`interruption`] hands out a `{mark, interrupt}` pair where any
//!   number of independent sequences can `mark` themselves and a single
//!   `interrupt` fans out to all of them.

use std::cell::{Cell, RefCell};
use std::collections::BTreeMap;
use std::rc::Rc;

use crate::action::Action;
use crate::condition::Condition;
use crate::engine::Engine;
use crate::value::Value;

/// Registers cleanups for an [`interruptible`] producer.
pub struct Registrar {
    cleanups: Rc<RefCell<Vec<Box<dyn FnOnce()>>>>,
}

impl Registrar {
    /// Registers a cleanup run (in installation order) when the producer
    /// is interrupted.
    pub fn on_interrupt(&self, cleanup: impl FnOnce() + 'static) {
        self.cleanups.borrow_mut().push(Box::new(cleanup));
    }
}

/// An interruptible producer paired with its interrupt action.
#[derive(Debug, Clone)]
pub struct Interruptible {
    /// The wrapped producer.
    pub action: Action,
    /// Runs the cleanups and raises `interrupted` into the producer's
    /// live continuation chain. May be run in any engine. Idempotent.
    pub interrupt: Action,
}

struct InterruptState {
    cleanups: Rc<RefCell<Vec<Box<dyn FnOnce()>>>>,
    done: Cell<bool>,
    /// The producer's live failure continuation, while it is in flight.
    target: RefCell<Option<(Engine, Action)>>,
}

/// Wraps the action built by `builder` so it can be interrupted.
///
/// `builder` receives a [`Registrar`] for zero-argument cleanups and
/// returns the low-level action. The paired `interrupt` action runs all
/// cleanups in installation order, then delivers `interrupted` via
/// `delay(0, raise)`. A done flag makes post-completion interrupts no-ops.
#[must_use]
pub fn interruptible(builder: impl FnOnce(&Registrar) -> Action) -> Interruptible {
    let cleanups = Rc::new(RefCell::new(Vec::new()));
    let registrar = Registrar {
        cleanups: Rc::clone(&cleanups),
    };
    let inner = builder(&registrar);

    let state = Rc::new(InterruptState {
        cleanups,
        done: Cell::new(false),
        target: RefCell::new(None),
    });

    let action = {
        let state = Rc::clone(&state);
        Action::native("interruptible", move |engine, input, success, failure| {
            *state.target.borrow_mut() = Some((engine.clone(), failure.clone()));

            let settle = |inner: Action, state: &Rc<InterruptState>| {
                let state = Rc::clone(state);
                Action::native("interruptible-settle", move |rt, out, _s, failure| {
                    if state.done.replace(true) {
                        return;
                    }
                    state.target.borrow_mut().take();
                    rt.call(&inner, out, None, Some(failure));
                })
            };
            let on_ok = settle(success.clone(), &state);
            let on_err = settle(failure.clone(), &state);
            engine.call(&inner, input, Some(on_ok), Some(on_err));
        })
    };

    let interrupt = {
        let state = Rc::clone(&state);
        Action::native("interrupt", move |engine, input, success, failure| {
            if !state.done.replace(true) {
                let cleanups = state.cleanups.take();
                for cleanup in cleanups {
                    cleanup();
                }
                if let Some((target_engine, target)) = state.target.borrow_mut().take() {
                    deliver_interrupted(&target_engine, target, Value::from("interrupted"));
                }
            }
            engine.call(&success, input, None, Some(failure));
        })
    };

    Interruptible { action, interrupt }
}

/// A fan-out interruption handle.
#[derive(Debug, Clone)]
pub struct InterruptionHandle {
    /// Registers the running sequence's failure continuation in the shared
    /// table, then proceeds.
    pub mark: Action,
    /// Raises `interrupted` into every marked sequence. Idempotent between
    /// markings: firing drains the table.
    pub interrupt: Action,
}

/// Creates a `{mark, interrupt}` pair keyed on a shared handler table.
#[must_use]
pub fn interruption(reason: Value) -> InterruptionHandle {
    let table: Rc<RefCell<BTreeMap<u64, (Engine, Action)>>> =
        Rc::new(RefCell::new(BTreeMap::new()));
    let next_id = Rc::new(Cell::new(0_u64));

    let mark = {
        let table = Rc::clone(&table);
        let next_id = Rc::clone(&next_id);
        Action::native("interruption-mark", move |engine, input, success, failure| {
            let id = next_id.get();
            next_id.set(id + 1);
            table
                .borrow_mut()
                .insert(id, (engine.clone(), failure.clone()));
            engine.call(&success, input, None, Some(failure));
        })
    };

    let interrupt = {
        let table = Rc::clone(&table);
        let reason = reason.clone();
        Action::native("interruption-fire", move |engine, input, success, failure| {
            let handlers = table.take();
            for (_, (target_engine, target)) in handlers {
                deliver_interrupted(&target_engine, target, reason.clone());
            }
            engine.call(&success, input, None, Some(failure));
        })
    };

    InterruptionHandle { mark, interrupt }
}

/// Raises `interrupted` into `target` on a fresh tick.
fn deliver_interrupted(engine: &Engine, target: Action, reason: Value) {
    let engine = engine.clone();
    let condition = Condition::interrupted(engine.clone(), reason, engine.drain(), target.clone());
    engine.clone().delay_thunk(0, move || {
        engine.call(&target, Value::Condition(condition), None, None);
    });
}

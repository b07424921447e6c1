//! Serialized regions with bounded buffering and backpressure.
//!
//! `atomic` admits one in-flight invocation of its wrapped action at a
//! time. Arrivals while busy enter a waiter queue bounded by the engine's
//! buffer capacity; once the queue would overflow, the caller's failure
//! continuation receives a shared pause condition instead — an upstream
//! generator traps it and stops producing. Completion dispatches the next
//! waiter on a fresh tick and, once the queue has drained below capacity,
//! releases the outstanding pause.

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::rc::Rc;

use crate::action::Action;
use crate::condition::{Condition, PauseSignal};
use crate::engine::Engine;
use crate::value::Value;

struct AtomicState {
    busy: Cell<bool>,
    waiters: RefCell<VecDeque<(Value, Action, Action)>>,
    outstanding_pause: RefCell<Option<PauseSignal>>,
}

impl AtomicState {
    fn depth(&self) -> usize {
        self.waiters.borrow().len()
    }
}

/// A serialized region with an inspectable waiter queue.
///
/// Clones share the region; [`AtomicRegion::action`] hands out the entry
/// action, and the accessors expose the buffer state for gauges and
/// tests.
#[derive(Clone)]
pub struct AtomicRegion {
    inner: Action,
    state: Rc<AtomicState>,
}

impl AtomicRegion {
    /// Creates a serialized region around `action`.
    #[must_use]
    pub fn new(action: Action) -> Self {
        Self {
            inner: action,
            state: Rc::new(AtomicState {
                busy: Cell::new(false),
                waiters: RefCell::new(VecDeque::new()),
                outstanding_pause: RefCell::new(None),
            }),
        }
    }

    /// The entry action serializing into this region.
    #[must_use]
    pub fn action(&self) -> Action {
        let action = self.inner.clone();
        let state = Rc::clone(&self.state);
        Action::native("atomic", move |engine, input, success, failure| {
            enter(engine, &action, &state, input, success, failure);
        })
    }

    /// Number of entries parked in the waiter queue.
    #[must_use]
    pub fn queued(&self) -> usize {
        self.state.depth()
    }

    /// True while an invocation is in flight.
    #[must_use]
    pub fn is_busy(&self) -> bool {
        self.state.busy.get()
    }

    /// Entries currently buffered: the in-flight one plus the queue.
    #[must_use]
    pub fn buffered(&self) -> usize {
        self.queued() + usize::from(self.is_busy())
    }
}

impl std::fmt::Debug for AtomicRegion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AtomicRegion")
            .field("busy", &self.is_busy())
            .field("queued", &self.queued())
            .finish()
    }
}

/// Serializes entries into `action` behind a bounded waiter queue.
#[must_use]
pub fn atomic(action: Action) -> Action {
    AtomicRegion::new(action).action()
}

fn enter(
    engine: &Engine,
    action: &Action,
    state: &Rc<AtomicState>,
    input: Value,
    success: Action,
    failure: Action,
) {
    if !state.busy.replace(true) {
        dispatch(engine, action, state, input, success, failure);
        return;
    }
    let capacity = engine.buffer_capacity();
    if state.depth() + 1 >= capacity {
        let signal = state
            .outstanding_pause
            .borrow_mut()
            .get_or_insert_with(PauseSignal::new)
            .clone();
        let condition =
            Condition::paused(engine.clone(), signal, input, success, failure.clone());
        engine.call(&failure, Value::Condition(condition), None, None);
        return;
    }
    state.waiters.borrow_mut().push_back((input, success, failure));
}

fn dispatch(
    engine: &Engine,
    action: &Action,
    state: &Rc<AtomicState>,
    input: Value,
    success: Action,
    failure: Action,
) {
    let settle = |exit: Action, thread: Option<Action>, action: Action, state: Rc<AtomicState>| {
        Action::native("atomic-complete", move |rt: &Engine, out, _s, _f| {
            // Schedule the next waiter before the outgoing continuation
            // runs, so the region never idles while work is queued.
            let next = state.waiters.borrow_mut().pop_front();
            match next {
                Some((next_input, next_success, next_failure)) => {
                    let rt_at_completion = rt.clone();
                    let action = action.clone();
                    let state_for_next = Rc::clone(&state);
                    rt.next_tick(move || {
                        dispatch(
                            &rt_at_completion,
                            &action,
                            &state_for_next,
                            next_input,
                            next_success,
                            next_failure,
                        );
                    });
                }
                None => state.busy.set(false),
            }
            if state.depth() + 1 < rt.buffer_capacity() {
                if let Some(signal) = state.outstanding_pause.borrow_mut().take() {
                    signal.resume();
                }
            }
            rt.call(&exit, out, None, thread.clone());
        })
    };

    let on_ok = settle(
        success,
        Some(failure.clone()),
        action.clone(),
        Rc::clone(state),
    );
    let on_err = settle(failure, None, action.clone(), Rc::clone(state));
    engine.call(action, input, Some(on_ok), Some(on_err));
}

/// Chains the actions with every stage independently FIFO-serialized.
///
/// Multiple producers can pump through the same shared pipeline; each
/// input's results route to that input's continuations.
#[must_use]
pub fn pipeline(actions: impl IntoIterator<Item = Action>) -> Action {
    super::seq::chain(actions.into_iter().map(atomic))
}

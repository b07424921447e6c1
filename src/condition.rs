//! Recoverable failure values.
//!
//! Errors in this kernel are not thrown and lost: a failure is reified as a
//! [`Condition`] and delivered to the nearest failure continuation. The
//! condition captures where execution was when it was raised, so the
//! receiving handler can choose between three recoveries:
//!
//! - [`Condition::resume`]: continue forward from the raise site's
//!   successor with a replacement value;
//! - [`Condition::rollback`]: give up locally and deliver to the outer
//!   failure continuation;
//! - [`Condition::restart`]: re-enter the protected region from the top
//!   (available once a `catch` has adopted the condition).
//!
//! A [`PauseSignal`] is the distinguished backpressure condition raised by
//! bounded buffers; it is non-resumable in the error sense and instead
//! carries callbacks fired when buffer space reopens. Handlers that do not
//! recognize a pause must propagate it outward.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;

use crate::action::Action;
use crate::engine::Engine;
use crate::value::Value;

/// What kind of failure a condition carries.
#[derive(Clone)]
pub enum Signal {
    /// An ordinary raise (user payload or a caught panic).
    Raise,
    /// A backpressure pause from a bounded buffer.
    Pause(PauseSignal),
    /// A cooperative interruption.
    Interrupt,
}

impl fmt::Debug for Signal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Raise => f.write_str("Raise"),
            Self::Pause(_) => f.write_str("Pause"),
            Self::Interrupt => f.write_str("Interrupt"),
        }
    }
}

/// A recoverable failure value.
///
/// Conditions travel the failure channel as [`Value::Condition`] and are
/// handed to handlers as their input. The captured continuations are
/// rebindable cells: `catch` rebinds the rollback target to the outer
/// failure before running a handler, and `finally` rebinds the resume
/// target to the finally boundary before letting a failure escape.
pub struct Condition {
    engine: Engine,
    signal: Signal,
    error: Value,
    input: Value,
    success: RefCell<Action>,
    failure: RefCell<Action>,
    restart: RefCell<Option<Action>>,
}

impl Condition {
    /// Creates an ordinary raised condition at the given site.
    #[must_use]
    pub fn raised(
        engine: Engine,
        error: Value,
        input: Value,
        success: Action,
        failure: Action,
    ) -> Rc<Self> {
        Self::with_signal(engine, Signal::Raise, error, input, success, failure)
    }

    /// Creates a pause condition carrying the given signal.
    #[must_use]
    pub fn paused(
        engine: Engine,
        signal: PauseSignal,
        input: Value,
        success: Action,
        failure: Action,
    ) -> Rc<Self> {
        Self::with_signal(
            engine,
            Signal::Pause(signal),
            Value::from("pause"),
            input,
            success,
            failure,
        )
    }

    /// Creates an interruption condition.
    #[must_use]
    pub fn interrupted(
        engine: Engine,
        reason: Value,
        success: Action,
        failure: Action,
    ) -> Rc<Self> {
        Self::with_signal(
            engine,
            Signal::Interrupt,
            Value::from("interrupted"),
            reason,
            success,
            failure,
        )
    }

    fn with_signal(
        engine: Engine,
        signal: Signal,
        error: Value,
        input: Value,
        success: Action,
        failure: Action,
    ) -> Rc<Self> {
        Rc::new(Self {
            engine,
            signal,
            error,
            input,
            success: RefCell::new(success),
            failure: RefCell::new(failure),
            restart: RefCell::new(None),
        })
    }

    /// The error payload handed to `raise`.
    #[must_use]
    pub const fn error(&self) -> &Value {
        &self.error
    }

    /// The input value present at the failure point.
    #[must_use]
    pub const fn input(&self) -> &Value {
        &self.input
    }

    /// The signal kind of this condition.
    #[must_use]
    pub const fn signal(&self) -> &Signal {
        &self.signal
    }

    /// Returns the pause signal if this is a backpressure condition.
    #[must_use]
    pub fn pause_signal(&self) -> Option<PauseSignal> {
        match &self.signal {
            Signal::Pause(signal) => Some(signal.clone()),
            _ => None,
        }
    }

    /// Returns true if this is a backpressure pause.
    #[must_use]
    pub const fn is_pause(&self) -> bool {
        matches!(self.signal, Signal::Pause(_))
    }

    /// Returns true if this is a cooperative interruption.
    #[must_use]
    pub const fn is_interrupt(&self) -> bool {
        matches!(self.signal, Signal::Interrupt)
    }

    /// The success continuation captured at the raise site.
    #[must_use]
    pub fn success(&self) -> Action {
        self.success.borrow().clone()
    }

    /// The current rollback target.
    #[must_use]
    pub fn failure(&self) -> Action {
        self.failure.borrow().clone()
    }

    /// The restart action, once a `catch` has adopted this condition.
    #[must_use]
    pub fn restart_action(&self) -> Option<Action> {
        self.restart.borrow().clone()
    }

    /// Re-enters the raise site's successor with `value`.
    pub fn resume(&self, value: Value) {
        let success = self.success();
        self.engine.call(&success, value, None, None);
    }

    /// Bypasses the current handler and delivers to the outer failure.
    pub fn rollback(self: &Rc<Self>, value: Value) {
        let failure = self.failure();
        let carried = if value.is_null() {
            Value::Condition(Rc::clone(self))
        } else {
            value
        };
        self.engine.call(&failure, carried, None, None);
    }

    /// Re-enters the protected region from the top with `value`.
    ///
    /// Only available after a `catch` adopted the condition; a plain raise
    /// that never met a handler has no region to restart.
    pub fn restart(&self, value: Value) {
        if let Some(restart) = self.restart_action() {
            self.engine.call(&restart, value, None, None);
        }
    }

    pub(crate) fn adopt_restart(&self, restart: Action) {
        *self.restart.borrow_mut() = Some(restart);
    }

    pub(crate) fn rebind_failure(&self, failure: Action) {
        *self.failure.borrow_mut() = failure;
    }

    pub(crate) fn rebind_success(&self, success: Action) {
        *self.success.borrow_mut() = success;
    }
}

impl fmt::Display for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.signal {
            Signal::Raise => write!(f, "raise({})", self.error),
            Signal::Pause(_) => f.write_str("pause"),
            Signal::Interrupt => write!(f, "interrupted({})", self.input),
        }
    }
}

impl fmt::Debug for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Condition")
            .field("signal", &self.signal)
            .field("error", &self.error)
            .field("input", &self.input)
            .finish_non_exhaustive()
    }
}

/// Shared resume state for a single backpressure pause.
///
/// The producer side (a bounded buffer that refused an entry) creates the
/// signal; the consumer side (a generator that trapped the pause) registers
/// an `on_resume` callback. `resume` fires and clears all callbacks;
/// the signal is single-shot — registering after resume fires immediately.
#[derive(Clone)]
pub struct PauseSignal {
    state: Rc<PauseState>,
}

struct PauseState {
    resumed: Cell<bool>,
    waiters: RefCell<Vec<Box<dyn FnOnce()>>>,
}

impl PauseSignal {
    /// Creates a fresh, unresumed signal.
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: Rc::new(PauseState {
                resumed: Cell::new(false),
                waiters: RefCell::new(Vec::new()),
            }),
        }
    }

    /// Registers a callback fired when the pause is released.
    pub fn on_resume(&self, callback: impl FnOnce() + 'static) {
        if self.state.resumed.get() {
            callback();
        } else {
            self.state.waiters.borrow_mut().push(Box::new(callback));
        }
    }

    /// Fires and clears all registered callbacks.
    pub fn resume(&self) {
        if self.state.resumed.replace(true) {
            return;
        }
        let waiters = self.state.waiters.take();
        for waiter in waiters {
            waiter();
        }
    }

    /// Returns true if `resume` has fired.
    #[must_use]
    pub fn is_resumed(&self) -> bool {
        self.state.resumed.get()
    }
}

impl Default for PauseSignal {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for PauseSignal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PauseSignal")
            .field("resumed", &self.state.resumed.get())
            .field("waiters", &self.state.waiters.borrow().len())
            .finish()
    }
}

//! Helpers shared by unit and integration tests.
//!
//! The kernel is driven from tests by capturing what flows past a point
//! in a sequence: [`capture`] returns a pass-through probe action plus
//! the shared buffer it appends to.

use std::cell::RefCell;
use std::rc::Rc;

use crate::action::Action;
use crate::value::Value;

/// A pass-through probe recording every value that flows past it.
///
/// Returns the probe action and the buffer it appends to. The probe
/// forwards the input unchanged, threading the failure continuation, so
/// it can sit anywhere in a chain.
#[must_use]
pub fn capture() -> (Action, Rc<RefCell<Vec<Value>>>) {
    let seen: Rc<RefCell<Vec<Value>>> = Rc::new(RefCell::new(Vec::new()));
    let buffer = Rc::clone(&seen);
    let action = Action::native("capture", move |engine, input, success, failure| {
        buffer.borrow_mut().push(input.clone());
        engine.call(&success, input, None, Some(failure));
    });
    (action, seen)
}

/// A sink recording conditions and values that reach the failure channel.
///
/// Unlike [`capture`], the sink invokes no continuation: whatever arrives
/// stops there.
#[must_use]
pub fn failure_sink() -> (Action, Rc<RefCell<Vec<Value>>>) {
    let seen: Rc<RefCell<Vec<Value>>> = Rc::new(RefCell::new(Vec::new()));
    let buffer = Rc::clone(&seen);
    let action = Action::native("failure-sink", move |_engine, input, _success, _failure| {
        buffer.borrow_mut().push(input);
    });
    (action, seen)
}

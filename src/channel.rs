//! CSP-style rendezvous channels between independent action sequences.
//!
//! A channel pairs a FIFO of sent items with a FIFO of parked receivers.
//! Delivery always goes through `delay(0)`, so receipt is ordered after
//! the enclosing send's continuation returns. The k-th item delivered to
//! a given receiver is the k-th item sent at the time that receiver was
//! dequeued; with multiple receivers the per-receiver ordering is
//! undefined, but no item is lost or duplicated.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::fmt;
use std::rc::Rc;

use crate::action::Action;
use crate::engine::Engine;
use crate::value::Value;

struct ChannelState {
    items: RefCell<VecDeque<Value>>,
    waiters: RefCell<VecDeque<Action>>,
}

/// A FIFO rendezvous primitive.
///
/// Clones share the same queues; the `send` and `recv` builders return
/// actions usable from any sequence on the same engine.
#[derive(Clone)]
pub struct Channel {
    state: Rc<ChannelState>,
}

impl Channel {
    /// Creates an empty channel.
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: Rc::new(ChannelState {
                items: RefCell::new(VecDeque::new()),
                waiters: RefCell::new(VecDeque::new()),
            }),
        }
    }

    /// An action that sends its input into the channel.
    ///
    /// The item is enqueued, pending receiver/item pairs are flushed, and
    /// the input flows onward to success.
    #[must_use]
    pub fn send(&self) -> Action {
        let state = Rc::clone(&self.state);
        Action::native("chan-send", move |engine, input, success, failure| {
            state.items.borrow_mut().push_back(input.clone());
            flush(engine, &state);
            engine.call(&success, input, None, Some(failure));
        })
    }

    /// An action that receives the next item, parking while empty.
    ///
    /// The inbound input is discarded. If an item is available it is
    /// delivered to the success continuation; otherwise the continuation
    /// parks on the waiter queue until a send pairs with it.
    #[must_use]
    pub fn recv(&self) -> Action {
        let state = Rc::clone(&self.state);
        Action::native("chan-recv", move |engine, _input, success, failure| {
            flush(engine, &state);
            let item = state.items.borrow_mut().pop_front();
            match item {
                Some(value) => engine.call(&success, value, None, Some(failure)),
                None => state.waiters.borrow_mut().push_back(success),
            }
        })
    }

    /// Number of undelivered items currently queued.
    #[must_use]
    pub fn pending_items(&self) -> usize {
        self.state.items.borrow().len()
    }

    /// Number of receivers currently parked.
    #[must_use]
    pub fn parked_receivers(&self) -> usize {
        self.state.waiters.borrow().len()
    }
}

impl Default for Channel {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Channel")
            .field("items", &self.pending_items())
            .field("waiters", &self.parked_receivers())
            .finish()
    }
}

/// Pairs queued items with parked receivers, delivering on fresh ticks.
fn flush(engine: &Engine, state: &Rc<ChannelState>) {
    loop {
        let pair = {
            let mut items = state.items.borrow_mut();
            let mut waiters = state.waiters.borrow_mut();
            if items.is_empty() || waiters.is_empty() {
                None
            } else {
                Some((
                    items.pop_front().expect("item checked"),
                    waiters.pop_front().expect("waiter checked"),
                ))
            }
        };
        let Some((value, receiver)) = pair else {
            return;
        };
        let engine_at_flush = engine.clone();
        engine.delay_thunk(0, move || {
            engine_at_flush.call(&receiver, value, None, None);
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::combinator::{chain, send};
    use crate::test_support::capture;

    #[test]
    fn send_then_recv_delivers_in_order() {
        let engine = Engine::lab();
        let channel = Channel::new();
        let (end, seen) = capture();

        engine.run(Value::Int(1), channel.send());
        engine.run(Value::Int(2), channel.send());
        engine.run(Value::Null, chain([channel.recv(), end.clone()]));
        engine.run(Value::Null, chain([channel.recv(), end]));
        engine.run_until_quiescent();
        assert_eq!(seen.borrow().as_slice(), &[Value::Int(1), Value::Int(2)]);
    }

    #[test]
    fn recv_parks_until_a_send_arrives() {
        let engine = Engine::lab();
        let channel = Channel::new();
        let (end, seen) = capture();

        engine.run(Value::Null, chain([channel.recv(), end]));
        engine.run_until_quiescent();
        assert!(seen.borrow().is_empty());
        assert_eq!(channel.parked_receivers(), 1);

        engine.run(Value::from("late"), channel.send());
        engine.run_until_quiescent();
        assert_eq!(seen.borrow().as_slice(), &[Value::from("late")]);
    }

    #[test]
    fn receipt_is_asynchronous_with_respect_to_send() {
        let engine = Engine::lab();
        let channel = Channel::new();
        let order = Rc::new(RefCell::new(Vec::new()));

        let note = |tag: &'static str, order: &Rc<RefCell<Vec<&'static str>>>| {
            let order = Rc::clone(order);
            crate::combinator::probe(move |_| order.borrow_mut().push(tag))
        };

        engine.run(
            Value::Null,
            chain([channel.recv(), note("received", &order)]),
        );
        engine.run(
            Value::Null,
            chain([
                send(Value::from("x"), channel.send()),
                note("sent", &order),
            ]),
        );
        engine.run_until_quiescent();
        assert_eq!(order.borrow().as_slice(), &["sent", "received"]);
    }

    #[test]
    fn no_item_is_lost_or_duplicated() {
        let engine = Engine::lab();
        let channel = Channel::new();
        let (end, seen) = capture();

        for i in 0..5 {
            engine.run(Value::Int(i), channel.send());
        }
        for _ in 0..5 {
            engine.run(Value::Null, chain([channel.recv(), end.clone()]));
        }
        engine.run_until_quiescent();
        let mut got: Vec<i64> = seen
            .borrow()
            .iter()
            .filter_map(Value::as_int)
            .collect();
        got.sort_unstable();
        assert_eq!(got, vec![0, 1, 2, 3, 4]);
        assert_eq!(channel.pending_items(), 0);
        assert_eq!(channel.parked_receivers(), 0);
    }
}

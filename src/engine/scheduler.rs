//! The cooperative scheduler: a microtask queue plus a timer heap.
//!
//! All apparent concurrency in the kernel comes from breaking continuation
//! chains across scheduler turns. Two suspension primitives exist:
//!
//! - `push`: run a thunk on the next tick (microtask);
//! - `push_after`: run a thunk once the given delay has elapsed.
//!
//! Timers fire in `(deadline, submission order)` order. Two drivers decide
//! what "elapsed" means: the wall driver sleeps until the earliest
//! deadline, the virtual driver jumps time there — deterministic, used by
//! the lab engine for tests.

use std::cell::{Cell, RefCell};
use std::cmp::Reverse;
use std::collections::{BinaryHeap, VecDeque};
use std::time::Instant;

use super::time::Time;

type Thunk = Box<dyn FnOnce()>;

/// How the scheduler advances time when the microtask queue is empty.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Driver {
    /// Real time: sleep until the earliest pending deadline.
    Wall,
    /// Virtual time: jump straight to the earliest pending deadline.
    Virtual,
}

struct TimerEntry {
    at: Time,
    seq: u64,
    thunk: Thunk,
}

impl PartialEq for TimerEntry {
    fn eq(&self, other: &Self) -> bool {
        self.at == other.at && self.seq == other.seq
    }
}

impl Eq for TimerEntry {}

impl PartialOrd for TimerEntry {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for TimerEntry {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        (self.at, self.seq).cmp(&(other.at, other.seq))
    }
}

/// The single-threaded cooperative scheduler.
pub(crate) struct Scheduler {
    driver: Driver,
    started: Instant,
    /// Current virtual time; unused by the wall driver.
    virtual_now: Cell<Time>,
    ready: RefCell<VecDeque<Thunk>>,
    timers: RefCell<BinaryHeap<Reverse<TimerEntry>>>,
    seq: Cell<u64>,
}

impl Scheduler {
    pub(crate) fn new(driver: Driver) -> Self {
        Self {
            driver,
            started: Instant::now(),
            virtual_now: Cell::new(Time::ZERO),
            ready: RefCell::new(VecDeque::new()),
            timers: RefCell::new(BinaryHeap::new()),
            seq: Cell::new(0),
        }
    }

    pub(crate) fn driver(&self) -> Driver {
        self.driver
    }

    /// The current scheduler time.
    pub(crate) fn now(&self) -> Time {
        match self.driver {
            Driver::Wall => Time::from(self.started.elapsed()),
            Driver::Virtual => self.virtual_now.get(),
        }
    }

    /// Enqueues a thunk for the next tick.
    pub(crate) fn push(&self, thunk: impl FnOnce() + 'static) {
        self.ready.borrow_mut().push_back(Box::new(thunk));
    }

    /// Enqueues a thunk to run after `millis`; zero means next tick.
    pub(crate) fn push_after(&self, millis: u64, thunk: impl FnOnce() + 'static) {
        if millis == 0 {
            self.push(thunk);
            return;
        }
        let seq = self.seq.get();
        self.seq.set(seq + 1);
        self.timers.borrow_mut().push(Reverse(TimerEntry {
            at: self.now().saturating_add_millis(millis),
            seq,
            thunk: Box::new(thunk),
        }));
    }

    /// Returns true if nothing is pending.
    pub(crate) fn is_quiescent(&self) -> bool {
        self.ready.borrow().is_empty() && self.timers.borrow().is_empty()
    }

    /// Runs until both queues are empty; returns the number of thunks run.
    pub(crate) fn run_until_quiescent(&self) -> u64 {
        self.run_bounded(u64::MAX)
    }

    /// Runs at most `max_steps` thunks; returns the number actually run.
    ///
    /// Stops early when quiescent. The bound is the escape hatch for
    /// driving sequences that never end on their own (cycles, clocks).
    pub(crate) fn run_bounded(&self, max_steps: u64) -> u64 {
        let mut steps = 0;
        while steps < max_steps {
            let next = self.ready.borrow_mut().pop_front();
            if let Some(thunk) = next {
                thunk();
                steps += 1;
                continue;
            }
            if !self.advance_to_next_timer() {
                break;
            }
        }
        steps
    }

    /// Moves due timers to the ready queue, advancing time per the driver.
    ///
    /// Returns false when no timers are pending.
    fn advance_to_next_timer(&self) -> bool {
        let earliest = match self.timers.borrow().peek() {
            Some(Reverse(entry)) => entry.at,
            None => return false,
        };

        match self.driver {
            Driver::Virtual => {
                if earliest > self.virtual_now.get() {
                    self.virtual_now.set(earliest);
                }
            }
            Driver::Wall => {
                let now = self.now();
                if earliest > now {
                    std::thread::sleep(earliest.saturating_since(now));
                }
            }
        }

        let now = self.now();
        loop {
            let due = {
                let mut timers = self.timers.borrow_mut();
                match timers.peek() {
                    Some(Reverse(entry)) if entry.at <= now => timers.pop().map(|Reverse(e)| e),
                    _ => None,
                }
            };
            match due {
                Some(entry) => self.ready.borrow_mut().push_back(entry.thunk),
                None => break,
            }
        }
        true
    }
}

impl std::fmt::Debug for Scheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Scheduler")
            .field("driver", &self.driver)
            .field("now", &self.now())
            .field("ready", &self.ready.borrow().len())
            .field("timers", &self.timers.borrow().len())
            .finish()
    }
}
